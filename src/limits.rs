use crate::model::Ms;

pub const MAX_TENANTS: usize = 1024;
/// PostgreSQL's identifier length; the escaped WAL file name stays under 255 bytes.
pub const MAX_TENANT_NAME_LEN: usize = 63;

pub const MAX_RESOURCES_PER_TENANT: usize = 100_000;
pub const MAX_CLIENTS_PER_TENANT: usize = 1_000_000;
pub const MAX_BOOKINGS_PER_RESOURCE: usize = 100_000;

pub const MAX_NAME_LEN: usize = 256;
pub const MAX_NOTES_LEN: usize = 4096;
pub const MAX_REASON_LEN: usize = 1024;

/// 1970-01-01T00:00:00Z
pub const MIN_VALID_TIMESTAMP_MS: Ms = 0;
/// 2200-01-01T00:00:00Z
pub const MAX_VALID_TIMESTAMP_MS: Ms = 7_258_118_400_000;
/// One year.
pub const MAX_SPAN_DURATION_MS: Ms = 366 * 24 * 3_600_000;
