use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Unix milliseconds. The only time type.
pub type Ms = i64;

/// Rejected interval bounds: `start` must be strictly before `end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntervalError {
    pub start: Ms,
    pub end: Ms,
}

impl fmt::Display for IntervalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid interval [{}, {}): start must be before end",
            self.start, self.end
        )
    }
}

impl std::error::Error for IntervalError {}

/// Half-open interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawInterval")]
pub struct Interval {
    start: Ms,
    end: Ms,
}

/// Wire shape of `Interval`; decoding goes through `Interval::new`.
#[derive(Deserialize)]
struct RawInterval {
    start: Ms,
    end: Ms,
}

impl TryFrom<RawInterval> for Interval {
    type Error = IntervalError;

    fn try_from(raw: RawInterval) -> Result<Self, Self::Error> {
        Interval::new(raw.start, raw.end)
    }
}

impl Interval {
    pub fn new(start: Ms, end: Ms) -> Result<Self, IntervalError> {
        if start >= end {
            return Err(IntervalError { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> Ms {
        self.start
    }

    pub fn end(&self) -> Ms {
        self.end
    }

    pub fn duration_ms(&self) -> Ms {
        self.end - self.start
    }

    /// Touching endpoints do not overlap.
    pub fn overlaps(&self, other: &Interval) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn contains(&self, t: Ms) -> bool {
        self.start <= t && t < self.end
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BookingStatus {
    Confirmed,
    Cancelled,
    Completed,
    NoShow,
}

impl BookingStatus {
    pub const ALL: [BookingStatus; 4] = [
        BookingStatus::Confirmed,
        BookingStatus::Cancelled,
        BookingStatus::Completed,
        BookingStatus::NoShow,
    ];

    /// Only confirmed bookings occupy their resource.
    pub fn is_active(self) -> bool {
        matches!(self, BookingStatus::Confirmed)
    }

    pub fn is_terminal(self) -> bool {
        !self.is_active()
    }

    /// The transition table. Everything not listed here is illegal.
    pub fn can_transition_to(self, next: BookingStatus) -> bool {
        use BookingStatus::*;
        matches!(
            (self, next),
            (Confirmed, Cancelled) | (Confirmed, Completed) | (Confirmed, NoShow)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::Completed => "completed",
            BookingStatus::NoShow => "no_show",
        }
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownStatus(pub String);

impl fmt::Display for UnknownStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown booking status '{}' (expected confirmed, cancelled, completed or no_show)",
            self.0
        )
    }
}

impl std::error::Error for UnknownStatus {}

impl FromStr for BookingStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BookingStatus::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownStatus(s.to_string()))
    }
}

/// A client's claim on a resource for one interval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: Ulid,
    pub resource_id: Ulid,
    pub client_id: Ulid,
    pub interval: Interval,
    pub status: BookingStatus,
    /// Present iff `status` is `Cancelled`.
    pub cancellation_reason: Option<String>,
    pub notes: Option<String>,
}

impl Booking {
    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }
}

#[derive(Debug, Clone)]
pub struct ResourceState {
    pub id: Ulid,
    pub name: Option<String>,
    /// All bookings of every status, sorted by `interval.start`.
    pub bookings: Vec<Booking>,
    /// Set once the resource has been removed; writers that were queued on
    /// the lock must not touch it afterwards.
    pub retired: bool,
}

impl ResourceState {
    pub fn new(id: Ulid, name: Option<String>) -> Self {
        Self {
            id,
            name,
            bookings: Vec::new(),
            retired: false,
        }
    }

    /// Insert booking maintaining sort order by interval start.
    pub fn insert_booking(&mut self, booking: Booking) {
        let pos = self
            .bookings
            .partition_point(|b| b.interval.start() <= booking.interval.start());
        self.bookings.insert(pos, booking);
    }

    pub fn remove_booking(&mut self, id: Ulid) -> Option<Booking> {
        let pos = self.bookings.iter().position(|b| b.id == id)?;
        Some(self.bookings.remove(pos))
    }

    pub fn booking(&self, id: Ulid) -> Option<&Booking> {
        self.bookings.iter().find(|b| b.id == id)
    }

    pub fn booking_mut(&mut self, id: Ulid) -> Option<&mut Booking> {
        self.bookings.iter_mut().find(|b| b.id == id)
    }

    /// Bookings of any status whose interval overlaps `query`.
    /// Uses binary search to skip bookings starting at or after `query.end`.
    pub fn overlapping<'a>(&'a self, query: &'a Interval) -> impl Iterator<Item = &'a Booking> + 'a {
        let right_bound = self
            .bookings
            .partition_point(|b| b.interval.start() < query.end());
        self.bookings[..right_bound]
            .iter()
            .filter(move |b| b.interval.overlaps(query))
    }
}

/// Flat event types. This is the WAL record format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    ResourceRegistered {
        id: Ulid,
        name: Option<String>,
    },
    ResourceRemoved {
        id: Ulid,
    },
    ClientRegistered {
        id: Ulid,
        name: Option<String>,
    },
    ClientRemoved {
        id: Ulid,
    },
    BookingCreated {
        id: Ulid,
        resource_id: Ulid,
        client_id: Ulid,
        interval: Interval,
        notes: Option<String>,
    },
    BookingStatusChanged {
        id: Ulid,
        resource_id: Ulid,
        status: BookingStatus,
        cancellation_reason: Option<String>,
    },
    BookingRescheduled {
        id: Ulid,
        resource_id: Ulid,
        interval: Interval,
    },
    BookingDeleted {
        id: Ulid,
        resource_id: Ulid,
    },
}

// ── Query result types ───────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceInfo {
    pub id: Ulid,
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientInfo {
    pub id: Ulid,
    pub name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn iv(start: Ms, end: Ms) -> Interval {
        Interval::new(start, end).unwrap()
    }

    fn booking(start: Ms, end: Ms, status: BookingStatus) -> Booking {
        Booking {
            id: Ulid::new(),
            resource_id: Ulid::new(),
            client_id: Ulid::new(),
            interval: iv(start, end),
            status,
            cancellation_reason: None,
            notes: None,
        }
    }

    #[test]
    fn interval_basics() {
        let s = iv(100, 200);
        assert_eq!(s.duration_ms(), 100);
        assert!(s.contains(100));
        assert!(s.contains(199));
        assert!(!s.contains(200)); // half-open
    }

    #[test]
    fn interval_rejects_empty_and_inverted() {
        assert_eq!(Interval::new(100, 100), Err(IntervalError { start: 100, end: 100 }));
        assert!(Interval::new(200, 100).is_err());
    }

    #[test]
    fn decoding_revalidates_bounds() {
        let good = bincode::serialize(&(10i64, 20i64)).unwrap();
        assert_eq!(bincode::deserialize::<Interval>(&good).unwrap(), iv(10, 20));

        let inverted = bincode::serialize(&(20i64, 10i64)).unwrap();
        assert!(bincode::deserialize::<Interval>(&inverted).is_err());
        let empty = bincode::serialize(&(5i64, 5i64)).unwrap();
        assert!(bincode::deserialize::<Interval>(&empty).is_err());
    }

    #[test]
    fn interval_overlap() {
        let a = iv(100, 200);
        let b = iv(150, 250);
        let c = iv(200, 300);
        assert!(a.overlaps(&b));
        assert!(b.overlaps(&a));
        assert!(!a.overlaps(&c)); // adjacent, not overlapping
        assert!(!c.overlaps(&a));
        assert!(a.overlaps(&a));
    }

    #[test]
    fn interval_overlap_containment() {
        let outer = iv(0, 1000);
        let inner = iv(400, 500);
        assert!(outer.overlaps(&inner));
        assert!(inner.overlaps(&outer));
    }

    #[test]
    fn status_transition_table() {
        use BookingStatus::*;
        assert!(Confirmed.can_transition_to(Cancelled));
        assert!(Confirmed.can_transition_to(Completed));
        assert!(Confirmed.can_transition_to(NoShow));
        assert!(!Confirmed.can_transition_to(Confirmed));
        for from in [Cancelled, Completed, NoShow] {
            assert!(from.is_terminal());
            for to in BookingStatus::ALL {
                assert!(!from.can_transition_to(to), "{from} -> {to} must be illegal");
            }
        }
    }

    #[test]
    fn status_parse_is_case_insensitive() {
        assert_eq!("CANCELLED".parse::<BookingStatus>(), Ok(BookingStatus::Cancelled));
        assert_eq!("No_Show".parse::<BookingStatus>(), Ok(BookingStatus::NoShow));
        assert_eq!(" completed ".parse::<BookingStatus>(), Ok(BookingStatus::Completed));
        assert!("pending".parse::<BookingStatus>().is_err());
    }

    #[test]
    fn status_display_roundtrips_through_parse() {
        for status in BookingStatus::ALL {
            assert_eq!(status.to_string().parse::<BookingStatus>(), Ok(status));
        }
    }

    #[test]
    fn bookings_kept_sorted() {
        let mut rs = ResourceState::new(Ulid::new(), None);
        rs.insert_booking(booking(300, 400, BookingStatus::Confirmed));
        rs.insert_booking(booking(100, 200, BookingStatus::Cancelled));
        rs.insert_booking(booking(200, 300, BookingStatus::Confirmed));
        let starts: Vec<Ms> = rs.bookings.iter().map(|b| b.interval.start()).collect();
        assert_eq!(starts, vec![100, 200, 300]);
    }

    #[test]
    fn remove_booking_by_id() {
        let mut rs = ResourceState::new(Ulid::new(), None);
        let b = booking(100, 200, BookingStatus::Confirmed);
        let id = b.id;
        rs.insert_booking(b);
        assert!(rs.remove_booking(Ulid::new()).is_none());
        assert_eq!(rs.remove_booking(id).map(|b| b.id), Some(id));
        assert!(rs.bookings.is_empty());
    }

    #[test]
    fn overlapping_skips_past_and_future() {
        let mut rs = ResourceState::new(Ulid::new(), None);
        rs.insert_booking(booking(100, 200, BookingStatus::Confirmed));
        rs.insert_booking(booking(450, 600, BookingStatus::Completed));
        rs.insert_booking(booking(1000, 1100, BookingStatus::Confirmed));

        let query = iv(500, 800);
        let hits: Vec<_> = rs.overlapping(&query).collect();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].interval, iv(450, 600));
    }

    #[test]
    fn overlapping_adjacent_not_included() {
        let mut rs = ResourceState::new(Ulid::new(), None);
        rs.insert_booking(booking(100, 200, BookingStatus::Confirmed));
        let query = iv(200, 300);
        assert_eq!(rs.overlapping(&query).count(), 0);
    }

    #[test]
    fn overlapping_long_booking_spanning_query() {
        let mut rs = ResourceState::new(Ulid::new(), None);
        rs.insert_booking(booking(0, 10_000, BookingStatus::Confirmed));
        rs.insert_booking(booking(20, 30, BookingStatus::Confirmed));
        let query = iv(500, 600);
        assert_eq!(rs.overlapping(&query).count(), 1);
    }

    #[test]
    fn event_serialization_roundtrip() {
        let event = Event::BookingCreated {
            id: Ulid::new(),
            resource_id: Ulid::new(),
            client_id: Ulid::new(),
            interval: iv(1000, 2000),
            notes: Some("window seat".into()),
        };
        let bytes = bincode::serialize(&event).unwrap();
        let decoded: Event = bincode::deserialize(&bytes).unwrap();
        assert_eq!(event, decoded);
    }
}
