use sqlparser::ast::{self, Expr, FromTable, ObjectNamePart, SetExpr, Statement, TableFactor, TableObject, Value, ValueWithSpan};
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;
use ulid::Ulid;

use crate::model::*;

/// Parsed command from SQL input.
#[derive(Debug, PartialEq)]
pub enum Command {
    InsertResource {
        id: Ulid,
        name: Option<String>,
    },
    DeleteResource {
        id: Ulid,
    },
    InsertClient {
        id: Ulid,
        name: Option<String>,
    },
    DeleteClient {
        id: Ulid,
    },
    InsertBooking {
        resource_id: Ulid,
        client_id: Ulid,
        start: Ms,
        end: Ms,
        notes: Option<String>,
    },
    ChangeStatus {
        booking_id: Ulid,
        status: BookingStatus,
        reason: Option<String>,
    },
    Reschedule {
        booking_id: Ulid,
        start: Ms,
        end: Ms,
    },
    DeleteBooking {
        id: Ulid,
    },
    SelectBookings {
        filter: BookingFilter,
    },
    SelectResources,
    SelectClients,
}

/// WHERE clause of `SELECT ... FROM bookings`. Every field is optional;
/// an empty filter selects all bookings.
///
/// `start >= A AND "end" <= B` is a window query, not a containment test:
/// it selects every booking that overlaps `[A, B)`, the same predicate
/// admission uses. A booking at `[5, 15)` is returned for
/// `start >= 10 AND "end" <= 20`. Either bound alone is open-ended:
/// `start >= A` keeps bookings ending after `A`, `"end" <= B` keeps
/// bookings starting before `B`.
#[derive(Debug, Default, PartialEq)]
pub struct BookingFilter {
    pub id: Option<Ulid>,
    pub resource_id: Option<Ulid>,
    pub client_id: Option<Ulid>,
    pub status: Option<BookingStatus>,
    pub start: Option<Ms>,
    pub end: Option<Ms>,
}

impl BookingFilter {
    /// True if `booking` satisfies every filter that is set.
    /// `start`/`end` bound the window the booking must overlap.
    pub fn matches(&self, booking: &Booking) -> bool {
        self.id.is_none_or(|id| booking.id == id)
            && self.resource_id.is_none_or(|r| booking.resource_id == r)
            && self.client_id.is_none_or(|c| booking.client_id == c)
            && self.status.is_none_or(|s| booking.status == s)
            && self.start.is_none_or(|s| booking.interval.end() > s)
            && self.end.is_none_or(|e| booking.interval.start() < e)
    }
}

pub fn parse_sql(sql: &str) -> Result<Command, SqlError> {
    let dialect = PostgreSqlDialect {};
    let stmts = Parser::parse_sql(&dialect, sql).map_err(|e| SqlError::Parse(e.to_string()))?;
    if stmts.is_empty() {
        return Err(SqlError::Empty);
    }
    if stmts.len() > 1 {
        return Err(SqlError::Unsupported("multiple statements".into()));
    }

    match &stmts[0] {
        Statement::Insert(insert) => parse_insert(insert),
        Statement::Delete(delete) => parse_delete(delete),
        Statement::Query(query) => parse_select(query),
        other => Err(SqlError::Unsupported(format!("{other}"))),
    }
}

// Column order assumed when an INSERT omits its column list.
const RESOURCE_COLUMNS: &[&str] = &["id", "name"];
const CLIENT_COLUMNS: &[&str] = &["id", "name"];
const BOOKING_COLUMNS: &[&str] = &["resource_id", "client_id", "start", "end", "notes"];
const STATUS_CHANGE_COLUMNS: &[&str] = &["booking_id", "status", "reason"];
const RESCHEDULE_COLUMNS: &[&str] = &["booking_id", "start", "end"];

/// One VALUES row with its values addressed by column name.
struct Row {
    table: &'static str,
    columns: Vec<String>,
    values: Vec<Expr>,
}

impl Row {
    fn get(&self, column: &'static str) -> Option<&Expr> {
        self.columns
            .iter()
            .position(|c| c == column)
            .and_then(|i| self.values.get(i))
    }

    fn required(&self, column: &'static str) -> Result<&Expr, SqlError> {
        self.get(column).ok_or(SqlError::MissingColumn(self.table, column))
    }

    fn optional_string(&self, column: &'static str) -> Result<Option<String>, SqlError> {
        self.get(column).map_or(Ok(None), parse_string_or_null)
    }
}

fn parse_insert(insert: &ast::Insert) -> Result<Command, SqlError> {
    let table = insert_table_name(insert)?;
    let (table, defaults): (&'static str, &[&str]) = match table.as_str() {
        "resources" => ("resources", RESOURCE_COLUMNS),
        "clients" => ("clients", CLIENT_COLUMNS),
        "bookings" => ("bookings", BOOKING_COLUMNS),
        "status_changes" => ("status_changes", STATUS_CHANGE_COLUMNS),
        "reschedules" => ("reschedules", RESCHEDULE_COLUMNS),
        _ => return Err(SqlError::UnknownTable(table)),
    };

    let values = extract_insert_values(insert)?;
    let columns: Vec<String> = if insert.columns.is_empty() {
        defaults.iter().map(|c| c.to_string()).collect()
    } else {
        insert.columns.iter().map(|c| c.value.to_lowercase()).collect()
    };
    if values.len() != columns.len() {
        return Err(SqlError::WrongArity(table, columns.len(), values.len()));
    }
    let row = Row { table, columns, values };

    match table {
        "resources" => Ok(Command::InsertResource {
            id: parse_ulid_expr(row.required("id")?)?,
            name: row.optional_string("name")?,
        }),
        "clients" => Ok(Command::InsertClient {
            id: parse_ulid_expr(row.required("id")?)?,
            name: row.optional_string("name")?,
        }),
        "bookings" => Ok(Command::InsertBooking {
            resource_id: parse_ulid_expr(row.required("resource_id")?)?,
            client_id: parse_ulid_expr(row.required("client_id")?)?,
            start: parse_i64_expr(row.required("start")?)?,
            end: parse_i64_expr(row.required("end")?)?,
            notes: row.optional_string("notes")?,
        }),
        "status_changes" => Ok(Command::ChangeStatus {
            booking_id: parse_ulid_expr(row.required("booking_id")?)?,
            status: parse_status_expr(row.required("status")?)?,
            reason: row.optional_string("reason")?,
        }),
        _ => Ok(Command::Reschedule {
            booking_id: parse_ulid_expr(row.required("booking_id")?)?,
            start: parse_i64_expr(row.required("start")?)?,
            end: parse_i64_expr(row.required("end")?)?,
        }),
    }
}

fn parse_delete(delete: &ast::Delete) -> Result<Command, SqlError> {
    let table = delete_table_name(delete)?;
    let id = extract_where_id(&delete.selection)?;

    match table.as_str() {
        "resources" => Ok(Command::DeleteResource { id }),
        "clients" => Ok(Command::DeleteClient { id }),
        "bookings" => Ok(Command::DeleteBooking { id }),
        _ => Err(SqlError::UnknownTable(table)),
    }
}

fn parse_select(query: &ast::Query) -> Result<Command, SqlError> {
    let select = match query.body.as_ref() {
        SetExpr::Select(s) => s,
        _ => return Err(SqlError::Unsupported("non-SELECT query".into())),
    };

    if select.from.is_empty() {
        return Err(SqlError::Parse("SELECT without FROM".into()));
    }
    let table = table_factor_name(&select.from[0].relation)?;

    match table.as_str() {
        "bookings" => {
            let mut filter = BookingFilter::default();
            if let Some(selection) = &select.selection {
                extract_booking_filters(selection, &mut filter)?;
            }
            Ok(Command::SelectBookings { filter })
        }
        "resources" => Ok(Command::SelectResources),
        "clients" => Ok(Command::SelectClients),
        _ => Err(SqlError::UnknownTable(table)),
    }
}

fn extract_booking_filters(expr: &Expr, filter: &mut BookingFilter) -> Result<(), SqlError> {
    match expr {
        Expr::Nested(inner) => extract_booking_filters(inner, filter),
        Expr::BinaryOp { left, op, right } => {
            let col = expr_column_name(left);
            match (op, col.as_deref()) {
                (ast::BinaryOperator::And, _) => {
                    extract_booking_filters(left, filter)?;
                    extract_booking_filters(right, filter)
                }
                (ast::BinaryOperator::Eq, Some("id")) => {
                    filter.id = Some(parse_ulid_expr(right)?);
                    Ok(())
                }
                (ast::BinaryOperator::Eq, Some("resource_id")) => {
                    filter.resource_id = Some(parse_ulid_expr(right)?);
                    Ok(())
                }
                (ast::BinaryOperator::Eq, Some("client_id")) => {
                    filter.client_id = Some(parse_ulid_expr(right)?);
                    Ok(())
                }
                (ast::BinaryOperator::Eq, Some("status")) => {
                    filter.status = Some(parse_status_expr(right)?);
                    Ok(())
                }
                (ast::BinaryOperator::GtEq, Some("start")) => {
                    filter.start = Some(parse_i64_expr(right)?);
                    Ok(())
                }
                (ast::BinaryOperator::LtEq, Some("end")) => {
                    filter.end = Some(parse_i64_expr(right)?);
                    Ok(())
                }
                _ => Err(SqlError::Unsupported(format!("filter: {expr}"))),
            }
        }
        _ => Err(SqlError::Unsupported(format!("filter: {expr}"))),
    }
}

// ── Helpers ───────────────────────────────────────────────────

fn object_name_last(name: &ast::ObjectName) -> Option<String> {
    name.0.last().and_then(|part| match part {
        ObjectNamePart::Identifier(ident) => Some(ident.value.to_lowercase()),
        _ => None,
    })
}

fn insert_table_name(insert: &ast::Insert) -> Result<String, SqlError> {
    match &insert.table {
        TableObject::TableName(name) => {
            object_name_last(name).ok_or_else(|| SqlError::Parse("empty table name".into()))
        }
        _ => Err(SqlError::Parse("unsupported table object in INSERT".into())),
    }
}

fn delete_table_name(delete: &ast::Delete) -> Result<String, SqlError> {
    let tables_with_joins = match &delete.from {
        FromTable::WithFromKeyword(t) | FromTable::WithoutKeyword(t) => t,
    };
    if let Some(first) = tables_with_joins.first() {
        table_factor_name(&first.relation)
    } else {
        Err(SqlError::Parse("DELETE without table".into()))
    }
}

fn table_factor_name(tf: &TableFactor) -> Result<String, SqlError> {
    match tf {
        TableFactor::Table { name, .. } => {
            object_name_last(name).ok_or_else(|| SqlError::Parse("empty table name".into()))
        }
        _ => Err(SqlError::Parse("complex table expression".into())),
    }
}

/// The single VALUES row of an INSERT.
fn extract_insert_values(insert: &ast::Insert) -> Result<Vec<Expr>, SqlError> {
    let body = insert
        .source
        .as_ref()
        .ok_or(SqlError::Parse("no VALUES".into()))?;
    match body.body.as_ref() {
        SetExpr::Values(values) => match values.rows.as_slice() {
            [] => Err(SqlError::Parse("empty VALUES".into())),
            [row] => Ok(row.clone()),
            _ => Err(SqlError::Unsupported("multi-row INSERT".into())),
        },
        _ => Err(SqlError::Parse("expected VALUES".into())),
    }
}

fn extract_where_id(selection: &Option<Expr>) -> Result<Ulid, SqlError> {
    let sel = selection.as_ref().ok_or(SqlError::MissingFilter("id"))?;
    match sel {
        Expr::BinaryOp {
            left,
            op: ast::BinaryOperator::Eq,
            right,
        } => {
            if expr_column_name(left).as_deref() == Some("id") {
                parse_ulid_expr(right)
            } else {
                Err(SqlError::MissingFilter("id"))
            }
        }
        _ => Err(SqlError::MissingFilter("id")),
    }
}

fn expr_column_name(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Identifier(ident) => Some(ident.value.to_lowercase()),
        Expr::CompoundIdentifier(parts) => parts.last().map(|i| i.value.to_lowercase()),
        _ => None,
    }
}

fn extract_value(expr: &Expr) -> Option<&Value> {
    match expr {
        Expr::Value(ValueWithSpan { value, .. }) => Some(value),
        _ => None,
    }
}

fn parse_ulid_expr(expr: &Expr) -> Result<Ulid, SqlError> {
    if let Some(value) = extract_value(expr) {
        match value {
            Value::SingleQuotedString(s) | Value::Number(s, _) => {
                Ulid::from_string(s).map_err(|e| SqlError::Parse(format!("bad ULID: {e}")))
            }
            _ => Err(SqlError::Parse(format!("expected string, got {value:?}"))),
        }
    } else {
        Err(SqlError::Parse(format!("expected value, got {expr:?}")))
    }
}

fn parse_i64_expr(expr: &Expr) -> Result<i64, SqlError> {
    if let Some(value) = extract_value(expr) {
        match value {
            Value::Number(s, _) | Value::SingleQuotedString(s) => s
                .parse()
                .map_err(|e| SqlError::Parse(format!("bad i64: {e}"))),
            _ => Err(SqlError::Parse(format!("expected number, got {value:?}"))),
        }
    } else if let Expr::UnaryOp {
        op: ast::UnaryOperator::Minus,
        expr,
    } = expr
    {
        Ok(-parse_i64_expr(expr)?)
    } else {
        Err(SqlError::Parse(format!("expected value, got {expr:?}")))
    }
}

fn parse_string_or_null(expr: &Expr) -> Result<Option<String>, SqlError> {
    match extract_value(expr) {
        Some(Value::Null) => Ok(None),
        Some(Value::SingleQuotedString(s)) => Ok(Some(s.clone())),
        Some(value) => Err(SqlError::Parse(format!("expected string or NULL, got {value:?}"))),
        None => Err(SqlError::Parse(format!("expected value, got {expr:?}"))),
    }
}

fn parse_status_expr(expr: &Expr) -> Result<BookingStatus, SqlError> {
    match extract_value(expr) {
        Some(Value::SingleQuotedString(s)) => {
            s.parse().map_err(|e: UnknownStatus| SqlError::Parse(e.to_string()))
        }
        _ => Err(SqlError::Parse(format!("expected status string, got {expr:?}"))),
    }
}

// ── Errors ────────────────────────────────────────────────────

#[derive(Debug)]
pub enum SqlError {
    Parse(String),
    Empty,
    Unsupported(String),
    UnknownTable(String),
    WrongArity(&'static str, usize, usize),
    MissingColumn(&'static str, &'static str),
    MissingFilter(&'static str),
}

impl std::fmt::Display for SqlError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SqlError::Parse(s) => write!(f, "parse error: {s}"),
            SqlError::Empty => write!(f, "empty query"),
            SqlError::Unsupported(s) => write!(f, "unsupported: {s}"),
            SqlError::UnknownTable(t) => write!(f, "unknown table: {t}"),
            SqlError::WrongArity(t, expected, got) => {
                write!(f, "{t}: expected {expected} values, got {got}")
            }
            SqlError::MissingColumn(t, col) => write!(f, "{t}: missing column {col}"),
            SqlError::MissingFilter(col) => write!(f, "missing filter: {col}"),
        }
    }
}

impl std::error::Error for SqlError {}

#[cfg(test)]
mod tests {
    use super::*;

    const A: &str = "01ARZ3NDEKTSV4RRFFQ69G5FAV";
    const B: &str = "01BX5ZZKBKACTAV9WEVGEMMVRZ";

    fn ulid(s: &str) -> Ulid {
        Ulid::from_string(s).unwrap()
    }

    #[test]
    fn parse_insert_resource() {
        let sql = format!("INSERT INTO resources (id, name) VALUES ('{A}', 'Dr. Ortiz')");
        assert_eq!(
            parse_sql(&sql).unwrap(),
            Command::InsertResource { id: ulid(A), name: Some("Dr. Ortiz".into()) }
        );
    }

    #[test]
    fn parse_insert_resource_without_name() {
        let sql = format!("INSERT INTO resources (id) VALUES ('{A}')");
        assert_eq!(parse_sql(&sql).unwrap(), Command::InsertResource { id: ulid(A), name: None });

        let sql = format!("INSERT INTO resources VALUES ('{A}', NULL)");
        assert_eq!(parse_sql(&sql).unwrap(), Command::InsertResource { id: ulid(A), name: None });
    }

    #[test]
    fn parse_insert_client() {
        let sql = format!("INSERT INTO clients (id, name) VALUES ('{B}', 'Ana')");
        assert_eq!(
            parse_sql(&sql).unwrap(),
            Command::InsertClient { id: ulid(B), name: Some("Ana".into()) }
        );
    }

    #[test]
    fn parse_delete_directory_entries() {
        let sql = format!("DELETE FROM resources WHERE id = '{A}'");
        assert_eq!(parse_sql(&sql).unwrap(), Command::DeleteResource { id: ulid(A) });
        let sql = format!("DELETE FROM clients WHERE id = '{B}'");
        assert_eq!(parse_sql(&sql).unwrap(), Command::DeleteClient { id: ulid(B) });
    }

    #[test]
    fn parse_insert_booking() {
        let sql = format!(
            r#"INSERT INTO bookings (resource_id, client_id, start, "end", notes) VALUES ('{A}', '{B}', 1000, 2000, 'bring x-rays')"#
        );
        assert_eq!(
            parse_sql(&sql).unwrap(),
            Command::InsertBooking {
                resource_id: ulid(A),
                client_id: ulid(B),
                start: 1000,
                end: 2000,
                notes: Some("bring x-rays".into()),
            }
        );
    }

    #[test]
    fn parse_insert_booking_reordered_columns() {
        let sql = format!(
            r#"INSERT INTO bookings ("end", start, client_id, resource_id) VALUES (2000, 1000, '{B}', '{A}')"#
        );
        assert_eq!(
            parse_sql(&sql).unwrap(),
            Command::InsertBooking {
                resource_id: ulid(A),
                client_id: ulid(B),
                start: 1000,
                end: 2000,
                notes: None,
            }
        );
    }

    #[test]
    fn parse_insert_booking_negative_start() {
        let sql = format!(r#"INSERT INTO bookings (resource_id, client_id, start, "end") VALUES ('{A}', '{B}', -5, 10)"#);
        match parse_sql(&sql).unwrap() {
            Command::InsertBooking { start, .. } => assert_eq!(start, -5),
            other => panic!("expected InsertBooking, got {other:?}"),
        }
    }

    #[test]
    fn parse_insert_booking_missing_column() {
        let sql = format!("INSERT INTO bookings (resource_id, client_id, start) VALUES ('{A}', '{B}', 1000)");
        assert!(matches!(
            parse_sql(&sql),
            Err(SqlError::MissingColumn("bookings", "end"))
        ));
    }

    #[test]
    fn parse_insert_wrong_arity() {
        let sql = format!("INSERT INTO resources (id, name) VALUES ('{A}')");
        assert!(matches!(parse_sql(&sql), Err(SqlError::WrongArity("resources", 2, 1))));
    }

    #[test]
    fn parse_status_change() {
        let sql = format!(
            "INSERT INTO status_changes (booking_id, status, reason) VALUES ('{A}', 'cancelled', 'client ill')"
        );
        assert_eq!(
            parse_sql(&sql).unwrap(),
            Command::ChangeStatus {
                booking_id: ulid(A),
                status: BookingStatus::Cancelled,
                reason: Some("client ill".into()),
            }
        );
    }

    #[test]
    fn parse_status_change_without_reason() {
        let sql = format!("INSERT INTO status_changes (booking_id, status) VALUES ('{A}', 'NO_SHOW')");
        assert_eq!(
            parse_sql(&sql).unwrap(),
            Command::ChangeStatus { booking_id: ulid(A), status: BookingStatus::NoShow, reason: None }
        );
    }

    #[test]
    fn parse_status_change_unknown_status() {
        let sql = format!("INSERT INTO status_changes (booking_id, status) VALUES ('{A}', 'pending')");
        assert!(matches!(parse_sql(&sql), Err(SqlError::Parse(_))));
    }

    #[test]
    fn parse_reschedule() {
        let sql = format!(r#"INSERT INTO reschedules (booking_id, start, "end") VALUES ('{A}', 3000, 4000)"#);
        assert_eq!(
            parse_sql(&sql).unwrap(),
            Command::Reschedule { booking_id: ulid(A), start: 3000, end: 4000 }
        );
    }

    #[test]
    fn parse_delete_booking() {
        let sql = format!("DELETE FROM bookings WHERE id = '{A}'");
        assert_eq!(parse_sql(&sql).unwrap(), Command::DeleteBooking { id: ulid(A) });
    }

    #[test]
    fn parse_delete_requires_id() {
        assert!(matches!(
            parse_sql("DELETE FROM bookings"),
            Err(SqlError::MissingFilter("id"))
        ));
        assert!(matches!(
            parse_sql(&format!("DELETE FROM bookings WHERE resource_id = '{A}'")),
            Err(SqlError::MissingFilter("id"))
        ));
    }

    #[test]
    fn parse_select_all_bookings() {
        assert_eq!(
            parse_sql("SELECT * FROM bookings").unwrap(),
            Command::SelectBookings { filter: BookingFilter::default() }
        );
    }

    #[test]
    fn parse_select_bookings_window() {
        let sql = format!(r#"SELECT * FROM bookings WHERE resource_id = '{A}' AND start >= 1000 AND "end" <= 5000"#);
        assert_eq!(
            parse_sql(&sql).unwrap(),
            Command::SelectBookings {
                filter: BookingFilter {
                    resource_id: Some(ulid(A)),
                    start: Some(1000),
                    end: Some(5000),
                    ..Default::default()
                }
            }
        );
    }

    #[test]
    fn parse_select_bookings_by_client_and_status() {
        let sql = format!("SELECT * FROM bookings WHERE client_id = '{B}' AND (status = 'confirmed')");
        assert_eq!(
            parse_sql(&sql).unwrap(),
            Command::SelectBookings {
                filter: BookingFilter {
                    client_id: Some(ulid(B)),
                    status: Some(BookingStatus::Confirmed),
                    ..Default::default()
                }
            }
        );
    }

    #[test]
    fn parse_select_unsupported_filter() {
        assert!(matches!(
            parse_sql("SELECT * FROM bookings WHERE notes = 'x'"),
            Err(SqlError::Unsupported(_))
        ));
        assert!(matches!(
            parse_sql("SELECT * FROM bookings WHERE start > 10"),
            Err(SqlError::Unsupported(_))
        ));
    }

    #[test]
    fn parse_select_directory() {
        assert_eq!(parse_sql("SELECT * FROM resources").unwrap(), Command::SelectResources);
        assert_eq!(parse_sql("select id, name from clients").unwrap(), Command::SelectClients);
    }

    #[test]
    fn parse_unknown_table() {
        assert!(matches!(
            parse_sql("SELECT * FROM availability"),
            Err(SqlError::UnknownTable(t)) if t == "availability"
        ));
        assert!(matches!(
            parse_sql(&format!("DELETE FROM holds WHERE id = '{A}'")),
            Err(SqlError::UnknownTable(_))
        ));
    }

    #[test]
    fn parse_rejects_garbage_and_multi_statement() {
        assert!(matches!(parse_sql("NOT SQL AT ALL"), Err(SqlError::Parse(_))));
        assert!(matches!(parse_sql(""), Err(SqlError::Empty)));
        assert!(matches!(
            parse_sql("SELECT * FROM clients; SELECT * FROM resources"),
            Err(SqlError::Unsupported(_))
        ));
        assert!(matches!(parse_sql("DROP TABLE bookings"), Err(SqlError::Unsupported(_))));
    }

    #[test]
    fn parse_bad_ulid() {
        assert!(matches!(
            parse_sql("DELETE FROM bookings WHERE id = 'not-a-ulid'"),
            Err(SqlError::Parse(_))
        ));
    }

    #[test]
    fn filter_matches_window_by_overlap() {
        let booking = Booking {
            id: Ulid::new(),
            resource_id: ulid(A),
            client_id: ulid(B),
            interval: Interval::new(100, 200).unwrap(),
            status: BookingStatus::Confirmed,
            cancellation_reason: None,
            notes: None,
        };
        let window = |start, end| BookingFilter { start: Some(start), end: Some(end), ..Default::default() };
        assert!(window(150, 300).matches(&booking));
        assert!(!window(200, 300).matches(&booking));
        assert!(!window(0, 100).matches(&booking));
        // Straddling either edge still counts as inside the window.
        assert!(window(150, 160).matches(&booking));
        assert!(window(50, 120).matches(&booking));
        let from_only = BookingFilter { start: Some(199), ..Default::default() };
        assert!(from_only.matches(&booking));
        let wrong_status = BookingFilter { status: Some(BookingStatus::Cancelled), ..Default::default() };
        assert!(!wrong_status.matches(&booking));
    }
}
