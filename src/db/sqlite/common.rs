use sqlx::{Row, sqlite::SqliteRow};
use uuid::Uuid;

use crate::{
    db::error::{DbError, DbResult},
    models::DeliveryStatRecord,
};

/// Parse a UUID string from the database, returning a DbError on failure
pub fn parse_uuid(s: &str) -> DbResult<Uuid> {
    Uuid::parse_str(s).map_err(|e| DbError::Internal(format!("Invalid UUID in database: {}", e)))
}

/// Columns selected for every delivery stat query, in `stat_from_row` order.
pub const STAT_COLUMNS: &str = "id, operator_id, date, delivery_count, created_at";

pub fn stat_from_row(row: &SqliteRow) -> DbResult<DeliveryStatRecord> {
    Ok(DeliveryStatRecord {
        id: parse_uuid(&row.get::<String, _>("id"))?,
        operator_id: row.get("operator_id"),
        date: row.get("date"),
        delivery_count: row.get("delivery_count"),
        created_at: row.get("created_at"),
    })
}

/// `?, ?, ?` with `n` placeholders, for `IN (...)` clauses.
pub fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholders() {
        assert_eq!(placeholders(1), "?");
        assert_eq!(placeholders(3), "?, ?, ?");
    }

    #[test]
    fn test_parse_uuid_rejects_garbage() {
        assert!(parse_uuid("not-a-uuid").is_err());
        let id = Uuid::new_v4();
        assert_eq!(parse_uuid(&id.to_string()).unwrap(), id);
    }
}
