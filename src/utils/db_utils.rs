use serde_json::Value;
use sqlx::MySqlPool;

use crate::error::ApiError;

/// SQL bindable value
#[derive(Debug, PartialEq)]
pub enum SqlValue {
    String(String),
    I64(i64),
    F64(f64),
    Bool(bool),
    Null,
}

/// SQL update container
#[derive(Debug)]
pub struct SqlUpdate {
    pub sql: String,
    pub values: Vec<SqlValue>,
}

/// Build a partial `UPDATE` from a JSON object. Keys outside `allowed`
/// are rejected so a payload can never name an arbitrary column.
pub fn build_update_sql(
    table: &str,
    payload: &Value,
    allowed: &[&str],
    id_column: &str,
    id_value: u64,
) -> Result<SqlUpdate, ApiError> {
    let obj = payload
        .as_object()
        .ok_or_else(|| ApiError::bad_request("Payload must be a JSON object"))?;

    if obj.is_empty() {
        return Err(ApiError::bad_request("No fields provided for update"));
    }

    if let Some(unknown) = obj.keys().find(|k| !allowed.contains(&k.as_str())) {
        return Err(ApiError::bad_request(format!("Field '{unknown}' cannot be updated")));
    }

    let set_clause = obj
        .keys()
        .map(|k| format!("{} = ?", k))
        .collect::<Vec<_>>()
        .join(", ");

    let sql = format!("UPDATE {} SET {} WHERE {} = ?", table, set_clause, id_column);

    let mut values = Vec::with_capacity(obj.len() + 1);

    for value in obj.values() {
        match value {
            Value::String(s) => values.push(SqlValue::String(s.trim().to_string())),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    values.push(SqlValue::I64(i));
                } else if let Some(f) = n.as_f64() {
                    values.push(SqlValue::F64(f));
                }
            }
            Value::Bool(b) => values.push(SqlValue::Bool(*b)),
            Value::Null => values.push(SqlValue::Null),
            _ => return Err(ApiError::bad_request("Unsupported JSON value type")),
        }
    }

    values.push(SqlValue::I64(id_value as i64));

    Ok(SqlUpdate { sql, values })
}

pub async fn execute_update(pool: &MySqlPool, update: SqlUpdate) -> Result<u64, sqlx::Error> {
    let mut query = sqlx::query(&update.sql);

    for value in update.values {
        query = match value {
            SqlValue::String(v) => query.bind(v),
            SqlValue::I64(v) => query.bind(v),
            SqlValue::F64(v) => query.bind(v),
            SqlValue::Bool(v) => query.bind(v),
            SqlValue::Null => query.bind(None::<String>),
        };
    }

    let result = query.execute(pool).await?;
    Ok(result.rows_affected())
}

/// Page number, page size and row offset for a list query. The offset is
/// widened so a huge page number cannot overflow.
pub fn page_window(page: Option<u32>, per_page: Option<u32>, max_per_page: u32) -> (u32, u32, u64) {
    let page = page.unwrap_or(1).max(1);
    let per_page = per_page.unwrap_or(20).clamp(1, max_per_page);
    let offset = u64::from(page - 1) * u64::from(per_page);
    (page, per_page, offset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const ALLOWED: &[&str] = &["name", "mobile", "status"];

    #[test]
    fn builds_set_clause_in_key_order() {
        let update = build_update_sql(
            "cleaners",
            &json!({"name": " Maria Silva ", "status": "inactive"}),
            ALLOWED,
            "id",
            7,
        )
        .unwrap();

        assert_eq!(update.sql, "UPDATE cleaners SET name = ?, status = ? WHERE id = ?");
        assert_eq!(
            update.values,
            vec![
                SqlValue::String("Maria Silva".to_string()),
                SqlValue::String("inactive".to_string()),
                SqlValue::I64(7)
            ]
        );
    }

    #[test]
    fn rejects_unknown_columns_and_empty_payloads() {
        let err = build_update_sql("cleaners", &json!({"id = 1; --": 1}), ALLOWED, "id", 1);
        assert!(matches!(err, Err(ApiError::BadRequest(_))));

        assert!(build_update_sql("cleaners", &json!({}), ALLOWED, "id", 1).is_err());
        assert!(build_update_sql("cleaners", &json!([1, 2]), ALLOWED, "id", 1).is_err());
        assert!(build_update_sql("cleaners", &json!({"name": ["x"]}), ALLOWED, "id", 1).is_err());
    }

    #[test]
    fn page_window_clamps_and_widens() {
        assert_eq!(page_window(None, None, 50), (1, 20, 0));
        assert_eq!(page_window(Some(0), Some(0), 50), (1, 1, 0));
        assert_eq!(page_window(Some(3), Some(500), 50), (3, 50, 100));
        assert_eq!(
            page_window(Some(100_000_000), Some(50), 50),
            (100_000_000, 50, 4_999_999_950)
        );
        let (_, _, offset) = page_window(Some(u32::MAX), Some(u32::MAX), 100);
        assert_eq!(offset, u64::from(u32::MAX - 1) * 100);
    }
}
