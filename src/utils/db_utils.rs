use rust_decimal::Decimal;
use serde_json::Value;
use sqlx::MySqlPool;
use std::str::FromStr;

use crate::error::{AppError, AppResult};

/// How a JSON field is bound when it lands in SQL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Text,
    /// Text that may be cleared with `null`.
    OptionalText,
    Decimal,
    /// Text restricted to a fixed set of names.
    OneOf(&'static [&'static str]),
}

/// SQL bindable value
#[derive(Debug, PartialEq)]
pub enum SqlValue {
    String(String),
    U64(u64),
    Decimal(Decimal),
    Null,
}

#[derive(Debug)]
pub struct SqlUpdate {
    pub sql: String,
    pub values: Vec<SqlValue>,
}

fn convert(column: &str, kind: ColumnKind, value: &Value) -> AppResult<SqlValue> {
    let bad = || AppError::Validation(format!("Invalid value for field '{column}'"));

    Ok(match (kind, value) {
        (ColumnKind::OptionalText, Value::Null) => SqlValue::Null,
        (ColumnKind::Text | ColumnKind::OptionalText, Value::String(s)) => {
            let s = s.trim();
            if s.is_empty() && kind == ColumnKind::Text {
                return Err(bad());
            }
            SqlValue::String(s.to_string())
        }
        (ColumnKind::Decimal, Value::String(_) | Value::Number(_)) => {
            let raw = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            let amount = Decimal::from_str(&raw).map_err(|_| bad())?;
            if amount.is_sign_negative() {
                return Err(bad());
            }
            SqlValue::Decimal(amount)
        }
        (ColumnKind::OneOf(names), Value::String(s)) if names.contains(&s.as_str()) => {
            SqlValue::String(s.clone())
        }
        _ => return Err(bad()),
    })
}

/// Build a dynamic `UPDATE` from a JSON object.
///
/// Only keys present in `allowed` are accepted; anything else is a validation
/// error so column names never come from the client unchecked.
pub fn build_update_sql(
    table: &str,
    payload: &Value,
    allowed: &[(&str, ColumnKind)],
    id_column: &str,
    id_value: u64,
) -> AppResult<SqlUpdate> {
    let obj = payload
        .as_object()
        .ok_or_else(|| AppError::Validation("Payload must be a JSON object".into()))?;

    if obj.is_empty() {
        return Err(AppError::Validation("No fields provided for update".into()));
    }

    let mut columns = Vec::with_capacity(obj.len());
    let mut values = Vec::with_capacity(obj.len() + 1);

    for (key, value) in obj {
        let (column, kind) = allowed
            .iter()
            .find(|(name, _)| *name == key.as_str())
            .ok_or_else(|| AppError::Validation(format!("Field '{key}' cannot be updated")))?;

        columns.push(format!("{column} = ?"));
        values.push(convert(column, *kind, value)?);
    }

    let sql = format!(
        "UPDATE {} SET {} WHERE {} = ?",
        table,
        columns.join(", "),
        id_column
    );

    values.push(SqlValue::U64(id_value));

    Ok(SqlUpdate { sql, values })
}

pub async fn execute_update(pool: &MySqlPool, update: SqlUpdate) -> Result<u64, sqlx::Error> {
    let mut query = sqlx::query(&update.sql);

    for value in update.values {
        query = match value {
            SqlValue::String(v) => query.bind(v),
            SqlValue::U64(v) => query.bind(v),
            SqlValue::Decimal(v) => query.bind(v),
            SqlValue::Null => query.bind(None::<String>),
        };
    }

    let result = query.execute(pool).await?;
    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    const COLUMNS: &[(&str, ColumnKind)] = &[
        ("full_name", ColumnKind::Text),
        ("bank_details", ColumnKind::OptionalText),
        ("rate", ColumnKind::Decimal),
        ("contract_type", ColumnKind::OneOf(&["FIXED", "DAILY", "FEE"])),
    ];

    #[test]
    fn test_builds_update_for_allowed_fields() {
        let update = build_update_sql(
            "employees",
            &json!({"full_name": " Moussa Diop ", "rate": 350000}),
            COLUMNS,
            "id",
            7,
        )
        .unwrap();

        assert!(update.sql.starts_with("UPDATE employees SET "));
        assert!(update.sql.ends_with(" WHERE id = ?"));
        assert!(update.sql.contains("full_name = ?"));
        assert!(update.sql.contains("rate = ?"));
        assert!(update.values.contains(&SqlValue::String("Moussa Diop".into())));
        assert!(update.values.contains(&SqlValue::Decimal(dec!(350000))));
        assert_eq!(update.values.last(), Some(&SqlValue::U64(7)));
    }

    #[test]
    fn test_unknown_column_rejected() {
        let result = build_update_sql(
            "employees",
            &json!({"enterprise_id": 2}),
            COLUMNS,
            "id",
            7,
        );
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[test]
    fn test_wrong_type_rejected() {
        let result = build_update_sql("employees", &json!({"rate": "a lot"}), COLUMNS, "id", 7);
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[test]
    fn test_null_and_negative_values() {
        assert!(build_update_sql("employees", &json!({"full_name": null}), COLUMNS, "id", 1).is_err());
        assert!(build_update_sql("employees", &json!({"full_name": "  "}), COLUMNS, "id", 1).is_err());
        assert!(build_update_sql("employees", &json!({"rate": -1}), COLUMNS, "id", 1).is_err());

        let cleared =
            build_update_sql("employees", &json!({"bank_details": null}), COLUMNS, "id", 1).unwrap();
        assert_eq!(cleared.values[0], SqlValue::Null);
    }

    #[test]
    fn test_one_of_checks_names() {
        assert!(
            build_update_sql("employees", &json!({"contract_type": "DAILY"}), COLUMNS, "id", 1)
                .is_ok()
        );
        assert!(
            build_update_sql("employees", &json!({"contract_type": "HOURLY"}), COLUMNS, "id", 1)
                .is_err()
        );
    }

    #[test]
    fn test_empty_payload_rejected() {
        assert!(build_update_sql("employees", &json!({}), COLUMNS, "id", 1).is_err());
        assert!(build_update_sql("employees", &json!([1]), COLUMNS, "id", 1).is_err());
    }
}
