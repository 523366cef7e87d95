use serde_json::Value as JsonValue;
use sqlx::sqlite::{SqliteRow, SqliteValueRef};
use sqlx::{Column, Row as _, TypeInfo, Value, ValueRef};
use time::PrimitiveDateTime;

use crate::Error;
use crate::connection::Row;

/// Decode every column of a SQLite row into an ordered JSON map.
pub fn decode_row(row: &SqliteRow) -> Result<Row, Error> {
   let mut decoded = Row::with_capacity(row.columns().len());
   for (i, column) in row.columns().iter().enumerate() {
      let value = to_json(row.try_get_raw(i)?)?;
      decoded.insert(column.name().to_string(), value);
   }
   Ok(decoded)
}

/// Convert a SQLite value to a JSON value.
///
/// BLOB values become base64 strings since JSON has no binary type. Values
/// that fail to decode as their declared type become `null`.
pub fn to_json(value: SqliteValueRef) -> Result<JsonValue, Error> {
   if value.is_null() {
      return Ok(JsonValue::Null);
   }

   let owned = value.to_owned();
   let type_name = value.type_info().name().to_string();

   let result = match type_name.as_str() {
      // SQLite stores DATE and TIME as TEXT
      "TEXT" | "DATE" | "TIME" => owned
         .try_decode::<String>()
         .map(JsonValue::String)
         .unwrap_or(JsonValue::Null),

      "REAL" => owned
         .try_decode::<f64>()
         .map(JsonValue::from)
         .unwrap_or(JsonValue::Null),

      "INTEGER" | "NUMERIC" => owned
         .try_decode::<i64>()
         .map(JsonValue::from)
         .unwrap_or(JsonValue::Null),

      "BOOLEAN" => owned
         .try_decode::<bool>()
         .map(JsonValue::Bool)
         .unwrap_or(JsonValue::Null),

      "DATETIME" => match owned.try_decode::<PrimitiveDateTime>() {
         Ok(dt) => JsonValue::String(dt.to_string()),
         Err(_) => owned
            .try_decode::<String>()
            .map(JsonValue::String)
            .unwrap_or(JsonValue::Null),
      },

      "BLOB" => owned
         .try_decode::<Vec<u8>>()
         .map(|blob| JsonValue::String(base64_encode(&blob)))
         .unwrap_or(JsonValue::Null),

      "NULL" => JsonValue::Null,

      other => match owned.try_decode::<String>() {
         Ok(text) => JsonValue::String(text),
         Err(_) => {
            return Err(Error::UnsupportedDatatype(format!(
               "Unknown SQLite type: {}",
               other
            )));
         }
      },
   };

   Ok(result)
}

fn base64_encode(data: &[u8]) -> String {
   use base64::Engine;
   base64::engine::general_purpose::STANDARD.encode(data)
}

#[cfg(test)]
mod tests {
   use super::*;

   #[test]
   fn test_base64_encode() {
      assert_eq!(base64_encode(b"hello"), "aGVsbG8=");
      assert_eq!(base64_encode(&[0, 0, 0]), "AAAA");
      assert_eq!(base64_encode(&[]), "");
   }

   #[tokio::test]
   async fn test_decode_row_keeps_column_order_and_types() {
      use sqlx::Connection;

      let mut conn = sqlx::SqliteConnection::connect("sqlite::memory:").await.unwrap();
      let row = sqlx::query("SELECT 1 AS i, 2.5 AS r, 'text' AS t, NULL AS n, x'68656c6c6f' AS b")
         .fetch_one(&mut conn)
         .await
         .unwrap();

      let decoded = decode_row(&row).unwrap();
      assert_eq!(
         decoded.keys().map(String::as_str).collect::<Vec<_>>(),
         vec!["i", "r", "t", "n", "b"]
      );
      assert_eq!(decoded["i"], 1);
      assert_eq!(decoded["r"], 2.5);
      assert_eq!(decoded["t"], "text");
      assert_eq!(decoded["n"], JsonValue::Null);
      assert_eq!(decoded["b"], "aGVsbG8=");
   }
}
