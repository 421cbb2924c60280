pub mod health;
pub mod inventory;
pub mod orders;
pub mod relocations;

use std::collections::BTreeSet;

use serde::Serialize;
use serde_json::Value;
use strum::{Display, EnumString};

use crate::errors::ServiceError;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Export format for the audit endpoints.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumString, serde::Deserialize,
    utoipa::ToSchema,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Json,
    Csv,
}

/// Flattens serializable rows into a delimited payload. The header set is
/// the union over all rows so optional columns never shift.
pub(crate) fn build_delimited_payload<T: Serialize>(
    items: &[T],
    delimiter: char,
) -> Result<(String, &'static str), ServiceError> {
    let content_type = match delimiter {
        ',' => "text/csv",
        '\t' => "text/tab-separated-values",
        _ => "text/plain",
    };
    if items.is_empty() {
        return Ok((String::new(), content_type));
    }

    let mut headers = BTreeSet::new();
    let mut values = Vec::with_capacity(items.len());
    for item in items {
        let value = serde_json::to_value(item)
            .map_err(|e| ServiceError::SerializationError(e.to_string()))?;
        if let Value::Object(map) = &value {
            headers.extend(map.keys().cloned());
        }
        values.push(value);
    }

    let headers: Vec<String> = headers.into_iter().collect();
    let mut lines = Vec::with_capacity(values.len() + 1);
    lines.push(headers.join(&delimiter.to_string()));

    for value in values {
        let mut row = Vec::with_capacity(headers.len());
        for header in &headers {
            let field = value.get(header).cloned().unwrap_or(Value::Null);
            row.push(escape_field(&value_to_string(&field), delimiter));
        }
        lines.push(row.join(&delimiter.to_string()));
    }

    Ok((lines.join("\n"), content_type))
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn escape_field(value: &str, delimiter: char) -> String {
    if value.contains(delimiter) || value.contains('"') || value.contains('\n') {
        let escaped = value.replace('"', "\"\"");
        format!("\"{escaped}\"")
    } else {
        value.to_string()
    }
}
