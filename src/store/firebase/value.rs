//! Firestore REST typed values.
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Map, Value};

/// A document as returned by the Firestore REST API.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub name: String,
    #[serde(default)]
    pub fields: Map<String, Value>,
    #[serde(default)]
    pub create_time: Option<DateTime<Utc>>,
}

impl Document {
    /// Last path segment of the resource name.
    pub fn id(&self) -> &str {
        self.name.rsplit('/').next().unwrap_or(&self.name)
    }

    pub fn string(&self, key: &str) -> Option<String> {
        self.fields.get(key).and_then(as_string)
    }

    pub fn timestamp(&self, key: &str) -> Option<DateTime<Utc>> {
        self.fields.get(key).and_then(as_timestamp)
    }
}

/// One element of a `:runQuery` response stream.
#[derive(Debug, Deserialize)]
pub struct QueryResult {
    #[serde(default)]
    pub document: Option<Document>,
}

pub fn string(s: &str) -> Value {
    json!({ "stringValue": s })
}

pub fn null() -> Value {
    json!({ "nullValue": null })
}

pub fn optional_string(s: Option<&str>) -> Value {
    match s {
        Some(s) => string(s),
        None => null(),
    }
}

/// Decode a value to text. Numbers and booleans are rendered; null and
/// compound values are absent.
pub fn as_string(v: &Value) -> Option<String> {
    let obj = v.as_object()?;
    if let Some(s) = obj.get("stringValue").and_then(Value::as_str) {
        return Some(s.to_string());
    }
    if let Some(i) = obj.get("integerValue") {
        return Some(match i {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        });
    }
    if let Some(d) = obj.get("doubleValue").and_then(Value::as_f64) {
        return Some(d.to_string());
    }
    if let Some(b) = obj.get("booleanValue").and_then(Value::as_bool) {
        return Some(b.to_string());
    }
    None
}

pub fn as_timestamp(v: &Value) -> Option<DateTime<Utc>> {
    let raw = v.as_object()?.get("timestampValue")?.as_str()?;
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_scalar_kinds() {
        assert_eq!(as_string(&string("olá")).as_deref(), Some("olá"));
        assert_eq!(as_string(&json!({"integerValue": "5582"})).as_deref(), Some("5582"));
        assert_eq!(as_string(&json!({"booleanValue": true})).as_deref(), Some("true"));
        assert_eq!(as_string(&null()), None);
        assert_eq!(as_string(&json!({"mapValue": {}})), None);
        assert_eq!(optional_string(None), null());
    }

    #[test]
    fn document_id_and_timestamp() {
        let doc: Document = serde_json::from_value(json!({
            "name": "projects/p/databases/(default)/documents/portfolio/abc123",
            "fields": {
                "title": {"stringValue": "Ensaio"},
                "createdAt": {"timestampValue": "2024-03-02T12:00:00.250Z"}
            },
            "createTime": "2024-03-02T12:00:00.300Z"
        }))
        .unwrap();
        assert_eq!(doc.id(), "abc123");
        assert_eq!(doc.string("title").as_deref(), Some("Ensaio"));
        assert!(doc.timestamp("createdAt").unwrap() < doc.create_time.unwrap());
        assert_eq!(doc.string("missing"), None);
    }
}
