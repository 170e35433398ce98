use chrono::Local;
use serde::Serialize;

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One point destined for the store.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    pub id: u64,
    pub vector: Vec<f32>,
    pub payload: Payload,
}

/// Deprecation flag with its timestamp. `deprecated_at` is set iff `deprecated` is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Deprecation {
    deprecated: bool,
    deprecated_at: Option<String>,
}

impl Deprecation {
    pub const fn active() -> Self {
        Self {
            deprecated: false,
            deprecated_at: None,
        }
    }

    pub fn flagged_now() -> Self {
        Self::flagged_at(Local::now().format(TIMESTAMP_FORMAT).to_string())
    }

    pub const fn flagged_at(timestamp: String) -> Self {
        Self {
            deprecated: true,
            deprecated_at: Some(timestamp),
        }
    }

    pub fn from_flag(deprecated: bool) -> Self {
        if deprecated {
            Self::flagged_now()
        } else {
            Self::active()
        }
    }

    pub const fn is_deprecated(&self) -> bool {
        self.deprecated
    }

    pub fn deprecated_at(&self) -> Option<&str> {
        self.deprecated_at.as_deref()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyntheticPayload {
    #[serde(flatten)]
    pub deprecation: Deprecation,
    pub text: String,
    pub category: String,
    pub value: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TextPayload {
    #[serde(flatten)]
    pub deprecation: Deprecation,
    pub text: String,
    pub category: String,
    pub value: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileSourcedPayload {
    #[serde(flatten)]
    pub deprecation: Deprecation,
    pub text: String,
}

/// Metadata attached to a record, one variant per record source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Payload {
    Synthetic(SyntheticPayload),
    Text(TextPayload),
    FileSourced(FileSourcedPayload),
}

impl Payload {
    pub const fn deprecation(&self) -> &Deprecation {
        match self {
            Self::Synthetic(p) => &p.deprecation,
            Self::Text(p) => &p.deprecation,
            Self::FileSourced(p) => &p.deprecation,
        }
    }

    pub fn text(&self) -> &str {
        match self {
            Self::Synthetic(p) => &p.text,
            Self::Text(p) => &p.text,
            Self::FileSourced(p) => &p.text,
        }
    }

    pub fn category(&self) -> Option<&str> {
        match self {
            Self::Synthetic(p) => Some(&p.category),
            Self::Text(p) => Some(&p.category),
            Self::FileSourced(_) => None,
        }
    }

    pub const fn value(&self) -> Option<i64> {
        match self {
            Self::Synthetic(p) => Some(p.value),
            Self::Text(p) => Some(p.value),
            Self::FileSourced(_) => None,
        }
    }

    /// Replaces the deprecation state; text, category and value are untouched.
    pub fn set_deprecation(&mut self, deprecation: Deprecation) {
        match self {
            Self::Synthetic(p) => p.deprecation = deprecation,
            Self::Text(p) => p.deprecation = deprecation,
            Self::FileSourced(p) => p.deprecation = deprecation,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn synthetic_payload_serializes_flat() {
        let payload = Payload::Synthetic(SyntheticPayload {
            deprecation: Deprecation::flagged_at("2024-01-02 03:04:05".to_string()),
            text: "Sample text 7".to_string(),
            category: "B".to_string(),
            value: 42,
        });
        assert_eq!(
            payload.to_json().unwrap(),
            json!({
                "deprecated": true,
                "deprecated_at": "2024-01-02 03:04:05",
                "text": "Sample text 7",
                "category": "B",
                "value": 42
            })
        );
    }

    #[test]
    fn file_payload_has_no_category_or_value() {
        let payload = Payload::FileSourced(FileSourcedPayload {
            deprecation: Deprecation::active(),
            text: "hello".to_string(),
        });
        let json = payload.to_json().unwrap();
        assert_eq!(json["deprecated"], json!(false));
        assert_eq!(json["deprecated_at"], serde_json::Value::Null);
        assert!(json.get("category").is_none());
        assert!(json.get("value").is_none());
        assert_eq!(payload.category(), None);
        assert_eq!(payload.value(), None);
    }

    #[test]
    fn set_deprecation_keeps_other_fields() {
        let mut payload = Payload::Text(TextPayload {
            deprecation: Deprecation::active(),
            text: "kept".to_string(),
            category: "science".to_string(),
            value: 5,
        });
        payload.set_deprecation(Deprecation::flagged_at("2024-02-03 04:05:06".to_string()));
        assert!(payload.deprecation().is_deprecated());
        assert_eq!(payload.deprecation().deprecated_at(), Some("2024-02-03 04:05:06"));
        assert_eq!(payload.text(), "kept");
        assert_eq!(payload.value(), Some(5));
    }

    #[test]
    fn flag_sets_timestamp_only_when_deprecated() {
        let flagged = Deprecation::from_flag(true);
        assert!(flagged.is_deprecated());
        let at = flagged.deprecated_at().unwrap();
        assert!(chrono::NaiveDateTime::parse_from_str(at, TIMESTAMP_FORMAT).is_ok());

        let active = Deprecation::from_flag(false);
        assert!(!active.is_deprecated());
        assert_eq!(active.deprecated_at(), None);
    }
}
