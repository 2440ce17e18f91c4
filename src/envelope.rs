//! Known response envelopes of the upstream search and listing endpoints.

use serde_json::Value;

const ITEM_FIELDS: &[&str] = &["items", "content"];
const TOTAL_FIELDS: &[&str] = &["total", "count"];
const PAGE_FIELD: &str = "page";
const PAGE_TOTAL_FIELD: &str = "totalElements";

const LEXICON_NAME_FIELDS: &[&str] = &["name", "title", "arName", "displayName"];
const LEXICON_ID_FIELDS: &[&str] = &["id", "lexiconId"];

/// The shapes a listing response has been observed to take, probed in order.
#[derive(Debug, Clone, PartialEq)]
pub enum Envelope {
    /// The payload is the list itself.
    List(Vec<Value>),
    /// A record holding the list under `items` or `content`, maybe with a total.
    Paged { items: Vec<Value>, total: Option<u64> },
    /// A record carrying only a total.
    Counted(u64),
    Unrecognized,
}

impl Envelope {
    pub fn decode(payload: Value) -> Self {
        match payload {
            Value::Array(items) => Envelope::List(items),
            Value::Object(mut record) => {
                let total = TOTAL_FIELDS
                    .iter()
                    .find_map(|key| record.get(*key).and_then(Value::as_u64))
                    .or_else(|| {
                        record
                            .get(PAGE_FIELD)
                            .and_then(|page| page.get(PAGE_TOTAL_FIELD))
                            .and_then(Value::as_u64)
                    });
                let items = ITEM_FIELDS.iter().find_map(|key| {
                    match record.remove(*key) {
                        Some(Value::Array(items)) => Some(items),
                        _ => None,
                    }
                });
                match (items, total) {
                    (Some(items), total) => Envelope::Paged { items, total },
                    (None, Some(total)) => Envelope::Counted(total),
                    (None, None) => Envelope::Unrecognized,
                }
            }
            _ => Envelope::Unrecognized,
        }
    }

    /// Declared total, else the number of returned items, else zero.
    pub fn total(&self) -> u64 {
        match self {
            Envelope::List(items) => items.len() as u64,
            Envelope::Paged {
                total: Some(total), ..
            } => *total,
            Envelope::Paged { items, total: None } => items.len() as u64,
            Envelope::Counted(total) => *total,
            Envelope::Unrecognized => 0,
        }
    }

    pub fn into_items(self) -> Vec<Value> {
        match self {
            Envelope::List(items) | Envelope::Paged { items, .. } => items,
            Envelope::Counted(_) | Envelope::Unrecognized => Vec::new(),
        }
    }
}

/// A lexicon as listed by the upstream catalogue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexiconRecord {
    pub id: String,
    pub name: String,
}

impl LexiconRecord {
    pub fn from_value(value: &Value) -> Option<Self> {
        let record = value.as_object()?;
        let name = LEXICON_NAME_FIELDS
            .iter()
            .find_map(|key| {
                record
                    .get(*key)
                    .and_then(Value::as_str)
                    .filter(|name| !name.trim().is_empty())
            })?;
        let id = LEXICON_ID_FIELDS.iter().find_map(|key| match record.get(*key)? {
            Value::String(id) if !id.trim().is_empty() => Some(id.clone()),
            Value::Number(id) => Some(id.to_string()),
            _ => None,
        })?;
        Some(Self {
            id,
            name: name.to_string(),
        })
    }
}

/// First lexicon whose display name contains `name`.
pub fn find_lexicon(payload: Value, name: &str) -> Option<LexiconRecord> {
    Envelope::decode(payload)
        .into_items()
        .iter()
        .filter_map(LexiconRecord::from_value)
        .find(|lexicon| lexicon.name.contains(name))
}
