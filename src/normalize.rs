//! Field-probe extraction over raw upstream records.
//!
//! The upstream never settled on one schema, so every extractor walks an
//! ordered table of field names and takes the first usable value. New field
//! names go into the tables below; callers never change.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::arabic::{bare_length, strip_diacritics};

const HEADWORD_FIELDS: &[&str] = &[
    "lemma",
    "form",
    "headword",
    "word",
    "display",
    "text",
    "title",
    "entryHead",
];
const NESTED_FORM_FIELD: &str = "form";
const NESTED_FORM_TEXT_FIELDS: &[&str] = &["text", "value", "form"];

const ENTRY_ID_FIELDS: &[&str] = &["id", "entryId", "lexicalEntryId", "uuid", "uid", "eid"];
const META_CONTAINERS: &[&str] = &["meta", "metadata"];
const META_ID_FIELDS: &[&str] = &["id", "entryId", "lexicalEntryId"];

const DIRECT_DEFINITION_FIELDS: &[&str] = &["definition_ar", "gloss_ar", "definition", "gloss"];
const TEXT_FIELDS: &[&str] = &["text", "value"];
const REPRESENTATION_FIELDS: &[&str] = &[
    "representations",
    "definitionRepresentations",
    "senseDefinitionRepresentations",
    "statementRepresentations",
    "definitions",
    "definitionList",
];
const ARABIC_TAGS: &[&str] = &["ar", "ara", "ar-SA", "ar_SA", "AR"];
const LANG_FIELD: &str = "lang";
/// Wrappers a single-record senses payload may use around its real list.
const SENSE_LIST_WRAPPERS: &[&str] = &["items", "senses", "content"];

/// One way of pulling definition text out of a sense record.
#[derive(Debug, Clone, Copy)]
enum DefinitionProbe {
    /// A nested list of plain strings.
    StringList(&'static str),
    /// The first non-blank string among these fields.
    FirstString(&'static [&'static str]),
    /// A record-valued field carrying its text in one of `text_fields`.
    NestedText {
        field: &'static str,
        text_fields: &'static [&'static str],
    },
    /// Language-tagged arrays; Arabic elements are taken before the rest.
    Representations(&'static [&'static str]),
}

const RECORD_PROBES: &[DefinitionProbe] = &[
    DefinitionProbe::StringList("senses"),
    DefinitionProbe::FirstString(DIRECT_DEFINITION_FIELDS),
    DefinitionProbe::NestedText {
        field: "definition",
        text_fields: TEXT_FIELDS,
    },
    DefinitionProbe::Representations(REPRESENTATION_FIELDS),
];

/// A headword after normalization, with whatever provenance the entry carried.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedWord {
    pub word: String,
    pub bare: String,
    pub length: usize,
    pub entry_id: Option<String>,
    pub lexicon_id: Option<String>,
    #[serde(default)]
    pub senses: Vec<String>,
}

impl NormalizedWord {
    /// Builds a word from a raw search entry; `None` when no headword is present.
    pub fn from_entry(entry: &Value) -> Option<Self> {
        let word = extract_headword(entry);
        if word.is_empty() {
            return None;
        }
        let mut normalized = Self::from_word(word);
        normalized.entry_id = extract_entry_id(entry);
        Some(normalized)
    }

    pub fn from_word(word: impl Into<String>) -> Self {
        let word = word.into();
        let bare = strip_diacritics(&word);
        let length = bare_length(&bare);
        Self {
            word,
            bare,
            length,
            entry_id: None,
            lexicon_id: None,
            senses: Vec::new(),
        }
    }

    pub fn definition(&self) -> Option<&str> {
        self.senses.first().map(String::as_str)
    }
}

/// Headword, bare form and entry id of a raw search entry.
pub fn normalize_entry(entry: &Value) -> Option<NormalizedWord> {
    NormalizedWord::from_entry(entry)
}

pub fn extract_headword(entry: &Value) -> String {
    let Some(record) = entry.as_object() else {
        return String::new();
    };
    first_string(record, HEADWORD_FIELDS)
        .or_else(|| {
            record
                .get(NESTED_FORM_FIELD)
                .and_then(Value::as_object)
                .and_then(|form| first_string(form, NESTED_FORM_TEXT_FIELDS))
        })
        .unwrap_or_default()
}

pub fn extract_entry_id(entry: &Value) -> Option<String> {
    let record = entry.as_object()?;
    first_identifier(record, ENTRY_ID_FIELDS).or_else(|| {
        META_CONTAINERS
            .iter()
            .filter_map(|key| record.get(*key).and_then(Value::as_object))
            .find_map(|meta| first_identifier(meta, META_ID_FIELDS))
    })
}

/// First definition found anywhere in a senses payload.
pub fn extract_definition(payload: &Value) -> Option<String> {
    extract_definitions(payload).into_iter().next()
}

/// Every definition found in a senses payload, in discovery order, without repeats.
pub fn extract_definitions(payload: &Value) -> Vec<String> {
    let mut out = Vec::new();
    collect_payload(payload, &mut out);
    let mut seen = std::collections::HashSet::new();
    out.retain(|text| seen.insert(text.clone()));
    out
}

fn collect_payload(payload: &Value, out: &mut Vec<String>) {
    match payload {
        Value::Array(items) => match items.first() {
            Some(Value::String(_)) => out.extend(items.iter().filter_map(non_blank)),
            Some(_) => {
                for record in items.iter().filter_map(Value::as_object) {
                    collect_record(record, out);
                }
            }
            None => {}
        },
        Value::Object(record) => {
            let wrapped = SENSE_LIST_WRAPPERS
                .iter()
                .filter_map(|key| record.get(*key))
                .find(|value| value.as_array().is_some_and(|list| !list.is_empty()));
            match wrapped {
                Some(list) if is_record_list(list) => collect_payload(list, out),
                Some(list) => {
                    collect_payload(list, out);
                    collect_record(record, out);
                }
                None => collect_record(record, out),
            }
        }
        _ => {}
    }
}

fn collect_record(record: &Map<String, Value>, out: &mut Vec<String>) {
    for probe in RECORD_PROBES {
        match *probe {
            DefinitionProbe::StringList(field) => {
                if let Some(list) = record.get(field).and_then(Value::as_array) {
                    out.extend(list.iter().filter_map(non_blank));
                }
            }
            DefinitionProbe::FirstString(fields) => {
                if let Some(text) = first_string(record, fields) {
                    out.push(text);
                }
            }
            DefinitionProbe::NestedText { field, text_fields } => {
                if let Some(text) = record
                    .get(field)
                    .and_then(Value::as_object)
                    .and_then(|nested| first_string(nested, text_fields))
                {
                    out.push(text);
                }
            }
            DefinitionProbe::Representations(fields) => {
                for list in fields
                    .iter()
                    .filter_map(|key| record.get(*key).and_then(Value::as_array))
                {
                    collect_representations(list, out);
                }
            }
        }
    }
}

fn collect_representations(list: &[Value], out: &mut Vec<String>) {
    let arabic = list.iter().filter(|item| {
        item.get(LANG_FIELD)
            .and_then(Value::as_str)
            .is_some_and(|lang| ARABIC_TAGS.contains(&lang))
    });
    out.extend(arabic.filter_map(representation_text));
    out.extend(list.iter().filter_map(representation_text));
}

fn is_record_list(value: &Value) -> bool {
    value
        .as_array()
        .is_some_and(|list| list.iter().any(Value::is_object))
}

fn representation_text(item: &Value) -> Option<String> {
    match item {
        Value::Object(record) => first_string(record, TEXT_FIELDS),
        other => non_blank(other),
    }
}

fn first_string(record: &Map<String, Value>, fields: &[&str]) -> Option<String> {
    fields
        .iter()
        .find_map(|key| record.get(*key).and_then(non_blank))
}

fn first_identifier(record: &Map<String, Value>, fields: &[&str]) -> Option<String> {
    fields.iter().find_map(|key| match record.get(*key)? {
        Value::Number(number) => Some(number.to_string()),
        other => non_blank(other),
    })
}

fn non_blank(value: &Value) -> Option<String> {
    value
        .as_str()
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn headword_prefers_top_level_fields() {
        assert_eq!(extract_headword(&json!({"lemma": "كتاب"})), "كتاب");
        assert_eq!(
            extract_headword(&json!({"title": "عنوان", "word": " قلم "})),
            "قلم"
        );
    }

    #[test]
    fn headword_falls_back_to_nested_form() {
        assert_eq!(extract_headword(&json!({"form": {"text": "قلم"}})), "قلم");
        assert_eq!(extract_headword(&json!({"form": {"value": "بيت"}})), "بيت");
    }

    #[test]
    fn headword_missing_is_empty() {
        assert_eq!(extract_headword(&json!({})), "");
        assert_eq!(extract_headword(&json!({"lemma": "   "})), "");
        assert_eq!(extract_headword(&json!(["كتاب"])), "");
    }

    #[test]
    fn entry_id_accepts_numbers_and_meta() {
        assert_eq!(extract_entry_id(&json!({"id": 42})), Some("42".to_string()));
        assert_eq!(
            extract_entry_id(&json!({"entryId": "e-1", "uuid": "u"})),
            Some("e-1".to_string())
        );
        assert_eq!(
            extract_entry_id(&json!({"metadata": {"lexicalEntryId": "x9"}})),
            Some("x9".to_string())
        );
        assert_eq!(extract_entry_id(&json!({"id": ""})), None);
        assert_eq!(extract_entry_id(&json!({"lemma": "كتاب"})), None);
    }

    #[test]
    fn definition_from_plain_strings() {
        assert_eq!(extract_definition(&json!(["hello"])), Some("hello".into()));
        assert_eq!(
            extract_definitions(&json!(["  ", "a", "b"])),
            vec!["a".to_string(), "b".to_string()]
        );
    }

    #[test]
    fn definition_from_nested_senses() {
        assert_eq!(
            extract_definition(&json!([{"senses": ["a", "b"]}])),
            Some("a".into())
        );
    }

    #[test]
    fn definition_prefers_arabic_representation() {
        let payload = json!([{"representations": [
            {"lang": "en", "text": "x"},
            {"lang": "ar", "text": "y"}
        ]}]);
        assert_eq!(extract_definition(&payload), Some("y".into()));
        assert_eq!(extract_definitions(&payload), vec!["y".to_string(), "x".to_string()]);
    }

    #[test]
    fn definition_empty_payloads() {
        assert_eq!(extract_definition(&json!([])), None);
        assert_eq!(extract_definition(&json!([{}])), None);
        assert_eq!(extract_definition(&json!({})), None);
        assert_eq!(extract_definition(&json!(null)), None);
    }

    #[test]
    fn definition_from_record_valued_field() {
        let payload = json!([{"definition": {"value": "تعريف"}}]);
        assert_eq!(extract_definition(&payload), Some("تعريف".into()));
    }

    #[test]
    fn direct_fields_prefer_arabic_suffix() {
        let payload = json!({"gloss": "en gloss", "definition_ar": "شرح"});
        assert_eq!(extract_definition(&payload), Some("شرح".into()));
    }

    #[test]
    fn single_record_wrapping_a_list_is_unwrapped() {
        let payload = json!({"items": [{"gloss": "g1"}, {"gloss": "g2"}], "total": 2});
        assert_eq!(
            extract_definitions(&payload),
            vec!["g1".to_string(), "g2".to_string()]
        );
    }

    #[test]
    fn single_record_wrapping_strings_is_unwrapped() {
        assert_eq!(
            extract_definition(&json!({"items": ["تعريف"]})),
            Some("تعريف".into())
        );
        assert_eq!(
            extract_definition(&json!({"senses": [], "items": ["تعريف"]})),
            Some("تعريف".into())
        );
        assert_eq!(
            extract_definitions(&json!({"senses": ["بستان"], "gloss_ar": "حديقة"})),
            vec!["بستان".to_string(), "حديقة".to_string()]
        );
    }

    #[test]
    fn definition_list_with_untagged_strings() {
        let payload = json!([{"definitionList": ["أول", "ثان"]}]);
        assert_eq!(extract_definition(&payload), Some("أول".into()));
    }

    #[test]
    fn normalized_word_computes_bare_form() {
        let word = NormalizedWord::from_entry(&json!({"lemma": "مَدْرَسَة", "id": 7})).unwrap();
        assert_eq!(word.bare, "مدرسة");
        assert_eq!(word.length, 5);
        assert_eq!(word.entry_id.as_deref(), Some("7"));
        assert!(NormalizedWord::from_entry(&json!({"id": 7})).is_none());
    }
}
