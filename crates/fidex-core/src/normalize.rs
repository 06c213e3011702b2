use crate::error::{FieldError, FieldResult};
use crate::model::{JournalEntry, NormalizedRow, RawIssue, COL_ID, COL_STATUS, COL_SUBJECT, COL_TRACKER};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use tracing::{debug, error};

/// Textual repairs applied, in order, when a `{`-prefixed value fails strict
/// JSON decoding. The embedded dialect uses `=>` separators, an alternate
/// `numero` key, and carries one known unescaped-quote literal.
pub const FIELD_REPAIRS: [(&str, &str); 3] = [
    ("=>", ":"),
    ("\"numero\"", "\"valor\""),
    ("19\"LED", "19\\\"LED"),
];

/// Key holding the display value inside decoded structured payloads.
pub const PAYLOAD_VALUE_KEY: &str = "valor";

/// Column label prefixes for calibration history recovered from journals.
/// The year of the prior date completes each label.
pub const CAL_DATE_LABEL: &str = "Data de calibração";
pub const CAL_CERT_LABEL: &str = "Nº SEI Certificado calibração";

/// Field ids whose prior values are recovered from journal entries.
#[derive(Debug, Clone)]
pub struct HistoryFields {
    pub cal_date_field_id: String,
    pub cal_cert_field_id: String,
}

/// Field id to name mapping accumulated across normalized issues.
/// Diagnostic only; never affects row contents.
#[derive(Debug, Clone, Default)]
pub struct FieldRegistry {
    seen: BTreeMap<u64, String>,
}

impl FieldRegistry {
    pub fn record(&mut self, id: u64, name: &str) {
        self.seen.insert(id, name.to_string());
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

fn to_str(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn repair_near_json(raw: &str) -> String {
    let mut repaired = raw.to_string();
    for (from, to) in FIELD_REPAIRS {
        repaired = repaired.replace(from, to);
    }
    repaired
}

/// Decodes a `{`-prefixed custom-field value and extracts its display value.
///
/// Strict JSON is tried first; on failure the known repairs are applied and
/// decoding is retried once. A value that still fails is a hard error
/// carrying the text that failed. An absent `valor` key yields the empty
/// string.
pub fn decode_structured_field(raw: &str) -> FieldResult<String> {
    let payload: Value = match serde_json::from_str(raw) {
        Ok(value) => value,
        Err(_) => {
            let repaired = repair_near_json(raw);
            serde_json::from_str(&repaired).map_err(|_| FieldError::undecodable(repaired))?
        }
    };

    Ok(to_str(payload.get(PAYLOAD_VALUE_KEY)))
}

/// Flattens one raw custom-field value into a cell value.
///
/// Lists become a single `", "`-joined string, `{`-prefixed strings are
/// decoded as embedded objects, nulls are dropped, and every other scalar
/// passes through unchanged.
pub fn normalize_custom_field(raw: &Value) -> FieldResult<Option<Value>> {
    match raw {
        Value::Null => Ok(None),
        Value::Array(_) => Ok(Some(Value::String(flatten_element(raw)?))),
        Value::String(s) if s.starts_with('{') => {
            decode_structured_field(s).map(|text| Some(Value::String(text)))
        }
        other => Ok(Some(other.clone())),
    }
}

fn flatten_element(item: &Value) -> FieldResult<String> {
    match item {
        Value::Array(items) => {
            let mut parts = Vec::with_capacity(items.len());
            for item in items {
                parts.push(flatten_element(item)?);
            }
            Ok(parts.join(", "))
        }
        Value::String(s) if s.starts_with('{') => decode_structured_field(s),
        other => Ok(to_str(Some(other))),
    }
}

/// Scans journal entries for prior calibration values and rebuilds the
/// year-keyed columns they belonged to.
///
/// A qualifying entry must change both tracked fields; the prior date's year
/// keys the recovered pair. Entries touching only one of the fields
/// contribute nothing, and an empty prior date disqualifies that detail.
pub fn recover_history(journals: &[JournalEntry], fields: &HistoryFields) -> NormalizedRow {
    let mut recovered = Map::new();

    for entry in journals {
        let mut date_found = false;
        let mut number_found = false;
        let mut year = String::new();
        let mut date_value = String::new();
        let mut number_value = String::new();

        for detail in &entry.details {
            if detail.name == fields.cal_date_field_id {
                let old_value = detail.old_value.clone().unwrap_or_default();
                if old_value.is_empty() {
                    continue;
                }
                year = old_value.split('-').next().unwrap_or_default().to_string();
                date_value = old_value;
                date_found = true;
            } else if detail.name == fields.cal_cert_field_id {
                number_value = detail.old_value.clone().unwrap_or_default();
                number_found = true;
            }

            if date_found && number_found {
                recovered.insert(
                    format!("{CAL_CERT_LABEL} {year}"),
                    Value::String(number_value),
                );
                recovered.insert(
                    format!("{CAL_DATE_LABEL} {year}"),
                    Value::String(date_value),
                );
                break;
            }
        }
    }

    recovered
}

/// Builds the flat row for one issue: mandatory columns, flattened custom
/// fields, then any history recovered from journals. History wins when a
/// recovered column collides with a live field.
///
/// A field that fails to decode drops only that field; the rest of the row
/// survives.
pub fn normalize_issue(
    issue: &RawIssue,
    fields: &HistoryFields,
    registry: &mut FieldRegistry,
) -> NormalizedRow {
    let mut row = Map::new();
    row.insert(COL_ID.to_string(), json!(issue.id));
    row.insert(
        COL_TRACKER.to_string(),
        Value::String(issue.tracker.name.clone()),
    );
    row.insert(
        COL_STATUS.to_string(),
        Value::String(issue.status.name.clone()),
    );
    row.insert(
        COL_SUBJECT.to_string(),
        Value::String(issue.subject.clone()),
    );

    for field in &issue.custom_fields {
        registry.record(field.id, &field.name);
        match normalize_custom_field(&field.value) {
            Ok(Some(value)) => {
                row.insert(field.name.clone(), value);
            }
            Ok(None) => {}
            Err(err) => {
                error!(
                    "issue {}: dropping custom field '{}': {}",
                    issue.id, field.name, err
                );
            }
        }
    }
    debug!("custom field registry: {:?}", registry);

    if !issue.journals.is_empty() {
        for (key, value) in recover_history(&issue.journals, fields) {
            row.insert(key, value);
        }
    }

    row
}
