use serde::Deserialize;
use serde_json::Value;

/// Column holding the issue id. Written as a number, not text.
pub const COL_ID: &str = "id";
pub const COL_TRACKER: &str = "Tipo (tracker)";
pub const COL_STATUS: &str = "Situação (status)";
pub const COL_SUBJECT: &str = "Título (subject)";

/// Columns every row carries, in the order they lead each sheet.
pub const MANDATORY_COLUMNS: [&str; 4] = [COL_ID, COL_TRACKER, COL_STATUS, COL_SUBJECT];

/// One flat output row: mandatory columns plus whatever custom fields and
/// recovered history the issue carried.
pub type NormalizedRow = serde_json::Map<String, Value>;

/// Project as listed by `/projects.json`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Project {
    pub id: u64,
    #[serde(default)]
    pub name: String,
}

/// Issue attribute carrying an id and a display name (tracker, status).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NamedRef {
    #[serde(default)]
    pub id: u64,
    #[serde(default)]
    pub name: String,
}

/// Custom field as attached to an issue. `value` stays raw JSON: the server
/// mixes strings, numbers, lists and embedded near-JSON objects here.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CustomField {
    #[serde(default)]
    pub id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub value: Value,
}

/// One changed attribute inside a journal entry. For custom fields `name`
/// holds the field id as a string.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChangeDetail {
    #[serde(default)]
    pub property: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub old_value: Option<String>,
    #[serde(default)]
    pub new_value: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct JournalEntry {
    #[serde(default)]
    pub details: Vec<ChangeDetail>,
}

/// Issue as returned by `/issues.json`. Every attribute except the id is
/// optional on the wire; absent ones default so a sparse record still
/// yields a row.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawIssue {
    pub id: u64,
    #[serde(default)]
    pub tracker: NamedRef,
    #[serde(default)]
    pub status: NamedRef,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub custom_fields: Vec<CustomField>,
    #[serde(default)]
    pub journals: Vec<JournalEntry>,
}
