pub mod error;
pub mod model;
pub mod normalize;

pub use error::{FieldError, FieldResult};
pub use model::{
    ChangeDetail, CustomField, JournalEntry, NamedRef, NormalizedRow, Project, RawIssue,
    COL_ID, COL_STATUS, COL_SUBJECT, COL_TRACKER, MANDATORY_COLUMNS,
};
pub use normalize::{
    normalize_custom_field, normalize_issue, recover_history, FieldRegistry, HistoryFields,
};
