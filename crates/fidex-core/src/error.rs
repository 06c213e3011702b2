use thiserror::Error;

pub type FieldResult<T> = Result<T, FieldError>;

/// Errors raised while flattening custom-field values.
#[derive(Debug, Error)]
pub enum FieldError {
    /// The value looked like an embedded object but stayed undecodable even
    /// after the known textual repairs. Carries the text that failed.
    #[error("custom field value undecodable after repair: {0}")]
    Undecodable(String),
}

impl FieldError {
    pub fn undecodable(raw: impl Into<String>) -> Self {
        Self::Undecodable(raw.into())
    }
}
