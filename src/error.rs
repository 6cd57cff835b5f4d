use thiserror::Error;

/// Construction-time failures raised by pipetree mutations and step lookup.
///
/// Every variant is returned synchronously from the call that attempted the
/// mutation; the tree is left exactly as it was before the call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipetreeError {
    #[error("Cannot insert step '{step}': anchor step '{anchor}' not found")]
    AnchorNotFound { anchor: String, step: String },

    #[error("Step '{name}' not found")]
    StepNotFound { name: String },

    #[error("Step name '{name}' is already registered in this pipetree")]
    DuplicateStepName { name: String },

    #[error("Unknown method '{name}'. Available methods: {}", .available.join(", "))]
    UnknownMethod {
        name: String,
        available: Vec<String>,
    },

    #[error("Invalid parameters for method '{method}': {reason}")]
    InvalidParameters { method: String, reason: String },
}

impl PipetreeError {
    pub(crate) fn invalid_params(method: &str, reason: impl Into<String>) -> Self {
        PipetreeError::InvalidParameters {
            method: method.to_string(),
            reason: reason.into(),
        }
    }
}
