/// Errors raised before anything is sent over the wire.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoreError {
    /// A required client construction field is absent.
    #[error("The following client options must always be set: {}", .missing.join(", "))]
    Configuration { missing: Vec<String> },

    /// A connection field is unset after merging defaults and overrides.
    #[error("One or more request parameters were not set: {}", .missing.join(", "))]
    MissingParameter { missing: Vec<String> },
}

impl CoreError {
    /// Names of the fields that were missing, in declaration order.
    pub fn missing(&self) -> &[String] {
        match self {
            CoreError::Configuration { missing } | CoreError::MissingParameter { missing } => {
                missing
            }
        }
    }
}
