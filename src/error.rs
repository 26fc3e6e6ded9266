use thiserror::Error;

/// Errors surfaced by the parameter builder.
///
/// None of these are retried internally. Re-attempting a build needs fresh
/// blinding scalars, so retry policy belongs to the caller.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParamsError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("proof generation failed: {0}")]
    ProofGeneration(String),

    #[error("encryption failed: {0}")]
    Encryption(String),

    #[error("signature failed: {0}")]
    Signature(String),

    #[error("hash computation failed: {0}")]
    HashComputation(String),
}

impl ParamsError {
    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, ParamsError>;

/// Failure reported by a [`ProvingBackend`](crate::backend::ProvingBackend) call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct BackendError(pub String);

impl BackendError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_prefixes() {
        let err = ParamsError::validation("merkle path format is wrong");
        assert_eq!(err.to_string(), "validation error: merkle path format is wrong");

        let err = ParamsError::ProofGeneration("spend proof failed".into());
        assert_eq!(err.to_string(), "proof generation failed: spend proof failed");
    }

    #[test]
    fn test_backend_error_message() {
        assert_eq!(BackendError::new("ctx poisoned").to_string(), "ctx poisoned");
    }
}
