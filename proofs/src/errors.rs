//! Errors related to proving and verifying proofs.

use ark_serialize::SerializationError;
use thiserror::Error;

/// Represents an error in proof creation, verification, or parsing.
#[derive(Debug, Error)]
pub enum ProofError {
    /// The inputs of a proof have inconsistent lengths or shapes.
    #[error("malformed input: {0}")]
    Format(String),
    /// A value is outside of the interval a range proof can attest to.
    #[error("value {value} is out of range, the maximum is {max}")]
    RangeViolation { value: u64, max: u64 },
    /// A proof did not verify against its statement.
    #[error("proof verification failed: {0}")]
    VerificationError(&'static str),
    /// A proof or one of its elements failed to deserialize.
    #[error("serialization error: {0}")]
    Serialization(#[from] SerializationError),
}

impl ProofError {
    pub(crate) fn format(msg: impl Into<String>) -> Self {
        ProofError::Format(msg.into())
    }
}
