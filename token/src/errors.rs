//! Errors returned while assembling, validating and committing token requests.

use ark_serialize::SerializationError;
use thiserror::Error;
use zkat_proofs::ProofError;

#[derive(Debug, Error)]
pub enum Error {
    /// Malformed or inconsistent input. Retrying the same input cannot succeed.
    #[error("format error: {0}")]
    Format(String),
    /// A value is outside of the provable interval.
    #[error("range violation: {0}")]
    RangeViolation(String),
    /// A proof failed to verify.
    #[error("invalid proof: {0}")]
    ProofInvalid(String),
    /// A key already exists or an input is already spent.
    #[error("ledger conflict: {0}")]
    LedgerConflict(String),
    /// A signature or issuer membership check failed.
    #[error("authorization denied: {0}")]
    AuthorizationDenied(String),
    /// The ledger collaborator failed.
    #[error("storage failure: {0}")]
    Storage(String),
}

impl Error {
    /// Prefixes the message with `ctx`, keeping the kind of error.
    pub fn context(self, ctx: impl std::fmt::Display) -> Self {
        match self {
            Error::Format(m) => Error::Format(format!("{}: {}", ctx, m)),
            Error::RangeViolation(m) => Error::RangeViolation(format!("{}: {}", ctx, m)),
            Error::ProofInvalid(m) => Error::ProofInvalid(format!("{}: {}", ctx, m)),
            Error::LedgerConflict(m) => Error::LedgerConflict(format!("{}: {}", ctx, m)),
            Error::AuthorizationDenied(m) => Error::AuthorizationDenied(format!("{}: {}", ctx, m)),
            Error::Storage(m) => Error::Storage(format!("{}: {}", ctx, m)),
        }
    }

    /// Turns a failed proof into an authorization failure.
    pub(crate) fn into_denied(self) -> Self {
        match self {
            Error::ProofInvalid(m) => Error::AuthorizationDenied(m),
            e => e,
        }
    }
}

impl From<ProofError> for Error {
    fn from(e: ProofError) -> Self {
        match e {
            ProofError::Format(m) => Error::Format(m),
            e @ ProofError::RangeViolation { .. } => Error::RangeViolation(e.to_string()),
            ProofError::VerificationError(m) => Error::ProofInvalid(m.to_string()),
            ProofError::Serialization(e) => Error::Format(e.to_string()),
        }
    }
}

impl From<SerializationError> for Error {
    fn from(e: SerializationError) -> Self {
        Error::Format(e.to_string())
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
