use core::fmt;

use thiserror::Error;

pub type Result<T> = core::result::Result<T, Error>;

/// Error types
#[derive(Debug, Error)]
pub enum Error {
    #[error("return codes: {0}")]
    Structural(#[from] StructuralError),

    #[error("return codes: {0}")]
    Verification(#[from] VerificationFailure),

    #[error("return codes: keystore could not be opened")]
    Keystore,

    #[error("return codes: key derivation failed: {0}")]
    KeyDerivation(String),

    #[error("return codes: symmetric encryption failed")]
    SymmetricEncryption,

    #[error("return codes: {what} not found for {key}")]
    NotFound { what: &'static str, key: String },
}

impl Error {
    pub fn is_structural(&self) -> bool {
        matches!(self, Error::Structural(_))
    }

    pub fn is_verification_failure(&self) -> bool {
        matches!(self, Error::Verification(_))
    }
}

/// Violated preconditions. Raised before any cryptographic work is done.
#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum StructuralError {
    #[error("group mismatch: {what} does not belong to the expected group")]
    GroupMismatch { what: &'static str },

    #[error("group order mismatch: {what} must have the same order as the encryption group")]
    GroupOrderMismatch { what: &'static str },

    #[error("size mismatch: {what} expected {expected}, found {actual}")]
    SizeMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("out of range: {what} must be in [{min}, {max}], found {actual}")]
    OutOfRange {
        what: &'static str,
        min: usize,
        max: usize,
        actual: usize,
    },

    #[error("empty: {what} must not be empty")]
    Empty { what: &'static str },

    #[error("invalid format: {what} {value:?}")]
    InvalidFormat { what: &'static str, value: String },

    #[error("invalid value: {what}")]
    InvalidValue { what: &'static str },

    #[error("duplicate entry in {what}: {value}")]
    Duplicate { what: &'static str, value: String },

    #[error("invalid configuration: {0}")]
    Configuration(String),
}

/// The proof kinds this engine verifies.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum ProofKind {
    PartialChoiceReturnCodesExponentiation,
    ConfirmationKeyExponentiation,
    ChoiceReturnCodesPublicKeySchnorr,
}

impl fmt::Display for ProofKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProofKind::PartialChoiceReturnCodesExponentiation => {
                "partial choice return codes exponentiation proof"
            }
            ProofKind::ConfirmationKeyExponentiation => "confirmation key exponentiation proof",
            ProofKind::ChoiceReturnCodesPublicKeySchnorr => {
                "choice return codes public key schnorr proof"
            }
        };
        f.write_str(name)
    }
}

/// A proof did not verify. Identifies the first failing (voter, node) pair.
#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub struct VerificationFailure {
    pub proof: ProofKind,
    pub election_event_id: String,
    pub verification_card_set_id: Option<String>,
    /// 0-based voter index and verification card id
    pub voter: Option<(usize, String)>,
    /// 1-based control component index
    pub node_id: usize,
}

impl fmt::Display for VerificationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} failed to verify for control component {} in election event {}",
            self.proof, self.node_id, self.election_event_id
        )?;
        if let Some(vcs) = &self.verification_card_set_id {
            write!(f, ", verification card set {}", vcs)?;
        }
        if let Some((index, id)) = &self.voter {
            write!(f, ", voter {} (verification card {})", index, id)?;
        }
        Ok(())
    }
}

pub(crate) fn ensure_size(what: &'static str, expected: usize, actual: usize) -> Result<()> {
    if expected != actual {
        return Err(StructuralError::SizeMismatch {
            what,
            expected,
            actual,
        }
        .into());
    }
    Ok(())
}

pub(crate) fn ensure_range(what: &'static str, min: usize, max: usize, actual: usize) -> Result<()> {
    if actual < min || actual > max {
        return Err(StructuralError::OutOfRange {
            what,
            min,
            max,
            actual,
        }
        .into());
    }
    Ok(())
}

pub(crate) fn ensure_non_empty<T>(what: &'static str, values: &[T]) -> Result<()> {
    if values.is_empty() {
        return Err(StructuralError::Empty { what }.into());
    }
    Ok(())
}
