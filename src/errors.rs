use std::time::Duration;

use alloy_primitives::Address;

use crate::types::AmountValue;

/// Every way a payment can fail between challenge issuance and settlement.
///
/// All variants except [`PaymentError::Internal`] mean "payment not yet
/// valid" and surface to the caller as a fresh 402 with a reason; only
/// `Internal` is a systemic fault and maps to a 500.
#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    #[error("malformed challenge: {0}")]
    MalformedChallenge(String),

    #[error("malformed proof: {0}")]
    MalformedProof(String),

    #[error("challenge deadline has passed")]
    ExpiredChallenge,

    #[error("insufficient amount: required {required}, proof carries {carried}")]
    InsufficientAmount {
        required: AmountValue,
        carried: AmountValue,
    },

    #[error("wrong recipient: expected {expected}, proof pays {actual}")]
    WrongRecipient { expected: Address, actual: Address },

    #[error("signature rejected: {0}")]
    SignatureRejected(String),

    #[error("submission failed: {0}")]
    SubmissionFailed(String),

    #[error("confirmation timed out after {0:?}")]
    ConfirmationTimeout(Duration),

    #[error("internal error: {0}")]
    Internal(String),
}

impl PaymentError {
    /// True for failures the caller can cure with a new payment,
    /// as opposed to a systemic fault on our side.
    pub fn is_payment_rejection(&self) -> bool {
        !matches!(self, PaymentError::Internal(_))
    }
}
