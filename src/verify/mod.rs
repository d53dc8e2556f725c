//! The ledger-facing verification capability.
//!
//! [`LedgerVerifier`] is the sole interface the gateway depends on.
//! The concrete variant ([`simulated::SimulatedVerifier`] for local
//! development, [`live::LiveVerifier`] against a real ledger, or
//! [`remote::RemoteVerifier`] over HTTP) is chosen once at wiring time;
//! calling code never branches on the mode.

mod cache;
pub mod live;
#[cfg(feature = "client")]
pub mod remote;
pub mod simulated;

use serde::{Deserialize, Serialize};

use crate::{
    proof::{PaymentProof, PaymentRequirement},
    types::TimestampMillis,
};

pub(crate) use cache::SettlementCache;

/// One proof-verification attempt's outcome.
///
/// Payment failures live inside this struct (`is_valid = false` plus a
/// reason); they are never surfaced as errors past the verifier boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationResult {
    pub is_valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub verified_at: TimestampMillis,
}

impl VerificationResult {
    pub fn confirmed(transaction_id: impl Into<String>) -> Self {
        VerificationResult {
            is_valid: true,
            transaction_id: Some(transaction_id.into()),
            error: None,
            verified_at: TimestampMillis::now(),
        }
    }

    pub fn rejected(reason: impl std::fmt::Display) -> Self {
        VerificationResult {
            is_valid: false,
            transaction_id: None,
            error: Some(reason.to_string()),
            verified_at: TimestampMillis::now(),
        }
    }
}

/// A proof plus the requirement it must satisfy; also the wire shape
/// POSTed to an out-of-process facilitator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyRequest {
    pub proof: PaymentProof,
    pub requirement: PaymentRequirement,
}

/// Verifies payment proofs against a ledger.
///
/// `Err` is reserved for transport-level faults (the gateway maps those
/// to a 500); every payment-level failure comes back as a populated
/// [`VerificationResult`].
pub trait LedgerVerifier {
    type Error: std::error::Error + Send + Sync + 'static;

    fn verify(
        &self,
        request: VerifyRequest,
    ) -> impl Future<Output = Result<VerificationResult, Self::Error>> + Send;
}
