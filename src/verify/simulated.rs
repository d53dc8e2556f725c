//! Ledger-free verification for local development.

use std::convert::Infallible;

use crate::proof::validate_proof;

use super::{LedgerVerifier, VerificationResult, VerifyRequest};

/// Runs the static proof checks and skips the ledger entirely.
///
/// Deterministic: the synthetic transaction identifier is derived from
/// the proof's transaction bytes, so the same proof always yields the
/// same result.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimulatedVerifier;

impl LedgerVerifier for SimulatedVerifier {
    type Error = Infallible;

    async fn verify(&self, request: VerifyRequest) -> Result<VerificationResult, Infallible> {
        if let Err(err) = validate_proof(&request.proof, &request.requirement) {
            tracing::debug!(reason = %err, "simulated verification rejected proof");
            return Ok(VerificationResult::rejected(err));
        }

        let transaction_id = match request.proof.transaction.transaction_id() {
            Ok(id) => id,
            Err(err) => return Ok(VerificationResult::rejected(format!("malformed proof: {err}"))),
        };
        tracing::debug!(transaction_id = %transaction_id, "simulated verification confirmed proof");
        Ok(VerificationResult::confirmed(transaction_id))
    }
}
