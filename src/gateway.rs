//! Server-side orchestration: challenge, verify, admit, or reject.

use bon::Builder;
use http::{HeaderMap, Method};
use serde::{Deserialize, Serialize};

use crate::{
    challenge::{ChallengeIssuer, PaymentRequiredBody},
    proof::{PaymentProof, PaymentRequirement, validate_proof},
    routes::{PriceSpec, RouteTable},
    types::{Base64EncodedHeader, TimestampMillis},
    verify::{LedgerVerifier, VerifyRequest},
};

/// Request header carrying a base64 JSON [`PaymentProof`].
pub const PAYMENT_HEADER: &str = "X-Payment";
/// Response header carrying a base64 JSON [`SettlementReceipt`].
pub const PAYMENT_RESPONSE_HEADER: &str = "X-Payment-Response";

/// Settlement details handed to the downstream handler via request
/// extensions once a payment is admitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentReceipt {
    pub transaction_id: String,
    pub verified_at: TimestampMillis,
}

/// Wire shape of the `X-Payment-Response` header.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementReceipt {
    pub success: bool,
    pub transaction_id: String,
    pub verified_at: TimestampMillis,
}

impl From<&PaymentReceipt> for SettlementReceipt {
    fn from(receipt: &PaymentReceipt) -> Self {
        SettlementReceipt {
            success: true,
            transaction_id: receipt.transaction_id.clone(),
            verified_at: receipt.verified_at,
        }
    }
}

/// What the gateway decided for one inbound request.
#[derive(Debug, Clone)]
pub enum GateDecision {
    /// No price matched; the request is free.
    PassThrough,
    /// Respond 402 with a fresh challenge.
    PaymentRequired(PaymentRequiredBody),
    /// Payment settled; run the downstream handler.
    Admit(PaymentReceipt),
    /// Respond 500 with a generic message; detail goes to the log only.
    InternalError,
}

/// Intercepts every inbound request and gates priced routes behind
/// payment. Holds its own route table and verifier; nothing is
/// process-global.
#[derive(Builder)]
pub struct PaymentGateway<V: LedgerVerifier> {
    pub routes: RouteTable,
    pub issuer: ChallengeIssuer,
    pub verifier: V,
}

impl<V: LedgerVerifier> PaymentGateway<V> {
    /// Decide what to do with a request.
    ///
    /// Payment-level failures always come back as `PaymentRequired`
    /// with a reason; a 402 is never upgraded to a 5xx.
    pub async fn intercept(&self, method: &Method, path: &str, headers: &HeaderMap) -> GateDecision {
        let Some(spec) = self.routes.match_route(method, path) else {
            return GateDecision::PassThrough;
        };

        let Some(raw) = headers.get(PAYMENT_HEADER) else {
            tracing::debug!(%method, path, "no payment attached, issuing challenge");
            return self.payment_required(spec, "payment required".to_string());
        };

        let proof: PaymentProof = match raw
            .to_str()
            .map_err(|err| err.to_string())
            .and_then(|value| {
                Base64EncodedHeader(value.to_string())
                    .decode()
                    .map_err(|err| err.to_string())
            }) {
            Ok(proof) => proof,
            Err(err) => {
                tracing::debug!(%method, path, error = %err, "unparseable payment header");
                return self
                    .payment_required(spec, format!("payment rejected: malformed proof: {err}"));
            }
        };

        let requirement = PaymentRequirement::builder()
            .amount(spec.amount)
            .asset(spec.asset.clone())
            .recipient(self.issuer.recipient)
            .build();

        // Static checks first; obviously bad proofs never reach the ledger.
        if let Err(err) = validate_proof(&proof, &requirement) {
            tracing::debug!(%method, path, reason = %err, "proof failed validation");
            return self.payment_required(spec, format!("payment rejected: {err}"));
        }

        // Exactly one verifier call per request; retries belong to the client.
        match self
            .verifier
            .verify(VerifyRequest { proof, requirement })
            .await
        {
            Ok(result) if result.is_valid => match result.transaction_id {
                Some(transaction_id) => {
                    tracing::debug!(%method, path, %transaction_id, "payment admitted");
                    GateDecision::Admit(PaymentReceipt {
                        transaction_id,
                        verified_at: result.verified_at,
                    })
                }
                // A confirmation with no settlement to point at is a
                // broken verifier, not an admissible payment.
                None => {
                    tracing::error!(%method, path, "verifier confirmed without a transaction id");
                    GateDecision::InternalError
                }
            },
            Ok(result) => {
                let reason = result.error.unwrap_or_else(|| "verification failed".to_string());
                tracing::debug!(%method, path, %reason, "payment rejected by verifier");
                self.payment_required(spec, format!("payment rejected: {reason}"))
            }
            Err(err) => {
                tracing::error!(%method, path, error = %err, "verifier transport failure");
                GateDecision::InternalError
            }
        }
    }

    fn payment_required(&self, spec: &PriceSpec, message: String) -> GateDecision {
        GateDecision::PaymentRequired(PaymentRequiredBody {
            payment: self.issuer.issue(spec),
            message: Some(message),
            retry_after: None,
        })
    }
}
