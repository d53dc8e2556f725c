//! Verification against a real ledger: validate, submit once, await
//! confirmation with a hard timeout.

use std::{convert::Infallible, time::Duration};

use bon::Builder;

use crate::{errors::PaymentError, proof::validate_proof};

use super::{LedgerVerifier, SettlementCache, VerificationResult, VerifyRequest};

/// Ledger-specific transport: submission and confirmation lookup.
///
/// Transaction encoding stays opaque; implementations receive the raw
/// signed bytes exactly as the client produced them.
pub trait LedgerClient {
    type Error: std::error::Error + Send + Sync + 'static;

    fn submit(&self, transaction: &[u8]) -> impl Future<Output = Result<(), Self::Error>> + Send;

    fn confirmation_status(
        &self,
        transaction_id: &str,
    ) -> impl Future<Output = Result<ConfirmationStatus, Self::Error>> + Send;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmationStatus {
    Pending,
    Confirmed,
    /// The ledger refused the transaction: bad signature, insufficient
    /// on-chain balance, or similar.
    Rejected(String),
}

#[derive(Builder, Debug, Clone)]
pub struct LiveVerifierConfig {
    /// Hard bound on waiting for confirmation.
    #[builder(default = Duration::from_secs(30))]
    pub confirmation_timeout: Duration,
    #[builder(default = Duration::from_millis(500))]
    pub poll_interval: Duration,
}

impl Default for LiveVerifierConfig {
    fn default() -> Self {
        LiveVerifierConfig::builder().build()
    }
}

/// States of a single verification attempt, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Validating,
    Submitting,
    AwaitingConfirmation,
}

/// The live [`LedgerVerifier`] variant.
///
/// A transaction identifier that has already produced a confirmed result
/// in this process returns the cached result instead of resubmitting, so
/// the same proof can never be charged against two routes.
pub struct LiveVerifier<L> {
    ledger: L,
    config: LiveVerifierConfig,
    cache: SettlementCache,
}

impl<L: LedgerClient> LiveVerifier<L> {
    pub fn new(ledger: L) -> Self {
        Self::with_config(ledger, LiveVerifierConfig::default())
    }

    pub fn with_config(ledger: L, config: LiveVerifierConfig) -> Self {
        LiveVerifier {
            ledger,
            config,
            cache: SettlementCache::new(),
        }
    }

    async fn verify_inner(&self, request: VerifyRequest) -> VerificationResult {
        let raw = match request.proof.transaction.raw_bytes() {
            Ok(raw) => raw,
            Err(err) => {
                return VerificationResult::rejected(PaymentError::MalformedProof(format!(
                    "transaction is not base64: {err}"
                )));
            }
        };
        let transaction_id = alloy_primitives::keccak256(&raw).to_string();

        // One settlement attempt at a time per transaction identifier.
        let key_lock = self.cache.key_lock(&transaction_id).await;
        let _guard = key_lock.lock().await;

        if let Some(cached) = self.cache.get(&transaction_id) {
            tracing::debug!(%transaction_id, "returning cached settlement");
            return cached;
        }

        tracing::debug!(%transaction_id, phase = ?Phase::Validating, "verifying payment proof");
        if let Err(err) = validate_proof(&request.proof, &request.requirement) {
            tracing::debug!(%transaction_id, reason = %err, "proof failed static validation");
            return VerificationResult::rejected(err);
        }

        tracing::debug!(%transaction_id, phase = ?Phase::Submitting, "submitting to ledger");
        if let Err(err) = self.ledger.submit(&raw).await {
            tracing::warn!(%transaction_id, error = %err, "ledger submission failed");
            return VerificationResult::rejected(PaymentError::SubmissionFailed(err.to_string()));
        }

        tracing::debug!(%transaction_id, phase = ?Phase::AwaitingConfirmation, "awaiting confirmation");
        let awaited = tokio::time::timeout(
            self.config.confirmation_timeout,
            self.await_confirmation(&transaction_id),
        )
        .await;

        match awaited {
            Err(_) => {
                tracing::warn!(%transaction_id, "confirmation timed out");
                VerificationResult::rejected(PaymentError::ConfirmationTimeout(
                    self.config.confirmation_timeout,
                ))
            }
            Ok(Err(err)) => {
                tracing::warn!(%transaction_id, error = %err, "confirmation failed");
                VerificationResult::rejected(err)
            }
            Ok(Ok(())) => {
                tracing::debug!(%transaction_id, "payment confirmed");
                let result = VerificationResult::confirmed(transaction_id.clone());
                self.cache.insert(transaction_id, result.clone()).await;
                result
            }
        }
    }

    async fn await_confirmation(&self, transaction_id: &str) -> Result<(), PaymentError> {
        loop {
            match self.ledger.confirmation_status(transaction_id).await {
                Ok(ConfirmationStatus::Confirmed) => return Ok(()),
                Ok(ConfirmationStatus::Rejected(reason)) => {
                    return Err(PaymentError::SubmissionFailed(reason));
                }
                Ok(ConfirmationStatus::Pending) => {}
                Err(err) => return Err(PaymentError::SubmissionFailed(err.to_string())),
            }
            tokio::time::sleep(self.config.poll_interval).await;
        }
    }
}

impl<L> LedgerVerifier for LiveVerifier<L>
where
    L: LedgerClient + Sync,
{
    type Error = Infallible;

    async fn verify(&self, request: VerifyRequest) -> Result<VerificationResult, Infallible> {
        Ok(self.verify_inner(request).await)
    }
}
