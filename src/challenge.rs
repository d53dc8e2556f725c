//! Challenge issuance: what payment unlocks a priced route.

use std::time::Duration;

use alloy_primitives::Address;
use bon::Builder;
use serde::{Deserialize, Serialize};

use crate::{
    routes::PriceSpec,
    types::{AmountValue, Asset, Nonce, TimestampMillis},
};

/// A time-bounded payment challenge, created fresh per rejected request.
///
/// Never persisted server-side; the nonce and deadline travel back inside
/// the client's transfer intent, which is how a proof stays bound to the
/// challenge it answers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Challenge {
    pub amount: AmountValue,
    #[serde(rename = "token")]
    pub asset: Asset,
    pub recipient: Address,
    /// Absolute epoch-ms deadline; strictly in the future at issuance.
    pub deadline: TimestampMillis,
    pub nonce: Nonce,
}

impl Challenge {
    pub fn is_expired(&self) -> bool {
        self.deadline.is_past()
    }
}

/// Body of a `402 Payment Required` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequiredBody {
    pub payment: Challenge,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
}

/// Builds challenges for priced routes.
///
/// Issuance only generates values; it never blocks or touches the ledger.
#[derive(Builder, Debug, Clone)]
pub struct ChallengeIssuer {
    /// The account all payments must be made out to.
    pub recipient: Address,
    /// Validity window applied to every challenge.
    #[builder(default = Duration::from_secs(300))]
    pub window: Duration,
}

impl ChallengeIssuer {
    pub fn issue(&self, spec: &PriceSpec) -> Challenge {
        Challenge {
            amount: spec.amount,
            asset: spec.asset.clone(),
            recipient: self.recipient,
            deadline: TimestampMillis::now().plus(self.window),
            nonce: Nonce::random(),
        }
    }
}

#[cfg(test)]
mod tests {
    use alloy_primitives::address;

    use crate::types::AmountValue;

    use super::*;

    fn issuer(window: Duration) -> ChallengeIssuer {
        ChallengeIssuer::builder()
            .recipient(address!("0x17d2e11d0405fa8d0ad2dca6409c499c0132c017"))
            .window(window)
            .build()
    }

    fn spec() -> PriceSpec {
        PriceSpec::builder()
            .pattern("GET /weather".parse().unwrap())
            .amount(AmountValue::from(1_000_000u64))
            .description("weather report")
            .build()
    }

    #[test]
    fn deadline_is_issuance_plus_window() {
        let window = Duration::from_secs(300);
        let before = TimestampMillis::now().plus(window);
        let challenge = issuer(window).issue(&spec());
        let after = TimestampMillis::now().plus(window);

        assert!(challenge.deadline >= before);
        assert!(challenge.deadline <= after);
        assert!(!challenge.is_expired());
    }

    #[test]
    fn copies_amount_and_asset_from_spec() {
        let challenge = issuer(Duration::from_secs(300)).issue(&spec());
        assert_eq!(challenge.amount, AmountValue::from(1_000_000u64));
        assert_eq!(challenge.asset, Asset::native());
    }

    #[test]
    fn issues_distinct_nonces() {
        let issuer = issuer(Duration::from_secs(300));
        let a = issuer.issue(&spec());
        let b = issuer.issue(&spec());
        assert_ne!(a.nonce, b.nonce);
    }

    #[test]
    fn challenge_survives_402_body_round_trip() {
        let challenge = issuer(Duration::from_secs(300)).issue(&spec());
        let body = PaymentRequiredBody {
            payment: challenge.clone(),
            message: Some("payment required".to_string()),
            retry_after: None,
        };
        let json = serde_json::to_string(&body).unwrap();
        let parsed: PaymentRequiredBody = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.payment, challenge);
    }
}
