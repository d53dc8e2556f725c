//! Payment proofs and their static validation.
//!
//! Everything in this module is pure and synchronous: a proof is checked
//! against a requirement without any ledger or network access, so the
//! whole component is unit-testable offline.

use alloy_primitives::Address;
use base64::{Engine, prelude::BASE64_STANDARD};
use bon::Builder;
use k256::{
    ecdsa::{VerifyingKey, signature::Verifier},
    elliptic_curve::sec1::ToEncodedPoint,
};
use serde::{Deserialize, Serialize};

use crate::{
    challenge::Challenge,
    errors::PaymentError,
    types::{AmountValue, Asset, CodecError, Nonce, TimestampMillis},
};

/// The payload inside a transaction blob: who pays what to whom.
///
/// `valid_before` and `nonce` are echoed from the challenge being
/// answered, which binds the signed transfer to that challenge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferIntent {
    pub from: Address,
    pub to: Address,
    pub value: AmountValue,
    pub asset: Asset,
    pub valid_before: TimestampMillis,
    pub nonce: Nonce,
}

/// A signed transaction as an opaque base64 blob.
///
/// The ledger client receives the raw bytes untouched; only the proof
/// validator looks inside (the bytes are JSON of a [`TransferIntent`]).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionBlob(pub String);

impl TransactionBlob {
    pub fn encode(intent: &TransferIntent) -> Result<Self, serde_json::Error> {
        let json = serde_json::to_vec(intent)?;
        Ok(TransactionBlob(BASE64_STANDARD.encode(json)))
    }

    pub fn raw_bytes(&self) -> Result<Vec<u8>, base64::DecodeError> {
        BASE64_STANDARD.decode(&self.0)
    }

    pub fn decode_intent(&self) -> Result<TransferIntent, CodecError> {
        let bytes = self.raw_bytes()?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// The durable ledger-side identifier for this transaction.
    ///
    /// Derived as keccak256 of the raw signed bytes, so it is stable
    /// before submission and identical across repeat submissions.
    pub fn transaction_id(&self) -> Result<String, base64::DecodeError> {
        let bytes = self.raw_bytes()?;
        Ok(alloy_primitives::keccak256(&bytes).to_string())
    }
}

/// secp256k1 ECDSA signature over the raw transaction bytes, hex-encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProofSignature(pub k256::ecdsa::Signature);

impl std::fmt::Display for ProofSignature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", hex::encode(self.0.to_bytes()))
    }
}

impl std::str::FromStr for ProofSignature {
    type Err = k256::ecdsa::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s).map_err(k256::ecdsa::Error::from_source)?;
        Ok(ProofSignature(k256::ecdsa::Signature::from_slice(&bytes)?))
    }
}

impl Serialize for ProofSignature {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for ProofSignature {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Client-submitted evidence of payment, carried in the `X-Payment` header.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentProof {
    pub transaction: TransactionBlob,
    pub signature: ProofSignature,
    /// SEC1-encoded secp256k1 public key, hex.
    pub public_key: String,
    /// Account derived from `public_key`; must match the intent's sender.
    pub address: Address,
    /// When the client produced the proof.
    pub timestamp: TimestampMillis,
}

/// What a proof must satisfy to unlock a route.
#[derive(Builder, Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequirement {
    pub amount: AmountValue,
    #[builder(default)]
    pub asset: Asset,
    pub recipient: Address,
    /// Deadline of the specific challenge being answered, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deadline: Option<TimestampMillis>,
}

impl From<&Challenge> for PaymentRequirement {
    fn from(challenge: &Challenge) -> Self {
        PaymentRequirement {
            amount: challenge.amount,
            asset: challenge.asset.clone(),
            recipient: challenge.recipient,
            deadline: Some(challenge.deadline),
        }
    }
}

/// Statically validate a proof against a requirement.
///
/// Checks run in order and short-circuit: structure, deadline, amount,
/// recipient, then the signature chain (public key -> address -> sender).
/// Returns the decoded intent so callers need not decode twice.
pub fn validate_proof(
    proof: &PaymentProof,
    requirement: &PaymentRequirement,
) -> Result<TransferIntent, PaymentError> {
    let raw = proof
        .transaction
        .raw_bytes()
        .map_err(|err| PaymentError::MalformedProof(format!("transaction is not base64: {err}")))?;
    let intent = proof.transaction.decode_intent().map_err(|err| {
        PaymentError::MalformedProof(format!("transaction does not decode to a transfer: {err}"))
    })?;

    if let Some(deadline) = requirement.deadline
        && deadline.is_past()
    {
        return Err(PaymentError::ExpiredChallenge);
    }
    if intent.valid_before.is_past() {
        return Err(PaymentError::ExpiredChallenge);
    }

    if intent.asset.id != requirement.asset.id {
        return Err(PaymentError::MalformedProof(format!(
            "transfer pays asset {:?} but {:?} is required",
            intent.asset.id, requirement.asset.id
        )));
    }
    if intent.value < requirement.amount {
        return Err(PaymentError::InsufficientAmount {
            required: requirement.amount,
            carried: intent.value,
        });
    }

    if intent.to != requirement.recipient {
        return Err(PaymentError::WrongRecipient {
            expected: requirement.recipient,
            actual: intent.to,
        });
    }

    verify_signature(proof, &intent, &raw)?;

    Ok(intent)
}

/// Binds `signature` to `public_key`, `public_key` to `address`, and
/// `address` to the account that produced the transfer.
fn verify_signature(
    proof: &PaymentProof,
    intent: &TransferIntent,
    raw: &[u8],
) -> Result<(), PaymentError> {
    let key_bytes = hex::decode(proof.public_key.trim_start_matches("0x"))
        .map_err(|err| PaymentError::MalformedProof(format!("public key is not hex: {err}")))?;
    let key = VerifyingKey::from_sec1_bytes(&key_bytes).map_err(|_| {
        PaymentError::MalformedProof("public key is not a valid secp256k1 point".to_string())
    })?;

    let point = key.to_encoded_point(false);
    let derived = Address::from_raw_public_key(&point.as_bytes()[1..]);
    if derived != proof.address {
        return Err(PaymentError::SignatureRejected(
            "public key does not derive the claimed address".to_string(),
        ));
    }

    key.verify(raw, &proof.signature.0).map_err(|_| {
        PaymentError::SignatureRejected("signature does not cover the transaction bytes".to_string())
    })?;

    if intent.from != proof.address {
        return Err(PaymentError::SignatureRejected(
            "transfer sender is not the signing account".to_string(),
        ));
    }

    Ok(())
}
