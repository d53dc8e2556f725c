//! A key-holder that turns challenges into signed payment proofs.
//!
//! Signing scheme: secp256k1 ECDSA (SHA-256 digest) over the raw
//! transaction bytes, the same bytes the ledger client would submit.

use alloy_primitives::Address;
use k256::{
    ecdsa::{Signature, SigningKey, signature::Signer},
    elliptic_curve::sec1::ToEncodedPoint,
};

use crate::{
    challenge::Challenge,
    proof::{PaymentProof, ProofSignature, TransactionBlob, TransferIntent},
    types::TimestampMillis,
};

#[derive(Debug, thiserror::Error)]
pub enum SignerError {
    #[error("invalid secp256k1 secret key")]
    InvalidKey,

    #[error("failed to encode transfer intent: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Signs transfer intents with a locally held secp256k1 key.
#[derive(Debug, Clone)]
pub struct KeyProofSigner {
    key: SigningKey,
    address: Address,
    public_key: String,
}

impl KeyProofSigner {
    pub fn from_bytes(bytes: &[u8; 32]) -> Result<Self, SignerError> {
        let key = SigningKey::from_slice(bytes).map_err(|_| SignerError::InvalidKey)?;
        Ok(Self::from_key(key))
    }

    pub fn random() -> Self {
        loop {
            // Rejection-sampled; virtually always succeeds on the first draw.
            if let Ok(signer) = Self::from_bytes(&rand::random()) {
                return signer;
            }
        }
    }

    fn from_key(key: SigningKey) -> Self {
        let point = key.verifying_key().to_encoded_point(false);
        let address = Address::from_raw_public_key(&point.as_bytes()[1..]);
        let public_key = hex::encode(point.as_bytes());
        KeyProofSigner {
            key,
            address,
            public_key,
        }
    }

    /// The account payments signed by this key are drawn from.
    pub fn address(&self) -> Address {
        self.address
    }

    /// Produce a proof answering `challenge`, echoing its deadline and
    /// nonce into the signed transfer intent.
    pub fn create_proof(&self, challenge: &Challenge) -> Result<PaymentProof, SignerError> {
        let intent = TransferIntent {
            from: self.address,
            to: challenge.recipient,
            value: challenge.amount,
            asset: challenge.asset.clone(),
            valid_before: challenge.deadline,
            nonce: challenge.nonce,
        };
        let raw = serde_json::to_vec(&intent)?;
        let signature: Signature = self.key.sign(&raw);

        Ok(PaymentProof {
            transaction: TransactionBlob(base64::Engine::encode(
                &base64::prelude::BASE64_STANDARD,
                &raw,
            )),
            signature: ProofSignature(signature),
            public_key: self.public_key.clone(),
            address: self.address,
            timestamp: TimestampMillis::now(),
        })
    }
}

#[cfg(feature = "client")]
impl crate::client::ProofSigner for KeyProofSigner {
    type Error = SignerError;

    async fn sign(&self, challenge: &Challenge) -> Result<PaymentProof, SignerError> {
        self.create_proof(challenge)
    }
}
