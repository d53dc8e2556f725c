//! Buyer-side driver: run a request, answer at most one 402 challenge.

use http::{HeaderValue, StatusCode};

use crate::{
    challenge::{Challenge, PaymentRequiredBody},
    gateway::PAYMENT_HEADER,
    proof::PaymentProof,
    types::{Base64EncodedHeader, CodecError},
};

/// Anything that can answer a challenge with a signed proof.
///
/// [`crate::signer::KeyProofSigner`] is the local-key implementation;
/// remote signing services fit behind the same trait.
pub trait ProofSigner {
    type Error: std::error::Error + Send + Sync + 'static;

    fn sign(
        &self,
        challenge: &Challenge,
    ) -> impl Future<Output = Result<PaymentProof, Self::Error>> + Send;
}

#[derive(Debug, thiserror::Error)]
pub enum ClientError<E: std::error::Error> {
    #[error("HTTP request error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("server sent a 402 without a parseable challenge: {0}")]
    MalformedChallenge(String),

    #[error("challenge deadline already passed on receipt")]
    ExpiredChallenge,

    #[error("request body cannot be replayed for the paid retry")]
    UnreplayableRequest,

    #[error("signer error: {0}")]
    Signer(E),

    #[error("failed to encode payment header: {0}")]
    Encode(#[from] CodecError),

    /// The retry with payment attached was still refused.
    #[error("payment rejected: {0}")]
    PaymentRejected(String),
}

/// Execute `request`; if the server answers 402, sign the challenge and
/// retry exactly once with an `X-Payment` header attached.
///
/// Any other status, including errors, is returned to the caller as-is.
/// A second 402 is terminal and never retried.
pub async fn fetch_with_payment<S: ProofSigner>(
    client: &reqwest::Client,
    request: reqwest::Request,
    signer: &S,
) -> Result<reqwest::Response, ClientError<S::Error>> {
    // Clone before the body is consumed; whether the clone is needed at
    // all is only known once the server answers.
    let retry = request.try_clone();

    let response = client.execute(request).await?;
    if response.status() != StatusCode::PAYMENT_REQUIRED {
        return Ok(response);
    }

    // Fail before signing: paying for a request we cannot replay would
    // strand the proof.
    let retry = retry.ok_or(ClientError::UnreplayableRequest)?;

    let body: PaymentRequiredBody = response
        .json()
        .await
        .map_err(|err| ClientError::MalformedChallenge(err.to_string()))?;
    if body.payment.is_expired() {
        return Err(ClientError::ExpiredChallenge);
    }

    tracing::debug!(
        amount = %body.payment.amount,
        recipient = %body.payment.recipient,
        "answering payment challenge"
    );
    let proof = signer
        .sign(&body.payment)
        .await
        .map_err(ClientError::Signer)?;

    let header = Base64EncodedHeader::encode(&proof)?;
    let mut retry = retry;
    retry.headers_mut().insert(
        PAYMENT_HEADER,
        HeaderValue::from_str(&header.0)
            .map_err(|err| ClientError::MalformedChallenge(err.to_string()))?,
    );

    let paid = client.execute(retry).await?;
    if paid.status() == StatusCode::PAYMENT_REQUIRED {
        let reason = paid
            .json::<PaymentRequiredBody>()
            .await
            .ok()
            .and_then(|body| body.message)
            .unwrap_or_else(|| "no reason given".to_string());
        tracing::warn!(%reason, "paid retry was refused");
        return Err(ClientError::PaymentRejected(reason));
    }

    Ok(paid)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use alloy_primitives::{Address, address};
    use axum::{Extension, Json, Router, routing::get};
    use tokio::net::TcpListener;

    use crate::{
        challenge::ChallengeIssuer,
        gateway::{PAYMENT_RESPONSE_HEADER, PaymentGateway, PaymentReceipt},
        routes::{PriceSpec, RouteTable},
        signer::KeyProofSigner,
        types::AmountValue,
        verify::simulated::SimulatedVerifier,
    };

    use super::*;

    const RECIPIENT: Address = address!("0x17d2e11d0405fa8d0ad2dca6409c499c0132c017");

    async fn serve(price: AmountValue) -> String {
        let routes = RouteTable::new(vec![
            PriceSpec::builder()
                .pattern("GET /paid".parse().unwrap())
                .amount(price)
                .build(),
        ])
        .unwrap();
        let gateway = PaymentGateway::builder()
            .routes(routes)
            .issuer(
                ChallengeIssuer::builder()
                    .recipient(RECIPIENT)
                    .window(Duration::from_secs(300))
                    .build(),
            )
            .verifier(SimulatedVerifier)
            .build();

        let app = Router::new()
            .route(
                "/paid",
                get(|receipt: Option<Extension<PaymentReceipt>>| async move {
                    let id = receipt.map(|Extension(r)| r.transaction_id);
                    Json(serde_json::json!({ "transactionId": id }))
                }),
            )
            .route("/free", get(|| async { "open access" }))
            .layer(gateway.into_layer());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn free_route_needs_no_payment() {
        let base = serve(AmountValue::from(100u64)).await;
        let client = reqwest::Client::new();
        let request = client.get(format!("{base}/free")).build().unwrap();

        let response = fetch_with_payment(&client, request, &KeyProofSigner::random())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.text().await.unwrap(), "open access");
    }

    #[tokio::test]
    async fn pays_challenge_and_retries_once() {
        let base = serve(AmountValue::from(100u64)).await;
        let client = reqwest::Client::new();
        let request = client.get(format!("{base}/paid")).build().unwrap();

        let response = fetch_with_payment(&client, request, &KeyProofSigner::random())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key(PAYMENT_RESPONSE_HEADER));

        let body: serde_json::Value = response.json().await.unwrap();
        assert!(body["transactionId"].as_str().unwrap().starts_with("0x"));
    }

    #[tokio::test]
    async fn second_402_is_terminal() {
        let base = serve(AmountValue::from(100u64)).await;
        let client = reqwest::Client::new();
        let request = client.get(format!("{base}/paid")).build().unwrap();

        // A signer that answers every challenge with an underpayment, so
        // the paid retry is refused as well.
        struct Underpayer(KeyProofSigner);
        impl ProofSigner for Underpayer {
            type Error = crate::signer::SignerError;

            async fn sign(&self, challenge: &Challenge) -> Result<PaymentProof, Self::Error> {
                let mut cheap = challenge.clone();
                cheap.amount = AmountValue::from(1u64);
                self.0.create_proof(&cheap)
            }
        }

        let err = fetch_with_payment(&client, request, &Underpayer(KeyProofSigner::random()))
            .await
            .unwrap_err();
        let ClientError::PaymentRejected(reason) = err else {
            panic!("expected terminal rejection, got {err}");
        };
        assert!(reason.contains("insufficient amount"));
    }

    fn streaming_body() -> reqwest::Body {
        reqwest::Body::wrap_stream(futures_util::stream::iter([Ok::<_, std::io::Error>(
            "chunk".as_bytes(),
        )]))
    }

    #[tokio::test]
    async fn streaming_request_to_free_route_is_sent_as_given() {
        let base = serve(AmountValue::from(100u64)).await;
        let client = reqwest::Client::new();
        let request = client
            .get(format!("{base}/free"))
            .body(streaming_body())
            .build()
            .unwrap();

        // The body cannot be cloned, but no challenge arrives, so the
        // request goes through untouched.
        let response = fetch_with_payment(&client, request, &KeyProofSigner::random())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn streaming_request_fails_before_signing_when_challenged() {
        let base = serve(AmountValue::from(100u64)).await;
        let client = reqwest::Client::new();
        let request = client
            .get(format!("{base}/paid"))
            .body(streaming_body())
            .build()
            .unwrap();

        let err = fetch_with_payment(&client, request, &KeyProofSigner::random())
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::UnreplayableRequest));
    }
}
