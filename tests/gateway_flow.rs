//! End-to-end flow through an axum router: challenge, pay, admit.

use std::time::Duration;

use alloy_primitives::{Address, address};
use axum::{
    Extension, Json, Router,
    body::Body,
    http::{Request, StatusCode},
    routing::get,
};
use tower::ServiceExt;

use tollgate::{
    challenge::{ChallengeIssuer, PaymentRequiredBody},
    gateway::{PAYMENT_HEADER, PAYMENT_RESPONSE_HEADER, PaymentGateway, PaymentReceipt, SettlementReceipt},
    routes::{PriceSpec, RouteTable},
    signer::KeyProofSigner,
    types::{AmountValue, Base64EncodedHeader},
    verify::simulated::SimulatedVerifier,
};

const RECIPIENT: Address = address!("0x17d2e11d0405fa8d0ad2dca6409c499c0132c017");

fn app() -> Router {
    let routes = RouteTable::new(vec![
        PriceSpec::builder()
            .pattern("GET /weather".parse().unwrap())
            .amount(AmountValue::from(1_000_000u64))
            .description("current conditions")
            .build(),
        PriceSpec::builder()
            .pattern("GET /premium/*".parse().unwrap())
            .amount(AmountValue::from(5_000u64))
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

    Router::new()
        .route(
            "/weather",
            get(|receipt: Option<Extension<PaymentReceipt>>| async move {
                let id = receipt.map(|Extension(r)| r.transaction_id);
                Json(serde_json::json!({ "forecast": "sunny", "transactionId": id }))
            }),
        )
        .route("/free", get(|| async { "no charge" }))
        .route("/premium/{tier}", get(|| async { "premium data" }))
        .layer(gateway.into_layer())
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn priced_route_challenges_unpaid_requests() {
    let response = app()
        .oneshot(Request::get("/weather").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
    let body = body_json(response).await;
    assert_eq!(body["payment"]["amount"], "1000000");
    assert_eq!(body["payment"]["token"]["id"], "native");
    assert_eq!(body["message"], "payment required");
    assert!(body["payment"]["nonce"].is_string());
}

#[tokio::test]
async fn unpriced_route_passes_through() {
    let response = app()
        .oneshot(Request::get("/free").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn paying_the_challenge_admits_the_request() {
    let app = app();
    let challenge = app
        .clone()
        .oneshot(Request::get("/weather").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(challenge.status(), StatusCode::PAYMENT_REQUIRED);

    let bytes = axum::body::to_bytes(challenge.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: PaymentRequiredBody = serde_json::from_slice(&bytes).unwrap();

    let proof = KeyProofSigner::random().create_proof(&body.payment).unwrap();
    let header = Base64EncodedHeader::encode(&proof).unwrap();

    let response = app
        .oneshot(
            Request::get("/weather")
                .header(PAYMENT_HEADER, header.0)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let receipt: SettlementReceipt = Base64EncodedHeader(
        response.headers()[PAYMENT_RESPONSE_HEADER]
            .to_str()
            .unwrap()
            .to_string(),
    )
    .decode()
    .unwrap();
    assert!(receipt.success);
    assert!(receipt.transaction_id.starts_with("0x"));

    // The handler saw the same settlement through its extension.
    let body = body_json(response).await;
    assert_eq!(body["transactionId"], receipt.transaction_id);
}

#[tokio::test]
async fn replaying_a_proof_against_a_new_challenge_fails() {
    let app = app();
    let challenge = app
        .clone()
        .oneshot(Request::get("/weather").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let bytes = axum::body::to_bytes(challenge.into_body(), usize::MAX)
        .await
        .unwrap();
    let mut body: PaymentRequiredBody = serde_json::from_slice(&bytes).unwrap();

    // Doctor the challenge so the signed intent pays someone else.
    body.payment.recipient = Address::ZERO;
    let proof = KeyProofSigner::random().create_proof(&body.payment).unwrap();
    let header = Base64EncodedHeader::encode(&proof).unwrap();

    let response = app
        .oneshot(
            Request::get("/weather")
                .header(PAYMENT_HEADER, header.0)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
    let body = body_json(response).await;
    assert!(
        body["message"]
            .as_str()
            .unwrap()
            .contains("wrong recipient")
    );
}

#[tokio::test]
async fn wildcard_prices_exactly_one_segment() {
    let app = app();

    let gold = app
        .clone()
        .oneshot(Request::get("/premium/gold").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(gold.status(), StatusCode::PAYMENT_REQUIRED);
    assert_eq!(body_json(gold).await["payment"]["amount"], "5000");

    // Two segments under the wildcard fall outside the price table; the
    // router then 404s them on its own.
    let nested = app
        .oneshot(
            Request::get("/premium/gold/extra")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(nested.status(), StatusCode::NOT_FOUND);
}
