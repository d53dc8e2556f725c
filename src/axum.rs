//! Tower middleware wiring the gateway into an axum router.

use std::{pin::Pin, sync::Arc, task::{Context, Poll}};

use axum::{
    Json,
    extract::Request,
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use serde_json::json;
use tower::{Layer, Service};

use crate::{
    gateway::{GateDecision, PAYMENT_RESPONSE_HEADER, PaymentGateway, PaymentReceipt, SettlementReceipt},
    types::Base64EncodedHeader,
    verify::LedgerVerifier,
};

impl<V> PaymentGateway<V>
where
    V: LedgerVerifier,
{
    /// Wrap the gateway as a layer for [`axum::Router::layer`].
    ///
    /// Priced routes answer 402 until a valid `X-Payment` header
    /// arrives; admitted requests carry a [`PaymentReceipt`] extension
    /// and their responses an `X-Payment-Response` header.
    pub fn into_layer(self) -> PaymentGatewayLayer<V> {
        PaymentGatewayLayer {
            gateway: Arc::new(self),
        }
    }
}

pub struct PaymentGatewayLayer<V: LedgerVerifier> {
    gateway: Arc<PaymentGateway<V>>,
}

impl<V: LedgerVerifier> Clone for PaymentGatewayLayer<V> {
    fn clone(&self) -> Self {
        PaymentGatewayLayer {
            gateway: self.gateway.clone(),
        }
    }
}

impl<V: LedgerVerifier, S> Layer<S> for PaymentGatewayLayer<V> {
    type Service = PaymentGatewayService<V, S>;

    fn layer(&self, inner: S) -> Self::Service {
        PaymentGatewayService {
            gateway: self.gateway.clone(),
            inner,
        }
    }
}

pub struct PaymentGatewayService<V: LedgerVerifier, S> {
    gateway: Arc<PaymentGateway<V>>,
    inner: S,
}

impl<V: LedgerVerifier, S: Clone> Clone for PaymentGatewayService<V, S> {
    fn clone(&self) -> Self {
        PaymentGatewayService {
            gateway: self.gateway.clone(),
            inner: self.inner.clone(),
        }
    }
}

impl<V, S> Service<Request> for PaymentGatewayService<V, S>
where
    V: LedgerVerifier + Send + Sync + 'static,
    S: Service<Request, Response = Response> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Response, S::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut request: Request) -> Self::Future {
        let gateway = self.gateway.clone();
        // The clone is the ready service; see tower's docs on `Service::call`.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            let decision = gateway
                .intercept(request.method(), request.uri().path(), request.headers())
                .await;

            match decision {
                GateDecision::PassThrough => inner.call(request).await,
                GateDecision::PaymentRequired(body) => {
                    Ok((StatusCode::PAYMENT_REQUIRED, Json(body)).into_response())
                }
                GateDecision::Admit(receipt) => {
                    request.extensions_mut().insert(receipt.clone());
                    let mut response = inner.call(request).await?;
                    attach_receipt(&mut response, &receipt);
                    Ok(response)
                }
                GateDecision::InternalError => Ok((
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": "internal server error" })),
                )
                    .into_response()),
            }
        })
    }
}

fn attach_receipt(response: &mut Response, receipt: &PaymentReceipt) {
    let encoded = Base64EncodedHeader::encode(&SettlementReceipt::from(receipt))
        .map_err(|err| err.to_string())
        .and_then(|header| HeaderValue::from_str(&header.0).map_err(|err| err.to_string()));
    match encoded {
        Ok(value) => {
            response.headers_mut().insert(PAYMENT_RESPONSE_HEADER, value);
        }
        Err(err) => {
            // The payment already settled; losing the receipt header must
            // not fail the response.
            tracing::warn!(error = %err, "failed to encode settlement receipt header");
        }
    }
}
