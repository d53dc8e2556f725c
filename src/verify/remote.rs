//! HTTP client for an out-of-process facilitator.

use http::{HeaderMap, HeaderName, HeaderValue};
use url::Url;

use super::{LedgerVerifier, VerificationResult, VerifyRequest};

/// Reaches a facilitator's `verify` endpoint over HTTP.
///
/// The contract is identical to an in-process verifier: payment failures
/// arrive inside the [`VerificationResult`], and only transport faults
/// surface as errors.
#[derive(Debug, Clone)]
pub struct RemoteVerifier {
    pub base_url: Url,
    pub client: reqwest::Client,
    pub headers: HeaderMap,
}

#[derive(Debug, thiserror::Error)]
pub enum RemoteVerifierError {
    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),
}

impl RemoteVerifier {
    pub fn from_url(base_url: Url) -> Self {
        RemoteVerifier {
            base_url,
            client: reqwest::Client::new(),
            headers: HeaderMap::new(),
        }
    }

    /// Attach a header (e.g. an API key) to every facilitator call.
    pub fn header(mut self, key: &HeaderName, value: &HeaderValue) -> Self {
        self.headers.insert(key, value.to_owned());
        self
    }
}

impl LedgerVerifier for RemoteVerifier {
    type Error = RemoteVerifierError;

    async fn verify(&self, request: VerifyRequest) -> Result<VerificationResult, Self::Error> {
        let result = self
            .client
            .post(self.base_url.join("verify")?)
            .headers(self.headers.clone())
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(result)
    }
}
