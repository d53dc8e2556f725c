//! Pay-per-request gating for HTTP APIs.
//!
//! Servers price routes, answer unpaid requests with a 402 challenge,
//! and admit requests carrying a verified payment proof. Clients drive
//! the sign-and-retry loop with [`client::fetch_with_payment`].

pub mod challenge;
pub mod errors;
pub mod gateway;
pub mod proof;
pub mod routes;
pub mod signer;
pub mod types;
pub mod verify;

#[cfg(feature = "axum")]
pub mod axum;

#[cfg(feature = "client")]
pub mod client;
