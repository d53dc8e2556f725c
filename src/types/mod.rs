//! Wire-level types shared across the payment protocol.

mod amount;
mod asset;
mod header;
mod nonce;
mod time;

pub use amount::*;
pub use asset::*;
pub use header::*;
pub use nonce::*;
pub use time::*;
