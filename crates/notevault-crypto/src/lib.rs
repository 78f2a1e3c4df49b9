// NoteVault Crypto - HMAC primitives shared by the server and the CLI

pub mod download_token;
pub mod hash;
pub mod mac;
pub mod payment;

pub use download_token::DownloadToken;
pub use hash::sha256_hex;
pub use mac::{hmac_sha256_hex, verify_hmac_sha256_hex};
pub use payment::{
    checkout_signature, verify_checkout_signature, verify_webhook_signature, webhook_signature,
};
