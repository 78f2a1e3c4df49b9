//! NoteVault Server - API for the NoteVault study-material store
//!
//! This crate provides the storefront catalog, free and paid checkout,
//! signed downloads, payment webhooks and the admin back-office.

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod gateway;
pub mod mailer;
pub mod media;
pub mod models;
pub mod purchase;
pub mod rate_limit;
pub mod recaptcha;
pub mod routes;
pub mod state;
pub mod storage;

pub use config::Config;
pub use error::AppError;
pub use routes::create_router;
pub use state::AppState;
