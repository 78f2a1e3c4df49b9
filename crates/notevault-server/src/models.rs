//! Database models for NoteVault.

pub mod admin;
pub mod blob;
pub mod download;
pub mod material;
pub mod money;
pub mod order;

pub use admin::Admin;
pub use blob::{BlobFile, BlobKind};
pub use download::{Download, NewDownload};
pub use material::{Category, Material, MaterialVersion};
pub use order::{NewOrder, Order, OrderStatus, OrderWithMaterial};
