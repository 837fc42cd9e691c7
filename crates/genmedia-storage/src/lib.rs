//! genmedia-storage: object storage access for generated media.
//!
//! - [`ObjectLocation`] parses and formats `gs://bucket/object` locators.
//! - [`ObjectStore`] uploads and downloads bytes ([`GcsClient`] for Cloud
//!   Storage, [`MemoryStore`] for local runs and tests).
//! - [`UrlSigner`] mints time-limited V4 signed URLs.
//! - [`TokenProvider`] supplies bearer tokens to every REST client.

pub mod auth;
pub mod client;
pub mod error;
pub mod locator;
pub mod signer;

pub use auth::{MetadataTokenProvider, StaticTokenProvider, TokenProvider};
pub use client::{GcsClient, MemoryStore, ObjectStore};
pub use error::StorageError;
pub use locator::{ObjectLocation, ensure_gcs_prefix, split_prefix};
pub use signer::{HmacV4Signer, UnconfiguredSigner, UrlSigner};
