//! # Wharf
//!
//! An OCI distribution registry core: content-addressable blob storage,
//! tag-addressed manifests, and the protocol dispatcher that ties them to
//! the [OCI Distribution Specification](https://github.com/opencontainers/distribution-spec)
//! endpoints under `/v2/`.
//!
//! ## Features
//!
//! - Blob upload (monolithic), retrieval, and existence probes, all
//!   digest-verified
//! - Manifest upload by tag, retrieval by tag or digest, tag listing
//! - Pluggable storage backend via the `storage` crate
//! - Builder pattern for configuration
//!
//! ## Example
//!
//! ```no_run
//! use wharf::RegistryBuilder;
//! use storage::MemoryStorage;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let storage = MemoryStorage::with_buckets(&["registry"]);
//! let registry = RegistryBuilder::new()
//!     .storage(storage.into())
//!     .bucket("registry")
//!     .build();
//!
//! // Use the registry service with axum or any tower-compatible server
//! # Ok(())
//! # }
//! ```

mod api;
mod blob;
mod digest;
mod error;
mod manifest;
mod reference;
mod storage;

pub use api::RegistryBuilder;
pub use digest::{Algorithm, Digest, InvalidDigest};
pub use error::{RegistryError, RegistryResult};
pub use reference::{Reference, is_valid_name, is_valid_reference, is_valid_tag};
