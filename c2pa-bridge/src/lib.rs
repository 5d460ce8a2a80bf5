//! C2PA Bridge - safe Rust access to the native C2PA engine
//!
//! This crate loads the C2PA shared library at runtime and exposes its
//! reader, builder and signer objects behind owned Rust types. It takes care
//! of the parts of the C ABI that are easy to get wrong:
//!
//! - Library discovery and validation of every exported entry point
//! - Host streams bridged to the engine through callback trampolines that
//!   never unwind and never outlive their stream
//! - Host-side signing callbacks with bounded, zeroized buffers
//! - Idempotent, thread-safe release of every native handle
//! - Translation of the engine's out-of-band error strings into typed errors
//!
//! # Example
//!
//! ```no_run
//! use std::io::Cursor;
//! use c2pa_bridge::{Builder, Engine, ManifestDefinition, Reader, Signer, SignerInfo};
//!
//! # fn example() -> c2pa_bridge::C2paResult<()> {
//! let engine = Engine::load()?;
//! let signer = Signer::from_info(&engine, &SignerInfo::from_env()?)?;
//!
//! let manifest = ManifestDefinition::new("my-app/1.0")
//!     .with_title("photo.jpg")
//!     .with_created_action();
//! let mut builder = Builder::from_manifest(&engine, &manifest)?;
//!
//! let source = Cursor::new(std::fs::read("photo.jpg")?);
//! let mut signed = Cursor::new(Vec::new());
//! builder.sign(&signer, "image/jpeg", source, &mut signed)?;
//!
//! signed.set_position(0);
//! let reader = Reader::from_stream(&engine, "image/jpeg", signed)?;
//! println!("{}", reader.json()?);
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod config;
pub mod engine;
pub mod error;
mod handle;
pub mod manifest;
pub mod mime;
pub mod native;
pub mod reader;
pub mod signer;
pub mod stream;

#[cfg(feature = "openssl")]
pub mod pem_signer;

// Re-export main types for convenience
pub use builder::Builder;
pub use config::{LibraryConfig, SettingsFormat, DEFAULT_LIBRARY_NAME};
pub use engine::{Engine, ED25519_SIGNATURE_LEN};
pub use error::{C2paError, C2paResult};
pub use manifest::{
    AssertionDefinition, ClaimGeneratorInfo, Ingredient, Manifest, ManifestDefinition,
    ManifestStore, ResourceRef, SignatureInfo, ValidationStatus, ACTIONS_ASSERTION_LABEL,
};
pub use mime::format_from_path;
pub use native::REQUIRED_SYMBOLS;
pub use reader::Reader;
pub use signer::{BoxError, SignCallback, Signer, SignerInfo, SigningAlg, MAX_SIGN_INPUT};
pub use stream::{ByteChannel, ByteStream, Capabilities, ReadOnly, WriteOnly};

#[cfg(feature = "openssl")]
pub use pem_signer::PemKeySigner;
