//! Layout of signed assets produced by the fake engine.
//!
//! A signed asset is the original bytes followed by the manifest bytes, their
//! length as a little-endian `u32`, and [`MAGIC`]. Manifest bytes are the JSON
//! form of [`EmbeddedManifest`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sha3::{Digest, Sha3_256};

pub(crate) const MAGIC: &[u8; 8] = b"C2PAFAKE";

const TRAILER_LEN: usize = 4 + MAGIC.len();

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct EmbeddedManifest {
    /// Manifest store as reported by a reader, without validation results.
    pub store: serde_json::Value,
    pub asset_hash: String,
    pub signature: String,
    #[serde(default)]
    pub resources: BTreeMap<String, String>,
    #[serde(default)]
    pub remote_url: Option<String>,
}

pub(crate) fn asset_hash(asset: &[u8]) -> String {
    hex::encode(Sha3_256::digest(asset))
}

/// Append the manifest trailer to `asset`.
pub(crate) fn embed(asset: &[u8], manifest: &[u8]) -> Result<Vec<u8>, String> {
    let len = u32::try_from(manifest.len()).map_err(|_| "manifest too large".to_string())?;
    let mut out = Vec::with_capacity(asset.len() + manifest.len() + TRAILER_LEN);
    out.extend_from_slice(asset);
    out.extend_from_slice(manifest);
    out.extend_from_slice(&len.to_le_bytes());
    out.extend_from_slice(MAGIC);
    Ok(out)
}

/// Split a signed asset into the original bytes and the manifest bytes.
pub(crate) fn split(data: &[u8]) -> Option<(&[u8], &[u8])> {
    let body_len = data.len().checked_sub(TRAILER_LEN)?;
    let (body, trailer) = data.split_at(body_len);
    let (len, magic) = trailer.split_at(4);
    if magic != MAGIC {
        return None;
    }
    let len = u32::from_le_bytes(len.try_into().ok()?) as usize;
    let asset_len = body.len().checked_sub(len)?;
    Some(body.split_at(asset_len))
}

/// The asset without any manifest trailer.
pub(crate) fn strip(data: &[u8]) -> &[u8] {
    split(data).map_or(data, |(asset, _)| asset)
}

pub(crate) fn parse(manifest: &[u8]) -> Result<EmbeddedManifest, String> {
    serde_json::from_slice(manifest).map_err(|e| format!("invalid manifest data: {e}"))
}
