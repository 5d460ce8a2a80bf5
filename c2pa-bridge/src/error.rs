//! Error taxonomy and translation of native error signals.
//!
//! The native engine reports failure through a sentinel return value (null
//! handle, negative length, non-zero status) and leaves a `"<Kind> <message>"`
//! string behind, fetched out of band. [`C2paError::from_native_message`]
//! turns that string into a typed error.

use std::path::PathBuf;

use thiserror::Error;

/// Result type for binding operations
pub type C2paResult<T> = Result<T, C2paError>;

/// Errors surfaced by the binding.
///
/// The first group mirrors the kinds reported by the native engine, the
/// second group is raised locally without any native call.
#[derive(Debug, Error)]
pub enum C2paError {
    #[error("Assertion error: {0}")]
    Assertion(String),

    #[error("Assertion not found: {0}")]
    AssertionNotFound(String),

    #[error("Decoding error: {0}")]
    Decoding(String),

    #[error("Encoding error: {0}")]
    Encoding(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("JSON error: {0}")]
    Json(String),

    #[error("Manifest error: {0}")]
    Manifest(String),

    #[error("Manifest not found: {0}")]
    ManifestNotFound(String),

    #[error("Not supported: {0}")]
    NotSupported(String),

    #[error("C2PA error: {0}")]
    Other(String),

    #[error("Remote manifest error: {0}")]
    RemoteManifest(String),

    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    #[error("Signature error: {0}")]
    Signature(String),

    #[error("Verification error: {0}")]
    Verify(String),

    /// Operation attempted on a handle that has already been closed
    #[error("{0} is closed")]
    ClosedResource(&'static str),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The host stream lacks a capability the operation needs
    #[error("Unsupported stream: {0}")]
    UnsupportedStream(String),

    #[error("Failed to create stream channel: {0}")]
    ChannelCreationFailed(String),

    #[error("Failed to create signer: {0}")]
    SignerCreationFailed(String),

    #[error("Invalid manifest data: {0}")]
    InvalidManifestData(String),

    #[error("Failed to serialize manifest JSON: {0}")]
    InvalidManifestJson(String),

    /// No candidate path held a loadable native library
    #[error("Native library not found, searched: [{}]", display_paths(.searched))]
    LibraryNotFound { searched: Vec<PathBuf> },

    /// The library loaded but does not export the full entry-point set
    #[error(
        "Library is missing required function symbols: {}. This could indicate an incomplete \
         or corrupted library installation or a version mismatch with this binding",
        .0.join(", ")
    )]
    MissingSymbols(Vec<&'static str>),

    #[error("Failed to load native library {}: {reason}", .path.display())]
    LibraryLoad { path: PathBuf, reason: String },
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

impl C2paError {
    /// Translate a native `"<Kind> <message>"` error string.
    ///
    /// Unknown kind tokens, and strings without a separator, become
    /// [`C2paError::Other`] carrying the full original string.
    pub fn from_native_message(raw: &str) -> Self {
        let Some((token, message)) = raw.split_once(' ') else {
            return Self::Other(raw.to_string());
        };
        let token = token.strip_suffix(':').unwrap_or(token);
        let message = message.trim_start().to_string();

        match token {
            "Assertion" => Self::Assertion(message),
            "AssertionNotFound" => Self::AssertionNotFound(message),
            "Decoding" => Self::Decoding(message),
            "Encoding" => Self::Encoding(message),
            "FileNotFound" => Self::FileNotFound(message),
            "Io" => Self::Io(message),
            "Json" => Self::Json(message),
            "Manifest" => Self::Manifest(message),
            "ManifestNotFound" => Self::ManifestNotFound(message),
            "NotSupported" => Self::NotSupported(message),
            "Other" => Self::Other(message),
            "RemoteManifest" => Self::RemoteManifest(message),
            "ResourceNotFound" => Self::ResourceNotFound(message),
            "Signature" => Self::Signature(message),
            "Verify" => Self::Verify(message),
            _ => Self::Other(raw.to_string()),
        }
    }

    /// Whether this error kind was reported by the native engine.
    pub fn is_native(&self) -> bool {
        matches!(
            self,
            Self::Assertion(_)
                | Self::AssertionNotFound(_)
                | Self::Decoding(_)
                | Self::Encoding(_)
                | Self::FileNotFound(_)
                | Self::Io(_)
                | Self::Json(_)
                | Self::Manifest(_)
                | Self::ManifestNotFound(_)
                | Self::NotSupported(_)
                | Self::Other(_)
                | Self::RemoteManifest(_)
                | Self::ResourceNotFound(_)
                | Self::Signature(_)
                | Self::Verify(_)
        )
    }
}

impl From<std::io::Error> for C2paError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::FileNotFound(err.to_string()),
            _ => Self::Io(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for C2paError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}
