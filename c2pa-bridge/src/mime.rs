//! File extension to MIME type mapping.

use std::path::Path;

use crate::error::{C2paError, C2paResult};

/// Derive the MIME type of an asset from its file extension.
pub fn format_from_path(path: &Path) -> C2paResult<&'static str> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    let format = match extension.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "avif" => "image/avif",
        "heic" => "image/heic",
        "heif" => "image/heif",
        "tif" | "tiff" => "image/tiff",
        "dng" => "image/dng",
        "svg" => "image/svg+xml",
        "mp4" | "m4v" => "video/mp4",
        "mov" => "video/quicktime",
        "avi" => "video/x-msvideo",
        "mp3" => "audio/mpeg",
        "m4a" => "audio/mp4",
        "wav" => "audio/wav",
        "pdf" => "application/pdf",
        "c2pa" => "application/c2pa",
        _ => {
            return Err(C2paError::NotSupported(format!(
                "Could not determine MIME type for file: {}",
                path.display()
            )))
        }
    };

    Ok(format)
}
