//! Binding configuration
//!
//! Controls where the native library is found and which engine settings are
//! applied once it is loaded. Values come from environment variables with
//! platform defaults.

use std::path::{Path, PathBuf};

use crate::error::{C2paError, C2paResult};

/// Platform file name of the native engine library.
pub const DEFAULT_LIBRARY_NAME: &str = if cfg!(target_os = "macos") {
    "libc2pa_c.dylib"
} else if cfg!(windows) {
    "c2pa_c.dll"
} else {
    "libc2pa_c.so"
};

/// Native library discovery and settings configuration
#[derive(Debug, Clone)]
pub struct LibraryConfig {
    /// Explicit library file, tried before any search directory
    pub library_path: Option<PathBuf>,
    /// File name probed in every search directory (default: platform name)
    pub library_name: String,
    /// Extra directories searched after the explicit override
    pub search_dirs: Vec<PathBuf>,
    /// Engine settings file applied after loading (`.json` or `.toml`)
    pub settings_path: Option<PathBuf>,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            library_path: None,
            library_name: DEFAULT_LIBRARY_NAME.to_string(),
            search_dirs: Vec::new(),
            settings_path: None,
        }
    }
}

impl LibraryConfig {
    /// Load configuration from environment variables
    ///
    /// - `C2PA_LIBRARY_PATH`: explicit library file
    /// - `C2PA_LIBRARY_NAME`: library file name override
    /// - `C2PA_SETTINGS_PATH`: settings file applied on load
    pub fn from_env() -> Self {
        let library_path = std::env::var_os("C2PA_LIBRARY_PATH")
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);

        let library_name = std::env::var("C2PA_LIBRARY_NAME")
            .ok()
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| DEFAULT_LIBRARY_NAME.to_string());

        let settings_path = std::env::var_os("C2PA_SETTINGS_PATH")
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);

        Self {
            library_path,
            library_name,
            search_dirs: Vec::new(),
            settings_path,
        }
    }

    /// Add a directory to search after the explicit override.
    pub fn with_search_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.search_dirs.push(dir.into());
        self
    }

    /// Read the configured settings file, if any.
    pub fn read_settings(&self) -> C2paResult<Option<(String, SettingsFormat)>> {
        let Some(path) = &self.settings_path else {
            return Ok(None);
        };
        let format = SettingsFormat::from_path(path)?;
        let settings = std::fs::read_to_string(path)?;
        Ok(Some((settings, format)))
    }
}

/// Encoding of an engine settings document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsFormat {
    Json,
    Toml,
}

impl SettingsFormat {
    /// Format tag passed to the engine.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Toml => "toml",
        }
    }

    /// Infer the format from a file extension.
    pub fn from_path(path: &Path) -> C2paResult<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase());

        match ext.as_deref() {
            Some("json") => Ok(Self::Json),
            Some("toml") => Ok(Self::Toml),
            _ => Err(C2paError::InvalidConfiguration(format!(
                "settings file must end in .json or .toml: {}",
                path.display()
            ))),
        }
    }
}
