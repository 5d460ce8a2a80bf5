//! Shared library discovery and `dlopen`-based loading.

use std::ffi::{c_void, CStr, CString};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::config::LibraryConfig;
use crate::error::{C2paError, C2paResult};

/// An open handle to the native shared library.
pub(crate) struct Library {
    handle: *mut c_void,
    path: PathBuf,
}

// SAFETY: a dlopen handle is process-global and dlsym/dlclose are thread-safe.
unsafe impl Send for Library {}
unsafe impl Sync for Library {}

impl Library {
    /// Open the library at `path`, resolving all symbols eagerly.
    #[cfg(unix)]
    pub(crate) fn open(path: &Path) -> Result<Self, String> {
        use std::os::unix::ffi::OsStrExt;

        let c_path =
            CString::new(path.as_os_str().as_bytes()).map_err(|_| "invalid library path")?;

        // SAFETY: c_path is a valid NUL-terminated string for the duration of the call.
        let handle = unsafe { libc::dlopen(c_path.as_ptr(), libc::RTLD_NOW | libc::RTLD_LOCAL) };
        if handle.is_null() {
            return Err(last_dl_error());
        }

        Ok(Self {
            handle,
            path: path.to_path_buf(),
        })
    }

    #[cfg(not(unix))]
    pub(crate) fn open(_path: &Path) -> Result<Self, String> {
        Err("dynamic loading is only supported on unix targets".to_string())
    }

    /// Look up an exported symbol by name.
    #[cfg(unix)]
    pub(crate) fn symbol(&self, name: &str) -> Option<*const c_void> {
        let c_name = CString::new(name).ok()?;
        // SAFETY: handle is a live dlopen handle and c_name is NUL-terminated.
        let sym = unsafe { libc::dlsym(self.handle, c_name.as_ptr()) };
        (!sym.is_null()).then_some(sym as *const c_void)
    }

    #[cfg(not(unix))]
    pub(crate) fn symbol(&self, _name: &str) -> Option<*const c_void> {
        None
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(unix)]
impl Drop for Library {
    fn drop(&mut self) {
        // SAFETY: handle came from dlopen and is closed exactly once.
        unsafe {
            libc::dlclose(self.handle);
        }
    }
}

#[cfg(unix)]
fn last_dl_error() -> String {
    // SAFETY: dlerror returns a thread-local string or null.
    let err = unsafe { libc::dlerror() };
    if err.is_null() {
        "unknown error".to_string()
    } else {
        // SAFETY: non-null dlerror results are NUL-terminated.
        unsafe { CStr::from_ptr(err) }.to_string_lossy().into_owned()
    }
}

/// Platform-triple subdirectories probed beneath every search base.
pub(crate) fn platform_triples() -> &'static [&'static str] {
    if cfg!(all(target_os = "macos", target_arch = "aarch64")) {
        &["aarch64-apple-darwin", "universal-apple-darwin"]
    } else if cfg!(all(target_os = "macos", target_arch = "x86_64")) {
        &["x86_64-apple-darwin", "universal-apple-darwin"]
    } else if cfg!(all(target_os = "linux", target_arch = "aarch64")) {
        &["aarch64-unknown-linux-gnu"]
    } else if cfg!(all(target_os = "linux", target_arch = "x86_64")) {
        &["x86_64-unknown-linux-gnu"]
    } else if cfg!(all(target_os = "windows", target_arch = "x86_64")) {
        &["x86_64-pc-windows-msvc"]
    } else {
        &[]
    }
}

/// Environment variable holding the system library search path.
fn system_path_var() -> &'static str {
    if cfg!(target_os = "macos") {
        "DYLD_LIBRARY_PATH"
    } else if cfg!(windows) {
        "PATH"
    } else {
        "LD_LIBRARY_PATH"
    }
}

/// Every file path the loader will try, in probe order.
pub(crate) fn candidate_paths(config: &LibraryConfig) -> Vec<PathBuf> {
    let mut bases: Vec<PathBuf> = config.search_dirs.clone();

    if let Ok(cwd) = std::env::current_dir() {
        bases.push(cwd.clone());
        bases.push(cwd.join("artifacts"));
        bases.push(cwd.join("libs"));
    }

    if let Some(exe_dir) = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
    {
        bases.push(exe_dir.clone());
        bases.push(exe_dir.join("libs"));
    }

    let mut candidates = Vec::new();
    if let Some(explicit) = &config.library_path {
        candidates.push(explicit.clone());
    }

    for base in &bases {
        candidates.push(base.join(&config.library_name));
        for triple in platform_triples() {
            candidates.push(base.join(triple).join(&config.library_name));
        }
    }

    if let Some(system) = std::env::var_os(system_path_var()) {
        for dir in std::env::split_paths(&system).filter(|d| !d.as_os_str().is_empty()) {
            candidates.push(dir.join(&config.library_name));
        }
    }

    let mut seen = std::collections::HashSet::new();
    candidates.retain(|path| seen.insert(path.clone()));
    candidates
}

/// Find and open the native library.
///
/// Falls back to handing the bare library name to the system loader. The
/// error lists every path that was tried.
pub(crate) fn load_library(config: &LibraryConfig) -> C2paResult<Library> {
    let candidates = candidate_paths(config);
    let mut searched = Vec::with_capacity(candidates.len() + 1);

    for path in candidates {
        if path.is_file() {
            match Library::open(&path) {
                Ok(library) => {
                    info!(path = %path.display(), "Loaded native C2PA library");
                    return Ok(library);
                }
                Err(reason) => {
                    warn!(path = %path.display(), %reason, "Failed to load native library candidate");
                    if config.library_path.as_deref() == Some(path.as_path()) {
                        return Err(C2paError::LibraryLoad { path, reason });
                    }
                }
            }
        } else {
            debug!(path = %path.display(), "Native library candidate absent");
        }
        searched.push(path);
    }

    let bare = PathBuf::from(&config.library_name);
    match Library::open(&bare) {
        Ok(library) => {
            info!(name = %config.library_name, "Loaded native C2PA library from system search path");
            Ok(library)
        }
        Err(reason) => {
            debug!(name = %config.library_name, %reason, "System loader could not find library");
            searched.push(bare);
            Err(C2paError::LibraryNotFound { searched })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_named(name: &str) -> LibraryConfig {
        LibraryConfig {
            library_name: name.to_string(),
            ..LibraryConfig::default()
        }
    }

    #[test]
    fn test_explicit_override_is_probed_first() {
        let config = LibraryConfig {
            library_path: Some(PathBuf::from("/opt/c2pa/custom.so")),
            ..config_named("libc2pa_c.so")
        };
        let candidates = candidate_paths(&config);
        assert_eq!(candidates[0], PathBuf::from("/opt/c2pa/custom.so"));
    }

    #[test]
    fn test_search_dirs_precede_working_directory() {
        let extra = PathBuf::from("/srv/c2pa-libs");
        let config = LibraryConfig {
            search_dirs: vec![extra.clone()],
            ..config_named("libc2pa_c.so")
        };
        let candidates = candidate_paths(&config);
        assert_eq!(candidates[0], extra.join("libc2pa_c.so"));

        let cwd = std::env::current_dir().expect("cwd");
        let cwd_pos = candidates
            .iter()
            .position(|p| p == &cwd.join("libc2pa_c.so"))
            .expect("cwd probed");
        let artifacts_pos = candidates
            .iter()
            .position(|p| p == &cwd.join("artifacts").join("libc2pa_c.so"))
            .expect("artifacts probed");
        assert!(cwd_pos > 0);
        assert!(artifacts_pos > cwd_pos);
    }

    #[test]
    fn test_triples_are_combined_with_each_base() {
        let config = config_named("libc2pa_c.so");
        let candidates = candidate_paths(&config);
        let cwd = std::env::current_dir().expect("cwd");
        for triple in platform_triples() {
            assert!(candidates.contains(&cwd.join(triple).join("libc2pa_c.so")));
        }
    }

    #[test]
    fn test_candidates_are_deduplicated() {
        let cwd = std::env::current_dir().expect("cwd");
        let config = LibraryConfig {
            search_dirs: vec![cwd.clone()],
            ..config_named("libc2pa_c.so")
        };
        let candidates = candidate_paths(&config);
        let hits = candidates
            .iter()
            .filter(|p| **p == cwd.join("libc2pa_c.so"))
            .count();
        assert_eq!(hits, 1);
    }

    #[test]
    fn test_missing_library_lists_searched_paths() {
        let config = config_named("libc2pa_definitely_absent_4711.so");
        let err = load_library(&config).err().expect("library must not load");
        match err {
            C2paError::LibraryNotFound { searched } => {
                assert!(searched.len() > 1);
                assert_eq!(
                    searched.last(),
                    Some(&PathBuf::from("libc2pa_definitely_absent_4711.so"))
                );
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
