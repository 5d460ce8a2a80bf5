//! Signer objects: engine-held keys or host callbacks.

use std::ffi::{c_char, c_int, c_void};

use sha3::{Digest, Sha3_256};

use crate::engine::arg;
use crate::spy;

pub type SignerCallback =
    unsafe extern "C" fn(*const c_void, *const u8, usize, *mut u8, usize) -> isize;

/// Space reserved for a signature inside the manifest.
pub const RESERVE_SIZE: usize = 10_000;

const ALG_NAMES: [&str; 7] = ["es256", "es384", "es512", "ps256", "ps384", "ps512", "ed25519"];

#[repr(C)]
pub struct FakeSignerInfo {
    alg: *const c_char,
    sign_cert: *const c_char,
    private_key: *const c_char,
    ta_url: *const c_char,
}

enum Key {
    Engine(Vec<u8>),
    Callback {
        context: *const c_void,
        callback: SignerCallback,
    },
}

pub struct FakeSigner {
    alg: &'static str,
    key: Key,
    pub(crate) ta_url: Option<String>,
}

impl FakeSigner {
    pub(crate) fn alg(&self) -> &'static str {
        self.alg
    }

    /// Sign `claim`, returning the signature or a native error string.
    pub(crate) fn sign(&self, claim: &[u8]) -> Result<Vec<u8>, (&'static str, String)> {
        match &self.key {
            Key::Engine(key) => Ok(Sha3_256::new()
                .chain_update(key)
                .chain_update(claim)
                .finalize()
                .to_vec()),
            Key::Callback { context, callback } => {
                let mut out = vec![0u8; RESERVE_SIZE];
                // SAFETY: the host registered the callback with this context,
                // and claim/out are valid for the stated lengths.
                let n = unsafe {
                    callback(*context, claim.as_ptr(), claim.len(), out.as_mut_ptr(), out.len())
                };
                match usize::try_from(n) {
                    Ok(n) if n > 0 && n <= out.len() => {
                        out.truncate(n);
                        Ok(out)
                    }
                    Ok(0) => Err(("Signature", "callback returned an empty signature".into())),
                    _ => Err(("Signature", "callback returned an error".into())),
                }
            }
        }
    }
}

fn check_certs(certs: &str) -> bool {
    certs.contains("-----BEGIN CERTIFICATE-----")
}

unsafe fn opt_arg(ptr: *const c_char, what: &str) -> Result<Option<String>, ()> {
    if ptr.is_null() {
        return Ok(None);
    }
    arg(ptr, what).map(|s| Some(s.to_string())).ok_or(())
}

pub unsafe extern "C" fn c2pa_signer_create(
    context: *const c_void,
    callback: SignerCallback,
    alg: c_int,
    certs: *const c_char,
    tsa_url: *const c_char,
) -> *mut FakeSigner {
    spy::record("c2pa_signer_create");
    let Some(alg) = usize::try_from(alg).ok().and_then(|i| ALG_NAMES.get(i).copied()) else {
        spy::set_error("Signature", format_args!("invalid signing algorithm {alg}"));
        return std::ptr::null_mut();
    };
    let Some(certs) = arg(certs, "certificates") else {
        return std::ptr::null_mut();
    };
    if !check_certs(certs) {
        spy::set_error("Signature", "no certificates found in chain");
        return std::ptr::null_mut();
    }
    let Ok(ta_url) = opt_arg(tsa_url, "timestamp URL") else {
        return std::ptr::null_mut();
    };

    Box::into_raw(Box::new(FakeSigner {
        alg,
        key: Key::Callback { context, callback },
        ta_url,
    }))
}

pub unsafe extern "C" fn c2pa_signer_from_info(info: *const FakeSignerInfo) -> *mut FakeSigner {
    spy::record("c2pa_signer_from_info");
    let Some(info) = info.as_ref() else {
        spy::set_error("Other", "signer info is null");
        return std::ptr::null_mut();
    };
    let (Some(alg), Some(certs), Some(key)) = (
        arg(info.alg, "algorithm"),
        arg(info.sign_cert, "certificate"),
        arg(info.private_key, "private key"),
    ) else {
        return std::ptr::null_mut();
    };
    let Some(&alg) = ALG_NAMES.iter().find(|n| n.eq_ignore_ascii_case(alg)) else {
        spy::set_error("Signature", format_args!("unknown algorithm {alg}"));
        return std::ptr::null_mut();
    };
    if !check_certs(certs) {
        spy::set_error("Signature", "no certificates found in chain");
        return std::ptr::null_mut();
    }
    if !key.contains("PRIVATE KEY-----") {
        spy::set_error("Signature", "could not parse private key: expected PEM");
        return std::ptr::null_mut();
    }
    let Ok(ta_url) = opt_arg(info.ta_url, "timestamp URL") else {
        return std::ptr::null_mut();
    };

    Box::into_raw(Box::new(FakeSigner {
        alg,
        key: Key::Engine(key.as_bytes().to_vec()),
        ta_url,
    }))
}

pub unsafe extern "C" fn c2pa_signer_reserve_size(signer: *mut FakeSigner) -> i64 {
    spy::record("c2pa_signer_reserve_size");
    if signer.is_null() {
        spy::set_error("Other", "signer is null");
        return -1;
    }
    RESERVE_SIZE as i64
}

pub unsafe extern "C" fn c2pa_signer_free(signer: *mut FakeSigner) {
    spy::record("c2pa_signer_free");
    if !signer.is_null() {
        drop(Box::from_raw(signer));
    }
}
