//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex, Once};

use c2pa_bridge::{BoxError, Engine, ManifestDefinition, SignCallback, Signer, SignerInfo, SigningAlg};
use openssl::asn1::Asn1Time;
use openssl::bn::BigNum;
use openssl::ec::{EcGroup, EcKey};
use openssl::ecdsa::EcdsaSig;
use openssl::hash::{hash, MessageDigest};
use openssl::nid::Nid;
use openssl::pkey::{PKey, Private};
use openssl::x509::extension::{BasicConstraints, KeyUsage};
use openssl::x509::{X509Builder, X509NameBuilder};

/// Bytes standing in for a JPEG asset.
pub const ASSET: &[u8] = b"\xFF\xD8\xFF\xE0fake jpeg payload for signing tests\xFF\xD9";

static TRACING: Once = Once::new();

/// Route tracing output through the test harness, once per binary.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("c2pa_bridge=debug")),
            )
            .with_test_writer()
            .try_init();
    });
}

/// An engine backed by the in-process fake.
pub fn engine() -> Engine {
    init_tracing();
    unsafe { Engine::from_symbols(c2pa_bridge_testkit::resolve) }.expect("fake engine resolves")
}

/// Self-signed ES256 key and certificate, both PEM.
pub struct TestIdentity {
    pub key: PKey<Private>,
    pub key_pem: Vec<u8>,
    pub cert_pem: String,
}

pub fn test_identity() -> TestIdentity {
    let group = EcGroup::from_curve_name(Nid::X9_62_PRIME256V1).unwrap();
    let key = PKey::from_ec_key(EcKey::generate(&group).unwrap()).unwrap();

    let mut name = X509NameBuilder::new().unwrap();
    name.append_entry_by_text("O", "C2PA Bridge Test").unwrap();
    name.append_entry_by_text("CN", "Integration Signer").unwrap();
    let name = name.build();

    let mut builder = X509Builder::new().unwrap();
    builder.set_version(2).unwrap();
    builder
        .set_serial_number(&BigNum::from_u32(7).unwrap().to_asn1_integer().unwrap())
        .unwrap();
    builder.set_subject_name(&name).unwrap();
    builder.set_issuer_name(&name).unwrap();
    builder.set_not_before(&Asn1Time::days_from_now(0).unwrap()).unwrap();
    builder.set_not_after(&Asn1Time::days_from_now(30).unwrap()).unwrap();
    builder.set_pubkey(&key).unwrap();
    builder
        .append_extension(BasicConstraints::new().critical().build().unwrap())
        .unwrap();
    builder
        .append_extension(KeyUsage::new().critical().digital_signature().build().unwrap())
        .unwrap();
    builder.sign(&key, MessageDigest::sha256()).unwrap();

    let cert_pem = String::from_utf8(builder.build().to_pem().unwrap()).unwrap();
    let key_pem = key.private_key_to_pem_pkcs8().unwrap();
    TestIdentity {
        key,
        key_pem,
        cert_pem,
    }
}

/// ES256 over SHA-256 with the fixed-width `r || s` encoding.
pub fn es256_sign(key: &PKey<Private>, data: &[u8]) -> Result<Vec<u8>, BoxError> {
    let digest = hash(MessageDigest::sha256(), data)?;
    let sig = EcdsaSig::sign(&digest, &*key.ec_key()?)?;
    let mut out = sig.r().to_vec_padded(32)?;
    out.extend(sig.s().to_vec_padded(32)?);
    Ok(out)
}

pub fn es256_verify(key: &PKey<Private>, data: &[u8], signature: &[u8]) -> bool {
    let (r, s) = signature.split_at(32);
    let sig = EcdsaSig::from_private_components(
        BigNum::from_slice(r).unwrap(),
        BigNum::from_slice(s).unwrap(),
    )
    .unwrap();
    let digest = hash(MessageDigest::sha256(), data).unwrap();
    sig.verify(&digest, &*key.ec_key().unwrap()).unwrap()
}

/// A callback that signs with openssl and records every payload it saw.
#[derive(Clone)]
pub struct RecordingSigner {
    pub key: PKey<Private>,
    pub seen: Arc<Mutex<Vec<(Vec<u8>, Vec<u8>)>>>,
}

impl SignCallback for RecordingSigner {
    fn sign(&self, data: &[u8]) -> Result<Vec<u8>, BoxError> {
        let signature = es256_sign(&self.key, data)?;
        self.seen
            .lock()
            .map_err(|_| "poisoned")?
            .push((data.to_vec(), signature.clone()));
        Ok(signature)
    }
}

/// Engine-side signer from a fresh test identity.
pub fn info_signer(engine: &Engine) -> Signer {
    let identity = test_identity();
    let info = SignerInfo::new(
        SigningAlg::Es256,
        identity.cert_pem.as_bytes(),
        identity.key_pem.clone(),
        None,
    );
    Signer::from_info(engine, &info).expect("signer from info")
}

pub fn manifest(title: &str) -> ManifestDefinition {
    ManifestDefinition::new("c2pa-bridge-tests/0.1")
        .with_title(title)
        .with_format("image/jpeg")
        .with_created_action()
}
