//! OpenSSL-backed signing callback
//!
//! [`PemKeySigner`] signs on the host with an ECDSA P-256 key (ES256), for
//! use with [`Signer::from_callback`](crate::Signer::from_callback) when the
//! key should never be handed to the engine.

use openssl::bn::BigNum;
use openssl::ecdsa::EcdsaSig;
use openssl::hash::{hash, MessageDigest};
use openssl::pkey::{PKey, Private};
use openssl::x509::X509;

use crate::error::{C2paError, C2paResult};
use crate::signer::{BoxError, SignCallback, SigningAlg};

/// Width of each ES256 signature component.
const P256_FIELD_LEN: i32 = 32;

/// ES256 signer holding a PEM private key and its certificate chain.
pub struct PemKeySigner {
    private_key: PKey<Private>,
    cert_chain_pem: String,
}

impl PemKeySigner {
    /// Create a signer from PEM-encoded key and certificate chain.
    ///
    /// # Arguments
    ///
    /// * `key_pem` - PEM-encoded ECDSA P-256 private key
    /// * `cert_chain_pem` - PEM-encoded certificate chain (leaf cert first)
    pub fn from_pem(key_pem: &[u8], cert_chain_pem: &[u8]) -> C2paResult<Self> {
        let private_key = PKey::private_key_from_pem(key_pem)
            .map_err(|e| C2paError::InvalidConfiguration(format!("Invalid private key: {e}")))?;
        if private_key.ec_key().is_err() {
            return Err(C2paError::InvalidConfiguration(
                "ES256 requires an EC private key".into(),
            ));
        }

        let chain = X509::stack_from_pem(cert_chain_pem)
            .map_err(|e| C2paError::InvalidConfiguration(format!("Invalid certificate: {e}")))?;
        if chain.is_empty() {
            return Err(C2paError::InvalidConfiguration(
                "Certificate chain is empty".into(),
            ));
        }

        let cert_chain_pem = String::from_utf8(cert_chain_pem.to_vec())
            .map_err(|e| C2paError::Encoding(format!("Certificate chain is not UTF-8: {e}")))?;

        Ok(Self {
            private_key,
            cert_chain_pem,
        })
    }

    /// Create a signer from file paths.
    pub fn from_files(
        key_path: impl AsRef<std::path::Path>,
        cert_path: impl AsRef<std::path::Path>,
    ) -> C2paResult<Self> {
        let key_pem = zeroize::Zeroizing::new(std::fs::read(key_path)?);
        let cert_pem = std::fs::read(cert_path)?;

        Self::from_pem(&key_pem, &cert_pem)
    }

    /// PEM certificate chain to pass alongside this callback.
    pub fn cert_chain_pem(&self) -> &str {
        &self.cert_chain_pem
    }

    /// Always ES256.
    pub fn algorithm(&self) -> SigningAlg {
        SigningAlg::Es256
    }

    /// Sign with SHA-256, returning the fixed-width `r || s` form.
    pub fn sign_raw(&self, data: &[u8]) -> Result<Vec<u8>, openssl::error::ErrorStack> {
        let digest = hash(MessageDigest::sha256(), data)?;
        let ec_key = self.private_key.ec_key()?;
        let sig = EcdsaSig::sign(&digest, &ec_key)?;

        let mut out = sig.r().to_vec_padded(P256_FIELD_LEN)?;
        out.extend(sig.s().to_vec_padded(P256_FIELD_LEN)?);
        Ok(out)
    }

    /// Verify an `r || s` signature against this signer's public key.
    pub fn verify_raw(&self, data: &[u8], signature: &[u8]) -> bool {
        let check = || -> Result<bool, openssl::error::ErrorStack> {
            if signature.len() != 2 * P256_FIELD_LEN as usize {
                return Ok(false);
            }
            let (r, s) = signature.split_at(P256_FIELD_LEN as usize);
            let sig = EcdsaSig::from_private_components(
                BigNum::from_slice(r)?,
                BigNum::from_slice(s)?,
            )?;
            let digest = hash(MessageDigest::sha256(), data)?;
            sig.verify(&digest, &*self.private_key.ec_key()?)
        };
        check().unwrap_or(false)
    }
}

impl SignCallback for PemKeySigner {
    fn sign(&self, data: &[u8]) -> Result<Vec<u8>, BoxError> {
        Ok(self.sign_raw(data)?)
    }
}

/// Generate a self-signed certificate for testing purposes.
///
/// **WARNING**: Do not use in production! Self-signed certificates
/// will not be trusted by C2PA validators.
#[cfg(test)]
pub(crate) fn generate_test_certificate() -> Result<(Vec<u8>, Vec<u8>), openssl::error::ErrorStack> {
    use openssl::asn1::Asn1Time;
    use openssl::ec::{EcGroup, EcKey};
    use openssl::nid::Nid;
    use openssl::x509::extension::{BasicConstraints, KeyUsage};
    use openssl::x509::{X509Builder, X509NameBuilder};

    let group = EcGroup::from_curve_name(Nid::X9_62_PRIME256V1)?;
    let ec_key = EcKey::generate(&group)?;
    let private_key = PKey::from_ec_key(ec_key)?;

    let mut x509_builder = X509Builder::new()?;
    x509_builder.set_version(2)?;

    let serial = BigNum::from_u32(1)?;
    let serial = serial.to_asn1_integer()?;
    x509_builder.set_serial_number(&serial)?;

    let mut name_builder = X509NameBuilder::new()?;
    name_builder.append_entry_by_text("C", "US")?;
    name_builder.append_entry_by_text("O", "C2PA Bridge Test")?;
    name_builder.append_entry_by_text("CN", "C2PA Bridge Test Signer")?;
    let name = name_builder.build();
    x509_builder.set_subject_name(&name)?;
    x509_builder.set_issuer_name(&name)?;

    let not_before = Asn1Time::days_from_now(0)?;
    let not_after = Asn1Time::days_from_now(365)?;
    x509_builder.set_not_before(&not_before)?;
    x509_builder.set_not_after(&not_after)?;

    x509_builder.set_pubkey(&private_key)?;
    x509_builder.append_extension(BasicConstraints::new().critical().build()?)?;
    x509_builder.append_extension(KeyUsage::new().critical().digital_signature().build()?)?;

    x509_builder.sign(&private_key, MessageDigest::sha256())?;
    let cert = x509_builder.build();

    Ok((private_key.private_key_to_pem_pkcs8()?, cert.to_pem()?))
}
