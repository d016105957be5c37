//! PKCS#12 (`.pfx`) archives: a leaf certificate, optional CA certificates and
//! a shrouded private key, all unlocked with one secret.

use crate::cert::error::{CertificateError, ClientCredentialError, Pkcs12Error};
use crate::cert::parsing::{DecodedCredential, MAX_CERT_CHAIN_LENGTH};
use crate::cert::{Certificate, PrivateKey};
use openssl::pkcs12::Pkcs12;
use openssl::x509::X509Ref;
use zeroize::Zeroizing;

/// Parses the outer PFX structure without decrypting anything.
///
/// Returns `None` when `data` is not a PKCS#12 archive, so the caller can fall
/// back to other DER encodings.
pub(crate) fn parse_archive(data: &[u8]) -> Option<Pkcs12> {
    Pkcs12::from_der(data).ok()
}

/// Unlocks `archive` with `secret` (an absent secret is the empty password) and
/// extracts the chain, leaf first, and the key as PKCS#8.
pub(crate) fn decode_archive(
    archive: &Pkcs12,
    secret: Option<&str>,
) -> Result<DecodedCredential, ClientCredentialError> {
    let parsed = archive
        .parse2(secret.unwrap_or_default())
        .map_err(|e| Pkcs12Error::Unlock(e.to_string()))?;

    let leaf = parsed.cert.ok_or(CertificateError::EmptyChain)?;
    let mut cert_chain = vec![to_certificate(&leaf)?];
    for ca in parsed.ca.iter().flatten() {
        if cert_chain.len() >= MAX_CERT_CHAIN_LENGTH {
            return Err(CertificateError::TooManyCertificates {
                max: MAX_CERT_CHAIN_LENGTH,
            }
            .into());
        }
        cert_chain.push(to_certificate(ca)?);
    }

    let private_key = match parsed.pkey {
        Some(pkey) => {
            let der = Zeroizing::new(
                pkey.private_key_to_pkcs8()
                    .map_err(|e| Pkcs12Error::Export(e.to_string()))?,
            );
            Some(PrivateKey::try_from(der.as_slice())?)
        }
        None => None,
    };

    Ok(DecodedCredential {
        cert_chain,
        private_key,
    })
}

fn to_certificate(cert: &X509Ref) -> Result<Certificate, ClientCredentialError> {
    let der = cert
        .to_der()
        .map_err(|e| Pkcs12Error::Export(e.to_string()))?;
    Ok(Certificate::try_from(der)?)
}
