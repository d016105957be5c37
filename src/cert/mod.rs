//! `Certificate`, `PrivateKey`, `Thumbprint` and `ClientCredential` types.
//!
//! These types wrap DER-encoded bytes and validate them at construction time.

use crate::cert::error::{CertificateError, ClientCredentialError, PrivateKeyError};
use crate::cert::parsing::{
    decode_credential, parse_der_encoded_bytes_as_x509_certificate, to_certificate_vec,
    MAX_CERT_CHAIN_LENGTH,
};
use crate::secret::SecretBuffer;
use pkcs8::PrivateKeyInfo;
use ring::digest::{digest, SHA1_FOR_LEGACY_USE_ONLY};
use std::fmt;
use x509_parser::certificate::X509Certificate;
use zeroize::{Zeroize, ZeroizeOnDrop};

pub mod error;
pub(crate) mod parsing;
mod pkcs12;

/// A single DER-encoded X.509 certificate.
///
/// Invariant: instances are always validated as parseable DER-encoded X.509.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Certificate(Vec<u8>);

impl Certificate {
    /// Returns the certificate bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Returns the SHA-1 thumbprint of the DER encoding.
    pub fn thumbprint(&self) -> Thumbprint {
        Thumbprint::of(&self.0)
    }

    /// Returns the subject distinguished name, e.g. `CN=test-client`.
    ///
    /// # Errors
    ///
    /// Returns [`CertificateError::ParseX509Certificate`] if parsing fails.
    pub fn subject(&self) -> Result<String, CertificateError> {
        let x509 = parse_der_encoded_bytes_as_x509_certificate(&self.0)?;
        Ok(x509.subject().to_string())
    }
}

impl AsRef<[u8]> for Certificate {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<X509Certificate<'_>> for Certificate {
    fn from(cert: X509Certificate<'_>) -> Self {
        Self(cert.as_raw().to_vec())
    }
}

impl TryFrom<&[u8]> for Certificate {
    type Error = CertificateError;

    fn try_from(der_bytes: &[u8]) -> Result<Self, Self::Error> {
        parse_der_encoded_bytes_as_x509_certificate(der_bytes)?;
        Ok(Self(Vec::from(der_bytes)))
    }
}

impl TryFrom<Vec<u8>> for Certificate {
    type Error = CertificateError;

    fn try_from(der_bytes: Vec<u8>) -> Result<Self, Self::Error> {
        parse_der_encoded_bytes_as_x509_certificate(&der_bytes)?;
        Ok(Self(der_bytes))
    }
}

/// A DER-encoded private key in PKCS#8 format.
///
/// Invariant: instances are always validated as parseable PKCS#8.
///
/// This type is zeroized on drop.
#[derive(Clone, Eq, PartialEq, Zeroize, ZeroizeOnDrop)]
pub struct PrivateKey(Vec<u8>);

impl PrivateKey {
    /// Returns the private key bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl AsRef<[u8]> for PrivateKey {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl TryFrom<&[u8]> for PrivateKey {
    type Error = PrivateKeyError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        // Validate that the bytes are a valid PKCS#8 private key.
        PrivateKeyInfo::try_from(bytes).map_err(PrivateKeyError::DecodePkcs8)?;
        Ok(Self(Vec::from(bytes)))
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateKey")
            .field("len", &self.0.len())
            .finish()
    }
}

/// Uppercase hexadecimal SHA-1 digest of a certificate's DER encoding.
///
/// This is the fingerprint certificate stores index credentials by.
/// Comparisons against user input go through [`Thumbprint::matches`], which
/// ignores ASCII case.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct Thumbprint(String);

impl Thumbprint {
    /// Computes the thumbprint of DER-encoded certificate bytes.
    pub fn of(der: &[u8]) -> Self {
        let sha1 = digest(&SHA1_FOR_LEGACY_USE_ONLY, der);
        Self(hex::encode_upper(sha1.as_ref()))
    }

    /// Returns the thumbprint as uppercase hex.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` if `candidate` names this thumbprint, ignoring ASCII case.
    pub fn matches(&self, candidate: &str) -> bool {
        self.0.eq_ignore_ascii_case(candidate)
    }
}

impl fmt::Display for Thumbprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Thumbprint {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A client identity: a certificate chain (leaf first) and, usually, the
/// private key matching the leaf.
///
/// Invariant: the chain is never empty and holds at most 16 certificates.
/// The private key, if any, is zeroized when the credential is dropped.
#[derive(Clone, Eq, PartialEq)]
pub struct ClientCredential {
    thumbprint: Thumbprint,
    cert_chain: Vec<Certificate>,
    private_key: Option<PrivateKey>,
}

impl ClientCredential {
    /// Decodes a credential from PEM, PKCS#12 or DER data.
    ///
    /// PEM data holds one or more `CERTIFICATE` blocks, leaf first, and at most
    /// one `PRIVATE KEY` or `ENCRYPTED PRIVATE KEY` block. An encrypted key is
    /// unlocked with `secret`. Data without any PEM block is decoded as a
    /// PKCS#12 archive unlocked with `secret` if it is one, and otherwise as a
    /// concatenated DER certificate chain without a key.
    ///
    /// # Errors
    ///
    /// Returns a [`ClientCredentialError`] if the certificates cannot be parsed,
    /// the key is not PKCS#8, or the secret does not unlock the key or archive.
    pub fn from_pem(
        data: &[u8],
        secret: Option<&SecretBuffer>,
    ) -> Result<Self, ClientCredentialError> {
        let decoded = decode_credential(data, secret.and_then(SecretBuffer::expose))?;
        Self::from_parts(decoded.cert_chain, decoded.private_key)
    }

    /// Creates a credential from a concatenated DER certificate chain and an
    /// optional DER PKCS#8 private key.
    ///
    /// # Errors
    ///
    /// Returns a [`ClientCredentialError`] if the inputs cannot be parsed.
    pub fn from_der(
        cert_chain_der: &[u8],
        private_key_der: Option<&[u8]>,
    ) -> Result<Self, ClientCredentialError> {
        let cert_chain = to_certificate_vec(cert_chain_der)?;
        let private_key = private_key_der.map(PrivateKey::try_from).transpose()?;
        Self::from_parts(cert_chain, private_key)
    }

    /// Creates a credential from already validated parts.
    ///
    /// # Errors
    ///
    /// Returns [`CertificateError::EmptyChain`] or
    /// [`CertificateError::TooManyCertificates`] if the chain length is out of bounds.
    pub fn from_parts(
        cert_chain: Vec<Certificate>,
        private_key: Option<PrivateKey>,
    ) -> Result<Self, ClientCredentialError> {
        let leaf = cert_chain.first().ok_or(CertificateError::EmptyChain)?;
        if cert_chain.len() > MAX_CERT_CHAIN_LENGTH {
            return Err(CertificateError::TooManyCertificates {
                max: MAX_CERT_CHAIN_LENGTH,
            }
            .into());
        }

        Ok(Self {
            thumbprint: leaf.thumbprint(),
            cert_chain,
            private_key,
        })
    }

    /// Returns the thumbprint of the leaf certificate.
    pub fn thumbprint(&self) -> &Thumbprint {
        &self.thumbprint
    }

    /// Returns the leaf certificate.
    pub fn leaf(&self) -> &Certificate {
        &self.cert_chain[0]
    }

    /// Returns the certificate chain. The first certificate is the leaf.
    pub fn cert_chain(&self) -> &[Certificate] {
        &self.cert_chain
    }

    /// Returns the private key, if the credential carries one.
    pub fn private_key(&self) -> Option<&PrivateKey> {
        self.private_key.as_ref()
    }

    /// Returns `true` if the credential carries a private key.
    pub fn has_private_key(&self) -> bool {
        self.private_key.is_some()
    }

    /// Returns the subject distinguished name of the leaf certificate.
    ///
    /// # Errors
    ///
    /// Returns [`CertificateError::ParseX509Certificate`] if parsing fails.
    pub fn subject(&self) -> Result<String, CertificateError> {
        self.leaf().subject()
    }
}

impl fmt::Debug for ClientCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientCredential")
            .field("thumbprint", &self.thumbprint)
            .field("chain_len", &self.cert_chain.len())
            .field("has_private_key", &self.has_private_key())
            .finish()
    }
}
