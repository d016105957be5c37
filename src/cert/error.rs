//! Error types for certificate and private key parsing.

use x509_parser::error::X509Error;

/// An error that may arise parsing X.509 certificates.
#[derive(Debug, thiserror::Error, PartialEq)]
#[non_exhaustive]
pub enum CertificateError {
    /// Error returned by the X.509 parsing library.
    #[error("failed parsing X.509 certificate")]
    ParseX509Certificate(#[from] X509Error),

    /// The input looked like PEM but could not be decoded.
    #[error("failed decoding PEM data")]
    DecodePem(#[from] pem::PemError),

    /// The input contains no certificate.
    #[error("no certificates found")]
    EmptyChain,

    /// The certificate chain exceeds the supported length.
    #[error("certificate chain has too many certificates (max {max})")]
    TooManyCertificates {
        /// Maximum number of certificates accepted in a chain.
        max: usize,
    },
}

/// An error that may arise decoding or decrypting private keys.
#[derive(Debug, thiserror::Error, PartialEq)]
#[non_exhaustive]
pub enum PrivateKeyError {
    /// Error returned by the pkcs#8 private key decoding library.
    #[error("failed decoding PKCS#8 private key")]
    DecodePkcs8(pkcs8::Error),

    /// The encrypted private key could not be decrypted, typically because the
    /// secret is wrong.
    #[error("failed decrypting PKCS#8 private key")]
    Decrypt(pkcs8::Error),

    /// The private key is encrypted and no secret is available to unlock it.
    #[error("private key is encrypted but no secret was supplied")]
    MissingSecret,

    /// The private key uses an encoding other than PKCS#8.
    #[error("unsupported private key encoding: {0}")]
    UnsupportedEncoding(String),

    /// More than one private key was found alongside the certificate.
    #[error("more than one private key found")]
    MultipleKeys,
}

/// An error that may arise unlocking a PKCS#12 (`.pfx`) archive.
///
/// OpenSSL reports failures as an error stack; its rendered text is kept so the
/// error stays comparable.
#[derive(Debug, thiserror::Error, PartialEq)]
#[non_exhaustive]
pub enum Pkcs12Error {
    /// The archive could not be unlocked, typically because the secret is wrong.
    #[error("failed unlocking PKCS#12 archive: {0}")]
    Unlock(String),

    /// A certificate or the private key could not be re-encoded as DER.
    #[error("failed exporting PKCS#12 content: {0}")]
    Export(String),
}

/// An error that may arise building a [`ClientCredential`](crate::ClientCredential)
/// from encoded certificate and key material.
#[derive(Debug, thiserror::Error, PartialEq)]
#[non_exhaustive]
pub enum ClientCredentialError {
    /// Error processing the X.509 certificates.
    #[error(transparent)]
    Certificate(#[from] CertificateError),

    /// Error processing the private key.
    #[error(transparent)]
    PrivateKey(#[from] PrivateKeyError),

    /// Error processing a PKCS#12 archive.
    #[error(transparent)]
    Pkcs12(#[from] Pkcs12Error),
}
