//! Error types returned when resolving a client credential.

use crate::cert::error::ClientCredentialError;
use crate::store::StoreError;
use thiserror::Error;

/// Errors produced while resolving or duplicating a client credential.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CredentialError {
    /// The source exists conceptually, but its material could not be read,
    /// parsed, unlocked or duplicated.
    #[error("failed to get client certificate from {description}")]
    Load {
        /// Non-secret description of the source, e.g. `file=client.pem`.
        description: String,
        /// The underlying cause.
        #[source]
        kind: LoadErrorKind,
    },

    /// No certificate store holds a credential with the requested thumbprint.
    #[error(
        "unable to find certificate matching thumbprint={thumbprint} in stores [{}]",
        .searched.join(", ")
    )]
    NotFound {
        /// The thumbprint that was looked up.
        thumbprint: String,
        /// Names of the stores that were searched, in search order.
        searched: Vec<String>,
    },
}

impl CredentialError {
    pub(crate) fn load(description: impl Into<String>, kind: impl Into<LoadErrorKind>) -> Self {
        CredentialError::Load {
            description: description.into(),
            kind: kind.into(),
        }
    }

    /// Returns the load cause, if this is a [`CredentialError::Load`].
    pub fn load_kind(&self) -> Option<&LoadErrorKind> {
        match self {
            CredentialError::Load { kind, .. } => Some(kind),
            CredentialError::NotFound { .. } => None,
        }
    }
}

/// The cause of a [`CredentialError::Load`].
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LoadErrorKind {
    /// The credential file is missing or unreadable.
    #[error("failed reading credential file")]
    Io(#[from] std::io::Error),

    /// The credential file is larger than the crate is willing to parse.
    #[error("credential file is larger than {max} bytes")]
    FileTooLarge {
        /// Maximum accepted size in bytes.
        max: u64,
    },

    /// The certificate or key material is malformed, or the secret does not
    /// unlock the key.
    #[error(transparent)]
    Material(#[from] ClientCredentialError),

    /// The secret that unlocks the key has already been released.
    #[error("secret has been released")]
    SecretReleased,

    /// The source has already been released and holds no material.
    #[error("credential source has been released")]
    Released,

    /// Every configured certificate store failed to open.
    #[error(
        "no certificate store could be opened [{}]",
        .failures.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
    )]
    StoresUnavailable {
        /// One entry per configured store, in search order.
        failures: Vec<UnavailableStore>,
    },
}

/// A certificate store that was skipped during a search.
#[derive(Debug, Error)]
#[error("{name}: {error}")]
pub struct UnavailableStore {
    /// Name of the store.
    pub name: String,
    /// Why the store could not be used.
    #[source]
    pub error: StoreError,
}
