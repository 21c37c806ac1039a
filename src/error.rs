//! Error types for certificate fetching and validation.
//!
//! Every failure is scoped to a single validation request. Nothing here is
//! retried or recovered locally; each variant carries enough context to be
//! shown to whoever asked for the validation.

use std::fmt;
use std::io;

/// Error returned by [`crate::validate`] and the pieces it is built from.
#[derive(Debug)]
pub enum ValidationError {
    /// The caller supplied an empty domain. Never reaches the network.
    EmptyDomain,

    /// Name resolution failed for the domain
    DomainNotFound {
        /// The domain that failed to resolve
        domain: String,
        /// The underlying I/O error
        source: io::Error,
    },

    /// The host refused the TCP connection on the TLS port
    ConnectionRefused {
        /// The domain that refused the connection
        domain: String,
        /// The underlying I/O error
        source: io::Error,
    },

    /// A connection was made but no usable certificate came out of it
    /// (handshake failure, timeout, reset, empty certificate, ...)
    FetchFailed {
        /// Description of the underlying cause
        message: String,
    },

    /// The certificate bytes could not be decoded as X.509
    CertificateDecodeError {
        /// Description of what went wrong
        reason: String,
    },
}

impl ValidationError {
    /// Whether the caller can fix this error by changing its input.
    ///
    /// An HTTP boundary maps `true` to a client error and everything else to
    /// a server error.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::EmptyDomain)
    }

    pub(crate) fn fetch_failed<M: fmt::Display>(message: M) -> Self {
        Self::FetchFailed {
            message: message.to_string(),
        }
    }

    pub(crate) fn decode<M: fmt::Display>(reason: M) -> Self {
        Self::CertificateDecodeError {
            reason: reason.to_string(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyDomain => {
                write!(f, "Domain is required. Please provide a domain name.")
            }
            Self::DomainNotFound { domain, .. } => {
                write!(
                    f,
                    "Domain not found: {}. Please check the domain name and try again.",
                    domain
                )
            }
            Self::ConnectionRefused { domain, .. } => {
                write!(f, "Connection refused. Unable to reach {}.", domain)
            }
            Self::FetchFailed { message } => {
                write!(f, "Failed to fetch certificate: {}", message)
            }
            Self::CertificateDecodeError { reason } => {
                write!(f, "Failed to decode certificate: {}", reason)
            }
        }
    }
}

impl std::error::Error for ValidationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::DomainNotFound { source, .. } => Some(source),
            Self::ConnectionRefused { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl<S: fmt::Debug> From<openssl::ssl::HandshakeError<S>> for ValidationError {
    fn from(e: openssl::ssl::HandshakeError<S>) -> Self {
        Self::FetchFailed {
            message: format!("TLS handshake failed: {}", e),
        }
    }
}
