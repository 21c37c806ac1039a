//! Fetches a server's TLS leaf certificate and validates it for a domain.
//!
//! A validation is two strictly sequential steps with no shared state:
//!
//! 1. [`fetcher`]: one TLS handshake to `domain:443` with the domain as SNI,
//!    keeping only the DER bytes of the leaf certificate.
//! 2. [`validator`]: decode those bytes ([`certificate`]) and check expiry and
//!    whether the domain is one of the certificate's identities (CN or SAN).
//!
//! Chain of trust, revocation and certificate transparency are not looked at.
//!
//! ```no_run
//! let result = certcheck::validate("example.com")?;
//! println!("{} {}", result.validity_status, result.valid_for_domain);
//! # Ok::<(), certcheck::ValidationError>(())
//! ```

pub mod certificate;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod metrics;
pub mod validator;

#[cfg(test)]
mod test_support;

pub use certificate::{
    find_attribute, DistinguishedName, NameAttribute, ParsedCertificate, RawCertificate, Validity,
};
pub use error::ValidationError;
pub use fetcher::{CertificateSource, TlsFetcher, DEFAULT_TIMEOUT, HTTPS_PORT};
pub use validator::{
    check_domain, check_expiry, evaluate, ValidationResult, ValidityStatus, Validator,
};

/// Validates `domain` with a fresh fetch on port 443 and the default timeout.
pub fn validate(domain: &str) -> Result<ValidationResult, ValidationError> {
    Validator::new(TlsFetcher::default()).validate(domain)
}
