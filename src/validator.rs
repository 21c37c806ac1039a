//! Expiry and domain-identity checks over a decoded certificate.

use chrono::{DateTime, Utc};
use serde::Serialize;
use strum_macros::{Display, EnumString};
use tracing::{debug, warn};

use crate::certificate::{DistinguishedName, ParsedCertificate};
use crate::error::ValidationError;
use crate::fetcher::{CertificateSource, TlsFetcher};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display, EnumString)]
pub enum ValidityStatus {
    Expired,
    Valid,
}

/// Outcome of validating one domain. Computed per request, never cached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub domain: String,
    pub validity_status: ValidityStatus,
    pub valid_from: DateTime<Utc>,
    pub expiration_date: DateTime<Utc>,
    pub issuer_details: DistinguishedName,
    pub subject_details: DistinguishedName,
    pub subject_alt_names: Vec<String>,
    pub valid_for_domain: bool,
}

impl ValidationResult {
    pub fn is_expired(&self) -> bool {
        self.validity_status == ValidityStatus::Expired
    }

    /// Whole days until expiry relative to `now`; negative once expired.
    pub fn days_remaining(&self, now: DateTime<Utc>) -> i64 {
        (self.expiration_date - now).num_days()
    }
}

/// `Expired` iff `now` is strictly after `not_after`.
///
/// A certificate whose `notBefore` is still in the future counts as `Valid`.
pub fn check_expiry(not_after: DateTime<Utc>, now: DateTime<Utc>) -> ValidityStatus {
    if now > not_after {
        ValidityStatus::Expired
    } else {
        ValidityStatus::Valid
    }
}

/// Exact, case-sensitive membership of `domain` in the certificate's
/// CN + SAN identities. No wildcard or suffix matching.
pub fn check_domain(certificate: &ParsedCertificate, domain: &str) -> bool {
    certificate.identities().any(|identity| identity == domain)
}

/// Runs both checks against an already decoded certificate.
pub fn evaluate(
    certificate: ParsedCertificate,
    domain: &str,
    now: DateTime<Utc>,
) -> ValidationResult {
    let validity_status = check_expiry(certificate.validity.not_after, now);
    let valid_for_domain = check_domain(&certificate, domain);
    ValidationResult {
        domain: domain.to_string(),
        validity_status,
        valid_from: certificate.validity.not_before,
        expiration_date: certificate.validity.not_after,
        issuer_details: certificate.issuer,
        subject_details: certificate.subject,
        subject_alt_names: certificate.subject_alt_names.unwrap_or_default(),
        valid_for_domain,
    }
}

/// Fetches, decodes and checks certificates for one domain at a time.
///
/// Holds no per-request state; one instance can serve any number of threads.
#[derive(Debug, Clone, Default)]
pub struct Validator<S = TlsFetcher> {
    source: S,
}

impl<S: CertificateSource> Validator<S> {
    pub fn new(source: S) -> Self {
        Validator { source }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Validates `domain` against the current wall-clock time.
    pub fn validate(&self, domain: &str) -> Result<ValidationResult, ValidationError> {
        self.validate_at(domain, Utc::now())
    }

    /// Validates `domain` as if the current time were `now`.
    pub fn validate_at(
        &self,
        domain: &str,
        now: DateTime<Utc>,
    ) -> Result<ValidationResult, ValidationError> {
        if domain.is_empty() {
            return Err(ValidationError::EmptyDomain);
        }

        let raw = self.source.fetch(domain).map_err(|e| {
            warn!(domain, error = %e, "certificate fetch failed");
            e
        })?;
        let certificate = raw.decode().map_err(|e| {
            warn!(domain, error = %e, "certificate decode failed");
            e
        })?;

        let result = evaluate(certificate, domain, now);
        debug!(
            domain,
            status = %result.validity_status,
            valid_for_domain = result.valid_for_domain,
            "validated certificate"
        );
        Ok(result)
    }
}
