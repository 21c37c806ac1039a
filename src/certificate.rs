//! Decoding of raw leaf certificates.
//!
//! The fetcher only ever hands over DER bytes. [`ParsedCertificate::from_der`]
//! is the single place where those bytes become a structured value; nothing
//! downstream touches an OpenSSL certificate object.

use std::borrow::Cow;

use asn1_rs::Oid;
use chrono::{DateTime, TimeZone, Utc};
use openssl::asn1::{Asn1Object, Asn1Time, Asn1TimeRef};
use openssl::nid::Nid;
use openssl::x509::{X509NameEntryRef, X509NameRef, X509};
use serde::Serialize;
use tracing::debug;

use crate::error::ValidationError;

/// DER-encoded leaf certificate as presented during the handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawCertificate(Vec<u8>);

impl RawCertificate {
    pub fn new(der: Vec<u8>) -> Self {
        RawCertificate(der)
    }

    pub fn as_der(&self) -> &[u8] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Decodes these bytes, consuming them.
    pub fn decode(self) -> Result<ParsedCertificate, ValidationError> {
        ParsedCertificate::from_der(&self.0)
    }
}

impl From<Vec<u8>> for RawCertificate {
    fn from(der: Vec<u8>) -> Self {
        RawCertificate(der)
    }
}

/// One attribute of a subject or issuer name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NameAttribute {
    /// Dotted object identifier of the attribute type, e.g. `2.5.4.3`
    pub oid: String,
    /// Short name such as `CN`, `O` or `C`; the OID itself when unregistered
    pub label: String,
    /// Attribute value converted to UTF-8
    pub value: String,
    #[serde(skip)]
    nid: i32,
}

impl NameAttribute {
    fn from_entry(entry: &X509NameEntryRef) -> Self {
        let object = entry.object();
        let nid = object.nid();
        let owned: Asn1Object = object.to_owned();
        let oid = Oid::new(Cow::Borrowed(owned.as_slice())).to_id_string();
        let label = match nid.short_name() {
            Ok(short) if nid != Nid::UNDEF => short.to_string(),
            _ => oid.clone(),
        };
        // PrintableString, BMPString, T61String, ... all end up as UTF-8 with
        // interior NULs kept. Anything OpenSSL rejects is kept lossily.
        let data = entry.data();
        let value = match data.to_string() {
            Ok(s) => s,
            Err(_) => String::from_utf8_lossy(data.as_slice()).into_owned(),
        };
        NameAttribute {
            oid,
            label,
            value,
            nid: nid.as_raw(),
        }
    }

    /// Whether this attribute has the given type.
    pub fn is(&self, nid: Nid) -> bool {
        self.nid == nid.as_raw()
    }
}

/// Subject or issuer name: attributes in encoding order, duplicates kept.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(transparent)]
pub struct DistinguishedName(Vec<NameAttribute>);

impl DistinguishedName {
    fn from_x509_name(name: &X509NameRef) -> Self {
        DistinguishedName(name.entries().map(NameAttribute::from_entry).collect())
    }

    pub fn attributes(&self) -> &[NameAttribute] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = &NameAttribute> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// First attribute of the given type.
    pub fn find(&self, nid: Nid) -> Option<&NameAttribute> {
        find_attribute(&self.0, nid)
    }

    /// First attribute with the given dotted OID.
    pub fn find_by_oid(&self, oid: &str) -> Option<&NameAttribute> {
        self.0.iter().find(|attr| attr.oid == oid)
    }

    pub fn common_name(&self) -> Option<&str> {
        self.find(Nid::COMMONNAME).map(|attr| attr.value.as_str())
    }

    pub fn organization(&self) -> Option<&str> {
        self.find(Nid::ORGANIZATIONNAME).map(|attr| attr.value.as_str())
    }
}

/// Returns the first attribute of type `nid`, or `None`.
pub fn find_attribute(attributes: &[NameAttribute], nid: Nid) -> Option<&NameAttribute> {
    attributes.iter().find(|attr| attr.is(nid))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Validity {
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
}

/// A leaf certificate decoded from DER.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedCertificate {
    pub subject: DistinguishedName,
    pub issuer: DistinguishedName,
    pub validity: Validity,
    /// DNS names from the SAN extension; `None` when the extension is absent
    /// or cannot be decoded.
    pub subject_alt_names: Option<Vec<String>>,
    pub serial_number: String,
    pub version: i32,
    pub signature_algorithm: String,
}

impl ParsedCertificate {
    /// Decodes a DER-encoded X.509 certificate.
    ///
    /// Any structural problem, including timestamps that cannot be
    /// represented, is reported as [`ValidationError::CertificateDecodeError`].
    pub fn from_der(der: &[u8]) -> Result<ParsedCertificate, ValidationError> {
        if der.is_empty() {
            return Err(ValidationError::decode("certificate is empty"));
        }
        let cert = X509::from_der(der).map_err(ValidationError::decode)?;

        let validity = Validity {
            not_before: asn1_time_to_utc(cert.not_before())?,
            not_after: asn1_time_to_utc(cert.not_after())?,
        };

        let subject_alt_names = cert.subject_alt_names().map(|names| {
            names
                .iter()
                .filter_map(|name| name.dnsname())
                .map(String::from)
                .collect::<Vec<_>>()
        });

        let serial_number = cert
            .serial_number()
            .to_bn()
            .and_then(|bn| bn.to_dec_str())
            .map(|s| s.to_string())
            .map_err(ValidationError::decode)?;

        let parsed = ParsedCertificate {
            subject: DistinguishedName::from_x509_name(cert.subject_name()),
            issuer: DistinguishedName::from_x509_name(cert.issuer_name()),
            validity,
            subject_alt_names,
            serial_number,
            version: cert.version() + 1,
            signature_algorithm: cert.signature_algorithm().object().to_string(),
        };
        debug!(
            subject_attributes = parsed.subject.len(),
            sans = parsed.subject_alt_names.as_ref().map_or(0, Vec::len),
            not_after = %parsed.validity.not_after,
            "decoded certificate"
        );
        Ok(parsed)
    }

    /// Every identity this certificate claims: the first subject CN followed
    /// by the SAN DNS entries.
    pub fn identities(&self) -> impl Iterator<Item = &str> {
        self.subject.common_name().into_iter().chain(
            self.subject_alt_names
                .iter()
                .flat_map(|names| names.iter().map(String::as_str)),
        )
    }
}

fn asn1_time_to_utc(time: &Asn1TimeRef) -> Result<DateTime<Utc>, ValidationError> {
    let epoch = Asn1Time::from_unix(0).map_err(ValidationError::decode)?;
    let diff = epoch.diff(time).map_err(ValidationError::decode)?;
    let secs = i64::from(diff.days) * 86_400 + i64::from(diff.secs);
    Utc.timestamp_opt(secs, 0)
        .single()
        .ok_or_else(|| ValidationError::decode(format!("timestamp out of range: {}", time)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::TestCert;

    #[test]
    fn test_decodes_subject_in_encoding_order() {
        let (cert, _) = TestCert::new()
            .subject_entry(Nid::COUNTRYNAME, "CL")
            .subject_entry(Nid::ORGANIZATIONNAME, "Example Org")
            .common_name("test.local")
            .build();

        let parsed = ParsedCertificate::from_der(&cert.to_der().unwrap()).unwrap();
        let labels: Vec<&str> = parsed.subject.iter().map(|a| a.label.as_str()).collect();
        assert_eq!(labels, vec!["C", "O", "CN"]);
        assert_eq!(parsed.subject.common_name(), Some("test.local"));
        assert_eq!(parsed.subject.organization(), Some("Example Org"));
        assert_eq!(parsed.subject.attributes()[2].oid, "2.5.4.3");
        // self-signed
        assert_eq!(parsed.issuer, parsed.subject);
    }

    #[test]
    fn test_duplicate_attributes_first_match_wins() {
        let (cert, _) = TestCert::new()
            .common_name("first.local")
            .common_name("second.local")
            .build();

        let parsed = ParsedCertificate::from_der(&cert.to_der().unwrap()).unwrap();
        assert_eq!(parsed.subject.len(), 2);
        assert_eq!(parsed.subject.common_name(), Some("first.local"));
        assert_eq!(
            find_attribute(parsed.subject.attributes(), Nid::COMMONNAME).map(|a| &a.value[..]),
            Some("first.local")
        );
        assert_eq!(
            parsed.subject.find_by_oid("2.5.4.3").map(|a| &a.value[..]),
            Some("first.local")
        );
    }

    #[test]
    fn test_missing_common_name_is_not_an_error() {
        let (cert, _) = TestCert::new()
            .subject_entry(Nid::ORGANIZATIONNAME, "No CN Inc")
            .san("only-san.local")
            .build();

        let parsed = ParsedCertificate::from_der(&cert.to_der().unwrap()).unwrap();
        assert_eq!(parsed.subject.common_name(), None);
        let identities: Vec<&str> = parsed.identities().collect();
        assert_eq!(identities, vec!["only-san.local"]);
    }

    #[test]
    fn test_absent_san_extension_is_none() {
        let (cert, _) = TestCert::new().common_name("test.local").build();
        let parsed = ParsedCertificate::from_der(&cert.to_der().unwrap()).unwrap();
        assert_eq!(parsed.subject_alt_names, None);
        assert_eq!(parsed.identities().collect::<Vec<_>>(), vec!["test.local"]);
    }

    #[test]
    fn test_validity_round_trips_exactly() {
        let not_before = 1_600_000_000;
        let not_after = 1_900_000_123;
        let (cert, _) = TestCert::new()
            .common_name("test.local")
            .validity(not_before, not_after)
            .build();

        let parsed = ParsedCertificate::from_der(&cert.to_der().unwrap()).unwrap();
        assert_eq!(parsed.validity.not_before.timestamp(), not_before);
        assert_eq!(parsed.validity.not_after.timestamp(), not_after);
    }

    #[test]
    fn test_metadata_fields() {
        let (cert, _) = TestCert::new().common_name("test.local").build();
        let parsed = ParsedCertificate::from_der(&cert.to_der().unwrap()).unwrap();
        assert_eq!(parsed.version, 3);
        assert_eq!(parsed.serial_number, "4096");
        assert_eq!(parsed.signature_algorithm, "ecdsa-with-SHA256");
    }

    #[test]
    fn test_truncated_der_is_decode_error() {
        let (cert, _) = TestCert::new().common_name("test.local").build();
        let der = cert.to_der().unwrap();

        match ParsedCertificate::from_der(&der[..der.len() / 2]) {
            Err(ValidationError::CertificateDecodeError { .. }) => {}
            other => panic!("expected decode error, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_and_garbage_input_are_decode_errors() {
        assert!(matches!(
            RawCertificate::new(Vec::new()).decode(),
            Err(ValidationError::CertificateDecodeError { .. })
        ));
        assert!(matches!(
            ParsedCertificate::from_der(b"definitely not a certificate"),
            Err(ValidationError::CertificateDecodeError { .. })
        ));
    }

    #[test]
    fn test_interior_nul_in_common_name_is_kept() {
        let (cert, _) = TestCert::new()
            .common_name("bank.example\0.evil.test")
            .build();

        let parsed = ParsedCertificate::from_der(&cert.to_der().unwrap()).unwrap();
        assert_eq!(parsed.subject.common_name(), Some("bank.example\0.evil.test"));
        assert!(!parsed.identities().any(|id| id == "bank.example"));
    }

    #[test]
    fn test_duplicate_san_extensions_are_treated_as_absent() {
        let (cert, _) = TestCert::new()
            .common_name("test.local")
            .san("alt.test.local")
            .san_extension(&["evil.test"])
            .build();

        let parsed = ParsedCertificate::from_der(&cert.to_der().unwrap()).unwrap();
        assert_eq!(parsed.subject_alt_names, None);
        assert_eq!(parsed.identities().collect::<Vec<_>>(), vec!["test.local"]);
    }
}
