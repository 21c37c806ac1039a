//! Self-signed certificates generated on the fly for tests.

use openssl::asn1::Asn1Time;
use openssl::bn::BigNum;
use openssl::ec::{EcGroup, EcKey};
use openssl::hash::MessageDigest;
use openssl::nid::Nid;
use openssl::pkey::{PKey, Private};
use openssl::x509::extension::SubjectAlternativeName;
use openssl::x509::{X509NameBuilder, X509};

const DAY: i64 = 86_400;

pub fn now_unix() -> i64 {
    chrono::Utc::now().timestamp()
}

pub struct TestCert {
    subject: Vec<(Nid, String)>,
    // one SAN extension per group
    san_extensions: Vec<Vec<String>>,
    not_before: i64,
    not_after: i64,
}

impl TestCert {
    /// Valid from yesterday for one year.
    pub fn new() -> Self {
        let now = now_unix();
        TestCert {
            subject: Vec::new(),
            san_extensions: Vec::new(),
            not_before: now - DAY,
            not_after: now + 365 * DAY,
        }
    }

    pub fn common_name(self, cn: &str) -> Self {
        self.subject_entry(Nid::COMMONNAME, cn)
    }

    pub fn subject_entry(mut self, nid: Nid, value: &str) -> Self {
        self.subject.push((nid, value.to_string()));
        self
    }

    /// Adds a DNS name to the first SAN extension.
    pub fn san(mut self, dns: &str) -> Self {
        if self.san_extensions.is_empty() {
            self.san_extensions.push(Vec::new());
        }
        self.san_extensions[0].push(dns.to_string());
        self
    }

    /// Appends another, separate SAN extension.
    pub fn san_extension(mut self, names: &[&str]) -> Self {
        self.san_extensions
            .push(names.iter().map(|n| n.to_string()).collect());
        self
    }

    pub fn validity(mut self, not_before: i64, not_after: i64) -> Self {
        self.not_before = not_before;
        self.not_after = not_after;
        self
    }

    pub fn build(self) -> (X509, PKey<Private>) {
        let group = EcGroup::from_curve_name(Nid::X9_62_PRIME256V1).unwrap();
        let key = PKey::from_ec_key(EcKey::generate(&group).unwrap()).unwrap();

        let mut name = X509NameBuilder::new().unwrap();
        for (nid, value) in &self.subject {
            name.append_entry_by_nid(*nid, value).unwrap();
        }
        let name = name.build();

        let mut builder = X509::builder().unwrap();
        builder.set_version(2).unwrap();
        let serial = BigNum::from_u32(4096).unwrap().to_asn1_integer().unwrap();
        builder.set_serial_number(&serial).unwrap();
        builder.set_subject_name(&name).unwrap();
        builder.set_issuer_name(&name).unwrap();
        builder.set_pubkey(&key).unwrap();
        builder
            .set_not_before(&Asn1Time::from_unix(self.not_before).unwrap())
            .unwrap();
        builder
            .set_not_after(&Asn1Time::from_unix(self.not_after).unwrap())
            .unwrap();

        for names in &self.san_extensions {
            let mut san = SubjectAlternativeName::new();
            for dns in names {
                san.dns(dns);
            }
            let extension = san.build(&builder.x509v3_context(None, None)).unwrap();
            builder.append_extension(extension).unwrap();
        }

        builder.sign(&key, MessageDigest::sha256()).unwrap();
        (builder.build(), key)
    }
}
