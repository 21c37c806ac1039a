//! Certificates and throwaway servers shared by the integration tests.

#![allow(dead_code)]

use std::io::Write;
use std::net::{TcpListener, TcpStream};
use std::thread;
use std::time::Duration;

use openssl::pkey::{PKey, Private};
use openssl::ssl::{SslAcceptor, SslMethod};
use openssl::x509::X509;

#[path = "../../src/test_support.rs"]
mod test_support;

pub use test_support::TestCert;

/// Self-signed certificate for `common_name` with the given SAN DNS names,
/// valid from one day ago until `not_after`.
pub fn self_signed(common_name: &str, sans: &[&str], not_after: i64) -> (X509, PKey<Private>) {
    let mut cert = TestCert::new()
        .subject_entry(openssl::nid::Nid::COUNTRYNAME, "CL")
        .subject_entry(openssl::nid::Nid::ORGANIZATIONNAME, "certcheck tests")
        .common_name(common_name)
        .validity(test_support::now_unix() - 86_400, not_after);
    for dns in sans {
        cert = cert.san(dns);
    }
    cert.build()
}

pub fn one_year_from_now() -> i64 {
    test_support::now_unix() + 365 * 86_400
}

/// Serves `cert` over TLS for a single connection on an ephemeral local port.
pub fn spawn_tls_server(cert: X509, key: PKey<Private>) -> u16 {
    let mut acceptor = SslAcceptor::mozilla_intermediate_v5(SslMethod::tls()).unwrap();
    acceptor.set_private_key(&key).unwrap();
    acceptor.set_certificate(&cert).unwrap();
    acceptor.check_private_key().unwrap();
    let acceptor = acceptor.build();

    spawn_server(move |stream| {
        if let Ok(mut tls) = acceptor.accept(stream) {
            let _ = tls.shutdown();
        }
    })
}

/// Accepts one TCP connection and closes it without speaking TLS.
pub fn spawn_closing_server() -> u16 {
    spawn_server(drop)
}

/// Accepts one TCP connection and keeps it open, silent, for `hold`.
pub fn spawn_silent_server(hold: Duration) -> u16 {
    spawn_server(move |stream| {
        thread::sleep(hold);
        drop(stream);
    })
}

/// Accepts one TCP connection, sends a TLS record header announcing a large
/// handshake record, then drips its body one byte per `interval`.
pub fn spawn_dripping_server(interval: Duration, bytes: usize) -> u16 {
    spawn_server(move |mut stream| {
        if stream.write_all(&[0x16, 0x03, 0x03, 0x40, 0x00]).is_err() {
            return;
        }
        for _ in 0..bytes {
            thread::sleep(interval);
            if stream.write_all(&[0x02]).is_err() {
                return;
            }
        }
    })
}

/// A local port nothing listens on.
pub fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

fn spawn_server<F>(handle: F) -> u16
where
    F: FnOnce(TcpStream) + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    thread::spawn(move || {
        if let Ok((stream, _)) = listener.accept() {
            handle(stream);
        }
    });
    port
}
