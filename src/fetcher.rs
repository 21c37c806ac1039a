//! Acquisition of a server's leaf certificate.

use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::{Duration, Instant};

use openssl::ssl::{HandshakeError, Ssl, SslContext, SslMethod, SslVerifyMode};
use tracing::debug;

use crate::certificate::RawCertificate;
use crate::error::ValidationError;

/// Port every fetch targets unless a test overrides it.
pub const HTTPS_PORT: u16 = 443;

/// Total time allowed for the TCP connect plus the whole TLS handshake.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Something that can produce the raw leaf certificate a domain presents.
pub trait CertificateSource: Send + Sync {
    fn fetch(&self, domain: &str) -> Result<RawCertificate, ValidationError>;
}

/// Fetches certificates with a single OpenSSL handshake per call.
///
/// Peer verification is disabled: the point is to look at whatever the
/// server presents, expired and self-signed leaves included. There are no
/// retries; the first resolved address is the only one tried.
#[derive(Debug, Clone)]
pub struct TlsFetcher {
    port: u16,
    timeout: Duration,
}

impl Default for TlsFetcher {
    fn default() -> Self {
        TlsFetcher::new(DEFAULT_TIMEOUT)
    }
}

impl TlsFetcher {
    pub fn new(timeout: Duration) -> Self {
        TlsFetcher {
            port: HTTPS_PORT,
            timeout,
        }
    }

    /// Connects to `port` instead of 443.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn resolve(&self, domain: &str) -> Result<SocketAddr, ValidationError> {
        let mut addresses =
            (domain, self.port)
                .to_socket_addrs()
                .map_err(|e| ValidationError::DomainNotFound {
                    domain: domain.to_string(),
                    source: e,
                })?;
        addresses
            .next()
            .ok_or_else(|| ValidationError::DomainNotFound {
                domain: domain.to_string(),
                source: io::Error::new(io::ErrorKind::NotFound, "no address resolved"),
            })
    }

    fn connect(
        &self,
        domain: &str,
        address: &SocketAddr,
        deadline: Instant,
    ) -> Result<DeadlineStream, ValidationError> {
        let inner = TcpStream::connect_timeout(address, self.timeout).map_err(|e| match e.kind() {
            io::ErrorKind::ConnectionRefused => ValidationError::ConnectionRefused {
                domain: domain.to_string(),
                source: e,
            },
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => self.timed_out(address),
            _ => ValidationError::fetch_failed(e),
        })?;
        Ok(DeadlineStream { inner, deadline })
    }

    fn timed_out(&self, address: &SocketAddr) -> ValidationError {
        ValidationError::fetch_failed(format!(
            "connection to {} timed out after {:?}",
            address, self.timeout
        ))
    }
}

impl CertificateSource for TlsFetcher {
    fn fetch(&self, domain: &str) -> Result<RawCertificate, ValidationError> {
        let address = self.resolve(domain)?;
        let deadline = Instant::now() + self.timeout;
        debug!(domain, %address, "connecting");
        let tcp_stream = self.connect(domain, &address, deadline)?;

        let mut context =
            SslContext::builder(SslMethod::tls()).map_err(ValidationError::fetch_failed)?;
        context.set_verify(SslVerifyMode::NONE);
        let context = context.build();

        let mut ssl = Ssl::new(&context).map_err(ValidationError::fetch_failed)?;
        ssl.set_hostname(domain)
            .map_err(ValidationError::fetch_failed)?;

        let stream = match ssl.connect(tcp_stream) {
            Ok(stream) => stream,
            // a read timeout on the blocking socket surfaces as WouldBlock
            Err(HandshakeError::WouldBlock(_)) => return Err(self.timed_out(&address)),
            Err(_) if Instant::now() >= deadline => return Err(self.timed_out(&address)),
            Err(e) => return Err(e.into()),
        };

        // Dropped without close_notify; only the handshake matters.
        let der = stream
            .ssl()
            .peer_certificate()
            .ok_or_else(|| ValidationError::fetch_failed("No certificate found."))?
            .to_der()
            .map_err(ValidationError::fetch_failed)?;

        if der.is_empty() {
            return Err(ValidationError::fetch_failed("No certificate found."));
        }
        debug!(domain, bytes = der.len(), "fetched leaf certificate");
        Ok(RawCertificate::new(der))
    }
}

/// TCP stream whose every read and write is bounded by one shared deadline,
/// so a peer trickling bytes cannot stretch the handshake.
#[derive(Debug)]
struct DeadlineStream {
    inner: TcpStream,
    deadline: Instant,
}

impl DeadlineStream {
    fn remaining(&self) -> io::Result<Duration> {
        let now = Instant::now();
        if now >= self.deadline {
            return Err(io::Error::new(
                io::ErrorKind::TimedOut,
                "handshake deadline exceeded",
            ));
        }
        Ok(self.deadline - now)
    }
}

impl Read for DeadlineStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let remaining = self.remaining()?;
        self.inner.set_read_timeout(Some(remaining))?;
        self.inner.read(buf)
    }
}

impl Write for DeadlineStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let remaining = self.remaining()?;
        self.inner.set_write_timeout(Some(remaining))?;
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
