//! # certificate: Client certificate lookup
//!
//! The archive service authenticates callers by TLS client certificate. Certificates live in a
//! [`CertificateStore`] and are selected by serial number; [`resolve_certificate`] insists on
//! exactly one match so a batch never runs under an ambiguous identity.
//!
//! [`PemCertificateStore`] is a directory of PEM files. Each certificate's private key is taken
//! from the same file, or from a sibling file with the same stem and a `.key` extension.
//!
//! Serial selectors are compared in a normalised form (hex digits only, upper case, no leading
//! zeros), so `3B48F17B`, `3b:48:f1:7b` and `3b 48 f1 7b` select the same certificate.

use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, error, info, warn};
use x509_parser::pem::Pem;

use crate::exit_status::ExitStatus;

#[derive(Debug, Error)]
pub enum CertificateError {
    #[error("'{0}' is not a valid certificate serial number")]
    InvalidSerial(String),
    #[error("no certificate with serial number {0} found")]
    NotFound(SerialNumber),
    #[error("{count} certificates with serial number {serial} found, expected exactly one")]
    Ambiguous { serial: SerialNumber, count: usize },
    #[error("no private key found for certificate in {}", .0.display())]
    MissingPrivateKey(PathBuf),
    #[error("failed to read certificate store {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl CertificateError {
    pub fn exit_status(&self) -> ExitStatus {
        ExitStatus::AuthenticationFailed
    }
}

/// A certificate serial number in normalised hex form.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SerialNumber(String);

impl SerialNumber {
    /// Parses a user-supplied selector, ignoring separators and case.
    pub fn parse(selector: &str) -> Result<Self, CertificateError> {
        let digits: String = selector
            .chars()
            .filter(|c| !c.is_whitespace() && *c != ':' && *c != '-')
            .collect();
        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(CertificateError::InvalidSerial(selector.to_string()));
        }
        Ok(Self::normalise(&digits))
    }

    /// Serial from the raw big-endian bytes of a certificate.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let hex: String = bytes.iter().map(|b| format!("{b:02X}")).collect();
        Self::normalise(&hex)
    }

    fn normalise(hex: &str) -> Self {
        let upper = hex.to_ascii_uppercase();
        let trimmed = upper.trim_start_matches('0');
        if trimmed.is_empty() {
            SerialNumber("0".to_string())
        } else {
            SerialNumber(trimmed.to_string())
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SerialNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A certificate plus private key, ready to be used as a TLS client identity.
#[derive(Clone, PartialEq, Eq)]
pub struct ClientCertificate {
    pub serial: SerialNumber,
    pub subject: String,
    pub source: PathBuf,
    /// PEM text containing the certificate (and chain) followed by the private key.
    pub identity_pem: Vec<u8>,
}

impl fmt::Debug for ClientCertificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientCertificate")
            .field("serial", &self.serial)
            .field("subject", &self.subject)
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}

/// A platform identity store queried by serial number.
#[cfg_attr(any(test, feature = "test-export-mocks"), mockall::automock)]
pub trait CertificateStore {
    /// All certificates whose serial equals `serial`.
    fn find_by_serial(
        &self,
        serial: &SerialNumber,
    ) -> Result<Vec<ClientCertificate>, CertificateError>;
}

/// Looks up the certificate for `selector`, requiring exactly one match.
pub fn resolve_certificate<S>(
    store: &S,
    selector: &str,
) -> Result<ClientCertificate, CertificateError>
where
    S: CertificateStore + ?Sized,
{
    let serial = SerialNumber::parse(selector)?;
    info!(%serial, "[AUTH] Looking up client certificate");
    let mut found = store.find_by_serial(&serial)?;
    match found.len() {
        0 => {
            error!(%serial, "[AUTH] Client certificate not found");
            Err(CertificateError::NotFound(serial))
        }
        1 => {
            let certificate = found.remove(0);
            info!(
                %serial,
                subject = %certificate.subject,
                source = %certificate.source.display(),
                "[AUTH] Client certificate resolved"
            );
            Ok(certificate)
        }
        count => {
            error!(%serial, count, "[AUTH] Certificate selector is ambiguous");
            Err(CertificateError::Ambiguous { serial, count })
        }
    }
}

/// Directory of PEM-encoded certificates.
#[derive(Debug, Clone)]
pub struct PemCertificateStore {
    dir: PathBuf,
}

impl PemCertificateStore {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn is_candidate(path: &Path) -> bool {
        path.is_file()
            && path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| e.eq_ignore_ascii_case("pem") || e.eq_ignore_ascii_case("crt"))
                .unwrap_or(false)
    }

    /// Reads one file and returns a certificate if it carries `serial`.
    fn certificate_in(
        path: &Path,
        serial: &SerialNumber,
    ) -> Result<Option<ClientCertificate>, CertificateError> {
        let io_err = |source| CertificateError::Io {
            path: path.to_path_buf(),
            source,
        };
        let data = std::fs::read(path).map_err(io_err)?;

        let mut matched: Option<String> = None;
        let mut has_key = false;
        for block in Pem::iter_from_buffer(&data) {
            let block = match block {
                Ok(block) => block,
                Err(e) => {
                    warn!(path = %path.display(), error = ?e, "Skipping unreadable PEM data");
                    break;
                }
            };
            if block.label.ends_with("PRIVATE KEY") {
                has_key = true;
                continue;
            }
            if block.label != "CERTIFICATE" || matched.is_some() {
                continue;
            }
            match block.parse_x509() {
                Ok(cert) => {
                    let cert_serial = SerialNumber::from_bytes(cert.raw_serial());
                    debug!(path = %path.display(), serial = %cert_serial, "Inspected certificate");
                    if &cert_serial == serial {
                        matched = Some(cert.subject().to_string());
                    }
                }
                Err(e) => {
                    warn!(path = %path.display(), error = ?e, "Skipping unparsable certificate");
                }
            }
        }

        let Some(subject) = matched else {
            return Ok(None);
        };

        let identity_pem = if has_key {
            data
        } else {
            let key_path = path.with_extension("key");
            if !key_path.is_file() {
                return Err(CertificateError::MissingPrivateKey(path.to_path_buf()));
            }
            let key = std::fs::read(&key_path).map_err(|source| CertificateError::Io {
                path: key_path.clone(),
                source,
            })?;
            let mut combined = data;
            if !combined.ends_with(b"\n") {
                combined.push(b'\n');
            }
            combined.extend_from_slice(&key);
            combined
        };

        Ok(Some(ClientCertificate {
            serial: serial.clone(),
            subject,
            source: path.to_path_buf(),
            identity_pem,
        }))
    }
}

impl CertificateStore for PemCertificateStore {
    fn find_by_serial(
        &self,
        serial: &SerialNumber,
    ) -> Result<Vec<ClientCertificate>, CertificateError> {
        let entries = std::fs::read_dir(&self.dir).map_err(|source| CertificateError::Io {
            path: self.dir.clone(),
            source,
        })?;

        let mut paths = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| CertificateError::Io {
                path: self.dir.clone(),
                source,
            })?;
            let path = entry.path();
            if Self::is_candidate(&path) {
                paths.push(path);
            }
        }
        paths.sort();
        debug!(store = %self.dir.display(), files = paths.len(), "Scanning certificate store");

        let mut found = Vec::new();
        for path in paths {
            if let Some(certificate) = Self::certificate_in(&path, serial)? {
                found.push(certificate);
            }
        }
        Ok(found)
    }
}
