//! Known-hosts trust store for SSH-1.5 RSA host keys.
//!
//! # Format
//!
//! One host per line, space separated decimal integers after the name:
//!
//! ```text
//! hostname bits exponent modulus
//! ```
//!
//! Blank lines and lines starting with `#` are ignored, as are lines that do
//! not have exactly four fields.
//!
//! # Policy
//!
//! Trust on first use, append only:
//! - an unknown host is recorded and trusted
//! - a known host is trusted only if bits, exponent and modulus all match
//! - a known host with a different key is *not* trusted and the file is left
//!   untouched; the first matching line wins
//! - any I/O failure yields "not trusted"
//!
//! The store is reopened on every verification; nothing is cached.
//!
//! # Example
//!
//! ```rust,no_run
//! use num_bigint::BigUint;
//! use retrossh_proto::ssh1::known_hosts::KnownHostsFile;
//!
//! let store = KnownHostsFile::new("/tmp/retrossh_known_hosts");
//! let exponent = BigUint::from(65537u32);
//! let modulus = BigUint::from(3233u32);
//! assert!(store.verify("example.com", 12, &exponent, &modulus));
//! ```

use crate::ssh1::rsa::RsaPublicKey;
use num_bigint::BigUint;
use retrossh_platform::{RetroError, RetroResult};
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Directory name used for the private fallback store.
const STATE_DIR_NAME: &str = "retrossh";

/// File name of the store.
const KNOWN_HOSTS_FILE_NAME: &str = "known_hosts";

/// One trusted host key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostKeyRecord {
    hostname: String,
    bits: u32,
    exponent: BigUint,
    modulus: BigUint,
}

impl HostKeyRecord {
    /// Creates a record.
    pub fn new(hostname: &str, bits: u32, exponent: BigUint, modulus: BigUint) -> Self {
        Self {
            hostname: hostname.to_string(),
            bits,
            exponent,
            modulus,
        }
    }

    /// Returns the hostname.
    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    /// Returns the key's bit length.
    pub fn bits(&self) -> u32 {
        self.bits
    }

    /// Returns the public exponent.
    pub fn exponent(&self) -> &BigUint {
        &self.exponent
    }

    /// Returns the modulus.
    pub fn modulus(&self) -> &BigUint {
        &self.modulus
    }

    /// Formats the record as a store line, without terminator.
    pub fn to_line(&self) -> String {
        format!(
            "{} {} {} {}",
            self.hostname,
            self.bits,
            self.exponent.to_str_radix(10),
            self.modulus.to_str_radix(10)
        )
    }
}

/// Outcome of checking a host key against the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostKeyStatus {
    /// A line for the host exists and its key matches.
    Known,
    /// The host was unknown and has just been recorded.
    Recorded,
    /// A line for the host exists with a different key.
    Changed,
    /// The store could not be read or written.
    Unavailable,
}

impl HostKeyStatus {
    /// Whether the connection may proceed.
    pub fn is_trusted(self) -> bool {
        matches!(self, HostKeyStatus::Known | HostKeyStatus::Recorded)
    }
}

/// Parses one store line. Blank, comment and malformed lines yield `None`.
fn parse_line(line: &str) -> Option<HostKeyRecord> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }

    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() != 4 {
        return None;
    }
    Some(HostKeyRecord::new(
        fields[0],
        fields[1].parse().ok()?,
        BigUint::parse_bytes(fields[2].as_bytes(), 10)?,
        BigUint::parse_bytes(fields[3].as_bytes(), 10)?,
    ))
}

/// Known-hosts file handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KnownHostsFile {
    path: PathBuf,
}

impl KnownHostsFile {
    /// Creates a handle for the store at `path`. Nothing is read yet.
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Creates a handle for the default per-user store.
    pub fn default_location() -> RetroResult<Self> {
        Ok(Self::new(default_path()?))
    }

    /// Returns the store path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Checks `key` for `hostname`, recording it on first use.
    pub fn verify_host_key(&self, hostname: &str, key: &RsaPublicKey) -> HostKeyStatus {
        self.check(hostname, key.bits(), key.exponent(), key.modulus())
    }

    /// Returns whether the key is trusted for `hostname`.
    pub fn verify(
        &self,
        hostname: &str,
        bits: u32,
        exponent: &BigUint,
        modulus: &BigUint,
    ) -> bool {
        self.check(hostname, bits, exponent, modulus).is_trusted()
    }

    /// Checks a key, recording it on first use.
    pub fn check(
        &self,
        hostname: &str,
        bits: u32,
        exponent: &BigUint,
        modulus: &BigUint,
    ) -> HostKeyStatus {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => String::new(),
            Err(e) => {
                warn!(
                    "Cannot read known hosts file {}: {}",
                    self.path.display(),
                    e
                );
                return HostKeyStatus::Unavailable;
            }
        };

        let entry = content
            .lines()
            .filter_map(parse_line)
            .find(|record| record.hostname.eq_ignore_ascii_case(hostname));

        if let Some(entry) = entry {
            if entry.bits == bits && &entry.exponent == exponent && &entry.modulus == modulus {
                debug!("Host key for {} matches known hosts entry", hostname);
                return HostKeyStatus::Known;
            }
            warn!(
                "Host key for {} differs from the entry in {}",
                hostname,
                self.path.display()
            );
            return HostKeyStatus::Changed;
        }

        let record = HostKeyRecord::new(hostname, bits, exponent.clone(), modulus.clone());
        match self.append(&record, &content) {
            Ok(()) => {
                info!(
                    "Recorded new host key for {} in {}",
                    hostname,
                    self.path.display()
                );
                HostKeyStatus::Recorded
            }
            Err(e) => {
                warn!(
                    "Cannot record host key in {}: {}",
                    self.path.display(),
                    e
                );
                HostKeyStatus::Unavailable
            }
        }
    }

    fn append(&self, record: &HostKeyRecord, existing: &str) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        let mut line = String::new();
        if !existing.is_empty() && !existing.ends_with('\n') {
            line.push('\n');
        }
        line.push_str(&record.to_line());
        line.push('\n');

        file.write_all(line.as_bytes())?;
        file.sync_all()
    }

    /// Reads every well-formed record in the store.
    pub fn records(&self) -> RetroResult<Vec<HostKeyRecord>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(RetroError::Io(e)),
        };

        Ok(content.lines().filter_map(parse_line).collect())
    }
}

/// Resolves the default store location.
///
/// `$HOME/.ssh/known_hosts` when `$HOME/.ssh` exists, otherwise
/// `$XDG_STATE_HOME/retrossh/known_hosts` (or `$HOME/.local/state/...`).
pub fn default_path() -> RetroResult<PathBuf> {
    let home = std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(PathBuf::from);

    if let Some(home) = &home {
        let ssh_dir = home.join(".ssh");
        if ssh_dir.is_dir() {
            return Ok(ssh_dir.join(KNOWN_HOSTS_FILE_NAME));
        }
    }

    let state_dir = std::env::var_os("XDG_STATE_HOME")
        .map(PathBuf::from)
        .or_else(|| home.map(|h| h.join(".local").join("state")))
        .ok_or_else(|| {
            RetroError::Config("Cannot determine home directory for known hosts".to_string())
        })?;

    Ok(state_dir.join(STATE_DIR_NAME).join(KNOWN_HOSTS_FILE_NAME))
}
