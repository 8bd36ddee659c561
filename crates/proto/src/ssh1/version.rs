//! SSH-1.5 identification string exchange.
//!
//! Both sides open the connection with a single line:
//!
//! ```text
//! SSH-protoversion-softwareversion LF
//! ```
//!
//! Example: `SSH-1.5-Retrossh_0.1.0`
//!
//! Only protocol major version 1 is accepted from the server. Servers that
//! speak both generations announce `SSH-1.99-`, which still carries the
//! major-version-1 prefix and is accepted; a pure `SSH-2.0-` server is not.
//!
//! # Example
//!
//! ```rust
//! use retrossh_proto::ssh1::version::Version;
//!
//! let version = Version::new("Retrossh_0.1.0");
//! assert_eq!(version.to_string(), "SSH-1.5-Retrossh_0.1.0");
//!
//! let parsed = Version::parse("SSH-1.5-1.2.27\n").unwrap();
//! assert_eq!(parsed.software(), "1.2.27");
//! ```

use retrossh_platform::{RetroError, RetroResult};

/// Maximum length of an identification line, terminator included.
pub const MAX_VERSION_LENGTH: usize = 255;

/// Prefix every acceptable server identification starts with.
pub const PROTOCOL_MAJOR_1_PREFIX: &str = "SSH-1.";

/// Protocol version the client announces.
pub const CLIENT_PROTOCOL_VERSION: &str = "1.5";

/// SSH identification string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Version {
    /// Protocol version (e.g., "1.5")
    proto_version: String,
    /// Software version and optional comments
    software_version: String,
}

impl Version {
    /// Creates the client's identification with protocol version 1.5.
    pub fn new(software: &str) -> Self {
        Self {
            proto_version: CLIENT_PROTOCOL_VERSION.to_string(),
            software_version: software.to_string(),
        }
    }

    /// Returns the default client identification.
    pub fn default_client() -> Self {
        Self::new(&format!("Retrossh_{}", env!("CARGO_PKG_VERSION")))
    }

    /// Parses a server identification line.
    ///
    /// # Errors
    ///
    /// Returns [`RetroError::Version`] if the line does not start with
    /// `SSH-1.`, and [`RetroError::Protocol`] if it is too long or contains
    /// a null byte.
    pub fn parse(line: &str) -> RetroResult<Self> {
        let line = line.trim_end_matches('\n').trim_end_matches('\r');

        if line.len() > MAX_VERSION_LENGTH {
            return Err(RetroError::Protocol(format!(
                "Version string too long: {} bytes (max {})",
                line.len(),
                MAX_VERSION_LENGTH
            )));
        }

        if line.contains('\0') {
            return Err(RetroError::Protocol(
                "Version string contains null byte".to_string(),
            ));
        }

        if !line.starts_with(PROTOCOL_MAJOR_1_PREFIX) {
            return Err(RetroError::Version(line.to_string()));
        }

        // SSH-protoversion-softwareversion
        let mut parts = line.splitn(3, '-');
        let _ = parts.next();
        let proto_version = parts.next().unwrap_or_default();
        let software_version = parts.next().unwrap_or_default();

        Ok(Self {
            proto_version: proto_version.to_string(),
            software_version: software_version.to_string(),
        })
    }

    /// Returns the protocol version (e.g., "1.5").
    pub fn proto_version(&self) -> &str {
        &self.proto_version
    }

    /// Returns the software version.
    pub fn software(&self) -> &str {
        &self.software_version
    }

    /// Converts to wire format (LF terminated).
    ///
    /// # Example
    ///
    /// ```rust
    /// use retrossh_proto::ssh1::version::Version;
    ///
    /// let version = Version::new("Retrossh_0.1.0");
    /// assert_eq!(version.to_wire_format(), b"SSH-1.5-Retrossh_0.1.0\n");
    /// ```
    pub fn to_wire_format(&self) -> Vec<u8> {
        format!("{}\n", self).into_bytes()
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SSH-{}-{}", self.proto_version, self.software_version)
    }
}
