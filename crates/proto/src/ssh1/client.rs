//! SSH-1.5 client.
//!
//! [`Client::connect`] runs the whole protocol up to a started remote
//! command:
//!
//! 1. TCP connect, then cancellation is switched off
//! 2. identification exchange
//! 3. `SSH_SMSG_PUBLIC_KEY`: cookie, server key, host key, cipher mask
//! 4. host key check, cipher choice, `SSH_CMSG_SESSION_KEY`
//! 5. `SSH_SMSG_SUCCESS`, after which both directions are encrypted
//! 6. `SSH_CMSG_USER`, answered by `SSH_SMSG_FAILURE` (password required)
//! 7. cancellation back on, `SSH_CMSG_AUTH_PASSWORD`
//! 8. `SSH_CMSG_EXEC_CMD`, or `SSH_CMSG_REQUEST_PTY` + `SSH_CMSG_EXEC_SHELL`
//!
//! A failure at any step releases the socket before the error is returned.
//!
//! # Example
//!
//! ```rust,no_run
//! use retrossh_proto::ssh1::client::{Client, ClientConfig};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut config = ClientConfig::new("legacy.example.com", "alice", "secret");
//! config.command = Some("uptime".to_string());
//!
//! let mut client = Client::new(config);
//! client.connect().await?;
//!
//! let mut output = Vec::new();
//! client.input()?.read_to_end(&mut output).await?;
//! println!("{}", String::from_utf8_lossy(&output));
//!
//! client.disconnect().await?;
//! # Ok(())
//! # }
//! ```

use crate::ssh1::cancel::{CancelToken, IoGuard};
use crate::ssh1::crypto::{select_cipher, Cipher, SESSION_KEY_LEN, PREFERRED_CIPHERS};
use crate::ssh1::known_hosts::{HostKeyStatus, KnownHostsFile};
use crate::ssh1::message::MessageType;
use crate::ssh1::packet::{put_mp_int, put_string};
use crate::ssh1::rsa::{self, RsaPublicKey, COOKIE_LEN};
use crate::ssh1::stream::{PacketSink, PacketSource, SessionReader, SessionWriter, SharedSink};
use crate::ssh1::version::Version;
use bytes::{BufMut, BytesMut};
use rand::RngCore;
use retrossh_platform::{RetroError, RetroResult};
use std::path::PathBuf;
use std::time::Duration;
use tokio::net::TcpStream;
use tracing::{debug, info, warn};
use zeroize::{Zeroize, Zeroizing};

/// Default SSH port.
pub const DEFAULT_PORT: u16 = 22;

/// Terminal type requested when no command is given.
pub const PTY_TERMINAL: &str = "dumb";

/// Reason sent with the client's own `DISCONNECT`.
pub const CLIENT_DISCONNECT_REASON: &str = "Closed by client";

/// Terminates the terminal mode list of `REQUEST_PTY`.
const TTY_OP_END: u8 = 0;

/// Client configuration.
#[derive(Clone)]
pub struct ClientConfig {
    /// Remote host name, also the key used in the known-hosts store.
    pub host: String,
    /// Remote port.
    pub port: u16,
    /// Login name.
    pub username: String,
    /// Login password, wiped when the configuration is dropped.
    pub password: String,
    /// Remote command; `None` starts a shell on a dumb terminal.
    pub command: Option<String>,
    /// TCP connect timeout.
    pub connect_timeout: Duration,
    /// Deadline for each socket read or write. `None` waits forever.
    pub io_timeout: Option<Duration>,
    /// Software part of the identification string.
    pub client_version: String,
    /// Known-hosts store.
    ///
    /// If not set, resolved by
    /// [`default_path`](crate::ssh1::known_hosts::default_path).
    pub known_hosts_file: Option<PathBuf>,
}

// Manual Debug so the password never reaches a log
impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("command", &self.command)
            .field("connect_timeout", &self.connect_timeout)
            .field("io_timeout", &self.io_timeout)
            .field("client_version", &self.client_version)
            .field("known_hosts_file", &self.known_hosts_file)
            .finish()
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: DEFAULT_PORT,
            username: String::new(),
            password: String::new(),
            command: None,
            connect_timeout: Duration::from_secs(30),
            io_timeout: None,
            client_version: Version::default_client().software().to_string(),
            known_hosts_file: None,
        }
    }
}

impl Drop for ClientConfig {
    fn drop(&mut self) {
        self.password.zeroize();
    }
}

impl ClientConfig {
    /// Creates a configuration for `username@host` on the default port.
    pub fn new(host: &str, username: &str, password: &str) -> Self {
        let mut config = Self::default();
        config.host = host.to_string();
        config.username = username.to_string();
        config.password = password.to_string();
        config
    }

    fn known_hosts(&self) -> RetroResult<KnownHostsFile> {
        match &self.known_hosts_file {
            Some(path) => Ok(KnownHostsFile::new(path)),
            None => KnownHostsFile::default_location(),
        }
    }
}

/// Progress of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    /// No socket.
    Disconnected,
    /// TCP connection established.
    SocketOpen,
    /// Identification strings exchanged.
    VersionExchanged,
    /// Server and host keys received.
    KeysReceived,
    /// Session key sent and acknowledged; traffic is encrypted.
    SessionKeySent,
    /// User name sent.
    UserSent,
    /// Password accepted.
    Authenticated,
    /// Remote command or shell requested.
    CommandStarted,
    /// Streams available.
    Connected,
}

/// Contents of `SSH_SMSG_PUBLIC_KEY`.
#[derive(Debug)]
struct ServerKeys {
    cookie: [u8; COOKIE_LEN],
    server_key: RsaPublicKey,
    host_key: RsaPublicKey,
    protocol_flags: u32,
    cipher_mask: u32,
    auth_mask: u32,
}

/// SSH-1.5 client driving one connection.
#[derive(Debug)]
pub struct Client {
    config: ClientConfig,
    state: ClientState,
    guard: IoGuard,
    server_version: Option<Version>,
    source: Option<PacketSource>,
    sink: Option<SharedSink>,
    input: Option<SessionReader>,
    output: Option<SessionWriter>,
}

impl Client {
    /// Creates a disconnected client.
    pub fn new(config: ClientConfig) -> Self {
        Self::with_cancel_token(config, CancelToken::new())
    }

    /// Creates a disconnected client whose I/O aborts when `token` fires.
    pub fn with_cancel_token(config: ClientConfig, token: CancelToken) -> Self {
        let guard = IoGuard::new(token, config.io_timeout);
        Self {
            config,
            state: ClientState::Disconnected,
            guard,
            server_version: None,
            source: None,
            sink: None,
            input: None,
            output: None,
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Returns the connection state.
    pub fn state(&self) -> ClientState {
        self.state
    }

    /// Whether the streams are available.
    pub fn is_connected(&self) -> bool {
        self.state == ClientState::Connected
    }

    /// Returns the token that cancels this client's I/O.
    pub fn cancel_token(&self) -> &CancelToken {
        self.guard.token()
    }

    /// Returns the server's identification once exchanged.
    pub fn server_version(&self) -> Option<&Version> {
        self.server_version.as_ref()
    }

    /// Connects, authenticates and starts the remote command.
    ///
    /// Does nothing if already connected or already cancelled.
    ///
    /// # Errors
    ///
    /// - [`RetroError::AuthenticationFailed`] if the password was rejected;
    ///   the only retryable failure
    /// - [`RetroError::HostKeyMismatch`] if the host key is not trusted
    /// - [`RetroError::Version`], [`RetroError::UnexpectedPacket`],
    ///   [`RetroError::CipherNegotiation`], [`RetroError::Disconnected`],
    ///   [`RetroError::Integrity`], [`RetroError::Io`] for the other fatal
    ///   conditions
    ///
    /// Every failure leaves the client disconnected with its socket released.
    pub async fn connect(&mut self) -> RetroResult<()> {
        if self.state == ClientState::Connected || self.guard.token().is_cancelled() {
            return Ok(());
        }

        match self.handshake().await {
            Ok(()) => Ok(()),
            Err(e) => {
                debug!("Handshake with {} failed: {}", self.config.host, e);
                if let Err(cleanup) = self.release().await {
                    warn!("Cleanup after failed handshake failed: {}", cleanup);
                }
                self.state = ClientState::Disconnected;
                Err(e)
            }
        }
    }

    async fn handshake(&mut self) -> RetroResult<()> {
        self.guard.set_cancellable(true);
        self.open_socket().await?;

        // Not cancellable until the password goes out
        self.guard.set_cancellable(false);

        self.exchange_versions().await?;
        let keys = self.receive_server_keys().await?;
        self.send_session_key(&keys).await?;
        self.send_user().await?;

        self.guard.set_cancellable(true);
        self.authenticate().await?;
        self.start_command().await?;

        let source = self.source.take().ok_or_else(not_connected)?;
        let sink = self.sink.clone().ok_or_else(not_connected)?;
        self.input = Some(SessionReader::new(source, sink.clone()));
        self.output = Some(SessionWriter::new(sink));
        self.state = ClientState::Connected;

        info!(
            "Connected to {}:{} as {}",
            self.config.host, self.config.port, self.config.username
        );
        Ok(())
    }

    async fn open_socket(&mut self) -> RetroResult<()> {
        let host = self.config.host.as_str();
        let port = self.config.port;
        let connect_timeout = self.config.connect_timeout;

        let stream = self
            .guard
            .run(async move {
                tokio::time::timeout(connect_timeout, TcpStream::connect((host, port)))
                    .await
                    .map_err(|_| {
                        RetroError::Io(std::io::Error::new(
                            std::io::ErrorKind::TimedOut,
                            "Connection timeout",
                        ))
                    })?
                    .map_err(RetroError::Io)
            })
            .await?;
        stream.set_nodelay(true)?;

        let (read_half, write_half) = stream.into_split();
        self.source = Some(PacketSource::new(Box::new(read_half), self.guard.clone()));
        self.sink = Some(PacketSink::new(Box::new(write_half), self.guard.clone()).shared());
        self.state = ClientState::SocketOpen;

        debug!("TCP connection to {}:{} established", host, port);
        Ok(())
    }

    async fn exchange_versions(&mut self) -> RetroResult<()> {
        let line = self.source()?.read_line().await?;
        let server_version = Version::parse(&line)?;
        info!("Server version: {}", server_version);

        let ours = Version::new(&self.config.client_version);
        self.send_raw(&ours.to_wire_format()).await?;

        self.server_version = Some(server_version);
        self.state = ClientState::VersionExchanged;
        Ok(())
    }

    async fn receive_server_keys(&mut self) -> RetroResult<ServerKeys> {
        let mut packet = self.source()?.expect(MessageType::PublicKey).await?;

        let mut cookie = [0u8; COOKIE_LEN];
        cookie.copy_from_slice(&packet.read_bytes(COOKIE_LEN)?);

        let server_bits = packet.read_u32()?;
        let server_exponent = packet.read_mp_int()?;
        let server_modulus = packet.read_mp_int()?;
        let host_bits = packet.read_u32()?;
        let host_exponent = packet.read_mp_int()?;
        let host_modulus = packet.read_mp_int()?;

        let keys = ServerKeys {
            cookie,
            server_key: RsaPublicKey::new(server_bits, server_exponent, server_modulus),
            host_key: RsaPublicKey::new(host_bits, host_exponent, host_modulus),
            protocol_flags: packet.read_u32()?,
            cipher_mask: packet.read_u32()?,
            auth_mask: packet.read_u32()?,
        };
        packet.close(true)?;

        debug!(
            "Server key {} bits, host key {} bits, ciphers {:#x}, auths {:#x}",
            keys.server_key.bits(),
            keys.host_key.bits(),
            keys.cipher_mask,
            keys.auth_mask
        );
        self.state = ClientState::KeysReceived;
        Ok(keys)
    }

    async fn send_session_key(&mut self, keys: &ServerKeys) -> RetroResult<()> {
        let session_id = rsa::session_id(
            keys.host_key.modulus(),
            keys.server_key.modulus(),
            &keys.cookie,
        );
        let cipher_kind = select_cipher(PREFERRED_CIPHERS, keys.cipher_mask)?;
        debug!("Selected cipher {}", cipher_kind.name());

        self.verify_host_key(&keys.host_key)?;

        let session_key = new_session_key();
        let xored = Zeroizing::new(rsa::xor_session_id(&session_key[..], &session_id));
        let wrapped = rsa::wrap_session_key(&xored, &keys.server_key, &keys.host_key)?;
        drop(xored);

        let mut payload = BytesMut::new();
        payload.put_u8(cipher_kind.id());
        payload.put_slice(&keys.cookie);
        put_mp_int(&mut payload, &wrapped);
        payload.put_u32(keys.protocol_flags);
        self.send(MessageType::SessionKey, &payload).await?;

        // Everything after SESSION_KEY is encrypted, each direction with its own chain
        let inbound = Cipher::new(cipher_kind, &session_key[..])?;
        let outbound = Cipher::new(cipher_kind, &session_key[..])?;
        drop(session_key);
        self.source()?.set_cipher(inbound);
        self.sink()?.lock().await.set_cipher(outbound);

        self.source()?.expect(MessageType::Success).await?.close(true)?;
        self.state = ClientState::SessionKeySent;
        Ok(())
    }

    fn verify_host_key(&self, host_key: &RsaPublicKey) -> RetroResult<()> {
        trust_host_key(&self.config.host, self.config.known_hosts(), host_key)
    }

    async fn send_user(&mut self) -> RetroResult<()> {
        let mut payload = BytesMut::new();
        put_string(&mut payload, self.config.username.as_bytes());
        self.send(MessageType::User, &payload).await?;
        self.state = ClientState::UserSent;

        // Only password authentication is supported, so the server must ask for it
        self.source()?.expect(MessageType::Failure).await?.close(true)
    }

    async fn authenticate(&mut self) -> RetroResult<()> {
        let payload = password_payload(&self.config.password);
        self.send(MessageType::AuthPassword, &payload).await?;
        drop(payload);

        match self.source()?.expect(MessageType::Success).await {
            Ok(packet) => {
                packet.close(true)?;
                self.state = ClientState::Authenticated;
                debug!("Password accepted for {}", self.config.username);
                Ok(())
            }
            Err(RetroError::UnexpectedPacket { actual, .. })
                if actual == MessageType::Failure as u8 =>
            {
                Err(RetroError::AuthenticationFailed)
            }
            Err(e) => Err(e),
        }
    }

    async fn start_command(&mut self) -> RetroResult<()> {
        match self.config.command.clone() {
            Some(command) => {
                let mut payload = BytesMut::new();
                put_string(&mut payload, command.as_bytes());
                self.send(MessageType::ExecCmd, &payload).await?;
                debug!("Started remote command");
            }
            None => {
                let mut payload = BytesMut::new();
                put_string(&mut payload, PTY_TERMINAL.as_bytes());
                payload.put_u32(0); // rows
                payload.put_u32(0); // columns
                payload.put_u32(0); // width, pixels
                payload.put_u32(0); // height, pixels
                payload.put_u8(TTY_OP_END);
                self.send(MessageType::RequestPty, &payload).await?;
                self.source()?.expect(MessageType::Success).await?.close(true)?;

                self.send(MessageType::ExecShell, &[]).await?;
                debug!("Started remote shell");
            }
        }
        self.state = ClientState::CommandStarted;
        Ok(())
    }

    /// Returns the stream carrying the remote process' output.
    pub fn input(&mut self) -> RetroResult<&mut SessionReader> {
        self.input.as_mut().ok_or_else(not_connected)
    }

    /// Returns the stream feeding the remote process' input.
    pub fn output(&mut self) -> RetroResult<&mut SessionWriter> {
        self.output.as_mut().ok_or_else(not_connected)
    }

    /// Returns both streams at once so they can be driven concurrently.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// # use retrossh_proto::ssh1::client::Client;
    /// # async fn demo(client: &mut Client) -> Result<(), Box<dyn std::error::Error>> {
    /// let (input, output) = client.streams()?;
    /// let mut received = Vec::new();
    /// let (read, written) = tokio::join!(input.read_to_end(&mut received), async {
    ///     output.write(b"hello\n").await?;
    ///     output.flush().await
    /// });
    /// read?;
    /// written?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn streams(&mut self) -> RetroResult<(&mut SessionReader, &mut SessionWriter)> {
        match (self.input.as_mut(), self.output.as_mut()) {
            (Some(input), Some(output)) => Ok((input, output)),
            _ => Err(not_connected()),
        }
    }

    /// Closes the connection.
    ///
    /// Sends `DISCONNECT` if connected, then releases the input stream, the
    /// output stream, the socket's read half, its write half and finally the
    /// socket. Every step runs even if an earlier one failed.
    ///
    /// # Errors
    ///
    /// Returns the first release failure.
    pub async fn disconnect(&mut self) -> RetroResult<()> {
        if self.state == ClientState::Connected {
            if let Some(output) = self.output.as_mut() {
                if let Err(e) = output.flush().await {
                    debug!("Failed to flush output before disconnect: {}", e);
                }
            }

            let mut payload = BytesMut::new();
            put_string(&mut payload, CLIENT_DISCONNECT_REASON.as_bytes());
            if let Err(e) = self.send(MessageType::Disconnect, &payload).await {
                debug!("Failed to send disconnect: {}", e);
            }
        }

        let result = self.release().await;
        self.state = ClientState::Disconnected;
        info!("Disconnected from {}", self.config.host);
        result
    }

    async fn release(&mut self) -> RetroResult<()> {
        let mut first = None;

        if let Some(input) = self.input.as_mut() {
            keep_first(&mut first, "input stream", input.close());
        }
        if let Some(output) = self.output.as_mut() {
            keep_first(&mut first, "output stream", output.close().await);
        }

        // Read half
        self.input = None;
        self.source = None;

        // Write half
        if let Some(sink) = self.sink.as_ref() {
            keep_first(&mut first, "socket output", sink.lock().await.shutdown().await);
        }

        // Socket
        self.output = None;
        self.sink = None;

        match first {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn source(&mut self) -> RetroResult<&mut PacketSource> {
        self.source.as_mut().ok_or_else(not_connected)
    }

    fn sink(&self) -> RetroResult<&SharedSink> {
        self.sink.as_ref().ok_or_else(not_connected)
    }

    async fn send(&self, msg_type: MessageType, payload: &[u8]) -> RetroResult<()> {
        self.sink()?.lock().await.send(msg_type, payload).await
    }

    async fn send_raw(&self, data: &[u8]) -> RetroResult<()> {
        self.sink()?.lock().await.send_raw(data).await
    }
}

/// Checks `host_key` against `store`. A store that cannot be located is
/// treated like one that cannot be read: the key is not trusted.
fn trust_host_key(
    host: &str,
    store: RetroResult<KnownHostsFile>,
    host_key: &RsaPublicKey,
) -> RetroResult<()> {
    let status = match store {
        Ok(store) => store.verify_host_key(host, host_key),
        Err(e) => {
            warn!("Known-hosts store unavailable: {}", e);
            HostKeyStatus::Unavailable
        }
    };
    if status.is_trusted() {
        debug!("Host key for {} is {:?}", host, status);
        return Ok(());
    }

    warn!(
        "Rejecting host key for {} (fingerprint {}): {:?}",
        host,
        host_key.fingerprint(),
        status
    );
    Err(RetroError::HostKeyMismatch {
        host: host.to_string(),
    })
}

fn new_session_key() -> Zeroizing<[u8; SESSION_KEY_LEN]> {
    let mut key = Zeroizing::new([0u8; SESSION_KEY_LEN]);
    rand::thread_rng().fill_bytes(&mut key[..]);
    key
}

/// `AUTH_PASSWORD` payload, wiped on drop.
fn password_payload(password: &str) -> Zeroizing<Vec<u8>> {
    let mut payload = Zeroizing::new(Vec::with_capacity(4 + password.len()));
    payload.extend_from_slice(&(password.len() as u32).to_be_bytes());
    payload.extend_from_slice(password.as_bytes());
    payload
}

fn keep_first(first: &mut Option<RetroError>, what: &str, result: RetroResult<()>) {
    if let Err(e) = result {
        warn!("Failed to release {}: {}", what, e);
        if first.is_none() {
            *first = Some(e);
        }
    }
}

fn not_connected() -> RetroError {
    RetroError::Io(std::io::Error::new(
        std::io::ErrorKind::NotConnected,
        "Not connected",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = ClientConfig::default();
        assert_eq!(config.port, 22);
        assert_eq!(config.connect_timeout, Duration::from_secs(30));
        assert!(config.io_timeout.is_none());
        assert!(config.command.is_none());
        assert!(config.client_version.starts_with("Retrossh_"));
    }

    #[test]
    fn test_config_debug_redacts_password() {
        let config = ClientConfig::new("host", "alice", "hunter2");
        let debug = format!("{:?}", config);
        assert!(debug.contains("alice"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn test_explicit_known_hosts_path() {
        let mut config = ClientConfig::new("host", "alice", "pw");
        config.known_hosts_file = Some(PathBuf::from("/tmp/kh"));
        assert_eq!(
            config.known_hosts().unwrap().path(),
            std::path::Path::new("/tmp/kh")
        );
    }

    #[test]
    fn test_dropping_clone_keeps_password() {
        let config = ClientConfig::new("host", "alice", "hunter2");
        drop(config.clone());
        assert_eq!(config.password, "hunter2");
    }

    #[test]
    fn test_password_payload_is_ssh_string() {
        let payload = password_payload("hunter2");
        let mut expected = BytesMut::new();
        put_string(&mut expected, b"hunter2");
        assert_eq!(&payload[..], &expected[..]);
        assert_eq!(payload.capacity(), payload.len());
    }

    #[test]
    fn test_session_keys_are_fresh() {
        let first = new_session_key();
        let second = new_session_key();
        assert_ne!(*first, [0u8; SESSION_KEY_LEN]);
        assert_ne!(*first, *second);
    }

    fn host_key() -> RsaPublicKey {
        use crate::ssh1::rsa::test_keys::{hex, LARGE_N};
        RsaPublicKey::new(1024, num_bigint::BigUint::from(65537u32), hex(LARGE_N))
    }

    #[test]
    fn test_unlocatable_store_rejects_host_key() {
        let store = Err(RetroError::Config("HOME is not set".to_string()));
        let err = trust_host_key("legacy.example.com", store, &host_key()).unwrap_err();
        assert!(matches!(
            err,
            RetroError::HostKeyMismatch { ref host } if host == "legacy.example.com"
        ));
        assert!(err.is_host_key_failure());
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_new_host_key_is_recorded_and_trusted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("known_hosts");
        let store = Ok(KnownHostsFile::new(&path));
        trust_host_key("legacy.example.com", store, &host_key()).unwrap();
        assert!(std::fs::read_to_string(&path)
            .unwrap()
            .starts_with("legacy.example.com 1024 65537 "));
    }

    #[test]
    fn test_new_client_is_disconnected() {
        let mut client = Client::new(ClientConfig::new("host", "alice", "pw"));
        assert_eq!(client.state(), ClientState::Disconnected);
        assert!(!client.is_connected());
        assert!(client.input().is_err());
        assert!(client.streams().is_err());
    }

    #[tokio::test]
    async fn test_connect_is_noop_when_cancelled() {
        let token = CancelToken::new();
        token.cancel();
        // Unroutable; any attempt to connect would fail
        let mut config = ClientConfig::new("256.0.0.1", "alice", "pw");
        config.connect_timeout = Duration::from_millis(10);
        let mut client = Client::with_cancel_token(config, token);

        client.connect().await.unwrap();
        assert_eq!(client.state(), ClientState::Disconnected);
    }

    #[tokio::test]
    async fn test_connect_failure_leaves_client_disconnected() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let mut config = ClientConfig::new("127.0.0.1", "alice", "pw");
        config.port = port;
        let mut client = Client::new(config);

        assert!(matches!(client.connect().await, Err(RetroError::Io(_))));
        assert_eq!(client.state(), ClientState::Disconnected);
    }

    #[tokio::test]
    async fn test_disconnect_when_never_connected() {
        let mut client = Client::new(ClientConfig::new("host", "alice", "pw"));
        client.disconnect().await.unwrap();
        assert_eq!(client.state(), ClientState::Disconnected);
    }
}
