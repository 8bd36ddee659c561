//! In-process SSH-1.5 server for integration tests.
//!
//! Speaks just enough of the protocol to drive a real client through the
//! handshake and a scripted session, recording what the client sent.

#![allow(dead_code)]

use bytes::{BufMut, BytesMut};
use num_bigint::BigUint;
use retrossh_proto::ssh1::crypto::{Cipher, CipherKind};
use retrossh_proto::ssh1::packet::{put_mp_int, put_string, ClientPacket, ServerPacket};
use retrossh_proto::ssh1::rsa::session_id;
use retrossh_proto::ssh1::MessageType;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio::time::Duration;

pub type ServerResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

pub type TestResult = ServerResult<()>;

/// 768-bit test key, used as the ephemeral server key.
pub const SERVER_KEY_N: &str = "9af710596eb4fe6ed4419eac6f4d26367627632300fc1e4f34f24fa2a28eab9e2b699acb8726480441dc700666ebf08ce87ecb477955ebf7536bedb90cb735063e97391be99b473e95a81b0c8a0fc5f2d32b19005d5e8cfd2d1b8ef71eaab9e1";
pub const SERVER_KEY_D: &str = "782ec29c4992cf7d0edaf17f9436863b58b94556a16de6e7d10d581baeeced46972ea8e1ce282f5435ec0b69bbaaa27cc0b86defd92b4af0c704965b2590d1d056a80fb638747a341ef1cea948bc64ee8cec32d1efbeef5e347fad986f7acd5d";

/// 1024-bit test key, used as the host key.
pub const HOST_KEY_N: &str = "ba9a577bc5fb965a76f581a04904bc2aea5b70640bbb8a6de39eda400cbae8dcd8ee828c1ab5a55ef0ab555b16b00d65f6907806c8fe8d977662519755ef07adbe4111bc020b6d831c47757126fd0bb8f06d9bff2c80cd96b55d72e44fc92b5ac1ce8ca1fd993958d61ca906e63c1bbaa2e2043e02aedf6fa54aa3f8873b004b";
pub const HOST_KEY_D: &str = "29ff5ebd2ebc0704e94d2c15851999b816f2e982bad944b8a2c837dabe82bab229e8d45cf00dfde0364e79717cd3b6d0420415df81113990e3461192fbf64645c3f0070a16faaf1e71a46b3eb83d7943f6cfbcf9d69204a58cb169253baeecb52dfe85d6a770a632aaa21bbee149e207dd62d27a7b97414d7181951e08414321";

pub const EXPONENT: u32 = 65537;
pub const COOKIE: [u8; 8] = [0xc0, 0x0e, 2, 3, 4, 5, 6, 7];

pub fn hex(s: &str) -> BigUint {
    BigUint::parse_bytes(s.as_bytes(), 16).unwrap()
}

/// What the server does once the remote command has started.
#[derive(Debug, Clone)]
pub enum Session {
    /// Echo `len` bytes of stdin back in 1000-byte stdout packets, then exit.
    Echo { len: usize, exit_status: u32 },
    /// Send stdout and stderr text, then exit.
    Output {
        stdout: Vec<u8>,
        stderr: Vec<u8>,
        exit_status: u32,
    },
    /// Disconnect with this reason.
    Disconnect(String),
}

/// Server behaviour.
#[derive(Debug, Clone)]
pub struct ServerOptions {
    pub version: String,
    /// Pause before the identification line is sent.
    pub version_delay: Duration,
    pub first_packet: MessageType,
    pub cipher_mask: u32,
    pub password: String,
    pub send_debug: bool,
    pub session: Session,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            version: "SSH-1.5-TestServer_1.0\n".to_string(),
            version_delay: Duration::ZERO,
            first_packet: MessageType::PublicKey,
            cipher_mask: CipherKind::Blowfish.mask_bit(),
            password: "secret".to_string(),
            send_debug: true,
            session: Session::Output {
                stdout: b"hello".to_vec(),
                stderr: Vec::new(),
                exit_status: 0,
            },
        }
    }
}

/// What the client sent.
#[derive(Debug, Default, Clone)]
pub struct ServerLog {
    pub client_version: String,
    pub username: String,
    pub password: String,
    pub authenticated: bool,
    pub command: Option<String>,
    pub pty_terminal: Option<String>,
    pub pty_payload_tail: Vec<u8>,
    pub stdin: Vec<u8>,
    pub exit_confirmed: bool,
    pub disconnect_reason: Option<String>,
}

pub struct TestServer {
    pub port: u16,
    pub handle: JoinHandle<ServerResult<ServerLog>>,
}

/// Binds a listener on localhost and serves one connection.
pub async fn spawn(options: ServerOptions) -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let handle = tokio::spawn(async move {
        let (stream, _) = listener.accept().await?;
        let (read_half, write_half) = stream.into_split();
        let mut conn = ServerConn {
            reader: BufReader::new(read_half),
            writer: write_half,
            rx: None,
            tx: None,
        };
        conn.serve(options).await
    });

    TestServer { port, handle }
}

struct ServerConn {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    rx: Option<Cipher>,
    tx: Option<Cipher>,
}

impl ServerConn {
    async fn send(&mut self, msg_type: MessageType, payload: &[u8]) -> ServerResult<()> {
        let packet = ClientPacket::new(msg_type, payload, self.tx.as_mut())?;
        self.writer.write_all(packet.as_bytes()).await?;
        Ok(())
    }

    async fn recv(&mut self) -> ServerResult<ServerPacket> {
        Ok(ServerPacket::read(&mut self.reader, self.rx.as_mut()).await?)
    }

    async fn recv_type(&mut self, msg_type: MessageType) -> ServerResult<ServerPacket> {
        let packet = self.recv().await?;
        if !packet.is(msg_type) {
            return Err(format!("expected {}, got {}", msg_type, packet.msg_type()).into());
        }
        Ok(packet)
    }

    async fn send_string(&mut self, msg_type: MessageType, data: &[u8]) -> ServerResult<()> {
        let mut payload = BytesMut::new();
        put_string(&mut payload, data);
        self.send(msg_type, &payload).await
    }

    async fn serve(&mut self, options: ServerOptions) -> ServerResult<ServerLog> {
        let mut log = ServerLog::default();

        tokio::time::sleep(options.version_delay).await;
        self.writer.write_all(options.version.as_bytes()).await?;
        let mut line = Vec::new();
        self.reader.read_until(b'\n', &mut line).await?;
        log.client_version = String::from_utf8(line)?;

        if options.first_packet != MessageType::PublicKey {
            self.send(options.first_packet, &[]).await?;
            return Ok(log);
        }

        let server_n = hex(SERVER_KEY_N);
        let host_n = hex(HOST_KEY_N);
        let e = BigUint::from(EXPONENT);

        let mut payload = BytesMut::new();
        payload.put_slice(&COOKIE);
        payload.put_u32(768);
        put_mp_int(&mut payload, &e);
        put_mp_int(&mut payload, &server_n);
        payload.put_u32(1024);
        put_mp_int(&mut payload, &e);
        put_mp_int(&mut payload, &host_n);
        payload.put_u32(0); // protocol flags
        payload.put_u32(options.cipher_mask);
        payload.put_u32(1 << 3); // password authentication
        self.send(MessageType::PublicKey, &payload).await?;

        let mut packet = self.recv_type(MessageType::SessionKey).await?;
        let cipher_id = packet.read_u8()?;
        let cookie = packet.read_bytes(8)?;
        let wrapped = packet.read_mp_int()?;
        let _flags = packet.read_u32()?;
        packet.close(true)?;
        if cookie[..] != COOKIE[..] {
            return Err("cookie not echoed".into());
        }

        // The host key has the larger modulus, so it is the outer layer
        let middle = unpad(&wrapped.modpow(&hex(HOST_KEY_D), &host_n))?;
        let inner = unpad(&BigUint::from_bytes_be(&middle).modpow(&hex(SERVER_KEY_D), &server_n))?;
        let mut key = vec![0u8; 32 - inner.len()];
        key.extend_from_slice(&inner);
        let id = session_id(&host_n, &server_n, &COOKIE);
        for (b, x) in key.iter_mut().zip(id.iter()) {
            *b ^= x;
        }

        let kind = CipherKind::from_id(cipher_id).ok_or("unknown cipher")?;
        self.rx = Some(Cipher::new(kind, &key)?);
        self.tx = Some(Cipher::new(kind, &key)?);

        if options.send_debug {
            self.send_string(MessageType::Debug, b"key accepted").await?;
        }
        self.send(MessageType::Success, &[]).await?;

        let mut packet = self.recv_type(MessageType::User).await?;
        log.username = String::from_utf8(packet.read_string()?.to_vec())?;
        packet.close(true)?;
        self.send(MessageType::Failure, &[]).await?;

        let mut packet = match self.recv().await {
            Ok(packet) => packet,
            // Client gave up before sending the password
            Err(_) => return Ok(log),
        };
        if !packet.is(MessageType::AuthPassword) {
            return Err(format!("expected password, got {}", packet.msg_type()).into());
        }
        log.password = String::from_utf8(packet.read_string()?.to_vec())?;
        packet.close(true)?;
        if log.password != options.password {
            self.send(MessageType::Failure, &[]).await?;
            return Ok(log);
        }
        self.send(MessageType::Success, &[]).await?;
        log.authenticated = true;

        let mut packet = self.recv().await?;
        if packet.is(MessageType::RequestPty) {
            log.pty_terminal = Some(String::from_utf8(packet.read_string()?.to_vec())?);
            log.pty_payload_tail = packet.read_to_end().to_vec();
            packet.close(true)?;
            self.send(MessageType::Success, &[]).await?;
            self.recv_type(MessageType::ExecShell).await?.close(true)?;
        } else if packet.is(MessageType::ExecCmd) {
            log.command = Some(String::from_utf8(packet.read_string()?.to_vec())?);
            packet.close(true)?;
        } else {
            return Err(format!("unexpected packet {}", packet.msg_type()).into());
        }

        match options.session {
            Session::Echo { len, exit_status } => {
                while log.stdin.len() < len {
                    let mut packet = self.recv_type(MessageType::StdinData).await?;
                    let data = packet.read_string()?;
                    packet.close(true)?;
                    log.stdin.extend_from_slice(&data);
                }
                let echoed = log.stdin.clone();
                for chunk in echoed.chunks(1000) {
                    self.send_string(MessageType::StdoutData, chunk).await?;
                }
                self.finish(&mut log, exit_status).await?;
            }
            Session::Output {
                stdout,
                stderr,
                exit_status,
            } => {
                if !stdout.is_empty() {
                    self.send_string(MessageType::StdoutData, &stdout).await?;
                }
                if options.send_debug {
                    self.send_string(MessageType::Debug, b"between streams").await?;
                }
                if !stderr.is_empty() {
                    self.send_string(MessageType::StderrData, &stderr).await?;
                }
                self.finish(&mut log, exit_status).await?;
            }
            Session::Disconnect(reason) => {
                self.send_string(MessageType::Disconnect, reason.as_bytes())
                    .await?;
            }
        }

        Ok(log)
    }

    /// Sends the exit status and waits for confirmation and the client's goodbye.
    async fn finish(&mut self, log: &mut ServerLog, exit_status: u32) -> ServerResult<()> {
        self.send(MessageType::ExitStatus, &exit_status.to_be_bytes())
            .await?;

        loop {
            let mut packet = match self.recv().await {
                Ok(packet) => packet,
                // Client went away
                Err(_) => return Ok(()),
            };
            match packet.message() {
                Some(MessageType::ExitConfirmation) => log.exit_confirmed = true,
                Some(MessageType::StdinData) => {
                    let data = packet.read_string()?;
                    log.stdin.extend_from_slice(&data);
                }
                Some(MessageType::Disconnect) => {
                    let reason = packet.read_string()?;
                    log.disconnect_reason = Some(String::from_utf8(reason.to_vec())?);
                    packet.close(true)?;
                    return Ok(());
                }
                _ => return Err(format!("unexpected packet {}", packet.msg_type()).into()),
            }
            packet.close(true)?;
        }
    }
}

/// Strips PKCS#1 type 2 padding from a raw RSA decryption result.
fn unpad(m: &BigUint) -> ServerResult<Vec<u8>> {
    let bytes = m.to_bytes_be();
    if bytes.first() != Some(&2) {
        return Err("bad PKCS#1 block type".into());
    }
    let sep = bytes
        .iter()
        .skip(1)
        .position(|&b| b == 0)
        .ok_or("missing PKCS#1 separator")?
        + 1;
    Ok(bytes[sep + 1..].to_vec())
}
