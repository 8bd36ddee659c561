//! Packet transport halves and the byte streams built on top of them.
//!
//! After login the remote process is reached through two streams:
//!
//! - [`SessionReader`] merges `STDOUT_DATA` and `STDERR_DATA` into one byte
//!   sequence, drops `DEBUG` packets, ends at `EXITSTATUS` (acknowledged with
//!   `EXIT_CONFIRMATION`) and fails with the server's reason on `DISCONNECT`.
//! - [`SessionWriter`] batches bytes into `STDIN_DATA` packets of at most
//!   [`MAX_STDIN_CHUNK`] bytes.
//!
//! Both sit on a [`PacketSource`] / [`PacketSink`] pair holding the two
//! halves of the socket, so reading and writing can proceed concurrently.
//! The sink is shared because the reader answers exit statuses itself.

use crate::ssh1::cancel::IoGuard;
use crate::ssh1::crypto::Cipher;
use crate::ssh1::message::MessageType;
use crate::ssh1::packet::{put_string, ClientPacket, ServerPacket};
use crate::ssh1::version::MAX_VERSION_LENGTH;
use bytes::{Buf, Bytes, BytesMut};
use retrossh_platform::{RetroError, RetroResult};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;
use tracing::debug;

/// Largest amount of data carried by one `STDIN_DATA` packet.
pub const MAX_STDIN_CHUNK: usize = 1024;

/// Reason reported when the server disconnects without giving one.
pub const DEFAULT_DISCONNECT_REASON: &str = "Connection closed by remote host";

/// Inbound half of the socket.
pub type RawReader = Box<dyn AsyncRead + Send + Sync + Unpin>;

/// Outbound half of the socket.
pub type RawWriter = Box<dyn AsyncWrite + Send + Sync + Unpin>;

/// Outbound packet writer shared by the client and its streams.
pub type SharedSink = Arc<Mutex<PacketSink>>;

/// Reads and decrypts inbound packets.
pub struct PacketSource {
    reader: BufReader<RawReader>,
    cipher: Option<Cipher>,
    guard: IoGuard,
}

impl std::fmt::Debug for PacketSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PacketSource")
            .field("cipher", &self.cipher)
            .finish_non_exhaustive()
    }
}

impl PacketSource {
    /// Creates a plaintext source over `reader`.
    pub fn new(reader: RawReader, guard: IoGuard) -> Self {
        Self {
            reader: BufReader::new(reader),
            cipher: None,
            guard,
        }
    }

    /// Decrypts every following packet with `cipher`.
    pub fn set_cipher(&mut self, cipher: Cipher) {
        self.cipher = Some(cipher);
    }

    /// Reads the server's LF-terminated identification line.
    ///
    /// # Errors
    ///
    /// Returns [`RetroError::Protocol`] if no terminator arrives within
    /// [`MAX_VERSION_LENGTH`] bytes, and [`RetroError::Io`] if the
    /// connection closes first.
    pub async fn read_line(&mut self) -> RetroResult<String> {
        let reader = &mut self.reader;
        let line = self
            .guard
            .run(async move {
                let mut line = Vec::new();
                loop {
                    let byte = reader.read_u8().await?;
                    line.push(byte);
                    if byte == b'\n' {
                        break;
                    }
                    if line.len() > MAX_VERSION_LENGTH {
                        return Err(RetroError::Protocol(format!(
                            "Version string too long: more than {} bytes",
                            MAX_VERSION_LENGTH
                        )));
                    }
                }
                Ok(line)
            })
            .await?;

        Ok(String::from_utf8_lossy(&line).into_owned())
    }

    /// Reads the next packet, whatever its type.
    pub async fn next(&mut self) -> RetroResult<ServerPacket> {
        let reader = &mut self.reader;
        let cipher = self.cipher.as_mut();
        self.guard.run(ServerPacket::read(reader, cipher)).await
    }

    /// Reads the next packet that is not `DEBUG`.
    ///
    /// Debug packets are logged and validated, never returned.
    pub async fn next_non_debug(&mut self) -> RetroResult<ServerPacket> {
        loop {
            let mut packet = self.next().await?;
            if !packet.is(MessageType::Debug) {
                return Ok(packet);
            }
            debug!("Remote debug: {}", debug_text(&mut packet));
            packet.close(true)?;
        }
    }

    /// Reads the next non-debug packet and checks its type.
    ///
    /// # Errors
    ///
    /// A `DISCONNECT` yields [`RetroError::Disconnected`] with the server's
    /// reason; any other mismatch yields [`RetroError::UnexpectedPacket`].
    /// The offending packet is closed before the error is returned.
    pub async fn expect(&mut self, msg_type: MessageType) -> RetroResult<ServerPacket> {
        let mut packet = self.next_non_debug().await?;
        if packet.is(msg_type) {
            return Ok(packet);
        }

        if packet.is(MessageType::Disconnect) {
            let reason = disconnect_reason(&mut packet);
            let _ = packet.close(false);
            return Err(RetroError::Disconnected(reason));
        }

        let actual = packet.msg_type();
        let _ = packet.close(false);
        Err(RetroError::UnexpectedPacket {
            expected: msg_type.name(),
            actual,
        })
    }
}

/// Encrypts and writes outbound packets.
pub struct PacketSink {
    writer: RawWriter,
    cipher: Option<Cipher>,
    guard: IoGuard,
}

impl std::fmt::Debug for PacketSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PacketSink")
            .field("cipher", &self.cipher)
            .finish_non_exhaustive()
    }
}

impl PacketSink {
    /// Creates a plaintext sink over `writer`.
    pub fn new(writer: RawWriter, guard: IoGuard) -> Self {
        Self {
            writer,
            cipher: None,
            guard,
        }
    }

    /// Wraps the sink for sharing.
    pub fn shared(self) -> SharedSink {
        Arc::new(Mutex::new(self))
    }

    /// Encrypts every following packet with `cipher`.
    pub fn set_cipher(&mut self, cipher: Cipher) {
        self.cipher = Some(cipher);
    }

    /// Writes bytes outside the packet layer (the identification line).
    pub async fn send_raw(&mut self, data: &[u8]) -> RetroResult<()> {
        let writer = &mut self.writer;
        self.guard
            .run(async move {
                writer.write_all(data).await?;
                writer.flush().await?;
                Ok(())
            })
            .await
    }

    /// Encodes and sends one packet.
    pub async fn send(&mut self, msg_type: MessageType, payload: &[u8]) -> RetroResult<()> {
        let packet = ClientPacket::new(msg_type, payload, self.cipher.as_mut())?;
        debug!("Sending {} ({} bytes)", msg_type, packet.len());
        self.send_raw(packet.as_bytes()).await
    }

    /// Shuts the write half down.
    ///
    /// Not cancellable; used during teardown.
    pub async fn shutdown(&mut self) -> RetroResult<()> {
        self.writer.shutdown().await.map_err(RetroError::Io)
    }
}

/// Message of a `DEBUG` packet; a malformed payload is returned as is.
fn debug_text(packet: &mut ServerPacket) -> String {
    let text = match packet.read_string() {
        Ok(text) => text,
        Err(_) => packet.read_to_end(),
    };
    String::from_utf8_lossy(&text).into_owned()
}

/// Extracts the reason string of a `DISCONNECT` packet.
pub fn disconnect_reason(packet: &mut ServerPacket) -> String {
    match packet.read_string() {
        Ok(reason) if !reason.is_empty() => String::from_utf8_lossy(&reason).into_owned(),
        _ => DEFAULT_DISCONNECT_REASON.to_string(),
    }
}

/// State of the input stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReaderState {
    /// No buffered data; the next read fetches a packet.
    Idle,
    /// Data from the last packet not yet handed out.
    Filling(Bytes),
    /// The remote process exited; reads return 0.
    AtEnd,
    /// Closed locally.
    Closed,
    /// The server disconnected with this reason.
    Disconnected(String),
}

/// Input stream carrying the remote process' stdout and stderr.
#[derive(Debug)]
pub struct SessionReader {
    source: PacketSource,
    sink: SharedSink,
    state: ReaderState,
    exit_status: Option<u32>,
}

impl SessionReader {
    /// Creates the stream over an authenticated, encrypted transport.
    pub fn new(source: PacketSource, sink: SharedSink) -> Self {
        Self {
            source,
            sink,
            state: ReaderState::Idle,
            exit_status: None,
        }
    }

    /// Returns the stream state.
    pub fn state(&self) -> &ReaderState {
        &self.state
    }

    /// Returns the remote exit status once it has arrived.
    pub fn exit_status(&self) -> Option<u32> {
        self.exit_status
    }

    /// Reads into `buf`, returning the number of bytes read.
    ///
    /// Returns 0 once the remote process has exited.
    ///
    /// # Errors
    ///
    /// Returns [`RetroError::Disconnected`] if the server closed the session,
    /// on this and every later call.
    pub async fn read(&mut self, buf: &mut [u8]) -> RetroResult<usize> {
        loop {
            match &mut self.state {
                ReaderState::Filling(data) => {
                    let n = data.len().min(buf.len());
                    buf[..n].copy_from_slice(&data[..n]);
                    data.advance(n);
                    if data.is_empty() {
                        self.state = ReaderState::Idle;
                    }
                    return Ok(n);
                }
                ReaderState::AtEnd => return Ok(0),
                ReaderState::Closed => {
                    return Err(RetroError::Io(std::io::Error::new(
                        std::io::ErrorKind::NotConnected,
                        "Input stream is closed",
                    )))
                }
                ReaderState::Disconnected(reason) => {
                    return Err(RetroError::Disconnected(reason.clone()))
                }
                ReaderState::Idle => {
                    if buf.is_empty() {
                        return Ok(0);
                    }
                    self.fill().await?;
                }
            }
        }
    }

    /// Reads until the remote process exits, appending to `out`.
    pub async fn read_to_end(&mut self, out: &mut Vec<u8>) -> RetroResult<usize> {
        let mut buf = [0u8; 4096];
        let mut total = 0;
        loop {
            let n = self.read(&mut buf).await?;
            if n == 0 {
                return Ok(total);
            }
            out.extend_from_slice(&buf[..n]);
            total += n;
        }
    }

    async fn fill(&mut self) -> RetroResult<()> {
        let mut packet = self.source.next_non_debug().await?;

        match packet.message() {
            Some(MessageType::StdoutData) | Some(MessageType::StderrData) => {
                let data = packet.read_string()?;
                packet.close(true)?;
                if !data.is_empty() {
                    self.state = ReaderState::Filling(data);
                }
                Ok(())
            }
            Some(MessageType::ExitStatus) => {
                let status = packet.read_u32()?;
                packet.close(true)?;
                debug!("Remote process exited with status {}", status);
                self.exit_status = Some(status);
                self.state = ReaderState::AtEnd;
                self.sink
                    .lock()
                    .await
                    .send(MessageType::ExitConfirmation, &[])
                    .await
            }
            Some(MessageType::Disconnect) => {
                let reason = disconnect_reason(&mut packet);
                let _ = packet.close(false);
                debug!("Server disconnected: {}", reason);
                self.state = ReaderState::Disconnected(reason.clone());
                Err(RetroError::Disconnected(reason))
            }
            _ => {
                let actual = packet.msg_type();
                let _ = packet.close(false);
                Err(RetroError::UnexpectedPacket {
                    expected: "SSH_SMSG_STDOUT_DATA",
                    actual,
                })
            }
        }
    }

    /// Closes the stream; later reads fail.
    pub fn close(&mut self) -> RetroResult<()> {
        self.state = ReaderState::Closed;
        Ok(())
    }
}

/// Output stream feeding the remote process' stdin.
#[derive(Debug)]
pub struct SessionWriter {
    sink: SharedSink,
    buffer: BytesMut,
    closed: bool,
}

impl SessionWriter {
    /// Creates the stream over an authenticated, encrypted transport.
    pub fn new(sink: SharedSink) -> Self {
        Self {
            sink,
            buffer: BytesMut::with_capacity(MAX_STDIN_CHUNK),
            closed: false,
        }
    }

    /// Buffers all of `data`, sending a packet each time the buffer fills.
    pub async fn write(&mut self, mut data: &[u8]) -> RetroResult<()> {
        self.check_open()?;
        while !data.is_empty() {
            let n = (MAX_STDIN_CHUNK - self.buffer.len()).min(data.len());
            self.buffer.extend_from_slice(&data[..n]);
            data = &data[n..];
            if self.buffer.len() == MAX_STDIN_CHUNK {
                self.send_buffer().await?;
            }
        }
        Ok(())
    }

    /// Sends any buffered bytes.
    pub async fn flush(&mut self) -> RetroResult<()> {
        self.check_open()?;
        self.send_buffer().await
    }

    /// Flushes and closes the stream. Closing twice is a no-op.
    pub async fn close(&mut self) -> RetroResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.send_buffer().await
    }

    /// Whether the stream has been closed.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn check_open(&self) -> RetroResult<()> {
        if self.closed {
            return Err(RetroError::Io(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                "Output stream is closed",
            )));
        }
        Ok(())
    }

    async fn send_buffer(&mut self) -> RetroResult<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let mut payload = BytesMut::with_capacity(4 + self.buffer.len());
        put_string(&mut payload, &self.buffer);
        self.buffer.clear();
        self.sink
            .lock()
            .await
            .send(MessageType::StdinData, &payload)
            .await
    }
}
