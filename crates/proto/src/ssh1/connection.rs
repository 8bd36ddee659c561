//! Connection wrapper binding an endpoint and credentials to a [`Client`].
//!
//! A [`Connection`] only exists once the remote command is running; callers
//! get plain byte streams and never see packets.
//!
//! # Example
//!
//! ```rust,no_run
//! use retrossh_proto::ssh1::client::ClientConfig;
//! use retrossh_proto::ssh1::connection::Connection;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut config = ClientConfig::new("legacy.example.com", "git", "secret");
//! config.command = Some("git-upload-pack '/repo.git'".to_string());
//!
//! let mut connection = Connection::open(config).await?;
//! connection.output()?.write(b"0000").await?;
//! connection.output()?.flush().await?;
//!
//! let mut advertisement = [0u8; 4];
//! connection.input()?.read(&mut advertisement).await?;
//! connection.close().await?;
//! # Ok(())
//! # }
//! ```

use crate::ssh1::cancel::CancelToken;
use crate::ssh1::client::{Client, ClientConfig};
use crate::ssh1::stream::{SessionReader, SessionWriter};
use retrossh_platform::{RetroError, RetroResult};
use tracing::debug;

/// Collected result of a remote command run to completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Merged stdout and stderr.
    pub output: Vec<u8>,
    /// Exit status, if the server reported one.
    pub exit_status: Option<u32>,
}

/// Open connection to a remote command.
#[derive(Debug)]
pub struct Connection {
    client: Client,
}

impl Connection {
    /// Connects and starts the configured command (or shell).
    ///
    /// # Errors
    ///
    /// Propagates the categorized error of [`Client::connect`]; callers check
    /// [`RetroError::is_retryable`]
    /// to decide whether to ask for the password again.
    pub async fn open(config: ClientConfig) -> RetroResult<Self> {
        Self::open_with_cancel(config, CancelToken::new()).await
    }

    /// Like [`Connection::open`], with I/O aborted when `token` fires.
    pub async fn open_with_cancel(config: ClientConfig, token: CancelToken) -> RetroResult<Self> {
        let mut client = Client::with_cancel_token(config, token);
        client.connect().await?;
        if !client.is_connected() {
            // connect() is a no-op for an already cancelled token
            return Err(RetroError::Cancelled);
        }
        Ok(Self { client })
    }

    /// Runs `config.command` to completion and collects its output.
    pub async fn execute(config: ClientConfig) -> RetroResult<CommandOutput> {
        let mut connection = Self::open(config).await?;

        let mut output = Vec::new();
        let read = connection.input()?.read_to_end(&mut output).await;
        let exit_status = connection.exit_status();
        let closed = connection.close().await;

        read?;
        if let Err(e) = closed {
            debug!("Error closing finished command: {}", e);
        }
        Ok(CommandOutput {
            output,
            exit_status,
        })
    }

    /// Returns the remote process' output stream.
    pub fn input(&mut self) -> RetroResult<&mut SessionReader> {
        self.client.input()
    }

    /// Returns the remote process' input stream.
    pub fn output(&mut self) -> RetroResult<&mut SessionWriter> {
        self.client.output()
    }

    /// Returns both streams for concurrent use.
    pub fn streams(&mut self) -> RetroResult<(&mut SessionReader, &mut SessionWriter)> {
        self.client.streams()
    }

    /// Returns the remote exit status once the input stream has reached it.
    pub fn exit_status(&mut self) -> Option<u32> {
        self.client.input().ok().and_then(|input| input.exit_status())
    }

    /// Returns the underlying client.
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Disconnects and releases the socket.
    pub async fn close(mut self) -> RetroResult<()> {
        self.client.disconnect().await
    }
}
