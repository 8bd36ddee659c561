//! Remote Command Execution Example
//!
//! Runs one command on an SSH-1.5 server, copies its output to stdout and
//! exits with the remote exit status, like `ssh -1 user@host command`.
//!
//! Usage:
//!   cargo run --example exec_command <host[:port]> <username> <password> [command]
//!
//! Without a command a shell is started on a dumb terminal and stdin is
//! forwarded to it.
//!
//! Example:
//!   RUST_LOG=debug cargo run --example exec_command 127.0.0.1:2222 admin secret "uname -a"

use retrossh_proto::ssh1::{ClientConfig, Connection};
use std::env;
use std::io::Write;
use std::time::Duration;
use tokio::io::AsyncReadExt;

fn parse_endpoint(endpoint: &str) -> Result<(String, u16), Box<dyn std::error::Error>> {
    match endpoint.rsplit_once(':') {
        Some((host, port)) => Ok((host.to_string(), port.parse()?)),
        None => Ok((endpoint.to_string(), 22)),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 4 {
        eprintln!(
            "Usage: {} <host[:port]> <username> <password> [command]",
            args[0]
        );
        std::process::exit(1);
    }

    let (host, port) = parse_endpoint(&args[1])?;
    let mut config = ClientConfig::new(&host, &args[2], &args[3]);
    config.port = port;
    config.command = args.get(4).cloned();
    config.connect_timeout = Duration::from_secs(10);

    let mut connection = match Connection::open(config).await {
        Ok(connection) => connection,
        Err(e) if e.is_host_key_failure() => {
            eprintln!("WARNING: the host key of {} has changed!", host);
            eprintln!("Someone could be intercepting the connection.");
            std::process::exit(255);
        }
        Err(e) if e.is_retryable() => {
            eprintln!("Permission denied: {}", e);
            std::process::exit(255);
        }
        Err(e) => return Err(e.into()),
    };

    {
        let (input, output) = connection.streams()?;

        let forward_stdin = async {
            let mut stdin = tokio::io::stdin();
            let mut buf = [0u8; 1024];
            loop {
                let n = stdin.read(&mut buf).await?;
                if n == 0 {
                    break;
                }
                output.write(&buf[..n]).await?;
                output.flush().await?;
            }
            Ok::<_, Box<dyn std::error::Error>>(())
        };

        let copy_output = async {
            let mut buf = [0u8; 4096];
            let mut stdout = std::io::stdout();
            loop {
                let n = input.read(&mut buf).await?;
                if n == 0 {
                    break;
                }
                stdout.write_all(&buf[..n])?;
                stdout.flush()?;
            }
            Ok::<_, Box<dyn std::error::Error>>(())
        };

        // Output ends the session; stdin may stay open forever
        tokio::pin!(copy_output);
        tokio::select! {
            result = &mut copy_output => result?,
            result = forward_stdin => {
                result?;
                copy_output.await?;
            }
        }
    }

    let status = connection.exit_status();
    connection.close().await?;
    std::process::exit(status.map(|s| s as i32).unwrap_or(0));
}
