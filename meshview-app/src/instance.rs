//! Single-instance lock
//!
//! The first launch listens on a loopback port. Later launches connect to it,
//! hand over their file argument and exit, so every file ends up in the one
//! open window.

use anyhow::{Context as _, Result};
use std::io;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::runtime::{Builder, Runtime};
use tracing::{debug, info, warn};

/// Loopback port owned by the running instance
pub const INSTANCE_PORT: u16 = 47_613;

const GREETING: &str = "meshview-open";
const ACK: &str = "ok";
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(2);

/// A later launch's request. `None` only asks for focus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Forwarded {
    pub file: Option<PathBuf>,
}

pub enum Instance {
    /// This process shows the window. No server when another program holds
    /// the port without answering.
    Primary(Option<InstanceServer>),
    /// A running instance took over the request
    Forwarded,
}

/// Accepts requests from later launches until dropped
pub struct InstanceServer {
    runtime: Runtime,
    listener: Option<TcpListener>,
    local_addr: SocketAddr,
}

impl InstanceServer {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Start accepting; `on_request` runs on a background thread
    pub fn serve(&mut self, on_request: impl Fn(Forwarded) + Send + Sync + 'static) {
        if let Some(listener) = self.listener.take() {
            self.runtime.spawn(accept_loop(listener, Arc::new(on_request)));
        }
    }
}

/// Take the lock, or forward `file` to whoever holds it
pub fn acquire(file: Option<&Path>) -> Result<Instance> {
    acquire_on(SocketAddr::from((Ipv4Addr::LOCALHOST, INSTANCE_PORT)), file)
}

fn acquire_on(addr: SocketAddr, file: Option<&Path>) -> Result<Instance> {
    let runtime = Builder::new_multi_thread()
        .worker_threads(1)
        .thread_name("meshview-instance")
        .enable_io()
        .enable_time()
        .build()
        .context("Failed to start instance runtime")?;

    match runtime.block_on(TcpListener::bind(addr)) {
        Ok(listener) => {
            let local_addr = listener.local_addr().context("Instance listener has no address")?;
            info!("Listening for later launches on {}", local_addr);
            Ok(Instance::Primary(Some(InstanceServer {
                runtime,
                listener: Some(listener),
                local_addr,
            })))
        }
        Err(err) => {
            debug!("Instance port {} is taken: {}", addr.port(), err);
            match runtime.block_on(forward(addr, file)) {
                Ok(()) => {
                    info!("Handed launch over to the running instance");
                    Ok(Instance::Forwarded)
                }
                Err(err) => {
                    warn!("No meshview instance answered on {}: {}; running alone", addr, err);
                    Ok(Instance::Primary(None))
                }
            }
        }
    }
}

async fn forward(addr: SocketAddr, file: Option<&Path>) -> io::Result<()> {
    let exchange = async {
        let stream = TcpStream::connect(addr).await?;
        let (reader, mut writer) = stream.into_split();
        let message = format!("{}\n{}\n", GREETING, encode(file));
        writer.write_all(message.as_bytes()).await?;

        let reply = BufReader::new(reader).lines().next_line().await?;
        if reply.as_deref() == Some(ACK) {
            Ok::<(), io::Error>(())
        } else {
            Err(io::Error::new(io::ErrorKind::InvalidData, "unexpected reply"))
        }
    };
    tokio::time::timeout(HANDSHAKE_TIMEOUT, exchange)
        .await
        .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "no reply"))?
}

async fn accept_loop(listener: TcpListener, on_request: Arc<dyn Fn(Forwarded) + Send + Sync>) {
    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                let on_request = on_request.clone();
                tokio::spawn(async move {
                    match receive(stream).await {
                        Ok(Some(request)) => on_request(request),
                        Ok(None) => debug!("Ignoring foreign connection from {}", peer),
                        Err(err) => warn!("Reading launch request from {} failed: {}", peer, err),
                    }
                });
            }
            Err(err) => warn!("Accepting launch request failed: {}", err),
        }
    }
}

async fn receive(stream: TcpStream) -> io::Result<Option<Forwarded>> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();
    if lines.next_line().await?.as_deref() != Some(GREETING) {
        return Ok(None);
    }
    let file = lines.next_line().await?.unwrap_or_default();
    writer.write_all(format!("{}\n", ACK).as_bytes()).await?;
    Ok(Some(decode(&file)))
}

/// Absolute path on one line; the receiver runs in another directory
fn encode(file: Option<&Path>) -> String {
    match file {
        Some(path) if !path.as_os_str().is_empty() => absolute(path).to_string_lossy().into_owned(),
        _ => String::new(),
    }
}

fn decode(line: &str) -> Forwarded {
    Forwarded {
        file: (!line.is_empty()).then(|| PathBuf::from(line)),
    }
}

fn absolute(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    std::env::current_dir()
        .map(|dir| dir.join(path))
        .unwrap_or_else(|_| path.to_path_buf())
}
