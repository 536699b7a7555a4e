use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use continuum_wire::Frames;
use std::net::SocketAddr;
use tokio::net::lookup_host;
use tracing::debug;
use zeromq::{DealerSocket, Socket, SocketRecv, SocketSend, ZmqMessage};

/// A socket that moves whole multipart messages.
#[async_trait]
pub trait MultipartSocket: Send {
    async fn send_frames(&mut self, frames: Frames) -> Result<()>;

    /// Must be cancel safe, it is raced against the poll deadline.
    async fn recv_frames(&mut self) -> Result<Frames>;
}

/// Opens a fresh socket to the scheduler.
#[async_trait]
pub trait Connector: Send {
    type Socket: MultipartSocket + 'static;

    async fn connect(&mut self) -> Result<Self::Socket>;
}

#[async_trait]
impl MultipartSocket for DealerSocket {
    async fn send_frames(&mut self, frames: Frames) -> Result<()> {
        let message = ZmqMessage::try_from(frames).map_err(|err| anyhow!(err))?;
        self.send(message).await?;
        Ok(())
    }

    async fn recv_frames(&mut self) -> Result<Frames> {
        Ok(self.recv().await?.into_vec())
    }
}

/// Connects a ZeroMQ DEALER to the scheduler's ROUTER at an address that was
/// resolved once, at startup.
#[derive(Debug, Clone)]
pub struct ZmqConnector {
    addr: SocketAddr,
}

impl ZmqConnector {
    pub fn new(addr: SocketAddr) -> Self {
        Self { addr }
    }

    pub async fn resolve(host: &str, port: u16) -> Result<Self> {
        let addr = lookup_host((host, port))
            .await
            .with_context(|| format!("failed to resolve {host}:{port}"))?
            .next()
            .with_context(|| format!("{host}:{port} resolved to no addresses"))?;
        debug!("Resolved {host}:{port} to {addr}");
        Ok(Self::new(addr))
    }

    pub fn endpoint(&self) -> String {
        format!("tcp://{}", self.addr)
    }
}

#[async_trait]
impl Connector for ZmqConnector {
    type Socket = DealerSocket;

    async fn connect(&mut self) -> Result<DealerSocket> {
        let endpoint = self.endpoint();
        let mut socket = DealerSocket::new();
        socket
            .connect(&endpoint)
            .await
            .with_context(|| format!("failed to connect to {endpoint}"))?;
        Ok(socket)
    }
}
