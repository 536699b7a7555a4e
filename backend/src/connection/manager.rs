use anyhow::anyhow;
use continuum_data_store::{BatchSource, DataStoreClient};
use continuum_wire::{BackendMetadata, Frames, HeartbeatKind, Message, RetrainRequest};
use std::sync::Arc;
use tokio::{
    select,
    sync::mpsc,
    time::{sleep, timeout, Instant},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use super::{Connector, MultipartSocket};
use crate::{jobs::OrchestratorHandle, ConnectionConfig, ProcessState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No connection. The next step connects.
    Destroyed,
    /// Connected. The next step sends a heartbeat.
    Idle,
    /// Waiting for inbound data while flushing queued notifications.
    Receiving,
    /// One inbound message is waiting to be dispatched.
    Receivable,
}

struct Connection<T> {
    socket: T,
    outbox: mpsc::UnboundedReceiver<Message>,
    last_active: Instant,
    /// Whether the scheduler has sent anything on this connection yet.
    connected: bool,
}

enum Poll {
    Message(Frames),
    Timeout,
    Closed,
}

/// Keeps one connection to the scheduler alive and answers what it sends.
///
/// This is the only reader and writer of the socket. Everything else reaches
/// the wire through the outbox stored in [`ProcessState`].
pub struct ConnectionManager<C: Connector, S: BatchSource> {
    connector: C,
    metadata: BackendMetadata,
    data_store: DataStoreClient<S>,
    orchestrator: OrchestratorHandle,
    state: Arc<ProcessState>,
    config: ConnectionConfig,
    current: ConnectionState,
    connection: Option<Connection<C::Socket>>,
    pending: Option<Frames>,
}

impl<C: Connector, S: BatchSource> ConnectionManager<C, S> {
    pub fn new(
        connector: C,
        metadata: BackendMetadata,
        data_store: DataStoreClient<S>,
        orchestrator: OrchestratorHandle,
        state: Arc<ProcessState>,
        config: ConnectionConfig,
    ) -> Self {
        Self {
            connector,
            metadata,
            data_store,
            orchestrator,
            state,
            config,
            current: ConnectionState::Destroyed,
            connection: None,
            pending: None,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.current
    }

    /// True once the scheduler has sent something on the current connection.
    pub fn is_connected(&self) -> bool {
        self.connection
            .as_ref()
            .is_some_and(|connection| connection.connected)
    }

    pub async fn run(mut self, cancel: CancellationToken) {
        loop {
            select! {
                _ = cancel.cancelled() => break,
                _ = self.step() => {}
            }
        }
        self.destroy();
        info!("Connection manager stopped");
    }

    /// Performs the work of the current state and moves to the next one.
    pub async fn step(&mut self) -> ConnectionState {
        let next = match self.current {
            ConnectionState::Destroyed => self.connect().await,
            ConnectionState::Idle => self.send_heartbeat().await,
            ConnectionState::Receiving => self.poll().await,
            ConnectionState::Receivable => self.dispatch().await,
        };
        if next != self.current {
            trace!(from = ?self.current, to = ?next, "connection state");
        }
        self.current = next;
        next
    }

    async fn connect(&mut self) -> ConnectionState {
        let connected = timeout(self.config.poll_timeout, self.connector.connect())
            .await
            .unwrap_or_else(|_| Err(anyhow!("no answer within {:?}", self.config.poll_timeout)));
        match connected {
            Ok(socket) => {
                let (tx_outbox, rx_outbox) = mpsc::unbounded_channel();
                self.state.attach_outbox(tx_outbox);
                self.connection = Some(Connection {
                    socket,
                    outbox: rx_outbox,
                    last_active: Instant::now(),
                    connected: false,
                });
                info!("Connected to scheduler");
                ConnectionState::Idle
            }
            Err(err) => {
                warn!(
                    "Failed to connect to scheduler: {err:#}, retrying in {:?}",
                    self.config.reconnect_delay
                );
                sleep(self.config.reconnect_delay).await;
                ConnectionState::Destroyed
            }
        }
    }

    async fn send_heartbeat(&mut self) -> ConnectionState {
        if self.send(Message::BackendHeartbeat(None)).await {
            ConnectionState::Receiving
        } else {
            ConnectionState::Destroyed
        }
    }

    async fn poll(&mut self) -> ConnectionState {
        let poll_timeout = self.config.poll_timeout;
        let activity_timeout = self.config.activity_timeout;
        let Some(connection) = self.connection.as_mut() else {
            return ConnectionState::Destroyed;
        };

        let deadline = sleep(poll_timeout);
        tokio::pin!(deadline);
        let polled = loop {
            select! {
                frames = connection.socket.recv_frames() => break match frames {
                    Ok(frames) => Poll::Message(frames),
                    Err(err) => {
                        warn!("Connection to scheduler failed: {err:#}");
                        Poll::Closed
                    }
                },
                Some(message) = connection.outbox.recv() => {
                    let kind = message.message_type();
                    let sent = connection.socket.send_frames(message.to_envelope()).await;
                    if let Err(err) = sent {
                        warn!("Failed to send {kind:?}: {err:#}");
                        break Poll::Closed;
                    }
                    debug!("Sent {kind:?}");
                }
                _ = &mut deadline => break Poll::Timeout,
            }
        };

        match polled {
            Poll::Message(frames) => {
                connection.connected = true;
                connection.last_active = Instant::now();
                self.pending = Some(frames);
                ConnectionState::Receivable
            }
            Poll::Timeout => {
                if connection.connected && connection.last_active.elapsed() >= activity_timeout {
                    info!("No message from scheduler for {activity_timeout:?}, reconnecting");
                    self.destroy()
                } else {
                    ConnectionState::Idle
                }
            }
            Poll::Closed => self.destroy(),
        }
    }

    async fn dispatch(&mut self) -> ConnectionState {
        if let Some(frames) = self.pending.take() {
            match Message::from_envelope(&frames) {
                Ok(message) => self.handle(message).await,
                Err(err) => warn!("Ignoring malformed message: {err}"),
            }
        }
        if self.connection.is_some() {
            ConnectionState::Receiving
        } else {
            ConnectionState::Destroyed
        }
    }

    async fn handle(&mut self, message: Message) {
        match message {
            Message::BackendHeartbeat(Some(HeartbeatKind::RequestMetadata)) => {
                let metadata = Message::BackendMetadata(self.metadata.clone());
                if self.send(metadata).await {
                    info!("Sent backend metadata");
                }
            }
            Message::BackendHeartbeat(_) => {
                debug!("Received heartbeat");
            }
            Message::StartRetrain {
                msg_id,
                request: RetrainRequest::Start { batch_ids },
            } => self.start_retrain(msg_id, batch_ids).await,
            Message::StartRetrain {
                msg_id,
                request: RetrainRequest::Unknown(code),
            } => warn!(msg_id, "Ignoring StartRetrain with request type {code}"),
            other => warn!("Ignoring unexpected {:?} message", other.message_type()),
        }
    }

    async fn start_retrain(&mut self, msg_id: u32, batch_ids: Vec<String>) {
        info!(msg_id, batches = batch_ids.len(), "Received StartRetrain");
        debug!(msg_id, "Batch ids {batch_ids:?}");
        let batch = match self.data_store.get_batch(&batch_ids).await {
            Ok(batch) => batch,
            Err(err) => {
                error!(msg_id, "Failed to read retrain data: {err:#}");
                return;
            }
        };
        if let Err(err) = self.orchestrator.retrain(msg_id, batch) {
            error!(msg_id, "Dropping retrain: {err}");
        }
    }

    /// Writes `message` now. A failed write tears the connection down.
    async fn send(&mut self, message: Message) -> bool {
        let Some(connection) = self.connection.as_mut() else {
            return false;
        };
        let kind = message.message_type();
        let sent = connection.socket.send_frames(message.to_envelope()).await;
        match sent {
            Ok(()) => {
                trace!("Sent {kind:?}");
                true
            }
            Err(err) => {
                warn!("Failed to send {kind:?}: {err:#}");
                self.destroy();
                false
            }
        }
    }

    fn destroy(&mut self) -> ConnectionState {
        self.state.detach_outbox();
        self.connection = None;
        self.pending = None;
        ConnectionState::Destroyed
    }
}
