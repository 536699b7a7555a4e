#![allow(dead_code)]

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use continuum_backend::{
    connection::{ConnectionManager, Connector, MultipartSocket},
    jobs::Orchestrator,
    BackendIdentity, ConnectionConfig, Policy, ProcessState,
};
use continuum_data_store::{DataStoreClient, FeatureVector, MemoryBatchSource};
use continuum_training::TrainingBackend;
use continuum_wire::{Frames, Message};
use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex},
    time::Duration,
};
use tokio::{sync::mpsc, time::sleep};
use tokio_util::sync::CancellationToken;

/// The backend's end of an in-memory socket pair.
pub struct ChannelSocket {
    outbound: mpsc::UnboundedSender<Frames>,
    inbound: mpsc::UnboundedReceiver<Frames>,
}

#[async_trait]
impl MultipartSocket for ChannelSocket {
    async fn send_frames(&mut self, frames: Frames) -> Result<()> {
        self.outbound
            .send(frames)
            .map_err(|_| anyhow!("scheduler went away"))
    }

    async fn recv_frames(&mut self) -> Result<Frames> {
        self.inbound
            .recv()
            .await
            .ok_or_else(|| anyhow!("scheduler went away"))
    }
}

/// Hands the scheduler side of every new connection to the test.
pub struct ChannelConnector {
    servers: mpsc::UnboundedSender<Scheduler>,
    refusals: usize,
}

#[async_trait]
impl Connector for ChannelConnector {
    type Socket = ChannelSocket;

    async fn connect(&mut self) -> Result<ChannelSocket> {
        if self.refusals > 0 {
            self.refusals -= 1;
            return Err(anyhow!("connection refused"));
        }
        let (tx_backend, rx_backend) = mpsc::unbounded_channel();
        let (tx_scheduler, rx_scheduler) = mpsc::unbounded_channel();
        self.servers
            .send(Scheduler {
                tx: tx_backend,
                rx: rx_scheduler,
            })
            .map_err(|_| anyhow!("test dropped the scheduler side"))?;
        Ok(ChannelSocket {
            outbound: tx_scheduler,
            inbound: rx_backend,
        })
    }
}

/// Remembers every batch it is asked to train on.
#[derive(Default)]
pub struct RecordingBackend {
    pub delay: Duration,
    pub batches: Mutex<Vec<Vec<FeatureVector>>>,
}

#[async_trait]
impl TrainingBackend for RecordingBackend {
    async fn retrain(&self, batch: Vec<FeatureVector>) -> Result<()> {
        self.batches.lock().unwrap().push(batch);
        sleep(self.delay).await;
        Ok(())
    }

    async fn fetch(&self) -> Result<()> {
        Ok(())
    }
}

/// The ROUTER end of a connection, with routing identities already stripped.
pub struct Scheduler {
    tx: mpsc::UnboundedSender<Frames>,
    rx: mpsc::UnboundedReceiver<Frames>,
}

impl Scheduler {
    pub async fn accept(servers: &mut mpsc::UnboundedReceiver<Scheduler>) -> Self {
        servers.recv().await.expect("manager connected")
    }

    pub fn send(&mut self, message: Message) {
        self.send_frames(message.to_envelope());
    }

    pub fn send_frames(&mut self, frames: Frames) {
        self.tx.send(frames).unwrap();
    }

    pub async fn recv_frames(&mut self) -> Frames {
        self.rx.recv().await.expect("connection open")
    }

    /// Next message that is not a backend heartbeat.
    pub async fn recv(&mut self) -> Message {
        loop {
            match self.recv_any().await {
                Message::BackendHeartbeat(None) => continue,
                message => return message,
            }
        }
    }

    pub async fn recv_any(&mut self) -> Message {
        let frames = self.recv_frames().await;
        Message::from_envelope(&frames).unwrap()
    }
}

pub fn identity() -> BackendIdentity {
    BackendIdentity {
        name: "test".to_string(),
        version: "1.0".to_string(),
        app_name: "test-app".to_string(),
        policy: Policy::NaiveBestEffort,
        input_type: "doubles".to_string(),
        params: BTreeMap::new(),
    }
}

pub fn store() -> MemoryBatchSource {
    let mut source = MemoryBatchSource::new();
    source.push_vectors("1", &[vec![1.0, 2.0], vec![3.0]]);
    source.push_vectors("2", &[vec![4.0]]);
    source
}

pub struct Harness<C: Connector> {
    pub manager: ConnectionManager<C, MemoryBatchSource>,
    pub state: Arc<ProcessState>,
    pub backend: Arc<RecordingBackend>,
    pub cancel: CancellationToken,
}

/// A manager over `connector` whose backend takes `delay` per retrain.
pub fn harness_with<C: Connector>(connector: C, delay: Duration) -> Harness<C> {
    let state = Arc::new(ProcessState::new());
    let backend = Arc::new(RecordingBackend {
        delay,
        ..Default::default()
    });
    let cancel = CancellationToken::new();
    let (orchestrator, _) =
        Orchestrator::new(backend.clone(), state.clone(), Duration::from_secs(3))
            .spawn(cancel.clone());

    let manager = ConnectionManager::new(
        connector,
        identity().metadata().unwrap(),
        DataStoreClient::new(store()),
        orchestrator,
        state.clone(),
        ConnectionConfig::default(),
    );
    Harness {
        manager,
        state,
        backend,
        cancel,
    }
}

/// An in-memory harness whose first `refusals` connection attempts fail.
pub fn harness(
    refusals: usize,
) -> (
    Harness<ChannelConnector>,
    mpsc::UnboundedReceiver<Scheduler>,
) {
    let (servers, accepted) = mpsc::unbounded_channel();
    let connector = ChannelConnector { servers, refusals };
    (harness_with(connector, Duration::from_secs(2)), accepted)
}
