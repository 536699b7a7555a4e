mod common;

use bytes::Bytes;
use common::{harness, Scheduler};
use continuum_backend::connection::ConnectionState;
use continuum_wire::{HeartbeatKind, Message, MessageType, RetrainRequest, STATUS_OK};
use pretty_assertions::assert_eq;
use std::time::Duration;
use test_log::test;
use tokio::time::{sleep, Instant};

use ConnectionState::*;

#[test(tokio::test(start_paused = true))]
async fn silent_scheduler_never_triggers_a_reconnect() {
    let (mut h, mut servers) = harness(0);
    assert_eq!(h.manager.step().await, Idle);
    let mut scheduler = Scheduler::accept(&mut servers).await;

    let start = Instant::now();
    let mut states = Vec::new();
    for _ in 0..40 {
        states.push(h.manager.step().await);
    }
    let expected: Vec<_> = [Receiving, Idle].into_iter().cycle().take(40).collect();
    assert_eq!(states, expected);
    assert!(!h.manager.is_connected());
    assert_eq!(start.elapsed(), Duration::from_secs(5 * 20));

    // every idle cycle sent a bare heartbeat behind the empty delimiter
    let heartbeat = vec![
        Bytes::new(),
        Bytes::copy_from_slice(&MessageType::BackendHeartbeat.code().to_le_bytes()),
    ];
    for _ in 0..20 {
        assert_eq!(scheduler.recv_frames().await, heartbeat);
    }
}

#[test(tokio::test(start_paused = true))]
async fn silence_after_activity_reconnects_once() {
    let (mut h, mut servers) = harness(0);
    assert_eq!(h.manager.step().await, Idle);
    let mut scheduler = Scheduler::accept(&mut servers).await;
    assert!(h.state.has_outbox());

    scheduler.send(Message::BackendHeartbeat(Some(HeartbeatKind::Keepalive)));
    assert_eq!(h.manager.step().await, Receiving);
    assert_eq!(h.manager.step().await, Receivable);
    assert!(h.manager.is_connected());
    assert_eq!(h.manager.step().await, Receiving);

    let start = Instant::now();
    let mut states = Vec::new();
    loop {
        let state = h.manager.step().await;
        states.push(state);
        if state == Destroyed {
            assert!(!h.state.has_outbox());
        }
        if state == Idle && states.contains(&Destroyed) {
            break;
        }
    }
    assert_eq!(states.iter().filter(|s| **s == Destroyed).count(), 1);
    assert_eq!(start.elapsed(), Duration::from_secs(30));
    assert_eq!(states[states.len() - 2..].to_vec(), vec![Destroyed, Idle]);

    Scheduler::accept(&mut servers).await;
    assert!(h.state.has_outbox());
    assert!(!h.manager.is_connected());
}

#[test(tokio::test(start_paused = true))]
async fn refused_connections_retry_after_a_delay() {
    let (mut h, mut servers) = harness(2);
    let start = Instant::now();
    assert_eq!(h.manager.step().await, Destroyed);
    assert_eq!(h.manager.step().await, Destroyed);
    assert_eq!(start.elapsed(), Duration::from_secs(2));
    assert!(!h.state.has_outbox());

    assert_eq!(h.manager.step().await, Idle);
    Scheduler::accept(&mut servers).await;
}

#[test(tokio::test(start_paused = true))]
async fn closed_stream_tears_the_connection_down() {
    let (mut h, mut servers) = harness(0);
    assert_eq!(h.manager.step().await, Idle);
    let scheduler = Scheduler::accept(&mut servers).await;
    assert_eq!(h.manager.step().await, Receiving);
    drop(scheduler);

    let start = Instant::now();
    assert_eq!(h.manager.step().await, Destroyed);
    assert_eq!(start.elapsed(), Duration::ZERO);
    assert!(!h.state.has_outbox());
    assert_eq!(h.manager.step().await, Idle);
    Scheduler::accept(&mut servers).await;
}

#[test(tokio::test(start_paused = true))]
async fn metadata_request_is_answered() {
    let (h, mut servers) = harness(0);
    let cancel = h.cancel.clone();
    let manager = tokio::spawn(h.manager.run(cancel.clone()));
    let mut scheduler = Scheduler::accept(&mut servers).await;

    scheduler.send(Message::BackendHeartbeat(Some(HeartbeatKind::RequestMetadata)));
    let frames = loop {
        let frames = scheduler.recv_frames().await;
        if frames.len() > 2 {
            break frames;
        }
    };
    let expected = vec![
        Bytes::new(),
        Bytes::copy_from_slice(&MessageType::BackendMetadata.code().to_le_bytes()),
        Bytes::from_static(b"test"),
        Bytes::from_static(b"1.0"),
        Bytes::from_static(b"test-app"),
        Bytes::from_static(b"NaiveBestEffortPolicy"),
        Bytes::from_static(b"{}"),
    ];
    assert_eq!(frames, expected);

    cancel.cancel();
    manager.await.unwrap();
}

#[test(tokio::test(start_paused = true))]
async fn retrain_is_reported_from_start_to_end() {
    let (h, mut servers) = harness(0);
    let cancel = h.cancel.clone();
    let manager = tokio::spawn(h.manager.run(cancel.clone()));
    let mut scheduler = Scheduler::accept(&mut servers).await;

    scheduler.send(Message::StartRetrain {
        msg_id: 5,
        request: RetrainRequest::Start {
            batch_ids: vec!["1".to_string(), "2".to_string()],
        },
    });
    assert_eq!(
        scheduler.recv().await,
        Message::RetrainStarted {
            msg_id: 5,
            status: STATUS_OK
        }
    );
    assert!(h.state.is_training());
    assert_eq!(h.state.current_msg_id(), Some(5));

    assert_eq!(
        scheduler.recv().await,
        Message::RetrainEnded {
            msg_id: 5,
            status: STATUS_OK
        }
    );
    assert!(!h.state.is_training());
    assert_eq!(
        *h.backend.batches.lock().unwrap(),
        vec![vec![vec![1.0, 2.0], vec![3.0], vec![4.0]]]
    );

    cancel.cancel();
    manager.await.unwrap();
}

#[test(tokio::test(start_paused = true))]
async fn garbage_is_ignored() {
    let (h, mut servers) = harness(0);
    let cancel = h.cancel.clone();
    let manager = tokio::spawn(h.manager.run(cancel.clone()));
    let mut scheduler = Scheduler::accept(&mut servers).await;

    scheduler.send_frames(vec![Bytes::new(), Bytes::copy_from_slice(&42u32.to_le_bytes())]);
    scheduler.send_frames(vec![Bytes::new(), Bytes::from_static(b"xy")]);
    // a start request that lost its delimiter
    scheduler.send_frames(
        Message::StartRetrain {
            msg_id: 9,
            request: RetrainRequest::Start {
                batch_ids: vec!["1".to_string()],
            },
        }
        .to_frames(),
    );
    scheduler.send(Message::StartRetrain {
        msg_id: 8,
        request: RetrainRequest::Unknown(3),
    });
    scheduler.send(Message::RetrainEnded {
        msg_id: 1,
        status: STATUS_OK,
    });
    scheduler.send(Message::BackendHeartbeat(Some(HeartbeatKind::RequestMetadata)));

    assert!(matches!(
        scheduler.recv().await,
        Message::BackendMetadata(_)
    ));
    sleep(Duration::from_secs(1)).await;
    assert!(!h.state.is_training());
    assert!(h.backend.batches.lock().unwrap().is_empty());

    cancel.cancel();
    manager.await.unwrap();
}
