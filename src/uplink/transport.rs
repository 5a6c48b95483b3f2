//! transport.rs
//! Boundary to the transport/session layer.
//!
//! The core only needs `publish` to block until the outcome is known; the
//! returned status decides whether the buffered sample is committed.
//! Two interchangeable variants are chosen at composition time:
//! - `AgentTransport`: requests go to an external agent thread, which
//!   completes each one through a reply channel (the completion callback).
//! - `StandaloneTransport`: owns its link flag and writes to an outbound sink.

use crossbeam::channel::{Receiver, RecvTimeoutError, Sender, TrySendError, bounded};
use serde::Deserialize;
use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};
use log::{debug, warn};

use crate::error::TransportError;
use crate::utils::stack;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Qos {
    AtMostOnce,
    AtLeastOnce,
}

/// Which transport variant the binary composes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportKind {
    Agent,
    Standalone,
}

pub trait Transport: Send {
    fn client_id(&self) -> &str;

    /// Blocks until the transport reports the outcome of this publish.
    fn publish(&self, topic: &str, payload: &str, qos: Qos) -> Result<(), TransportError>;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn client_id(&self) -> &str {
        (**self).client_id()
    }

    fn publish(&self, topic: &str, payload: &str, qos: Qos) -> Result<(), TransportError> {
        (**self).publish(topic, payload, qos)
    }
}

// ============================================================================
// Agent-mediated variant
// ============================================================================

/// One publish request handed to the agent.
#[derive(Debug)]
pub struct PublishCommand {
    pub topic: String,
    pub payload: String,
    pub qos: Qos,
    reply: Sender<Result<(), TransportError>>,
}

impl PublishCommand {
    /// Completion callback: reports the outcome back to the blocked publisher.
    pub fn complete(self, result: Result<(), TransportError>) {
        // The requester may have timed out and gone away; nothing to do then.
        let _ = self.reply.try_send(result);
    }
}

pub struct AgentTransport {
    client_id: String,
    commands: Sender<PublishCommand>,
    ack_timeout: Duration,
}

impl AgentTransport {
    /// Returns the transport and the receiving end the agent serves.
    pub fn new(client_id: &str, queue_depth: usize, ack_timeout: Duration) -> (Self, Receiver<PublishCommand>) {
        let (tx, rx) = bounded(queue_depth);
        (
            Self {
                client_id: client_id.to_string(),
                commands: tx,
                ack_timeout,
            },
            rx,
        )
    }
}

impl Transport for AgentTransport {
    fn client_id(&self) -> &str {
        &self.client_id
    }

    fn publish(&self, topic: &str, payload: &str, qos: Qos) -> Result<(), TransportError> {
        debug!("[Transport] publishing [{}] {}", topic, payload);

        stack::mark_depth();
        let (reply_tx, reply_rx) = bounded(1);
        let cmd = PublishCommand {
            topic: topic.to_string(),
            payload: payload.to_string(),
            qos,
            reply: reply_tx,
        };

        self.commands
            .send_timeout(cmd, self.ack_timeout)
            .map_err(|_| TransportError::AgentGone)?;

        let result = match reply_rx.recv_timeout(self.ack_timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => Err(TransportError::AckTimeout(self.ack_timeout.as_millis() as u64)),
            Err(RecvTimeoutError::Disconnected) => Err(TransportError::AgentGone),
        };

        if let Err(e) = &result {
            warn!("[Transport] publish failed: {}", e);
        }
        result
    }
}

// ============================================================================
// Stand-alone variant
// ============================================================================

/// (topic, payload) pairs accepted for transmission.
pub type Outbound = (String, String);

pub struct StandaloneTransport {
    client_id: String,
    link_up: Arc<AtomicBool>,
    sink: Sender<Outbound>,
}

impl StandaloneTransport {
    pub fn new(client_id: &str, link_up: Arc<AtomicBool>, sink: Sender<Outbound>) -> Self {
        Self {
            client_id: client_id.to_string(),
            link_up,
            sink,
        }
    }
}

impl Transport for StandaloneTransport {
    fn client_id(&self) -> &str {
        &self.client_id
    }

    fn publish(&self, topic: &str, payload: &str, _qos: Qos) -> Result<(), TransportError> {
        stack::mark_depth();
        if !self.link_up.load(Ordering::Acquire) {
            return Err(TransportError::NotConnected);
        }
        match self.sink.try_send((topic.to_string(), payload.to_string())) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(TransportError::Rejected("outbound queue full".into())),
            Err(TrySendError::Disconnected(_)) => Err(TransportError::AgentGone),
        }
    }
}
