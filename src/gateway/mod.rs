//! Publish boundary between the simulated fleet and a telemetry sink.
//!
//! Every sink implements [`Publisher`]. Publishing while disconnected is a
//! silent success so the simulation keeps running without a live sink.

pub mod memory;
pub mod mqtt;

pub use memory::{MemoryPublisher, PublishedMessage};
pub use mqtt::MqttPublisher;

use crate::readings::{Reading, RigId, StreamKind};
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("sink {endpoint} unreachable: {source}")]
    Unreachable {
        endpoint: String,
        #[source]
        source: rumqttc::ConnectionError,
    },
    #[error("connecting to sink {endpoint} timed out after {after:?}")]
    Timeout { endpoint: String, after: Duration },
    #[error("sink refused the session: {0}")]
    Refused(String),
}

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("failed to encode reading: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("outbound buffer full, message for {topic} dropped")]
    Backlogged { topic: String },
    #[error("connection to sink lost")]
    ConnectionLost,
    #[error("transport error: {0}")]
    Transport(#[from] rumqttc::ClientError),
}

#[async_trait]
pub trait Publisher: Send + Sync {
    async fn connect(&self) -> Result<(), ConnectError>;

    /// Encode and send one reading. Returns `Ok(())` without doing anything
    /// when the sink is not connected.
    async fn publish(&self, topic: &str, reading: &Reading) -> Result<(), PublishError>;

    fn is_connected(&self) -> bool;

    /// Close the session. Safe to call repeatedly or when never connected.
    async fn disconnect(&self);
}

/// JSON body of a published reading: the reading's own field map.
pub fn encode_payload(reading: &Reading) -> Result<Vec<u8>, PublishError> {
    Ok(serde_json::to_vec(reading)?)
}

/// Publish and swallow the outcome; failures are logged and the reading is
/// abandoned.
pub async fn publish_best_effort(gateway: &dyn Publisher, topic: &str, reading: &Reading) {
    match gateway.publish(topic, reading).await {
        Ok(()) => debug!(topic, id = %reading.id(), "reading published"),
        Err(e) => warn!(topic, id = %reading.id(), error = %e, "publish failed, reading dropped"),
    }
}

/// Topic naming: rig streams are namespaced by rig, capture streams are
/// fleet-wide.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicScheme {
    prefix: String,
}

impl TopicScheme {
    pub fn new(prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        Self {
            prefix: prefix.trim_end_matches('/').to_string(),
        }
    }

    pub fn topic(&self, kind: StreamKind, rig_id: RigId) -> String {
        match kind {
            StreamKind::Gas => format!("{}/rig{}/gas", self.prefix, rig_id),
            StreamKind::Particle => format!("{}/rig{}/particles", self.prefix, rig_id),
            StreamKind::Motion => format!("{}/capture/motion", self.prefix),
            StreamKind::Camera => format!("{}/capture/camera", self.prefix),
            StreamKind::CameraStream => format!("{}/capture/camera_stream", self.prefix),
        }
    }

    pub fn topic_for(&self, reading: &Reading) -> String {
        self.topic(reading.kind(), reading.rig_id())
    }
}

/// Sink that never connects; used when publishing is disabled.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullPublisher;

#[async_trait]
impl Publisher for NullPublisher {
    async fn connect(&self) -> Result<(), ConnectError> {
        Err(ConnectError::Refused("publishing disabled".to_string()))
    }

    async fn publish(&self, _topic: &str, _reading: &Reading) -> Result<(), PublishError> {
        Ok(())
    }

    fn is_connected(&self) -> bool {
        false
    }

    async fn disconnect(&self) {}
}
