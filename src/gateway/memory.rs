use super::{ConnectError, PublishError, Publisher};
use crate::readings::Reading;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Clone, PartialEq)]
pub struct PublishedMessage {
    pub topic: String,
    pub payload: serde_json::Value,
}

/// In-process sink that keeps every message it accepts.
///
/// Can be set up to refuse connections, and [`drop_connection`](Self::drop_connection)
/// simulates the sink going away mid-run.
#[derive(Debug, Default)]
pub struct MemoryPublisher {
    connected: AtomicBool,
    refuse_connect: bool,
    messages: Mutex<Vec<PublishedMessage>>,
}

impl MemoryPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn unreachable() -> Self {
        Self {
            refuse_connect: true,
            ..Self::default()
        }
    }

    pub fn drop_connection(&self) {
        self.connected.store(false, Ordering::Release);
    }

    pub fn messages(&self) -> Vec<PublishedMessage> {
        self.messages.lock().clone()
    }

    pub fn messages_on(&self, topic: &str) -> Vec<PublishedMessage> {
        self.messages
            .lock()
            .iter()
            .filter(|m| m.topic == topic)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.messages.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.lock().is_empty()
    }
}

#[async_trait]
impl Publisher for MemoryPublisher {
    async fn connect(&self) -> Result<(), ConnectError> {
        if self.refuse_connect {
            return Err(ConnectError::Refused("memory sink configured as unreachable".to_string()));
        }
        self.connected.store(true, Ordering::Release);
        Ok(())
    }

    async fn publish(&self, topic: &str, reading: &Reading) -> Result<(), PublishError> {
        if !self.is_connected() {
            return Ok(());
        }
        let payload = serde_json::to_value(reading)?;
        self.messages.lock().push(PublishedMessage {
            topic: topic.to_string(),
            payload,
        });
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    async fn disconnect(&self) {
        self.connected.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::readings::{CameraStreamReading, WEBCAM_STREAM_SENSOR_ID};
    use chrono::Utc;
    use uuid::Uuid;

    fn stream_reading() -> Reading {
        CameraStreamReading {
            id: Uuid::new_v4(),
            sensor_id: WEBCAM_STREAM_SENSOR_ID.to_string(),
            rig_id: 0,
            image_ref: "https://picsum.photos/seed/1/640/480".to_string(),
            latency_ms: 12,
            timestamp: Utc::now(),
        }
        .into()
    }

    #[tokio::test]
    async fn test_publish_only_records_while_connected() {
        let sink = MemoryPublisher::new();
        sink.publish("t", &stream_reading()).await.unwrap();
        assert!(sink.is_empty());

        sink.connect().await.unwrap();
        sink.publish("t", &stream_reading()).await.unwrap();
        assert_eq!(sink.len(), 1);
        assert_eq!(sink.messages()[0].payload["latency_ms"], 12);

        sink.drop_connection();
        assert!(!sink.is_connected());
        sink.publish("t", &stream_reading()).await.unwrap();
        assert_eq!(sink.len(), 1);
    }

    #[tokio::test]
    async fn test_unreachable_sink_refuses_connect() {
        let sink = MemoryPublisher::unreachable();
        assert!(matches!(sink.connect().await, Err(ConnectError::Refused(_))));
        assert!(!sink.is_connected());
    }
}
