use super::SensorModel;
use crate::config::MotionConfig;
use crate::handoff::{MotionHandoff, Offer};
use crate::readings::{MotionReading, RigId, Stamp, StreamKind, CAPTURE_UNIT_RIG_ID, PIR_SENSOR_ID};
use rand::Rng;
use std::sync::Arc;
use tracing::{debug, info};

/// PIR detector feeding the camera through the hand-off queue.
///
/// Every tick yields a reading; only detections are handed to the camera,
/// and only after the reading has been stored and published.
#[derive(Debug, Clone)]
pub struct MotionModel {
    config: MotionConfig,
    handoff: Arc<MotionHandoff>,
}

impl MotionModel {
    pub fn new(config: MotionConfig, handoff: Arc<MotionHandoff>) -> Self {
        Self { config, handoff }
    }
}

impl SensorModel for MotionModel {
    type Reading = MotionReading;

    fn kind(&self) -> StreamKind {
        StreamKind::Motion
    }

    fn rig_id(&self) -> RigId {
        CAPTURE_UNIT_RIG_ID
    }

    fn sample<R: Rng + ?Sized>(&mut self, rng: &mut R, stamp: Stamp) -> MotionReading {
        let motion_detected = rng.random_bool(self.config.detection_probability);
        let intensity = if motion_detected {
            self.config.detected_intensity.sample(rng)
        } else {
            self.config.idle_intensity.sample(rng)
        };

        MotionReading {
            id: stamp.id,
            sensor_id: PIR_SENSOR_ID.to_string(),
            rig_id: CAPTURE_UNIT_RIG_ID,
            motion_detected,
            intensity,
            timestamp: stamp.timestamp,
        }
    }

    fn after_publish(&mut self, reading: &MotionReading) {
        if !reading.motion_detected {
            debug!(intensity = reading.intensity, "no motion");
            return;
        }

        match self.handoff.offer(reading.id) {
            Offer::Queued => {
                info!(motion_id = %reading.id, intensity = reading.intensity, "motion detected");
            }
            Offer::Displaced(stale) => {
                debug!(motion_id = %reading.id, displaced = %stale, "motion detected, hand-off full");
            }
            Offer::Rejected(_) => {
                debug!(motion_id = %reading.id, "motion detected, hand-off full, id dropped");
            }
        }
    }
}
