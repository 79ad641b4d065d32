use super::{image_ref, SensorModel};
use crate::config::{CameraConfig, CameraStreamConfig};
use crate::readings::{
    CameraReading, CameraStreamReading, MotionId, RigId, Stamp, StreamKind, CAPTURE_UNIT_RIG_ID,
    WEBCAM_SENSOR_ID, WEBCAM_STREAM_SENSOR_ID,
};
use rand::Rng;

/// Motion-triggered still capture. Not a [`SensorModel`]: a frame is only
/// taken for a motion id handed over by the PIR detector.
#[derive(Debug, Clone)]
pub struct CameraCaptureModel {
    config: CameraConfig,
    image_base_url: String,
}

impl CameraCaptureModel {
    pub fn new(config: CameraConfig, image_base_url: impl Into<String>) -> Self {
        Self {
            config,
            image_base_url: image_base_url.into(),
        }
    }

    pub fn capture<R: Rng + ?Sized>(&mut self, rng: &mut R, stamp: Stamp, motion_id: MotionId) -> CameraReading {
        CameraReading {
            id: stamp.id,
            sensor_id: WEBCAM_SENSOR_ID.to_string(),
            rig_id: CAPTURE_UNIT_RIG_ID,
            image_ref: image_ref(rng, &self.image_base_url),
            motion_id,
            latency_ms: self.config.latency.sample(rng),
            timestamp: stamp.timestamp,
        }
    }
}

/// Continuous camera feed on its own clock, unaware of motion.
#[derive(Debug, Clone)]
pub struct CameraStreamModel {
    config: CameraStreamConfig,
    image_base_url: String,
}

impl CameraStreamModel {
    pub fn new(config: CameraStreamConfig, image_base_url: impl Into<String>) -> Self {
        Self {
            config,
            image_base_url: image_base_url.into(),
        }
    }
}

impl SensorModel for CameraStreamModel {
    type Reading = CameraStreamReading;

    fn kind(&self) -> StreamKind {
        StreamKind::CameraStream
    }

    fn rig_id(&self) -> RigId {
        CAPTURE_UNIT_RIG_ID
    }

    fn sample<R: Rng + ?Sized>(&mut self, rng: &mut R, stamp: Stamp) -> CameraStreamReading {
        CameraStreamReading {
            id: stamp.id,
            sensor_id: WEBCAM_STREAM_SENSOR_ID.to_string(),
            rig_id: CAPTURE_UNIT_RIG_ID,
            image_ref: image_ref(rng, &self.image_base_url),
            latency_ms: self.config.latency.sample(rng),
            timestamp: stamp.timestamp,
        }
    }
}
