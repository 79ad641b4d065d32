use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Rig ids run `1..=fleet_size`; the capture unit is always rig 0.
pub type RigId = u8;
pub type MotionId = Uuid;

pub const CAPTURE_UNIT_RIG_ID: RigId = 0;

pub const PIR_SENSOR_ID: &str = "CAPTURE-PIR";
pub const WEBCAM_SENSOR_ID: &str = "CAPTURE-WEBCAM";
pub const WEBCAM_STREAM_SENSOR_ID: &str = "CAPTURE-WEBCAM-STREAM";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamKind {
    Gas,
    Particle,
    Motion,
    Camera,
    CameraStream,
}

impl StreamKind {
    pub const ALL: [StreamKind; 5] = [
        StreamKind::Gas,
        StreamKind::Particle,
        StreamKind::Motion,
        StreamKind::Camera,
        StreamKind::CameraStream,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            StreamKind::Gas => "gas",
            StreamKind::Particle => "particle",
            StreamKind::Motion => "motion",
            StreamKind::Camera => "camera",
            StreamKind::CameraStream => "camera_stream",
        }
    }

    /// Whether the stream belongs to a rig (as opposed to the shared capture unit).
    pub fn is_rig_stream(self) -> bool {
        matches!(self, StreamKind::Gas | StreamKind::Particle)
    }
}

impl core::fmt::Display for StreamKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GasReading {
    pub id: Uuid,
    pub sensor_id: String,
    pub rig_id: RigId,
    pub lpg: f64,
    pub co: f64,
    pub smoke: f64,
    pub alert: bool,
    pub timestamp: DateTime<Utc>,
}

/// Particle bins: `pm10` is PM1.0, `pm25` is PM2.5, `pm100` is PM10.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticleReading {
    pub id: Uuid,
    pub sensor_id: String,
    pub rig_id: RigId,
    pub pm10: f64,
    pub pm25: f64,
    pub pm100: f64,
    pub alert: bool,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MotionReading {
    pub id: MotionId,
    pub sensor_id: String,
    pub rig_id: RigId,
    pub motion_detected: bool,
    pub intensity: f64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraReading {
    pub id: Uuid,
    pub sensor_id: String,
    pub rig_id: RigId,
    pub image_ref: String,
    pub motion_id: MotionId,
    pub latency_ms: u32,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraStreamReading {
    pub id: Uuid,
    pub sensor_id: String,
    pub rig_id: RigId,
    pub image_ref: String,
    pub latency_ms: u32,
    pub timestamp: DateTime<Utc>,
}

/// Any reading the fleet produces. Serializes as the bare reading so the
/// payload on the wire is just the field map.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Reading {
    Gas(GasReading),
    Particle(ParticleReading),
    Motion(MotionReading),
    Camera(CameraReading),
    CameraStream(CameraStreamReading),
}

impl Reading {
    pub fn kind(&self) -> StreamKind {
        match self {
            Reading::Gas(_) => StreamKind::Gas,
            Reading::Particle(_) => StreamKind::Particle,
            Reading::Motion(_) => StreamKind::Motion,
            Reading::Camera(_) => StreamKind::Camera,
            Reading::CameraStream(_) => StreamKind::CameraStream,
        }
    }

    pub fn id(&self) -> Uuid {
        match self {
            Reading::Gas(r) => r.id,
            Reading::Particle(r) => r.id,
            Reading::Motion(r) => r.id,
            Reading::Camera(r) => r.id,
            Reading::CameraStream(r) => r.id,
        }
    }

    pub fn rig_id(&self) -> RigId {
        match self {
            Reading::Gas(r) => r.rig_id,
            Reading::Particle(r) => r.rig_id,
            Reading::Motion(r) => r.rig_id,
            Reading::Camera(r) => r.rig_id,
            Reading::CameraStream(r) => r.rig_id,
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Reading::Gas(r) => r.timestamp,
            Reading::Particle(r) => r.timestamp,
            Reading::Motion(r) => r.timestamp,
            Reading::Camera(r) => r.timestamp,
            Reading::CameraStream(r) => r.timestamp,
        }
    }
}

impl From<GasReading> for Reading {
    fn from(reading: GasReading) -> Self {
        Reading::Gas(reading)
    }
}

impl From<ParticleReading> for Reading {
    fn from(reading: ParticleReading) -> Self {
        Reading::Particle(reading)
    }
}

impl From<MotionReading> for Reading {
    fn from(reading: MotionReading) -> Self {
        Reading::Motion(reading)
    }
}

impl From<CameraReading> for Reading {
    fn from(reading: CameraReading) -> Self {
        Reading::Camera(reading)
    }
}

impl From<CameraStreamReading> for Reading {
    fn from(reading: CameraStreamReading) -> Self {
        Reading::CameraStream(reading)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RigSnapshot {
    pub rig_id: RigId,
    pub last_gas: Option<GasReading>,
    pub last_particle: Option<ParticleReading>,
}

impl RigSnapshot {
    pub fn empty(rig_id: RigId) -> Self {
        Self {
            rig_id,
            last_gas: None,
            last_particle: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CaptureUnitSnapshot {
    pub last_motion: Option<MotionReading>,
    pub last_camera: Option<CameraReading>,
    pub last_camera_stream: Option<CameraStreamReading>,
}

/// Identity and time assigned to a reading at generation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stamp {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
}

/// Hands out strictly increasing timestamps for a single stream.
#[derive(Debug, Default)]
pub struct StreamClock {
    last: Option<DateTime<Utc>>,
}

impl StreamClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&mut self) -> DateTime<Utc> {
        self.advance_to(Utc::now())
    }

    /// Accept `now` unless it does not move past the previous timestamp, in
    /// which case the previous one plus a microsecond is used.
    pub fn advance_to(&mut self, now: DateTime<Utc>) -> DateTime<Utc> {
        let next = match self.last {
            Some(last) if now <= last => last + Duration::microseconds(1),
            _ => now,
        };
        self.last = Some(next);
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_clock_is_strictly_increasing() {
        let mut clock = StreamClock::new();
        let fixed = Utc::now();

        let first = clock.advance_to(fixed);
        let second = clock.advance_to(fixed);
        let third = clock.advance_to(fixed - Duration::seconds(5));

        assert_eq!(first, fixed);
        assert!(second > first);
        assert!(third > second);
    }

    #[test]
    fn test_reading_serializes_untagged() {
        let reading = Reading::from(MotionReading {
            id: Uuid::nil(),
            sensor_id: PIR_SENSOR_ID.to_string(),
            rig_id: CAPTURE_UNIT_RIG_ID,
            motion_detected: true,
            intensity: 55.0,
            timestamp: Utc::now(),
        });

        let value = serde_json::to_value(&reading).unwrap();
        assert_eq!(value["sensor_id"], "CAPTURE-PIR");
        assert_eq!(value["motion_detected"], true);
        assert!(value.get("Motion").is_none());
        assert_eq!(reading.kind(), StreamKind::Motion);
    }
}
