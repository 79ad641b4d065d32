use crate::handoff::OverflowPolicy;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

// Fleet defaults
const DEFAULT_FLEET_SIZE: u8 = 4;
const DEFAULT_ENDPOINT: &str = "127.0.0.1:1883";
const DEFAULT_CLIENT_ID: &str = "rigsim-hardware-simulator";
const DEFAULT_TOPIC_PREFIX: &str = "rigsim/sensors";
const DEFAULT_IMAGE_BASE_URL: &str = "https://picsum.photos";
const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 3000;
const DEFAULT_KEEP_ALIVE_SECS: u64 = 30;
const DEFAULT_RECONNECT_DELAY_MS: u64 = 1000;
const DEFAULT_OUTBOUND_BACKLOG: usize = 256;
const DEFAULT_SHUTDOWN_GRACE_MS: u64 = 5000;

// Gas board (MQ-2 style): concentrations in ppm
const GAS_INTERVAL_MS: u64 = 1800;
const GAS_ANOMALY_PROBABILITY: f64 = 0.15;
const GAS_ALERT_THRESHOLD: f64 = 700.0;

// Particle board (PMS5003 style): concentrations in µg/m³
const PARTICLE_INTERVAL_MS: u64 = 2200;
const PARTICLE_ANOMALY_PROBABILITY: f64 = 0.2;

const PIR_INTERVAL_MS: u64 = 2500;
const PIR_DETECTION_PROBABILITY: f64 = 0.35;

const CAMERA_INTERVAL_MS: u64 = 800;
const CAMERA_STREAM_INTERVAL_MS: u64 = 1000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config field `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Half-open range `[min, max)` a value is drawn from uniformly.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValueRange {
    pub min: f64,
    pub max: f64,
}

impl ValueRange {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        if self.max <= self.min {
            return self.min;
        }
        rng.random_range(self.min..self.max)
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value < self.max
    }

    fn validate(&self, field: &'static str) -> Result<(), ConfigError> {
        if !self.min.is_finite() || !self.max.is_finite() || self.max < self.min {
            return Err(ConfigError::Invalid {
                field,
                reason: format!("range [{}, {}) is empty or not finite", self.min, self.max),
            });
        }
        Ok(())
    }
}

/// Half-open integer range for simulated latencies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatencyRange {
    pub min_ms: u32,
    pub max_ms: u32,
}

impl LatencyRange {
    pub const fn new(min_ms: u32, max_ms: u32) -> Self {
        Self { min_ms, max_ms }
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> u32 {
        if self.max_ms <= self.min_ms {
            return self.min_ms;
        }
        rng.random_range(self.min_ms..self.max_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SinkConfig {
    pub enabled: bool,
    pub endpoint: String,
    pub client_id: String,
    pub connect_timeout_ms: u64,
    pub keep_alive_secs: u64,
    /// Pause between reconnect attempts after the broker connection drops.
    pub reconnect_delay_ms: u64,
    /// Messages buffered towards a slow broker before publishes are refused.
    pub outbound_backlog: usize,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            client_id: DEFAULT_CLIENT_ID.to_string(),
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
            keep_alive_secs: DEFAULT_KEEP_ALIVE_SECS,
            reconnect_delay_ms: DEFAULT_RECONNECT_DELAY_MS,
            outbound_backlog: DEFAULT_OUTBOUND_BACKLOG,
        }
    }
}

impl SinkConfig {
    /// Split `endpoint` into broker host and port. A `tcp://` or `mqtt://`
    /// scheme is accepted and ignored.
    pub fn broker_address(&self) -> Result<(String, u16), ConfigError> {
        let invalid = |reason: &str| ConfigError::Invalid {
            field: "sink.endpoint",
            reason: format!("{reason}: `{}`", self.endpoint),
        };

        let address = self
            .endpoint
            .strip_prefix("tcp://")
            .or_else(|| self.endpoint.strip_prefix("mqtt://"))
            .unwrap_or(&self.endpoint);
        let (host, port) = address.rsplit_once(':').ok_or_else(|| invalid("expected HOST:PORT"))?;
        if host.is_empty() {
            return Err(invalid("missing broker host"));
        }
        let port = port.parse::<u16>().map_err(|_| invalid("invalid broker port"))?;
        Ok((host.to_string(), port))
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GasConfig {
    pub interval_ms: u64,
    pub lpg: ValueRange,
    pub co: ValueRange,
    pub smoke: ValueRange,
    pub anomaly_probability: f64,
    pub spike: ValueRange,
    pub alert_threshold: f64,
}

impl Default for GasConfig {
    fn default() -> Self {
        Self {
            interval_ms: GAS_INTERVAL_MS,
            lpg: ValueRange::new(150.0, 400.0),
            co: ValueRange::new(100.0, 300.0),
            smoke: ValueRange::new(120.0, 350.0),
            anomaly_probability: GAS_ANOMALY_PROBABILITY,
            spike: ValueRange::new(0.0, 400.0),
            alert_threshold: GAS_ALERT_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParticleThresholds {
    pub pm10: f64,
    pub pm25: f64,
    pub pm100: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ParticleConfig {
    pub interval_ms: u64,
    pub pm10: ValueRange,
    /// Added on top of pm10 to obtain pm25.
    pub pm25_increment: ValueRange,
    /// Added on top of pm25 to obtain pm100.
    pub pm100_increment: ValueRange,
    pub anomaly_probability: f64,
    pub contamination: ValueRange,
    pub thresholds: ParticleThresholds,
}

impl Default for ParticleConfig {
    fn default() -> Self {
        Self {
            interval_ms: PARTICLE_INTERVAL_MS,
            pm10: ValueRange::new(10.0, 60.0),
            pm25_increment: ValueRange::new(5.0, 35.0),
            pm100_increment: ValueRange::new(10.0, 45.0),
            anomaly_probability: PARTICLE_ANOMALY_PROBABILITY,
            contamination: ValueRange::new(1.5, 3.0),
            thresholds: ParticleThresholds {
                pm10: 100.0,
                pm25: 150.0,
                pm100: 200.0,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionConfig {
    pub interval_ms: u64,
    pub detection_probability: f64,
    pub detected_intensity: ValueRange,
    pub idle_intensity: ValueRange,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            interval_ms: PIR_INTERVAL_MS,
            detection_probability: PIR_DETECTION_PROBABILITY,
            detected_intensity: ValueRange::new(40.0, 100.0),
            idle_intensity: ValueRange::new(0.0, 20.0),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub interval_ms: u64,
    pub latency: LatencyRange,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            interval_ms: CAMERA_INTERVAL_MS,
            latency: LatencyRange::new(10, 50),
        }
    }
}

/// The unconditional camera feed; same shape as [`CameraConfig`], own defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraStreamConfig {
    pub interval_ms: u64,
    pub latency: LatencyRange,
}

impl Default for CameraStreamConfig {
    fn default() -> Self {
        Self {
            interval_ms: CAMERA_STREAM_INTERVAL_MS,
            latency: LatencyRange::new(5, 20),
        }
    }
}

/// Full configuration for a simulated fleet. Every field falls back to its
/// default when missing from a config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub fleet_size: u8,
    pub topic_prefix: String,
    pub image_base_url: String,
    /// Fixes every generator's random source when set.
    pub seed: Option<u64>,
    pub shutdown_grace_ms: u64,
    pub handoff_policy: OverflowPolicy,
    pub sink: SinkConfig,
    pub gas: GasConfig,
    pub particle: ParticleConfig,
    pub motion: MotionConfig,
    pub camera: CameraConfig,
    pub camera_stream: CameraStreamConfig,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            fleet_size: DEFAULT_FLEET_SIZE,
            topic_prefix: DEFAULT_TOPIC_PREFIX.to_string(),
            image_base_url: DEFAULT_IMAGE_BASE_URL.to_string(),
            seed: None,
            shutdown_grace_ms: DEFAULT_SHUTDOWN_GRACE_MS,
            handoff_policy: OverflowPolicy::default(),
            sink: SinkConfig::default(),
            gas: GasConfig::default(),
            particle: ParticleConfig::default(),
            motion: MotionConfig::default(),
            camera: CameraConfig::default(),
            camera_stream: CameraStreamConfig::default(),
        }
    }
}

impl SimulationConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&contents)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fleet_size == 0 {
            return Err(ConfigError::Invalid {
                field: "fleet_size",
                reason: "at least one rig is required".to_string(),
            });
        }

        check_interval("gas.interval_ms", self.gas.interval_ms)?;
        check_interval("particle.interval_ms", self.particle.interval_ms)?;
        check_interval("motion.interval_ms", self.motion.interval_ms)?;
        check_interval("camera.interval_ms", self.camera.interval_ms)?;
        check_interval("camera_stream.interval_ms", self.camera_stream.interval_ms)?;

        check_probability("gas.anomaly_probability", self.gas.anomaly_probability)?;
        check_probability("particle.anomaly_probability", self.particle.anomaly_probability)?;
        check_probability("motion.detection_probability", self.motion.detection_probability)?;

        self.gas.lpg.validate("gas.lpg")?;
        self.gas.co.validate("gas.co")?;
        self.gas.smoke.validate("gas.smoke")?;
        self.gas.spike.validate("gas.spike")?;
        self.particle.pm10.validate("particle.pm10")?;
        self.particle.pm25_increment.validate("particle.pm25_increment")?;
        self.particle.pm100_increment.validate("particle.pm100_increment")?;
        self.particle.contamination.validate("particle.contamination")?;
        self.motion.detected_intensity.validate("motion.detected_intensity")?;
        self.motion.idle_intensity.validate("motion.idle_intensity")?;

        // pm bins must stay ordered, so increments and the multiplier stay positive
        if self.particle.pm25_increment.min <= 0.0 || self.particle.pm100_increment.min <= 0.0 {
            return Err(ConfigError::Invalid {
                field: "particle.pm*_increment",
                reason: "increments must be strictly positive".to_string(),
            });
        }
        if self.particle.contamination.min <= 0.0 {
            return Err(ConfigError::Invalid {
                field: "particle.contamination",
                reason: "contamination multiplier must be positive".to_string(),
            });
        }

        if self.sink.outbound_backlog == 0 {
            return Err(ConfigError::Invalid {
                field: "sink.outbound_backlog",
                reason: "backlog must hold at least one message".to_string(),
            });
        }
        if self.sink.enabled {
            self.sink.broker_address()?;
            if self.sink.client_id.trim().is_empty() {
                return Err(ConfigError::Invalid {
                    field: "sink.client_id",
                    reason: "MQTT client id must not be empty".to_string(),
                });
            }
        }

        Ok(())
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}

fn check_interval(field: &'static str, interval_ms: u64) -> Result<(), ConfigError> {
    if interval_ms == 0 {
        return Err(ConfigError::Invalid {
            field,
            reason: "tick interval must be non-zero".to_string(),
        });
    }
    Ok(())
}

fn check_probability(field: &'static str, probability: f64) -> Result<(), ConfigError> {
    if !(0.0..=1.0).contains(&probability) {
        return Err(ConfigError::Invalid {
            field,
            reason: format!("probability {probability} outside [0, 1]"),
        });
    }
    Ok(())
}
