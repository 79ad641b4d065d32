use super::SensorModel;
use crate::config::GasConfig;
use crate::readings::{GasReading, RigId, Stamp, StreamKind};
use rand::Rng;

/// MQ-2 style gas board: three independent channels, with an occasional
/// spike on one channel modelling a leak or sensor fault.
#[derive(Debug, Clone)]
pub struct GasModel {
    rig_id: RigId,
    sensor_id: String,
    config: GasConfig,
}

impl GasModel {
    pub fn new(rig_id: RigId, config: GasConfig) -> Self {
        Self {
            rig_id,
            sensor_id: format!("RIG-{rig_id}-GAS"),
            config,
        }
    }

    pub fn is_alert(&self, lpg: f64, co: f64, smoke: f64) -> bool {
        let threshold = self.config.alert_threshold;
        lpg > threshold || co > threshold || smoke > threshold
    }
}

impl SensorModel for GasModel {
    type Reading = GasReading;

    fn kind(&self) -> StreamKind {
        StreamKind::Gas
    }

    fn rig_id(&self) -> RigId {
        self.rig_id
    }

    fn sample<R: Rng + ?Sized>(&mut self, rng: &mut R, stamp: Stamp) -> GasReading {
        let mut channels = [
            self.config.lpg.sample(rng),
            self.config.co.sample(rng),
            self.config.smoke.sample(rng),
        ];

        if rng.random_bool(self.config.anomaly_probability) {
            let channel = rng.random_range(0..channels.len());
            channels[channel] += self.config.spike.sample(rng);
        }

        let [lpg, co, smoke] = channels;
        GasReading {
            id: stamp.id,
            sensor_id: self.sensor_id.clone(),
            rig_id: self.rig_id,
            lpg,
            co,
            smoke,
            alert: self.is_alert(lpg, co, smoke),
            timestamp: stamp.timestamp,
        }
    }
}
