use super::SensorModel;
use crate::config::ParticleConfig;
use crate::readings::{ParticleReading, RigId, Stamp, StreamKind};
use rand::Rng;

/// PMS5003 style particle counter. Each bin is the previous bin plus a
/// positive increment, so pm10 <= pm25 <= pm100 always holds; contamination
/// scales all bins by one shared factor and keeps that order.
#[derive(Debug, Clone)]
pub struct ParticleModel {
    rig_id: RigId,
    sensor_id: String,
    config: ParticleConfig,
}

impl ParticleModel {
    pub fn new(rig_id: RigId, config: ParticleConfig) -> Self {
        Self {
            rig_id,
            sensor_id: format!("RIG-{rig_id}-PM"),
            config,
        }
    }

    pub fn is_alert(&self, pm10: f64, pm25: f64, pm100: f64) -> bool {
        let limits = &self.config.thresholds;
        pm10 > limits.pm10 || pm25 > limits.pm25 || pm100 > limits.pm100
    }
}

impl SensorModel for ParticleModel {
    type Reading = ParticleReading;

    fn kind(&self) -> StreamKind {
        StreamKind::Particle
    }

    fn rig_id(&self) -> RigId {
        self.rig_id
    }

    fn sample<R: Rng + ?Sized>(&mut self, rng: &mut R, stamp: Stamp) -> ParticleReading {
        let mut pm10 = self.config.pm10.sample(rng);
        let mut pm25 = pm10 + self.config.pm25_increment.sample(rng);
        let mut pm100 = pm25 + self.config.pm100_increment.sample(rng);

        if rng.random_bool(self.config.anomaly_probability) {
            let factor = self.config.contamination.sample(rng);
            pm10 *= factor;
            pm25 *= factor;
            pm100 *= factor;
        }

        ParticleReading {
            id: stamp.id,
            sensor_id: self.sensor_id.clone(),
            rig_id: self.rig_id,
            pm10,
            pm25,
            pm100,
            alert: self.is_alert(pm10, pm25, pm100),
            timestamp: stamp.timestamp,
        }
    }
}
