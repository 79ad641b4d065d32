use crate::config::SimulationConfig;
use crate::generator::{ClockedGenerator, PipelineContext, SpawnedTask};
use crate::readings::{RigId, StreamKind};
use crate::sensors::{stream_rng, GasModel, ParticleModel};
use std::time::Duration;

/// One simulated environmental board: a gas stream and a particle stream.
pub struct Rig {
    id: RigId,
    gas: ClockedGenerator<GasModel>,
    particle: ClockedGenerator<ParticleModel>,
}

impl Rig {
    pub fn new(id: RigId, config: &SimulationConfig, ctx: &PipelineContext) -> Self {
        let gas = ClockedGenerator::new(
            GasModel::new(id, config.gas.clone()),
            Duration::from_millis(config.gas.interval_ms),
            stream_rng(config.seed, id, StreamKind::Gas),
            ctx.clone(),
        );
        let particle = ClockedGenerator::new(
            ParticleModel::new(id, config.particle.clone()),
            Duration::from_millis(config.particle.interval_ms),
            stream_rng(config.seed, id, StreamKind::Particle),
            ctx.clone(),
        );

        Self { id, gas, particle }
    }

    pub fn id(&self) -> RigId {
        self.id
    }

    pub fn spawn(self) -> Vec<SpawnedTask> {
        vec![self.gas.spawn(), self.particle.spawn()]
    }
}
