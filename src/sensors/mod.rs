pub mod camera;
pub mod gas;
pub mod motion;
pub mod particle;

pub use camera::{CameraCaptureModel, CameraStreamModel};
pub use gas::GasModel;
pub use motion::MotionModel;
pub use particle::ParticleModel;

use crate::readings::{Reading, RigId, Stamp, StreamClock, StreamKind};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use uuid::Uuid;

/// Randomized model behind one sensor stream.
///
/// A model only synthesizes values; scheduling, storage and publication are
/// handled by the generator driving it.
pub trait SensorModel: Send + 'static {
    type Reading: Clone + Into<Reading> + Send + 'static;

    fn kind(&self) -> StreamKind;

    fn rig_id(&self) -> RigId;

    fn sample<R: Rng + ?Sized>(&mut self, rng: &mut R, stamp: Stamp) -> Self::Reading;

    /// Called once the reading has been stored and published.
    fn after_publish(&mut self, _reading: &Self::Reading) {}
}

/// Draw a reading id from `rng` so seeded runs repeat their ids.
pub fn next_id<R: Rng + ?Sized>(rng: &mut R) -> Uuid {
    uuid::Builder::from_random_bytes(rng.random()).into_uuid()
}

pub fn next_stamp<R: Rng + ?Sized>(rng: &mut R, clock: &mut StreamClock) -> Stamp {
    Stamp {
        id: next_id(rng),
        timestamp: clock.next(),
    }
}

/// Random source for one (rig, stream) pair. A fleet seed gives every pair
/// its own reproducible sequence; without one the OS seeds it.
pub fn stream_rng(seed: Option<u64>, rig_id: RigId, kind: StreamKind) -> StdRng {
    match seed {
        Some(seed) => {
            let lane = (u64::from(rig_id) << 8) | kind as u64;
            StdRng::seed_from_u64(seed ^ lane.wrapping_mul(0x9E37_79B9_7F4A_7C15))
        }
        None => StdRng::from_os_rng(),
    }
}

/// Locator for a simulated frame; the seed segment makes each frame distinct.
pub fn image_ref<R: Rng + ?Sized>(rng: &mut R, base_url: &str) -> String {
    format!("{}/seed/{}/640/480", base_url.trim_end_matches('/'), rng.random::<u32>())
}
