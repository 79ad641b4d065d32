use crate::readings::{
    CameraReading, CameraStreamReading, CaptureUnitSnapshot, GasReading, MotionReading,
    ParticleReading, Reading, RigId, RigSnapshot, StreamKind,
};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("rig {0} is not part of the fleet")]
    UnknownRig(RigId),
}

/// Number of readings recorded per stream since the store was built.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub gas: u64,
    pub particle: u64,
    pub motion: u64,
    pub camera: u64,
    pub camera_stream: u64,
}

impl StoreStats {
    pub fn get(&self, kind: StreamKind) -> u64 {
        match kind {
            StreamKind::Gas => self.gas,
            StreamKind::Particle => self.particle,
            StreamKind::Motion => self.motion,
            StreamKind::Camera => self.camera,
            StreamKind::CameraStream => self.camera_stream,
        }
    }
}

#[derive(Debug, Default)]
struct WriteCounters {
    gas: AtomicU64,
    particle: AtomicU64,
    motion: AtomicU64,
    camera: AtomicU64,
    camera_stream: AtomicU64,
}

impl WriteCounters {
    fn bump(&self, kind: StreamKind) {
        let counter = match kind {
            StreamKind::Gas => &self.gas,
            StreamKind::Particle => &self.particle,
            StreamKind::Motion => &self.motion,
            StreamKind::Camera => &self.camera,
            StreamKind::CameraStream => &self.camera_stream,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> StoreStats {
        StoreStats {
            gas: self.gas.load(Ordering::Relaxed),
            particle: self.particle.load(Ordering::Relaxed),
            motion: self.motion.load(Ordering::Relaxed),
            camera: self.camera.load(Ordering::Relaxed),
            camera_stream: self.camera_stream.load(Ordering::Relaxed),
        }
    }
}

/// Latest reading per stream for every rig and for the capture unit.
///
/// Each rig and the capture unit sit behind their own reader/writer lock, so
/// writes to different rigs never contend. Readers always get owned copies;
/// a reading is replaced as a whole under the write lock, so a snapshot sees
/// either the previous or the new value, never a mix.
#[derive(Debug)]
pub struct ReadingStore {
    rigs: BTreeMap<RigId, RwLock<RigSnapshot>>,
    capture: RwLock<CaptureUnitSnapshot>,
    counters: WriteCounters,
}

impl ReadingStore {
    /// Build a store for rigs `1..=fleet_size`.
    pub fn new(fleet_size: u8) -> Self {
        Self::with_rigs(1..=fleet_size)
    }

    pub fn with_rigs(rig_ids: impl IntoIterator<Item = RigId>) -> Self {
        let rigs = rig_ids
            .into_iter()
            .map(|id| (id, RwLock::new(RigSnapshot::empty(id))))
            .collect();

        Self {
            rigs,
            capture: RwLock::new(CaptureUnitSnapshot::default()),
            counters: WriteCounters::default(),
        }
    }

    pub fn record_gas(&self, reading: GasReading) -> Result<(), StoreError> {
        let slot = self.rig_slot(reading.rig_id)?;
        slot.write().last_gas = Some(reading);
        self.counters.bump(StreamKind::Gas);
        Ok(())
    }

    pub fn record_particle(&self, reading: ParticleReading) -> Result<(), StoreError> {
        let slot = self.rig_slot(reading.rig_id)?;
        slot.write().last_particle = Some(reading);
        self.counters.bump(StreamKind::Particle);
        Ok(())
    }

    pub fn record_motion(&self, reading: MotionReading) {
        self.capture.write().last_motion = Some(reading);
        self.counters.bump(StreamKind::Motion);
    }

    pub fn record_camera(&self, reading: CameraReading) {
        self.capture.write().last_camera = Some(reading);
        self.counters.bump(StreamKind::Camera);
    }

    pub fn record_camera_stream(&self, reading: CameraStreamReading) {
        self.capture.write().last_camera_stream = Some(reading);
        self.counters.bump(StreamKind::CameraStream);
    }

    /// Dispatch to the `record_*` method matching the reading's stream.
    pub fn record(&self, reading: Reading) -> Result<(), StoreError> {
        match reading {
            Reading::Gas(r) => self.record_gas(r)?,
            Reading::Particle(r) => self.record_particle(r)?,
            Reading::Motion(r) => self.record_motion(r),
            Reading::Camera(r) => self.record_camera(r),
            Reading::CameraStream(r) => self.record_camera_stream(r),
        }
        Ok(())
    }

    pub fn snapshot_rig(&self, rig_id: RigId) -> Option<RigSnapshot> {
        self.rigs.get(&rig_id).map(|slot| slot.read().clone())
    }

    pub fn snapshot_capture_unit(&self) -> CaptureUnitSnapshot {
        self.capture.read().clone()
    }

    pub fn rig_ids(&self) -> impl Iterator<Item = RigId> + '_ {
        self.rigs.keys().copied()
    }

    pub fn stats(&self) -> StoreStats {
        self.counters.snapshot()
    }

    fn rig_slot(&self, rig_id: RigId) -> Result<&RwLock<RigSnapshot>, StoreError> {
        self.rigs.get(&rig_id).ok_or(StoreError::UnknownRig(rig_id))
    }
}

/// Read-only view of a [`ReadingStore`] for dashboards and other viewers.
#[derive(Debug, Clone)]
pub struct StoreReader {
    store: Arc<ReadingStore>,
}

impl StoreReader {
    pub fn new(store: Arc<ReadingStore>) -> Self {
        Self { store }
    }

    pub fn snapshot_rig(&self, rig_id: RigId) -> Option<RigSnapshot> {
        self.store.snapshot_rig(rig_id)
    }

    pub fn snapshot_capture_unit(&self) -> CaptureUnitSnapshot {
        self.store.snapshot_capture_unit()
    }

    pub fn rig_ids(&self) -> Vec<RigId> {
        self.store.rig_ids().collect()
    }

    pub fn stats(&self) -> StoreStats {
        self.store.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn gas(rig_id: RigId, lpg: f64) -> GasReading {
        GasReading {
            id: Uuid::new_v4(),
            sensor_id: format!("RIG-{rig_id}-GAS"),
            rig_id,
            lpg,
            co: lpg,
            smoke: lpg,
            alert: false,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_store_starts_empty() {
        let store = ReadingStore::new(3);
        assert_eq!(store.rig_ids().collect::<Vec<_>>(), vec![1, 2, 3]);

        let snapshot = store.snapshot_rig(2).unwrap();
        assert_eq!(snapshot, RigSnapshot::empty(2));
        assert!(store.snapshot_rig(0).is_none());
        assert_eq!(store.snapshot_capture_unit(), CaptureUnitSnapshot::default());
    }

    #[test]
    fn test_unknown_rig_is_rejected() {
        let store = ReadingStore::new(1);
        assert_eq!(store.record_gas(gas(9, 1.0)), Err(StoreError::UnknownRig(9)));
        assert_eq!(store.stats().gas, 0);
    }

    #[test]
    fn test_record_replaces_previous_value() {
        let store = ReadingStore::new(1);
        store.record_gas(gas(1, 100.0)).unwrap();
        let latest = gas(1, 200.0);
        store.record(latest.clone().into()).unwrap();

        let snapshot = store.snapshot_rig(1).unwrap();
        assert_eq!(snapshot.last_gas, Some(latest));
        assert_eq!(store.stats().gas, 2);
    }
}
