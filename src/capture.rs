//! Motion capture unit: PIR producer, camera consumer and the independent
//! camera stream.
//!
//! The PIR generator offers detected motion ids to a bounded hand-off queue
//! without ever blocking. The camera consumer moves ids from the queue into a
//! single pending slot as they arrive and, on its own clock, turns the pending
//! id (if any) into one frame. The slot keeps only the freshest id, so a
//! backlog collapses into a single capture.

use crate::config::SimulationConfig;
use crate::generator::{ticker, ClockedGenerator, PipelineContext, SpawnedTask};
use crate::handoff::MotionHandoff;
use crate::readings::{CameraReading, MotionId, Reading, StreamClock, StreamKind, CAPTURE_UNIT_RIG_ID};
use crate::sensors::{next_stamp, stream_rng, CameraCaptureModel, CameraStreamModel, MotionModel};
use rand::rngs::StdRng;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, info_span, Instrument};

pub struct CameraConsumer {
    model: CameraCaptureModel,
    period: Duration,
    rng: StdRng,
    clock: StreamClock,
    ctx: PipelineContext,
    handoff: Arc<MotionHandoff>,
    pending: Option<MotionId>,
}

impl CameraConsumer {
    pub fn new(
        model: CameraCaptureModel,
        period: Duration,
        rng: StdRng,
        ctx: PipelineContext,
        handoff: Arc<MotionHandoff>,
    ) -> Self {
        Self {
            model,
            period,
            rng,
            clock: StreamClock::new(),
            ctx,
            handoff,
            pending: None,
        }
    }

    pub fn pending(&self) -> Option<MotionId> {
        self.pending
    }

    /// Make `motion_id` the next id to capture, superseding any older one.
    pub fn receive(&mut self, motion_id: MotionId) {
        if let Some(superseded) = self.pending.replace(motion_id) {
            debug!(motion_id = %motion_id, superseded = %superseded, "pending capture superseded");
        } else {
            debug!(motion_id = %motion_id, "camera armed");
        }
    }

    /// Capture a frame for the pending id. Without one the tick does nothing.
    pub async fn tick(&mut self) -> Option<CameraReading> {
        let motion_id = self.pending.take()?;
        let stamp = next_stamp(&mut self.rng, &mut self.clock);
        let reading = self.model.capture(&mut self.rng, stamp, motion_id);

        self.ctx.emit(&Reading::Camera(reading.clone())).await;
        info!(
            motion_id = %motion_id,
            image_ref = %reading.image_ref,
            latency_ms = reading.latency_ms,
            "frame captured"
        );
        Some(reading)
    }

    pub async fn run(mut self) {
        let mut ticker = ticker(self.period);
        let shutdown = self.ctx.shutdown.clone();
        let handoff = Arc::clone(&self.handoff);
        info!(period_ms = self.period.as_millis() as u64, "camera consumer started");

        loop {
            tokio::select! {
                biased;
                () = shutdown.cancelled() => break,
                motion_id = handoff.take() => self.receive(motion_id),
                _ = ticker.tick() => {
                    self.tick().await;
                }
            }
        }

        info!("camera consumer stopped");
    }

    pub fn spawn(self) -> SpawnedTask {
        let span = info_span!("camera", stream = %StreamKind::Camera, rig = CAPTURE_UNIT_RIG_ID);
        SpawnedTask {
            name: format!("{}-rig{}", StreamKind::Camera, CAPTURE_UNIT_RIG_ID),
            handle: tokio::spawn(self.run().instrument(span)),
        }
    }
}

/// The fleet-wide motion + camera subsystem.
pub struct CaptureUnit {
    pir: ClockedGenerator<MotionModel>,
    camera: CameraConsumer,
    stream: ClockedGenerator<CameraStreamModel>,
}

impl CaptureUnit {
    pub fn new(config: &SimulationConfig, handoff: Arc<MotionHandoff>, ctx: &PipelineContext) -> Self {
        let rng = |kind| stream_rng(config.seed, CAPTURE_UNIT_RIG_ID, kind);

        let pir = ClockedGenerator::new(
            MotionModel::new(config.motion.clone(), Arc::clone(&handoff)),
            Duration::from_millis(config.motion.interval_ms),
            rng(StreamKind::Motion),
            ctx.clone(),
        );
        let camera = CameraConsumer::new(
            CameraCaptureModel::new(config.camera.clone(), config.image_base_url.clone()),
            Duration::from_millis(config.camera.interval_ms),
            rng(StreamKind::Camera),
            ctx.clone(),
            handoff,
        );
        let stream = ClockedGenerator::new(
            CameraStreamModel::new(config.camera_stream.clone(), config.image_base_url.clone()),
            Duration::from_millis(config.camera_stream.interval_ms),
            rng(StreamKind::CameraStream),
            ctx.clone(),
        );

        Self { pir, camera, stream }
    }

    pub fn spawn(self) -> Vec<SpawnedTask> {
        vec![self.pir.spawn(), self.camera.spawn(), self.stream.spawn()]
    }
}
