use crate::gateway::{publish_best_effort, Publisher, TopicScheme};
use crate::readings::{Reading, StreamClock};
use crate::sensors::{next_stamp, SensorModel};
use crate::shutdown::ShutdownSignal;
use crate::store::ReadingStore;
use rand::rngs::StdRng;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, Interval, MissedTickBehavior};
use tracing::{info, info_span, warn, Instrument};

/// Everything a simulation task shares with the rest of the fleet.
#[derive(Clone)]
pub struct PipelineContext {
    pub store: Arc<ReadingStore>,
    pub gateway: Arc<dyn Publisher>,
    pub topics: TopicScheme,
    pub shutdown: ShutdownSignal,
}

impl PipelineContext {
    pub fn new(
        store: Arc<ReadingStore>,
        gateway: Arc<dyn Publisher>,
        topics: TopicScheme,
        shutdown: ShutdownSignal,
    ) -> Self {
        Self {
            store,
            gateway,
            topics,
            shutdown,
        }
    }

    /// Record then publish. The two effects are independent: a failed
    /// publish never undoes the store write, and a rejected write is logged
    /// without skipping the publish.
    pub async fn emit(&self, reading: &Reading) {
        if let Err(e) = self.store.record(reading.clone()) {
            warn!(stream = %reading.kind(), error = %e, "reading not stored");
        }
        let topic = self.topics.topic_for(reading);
        publish_best_effort(self.gateway.as_ref(), &topic, reading).await;
    }
}

/// A spawned simulation task and the name it is logged under.
#[derive(Debug)]
pub struct SpawnedTask {
    pub name: String,
    pub handle: JoinHandle<()>,
}

/// Fixed-period ticker whose first tick is one full period after creation.
pub fn ticker(period: Duration) -> Interval {
    let mut ticker = time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

/// Drives one [`SensorModel`]: one reading per tick until shutdown.
pub struct ClockedGenerator<M: SensorModel> {
    model: M,
    period: Duration,
    rng: StdRng,
    clock: StreamClock,
    ctx: PipelineContext,
}

impl<M: SensorModel> ClockedGenerator<M> {
    pub fn new(model: M, period: Duration, rng: StdRng, ctx: PipelineContext) -> Self {
        Self {
            model,
            period,
            rng,
            clock: StreamClock::new(),
            ctx,
        }
    }

    pub fn name(&self) -> String {
        format!("{}-rig{}", self.model.kind(), self.model.rig_id())
    }

    /// Produce, store and publish a single reading.
    pub async fn tick(&mut self) -> M::Reading {
        let stamp = next_stamp(&mut self.rng, &mut self.clock);
        let reading = self.model.sample(&mut self.rng, stamp);
        self.ctx.emit(&reading.clone().into()).await;
        self.model.after_publish(&reading);
        reading
    }

    pub async fn run(mut self) {
        let mut ticker = ticker(self.period);
        let shutdown = self.ctx.shutdown.clone();
        info!(period_ms = self.period.as_millis() as u64, "generator started");

        loop {
            tokio::select! {
                biased;
                () = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    self.tick().await;
                }
            }
        }

        info!("generator stopped");
    }

    pub fn spawn(self) -> SpawnedTask {
        let name = self.name();
        let span = info_span!("generator", stream = %self.model.kind(), rig = self.model.rig_id());
        SpawnedTask {
            name,
            handle: tokio::spawn(self.run().instrument(span)),
        }
    }
}
