use rand::rngs::StdRng;
use rand::SeedableRng;
use rigsim::capture::CameraConsumer;
use rigsim::config::{CameraConfig, MotionConfig, SimulationConfig};
use rigsim::gateway::{MemoryPublisher, Publisher, TopicScheme};
use rigsim::generator::{ClockedGenerator, PipelineContext};
use rigsim::handoff::{HandoffQueue, MotionHandoff, Offer, OverflowPolicy, HANDOFF_CAPACITY};
use rigsim::readings::StreamKind;
use rigsim::sensors::{CameraCaptureModel, MotionModel};
use rigsim::shutdown::ShutdownSignal;
use rigsim::store::ReadingStore;
use rigsim::Simulation;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

async fn connected_context() -> (PipelineContext, Arc<MemoryPublisher>) {
    let sink = Arc::new(MemoryPublisher::new());
    sink.connect().await.unwrap();
    let ctx = PipelineContext::new(
        Arc::new(ReadingStore::new(1)),
        sink.clone(),
        TopicScheme::new("test"),
        ShutdownSignal::new(),
    );
    (ctx, sink)
}

fn always_detecting() -> MotionConfig {
    MotionConfig {
        detection_probability: 1.0,
        ..MotionConfig::default()
    }
}

#[tokio::test]
async fn test_fifteen_detections_into_stalled_consumer_keep_latest_ten() {
    let (ctx, sink) = connected_context().await;
    let handoff = Arc::new(MotionHandoff::new(OverflowPolicy::DropOldest));
    let mut pir = ClockedGenerator::new(
        MotionModel::new(always_detecting(), Arc::clone(&handoff)),
        Duration::from_millis(2500),
        StdRng::seed_from_u64(1),
        ctx,
    );

    // No consumer is running, so nothing drains the queue
    let mut motion_ids = Vec::new();
    for _ in 0..15 {
        let reading = pir.tick().await;
        assert!(reading.motion_detected);
        motion_ids.push(reading.id);
    }

    assert_eq!(handoff.len(), HANDOFF_CAPACITY);
    assert_eq!(handoff.dropped(), 5);

    let retained: Vec<Uuid> = std::iter::from_fn(|| handoff.try_take()).collect();
    assert_eq!(retained, motion_ids[5..].to_vec());

    // Every motion reading was still published, detected or not
    assert_eq!(sink.messages_on("test/capture/motion").len(), 15);
}

#[test]
fn test_drop_newest_policy_keeps_earliest_ids() {
    let queue: HandoffQueue<u32, 10> = HandoffQueue::new(OverflowPolicy::DropNewest);
    let outcomes: Vec<Offer<u32>> = (0..15).map(|i| queue.offer(i)).collect();

    assert!(outcomes[..10].iter().all(|o| *o == Offer::Queued));
    assert!(outcomes[10..].iter().all(|o| matches!(o, Offer::Rejected(_))));
    assert_eq!(queue.dropped(), 5);
    assert_eq!(queue.try_take(), Some(0));
}

#[tokio::test]
async fn test_consumer_captures_only_the_freshest_pending_id() {
    let (ctx, sink) = connected_context().await;
    let handoff = Arc::new(MotionHandoff::new(OverflowPolicy::DropOldest));
    let mut camera = CameraConsumer::new(
        CameraCaptureModel::new(CameraConfig::default(), "https://picsum.photos"),
        Duration::from_millis(800),
        StdRng::seed_from_u64(2),
        ctx.clone(),
        handoff,
    );

    // Empty slot: tick is a no-op
    assert!(camera.tick().await.is_none());
    assert!(ctx.store.snapshot_capture_unit().last_camera.is_none());

    let older = Uuid::new_v4();
    let newest = Uuid::new_v4();
    camera.receive(older);
    camera.receive(newest);
    assert_eq!(camera.pending(), Some(newest));

    let capture = camera.tick().await.expect("pending id should be captured");
    assert_eq!(capture.motion_id, newest);
    assert!(camera.pending().is_none());
    assert!(camera.tick().await.is_none());

    let stored = ctx.store.snapshot_capture_unit().last_camera.unwrap();
    assert_eq!(stored, capture);
    assert_eq!(sink.messages_on("test/capture/camera").len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_camera_readings_reference_earlier_detections() {
    let sink = Arc::new(MemoryPublisher::new());
    let config = SimulationConfig {
        seed: Some(1234),
        fleet_size: 1,
        motion: MotionConfig {
            detection_probability: 0.5,
            ..MotionConfig::default()
        },
        ..SimulationConfig::default()
    };
    let mut simulation = Simulation::new(config, sink.clone()).unwrap();
    simulation.start().await.unwrap();
    tokio::time::sleep(Duration::from_secs(120)).await;
    simulation.stop().await;

    let mut detected = HashSet::new();
    let mut detections = 0;
    let mut captures = 0;
    for message in sink.messages() {
        if message.topic.ends_with("/capture/motion") {
            if message.payload["motion_detected"] == true {
                detections += 1;
                detected.insert(message.payload["id"].as_str().unwrap().to_string());
            }
        } else if message.topic.ends_with("/capture/camera") {
            captures += 1;
            let motion_id = message.payload["motion_id"].as_str().unwrap();
            assert!(detected.contains(motion_id), "capture for unknown motion {motion_id}");
        }
    }

    assert!(detections > 0);
    assert!(captures > 0);
    assert!(captures <= detections);
}

#[tokio::test(start_paused = true)]
async fn test_camera_stream_keeps_cadence_without_motion() {
    let sink = Arc::new(MemoryPublisher::new());
    let config = SimulationConfig {
        fleet_size: 1,
        seed: Some(9),
        motion: MotionConfig {
            detection_probability: 0.0,
            ..MotionConfig::default()
        },
        ..SimulationConfig::default()
    };
    let mut simulation = Simulation::new(config, sink.clone()).unwrap();
    simulation.start().await.unwrap();

    // Stream ticks at 1s, 2s, ... 10s
    tokio::time::sleep(Duration::from_millis(10_500)).await;
    simulation.stop().await;

    let stats = simulation.stats();
    assert_eq!(stats.get(StreamKind::CameraStream), 10);
    assert_eq!(stats.get(StreamKind::Camera), 0);
    assert_eq!(sink.messages_on("rigsim/sensors/capture/camera_stream").len(), 10);
    assert!(sink.messages_on("rigsim/sensors/capture/camera").is_empty());

    let capture_unit = simulation.snapshot_capture_unit();
    assert!(capture_unit.last_camera.is_none());
    assert!(capture_unit.last_camera_stream.is_some());
    assert!(!capture_unit.last_motion.unwrap().motion_detected);
}

#[tokio::test(start_paused = true)]
async fn test_consumer_task_stops_on_shutdown_without_producer() {
    let (ctx, _sink) = connected_context().await;
    let handoff = Arc::new(MotionHandoff::new(OverflowPolicy::DropOldest));
    let camera = CameraConsumer::new(
        CameraCaptureModel::new(CameraConfig::default(), "https://picsum.photos"),
        Duration::from_millis(800),
        StdRng::seed_from_u64(4),
        ctx.clone(),
        Arc::clone(&handoff),
    );
    let task = camera.spawn();

    handoff.offer(Uuid::new_v4());
    tokio::time::sleep(Duration::from_millis(1_000)).await;
    assert!(ctx.store.snapshot_capture_unit().last_camera.is_some());

    ctx.shutdown.trigger();
    tokio::time::timeout(Duration::from_millis(800), task.handle)
        .await
        .expect("consumer should exit within one tick")
        .unwrap();
}
