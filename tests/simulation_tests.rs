use rigsim::config::SimulationConfig;
use rigsim::readings::StreamKind;
use rigsim::{LifecycleError, LifecycleState, MemoryPublisher, Publisher, Simulation};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{self, Instant};

fn seeded(fleet_size: u8, seed: u64) -> SimulationConfig {
    SimulationConfig {
        fleet_size,
        seed: Some(seed),
        ..SimulationConfig::default()
    }
}

#[tokio::test(start_paused = true)]
async fn test_fleet_produces_readings_for_every_rig() {
    let sink = Arc::new(MemoryPublisher::new());
    let mut simulation = Simulation::new(seeded(3, 1), sink.clone()).unwrap();
    assert_eq!(simulation.state(), LifecycleState::Idle);

    simulation.start().await.unwrap();
    assert!(simulation.is_running());
    assert!(simulation.is_publishing());

    time::sleep(Duration::from_millis(10_500)).await;

    assert_eq!(simulation.rig_ids(), vec![1, 2, 3]);
    for rig_id in 1..=3 {
        let rig = simulation.snapshot_rig(rig_id).unwrap();
        assert_eq!(rig.last_gas.unwrap().rig_id, rig_id);
        assert_eq!(rig.last_particle.unwrap().sensor_id, format!("RIG-{rig_id}-PM"));
        assert_eq!(sink.messages_on(&format!("rigsim/sensors/rig{rig_id}/gas")).len(), 5);
    }
    assert!(simulation.snapshot_rig(4).is_none());

    let capture_unit = simulation.snapshot_capture_unit();
    assert_eq!(capture_unit.last_motion.unwrap().sensor_id, "CAPTURE-PIR");

    simulation.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_unreachable_sink_does_not_stop_generation() {
    let sink = Arc::new(MemoryPublisher::unreachable());
    let mut simulation = Simulation::new(seeded(1, 2), sink.clone()).unwrap();

    simulation.start().await.unwrap();
    time::sleep(Duration::from_millis(10_500)).await;

    assert!(!simulation.is_publishing());
    assert!(sink.is_empty());
    let stats = simulation.stats();
    assert_eq!(stats.get(StreamKind::Gas), 5);
    assert_eq!(stats.get(StreamKind::CameraStream), 10);
    assert!(simulation.snapshot_rig(1).unwrap().last_gas.is_some());

    simulation.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_sink_lost_mid_run_keeps_store_current() {
    let sink = Arc::new(MemoryPublisher::new());
    let mut simulation = Simulation::new(seeded(1, 3), sink.clone()).unwrap();

    simulation.start().await.unwrap();
    time::sleep(Duration::from_millis(4_500)).await;
    let published = sink.len();
    assert!(published > 0);

    sink.drop_connection();
    let before = simulation.snapshot_rig(1).unwrap().last_gas.unwrap();
    time::sleep(Duration::from_secs(5)).await;

    assert_eq!(sink.len(), published);
    assert!(!simulation.is_publishing());
    let after = simulation.snapshot_rig(1).unwrap().last_gas.unwrap();
    assert_ne!(before.id, after.id);

    simulation.stop().await;
}

#[tokio::test]
async fn test_lifecycle_transitions() {
    let mut simulation = Simulation::headless(seeded(1, 4)).unwrap();

    simulation.start().await.unwrap();
    assert!(matches!(simulation.start().await, Err(LifecycleError::AlreadyRunning)));

    assert!(simulation.stop().await);
    assert_eq!(simulation.state(), LifecycleState::Stopped);
    assert!(!simulation.stop().await);

    assert!(matches!(simulation.start().await, Err(LifecycleError::Stopped)));
    assert_eq!(simulation.state(), LifecycleState::Stopped);
}

#[tokio::test]
async fn test_stop_before_start_is_terminal() {
    let mut simulation = Simulation::headless(seeded(1, 5)).unwrap();
    assert!(simulation.stop().await);
    assert!(matches!(simulation.start().await, Err(LifecycleError::Stopped)));
    assert!(simulation.snapshot_rig(1).unwrap().last_gas.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_stop_is_prompt_and_freezes_snapshots() {
    let sink = Arc::new(MemoryPublisher::new());
    let mut simulation = Simulation::new(seeded(2, 6), sink.clone()).unwrap();

    simulation.start().await.unwrap();
    time::sleep(Duration::from_secs(6)).await;

    let started = Instant::now();
    assert!(simulation.stop().await);
    assert!(started.elapsed() < Duration::from_millis(800));

    let rig = simulation.snapshot_rig(1).unwrap();
    let capture_unit = simulation.snapshot_capture_unit();
    let stats = simulation.stats();
    let published = sink.len();

    time::sleep(Duration::from_secs(10)).await;

    assert_eq!(simulation.snapshot_rig(1).unwrap(), rig);
    assert_eq!(simulation.snapshot_capture_unit(), capture_unit);
    assert_eq!(simulation.stats(), stats);
    assert_eq!(sink.len(), published);
    assert!(!simulation.is_publishing());
}

#[tokio::test(start_paused = true)]
async fn test_reader_outlives_simulation() {
    let mut simulation = Simulation::headless(seeded(1, 7)).unwrap();
    simulation.start().await.unwrap();
    time::sleep(Duration::from_millis(3_500)).await;
    simulation.stop().await;

    let reader = simulation.reader();
    drop(simulation);

    assert_eq!(reader.rig_ids(), vec![1]);
    assert!(reader.snapshot_rig(1).unwrap().last_gas.is_some());
    assert_eq!(reader.stats().get(StreamKind::CameraStream), 3);
}

#[tokio::test(start_paused = true)]
async fn test_same_seed_reproduces_readings() {
    async fn run(seed: u64) -> Vec<serde_json::Value> {
        let sink = Arc::new(MemoryPublisher::new());
        let mut simulation = Simulation::new(seeded(2, seed), sink.clone()).unwrap();
        simulation.start().await.unwrap();
        time::sleep(Duration::from_millis(12_300)).await;
        simulation.stop().await;

        let mut payloads: Vec<_> = sink
            .messages()
            .into_iter()
            .map(|m| {
                let mut payload = m.payload;
                // Wall-clock timestamps differ between runs
                payload.as_object_mut().unwrap().remove("timestamp");
                payload
            })
            .collect();
        payloads.sort_by_key(|p| p["id"].as_str().unwrap_or_default().to_string());
        payloads
    }

    let first = run(42).await;
    let second = run(42).await;
    assert!(!first.is_empty());
    assert_eq!(first, second);

    let other = run(43).await;
    assert_ne!(first, other);
}

#[test]
fn test_invalid_config_is_rejected() {
    let config = SimulationConfig {
        fleet_size: 0,
        ..SimulationConfig::default()
    };
    assert!(matches!(
        Simulation::headless(config),
        Err(LifecycleError::InvalidConfig(_))
    ));

    let mut config = SimulationConfig::default();
    config.motion.detection_probability = 1.5;
    assert!(matches!(
        Simulation::headless(config),
        Err(LifecycleError::InvalidConfig(_))
    ));
}

#[tokio::test]
async fn test_disabled_sink_runs_headless() {
    let mut config = seeded(1, 8);
    config.sink.enabled = false;
    let mut simulation = Simulation::from_config(config).unwrap();

    simulation.start().await.unwrap();
    assert!(!simulation.is_publishing());
    simulation.stop().await;
}

#[tokio::test]
async fn test_headless_default_config_skips_connect() {
    let mut simulation = Simulation::headless(SimulationConfig::default()).unwrap();
    assert!(!simulation.config().sink.enabled);

    simulation.start().await.unwrap();
    assert!(!simulation.is_publishing());
    simulation.stop().await;
}

#[tokio::test]
async fn test_disabled_sink_is_never_connected() {
    let sink = Arc::new(MemoryPublisher::new());
    let mut config = seeded(1, 9);
    config.sink.enabled = false;
    let mut simulation = Simulation::new(config, sink.clone()).unwrap();

    simulation.start().await.unwrap();
    assert!(!simulation.is_publishing());
    assert!(!sink.is_connected());
    simulation.stop().await;
}

#[test]
fn test_bad_broker_address_is_rejected() {
    let mut config = SimulationConfig::default();
    config.sink.endpoint = "broker-without-port".to_string();
    assert!(matches!(
        Simulation::from_config(config),
        Err(LifecycleError::InvalidConfig(_))
    ));
}
