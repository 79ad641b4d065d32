use clap::{App, Arg};
use rigsim::{Simulation, SimulationConfig};
use std::time::Duration;
use tokio::time;
use tracing::{info, warn};

const DEFAULT_STATUS_EVERY_SECS: &str = "5";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let matches = App::new("rigsim")
        .version("0.1.0")
        .author("Sensor Systems Engineering Team")
        .about("🔬 IoT sensor rig simulator - gas, particle, motion and camera telemetry")
        .arg(
            Arg::with_name("config")
                .short("c")
                .long("config")
                .value_name("FILE")
                .help("JSON configuration file (missing fields use defaults)")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("endpoint")
                .short("e")
                .long("endpoint")
                .value_name("HOST:PORT")
                .help("MQTT broker address (host:port)")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("rigs")
                .short("r")
                .long("rigs")
                .value_name("COUNT")
                .help("Number of simulated rigs")
                .takes_value(true)
                .validator(|v| match v.parse::<u8>() {
                    Ok(n) if n > 0 => Ok(()),
                    _ => Err("Rig count must be between 1 and 255".into()),
                }),
        )
        .arg(
            Arg::with_name("seed")
                .short("s")
                .long("seed")
                .value_name("SEED")
                .help("Seed every generator for a reproducible run")
                .takes_value(true)
                .validator(|v| match v.parse::<u64>() {
                    Ok(_) => Ok(()),
                    Err(_) => Err("Seed must be a valid number".into()),
                }),
        )
        .arg(
            Arg::with_name("no-publish")
                .long("no-publish")
                .help("Run headless without connecting to a sink"),
        )
        .arg(
            Arg::with_name("duration")
                .short("d")
                .long("duration")
                .value_name("SECONDS")
                .help("Stop after this many seconds instead of waiting for Ctrl+C")
                .takes_value(true)
                .validator(|v| match v.parse::<u64>() {
                    Ok(_) => Ok(()),
                    Err(_) => Err("Duration must be a number of seconds".into()),
                }),
        )
        .arg(
            Arg::with_name("status-every")
                .long("status-every")
                .value_name("SECONDS")
                .help("Interval between fleet status lines")
                .takes_value(true)
                .default_value(DEFAULT_STATUS_EVERY_SECS)
                .validator(|v| match v.parse::<u64>() {
                    Ok(n) if n > 0 => Ok(()),
                    _ => Err("Status interval must be a positive number of seconds".into()),
                }),
        )
        .get_matches();

    let mut config = match matches.value_of("config") {
        Some(path) => SimulationConfig::from_file(path)?,
        None => SimulationConfig::default(),
    };
    if let Some(endpoint) = matches.value_of("endpoint") {
        config.sink.endpoint = endpoint.to_string();
    }
    if let Some(rigs) = matches.value_of("rigs") {
        config.fleet_size = rigs.parse()?;
    }
    if let Some(seed) = matches.value_of("seed") {
        config.seed = Some(seed.parse()?);
    }
    if matches.is_present("no-publish") {
        config.sink.enabled = false;
    }
    let duration = matches
        .value_of("duration")
        .map(str::parse::<u64>)
        .transpose()?
        .map(Duration::from_secs);
    let status_every = Duration::from_secs(matches.value_of("status-every").unwrap_or(DEFAULT_STATUS_EVERY_SECS).parse()?);

    println!("🔬 IoT Sensor Rig Simulator");
    println!("===========================");

    let mut simulation = Simulation::from_config(config)?;
    simulation.start().await?;

    let stop_after = async {
        match duration {
            Some(duration) => time::sleep(duration).await,
            None => std::future::pending().await,
        }
    };
    tokio::pin!(stop_after);

    let mut status = time::interval(status_every);
    status.tick().await;

    loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    warn!("Failed to listen for Ctrl+C: {}", e);
                }
                break;
            }
            () = &mut stop_after => break,
            _ = status.tick() => report_status(&simulation),
        }
    }

    simulation.stop().await;
    report_status(&simulation);
    println!("🛑 Sensor rig simulator stopped");

    Ok(())
}

fn report_status(simulation: &Simulation) {
    let stats = simulation.stats();
    info!(
        publishing = simulation.is_publishing(),
        gas = stats.gas,
        particle = stats.particle,
        motion = stats.motion,
        camera = stats.camera,
        camera_stream = stats.camera_stream,
        handoff_dropped = simulation.handoff_dropped(),
        "📊 fleet status"
    );

    for rig_id in simulation.rig_ids() {
        let Some(rig) = simulation.snapshot_rig(rig_id) else {
            continue;
        };
        if let (Some(gas), Some(pm)) = (rig.last_gas, rig.last_particle) {
            info!(
                "🧪 rig {}: LPG {:.1} CO {:.1} smoke {:.1}{} | PM1.0 {:.1} PM2.5 {:.1} PM10 {:.1}{}",
                rig_id,
                gas.lpg,
                gas.co,
                gas.smoke,
                if gas.alert { " ⚠️" } else { "" },
                pm.pm10,
                pm.pm25,
                pm.pm100,
                if pm.alert { " ⚠️" } else { "" },
            );
        }
    }

    let capture = simulation.snapshot_capture_unit();
    if let Some(motion) = capture.last_motion {
        info!(
            "🚶 motion {} (intensity {:.1}%)",
            if motion.motion_detected { "detected" } else { "clear" },
            motion.intensity
        );
    }
    if let Some(camera) = capture.last_camera {
        info!("📸 last capture {} for motion {}", camera.image_ref, camera.motion_id);
    }
}
