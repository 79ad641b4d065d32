use clap::{App, Arg};
use colored::Colorize;
use rigsim::config::SinkConfig;
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use std::time::Duration;
use tokio::time;
use tracing::{info, warn};

const DEFAULT_BROKER: &str = "127.0.0.1:1883";
const DEFAULT_TOPIC: &str = "rigsim/sensors/#";
const RETRY_DELAY: Duration = Duration::from_secs(1);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let matches = App::new("rigsim-sink")
        .version("0.1.0")
        .author("Sensor Systems Engineering Team")
        .about("📥 Telemetry sink - subscribes to the broker and prints every rigsim reading")
        .arg(
            Arg::with_name("broker")
                .short("b")
                .long("broker")
                .value_name("HOST:PORT")
                .help("MQTT broker address")
                .takes_value(true)
                .default_value(DEFAULT_BROKER),
        )
        .arg(
            Arg::with_name("topic")
                .short("t")
                .long("topic")
                .value_name("FILTER")
                .help("Topic filter to subscribe to")
                .takes_value(true)
                .default_value(DEFAULT_TOPIC),
        )
        .arg(
            Arg::with_name("raw")
                .long("raw")
                .help("Print payloads exactly as received"),
        )
        .get_matches();

    let broker = SinkConfig {
        endpoint: matches.value_of("broker").unwrap_or(DEFAULT_BROKER).to_string(),
        ..SinkConfig::default()
    };
    let (host, port) = broker.broker_address()?;
    let filter = matches.value_of("topic").unwrap_or(DEFAULT_TOPIC).to_string();
    let raw = matches.is_present("raw");

    let mut options = MqttOptions::new("rigsim-sink", host, port);
    options.set_keep_alive(broker.keep_alive()).set_clean_session(true);
    let (client, mut eventloop) = AsyncClient::new(options, 16);

    loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    warn!("Failed to listen for Ctrl+C: {}", e);
                }
                break;
            }
            event = eventloop.poll() => match event {
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    // Clean sessions forget subscriptions, so subscribe on every connect
                    info!("🌐 Connected to {}, subscribing to {}", broker.endpoint, filter);
                    if let Err(e) = client.try_subscribe(filter.clone(), QoS::AtLeastOnce) {
                        warn!("Failed to subscribe: {}", e);
                    }
                }
                Ok(Event::Incoming(Packet::Publish(message))) => {
                    print_message(&message.topic, &message.payload, raw);
                }
                Ok(_) => {}
                Err(e) => {
                    warn!("Broker connection error: {}", e);
                    time::sleep(RETRY_DELAY).await;
                }
            }
        }
    }

    let _ = client.try_disconnect();
    Ok(())
}

fn print_message(topic: &str, payload: &[u8], raw: bool) {
    if raw {
        println!("{} {}", topic, String::from_utf8_lossy(payload));
        return;
    }

    let payload = match serde_json::from_slice::<serde_json::Value>(payload) {
        Ok(payload) => payload,
        Err(e) => {
            warn!("Discarding malformed payload on {}: {}", topic, e);
            return;
        }
    };
    let alert = payload["alert"].as_bool().unwrap_or(false) || payload["motion_detected"].as_bool().unwrap_or(false);

    let topic = if alert { topic.red().bold() } else { topic.cyan() };
    let timestamp = payload["timestamp"].as_str().unwrap_or("");
    println!("{} {} {}", timestamp.dimmed(), topic, payload);
}
