use super::{encode_payload, ConnectError, PublishError, Publisher};
use crate::config::{ConfigError, SinkConfig};
use crate::readings::Reading;
use async_trait::async_trait;
use parking_lot::Mutex;
use rumqttc::{AsyncClient, ClientError, ConnectionError, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time;
use tracing::{debug, info, trace, warn};

const DISCONNECT_DRAIN_MS: u64 = 250;

/// Publishes readings to an MQTT broker as JSON at QoS 1 on a clean session.
///
/// A spawned task polls the client's event loop for the whole session. It
/// raises the connected flag on every `ConnAck` and clears it when the
/// connection fails, then keeps polling so the client reconnects on its own.
/// Publishing only queues onto the client's bounded request channel; a full
/// channel drops the message rather than stalling the generator.
#[derive(Debug)]
pub struct MqttPublisher {
    endpoint: String,
    host: String,
    port: u16,
    client_id: String,
    connect_timeout: Duration,
    keep_alive: Duration,
    reconnect_delay: Duration,
    backlog: usize,
    connected: Arc<AtomicBool>,
    session: Mutex<Option<Session>>,
}

#[derive(Debug)]
struct Session {
    client: AsyncClient,
    driver: JoinHandle<()>,
}

impl Drop for Session {
    fn drop(&mut self) {
        self.driver.abort();
    }
}

impl MqttPublisher {
    pub fn from_config(config: &SinkConfig) -> Result<Self, ConfigError> {
        let (host, port) = config.broker_address()?;
        Ok(Self {
            endpoint: format!("{host}:{port}"),
            host,
            port,
            client_id: config.client_id.clone(),
            connect_timeout: config.connect_timeout(),
            keep_alive: config.keep_alive(),
            reconnect_delay: config.reconnect_delay(),
            backlog: config.outbound_backlog.max(1),
            connected: Arc::new(AtomicBool::new(false)),
            session: Mutex::new(None),
        })
    }

    fn options(&self) -> MqttOptions {
        let mut options = MqttOptions::new(self.client_id.clone(), self.host.clone(), self.port);
        options.set_keep_alive(self.keep_alive).set_clean_session(true);
        options
    }
}

#[async_trait]
impl Publisher for MqttPublisher {
    async fn connect(&self) -> Result<(), ConnectError> {
        if self.is_connected() {
            return Ok(());
        }

        let (client, eventloop) = AsyncClient::new(self.options(), self.backlog);
        let (ready_tx, ready_rx) = oneshot::channel();
        let session = Session {
            client,
            driver: tokio::spawn(drive_event_loop(
                eventloop,
                Arc::clone(&self.connected),
                ready_tx,
                self.endpoint.clone(),
                self.reconnect_delay,
            )),
        };

        let outcome = match time::timeout(self.connect_timeout, ready_rx).await {
            Ok(Ok(Ok(()))) => {
                // A session left over from an earlier connect is replaced and its driver aborted.
                drop(self.session.lock().replace(session));
                info!(endpoint = %self.endpoint, client_id = %self.client_id, "connected to MQTT broker");
                return Ok(());
            }
            Ok(Ok(Err(ConnectionError::ConnectionRefused(code)))) => {
                ConnectError::Refused(format!("broker rejected the session: {code:?}"))
            }
            Ok(Ok(Err(source))) => ConnectError::Unreachable {
                endpoint: self.endpoint.clone(),
                source,
            },
            Ok(Err(_)) => ConnectError::Refused("event loop ended before the broker answered".to_string()),
            Err(_) => ConnectError::Timeout {
                endpoint: self.endpoint.clone(),
                after: self.connect_timeout,
            },
        };

        drop(session);
        self.connected.store(false, Ordering::Release);
        Err(outcome)
    }

    async fn publish(&self, topic: &str, reading: &Reading) -> Result<(), PublishError> {
        if !self.is_connected() {
            return Ok(());
        }

        let payload = encode_payload(reading)?;
        let client = match self.session.lock().as_ref() {
            Some(session) => session.client.clone(),
            None => return Ok(()),
        };

        match client.try_publish(topic, QoS::AtLeastOnce, false, payload) {
            Ok(()) => Ok(()),
            Err(ClientError::TryRequest(_)) => Err(PublishError::Backlogged {
                topic: topic.to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    async fn disconnect(&self) {
        let session = self.session.lock().take();
        self.connected.store(false, Ordering::Release);

        let Some(mut session) = session else {
            return;
        };

        // The driver exits once the DISCONNECT packet has gone out.
        if let Err(e) = session.client.try_disconnect() {
            debug!(endpoint = %self.endpoint, error = %e, "could not queue DISCONNECT");
        }
        let drain = Duration::from_millis(DISCONNECT_DRAIN_MS);
        if time::timeout(drain, &mut session.driver).await.is_err() {
            warn!(endpoint = %self.endpoint, "MQTT event loop did not finish in time, aborting");
        }
        self.connected.store(false, Ordering::Release);
        info!(endpoint = %self.endpoint, "disconnected from MQTT broker");
    }
}

async fn drive_event_loop(
    mut eventloop: EventLoop,
    connected: Arc<AtomicBool>,
    ready: oneshot::Sender<Result<(), ConnectionError>>,
    endpoint: String,
    reconnect_delay: Duration,
) {
    let mut ready = Some(ready);

    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                connected.store(true, Ordering::Release);
                match ready.take() {
                    Some(ready) => {
                        let _ = ready.send(Ok(()));
                    }
                    None => info!(endpoint = %endpoint, "reconnected to MQTT broker"),
                }
            }
            Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                connected.store(false, Ordering::Release);
                return;
            }
            Ok(event) => trace!(?event, "mqtt event"),
            Err(e) => {
                // Failures before the first ConnAck belong to connect()
                if let Some(ready) = ready.take() {
                    let _ = ready.send(Err(e));
                    return;
                }
                if connected.swap(false, Ordering::AcqRel) {
                    warn!(endpoint = %endpoint, error = %e, "lost connection to MQTT broker, reconnecting");
                } else {
                    debug!(endpoint = %endpoint, error = %e, "reconnect attempt failed");
                }
                time::sleep(reconnect_delay).await;
            }
        }
    }
}
