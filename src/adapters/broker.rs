//! Publish/subscribe adapter: MQTT over a WebSocket transport.
//!
//! Each publish payload is exactly one record. The MQTT client itself sits behind
//! [`BrokerClientFactory`] so a source never depends on a concrete client library; the
//! [`BrokerClientResolver`] decides which factory is used and enforces strict offline mode.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;

use super::{AdapterEvent, EventSink};
use crate::data::sample::SampleParser;
use crate::error::{AdapterError, ConfigError};

pub const DEFAULT_PORT: u16 = 8081;
pub const DEFAULT_PATH: &str = "/mqtt";
pub const DEFAULT_TOPIC: &str = "mag-usb";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: Option<String>,
}

/// Where to connect and what to subscribe to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerParams {
    pub host: String,
    pub port: u16,
    pub path: String,
    pub topic: String,
    pub tls: bool,
    pub credentials: Option<Credentials>,
}

impl Default for BrokerParams {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: DEFAULT_PORT,
            path: DEFAULT_PATH.to_string(),
            topic: DEFAULT_TOPIC.to_string(),
            tls: false,
            credentials: None,
        }
    }
}

impl BrokerParams {
    /// Build parameters from raw form input.
    ///
    /// Blank path and topic fall back to their defaults. Credentials are only taken when
    /// TLS is selected and a user name was entered.
    pub fn from_form(
        host: &str,
        port: &str,
        path: &str,
        topic: &str,
        tls: bool,
        username: &str,
        password: &str,
    ) -> Result<Self, ConfigError> {
        let port: u16 = port
            .trim()
            .parse()
            .ok()
            .filter(|p| *p != 0)
            .ok_or_else(|| ConfigError::InvalidBrokerParams("enter a valid port (1-65535)".into()))?;
        let path = match path.trim() {
            "" => DEFAULT_PATH.to_string(),
            p => p.to_string(),
        };
        let topic = match topic.trim() {
            "" => DEFAULT_TOPIC.to_string(),
            t => t.to_string(),
        };
        let credentials = match username.trim() {
            "" => None,
            _ if !tls => None,
            user => Some(Credentials {
                username: user.to_string(),
                password: Some(password.to_string()).filter(|p| !p.is_empty()),
            }),
        };
        let params = Self {
            host: host.trim().to_string(),
            port,
            path,
            topic,
            tls,
            credentials,
        };
        params.validate()?;
        Ok(params)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::InvalidBrokerParams("enter a broker host".into()));
        }
        if self.host.contains("://") || self.host.contains('/') {
            return Err(ConfigError::InvalidBrokerParams(format!(
                "host {:?} must not contain a scheme or path",
                self.host
            )));
        }
        if self.port == 0 {
            return Err(ConfigError::InvalidBrokerParams("enter a valid port (1-65535)".into()));
        }
        if self.topic.trim().is_empty() {
            return Err(ConfigError::InvalidBrokerParams("enter a topic".into()));
        }
        Ok(())
    }

    pub fn scheme(&self) -> &'static str {
        if self.tls {
            "wss"
        } else {
            "ws"
        }
    }

    /// `ws(s)://host:port/path`, adding the leading `/` when the path lacks it.
    pub fn url(&self) -> String {
        let path = self.path.trim();
        let sep = if path.starts_with('/') { "" } else { "/" };
        format!("{}://{}:{}{sep}{path}", self.scheme(), self.host.trim(), self.port)
    }

    /// Source label once connected: `host:port/topic`.
    pub fn label(&self) -> String {
        format!("{}:{}/{}", self.host.trim(), self.port, self.topic)
    }
}

/// Session options handed to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerOptions {
    pub keep_alive: Duration,
    pub connect_timeout: Duration,
    pub clean_session: bool,
    pub qos: u8,
    pub client_id_prefix: String,
}

impl Default for BrokerOptions {
    fn default() -> Self {
        Self {
            keep_alive: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            clean_session: true,
            qos: 0,
            client_id_prefix: "magscope".to_string(),
        }
    }
}

/// What a broker session reports.
#[derive(Debug)]
pub enum BrokerEvent {
    /// Session established (CONNACK received).
    Connected,
    /// One publish payload.
    Message(Vec<u8>),
    Error(AdapterError),
    Closed,
}

/// A live broker connection.
pub trait BrokerSession: Send {
    fn subscribe<'a>(&'a mut self, topic: &'a str, qos: u8) -> BoxFuture<'a, Result<(), AdapterError>>;
    fn next_event(&mut self) -> BoxFuture<'_, BrokerEvent>;
    fn close(&mut self) -> BoxFuture<'_, ()>;
}

/// `connect(url, options) -> client`.
pub trait BrokerClientFactory: Send + Sync {
    fn name(&self) -> &str;
    fn connect(
        &self,
        url: &str,
        params: &BrokerParams,
        options: &BrokerOptions,
    ) -> Result<Box<dyn BrokerSession>, AdapterError>;
}

/// Chooses the broker client: the bundled one first, then an optional fallback.
///
/// In strict offline mode the fallback is never consulted; a missing bundled client is a
/// hard [`ConfigError::StrictOffline`].
#[derive(Clone, Default)]
pub struct BrokerClientResolver {
    bundled: Option<Arc<dyn BrokerClientFactory>>,
    fallback: Option<Arc<dyn BrokerClientFactory>>,
    strict_offline: bool,
}

impl BrokerClientResolver {
    /// Resolver using the client compiled into this build, if any.
    pub fn new(strict_offline: bool) -> Self {
        Self {
            bundled: bundled_client(),
            fallback: None,
            strict_offline,
        }
    }

    /// Resolver without any client; add them with the builder methods.
    pub fn empty(strict_offline: bool) -> Self {
        Self {
            strict_offline,
            ..Self::default()
        }
    }

    pub fn with_bundled(mut self, factory: Arc<dyn BrokerClientFactory>) -> Self {
        self.bundled = Some(factory);
        self
    }

    pub fn with_fallback(mut self, factory: Arc<dyn BrokerClientFactory>) -> Self {
        self.fallback = Some(factory);
        self
    }

    pub fn strict_offline(&self) -> bool {
        self.strict_offline
    }

    pub fn resolve(&self) -> Result<Arc<dyn BrokerClientFactory>, ConfigError> {
        if let Some(bundled) = &self.bundled {
            return Ok(bundled.clone());
        }
        if self.strict_offline {
            return Err(ConfigError::StrictOffline);
        }
        match &self.fallback {
            Some(fallback) => {
                tracing::warn!(client = fallback.name(), "bundled broker client missing, using fallback");
                Ok(fallback.clone())
            }
            None => Err(ConfigError::ClientUnavailable),
        }
    }
}

impl fmt::Debug for BrokerClientResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BrokerClientResolver")
            .field("bundled", &self.bundled.as_ref().map(|c| c.name().to_string()))
            .field("fallback", &self.fallback.as_ref().map(|c| c.name().to_string()))
            .field("strict_offline", &self.strict_offline)
            .finish()
    }
}

#[cfg(feature = "broker")]
fn bundled_client() -> Option<Arc<dyn BrokerClientFactory>> {
    Some(Arc::new(mqtt::RumqttcFactory))
}

#[cfg(not(feature = "broker"))]
fn bundled_client() -> Option<Arc<dyn BrokerClientFactory>> {
    None
}

pub async fn run(
    params: BrokerParams,
    options: BrokerOptions,
    resolver: Arc<BrokerClientResolver>,
    parser: SampleParser,
    sink: EventSink,
) {
    if let Err(err) = params.validate() {
        sink.send(AdapterEvent::Failed(err.into()));
        return;
    }
    let factory = match resolver.resolve() {
        Ok(f) => f,
        Err(err) => {
            tracing::error!(source = %sink.source(), %err, "no broker client");
            sink.send(AdapterEvent::Failed(err.into()));
            return;
        }
    };
    let url = params.url();
    let mut session = match factory.connect(&url, &params, &options) {
        Ok(s) => s,
        Err(err) => {
            tracing::warn!(source = %sink.source(), %url, %err, "broker connect failed");
            sink.send(AdapterEvent::Failed(err));
            return;
        }
    };
    tracing::info!(source = %sink.source(), %url, client = factory.name(), topic = %params.topic, "broker connecting");

    let mut subscribed = false;
    while !sink.is_cancelled() {
        match session.next_event().await {
            BrokerEvent::Connected => {
                if subscribed {
                    continue;
                }
                if let Err(err) = session.subscribe(&params.topic, options.qos).await {
                    sink.send(AdapterEvent::Failed(err));
                    break;
                }
                subscribed = true;
                sink.send(AdapterEvent::Opened);
                sink.send(AdapterEvent::Label(params.label()));
            }
            BrokerEvent::Message(payload) => {
                let text = String::from_utf8_lossy(&payload);
                if let Some(sample) = sink.decode_line(&parser, text.trim()) {
                    if !sink.send(AdapterEvent::Samples(vec![sample])) {
                        break;
                    }
                }
            }
            BrokerEvent::Error(err) => {
                tracing::warn!(source = %sink.source(), %err, "broker error");
                sink.send(AdapterEvent::Failed(err));
                break;
            }
            BrokerEvent::Closed => {
                sink.send(AdapterEvent::Failed(AdapterError::StreamClosed(
                    "broker closed the connection".into(),
                )));
                break;
            }
        }
    }
    session.close().await;
}

#[cfg(feature = "broker")]
mod mqtt {
    use futures_util::future::BoxFuture;
    use rumqttc::{
        AsyncClient, ConnectReturnCode, ConnectionError, Event, EventLoop, MqttOptions,
        NetworkOptions, Packet, QoS, Transport,
    };

    use super::{BrokerClientFactory, BrokerEvent, BrokerOptions, BrokerParams, BrokerSession};
    use crate::error::AdapterError;

    pub struct RumqttcFactory;

    impl BrokerClientFactory for RumqttcFactory {
        fn name(&self) -> &str {
            "rumqttc"
        }

        fn connect(
            &self,
            url: &str,
            params: &BrokerParams,
            options: &BrokerOptions,
        ) -> Result<Box<dyn BrokerSession>, AdapterError> {
            let client_id = format!(
                "{}-{:x}",
                options.client_id_prefix,
                chrono::Utc::now().timestamp_millis()
            );
            let mut opts = MqttOptions::new(client_id, url, params.port);
            opts.set_transport(if params.tls {
                Transport::wss_with_default_config()
            } else {
                Transport::Ws
            });
            opts.set_keep_alive(options.keep_alive);
            opts.set_clean_session(options.clean_session);
            if let Some(c) = &params.credentials {
                opts.set_credentials(c.username.clone(), c.password.clone().unwrap_or_default());
            }
            let (client, mut eventloop) = AsyncClient::new(opts, 16);
            let mut net = NetworkOptions::new();
            net.set_connection_timeout(options.connect_timeout.as_secs().max(1));
            eventloop.set_network_options(net);
            Ok(Box::new(RumqttcSession {
                client,
                eventloop,
                connected: false,
            }))
        }
    }

    struct RumqttcSession {
        client: AsyncClient,
        eventloop: EventLoop,
        connected: bool,
    }

    fn qos(level: u8) -> QoS {
        match level {
            0 => QoS::AtMostOnce,
            1 => QoS::AtLeastOnce,
            _ => QoS::ExactlyOnce,
        }
    }

    fn refused(code: ConnectReturnCode) -> AdapterError {
        match code {
            ConnectReturnCode::BadUserNamePassword | ConnectReturnCode::NotAuthorized => {
                AdapterError::AuthFailed(format!("{code:?}"))
            }
            other => AdapterError::ConnectFailed(format!("connection refused: {other:?}")),
        }
    }

    impl BrokerSession for RumqttcSession {
        fn subscribe<'a>(
            &'a mut self,
            topic: &'a str,
            level: u8,
        ) -> BoxFuture<'a, Result<(), AdapterError>> {
            Box::pin(async move {
                self.client
                    .subscribe(topic, qos(level))
                    .await
                    .map_err(|e| AdapterError::StreamClosed(e.to_string()))
            })
        }

        fn next_event(&mut self) -> BoxFuture<'_, BrokerEvent> {
            Box::pin(async move {
                loop {
                    match self.eventloop.poll().await {
                        Ok(Event::Incoming(Packet::ConnAck(_))) => {
                            self.connected = true;
                            return BrokerEvent::Connected;
                        }
                        Ok(Event::Incoming(Packet::Publish(p))) => {
                            return BrokerEvent::Message(p.payload.to_vec())
                        }
                        Ok(Event::Incoming(Packet::Disconnect)) => return BrokerEvent::Closed,
                        Ok(_) => continue,
                        Err(ConnectionError::ConnectionRefused(code)) => {
                            return BrokerEvent::Error(refused(code))
                        }
                        Err(err) if self.connected => {
                            return BrokerEvent::Error(AdapterError::StreamClosed(err.to_string()))
                        }
                        Err(err) => {
                            return BrokerEvent::Error(AdapterError::ConnectFailed(err.to_string()))
                        }
                    }
                }
            })
        }

        fn close(&mut self) -> BoxFuture<'_, ()> {
            Box::pin(async move {
                let _ = self.client.disconnect().await;
            })
        }
    }
}
