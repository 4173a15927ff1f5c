use std::collections::VecDeque;
use std::sync::mpsc::channel;
use std::sync::{Arc, Mutex};

use futures_util::future::BoxFuture;

use magscope::adapters::broker::{
    self, BrokerClientFactory, BrokerClientResolver, BrokerEvent, BrokerOptions, BrokerParams,
    BrokerSession,
};
use magscope::adapters::{AdapterEvent, EventSink};
use magscope::{AdapterError, ConfigError, SampleParser, SourceId};

#[derive(Default)]
struct Log {
    urls: Vec<String>,
    subscriptions: Vec<(String, u8)>,
    closed: bool,
}

struct ScriptedSession {
    events: VecDeque<BrokerEvent>,
    log: Arc<Mutex<Log>>,
}

impl BrokerSession for ScriptedSession {
    fn subscribe<'a>(
        &'a mut self,
        topic: &'a str,
        qos: u8,
    ) -> BoxFuture<'a, Result<(), AdapterError>> {
        self.log
            .lock()
            .unwrap()
            .subscriptions
            .push((topic.to_string(), qos));
        Box::pin(async { Ok(()) })
    }

    fn next_event(&mut self) -> BoxFuture<'_, BrokerEvent> {
        let event = self.events.pop_front().unwrap_or(BrokerEvent::Closed);
        Box::pin(async move { event })
    }

    fn close(&mut self) -> BoxFuture<'_, ()> {
        self.log.lock().unwrap().closed = true;
        Box::pin(async {})
    }
}

struct ScriptedClient {
    script: Mutex<Option<Vec<BrokerEvent>>>,
    log: Arc<Mutex<Log>>,
}

impl ScriptedClient {
    fn new(script: Vec<BrokerEvent>) -> (Arc<Self>, Arc<Mutex<Log>>) {
        let log = Arc::new(Mutex::new(Log::default()));
        let client = Arc::new(Self {
            script: Mutex::new(Some(script)),
            log: log.clone(),
        });
        (client, log)
    }
}

impl BrokerClientFactory for ScriptedClient {
    fn name(&self) -> &str {
        "scripted"
    }

    fn connect(
        &self,
        url: &str,
        _params: &BrokerParams,
        _options: &BrokerOptions,
    ) -> Result<Box<dyn BrokerSession>, AdapterError> {
        self.log.lock().unwrap().urls.push(url.to_string());
        let events = self.script.lock().unwrap().take().unwrap_or_default();
        Ok(Box::new(ScriptedSession {
            events: events.into(),
            log: self.log.clone(),
        }))
    }
}

fn params() -> BrokerParams {
    BrokerParams {
        host: "broker.local".into(),
        ..BrokerParams::default()
    }
}

fn record(secs: u32) -> Vec<u8> {
    format!(r#" {{"ts":"2024-01-01T00:00:{secs:02}Z","x":1,"y":2,"z":3}} "#).into_bytes()
}

async fn run_with(resolver: BrokerClientResolver) -> Vec<AdapterEvent> {
    let (tx, rx) = channel();
    let sink = EventSink::new(tx, SourceId::from("mqtt-test"), 1);
    broker::run(
        params(),
        BrokerOptions::default(),
        Arc::new(resolver),
        SampleParser::default(),
        sink,
    )
    .await;
    rx.try_iter().map(|m| m.event).collect()
}

#[tokio::test]
async fn one_payload_is_one_record() {
    let (client, log) = ScriptedClient::new(vec![
        BrokerEvent::Connected,
        BrokerEvent::Message(record(0)),
        BrokerEvent::Message(b"garbage".to_vec()),
        BrokerEvent::Connected,
        BrokerEvent::Message(record(1)),
        BrokerEvent::Closed,
    ]);
    let events = run_with(BrokerClientResolver::empty(false).with_bundled(client)).await;

    match events.as_slice() {
        [AdapterEvent::Opened, AdapterEvent::Label(label), AdapterEvent::Samples(a), AdapterEvent::Samples(b), AdapterEvent::Failed(AdapterError::StreamClosed(_))] =>
        {
            assert_eq!(label, "broker.local:8081/mag-usb");
            assert_eq!((a.len(), b.len()), (1, 1));
        }
        other => panic!("unexpected events: {other:?}"),
    }
    let log = log.lock().unwrap();
    assert_eq!(log.urls, ["ws://broker.local:8081/mqtt"]);
    // a reconnect does not subscribe twice
    assert_eq!(log.subscriptions, [("mag-usb".to_string(), 0)]);
    assert!(log.closed);
}

#[tokio::test]
async fn auth_failure_ends_the_adapter() {
    let (client, _) = ScriptedClient::new(vec![BrokerEvent::Error(AdapterError::AuthFailed(
        "bad credentials".into(),
    ))]);
    let events = run_with(BrokerClientResolver::empty(false).with_bundled(client)).await;
    assert!(matches!(
        events.as_slice(),
        [AdapterEvent::Failed(AdapterError::AuthFailed(_))]
    ));
}

#[tokio::test]
async fn strict_offline_never_uses_the_fallback() {
    let (client, log) = ScriptedClient::new(vec![BrokerEvent::Connected]);
    let events = run_with(BrokerClientResolver::empty(true).with_fallback(client.clone())).await;
    assert!(matches!(
        events.as_slice(),
        [AdapterEvent::Failed(AdapterError::Config(ConfigError::StrictOffline))]
    ));
    assert!(log.lock().unwrap().urls.is_empty());

    let events = run_with(BrokerClientResolver::empty(false).with_fallback(client)).await;
    assert!(matches!(events.first(), Some(AdapterEvent::Opened)));
}

#[tokio::test]
async fn no_client_at_all() {
    let events = run_with(BrokerClientResolver::empty(false)).await;
    assert!(matches!(
        events.as_slice(),
        [AdapterEvent::Failed(AdapterError::Config(ConfigError::ClientUnavailable))]
    ));
}
