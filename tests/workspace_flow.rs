use std::time::{Duration, Instant};

use magscope::adapters::broker::BrokerClientResolver;
use magscope::source::NEW_SOURCE_LABEL;
use magscope::{
    AppConfig, ConnectRequest, ConnectionState, EventController, EventFilter, EventKind,
    SourceId, Workspace,
};

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .enable_all()
        .build()
        .unwrap()
}

fn workspace(rt: &tokio::runtime::Runtime) -> Workspace {
    Workspace::new(
        &AppConfig::default(),
        rt.handle().clone(),
        BrokerClientResolver::empty(false),
        EventController::new(),
    )
}

/// Drain messages until `done` holds for the source or the deadline passes.
fn pump(ws: &mut Workspace, id: &SourceId, done: impl Fn(&ConnectionState) -> bool) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while Instant::now() < deadline {
        ws.wait(Duration::from_millis(50));
        if ws.source(id).is_some_and(|s| done(s.state())) {
            return;
        }
    }
    panic!("timed out; state is {:?}", ws.source(id).map(|s| s.state().clone()));
}

#[test]
fn file_load_streams_renames_and_spawns_an_idle_pane() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bench run.jsonl");
    let mut body = String::from("ts,x,y,z\n");
    for i in 0..5 {
        body.push_str(&format!(
            "{{\"ts\":\"2024-01-01T00:00:0{i}Z\",\"x\":{i},\"y\":0,\"z\":0,\"temp\":20}}\n"
        ));
    }
    std::fs::write(&path, body).unwrap();

    let rt = runtime();
    let mut ws = workspace(&rt);
    let first = ws.add_idle(true);
    let events = ws.events().subscribe(EventFilter::only(
        EventKind::FIRST_SAMPLE | EventKind::RENAMED,
    ));

    ws.connect(&first, ConnectRequest::File { path, skip_lines: 1 })
        .unwrap();
    assert_eq!(ws.source(&first).unwrap().state(), &ConnectionState::Connecting);
    pump(&mut ws, &first, |s| *s == ConnectionState::Closed);

    let source = ws.source(&first).unwrap();
    assert_eq!(source.store().len(), 5);
    assert_eq!(source.label(), "bench run.jsonl");
    assert!(source.closable());
    assert_eq!(source.export_file_name(), "bench_run.jsonl.jsonl");
    let exported = String::from_utf8(source.export_history()).unwrap();
    assert_eq!(exported.lines().count(), 5);
    assert!(exported.starts_with(r#"{"ts":"2024-01-01T00:00:04Z""#));

    // exactly one fresh pane, focus unchanged
    assert_eq!(ws.len(), 2);
    assert_eq!(ws.sources()[1].label(), NEW_SOURCE_LABEL);
    assert_eq!(ws.active_id(), Some(&first));
    assert!(ws.has_data());

    let kinds: Vec<EventKind> = events.try_iter().map(|e| e.kinds).collect();
    assert_eq!(kinds, [EventKind::FIRST_SAMPLE, EventKind::RENAMED]);
}

#[test]
fn reconnect_drops_the_previous_adapter() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("missing.jsonl");
    let rt = runtime();
    let mut ws = workspace(&rt);
    let id = ws.add_idle(true);

    let g1 = ws
        .connect(&id, ConnectRequest::File { path: missing.clone(), skip_lines: 0 })
        .unwrap();
    let g2 = ws
        .connect(&id, ConnectRequest::File { path: missing, skip_lines: 0 })
        .unwrap();
    assert!(g2 > g1);
    pump(&mut ws, &id, |s| matches!(s, ConnectionState::Error(_)));
    assert_eq!(ws.source(&id).unwrap().generation(), g2);
    assert!(ws.source(&id).unwrap().store().is_empty());
    assert_eq!(ws.len(), 1);
}

#[test]
fn invalid_request_moves_source_to_error() {
    let rt = runtime();
    let mut ws = workspace(&rt);
    let id = ws.add_idle(true);
    let states = ws.events().subscribe(EventFilter::only(EventKind::STATE_CHANGED));
    ws.fail(&id, "enter a broker host");
    assert_eq!(
        ws.source(&id).unwrap().state(),
        &ConnectionState::Error("enter a broker host".into())
    );
    assert_eq!(states.try_iter().count(), 1);
    assert!(!ws.has_data());
}

#[test]
fn unknown_source_cannot_connect() {
    let rt = runtime();
    let mut ws = workspace(&rt);
    ws.add_idle(true);
    assert!(ws
        .connect(
            &SourceId::from("nope"),
            ConnectRequest::Socket {
                url: "ws://localhost:1".into()
            }
        )
        .is_none());
}

#[test]
fn disconnect_while_loading_closes_the_source() {
    let dir = tempfile::tempdir().unwrap();
    let rt = runtime();
    let mut ws = workspace(&rt);
    let id = ws.add_idle(true);
    let states = ws.events().subscribe(EventFilter::only(EventKind::STATE_CHANGED));

    let generation = ws
        .connect(
            &id,
            ConnectRequest::File {
                path: dir.path().join("missing.jsonl"),
                skip_lines: 0,
            },
        )
        .unwrap();
    assert_eq!(ws.source(&id).unwrap().progress(), Some(0));

    ws.disconnect(&id);
    let source = ws.source(&id).unwrap();
    assert_eq!(source.state(), &ConnectionState::Closed);
    assert!(!source.state().is_active());
    assert_eq!(source.progress(), None);
    assert!(source.generation() > generation);

    // whatever the cancelled adapter managed to send is stale
    ws.wait(Duration::from_millis(200));
    assert_eq!(ws.source(&id).unwrap().state(), &ConnectionState::Closed);

    let seen: Vec<ConnectionState> = states.try_iter().filter_map(|e| e.state).collect();
    assert_eq!(seen, [ConnectionState::Connecting, ConnectionState::Closed]);

    // a second disconnect changes nothing
    ws.disconnect(&id);
    assert_eq!(states.try_iter().count(), 0);
}
