use magscope::color_scheme::Theme;
use magscope::persistence::{JsonFileStore, PaneLayoutSerde, RecentKind, StateStore};

fn pane(id: &str, title: &str) -> PaneLayoutSerde {
    PaneLayoutSerde {
        id: id.into(),
        title: title.into(),
        left_width: Some(320.0),
        collapsed: false,
    }
}

#[test]
fn state_survives_reopening() {
    let dir = tempfile::tempdir().unwrap();
    {
        let store = JsonFileStore::in_dir(Some(dir.path())).unwrap();
        let mut state = StateStore::new(Box::new(store));
        state.save_theme(Theme::Light).unwrap();
        state
            .save_panes(&[pane("a", "log.jsonl"), pane("b", "New Source")])
            .unwrap();
        state.push_recent(RecentKind::SocketUrl, "ws://one").unwrap();
        state.push_recent(RecentKind::SocketUrl, "ws://two").unwrap();
        state.push_recent(RecentKind::SocketUrl, "ws://one").unwrap();
        state.set_strict_offline(true).unwrap();
    }

    let store = JsonFileStore::in_dir(Some(dir.path())).unwrap();
    assert!(store.path().ends_with(JsonFileStore::FILE_NAME));
    let state = StateStore::new(Box::new(store));
    assert_eq!(state.load_theme(), Some(Theme::Light));
    let panes = state.load_panes();
    assert_eq!(panes.len(), 2);
    assert_eq!(panes[0].title, "log.jsonl");
    assert_eq!(panes[0].left_width, Some(320.0));
    assert_eq!(state.recent(RecentKind::SocketUrl), ["ws://one", "ws://two"]);
    assert_eq!(state.strict_offline(), Some(true));
}

#[test]
fn corrupt_file_starts_empty() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(JsonFileStore::FILE_NAME);
    std::fs::write(&path, "{ this is not json").unwrap();
    let mut state = StateStore::new(Box::new(JsonFileStore::open(&path)));
    assert!(state.load_panes().is_empty());
    assert_eq!(state.load_theme(), None);

    // the next write replaces the broken file
    state.save_theme(Theme::Dark).unwrap();
    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.contains("\"dark\""));
}

#[test]
fn recent_lists_are_capped() {
    let mut state = StateStore::in_memory().with_recent_cap(3);
    for host in ["a", "b", "c", "d"] {
        state.push_recent(RecentKind::BrokerHost, host).unwrap();
    }
    assert_eq!(state.recent(RecentKind::BrokerHost), ["d", "c", "b"]);
    assert!(state.push_recent(RecentKind::BrokerTopic, "   ").unwrap().is_empty());
}
