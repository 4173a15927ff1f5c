use std::sync::mpsc::{channel, Receiver};

use magscope::adapters::file::{ingest_reader, FileOptions, PROGRESS_EVERY};
use magscope::adapters::{AdapterEvent, AdapterMessage, EventSink};
use magscope::{SampleParser, SourceId};

fn sink() -> (EventSink, Receiver<AdapterMessage>) {
    let (tx, rx) = channel();
    (EventSink::new(tx, SourceId::from("file-test"), 3), rx)
}

fn collect_samples(rx: &Receiver<AdapterMessage>) -> Vec<magscope::Sample> {
    rx.try_iter()
        .filter_map(|m| match m.event {
            AdapterEvent::Samples(s) => Some(s),
            _ => None,
        })
        .flatten()
        .collect()
}

#[tokio::test]
async fn malformed_lines_are_skipped() {
    let input = b"{\"ts\":\"2024-01-01T00:00:00Z\",\"x\":1,\"y\":2,\"z\":3,\"t\":7}\n\
                  not json at all\n\
                  {\"ts\":\"2024-01-01T00:00:01Z\",\"x\":4,\"y\":5,\"z\":6,\"t\":7}";
    let (sink, rx) = sink();
    let summary = ingest_reader(&input[..], FileOptions::default(), &SampleParser::default(), &sink)
        .await
        .unwrap();
    assert_eq!(summary.lines, 3);
    assert_eq!(summary.samples, 2);
    assert_eq!(summary.malformed, 1);

    let samples = collect_samples(&rx);
    assert_eq!(samples.len(), 2);
    assert!(samples.iter().all(|s| s.temperature == Some(7.0)));
}

#[tokio::test]
async fn header_skip_ignores_blank_lines() {
    let mut input = String::from("\n# header\n\ncolumns: ts,x,y,z\n");
    for i in 0..3 {
        input.push_str(&format!(
            "{{\"ts\":\"2024-01-01T00:00:0{i}Z\",\"x\":{i},\"y\":0,\"z\":0}}\r\n"
        ));
    }
    let (sink, rx) = sink();
    let opts = FileOptions {
        skip_lines: 2,
        ..FileOptions::default()
    };
    let summary = ingest_reader(input.as_bytes(), opts, &SampleParser::default(), &sink)
        .await
        .unwrap();
    assert_eq!(summary.skipped_header, 2);
    assert_eq!(summary.samples, 3);
    assert_eq!(collect_samples(&rx).len(), 3);
}

#[tokio::test]
async fn lines_split_across_chunks_and_batches() {
    let mut input = String::new();
    for i in 0..2_500u32 {
        input.push_str(&format!(
            "{{\"ts\":\"2024-01-01T00:{:02}:{:02}Z\",\"x\":{i},\"y\":1,\"z\":2}}\n",
            (i / 60) % 60,
            i % 60
        ));
    }
    let (sink, rx) = sink();
    let opts = FileOptions {
        skip_lines: 0,
        batch_size: 500,
        chunk_size: 37,
    };
    let summary = ingest_reader(input.as_bytes(), opts, &SampleParser::default(), &sink)
        .await
        .unwrap();
    assert_eq!(summary.samples, 2_500);

    let mut batches = Vec::new();
    let mut progress = Vec::new();
    for msg in rx.try_iter() {
        assert_eq!(msg.generation, 3);
        match msg.event {
            AdapterEvent::Samples(s) => batches.push(s.len()),
            AdapterEvent::Progress { lines } => progress.push(lines),
            other => panic!("unexpected event {other:?}"),
        }
    }
    assert_eq!(batches, [500; 5]);
    assert_eq!(progress, [PROGRESS_EVERY, 2 * PROGRESS_EVERY]);
}

#[tokio::test]
async fn run_reports_missing_file() {
    let (sink, rx) = sink();
    let dir = tempfile::tempdir().unwrap();
    magscope::adapters::file::run(
        dir.path().join("absent.jsonl"),
        FileOptions::default(),
        SampleParser::default(),
        sink,
    )
    .await;
    let events: Vec<_> = rx.try_iter().map(|m| m.event).collect();
    assert!(matches!(
        events.as_slice(),
        [AdapterEvent::Failed(magscope::AdapterError::ConnectFailed(_))]
    ));
}
