//! Local serial device adapter.
//!
//! `serialport` is blocking, so the read loop runs on the runtime's blocking pool and
//! polls the sink's cancel flag between reads. Read timeouts are expected and ignored.

use std::io::Read;
use std::time::Duration;

use super::file::LineFramer;
use super::{AdapterEvent, EventSink};
use crate::data::sample::SampleParser;
use crate::error::AdapterError;

pub const DEFAULT_BAUD_RATE: u32 = 115_200;
const READ_TIMEOUT: Duration = Duration::from_millis(200);

/// Serial ports currently visible on this machine.
pub fn available_ports() -> Vec<String> {
    serialport::available_ports()
        .map(|ports| ports.into_iter().map(|p| p.port_name).collect())
        .unwrap_or_default()
}

pub async fn run(path: String, baud_rate: u32, parser: SampleParser, sink: EventSink) {
    let source = sink.source().clone();
    let joined = tokio::task::spawn_blocking(move || read_port(&path, baud_rate, &parser, &sink)).await;
    if let Err(err) = joined {
        if !err.is_cancelled() {
            tracing::error!(%source, %err, "device reader panicked");
        }
    }
}

fn read_port(path: &str, baud_rate: u32, parser: &SampleParser, sink: &EventSink) {
    let mut port = match serialport::new(path, baud_rate).timeout(READ_TIMEOUT).open() {
        Ok(port) => port,
        Err(err) => {
            tracing::warn!(source = %sink.source(), path, %err, "cannot open device");
            sink.send(AdapterEvent::Failed(AdapterError::ConnectFailed(format!("{path}: {err}"))));
            return;
        }
    };
    tracing::info!(source = %sink.source(), path, baud_rate, "device open");
    sink.send(AdapterEvent::Opened);
    sink.send(AdapterEvent::Label(path.to_string()));

    let mut framer = LineFramer::new();
    let mut buf = [0u8; 4096];
    while !sink.is_cancelled() {
        match port.read(&mut buf) {
            Ok(0) => {
                sink.send(AdapterEvent::Failed(AdapterError::StreamClosed(
                    "device returned end of stream".into(),
                )));
                return;
            }
            Ok(n) => {
                let samples: Vec<_> = framer
                    .push(&buf[..n])
                    .iter()
                    .filter_map(|line| sink.decode_line(parser, line))
                    .collect();
                if !samples.is_empty() && !sink.send(AdapterEvent::Samples(samples)) {
                    return;
                }
            }
            Err(err) if err.kind() == std::io::ErrorKind::TimedOut => continue,
            Err(err) if err.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(err) => {
                tracing::warn!(source = %sink.source(), path, %err, "device read failed");
                sink.send(AdapterEvent::Failed(AdapterError::StreamClosed(err.to_string())));
                return;
            }
        }
    }
}
