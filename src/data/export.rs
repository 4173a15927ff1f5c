use std::io::Write;
use std::path::Path;

use crate::data::store::SampleStore;

/// Write every retained sample, most recent first, as one JSON object per line.
///
/// Numbers are rounded to 3 decimals and `temp` is only present when the sample has a
/// temperature. Every line, the last included, ends in `\n`.
pub fn write_jsonl<W: Write>(mut out: W, store: &SampleStore) -> std::io::Result<()> {
    for sample in store.iter() {
        serde_json::to_writer(&mut out, &sample.to_record())?;
        out.write_all(b"\n")?;
    }
    out.flush()
}

/// In-memory export of a store.
pub fn to_jsonl_bytes(store: &SampleStore) -> Vec<u8> {
    let mut buf = Vec::with_capacity(store.len() * 64);
    // Writing into a Vec cannot fail.
    let _ = write_jsonl(&mut buf, store);
    buf
}

pub fn save_jsonl<P: AsRef<Path>>(path: P, store: &SampleStore) -> std::io::Result<()> {
    let f = std::fs::File::create(path)?;
    write_jsonl(std::io::BufWriter::new(f), store)
}

/// Suggested download name: the label with whitespace runs collapsed to `_`, or the
/// fallback (the source id) for an empty label.
pub fn export_file_name(label: &str, fallback: &str) -> String {
    let stem = label.split_whitespace().collect::<Vec<_>>().join("_");
    let stem = if stem.is_empty() { fallback.to_string() } else { stem };
    format!("{stem}.jsonl")
}
