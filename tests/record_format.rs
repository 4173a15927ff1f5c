use magscope::data::export::{to_jsonl_bytes, export_file_name};
use magscope::data::sample::{SampleParser, TemperatureAliases};
use magscope::{parse, MalformedRecord, SampleStore};

#[test]
fn malformed_records_name_the_problem() {
    assert!(matches!(parse("{oops"), Err(MalformedRecord::InvalidJson(_))));
    assert_eq!(parse("[1,2]"), Err(MalformedRecord::NotAnObject));
    assert_eq!(
        parse(r#"{"ts":5,"x":1,"y":2,"z":3}"#),
        Err(MalformedRecord::TimestampNotString)
    );
    assert_eq!(
        parse(r#"{"ts":"2024-01-01T00:00:00Z","x":1,"y":"2","z":3}"#),
        Err(MalformedRecord::ChannelNotNumber("y"))
    );
    assert!(matches!(
        parse(r#"{"ts":"yesterday","x":1,"y":2,"z":3}"#),
        Err(MalformedRecord::InvalidTimestamp(_))
    ));
}

#[test]
fn custom_alias_order() {
    let parser = SampleParser::new(TemperatureAliases::new(["temp", "rt"]));
    let s = parser
        .parse(r#"{"ts":"2024-01-01T00:00:00Z","x":1,"y":2,"z":3,"rt":1.5,"temp":9}"#)
        .unwrap();
    assert_eq!(s.temperature, Some(9.0));
}

#[test]
fn export_reparses_to_the_same_store() {
    let mut store = SampleStore::new();
    for line in [
        r#"{"ts":"2024-01-01T00:00:01Z","x":1.00049,"y":2,"z":3,"T":20.12345}"#,
        r#"{"ts":"2024-01-01T00:00:00Z","x":-1,"y":0.5,"z":0}"#,
    ] {
        store.insert(parse(line).unwrap());
    }
    let bytes = to_jsonl_bytes(&store);
    let text = String::from_utf8(bytes).unwrap();
    assert!(text.ends_with('\n'));
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(
        lines,
        [
            r#"{"ts":"2024-01-01T00:00:01Z","x":1.0,"y":2.0,"z":3.0,"temp":20.123}"#,
            r#"{"ts":"2024-01-01T00:00:00Z","x":-1.0,"y":0.5,"z":0.0}"#,
        ]
    );

    let mut again = SampleStore::new();
    for line in &lines {
        again.insert(parse(*line).unwrap());
    }
    assert_eq!(to_jsonl_bytes(&again), text.as_bytes());
    assert_eq!(export_file_name("Bench sensor", "src-1"), "Bench_sensor.jsonl");
}
