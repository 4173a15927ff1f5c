use chrono::{Duration, TimeZone, Utc};
use magscope::{Sample, SampleStore, StoreLimits};

fn sample_at(ms: i64) -> Sample {
    let instant = Utc.timestamp_millis_opt(1_700_000_000_000).unwrap() + Duration::milliseconds(ms);
    Sample {
        ts: instant.to_rfc3339(),
        instant,
        x: ms as f64,
        y: 0.0,
        z: 0.0,
        temperature: None,
    }
}

#[test]
fn capacity_keeps_most_recent_samples() {
    let mut store = SampleStore::new();
    for i in 0..50_100 {
        store.insert(sample_at(i));
    }
    assert_eq!(store.len(), 50_000);
    // oldest 100 evicted
    assert_eq!(store.iter().last().unwrap().x, 100.0);
    assert_eq!(store.iter().next().unwrap().x, 50_099.0);
    assert_eq!(store.plot_window().len(), 400);
    assert_eq!(store.history_window().len(), 500);
}

#[test]
fn late_samples_are_placed_by_instant() {
    let mut store = SampleStore::with_limits(StoreLimits {
        capacity: 4,
        plot_window: 3,
        history_window: 2,
    });
    for ms in [10, 30, 20, 40, 5] {
        store.insert(sample_at(ms));
    }
    // 5 arrived last but is the oldest, so it is the one evicted
    let order: Vec<f64> = store.iter().map(|s| s.x).collect();
    assert_eq!(order, [40.0, 30.0, 20.0, 10.0]);

    let plot: Vec<f64> = store.plot_window().iter().map(|s| s.x).collect();
    assert_eq!(plot, [20.0, 30.0, 40.0]);
    let history: Vec<f64> = store.history_window().iter().map(|s| s.x).collect();
    assert_eq!(history, [40.0, 30.0]);
}

#[test]
fn batch_and_single_inserts_agree() {
    let arrivals = [7, 3, 3, 9, 1, 12, 9, 4];
    let mut one_by_one = SampleStore::new();
    let mut batched = SampleStore::new();
    for ms in arrivals {
        one_by_one.insert(sample_at(ms));
    }
    batched.insert_batch(arrivals.iter().map(|ms| sample_at(*ms)));
    let a: Vec<_> = one_by_one.iter().map(|s| s.instant).collect();
    let b: Vec<_> = batched.iter().map(|s| s.instant).collect();
    assert_eq!(a, b);
}

#[test]
fn first_batch_into_empty_store_is_sorted() {
    let mut store = SampleStore::new();
    store.insert_batch([5, 3, 9, 1].map(sample_at));
    let newest_first: Vec<f64> = store.iter().map(|s| s.x).collect();
    assert_eq!(newest_first, [9.0, 5.0, 3.0, 1.0]);
    let plot: Vec<f64> = store.plot_window().iter().map(|s| s.x).collect();
    assert_eq!(plot, [1.0, 3.0, 5.0, 9.0]);
}

fn assert_non_increasing(store: &SampleStore) {
    let instants: Vec<_> = store.iter().map(|s| s.instant).collect();
    for pair in instants.windows(2) {
        assert!(pair[0] >= pair[1], "{:?} before {:?}", pair[0], pair[1]);
    }
}

#[test]
fn mixed_inserts_stay_ordered_and_match_one_by_one() {
    let limits = StoreLimits {
        capacity: 64,
        plot_window: 16,
        history_window: 32,
    };
    let mut mixed = SampleStore::with_limits(limits);
    let mut one_by_one = SampleStore::with_limits(limits);

    // deterministic LCG so failures reproduce
    let mut seed: u64 = 0x5eed;
    let mut next = move || {
        seed = seed.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1_442_695_040_888_963_407);
        (seed >> 33) as i64
    };

    for round in 0..40 {
        let len = if round == 0 { 25 } else { (next() % 30) as usize };
        let ms: Vec<i64> = (0..len).map(|_| next() % 500).collect();
        if round % 3 == 1 {
            for v in &ms {
                mixed.insert(sample_at(*v));
            }
        } else {
            mixed.insert_batch(ms.iter().map(|v| sample_at(*v)));
        }
        for v in &ms {
            one_by_one.insert(sample_at(*v));
        }
        assert_non_increasing(&mixed);
        assert!(mixed.len() <= limits.capacity);
    }

    assert_eq!(mixed.len(), limits.capacity);
    let a: Vec<_> = mixed.iter().map(|s| s.instant).collect();
    let b: Vec<_> = one_by_one.iter().map(|s| s.instant).collect();
    assert_eq!(a, b);
}

#[test]
fn batch_crossing_capacity_keeps_newest() {
    let mut store = SampleStore::with_limits(StoreLimits {
        capacity: 5,
        plot_window: 5,
        history_window: 5,
    });
    store.insert_batch([40, 10, 30].map(sample_at));
    store.insert_batch([5, 50, 20, 60, 35].map(sample_at));
    assert_non_increasing(&store);
    let kept: Vec<f64> = store.iter().map(|s| s.x).collect();
    assert_eq!(kept, [60.0, 50.0, 40.0, 35.0, 30.0]);
}
