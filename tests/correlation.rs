// tests/correlation.rs
use chrono::NaiveDate;
use ticker_sentiment_pipeline::analysis::analyze;
use ticker_sentiment_pipeline::store::SqliteStore;
use ticker_sentiment_pipeline::{CorrelationParams, CorrelationStatus, DailyRow, DailyStore, Field};

fn d(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
}

fn row(day: u32, price: f64, sentiment: Option<f64>) -> DailyRow {
    DailyRow {
        ticker: "ABC".into(),
        date: d(day),
        adj_close: Field::Set(price),
        sentiment_score: Field::Set(sentiment),
    }
}

fn store_with(rows: &[DailyRow]) -> SqliteStore {
    let mut s = SqliteStore::open_in_memory().unwrap();
    s.ensure_schema().unwrap();
    s.upsert(rows).unwrap();
    s
}

#[test]
fn three_day_example_has_one_pair() {
    let s = store_with(&[
        row(1, 100.0, Some(0.2)),
        row(2, 110.0, Some(-0.1)),
        row(3, 99.0, None),
    ]);
    let r = analyze(&s, "ABC", CorrelationParams::default()).unwrap();
    assert_eq!(r.sample_size, 1);
    assert_eq!(r.status, CorrelationStatus::InsufficientData);
    assert_eq!(r.coefficient, None);
    assert!(!r.is_reliable());
}

#[test]
fn zero_price_never_yields_infinity() {
    let s = store_with(&[
        row(1, 5.0, Some(0.1)),
        row(2, 0.0, Some(0.9)),
        row(3, 4.0, Some(-0.3)),
        row(4, 6.0, Some(0.4)),
        row(5, 3.0, Some(0.2)),
    ]);
    let r = analyze(&s, "ABC", CorrelationParams::default()).unwrap();
    // i=1 excluded (zero base); i=2 and i=3 survive.
    assert_eq!(r.sample_size, 2);
    assert_eq!(r.status, CorrelationStatus::Computed);
    let c = r.coefficient.unwrap();
    assert!(c.is_finite() && (-1.0..=1.0).contains(&c));
}

#[test]
fn negative_relationship_is_detected() {
    // Lagged sentiment up, next-day change down.
    let s = store_with(&[
        row(1, 100.0, Some(0.1)),
        row(2, 100.0, Some(0.5)),
        row(3, 99.0, Some(0.9)),
        row(4, 95.0, Some(0.0)),
        row(5, 85.0, None),
    ]);
    let r = analyze(&s, "ABC", CorrelationParams::default()).unwrap();
    assert_eq!(r.sample_size, 3);
    assert!(r.coefficient.unwrap() < -0.9, "{r}");
}

#[test]
fn unknown_ticker_is_insufficient_not_an_error() {
    let s = store_with(&[row(1, 1.0, Some(0.1))]);
    let r = analyze(&s, "NOPE", CorrelationParams::default()).unwrap();
    assert_eq!(r.sample_size, 0);
    assert_eq!(r.status, CorrelationStatus::InsufficientData);
}
