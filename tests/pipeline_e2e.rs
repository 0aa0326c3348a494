// tests/pipeline_e2e.rs
mod common;

use common::{at, d, StubHeadlines, StubPrices, TableScorer};
use ticker_sentiment_pipeline::store::SqliteStore;
use ticker_sentiment_pipeline::{CorrelationParams, CorrelationStatus, DailyStore, Pipeline};

fn open_store(dir: &std::path::Path) -> SqliteStore {
    let store = SqliteStore::open(dir.join("db").join("sentiment.db")).unwrap();
    store.ensure_schema().unwrap();
    store
}

fn scorer() -> TableScorer {
    TableScorer::default()
        .with("ABC beats estimates", 0.5)
        .with("ABC raises outlook", 0.3)
        .with("ABC faces probe", -0.2)
}

#[tokio::test]
async fn abc_two_days_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let results = dir.path().join("results");

    let headlines = StubHeadlines::default().with(
        "ABC",
        &[
            (at(d(1, 2), 9, 30), "ABC beats estimates"),
            (at(d(1, 2), 14, 0), "ABC raises outlook"),
            (at(d(1, 3), 8, 15), "ABC faces probe"),
        ],
    );
    let prices = StubPrices::default().with("ABC", &[(d(1, 2), 50.00), (d(1, 3), 51.00)]);

    let mut pipeline = Pipeline::new(
        Box::new(headlines),
        Box::new(prices),
        Box::new(scorer()),
        Box::new(open_store(dir.path())),
        CorrelationParams::default(),
    )
    .with_results_dir(&results)
    .with_today(d(1, 3));

    let summary = pipeline.run(&["ABC".to_string()]).await;
    assert_eq!(summary.succeeded(), 1);
    assert_eq!(summary.headlines_scored(), 3);
    assert_eq!(summary.rows_upserted(), 2);

    let rows = pipeline.store().query("ABC", None, None).unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].date, d(1, 2));
    assert_eq!(rows[0].adj_close, Some(50.0));
    assert!((rows[0].sentiment_score.unwrap() - 0.4).abs() < 1e-9);
    assert_eq!(rows[1].date, d(1, 3));
    assert_eq!(rows[1].adj_close, Some(51.0));
    assert!((rows[1].sentiment_score.unwrap() + 0.2).abs() < 1e-9);

    // Two rows leave no forward change once sentiment is lagged a day.
    let outcome = summary.outcome("ABC").unwrap();
    let corr = outcome.correlation.as_ref().unwrap();
    assert_eq!(corr.status, CorrelationStatus::InsufficientData);
    assert_eq!(corr.sample_size, 0);
    assert_eq!(corr.coefficient, None);

    let chart = outcome.chart.as_ref().unwrap();
    let csv = std::fs::read_to_string(chart).unwrap();
    assert!(csv.starts_with("date,adj_close,sentiment_score,sentiment_7d_avg"));
    assert!(csv.contains("2024-01-02,50.0000,0.400000,"));
}

#[tokio::test]
async fn rerun_is_idempotent_and_price_only_days_keep_sentiment() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("db").join("sentiment.db");

    let first_pass = || {
        let headlines = StubHeadlines::default().with(
            "ABC",
            &[
                (at(d(1, 2), 9, 30), "ABC beats estimates"),
                (at(d(1, 2), 14, 0), "ABC raises outlook"),
                (at(d(1, 3), 8, 15), "ABC faces probe"),
            ],
        );
        let prices = StubPrices::default().with("ABC", &[(d(1, 2), 50.00), (d(1, 3), 51.00)]);
        Pipeline::new(
            Box::new(headlines),
            Box::new(prices),
            Box::new(scorer()),
            Box::new(open_store(dir.path())),
            CorrelationParams::default(),
        )
        .with_today(d(1, 3))
    };

    first_pass().run(&["ABC".to_string()]).await;
    first_pass().run(&["ABC".to_string()]).await;
    let after_two = SqliteStore::open(&db).unwrap().query("ABC", None, None).unwrap();
    assert_eq!(after_two.len(), 2);

    // Later run: news only on the Jan-01 holiday, prices for three trading days.
    let headlines =
        StubHeadlines::default().with("ABC", &[(at(d(1, 1), 16, 0), "ABC beats estimates")]);
    let prices = StubPrices::default().with(
        "ABC",
        &[(d(1, 2), 50.50), (d(1, 3), 51.00), (d(1, 4), 52.00)],
    );
    let mut later = Pipeline::new(
        Box::new(headlines),
        Box::new(prices),
        Box::new(scorer()),
        Box::new(open_store(dir.path())),
        CorrelationParams::default(),
    )
    .with_today(d(1, 4));
    let summary = later.run(&["ABC".to_string()]).await;
    let outcome = summary.outcome("ABC").unwrap();
    assert!(outcome.is_done());
    assert_eq!(outcome.unmatched_sentiment_days, 1);
    assert_eq!(outcome.rows_upserted, 3);

    let rows = later.store().query("ABC", None, None).unwrap();
    assert_eq!(rows.len(), 3);
    // Prices refreshed, earlier sentiment untouched.
    assert_eq!(rows[0].adj_close, Some(50.5));
    assert!((rows[0].sentiment_score.unwrap() - 0.4).abs() < 1e-9);
    assert!((rows[1].sentiment_score.unwrap() + 0.2).abs() < 1e-9);
    assert_eq!(rows[2].adj_close, Some(52.0));
    assert_eq!(rows[2].sentiment_score, None);
}

#[tokio::test]
async fn weekend_sentiment_is_not_persisted() {
    let dir = tempfile::tempdir().unwrap();
    // 2024-01-06 is a Saturday.
    let headlines = StubHeadlines::default().with(
        "ABC",
        &[
            (at(d(1, 5), 9, 0), "ABC beats estimates"),
            (at(d(1, 6), 9, 0), "ABC faces probe"),
        ],
    );
    let prices = StubPrices::default().with("ABC", &[(d(1, 5), 10.0), (d(1, 8), 11.0)]);
    let mut pipeline = Pipeline::new(
        Box::new(headlines),
        Box::new(prices),
        Box::new(scorer()),
        Box::new(open_store(dir.path())),
        CorrelationParams::default(),
    )
    .with_today(d(1, 8));

    let summary = pipeline.run(&["ABC".to_string()]).await;
    let outcome = summary.outcome("ABC").unwrap();
    assert!(outcome.is_done());
    assert_eq!(outcome.sentiment_days, 2);
    assert_eq!(outcome.unmatched_sentiment_days, 1);

    let rows = pipeline.store().query("ABC", None, None).unwrap();
    let dates: Vec<_> = rows.iter().map(|r| r.date).collect();
    assert_eq!(dates, vec![d(1, 5), d(1, 8)]);
}
