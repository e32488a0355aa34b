//! Backtest replay integration tests

mod common;

use chrono::NaiveDate;
use common::*;
use rust_decimal_macros::dec;
use std::path::Path;
use std::sync::Arc;
use tradedesk::backtest::{
    ensure_history, timeline, BacktestError, BacktestRunner, SummaryRecorder, SummaryReport,
    Timeframe,
};
use tradedesk::cli::load_market;
use tradedesk::clock::VirtualClock;
use tradedesk::config::Config;
use tradedesk::ledger::Ledger;
use tradedesk::risk::AccountRiskThresholds;

fn day_config() -> Config {
    let mut config = config(
        vec![go_long("go_long", dec!(20000), 9 * 60, 17 * 60, &[GOLD])],
        AccountRiskThresholds::default(),
    );
    config.engine.commission_per_lot = dec!(7);
    config
}

async fn replay_day(summary_path: Option<&Path>) -> SummaryReport {
    let config = day_config();
    let market = gold_market(&[
        ("2024-03-04 09:00:00", dec!(2000)),
        ("2024-03-04 12:00:00", dec!(2004)),
        ("2024-03-04 17:00:00", dec!(2008)),
    ]);
    let timestamps = timeline(
        at("2024-03-04 00:00:00"),
        at("2024-03-04 23:00:00"),
        Timeframe::H1,
    );

    let harness = Harness::new(&config, market, Ledger::in_memory(), "2024-03-04 00:00:00").await;
    let wall = Arc::new(VirtualClock::new(at("2025-01-01 12:00:00")));
    let mut recorder = SummaryRecorder::new(config.broker.deposit, wall);
    if let Some(path) = summary_path {
        recorder = recorder.with_path(path);
    }

    BacktestRunner::new(harness.engine, harness.clock, recorder, timestamps)
        .unwrap()
        .with_save_interval(6)
        .run()
        .await
        .unwrap()
}

#[tokio::test]
async fn test_backtest_summary() {
    let summary = replay_day(None).await;

    // 0.1 lot, 8.00 up, 0.70 commission
    assert_eq!(summary.total_profit, dec!(79.3));
    assert_eq!(summary.final_balance, dec!(10079.3));
    assert_eq!(summary.initial_deposit, dec!(10000));
    assert_eq!(summary.strategies["go_long"].trades, 1);
    assert_eq!(summary.strategies["go_long"].profit, dec!(79.3));
    assert_eq!(summary.start_time, Some(at("2024-03-04 00:00:00")));
    assert_eq!(summary.end_time, Some(at("2024-03-04 23:00:00")));
    assert_eq!(summary.last_trade_day, NaiveDate::from_ymd_opt(2024, 3, 4));
    assert_eq!(summary.duration.as_deref(), Some("00:00"));
}

#[tokio::test]
async fn test_backtest_is_deterministic() {
    let dir = tempfile::tempdir().unwrap();
    let first_path = dir.path().join("first.json");
    let second_path = dir.path().join("second.json");

    let first = replay_day(Some(&first_path)).await;
    let second = replay_day(Some(&second_path)).await;
    assert_eq!(first, second);

    let first_bytes = std::fs::read(&first_path).unwrap();
    let second_bytes = std::fs::read(&second_path).unwrap();
    assert_eq!(first_bytes, second_bytes);

    let saved: SummaryReport = serde_json::from_slice(&first_bytes).unwrap();
    assert_eq!(saved, first);
}

#[tokio::test]
async fn test_backtest_rejects_unordered_timeline() {
    let config = day_config();
    let market = gold_market(&[("2024-03-04 09:00:00", dec!(2000))]);
    let harness = Harness::new(&config, market, Ledger::in_memory(), "2024-03-04 00:00:00").await;
    let wall = Arc::new(VirtualClock::new(at("2025-01-01 12:00:00")));

    let result = BacktestRunner::new(
        harness.engine,
        harness.clock,
        SummaryRecorder::new(config.broker.deposit, wall),
        vec![at("2024-03-04 10:00:00"), at("2024-03-04 09:00:00")],
    );
    assert!(matches!(result, Err(BacktestError::UnorderedTimeline(_))));
}

#[test]
fn test_missing_history_aborts() {
    let market = gold_market(&[("2024-03-04 09:00:00", dec!(2000))]);
    assert!(ensure_history(&market, [GOLD]).is_ok());
    assert!(matches!(
        ensure_history(&market, [GOLD, SILVER]),
        Err(BacktestError::MissingData(symbol)) if symbol == SILVER
    ));
}

#[test]
fn test_load_market_from_csv_dir() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("XAUUSD.csv"),
        "time,open,high,low,close,volume\n\
         2024-03-04 09:00:00,2000,2003,1998,2001,120\n\
         2024-03-04 09:01:00,2001,2002,2000,2002,80\n",
    )
    .unwrap();

    let mut config = day_config();
    config.broker.data_dir = dir.path().to_path_buf();
    let market = load_market(&config).unwrap();
    assert!(market.has_symbol(GOLD));
    assert_eq!(
        market.bar_at(GOLD, at("2024-03-04 09:30:00")).unwrap().close,
        dec!(2002)
    );

    config.strategies[0].assets[0].symbol = SILVER.to_string();
    assert!(load_market(&config).is_err());
}
