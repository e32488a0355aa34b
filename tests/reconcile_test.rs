//! Reconciliation against the paper broker

mod common;

use common::*;
use rust_decimal_macros::dec;
use std::sync::Arc;
use tradedesk::broker::{Account, LogNotifier, Trade};
use tradedesk::ledger::{Ledger, PositionStatus};
use tradedesk::reconcile::Reconciler;
use tradedesk::risk::AccountRiskThresholds;

async fn with_open_position() -> Harness {
    let config = config(
        vec![go_long("go_long", dec!(200000), 9 * 60, 17 * 60, &[GOLD])],
        AccountRiskThresholds::default(),
    );
    let market = gold_market(&[
        ("2024-03-04 09:00:00", dec!(2000)),
        ("2024-03-04 10:00:00", dec!(2006)),
    ]);
    let mut harness = Harness::new(&config, market, Ledger::in_memory(), "2024-03-04 09:00:00").await;
    let report = harness.cycle_at("2024-03-04 09:00:00").await;
    assert_eq!(report.opened[0].ticket, "sim-000001");
    harness
}

#[tokio::test]
async fn test_externally_closed_position_is_synced() {
    let mut harness = with_open_position().await;
    let reconciler = Reconciler::new(Arc::new(LogNotifier::new(harness.clock.clone())));

    // closed at the broker behind the engine's back
    harness.clock.set(at("2024-03-04 10:00:00"));
    let record = harness.engine.ledger().get("sim-000001").unwrap();
    assert!(harness.broker.close_position(&record).await.unwrap().accepted);

    harness.engine.reconcile(&reconciler).await.unwrap();
    let synced = harness.engine.ledger().get("sim-000001").unwrap();
    assert_eq!(synced.status, PositionStatus::Closed);
    assert_eq!(synced.exit_time, Some(at("2024-03-04 10:00:00")));
    assert_eq!(synced.comment.as_deref(), Some("closed externally"));
    assert_eq!(synced.exit_price, Some(dec!(2006)));
    assert_eq!(synced.profit, dec!(600));

    // a second pass changes nothing
    harness.clock.set(at("2024-03-04 11:00:00"));
    harness.engine.reconcile(&reconciler).await.unwrap();
    assert_eq!(harness.engine.ledger().get("sim-000001").unwrap(), synced);
}

#[tokio::test]
async fn test_position_still_open_at_broker_is_untouched() {
    let mut harness = with_open_position().await;
    let reconciler = Reconciler::new(Arc::new(LogNotifier::new(harness.clock.clone())));
    let before = harness.engine.ledger().get("sim-000001").unwrap();

    harness.engine.reconcile(&reconciler).await.unwrap();
    assert_eq!(harness.engine.ledger().get("sim-000001").unwrap(), before);
    assert_eq!(
        harness.broker.open_tickets().await.unwrap(),
        vec!["sim-000001".to_string()]
    );
}
