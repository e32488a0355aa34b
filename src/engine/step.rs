//! Per-asset evaluation steps

use super::StepError;
use crate::ledger::{Ledger, PositionRecord};
use crate::strategy::{AssetConfig, ExitReason, OrderDesk, SignalContext, Strategy};

/// Entry evaluation: signal, order preparation, gating and execution
pub(crate) async fn evaluate_entry(
    desk: &OrderDesk,
    ledger: &mut Ledger,
    strategy: &dyn Strategy,
    asset: &AssetConfig,
) -> Result<Option<PositionRecord>, StepError> {
    let ctx = SignalContext::new(desk.clock(), desk.feed(), ledger);
    let signal = strategy
        .entry_signal(asset, ctx)
        .await
        .map_err(|e| StepError::skip("entry signal", e))?;
    let Some(direction) = signal else {
        return Ok(None);
    };

    let config = strategy.config();
    let order = desk
        .prepare_order(config, asset, direction, strategy.range(&asset.symbol))
        .await?;
    if !desk.is_entry_allowed(ledger, config, asset, &order).await? {
        return Ok(None);
    }

    Ok(desk.execute_entry(ledger, order).await?)
}

/// Exit evaluation of one open position
///
/// An exit signal wins over a crossed stop or target. A position that stays
/// open is handed to the broker for management.
pub(crate) async fn evaluate_exit(
    desk: &OrderDesk,
    ledger: &mut Ledger,
    strategy: &dyn Strategy,
    record: &PositionRecord,
) -> Result<Option<PositionRecord>, StepError> {
    let config = strategy.config();

    if desk.is_exit_allowed(config) {
        let ctx = SignalContext::new(desk.clock(), desk.feed(), ledger);
        let exit = strategy
            .exit_signal(record, ctx)
            .await
            .map_err(|e| StepError::skip("exit signal", e))?;

        let reason = if exit {
            Some(ExitReason::Signal)
        } else {
            desk.stop_or_target_hit(record)
                .await?
                .map(ExitReason::Trigger)
        };

        if let Some(reason) = reason {
            if let Some(closed) = desk.execute_exit(ledger, record, reason).await? {
                return Ok(Some(closed));
            }
        }
    }

    desk.manage_entry(ledger, record).await?;
    Ok(None)
}
