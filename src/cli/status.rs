//! Status command implementation

use crate::config::Config;
use crate::ledger::{Ledger, PositionFilter};
use clap::Args;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Ledger document, overrides `engine.ledger_path`
    #[arg(long)]
    pub ledger: Option<PathBuf>,
}

impl StatusArgs {
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let path = self
            .ledger
            .clone()
            .unwrap_or_else(|| config.engine.ledger_path.clone());
        if !path.exists() {
            println!("No ledger at {}", path.display());
            return Ok(());
        }

        let ledger = Ledger::open(&path)?;
        let open = ledger.list_open(PositionFilter::any());
        let metadata = ledger.metadata();

        println!("tradedesk status");
        println!("  Ledger: {}", path.display());
        println!("  Positions: {} ({} open)", ledger.len(), open.len());
        println!("  Floating profit: {:.2}", ledger.floating_profit(None));

        if let Some(daily) = &metadata.daily {
            println!("  Day: {}", daily.day);
            println!(
                "  Begin balance: {:.2} (week {:.2})",
                daily.begin_balance, daily.begin_balance_week
            );
            println!(
                "  Flags: target={} break_even={} weekly={}",
                daily.target_reached, daily.break_even_reached, daily.weekly_profit_reached
            );
        }
        if let Some(event) = &metadata.last_event {
            println!("  Last event: {} {}", event.at, event.message);
        }
        if let Some(offset) = metadata.server_offset_hours {
            println!("  Server offset: {offset:+}h");
        }

        for record in open {
            println!(
                "  {:<12} {:<8} {:<4} {:>8} @ {} [{}]",
                record.ticket,
                record.symbol,
                record.direction.to_string(),
                record.lot_size,
                record
                    .entry_price
                    .map(|p| p.to_string())
                    .unwrap_or_else(|| "-".to_string()),
                record.strategy
            );
        }
        Ok(())
    }
}
