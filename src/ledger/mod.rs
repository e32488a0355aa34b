//! Position ledger
//!
//! Durable store of open and closed positions plus a separate metadata
//! namespace. Every mutation is written through to the backing JSON document
//! before the call returns, so a crash never loses an accepted order.

mod metadata;
mod types;

pub use metadata::{DailySnapshot, LedgerEvent, LedgerMetadata};
pub use types::{Direction, LedgerError, PositionRecord, PositionStatus};

use chrono::{Duration, NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Query filter for [`Ledger::list_open`] and [`Ledger::count_opened_today`]
#[derive(Debug, Clone, Copy, Default)]
pub struct PositionFilter<'a> {
    pub symbol: Option<&'a str>,
    pub strategy: Option<&'a str>,
    pub direction: Option<Direction>,
    pub opened_on: Option<NaiveDate>,
}

impl<'a> PositionFilter<'a> {
    /// Match every position
    pub fn any() -> Self {
        Self::default()
    }

    pub fn symbol(mut self, symbol: &'a str) -> Self {
        self.symbol = Some(symbol);
        self
    }

    pub fn strategy(mut self, strategy: &'a str) -> Self {
        self.strategy = Some(strategy);
        self
    }

    pub fn direction(mut self, direction: Direction) -> Self {
        self.direction = Some(direction);
        self
    }

    pub fn opened_on(mut self, day: NaiveDate) -> Self {
        self.opened_on = Some(day);
        self
    }

    fn matches(&self, record: &PositionRecord) -> bool {
        self.symbol.map_or(true, |s| record.symbol == s)
            && self.strategy.map_or(true, |s| record.strategy == s)
            && self.direction.map_or(true, |d| record.direction == d)
            && self.opened_on.map_or(true, |d| record.opened_on() == d)
    }
}

#[derive(Debug, Default, Deserialize)]
struct LedgerDocument {
    #[serde(default)]
    positions: BTreeMap<String, PositionRecord>,
    #[serde(default)]
    metadata: LedgerMetadata,
}

#[derive(Serialize)]
struct LedgerDocumentRef<'a> {
    positions: &'a BTreeMap<String, PositionRecord>,
    metadata: &'a LedgerMetadata,
}

/// Position ledger with optional file backing
#[derive(Debug, Default)]
pub struct Ledger {
    positions: BTreeMap<String, PositionRecord>,
    metadata: LedgerMetadata,
    path: Option<PathBuf>,
}

impl Ledger {
    /// Create a ledger that is never persisted
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Open the ledger stored at `path`, starting empty if the file is absent
    pub fn open(path: impl AsRef<Path>) -> Result<Self, LedgerError> {
        let path = path.as_ref().to_path_buf();
        let document = if path.exists() {
            let content = fs::read_to_string(&path).map_err(|source| LedgerError::Io {
                path: path.clone(),
                source,
            })?;
            if content.trim().is_empty() {
                LedgerDocument::default()
            } else {
                serde_json::from_str(&content).map_err(|source| LedgerError::Corrupt {
                    path: path.clone(),
                    source,
                })?
            }
        } else {
            LedgerDocument::default()
        };

        tracing::debug!(
            path = %path.display(),
            positions = document.positions.len(),
            "Ledger loaded"
        );

        Ok(Self {
            positions: document.positions,
            metadata: document.metadata,
            path: Some(path),
        })
    }

    /// Create an empty ledger at `path`, discarding any previous content
    pub fn reset(path: impl AsRef<Path>) -> Result<Self, LedgerError> {
        let ledger = Self {
            path: Some(path.as_ref().to_path_buf()),
            ..Self::default()
        };
        ledger.persist()?;
        Ok(ledger)
    }

    /// Backing file, if any
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Insert or replace a record by id
    pub fn upsert(&mut self, record: PositionRecord) -> Result<(), LedgerError> {
        if let Some(existing) = self.positions.get(&record.id) {
            if !existing.same_identity(&record) {
                return Err(LedgerError::IdentityChanged(record.id));
            }
        }
        self.positions.insert(record.id.clone(), record);
        self.persist()
    }

    pub fn get(&self, id: &str) -> Option<PositionRecord> {
        self.positions.get(id).cloned()
    }

    /// All positions, ordered by id
    pub fn list_all(&self) -> Vec<PositionRecord> {
        self.positions.values().cloned().collect()
    }

    /// Open positions matching `filter`
    pub fn list_open(&self, filter: PositionFilter<'_>) -> Vec<PositionRecord> {
        self.positions
            .values()
            .filter(|r| r.is_open() && filter.matches(r))
            .cloned()
            .collect()
    }

    /// Positions opened on `today` matching `filter`, open or closed
    pub fn count_opened_today(&self, today: NaiveDate, filter: PositionFilter<'_>) -> usize {
        let filter = filter.opened_on(today);
        self.positions.values().filter(|r| filter.matches(r)).count()
    }

    /// Most recently opened position for `symbol`
    pub fn last_for_symbol(&self, symbol: &str) -> Option<PositionRecord> {
        self.positions
            .values()
            .filter(|r| r.symbol == symbol)
            .max_by_key(|r| r.opened_at)
            .cloned()
    }

    /// Most recently opened closed position for `symbol`
    pub fn last_closed_for_symbol(&self, symbol: &str) -> Option<PositionRecord> {
        self.positions
            .values()
            .filter(|r| r.symbol == symbol && !r.is_open())
            .max_by_key(|r| r.opened_at)
            .cloned()
    }

    /// Sum of stored profit over open positions
    pub fn floating_profit(&self, symbol: Option<&str>) -> Decimal {
        self.positions
            .values()
            .filter(|r| r.is_open() && symbol.map_or(true, |s| r.symbol == s))
            .map(|r| r.profit)
            .sum()
    }

    /// Remove closed positions whose exit is older than `max_age_hours`
    ///
    /// Returns the number of removed records.
    pub fn prune(&mut self, now: NaiveDateTime, max_age_hours: i64) -> Result<usize, LedgerError> {
        let cutoff = now - Duration::hours(max_age_hours);
        let before = self.positions.len();
        self.positions.retain(|_, r| {
            r.is_open() || r.exit_time.map_or(true, |exit| exit >= cutoff)
        });

        let removed = before - self.positions.len();
        if removed > 0 {
            tracing::debug!(removed, "Pruned closed positions");
            self.persist()?;
        }
        Ok(removed)
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn metadata(&self) -> &LedgerMetadata {
        &self.metadata
    }

    /// Mutate metadata and persist
    pub fn update_metadata<F>(&mut self, update: F) -> Result<(), LedgerError>
    where
        F: FnOnce(&mut LedgerMetadata),
    {
        update(&mut self.metadata);
        self.persist()
    }

    fn persist(&self) -> Result<(), LedgerError> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let document = LedgerDocumentRef {
            positions: &self.positions,
            metadata: &self.metadata,
        };
        let bytes = serde_json::to_vec_pretty(&document)?;

        let io_err = |source| LedgerError::Io {
            path: path.clone(),
            source,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, bytes).map_err(io_err)?;
        fs::rename(&tmp, path).map_err(io_err)?;
        Ok(())
    }
}
