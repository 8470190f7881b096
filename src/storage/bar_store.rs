// =============================================================================
// Bar Store — embedded SQLite persistence for OHLCV bars
// =============================================================================
//
// Single `bars` table keyed by (symbol, interval, ts). Writers upsert:
// insert on a new key, overwrite OHLCV on conflict — this is what lets the
// aggregator refine a still-open bucket with every incoming 1-minute bar.
// Readers range-query the most recent N bars and receive them oldest-first.
//
// Connections come from an r2d2 pool so the ingestion task and the HTTP
// handlers never contend on a single handle.
// =============================================================================

use std::path::Path;

use anyhow::{Context, Result};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;

use crate::timeframes::interval_sort_key;
use crate::types::Bar;

const CREATE_SQL: &str = "
CREATE TABLE IF NOT EXISTS bars (
  symbol   TEXT NOT NULL,
  interval TEXT NOT NULL,
  ts       INTEGER NOT NULL,
  open     REAL NOT NULL,
  high     REAL NOT NULL,
  low      REAL NOT NULL,
  close    REAL NOT NULL,
  volume   REAL NOT NULL,
  PRIMARY KEY (symbol, interval, ts)
);
";

const UPSERT_SQL: &str = "
INSERT INTO bars (symbol, interval, ts, open, high, low, close, volume)
VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
ON CONFLICT (symbol, interval, ts) DO UPDATE SET
  open   = excluded.open,
  high   = excluded.high,
  low    = excluded.low,
  close  = excluded.close,
  volume = excluded.volume;
";

/// Embedded OHLCV store shared by the aggregator and the HTTP layer.
pub struct BarStore {
    pool: Pool<SqliteConnectionManager>,
}

impl BarStore {
    /// Open (and create if missing) the database at `path`, including its
    /// parent directory, and ensure the schema exists.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("failed to create store directory {}", parent.display())
                })?;
            }
        }

        let manager = SqliteConnectionManager::file(path);
        let pool = Pool::builder()
            .max_size(8)
            .build(manager)
            .with_context(|| format!("failed to open bar store at {}", path.display()))?;

        let conn = pool.get().context("failed to check out store connection")?;
        conn.execute_batch(CREATE_SQL)
            .context("failed to create bars table")?;
        // WAL lets the HTTP readers proceed while the aggregator writes.
        conn.execute_batch("PRAGMA journal_mode=WAL;")
            .context("failed to enable WAL journal mode")?;

        Ok(Self { pool })
    }

    /// Upsert a batch of bars inside a single transaction. Returns the
    /// number of rows written.
    pub fn upsert_bars(&self, bars: &[Bar]) -> Result<usize> {
        if bars.is_empty() {
            return Ok(0);
        }

        let mut conn = self.pool.get().context("store connection unavailable")?;
        let tx = conn.transaction().context("failed to begin transaction")?;
        {
            let mut stmt = tx.prepare_cached(UPSERT_SQL)?;
            for bar in bars {
                stmt.execute(params![
                    bar.symbol,
                    bar.interval,
                    bar.ts,
                    bar.open,
                    bar.high,
                    bar.low,
                    bar.close,
                    bar.volume,
                ])?;
            }
        }
        tx.commit().context("failed to commit bar upsert")?;

        Ok(bars.len())
    }

    /// Fetch the most recent `limit` bars for `(symbol, interval)`, returned
    /// in ascending `ts` order.
    pub fn fetch_bars(&self, symbol: &str, interval: &str, limit: u32) -> Result<Vec<Bar>> {
        let conn = self.pool.get().context("store connection unavailable")?;
        let mut stmt = conn.prepare_cached(
            "SELECT symbol, interval, ts, open, high, low, close, volume
             FROM bars
             WHERE symbol = ?1 AND interval = ?2
             ORDER BY ts DESC
             LIMIT ?3",
        )?;

        let mut bars: Vec<Bar> = stmt
            .query_map(params![symbol, interval, limit], |row| {
                Ok(Bar {
                    symbol: row.get(0)?,
                    interval: row.get(1)?,
                    ts: row.get(2)?,
                    open: row.get(3)?,
                    high: row.get(4)?,
                    low: row.get(5)?,
                    close: row.get(6)?,
                    volume: row.get(7)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        // The query walks newest-first for the LIMIT; callers want oldest-first.
        bars.reverse();
        Ok(bars)
    }

    /// Distinct symbols that have at least one bar at `interval`, sorted.
    pub fn distinct_symbols(&self, interval: &str) -> Result<Vec<String>> {
        let conn = self.pool.get().context("store connection unavailable")?;
        let mut stmt = conn.prepare_cached(
            "SELECT DISTINCT symbol FROM bars WHERE interval = ?1 ORDER BY symbol",
        )?;
        let symbols = stmt
            .query_map(params![interval], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(symbols)
    }

    /// Distinct intervals present in the store, in ascending duration order.
    pub fn distinct_intervals(&self) -> Result<Vec<String>> {
        let conn = self.pool.get().context("store connection unavailable")?;
        let mut stmt = conn.prepare_cached("SELECT DISTINCT interval FROM bars")?;
        let mut intervals = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        intervals.sort_by_key(|iv| interval_sort_key(iv));
        Ok(intervals)
    }

    /// Number of bars stored for `(symbol, interval)`.
    pub fn bar_count(&self, symbol: &str, interval: &str) -> Result<u64> {
        let conn = self.pool.get().context("store connection unavailable")?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM bars WHERE symbol = ?1 AND interval = ?2",
            params![symbol, interval],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }
}
