//! Iron condor signal repository.
//!
//! Insert and time-range queries over `ic_signals`. Implements
//! [`SignalStore`] so a generator can persist every scan directly.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use condor_core::{Signal, SignalStore};
use sqlx::PgPool;

use crate::models::IcSignalRecord;

const SELECT_COLUMNS: &str = r#"
    SELECT id, scan_id, bot, ticker, created_at, source, is_valid,
           spot, vix, expected_move, put_long, put_short, call_short, call_long,
           total_credit, pricing_source, max_loss, contracts, win_probability,
           confidence, prediction_source, advice, direction, reasoning, payload
    FROM ic_signals
"#;

/// Per-source tally for a bot over a time range.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct SourceCount {
    pub source: String,
    pub count: i64,
}

/// Repository for `ic_signals` operations.
#[derive(Debug, Clone)]
pub struct IcSignalRepository {
    pool: PgPool,
}

impl IcSignalRepository {
    /// Creates a new repository instance.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Inserts a record and returns its id. Re-saving a scan id overwrites
    /// the stored row.
    ///
    /// # Errors
    /// Returns an error if the database operation fails.
    pub async fn insert(&self, record: &IcSignalRecord) -> Result<i64> {
        let row: (i64,) = sqlx::query_as(
            r#"
            INSERT INTO ic_signals
                (scan_id, bot, ticker, created_at, source, is_valid,
                 spot, vix, expected_move, put_long, put_short, call_short, call_long,
                 total_credit, pricing_source, max_loss, contracts, win_probability,
                 confidence, prediction_source, advice, direction, reasoning, payload)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13,
                    $14, $15, $16, $17, $18, $19, $20, $21, $22, $23, $24)
            ON CONFLICT (scan_id) DO UPDATE
            SET source = EXCLUDED.source,
                is_valid = EXCLUDED.is_valid,
                reasoning = EXCLUDED.reasoning,
                payload = EXCLUDED.payload
            RETURNING id
            "#,
        )
        .bind(record.scan_id)
        .bind(&record.bot)
        .bind(&record.ticker)
        .bind(record.created_at)
        .bind(&record.source)
        .bind(record.is_valid)
        .bind(record.spot)
        .bind(record.vix)
        .bind(record.expected_move)
        .bind(record.put_long)
        .bind(record.put_short)
        .bind(record.call_short)
        .bind(record.call_long)
        .bind(record.total_credit)
        .bind(&record.pricing_source)
        .bind(record.max_loss)
        .bind(record.contracts)
        .bind(record.win_probability)
        .bind(record.confidence)
        .bind(&record.prediction_source)
        .bind(&record.advice)
        .bind(&record.direction)
        .bind(&record.reasoning)
        .bind(&record.payload)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.0)
    }

    /// Most recent signals for a bot, newest first.
    ///
    /// # Errors
    /// Returns an error if the database query fails.
    pub async fn recent(&self, bot: &str, limit: i64) -> Result<Vec<IcSignalRecord>> {
        let sql = format!("{SELECT_COLUMNS} WHERE bot = $1 ORDER BY created_at DESC LIMIT $2");
        let records = sqlx::query_as::<_, IcSignalRecord>(&sql)
            .bind(bot)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        Ok(records)
    }

    /// Signals for a bot within a time range, oldest first.
    ///
    /// # Errors
    /// Returns an error if the database query fails.
    pub async fn query_by_bot(
        &self,
        bot: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<IcSignalRecord>> {
        let sql = format!(
            "{SELECT_COLUMNS} WHERE bot = $1 AND created_at >= $2 AND created_at <= $3 \
             ORDER BY created_at ASC"
        );
        let records = sqlx::query_as::<_, IcSignalRecord>(&sql)
            .bind(bot)
            .bind(start)
            .bind(end)
            .fetch_all(&self.pool)
            .await?;

        Ok(records)
    }

    /// How often each source tag occurred for a bot in a time range.
    ///
    /// # Errors
    /// Returns an error if the database query fails.
    pub async fn count_by_source(
        &self,
        bot: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<SourceCount>> {
        let counts = sqlx::query_as::<_, SourceCount>(
            r#"
            SELECT source, COUNT(*) AS count
            FROM ic_signals
            WHERE bot = $1 AND created_at >= $2 AND created_at <= $3
            GROUP BY source
            ORDER BY count DESC
            "#,
        )
        .bind(bot)
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;

        Ok(counts)
    }
}

#[async_trait]
impl SignalStore for IcSignalRepository {
    async fn save(&self, signal: &Signal) -> Result<i64> {
        let record = IcSignalRecord::from_signal(signal)?;
        let id = self.insert(&record).await?;
        tracing::debug!(id, bot = %signal.bot, source = %signal.source, "Signal persisted");
        Ok(id)
    }
}
