//! SQLite storage backend.
//!
//! Persists raw events, domain projections, checkpoints, reorg audit rows,
//! daily rollups, and tracked operations in a single SQLite file. Uses
//! `sqlx` with WAL mode; each block commit is one transaction, so a batch
//! either fully commits (including the checkpoint advance) or fully rolls
//! back.

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::sqlite::{SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use tracing::debug;

use deedstream_core::checkpoint::{CheckpointPatch, CheckpointStatus, IndexerCheckpoint};
use deedstream_core::error::StoreError;
use deedstream_core::events::{
    ClaimEvent, ComplianceAction, ComplianceEvent, ComplianceViolation, DomainEvent, IdentityAction,
    IdentityEvent, Provenance, TransferEvent,
};
use deedstream_core::ops::{OperationKind, OperationRecord, OperationStatus};
use deedstream_core::reorg::ReorgRecord;
use deedstream_core::store::{
    BatchInsertReport, BlockCommit, CommitReport, DailyMetrics, EventQuery, IndexStore,
    InsertOutcome, MetricsDelta, OperationQuery,
};
use deedstream_core::types::LogEvent;

/// SQLite-backed storage for the indexing and monitoring engine.
pub struct SqliteStore {
    pool: SqlitePool,
}

fn backend_err(e: impl std::fmt::Display) -> StoreError {
    StoreError::Backend(e.to_string())
}

impl SqliteStore {
    /// Open (or create) a SQLite database at `path`.
    ///
    /// The path may be a plain file path (`"./deedstream.db"`) or a full
    /// SQLite URL (`"sqlite:./deedstream.db?mode=rwc"`).
    pub async fn open(path: &str) -> Result<Self, StoreError> {
        let url = if path.starts_with("sqlite:") {
            path.to_string()
        } else {
            format!("sqlite:{path}?mode=rwc")
        };
        let pool = SqlitePool::connect(&url).await.map_err(backend_err)?;
        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    /// Open an in-memory SQLite database (single shared connection so every
    /// query sees the same data). All data is lost when the pool drops —
    /// ideal for tests.
    pub async fn in_memory() -> Result<Self, StoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(backend_err)?;
        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<(), StoreError> {
        // WAL mode — better concurrent read throughput
        let statements = [
            "PRAGMA journal_mode=WAL;",
            "CREATE TABLE IF NOT EXISTS events (
                network      TEXT    NOT NULL,
                address      TEXT    NOT NULL,
                topics       TEXT    NOT NULL,
                data         TEXT    NOT NULL,
                block_number INTEGER NOT NULL,
                tx_hash      TEXT    NOT NULL,
                tx_index     INTEGER NOT NULL,
                block_hash   TEXT    NOT NULL,
                log_index    INTEGER NOT NULL,
                timestamp    INTEGER NOT NULL,
                removed      INTEGER NOT NULL DEFAULT 0,
                PRIMARY KEY (network, tx_hash, log_index)
            );",
            "CREATE INDEX IF NOT EXISTS idx_events_network_block
                ON events (network, block_number);",
            "CREATE TABLE IF NOT EXISTS checkpoints (
                network                TEXT PRIMARY KEY,
                last_processed_block   INTEGER NOT NULL,
                last_processed_tx_hash TEXT,
                status                 TEXT NOT NULL,
                updated_at             INTEGER NOT NULL,
                error_message          TEXT
            );",
            "CREATE TABLE IF NOT EXISTS block_hashes (
                network      TEXT    NOT NULL,
                block_number INTEGER NOT NULL,
                block_hash   TEXT    NOT NULL,
                PRIMARY KEY (network, block_number)
            );",
            "CREATE TABLE IF NOT EXISTS transfers (
                network      TEXT    NOT NULL,
                tx_hash      TEXT    NOT NULL,
                log_index    INTEGER NOT NULL,
                block_number INTEGER NOT NULL,
                timestamp    INTEGER NOT NULL,
                token        TEXT    NOT NULL,
                from_address TEXT    NOT NULL,
                to_address   TEXT    NOT NULL,
                amount       TEXT    NOT NULL,
                PRIMARY KEY (network, tx_hash, log_index)
            );",
            "CREATE TABLE IF NOT EXISTS compliance_events (
                network      TEXT    NOT NULL,
                tx_hash      TEXT    NOT NULL,
                log_index    INTEGER NOT NULL,
                block_number INTEGER NOT NULL,
                timestamp    INTEGER NOT NULL,
                module       TEXT    NOT NULL,
                action       TEXT    NOT NULL,
                country      INTEGER,
                subject      TEXT,
                value        TEXT,
                PRIMARY KEY (network, tx_hash, log_index)
            );",
            "CREATE TABLE IF NOT EXISTS identity_events (
                network      TEXT    NOT NULL,
                tx_hash      TEXT    NOT NULL,
                log_index    INTEGER NOT NULL,
                block_number INTEGER NOT NULL,
                timestamp    INTEGER NOT NULL,
                investor     TEXT    NOT NULL,
                identity     TEXT    NOT NULL,
                action       TEXT    NOT NULL,
                PRIMARY KEY (network, tx_hash, log_index)
            );",
            "CREATE TABLE IF NOT EXISTS claim_events (
                network      TEXT    NOT NULL,
                tx_hash      TEXT    NOT NULL,
                log_index    INTEGER NOT NULL,
                block_number INTEGER NOT NULL,
                timestamp    INTEGER NOT NULL,
                identity     TEXT    NOT NULL,
                claim_id     TEXT    NOT NULL,
                topic        INTEGER NOT NULL,
                issuer       TEXT    NOT NULL,
                PRIMARY KEY (network, tx_hash, log_index)
            );",
            "CREATE TABLE IF NOT EXISTS compliance_violations (
                network      TEXT    NOT NULL,
                tx_hash      TEXT    NOT NULL,
                log_index    INTEGER NOT NULL,
                block_number INTEGER NOT NULL,
                timestamp    INTEGER NOT NULL,
                token        TEXT    NOT NULL,
                from_address TEXT    NOT NULL,
                to_address   TEXT    NOT NULL,
                amount       TEXT    NOT NULL,
                reason       TEXT    NOT NULL,
                PRIMARY KEY (network, tx_hash, log_index)
            );",
            "CREATE TABLE IF NOT EXISTS reorg_events (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                network     TEXT    NOT NULL,
                height      INTEGER NOT NULL,
                old_hash    TEXT    NOT NULL,
                new_hash    TEXT    NOT NULL,
                depth       INTEGER NOT NULL,
                rewound_to  INTEGER NOT NULL,
                detected_at INTEGER NOT NULL
            );",
            "CREATE TABLE IF NOT EXISTS daily_metrics (
                network                TEXT NOT NULL,
                date                   TEXT NOT NULL,
                blocks_processed       INTEGER NOT NULL,
                transactions_processed INTEGER NOT NULL,
                events_indexed         INTEGER NOT NULL,
                processing_time_ms     INTEGER NOT NULL,
                avg_block_time_secs    REAL NOT NULL,
                PRIMARY KEY (network, date)
            );",
            "CREATE TABLE IF NOT EXISTS tracked_operations (
                id           TEXT PRIMARY KEY,
                kind         TEXT NOT NULL,
                status       TEXT NOT NULL,
                network      TEXT NOT NULL,
                from_address TEXT,
                to_address   TEXT,
                user_address TEXT,
                gas_used     INTEGER,
                started_at   INTEGER NOT NULL,
                confirmed_at INTEGER
            );",
        ];
        for statement in statements {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(backend_err)?;
        }
        Ok(())
    }
}

// ─── Query assembly ──────────────────────────────────────────────────────────

type SqliteQuery<'q> = sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>>;

/// WHERE fragment for provenance filters; `address_cols` names the columns
/// the address filter matches against (empty = filter not supported).
fn filter_sql(query: &EventQuery, address_cols: &[&str]) -> String {
    let mut sql = String::new();
    if query.network.is_some() {
        sql.push_str(" AND network = ?");
    }
    if query.address.is_some() && !address_cols.is_empty() {
        let clauses: Vec<String> = address_cols
            .iter()
            .map(|col| format!("LOWER({col}) = LOWER(?)"))
            .collect();
        sql.push_str(&format!(" AND ({})", clauses.join(" OR ")));
    }
    if query.from_block.is_some() {
        sql.push_str(" AND block_number >= ?");
    }
    if query.to_block.is_some() {
        sql.push_str(" AND block_number <= ?");
    }
    if query.from_timestamp.is_some() {
        sql.push_str(" AND timestamp >= ?");
    }
    if query.to_timestamp.is_some() {
        sql.push_str(" AND timestamp <= ?");
    }
    sql
}

/// Bind values in the same order `filter_sql` emitted placeholders.
fn bind_filters<'q>(
    mut q: SqliteQuery<'q>,
    query: &'q EventQuery,
    address_binds: usize,
) -> SqliteQuery<'q> {
    if let Some(network) = &query.network {
        q = q.bind(network);
    }
    if let Some(address) = &query.address {
        for _ in 0..address_binds {
            q = q.bind(address);
        }
    }
    if let Some(from) = query.from_block {
        q = q.bind(from as i64);
    }
    if let Some(to) = query.to_block {
        q = q.bind(to as i64);
    }
    if let Some(from) = query.from_timestamp {
        q = q.bind(from);
    }
    if let Some(to) = query.to_timestamp {
        q = q.bind(to);
    }
    q
}

fn page_sql() -> &'static str {
    " ORDER BY block_number, log_index LIMIT ? OFFSET ?"
}

fn bind_page<'q>(q: SqliteQuery<'q>, query: &EventQuery) -> SqliteQuery<'q> {
    let limit = query.limit.map(|l| l as i64).unwrap_or(-1);
    q.bind(limit).bind(query.offset as i64)
}

// ─── Row mapping ─────────────────────────────────────────────────────────────

fn row_event(row: &SqliteRow) -> Result<LogEvent, StoreError> {
    let topics_json: String = row.get("topics");
    let topics: Vec<String> = serde_json::from_str(&topics_json).map_err(backend_err)?;
    Ok(LogEvent {
        network: row.get("network"),
        address: row.get("address"),
        topics,
        data: row.get("data"),
        block_number: row.get::<i64, _>("block_number") as u64,
        tx_hash: row.get("tx_hash"),
        tx_index: row.get::<i64, _>("tx_index") as u32,
        block_hash: row.get("block_hash"),
        log_index: row.get::<i64, _>("log_index") as u32,
        timestamp: row.get("timestamp"),
        removed: row.get::<i64, _>("removed") != 0,
    })
}

fn row_provenance(row: &SqliteRow) -> Provenance {
    Provenance {
        network: row.get("network"),
        block_number: row.get::<i64, _>("block_number") as u64,
        tx_hash: row.get("tx_hash"),
        log_index: row.get::<i64, _>("log_index") as u32,
        timestamp: row.get("timestamp"),
    }
}

fn row_transfer(row: &SqliteRow) -> TransferEvent {
    TransferEvent {
        provenance: row_provenance(row),
        token: row.get("token"),
        from: row.get("from_address"),
        to: row.get("to_address"),
        amount: row.get("amount"),
    }
}

fn row_compliance(row: &SqliteRow) -> Result<ComplianceEvent, StoreError> {
    let action_str: String = row.get("action");
    let action = ComplianceAction::parse(&action_str)
        .ok_or_else(|| backend_err(format!("unknown compliance action `{action_str}`")))?;
    Ok(ComplianceEvent {
        provenance: row_provenance(row),
        module: row.get("module"),
        action,
        country: row.get::<Option<i64>, _>("country").map(|c| c as u16),
        subject: row.get("subject"),
        value: row.get("value"),
    })
}

fn row_identity(row: &SqliteRow) -> Result<IdentityEvent, StoreError> {
    let action_str: String = row.get("action");
    let action = IdentityAction::parse(&action_str)
        .ok_or_else(|| backend_err(format!("unknown identity action `{action_str}`")))?;
    Ok(IdentityEvent {
        provenance: row_provenance(row),
        investor: row.get("investor"),
        identity: row.get("identity"),
        action,
    })
}

fn row_claim(row: &SqliteRow) -> ClaimEvent {
    ClaimEvent {
        provenance: row_provenance(row),
        identity: row.get("identity"),
        claim_id: row.get("claim_id"),
        topic: row.get::<i64, _>("topic") as u64,
        issuer: row.get("issuer"),
    }
}

fn row_violation(row: &SqliteRow) -> ComplianceViolation {
    ComplianceViolation {
        provenance: row_provenance(row),
        token: row.get("token"),
        from: row.get("from_address"),
        to: row.get("to_address"),
        amount: row.get("amount"),
        reason: row.get("reason"),
    }
}

fn row_checkpoint(row: &SqliteRow) -> Result<IndexerCheckpoint, StoreError> {
    let status_str: String = row.get("status");
    let status = CheckpointStatus::parse(&status_str)
        .ok_or_else(|| backend_err(format!("unknown checkpoint status `{status_str}`")))?;
    Ok(IndexerCheckpoint {
        network: row.get("network"),
        last_processed_block: row.get::<i64, _>("last_processed_block") as u64,
        last_processed_tx_hash: row.get("last_processed_tx_hash"),
        status,
        updated_at: row.get("updated_at"),
        error_message: row.get("error_message"),
    })
}

fn row_operation(row: &SqliteRow) -> Result<OperationRecord, StoreError> {
    let kind_str: String = row.get("kind");
    let status_str: String = row.get("status");
    let kind = OperationKind::parse(&kind_str)
        .ok_or_else(|| backend_err(format!("unknown operation kind `{kind_str}`")))?;
    let status = OperationStatus::parse(&status_str)
        .ok_or_else(|| backend_err(format!("unknown operation status `{status_str}`")))?;
    Ok(OperationRecord {
        id: row.get("id"),
        kind,
        status,
        network: row.get("network"),
        from: row.get("from_address"),
        to: row.get("to_address"),
        user: row.get("user_address"),
        gas_used: row.get::<Option<i64>, _>("gas_used").map(|g| g as u64),
        started_at: row.get("started_at"),
        confirmed_at: row.get("confirmed_at"),
    })
}

fn row_daily(row: &SqliteRow) -> Result<DailyMetrics, StoreError> {
    let date_str: String = row.get("date");
    let date = NaiveDate::parse_from_str(&date_str, "%Y-%m-%d").map_err(backend_err)?;
    Ok(DailyMetrics {
        network: row.get("network"),
        date,
        blocks_processed: row.get::<i64, _>("blocks_processed") as u64,
        transactions_processed: row.get::<i64, _>("transactions_processed") as u64,
        events_indexed: row.get::<i64, _>("events_indexed") as u64,
        processing_time_ms: row.get::<i64, _>("processing_time_ms") as u64,
        avg_block_time_secs: row.get("avg_block_time_secs"),
    })
}

// ─── Writers shared between commit paths ─────────────────────────────────────

fn insert_event_sql() -> &'static str {
    "INSERT OR IGNORE INTO events
     (network, address, topics, data, block_number, tx_hash, tx_index,
      block_hash, log_index, timestamp, removed)
     VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
}

fn bind_event<'q>(q: SqliteQuery<'q>, event: &'q LogEvent, topics: &'q str) -> SqliteQuery<'q> {
    q.bind(&event.network)
        .bind(&event.address)
        .bind(topics)
        .bind(&event.data)
        .bind(event.block_number as i64)
        .bind(&event.tx_hash)
        .bind(event.tx_index as i64)
        .bind(&event.block_hash)
        .bind(event.log_index as i64)
        .bind(event.timestamp)
        .bind(event.removed as i64)
}

impl SqliteStore {
    async fn load_checkpoint_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        network: &str,
    ) -> Result<IndexerCheckpoint, StoreError> {
        let row = sqlx::query("SELECT * FROM checkpoints WHERE network = ?")
            .bind(network)
            .fetch_optional(&mut **tx)
            .await
            .map_err(backend_err)?;
        match row {
            Some(row) => row_checkpoint(&row),
            None => Ok(IndexerCheckpoint::new(network)),
        }
    }

    async fn save_checkpoint_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        checkpoint: &IndexerCheckpoint,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT OR REPLACE INTO checkpoints
             (network, last_processed_block, last_processed_tx_hash, status,
              updated_at, error_message)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&checkpoint.network)
        .bind(checkpoint.last_processed_block as i64)
        .bind(&checkpoint.last_processed_tx_hash)
        .bind(checkpoint.status.as_str())
        .bind(checkpoint.updated_at)
        .bind(&checkpoint.error_message)
        .execute(&mut **tx)
        .await
        .map_err(backend_err)?;
        Ok(())
    }

    async fn insert_domain_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        event: &DomainEvent,
    ) -> Result<u64, StoreError> {
        let result = match event {
            DomainEvent::Transfer(e) => {
                sqlx::query(
                    "INSERT OR IGNORE INTO transfers
                     (network, tx_hash, log_index, block_number, timestamp,
                      token, from_address, to_address, amount)
                     VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
                )
                .bind(&e.provenance.network)
                .bind(&e.provenance.tx_hash)
                .bind(e.provenance.log_index as i64)
                .bind(e.provenance.block_number as i64)
                .bind(e.provenance.timestamp)
                .bind(&e.token)
                .bind(&e.from)
                .bind(&e.to)
                .bind(&e.amount)
                .execute(&mut **tx)
                .await
            }
            DomainEvent::Compliance(e) => {
                sqlx::query(
                    "INSERT OR IGNORE INTO compliance_events
                     (network, tx_hash, log_index, block_number, timestamp,
                      module, action, country, subject, value)
                     VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                )
                .bind(&e.provenance.network)
                .bind(&e.provenance.tx_hash)
                .bind(e.provenance.log_index as i64)
                .bind(e.provenance.block_number as i64)
                .bind(e.provenance.timestamp)
                .bind(&e.module)
                .bind(e.action.as_str())
                .bind(e.country.map(|c| c as i64))
                .bind(&e.subject)
                .bind(&e.value)
                .execute(&mut **tx)
                .await
            }
            DomainEvent::Identity(e) => {
                sqlx::query(
                    "INSERT OR IGNORE INTO identity_events
                     (network, tx_hash, log_index, block_number, timestamp,
                      investor, identity, action)
                     VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
                )
                .bind(&e.provenance.network)
                .bind(&e.provenance.tx_hash)
                .bind(e.provenance.log_index as i64)
                .bind(e.provenance.block_number as i64)
                .bind(e.provenance.timestamp)
                .bind(&e.investor)
                .bind(&e.identity)
                .bind(e.action.as_str())
                .execute(&mut **tx)
                .await
            }
            DomainEvent::Claim(e) => {
                sqlx::query(
                    "INSERT OR IGNORE INTO claim_events
                     (network, tx_hash, log_index, block_number, timestamp,
                      identity, claim_id, topic, issuer)
                     VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
                )
                .bind(&e.provenance.network)
                .bind(&e.provenance.tx_hash)
                .bind(e.provenance.log_index as i64)
                .bind(e.provenance.block_number as i64)
                .bind(e.provenance.timestamp)
                .bind(&e.identity)
                .bind(&e.claim_id)
                .bind(e.topic as i64)
                .bind(&e.issuer)
                .execute(&mut **tx)
                .await
            }
            DomainEvent::Violation(e) => {
                sqlx::query(
                    "INSERT OR IGNORE INTO compliance_violations
                     (network, tx_hash, log_index, block_number, timestamp,
                      token, from_address, to_address, amount, reason)
                     VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                )
                .bind(&e.provenance.network)
                .bind(&e.provenance.tx_hash)
                .bind(e.provenance.log_index as i64)
                .bind(e.provenance.block_number as i64)
                .bind(e.provenance.timestamp)
                .bind(&e.token)
                .bind(&e.from)
                .bind(&e.to)
                .bind(&e.amount)
                .bind(&e.reason)
                .execute(&mut **tx)
                .await
            }
        };
        Ok(result.map_err(backend_err)?.rows_affected())
    }
}

// ─── IndexStore impl ─────────────────────────────────────────────────────────

#[async_trait]
impl IndexStore for SqliteStore {
    async fn insert_event(&self, event: &LogEvent) -> Result<InsertOutcome, StoreError> {
        event.validate()?;
        let topics = serde_json::to_string(&event.topics).map_err(backend_err)?;
        let result = bind_event(sqlx::query(insert_event_sql()), event, &topics)
            .execute(&self.pool)
            .await
            .map_err(backend_err)?;
        if result.rows_affected() == 1 {
            Ok(InsertOutcome::Inserted)
        } else {
            Ok(InsertOutcome::Duplicate)
        }
    }

    async fn insert_events_batch(
        &self,
        events: &[LogEvent],
    ) -> Result<BatchInsertReport, StoreError> {
        let mut report = BatchInsertReport::default();
        for event in events {
            if let Err(error) = event.validate() {
                tracing::warn!(%error, "skipping invalid event row");
                report.failed += 1;
                continue;
            }
            match self.insert_event(event).await {
                Ok(InsertOutcome::Inserted) => report.inserted += 1,
                Ok(InsertOutcome::Duplicate) => report.duplicates += 1,
                Err(error) => {
                    tracing::warn!(%error, "event row rejected by backend");
                    report.failed += 1;
                }
            }
        }
        Ok(report)
    }

    async fn events(&self, query: &EventQuery) -> Result<Vec<LogEvent>, StoreError> {
        let mut sql = String::from("SELECT * FROM events WHERE 1=1");
        sql.push_str(&filter_sql(query, &["address"]));
        if !query.include_removed {
            sql.push_str(" AND removed = 0");
        }
        sql.push_str(page_sql());

        let q = bind_filters(sqlx::query(&sql), query, 1);
        let rows = bind_page(q, query)
            .fetch_all(&self.pool)
            .await
            .map_err(backend_err)?;
        rows.iter().map(row_event).collect()
    }

    async fn event_count(&self, network: Option<&str>) -> Result<u64, StoreError> {
        let (sql, bind_network) = match network {
            Some(_) => ("SELECT COUNT(*) AS cnt FROM events WHERE network = ?", true),
            None => ("SELECT COUNT(*) AS cnt FROM events", false),
        };
        let mut q = sqlx::query(sql);
        if bind_network {
            q = q.bind(network.unwrap());
        }
        let row = q.fetch_one(&self.pool).await.map_err(backend_err)?;
        Ok(row.get::<i64, _>("cnt") as u64)
    }

    async fn commit_block(&self, commit: &BlockCommit) -> Result<CommitReport, StoreError> {
        let mut tx = self.pool.begin().await.map_err(backend_err)?;

        // Validate the checkpoint advance first; a rejected advance rolls
        // the whole commit back.
        let mut checkpoint = Self::load_checkpoint_tx(&mut tx, &commit.network).await?;
        checkpoint.apply(&CheckpointPatch::advance(
            commit.block_number,
            commit.last_tx_hash.clone(),
        ))?;

        let mut report = CommitReport::default();
        for event in &commit.events {
            event.validate()?;
            let topics = serde_json::to_string(&event.topics).map_err(backend_err)?;
            let result = bind_event(sqlx::query(insert_event_sql()), event, &topics)
                .execute(&mut *tx)
                .await
                .map_err(backend_err)?;
            if result.rows_affected() == 1 {
                report.events_inserted += 1;
            } else {
                report.duplicates += 1;
            }
        }
        for event in &commit.domain {
            report.domain_inserted += Self::insert_domain_tx(&mut tx, event).await?;
        }

        sqlx::query(
            "INSERT OR REPLACE INTO block_hashes (network, block_number, block_hash)
             VALUES (?, ?, ?)",
        )
        .bind(&commit.network)
        .bind(commit.block_number as i64)
        .bind(&commit.block_hash)
        .execute(&mut *tx)
        .await
        .map_err(backend_err)?;

        Self::save_checkpoint_tx(&mut tx, &checkpoint).await?;
        tx.commit().await.map_err(backend_err)?;

        debug!(
            network = %commit.network,
            block = commit.block_number,
            inserted = report.events_inserted,
            duplicates = report.duplicates,
            "block committed"
        );
        Ok(report)
    }

    async fn apply_rewind(&self, network: &str, rewound_to: u64) -> Result<u64, StoreError> {
        let mut tx = self.pool.begin().await.map_err(backend_err)?;
        let retracted = sqlx::query(
            "UPDATE events SET removed = 1
             WHERE network = ? AND block_number > ? AND removed = 0",
        )
        .bind(network)
        .bind(rewound_to as i64)
        .execute(&mut *tx)
        .await
        .map_err(backend_err)?
        .rows_affected();

        sqlx::query("DELETE FROM block_hashes WHERE network = ? AND block_number > ?")
            .bind(network)
            .bind(rewound_to as i64)
            .execute(&mut *tx)
            .await
            .map_err(backend_err)?;
        tx.commit().await.map_err(backend_err)?;

        debug!(network, rewound_to, retracted, "rewind applied");
        Ok(retracted)
    }

    async fn recent_block_hashes(
        &self,
        network: &str,
        depth: u64,
    ) -> Result<Vec<(u64, String)>, StoreError> {
        let rows = sqlx::query(
            "SELECT block_number, block_hash FROM block_hashes
             WHERE network = ? ORDER BY block_number DESC LIMIT ?",
        )
        .bind(network)
        .bind(depth as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(backend_err)?;
        let mut hashes: Vec<(u64, String)> = rows
            .iter()
            .map(|row| {
                (
                    row.get::<i64, _>("block_number") as u64,
                    row.get::<String, _>("block_hash"),
                )
            })
            .collect();
        hashes.reverse();
        Ok(hashes)
    }

    async fn checkpoint(&self, network: &str) -> Result<IndexerCheckpoint, StoreError> {
        let mut tx = self.pool.begin().await.map_err(backend_err)?;
        let checkpoint = Self::load_checkpoint_tx(&mut tx, network).await?;
        // Persist the freshly created row so the network always has exactly one.
        Self::save_checkpoint_tx(&mut tx, &checkpoint).await?;
        tx.commit().await.map_err(backend_err)?;
        Ok(checkpoint)
    }

    async fn update_checkpoint(
        &self,
        network: &str,
        patch: &CheckpointPatch,
    ) -> Result<IndexerCheckpoint, StoreError> {
        let mut tx = self.pool.begin().await.map_err(backend_err)?;
        let mut checkpoint = Self::load_checkpoint_tx(&mut tx, network).await?;
        checkpoint.apply(patch)?;
        Self::save_checkpoint_tx(&mut tx, &checkpoint).await?;
        tx.commit().await.map_err(backend_err)?;
        Ok(checkpoint)
    }

    async fn transfers(&self, query: &EventQuery) -> Result<Vec<TransferEvent>, StoreError> {
        let cols = ["token", "from_address", "to_address"];
        let mut sql = String::from("SELECT * FROM transfers WHERE 1=1");
        sql.push_str(&filter_sql(query, &cols));
        sql.push_str(page_sql());
        let q = bind_filters(sqlx::query(&sql), query, cols.len());
        let rows = bind_page(q, query)
            .fetch_all(&self.pool)
            .await
            .map_err(backend_err)?;
        Ok(rows.iter().map(row_transfer).collect())
    }

    async fn compliance_events(
        &self,
        query: &EventQuery,
    ) -> Result<Vec<ComplianceEvent>, StoreError> {
        let cols = ["module"];
        let mut sql = String::from("SELECT * FROM compliance_events WHERE 1=1");
        sql.push_str(&filter_sql(query, &cols));
        sql.push_str(page_sql());
        let q = bind_filters(sqlx::query(&sql), query, cols.len());
        let rows = bind_page(q, query)
            .fetch_all(&self.pool)
            .await
            .map_err(backend_err)?;
        rows.iter().map(row_compliance).collect()
    }

    async fn identity_events(&self, query: &EventQuery) -> Result<Vec<IdentityEvent>, StoreError> {
        let cols = ["investor", "identity"];
        let mut sql = String::from("SELECT * FROM identity_events WHERE 1=1");
        sql.push_str(&filter_sql(query, &cols));
        sql.push_str(page_sql());
        let q = bind_filters(sqlx::query(&sql), query, cols.len());
        let rows = bind_page(q, query)
            .fetch_all(&self.pool)
            .await
            .map_err(backend_err)?;
        rows.iter().map(row_identity).collect()
    }

    async fn claim_events(&self, query: &EventQuery) -> Result<Vec<ClaimEvent>, StoreError> {
        let cols = ["identity", "issuer"];
        let mut sql = String::from("SELECT * FROM claim_events WHERE 1=1");
        sql.push_str(&filter_sql(query, &cols));
        sql.push_str(page_sql());
        let q = bind_filters(sqlx::query(&sql), query, cols.len());
        let rows = bind_page(q, query)
            .fetch_all(&self.pool)
            .await
            .map_err(backend_err)?;
        Ok(rows.iter().map(row_claim).collect())
    }

    async fn violations(&self, query: &EventQuery) -> Result<Vec<ComplianceViolation>, StoreError> {
        let cols = ["token", "from_address", "to_address"];
        let mut sql = String::from("SELECT * FROM compliance_violations WHERE 1=1");
        sql.push_str(&filter_sql(query, &cols));
        sql.push_str(page_sql());
        let q = bind_filters(sqlx::query(&sql), query, cols.len());
        let rows = bind_page(q, query)
            .fetch_all(&self.pool)
            .await
            .map_err(backend_err)?;
        Ok(rows.iter().map(row_violation).collect())
    }

    async fn violation_count(&self, network: Option<&str>) -> Result<u64, StoreError> {
        let (sql, bind_network) = match network {
            Some(_) => (
                "SELECT COUNT(*) AS cnt FROM compliance_violations WHERE network = ?",
                true,
            ),
            None => ("SELECT COUNT(*) AS cnt FROM compliance_violations", false),
        };
        let mut q = sqlx::query(sql);
        if bind_network {
            q = q.bind(network.unwrap());
        }
        let row = q.fetch_one(&self.pool).await.map_err(backend_err)?;
        Ok(row.get::<i64, _>("cnt") as u64)
    }

    async fn insert_reorg(&self, record: &ReorgRecord) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO reorg_events
             (network, height, old_hash, new_hash, depth, rewound_to, detected_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&record.network)
        .bind(record.height as i64)
        .bind(&record.old_hash)
        .bind(&record.new_hash)
        .bind(record.depth as i64)
        .bind(record.rewound_to as i64)
        .bind(record.detected_at)
        .execute(&self.pool)
        .await
        .map_err(backend_err)?;
        Ok(())
    }

    async fn reorgs(&self, network: Option<&str>) -> Result<Vec<ReorgRecord>, StoreError> {
        let (sql, bind_network) = match network {
            Some(_) => (
                "SELECT * FROM reorg_events WHERE network = ? ORDER BY detected_at, id",
                true,
            ),
            None => ("SELECT * FROM reorg_events ORDER BY detected_at, id", false),
        };
        let mut q = sqlx::query(sql);
        if bind_network {
            q = q.bind(network.unwrap());
        }
        let rows = q.fetch_all(&self.pool).await.map_err(backend_err)?;
        Ok(rows
            .iter()
            .map(|row| ReorgRecord {
                network: row.get("network"),
                height: row.get::<i64, _>("height") as u64,
                old_hash: row.get("old_hash"),
                new_hash: row.get("new_hash"),
                depth: row.get::<i64, _>("depth") as u64,
                rewound_to: row.get::<i64, _>("rewound_to") as u64,
                detected_at: row.get("detected_at"),
            })
            .collect())
    }

    async fn reorg_count(&self, network: Option<&str>) -> Result<u64, StoreError> {
        let (sql, bind_network) = match network {
            Some(_) => ("SELECT COUNT(*) AS cnt FROM reorg_events WHERE network = ?", true),
            None => ("SELECT COUNT(*) AS cnt FROM reorg_events", false),
        };
        let mut q = sqlx::query(sql);
        if bind_network {
            q = q.bind(network.unwrap());
        }
        let row = q.fetch_one(&self.pool).await.map_err(backend_err)?;
        Ok(row.get::<i64, _>("cnt") as u64)
    }

    async fn record_block_metrics(
        &self,
        network: &str,
        date: NaiveDate,
        delta: &MetricsDelta,
    ) -> Result<(), StoreError> {
        let date_str = date.to_string();
        let mut tx = self.pool.begin().await.map_err(backend_err)?;
        let row = sqlx::query("SELECT * FROM daily_metrics WHERE network = ? AND date = ?")
            .bind(network)
            .bind(&date_str)
            .fetch_optional(&mut *tx)
            .await
            .map_err(backend_err)?;
        let mut day = match row {
            Some(row) => row_daily(&row)?,
            None => DailyMetrics::new(network, date),
        };
        day.fold(delta);
        sqlx::query(
            "INSERT OR REPLACE INTO daily_metrics
             (network, date, blocks_processed, transactions_processed,
              events_indexed, processing_time_ms, avg_block_time_secs)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(network)
        .bind(&date_str)
        .bind(day.blocks_processed as i64)
        .bind(day.transactions_processed as i64)
        .bind(day.events_indexed as i64)
        .bind(day.processing_time_ms as i64)
        .bind(day.avg_block_time_secs)
        .execute(&mut *tx)
        .await
        .map_err(backend_err)?;
        tx.commit().await.map_err(backend_err)?;
        Ok(())
    }

    async fn daily_metrics(
        &self,
        network: &str,
        date: NaiveDate,
    ) -> Result<Option<DailyMetrics>, StoreError> {
        let row = sqlx::query("SELECT * FROM daily_metrics WHERE network = ? AND date = ?")
            .bind(network)
            .bind(date.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(backend_err)?;
        row.as_ref().map(row_daily).transpose()
    }

    async fn upsert_operation(&self, op: &OperationRecord) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT OR REPLACE INTO tracked_operations
             (id, kind, status, network, from_address, to_address, user_address,
              gas_used, started_at, confirmed_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&op.id)
        .bind(op.kind.as_str())
        .bind(op.status.as_str())
        .bind(&op.network)
        .bind(&op.from)
        .bind(&op.to)
        .bind(&op.user)
        .bind(op.gas_used.map(|g| g as i64))
        .bind(op.started_at)
        .bind(op.confirmed_at)
        .execute(&self.pool)
        .await
        .map_err(backend_err)?;
        Ok(())
    }

    async fn operations(&self, query: &OperationQuery) -> Result<Vec<OperationRecord>, StoreError> {
        let mut sql = String::from("SELECT * FROM tracked_operations WHERE 1=1");
        if query.network.is_some() {
            sql.push_str(" AND network = ?");
        }
        if query.kind.is_some() {
            sql.push_str(" AND kind = ?");
        }
        if query.status.is_some() {
            sql.push_str(" AND status = ?");
        }
        sql.push_str(" ORDER BY started_at, id LIMIT ? OFFSET ?");

        let mut q = sqlx::query(&sql);
        if let Some(network) = &query.network {
            q = q.bind(network);
        }
        if let Some(kind) = query.kind {
            q = q.bind(kind.as_str());
        }
        if let Some(status) = query.status {
            q = q.bind(status.as_str());
        }
        let limit = query.limit.map(|l| l as i64).unwrap_or(-1);
        q = q.bind(limit).bind(query.offset as i64);

        let rows = q.fetch_all(&self.pool).await.map_err(backend_err)?;
        rows.iter().map(row_operation).collect()
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use deedstream_core::events::Provenance;

    fn event(network: &str, block: u64, log_index: u32) -> LogEvent {
        LogEvent {
            network: network.into(),
            address: "0x1111111111111111111111111111111111111111".into(),
            topics: vec!["0xddf252ad".into()],
            data: "0x".into(),
            block_number: block,
            tx_hash: format!("0x{block:064x}"),
            tx_index: 0,
            block_hash: format!("0xaa{block:x}"),
            log_index,
            timestamp: 1_700_000_000 + block as i64,
            removed: false,
        }
    }

    fn prov(network: &str, block: u64, log_index: u32) -> Provenance {
        Provenance {
            network: network.into(),
            block_number: block,
            tx_hash: format!("0x{block:064x}"),
            log_index,
            timestamp: 1_700_000_000 + block as i64,
        }
    }

    fn transfer(network: &str, block: u64, log_index: u32) -> DomainEvent {
        DomainEvent::Transfer(TransferEvent {
            provenance: prov(network, block, log_index),
            token: "0x1111111111111111111111111111111111111111".into(),
            from: "0x2222222222222222222222222222222222222222".into(),
            to: "0x3333333333333333333333333333333333333333".into(),
            amount: "1000".into(),
        })
    }

    fn violation(network: &str, block: u64, log_index: u32, reason: &str) -> DomainEvent {
        DomainEvent::Violation(ComplianceViolation {
            provenance: prov(network, block, log_index),
            token: "0x1111111111111111111111111111111111111111".into(),
            from: "0x2222222222222222222222222222222222222222".into(),
            to: "0x3333333333333333333333333333333333333333".into(),
            amount: "500".into(),
            reason: reason.into(),
        })
    }

    fn commit(network: &str, block: u64, logs: u32) -> BlockCommit {
        let events: Vec<LogEvent> = (0..logs).map(|i| event(network, block, i)).collect();
        let domain: Vec<DomainEvent> = (0..logs).map(|i| transfer(network, block, i)).collect();
        BlockCommit {
            network: network.into(),
            block_number: block,
            block_hash: format!("0xaa{block:x}"),
            last_tx_hash: events.last().map(|e| e.tx_hash.clone()),
            events,
            domain,
        }
    }

    // ── Idempotence ───────────────────────────────────────────────────────────

    #[tokio::test]
    async fn duplicate_insert_is_noop() {
        let store = SqliteStore::in_memory().await.unwrap();
        let e = event("sepolia", 100, 0);
        assert_eq!(store.insert_event(&e).await.unwrap(), InsertOutcome::Inserted);
        assert_eq!(store.insert_event(&e).await.unwrap(), InsertOutcome::Duplicate);
        assert_eq!(store.event_count(Some("sepolia")).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn batch_insert_partial_failure() {
        let store = SqliteStore::in_memory().await.unwrap();
        let mut events: Vec<LogEvent> =
            (0..4).map(|i| event("sepolia", 100 + i as u64, 0)).collect();
        let mut bad = event("sepolia", 104, 0);
        bad.tx_hash = "not-a-hash".into();
        events.push(bad);

        let report = store.insert_events_batch(&events).await.unwrap();
        assert_eq!(report.inserted, 4);
        assert_eq!(report.failed, 1);
        // The four valid rows are queryable afterwards.
        let stored = store.events(&EventQuery::network("sepolia")).await.unwrap();
        assert_eq!(stored.len(), 4);
    }

    // ── Checkpoints ───────────────────────────────────────────────────────────

    #[tokio::test]
    async fn checkpoint_created_on_first_access() {
        let store = SqliteStore::in_memory().await.unwrap();
        let cp = store.checkpoint("sepolia").await.unwrap();
        assert_eq!(cp.status, CheckpointStatus::Initialized);
        assert_eq!(cp.last_processed_block, 0);

        // Row persisted — a second read sees the same single row.
        let again = store.checkpoint("sepolia").await.unwrap();
        assert_eq!(again.status, CheckpointStatus::Initialized);
    }

    #[tokio::test]
    async fn monotonic_progress() {
        let store = SqliteStore::in_memory().await.unwrap();
        for block in [100u64, 101, 102] {
            store.commit_block(&commit("sepolia", block, 1)).await.unwrap();
        }
        assert_eq!(
            store.checkpoint("sepolia").await.unwrap().last_processed_block,
            102
        );

        let err = store
            .commit_block(&commit("sepolia", 50, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NonMonotonic { .. }));
        assert_eq!(
            store.checkpoint("sepolia").await.unwrap().last_processed_block,
            102
        );
        // The rejected commit's rows rolled back with it.
        assert_eq!(store.event_count(None).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn status_transitions_enforced_through_store() {
        let store = SqliteStore::in_memory().await.unwrap();
        store.checkpoint("sepolia").await.unwrap();
        let err = store
            .update_checkpoint("sepolia", &CheckpointPatch::status(CheckpointStatus::Paused))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidTransition { .. }));

        let cp = store
            .update_checkpoint("sepolia", &CheckpointPatch::status(CheckpointStatus::Running))
            .await
            .unwrap();
        assert_eq!(cp.status, CheckpointStatus::Running);
    }

    // ── Restart replay ────────────────────────────────────────────────────────

    #[tokio::test]
    async fn replayed_commit_is_idempotent() {
        let store = SqliteStore::in_memory().await.unwrap();
        let c = commit("sepolia", 100, 2);
        let first = store.commit_block(&c).await.unwrap();
        assert_eq!(first.events_inserted, 2);
        assert_eq!(first.domain_inserted, 2);

        // Identical batch redelivered after a simulated restart.
        let second = store.commit_block(&c).await.unwrap();
        assert_eq!(second.events_inserted, 0);
        assert_eq!(second.duplicates, 2);
        assert_eq!(second.domain_inserted, 0);
        assert_eq!(store.event_count(None).await.unwrap(), 2);
        assert_eq!(
            store.checkpoint("sepolia").await.unwrap().last_processed_block,
            100
        );
    }

    // ── Reorg rewind ──────────────────────────────────────────────────────────

    #[tokio::test]
    async fn rewind_marks_removed_and_prunes_hashes() {
        let store = SqliteStore::in_memory().await.unwrap();
        for block in 98..=102u64 {
            store.commit_block(&commit("sepolia", block, 1)).await.unwrap();
        }
        let retracted = store.apply_rewind("sepolia", 99).await.unwrap();
        assert_eq!(retracted, 3);

        let visible = store.events(&EventQuery::network("sepolia")).await.unwrap();
        assert_eq!(visible.len(), 2);
        let all = store
            .events(&EventQuery::network("sepolia").include_removed())
            .await
            .unwrap();
        assert_eq!(all.len(), 5);

        let hashes = store.recent_block_hashes("sepolia", 10).await.unwrap();
        assert_eq!(hashes.len(), 2);
        assert_eq!(hashes.last().unwrap().0, 99);
    }

    #[tokio::test]
    async fn rewind_does_not_affect_other_networks() {
        let store = SqliteStore::in_memory().await.unwrap();
        store.commit_block(&commit("sepolia", 100, 1)).await.unwrap();
        store.commit_block(&commit("polygon", 100, 1)).await.unwrap();

        store.apply_rewind("sepolia", 99).await.unwrap();

        let polygon = store.events(&EventQuery::network("polygon")).await.unwrap();
        assert_eq!(polygon.len(), 1);
        assert_eq!(
            store.recent_block_hashes("polygon", 10).await.unwrap().len(),
            1
        );
    }

    #[tokio::test]
    async fn reorg_records_roundtrip() {
        let store = SqliteStore::in_memory().await.unwrap();
        store
            .insert_reorg(&ReorgRecord {
                network: "sepolia".into(),
                height: 100,
                old_hash: "0xAA".into(),
                new_hash: "0xBB".into(),
                depth: 1,
                rewound_to: 99,
                detected_at: 1_700_000_000,
            })
            .await
            .unwrap();

        let records = store.reorgs(Some("sepolia")).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].old_hash, "0xAA");
        assert_eq!(records[0].rewound_to, 99);
        assert_eq!(store.reorg_count(Some("sepolia")).await.unwrap(), 1);
        assert_eq!(store.reorg_count(Some("polygon")).await.unwrap(), 0);
    }

    // ── Domain projections ────────────────────────────────────────────────────

    #[tokio::test]
    async fn domain_rows_queryable_by_address() {
        let store = SqliteStore::in_memory().await.unwrap();
        let mut c = commit("sepolia", 100, 1);
        c.domain.push(violation("sepolia", 100, 1, "lockup active"));
        store.commit_block(&c).await.unwrap();

        let by_sender = store
            .transfers(
                &EventQuery::network("sepolia")
                    .address("0x2222222222222222222222222222222222222222"),
            )
            .await
            .unwrap();
        assert_eq!(by_sender.len(), 1);
        assert_eq!(by_sender[0].amount, "1000");

        let violations = store.violations(&EventQuery::network("sepolia")).await.unwrap();
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].reason, "lockup active");
        assert_eq!(store.violation_count(Some("sepolia")).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn event_pagination() {
        let store = SqliteStore::in_memory().await.unwrap();
        for block in 100..110u64 {
            store.insert_event(&event("sepolia", block, 0)).await.unwrap();
        }
        let page = store
            .events(&EventQuery::network("sepolia").page(3, 4))
            .await
            .unwrap();
        assert_eq!(page.len(), 3);
        assert_eq!(page[0].block_number, 104);
    }

    #[tokio::test]
    async fn topics_roundtrip_as_json() {
        let store = SqliteStore::in_memory().await.unwrap();
        let mut e = event("sepolia", 100, 0);
        e.topics = vec!["0xaaa".into(), "0xbbb".into()];
        store.insert_event(&e).await.unwrap();

        let stored = store.events(&EventQuery::network("sepolia")).await.unwrap();
        assert_eq!(stored[0].topics, vec!["0xaaa".to_string(), "0xbbb".to_string()]);
    }

    // ── Daily metrics ─────────────────────────────────────────────────────────

    #[tokio::test]
    async fn daily_metrics_upsert_in_place() {
        let store = SqliteStore::in_memory().await.unwrap();
        let date = NaiveDate::from_ymd_opt(2026, 8, 6).unwrap();
        store
            .record_block_metrics(
                "sepolia",
                date,
                &MetricsDelta {
                    transactions: 2,
                    events: 3,
                    processing_time_ms: 10,
                    block_time_secs: None,
                },
            )
            .await
            .unwrap();
        store
            .record_block_metrics(
                "sepolia",
                date,
                &MetricsDelta {
                    transactions: 1,
                    events: 1,
                    processing_time_ms: 5,
                    block_time_secs: Some(12.0),
                },
            )
            .await
            .unwrap();

        let day = store.daily_metrics("sepolia", date).await.unwrap().unwrap();
        assert_eq!(day.blocks_processed, 2);
        assert_eq!(day.transactions_processed, 3);
        assert_eq!(day.events_indexed, 4);
        assert_eq!(day.processing_time_ms, 15);
        assert!((day.avg_block_time_secs - 12.0).abs() < 1e-9);

        assert!(store
            .daily_metrics("sepolia", NaiveDate::from_ymd_opt(2026, 8, 7).unwrap())
            .await
            .unwrap()
            .is_none());
    }

    // ── Tracked operations ────────────────────────────────────────────────────

    #[tokio::test]
    async fn operations_filter_and_upsert() {
        let store = SqliteStore::in_memory().await.unwrap();
        let mut op = OperationRecord {
            id: "0xop1".into(),
            kind: OperationKind::Deployment,
            status: OperationStatus::Pending,
            network: "sepolia".into(),
            from: Some("0x1".into()),
            to: None,
            user: None,
            gas_used: None,
            started_at: 1_700_000_000,
            confirmed_at: None,
        };
        store.upsert_operation(&op).await.unwrap();
        op.status = OperationStatus::Confirmed;
        op.gas_used = Some(400_000);
        op.confirmed_at = Some(1_700_000_025);
        store.upsert_operation(&op).await.unwrap();

        let confirmed = store
            .operations(
                &OperationQuery::network("sepolia").status(OperationStatus::Confirmed),
            )
            .await
            .unwrap();
        assert_eq!(confirmed.len(), 1);
        assert_eq!(confirmed[0].gas_used, Some(400_000));

        let pending = store
            .operations(&OperationQuery::network("sepolia").status(OperationStatus::Pending))
            .await
            .unwrap();
        assert!(pending.is_empty());
    }
}
