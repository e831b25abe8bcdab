//! Postgres-backed ledger store.
//!
//! ## Error Mapping
//!
//! SQLx errors are mapped to `LedgerError` as follows:
//!
//! | SQLx Error | PostgreSQL Error Code | LedgerError | Scenario |
//! |------------|----------------------|-------------|----------|
//! | Database (unique violation) | `23505` | `Conflict` | Concurrent insert of the same account code / entry number |
//! | Database (serialization failure) | `40001` | `Conflict` | Transaction lost a serialization race |
//! | Database (deadlock) | `40P01` | `Conflict` | Two transactions locked rows in opposite order |
//! | Database (other) | Any other | `Store` | Other database errors |
//! | PoolTimedOut / PoolClosed / Io | N/A | `Store` | Connection loss, timeouts |
//!
//! `Conflict` and `Store` are both transient: the whole operation may be
//! retried because it ran in one transaction.
//!
//! ## Locking
//!
//! - `*_for_update` reads use `SELECT ... FOR UPDATE`; `get_account_for_share`
//!   uses `FOR SHARE`, so an account that new lines or children point at
//!   cannot be deleted until the writer commits.
//! - Balances change with `UPDATE ... SET balance = balance + $delta`, so two
//!   entries posting to the same account serialize on the row lock. Post and
//!   void touch accounts in id order.
//! - Entry numbering takes a transaction-scoped advisory lock keyed by the
//!   tenant before scanning for the highest number.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::instrument;
use uuid::Uuid;

use ledgerkit_accounting::{
    Account, AccountCategory, AccountType, JournalEntry, JournalEntryFilter, JournalEntryLine, JournalStats,
    JournalStatus, LedgerError, LedgerResult,
};
use ledgerkit_core::{AccountId, JournalEntryId, JournalLineId, TenantId, UserId};

use super::{LedgerStore, LedgerTx};
use crate::config::LedgerConfig;

/// Idempotent schema for the ledger tables.
pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS accounts (
    id            UUID PRIMARY KEY,
    tenant_id     UUID NOT NULL,
    code          TEXT NOT NULL,
    name          TEXT NOT NULL,
    account_type  TEXT NOT NULL,
    category      TEXT NOT NULL,
    description   TEXT,
    parent_id     UUID REFERENCES accounts (id),
    balance       NUMERIC NOT NULL DEFAULT 0,
    is_active     BOOLEAN NOT NULL DEFAULT TRUE,
    is_deleted    BOOLEAN NOT NULL DEFAULT FALSE,
    created_by    UUID NOT NULL,
    updated_by    UUID NOT NULL,
    created_at    TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at    TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE UNIQUE INDEX IF NOT EXISTS accounts_tenant_code_live
    ON accounts (tenant_id, code) WHERE NOT is_deleted;
CREATE INDEX IF NOT EXISTS accounts_tenant_parent
    ON accounts (tenant_id, parent_id);

CREATE TABLE IF NOT EXISTS journal_entries (
    id               UUID PRIMARY KEY,
    tenant_id        UUID NOT NULL,
    entry_number     TEXT NOT NULL,
    reference        TEXT,
    description      TEXT,
    transaction_date DATE NOT NULL,
    status           TEXT NOT NULL CHECK (status IN ('DRAFT', 'POSTED', 'VOIDED')),
    created_by       UUID NOT NULL,
    updated_by       UUID NOT NULL,
    is_deleted       BOOLEAN NOT NULL DEFAULT FALSE,
    posted_at        TIMESTAMPTZ,
    voided_at        TIMESTAMPTZ,
    created_at       TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at       TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    UNIQUE (tenant_id, entry_number)
);

CREATE INDEX IF NOT EXISTS journal_entries_tenant_status
    ON journal_entries (tenant_id, status) WHERE NOT is_deleted;

CREATE TABLE IF NOT EXISTS journal_entry_lines (
    id          UUID PRIMARY KEY,
    entry_id    UUID NOT NULL REFERENCES journal_entries (id) ON DELETE CASCADE,
    account_id  UUID NOT NULL REFERENCES accounts (id),
    debit       NUMERIC NOT NULL DEFAULT 0 CHECK (debit >= 0),
    credit      NUMERIC NOT NULL DEFAULT 0 CHECK (credit >= 0),
    description TEXT,
    reference   TEXT,
    position    INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS journal_entry_lines_entry ON journal_entry_lines (entry_id);
CREATE INDEX IF NOT EXISTS journal_entry_lines_account ON journal_entry_lines (account_id);
"#;

const ACCOUNT_COLUMNS: &str = "id, tenant_id, code, name, account_type, category, description, parent_id, \
     balance, is_active, is_deleted, created_by, updated_by, created_at, updated_at";

const ENTRY_COLUMNS: &str = "id, tenant_id, entry_number, reference, description, transaction_date, status, \
     created_by, updated_by, is_deleted, posted_at, voided_at, created_at, updated_at";

const LINE_COLUMNS: &str = "id, entry_id, account_id, debit, credit, description, reference, position";

/// Postgres-backed ledger store.
///
/// `Send + Sync`; cloning shares the underlying connection pool.
#[derive(Debug, Clone)]
pub struct PostgresLedgerStore {
    pool: Arc<PgPool>,
}

impl PostgresLedgerStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool: Arc::new(pool) }
    }

    /// Open a pool from configuration. Fails if no database URL is configured.
    pub async fn connect(config: &LedgerConfig) -> LedgerResult<Self> {
        let url = config
            .database_url
            .as_deref()
            .ok_or_else(|| LedgerError::store("DATABASE_URL is not configured"))?;
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    /// Apply [`SCHEMA`]. Safe to run repeatedly.
    #[instrument(skip(self), err)]
    pub async fn migrate(&self) -> LedgerResult<()> {
        sqlx::raw_sql(SCHEMA)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("migrate", e))?;
        Ok(())
    }
}

#[async_trait]
impl LedgerStore for PostgresLedgerStore {
    type Tx = PostgresTx;

    async fn begin(&self) -> LedgerResult<PostgresTx> {
        let tx = self.pool.begin().await.map_err(|e| map_sqlx_error("begin", e))?;
        Ok(PostgresTx { tx })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RowLock {
    None,
    Share,
    Update,
}

impl RowLock {
    fn clause(self) -> &'static str {
        match self {
            RowLock::None => "",
            RowLock::Share => " FOR SHARE",
            RowLock::Update => " FOR UPDATE",
        }
    }
}

/// Transaction over [`PostgresLedgerStore`]. Rolls back on drop.
pub struct PostgresTx {
    tx: Transaction<'static, Postgres>,
}

impl PostgresTx {
    async fn fetch_account(&mut self, tenant_id: TenantId, id: AccountId, lock: RowLock) -> LedgerResult<Option<Account>> {
        let sql = format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts \
             WHERE tenant_id = $1 AND id = $2 AND NOT is_deleted{}",
            lock.clause()
        );
        let row = sqlx::query(&sql)
            .bind(tenant_id.as_uuid())
            .bind(id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("get_account", e))?;
        row.as_ref().map(account_from_row).transpose()
    }

    async fn fetch_entry(&mut self, tenant_id: TenantId, id: JournalEntryId, lock: RowLock) -> LedgerResult<Option<JournalEntry>> {
        let sql = format!(
            "SELECT {ENTRY_COLUMNS} FROM journal_entries \
             WHERE tenant_id = $1 AND id = $2 AND NOT is_deleted{}",
            lock.clause()
        );
        let row = sqlx::query(&sql)
            .bind(tenant_id.as_uuid())
            .bind(id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("get_entry", e))?;

        let Some(row) = row else {
            return Ok(None);
        };
        let mut entry = entry_from_row(&row)?;
        let mut lines = self.fetch_lines(&[*entry.id.as_uuid()]).await?;
        entry.lines = lines.remove(&entry.id).unwrap_or_default();
        Ok(Some(entry))
    }

    async fn fetch_lines(&mut self, entry_ids: &[Uuid]) -> LedgerResult<HashMap<JournalEntryId, Vec<JournalEntryLine>>> {
        if entry_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let sql = format!(
            "SELECT {LINE_COLUMNS} FROM journal_entry_lines \
             WHERE entry_id = ANY($1) ORDER BY entry_id, position"
        );
        let rows = sqlx::query(&sql)
            .bind(entry_ids)
            .fetch_all(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("fetch_lines", e))?;

        let mut by_entry: HashMap<JournalEntryId, Vec<JournalEntryLine>> = HashMap::new();
        for row in &rows {
            let line = line_from_row(row)?;
            by_entry.entry(line.entry_id).or_default().push(line);
        }
        Ok(by_entry)
    }

    async fn insert_lines(&mut self, lines: &[JournalEntryLine]) -> LedgerResult<()> {
        for line in lines {
            sqlx::query(
                r#"
                INSERT INTO journal_entry_lines
                    (id, entry_id, account_id, debit, credit, description, reference, position)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(line.id.as_uuid())
            .bind(line.entry_id.as_uuid())
            .bind(line.account_id.as_uuid())
            .bind(line.debit)
            .bind(line.credit)
            .bind(line.description.as_deref())
            .bind(line.reference.as_deref())
            .bind(line.position as i32)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("insert_line", e))?;
        }
        Ok(())
    }
}

#[async_trait]
impl LedgerTx for PostgresTx {
    async fn get_account(&mut self, tenant_id: TenantId, id: AccountId) -> LedgerResult<Option<Account>> {
        self.fetch_account(tenant_id, id, RowLock::None).await
    }

    async fn get_account_for_update(&mut self, tenant_id: TenantId, id: AccountId) -> LedgerResult<Option<Account>> {
        self.fetch_account(tenant_id, id, RowLock::Update).await
    }

    async fn get_account_for_share(&mut self, tenant_id: TenantId, id: AccountId) -> LedgerResult<Option<Account>> {
        self.fetch_account(tenant_id, id, RowLock::Share).await
    }

    async fn find_account_by_code(&mut self, tenant_id: TenantId, code: &str) -> LedgerResult<Option<Account>> {
        let sql = format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts \
             WHERE tenant_id = $1 AND code = $2 AND NOT is_deleted"
        );
        let row = sqlx::query(&sql)
            .bind(tenant_id.as_uuid())
            .bind(code)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("find_account_by_code", e))?;
        row.as_ref().map(account_from_row).transpose()
    }

    async fn list_accounts(&mut self, tenant_id: TenantId) -> LedgerResult<Vec<Account>> {
        let sql = format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts \
             WHERE tenant_id = $1 AND NOT is_deleted ORDER BY code, name"
        );
        let rows = sqlx::query(&sql)
            .bind(tenant_id.as_uuid())
            .fetch_all(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("list_accounts", e))?;
        rows.iter().map(account_from_row).collect()
    }

    async fn insert_account(&mut self, account: &Account) -> LedgerResult<()> {
        sqlx::query(
            r#"
            INSERT INTO accounts (
                id, tenant_id, code, name, account_type, category, description, parent_id,
                balance, is_active, is_deleted, created_by, updated_by, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            "#,
        )
        .bind(account.id.as_uuid())
        .bind(account.tenant_id.as_uuid())
        .bind(&account.code)
        .bind(&account.name)
        .bind(account.account_type.as_str())
        .bind(account.category.as_str())
        .bind(account.description.as_deref())
        .bind(account.parent_id.map(Uuid::from))
        .bind(account.balance)
        .bind(account.is_active)
        .bind(account.is_deleted)
        .bind(account.created_by.as_uuid())
        .bind(account.updated_by.as_uuid())
        .bind(account.created_at)
        .bind(account.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_account", e))?;
        Ok(())
    }

    async fn update_account(&mut self, account: &Account) -> LedgerResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE accounts SET
                code = $3,
                name = $4,
                account_type = $5,
                category = $6,
                description = $7,
                parent_id = $8,
                is_active = $9,
                is_deleted = $10,
                updated_by = $11,
                updated_at = $12
            WHERE tenant_id = $1 AND id = $2
            "#,
        )
        .bind(account.tenant_id.as_uuid())
        .bind(account.id.as_uuid())
        .bind(&account.code)
        .bind(&account.name)
        .bind(account.account_type.as_str())
        .bind(account.category.as_str())
        .bind(account.description.as_deref())
        .bind(account.parent_id.map(Uuid::from))
        .bind(account.is_active)
        .bind(account.is_deleted)
        .bind(account.updated_by.as_uuid())
        .bind(account.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("update_account", e))?;

        if result.rows_affected() == 0 {
            return Err(LedgerError::AccountNotFound(account.id));
        }
        Ok(())
    }

    async fn add_to_balance(&mut self, tenant_id: TenantId, id: AccountId, delta: Decimal) -> LedgerResult<Decimal> {
        let row = sqlx::query(
            r#"
            UPDATE accounts
            SET balance = balance + $3, updated_at = NOW()
            WHERE tenant_id = $1 AND id = $2 AND NOT is_deleted
            RETURNING balance
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(id.as_uuid())
        .bind(delta)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("add_to_balance", e))?
        .ok_or(LedgerError::AccountNotFound(id))?;

        row.try_get("balance").map_err(|e| map_sqlx_error("add_to_balance", e))
    }

    async fn count_children(&mut self, tenant_id: TenantId, id: AccountId) -> LedgerResult<u64> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS total FROM accounts WHERE tenant_id = $1 AND parent_id = $2 AND NOT is_deleted",
        )
        .bind(tenant_id.as_uuid())
        .bind(id.as_uuid())
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("count_children", e))?;
        count_from_row(&row, "total")
    }

    async fn count_line_references(&mut self, tenant_id: TenantId, id: AccountId) -> LedgerResult<u64> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) AS total
            FROM journal_entry_lines l
            JOIN journal_entries e ON e.id = l.entry_id
            WHERE e.tenant_id = $1 AND l.account_id = $2
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(id.as_uuid())
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("count_line_references", e))?;
        count_from_row(&row, "total")
    }

    async fn get_entry(&mut self, tenant_id: TenantId, id: JournalEntryId) -> LedgerResult<Option<JournalEntry>> {
        self.fetch_entry(tenant_id, id, RowLock::None).await
    }

    async fn get_entry_for_update(&mut self, tenant_id: TenantId, id: JournalEntryId) -> LedgerResult<Option<JournalEntry>> {
        self.fetch_entry(tenant_id, id, RowLock::Update).await
    }

    async fn list_entries(&mut self, tenant_id: TenantId, filter: &JournalEntryFilter) -> LedgerResult<Vec<JournalEntry>> {
        let sql = format!(
            r#"
            SELECT {ENTRY_COLUMNS} FROM journal_entries e
            WHERE e.tenant_id = $1
                AND NOT e.is_deleted
                AND ($2::text IS NULL OR e.status = $2)
                AND ($3::date IS NULL OR e.transaction_date >= $3)
                AND ($4::date IS NULL OR e.transaction_date <= $4)
                AND ($5::text IS NULL OR strpos(lower(coalesce(e.reference, '')), lower($5)) > 0)
                AND ($6::uuid IS NULL OR EXISTS (
                    SELECT 1 FROM journal_entry_lines l WHERE l.entry_id = e.id AND l.account_id = $6
                ))
            ORDER BY e.transaction_date DESC, length(e.entry_number) DESC, e.entry_number DESC
            "#
        );
        let rows = sqlx::query(&sql)
            .bind(tenant_id.as_uuid())
            .bind(filter.status.map(JournalStatus::as_str))
            .bind(filter.date_from)
            .bind(filter.date_to)
            .bind(filter.reference.as_deref())
            .bind(filter.account_id.map(Uuid::from))
            .fetch_all(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("list_entries", e))?;

        let mut entries = rows.iter().map(entry_from_row).collect::<LedgerResult<Vec<_>>>()?;
        let ids: Vec<Uuid> = entries.iter().map(|e| *e.id.as_uuid()).collect();
        let mut lines = self.fetch_lines(&ids).await?;
        for entry in &mut entries {
            entry.lines = lines.remove(&entry.id).unwrap_or_default();
        }
        Ok(entries)
    }

    async fn highest_entry_number(&mut self, tenant_id: TenantId, prefix: &str) -> LedgerResult<Option<String>> {
        sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1::text, 0))")
            .bind(format!("journal_entries:{tenant_id}"))
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("lock_entry_numbering", e))?;

        let row = sqlx::query(
            r#"
            SELECT entry_number FROM journal_entries
            WHERE tenant_id = $1
                AND starts_with(entry_number, $2)
                AND substr(entry_number, length($2) + 1) ~ '^[0-9]+$'
            ORDER BY length(entry_number) DESC, entry_number DESC
            LIMIT 1
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(prefix)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("highest_entry_number", e))?;

        row.map(|r| r.try_get("entry_number"))
            .transpose()
            .map_err(|e| map_sqlx_error("highest_entry_number", e))
    }

    async fn insert_entry(&mut self, entry: &JournalEntry) -> LedgerResult<()> {
        sqlx::query(
            r#"
            INSERT INTO journal_entries (
                id, tenant_id, entry_number, reference, description, transaction_date, status,
                created_by, updated_by, is_deleted, posted_at, voided_at, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(entry.id.as_uuid())
        .bind(entry.tenant_id.as_uuid())
        .bind(&entry.entry_number)
        .bind(entry.reference.as_deref())
        .bind(entry.description.as_deref())
        .bind(entry.transaction_date)
        .bind(entry.status.as_str())
        .bind(entry.created_by.as_uuid())
        .bind(entry.updated_by.as_uuid())
        .bind(entry.is_deleted)
        .bind(entry.posted_at)
        .bind(entry.voided_at)
        .bind(entry.created_at)
        .bind(entry.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_entry", e))?;

        self.insert_lines(&entry.lines).await
    }

    async fn update_entry(&mut self, entry: &JournalEntry) -> LedgerResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE journal_entries SET
                reference = $3,
                description = $4,
                transaction_date = $5,
                status = $6,
                updated_by = $7,
                is_deleted = $8,
                posted_at = $9,
                voided_at = $10,
                updated_at = $11
            WHERE tenant_id = $1 AND id = $2
            "#,
        )
        .bind(entry.tenant_id.as_uuid())
        .bind(entry.id.as_uuid())
        .bind(entry.reference.as_deref())
        .bind(entry.description.as_deref())
        .bind(entry.transaction_date)
        .bind(entry.status.as_str())
        .bind(entry.updated_by.as_uuid())
        .bind(entry.is_deleted)
        .bind(entry.posted_at)
        .bind(entry.voided_at)
        .bind(entry.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("update_entry", e))?;

        if result.rows_affected() == 0 {
            return Err(LedgerError::EntryNotFound(entry.id));
        }
        Ok(())
    }

    async fn replace_entry_lines(
        &mut self,
        tenant_id: TenantId,
        entry_id: JournalEntryId,
        lines: &[JournalEntryLine],
    ) -> LedgerResult<()> {
        // Tenant check goes through the owning entry; lines carry no tenant column.
        sqlx::query(
            r#"
            DELETE FROM journal_entry_lines l
            USING journal_entries e
            WHERE e.id = l.entry_id AND e.tenant_id = $1 AND l.entry_id = $2
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(entry_id.as_uuid())
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("delete_lines", e))?;

        self.insert_lines(lines).await
    }

    async fn entry_stats(&mut self, tenant_id: TenantId) -> LedgerResult<JournalStats> {
        let counts = sqlx::query(
            r#"
            SELECT
                COUNT(*) AS total,
                COUNT(*) FILTER (WHERE status = 'DRAFT') AS draft,
                COUNT(*) FILTER (WHERE status = 'POSTED') AS posted,
                COUNT(*) FILTER (WHERE status = 'VOIDED') AS voided
            FROM journal_entries
            WHERE tenant_id = $1 AND NOT is_deleted
            "#,
        )
        .bind(tenant_id.as_uuid())
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("entry_stats", e))?;

        let sums = sqlx::query(
            r#"
            SELECT
                COALESCE(SUM(l.debit), 0) AS debits,
                COALESCE(SUM(l.credit), 0) AS credits
            FROM journal_entry_lines l
            JOIN journal_entries e ON e.id = l.entry_id
            WHERE e.tenant_id = $1 AND NOT e.is_deleted AND e.status = 'POSTED'
            "#,
        )
        .bind(tenant_id.as_uuid())
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("entry_stats", e))?;

        Ok(JournalStats {
            total: count_from_row(&counts, "total")?,
            draft: count_from_row(&counts, "draft")?,
            posted: count_from_row(&counts, "posted")?,
            voided: count_from_row(&counts, "voided")?,
            posted_debits: sums.try_get("debits").map_err(|e| map_sqlx_error("entry_stats", e))?,
            posted_credits: sums.try_get("credits").map_err(|e| map_sqlx_error("entry_stats", e))?,
        })
    }

    async fn commit(self) -> LedgerResult<()> {
        self.tx.commit().await.map_err(|e| map_sqlx_error("commit", e))
    }
}

fn account_from_row(row: &PgRow) -> LedgerResult<Account> {
    let decode = |e: sqlx::Error| map_sqlx_error("decode_account", e);
    let account_type: String = row.try_get("account_type").map_err(decode)?;
    let category: String = row.try_get("category").map_err(decode)?;

    Ok(Account {
        id: AccountId::from_uuid(row.try_get("id").map_err(decode)?),
        tenant_id: TenantId::from_uuid(row.try_get("tenant_id").map_err(decode)?),
        code: row.try_get("code").map_err(decode)?,
        name: row.try_get("name").map_err(decode)?,
        account_type: AccountType::from_str(&account_type).map_err(corrupt_row)?,
        category: AccountCategory::from_str(&category).map_err(corrupt_row)?,
        description: row.try_get("description").map_err(decode)?,
        parent_id: row
            .try_get::<Option<Uuid>, _>("parent_id")
            .map_err(decode)?
            .map(AccountId::from_uuid),
        balance: row.try_get("balance").map_err(decode)?,
        is_active: row.try_get("is_active").map_err(decode)?,
        is_deleted: row.try_get("is_deleted").map_err(decode)?,
        created_by: UserId::from_uuid(row.try_get("created_by").map_err(decode)?),
        updated_by: UserId::from_uuid(row.try_get("updated_by").map_err(decode)?),
        created_at: row.try_get("created_at").map_err(decode)?,
        updated_at: row.try_get("updated_at").map_err(decode)?,
    })
}

fn entry_from_row(row: &PgRow) -> LedgerResult<JournalEntry> {
    let decode = |e: sqlx::Error| map_sqlx_error("decode_entry", e);
    let status: String = row.try_get("status").map_err(decode)?;
    let transaction_date: NaiveDate = row.try_get("transaction_date").map_err(decode)?;
    let posted_at: Option<DateTime<Utc>> = row.try_get("posted_at").map_err(decode)?;
    let voided_at: Option<DateTime<Utc>> = row.try_get("voided_at").map_err(decode)?;

    Ok(JournalEntry {
        id: JournalEntryId::from_uuid(row.try_get("id").map_err(decode)?),
        tenant_id: TenantId::from_uuid(row.try_get("tenant_id").map_err(decode)?),
        entry_number: row.try_get("entry_number").map_err(decode)?,
        reference: row.try_get("reference").map_err(decode)?,
        description: row.try_get("description").map_err(decode)?,
        transaction_date,
        status: JournalStatus::from_str(&status).map_err(corrupt_row)?,
        lines: Vec::new(),
        created_by: UserId::from_uuid(row.try_get("created_by").map_err(decode)?),
        updated_by: UserId::from_uuid(row.try_get("updated_by").map_err(decode)?),
        is_deleted: row.try_get("is_deleted").map_err(decode)?,
        posted_at,
        voided_at,
        created_at: row.try_get("created_at").map_err(decode)?,
        updated_at: row.try_get("updated_at").map_err(decode)?,
    })
}

fn line_from_row(row: &PgRow) -> LedgerResult<JournalEntryLine> {
    let decode = |e: sqlx::Error| map_sqlx_error("decode_line", e);
    let position: i32 = row.try_get("position").map_err(decode)?;

    Ok(JournalEntryLine {
        id: JournalLineId::from_uuid(row.try_get("id").map_err(decode)?),
        entry_id: JournalEntryId::from_uuid(row.try_get("entry_id").map_err(decode)?),
        account_id: AccountId::from_uuid(row.try_get("account_id").map_err(decode)?),
        debit: row.try_get("debit").map_err(decode)?,
        credit: row.try_get("credit").map_err(decode)?,
        description: row.try_get("description").map_err(decode)?,
        reference: row.try_get("reference").map_err(decode)?,
        position: position.max(0) as u32,
    })
}

fn count_from_row(row: &PgRow, column: &str) -> LedgerResult<u64> {
    let n: i64 = row.try_get(column).map_err(|e| map_sqlx_error("count", e))?;
    Ok(n.max(0) as u64)
}

/// A stored enum column no longer parses: the row is corrupt, not the request.
fn corrupt_row(err: LedgerError) -> LedgerError {
    LedgerError::store(format!("corrupt row: {err}"))
}

/// Map SQLx errors to `LedgerError`.
///
/// See the module-level docs for the mapping table.
pub(crate) fn map_sqlx_error(operation: &str, err: sqlx::Error) -> LedgerError {
    match &err {
        sqlx::Error::Database(db_err) => {
            let code = db_err.code();
            match code.as_deref() {
                Some("23505") | Some("40001") | Some("40P01") => {
                    LedgerError::conflict(format!("{operation}: {}", db_err.message()))
                }
                _ => LedgerError::store(format!(
                    "{operation}: database error (code: {}): {}",
                    code.as_deref().unwrap_or("unknown"),
                    db_err.message()
                )),
            }
        }
        _ => LedgerError::store(format!("{operation}: {err}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_lock_clauses() {
        assert_eq!(RowLock::None.clause(), "");
        assert_eq!(RowLock::Share.clause(), " FOR SHARE");
        assert_eq!(RowLock::Update.clause(), " FOR UPDATE");
    }
}
