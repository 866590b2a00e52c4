//! SQLite-backed player store.

use std::collections::BTreeSet;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, Sqlite, SqlitePool, Transaction};
use wyrmhold_domain::{
    EntityKind, MissionCategory, MissionId, MissionRecord, MissionState, PlayerId,
};

use crate::infrastructure::ports::{BoundedItem, PlayerTx, RepoError, UnitOfWork};

const SCHEMA: [&str; 6] = [
    r#"
    CREATE TABLE IF NOT EXISTS player_stacks (
        player_id INTEGER NOT NULL,
        kind TEXT NOT NULL,
        entity_id INTEGER NOT NULL,
        quantity INTEGER NOT NULL DEFAULT 0,
        PRIMARY KEY (player_id, kind, entity_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS player_units (
        player_id INTEGER NOT NULL,
        kind TEXT NOT NULL,
        entity_id INTEGER NOT NULL,
        obtained_at TEXT NOT NULL,
        PRIMARY KEY (player_id, kind, entity_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS player_bounded_items (
        player_id INTEGER NOT NULL,
        kind TEXT NOT NULL,
        entity_id INTEGER NOT NULL,
        limit_break_count INTEGER NOT NULL,
        equipable_count INTEGER NOT NULL,
        buildup_count INTEGER NOT NULL,
        PRIMARY KEY (player_id, kind, entity_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS player_missions (
        player_id INTEGER NOT NULL,
        mission_id INTEGER NOT NULL,
        category TEXT NOT NULL,
        group_id INTEGER,
        state INTEGER NOT NULL,
        progress INTEGER NOT NULL,
        start_at TEXT,
        end_at TEXT,
        day TEXT,
        PRIMARY KEY (player_id, mission_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS player_daily_completions (
        player_id INTEGER NOT NULL,
        mission_id INTEGER NOT NULL,
        day TEXT NOT NULL,
        group_id INTEGER,
        state INTEGER NOT NULL,
        progress INTEGER NOT NULL,
        PRIMARY KEY (player_id, mission_id, day)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS player_tutorial_flags (
        player_id INTEGER NOT NULL,
        flag_id INTEGER NOT NULL,
        PRIMARY KEY (player_id, flag_id)
    )
    "#,
];

/// SQLite result codes meaning another connection holds a conflicting lock.
///
/// SQLITE_BUSY and SQLITE_LOCKED, plus their extended forms BUSY_RECOVERY,
/// LOCKED_SHAREDCACHE, BUSY_SNAPSHOT and BUSY_TIMEOUT.
const CONFLICT_CODES: [&str; 6] = ["5", "6", "261", "262", "517", "773"];

fn is_conflict_code(code: &str) -> bool {
    CONFLICT_CODES.contains(&code)
}

fn db_error(operation: &'static str, e: sqlx::Error) -> RepoError {
    let conflict = match &e {
        sqlx::Error::Database(db) => db.code().is_some_and(|code| is_conflict_code(&code)),
        _ => false,
    };
    if conflict {
        RepoError::conflict(operation, e)
    } else {
        RepoError::database(operation, e)
    }
}

fn state_rank(state: MissionState) -> i64 {
    match state {
        MissionState::Unstarted => 0,
        MissionState::InProgress => 1,
        MissionState::Completed => 2,
        MissionState::Claimed => 3,
    }
}

fn state_from_rank(rank: i64) -> Result<MissionState, RepoError> {
    match rank {
        0 => Ok(MissionState::Unstarted),
        1 => Ok(MissionState::InProgress),
        2 => Ok(MissionState::Completed),
        3 => Ok(MissionState::Claimed),
        other => Err(RepoError::serialization(format!("unknown mission state {}", other))),
    }
}

fn to_u32(value: i64, column: &str) -> Result<u32, RepoError> {
    u32::try_from(value)
        .map_err(|_| RepoError::serialization(format!("{} out of range: {}", column, value)))
}

fn mission_from_row(row: &SqliteRow) -> Result<MissionRecord, RepoError> {
    let map = |e: sqlx::Error| db_error("missions", e);
    let category: String = row.try_get("category").map_err(map)?;
    let category = MissionCategory::from_str(&category).map_err(RepoError::serialization)?;

    Ok(MissionRecord {
        id: MissionId::new(row.try_get("mission_id").map_err(map)?),
        category,
        group_id: row.try_get("group_id").map_err(map)?,
        state: state_from_rank(row.try_get("state").map_err(map)?)?,
        progress: to_u32(row.try_get("progress").map_err(map)?, "progress")?,
        start: row.try_get("start_at").map_err(map)?,
        end: row.try_get("end_at").map_err(map)?,
        day: row.try_get("day").map_err(map)?,
    })
}

fn completion_from_row(row: &SqliteRow) -> Result<MissionRecord, RepoError> {
    let map = |e: sqlx::Error| db_error("daily_completions", e);
    let day: NaiveDate = row.try_get("day").map_err(map)?;

    Ok(MissionRecord::new(
        MissionId::new(row.try_get("mission_id").map_err(map)?),
        MissionCategory::Daily,
    )
    .with_group(row.try_get("group_id").map_err(map)?)
    .with_day(day)
    .with_state(state_from_rank(row.try_get("state").map_err(map)?)?)
    .with_progress(to_u32(row.try_get("progress").map_err(map)?, "progress")?))
}

/// Player state in a SQLite database.
///
/// Each unit of work is one SQLite transaction. Stack increments are a single
/// `INSERT .. ON CONFLICT DO UPDATE` so concurrent grants never lose an update;
/// lock contention between writers surfaces as [`RepoError::Conflict`].
#[derive(Clone)]
pub struct SqlitePlayerStore {
    pool: SqlitePool,
}

impl SqlitePlayerStore {
    pub async fn new(db_path: &str) -> Result<Self, RepoError> {
        let pool = SqlitePool::connect(&format!("sqlite:{}?mode=rwc", db_path))
            .await
            .map_err(|e| RepoError::database("connect", e))?;
        Self::from_pool(pool).await
    }

    /// Wrap an existing pool, creating the player tables if they are missing.
    pub async fn from_pool(pool: SqlitePool) -> Result<Self, RepoError> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&pool)
                .await
                .map_err(|e| RepoError::database("schema", e))?;
        }
        Ok(Self { pool })
    }
}

#[async_trait]
impl UnitOfWork for SqlitePlayerStore {
    async fn begin(&self, player: PlayerId) -> Result<Box<dyn PlayerTx>, RepoError> {
        let tx = self.pool.begin().await.map_err(|e| db_error("begin", e))?;
        Ok(Box::new(SqliteTx { player, tx }))
    }
}

struct SqliteTx {
    player: PlayerId,
    tx: Transaction<'static, Sqlite>,
}

#[async_trait]
impl PlayerTx for SqliteTx {
    fn player(&self) -> PlayerId {
        self.player
    }

    async fn stack_quantity(&mut self, kind: EntityKind, id: i32) -> Result<u64, RepoError> {
        let quantity: Option<i64> = sqlx::query_scalar(
            "SELECT quantity FROM player_stacks WHERE player_id = ? AND kind = ? AND entity_id = ?",
        )
        .bind(self.player.get())
        .bind(kind.as_str())
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| db_error("stack_quantity", e))?;

        Ok(quantity.map_or(0, |q| q.max(0) as u64))
    }

    async fn increment_stack(
        &mut self,
        kind: EntityKind,
        id: i32,
        delta: u32,
    ) -> Result<u64, RepoError> {
        let quantity: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO player_stacks (player_id, kind, entity_id, quantity)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(player_id, kind, entity_id) DO UPDATE SET
                quantity = player_stacks.quantity + excluded.quantity
            RETURNING quantity
            "#,
        )
        .bind(self.player.get())
        .bind(kind.as_str())
        .bind(id)
        .bind(i64::from(delta))
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| db_error("increment_stack", e))?;

        Ok(quantity.max(0) as u64)
    }

    async fn decrement_stack(
        &mut self,
        kind: EntityKind,
        id: i32,
        delta: u32,
    ) -> Result<Option<u64>, RepoError> {
        if delta == 0 {
            return self.stack_quantity(kind, id).await.map(Some);
        }

        let remaining: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE player_stacks SET quantity = quantity - ?
            WHERE player_id = ? AND kind = ? AND entity_id = ? AND quantity >= ?
            RETURNING quantity
            "#,
        )
        .bind(i64::from(delta))
        .bind(self.player.get())
        .bind(kind.as_str())
        .bind(id)
        .bind(i64::from(delta))
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| db_error("decrement_stack", e))?;

        Ok(remaining.map(|q| q.max(0) as u64))
    }

    async fn owns_unit(&mut self, kind: EntityKind, id: i32) -> Result<bool, RepoError> {
        let found: Option<i64> = sqlx::query_scalar(
            "SELECT 1 FROM player_units WHERE player_id = ? AND kind = ? AND entity_id = ?",
        )
        .bind(self.player.get())
        .bind(kind.as_str())
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| db_error("owns_unit", e))?;

        Ok(found.is_some())
    }

    async fn insert_unit(
        &mut self,
        kind: EntityKind,
        id: i32,
        obtained_at: DateTime<Utc>,
    ) -> Result<(), RepoError> {
        sqlx::query(
            r#"
            INSERT INTO player_units (player_id, kind, entity_id, obtained_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(player_id, kind, entity_id) DO NOTHING
            "#,
        )
        .bind(self.player.get())
        .bind(kind.as_str())
        .bind(id)
        .bind(obtained_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| db_error("insert_unit", e))?;

        Ok(())
    }

    async fn bounded_item(
        &mut self,
        kind: EntityKind,
        id: i32,
    ) -> Result<Option<BoundedItem>, RepoError> {
        let row = sqlx::query(
            r#"
            SELECT limit_break_count, equipable_count, buildup_count
            FROM player_bounded_items
            WHERE player_id = ? AND kind = ? AND entity_id = ?
            "#,
        )
        .bind(self.player.get())
        .bind(kind.as_str())
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| db_error("bounded_item", e))?;

        let Some(row) = row else {
            return Ok(None);
        };
        let map = |e: sqlx::Error| db_error("bounded_item", e);
        Ok(Some(BoundedItem {
            kind,
            id,
            limit_break_count: to_u32(
                row.try_get("limit_break_count").map_err(map)?,
                "limit_break_count",
            )?,
            equipable_count: to_u32(
                row.try_get("equipable_count").map_err(map)?,
                "equipable_count",
            )?,
            buildup_count: to_u32(row.try_get("buildup_count").map_err(map)?, "buildup_count")?,
        }))
    }

    async fn upsert_bounded_item(&mut self, item: &BoundedItem) -> Result<(), RepoError> {
        sqlx::query(
            r#"
            INSERT INTO player_bounded_items
                (player_id, kind, entity_id, limit_break_count, equipable_count, buildup_count)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(player_id, kind, entity_id) DO UPDATE SET
                limit_break_count = excluded.limit_break_count,
                equipable_count = excluded.equipable_count,
                buildup_count = excluded.buildup_count
            "#,
        )
        .bind(self.player.get())
        .bind(item.kind.as_str())
        .bind(item.id)
        .bind(i64::from(item.limit_break_count))
        .bind(i64::from(item.equipable_count))
        .bind(i64::from(item.buildup_count))
        .execute(&mut *self.tx)
        .await
        .map_err(|e| db_error("upsert_bounded_item", e))?;

        Ok(())
    }

    async fn mission(&mut self, id: MissionId) -> Result<Option<MissionRecord>, RepoError> {
        let row = sqlx::query(
            "SELECT * FROM player_missions WHERE player_id = ? AND mission_id = ?",
        )
        .bind(self.player.get())
        .bind(id.get())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| db_error("mission", e))?;

        row.as_ref().map(mission_from_row).transpose()
    }

    async fn missions(
        &mut self,
        category: Option<MissionCategory>,
    ) -> Result<Vec<MissionRecord>, RepoError> {
        let rows = match category {
            Some(category) => {
                sqlx::query(
                    r#"
                    SELECT * FROM player_missions
                    WHERE player_id = ? AND category = ?
                    ORDER BY mission_id
                    "#,
                )
                .bind(self.player.get())
                .bind(category.as_str())
                .fetch_all(&mut *self.tx)
                .await
            }
            None => {
                sqlx::query("SELECT * FROM player_missions WHERE player_id = ? ORDER BY mission_id")
                    .bind(self.player.get())
                    .fetch_all(&mut *self.tx)
                    .await
            }
        }
        .map_err(|e| db_error("missions", e))?;

        rows.iter().map(mission_from_row).collect()
    }

    async fn upsert_mission(&mut self, record: &MissionRecord) -> Result<(), RepoError> {
        sqlx::query(
            r#"
            INSERT INTO player_missions
                (player_id, mission_id, category, group_id, state, progress, start_at, end_at, day)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(player_id, mission_id) DO UPDATE SET
                category = excluded.category,
                group_id = excluded.group_id,
                state = excluded.state,
                progress = excluded.progress,
                start_at = excluded.start_at,
                end_at = excluded.end_at,
                day = excluded.day
            "#,
        )
        .bind(self.player.get())
        .bind(record.id.get())
        .bind(record.category.as_str())
        .bind(record.group_id)
        .bind(state_rank(record.state))
        .bind(i64::from(record.progress))
        .bind(record.start)
        .bind(record.end)
        .bind(record.day)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| db_error("upsert_mission", e))?;

        Ok(())
    }

    async fn daily_completions(
        &mut self,
        days: &[NaiveDate],
    ) -> Result<Vec<MissionRecord>, RepoError> {
        let mut records = Vec::new();
        for day in days {
            let rows = sqlx::query(
                r#"
                SELECT mission_id, day, group_id, state, progress
                FROM player_daily_completions
                WHERE player_id = ? AND day = ?
                ORDER BY mission_id
                "#,
            )
            .bind(self.player.get())
            .bind(*day)
            .fetch_all(&mut *self.tx)
            .await
            .map_err(|e| db_error("daily_completions", e))?;

            for row in &rows {
                records.push(completion_from_row(row)?);
            }
        }
        Ok(records)
    }

    async fn upsert_daily_completion(&mut self, record: &MissionRecord) -> Result<(), RepoError> {
        let day = record
            .day
            .ok_or_else(|| {
                RepoError::constraint(format!("daily completion {} has no day", record.id))
            })?;

        sqlx::query(
            r#"
            INSERT INTO player_daily_completions
                (player_id, mission_id, day, group_id, state, progress)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(player_id, mission_id, day) DO UPDATE SET
                progress = CASE WHEN excluded.state > player_daily_completions.state
                    THEN excluded.progress ELSE player_daily_completions.progress END,
                state = MAX(player_daily_completions.state, excluded.state)
            "#,
        )
        .bind(self.player.get())
        .bind(record.id.get())
        .bind(day)
        .bind(record.group_id)
        .bind(state_rank(record.state))
        .bind(i64::from(record.progress))
        .execute(&mut *self.tx)
        .await
        .map_err(|e| db_error("upsert_daily_completion", e))?;

        Ok(())
    }

    async fn tutorial_flags(&mut self) -> Result<BTreeSet<i32>, RepoError> {
        let flags: Vec<i32> =
            sqlx::query_scalar("SELECT flag_id FROM player_tutorial_flags WHERE player_id = ?")
                .bind(self.player.get())
                .fetch_all(&mut *self.tx)
                .await
                .map_err(|e| db_error("tutorial_flags", e))?;

        Ok(flags.into_iter().collect())
    }

    async fn set_tutorial_flag(&mut self, flag_id: i32) -> Result<bool, RepoError> {
        let result = sqlx::query(
            r#"
            INSERT INTO player_tutorial_flags (player_id, flag_id) VALUES (?, ?)
            ON CONFLICT(player_id, flag_id) DO NOTHING
            "#,
        )
        .bind(self.player.get())
        .bind(flag_id)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| db_error("set_tutorial_flag", e))?;

        Ok(result.rows_affected() == 1)
    }

    async fn commit(self: Box<Self>) -> Result<(), RepoError> {
        self.tx.commit().await.map_err(|e| db_error("commit", e))
    }
}
