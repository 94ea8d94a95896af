// src/memory/storage/sqlite/store.rs

//! SQLite metadata store: the durable authority for every memory record,
//! partitioned into `dialogue_memory`, `topic_memory` and `profile_memory`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;

use crate::memory::core::traits::MetadataStore;
use crate::memory::core::types::{Memory, MemoryLayer, MemoryType};

use super::models::{DialogueMemoryPo, ProfileMemoryPo, TopicMemoryPo};

pub struct SqliteMetadataStore {
    pool: SqlitePool,
}

impl SqliteMetadataStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Create the three partition tables and their indexes. Idempotent.
    pub async fn init_schema(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS dialogue_memory (
                id            TEXT PRIMARY KEY,
                user_id       TEXT NOT NULL,
                session_id    TEXT,
                role          TEXT,
                content       TEXT NOT NULL,
                embedding     TEXT,
                metadata      TEXT NOT NULL DEFAULT '{}',
                memory_type   TEXT NOT NULL DEFAULT 'user_message',
                importance    REAL NOT NULL DEFAULT 0.6,
                access_count  INTEGER NOT NULL DEFAULT 0,
                last_accessed TEXT NOT NULL,
                created_at    TEXT NOT NULL,
                updated_at    TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_dialogue_user_created ON dialogue_memory(user_id, created_at)",
        )
        .execute(&self.pool)
        .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_dialogue_session ON dialogue_memory(session_id)")
            .execute(&self.pool)
            .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS topic_memory (
                id            TEXT PRIMARY KEY,
                user_id       TEXT NOT NULL,
                title         TEXT,
                summary       TEXT,
                keywords      TEXT,
                dialogue_ids  TEXT,
                content       TEXT NOT NULL,
                embedding     TEXT,
                metadata      TEXT NOT NULL DEFAULT '{}',
                memory_type   TEXT NOT NULL DEFAULT 'topic_thread',
                importance    REAL NOT NULL DEFAULT 0.8,
                access_count  INTEGER NOT NULL DEFAULT 0,
                last_accessed TEXT NOT NULL,
                created_at    TEXT NOT NULL,
                updated_at    TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_topic_user_created ON topic_memory(user_id, created_at)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS profile_memory (
                id            TEXT PRIMARY KEY,
                user_id       TEXT NOT NULL,
                preferences   TEXT,
                habits        TEXT,
                features      TEXT,
                topic_ids     TEXT,
                content       TEXT NOT NULL,
                embedding     TEXT,
                metadata      TEXT NOT NULL DEFAULT '{}',
                memory_type   TEXT NOT NULL DEFAULT 'user_identity',
                importance    REAL NOT NULL DEFAULT 1.0,
                access_count  INTEGER NOT NULL DEFAULT 0,
                last_accessed TEXT NOT NULL,
                created_at    TEXT NOT NULL,
                updated_at    TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_profile_user_created ON profile_memory(user_id, created_at)",
        )
        .execute(&self.pool)
        .await?;

        debug!("metadata schema ready");
        Ok(())
    }

    async fn insert_dialogue(&self, po: &DialogueMemoryPo) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO dialogue_memory (
                id, user_id, session_id, role, content, embedding, metadata,
                memory_type, importance, access_count, last_accessed, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&po.id)
        .bind(&po.user_id)
        .bind(&po.session_id)
        .bind(&po.role)
        .bind(&po.content)
        .bind(&po.embedding)
        .bind(&po.metadata)
        .bind(&po.memory_type)
        .bind(po.importance)
        .bind(po.access_count)
        .bind(po.last_accessed)
        .bind(po.created_at)
        .bind(po.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn insert_topic(&self, po: &TopicMemoryPo) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO topic_memory (
                id, user_id, title, summary, keywords, dialogue_ids, content, embedding,
                metadata, memory_type, importance, access_count, last_accessed, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&po.id)
        .bind(&po.user_id)
        .bind(&po.title)
        .bind(&po.summary)
        .bind(&po.keywords)
        .bind(&po.dialogue_ids)
        .bind(&po.content)
        .bind(&po.embedding)
        .bind(&po.metadata)
        .bind(&po.memory_type)
        .bind(po.importance)
        .bind(po.access_count)
        .bind(po.last_accessed)
        .bind(po.created_at)
        .bind(po.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn insert_profile(&self, po: &ProfileMemoryPo) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO profile_memory (
                id, user_id, preferences, habits, features, topic_ids, content, embedding,
                metadata, memory_type, importance, access_count, last_accessed, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&po.id)
        .bind(&po.user_id)
        .bind(&po.preferences)
        .bind(&po.habits)
        .bind(&po.features)
        .bind(&po.topic_ids)
        .bind(&po.content)
        .bind(&po.embedding)
        .bind(&po.metadata)
        .bind(&po.memory_type)
        .bind(po.importance)
        .bind(po.access_count)
        .bind(po.last_accessed)
        .bind(po.created_at)
        .bind(po.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_dialogue(&self, id: &str) -> anyhow::Result<Option<Memory>> {
        let row: Option<DialogueMemoryPo> =
            sqlx::query_as("SELECT * FROM dialogue_memory WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        row.map(DialogueMemoryPo::into_memory).transpose()
    }

    async fn get_topic(&self, id: &str) -> anyhow::Result<Option<Memory>> {
        let row: Option<TopicMemoryPo> = sqlx::query_as("SELECT * FROM topic_memory WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(TopicMemoryPo::into_memory).transpose()
    }

    async fn get_profile(&self, id: &str) -> anyhow::Result<Option<Memory>> {
        let row: Option<ProfileMemoryPo> =
            sqlx::query_as("SELECT * FROM profile_memory WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        row.map(ProfileMemoryPo::into_memory).transpose()
    }

    /// Layer listing, newest first. Session retrieval has its own ascending
    /// queries; every other list operation is descending.
    async fn fetch_layer(
        &self,
        layer: MemoryLayer,
        user_id: &str,
        limit: Option<usize>,
        memory_type: Option<MemoryType>,
    ) -> anyhow::Result<Vec<Memory>> {
        let table = match layer {
            MemoryLayer::Dialogue => "dialogue_memory",
            MemoryLayer::Topic => "topic_memory",
            MemoryLayer::Profile => "profile_memory",
        };
        let mut sql = format!("SELECT * FROM {table} WHERE user_id = ?");
        if memory_type.is_some() {
            sql.push_str(" AND memory_type = ?");
        }
        sql.push_str(" ORDER BY created_at DESC, id DESC");
        if limit.is_some() {
            sql.push_str(" LIMIT ?");
        }

        macro_rules! run {
            ($po:ty) => {{
                let mut query = sqlx::query_as::<_, $po>(&sql).bind(user_id);
                if let Some(t) = memory_type {
                    query = query.bind(t.as_str());
                }
                if let Some(n) = limit {
                    query = query.bind(n as i64);
                }
                query
                    .fetch_all(&self.pool)
                    .await?
                    .into_iter()
                    .map(|po| po.into_memory())
                    .collect::<anyhow::Result<Vec<Memory>>>()
            }};
        }

        match layer {
            MemoryLayer::Dialogue => run!(DialogueMemoryPo),
            MemoryLayer::Topic => run!(TopicMemoryPo),
            MemoryLayer::Profile => run!(ProfileMemoryPo),
        }
    }
}

#[async_trait]
impl MetadataStore for SqliteMetadataStore {
    async fn insert(&self, memory: &Memory) -> anyhow::Result<()> {
        match memory.layer {
            MemoryLayer::Dialogue => self.insert_dialogue(&DialogueMemoryPo::from_memory(memory)?).await,
            MemoryLayer::Topic => self.insert_topic(&TopicMemoryPo::from_memory(memory)?).await,
            MemoryLayer::Profile => self.insert_profile(&ProfileMemoryPo::from_memory(memory)?).await,
        }
    }

    async fn update(&self, memory: &Memory) -> anyhow::Result<()> {
        let result = match memory.layer {
            MemoryLayer::Dialogue => {
                let po = DialogueMemoryPo::from_memory(memory)?;
                sqlx::query(
                    r#"
                    UPDATE dialogue_memory SET
                        session_id = ?, role = ?, content = ?, embedding = ?, metadata = ?,
                        memory_type = ?, importance = ?, access_count = ?, last_accessed = ?, updated_at = ?
                    WHERE id = ?
                    "#,
                )
                .bind(&po.session_id)
                .bind(&po.role)
                .bind(&po.content)
                .bind(&po.embedding)
                .bind(&po.metadata)
                .bind(&po.memory_type)
                .bind(po.importance)
                .bind(po.access_count)
                .bind(po.last_accessed)
                .bind(po.updated_at)
                .bind(&po.id)
                .execute(&self.pool)
                .await?
            }
            MemoryLayer::Topic => {
                let po = TopicMemoryPo::from_memory(memory)?;
                sqlx::query(
                    r#"
                    UPDATE topic_memory SET
                        title = ?, summary = ?, keywords = ?, dialogue_ids = ?, content = ?,
                        embedding = ?, metadata = ?, memory_type = ?, importance = ?,
                        access_count = ?, last_accessed = ?, updated_at = ?
                    WHERE id = ?
                    "#,
                )
                .bind(&po.title)
                .bind(&po.summary)
                .bind(&po.keywords)
                .bind(&po.dialogue_ids)
                .bind(&po.content)
                .bind(&po.embedding)
                .bind(&po.metadata)
                .bind(&po.memory_type)
                .bind(po.importance)
                .bind(po.access_count)
                .bind(po.last_accessed)
                .bind(po.updated_at)
                .bind(&po.id)
                .execute(&self.pool)
                .await?
            }
            MemoryLayer::Profile => {
                let po = ProfileMemoryPo::from_memory(memory)?;
                sqlx::query(
                    r#"
                    UPDATE profile_memory SET
                        preferences = ?, habits = ?, features = ?, topic_ids = ?, content = ?,
                        embedding = ?, metadata = ?, memory_type = ?, importance = ?,
                        access_count = ?, last_accessed = ?, updated_at = ?
                    WHERE id = ?
                    "#,
                )
                .bind(&po.preferences)
                .bind(&po.habits)
                .bind(&po.features)
                .bind(&po.topic_ids)
                .bind(&po.content)
                .bind(&po.embedding)
                .bind(&po.metadata)
                .bind(&po.memory_type)
                .bind(po.importance)
                .bind(po.access_count)
                .bind(po.last_accessed)
                .bind(po.updated_at)
                .bind(&po.id)
                .execute(&self.pool)
                .await?
            }
        };

        if result.rows_affected() == 0 {
            anyhow::bail!("memory {} not found in {} partition", memory.id, memory.layer);
        }
        Ok(())
    }

    async fn get(&self, id: &str) -> anyhow::Result<Option<Memory>> {
        if let Some(memory) = self.get_dialogue(id).await? {
            return Ok(Some(memory));
        }
        if let Some(memory) = self.get_topic(id).await? {
            return Ok(Some(memory));
        }
        self.get_profile(id).await
    }

    async fn delete(&self, id: &str) -> anyhow::Result<()> {
        for table in ["dialogue_memory", "topic_memory", "profile_memory"] {
            let result = sqlx::query(&format!("DELETE FROM {table} WHERE id = ?"))
                .bind(id)
                .execute(&self.pool)
                .await?;
            if result.rows_affected() > 0 {
                return Ok(());
            }
        }
        Ok(())
    }

    async fn count_memories(&self, user_id: &str) -> anyhow::Result<i64> {
        let mut total = 0i64;
        for table in ["dialogue_memory", "topic_memory", "profile_memory"] {
            let count: i64 =
                sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table} WHERE user_id = ?"))
                    .bind(user_id)
                    .fetch_one(&self.pool)
                    .await?;
            total += count;
        }
        Ok(total)
    }

    async fn get_old_memories(
        &self,
        user_id: &str,
        before: DateTime<Utc>,
        limit: usize,
    ) -> anyhow::Result<Vec<Memory>> {
        // Dialogue and topic partitions only; profiles do not expire.
        let dialogues: Vec<DialogueMemoryPo> = sqlx::query_as(
            "SELECT * FROM dialogue_memory WHERE user_id = ? AND created_at < ? ORDER BY created_at ASC LIMIT ?",
        )
        .bind(user_id)
        .bind(before)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        let topics: Vec<TopicMemoryPo> = sqlx::query_as(
            "SELECT * FROM topic_memory WHERE user_id = ? AND created_at < ? ORDER BY created_at ASC LIMIT ?",
        )
        .bind(user_id)
        .bind(before)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        let mut records: Vec<Memory> = dialogues
            .into_iter()
            .map(DialogueMemoryPo::into_memory)
            .chain(topics.into_iter().map(TopicMemoryPo::into_memory))
            .collect::<anyhow::Result<_>>()?;
        records.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        records.truncate(limit);
        Ok(records)
    }

    async fn update_access_info(&self, id: &str, accessed_at: DateTime<Utc>) -> anyhow::Result<()> {
        for table in ["dialogue_memory", "topic_memory", "profile_memory"] {
            let result = sqlx::query(&format!(
                "UPDATE {table} SET access_count = access_count + 1, last_accessed = ? WHERE id = ?"
            ))
            .bind(accessed_at)
            .bind(id)
            .execute(&self.pool)
            .await?;
            if result.rows_affected() > 0 {
                return Ok(());
            }
        }
        anyhow::bail!("memory {} not found in any partition", id)
    }

    async fn get_dialogues_by_session(
        &self,
        user_id: &str,
        session_id: &str,
        limit: usize,
    ) -> anyhow::Result<Vec<Memory>> {
        let rows: Vec<DialogueMemoryPo> = sqlx::query_as(
            "SELECT * FROM dialogue_memory WHERE user_id = ? AND session_id = ? ORDER BY created_at ASC, id ASC LIMIT ?",
        )
        .bind(user_id)
        .bind(session_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(DialogueMemoryPo::into_memory).collect()
    }

    async fn get_memories_by_layer(
        &self,
        user_id: &str,
        layer: MemoryLayer,
        limit: usize,
    ) -> anyhow::Result<Vec<Memory>> {
        self.fetch_layer(layer, user_id, Some(limit), None).await
    }

    async fn get_memories_by_type(
        &self,
        user_id: &str,
        memory_type: MemoryType,
        limit: usize,
    ) -> anyhow::Result<Vec<Memory>> {
        self.fetch_layer(memory_type.layer(), user_id, Some(limit), Some(memory_type))
            .await
    }

    async fn get_by_session_id(
        &self,
        user_id: &str,
        session_id: &str,
    ) -> anyhow::Result<Vec<Memory>> {
        let rows: Vec<DialogueMemoryPo> = sqlx::query_as(
            "SELECT * FROM dialogue_memory WHERE user_id = ? AND session_id = ? ORDER BY created_at ASC, id ASC",
        )
        .bind(user_id)
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(DialogueMemoryPo::into_memory).collect()
    }

    async fn get_memories_by_user_and_layer(
        &self,
        user_id: &str,
        layer: MemoryLayer,
    ) -> anyhow::Result<Vec<Memory>> {
        self.fetch_layer(layer, user_id, None, None).await
    }
}
