//! SQLite document store.
//!
//! Each collection is a table holding the record as a JSON `doc` column, with
//! the identifier and the columns used for filtering and ordering pulled out
//! alongside it.

use super::{DocumentStore, StoreError};
use crate::api::Message;
use crate::models::{Agent, AgentTaskUpdate, Conversation, Task, TaskFilter, UploadedFile};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::de::DeserializeOwned;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS agents (
        id TEXT PRIMARY KEY,
        created_at TEXT NOT NULL,
        doc TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS tasks (
        id TEXT PRIMARY KEY,
        agent_id TEXT NOT NULL,
        status TEXT NOT NULL,
        created_at TEXT NOT NULL,
        doc TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_tasks_agent_id ON tasks (agent_id)",
    "CREATE INDEX IF NOT EXISTS idx_tasks_created_at ON tasks (created_at)",
    "CREATE TABLE IF NOT EXISTS conversations (
        id TEXT PRIMARY KEY,
        agent_id TEXT NOT NULL,
        created_at TEXT NOT NULL,
        doc TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_conversations_agent_id ON conversations (agent_id)",
    "CREATE TABLE IF NOT EXISTS files (
        id TEXT PRIMARY KEY,
        created_at TEXT NOT NULL,
        doc TEXT NOT NULL
    )",
];

/// Fixed-width timestamps so lexical order matches time order
fn timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn decode<T: DeserializeOwned>(doc: &str) -> Result<T, StoreError> {
    Ok(serde_json::from_str(doc)?)
}

fn decode_all<T: DeserializeOwned>(docs: Vec<String>) -> Result<Vec<T>, StoreError> {
    docs.iter().map(|doc| decode(doc)).collect()
}

fn ensure_database_directory(database_url: &str) -> Result<(), StoreError> {
    let path = database_url
        .strip_prefix("sqlite://")
        .or_else(|| database_url.strip_prefix("sqlite:"))
        .unwrap_or(database_url);

    if path.is_empty() || path.starts_with(":memory:") {
        return Ok(());
    }

    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if missing) and migrate the database
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        ensure_database_directory(database_url)?;

        let in_memory = database_url.contains(":memory:");
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|_| StoreError::InvalidUrl(database_url.to_string()))?
            .create_if_missing(true)
            .journal_mode(if in_memory {
                SqliteJournalMode::Memory
            } else {
                SqliteJournalMode::Wal
            })
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(30));

        // every connection to :memory: is a separate database
        let max_connections = if in_memory { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .acquire_timeout(Duration::from_secs(3))
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        info!("Connected to document store at {}", database_url);
        Ok(store)
    }

    async fn migrate(&self) -> Result<(), StoreError> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    async fn fetch_doc<T: DeserializeOwned>(&self, sql: &str, id: &str) -> Result<Option<T>, StoreError> {
        let doc: Option<String> = sqlx::query_scalar(sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        doc.as_deref().map(decode).transpose()
    }
}

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn insert_agent(&self, agent: &Agent) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO agents (id, created_at, doc) VALUES (?, ?, ?)")
            .bind(&agent.id)
            .bind(timestamp(&agent.created_at))
            .bind(serde_json::to_string(agent)?)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn get_agent(&self, id: &str) -> Result<Option<Agent>, StoreError> {
        self.fetch_doc("SELECT doc FROM agents WHERE id = ?", id).await
    }

    async fn list_agents(&self) -> Result<Vec<Agent>, StoreError> {
        let docs: Vec<String> =
            sqlx::query_scalar("SELECT doc FROM agents ORDER BY created_at DESC, rowid DESC")
                .fetch_all(&self.pool)
                .await?;
        decode_all(docs)
    }

    async fn delete_agent(&self, id: &str) -> Result<bool, StoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM tasks WHERE agent_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM conversations WHERE agent_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM agents WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    async fn apply_agent_update(
        &self,
        id: &str,
        update: AgentTaskUpdate,
    ) -> Result<Agent, StoreError> {
        let mut tx = self.pool.begin().await?;

        let doc: Option<String> = sqlx::query_scalar("SELECT doc FROM agents WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        let mut agent: Agent = decode(&doc.ok_or_else(|| StoreError::not_found("agent", id))?)?;
        agent.apply_update(update);

        sqlx::query("UPDATE agents SET doc = ? WHERE id = ?")
            .bind(serde_json::to_string(&agent)?)
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(agent)
    }

    async fn insert_task(&self, task: &Task) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO tasks (id, agent_id, status, created_at, doc) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&task.id)
        .bind(&task.agent_id)
        .bind(task.status.as_str())
        .bind(timestamp(&task.created_at))
        .bind(serde_json::to_string(task)?)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_task(&self, task: &Task) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE tasks SET status = ?, doc = ? WHERE id = ?")
            .bind(task.status.as_str())
            .bind(serde_json::to_string(task)?)
            .bind(&task.id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("task", &task.id));
        }
        Ok(())
    }

    async fn get_task(&self, id: &str) -> Result<Option<Task>, StoreError> {
        self.fetch_doc("SELECT doc FROM tasks WHERE id = ?", id).await
    }

    async fn list_tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>, StoreError> {
        let mut sql = String::from("SELECT doc FROM tasks WHERE 1=1");
        let mut bindings: Vec<String> = Vec::new();

        if let Some(agent_id) = &filter.agent_id {
            sql.push_str(" AND agent_id = ?");
            bindings.push(agent_id.clone());
        }
        if let Some(status) = filter.status {
            sql.push_str(" AND status = ?");
            bindings.push(status.as_str().to_string());
        }
        sql.push_str(" ORDER BY created_at DESC, rowid DESC");
        if let Some(limit) = filter.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }

        let mut query = sqlx::query_scalar::<_, String>(&sql);
        for value in &bindings {
            query = query.bind(value);
        }
        decode_all(query.fetch_all(&self.pool).await?)
    }

    async fn insert_conversation(&self, conversation: &Conversation) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO conversations (id, agent_id, created_at, doc) VALUES (?, ?, ?, ?)")
            .bind(&conversation.id)
            .bind(&conversation.agent_id)
            .bind(timestamp(&conversation.created_at))
            .bind(serde_json::to_string(conversation)?)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn get_conversation(&self, id: &str) -> Result<Option<Conversation>, StoreError> {
        self.fetch_doc("SELECT doc FROM conversations WHERE id = ?", id).await
    }

    async fn append_messages(
        &self,
        id: &str,
        messages: Vec<Message>,
    ) -> Result<Conversation, StoreError> {
        let mut tx = self.pool.begin().await?;

        let doc: Option<String> = sqlx::query_scalar("SELECT doc FROM conversations WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        let mut conversation: Conversation =
            decode(&doc.ok_or_else(|| StoreError::not_found("conversation", id))?)?;
        conversation.append(messages);

        sqlx::query("UPDATE conversations SET doc = ? WHERE id = ?")
            .bind(serde_json::to_string(&conversation)?)
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(conversation)
    }

    async fn insert_file(&self, file: &UploadedFile) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO files (id, created_at, doc) VALUES (?, ?, ?)")
            .bind(&file.id)
            .bind(timestamp(&file.uploaded_at))
            .bind(serde_json::to_string(file)?)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn get_file(&self, id: &str) -> Result<Option<UploadedFile>, StoreError> {
        self.fetch_doc("SELECT doc FROM files WHERE id = ?", id).await
    }

    async fn list_files(&self) -> Result<Vec<UploadedFile>, StoreError> {
        let docs: Vec<String> =
            sqlx::query_scalar("SELECT doc FROM files ORDER BY created_at DESC, rowid DESC")
                .fetch_all(&self.pool)
                .await?;
        decode_all(docs)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::conformance;

    async fn store() -> SqliteStore {
        SqliteStore::connect("sqlite::memory:").await.unwrap()
    }

    #[tokio::test]
    async fn test_agents() {
        conformance::agents_roundtrip(&store().await).await;
    }

    #[tokio::test]
    async fn test_agent_update_is_bounded() {
        conformance::agent_update_is_bounded(&store().await).await;
    }

    #[tokio::test]
    async fn test_delete_cascades() {
        conformance::delete_cascades(&store().await).await;
    }

    #[tokio::test]
    async fn test_task_lifecycle() {
        conformance::task_lifecycle(&store().await).await;
    }

    #[tokio::test]
    async fn test_conversation_grows() {
        conformance::conversation_grows(&store().await).await;
    }

    #[tokio::test]
    async fn test_files() {
        conformance::files_roundtrip(&store().await).await;
    }

    #[tokio::test]
    async fn test_file_database_persists() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite:{}", dir.path().join("nested/agents.db").display());

        let agent = conformance::agent("durable");
        {
            let store = SqliteStore::connect(&url).await.unwrap();
            store.insert_agent(&agent).await.unwrap();
        }

        let reopened = SqliteStore::connect(&url).await.unwrap();
        assert_eq!(reopened.get_agent(&agent.id).await.unwrap(), Some(agent));
    }
}
