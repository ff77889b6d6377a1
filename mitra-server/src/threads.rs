//! Conversation thread storage

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Thread {
    pub thread_id: String,
    pub title: String,
    pub messages: Vec<ChatMessage>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Persistence seam for conversations; errors surface as HTTP 500
#[async_trait]
pub trait ThreadStore: Send + Sync {
    /// All threads, most recently updated first
    async fn list(&self) -> Result<Vec<Thread>>;

    async fn get(&self, thread_id: &str) -> Result<Option<Thread>>;

    /// `false` when no such thread existed
    async fn delete(&self, thread_id: &str) -> Result<bool>;

    /// Append `turns`, creating the thread (titled after the first turn) if needed
    async fn append_turns(
        &self,
        thread_id: &str,
        turns: Vec<ChatMessage>,
    ) -> Result<Thread>;
}

#[derive(Default)]
pub struct InMemoryThreadStore {
    threads: RwLock<HashMap<String, Thread>>,
}

impl InMemoryThreadStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ThreadStore for InMemoryThreadStore {
    async fn list(&self) -> Result<Vec<Thread>> {
        let mut threads: Vec<Thread> = self.threads.read().await.values().cloned().collect();
        threads.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(threads)
    }

    async fn get(&self, thread_id: &str) -> Result<Option<Thread>> {
        Ok(self.threads.read().await.get(thread_id).cloned())
    }

    async fn delete(&self, thread_id: &str) -> Result<bool> {
        Ok(self.threads.write().await.remove(thread_id).is_some())
    }

    async fn append_turns(
        &self,
        thread_id: &str,
        turns: Vec<ChatMessage>,
    ) -> Result<Thread> {
        let now = Utc::now();
        let mut threads = self.threads.write().await;
        let thread = threads.entry(thread_id.to_string()).or_insert_with(|| Thread {
            thread_id: thread_id.to_string(),
            title: turns.first().map(|t| t.content.clone()).unwrap_or_default(),
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
        });
        thread.messages.extend(turns);
        thread.updated_at = now;
        Ok(thread.clone())
    }
}
