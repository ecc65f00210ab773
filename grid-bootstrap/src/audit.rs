use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::OffsetDateTime;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeerKind {
    Generator,
    Consumer,
}

impl PeerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PeerKind::Generator => "generator",
            PeerKind::Consumer => "consumer",
        }
    }
}

/// One issued identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub kind: PeerKind,
    pub requester: String,
    /// Decimal identity; consumer identities do not fit in a JSON number.
    pub identity: String,
}

impl AuditEntry {
    pub fn now(kind: PeerKind, requester: &str, identity: impl ToString) -> Self {
        Self {
            timestamp: OffsetDateTime::now_utc(),
            kind,
            requester: requester.to_owned(),
            identity: identity.to_string(),
        }
    }
}

#[derive(Error, Debug)]
pub enum AuditError {
    #[error("failed to open audit log {path}: {error}")]
    Open {
        path: PathBuf,
        error: std::io::Error,
    },
    #[error("failed to encode audit entry: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("failed to write audit entry: {0}")]
    Write(#[from] std::io::Error),
}

#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, entry: AuditEntry) -> Result<(), AuditError>;
}

/// Appends one JSON object per line.
pub struct JsonLinesAudit {
    file: Mutex<File>,
}

impl JsonLinesAudit {
    pub async fn open(path: &Path) -> Result<Self, AuditError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await
            .map_err(|error| AuditError::Open {
                path: path.to_owned(),
                error,
            })?;

        Ok(Self {
            file: Mutex::new(file),
        })
    }
}

#[async_trait]
impl AuditSink for JsonLinesAudit {
    async fn record(&self, entry: AuditEntry) -> Result<(), AuditError> {
        let mut line = serde_json::to_vec(&entry)?;
        line.push(b'\n');

        let mut file = self.file.lock().await;
        file.write_all(&line).await?;
        file.flush().await?;
        Ok(())
    }
}

/// Keeps entries in memory; used when no audit path is configured.
#[derive(Default)]
pub struct MemoryAudit {
    entries: Mutex<Vec<AuditEntry>>,
}

impl MemoryAudit {
    pub async fn entries(&self) -> Vec<AuditEntry> {
        self.entries.lock().await.clone()
    }
}

#[async_trait]
impl AuditSink for MemoryAudit {
    async fn record(&self, entry: AuditEntry) -> Result<(), AuditError> {
        tracing::debug!(
            kind = entry.kind.as_str(),
            requester = %entry.requester,
            identity = %entry.identity,
            "issued identity"
        );
        self.entries.lock().await.push(entry);
        Ok(())
    }
}
