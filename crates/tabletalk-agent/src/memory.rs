//! Per-session conversation memory.
//!
//! Each session id maps to a file `{data_dir}/{sanitized_id}_memory.json`
//! holding a JSON array of `{"type": "human"|"ai", "data": {"content": ...}}`
//! records. Insertion order defines the replay order fed to the model.
//! No locking; sequential single-process access is assumed.

use std::path::PathBuf;

use tabletalk_core::error::{Result, TabletalkError};
use tabletalk_core::types::{MessageRecord, Role};
use tabletalk_llm::Message;

/// An ordered, replay-ready conversation history.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatHistory {
    records: Vec<MessageRecord>,
}

impl ChatHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> &[MessageRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Replay the history as model messages: human turns become user
    /// messages, agent turns become assistant messages.
    pub fn to_messages(&self) -> Vec<Message> {
        self.records
            .iter()
            .map(|record| match record.role {
                Role::Human => Message::user(record.data.content.clone()),
                Role::Ai => Message::assistant(record.data.content.clone()),
            })
            .collect()
    }
}

impl From<Vec<MessageRecord>> for ChatHistory {
    fn from(records: Vec<MessageRecord>) -> Self {
        Self { records }
    }
}

/// Flat-file store for session histories.
pub struct SessionStore {
    base_dir: PathBuf,
}

impl SessionStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// Load the full prior conversation for a session.
    ///
    /// Creates an empty persisted record (`[]`) when the session has none
    /// yet, so a later save always appends to an existing file.
    pub fn load(&self, session_id: &str) -> Result<ChatHistory> {
        let path = self.session_path(session_id);
        if !path.exists() {
            std::fs::create_dir_all(&self.base_dir)?;
            std::fs::write(&path, "[]")?;
            return Ok(ChatHistory::new());
        }

        let content = std::fs::read_to_string(&path)?;
        let records: Vec<MessageRecord> = serde_json::from_str(&content).map_err(|e| {
            TabletalkError::Session(format!(
                "Corrupt session file {}: {}",
                path.display(),
                e
            ))
        })?;
        Ok(ChatHistory::from(records))
    }

    /// Append one human/agent turn pair to a session's persisted record.
    pub fn save(&self, session_id: &str, human_text: &str, agent_text: &str) -> Result<()> {
        let path = self.session_path(session_id);
        std::fs::create_dir_all(&self.base_dir)?;

        let mut records: Vec<MessageRecord> = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            serde_json::from_str(&content).map_err(|e| {
                TabletalkError::Session(format!(
                    "Corrupt session file {}: {}",
                    path.display(),
                    e
                ))
            })?
        } else {
            Vec::new()
        };

        records.push(MessageRecord::human(human_text));
        records.push(MessageRecord::ai(agent_text));

        let content = serde_json::to_string(&records)?;
        std::fs::write(&path, content)?;
        tracing::debug!(session = session_id, turns = records.len() / 2, "Session saved");
        Ok(())
    }

    fn session_path(&self, session_id: &str) -> PathBuf {
        self.base_dir
            .join(format!("{}_memory.json", sanitize_id(session_id)))
    }
}

/// Sanitize a session id for safe use as a file name.
/// Replaces non-alphanumeric characters (except `_` and `-`) with `_`.
fn sanitize_id(session_id: &str) -> String {
    session_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}
