//! Keyword matching for chat messages.
//!
//! A message is matched against a fixed vocabulary; there is no language model involved. The
//! task reference is the first `task <n>` (optionally `task #<n>`) in the text, and the keyword
//! that appears earliest decides the intent.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::db::{Database, TaskStatus};
use crate::error::Result;

static TASK_REF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\btask\s*#?\s*(\d+)").expect("task reference pattern"));

static KEYWORD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(done|completed|finished|started|in\s+progress|working\s+on|blocked|stuck)\b")
        .expect("keyword pattern")
});

/// Non-transition signals that are acknowledged but leave the status alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChatSignal {
    Blocked,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    NoMatch,
    StatusTransition { task_id: i64, status: TaskStatus },
    Acknowledged { task_id: i64, signal: ChatSignal },
}

/// Lookup the parser uses to confirm a task belongs to the chat's project.
pub trait TaskDirectory {
    fn project_of_task(&self, task_id: i64) -> Result<Option<i64>>;
}

impl TaskDirectory for Database {
    fn project_of_task(&self, task_id: i64) -> Result<Option<i64>> {
        Ok(self.task_scope(task_id)?.map(|scope| scope.project_id))
    }
}

enum Keyword {
    Status(TaskStatus),
    Signal(ChatSignal),
}

fn classify(word: &str) -> Option<Keyword> {
    let normalized = word.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase();
    match normalized.as_str() {
        "done" | "completed" | "finished" => Some(Keyword::Status(TaskStatus::Done)),
        "started" | "in progress" | "working on" => Some(Keyword::Status(TaskStatus::InProgress)),
        "blocked" | "stuck" => Some(Keyword::Signal(ChatSignal::Blocked)),
        _ => None,
    }
}

/// Turn a chat message into at most one intent for a task in `project_id`.
///
/// A task that does not exist or lives in another project yields `NoMatch`, the same as a
/// message without a task reference.
pub fn parse(message: &str, project_id: i64, directory: &impl TaskDirectory) -> Result<Intent> {
    let Some(task_id) = TASK_REF
        .captures(message)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<i64>().ok())
    else {
        return Ok(Intent::NoMatch);
    };

    let Some(keyword) = KEYWORD.find(message).and_then(|m| classify(m.as_str())) else {
        return Ok(Intent::NoMatch);
    };

    if directory.project_of_task(task_id)? != Some(project_id) {
        tracing::debug!("Chat references task {} outside project {}", task_id, project_id);
        return Ok(Intent::NoMatch);
    }

    Ok(match keyword {
        Keyword::Status(status) => Intent::StatusTransition { task_id, status },
        Keyword::Signal(signal) => Intent::Acknowledged { task_id, signal },
    })
}
