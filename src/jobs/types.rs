// src/jobs/types.rs

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;

pub const DEFAULT_QUEUE: &str = "default";
pub const DEFAULT_MAX_ATTEMPTS: i32 = 25;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Available,
    Scheduled,
    Running,
    Completed,
    Retryable,
    Discarded,
}

impl JobState {
    pub fn as_str(self) -> &'static str {
        match self {
            JobState::Available => "available",
            JobState::Scheduled => "scheduled",
            JobState::Running => "running",
            JobState::Completed => "completed",
            JobState::Retryable => "retryable",
            JobState::Discarded => "discarded",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "scheduled" => JobState::Scheduled,
            "running" => JobState::Running,
            "completed" => JobState::Completed,
            "retryable" => JobState::Retryable,
            "discarded" => JobState::Discarded,
            _ => JobState::Available,
        }
    }
}

/// A claimed row from the `jobs` table. Handlers receive this plus a
/// deserialized view of `args`; they never see the raw queue plumbing.
#[derive(Debug, Clone, FromRow)]
pub struct JobRow {
    pub id: i64,
    pub kind: String,
    pub queue: String,
    pub args: Value,
    #[sqlx(rename = "state")]
    state_raw: String,
    pub priority: i32,
    pub attempt: i32,
    pub max_attempts: i32,
    pub scheduled_at: chrono::DateTime<chrono::Utc>,
    pub unique_key: Option<String>,
    pub last_error: Option<String>,
    pub inserted_at: chrono::DateTime<chrono::Utc>,
    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl JobRow {
    pub fn state(&self) -> JobState {
        JobState::from_str(&self.state_raw)
    }

    pub fn args_as<T: serde::de::DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_value(self.args.clone())
    }
}

/// Options accepted by `Enqueue`/`EnqueueMany`.
#[derive(Debug, Clone)]
pub struct EnqueueOptions {
    pub queue: String,
    pub scheduled_at: Option<chrono::DateTime<chrono::Utc>>,
    pub unique_key: Option<String>,
    pub priority: i32,
    pub max_attempts: i32,
}

impl Default for EnqueueOptions {
    fn default() -> Self {
        Self {
            queue: DEFAULT_QUEUE.to_string(),
            scheduled_at: None,
            unique_key: None,
            priority: 0,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl EnqueueOptions {
    pub fn queue(mut self, queue: impl Into<String>) -> Self {
        self.queue = queue.into();
        self
    }

    pub fn scheduled_at(mut self, at: chrono::DateTime<chrono::Utc>) -> Self {
        self.scheduled_at = Some(at);
        self
    }

    pub fn unique_by_args(mut self, key: impl Into<String>) -> Self {
        self.unique_key = Some(key.into());
        self
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn max_attempts(mut self, max_attempts: i32) -> Self {
        self.max_attempts = max_attempts;
        self
    }
}

/// One unit of work to enqueue: the kind tag plus its JSON args, paired with
/// per-job options. `EnqueueMany` takes a batch of these.
pub struct NewJob {
    pub kind: String,
    pub args: Value,
    pub opts: EnqueueOptions,
}

impl NewJob {
    pub fn new(kind: impl Into<String>, args: impl Serialize) -> serde_json::Result<Self> {
        Ok(Self {
            kind: kind.into(),
            args: serde_json::to_value(args)?,
            opts: EnqueueOptions::default(),
        })
    }

    pub fn with_opts(mut self, opts: EnqueueOptions) -> Self {
        self.opts = opts;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_state_round_trips_through_its_string_form() {
        for state in [
            JobState::Available,
            JobState::Scheduled,
            JobState::Running,
            JobState::Completed,
            JobState::Retryable,
            JobState::Discarded,
        ] {
            assert_eq!(JobState::from_str(state.as_str()), state);
        }
    }

    #[test]
    fn unknown_state_string_defaults_to_available() {
        assert_eq!(JobState::from_str("bogus"), JobState::Available);
    }
}
