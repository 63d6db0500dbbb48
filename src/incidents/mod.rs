// src/incidents/mod.rs
// Subprocess-based incident classifier.

use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::io::{AsyncWriteExt, AsyncReadExt};
use tokio::process::Command;
use tracing::warn;

use crate::config::classifier::ClassifierConfig;
use crate::data::messages;
use crate::db::Pool;
use crate::error::{CoreError, CoreResult};

pub const KIND: &str = "classify_message";

#[derive(Debug, Serialize, Deserialize)]
pub struct Args {
    pub channel: String,
    pub ts: String,
    pub is_backfill: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncidentActionKind {
    None,
    OpenIncident,
    CloseIncident,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncidentAction {
    pub action: IncidentActionKind,
    pub service: Option<String>,
    pub alert: Option<String>,
    pub priority: Option<String>,
    pub duration_seconds: Option<i64>,
}

#[derive(Serialize)]
struct ClassifierInput<'a> {
    username: &'a str,
    text: &'a str,
}

/// Loads the message; if missing, returns success with a warning.
/// Otherwise shells out to the configured classifier binary with
/// `{username, text}` on stdin and parses one `IncidentAction` JSON object
/// from stdout. A non-`none` action is merged into the message attrs and
/// completed in the same transaction.
pub async fn run(pool: Pool, config: ClassifierConfig, job_id: i64, args: Args) -> CoreResult<()> {
    let Some(message) = messages::get(&pool, &args.channel, &args.ts).await.map_err(CoreError::from)? else {
        warn!(channel = %args.channel, ts = %args.ts, "message not found for classification");
        return Ok(());
    };

    let Some(binary) = &config.incident_classification_binary else {
        // No classifier configured is a valid deployment (dev mode, or a
        // deployment that doesn't use incident tracking) — not an error.
        return Ok(());
    };

    let username = message.attrs["message"]["user"].as_str().unwrap_or_default();
    let text = message.attrs["message"]["text"].as_str().unwrap_or_default();
    let input = serde_json::to_vec(&ClassifierInput { username, text }).map_err(CoreError::from)?;

    let action = run_classifier_subprocess(binary, &input).await?;

    if action.action != IncidentActionKind::None {
        let mut tx = pool.begin().await.map_err(CoreError::from)?;
        let delta = json!({"incident_action": action});
        messages::update_message_attrs(&mut *tx, &args.channel, &args.ts, &delta, None)
            .await
            .map_err(CoreError::from)?;
        crate::jobs::complete_in_tx(&mut tx, job_id).await.map_err(CoreError::from)?;
        tx.commit().await.map_err(CoreError::from)?;
    }

    Ok(())
}

/// Spawns the classifier binary and parses its single JSON stdout object.
/// Launch failures are retryable; a nonzero exit or malformed JSON is
/// permanent for this attempt.
async fn run_classifier_subprocess(binary: &str, input: &[u8]) -> CoreResult<IncidentAction> {
    let mut child = Command::new(binary)
        .stdin(std::process::Stdio::piped())
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::piped())
        .spawn()
        .map_err(|e| CoreError::transient(format!("failed to launch classifier: {e}")))?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin
            .write_all(input)
            .await
            .map_err(|e| CoreError::transient(format!("failed to write classifier stdin: {e}")))?;
    }

    let mut stdout = Vec::new();
    if let Some(mut handle) = child.stdout.take() {
        handle
            .read_to_end(&mut stdout)
            .await
            .map_err(|e| CoreError::transient(format!("failed to read classifier stdout: {e}")))?;
    }

    let status = child
        .wait()
        .await
        .map_err(|e| CoreError::transient(format!("failed to wait on classifier: {e}")))?;

    if !status.success() {
        return Err(CoreError::permanent(format!("classifier exited with status {status}")));
    }

    serde_json::from_slice(&stdout).map_err(|e| CoreError::permanent(format!("malformed classifier output: {e}")))
}
