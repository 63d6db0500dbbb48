// src/data/channels.rs

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;

use crate::db::Db;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnboardingStatus {
    None,
    InProgress,
    Finished,
}

impl OnboardingStatus {
    fn as_str(self) -> &'static str {
        match self {
            OnboardingStatus::None => "none",
            OnboardingStatus::InProgress => "in_progress",
            OnboardingStatus::Finished => "finished",
        }
    }

    fn from_str(s: &str) -> Self {
        match s {
            "in_progress" => OnboardingStatus::InProgress,
            "finished" => OnboardingStatus::Finished,
            _ => OnboardingStatus::None,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct Channel {
    pub channel_id: String,
    pub name: String,
    #[sqlx(rename = "onboarding_status")]
    onboarding_status_raw: String,
    pub watermark: String,
    pub attrs: Value,
}

impl Channel {
    pub fn onboarding_status(&self) -> OnboardingStatus {
        OnboardingStatus::from_str(&self.onboarding_status_raw)
    }
}

/// Fetches a channel, creating it with default watermark `"0.000000"` if absent.
pub async fn get_or_create<'c>(exec: impl Db<'c>, channel_id: &str) -> sqlx::Result<Channel> {
    sqlx::query_as::<_, Channel>(
        r#"
        INSERT INTO channels (channel_id)
        VALUES ($1)
        ON CONFLICT (channel_id) DO UPDATE SET channel_id = channels.channel_id
        RETURNING channel_id, name, onboarding_status, watermark, attrs
        "#,
    )
    .bind(channel_id)
    .fetch_one(exec)
    .await
}

pub async fn set_name<'c>(exec: impl Db<'c>, channel_id: &str, name: &str) -> sqlx::Result<()> {
    sqlx::query("UPDATE channels SET name = $2, updated_at = now() WHERE channel_id = $1")
        .bind(channel_id)
        .bind(name)
        .execute(exec)
        .await?;
    Ok(())
}

pub async fn set_onboarding_status<'c>(
    exec: impl Db<'c>,
    channel_id: &str,
    status: OnboardingStatus,
) -> sqlx::Result<()> {
    sqlx::query("UPDATE channels SET onboarding_status = $2, updated_at = now() WHERE channel_id = $1")
        .bind(channel_id)
        .bind(status.as_str())
        .execute(exec)
        .await?;
    Ok(())
}

/// Advances the channel's watermark. Callers are responsible for the
/// monotonicity invariant: this function does not compare against the
/// current value, because the caller (`ingestion::watermark`) already
/// computed `latest = max(now, watermark + 1us)` before calling.
pub async fn set_watermark<'c>(exec: impl Db<'c>, channel_id: &str, watermark: &str) -> sqlx::Result<()> {
    sqlx::query("UPDATE channels SET watermark = $2, updated_at = now() WHERE channel_id = $1")
        .bind(channel_id)
        .bind(watermark)
        .execute(exec)
        .await?;
    Ok(())
}

pub async fn get<'c>(exec: impl Db<'c>, channel_id: &str) -> sqlx::Result<Option<Channel>> {
    sqlx::query_as::<_, Channel>(
        "SELECT channel_id, name, onboarding_status, watermark, attrs FROM channels WHERE channel_id = $1",
    )
    .bind(channel_id)
    .fetch_optional(exec)
    .await
}

pub async fn list_all<'c>(exec: impl Db<'c>) -> sqlx::Result<Vec<Channel>> {
    sqlx::query_as::<_, Channel>("SELECT channel_id, name, onboarding_status, watermark, attrs FROM channels")
        .fetch_all(exec)
        .await
}
