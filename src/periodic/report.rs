// src/periodic/report.rs
// Weekly per-channel report. Cron `0 9 * * 1` — each Monday 09:00 in
// the process's local zone; skipped fires during downtime are not replayed.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::chat::{Block, ChatGateway};
use crate::data::{channels, messages, reports};
use crate::db::Pool;
use crate::error::{CoreError, CoreResult};
use crate::jobs::{periodic::PeriodicSource, NewJob};
use crate::llm::Completion;

pub const KIND: &str = "weekly_report";
pub const CRON: &str = "0 9 * * 1";

#[derive(Debug, Serialize, Deserialize)]
pub struct Args {
    pub channel: String,
}

#[derive(Default)]
struct Aggregate {
    user_messages: BTreeMap<String, u64>,
    bot_messages: u64,
    incidents: BTreeMap<(String, String), IncidentStats>,
}

#[derive(Default)]
struct IncidentStats {
    count: u64,
    total_duration_seconds: i64,
}

pub fn periodic_source(pool: Pool) -> anyhow::Result<PeriodicSource> {
    PeriodicSource::new("weekly_report", CRON, move || {
        let pool = pool.clone();
        async move {
            let all_channels = channels::list_all(&pool).await?;
            all_channels
                .into_iter()
                .map(|ch| Ok(NewJob::new(KIND, Args { channel: ch.channel_id })?))
                .collect()
        }
    })
}

pub async fn run(pool: Pool, gateway: Arc<dyn ChatGateway>, llm: Arc<dyn Completion>, args: Args) -> CoreResult<()> {
    let now = chrono::Utc::now();
    let since = now - chrono::Duration::days(7);
    let since_ts = format!("{}.{:06}", since.timestamp(), since.timestamp_subsec_micros());
    let until_ts = format!("{}.{:06}", now.timestamp(), now.timestamp_subsec_micros());

    let top_level = messages::list_top_level_in_range(&pool, &args.channel, &since_ts, &until_ts)
        .await
        .map_err(CoreError::from)?;

    let bot_user_id = gateway.bot_user_id().to_string();
    let mut aggregate = Aggregate::default();

    for message in &top_level {
        let user = message.attrs["message"]["user"].as_str().unwrap_or("unknown").to_string();
        let bot_id = message.attrs["message"]["bot_id"].as_str();
        if bot_id.is_some() || user == bot_user_id {
            aggregate.bot_messages += 1;
        } else {
            *aggregate.user_messages.entry(user).or_insert(0) += 1;
        }

        if let Some(action) = message.attrs.get("incident_action") {
            if action["action"].as_str() == Some("close_incident") {
                let service = action["service"].as_str().unwrap_or("unknown").to_string();
                let alert = action["alert"].as_str().unwrap_or("unknown").to_string();
                let entry = aggregate.incidents.entry((service, alert)).or_default();
                entry.count += 1;
                entry.total_duration_seconds += action["duration_seconds"].as_i64().unwrap_or(0);
            }
        }
    }

    let suggestions_prompt = format!(
        "Summarize this week's activity and suggest follow-ups.\nUser messages: {}\nBot messages: {}\nIncidents: {}",
        aggregate.user_messages.len(),
        aggregate.bot_messages,
        aggregate.incidents.len(),
    );
    let suggestions = llm
        .complete("You are an operations assistant summarizing a week of activity.", &suggestions_prompt)
        .await?;

    let blocks = render_report_blocks(&aggregate, &suggestions);
    let posted_ts = gateway.post_message(&args.channel, &blocks).await.ok();

    let content = json!({
        "user_messages": aggregate.user_messages,
        "bot_messages": aggregate.bot_messages,
        "incidents": aggregate.incidents.iter().map(|((service, alert), stats)| {
            json!({"service": service, "alert": alert, "count": stats.count, "total_duration_seconds": stats.total_duration_seconds})
        }).collect::<Vec<_>>(),
        "suggestions": suggestions,
    });

    reports::insert(&pool, &args.channel, since, now, &content, posted_ts.as_deref())
        .await
        .map_err(CoreError::from)?;

    Ok(())
}

fn render_report_blocks(aggregate: &Aggregate, suggestions: &str) -> Vec<Block> {
    let mut table = String::new();
    table.push_str("user            messages\n");
    for (user, count) in &aggregate.user_messages {
        table.push_str(&format!("{user:<15} {count}\n"));
    }

    let mut incidents_table = String::new();
    incidents_table.push_str("service         alert           count  avg_duration_s\n");
    for ((service, alert), stats) in &aggregate.incidents {
        let avg = if stats.count > 0 { stats.total_duration_seconds / stats.count as i64 } else { 0 };
        incidents_table.push_str(&format!("{service:<15} {alert:<15} {:<6} {avg}\n", stats.count));
    }

    vec![
        Block::Section { text: "*Weekly report*".to_string() },
        Block::CodeBlock { text: table },
        Block::Divider,
        Block::CodeBlock { text: incidents_table },
        Block::Section { text: format!("*Suggestions*\n{suggestions}") },
    ]
}
