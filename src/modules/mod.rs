// src/modules/mod.rs
// Per-message pluggable module dispatch. One misbehaving module must never
// starve or fail the pipeline: every module call is isolated behind its own
// tracing span and error boundary.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info_span, warn, Instrument};

use crate::data::messages;
use crate::db::Pool;
use crate::error::{CoreError, CoreResult};

pub const KIND: &str = "dispatch_module";

#[derive(Debug, Serialize, Deserialize)]
pub struct Args {
    pub channel: String,
    pub ts: String,
    pub parent_ts: Option<String>,
    pub is_backfill: bool,
}

/// A pluggable per-message handler. `on_thread_message` and
/// `enabled_for_backfill` have default, capability-probe-style
/// implementations so a module only needs to override what it uses.
#[async_trait]
pub trait Module: Send + Sync {
    fn name(&self) -> &str;

    async fn on_message(&self, ctx: &ModuleContext<'_>, ch: &str, ts: &str, msg_attrs: &Value) -> anyhow::Result<()>;

    async fn on_thread_message(
        &self,
        _ctx: &ModuleContext<'_>,
        _ch: &str,
        _ts: &str,
        _parent_ts: &str,
        _msg_attrs: &Value,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    fn handles_threads(&self) -> bool {
        false
    }

    fn enabled_for_backfill(&self) -> bool {
        false
    }
}

pub struct ModuleContext<'a> {
    pub pool: &'a Pool,
}

pub struct Registry {
    modules: Vec<Box<dyn Module>>,
}

impl Registry {
    pub fn new(modules: Vec<Box<dyn Module>>) -> Self {
        Self { modules }
    }
}

/// Loads the message; if missing on a backfill retry, drops silently with a
/// warning (the dispatch job itself still returns success — this is not a
/// `NotFound` propagated to the runtime, since a backfill race over an
/// already-superseded message is expected, not exceptional). Then attempts
/// every registered module in turn, isolating each behind its own span.
pub async fn run(pool: Pool, registry: std::sync::Arc<Registry>, args: Args) -> CoreResult<()> {
    let message = match messages::get(&pool, &args.channel, &args.ts).await.map_err(CoreError::from)? {
        Some(message) => message,
        None => {
            if args.is_backfill {
                warn!(channel = %args.channel, ts = %args.ts, "message not found on backfill dispatch, dropping");
                return Ok(());
            }
            return Err(CoreError::not_found(format!("message {}/{} not found", args.channel, args.ts)));
        }
    };

    let ctx = ModuleContext { pool: &pool };

    for module in &registry.modules {
        if args.is_backfill && !module.enabled_for_backfill() {
            continue;
        }
        if args.parent_ts.is_some() && !module.handles_threads() {
            continue;
        }

        let span = info_span!(
            "module",
            module = module.name(),
            channel = %args.channel,
            ts = %args.ts,
            parent_ts = args.parent_ts.as_deref().unwrap_or(""),
        );

        let result = async {
            if let Some(parent_ts) = &args.parent_ts {
                module.on_thread_message(&ctx, &args.channel, &args.ts, parent_ts, &message.attrs).await
            } else {
                module.on_message(&ctx, &args.channel, &args.ts, &message.attrs).await
            }
        }
        .instrument(span.clone())
        .await;

        match result {
            Ok(()) => {
                crate::metrics::record_module_dispatch(module.name(), true);
            }
            Err(err) => {
                crate::metrics::record_module_dispatch(module.name(), false);
                span.in_scope(|| {
                    error!(
                        module = module.name(),
                        channel = %args.channel,
                        ts = %args.ts,
                        parent_ts = args.parent_ts.as_deref().unwrap_or(""),
                        error = %err,
                        "module error"
                    );
                });
            }
        }
    }

    // Unconditional success after all modules have been attempted — a
    // module failure is isolated and never fails the dispatcher job.
    Ok(())
}
