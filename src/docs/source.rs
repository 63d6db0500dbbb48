// src/docs/source.rs
//
// The documentation-source contract and its one concrete implementation (a
// GitHub-flavored source, per the YAML config schema). `ChangesSince` is
// modelled as a "lazy sequence with a deferred error": the caller drains
// `updates` fully, then inspects `error` — this keeps partial-progress
// semantics honest without forcing an eager `Vec<Result<_>>`.

use async_trait::async_trait;

use crate::config::documentation::SourceConfig;
use crate::error::CoreResult;

#[derive(Debug, Clone)]
pub struct Update {
    pub revision: String,
    pub path: String,
    pub blob_sha: String,
}

pub struct ChangesSince {
    pub updates: Vec<Update>,
    pub head_revision: String,
    pub error: Option<anyhow::Error>,
}

#[async_trait]
pub trait DocumentationSource: Send + Sync {
    fn url(&self) -> &str;

    async fn changes_since(&self, current_revision: &str) -> CoreResult<ChangesSince>;

    async fn get(&self, path: &str, revision: &str) -> CoreResult<String>;
}

pub mod github;

pub fn build(config: &SourceConfig) -> anyhow::Result<Box<dyn DocumentationSource>> {
    match config.kind {
        crate::config::documentation::SourceKind::Github => Ok(Box::new(github::GithubSource::new(config)?)),
    }
}
