// src/config/documentation.rs
//
// `documentation.sources[]` is the one config surface too structured to live
// comfortably as environment variables, so it's loaded from a YAML file
// instead (see `Config::load` in `config/mod.rs`).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DocumentationConfig {
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: SourceKind,
    pub github: GithubSourceConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Github,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GithubSourceConfig {
    #[serde(default)]
    pub app_id: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub installation_id: Option<String>,
    #[serde(default)]
    pub private_key_path: Option<String>,
    #[serde(default = "default_github_url")]
    pub github_url: String,
    pub owner: String,
    pub repo: String,
    #[serde(default)]
    pub path: String,
}

fn default_github_url() -> String {
    "https://github.com".to_string()
}

impl DocumentationConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        for source in &self.sources {
            let gh = &source.github;
            let has_app_auth = gh.app_id.is_some() && gh.installation_id.is_some() && gh.private_key_path.is_some();
            let has_token_auth = gh.token.is_some();
            if !has_app_auth && !has_token_auth {
                anyhow::bail!(
                    "documentation source '{}' needs either a token or app_id+installation_id+private_key_path",
                    source.name
                );
            }
            if gh.owner.is_empty() || gh.repo.is_empty() {
                anyhow::bail!("documentation source '{}' is missing owner/repo", source.name);
            }
        }
        Ok(())
    }

    /// A stable identity for each configured source, used as the `documentation_sources.url` key.
    pub fn source_url(source: &SourceConfig) -> String {
        format!(
            "{}/{}/{}/{}",
            source.github.github_url.trim_end_matches('/'),
            source.github.owner,
            source.github.repo,
            source.github.path
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_token_auth_source() {
        let yaml = r#"
sources:
  - name: runbooks
    type: github
    github:
      token: ghp_xxx
      owner: acme
      repo: runbooks
      path: docs
"#;
        let cfg: DocumentationConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(cfg.sources.len(), 1);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn rejects_source_without_auth() {
        let yaml = r#"
sources:
  - name: runbooks
    type: github
    github:
      owner: acme
      repo: runbooks
"#;
        let cfg: DocumentationConfig = serde_yaml::from_str(yaml).unwrap();
        assert!(cfg.validate().is_err());
    }
}
