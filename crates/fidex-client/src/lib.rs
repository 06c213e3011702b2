use anyhow::{anyhow, Context, Result};
use fidex_config::FiscalizaConfig;
use fidex_core::model::{Project, RawIssue};
use reqwest::{Client, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

/// Thin async client for the Fiscaliza (Redmine) JSON API.
///
/// Fetches are single-shot: one request per resource, no pagination. Basic
/// auth is attached only when a username is configured.
#[derive(Clone)]
pub struct FiscalizaClient {
    cfg: FiscalizaConfig,
    http: Client,
}

/// Filters applied to one issues fetch.
#[derive(Debug, Clone)]
pub struct IssueQuery {
    pub project_id: u64,
    pub tracker_id: Option<u64>,
    pub include_journals: bool,
    pub limit: u64,
}

#[derive(Deserialize)]
struct ProjectsEnvelope {
    #[serde(default)]
    projects: Vec<Project>,
}

#[derive(Deserialize)]
struct IssuesEnvelope {
    #[serde(default)]
    issues: Vec<Value>,
}

impl FiscalizaClient {
    pub fn new(cfg: FiscalizaConfig) -> Result<Self> {
        let http = Client::builder()
            .build()
            .context("failed to construct reqwest client")?;
        Ok(Self { cfg, http })
    }

    fn endpoint(&self, resource: &str) -> Result<Url> {
        let base = self.cfg.url.trim_end_matches('/');
        Url::parse(&format!("{base}/{resource}"))
            .with_context(|| format!("invalid Fiscaliza URL {}", self.cfg.url))
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        let mut req = self.http.get(url);
        if !self.cfg.username.is_empty() {
            req = req.basic_auth(self.cfg.username.clone(), Some(self.cfg.password.clone()));
        }

        let response = req.send().await.context("fiscaliza request failed")?;
        let status = response.status();
        let text = response.text().await.with_context(|| {
            format!("failed to read fiscaliza response body (status {status})")
        })?;
        if !status.is_success() {
            return Err(anyhow!("fiscaliza returned {}: {}", status, text));
        }

        serde_json::from_str(&text)
            .with_context(|| format!("invalid fiscaliza JSON response: {text}"))
    }

    /// Fetches the visible project list in a single request.
    pub async fn fetch_projects(&self, limit: u64) -> Result<Vec<Project>> {
        let mut url = self.endpoint("projects.json")?;
        {
            let mut qp = url.query_pairs_mut();
            qp.append_pair("limit", &limit.to_string());
        }

        let envelope: ProjectsEnvelope = self.get_json(url).await?;
        Ok(envelope.projects)
    }

    /// Fetches one page of issues for a project, across all statuses.
    ///
    /// Records that fail to decode are skipped with a warning naming the
    /// issue and its tracker; a single bad record never sinks the page.
    pub async fn fetch_issues(&self, query: &IssueQuery) -> Result<Vec<RawIssue>> {
        let mut url = self.endpoint("issues.json")?;
        {
            let mut qp = url.query_pairs_mut();
            qp.append_pair("project_id", &query.project_id.to_string());
            qp.append_pair("status_id", "*");
            qp.append_pair("limit", &query.limit.to_string());
            if let Some(tracker_id) = query.tracker_id {
                qp.append_pair("tracker_id", &tracker_id.to_string());
            }
            if query.include_journals {
                qp.append_pair("include", "journals");
            }
        }

        let envelope: IssuesEnvelope = self.get_json(url).await?;
        let mut issues = Vec::with_capacity(envelope.issues.len());
        for raw in envelope.issues {
            let issue_id = raw.get("id").and_then(Value::as_u64).unwrap_or_default();
            let tracker = raw
                .get("tracker")
                .and_then(|tracker| tracker.get("name"))
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            match serde_json::from_value::<RawIssue>(raw) {
                Ok(issue) => issues.push(issue),
                Err(err) => {
                    warn!("skipping undecodable issue {issue_id} ('{tracker}'): {err}");
                }
            }
        }

        Ok(issues)
    }
}
