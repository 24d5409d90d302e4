//! Audit pipeline stages wrapped by the CLI's execution plans
//!
//! Each stage is opaque to the engine: it is invoked with no arguments from a
//! step's point of view and either returns a JSON summary or fails.

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use paddi_config::{AiProvider, AuditConfig};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

/// Collected configuration snapshot
pub const COLLECTED_FILE: &str = "collected.json";
/// Risk analysis output
pub const EXPLAINED_FILE: &str = "explained.json";
/// Final markdown report
pub const REPORT_FILE: &str = "audit_report.md";

/// Arguments passed to the collector
#[derive(Debug, Clone, PartialEq)]
pub struct CollectRequest {
    pub project_id: Option<String>,
    pub organization_id: Option<String>,
    pub use_mock: bool,
    pub collect_all: bool,
    pub verbose: bool,
}

/// Arguments passed to the explainer
#[derive(Debug, Clone, PartialEq)]
pub struct ExplainRequest {
    pub project_id: Option<String>,
    pub location: String,
    pub use_mock: bool,
    pub ai_provider: AiProvider,
    pub ollama_model: String,
    pub ollama_endpoint: String,
}

impl CollectRequest {
    pub fn from_config(config: &AuditConfig, verbose: bool) -> Self {
        Self {
            project_id: config.project_id.clone(),
            organization_id: config.organization_id.clone(),
            use_mock: config.use_mock,
            collect_all: config.collect_all,
            verbose,
        }
    }
}

impl ExplainRequest {
    pub fn from_config(config: &AuditConfig) -> Self {
        Self {
            project_id: config.project_id.clone(),
            location: config.location.clone(),
            use_mock: config.use_mock,
            ai_provider: config.ai_provider,
            ollama_model: config.ollama_model.clone(),
            ollama_endpoint: config.ollama_endpoint.clone(),
        }
    }
}

/// Cloud providers the collect command can read from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CloudKind {
    Gcp,
    Aws,
    Azure,
}

impl CloudKind {
    /// Short key used in step ids and file names
    pub fn key(&self) -> &'static str {
        match self {
            CloudKind::Gcp => "gcp",
            CloudKind::Aws => "aws",
            CloudKind::Azure => "azure",
        }
    }

    /// Display name
    pub fn label(&self) -> &'static str {
        match self {
            CloudKind::Gcp => "Google Cloud",
            CloudKind::Aws => "AWS",
            CloudKind::Azure => "Azure",
        }
    }
}

/// One account/project/subscription to collect from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloudSource {
    pub kind: CloudKind,
    pub id: String,
}

impl CloudSource {
    /// Sources configured in `config`, in gcp, aws, azure order
    pub fn from_config(config: &AuditConfig) -> Vec<CloudSource> {
        [
            (CloudKind::Gcp, &config.project_id),
            (CloudKind::Aws, &config.aws_account_id),
            (CloudKind::Azure, &config.azure_subscription_id),
        ]
        .into_iter()
        .filter_map(|(kind, id)| {
            id.as_ref().map(|id| CloudSource {
                kind,
                id: id.clone(),
            })
        })
        .collect()
    }
}

impl fmt::Display for CloudSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.kind.label(), self.id)
    }
}

/// Collaborators driven by the audit and collect plans
#[async_trait]
pub trait AuditStages: Send + Sync {
    /// Collect cloud configuration
    async fn collect(&self, request: &CollectRequest) -> anyhow::Result<Value>;

    /// Analyse collected configuration for security risks
    async fn explain(&self, request: &ExplainRequest) -> anyhow::Result<Value>;

    /// Render the audit report into `output_dir`
    async fn report(&self, output_dir: &Path) -> anyhow::Result<Value>;

    /// Collect configuration from a single cloud source
    async fn collect_source(&self, source: &CloudSource) -> anyhow::Result<Value>;

    /// Merge the collections of `sources` into one snapshot
    async fn aggregate(&self, sources: &[CloudSource]) -> anyhow::Result<Value>;
}

/// A risk identified by the explain stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub title: String,
    pub severity: String,
    pub resource: String,
    pub recommendation: String,
}

/// Stages backed by deterministic sample data written to an output directory
pub struct MockAuditStages {
    output_dir: PathBuf,
}

impl MockAuditStages {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    async fn write_json(&self, name: &str, value: &Value) -> anyhow::Result<PathBuf> {
        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .with_context(|| format!("creating {}", self.output_dir.display()))?;
        let path = self.output_dir.join(name);
        tokio::fs::write(&path, serde_json::to_vec_pretty(value)?)
            .await
            .with_context(|| format!("writing {}", path.display()))?;
        Ok(path)
    }

    async fn read_json(&self, name: &str) -> anyhow::Result<Value> {
        let path = self.output_dir.join(name);
        let bytes = tokio::fs::read(&path)
            .await
            .with_context(|| format!("{} not found; run the previous stage first", path.display()))?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    fn sample_gcp(project: &str) -> Value {
        json!({
            "iam_policies": [
                { "role": "roles/owner", "members": ["user:admin@example.com"] },
                { "role": "roles/storage.objectViewer", "members": ["allUsers"] },
                { "role": "roles/viewer", "members": ["group:auditors@example.com"] },
            ],
            "scc_findings": [
                {
                    "category": "PUBLIC_BUCKET_ACL",
                    "severity": "HIGH",
                    "resource": format!("//storage.googleapis.com/{}-public-assets", project),
                },
                {
                    "category": "OPEN_FIREWALL",
                    "severity": "MEDIUM",
                    "resource": format!("//compute.googleapis.com/projects/{}/global/firewalls/allow-ssh", project),
                },
            ],
        })
    }

    fn sample_source(source: &CloudSource) -> Value {
        match source.kind {
            CloudKind::Gcp => Self::sample_gcp(&source.id),
            CloudKind::Aws => json!({
                "iam_policies": [
                    { "role": "AdministratorAccess", "members": ["user:root"] },
                ],
                "scc_findings": [],
            }),
            CloudKind::Azure => json!({
                "iam_policies": [
                    { "role": "Owner", "members": ["user:ops@example.com"] },
                ],
                "scc_findings": [],
            }),
        }
    }

    fn findings(collected: &Value) -> Vec<Finding> {
        let mut findings = Vec::new();

        let policies = collected["iam_policies"].as_array().cloned().unwrap_or_default();
        for policy in &policies {
            let role = policy["role"].as_str().unwrap_or_default();
            let members = policy["members"].as_array().cloned().unwrap_or_default();
            for member in members.iter().filter_map(Value::as_str) {
                if member == "allUsers" || member == "allAuthenticatedUsers" {
                    findings.push(Finding {
                        title: format!("{} is granted publicly", role),
                        severity: "HIGH".to_string(),
                        resource: member.to_string(),
                        recommendation: "Remove public principals from IAM bindings".to_string(),
                    });
                } else if role.ends_with("owner") || role.ends_with("Owner") || role == "AdministratorAccess" {
                    findings.push(Finding {
                        title: format!("Privileged role {} held by {}", role, member),
                        severity: "MEDIUM".to_string(),
                        resource: member.to_string(),
                        recommendation: "Grant narrower predefined roles".to_string(),
                    });
                }
            }
        }

        let scc = collected["scc_findings"].as_array().cloned().unwrap_or_default();
        for finding in &scc {
            findings.push(Finding {
                title: finding["category"].as_str().unwrap_or("UNKNOWN").to_string(),
                severity: finding["severity"].as_str().unwrap_or("LOW").to_string(),
                resource: finding["resource"].as_str().unwrap_or_default().to_string(),
                recommendation: "Review the Security Command Center finding".to_string(),
            });
        }

        findings
    }

    fn render_report(explained: &Value) -> anyhow::Result<String> {
        let findings: Vec<Finding> = serde_json::from_value(explained["findings"].clone())?;
        let target = explained["target"].as_str().unwrap_or("unknown");

        let mut report = format!("# Security Audit Report\n\nTarget: {}\n\n## Summary\n\n", target);
        report.push_str("| Severity | Count |\n|----------|-------|\n");
        for severity in ["HIGH", "MEDIUM", "LOW"] {
            let count = findings.iter().filter(|f| f.severity == severity).count();
            report.push_str(&format!("| {} | {} |\n", severity, count));
        }

        report.push_str("\n## Findings\n\n");
        if findings.is_empty() {
            report.push_str("No findings.\n");
        }
        for (i, finding) in findings.iter().enumerate() {
            report.push_str(&format!(
                "### {}. {} ({})\n\n- Resource: `{}`\n- Recommendation: {}\n\n",
                i + 1,
                finding.title,
                finding.severity,
                finding.resource,
                finding.recommendation
            ));
        }
        Ok(report)
    }
}

#[async_trait]
impl AuditStages for MockAuditStages {
    async fn collect(&self, request: &CollectRequest) -> anyhow::Result<Value> {
        let target = request
            .project_id
            .clone()
            .or_else(|| request.organization_id.clone())
            .ok_or_else(|| anyhow!("a project id or organization id is required"))?;
        debug!(target = %target, collect_all = request.collect_all, "Collecting sample configuration");

        let mut collected = Self::sample_gcp(&target);
        collected["target"] = json!(target);
        collected["collect_all"] = json!(request.collect_all);
        let path = self.write_json(COLLECTED_FILE, &collected).await?;

        Ok(json!({
            "path": path.display().to_string(),
            "iam_policies": collected["iam_policies"].as_array().map_or(0, Vec::len),
        }))
    }

    async fn explain(&self, request: &ExplainRequest) -> anyhow::Result<Value> {
        let collected = self.read_json(COLLECTED_FILE).await?;
        debug!(provider = %request.ai_provider, location = %request.location, "Explaining sample configuration");

        let findings = Self::findings(&collected);
        let model = match request.ai_provider {
            AiProvider::Ollama => request.ollama_model.as_str(),
            AiProvider::Gemini => "gemini",
        };
        let explained = json!({
            "target": collected["target"],
            "ai_provider": request.ai_provider.to_string(),
            "model": model,
            "findings": findings,
        });
        let path = self.write_json(EXPLAINED_FILE, &explained).await?;

        Ok(json!({
            "path": path.display().to_string(),
            "findings": findings.len(),
        }))
    }

    async fn report(&self, output_dir: &Path) -> anyhow::Result<Value> {
        let explained = self.read_json(EXPLAINED_FILE).await?;
        let report = Self::render_report(&explained)?;

        tokio::fs::create_dir_all(output_dir).await?;
        let path = output_dir.join(REPORT_FILE);
        tokio::fs::write(&path, report)
            .await
            .with_context(|| format!("writing {}", path.display()))?;

        Ok(json!({ "path": path.display().to_string() }))
    }

    async fn collect_source(&self, source: &CloudSource) -> anyhow::Result<Value> {
        debug!(source = %source, "Collecting sample source");
        let mut collected = Self::sample_source(source);
        collected["source"] = json!(source.kind);
        collected["id"] = json!(source.id);
        let name = format!("collected_{}.json", source.kind.key());
        let path = self.write_json(&name, &collected).await?;
        Ok(json!({ "path": path.display().to_string() }))
    }

    async fn aggregate(&self, sources: &[CloudSource]) -> anyhow::Result<Value> {
        if sources.is_empty() {
            return Err(anyhow!("no collected sources to aggregate"));
        }

        let mut entries = Vec::new();
        let mut policies = Vec::new();
        let mut scc = Vec::new();
        for source in sources {
            let collected = self
                .read_json(&format!("collected_{}.json", source.kind.key()))
                .await?;
            entries.push(json!({ "source": source.kind, "id": source.id }));
            policies.extend(collected["iam_policies"].as_array().cloned().unwrap_or_default());
            scc.extend(collected["scc_findings"].as_array().cloned().unwrap_or_default());
        }

        let target = sources
            .iter()
            .map(|s| s.id.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        let aggregated = json!({
            "target": target,
            "sources": entries,
            "iam_policies": policies,
            "scc_findings": scc,
        });
        let path = self.write_json(COLLECTED_FILE, &aggregated).await?;
        Ok(json!({
            "path": path.display().to_string(),
            "sources": aggregated["sources"].as_array().map_or(0, Vec::len),
        }))
    }
}

/// Stages for live cloud providers; no live backend is wired in this build
#[derive(Debug, Default)]
pub struct LiveAuditStages;

impl LiveAuditStages {
    fn unavailable(what: &str) -> anyhow::Error {
        anyhow!("no live {} is configured; rerun with --use-mock", what)
    }
}

#[async_trait]
impl AuditStages for LiveAuditStages {
    async fn collect(&self, _request: &CollectRequest) -> anyhow::Result<Value> {
        Err(Self::unavailable("collector"))
    }

    async fn explain(&self, request: &ExplainRequest) -> anyhow::Result<Value> {
        Err(Self::unavailable(&format!("{} explainer", request.ai_provider)))
    }

    async fn report(&self, _output_dir: &Path) -> anyhow::Result<Value> {
        Err(Self::unavailable("reporter"))
    }

    async fn collect_source(&self, source: &CloudSource) -> anyhow::Result<Value> {
        Err(Self::unavailable(&format!("{} collector", source.kind.label())))
    }

    async fn aggregate(&self, _sources: &[CloudSource]) -> anyhow::Result<Value> {
        Err(Self::unavailable("aggregator"))
    }
}
