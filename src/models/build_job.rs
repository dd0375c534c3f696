// Build job data models
use super::PackagingOptions;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Pending,
    ResolvingDeps,
    Provisioning,
    Installing,
    Bundling,
    Cleaning,
    Succeeded,
    Failed,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::ResolvingDeps => "resolving dependencies",
            Self::Provisioning => "creating build environment",
            Self::Installing => "installing dependencies",
            Self::Bundling => "bundling",
            Self::Cleaning => "cleaning up",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildJob {
    pub id: String,
    pub script_path: PathBuf,
    pub options: PackagingOptions,
    pub state: JobState,
    pub created_at: String,
    pub completed_at: Option<String>,
}

impl BuildJob {
    pub fn new(options: PackagingOptions) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            script_path: options.script_path.clone(),
            options,
            state: JobState::Pending,
            created_at: chrono::Utc::now().to_rfc3339(),
            completed_at: None,
        }
    }
}

/// Deduplicated, sorted installable package names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencySet(BTreeSet<String>);

impl DependencySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>) -> bool {
        let name = name.into();
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return false;
        }
        self.0.insert(trimmed.to_string())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains(name)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.0.iter()
    }

    /// Manifest text: one package per line, trailing newline.
    pub fn to_manifest(&self) -> String {
        self.0.iter().map(|name| format!("{}\n", name)).collect()
    }

    /// Parse manifest text, ignoring blank lines and `#` comments.
    pub fn from_manifest(text: &str) -> Self {
        text.lines()
            .map(|line| line.split('#').next().unwrap_or("").trim())
            .filter(|line| !line.is_empty())
            .collect()
    }
}

impl<S: Into<String>> FromIterator<S> for DependencySet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = Self::new();
        for name in iter {
            set.insert(name);
        }
        set
    }
}

impl fmt::Display for DependencySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.0.iter().map(String::as_str).collect();
        f.write_str(&names.join(", "))
    }
}

/// Where a job's dependency list came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DependencySource {
    Manifest,
    Static,
    Inference,
    /// Inference failed; static scan used instead.
    StaticFallback { reason: String },
}

/// Progress and status messages emitted while a job runs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PipelineEvent {
    Stage { job_id: String, state: JobState },
    Status { job_id: String, message: String },
    Finished { report: BuildReport },
}

/// Terminal outcome of one job, handed back to the caller.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BuildReport {
    pub job_id: String,
    pub state: JobState,
    pub status: String,
    pub log_path: PathBuf,
    pub dist_dir: Option<PathBuf>,
    pub dependencies: DependencySet,
    pub dependency_source: Option<DependencySource>,
    pub duration_ms: u64,
}

impl BuildReport {
    pub fn succeeded(&self) -> bool {
        self.state == JobState::Succeeded
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dependency_set_dedup_and_sort() {
        let deps: DependencySet = ["requests", "numpy", "requests", " ", "Pillow"]
            .into_iter()
            .collect();
        let names: Vec<&String> = deps.iter().collect();
        assert_eq!(names, ["Pillow", "numpy", "requests"]);
    }

    #[test]
    fn test_manifest_parsing_skips_comments() {
        let deps = DependencySet::from_manifest("# generated\nrequests\n\nnumpy  # math\n");
        assert_eq!(deps.len(), 2);
        assert!(deps.contains("numpy"));
        assert_eq!(deps.to_manifest(), "numpy\nrequests\n");
    }

    #[test]
    fn test_new_job_is_pending() {
        let job = BuildJob::new(PackagingOptions::new("app.py"));
        assert_eq!(job.state, JobState::Pending);
        assert!(!job.state.is_terminal());
        assert!(!job.id.is_empty());
    }
}
