// Build orchestration: resolve, provision, bundle, clean
//
// One job runs start to finish on the calling thread. Failures after input
// validation never escape as errors; they end the job in `Failed` with a
// status string, and the transcript is always written to pack_log.txt.

use super::command::CommandBuilder;
use super::deps::{DependencyResolver, ResolveStrategy};
use super::environment::{EnvGuard, Provisioner, VenvProvisioner};
use crate::error::{AiconError, Result};
use crate::file_manager::write_text_file;
use crate::models::{
    AppConfig, BuildJob, BuildReport, DependencySet, DependencySource, JobState, PackagingOptions,
    PipelineEvent,
};
use crate::process_manager::{get_python_path, CommandRunner, SystemRunner};
use crate::utils::{get_build_env_dir, get_build_log_path};
use log::{error, info, warn};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

/// Builds the provisioner for a job: `(env_dir, host_python)`.
pub type ProvisionerFactory = Box<dyn Fn(&Path, &str) -> Box<dyn Provisioner> + Send + Sync>;

pub struct BuildPipeline {
    resolver: DependencyResolver,
    runner: Arc<dyn CommandRunner>,
    builder: CommandBuilder,
    make_provisioner: ProvisionerFactory,
    host_python: Option<String>,
    keep_only_exe: bool,
}

struct JobContext<'a> {
    transcript: String,
    deps: DependencySet,
    source: Option<DependencySource>,
    events: &'a mut dyn FnMut(PipelineEvent),
}

impl JobContext<'_> {
    fn stage(&mut self, job: &mut BuildJob, state: JobState) {
        info!("[{}] {}", job.id, state.label());
        job.state = state;
        (self.events)(PipelineEvent::Stage {
            job_id: job.id.clone(),
            state,
        });
    }

    fn status(&mut self, job: &BuildJob, message: String) {
        self.transcript.push_str(&format!("# {}\n", message));
        (self.events)(PipelineEvent::Status {
            job_id: job.id.clone(),
            message,
        });
    }

    fn append(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        self.transcript.push_str(text);
        if !text.ends_with('\n') {
            self.transcript.push('\n');
        }
    }
}

impl BuildPipeline {
    /// Pipeline running real subprocesses and venv environments.
    pub fn new(config: &AppConfig, strategy: ResolveStrategy) -> Self {
        let runner: Arc<dyn CommandRunner> = Arc::new(SystemRunner);
        let venv_runner = runner.clone();
        let factory: ProvisionerFactory = Box::new(move |env_dir: &Path, host_python: &str| -> Box<dyn Provisioner> {
            Box::new(VenvProvisioner::new(env_dir, host_python, venv_runner.clone()))
        });
        Self::with_parts(config, DependencyResolver::new(config, strategy), runner, factory)
    }

    pub fn with_parts(
        config: &AppConfig,
        resolver: DependencyResolver,
        runner: Arc<dyn CommandRunner>,
        make_provisioner: ProvisionerFactory,
    ) -> Self {
        Self {
            resolver,
            runner,
            builder: CommandBuilder::for_host(),
            make_provisioner,
            host_python: config.python.clone(),
            keep_only_exe: false,
        }
    }

    /// Delete the work directory and `.spec` file after a successful build.
    pub fn keep_only_exe(mut self, enabled: bool) -> Self {
        self.keep_only_exe = enabled;
        self
    }

    pub fn with_command_builder(mut self, builder: CommandBuilder) -> Self {
        self.builder = builder;
        self
    }

    pub fn apply_config(&mut self, config: &AppConfig) {
        self.resolver.apply_config(config);
        self.host_python = config.python.clone();
    }

    /// Run one build job to a terminal state.
    ///
    /// Only a missing script is returned as an error (before anything is
    /// touched). Every later failure is reported through the returned
    /// `BuildReport`.
    pub fn run(
        &mut self,
        mut options: PackagingOptions,
        on_event: &mut dyn FnMut(PipelineEvent),
    ) -> Result<BuildReport> {
        let started = Instant::now();
        if !options.script_path.is_file() {
            return Err(AiconError::Validation(format!(
                "script not found: {}",
                options.script_path.display()
            )));
        }
        options.script_path = absolutize(&options.script_path)?;

        let mut job = BuildJob::new(options);
        let log_path = get_build_log_path(&job.options.script_dir());
        info!("[{}] Packaging {}", job.id, job.script_path.display());

        let mut ctx = JobContext {
            transcript: String::new(),
            deps: DependencySet::new(),
            source: None,
            events: on_event,
        };

        let outcome = self.execute(&mut job, &mut ctx);

        let (state, status, dist_dir) = match outcome {
            Ok(dist) => {
                let status = format!("Build succeeded: {}", dist.display());
                info!("[{}] {}", job.id, status);
                (JobState::Succeeded, status, Some(dist))
            }
            Err(e) => {
                let status = format!("Build failed ({}): {}", e.kind(), e);
                error!("[{}] {}", job.id, status);
                ctx.append(&format!("# {}", status));
                (JobState::Failed, status, None)
            }
        };

        if let Err(e) = write_text_file(&log_path, &ctx.transcript) {
            warn!("[{}] Could not write build log {}: {}", job.id, log_path.display(), e);
        }

        job.completed_at = Some(chrono::Utc::now().to_rfc3339());
        ctx.stage(&mut job, state);

        let report = BuildReport {
            job_id: job.id.clone(),
            state,
            status,
            log_path,
            dist_dir,
            dependencies: ctx.deps.clone(),
            dependency_source: ctx.source.clone(),
            duration_ms: started.elapsed().as_millis() as u64,
        };
        (ctx.events)(PipelineEvent::Finished {
            report: report.clone(),
        });
        Ok(report)
    }

    fn execute(&mut self, job: &mut BuildJob, ctx: &mut JobContext<'_>) -> Result<PathBuf> {
        ctx.stage(job, JobState::ResolvingDeps);
        let resolved = self.resolver.resolve(&job.script_path)?;

        if let DependencySource::StaticFallback { reason } = &resolved.source {
            ctx.status(job, format!("Dependency inference unavailable, used static scan: {}", reason));
        }
        ctx.status(
            job,
            format!(
                "Dependencies ({}): {}",
                source_label(&resolved.source),
                if resolved.deps.is_empty() {
                    "none".to_string()
                } else {
                    resolved.deps.to_string()
                }
            ),
        );
        ctx.deps = resolved.deps;
        ctx.source = Some(resolved.source);

        let host_python = get_python_path(self.host_python.as_deref());

        if ctx.deps.is_empty() {
            ctx.status(job, "No third-party dependencies, bundling with the host interpreter".to_string());
            let dist = self.bundle(job, Path::new(&host_python), ctx)?;
            ctx.stage(job, JobState::Cleaning);
            self.remove_intermediates(job)?;
            return Ok(dist);
        }

        let env_dir = get_build_env_dir(&job.options.script_dir());
        let mut guard = EnvGuard::new((self.make_provisioner)(env_dir.as_path(), host_python.as_str()));

        let result = self.provision_and_bundle(job, &mut guard, ctx);
        if result.is_ok() {
            ctx.stage(job, JobState::Cleaning);
        }

        let (rest, teardown) = guard.finish();
        ctx.append(&rest);
        if let Err(e) = teardown {
            warn!("[{}] Environment teardown failed: {}", job.id, e);
            ctx.status(job, format!("Could not remove build environment: {}", e));
        }

        let dist = result?;
        self.remove_intermediates(job)?;
        Ok(dist)
    }

    fn provision_and_bundle(
        &self,
        job: &mut BuildJob,
        guard: &mut EnvGuard,
        ctx: &mut JobContext<'_>,
    ) -> Result<PathBuf> {
        let provisioner = guard
            .provisioner()
            .ok_or_else(|| AiconError::Provisioning("environment already released".to_string()))?;

        ctx.stage(job, JobState::Provisioning);
        let created = provisioner.create();
        ctx.append(&provisioner.take_transcript());
        let python = created?;

        ctx.stage(job, JobState::Installing);
        let deps = ctx.deps.clone();
        let installed = provisioner.install(&deps).and_then(|_| provisioner.verify());
        ctx.append(&provisioner.take_transcript());
        installed?;

        self.bundle(job, &python, ctx)
    }

    fn bundle(&self, job: &mut BuildJob, python: &Path, ctx: &mut JobContext<'_>) -> Result<PathBuf> {
        ctx.stage(job, JobState::Bundling);
        let script_dir = job.options.script_dir();
        let argv = self.builder.invocation(python, &job.options);
        ctx.append(&format!("$ {}", argv.join(" ")));

        let output = self.runner.run(&argv, Some(&script_dir))?;
        ctx.append(&output.combined());

        if !output.success() {
            return Err(AiconError::Bundling {
                code: output.exit_code,
                stderr: output.stderr.trim().to_string(),
            });
        }

        Ok(resolve_against(&script_dir, job.options.dist_dir.as_deref(), "dist"))
    }

    fn remove_intermediates(&self, job: &BuildJob) -> Result<()> {
        if !self.keep_only_exe {
            return Ok(());
        }
        let script_dir = job.options.script_dir();
        let work_dir = resolve_against(&script_dir, job.options.work_dir.as_deref(), "build");
        let spec_file = resolve_against(&script_dir, job.options.spec_dir.as_deref(), ".")
            .join(format!("{}.spec", job.options.app_name()));

        match fs::remove_dir_all(&work_dir) {
            Err(e) if e.kind() != ErrorKind::NotFound => return Err(e.into()),
            _ => {}
        }
        match fs::remove_file(&spec_file) {
            Err(e) if e.kind() != ErrorKind::NotFound => return Err(e.into()),
            _ => {}
        }
        info!("[{}] Removed {} and {}", job.id, work_dir.display(), spec_file.display());
        Ok(())
    }
}

fn source_label(source: &DependencySource) -> &'static str {
    match source {
        DependencySource::Manifest => "existing manifest",
        DependencySource::Static => "static scan",
        DependencySource::Inference => "inference",
        DependencySource::StaticFallback { .. } => "static fallback",
    }
}

fn absolutize(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

/// `value` relative to `base`, or `base/default` when unset.
fn resolve_against(base: &Path, value: Option<&Path>, default: &str) -> PathBuf {
    match value {
        Some(p) if p.is_absolute() => p.to_path_buf(),
        Some(p) => base.join(p),
        None => base.join(default),
    }
}
