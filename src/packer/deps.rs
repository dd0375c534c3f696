// Dependency discovery for a Python script
//
// Two strategies: a static scan of import statements, and remote inference
// over a truncated copy of the source that falls back to the static scan on
// any failure. Whatever is found is persisted as requirements.txt next to the
// script; an existing manifest short-circuits resolution entirely.

use super::stdlib::{is_stdlib, package_for_import};
use crate::error::{AiconError, Result, TransportError};
use crate::file_manager::write_text_file;
use crate::generator::{ChatApi, OpenAiHttp};
use crate::models::{AppConfig, DependencySet, DependencySource};
use crate::utils::get_manifest_path;
use log::{debug, info, warn};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

const INFERENCE_INSTRUCTION: &str = "You are a Python packaging assistant. \
Given Python source code, reply with ONLY the pip-installable package names it needs, \
comma-separated, on a single line. Exclude standard library modules and relative imports. \
Map import names to their PyPI distribution names (for example PIL -> pillow, cv2 -> opencv-python, \
sklearn -> scikit-learn, yaml -> PyYAML). Reply with an empty line if nothing is needed. \
No explanations, no code fences.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResolveStrategy {
    #[default]
    Static,
    /// Remote inference, falling back to the static scan on failure.
    Inference,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedDeps {
    pub deps: DependencySet,
    pub source: DependencySource,
    pub manifest: PathBuf,
}

pub struct DependencyResolver {
    config: AppConfig,
    strategy: ResolveStrategy,
    chat: Option<Arc<dyn ChatApi>>,
    injected: bool,
}

impl DependencyResolver {
    pub fn new(config: &AppConfig, strategy: ResolveStrategy) -> Self {
        Self {
            config: config.clone(),
            strategy,
            chat: None,
            injected: false,
        }
    }

    pub fn with_chat(config: &AppConfig, strategy: ResolveStrategy, chat: Arc<dyn ChatApi>) -> Self {
        Self {
            chat: Some(chat),
            injected: true,
            ..Self::new(config, strategy)
        }
    }

    pub fn apply_config(&mut self, config: &AppConfig) {
        self.config = config.clone();
        if !self.injected {
            self.chat = None;
        }
    }

    pub fn strategy(&self) -> ResolveStrategy {
        self.strategy
    }

    /// Resolve the third-party packages `script` needs.
    pub fn resolve(&mut self, script: &Path) -> Result<ResolvedDeps> {
        if !script.is_file() {
            return Err(AiconError::Validation(format!(
                "script not found: {}",
                script.display()
            )));
        }
        let manifest = get_manifest_path(&script_dir(script));

        if manifest.is_file() {
            let text = fs::read_to_string(&manifest)?;
            let deps = DependencySet::from_manifest(&text);
            info!("Reusing manifest {} ({} package(s))", manifest.display(), deps.len());
            return Ok(ResolvedDeps {
                deps,
                source: DependencySource::Manifest,
                manifest,
            });
        }

        let (deps, source) = match self.strategy {
            ResolveStrategy::Static => (scan_static(script)?, DependencySource::Static),
            ResolveStrategy::Inference => match self.infer(script) {
                Ok(deps) => (deps, DependencySource::Inference),
                Err(e) => {
                    warn!("Dependency inference failed, using static scan: {}", e);
                    (
                        scan_static(script)?,
                        DependencySource::StaticFallback {
                            reason: e.to_string(),
                        },
                    )
                }
            },
        };

        write_text_file(&manifest, &deps.to_manifest())?;
        info!(
            "Resolved {} package(s) for {}: {}",
            deps.len(),
            script.display(),
            deps
        );

        Ok(ResolvedDeps {
            deps,
            source,
            manifest,
        })
    }

    fn ensure_chat(&mut self) -> Result<Arc<dyn ChatApi>> {
        if let Some(chat) = &self.chat {
            return Ok(chat.clone());
        }
        let key = self.config.api_key().ok_or_else(|| {
            AiconError::Configuration("no API key available for dependency inference".to_string())
        })?;
        let http = OpenAiHttp::new(
            &self.config.base_url,
            key,
            Duration::from_secs(self.config.timeout_secs.max(1)),
        )
        .map_err(|e| AiconError::Configuration(e.to_string()))?;
        let chat: Arc<dyn ChatApi> = Arc::new(http);
        self.chat = Some(chat.clone());
        Ok(chat)
    }

    fn infer(&mut self, script: &Path) -> Result<DependencySet> {
        let chat = self.ensure_chat()?;
        let source = read_source(script)?;
        let excerpt: String = source.chars().take(self.config.inference_char_budget).collect();
        debug!(
            "Asking {} for dependencies ({} chars)",
            self.config.chat_model,
            excerpt.chars().count()
        );

        let reply = chat.complete(&self.config.chat_model, INFERENCE_INSTRUCTION, &excerpt)?;
        parse_inference_reply(&reply)
            .map_err(|reason| AiconError::RemoteRequest(TransportError::Malformed(reason)))
    }
}

fn script_dir(script: &Path) -> PathBuf {
    script
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}

fn read_source(script: &Path) -> Result<String> {
    let bytes = fs::read(script)?;
    Ok(String::from_utf8_lossy(&bytes).to_string())
}

/// Static strategy: imports minus stdlib and sibling modules, aliased.
pub fn scan_static(script: &Path) -> Result<DependencySet> {
    let source = read_source(script)?;
    let dir = script_dir(script);

    let deps = parse_imports(&source)
        .into_iter()
        .filter(|module| !is_stdlib(module))
        .filter(|module| !is_local_module(&dir, module))
        .map(|module| package_for_import(&module).to_string())
        .collect();
    Ok(deps)
}

fn is_local_module(dir: &Path, module: &str) -> bool {
    dir.join(format!("{}.py", module)).is_file() || dir.join(module).is_dir()
}

/// Top-level module names of every absolute import, in source order.
pub fn parse_imports(source: &str) -> Vec<String> {
    let mut modules = Vec::new();
    let mut open_string: Option<&'static str> = None;

    for raw_line in source.lines() {
        let code = strip_line(raw_line.trim(), &mut open_string);
        for statement in code.split(';').map(str::trim) {
            if let Some(rest) = statement.strip_prefix("import ") {
                for part in rest.split(',') {
                    let name = part.split_whitespace().next().unwrap_or("");
                    push_top_level(&mut modules, name);
                }
            } else if let Some(rest) = statement.strip_prefix("from ") {
                let module = rest.split_whitespace().next().unwrap_or("");
                if !module.starts_with('.') {
                    push_top_level(&mut modules, module);
                }
            }
        }
    }
    modules
}

/// The code part of one line: triple-quoted text and comments removed.
///
/// `open_string` carries an unterminated `"""` or `'''` across lines. String
/// prefixes such as `r` or `b` stay behind in the code and never form a
/// statement on their own.
fn strip_line(line: &str, open_string: &mut Option<&'static str>) -> String {
    let mut code = String::new();
    let mut rest = line;

    loop {
        if let Some(delim) = *open_string {
            match rest.find(delim) {
                Some(end) => {
                    rest = &rest[end + delim.len()..];
                    *open_string = None;
                }
                None => return code,
            }
            continue;
        }

        let next_quote = ["\"\"\"", "'''"]
            .into_iter()
            .filter_map(|d| rest.find(d).map(|at| (at, d)))
            .min_by_key(|(at, _)| *at);
        let comment = rest.find('#');

        match next_quote {
            Some((at, delim)) if comment.map_or(true, |c| at < c) => {
                code.push_str(&rest[..at]);
                rest = &rest[at + delim.len()..];
                *open_string = Some(delim);
            }
            _ => {
                code.push_str(&rest[..comment.unwrap_or(rest.len())]);
                return code;
            }
        }
    }
}

fn push_top_level(modules: &mut Vec<String>, dotted: &str) {
    let top = dotted.trim_matches(|c| c == '(' || c == ')').split('.').next().unwrap_or("");
    let valid = top
        .chars()
        .next()
        .map(|c| c.is_alphabetic() || c == '_')
        .unwrap_or(false)
        && top.chars().all(|c| c.is_alphanumeric() || c == '_');
    if valid && !modules.iter().any(|m| m == top) {
        modules.push(top.to_string());
    }
}

/// Parse a comma-separated package list; anything that is not a plausible
/// requirement specifier makes the whole reply malformed.
pub fn parse_inference_reply(reply: &str) -> std::result::Result<DependencySet, String> {
    let cleaned = reply.replace("```", "");
    let mut deps = DependencySet::new();

    for token in cleaned.split(|c: char| c == ',' || c == '\n') {
        let token = token
            .trim()
            .trim_start_matches(|c: char| c == '-' || c == '*')
            .trim()
            .trim_matches(|c: char| c == '"' || c == '\'' || c == '`');
        if token.is_empty() || token.eq_ignore_ascii_case("none") {
            continue;
        }
        let plausible = token
            .chars()
            .next()
            .map(|c| c.is_ascii_alphanumeric())
            .unwrap_or(false)
            && token
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || "-_.[]<>=!~".contains(c));
        if !plausible {
            return Err(format!("unexpected token in inference reply: '{}'", token));
        }
        deps.insert(token);
    }
    Ok(deps)
}
