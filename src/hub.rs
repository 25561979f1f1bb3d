use std::fs;
use std::path::{Path, PathBuf};

use hf_hub::api::sync::{ApiBuilder, ApiRepo};
use hf_hub::{Repo, RepoType};
use tracing::{debug, info, warn};

use crate::config::ModelSource;
use crate::error::{Result, SummarizeError};

const WEIGHT_CANDIDATES: [&str; 2] = ["model.safetensors", "pytorch_model.bin"];

/// Local paths of everything needed to build the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelFiles {
    pub model_id: String,
    pub config: PathBuf,
    pub tokenizer: PathBuf,
    pub weights: PathBuf,
}

impl ModelFiles {
    pub fn from_snapshot(model_id: &str, snapshot: &Path) -> Result<Self> {
        let config = snapshot.join("config.json");
        if !config.exists() {
            return Err(SummarizeError::unavailable(
                model_id,
                format!("config.json not found under {}", snapshot.display()),
            ));
        }

        let tokenizer = snapshot.join("tokenizer.json");
        if !tokenizer.exists() {
            return Err(SummarizeError::unavailable(
                model_id,
                format!("tokenizer.json not found under {}", snapshot.display()),
            ));
        }

        let weights = WEIGHT_CANDIDATES
            .iter()
            .map(|name| snapshot.join(name))
            .find(|path| path.exists())
            .ok_or_else(|| {
                SummarizeError::unavailable(
                    model_id,
                    format!("no model weights found under {}", snapshot.display()),
                )
            })?;

        Ok(Self {
            model_id: model_id.to_string(),
            config,
            tokenizer,
            weights,
        })
    }
}

/// Turns a [`ModelSource`] into local files, downloading when needed.
pub fn resolve(source: &ModelSource) -> Result<ModelFiles> {
    match source {
        ModelSource::Local(dir) => {
            info!("📁 Using local snapshot: {}", dir.display());
            ModelFiles::from_snapshot(&dir.display().to_string(), dir)
        }
        ModelSource::Hub { model_id, revision } => {
            match fetch_from_hub(model_id, revision.as_deref()) {
                Ok(files) => Ok(files),
                Err(err) => {
                    warn!("hub fetch for {model_id} failed ({err}), looking for a cached snapshot");
                    let snapshot = hub_cache_root()
                        .and_then(|root| find_cached_snapshot(&root, model_id, revision.as_deref()))
                        .ok_or(err)?;
                    info!("📁 Using cached snapshot: {}", snapshot.display());
                    ModelFiles::from_snapshot(model_id, &snapshot)
                }
            }
        }
    }
}

fn fetch_from_hub(model_id: &str, revision: Option<&str>) -> Result<ModelFiles> {
    let api = ApiBuilder::new()
        .with_progress(false)
        .build()
        .map_err(|e| SummarizeError::unavailable(model_id, e))?;

    let repo = match revision {
        Some(rev) => Repo::with_revision(model_id.to_string(), RepoType::Model, rev.to_string()),
        None => Repo::model(model_id.to_string()),
    };
    let repo = api.repo(repo);

    info!("📦 Fetching {model_id} from the hub");
    let config = fetch(&repo, model_id, "config.json")?;
    let tokenizer = fetch(&repo, model_id, "tokenizer.json")?;

    let mut last_err = None;
    for name in WEIGHT_CANDIDATES {
        match fetch(&repo, model_id, name) {
            Ok(weights) => {
                return Ok(ModelFiles {
                    model_id: model_id.to_string(),
                    config,
                    tokenizer,
                    weights,
                })
            }
            Err(err) => {
                debug!("{name} not available for {model_id}: {err}");
                last_err = Some(err);
            }
        }
    }

    Err(last_err
        .unwrap_or_else(|| SummarizeError::unavailable(model_id, "no weight files published")))
}

fn fetch(repo: &ApiRepo, model_id: &str, file: &str) -> Result<PathBuf> {
    repo.get(file)
        .map_err(|e| SummarizeError::unavailable(model_id, format!("{file}: {e}")))
}

/// `$HF_HOME/hub`, falling back to `~/.cache/huggingface/hub`.
pub fn hub_cache_root() -> Option<PathBuf> {
    if let Some(home) = std::env::var_os("HF_HOME").filter(|v| !v.is_empty()) {
        return Some(PathBuf::from(home).join("hub"));
    }
    dirs::home_dir().map(|home| home.join(".cache").join("huggingface").join("hub"))
}

/// Locates a previously downloaded snapshot of `model_id` under `cache_root`.
///
/// A pinned `revision` only matches `refs/<revision>` or a snapshot named
/// after that commit. Unpinned lookups prefer `refs/main`, otherwise the
/// first snapshot (by name) that carries a `config.json`.
pub fn find_cached_snapshot(
    cache_root: &Path,
    model_id: &str,
    revision: Option<&str>,
) -> Option<PathBuf> {
    let repo_dir = cache_root.join(format!("models--{}", model_id.replace('/', "--")));
    let snapshots = repo_dir.join("snapshots");
    let has_config = |dir: &Path| dir.join("config.json").exists();

    let reference = revision.unwrap_or("main");
    if let Ok(commit) = fs::read_to_string(repo_dir.join("refs").join(reference)) {
        let candidate = snapshots.join(commit.trim());
        if has_config(candidate.as_path()) {
            return Some(candidate);
        }
    }

    if let Some(rev) = revision {
        let candidate = snapshots.join(rev);
        return has_config(candidate.as_path()).then_some(candidate);
    }

    let mut dirs: Vec<PathBuf> = fs::read_dir(&snapshots)
        .ok()?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_dir() && has_config(path.as_path()))
        .collect();
    dirs.sort();
    dirs.into_iter().next()
}
