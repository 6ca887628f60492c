use std::path::{Path, PathBuf};

use anyhow::Result;

/// Files needed to load a BERT-style sentence-embedding model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelFiles {
    pub config: PathBuf,
    pub tokenizer: PathBuf,
    pub weights: PathBuf,
}

const CONFIG_FILE: &str = "config.json";
const TOKENIZER_FILE: &str = "tokenizer.json";
const WEIGHTS_FILE: &str = "model.safetensors";

/// Where model files come from: a local directory or the HuggingFace Hub.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelSource {
    LocalDir(PathBuf),
    Hub {
        repo_id: String,
        revision: Option<String>,
    },
}

impl ModelSource {
    /// An existing directory is used as-is; anything else is a Hub repo id.
    pub fn from_id(model_id: &str, revision: Option<&str>) -> Self {
        let path = PathBuf::from(model_id);
        if path.is_dir() {
            return Self::LocalDir(path);
        }
        Self::Hub {
            repo_id: model_id.to_string(),
            revision: revision.map(String::from),
        }
    }

    /// Resolve to local file paths, downloading into the Hub cache if necessary.
    pub fn resolve(&self) -> Result<ModelFiles> {
        match self {
            Self::LocalDir(dir) => local_files(dir),
            Self::Hub { repo_id, revision } => {
                tracing::info!(repo_id, "Fetching embedding model from HuggingFace Hub");
                let api = hf_hub::api::sync::Api::new()?;
                let repo = if let Some(rev) = revision {
                    api.repo(hf_hub::Repo::with_revision(
                        repo_id.clone(),
                        hf_hub::RepoType::Model,
                        rev.clone(),
                    ))
                } else {
                    api.model(repo_id.clone())
                };
                let files = ModelFiles {
                    config: repo.get(CONFIG_FILE)?,
                    tokenizer: repo.get(TOKENIZER_FILE)?,
                    weights: repo.get(WEIGHTS_FILE)?,
                };
                tracing::info!(path = %files.weights.display(), "Model downloaded/cached");
                Ok(files)
            }
        }
    }
}

fn local_files(dir: &Path) -> Result<ModelFiles> {
    let files = ModelFiles {
        config: dir.join(CONFIG_FILE),
        tokenizer: dir.join(TOKENIZER_FILE),
        weights: dir.join(WEIGHTS_FILE),
    };
    for path in [&files.config, &files.tokenizer, &files.weights] {
        if !path.exists() {
            anyhow::bail!("Model file not found: {}", path.display());
        }
    }
    Ok(files)
}
