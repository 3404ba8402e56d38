//! TOML challenge catalog.
//!
//! The catalog is static data: each challenge has an id, a requirement list
//! and a submission kind. Loading and sanity checks live here; the evaluator
//! only ever sees the [`EvaluationRequest`] built from a challenge.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::model::{EvaluationRequest, SubmissionKind};

/// XP awarded for a challenge that does not set its own.
pub const DEFAULT_XP: u32 = 100;

/// One practice challenge.
#[derive(Debug, Clone, PartialEq)]
pub struct Challenge {
    pub id: String,
    pub title: String,
    pub description: String,
    pub requirements: Vec<String>,
    pub kind: SubmissionKind,
    /// XP awarded the first time the challenge is approved.
    pub xp: u32,
}

impl Challenge {
    /// Build an evaluation request for `code` submitted against this challenge.
    pub fn request(&self, code: impl Into<String>) -> EvaluationRequest {
        EvaluationRequest {
            task_id: self.id.clone(),
            code: code.into(),
            requirements: self.requirements.clone(),
            kind: self.kind,
        }
    }
}

/// A set of challenges loaded from one file.
#[derive(Debug, Clone)]
pub struct Catalog {
    pub id: String,
    pub name: String,
    pub description: String,
    pub challenges: Vec<Challenge>,
}

impl Catalog {
    pub fn find(&self, id: &str) -> Option<&Challenge> {
        self.challenges.iter().find(|c| c.id == id)
    }
}

#[derive(Debug, Deserialize)]
struct TomlCatalogFile {
    catalog: TomlCatalogHeader,
    #[serde(default)]
    challenges: Vec<TomlChallenge>,
}

#[derive(Debug, Deserialize)]
struct TomlCatalogHeader {
    id: String,
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default = "default_xp")]
    default_xp: u32,
}

fn default_xp() -> u32 {
    DEFAULT_XP
}

#[derive(Debug, Deserialize)]
struct TomlChallenge {
    id: String,
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    requirements: Vec<String>,
    #[serde(default)]
    kind: Option<String>,
    #[serde(default)]
    xp: Option<u32>,
}

/// Parse a single TOML catalog file.
pub fn parse_catalog(path: &Path) -> Result<Catalog> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read catalog file: {}", path.display()))?;

    parse_catalog_str(&content, path)
}

/// Parse a TOML string into a [`Catalog`].
pub fn parse_catalog_str(content: &str, source_path: &Path) -> Result<Catalog> {
    let parsed: TomlCatalogFile = toml::from_str(content)
        .with_context(|| format!("failed to parse TOML: {}", source_path.display()))?;

    let default_xp = parsed.catalog.default_xp;
    let challenges = parsed
        .challenges
        .into_iter()
        .map(|c| {
            let kind = c
                .kind
                .map(|k| {
                    k.parse::<SubmissionKind>()
                        .map_err(|e| anyhow::anyhow!("challenge {}: {}", c.id, e))
                })
                .transpose()?
                .unwrap_or_default();

            Ok(Challenge {
                id: c.id,
                title: c.title,
                description: c.description,
                requirements: c.requirements,
                kind,
                xp: c.xp.unwrap_or(default_xp),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Catalog {
        id: parsed.catalog.id,
        name: parsed.catalog.name,
        description: parsed.catalog.description,
        challenges,
    })
}

/// Recursively load all `.toml` catalogs from a directory.
pub fn load_catalog_directory(dir: &Path) -> Result<Vec<Catalog>> {
    let mut catalogs = Vec::new();

    if !dir.is_dir() {
        anyhow::bail!("not a directory: {}", dir.display());
    }

    for entry in std::fs::read_dir(dir)
        .with_context(|| format!("failed to read directory: {}", dir.display()))?
    {
        let entry = entry?;
        let path = entry.path();

        if path.is_dir() {
            catalogs.extend(load_catalog_directory(&path)?);
        } else if path.extension().is_some_and(|ext| ext == "toml") {
            match parse_catalog(&path) {
                Ok(catalog) => catalogs.push(catalog),
                Err(e) => {
                    tracing::warn!("skipping {}: {:#}", path.display(), e);
                }
            }
        }
    }

    catalogs.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(catalogs)
}

/// Load a catalog file, or every catalog under a directory.
pub fn load_catalogs(path: &Path) -> Result<Vec<Catalog>> {
    if path.is_dir() {
        load_catalog_directory(path)
    } else {
        Ok(vec![parse_catalog(path)?])
    }
}

/// A warning from catalog validation.
#[derive(Debug, Clone)]
pub struct CatalogWarning {
    /// The challenge ID (if applicable).
    pub challenge_id: Option<String>,
    pub message: String,
}

/// Check a catalog for challenges that could never be evaluated.
pub fn validate_catalog(catalog: &Catalog) -> Vec<CatalogWarning> {
    let mut warnings = Vec::new();

    if catalog.challenges.is_empty() {
        warnings.push(CatalogWarning {
            challenge_id: None,
            message: "catalog has no challenges".into(),
        });
    }

    let mut seen_ids = std::collections::HashSet::new();
    for challenge in &catalog.challenges {
        let warn = |message: String| CatalogWarning {
            challenge_id: Some(challenge.id.clone()),
            message,
        };

        if !seen_ids.insert(&challenge.id) {
            warnings.push(warn(format!("duplicate challenge ID: {}", challenge.id)));
        }
        if challenge.title.trim().is_empty() {
            warnings.push(warn("title is empty".into()));
        }
        if challenge.requirements.iter().all(|r| r.trim().is_empty()) {
            warnings.push(warn(
                "no requirements; submissions will be rejected before evaluation".into(),
            ));
        }
    }

    warnings
}
