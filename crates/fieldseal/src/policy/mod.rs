//! Which fields of which collection hold PII.
//!
//! # Responsibilities
//!
//! - Load OpenAPI documents from a local directory and index every property
//!   annotated `x-pii: true`.
//! - Answer, for a collection name, the dot-notation field paths that the
//!   write path must encrypt and the read path must decrypt, so both sides
//!   always name the same set.
//!
//! # Module invariants
//!
//! - **No crypto dependencies.** This module must not import anything from
//!   `crate::crypto` or `crate::key`.

pub mod cache;
pub mod resolver;

pub use cache::{FieldPolicies, PolicyError};
pub use resolver::FieldPaths;

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use openapiv3::OpenAPI;
use tracing::{info, warn};

/// Load every `.yaml`, `.yml`, and `.json` OpenAPI document in `dir` and
/// atomically replace the contents of `policies`.
///
/// A document's file stem is the default collection for its schemas.
/// Other files are ignored.
///
/// # Errors
///
/// Returns an error if the directory cannot be read or any document cannot be
/// read or parsed. On error `policies` is left unchanged.
pub async fn load_dir(dir: &Path, policies: &FieldPolicies) -> Result<()> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .with_context(|| format!("failed to read policy directory {}", dir.display()))?;

    let mut collected: HashMap<String, FieldPaths> = HashMap::new();
    let mut documents = 0usize;

    while let Some(entry) = entries
        .next_entry()
        .await
        .with_context(|| format!("failed to list policy directory {}", dir.display()))?
    {
        let path = entry.path();
        let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let Some(collection) = collection_from_file_name(file_name) else {
            continue;
        };

        let text = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("failed to read policy document {}", path.display()))?;
        let api = parse_document(&text)
            .with_context(|| format!("failed to parse policy document {}", path.display()))?;

        for (name, paths) in resolver::resolve_collections(&api, &collection) {
            collected.entry(name).or_default().extend(paths);
        }
        documents += 1;
        info!(document = %file_name, "loaded field policy document");
    }

    if documents == 0 {
        warn!(dir = %dir.display(), "no field policy documents found");
    }

    policies.replace_all(collected);
    info!(collections = policies.len(), "field policies loaded");
    Ok(())
}

/// Parse an OpenAPI document as YAML, falling back to JSON.
fn parse_document(text: &str) -> Result<OpenAPI> {
    if let Ok(api) = serde_yaml::from_str(text) {
        return Ok(api);
    }
    serde_json::from_str(text).context("not a valid YAML or JSON OpenAPI document")
}

/// Collection name for a policy file: the name without its extension.
/// Returns `None` for files that are not policy documents.
fn collection_from_file_name(file_name: &str) -> Option<String> {
    [".yaml", ".yml", ".json"]
        .into_iter()
        .find_map(|ext| file_name.strip_suffix(ext))
        .filter(|stem| !stem.is_empty() && !stem.starts_with('.'))
        .map(str::to_owned)
}
