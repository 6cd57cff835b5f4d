use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::methods::MethodTable;
use crate::recipe::{Recipe, StepSpec};

#[derive(Debug, Serialize)]
pub struct PipetreeLock {
    pub recipe_version: u32,
    pub generated_at: DateTime<Utc>,
    /// Step names in execution order after the whole chain was placed.
    pub order: Vec<String>,
    pub steps: Vec<StepLock>,
}

#[derive(Debug, Serialize)]
pub struct StepLock {
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub placement: String,
    pub params_hash: String,
}

pub fn build_lock(recipe: &Recipe, table: &MethodTable) -> Result<PipetreeLock> {
    let tree = recipe.build(table)?;
    let steps = recipe
        .all_steps()
        .into_iter()
        .map(|spec| -> Result<StepLock> {
            Ok(StepLock {
                method: spec.method.clone(),
                name: spec.name.clone(),
                placement: spec.placement()?.to_string(),
                params_hash: hash_params(spec),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(PipetreeLock {
        recipe_version: recipe.version,
        generated_at: Utc::now(),
        order: tree.names().into_iter().map(str::to_string).collect(),
        steps,
    })
}

pub fn generate_lock(recipe: &Recipe, table: &MethodTable, path: &Path) -> Result<()> {
    let lock = build_lock(recipe, table)?;
    let file = File::create(path)
        .with_context(|| format!("Failed to create lockfile: {}", path.display()))?;
    serde_yaml::to_writer(file, &lock)
        .with_context(|| format!("Failed to write lockfile: {}", path.display()))?;
    Ok(())
}

fn hash_params(spec: &StepSpec) -> String {
    let mut hasher = Sha256::new();
    let serialized = serde_json::to_vec(&spec.params.clone().unwrap_or_default()).unwrap_or_default();
    hasher.update(spec.method.as_bytes());
    hasher.update(serialized);
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn params_hash_depends_on_method_and_params() {
        let assign = |value: serde_json::Value| StepSpec {
            method: "assign".into(),
            params: json!({"key": "a", "value": value}).as_object().cloned(),
            ..StepSpec::default()
        };
        assert_eq!(hash_params(&assign(json!(1))), hash_params(&assign(json!(1))));
        assert_ne!(hash_params(&assign(json!(1))), hash_params(&assign(json!(2))));
        assert_eq!(hash_params(&assign(json!(1))).len(), 64);
    }
}
