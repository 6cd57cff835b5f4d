use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result, bail};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::context::Context;
use crate::methods::{MethodTable, StepParameters};
use crate::pipetree::{Pipetree, Placement};

/// YAML description of a pipetree: an optional base recipe, steps to drop
/// from it, steps to add, and the context a run starts from.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Recipe {
    pub version: u32,
    /// Base recipe, resolved relative to this file when loaded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extends: Option<PathBuf>,
    #[serde(default)]
    pub context: Map<String, Value>,
    /// Names removed from the base tree before `steps` are placed.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub remove: Vec<String>,
    #[serde(default)]
    pub steps: Vec<StepSpec>,
    #[serde(skip)]
    pub base: Option<Box<Recipe>>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct StepSpec {
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<StepParameters>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replace: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub prepend: bool,
}

impl StepSpec {
    pub fn placement(&self) -> Result<Placement> {
        let mut chosen = Vec::new();
        if let Some(anchor) = &self.before {
            chosen.push(Placement::Before(anchor.clone()));
        }
        if let Some(anchor) = &self.after {
            chosen.push(Placement::After(anchor.clone()));
        }
        if let Some(name) = &self.replace {
            chosen.push(Placement::Replace(name.clone()));
        }
        if self.prepend {
            chosen.push(Placement::Prepend);
        }
        match chosen.len() {
            0 => Ok(Placement::Append),
            1 => Ok(chosen.remove(0)),
            _ => bail!(
                "Step '{}' sets more than one of before/after/replace/prepend",
                self.method
            ),
        }
    }
}

impl Recipe {
    pub fn load(path: &Path) -> Result<Self> {
        let mut visited = HashSet::new();
        Self::load_chain(path, &mut visited)
    }

    fn load_chain(path: &Path, visited: &mut HashSet<PathBuf>) -> Result<Self> {
        let key = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        if !visited.insert(key) {
            bail!("Recipe inheritance cycle detected at {}", path.display());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read recipe file: {}", path.display()))?;
        let mut recipe: Recipe = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse recipe YAML: {}", path.display()))?;

        if let Some(extends) = &recipe.extends {
            let base_path = path
                .parent()
                .map(|dir| dir.join(extends))
                .unwrap_or_else(|| extends.clone());
            let base = Self::load_chain(&base_path, visited)
                .with_context(|| format!("Failed to load base recipe for {}", path.display()))?;
            recipe.base = Some(Box::new(base));
        }
        Ok(recipe)
    }

    /// Builds the base tree first, then drops `remove` and places `steps`.
    pub fn build(&self, table: &MethodTable) -> Result<Pipetree> {
        let mut tree = match &self.base {
            Some(base) => base.build(table)?,
            None => Pipetree::new(),
        };

        for name in &self.remove {
            tree.remove(name)
                .with_context(|| format!("Failed to remove step '{name}'"))?;
        }

        for (idx, spec) in self.steps.iter().enumerate() {
            let placement = spec.placement()?;
            let mut step = table
                .create(&spec.method, spec.params.clone().unwrap_or_default())
                .with_context(|| format!("Step {} ('{}')", idx + 1, spec.method))?;
            if let Some(name) = &spec.name {
                if name.trim().is_empty() {
                    bail!("Step {} ('{}'): step name cannot be empty", idx + 1, spec.method);
                }
                step = step.renamed(name.clone());
            }
            tree.place(&placement, step)
                .with_context(|| format!("Step {} ('{}')", idx + 1, spec.method))?;
        }

        Ok(tree)
    }

    /// Base context overlaid with this recipe's own entries.
    pub fn initial_context(&self) -> Context {
        let mut context = match &self.base {
            Some(base) => base.initial_context(),
            None => Context::new(),
        };
        context.merge(Context::from(self.context.clone()));
        context
    }

    /// Step entries across the whole chain, base entries first.
    pub fn all_steps(&self) -> Vec<&StepSpec> {
        let mut steps = match &self.base {
            Some(base) => base.all_steps(),
            None => Vec::new(),
        };
        steps.extend(self.steps.iter());
        steps
    }
}
