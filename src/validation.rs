use serde::Serialize;

use crate::methods::MethodTable;
use crate::recipe::{Recipe, StepSpec};
use crate::step::OPERATION_NEW;

#[derive(Debug, Default, Serialize)]
pub struct ValidationReport {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationReport {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn merge(&mut self, other: ValidationReport) {
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }
}

pub fn validate_recipe(recipe: &Recipe, table: &MethodTable) -> ValidationReport {
    let mut report = validate_entries(recipe, table);

    // Anchors and duplicate names only show up once the whole chain is placed.
    if report.is_ok() {
        match recipe.build(table) {
            Ok(tree) => {
                if let Some(position) = tree.position(OPERATION_NEW)
                    && position != 0
                {
                    report.warnings.push(format!(
                        "'{OPERATION_NEW}' runs at position {} instead of first",
                        position + 1
                    ));
                }
            }
            Err(err) => report.errors.push(format!("{err:#}")),
        }
    }

    report
}

/// Checks one recipe and its bases entry by entry, without placing steps.
fn validate_entries(recipe: &Recipe, table: &MethodTable) -> ValidationReport {
    let mut report = ValidationReport::default();

    if let Some(base) = &recipe.base {
        report.merge(validate_entries(base, table));
    }

    if recipe.version != 1 {
        report
            .errors
            .push(format!("Unsupported recipe version: {}", recipe.version));
    }

    if recipe.steps.is_empty() && recipe.base.is_none() {
        report.warnings.push("Recipe defines no steps".into());
    }

    for (idx, spec) in recipe.steps.iter().enumerate() {
        report.merge(validate_step(idx, spec, table));
    }

    report
}

fn validate_step(idx: usize, spec: &StepSpec, table: &MethodTable) -> ValidationReport {
    let mut report = ValidationReport::default();
    let label = format!("Step {} ('{}')", idx + 1, spec.method);

    if let Err(err) = spec.placement() {
        report.errors.push(format!("{label}: {err}"));
    }

    if let Some(name) = &spec.name
        && name.trim().is_empty()
    {
        report.errors.push(format!("{label}: step name cannot be empty"));
    }

    let params = spec.params.clone().unwrap_or_default();
    if let Err(err) = table.create(&spec.method, params) {
        report.errors.push(format!("{label}: {err}"));
    }

    report
}
