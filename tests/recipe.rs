use std::fs;
use std::path::Path;

use pipetree::lockfile::generate_lock;
use pipetree::recipe::{Recipe, StepSpec};
use pipetree::validation::validate_recipe;
use pipetree::{Executor, MethodTable, StepParameters, StepSource, steps};
use serde_json::{Value, json};
use tempfile::tempdir;

fn build_table() -> MethodTable {
    let mut table = MethodTable::new();
    steps::register_defaults(&mut table);
    table
}

fn params(value: Value) -> Option<StepParameters> {
    value.as_object().cloned()
}

fn recipe(steps: Vec<StepSpec>) -> Recipe {
    Recipe {
        version: 1,
        extends: None,
        context: Default::default(),
        remove: Vec::new(),
        steps,
        base: None,
    }
}

#[test]
fn extended_recipe_places_steps_around_base() {
    let recipe = Recipe::load(Path::new("recipes/create.yaml")).unwrap();
    let tree = recipe.build(&build_table()).unwrap();

    assert_eq!(
        tree.to_string(),
        "[>>operation.new,&require.params,>>copy.params.model,>persist,>increment.version]"
    );
    assert_eq!(
        tree.get("persist").unwrap().source(),
        &StepSource::Method("assign".into())
    );

    let outcome = Executor::new()
        .run(&tree, recipe.initial_context())
        .unwrap();
    assert!(outcome.succeeded());
    assert_eq!(
        outcome.context().to_json(),
        json!({
            "params": {"name": "Jacob"},
            "operation": "Create",
            "model": {"name": "Jacob"},
            "persisted": true,
            "version": 1
        })
    );
}

#[test]
fn base_recipe_is_untouched_by_variants() {
    let table = build_table();
    let base = Recipe::load(Path::new("recipes/base.yaml")).unwrap();
    let variant = Recipe::load(Path::new("recipes/create.yaml")).unwrap();

    assert_eq!(base.build(&table).unwrap().len(), 3);
    assert_eq!(variant.build(&table).unwrap().len(), 5);
}

#[test]
fn remove_drops_base_steps() {
    let temp = tempdir().unwrap();
    fs::write(
        temp.path().join("base.yaml"),
        "version: 1\nsteps:\n  - method: noop\n  - method: halt\n",
    )
    .unwrap();
    fs::write(
        temp.path().join("child.yaml"),
        "version: 1\nextends: base.yaml\nremove: [halt]\nsteps:\n  - method: assign\n    params: {key: done, value: true}\n",
    )
    .unwrap();

    let recipe = Recipe::load(&temp.path().join("child.yaml")).unwrap();
    let tree = recipe.build(&build_table()).unwrap();
    assert_eq!(tree.names(), vec!["noop", "assign.done"]);
}

#[test]
fn inheritance_cycles_are_reported() {
    let temp = tempdir().unwrap();
    fs::write(temp.path().join("a.yaml"), "version: 1\nextends: b.yaml\n").unwrap();
    fs::write(temp.path().join("b.yaml"), "version: 1\nextends: a.yaml\n").unwrap();

    let err = Recipe::load(&temp.path().join("a.yaml")).unwrap_err();
    assert!(format!("{err:#}").contains("cycle"));
}

#[test]
fn validation_reports_missing_anchor() {
    let recipe = recipe(vec![
        StepSpec {
            method: "noop".into(),
            ..StepSpec::default()
        },
        StepSpec {
            method: "halt".into(),
            after: Some("persist".into()),
            ..StepSpec::default()
        },
    ]);

    let report = validate_recipe(&recipe, &build_table());

    assert!(!report.is_ok());
    assert!(report.errors[0].contains("anchor step 'persist' not found"));
}

#[test]
fn validation_catches_parameters_and_placement() {
    let recipe = recipe(vec![
        StepSpec {
            method: "assign".into(),
            params: params(json!({"key": "a"})),
            ..StepSpec::default()
        },
        StepSpec {
            method: "noop".into(),
            prepend: true,
            replace: Some("x".into()),
            ..StepSpec::default()
        },
        StepSpec {
            method: "frobnicate".into(),
            ..StepSpec::default()
        },
    ]);

    let report = validate_recipe(&recipe, &build_table());

    assert_eq!(report.errors.len(), 3, "{:?}", report.errors);
    assert!(report.errors[0].contains("requires 'value' parameter"));
    assert!(report.errors[1].contains("more than one"));
    assert!(report.errors[2].contains("Unknown method 'frobnicate'"));
}

#[test]
fn validation_warns_when_construction_is_not_first() {
    let recipe = recipe(vec![
        StepSpec {
            method: "noop".into(),
            ..StepSpec::default()
        },
        StepSpec {
            method: "instantiate".into(),
            ..StepSpec::default()
        },
    ]);

    let report = validate_recipe(&recipe, &build_table());

    assert!(report.is_ok());
    assert_eq!(report.warnings.len(), 1);
    assert!(report.warnings[0].contains("operation.new"));
}

#[test]
fn duplicate_names_fail_the_build() {
    let recipe = recipe(vec![
        StepSpec {
            method: "noop".into(),
            ..StepSpec::default()
        },
        StepSpec {
            method: "noop".into(),
            ..StepSpec::default()
        },
    ]);

    let err = recipe.build(&build_table()).unwrap_err();
    assert!(format!("{err:#}").contains("'noop' is already registered"));
}

#[test]
fn lockfile_records_resolved_order() {
    let temp = tempdir().unwrap();
    let recipe = Recipe::load(Path::new("recipes/create.yaml")).unwrap();

    let lock_path = temp.path().join("pipetree.lock");
    generate_lock(&recipe, &build_table(), &lock_path).unwrap();

    let content = fs::read_to_string(&lock_path).unwrap();
    assert!(content.contains("recipe_version: 1"));
    assert!(content.contains("- copy.params.model"));
    assert!(content.contains("params_hash"));
    assert!(content.contains("placement: before persist"));
}

#[test]
fn empty_step_names_fail_the_build_and_validation() {
    let recipe = recipe(vec![StepSpec {
        method: "noop".into(),
        name: Some("  ".into()),
        ..StepSpec::default()
    }]);

    let err = recipe.build(&build_table()).unwrap_err();
    assert!(err.to_string().contains("step name cannot be empty"));

    let report = validate_recipe(&recipe, &build_table());
    assert_eq!(report.errors.len(), 1, "{:?}", report.errors);
    assert!(report.errors[0].contains("step name cannot be empty"));
}

#[test]
fn chain_level_warnings_are_reported_once() {
    let temp = tempdir().unwrap();
    fs::write(
        temp.path().join("base.yaml"),
        "version: 1\nsteps:\n  - method: noop\n  - method: instantiate\n",
    )
    .unwrap();
    fs::write(
        temp.path().join("middle.yaml"),
        "version: 1\nextends: base.yaml\nsteps:\n  - method: halt\n",
    )
    .unwrap();
    fs::write(
        temp.path().join("leaf.yaml"),
        "version: 1\nextends: middle.yaml\nsteps:\n  - method: assign\n    params: {key: a, value: 1}\n",
    )
    .unwrap();

    let recipe = Recipe::load(&temp.path().join("leaf.yaml")).unwrap();
    let report = validate_recipe(&recipe, &build_table());

    assert!(report.is_ok(), "{:?}", report.errors);
    assert_eq!(report.warnings.len(), 1, "{:?}", report.warnings);
    assert!(report.warnings[0].contains("operation.new"));
}
