use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::error::PipetreeError;
use crate::step::{Step, StepSource};

pub type StepParameters = Map<String, Value>;

type StepFactory = Arc<dyn Fn(StepParameters) -> Result<Step, PipetreeError> + Send + Sync>;

/// Registry of step factories addressed by method name.
///
/// Looking a method up builds the step immediately, so a misspelt name fails
/// while the tree is being assembled instead of when it runs.
#[derive(Clone, Default)]
pub struct MethodTable {
    factories: HashMap<String, StepFactory>,
}

impl MethodTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn(StepParameters) -> Result<Step, PipetreeError> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Arc::new(factory));
    }

    /// Builds the step registered as `name`. The step is named after the
    /// method unless the factory chose another name.
    pub fn create(&self, name: &str, params: StepParameters) -> Result<Step, PipetreeError> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| PipetreeError::UnknownMethod {
                name: name.to_string(),
                available: self.known_methods(),
            })?;
        let step = factory(params)?;
        Ok(step.with_source(StepSource::Method(name.to_string())))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    pub fn known_methods(&self) -> Vec<String> {
        let mut names: Vec<_> = self.factories.keys().cloned().collect();
        names.sort();
        names
    }
}

impl std::fmt::Debug for MethodTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MethodTable")
            .field("methods", &self.known_methods())
            .finish()
    }
}
