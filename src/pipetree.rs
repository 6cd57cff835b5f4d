use std::fmt;

use crate::error::PipetreeError;
use crate::step::Step;

/// Where a step lands relative to the existing ones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Placement {
    Append,
    Prepend,
    Before(String),
    After(String),
    Replace(String),
}

impl fmt::Display for Placement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Placement::Append => f.write_str("append"),
            Placement::Prepend => f.write_str("prepend"),
            Placement::Before(anchor) => write!(f, "before {anchor}"),
            Placement::After(anchor) => write!(f, "after {anchor}"),
            Placement::Replace(name) => write!(f, "replace {name}"),
        }
    }
}

/// Ordered collection of uniquely named steps.
///
/// Mutations either succeed or leave the tree untouched. Existing steps are
/// never reordered; they are only ever inserted around, replaced, or removed.
///
/// Variants of a base tree are built by cloning and then extending; the clone
/// shares step callables but owns its own ordering. Once built, a tree can be
/// shared read-only between threads running independent contexts.
#[derive(Debug, Clone, Default)]
pub struct Pipetree {
    steps: Vec<Step>,
}

impl Pipetree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, step: Step) -> Result<&mut Self, PipetreeError> {
        self.ensure_unique(step.name())?;
        self.steps.push(step);
        Ok(self)
    }

    pub fn prepend(&mut self, step: Step) -> Result<&mut Self, PipetreeError> {
        self.ensure_unique(step.name())?;
        self.steps.insert(0, step);
        Ok(self)
    }

    pub fn insert_after(&mut self, anchor: &str, step: Step) -> Result<&mut Self, PipetreeError> {
        let idx = self.anchor(anchor, &step)?;
        self.ensure_unique(step.name())?;
        self.steps.insert(idx + 1, step);
        Ok(self)
    }

    pub fn insert_before(&mut self, anchor: &str, step: Step) -> Result<&mut Self, PipetreeError> {
        let idx = self.anchor(anchor, &step)?;
        self.ensure_unique(step.name())?;
        self.steps.insert(idx, step);
        Ok(self)
    }

    /// Swaps the step called `name` for `step`, keeping its position.
    pub fn replace(&mut self, name: &str, step: Step) -> Result<&mut Self, PipetreeError> {
        let idx = self
            .position(name)
            .ok_or_else(|| PipetreeError::StepNotFound {
                name: name.to_string(),
            })?;
        if step.name() != name {
            self.ensure_unique(step.name())?;
        }
        self.steps[idx] = step;
        Ok(self)
    }

    pub fn remove(&mut self, name: &str) -> Result<Step, PipetreeError> {
        let idx = self
            .position(name)
            .ok_or_else(|| PipetreeError::StepNotFound {
                name: name.to_string(),
            })?;
        Ok(self.steps.remove(idx))
    }

    pub fn place(&mut self, placement: &Placement, step: Step) -> Result<&mut Self, PipetreeError> {
        match placement {
            Placement::Append => self.append(step),
            Placement::Prepend => self.prepend(step),
            Placement::Before(anchor) => self.insert_before(anchor, step),
            Placement::After(anchor) => self.insert_after(anchor, step),
            Placement::Replace(name) => self.replace(name, step),
        }
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.steps.iter().position(|step| step.name() == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    pub fn get(&self, name: &str) -> Option<&Step> {
        self.steps.iter().find(|step| step.name() == name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.steps.iter().map(Step::name).collect()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Step> {
        self.steps.iter()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    fn anchor(&self, anchor: &str, step: &Step) -> Result<usize, PipetreeError> {
        self.position(anchor)
            .ok_or_else(|| PipetreeError::AnchorNotFound {
                anchor: anchor.to_string(),
                step: step.name().to_string(),
            })
    }

    fn ensure_unique(&self, name: &str) -> Result<(), PipetreeError> {
        if self.contains(name) {
            return Err(PipetreeError::DuplicateStepName {
                name: name.to_string(),
            });
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a Pipetree {
    type Item = &'a Step;
    type IntoIter = std::slice::Iter<'a, Step>;

    fn into_iter(self) -> Self::IntoIter {
        self.steps.iter()
    }
}

impl fmt::Display for Pipetree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (idx, step) in self.steps.iter().enumerate() {
            if idx > 0 {
                f.write_str(",")?;
            }
            write!(f, "{step}")?;
        }
        f.write_str("]")
    }
}
