use std::fmt;
use std::sync::Arc;

use anyhow::Result;

use crate::context::Context;

/// Name given to the explicit construction step built by [`Step::instantiate`].
pub const OPERATION_NEW: &str = "operation.new";

/// Signal returned by every step; decides whether the run proceeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Flow {
    Continue,
    Halt,
}

impl Flow {
    pub fn from_bool(proceed: bool) -> Self {
        if proceed { Flow::Continue } else { Flow::Halt }
    }

    pub fn is_continue(self) -> bool {
        matches!(self, Flow::Continue)
    }

    pub fn is_halt(self) -> bool {
        matches!(self, Flow::Halt)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Flow::Continue => "continue",
            Flow::Halt => "halt",
        }
    }
}

/// How a step was supplied at registration time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepSource {
    /// A function pointer or closure.
    Function,
    /// A [`Callable`] object, tagged with its type name.
    Callable(String),
    /// A factory looked up by name in a [`crate::methods::MethodTable`].
    Method(String),
}

/// Which adaptation turned the user's function into the uniform step protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepMode {
    /// Returns a [`Flow`] itself; nothing is adapted.
    Raw,
    /// Plain unary function; always continues.
    Pass,
    /// Predicate; continues iff it returns `true`.
    Guard,
}

impl StepMode {
    /// Marker used when rendering a pipetree.
    pub fn marker(self) -> &'static str {
        match self {
            StepMode::Raw => ">>",
            StepMode::Pass => ">",
            StepMode::Guard => "&",
        }
    }
}

pub type StepFn = Arc<dyn Fn(&mut Context) -> Result<Flow> + Send + Sync>;

/// Object-style step. Implementors get a default step name derived from
/// their type name.
pub trait Callable: Send + Sync {
    fn call(&self, ctx: &mut Context) -> Result<Flow>;

    fn name(&self) -> String {
        short_type_name(std::any::type_name::<Self>())
    }
}

/// A named unit of work. Cloning is cheap and shares the callable.
#[derive(Clone)]
pub struct Step {
    name: String,
    source: StepSource,
    mode: StepMode,
    call: StepFn,
}

impl Step {
    /// Step speaking the raw flow protocol.
    pub fn raw<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&mut Context) -> Result<Flow> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            source: StepSource::Function,
            mode: StepMode::Raw,
            call: Arc::new(f),
        }
    }

    pub fn function(name: impl Into<String>, f: fn(&mut Context) -> Result<Flow>) -> Self {
        Self::raw(name, f)
    }

    /// Adapts a function that only transforms the context; the step always continues.
    pub fn pass<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&mut Context) -> Result<()> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            source: StepSource::Function,
            mode: StepMode::Pass,
            call: Arc::new(move |ctx| {
                f(ctx)?;
                Ok(Flow::Continue)
            }),
        }
    }

    /// Adapts a predicate; `false` halts the run.
    pub fn guard<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&Context) -> Result<bool> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            source: StepSource::Function,
            mode: StepMode::Guard,
            call: Arc::new(move |ctx| f(ctx).map(Flow::from_bool)),
        }
    }

    pub fn callable<C>(callable: C) -> Self
    where
        C: Callable + 'static,
    {
        let name = callable.name();
        Self {
            source: StepSource::Callable(name.clone()),
            name,
            mode: StepMode::Raw,
            call: Arc::new(move |ctx| callable.call(ctx)),
        }
    }

    /// Explicit construction step, meant to be placed first by the caller.
    pub fn instantiate<F>(f: F) -> Self
    where
        F: Fn(&mut Context) -> Result<()> + Send + Sync + 'static,
    {
        Self::raw(OPERATION_NEW, move |ctx| {
            f(ctx)?;
            Ok(Flow::Continue)
        })
    }

    pub fn renamed(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub(crate) fn with_source(mut self, source: StepSource) -> Self {
        self.source = source;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> &StepSource {
        &self.source
    }

    pub fn mode(&self) -> StepMode {
        self.mode
    }

    /// `true` when the user's function was adapted rather than called raw.
    pub fn is_wrapped(&self) -> bool {
        self.mode != StepMode::Raw
    }

    pub fn call(&self, ctx: &mut Context) -> Result<Flow> {
        (self.call)(ctx)
    }
}

impl fmt::Debug for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Step")
            .field("name", &self.name)
            .field("source", &self.source)
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.mode.marker(), self.name)
    }
}

fn short_type_name(full: &str) -> String {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Authorize;

    impl Callable for Authorize {
        fn call(&self, ctx: &mut Context) -> Result<Flow> {
            Ok(Flow::from_bool(ctx.is_truthy("user")))
        }
    }

    #[test]
    fn callable_defaults_name_to_type() {
        let step = Step::callable(Authorize);
        assert_eq!(step.name(), "Authorize");
        assert_eq!(step.source(), &StepSource::Callable("Authorize".into()));
        assert!(!step.is_wrapped());
    }

    #[test]
    fn adapters_map_results_to_flow() {
        let pass = Step::pass("touch", |ctx| {
            ctx.insert("touched", true);
            Ok(())
        });
        let guard = Step::guard("check", |ctx| Ok(ctx.is_truthy("touched")));

        let mut ctx = Context::new();
        assert_eq!(guard.call(&mut ctx).unwrap(), Flow::Halt);
        assert_eq!(pass.call(&mut ctx).unwrap(), Flow::Continue);
        assert_eq!(guard.call(&mut ctx).unwrap(), Flow::Continue);
        assert!(pass.is_wrapped());
        assert_eq!(guard.to_string(), "&check");
    }

    #[test]
    fn instantiate_is_an_ordinary_raw_step() {
        let step = Step::instantiate(|ctx| {
            ctx.insert("operation", "Create");
            Ok(())
        });
        let mut ctx = Context::new();
        assert_eq!(step.call(&mut ctx).unwrap(), Flow::Continue);
        assert_eq!(step.to_string(), ">>operation.new");
        assert_eq!(ctx.get_str("operation"), Some("Create"));
    }

    fn mark_seen(ctx: &mut Context) -> Result<Flow> {
        ctx.insert("seen", true);
        Ok(Flow::Continue)
    }

    #[test]
    fn function_pointer_steps_speak_raw_flow() {
        let step = Step::function("mark_seen", mark_seen);
        assert_eq!(step.mode(), StepMode::Raw);
        assert_eq!(step.source(), &StepSource::Function);
        assert!(!step.is_wrapped());

        let mut ctx = Context::new();
        assert_eq!(step.call(&mut ctx).unwrap(), Flow::Continue);
        assert!(ctx.is_truthy("seen"));
    }

    #[test]
    fn short_type_name_strips_paths_and_generics() {
        assert_eq!(short_type_name("a::b::Validate<c::D>"), "Validate");
        assert_eq!(short_type_name("Plain"), "Plain");
    }
}
