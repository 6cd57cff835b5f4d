pub mod context;
pub mod error;
pub mod executor;
pub mod lockfile;
pub mod methods;
pub mod observability;
pub mod pipetree;
pub mod recipe;
pub mod step;
pub mod steps;
pub mod validation;

pub use context::Context;
pub use error::PipetreeError;
pub use executor::{Executor, Outcome, run};
pub use methods::{MethodTable, StepParameters};
pub use pipetree::{Pipetree, Placement};
pub use recipe::Recipe;
pub use step::{Callable, Flow, OPERATION_NEW, Step, StepMode, StepSource};
