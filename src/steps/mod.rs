use serde_json::Value;

use crate::context::Context;
use crate::error::PipetreeError;
use crate::methods::{MethodTable, StepParameters};
use crate::step::{Flow, Step};

pub fn register_defaults(table: &mut MethodTable) {
    table.register("assign", |params| {
        Ok(AssignStep::from_params(params)?.into_step())
    });
    table.register("remove", |params| {
        Ok(RemoveStep::from_params(params)?.into_step())
    });
    table.register("copy", |params| Ok(CopyStep::from_params(params)?.into_step()));
    table.register("increment", |params| {
        Ok(IncrementStep::from_params(params)?.into_step())
    });
    table.register("require", |params| {
        Ok(RequireStep::from_params(params)?.into_step())
    });
    table.register("equals", |params| {
        Ok(EqualsStep::from_params(params)?.into_step())
    });
    table.register("halt", |params| {
        ensure_consumed("halt", &params)?;
        Ok(Step::raw("halt", |_| Ok(Flow::Halt)))
    });
    table.register("noop", |params| {
        ensure_consumed("noop", &params)?;
        Ok(Step::pass("noop", |_| Ok(())))
    });
    table.register("instantiate", |params| {
        Ok(InstantiateStep::from_params(params)?.into_step())
    });
}

struct AssignStep {
    key: String,
    value: Value,
}

impl AssignStep {
    fn from_params(mut params: StepParameters) -> Result<Self, PipetreeError> {
        let key = require_string(&mut params, "assign", "key")?;
        let value = params
            .remove("value")
            .ok_or_else(|| PipetreeError::invalid_params("assign", "requires 'value' parameter"))?;
        ensure_consumed("assign", &params)?;
        Ok(Self { key, value })
    }

    fn into_step(self) -> Step {
        Step::pass(format!("assign.{}", self.key), move |ctx| {
            ctx.insert(self.key.clone(), self.value.clone());
            Ok(())
        })
    }
}

struct RemoveStep {
    key: String,
}

impl RemoveStep {
    fn from_params(mut params: StepParameters) -> Result<Self, PipetreeError> {
        let key = require_string(&mut params, "remove", "key")?;
        ensure_consumed("remove", &params)?;
        Ok(Self { key })
    }

    fn into_step(self) -> Step {
        Step::pass(format!("remove.{}", self.key), move |ctx| {
            ctx.remove(&self.key);
            Ok(())
        })
    }
}

struct CopyStep {
    from: String,
    to: String,
}

impl CopyStep {
    fn from_params(mut params: StepParameters) -> Result<Self, PipetreeError> {
        let from = require_string(&mut params, "copy", "from")?;
        let to = require_string(&mut params, "copy", "to")?;
        ensure_consumed("copy", &params)?;
        Ok(Self { from, to })
    }

    /// Halts, leaving `to` untouched, when `from` is absent.
    fn into_step(self) -> Step {
        Step::raw(format!("copy.{}.{}", self.from, self.to), move |ctx| {
            let Some(value) = ctx.get(&self.from).cloned() else {
                tracing::debug!(from = self.from.as_str(), "Copy source missing");
                return Ok(Flow::Halt);
            };
            ctx.insert(self.to.clone(), value);
            Ok(Flow::Continue)
        })
    }
}

struct IncrementStep {
    key: String,
    by: i64,
}

impl IncrementStep {
    fn from_params(mut params: StepParameters) -> Result<Self, PipetreeError> {
        let key = require_string(&mut params, "increment", "key")?;
        let by = match params.remove("by") {
            None => 1,
            Some(value) => take_i64(value)
                .ok_or_else(|| PipetreeError::invalid_params("increment", "'by' must be an integer"))?,
        };
        ensure_consumed("increment", &params)?;
        Ok(Self { key, by })
    }

    fn into_step(self) -> Step {
        Step::pass(format!("increment.{}", self.key), move |ctx| {
            let current = match ctx.get(&self.key) {
                None | Some(Value::Null) => 0,
                Some(value) => value.as_i64().ok_or_else(|| {
                    anyhow::anyhow!("Cannot increment '{}': value {} is not an integer", self.key, value)
                })?,
            };
            let next = current.checked_add(self.by).ok_or_else(|| {
                anyhow::anyhow!("Cannot increment '{}': overflow adding {}", self.key, self.by)
            })?;
            ctx.insert(self.key.clone(), next);
            Ok(())
        })
    }
}

struct RequireStep {
    key: String,
}

impl RequireStep {
    fn from_params(mut params: StepParameters) -> Result<Self, PipetreeError> {
        let key = require_string(&mut params, "require", "key")?;
        ensure_consumed("require", &params)?;
        Ok(Self { key })
    }

    fn into_step(self) -> Step {
        Step::guard(format!("require.{}", self.key), move |ctx: &Context| {
            Ok(ctx.is_truthy(&self.key))
        })
    }
}

struct EqualsStep {
    key: String,
    value: Value,
}

impl EqualsStep {
    fn from_params(mut params: StepParameters) -> Result<Self, PipetreeError> {
        let key = require_string(&mut params, "equals", "key")?;
        let value = params
            .remove("value")
            .ok_or_else(|| PipetreeError::invalid_params("equals", "requires 'value' parameter"))?;
        ensure_consumed("equals", &params)?;
        Ok(Self { key, value })
    }

    fn into_step(self) -> Step {
        Step::guard(format!("equals.{}", self.key), move |ctx: &Context| {
            Ok(ctx.get(&self.key) == Some(&self.value))
        })
    }
}

struct InstantiateStep {
    operation: String,
}

impl InstantiateStep {
    fn from_params(mut params: StepParameters) -> Result<Self, PipetreeError> {
        let operation = take_string(&mut params, "name").unwrap_or_else(|| "operation".to_string());
        ensure_consumed("instantiate", &params)?;
        Ok(Self { operation })
    }

    fn into_step(self) -> Step {
        Step::instantiate(move |ctx| {
            ctx.insert("operation", self.operation.clone());
            Ok(())
        })
    }
}

fn take_string(params: &mut StepParameters, key: &str) -> Option<String> {
    params.remove(key).and_then(|value| match value {
        Value::String(s) => Some(s),
        Value::Null => None,
        other => Some(other.to_string()),
    })
}

fn require_string(
    params: &mut StepParameters,
    method: &str,
    key: &str,
) -> Result<String, PipetreeError> {
    take_string(params, key)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| PipetreeError::invalid_params(method, format!("requires '{key}' parameter")))
}

fn take_i64(value: Value) -> Option<i64> {
    match value {
        Value::Number(num) => num.as_i64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn ensure_consumed(method: &str, params: &StepParameters) -> Result<(), PipetreeError> {
    if params.is_empty() {
        return Ok(());
    }
    let mut unknown: Vec<_> = params.keys().map(String::as_str).collect();
    unknown.sort_unstable();
    Err(PipetreeError::invalid_params(
        method,
        format!("unknown parameter(s): {}", unknown.join(", ")),
    ))
}
