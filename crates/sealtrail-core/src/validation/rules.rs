//! Business rules referenced by schemas.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::ErrorKind;
use super::view::StateView;
use crate::contract::{Operation, SealDefinition, StateValue, TypeName};
use crate::schema::{Schema, ValidationRule};

/// An input seal together with the allocation it carried.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct ResolvedInput {
    pub seal: SealDefinition,
    pub ty: TypeName,
    pub value: StateValue,
}

/// Everything a rule may inspect.
pub struct RuleContext<'a> {
    pub schema: &'a Schema,
    pub operation: &'a Operation,
    pub inputs: &'a [ResolvedInput],
    pub view: &'a dyn StateView,
}

impl RuleContext<'_> {
    /// Values consumed under an owned type.
    pub fn inputs_of<'b>(&'b self, ty: &'b TypeName) -> impl Iterator<Item = &'b StateValue> {
        self.inputs
            .iter()
            .filter(move |input| &input.ty == ty)
            .map(|input| &input.value)
    }

    /// Values assigned under an owned type.
    pub fn outputs_of<'b>(&'b self, ty: &'b TypeName) -> impl Iterator<Item = &'b StateValue> {
        self.operation
            .assignments()
            .get(ty)
            .into_iter()
            .flat_map(|seals| seals.values())
    }

    /// Values the operation declares for a global type.
    #[must_use]
    pub fn declared(&self, name: &TypeName) -> &[StateValue] {
        self.operation
            .globals()
            .get(name)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

/// A host-supplied rule for [`ValidationRule::Custom`].
pub trait CustomRule: Send + Sync {
    /// Returns a description of the violation, if any.
    ///
    /// # Errors
    ///
    /// Returns the violation message when the operation breaks the rule.
    fn check(&self, ctx: &RuleContext<'_>) -> Result<(), String>;
}

/// Maps custom rule ids to implementations.
#[derive(Clone, Default)]
pub struct RuleRegistry {
    rules: HashMap<TypeName, Arc<dyn CustomRule>>,
}

impl fmt::Debug for RuleRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut ids: Vec<_> = self.rules.keys().collect();
        ids.sort();
        f.debug_struct("RuleRegistry").field("rules", &ids).finish()
    }
}

impl RuleRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a rule, returning the one it replaces.
    pub fn register(
        &mut self,
        id: TypeName,
        rule: Arc<dyn CustomRule>,
    ) -> Option<Arc<dyn CustomRule>> {
        self.rules.insert(id, rule)
    }

    #[must_use]
    pub fn get(&self, id: &TypeName) -> Option<&Arc<dyn CustomRule>> {
        self.rules.get(id)
    }
}

type RuleResult = Result<(), (ErrorKind, String)>;

pub(super) fn apply(rule: &ValidationRule, ctx: &RuleContext<'_>, custom: &RuleRegistry) -> RuleResult {
    match rule {
        ValidationRule::Conservation { state } => conservation(ctx, state),
        ValidationRule::CappedIssuance { state, cap, supply } => {
            capped_issuance(ctx, state, cap, supply)
        },
        ValidationRule::FixedField { state } => fixed_field(ctx, state),
        ValidationRule::Custom { id } => {
            let rule = custom.get(id).ok_or_else(|| {
                (ErrorKind::CustomRule, format!("rule '{id}' is not registered"))
            })?;
            rule.check(ctx).map_err(|message| (ErrorKind::CustomRule, message))
        },
    }
}

fn sum<'a>(values: impl Iterator<Item = &'a StateValue>) -> Option<u64> {
    values
        .filter_map(StateValue::amount)
        .try_fold(0u64, u64::checked_add)
}

fn conservation(ctx: &RuleContext<'_>, state: &TypeName) -> RuleResult {
    let overflow = || (ErrorKind::AmountConservation, format!("'{state}' amounts overflow"));
    let inputs = sum(ctx.inputs_of(state)).ok_or_else(overflow)?;
    let outputs = sum(ctx.outputs_of(state)).ok_or_else(overflow)?;
    if inputs == outputs {
        Ok(())
    } else {
        Err((
            ErrorKind::AmountConservation,
            format!("'{state}' inputs sum to {inputs} but outputs sum to {outputs}"),
        ))
    }
}

fn capped_issuance(
    ctx: &RuleContext<'_>,
    state: &TypeName,
    cap: &TypeName,
    supply: &TypeName,
) -> RuleResult {
    let fail = |message: String| Err((ErrorKind::CappedIssuance, message));

    let (Some(inputs), Some(outputs)) = (sum(ctx.inputs_of(state)), sum(ctx.outputs_of(state)))
    else {
        return fail(format!("'{state}' amounts overflow"));
    };
    let Some(issued) = outputs.checked_sub(inputs) else {
        return fail(format!("'{state}' outputs {outputs} are below inputs {inputs}"));
    };

    let Some(declared) = sum(ctx.declared(supply).iter()) else {
        return fail(format!("declared '{supply}' overflows"));
    };
    if declared != issued {
        return fail(format!("declared '{supply}' {declared} does not match issued {issued}"));
    }

    let limit = ctx
        .declared(cap)
        .first()
        .cloned()
        .or_else(|| ctx.view.global(cap).into_iter().next())
        .and_then(|value| value.amount());
    let Some(limit) = limit else {
        return fail(format!("cap '{cap}' is not declared"));
    };

    let prior = sum(ctx.view.global(supply).iter());
    match prior.and_then(|prior| prior.checked_add(issued)) {
        Some(total) if total <= limit => Ok(()),
        _ => fail(format!(
            "issuing {issued} on top of {} exceeds cap {limit}",
            prior.map_or_else(|| "overflowing supply".into(), |p| p.to_string())
        )),
    }
}

fn fixed_field(ctx: &RuleContext<'_>, state: &TypeName) -> RuleResult {
    let fail = |message: String| Err((ErrorKind::FixedFieldViolation, message));
    let tokens = |values: Vec<&StateValue>| -> Result<Vec<(u32, u64)>, String> {
        values
            .into_iter()
            .map(|value| match value {
                StateValue::Token { index, amount } => Ok((*index, *amount)),
                _ => Err(format!("'{state}' carries a non-token value")),
            })
            .collect()
    };

    let outputs = match tokens(ctx.outputs_of(state).collect()) {
        Ok(outputs) => outputs,
        Err(message) => return fail(message),
    };
    if let Some((index, amount)) = outputs.iter().find(|(_, amount)| *amount != 1) {
        return fail(format!("token {index} assigned with amount {amount}, expected 1"));
    }
    let mut produced: Vec<u32> = outputs.iter().map(|(index, _)| *index).collect();
    produced.sort_unstable();
    if produced.windows(2).any(|pair| pair[0] == pair[1]) {
        return fail(format!("'{state}' assigns a token index twice"));
    }

    if ctx.operation.is_genesis() {
        return Ok(());
    }
    let mut consumed: Vec<u32> = match tokens(ctx.inputs_of(state).collect()) {
        Ok(inputs) => inputs.into_iter().map(|(index, _)| index).collect(),
        Err(message) => return fail(message),
    };
    consumed.sort_unstable();
    if consumed == produced {
        Ok(())
    } else {
        fail(format!(
            "token indices {consumed:?} consumed but {produced:?} produced"
        ))
    }
}
