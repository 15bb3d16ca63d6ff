//! Step readiness for the multi-step application wizard.
//!
//! The client owns the wizard state; every request carries a full snapshot of
//! one step and is evaluated from scratch against the blueprint.

mod blueprint;

pub use blueprint::{FieldKind, FieldSpec, Presence, StepDefinition, WizardBlueprint};

use crate::rules::BusinessPath;
use crate::validation::FieldIssue;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// A submitted field value. Amounts may arrive as numbers or numeric strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Flag(bool),
    Number(f64),
    Text(String),
}

impl FieldValue {
    fn as_amount(&self) -> Option<f64> {
        match self {
            FieldValue::Number(value) => Some(*value),
            FieldValue::Text(raw) => raw.trim().parse().ok(),
            FieldValue::Flag(_) => None,
        }
    }

    fn is_blank(&self) -> bool {
        matches!(self, FieldValue::Text(raw) if raw.trim().is_empty())
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Flag(flag) => write!(f, "{flag}"),
            FieldValue::Number(value) => write!(f, "{value}"),
            FieldValue::Text(raw) => f.write_str(raw.trim()),
        }
    }
}

/// Snapshot of one step as the client currently holds it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WizardStepState {
    pub step_number: u8,
    #[serde(default)]
    pub field_values: BTreeMap<String, FieldValue>,
    #[serde(default)]
    pub revealed_conditional_fields: BTreeSet<String>,
}

impl WizardStepState {
    pub fn amount(&self, key: &str) -> Option<f64> {
        self.field_values.get(key).and_then(FieldValue::as_amount)
    }

    pub fn text(&self, key: &str) -> Option<String> {
        self.field_values
            .get(key)
            .filter(|value| !value.is_blank())
            .map(ToString::to_string)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Incomplete,
    Ready,
    Submitted,
}

impl StepStatus {
    pub const fn label(self) -> &'static str {
        match self {
            StepStatus::Incomplete => "Incomplete",
            StepStatus::Ready => "Ready",
            StepStatus::Submitted => "Submitted",
        }
    }
}

/// Readiness of one step snapshot. `status` is the single gate for "Next".
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepValidation {
    pub business_path: BusinessPath,
    pub step_number: u8,
    pub status: StepStatus,
    pub required_fields: Vec<String>,
    pub missing_fields: Vec<String>,
    pub invalid_fields: Vec<FieldIssue>,
    /// Revealed by current answers but not yet shown by the client.
    pub newly_required: Vec<String>,
    /// Shown by the client but no longer required by current answers.
    pub stale_fields: Vec<String>,
}

impl StepValidation {
    pub fn is_ready(&self) -> bool {
        self.status == StepStatus::Ready
    }

    /// Record a failure found outside the blueprint, such as a policy gate.
    pub fn reject(&mut self, field: &str, message: impl Into<String>) {
        self.invalid_fields.push(FieldIssue {
            field: field.to_string(),
            message: message.into(),
        });
        self.status = StepStatus::Incomplete;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WizardError {
    #[error("{business_path} has no wizard step {step_number}")]
    UnknownStep {
        business_path: BusinessPath,
        step_number: u8,
    },
    #[error("state is for step {actual} but the attempt is for step {expected}")]
    StepMismatch { expected: u8, actual: u8 },
    #[error("step {0} was already submitted; start a new attempt")]
    AlreadySubmitted(u8),
    #[error("step {step_number} is not ready: missing [{}]", .missing.join(", "))]
    NotReady { step_number: u8, missing: Vec<String> },
}

impl WizardBlueprint {
    /// Every required key for the snapshot: base fields plus whatever the
    /// current answers reveal, followed to a fixed point.
    pub fn required_fields(
        &self,
        step: &StepDefinition,
        state: &WizardStepState,
    ) -> BTreeSet<&'static str> {
        let mut required: BTreeSet<&'static str> = step.base_required().collect();
        let mut pending: Vec<&'static str> = required.iter().copied().collect();

        while let Some(key) = pending.pop() {
            let Some(value) = state.field_values.get(key) else {
                continue;
            };
            let selected = value.to_string();
            for &revealed in self.revealed_by(step.step_number, key, &selected) {
                if step.field(revealed).is_some() && required.insert(revealed) {
                    pending.push(revealed);
                }
            }
        }

        required
    }

    pub fn evaluate(
        &self,
        business_path: BusinessPath,
        state: &WizardStepState,
    ) -> Result<StepValidation, WizardError> {
        let step = self
            .step(business_path, state.step_number)
            .ok_or(WizardError::UnknownStep {
                business_path,
                step_number: state.step_number,
            })?;
        let required = self.required_fields(step, state);

        let mut missing_fields = Vec::new();
        let mut invalid_fields = Vec::new();
        for field in &step.fields {
            match state.field_values.get(field.key) {
                Some(value) if !value.is_blank() => {
                    if let Some(message) = kind_mismatch(field.kind, value) {
                        invalid_fields.push(FieldIssue {
                            field: field.key.to_string(),
                            message,
                        });
                    }
                }
                _ if required.contains(field.key) => missing_fields.push(field.key.to_string()),
                _ => {}
            }
        }

        let conditional: BTreeSet<&str> = required
            .iter()
            .copied()
            .filter(|key| {
                step.field(key)
                    .is_some_and(|field| field.presence == Presence::Conditional)
            })
            .collect();
        let newly_required = conditional
            .iter()
            .filter(|key| !state.revealed_conditional_fields.contains(**key))
            .map(|key| key.to_string())
            .collect();
        let stale_fields = state
            .revealed_conditional_fields
            .iter()
            .filter(|key| !required.contains(key.as_str()))
            .cloned()
            .collect();

        let status = if missing_fields.is_empty() && invalid_fields.is_empty() {
            StepStatus::Ready
        } else {
            StepStatus::Incomplete
        };

        Ok(StepValidation {
            business_path,
            step_number: step.step_number,
            status,
            required_fields: required.iter().map(|key| key.to_string()).collect(),
            missing_fields,
            invalid_fields,
            newly_required,
            stale_fields,
        })
    }
}

fn kind_mismatch(kind: FieldKind, value: &FieldValue) -> Option<String> {
    match kind {
        FieldKind::Text => match value {
            FieldValue::Text(_) => None,
            _ => Some("must be text".to_string()),
        },
        FieldKind::Amount => match value.as_amount() {
            Some(amount) if amount.is_finite() && amount >= 0.0 => None,
            _ => Some("must be a non-negative number".to_string()),
        },
        FieldKind::Choice(allowed) => {
            let selected = value.to_string();
            if allowed.contains(&selected.as_str()) {
                None
            } else {
                Some(format!("'{selected}' is not one of: {}", allowed.join(", ")))
            }
        }
        FieldKind::Flag => match value {
            FieldValue::Flag(_) => None,
            _ => Some("must be true or false".to_string()),
        },
    }
}

/// One pass through a step: `Incomplete -> Ready -> Submitted`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepAttempt {
    business_path: BusinessPath,
    step_number: u8,
    status: StepStatus,
}

impl StepAttempt {
    pub fn new(business_path: BusinessPath, step_number: u8) -> Self {
        Self {
            business_path,
            step_number,
            status: StepStatus::Incomplete,
        }
    }

    pub fn status(&self) -> StepStatus {
        self.status
    }

    /// Re-evaluate the snapshot. Idempotent for an unchanged snapshot.
    pub fn validate(
        &mut self,
        blueprint: &WizardBlueprint,
        state: &WizardStepState,
    ) -> Result<StepValidation, WizardError> {
        if self.status == StepStatus::Submitted {
            return Err(WizardError::AlreadySubmitted(self.step_number));
        }
        if state.step_number != self.step_number {
            return Err(WizardError::StepMismatch {
                expected: self.step_number,
                actual: state.step_number,
            });
        }

        let validation = blueprint.evaluate(self.business_path, state)?;
        self.status = validation.status;
        Ok(validation)
    }

    pub fn submit(
        &mut self,
        blueprint: &WizardBlueprint,
        state: &WizardStepState,
    ) -> Result<StepValidation, WizardError> {
        let mut validation = self.validate(blueprint, state)?;
        if !validation.is_ready() {
            let mut missing = validation.missing_fields.clone();
            missing.extend(validation.invalid_fields.iter().map(|issue| issue.field.clone()));
            return Err(WizardError::NotReady {
                step_number: self.step_number,
                missing,
            });
        }

        self.status = StepStatus::Submitted;
        validation.status = StepStatus::Submitted;
        Ok(validation)
    }
}

#[cfg(test)]
mod tests;
