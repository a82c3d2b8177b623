//! Workflow state machine evaluation.
//!
//! States are members of a value set. A state's outgoing edges are its
//! `transitions` entry; there is no implicit self-loop, and a declared state
//! with no outgoing edges is terminal.

use std::collections::BTreeSet;

use serde_json::json;

use super::types::WorkflowDefinition;
use crate::error::{CanonError, Result, ValidationErrorType};
use crate::shapes::ValueShape;

impl WorkflowDefinition {
    /// Every state named anywhere in the machine, sorted.
    pub fn declared_states(&self) -> BTreeSet<&str> {
        let mut states: BTreeSet<&str> = BTreeSet::from([self.initial.as_str()]);
        for (from, targets) in &self.transitions {
            states.insert(from);
            states.extend(targets.iter().map(String::as_str));
        }
        states
    }

    pub fn next_states(&self, from: &str) -> &[String] {
        self.transitions.get(from).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Unknown `from` is simply not a valid source.
    pub fn is_valid_transition(&self, from: &str, to: &str) -> bool {
        self.next_states(from).iter().any(|s| s == to)
    }

    pub fn transition_requires_comment(&self, to: &str) -> bool {
        self.requires_comment.get(to).copied().unwrap_or(false)
    }

    pub fn is_terminal_state(&self, state: &str) -> bool {
        self.declared_states().contains(state) && self.next_states(state).is_empty()
    }

    /// Check a requested move, including the comment requirement.
    pub fn check_transition(&self, from: &str, to: &str, comment: Option<&str>) -> Result<()> {
        if !self.is_valid_transition(from, to) {
            return Err(CanonError::validation(
                ValidationErrorType::InvalidWorkflowState,
                format!("Transition '{from}' -> '{to}' is not allowed"),
                json!({ "from": from, "to": to, "allowed": self.next_states(from) }),
            ));
        }
        let has_comment = comment.is_some_and(|c| !c.trim().is_empty());
        if self.transition_requires_comment(to) && !has_comment {
            return Err(CanonError::validation(
                ValidationErrorType::InvalidWorkflowState,
                format!("Transition into '{to}' requires a comment"),
                json!({ "from": from, "to": to }),
            ));
        }
        Ok(())
    }

    /// Every state must be a value of the `states` value set.
    pub fn check_states(&self, values: &[ValueShape]) -> Result<()> {
        let members: BTreeSet<&str> = values
            .iter()
            .filter(|v| v.value_set_code == self.states)
            .map(|v| v.code.as_str())
            .collect();
        match self.declared_states().into_iter().find(|s| !members.contains(s)) {
            None => Ok(()),
            Some(state) => Err(CanonError::validation(
                ValidationErrorType::InvalidWorkflowState,
                format!(
                    "Workflow state '{state}' is not a value of value set '{}'",
                    self.states
                ),
                json!({ "state": state, "value_set_code": self.states }),
            )),
        }
    }
}

// ── Free-function surface ────────────────────────────────────────

pub fn is_valid_transition(workflow: &WorkflowDefinition, from: &str, to: &str) -> bool {
    workflow.is_valid_transition(from, to)
}

pub fn transition_requires_comment(workflow: &WorkflowDefinition, to: &str) -> bool {
    workflow.transition_requires_comment(to)
}

pub fn next_states<'a>(workflow: &'a WorkflowDefinition, from: &str) -> &'a [String] {
    workflow.next_states(from)
}

pub fn is_terminal_state(workflow: &WorkflowDefinition, state: &str) -> bool {
    workflow.is_terminal_state(state)
}

pub fn check_workflow_states(workflow: &WorkflowDefinition, values: &[ValueShape]) -> Result<()> {
    workflow.check_states(values)
}
