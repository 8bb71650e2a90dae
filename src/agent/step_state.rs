//! Tool-call state of one leaf step
//!
//! Tracks how many tool calls the step has made against its bound and the
//! observations to feed back to the model.

use crate::llm::Observation;

/// State of a leaf agent's tool-call loop
#[derive(Debug, Clone)]
pub struct StepState {
    /// Tool calls made so far
    pub calls: usize,
    /// Maximum allowed tool calls
    pub max_calls: usize,
    /// Observations collected from tool executions
    pub observations: Vec<Observation>,
}

impl StepState {
    /// Create a new step state with the given bound
    pub fn new(max_calls: usize) -> Self {
        Self {
            calls: 0,
            max_calls,
            observations: Vec::new(),
        }
    }

    /// Reserve one tool call; false once the bound is used up
    pub fn take_call(&mut self) -> bool {
        if self.calls >= self.max_calls {
            return false;
        }
        self.calls += 1;
        true
    }

    /// Add the observation of a finished tool call
    pub fn observe(&mut self, observation: Observation) {
        self.observations.push(observation);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_step_state_new() {
        let state = StepState::new(10);
        assert_eq!(state.calls, 0);
        assert_eq!(state.max_calls, 10);
        assert!(state.observations.is_empty());
    }

    #[test]
    fn test_take_call_respects_bound() {
        let mut state = StepState::new(2);
        assert!(state.take_call());
        assert!(state.take_call());
        assert!(!state.take_call());
        assert_eq!(state.calls, 2);
    }

    #[test]
    fn test_zero_bound_allows_no_calls() {
        let mut state = StepState::new(0);
        assert!(!state.take_call());
    }

    #[test]
    fn test_observe() {
        let mut state = StepState::new(3);
        state.observe(Observation::success("greet_user", json!({}), json!("Hello, Alice!")));
        assert_eq!(state.observations.len(), 1);
    }
}
