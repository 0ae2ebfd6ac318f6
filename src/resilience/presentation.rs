//! Presentation adapter for circuit states.
//!
//! Dashboards and CLI surfaces want labels and colors; the state machine
//! does not. Formatting lives here so [`CircuitState`] stays a plain enum.

use crate::models::CircuitState;

pub trait CircuitStateDisplay {
    fn label(&self) -> &'static str;
    fn color(&self) -> &'static str;
    fn description(&self) -> &'static str;
}

impl CircuitStateDisplay for CircuitState {
    fn label(&self) -> &'static str {
        match self {
            CircuitState::Closed => "Closed",
            CircuitState::Open => "Open",
            CircuitState::HalfOpen => "Half-Open",
        }
    }

    fn color(&self) -> &'static str {
        match self {
            CircuitState::Closed => "green",
            CircuitState::Open => "red",
            CircuitState::HalfOpen => "yellow",
        }
    }

    fn description(&self) -> &'static str {
        match self {
            CircuitState::Closed => "Normal operation, calls pass through",
            CircuitState::Open => "Failing fast, calls are rejected",
            CircuitState::HalfOpen => "Testing recovery with trial calls",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_cover_every_state() {
        assert_eq!(CircuitState::Closed.label(), "Closed");
        assert_eq!(CircuitState::Open.color(), "red");
        assert!(CircuitState::HalfOpen.description().contains("recovery"));
    }
}
