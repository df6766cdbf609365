// src/orchestrator/phase.rs
//! Pipeline phases and the legal transitions between them.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    ExtractRequested,
    Extracting,
    TransformRequested,
    AwaitingPublishDecision,
    Publishing,
    Done,
    Failed,
}

impl Phase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Done | Phase::Failed)
    }

    /// The happy path is strictly linear; `Failed` is reachable from any
    /// non-terminal phase.
    pub fn can_transition_to(self, next: Phase) -> bool {
        use Phase::*;
        match (self, next) {
            (from, Failed) => !from.is_terminal(),
            (Idle, ExtractRequested)
            | (ExtractRequested, Extracting)
            | (Extracting, TransformRequested)
            | (TransformRequested, AwaitingPublishDecision)
            | (AwaitingPublishDecision, Publishing)
            | (Publishing, Done) => true,
            _ => false,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::ExtractRequested => "extract_requested",
            Phase::Extracting => "extracting",
            Phase::TransformRequested => "transform_requested",
            Phase::AwaitingPublishDecision => "awaiting_publish_decision",
            Phase::Publishing => "publishing",
            Phase::Done => "done",
            Phase::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("illegal pipeline transition {from:?} -> {to:?}")]
pub struct IllegalTransition {
    pub from: Phase,
    pub to: Phase,
}

/// Per-run tracker. Records every phase entered, starting at `Idle`.
#[derive(Debug, Clone)]
pub struct PhaseMachine {
    trail: Vec<Phase>,
}

impl Default for PhaseMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl PhaseMachine {
    pub fn new() -> Self {
        Self {
            trail: vec![Phase::Idle],
        }
    }

    pub fn current(&self) -> Phase {
        self.trail.last().copied().unwrap_or(Phase::Idle)
    }

    pub fn trail(&self) -> &[Phase] {
        &self.trail
    }

    pub fn advance(&mut self, next: Phase) -> Result<(), IllegalTransition> {
        let from = self.current();
        if !from.can_transition_to(next) {
            return Err(IllegalTransition { from, to: next });
        }
        tracing::debug!(target: "etl", from = from.as_str(), to = next.as_str(), "phase transition");
        self.trail.push(next);
        Ok(())
    }

    /// Enter `Failed` unless already terminal. Returns the phase that failed.
    pub fn fail(&mut self) -> Phase {
        let from = self.current();
        if !from.is_terminal() {
            self.trail.push(Phase::Failed);
        }
        from
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use Phase::*;

    const ALL: [Phase; 8] = [
        Idle,
        ExtractRequested,
        Extracting,
        TransformRequested,
        AwaitingPublishDecision,
        Publishing,
        Done,
        Failed,
    ];

    #[test]
    fn publishing_is_only_entered_from_the_checkpoint() {
        for from in ALL {
            assert_eq!(
                from.can_transition_to(Publishing),
                from == AwaitingPublishDecision,
                "{from:?} -> Publishing"
            );
        }
    }

    #[test]
    fn no_phase_can_be_skipped() {
        let mut m = PhaseMachine::new();
        assert!(m.advance(Extracting).is_err());
        assert!(m.advance(Publishing).is_err());
        m.advance(ExtractRequested).unwrap();
        assert!(m.advance(TransformRequested).is_err());
        assert_eq!(m.current(), ExtractRequested);
    }

    #[test]
    fn failed_is_absorbing_and_reachable_from_non_terminal() {
        for from in ALL {
            assert_eq!(from.can_transition_to(Failed), !from.is_terminal());
        }
        for next in ALL {
            assert!(!Failed.can_transition_to(next));
            assert!(!Done.can_transition_to(next));
        }
    }

    #[test]
    fn fail_records_the_failing_phase_once() {
        let mut m = PhaseMachine::new();
        m.advance(ExtractRequested).unwrap();
        assert_eq!(m.fail(), ExtractRequested);
        assert_eq!(m.fail(), Failed);
        assert_eq!(m.trail(), &[Idle, ExtractRequested, Failed]);
    }
}
