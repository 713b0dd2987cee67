use crate::FaultCode;

/// Why a run ended successfully.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum StopReason {
    /// The cycle counter reached the configured timeout.
    Timeout,
    /// A shutdown handle or a handler asked the engine to stop.
    ShutdownRequested,
    /// The debug front end ended the session.
    Killed,
}

/// Engine state machine: one steady state and two terminal states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum RunState {
    /// Ready to execute the next cycle.
    #[default]
    Running,
    /// Stopped without error.
    StoppedOk(StopReason),
    /// Stopped on a fatal fault.
    StoppedFault(FaultCode),
}

impl RunState {
    /// Returns `true` for either stopped state.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Running)
    }

    /// Returns the fault, if this state stopped on one.
    #[must_use]
    pub const fn fault(self) -> Option<FaultCode> {
        match self {
            Self::StoppedFault(cause) => Some(cause),
            Self::Running | Self::StoppedOk(_) => None,
        }
    }

    /// Process exit status for this state: zero unless stopped on a fault.
    #[must_use]
    pub const fn exit_code(self) -> i32 {
        match self {
            Self::StoppedFault(cause) => cause.exit_code(),
            Self::Running | Self::StoppedOk(_) => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{RunState, StopReason};
    use crate::FaultCode;

    #[test]
    fn run_state_default_is_running() {
        assert_eq!(RunState::default(), RunState::Running);
        assert!(!RunState::Running.is_terminal());
    }

    #[test]
    fn fault_accessor_reports_only_fault_variant() {
        assert_eq!(RunState::Running.fault(), None);
        assert_eq!(RunState::StoppedOk(StopReason::Timeout).fault(), None);
        assert_eq!(
            RunState::StoppedFault(FaultCode::AddressFault).fault(),
            Some(FaultCode::AddressFault)
        );
    }

    #[test]
    fn successful_stops_exit_zero() {
        for reason in [
            StopReason::Timeout,
            StopReason::ShutdownRequested,
            StopReason::Killed,
        ] {
            let state = RunState::StoppedOk(reason);
            assert!(state.is_terminal());
            assert_eq!(state.exit_code(), 0);
        }
        assert_eq!(
            RunState::StoppedFault(FaultCode::IllegalSequence).exit_code(),
            84
        );
    }
}
