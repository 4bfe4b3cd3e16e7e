//! Four-state toggle machine backing binary menu settings.

use core::fmt;

use thiserror::Error;

/// Observable state of a toggle-style action.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ToggleState {
    Off,
    TurningOn,
    TurningOff,
    On,
}

impl ToggleState {
    /// `true` while a change has been requested but not yet confirmed.
    #[must_use]
    pub const fn in_transition(self) -> bool {
        matches!(self, ToggleState::TurningOn | ToggleState::TurningOff)
    }

    /// `true` for `On` and `TurningOff`.
    #[must_use]
    pub const fn is_on(self) -> bool {
        matches!(self, ToggleState::On | ToggleState::TurningOff)
    }

    #[must_use]
    pub const fn from_bool(on: bool) -> Self {
        if on { ToggleState::On } else { ToggleState::Off }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            ToggleState::Off => "off",
            ToggleState::TurningOn => "turning-on",
            ToggleState::TurningOff => "turning-off",
            ToggleState::On => "on",
        }
    }
}

impl fmt::Display for ToggleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a press settles once the effect has been requested.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TransitionMode {
    /// Collapse straight to `On`/`Off`.
    Immediate,
    /// Stay in the intermediate state until the host confirms.
    AwaitConfirmation,
}

/// Rejected toggle interaction.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Error)]
pub enum ToggleError {
    #[error("toggle is {state}; press rejected")]
    InvalidTransition { state: ToggleState },
}

/// Result of an accepted press.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct TogglePress {
    /// Value handed to the effect.
    pub desired: bool,
    /// State after the press settled.
    pub state: ToggleState,
    pub awaiting_confirmation: bool,
}

/// State machine for a single toggle action.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ToggleStateMachine {
    state: ToggleState,
    mode: TransitionMode,
}

impl ToggleStateMachine {
    #[must_use]
    pub const fn new(state: ToggleState, mode: TransitionMode) -> Self {
        Self { state, mode }
    }

    #[must_use]
    pub const fn state(&self) -> ToggleState {
        self.state
    }

    #[must_use]
    pub const fn mode(&self) -> TransitionMode {
        self.mode
    }

    #[must_use]
    pub const fn in_transition(&self) -> bool {
        self.state.in_transition()
    }

    #[must_use]
    pub const fn is_on(&self) -> bool {
        self.state.is_on()
    }

    /// Flips the toggle and invokes `effect` exactly once with the new value.
    ///
    /// Presses are rejected while a transition is in flight; the state is left
    /// untouched and `effect` is not called.
    pub fn press<F>(&mut self, effect: F) -> Result<TogglePress, ToggleError>
    where
        F: FnOnce(bool),
    {
        if self.state.in_transition() {
            log::debug!("toggle press rejected while {}", self.state);
            return Err(ToggleError::InvalidTransition { state: self.state });
        }

        let desired = !self.state.is_on();
        self.state = if desired {
            ToggleState::TurningOn
        } else {
            ToggleState::TurningOff
        };

        effect(desired);

        if self.mode == TransitionMode::Immediate {
            self.state = ToggleState::from_bool(desired);
        }

        Ok(TogglePress {
            desired,
            state: self.state,
            awaiting_confirmation: self.state.in_transition(),
        })
    }

    /// Applies an externally confirmed value from any state.
    pub fn confirm(&mut self, on: bool) {
        self.state = ToggleState::from_bool(on);
    }

    /// Overwrites the state with an asynchronously observed value.
    pub fn set_state(&mut self, state: ToggleState) {
        self.state = state;
    }

    /// Abandons an unconfirmed transition, restoring the state it started from.
    ///
    /// Returns the restored state, or `None` when nothing was in flight.
    pub fn expire(&mut self) -> Option<ToggleState> {
        let restored = match self.state {
            ToggleState::TurningOn => ToggleState::Off,
            ToggleState::TurningOff => ToggleState::On,
            ToggleState::Off | ToggleState::On => return None,
        };
        self.state = restored;
        Some(restored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn immediate_press_flips_and_reports_desired_value() {
        let mut machine = ToggleStateMachine::new(ToggleState::Off, TransitionMode::Immediate);
        let mut seen = None;

        let press = machine.press(|on| seen = Some(on)).expect("press accepted");

        assert_eq!(seen, Some(true));
        assert_eq!(press.state, ToggleState::On);
        assert!(!press.awaiting_confirmation);
        assert_eq!(machine.state(), ToggleState::On);
    }

    #[test]
    fn awaiting_press_stays_intermediate_until_confirmed() {
        let mut machine =
            ToggleStateMachine::new(ToggleState::On, TransitionMode::AwaitConfirmation);
        let mut calls = 0;

        let press = machine.press(|on| {
            assert!(!on);
            calls += 1;
        });
        assert!(matches!(
            press,
            Ok(TogglePress {
                desired: false,
                state: ToggleState::TurningOff,
                awaiting_confirmation: true,
            })
        ));

        let rejected = machine.press(|_| calls += 1);
        assert_eq!(
            rejected,
            Err(ToggleError::InvalidTransition {
                state: ToggleState::TurningOff
            })
        );
        assert_eq!(calls, 1);

        machine.confirm(false);
        assert_eq!(machine.state(), ToggleState::Off);
    }

    #[test]
    fn expire_restores_prior_stable_state() {
        let mut machine =
            ToggleStateMachine::new(ToggleState::TurningOn, TransitionMode::Immediate);
        assert_eq!(machine.expire(), Some(ToggleState::Off));
        assert_eq!(machine.expire(), None);

        machine.set_state(ToggleState::TurningOff);
        assert_eq!(machine.expire(), Some(ToggleState::On));
    }

    #[test]
    fn on_and_turning_off_count_as_on() {
        assert!(ToggleState::On.is_on());
        assert!(ToggleState::TurningOff.is_on());
        assert!(!ToggleState::TurningOn.is_on());
        assert!(!ToggleState::Off.is_on());
    }
}
