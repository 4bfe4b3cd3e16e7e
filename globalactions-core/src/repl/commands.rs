//! High-level REPL command dispatcher.
//!
//! This module glues parsed commands to a [`MenuSession`]: selections and
//! dismissals go straight to the session, policy and host notifications are
//! marshalled through an [`EventInbox`], and `wait` advances the session clock
//! deadline by deadline. It stays `no_std` friendly so any front-end can share
//! the same implementation.

use core::ops::Add;
use core::time::Duration;

use heapless::Vec;
use thiserror::Error;

use crate::actions::Effect;
use crate::policy::PolicyFlags;
use crate::registry::ActionFactory;
use crate::scheduler::DEFAULT_CAPACITY;
use crate::session::{
    ActionEffects, EventInbox, HostEvent, MenuSession, SelectOutcome, SessionError, SessionEvent,
};
use crate::telemetry::TelemetryInstant;

use super::catalog::{self, CommandSpec, SubcommandTag};
use super::grammar::{self, Command, EventCommand};
use super::status::StatusSnapshot;

/// Upper bound on session events reported by one `wait`.
pub const MAX_WAIT_EVENTS: usize = 32;

const INBOX_CAPACITY: usize = 8;

pub type WaitEvents = Vec<SessionEvent, MAX_WAIT_EVENTS>;

/// Command execution successes.
#[derive(Clone, Debug, PartialEq)]
pub enum CommandOutcome<Instant> {
    Opened {
        visible: usize,
        /// Set when the lone visible action fired without showing the list.
        immediate: Option<SelectOutcome>,
    },
    Selected(SelectOutcome),
    Held(Effect),
    Dismissing,
    Waited {
        until: Instant,
        events: WaitEvents,
    },
    PolicyUpdated(PolicyFlags),
    EventApplied(HostEvent),
    Status(StatusSnapshot),
    Help(Option<&'static CommandSpec>),
}

/// Errors surfaced while executing a command.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum CommandError<'a> {
    #[error(transparent)]
    Parse(grammar::ParseError<'a>),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("no help topic named `{0}`")]
    UnknownTopic(&'a str),
    #[error("event inbox full; {0:?} dropped")]
    InboxFull(HostEvent),
}

impl<'a> From<grammar::ParseError<'a>> for CommandError<'a> {
    fn from(error: grammar::ParseError<'a>) -> Self {
        CommandError::Parse(error)
    }
}

type CommandResult<'a, I> = Result<CommandOutcome<I>, CommandError<'a>>;

/// Dispatches REPL commands into a menu session.
pub struct CommandExecutor<F, E, I, const CAPACITY: usize = DEFAULT_CAPACITY>
where
    I: Copy,
{
    session: MenuSession<F, E, I, CAPACITY>,
    flags: PolicyFlags,
    inbox: EventInbox<INBOX_CAPACITY>,
}

impl<F, E, I, const CAPACITY: usize> CommandExecutor<F, E, I, CAPACITY>
where
    F: ActionFactory,
    E: ActionEffects,
    I: Copy + Ord + Add<Duration, Output = I> + TelemetryInstant,
{
    /// Creates an executor; `flags` apply to every subsequent `open`.
    pub const fn new(session: MenuSession<F, E, I, CAPACITY>, flags: PolicyFlags) -> Self {
        Self {
            session,
            flags,
            inbox: EventInbox::new(),
        }
    }

    pub const fn session(&self) -> &MenuSession<F, E, I, CAPACITY> {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut MenuSession<F, E, I, CAPACITY> {
        &mut self.session
    }

    /// Policy flags used by the next `open`.
    pub const fn flags(&self) -> PolicyFlags {
        self.flags
    }

    pub fn into_inner(self) -> MenuSession<F, E, I, CAPACITY> {
        self.session
    }

    /// Parses and executes a single REPL line.
    pub fn execute<'a>(&mut self, line: &'a str, now: I) -> CommandResult<'a, I> {
        let command = grammar::parse(line)?;
        self.dispatch(command, now)
    }

    fn dispatch<'a>(&mut self, command: Command<'a>, now: I) -> CommandResult<'a, I> {
        match command {
            Command::Open => {
                self.session.open(self.flags, now);
                let visible = self.session.controller().visible_count();
                let immediate = self.session.fire_immediate(now)?;
                Ok(CommandOutcome::Opened { visible, immediate })
            }
            Command::Select(index) => {
                Ok(CommandOutcome::Selected(self.session.select(index, now)?))
            }
            Command::Hold(index) => Ok(CommandOutcome::Held(self.session.long_press(index, now)?)),
            Command::Dismiss => {
                self.session.request_dismiss(now)?;
                Ok(CommandOutcome::Dismissing)
            }
            Command::Wait(duration) => Ok(self.handle_wait(now + duration)),
            Command::Lock(locked) => {
                self.flags.locked = locked;
                self.deliver(HostEvent::LockChanged(locked), now)?;
                Ok(CommandOutcome::PolicyUpdated(self.flags))
            }
            Command::Restrict(restricted) => {
                self.flags.restricted_keyguard = restricted;
                self.deliver(HostEvent::RestrictedKeyguardChanged(restricted), now)?;
                Ok(CommandOutcome::PolicyUpdated(self.flags))
            }
            Command::Provision(provisioned) => {
                self.flags.provisioned = provisioned;
                self.deliver(HostEvent::ProvisioningChanged(provisioned), now)?;
                Ok(CommandOutcome::PolicyUpdated(self.flags))
            }
            Command::Event(event) => {
                let event = host_event(event);
                self.deliver(event, now)?;
                Ok(CommandOutcome::EventApplied(event))
            }
            Command::Status => Ok(CommandOutcome::Status(StatusSnapshot::capture(
                &self.session,
                now,
            ))),
            Command::Help(help) => match help.topic {
                None => Ok(CommandOutcome::Help(None)),
                Some(topic) => catalog::find(topic)
                    .map(|spec| CommandOutcome::Help(Some(spec)))
                    .ok_or(CommandError::UnknownTopic(topic)),
            },
        }
    }

    /// Runs every deferred command due up to `until`, each at its own deadline.
    fn handle_wait(&mut self, until: I) -> CommandOutcome<I> {
        let mut events = WaitEvents::new();

        while let Some(deadline) = self.session.next_deadline()
            && deadline <= until
        {
            for event in self.session.advance(deadline) {
                if events.push(event).is_err() {
                    log::warn!("wait event log full; {event:?} not reported");
                }
            }
        }

        CommandOutcome::Waited { until, events }
    }

    fn deliver<'a>(&mut self, event: HostEvent, now: I) -> Result<(), CommandError<'a>> {
        self.inbox.push(event).map_err(CommandError::InboxFull)?;
        self.session.drain_events(&mut self.inbox, now);
        Ok(())
    }
}

const fn host_event(command: EventCommand) -> HostEvent {
    let on = command.on;
    match command.topic {
        SubcommandTag::Airplane => HostEvent::AirplaneModeChanged(on),
        SubcommandTag::Ringer => HostEvent::RingerModeChanged { silent: on },
        SubcommandTag::Torch => HostEvent::TorchChanged(on),
        SubcommandTag::Ecm => HostEvent::EmergencyCallbackModeChanged(on),
        SubcommandTag::Affordance => HostEvent::EmergencyAffordanceChanged(on),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::catalog::{AIRPLANE, POWER, REBOOT_RECOVERY, RESTART, SCREENSHOT};
    use crate::actions::{CatalogFactory, MenuKey, MenuVariant, RebootTarget, ToggleTarget};
    use crate::menu::{MenuController, MenuError};
    use crate::registry::ActionRegistry;
    use crate::session::{SessionPhase, SessionTiming};
    use crate::toggle::ToggleState;

    #[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd)]
    struct MockInstant(u64);

    impl MockInstant {
        fn from_millis(value: u64) -> Self {
            Self(value * 1_000)
        }
    }

    impl Add<Duration> for MockInstant {
        type Output = Self;

        fn add(self, rhs: Duration) -> Self::Output {
            MockInstant(self.0 + u64::try_from(rhs.as_micros()).unwrap_or(u64::MAX))
        }
    }

    impl TelemetryInstant for MockInstant {
        fn saturating_duration_since(&self, earlier: Self) -> Duration {
            Duration::from_micros(self.0.saturating_sub(earlier.0))
        }
    }

    #[derive(Default)]
    struct RecordingEffects {
        performed: Vec<Effect, 16>,
    }

    impl ActionEffects for RecordingEffects {
        fn perform(&mut self, effect: Effect) {
            self.performed.push(effect).expect("effect log capacity");
        }
    }

    type TestExecutor = CommandExecutor<CatalogFactory, RecordingEffects, MockInstant>;

    fn executor(root: &[MenuKey], reboot: &[MenuKey], flags: PolicyFlags) -> TestExecutor {
        let mut registry = ActionRegistry::new();
        registry.set_keys(MenuVariant::Root, root);
        registry.set_keys(MenuVariant::Reboot, reboot);
        registry.set_advanced_reboot(true);
        let controller = MenuController::new(registry, CatalogFactory::default());
        let session = MenuSession::new(
            controller,
            RecordingEffects::default(),
            SessionTiming::default(),
        );
        CommandExecutor::new(session, flags)
    }

    #[test]
    fn open_reports_visible_count() {
        let mut exec = executor(&[POWER, AIRPLANE, RESTART], &[], PolicyFlags::new(true, false));
        let now = MockInstant::from_millis(0);

        match exec.execute("open", now) {
            Ok(CommandOutcome::Opened { visible, immediate }) => {
                assert_eq!(visible, 2);
                assert!(immediate.is_none());
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn lone_single_press_action_fires_on_open() {
        let mut exec = executor(&[SCREENSHOT], &[], PolicyFlags::new(false, true));
        let now = MockInstant::from_millis(0);

        match exec.execute("open", now) {
            Ok(CommandOutcome::Opened { visible: 1, immediate }) => assert_eq!(
                immediate,
                Some(SelectOutcome::Deferred(Effect::Screenshot))
            ),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn wait_runs_deferred_work_in_deadline_order() {
        let mut exec = executor(
            &[POWER, RESTART],
            &[RESTART, REBOOT_RECOVERY],
            PolicyFlags::new(false, true),
        );
        let start = MockInstant::from_millis(0);
        exec.execute("open", start).expect("open");

        let outcome = exec.execute("select 1", start).expect("select restart");
        assert_eq!(outcome, CommandOutcome::Selected(SelectOutcome::SubmenuPending));

        match exec.execute("wait 300ms", start) {
            Ok(CommandOutcome::Waited { until, events }) => {
                assert_eq!(until, MockInstant::from_millis(300));
                assert_eq!(
                    events.as_slice(),
                    &[
                        SessionEvent::Dismissed,
                        SessionEvent::Shown(MenuVariant::Reboot)
                    ]
                );
            }
            other => panic!("unexpected outcome: {other:?}"),
        }

        let now = MockInstant::from_millis(300);
        assert_eq!(
            exec.execute("hold 1", now),
            Err(CommandError::Session(SessionError::NoLongPress {
                key: REBOOT_RECOVERY
            }))
        );
        assert_eq!(
            exec.execute("select 1", now),
            Ok(CommandOutcome::Selected(SelectOutcome::Performed(
                Effect::Reboot(RebootTarget::Recovery)
            )))
        );
    }

    #[test]
    fn policy_commands_update_flags_and_rebuild() {
        let mut exec = executor(&[POWER, AIRPLANE], &[], PolicyFlags::new(false, true));
        let now = MockInstant::from_millis(0);
        exec.execute("open", now).expect("open");
        assert_eq!(exec.session().controller().visible_count(), 2);

        exec.execute("lock on", now).expect("lock");
        let outcome = exec.execute("restrict on", now).expect("restrict");
        assert_eq!(
            outcome,
            CommandOutcome::PolicyUpdated(
                PolicyFlags::new(true, true).with_restricted_keyguard(true)
            )
        );
        assert_eq!(exec.session().controller().visible_count(), 1);
    }

    #[test]
    fn host_events_confirm_toggles() {
        let mut exec = executor(&[AIRPLANE], &[], PolicyFlags::new(false, true));
        let now = MockInstant::from_millis(0);
        exec.execute("open", now).expect("open");
        exec.execute("select 0", now).expect("press airplane");

        let outcome = exec.execute("event airplane on", now).expect("confirm");
        assert_eq!(
            outcome,
            CommandOutcome::EventApplied(HostEvent::AirplaneModeChanged(true))
        );

        let state = exec
            .session()
            .controller()
            .toggle(ToggleTarget::Airplane)
            .and_then(crate::actions::Action::toggle_state);
        assert_eq!(state, Some(ToggleState::On));
    }

    #[test]
    fn status_captures_pending_work() {
        let mut exec = executor(&[POWER], &[], PolicyFlags::new(false, true));
        let now = MockInstant::from_millis(0);
        exec.execute("open", now).expect("open");
        exec.execute("dismiss", now).expect("dismiss");

        match exec.execute("status", now) {
            Ok(CommandOutcome::Status(snapshot)) => {
                assert_eq!(snapshot.phase, SessionPhase::Dismissing);
                assert_eq!(snapshot.pending.dismiss, 1);
                assert_eq!(snapshot.next_due, Some(Duration::ZERO));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn out_of_range_selection_surfaces_menu_error() {
        let mut exec = executor(&[POWER], &[], PolicyFlags::new(false, true));
        let now = MockInstant::from_millis(0);
        exec.execute("open", now).expect("open");

        assert_eq!(
            exec.execute("select 4", now),
            Err(CommandError::Session(SessionError::Menu(
                MenuError::IndexOutOfRange { index: 4, len: 1 }
            )))
        );
    }

    #[test]
    fn help_resolves_topics() {
        let mut exec = executor(&[POWER], &[], PolicyFlags::default());
        let now = MockInstant::from_millis(0);

        match exec.execute("help wait", now) {
            Ok(CommandOutcome::Help(Some(spec))) => assert_eq!(spec.name, "wait"),
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(
            exec.execute("help reboot", now),
            Err(CommandError::UnknownTopic("reboot"))
        );
    }

    #[test]
    fn parse_error_is_returned() {
        let mut exec = executor(&[POWER], &[], PolicyFlags::default());
        let result = exec.execute("select", MockInstant::from_millis(0));
        assert!(matches!(result, Err(CommandError::Parse(_))));
    }
}
