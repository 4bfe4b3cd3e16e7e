use core::ops::Add;
use core::time::Duration;

use globalactions_core::actions::{CatalogFactory, Effect, MenuVariant, RebootTarget, ToggleTarget};
use globalactions_core::config::MenuConfig;
use globalactions_core::menu::MenuController;
use globalactions_core::policy::PolicyFlags;
use globalactions_core::registry::ActionRegistry;
use globalactions_core::repl::commands::{CommandError, CommandExecutor, CommandOutcome};
use globalactions_core::repl::status::StatusFormatter;
use globalactions_core::session::{
    ActionEffects, MenuSession, SelectOutcome, SessionError, SessionEvent, SessionTiming,
};
use globalactions_core::telemetry::{MenuEventKind, TelemetryInstant};
use globalactions_core::toggle::{ToggleError, ToggleState};
use heapless::{String, Vec};

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

type Executor = CommandExecutor<CatalogFactory, RecordingEffects, MockInstant>;

const CONFIG: &str = "\
root = power, restart, airplane, flashlight
reboot = restart, reboot_recovery, reboot_bootloader
advanced_reboot = on
";

fn executor(flags: PolicyFlags) -> Executor {
    let config = MenuConfig::parse(CONFIG).expect("valid configuration");
    let registry = ActionRegistry::from_config(&config);
    let controller = MenuController::new(registry, CatalogFactory::default());
    let session = MenuSession::new(
        controller,
        RecordingEffects::default(),
        SessionTiming::default(),
    );
    CommandExecutor::new(session, flags)
}

struct Clock(MockInstant);

impl Clock {
    fn run(&mut self, exec: &mut Executor, line: &str) -> CommandOutcome<MockInstant> {
        let outcome = exec
            .execute(line, self.0)
            .unwrap_or_else(|error| panic!("`{line}` failed: {error}"));
        if let CommandOutcome::Waited { until, .. } = &outcome {
            self.0 = *until;
        }
        outcome
    }
}

#[test]
fn reboot_into_recovery_through_submenu() {
    let mut exec = executor(PolicyFlags::new(false, true));
    let mut clock = Clock(MockInstant::from_millis(0));

    clock.run(&mut exec, "open");
    assert_eq!(
        clock.run(&mut exec, "select 1"),
        CommandOutcome::Selected(SelectOutcome::SubmenuPending)
    );

    match clock.run(&mut exec, "wait 1s") {
        CommandOutcome::Waited { events, .. } => assert_eq!(
            events.as_slice(),
            &[
                SessionEvent::Dismissed,
                SessionEvent::Shown(MenuVariant::Reboot)
            ]
        ),
        other => panic!("unexpected outcome: {other:?}"),
    }

    clock.run(&mut exec, "select 1");
    assert_eq!(
        exec.session().effects().performed.as_slice(),
        &[Effect::Reboot(RebootTarget::Recovery)]
    );

    let kinds: Vec<MenuEventKind, 64> = exec
        .session()
        .telemetry()
        .oldest_first()
        .map(|record| record.event)
        .collect();
    assert!(kinds.contains(&MenuEventKind::SubmenuEntered(MenuVariant::Reboot)));
}

#[test]
fn torch_and_airplane_follow_host_confirmation() {
    let mut exec = executor(PolicyFlags::new(false, true));
    let mut clock = Clock(MockInstant::from_millis(0));

    clock.run(&mut exec, "open");
    clock.run(&mut exec, "select 3");
    clock.run(&mut exec, "wait 150ms");
    assert_eq!(
        exec.session().effects().performed.as_slice(),
        &[Effect::SetToggle {
            target: ToggleTarget::Torch,
            on: true,
        }]
    );

    clock.run(&mut exec, "open");
    clock.run(&mut exec, "select 2");
    clock.run(&mut exec, "event ringer on");

    match clock.run(&mut exec, "status") {
        CommandOutcome::Status(snapshot) => {
            let mut line: String<96> = String::new();
            StatusFormatter::new(&snapshot)
                .write_toggles_line(&mut line)
                .expect("toggle line");
            assert_eq!(line.as_str(), "toggles airplane=turning-on silent=n/a torch=on");
        }
        other => panic!("unexpected outcome: {other:?}"),
    }

    match clock.run(&mut exec, "wait 10s") {
        CommandOutcome::Waited { events, .. } => {
            assert!(events.iter().any(|event| matches!(event, SessionEvent::ToggleTimedOut(_))));
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
}

#[test]
fn locked_restricted_device_hides_airplane() {
    let mut exec = executor(PolicyFlags::new(true, true).with_restricted_keyguard(true));
    let now = MockInstant::from_millis(0);

    match exec.execute("open", now) {
        Ok(CommandOutcome::Opened { visible, .. }) => assert_eq!(visible, 3),
        other => panic!("unexpected outcome: {other:?}"),
    }

    exec.execute("restrict off", now).expect("restrict off");
    assert_eq!(exec.session().controller().visible_count(), 4);
}

#[test]
fn reopened_menu_keeps_airplane_request_in_flight() {
    let mut exec = executor(PolicyFlags::new(false, true));
    let mut clock = Clock(MockInstant::from_millis(0));

    clock.run(&mut exec, "open");
    clock.run(&mut exec, "select 2");
    clock.run(&mut exec, "wait 50ms");
    clock.run(&mut exec, "open");

    assert_eq!(
        exec.execute("select 2", clock.0),
        Err(CommandError::Session(SessionError::Toggle(
            ToggleError::InvalidTransition {
                state: ToggleState::TurningOn,
            }
        )))
    );
    assert_eq!(exec.session().effects().performed.len(), 1);

    clock.run(&mut exec, "event airplane on");
    match clock.run(&mut exec, "select 2") {
        CommandOutcome::Selected(SelectOutcome::Toggled { press, .. }) => {
            assert_eq!(press.state, ToggleState::TurningOff);
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
}
