use core::ops::Add;
use core::time::Duration;

use globalactions_core::actions::catalog::{AIRPLANE, POWER, REBOOT_RECOVERY, RESTART};
use globalactions_core::actions::{Action, CatalogFactory, HostSnapshot, MenuKey, MenuVariant};
use globalactions_core::config::MenuConfig;
use globalactions_core::menu::{MenuController, MenuError};
use globalactions_core::registry::{ActionRegistry, ConfigurationError};
use globalactions_core::scheduler::{DeferredKind, DeferredScheduler};
use globalactions_core::toggle::{
    ToggleError, ToggleState, ToggleStateMachine, TransitionMode,
};

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

fn controller(root: &[MenuKey]) -> MenuController<CatalogFactory> {
    let mut registry = ActionRegistry::new();
    registry.set_keys(MenuVariant::Root, root);
    MenuController::new(registry, CatalogFactory::default())
}

fn visible_keys(menu: &MenuController<CatalogFactory>) -> heapless::Vec<MenuKey, 8> {
    menu.visible().map(Action::key).take(8).collect()
}

#[test]
fn locked_provisioned_device_shows_every_keyguard_action() {
    let mut menu = controller(&[POWER, AIRPLANE, RESTART]);
    menu.open(true, true);

    assert_eq!(menu.visible_count(), 3);
    assert_eq!(visible_keys(&menu).as_slice(), &[POWER, AIRPLANE, RESTART]);
}

#[test]
fn unprovisioned_device_hides_airplane_and_reindexes() {
    let mut menu = controller(&[POWER, AIRPLANE, RESTART]);
    menu.open(true, false);

    assert_eq!(visible_keys(&menu).as_slice(), &[POWER, RESTART]);
    assert_eq!(menu.visible_at(1).map(Action::key), Ok(RESTART));
    assert!(matches!(
        menu.visible_at(2),
        Err(MenuError::IndexOutOfRange { index: 2, len: 2 })
    ));
}

#[test]
fn toggle_press_rejects_second_press_until_confirmed() {
    let mut machine = ToggleStateMachine::new(ToggleState::Off, TransitionMode::AwaitConfirmation);
    let mut requests = 0;

    let press = machine.press(|on| {
        assert!(on);
        requests += 1;
    });
    assert_eq!(press.map(|press| press.state), Ok(ToggleState::TurningOn));

    assert_eq!(
        machine.press(|_| requests += 1),
        Err(ToggleError::InvalidTransition {
            state: ToggleState::TurningOn,
        })
    );
    assert_eq!(requests, 1);

    machine.confirm(true);
    assert_eq!(machine.state(), ToggleState::On);
}

#[test]
fn reboot_submenu_refused_without_eligible_targets() {
    let mut registry = ActionRegistry::new();
    registry.set_keys(MenuVariant::Root, &[POWER, RESTART]);
    registry.set_keys(MenuVariant::Reboot, &[RESTART, REBOOT_RECOVERY]);
    let mut menu = MenuController::new(registry, CatalogFactory::default());
    menu.open(false, true);

    assert_eq!(
        menu.enter_reboot_submenu(),
        Err(MenuError::Configuration(ConfigurationError::NoRebootTargets))
    );
    assert_eq!(menu.variant(), MenuVariant::Root);
}

#[test]
fn cancel_after_fire_is_a_quiet_no_op() {
    let mut scheduler: DeferredScheduler<MockInstant> = DeferredScheduler::new();
    let start = MockInstant::from_millis(0);
    let token = scheduler
        .schedule(DeferredKind::Dismiss, start, Duration::ZERO)
        .expect("room in queue");

    let fired = scheduler.poll(start).expect("dismiss due");
    assert_eq!(fired.token, token);
    assert!(!scheduler.cancel(token));
    assert!(scheduler.is_empty());
}

#[test]
fn duplicate_keys_keep_first_position() {
    let config = MenuConfig::parse("root = power, airplane, power, restart\n").expect("config");
    let registry = ActionRegistry::from_config(&config);
    let mut menu = MenuController::new(registry, CatalogFactory::default());
    menu.open(false, true);

    assert_eq!(visible_keys(&menu).as_slice(), &[POWER, AIRPLANE, RESTART]);
}

#[test]
fn toggles_start_from_host_snapshot() {
    let snapshot = HostSnapshot {
        airplane_on: true,
        ..HostSnapshot::default()
    };
    let mut menu = MenuController::new(
        {
            let mut registry = ActionRegistry::new();
            registry.set_keys(MenuVariant::Root, &[AIRPLANE]);
            registry
        },
        CatalogFactory::new(snapshot),
    );
    menu.open(false, true);

    let state = menu.visible_at(0).ok().and_then(Action::toggle_state);
    assert_eq!(state, Some(ToggleState::On));
}
