//! Menu controller: resolved and filtered action lists for the active variant.
//!
//! The visible list is always derived from the registry through
//! [`MenuController::rebuild`]; nothing mutates it in place. Indices handed to
//! [`MenuController::visible_at`] refer to the filtered list only.

use heapless::Vec;
use thiserror::Error;

use crate::actions::{Action, MenuKey, MenuVariant, ToggleTarget};
use crate::config::MenuConfig;
use crate::policy::{self, PolicyFlags};
use crate::registry::{
    ActionFactory, ActionList, ActionRegistry, ConfigurationError, ErrorList, MAX_ACTIONS,
};

/// Errors reported by [`MenuController`] operations. State is left unchanged.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Error)]
pub enum MenuError {
    #[error("index {index} is outside the {len} visible actions")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("cannot enter {requested} menu from {current}")]
    InvalidTransition {
        current: MenuVariant,
        requested: MenuVariant,
    },
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
}

/// Owns the registry, the factory and the derived action lists.
pub struct MenuController<F> {
    registry: ActionRegistry,
    factory: F,
    flags: PolicyFlags,
    variant: MenuVariant,
    resolved: ActionList,
    visible: Vec<u8, MAX_ACTIONS>,
    errors: ErrorList,
}

impl<F> MenuController<F>
where
    F: ActionFactory,
{
    #[must_use]
    pub fn new(registry: ActionRegistry, factory: F) -> Self {
        Self {
            registry,
            factory,
            flags: PolicyFlags::default(),
            variant: MenuVariant::Root,
            resolved: ActionList::new(),
            visible: Vec::new(),
            errors: ErrorList::new(),
        }
    }

    /// Opens the Root menu under the given lock and provisioning state.
    pub fn open(&mut self, locked: bool, provisioned: bool) {
        self.open_with(PolicyFlags::new(locked, provisioned));
    }

    /// Opens the Root menu with a full set of policy flags.
    pub fn open_with(&mut self, flags: PolicyFlags) {
        self.flags = flags;
        self.variant = MenuVariant::Root;
        self.resolved.clear();
        self.rebuild();
    }

    /// Re-resolves the current variant and re-applies the visibility policy.
    ///
    /// Toggle machines of actions that were already resolved carry over to
    /// their fresh replacements so in-flight transitions survive a refresh.
    pub fn rebuild(&mut self) {
        let mut resolution = self.registry.resolve(self.variant, &mut self.factory);

        for action in &mut resolution.actions {
            let previous = self
                .resolved
                .iter()
                .find(|prior| prior.key() == action.key())
                .and_then(Action::toggle_machine)
                .copied();
            if let (Some(previous), Some(machine)) = (previous, action.toggle_machine_mut()) {
                *machine = previous;
            }
        }

        self.resolved = resolution.actions;
        self.errors = resolution.errors;
        self.refilter();
    }

    fn refilter(&mut self) {
        self.visible.clear();
        for (index, action) in self.resolved.iter().enumerate() {
            if policy::is_visible(action, self.flags) {
                // Both lists share the MAX_ACTIONS bound.
                let _ = self.visible.push(slot(index));
            }
        }
        log::debug!(
            "{} menu rebuilt: {} of {} actions visible",
            self.variant,
            self.visible.len(),
            self.resolved.len()
        );
    }

    /// Switches to the Reboot submenu.
    ///
    /// Only legal from Root, and only when at least one advanced reboot target
    /// is eligible. The variant is unchanged on error.
    pub fn enter_reboot_submenu(&mut self) -> Result<(), MenuError> {
        if self.variant != MenuVariant::Root {
            return Err(MenuError::InvalidTransition {
                current: self.variant,
                requested: MenuVariant::Reboot,
            });
        }
        if self.registry.eligible_reboot_targets() == 0 {
            log::warn!("reboot submenu refused: no eligible targets");
            return Err(ConfigurationError::NoRebootTargets.into());
        }

        self.variant = MenuVariant::Reboot;
        self.rebuild();
        log::info!("entered reboot submenu");
        Ok(())
    }

    /// Whether [`Self::enter_reboot_submenu`] would currently succeed.
    #[must_use]
    pub fn can_enter_reboot_submenu(&self) -> bool {
        self.variant == MenuVariant::Root && self.registry.eligible_reboot_targets() > 0
    }

    #[must_use]
    pub fn visible_count(&self) -> usize {
        self.visible.len()
    }

    /// Returns the `index`-th visible action.
    pub fn visible_at(&self, index: usize) -> Result<&Action, MenuError> {
        let slot = self
            .visible
            .get(index)
            .ok_or(MenuError::IndexOutOfRange {
                index,
                len: self.visible.len(),
            })?;
        self.resolved
            .get(usize::from(*slot))
            .ok_or(MenuError::IndexOutOfRange {
                index,
                len: self.visible.len(),
            })
    }

    /// Iterates the visible actions in display order.
    pub fn visible(&self) -> impl Iterator<Item = &Action> {
        self.visible
            .iter()
            .filter_map(|slot| self.resolved.get(usize::from(*slot)))
    }

    /// Position of `key` in the visible list.
    #[must_use]
    pub fn visible_index_of(&self, key: MenuKey) -> Option<usize> {
        self.visible().position(|action| action.key() == key)
    }

    /// The single visible action when it should fire without showing a list.
    ///
    /// Returned only when exactly one action is visible and it is a plain
    /// single-press action. Firing it is left to the caller.
    #[must_use]
    pub fn immediate_action(&self) -> Option<&Action> {
        if self.visible.len() != 1 {
            return None;
        }
        self.visible().next().filter(|action| action.is_single_press_only())
    }

    pub fn on_provisioning_changed(&mut self, provisioned: bool) {
        self.flags.provisioned = provisioned;
        self.rebuild();
    }

    pub fn on_lock_state_changed(&mut self, locked: bool) {
        self.flags.locked = locked;
        self.rebuild();
    }

    pub fn on_restricted_keyguard_changed(&mut self, restricted: bool) {
        self.flags.restricted_keyguard = restricted;
        self.rebuild();
    }

    /// Applies a new configuration and rebuilds the current variant.
    pub fn on_configuration_changed(&mut self, config: &MenuConfig) {
        self.registry.apply_config(config);
        self.rebuild();
    }

    pub fn on_emergency_affordance_changed(&mut self, needed: bool) {
        self.registry.set_emergency_affordance(needed);
        self.rebuild();
    }

    /// Resolved action for `key`, visible or not.
    pub fn action_mut(&mut self, key: MenuKey) -> Option<&mut Action> {
        self.resolved.iter_mut().find(|action| action.key() == key)
    }

    /// Resolved toggle action driving `target`.
    pub fn toggle_mut(&mut self, target: ToggleTarget) -> Option<&mut Action> {
        self.resolved
            .iter_mut()
            .find(|action| action.toggle_target() == Some(target))
    }

    #[must_use]
    pub fn toggle(&self, target: ToggleTarget) -> Option<&Action> {
        self.resolved
            .iter()
            .find(|action| action.toggle_target() == Some(target))
    }

    #[must_use]
    pub const fn variant(&self) -> MenuVariant {
        self.variant
    }

    #[must_use]
    pub const fn flags(&self) -> PolicyFlags {
        self.flags
    }

    /// Every resolved action, including ones hidden by the policy.
    #[must_use]
    pub fn resolved(&self) -> &[Action] {
        &self.resolved
    }

    /// Configuration errors reported by the latest rebuild.
    #[must_use]
    pub fn errors(&self) -> &[ConfigurationError] {
        &self.errors
    }

    #[must_use]
    pub const fn registry(&self) -> &ActionRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut ActionRegistry {
        &mut self.registry
    }

    #[must_use]
    pub const fn factory(&self) -> &F {
        &self.factory
    }

    pub fn factory_mut(&mut self) -> &mut F {
        &mut self.factory
    }
}

#[allow(clippy::cast_possible_truncation)]
const fn slot(index: usize) -> u8 {
    // MAX_ACTIONS fits in a byte.
    index as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::CatalogFactory;
    use crate::actions::catalog::{AIRPLANE, POWER, REBOOT_RECOVERY, RESTART, SCREENSHOT};
    use crate::toggle::ToggleState;

    fn controller(root: &[MenuKey], reboot: &[MenuKey]) -> MenuController<CatalogFactory> {
        let mut registry = ActionRegistry::new();
        registry.set_keys(MenuVariant::Root, root);
        registry.set_keys(MenuVariant::Reboot, reboot);
        MenuController::new(registry, CatalogFactory::default())
    }

    fn visible_keys(controller: &MenuController<CatalogFactory>) -> Vec<MenuKey, MAX_ACTIONS> {
        controller.visible().map(Action::key).collect()
    }

    #[test]
    fn filtered_indices_skip_hidden_actions() {
        let mut menu = controller(&[POWER, AIRPLANE, RESTART], &[]);
        menu.open(true, false);

        assert_eq!(visible_keys(&menu).as_slice(), &[POWER, RESTART]);
        assert_eq!(menu.visible_at(1).map(Action::key), Ok(RESTART));
        assert_eq!(
            menu.visible_at(2),
            Err(MenuError::IndexOutOfRange { index: 2, len: 2 })
        );
    }

    #[test]
    fn policy_events_rebuild() {
        let mut menu = controller(&[POWER, AIRPLANE, RESTART], &[]);
        menu.open(true, false);
        assert_eq!(menu.visible_count(), 2);

        menu.on_provisioning_changed(true);
        assert_eq!(menu.visible_count(), 3);

        menu.on_restricted_keyguard_changed(true);
        assert_eq!(visible_keys(&menu).as_slice(), &[POWER, RESTART]);

        menu.on_lock_state_changed(false);
        assert_eq!(menu.visible_count(), 3);
    }

    #[test]
    fn reboot_submenu_requires_eligible_targets() {
        let mut menu = controller(&[POWER, RESTART], &[RESTART, REBOOT_RECOVERY]);
        menu.open(false, true);

        assert!(!menu.can_enter_reboot_submenu());
        assert_eq!(
            menu.enter_reboot_submenu(),
            Err(MenuError::Configuration(ConfigurationError::NoRebootTargets))
        );
        assert_eq!(menu.variant(), MenuVariant::Root);

        menu.registry_mut().set_advanced_reboot(true);
        menu.enter_reboot_submenu().expect("targets available");
        assert_eq!(menu.variant(), MenuVariant::Reboot);
        assert_eq!(visible_keys(&menu).as_slice(), &[RESTART, REBOOT_RECOVERY]);

        assert_eq!(
            menu.enter_reboot_submenu(),
            Err(MenuError::InvalidTransition {
                current: MenuVariant::Reboot,
                requested: MenuVariant::Reboot,
            })
        );
    }

    #[test]
    fn toggle_state_survives_rebuild() {
        let mut menu = controller(&[AIRPLANE], &[]);
        menu.open(false, true);

        let action = menu.toggle_mut(ToggleTarget::Airplane).expect("airplane");
        let machine = action.toggle_machine_mut().expect("toggle");
        machine.press(|_| {}).expect("press");
        assert_eq!(machine.state(), ToggleState::TurningOn);

        menu.rebuild();
        let state = menu
            .toggle(ToggleTarget::Airplane)
            .and_then(Action::toggle_state);
        assert_eq!(state, Some(ToggleState::TurningOn));

        menu.open(false, true);
        let state = menu
            .toggle(ToggleTarget::Airplane)
            .and_then(Action::toggle_state);
        assert_eq!(state, Some(ToggleState::Off), "reopening starts fresh");
    }

    #[test]
    fn immediate_action_requires_single_press_only() {
        let mut menu = controller(&[SCREENSHOT], &[]);
        menu.open(false, true);
        assert_eq!(menu.immediate_action().map(Action::key), Some(SCREENSHOT));

        let mut menu = controller(&[POWER], &[]);
        menu.open(false, true);
        assert!(menu.immediate_action().is_none(), "power has a long press");
    }
}
