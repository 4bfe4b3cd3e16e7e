//! Ordered action keys per menu variant and the host enablement flags.

use heapless::{LinearMap, Vec};
use thiserror::Error;

use crate::actions::{Action, MenuKey, MenuVariant, ToggleTarget, catalog};
use crate::config::MenuConfig;

/// Upper bound on keys per menu variant and actions per resolved list.
pub const MAX_ACTIONS: usize = 24;

/// Upper bound on explicit per-key enablement overrides.
pub const MAX_ENABLEMENT_FLAGS: usize = 32;

/// Upper bound on configuration errors reported by a single resolution.
pub const MAX_RESOLUTION_ERRORS: usize = 8;

pub type KeyList = Vec<MenuKey, MAX_ACTIONS>;
pub type ActionList = Vec<Action, MAX_ACTIONS>;
pub type ErrorList = Vec<ConfigurationError, MAX_RESOLUTION_ERRORS>;

/// Host-supplied constructor turning keys into fresh actions.
pub trait ActionFactory {
    /// Builds the action for `key`, or `None` when the key is unknown.
    fn create(&mut self, key: MenuKey) -> Option<Action>;

    /// Notes a settled toggle value so later builds start from it.
    fn observe_toggle(&mut self, _target: ToggleTarget, _on: bool) {}
}

/// Non-fatal configuration problems. Offending entries are skipped.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Error)]
pub enum ConfigurationError {
    #[error("no action is known for key `{0}`")]
    UnknownKey(MenuKey),
    #[error("action list is full; `{dropped}` dropped")]
    RegistryFull { dropped: MenuKey },
    #[error("reboot submenu has no eligible targets")]
    NoRebootTargets,
}

/// Output of [`ActionRegistry::resolve`].
#[derive(Clone, Debug, Default)]
pub struct Resolution {
    pub actions: ActionList,
    pub errors: ErrorList,
}

impl Resolution {
    fn report(&mut self, error: ConfigurationError) {
        log::warn!("menu configuration: {error}");
        // Extra errors past the bound are still logged above.
        let _ = self.errors.push(error);
    }

    fn contains(&self, key: MenuKey) -> bool {
        self.actions.iter().any(|action| action.key() == key)
    }
}

/// Catalog of configured keys and the host flags that gate them.
#[derive(Clone, Debug)]
pub struct ActionRegistry {
    root: KeyList,
    reboot: KeyList,
    enablement: LinearMap<MenuKey, bool, MAX_ENABLEMENT_FLAGS>,
    advanced_reboot: bool,
    emergency_affordance: bool,
}

impl ActionRegistry {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            root: Vec::new(),
            reboot: Vec::new(),
            enablement: LinearMap::new(),
            advanced_reboot: false,
            emergency_affordance: false,
        }
    }

    /// Builds a registry from a parsed configuration.
    #[must_use]
    pub fn from_config(config: &MenuConfig) -> Self {
        let mut registry = Self::new();
        registry.apply_config(config);
        registry
    }

    /// Replaces every key list and flag with the values in `config`.
    pub fn apply_config(&mut self, config: &MenuConfig) {
        self.root = config.root.clone();
        self.reboot = config.reboot.clone();
        self.enablement = config.enablement.clone();
        self.advanced_reboot = config.advanced_reboot;
        self.emergency_affordance = config.emergency_affordance;
    }

    #[must_use]
    pub fn keys(&self, variant: MenuVariant) -> &[MenuKey] {
        match variant {
            MenuVariant::Root => &self.root,
            MenuVariant::Reboot => &self.reboot,
        }
    }

    /// Replaces the ordered key list of `variant`, dropping keys past the bound.
    pub fn set_keys(&mut self, variant: MenuVariant, keys: &[MenuKey]) {
        let list = match variant {
            MenuVariant::Root => &mut self.root,
            MenuVariant::Reboot => &mut self.reboot,
        };
        list.clear();
        for key in keys {
            if list.push(*key).is_err() {
                log::warn!("{variant} menu key list full; `{key}` dropped");
                break;
            }
        }
    }

    /// Records an explicit enablement flag for `key`.
    pub fn set_enabled(&mut self, key: MenuKey, enabled: bool) {
        if self.enablement.insert(key, enabled).is_err() {
            log::warn!("enablement table full; flag for `{key}` ignored");
        }
    }

    /// Enablement of `key`. Keys without a flag are enabled.
    #[must_use]
    pub fn is_enabled(&self, key: MenuKey) -> bool {
        if catalog::is_advanced_reboot(key) && !self.advanced_reboot {
            return false;
        }
        self.enablement.get(&key).copied().unwrap_or(true)
    }

    #[must_use]
    pub const fn advanced_reboot(&self) -> bool {
        self.advanced_reboot
    }

    pub fn set_advanced_reboot(&mut self, enabled: bool) {
        self.advanced_reboot = enabled;
    }

    #[must_use]
    pub const fn emergency_affordance(&self) -> bool {
        self.emergency_affordance
    }

    pub fn set_emergency_affordance(&mut self, needed: bool) {
        self.emergency_affordance = needed;
    }

    /// Number of advanced reboot targets the Reboot variant would offer.
    #[must_use]
    pub fn eligible_reboot_targets(&self) -> usize {
        let mut seen = KeyList::new();
        self.reboot
            .iter()
            .filter(|key| catalog::is_advanced_reboot(**key) && self.is_enabled(**key))
            .filter(|key| {
                if seen.contains(*key) {
                    false
                } else {
                    seen.push(**key).is_ok()
                }
            })
            .count()
    }

    /// Resolves the configured keys of `variant` into fresh actions.
    pub fn resolve<F>(&self, variant: MenuVariant, factory: &mut F) -> Resolution
    where
        F: ActionFactory + ?Sized,
    {
        self.resolve_keys(self.keys(variant), variant, factory)
    }

    /// Resolves an explicit key sequence.
    ///
    /// Duplicates keep their first position, disabled keys are omitted and
    /// unknown keys are reported without failing the whole list.
    pub fn resolve_keys<F>(
        &self,
        keys: &[MenuKey],
        variant: MenuVariant,
        factory: &mut F,
    ) -> Resolution
    where
        F: ActionFactory + ?Sized,
    {
        let mut resolution = Resolution::default();

        for key in keys {
            self.resolve_one(*key, factory, &mut resolution);
        }

        if variant == MenuVariant::Root && self.emergency_affordance {
            self.resolve_one(catalog::EMERGENCY, factory, &mut resolution);
        }

        resolution
    }

    fn resolve_one<F>(&self, key: MenuKey, factory: &mut F, resolution: &mut Resolution)
    where
        F: ActionFactory + ?Sized,
    {
        if resolution.contains(key) || !self.is_enabled(key) {
            return;
        }

        let Some(action) = factory.create(key) else {
            resolution.report(ConfigurationError::UnknownKey(key));
            return;
        };

        if resolution.actions.push(action).is_err() {
            resolution.report(ConfigurationError::RegistryFull { dropped: key });
        }
    }
}

impl Default for ActionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::{CatalogFactory, Effect};
    use crate::actions::catalog::{AIRPLANE, EMERGENCY, POWER, REBOOT_RECOVERY, RESTART};

    struct CountingFactory {
        inner: CatalogFactory,
        calls: usize,
    }

    impl ActionFactory for CountingFactory {
        fn create(&mut self, key: MenuKey) -> Option<Action> {
            self.calls += 1;
            self.inner.create(key)
        }
    }

    fn keys(list: &[MenuKey]) -> KeyList {
        let mut keys = KeyList::new();
        for key in list {
            keys.push(*key).expect("test key list fits");
        }
        keys
    }

    fn resolved_keys(resolution: &Resolution) -> KeyList {
        resolution.actions.iter().map(Action::key).collect()
    }

    #[test]
    fn duplicates_keep_first_position() {
        let registry = ActionRegistry::new();
        let mut factory = CatalogFactory::default();

        let resolution = registry.resolve_keys(
            &[POWER, AIRPLANE, POWER, RESTART, AIRPLANE],
            MenuVariant::Root,
            &mut factory,
        );

        assert_eq!(resolved_keys(&resolution), keys(&[POWER, AIRPLANE, RESTART]));
        assert!(resolution.errors.is_empty());
    }

    #[test]
    fn disabled_and_unknown_keys_are_skipped() {
        let mut registry = ActionRegistry::new();
        registry.set_enabled(AIRPLANE, false);
        let mut factory = CountingFactory {
            inner: CatalogFactory::default(),
            calls: 0,
        };
        let bogus = MenuKey::from_static("bogus");

        let resolution =
            registry.resolve_keys(&[POWER, AIRPLANE, bogus], MenuVariant::Root, &mut factory);

        assert_eq!(resolved_keys(&resolution), keys(&[POWER]));
        assert_eq!(resolution.errors.as_slice(), &[ConfigurationError::UnknownKey(bogus)]);
        assert_eq!(factory.calls, 2, "disabled keys never reach the factory");
    }

    #[test]
    fn emergency_affordance_appends_to_root_only() {
        let mut registry = ActionRegistry::new();
        registry.set_emergency_affordance(true);
        registry.set_advanced_reboot(true);
        registry.set_keys(MenuVariant::Root, &[POWER]);
        registry.set_keys(MenuVariant::Reboot, &[RESTART, REBOOT_RECOVERY]);
        let mut factory = CatalogFactory::default();

        let root = registry.resolve(MenuVariant::Root, &mut factory);
        let reboot = registry.resolve(MenuVariant::Reboot, &mut factory);

        assert_eq!(resolved_keys(&root), keys(&[POWER, EMERGENCY]));
        assert_eq!(resolved_keys(&reboot), keys(&[RESTART, REBOOT_RECOVERY]));
    }

    #[test]
    fn emergency_is_not_appended_twice() {
        let mut registry = ActionRegistry::new();
        registry.set_emergency_affordance(true);
        let mut factory = CatalogFactory::default();

        let resolution =
            registry.resolve_keys(&[EMERGENCY, POWER], MenuVariant::Root, &mut factory);

        assert_eq!(resolved_keys(&resolution), keys(&[EMERGENCY, POWER]));
    }

    #[test]
    fn advanced_targets_follow_host_flag() {
        let mut registry = ActionRegistry::new();
        registry.set_keys(MenuVariant::Reboot, &[RESTART, REBOOT_RECOVERY, REBOOT_RECOVERY]);

        assert_eq!(registry.eligible_reboot_targets(), 0);
        assert!(!registry.is_enabled(REBOOT_RECOVERY));

        registry.set_advanced_reboot(true);
        assert_eq!(registry.eligible_reboot_targets(), 1);

        registry.set_enabled(REBOOT_RECOVERY, false);
        assert_eq!(registry.eligible_reboot_targets(), 0);
    }

    #[test]
    fn custom_factories_can_extend_the_catalog() {
        struct Extra;

        impl ActionFactory for Extra {
            fn create(&mut self, key: MenuKey) -> Option<Action> {
                (key.as_str() == "ping")
                    .then(|| Action::single_press(key, "Ping", Effect::Custom(key)))
            }
        }

        let registry = ActionRegistry::new();
        let ping = MenuKey::from_static("ping");
        let resolution = registry.resolve_keys(&[ping], MenuVariant::Root, &mut Extra);

        assert_eq!(resolution.actions.len(), 1);
        assert_eq!(resolution.actions[0].effect(), Some(Effect::Custom(ping)));
    }
}
