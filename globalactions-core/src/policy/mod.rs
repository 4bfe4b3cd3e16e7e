//! Visibility rules deciding which resolved actions are shown.

use crate::actions::Action;

/// Host conditions the visibility policy reads.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct PolicyFlags {
    pub locked: bool,
    pub restricted_keyguard: bool,
    pub provisioned: bool,
}

impl PolicyFlags {
    #[must_use]
    pub const fn new(locked: bool, provisioned: bool) -> Self {
        Self {
            locked,
            restricted_keyguard: false,
            provisioned,
        }
    }

    #[must_use]
    pub const fn with_restricted_keyguard(mut self, restricted: bool) -> Self {
        self.restricted_keyguard = restricted;
        self
    }
}

/// Returns `true` when `action` may be shown under `flags`.
#[must_use]
pub const fn is_visible(action: &Action, flags: PolicyFlags) -> bool {
    if flags.locked && !action.show_during_keyguard() {
        return false;
    }
    if flags.locked && flags.restricted_keyguard && !action.show_during_restricted_keyguard() {
        return false;
    }
    if !flags.provisioned && !action.show_before_provisioning() {
        return false;
    }
    true
}

/// Shorthand for [`is_visible`] without a restricted keyguard.
#[must_use]
pub const fn visible(action: &Action, locked: bool, provisioned: bool) -> bool {
    is_visible(action, PolicyFlags::new(locked, provisioned))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::{Effect, MenuKey, VisibilityFlags};

    fn action(keyguard: bool, provisioning: bool) -> Action {
        Action::single_press(MenuKey::from_static("probe"), "Probe", Effect::Shutdown)
            .with_visibility(VisibilityFlags::new(keyguard, provisioning))
    }

    #[test]
    fn policy_truth_table() {
        let cases = [
            // (keyguard, provisioning, locked, provisioned, expected)
            (false, false, false, true, true),
            (false, false, true, true, false),
            (true, false, true, true, true),
            (true, false, true, false, false),
            (false, true, false, false, true),
            (true, true, true, false, true),
        ];

        for (keyguard, provisioning, locked, provisioned, expected) in cases {
            assert_eq!(
                visible(&action(keyguard, provisioning), locked, provisioned),
                expected,
                "keyguard={keyguard} provisioning={provisioning} \
                 locked={locked} provisioned={provisioned}"
            );
        }
    }

    #[test]
    fn restricted_keyguard_only_applies_when_locked() {
        let key = MenuKey::from_static("users");
        let hidden = Action::single_press(key, "Users", Effect::SwitchUser)
            .with_visibility(VisibilityFlags::new(true, false).hidden_on_restricted_keyguard());

        let locked = PolicyFlags::new(true, true).with_restricted_keyguard(true);
        let unlocked = PolicyFlags::new(false, true).with_restricted_keyguard(true);

        assert!(!is_visible(&hidden, locked));
        assert!(is_visible(&hidden, unlocked));
        assert!(is_visible(&hidden, PolicyFlags::new(true, true)));
    }
}
