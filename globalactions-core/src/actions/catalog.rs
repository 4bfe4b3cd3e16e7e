//! Built-in action keys and the default factory that turns them into actions.

use crate::actions::{
    Action, Effect, MenuKey, MenuVariant, RebootTarget, ToggleTarget, VisibilityFlags,
};
use crate::registry::ActionFactory;
use crate::toggle::{ToggleState, ToggleStateMachine, TransitionMode};

pub const POWER: MenuKey = MenuKey::from_static("power");
pub const RESTART: MenuKey = MenuKey::from_static("restart");
pub const AIRPLANE: MenuKey = MenuKey::from_static("airplane");
pub const SILENT: MenuKey = MenuKey::from_static("silent");
pub const FLASHLIGHT: MenuKey = MenuKey::from_static("flashlight");
pub const SCREENSHOT: MenuKey = MenuKey::from_static("screenshot");
pub const BUGREPORT: MenuKey = MenuKey::from_static("bugreport");
pub const LOCKDOWN: MenuKey = MenuKey::from_static("lockdown");
pub const USERS: MenuKey = MenuKey::from_static("users");
pub const SETTINGS: MenuKey = MenuKey::from_static("settings");
pub const LOGOUT: MenuKey = MenuKey::from_static("logout");
pub const EMERGENCY: MenuKey = MenuKey::from_static("emergency");
pub const SCREENRECORD: MenuKey = MenuKey::from_static("screenrecord");
pub const REBOOT_RECOVERY: MenuKey = MenuKey::from_static("reboot_recovery");
pub const REBOOT_BOOTLOADER: MenuKey = MenuKey::from_static("reboot_bootloader");
pub const REBOOT_SYSTEMUI: MenuKey = MenuKey::from_static("reboot_systemui");

/// Static description of a built-in key.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct CatalogEntry {
    pub key: MenuKey,
    pub label: &'static str,
    pub visibility: VisibilityFlags,
}

impl CatalogEntry {
    const fn new(key: MenuKey, label: &'static str, visibility: VisibilityFlags) -> Self {
        Self {
            key,
            label,
            visibility,
        }
    }
}

/// Every key the built-in factory understands.
pub const ALL_ENTRIES: [CatalogEntry; 16] = [
    CatalogEntry::new(POWER, "Power off", VisibilityFlags::new(true, true)),
    CatalogEntry::new(RESTART, "Restart", VisibilityFlags::new(true, true)),
    CatalogEntry::new(
        AIRPLANE,
        "Airplane mode",
        VisibilityFlags::new(true, false).hidden_on_restricted_keyguard(),
    ),
    CatalogEntry::new(SILENT, "Silent mode", VisibilityFlags::new(true, false)),
    CatalogEntry::new(FLASHLIGHT, "Flashlight", VisibilityFlags::new(true, false)),
    CatalogEntry::new(SCREENSHOT, "Screenshot", VisibilityFlags::new(true, false)),
    CatalogEntry::new(
        BUGREPORT,
        "Bug report",
        VisibilityFlags::new(true, false).hidden_on_restricted_keyguard(),
    ),
    CatalogEntry::new(LOCKDOWN, "Lockdown", VisibilityFlags::new(true, false)),
    CatalogEntry::new(
        USERS,
        "Switch user",
        VisibilityFlags::new(true, false).hidden_on_restricted_keyguard(),
    ),
    CatalogEntry::new(SETTINGS, "Settings", VisibilityFlags::new(false, true)),
    CatalogEntry::new(LOGOUT, "Log out", VisibilityFlags::new(false, false)),
    CatalogEntry::new(EMERGENCY, "Emergency", VisibilityFlags::new(true, true)),
    CatalogEntry::new(
        SCREENRECORD,
        "Screen record",
        VisibilityFlags::new(true, false).hidden_on_restricted_keyguard(),
    ),
    CatalogEntry::new(REBOOT_RECOVERY, "Recovery", VisibilityFlags::new(true, true)),
    CatalogEntry::new(
        REBOOT_BOOTLOADER,
        "Bootloader",
        VisibilityFlags::new(true, true),
    ),
    CatalogEntry::new(
        REBOOT_SYSTEMUI,
        "Restart system UI",
        VisibilityFlags::new(true, true),
    ),
];

/// Looks up the built-in entry for `key`.
#[must_use]
pub fn entry(key: MenuKey) -> Option<&'static CatalogEntry> {
    ALL_ENTRIES.iter().find(|candidate| candidate.key == key)
}

/// Reboot target reached by a built-in key, if any.
#[must_use]
pub fn reboot_target(key: MenuKey) -> Option<RebootTarget> {
    if key == RESTART {
        Some(RebootTarget::System)
    } else if key == REBOOT_RECOVERY {
        Some(RebootTarget::Recovery)
    } else if key == REBOOT_BOOTLOADER {
        Some(RebootTarget::Bootloader)
    } else if key == REBOOT_SYSTEMUI {
        Some(RebootTarget::SystemUi)
    } else {
        None
    }
}

/// `true` for keys gated by the advanced-reboot host flag.
#[must_use]
pub fn is_advanced_reboot(key: MenuKey) -> bool {
    reboot_target(key).is_some_and(RebootTarget::is_advanced)
}

/// Host state read once when a menu session starts.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct HostSnapshot {
    pub airplane_on: bool,
    pub silent_on: bool,
    pub torch_on: bool,
    /// Airplane changes wait for a radio confirmation when telephony exists.
    pub has_telephony: bool,
    pub torch_available: bool,
    pub bugreport_enabled: bool,
    pub screenrecord_available: bool,
    pub multi_user: bool,
}

impl Default for HostSnapshot {
    fn default() -> Self {
        Self {
            airplane_on: false,
            silent_on: false,
            torch_on: false,
            has_telephony: true,
            torch_available: true,
            bugreport_enabled: true,
            screenrecord_available: true,
            multi_user: true,
        }
    }
}

/// Factory that builds actions for the built-in catalog.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct CatalogFactory {
    snapshot: HostSnapshot,
}

impl CatalogFactory {
    #[must_use]
    pub const fn new(snapshot: HostSnapshot) -> Self {
        Self { snapshot }
    }

    #[must_use]
    pub const fn snapshot(&self) -> HostSnapshot {
        self.snapshot
    }

    /// Refreshes the host state used for subsequently built actions.
    pub fn update(&mut self, snapshot: HostSnapshot) {
        self.snapshot = snapshot;
    }

    fn toggle(
        entry: &CatalogEntry,
        target: ToggleTarget,
        on: bool,
        mode: TransitionMode,
    ) -> Action {
        Action::toggle(
            entry.key,
            entry.label,
            target,
            ToggleStateMachine::new(ToggleState::from_bool(on), mode),
        )
    }
}

impl ActionFactory for CatalogFactory {
    fn create(&mut self, key: MenuKey) -> Option<Action> {
        let entry = entry(key)?;
        let snapshot = self.snapshot;
        let safe_mode = Effect::Reboot(RebootTarget::SafeMode);

        let action = if key == POWER {
            Action::long_press(key, entry.label, Effect::Shutdown, safe_mode)
        } else if key == RESTART {
            Action::long_press(key, entry.label, Effect::Reboot(RebootTarget::System), safe_mode)
                .opening(MenuVariant::Reboot)
        } else if key == AIRPLANE {
            let mode = if snapshot.has_telephony {
                TransitionMode::AwaitConfirmation
            } else {
                TransitionMode::Immediate
            };
            Self::toggle(entry, ToggleTarget::Airplane, snapshot.airplane_on, mode)
        } else if key == SILENT {
            Self::toggle(
                entry,
                ToggleTarget::Silent,
                snapshot.silent_on,
                TransitionMode::Immediate,
            )
        } else if key == FLASHLIGHT {
            Self::toggle(
                entry,
                ToggleTarget::Torch,
                snapshot.torch_on,
                TransitionMode::Immediate,
            )
            .with_enabled(snapshot.torch_available)
        } else if key == SCREENSHOT {
            Action::single_press(key, entry.label, Effect::Screenshot)
        } else if key == BUGREPORT {
            Action::long_press(
                key,
                entry.label,
                Effect::BugReport { full: false },
                Effect::BugReport { full: true },
            )
            .with_enabled(snapshot.bugreport_enabled)
        } else if key == LOCKDOWN {
            Action::single_press(key, entry.label, Effect::Lockdown)
        } else if key == USERS {
            Action::single_press(key, entry.label, Effect::SwitchUser)
                .with_enabled(snapshot.multi_user)
        } else if key == SETTINGS {
            Action::single_press(key, entry.label, Effect::OpenSettings)
        } else if key == LOGOUT {
            Action::single_press(key, entry.label, Effect::Logout)
        } else if key == EMERGENCY {
            Action::single_press(key, entry.label, Effect::EmergencyDialer)
        } else if key == SCREENRECORD {
            Action::single_press(key, entry.label, Effect::ScreenRecord)
                .with_enabled(snapshot.screenrecord_available)
        } else {
            let target = reboot_target(key)?;
            Action::single_press(key, entry.label, Effect::Reboot(target))
        };

        Some(action.with_visibility(entry.visibility))
    }

    fn observe_toggle(&mut self, target: ToggleTarget, on: bool) {
        match target {
            ToggleTarget::Airplane => self.snapshot.airplane_on = on,
            ToggleTarget::Silent => self.snapshot.silent_on = on,
            ToggleTarget::Torch => self.snapshot.torch_on = on,
        }
    }
}
