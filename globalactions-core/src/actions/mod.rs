//! Action data structures shared by the menu controller and session.
//!
//! An [`Action`] is a single selectable entry of the global actions menu. The
//! capability sets of the menu (single press, long press, toggle) are modelled
//! as the [`ActionKind`] sum type so callers dispatch by pattern match instead
//! of walking a type hierarchy. Actions are cheap value types that are rebuilt
//! from the registry every time a menu list is derived.

use core::fmt;

use thiserror::Error;

use crate::toggle::{ToggleState, ToggleStateMachine};

pub mod catalog;

pub use catalog::{CatalogFactory, HostSnapshot};

/// Longest configuration token accepted as a [`MenuKey`].
pub const MAX_KEY_LEN: usize = 32;

/// Opaque identifier used as configuration token and de-duplication key.
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
pub struct MenuKey {
    bytes: [u8; MAX_KEY_LEN],
    len: u8,
}

/// Reasons a configuration token cannot be turned into a [`MenuKey`].
#[derive(Copy, Clone, Debug, Eq, PartialEq, Error)]
pub enum KeyError {
    #[error("menu key is empty")]
    Empty,
    #[error("menu key is {len} bytes long (limit {MAX_KEY_LEN})")]
    TooLong { len: usize },
    #[error("menu key has an unsupported character at byte {index}")]
    InvalidCharacter { index: usize },
}

impl MenuKey {
    /// Builds a key from a compile-time literal.
    ///
    /// Panics during const evaluation when the literal is empty or too long.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn from_static(text: &'static str) -> Self {
        let raw = text.as_bytes();
        assert!(
            !raw.is_empty() && raw.len() <= MAX_KEY_LEN,
            "menu key length out of range"
        );

        let mut bytes = [0u8; MAX_KEY_LEN];
        let mut index = 0;
        while index < raw.len() {
            assert!(is_key_byte(raw[index]), "menu key has unsupported byte");
            bytes[index] = raw[index];
            index += 1;
        }

        Self {
            bytes,
            len: raw.len() as u8,
        }
    }

    /// Validates and copies a runtime token.
    #[allow(clippy::cast_possible_truncation)]
    pub fn new(text: &str) -> Result<Self, KeyError> {
        let raw = text.as_bytes();
        if raw.is_empty() {
            return Err(KeyError::Empty);
        }
        if raw.len() > MAX_KEY_LEN {
            return Err(KeyError::TooLong { len: raw.len() });
        }
        if let Some(index) = raw.iter().position(|byte| !is_key_byte(*byte)) {
            return Err(KeyError::InvalidCharacter { index });
        }

        let mut bytes = [0u8; MAX_KEY_LEN];
        bytes[..raw.len()].copy_from_slice(raw);
        Ok(Self {
            bytes,
            len: raw.len() as u8,
        })
    }

    /// Returns the key as text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        // Only ASCII bytes are ever stored.
        core::str::from_utf8(&self.bytes[..usize::from(self.len)]).unwrap_or_default()
    }

    /// Length of the key in bytes.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len as usize
    }

    /// Keys are never empty; provided for API symmetry with collections.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }
}

const fn is_key_byte(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || matches!(byte, b'_' | b'-' | b'.')
}

impl fmt::Debug for MenuKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MenuKey({:?})", self.as_str())
    }
}

impl fmt::Display for MenuKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for MenuKey {
    type Error = KeyError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

/// The two mutually distinct action-list contexts.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum MenuVariant {
    Root,
    Reboot,
}

impl fmt::Display for MenuVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MenuVariant::Root => "root",
            MenuVariant::Reboot => "reboot",
        })
    }
}

/// Visibility switches consulted by [`crate::policy::is_visible`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct VisibilityFlags {
    pub show_during_keyguard: bool,
    pub show_during_restricted_keyguard: bool,
    pub show_before_provisioning: bool,
}

impl VisibilityFlags {
    /// Flags with `show_during_restricted_keyguard` left at its default (`true`).
    #[must_use]
    pub const fn new(show_during_keyguard: bool, show_before_provisioning: bool) -> Self {
        Self {
            show_during_keyguard,
            show_during_restricted_keyguard: true,
            show_before_provisioning,
        }
    }

    /// Hides the action while a restricted keyguard is showing.
    #[must_use]
    pub const fn hidden_on_restricted_keyguard(mut self) -> Self {
        self.show_during_restricted_keyguard = false;
        self
    }
}

impl Default for VisibilityFlags {
    fn default() -> Self {
        Self::new(false, false)
    }
}

/// Destination handed to the host when a reboot effect fires.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum RebootTarget {
    System,
    SafeMode,
    Recovery,
    Bootloader,
    SystemUi,
}

impl RebootTarget {
    /// Targets that only exist when the host enables advanced reboot.
    #[must_use]
    pub const fn is_advanced(self) -> bool {
        matches!(
            self,
            RebootTarget::Recovery | RebootTarget::Bootloader | RebootTarget::SystemUi
        )
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            RebootTarget::System => "system",
            RebootTarget::SafeMode => "safe-mode",
            RebootTarget::Recovery => "recovery",
            RebootTarget::Bootloader => "bootloader",
            RebootTarget::SystemUi => "system-ui",
        }
    }
}

/// Binary host settings driven by toggle actions.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ToggleTarget {
    Airplane,
    Silent,
    Torch,
}

impl ToggleTarget {
    /// Every toggle target, in slot order.
    pub const ALL: [Self; 3] = [Self::Airplane, Self::Silent, Self::Torch];

    /// Stable slot used for per-target bookkeeping tables.
    #[must_use]
    pub const fn slot(self) -> usize {
        match self {
            ToggleTarget::Airplane => 0,
            ToggleTarget::Silent => 1,
            ToggleTarget::Torch => 2,
        }
    }

    #[must_use]
    pub const fn from_slot(slot: usize) -> Option<Self> {
        match slot {
            0 => Some(ToggleTarget::Airplane),
            1 => Some(ToggleTarget::Silent),
            2 => Some(ToggleTarget::Torch),
            _ => None,
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            ToggleTarget::Airplane => "airplane",
            ToggleTarget::Silent => "silent",
            ToggleTarget::Torch => "torch",
        }
    }
}

/// Fire-and-forget request handed to [`crate::session::ActionEffects`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Effect {
    Shutdown,
    Reboot(RebootTarget),
    Screenshot,
    BugReport { full: bool },
    Lockdown,
    SwitchUser,
    OpenSettings,
    Logout,
    EmergencyDialer,
    ExitEmergencyCallbackMode,
    ScreenRecord,
    SetToggle { target: ToggleTarget, on: bool },
    Custom(MenuKey),
}

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Effect::Shutdown => f.write_str("shutdown"),
            Effect::Reboot(target) => write!(f, "reboot {}", target.label()),
            Effect::Screenshot => f.write_str("screenshot"),
            Effect::BugReport { full } => {
                f.write_str(if *full { "bugreport full" } else { "bugreport" })
            }
            Effect::Lockdown => f.write_str("lockdown"),
            Effect::SwitchUser => f.write_str("switch-user"),
            Effect::OpenSettings => f.write_str("open-settings"),
            Effect::Logout => f.write_str("logout"),
            Effect::EmergencyDialer => f.write_str("emergency-dialer"),
            Effect::ExitEmergencyCallbackMode => f.write_str("exit-ecm"),
            Effect::ScreenRecord => f.write_str("screen-record"),
            Effect::SetToggle { target, on } => {
                write!(f, "{} {}", target.label(), if *on { "on" } else { "off" })
            }
            Effect::Custom(key) => write!(f, "custom {key}"),
        }
    }
}

/// Capability set of an action.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ActionKind {
    /// Fires `effect` once.
    SinglePress { effect: Effect },
    /// Adds a secondary effect on sustained press.
    LongPress { effect: Effect, long_press: Effect },
    /// Binary setting driven through its own state machine.
    Toggle {
        target: ToggleTarget,
        machine: ToggleStateMachine,
    },
}

/// A single selectable menu entry.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Action {
    key: MenuKey,
    label: &'static str,
    visibility: VisibilityFlags,
    enabled: bool,
    kind: ActionKind,
    opens: Option<MenuVariant>,
}

impl Action {
    #[must_use]
    pub const fn single_press(key: MenuKey, label: &'static str, effect: Effect) -> Self {
        Self::with_kind(key, label, ActionKind::SinglePress { effect })
    }

    #[must_use]
    pub const fn long_press(
        key: MenuKey,
        label: &'static str,
        effect: Effect,
        long_press: Effect,
    ) -> Self {
        Self::with_kind(key, label, ActionKind::LongPress { effect, long_press })
    }

    #[must_use]
    pub const fn toggle(
        key: MenuKey,
        label: &'static str,
        target: ToggleTarget,
        machine: ToggleStateMachine,
    ) -> Self {
        Self::with_kind(key, label, ActionKind::Toggle { target, machine })
    }

    const fn with_kind(key: MenuKey, label: &'static str, kind: ActionKind) -> Self {
        Self {
            key,
            label,
            visibility: VisibilityFlags::new(false, false),
            enabled: true,
            kind,
            opens: None,
        }
    }

    /// Replaces the visibility flags.
    #[must_use]
    pub const fn with_visibility(mut self, visibility: VisibilityFlags) -> Self {
        self.visibility = visibility;
        self
    }

    /// Overrides the static enabled flag.
    #[must_use]
    pub const fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Marks the action as the entry point of another menu variant.
    #[must_use]
    pub const fn opening(mut self, variant: MenuVariant) -> Self {
        self.opens = Some(variant);
        self
    }

    #[must_use]
    pub const fn key(&self) -> MenuKey {
        self.key
    }

    #[must_use]
    pub const fn label(&self) -> &'static str {
        self.label
    }

    #[must_use]
    pub const fn visibility(&self) -> VisibilityFlags {
        self.visibility
    }

    #[must_use]
    pub const fn show_during_keyguard(&self) -> bool {
        self.visibility.show_during_keyguard
    }

    #[must_use]
    pub const fn show_during_restricted_keyguard(&self) -> bool {
        self.visibility.show_during_restricted_keyguard
    }

    #[must_use]
    pub const fn show_before_provisioning(&self) -> bool {
        self.visibility.show_before_provisioning
    }

    #[must_use]
    pub const fn kind(&self) -> &ActionKind {
        &self.kind
    }

    #[must_use]
    pub const fn opens(&self) -> Option<MenuVariant> {
        self.opens
    }

    /// Enabled predicate: toggles are disabled while a transition is in flight.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        match &self.kind {
            ActionKind::Toggle { machine, .. } => self.enabled && !machine.in_transition(),
            _ => self.enabled,
        }
    }

    #[must_use]
    pub const fn has_long_press(&self) -> bool {
        matches!(self.kind, ActionKind::LongPress { .. })
    }

    #[must_use]
    pub const fn is_toggle(&self) -> bool {
        matches!(self.kind, ActionKind::Toggle { .. })
    }

    /// `true` for plain single-press actions without a long-press effect.
    #[must_use]
    pub const fn is_single_press_only(&self) -> bool {
        matches!(self.kind, ActionKind::SinglePress { .. })
    }

    /// Primary effect for press-style actions.
    #[must_use]
    pub const fn effect(&self) -> Option<Effect> {
        match self.kind {
            ActionKind::SinglePress { effect } | ActionKind::LongPress { effect, .. } => {
                Some(effect)
            }
            ActionKind::Toggle { .. } => None,
        }
    }

    #[must_use]
    pub const fn long_press_effect(&self) -> Option<Effect> {
        match self.kind {
            ActionKind::LongPress { long_press, .. } => Some(long_press),
            _ => None,
        }
    }

    #[must_use]
    pub const fn toggle_target(&self) -> Option<ToggleTarget> {
        match self.kind {
            ActionKind::Toggle { target, .. } => Some(target),
            _ => None,
        }
    }

    #[must_use]
    pub const fn toggle_state(&self) -> Option<ToggleState> {
        match &self.kind {
            ActionKind::Toggle { machine, .. } => Some(machine.state()),
            _ => None,
        }
    }

    #[must_use]
    pub const fn toggle_machine(&self) -> Option<&ToggleStateMachine> {
        match &self.kind {
            ActionKind::Toggle { machine, .. } => Some(machine),
            _ => None,
        }
    }

    pub fn toggle_machine_mut(&mut self) -> Option<&mut ToggleStateMachine> {
        match &mut self.kind {
            ActionKind::Toggle { machine, .. } => Some(machine),
            _ => None,
        }
    }
}
