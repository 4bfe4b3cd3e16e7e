//! In-memory history of menu session activity.
//!
//! Records live in a fixed-size ring so a long-running host can inspect the
//! most recent session behaviour (opens, rebuilds, selections, scheduler
//! traffic) without allocating.

use core::fmt;
use core::time::Duration;

use heapless::{HistoryBuf, OldestOrdered};

use crate::actions::{MenuKey, MenuVariant, ToggleTarget};
use crate::scheduler::{CancelToken, DeferredKind};
use crate::toggle::ToggleState;

/// Identifier assigned to each record, wrapping on overflow.
pub type EventId = u32;

/// Total number of telemetry entries retained in memory.
pub const TELEMETRY_RING_CAPACITY: usize = 64;

/// Trait implemented by monotonic instant wrappers used for telemetry tracking.
pub trait TelemetryInstant: Copy {
    /// Returns the saturating duration from `earlier` to `self`.
    fn saturating_duration_since(&self, earlier: Self) -> Duration;
}

/// Discriminated telemetry events.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum MenuEventKind {
    SessionOpened(MenuVariant),
    MenuRebuilt(MenuVariant),
    SubmenuEntered(MenuVariant),
    ActionSelected,
    ActionLongPressed,
    ToggleRejected(ToggleTarget),
    ToggleExpired(ToggleTarget),
    CommandScheduled(DeferredKind),
    CommandFired(DeferredKind),
    CommandCancelled(DeferredKind),
    ConfigurationError,
    SessionClosed,
}

impl fmt::Display for MenuEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MenuEventKind::SessionOpened(variant) => write!(f, "session-opened {variant}"),
            MenuEventKind::MenuRebuilt(variant) => write!(f, "menu-rebuilt {variant}"),
            MenuEventKind::SubmenuEntered(variant) => write!(f, "submenu-entered {variant}"),
            MenuEventKind::ActionSelected => f.write_str("action-selected"),
            MenuEventKind::ActionLongPressed => f.write_str("action-long-pressed"),
            MenuEventKind::ToggleRejected(target) => {
                write!(f, "toggle-rejected {}", target.label())
            }
            MenuEventKind::ToggleExpired(target) => write!(f, "toggle-expired {}", target.label()),
            MenuEventKind::CommandScheduled(kind) => write!(f, "command-scheduled {kind}"),
            MenuEventKind::CommandFired(kind) => write!(f, "command-fired {kind}"),
            MenuEventKind::CommandCancelled(kind) => write!(f, "command-cancelled {kind}"),
            MenuEventKind::ConfigurationError => f.write_str("configuration-error"),
            MenuEventKind::SessionClosed => f.write_str("session-closed"),
        }
    }
}

/// Payloads carried alongside telemetry events.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TelemetryPayload {
    /// No additional metadata accompanies the event.
    None,
    /// Action picked from the visible list.
    Action { key: MenuKey, index: u8 },
    /// Outcome of a menu rebuild.
    Rebuild { visible: u8, errors: u8 },
    /// Toggle state at the time of the event.
    Toggle { key: MenuKey, state: ToggleState },
    /// Scheduler bookkeeping.
    Command(CommandTelemetry),
}

/// Queue command metadata payload.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct CommandTelemetry {
    pub token: CancelToken,
    pub queue_depth: u8,
    /// How far past its deadline a command fired.
    pub late_by: Option<Duration>,
}

impl CommandTelemetry {
    #[must_use]
    pub const fn new(token: CancelToken, queue_depth: u8, late_by: Option<Duration>) -> Self {
        Self {
            token,
            queue_depth,
            late_by,
        }
    }
}

/// Telemetry record stored in the ring buffer.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TelemetryRecord<TInstant>
where
    TInstant: Copy,
{
    pub id: EventId,
    pub timestamp: TInstant,
    pub event: MenuEventKind,
    pub details: TelemetryPayload,
}

/// Telemetry ring buffer type alias.
pub type TelemetryRing<TInstant, const CAPACITY: usize = TELEMETRY_RING_CAPACITY> =
    HistoryBuf<TelemetryRecord<TInstant>, CAPACITY>;

/// Records telemetry events into a fixed-size ring buffer.
pub struct TelemetryRecorder<TInstant, const CAPACITY: usize = TELEMETRY_RING_CAPACITY>
where
    TInstant: Copy,
{
    ring: TelemetryRing<TInstant, CAPACITY>,
    next_event_id: EventId,
}

impl<TInstant, const CAPACITY: usize> TelemetryRecorder<TInstant, CAPACITY>
where
    TInstant: TelemetryInstant,
{
    /// Creates a new telemetry recorder with an empty history.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ring: HistoryBuf::new(),
            next_event_id: 0,
        }
    }

    /// Returns an iterator over the recorded telemetry in chronological order.
    pub fn oldest_first(&self) -> OldestOrdered<'_, TelemetryRecord<TInstant>> {
        self.ring.oldest_ordered()
    }

    /// Returns the most recent telemetry record, if available.
    pub fn latest(&self) -> Option<&TelemetryRecord<TInstant>> {
        self.ring.recent()
    }

    pub fn len(&self) -> usize {
        self.ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    pub fn clear(&mut self) {
        self.ring.clear();
    }

    pub fn record_rebuild(
        &mut self,
        variant: MenuVariant,
        visible: usize,
        errors: usize,
        timestamp: TInstant,
    ) -> EventId {
        self.record(
            MenuEventKind::MenuRebuilt(variant),
            TelemetryPayload::Rebuild {
                visible: saturate(visible),
                errors: saturate(errors),
            },
            timestamp,
        )
    }

    pub fn record_selection(
        &mut self,
        key: MenuKey,
        index: usize,
        long_press: bool,
        timestamp: TInstant,
    ) -> EventId {
        let event = if long_press {
            MenuEventKind::ActionLongPressed
        } else {
            MenuEventKind::ActionSelected
        };
        self.record(
            event,
            TelemetryPayload::Action {
                key,
                index: saturate(index),
            },
            timestamp,
        )
    }

    pub fn record_toggle(
        &mut self,
        event: MenuEventKind,
        key: MenuKey,
        state: ToggleState,
        timestamp: TInstant,
    ) -> EventId {
        self.record(event, TelemetryPayload::Toggle { key, state }, timestamp)
    }

    pub fn record_command_scheduled(
        &mut self,
        kind: DeferredKind,
        token: CancelToken,
        queue_depth: usize,
        timestamp: TInstant,
    ) -> EventId {
        let payload = CommandTelemetry::new(token, saturate(queue_depth), None);
        self.record(
            MenuEventKind::CommandScheduled(kind),
            TelemetryPayload::Command(payload),
            timestamp,
        )
    }

    /// Records a fired command and how late it ran relative to its deadline.
    pub fn record_command_fired(
        &mut self,
        kind: DeferredKind,
        token: CancelToken,
        deadline: TInstant,
        queue_depth: usize,
        timestamp: TInstant,
    ) -> EventId {
        let late_by = timestamp.saturating_duration_since(deadline);
        let payload = CommandTelemetry::new(token, saturate(queue_depth), Some(late_by));
        self.record(
            MenuEventKind::CommandFired(kind),
            TelemetryPayload::Command(payload),
            timestamp,
        )
    }

    pub fn record_command_cancelled(
        &mut self,
        kind: DeferredKind,
        token: CancelToken,
        queue_depth: usize,
        timestamp: TInstant,
    ) -> EventId {
        let payload = CommandTelemetry::new(token, saturate(queue_depth), None);
        self.record(
            MenuEventKind::CommandCancelled(kind),
            TelemetryPayload::Command(payload),
            timestamp,
        )
    }

    /// Records an arbitrary telemetry event with the supplied payload.
    pub fn record(
        &mut self,
        event: MenuEventKind,
        payload: TelemetryPayload,
        timestamp: TInstant,
    ) -> EventId {
        let id = self.next_event_id;
        self.next_event_id = self.next_event_id.wrapping_add(1);

        self.ring.write(TelemetryRecord {
            id,
            timestamp,
            event,
            details: payload,
        });

        id
    }
}

impl<TInstant, const CAPACITY: usize> Default for TelemetryRecorder<TInstant, CAPACITY>
where
    TInstant: TelemetryInstant,
{
    fn default() -> Self {
        Self::new()
    }
}

fn saturate(value: usize) -> u8 {
    u8::try_from(value).unwrap_or(u8::MAX)
}
