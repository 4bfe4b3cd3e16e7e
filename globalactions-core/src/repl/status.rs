//! Shared status surface for the REPL.
//!
//! [`StatusSnapshot::capture`] samples a live [`MenuSession`] so the `status`
//! command can report menu, toggle and scheduler state without reaching into
//! front-end code. [`StatusFormatter`] keeps the textual rendering consistent
//! across front-ends.

use core::fmt;
use core::ops::Add;
use core::time::Duration;

use crate::actions::{Action, MenuVariant, ToggleTarget};
use crate::policy::PolicyFlags;
use crate::registry::ActionFactory;
use crate::scheduler::DeferredKind;
use crate::session::{ActionEffects, MenuSession, SessionPhase};
use crate::telemetry::TelemetryInstant;
use crate::toggle::ToggleState;

/// Sampled state for a single toggle target.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ToggleSample {
    pub target: ToggleTarget,
    /// `None` when no resolved action drives the target.
    pub state: Option<ToggleState>,
}

/// Deferred command counts by kind.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PendingCounts {
    pub dismiss: usize,
    pub show: usize,
    pub refresh: usize,
    pub tasks: usize,
}

/// Snapshot of session state surfaced by the REPL.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StatusSnapshot {
    pub variant: MenuVariant,
    pub phase: SessionPhase,
    pub flags: PolicyFlags,
    pub visible: usize,
    pub resolved: usize,
    pub errors: usize,
    pub toggles: [ToggleSample; ToggleTarget::ALL.len()],
    pub pending: PendingCounts,
    /// Time until the next deferred command falls due.
    pub next_due: Option<Duration>,
    pub emergency_callback: bool,
}

impl StatusSnapshot {
    /// Samples `session` at `now`.
    pub fn capture<F, E, I, const CAP: usize>(session: &MenuSession<F, E, I, CAP>, now: I) -> Self
    where
        F: ActionFactory,
        E: ActionEffects,
        I: Copy + Ord + Add<Duration, Output = I> + TelemetryInstant,
    {
        let controller = session.controller();
        let toggles = ToggleTarget::ALL.map(|target| ToggleSample {
            target,
            state: controller.toggle(target).and_then(Action::toggle_state),
        });

        let mut pending = PendingCounts::default();
        for command in session.scheduler().iter() {
            match command.kind {
                DeferredKind::Dismiss => pending.dismiss += 1,
                DeferredKind::Show => pending.show += 1,
                DeferredKind::Refresh => pending.refresh += 1,
                DeferredKind::Custom(_) => pending.tasks += 1,
            }
        }

        Self {
            variant: controller.variant(),
            phase: session.phase(),
            flags: controller.flags(),
            visible: controller.visible_count(),
            resolved: controller.resolved().len(),
            errors: controller.errors().len(),
            toggles,
            pending,
            next_due: session
                .next_deadline()
                .map(|deadline| deadline.saturating_duration_since(now)),
            emergency_callback: session.emergency_callback_active(),
        }
    }
}

/// Helper that renders a [`StatusSnapshot`] into human-readable lines.
#[derive(Clone, Copy, Debug)]
pub struct StatusFormatter<'a> {
    snapshot: &'a StatusSnapshot,
}

impl<'a> StatusFormatter<'a> {
    #[must_use]
    pub const fn new(snapshot: &'a StatusSnapshot) -> Self {
        Self { snapshot }
    }

    /// Writes the menu line (e.g. `menu root phase=showing visible=3/4 errors=0`).
    pub fn write_menu_line<W: fmt::Write>(&self, writer: &mut W) -> fmt::Result {
        let phase = match self.snapshot.phase {
            SessionPhase::Closed => "closed",
            SessionPhase::Showing => "showing",
            SessionPhase::Dismissing => "dismissing",
        };
        write!(
            writer,
            "menu {} phase={phase} visible={}/{} errors={}",
            self.snapshot.variant,
            self.snapshot.visible,
            self.snapshot.resolved,
            self.snapshot.errors
        )
    }

    /// Writes the policy line, e.g.
    /// `policy locked=true restricted=false provisioned=true ecm=false`.
    pub fn write_policy_line<W: fmt::Write>(&self, writer: &mut W) -> fmt::Result {
        let flags = self.snapshot.flags;
        write!(
            writer,
            "policy locked={} restricted={} provisioned={} ecm={}",
            flags.locked,
            flags.restricted_keyguard,
            flags.provisioned,
            self.snapshot.emergency_callback
        )
    }

    /// Writes the toggle line (e.g. `toggles airplane=turning-on silent=off torch=n/a`).
    pub fn write_toggles_line<W: fmt::Write>(&self, writer: &mut W) -> fmt::Result {
        writer.write_str("toggles")?;
        for sample in &self.snapshot.toggles {
            write!(writer, " {}=", sample.target.label())?;
            match sample.state {
                Some(state) => write!(writer, "{state}")?,
                None => writer.write_str("n/a")?,
            }
        }
        Ok(())
    }

    /// Writes the scheduler line (e.g. `pending dismiss=1 show=1 refresh=0 tasks=0 next=+300ms`).
    pub fn write_pending_line<W: fmt::Write>(&self, writer: &mut W) -> fmt::Result {
        let pending = self.snapshot.pending;
        write!(
            writer,
            "pending dismiss={} show={} refresh={} tasks={} next=",
            pending.dismiss, pending.show, pending.refresh, pending.tasks
        )?;
        write_duration(writer, self.snapshot.next_due)
    }
}

/// Renders `+1.2s`, `+300ms`, `+40us`, or `n/a`.
pub fn write_duration<W: fmt::Write>(writer: &mut W, duration: Option<Duration>) -> fmt::Result {
    match duration {
        None => writer.write_str("n/a"),
        Some(value) if value >= Duration::from_secs(1) => {
            let millis = value.as_millis();
            let seconds = millis / 1_000;
            let tenths = (millis % 1_000) / 100;
            write!(writer, "+{seconds}.{tenths}s")
        }
        Some(value) if value >= Duration::from_millis(1) => {
            write!(writer, "+{}ms", value.as_millis())
        }
        Some(value) => write!(writer, "+{}us", value.as_micros()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use heapless::String;

    fn snapshot() -> StatusSnapshot {
        StatusSnapshot {
            variant: MenuVariant::Root,
            phase: SessionPhase::Dismissing,
            flags: PolicyFlags::new(true, true),
            visible: 3,
            resolved: 4,
            errors: 1,
            toggles: [
                ToggleSample {
                    target: ToggleTarget::Airplane,
                    state: Some(ToggleState::TurningOn),
                },
                ToggleSample {
                    target: ToggleTarget::Silent,
                    state: Some(ToggleState::Off),
                },
                ToggleSample {
                    target: ToggleTarget::Torch,
                    state: None,
                },
            ],
            pending: PendingCounts {
                dismiss: 1,
                show: 0,
                refresh: 0,
                tasks: 1,
            },
            next_due: Some(Duration::from_millis(1_250)),
            emergency_callback: false,
        }
    }

    #[test]
    fn renders_each_line() {
        let snapshot = snapshot();
        let formatter = StatusFormatter::new(&snapshot);

        let mut line: String<96> = String::new();
        formatter.write_menu_line(&mut line).expect("menu line");
        assert_eq!(line.as_str(), "menu root phase=dismissing visible=3/4 errors=1");

        line.clear();
        formatter.write_policy_line(&mut line).expect("policy line");
        assert_eq!(
            line.as_str(),
            "policy locked=true restricted=false provisioned=true ecm=false"
        );

        line.clear();
        formatter.write_toggles_line(&mut line).expect("toggle line");
        assert_eq!(line.as_str(), "toggles airplane=turning-on silent=off torch=n/a");

        line.clear();
        formatter.write_pending_line(&mut line).expect("pending line");
        assert_eq!(line.as_str(), "pending dismiss=1 show=0 refresh=0 tasks=1 next=+1.2s");
    }

    #[test]
    fn durations_pick_a_readable_unit() {
        let mut out: String<16> = String::new();
        write_duration(&mut out, Some(Duration::from_micros(40))).expect("write");
        out.push(' ').expect("room");
        write_duration(&mut out, Some(Duration::from_millis(300))).expect("write");
        out.push(' ').expect("room");
        write_duration(&mut out, None).expect("write");
        assert_eq!(out.as_str(), "+40us +300ms n/a");
    }
}
