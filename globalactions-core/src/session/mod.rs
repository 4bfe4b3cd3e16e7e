//! Per-invocation menu session.
//!
//! A [`MenuSession`] owns the controller, the deferred scheduler and the effect
//! sink. Every mutation runs on the caller's context: host notifications are
//! queued in an [`EventInbox`] and applied by [`MenuSession::drain_events`],
//! while follow-up work (dismiss, re-show, refresh, debounced host calls,
//! toggle confirmation timeouts) is scheduled and later executed from
//! [`MenuSession::advance`]. Nothing here blocks.

use core::ops::Add;
use core::time::Duration;

use heapless::{Deque, Vec};
use thiserror::Error;

use crate::actions::{Action, Effect, MenuKey, MenuVariant, ToggleTarget};
use crate::config::MenuConfig;
use crate::menu::{MenuController, MenuError};
use crate::policy::PolicyFlags;
use crate::registry::ActionFactory;
use crate::scheduler::{
    CancelToken, DEFAULT_CAPACITY, DeferredCommand, DeferredKind, DeferredScheduler, ScheduleError,
};
use crate::telemetry::{MenuEventKind, TelemetryInstant, TelemetryPayload, TelemetryRecorder};
use crate::toggle::{
    ToggleError, TogglePress, ToggleState, ToggleStateMachine, TransitionMode,
};

/// Host sink for fire-and-forget effects.
pub trait ActionEffects {
    fn perform(&mut self, effect: Effect);
}

/// Delays applied to the follow-up work a session schedules.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct SessionTiming {
    pub dismiss_delay: Duration,
    /// Gap between a dismiss and the re-show of the next menu variant.
    pub reopen_delay: Duration,
    /// Lets the menu leave the screen before a capture.
    pub screenshot_delay: Duration,
    pub torch_debounce: Duration,
    pub refresh_delay: Duration,
    /// How long a toggle may wait for host confirmation; `None` waits forever.
    pub toggle_timeout: Option<Duration>,
}

impl Default for SessionTiming {
    fn default() -> Self {
        Self {
            dismiss_delay: Duration::ZERO,
            reopen_delay: Duration::from_millis(300),
            screenshot_delay: Duration::from_millis(500),
            torch_debounce: Duration::from_millis(150),
            refresh_delay: Duration::ZERO,
            toggle_timeout: Some(Duration::from_secs(10)),
        }
    }
}

/// Notifications pushed by the host platform.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum HostEvent {
    LockChanged(bool),
    RestrictedKeyguardChanged(bool),
    ProvisioningChanged(bool),
    /// Radio service state settled; `airplane` reflects radio power off.
    ServiceStateChanged { airplane: bool },
    AirplaneModeChanged(bool),
    RingerModeChanged { silent: bool },
    TorchChanged(bool),
    EmergencyCallbackModeChanged(bool),
    EmergencyAffordanceChanged(bool),
}

/// Bounded queue marshalling host notifications onto the session context.
pub struct EventInbox<const N: usize> {
    queue: Deque<HostEvent, N>,
}

impl<const N: usize> EventInbox<N> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            queue: Deque::new(),
        }
    }

    /// Queues `event`, handing it back when the inbox is full.
    pub fn push(&mut self, event: HostEvent) -> Result<(), HostEvent> {
        self.queue.push_back(event)
    }

    pub fn pop(&mut self) -> Option<HostEvent> {
        self.queue.pop_front()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

impl<const N: usize> Default for EventInbox<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Observable results of [`MenuSession::advance`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SessionEvent {
    Dismissed,
    Shown(MenuVariant),
    Refreshed,
    ToggleTimedOut(MenuKey),
}

/// Events produced by one [`MenuSession::advance`] call.
pub type SessionEvents = Vec<SessionEvent, DEFAULT_CAPACITY>;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SessionPhase {
    Closed,
    Showing,
    Dismissing,
}

/// What a selection did.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SelectOutcome {
    /// Effect handed to the sink right away.
    Performed(Effect),
    /// Effect scheduled behind a debounce or settle delay.
    Deferred(Effect),
    Toggled {
        target: ToggleTarget,
        press: TogglePress,
    },
    /// Reboot submenu entered; it shows once the dismiss completes.
    SubmenuPending,
    ExitedEmergencyCallback,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Error)]
pub enum SessionError {
    #[error(transparent)]
    Menu(#[from] MenuError),
    #[error(transparent)]
    Toggle(#[from] ToggleError),
    #[error(transparent)]
    Schedule(#[from] ScheduleError),
    #[error("menu is not showing")]
    NotShowing,
    #[error("`{key}` is disabled")]
    ActionDisabled { key: MenuKey },
    #[error("`{key}` has no long-press action")]
    NoLongPress { key: MenuKey },
}

/// Session-owned follow-up work carried in [`DeferredKind::Custom`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SessionTask {
    Screenshot,
    TorchApply,
    ToggleTimeout(ToggleTarget),
}

impl SessionTask {
    const SCREENSHOT_CODE: u16 = 0x0100;
    const TORCH_APPLY_CODE: u16 = 0x0101;
    const TOGGLE_TIMEOUT_BASE: u16 = 0x0200;

    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn to_raw(self) -> u16 {
        match self {
            SessionTask::Screenshot => Self::SCREENSHOT_CODE,
            SessionTask::TorchApply => Self::TORCH_APPLY_CODE,
            SessionTask::ToggleTimeout(target) => Self::TOGGLE_TIMEOUT_BASE + target.slot() as u16,
        }
    }

    #[must_use]
    pub const fn from_raw(code: u16) -> Option<Self> {
        match code {
            Self::SCREENSHOT_CODE => Some(SessionTask::Screenshot),
            Self::TORCH_APPLY_CODE => Some(SessionTask::TorchApply),
            code if code >= Self::TOGGLE_TIMEOUT_BASE => {
                match ToggleTarget::from_slot((code - Self::TOGGLE_TIMEOUT_BASE) as usize) {
                    Some(target) => Some(SessionTask::ToggleTimeout(target)),
                    None => None,
                }
            }
            _ => None,
        }
    }

    #[must_use]
    pub const fn kind(self) -> DeferredKind {
        DeferredKind::Custom(self.to_raw())
    }
}

/// Ties controller, scheduler and effect sink together for one menu invocation.
pub struct MenuSession<F, E, I, const CAPACITY: usize = DEFAULT_CAPACITY>
where
    I: Copy,
{
    controller: MenuController<F>,
    scheduler: DeferredScheduler<I, CAPACITY>,
    effects: E,
    timing: SessionTiming,
    phase: SessionPhase,
    ecm_active: bool,
    pending_screenshot: Option<CancelToken>,
    pending_torch: Option<(CancelToken, bool)>,
    toggle_timeouts: [Option<CancelToken>; ToggleTarget::ALL.len()],
    /// Unconfirmed toggle transitions, kept across invocations until settled.
    transitions: [Option<(MenuKey, ToggleState)>; ToggleTarget::ALL.len()],
    telemetry: TelemetryRecorder<I>,
}

impl<F, E, I, const CAPACITY: usize> MenuSession<F, E, I, CAPACITY>
where
    F: ActionFactory,
    E: ActionEffects,
    I: Copy + Ord + Add<Duration, Output = I> + TelemetryInstant,
{
    #[must_use]
    pub fn new(controller: MenuController<F>, effects: E, timing: SessionTiming) -> Self {
        Self {
            controller,
            scheduler: DeferredScheduler::new(),
            effects,
            timing,
            phase: SessionPhase::Closed,
            ecm_active: false,
            pending_screenshot: None,
            pending_torch: None,
            toggle_timeouts: [None; ToggleTarget::ALL.len()],
            transitions: [None; ToggleTarget::ALL.len()],
            telemetry: TelemetryRecorder::new(),
        }
    }

    /// Opens the Root menu.
    ///
    /// Dismiss, re-show and refresh work left by a prior invocation is dropped.
    /// Debounced host calls and toggle timeouts stay armed, and toggles still
    /// waiting for the host reopen in their intermediate state.
    pub fn open(&mut self, flags: PolicyFlags, now: I) {
        for kind in [DeferredKind::Dismiss, DeferredKind::Show, DeferredKind::Refresh] {
            let cancelled = self.scheduler.cancel_kind(kind);
            if cancelled > 0 {
                log::debug!("open dropped {cancelled} pending {kind}");
            }
        }

        self.controller.open_with(flags);
        self.restore_transitions();
        self.phase = SessionPhase::Showing;
        log::info!(
            "menu opened (locked={}, restricted={}, provisioned={}): {} visible",
            flags.locked,
            flags.restricted_keyguard,
            flags.provisioned,
            self.controller.visible_count()
        );
        self.telemetry.record(
            MenuEventKind::SessionOpened(MenuVariant::Root),
            TelemetryPayload::None,
            now,
        );
        self.note_rebuild(now);
    }

    /// Runs the visible action at `index`.
    pub fn select(&mut self, index: usize, now: I) -> Result<SelectOutcome, SessionError> {
        self.ensure_showing()?;
        let action = *self.controller.visible_at(index)?;
        let key = action.key();

        let in_transition = action
            .toggle_state()
            .is_some_and(ToggleState::in_transition);
        if !action.is_enabled() && !in_transition {
            return Err(SessionError::ActionDisabled { key });
        }
        self.telemetry.record_selection(key, index, false, now);

        let outcome = if let Some(target) = action.toggle_target() {
            self.press_toggle(&action, target, now)?
        } else if action.opens() == Some(MenuVariant::Reboot)
            && self.controller.can_enter_reboot_submenu()
        {
            return self.open_reboot_submenu(now);
        } else {
            match action.effect() {
                Some(Effect::Screenshot) => self.schedule_screenshot(now)?,
                Some(effect) => {
                    self.effects.perform(effect);
                    SelectOutcome::Performed(effect)
                }
                None => return Err(SessionError::ActionDisabled { key }),
            }
        };

        self.begin_dismiss(now)?;
        Ok(outcome)
    }

    /// Runs the long-press effect of the visible action at `index`.
    pub fn long_press(&mut self, index: usize, now: I) -> Result<Effect, SessionError> {
        self.ensure_showing()?;
        let action = *self.controller.visible_at(index)?;
        let key = action.key();

        let effect = action
            .long_press_effect()
            .ok_or(SessionError::NoLongPress { key })?;
        if !action.is_enabled() {
            return Err(SessionError::ActionDisabled { key });
        }

        self.telemetry.record_selection(key, index, true, now);
        self.effects.perform(effect);
        self.begin_dismiss(now)?;
        Ok(effect)
    }

    /// Fires the lone visible action when the controller reports one.
    pub fn fire_immediate(&mut self, now: I) -> Result<Option<SelectOutcome>, SessionError> {
        if self.controller.immediate_action().is_none() {
            return Ok(None);
        }
        self.select(0, now).map(Some)
    }

    /// Starts dismissing the menu.
    pub fn request_dismiss(&mut self, now: I) -> Result<CancelToken, SessionError> {
        self.ensure_showing()?;
        self.begin_dismiss(now)
    }

    /// Executes every command due at `now`.
    pub fn advance(&mut self, now: I) -> SessionEvents {
        let mut events = SessionEvents::new();

        while !events.is_full() {
            let Some(command) = self.scheduler.poll(now) else {
                break;
            };
            self.telemetry.record_command_fired(
                command.kind,
                command.token,
                command.fire_at,
                self.scheduler.len(),
                now,
            );
            if let Some(event) = self.run(command, now) {
                // Bounded by the loop condition.
                let _ = events.push(event);
            }
        }

        events
    }

    /// Applies a host notification.
    pub fn handle_event(&mut self, event: HostEvent, now: I) {
        log::debug!("host event {event:?}");
        match event {
            HostEvent::LockChanged(locked) => {
                self.controller.on_lock_state_changed(locked);
                self.note_rebuild(now);
            }
            HostEvent::RestrictedKeyguardChanged(restricted) => {
                self.controller.on_restricted_keyguard_changed(restricted);
                self.note_rebuild(now);
            }
            HostEvent::ProvisioningChanged(provisioned) => {
                self.controller.on_provisioning_changed(provisioned);
                self.note_rebuild(now);
            }
            HostEvent::ServiceStateChanged { airplane }
            | HostEvent::AirplaneModeChanged(airplane) => {
                self.confirm_toggle(ToggleTarget::Airplane, airplane, now);
            }
            HostEvent::RingerModeChanged { silent } => {
                self.confirm_toggle(ToggleTarget::Silent, silent, now);
            }
            HostEvent::TorchChanged(on) => {
                self.confirm_toggle(ToggleTarget::Torch, on, now);
            }
            HostEvent::EmergencyCallbackModeChanged(active) => {
                self.ecm_active = active;
                self.request_refresh(now);
            }
            HostEvent::EmergencyAffordanceChanged(needed) => {
                self.controller.on_emergency_affordance_changed(needed);
                self.note_rebuild(now);
            }
        }
    }

    /// Applies every queued host notification in arrival order.
    pub fn drain_events<const N: usize>(&mut self, inbox: &mut EventInbox<N>, now: I) -> usize {
        let mut applied = 0;
        while let Some(event) = inbox.pop() {
            self.handle_event(event, now);
            applied += 1;
        }
        applied
    }

    /// Re-reads host configuration and rebuilds the current variant.
    pub fn settings_changed(&mut self, config: &MenuConfig, now: I) {
        self.controller.on_configuration_changed(config);
        self.note_rebuild(now);
    }

    #[must_use]
    pub const fn phase(&self) -> SessionPhase {
        self.phase
    }

    #[must_use]
    pub const fn controller(&self) -> &MenuController<F> {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut MenuController<F> {
        &mut self.controller
    }

    #[must_use]
    pub const fn scheduler(&self) -> &DeferredScheduler<I, CAPACITY> {
        &self.scheduler
    }

    #[must_use]
    pub const fn effects(&self) -> &E {
        &self.effects
    }

    pub fn effects_mut(&mut self) -> &mut E {
        &mut self.effects
    }

    #[must_use]
    pub const fn telemetry(&self) -> &TelemetryRecorder<I> {
        &self.telemetry
    }

    #[must_use]
    pub const fn timing(&self) -> SessionTiming {
        self.timing
    }

    pub fn set_timing(&mut self, timing: SessionTiming) {
        self.timing = timing;
    }

    #[must_use]
    pub const fn emergency_callback_active(&self) -> bool {
        self.ecm_active
    }

    /// Deadline of the next scheduled command, for hosts driving a timer.
    #[must_use]
    pub fn next_deadline(&self) -> Option<I> {
        self.scheduler.next_deadline()
    }

    fn ensure_showing(&self) -> Result<(), SessionError> {
        match self.phase {
            SessionPhase::Showing => Ok(()),
            SessionPhase::Closed | SessionPhase::Dismissing => Err(SessionError::NotShowing),
        }
    }

    fn press_toggle(
        &mut self,
        action: &Action,
        target: ToggleTarget,
        now: I,
    ) -> Result<SelectOutcome, SessionError> {
        let key = action.key();

        if target == ToggleTarget::Airplane && self.ecm_active {
            self.effects.perform(Effect::ExitEmergencyCallbackMode);
            return Ok(SelectOutcome::ExitedEmergencyCallback);
        }

        let Some(machine) = self
            .controller
            .action_mut(key)
            .and_then(Action::toggle_machine_mut)
        else {
            return Err(SessionError::ActionDisabled { key });
        };

        let mut requested = None;
        let press = match machine.press(|on| requested = Some(on)) {
            Ok(press) => press,
            Err(error) => {
                let ToggleError::InvalidTransition { state } = error;
                self.telemetry
                    .record_toggle(MenuEventKind::ToggleRejected(target), key, state, now);
                return Err(error.into());
            }
        };

        let on = requested.unwrap_or(press.desired);
        if target == ToggleTarget::Torch {
            if let Some((token, _)) = self.pending_torch.take() {
                self.cancel(token, now);
            }
            let token = self.schedule(
                SessionTask::TorchApply.kind(),
                now,
                self.timing.torch_debounce,
            )?;
            self.pending_torch = Some((token, on));
        } else {
            self.effects.perform(Effect::SetToggle { target, on });
        }

        if press.awaiting_confirmation {
            self.transitions[target.slot()] = Some((key, press.state));
            if let Some(timeout) = self.timing.toggle_timeout {
                if let Some(previous) = self.toggle_timeouts[target.slot()].take() {
                    self.cancel(previous, now);
                }
                let kind = SessionTask::ToggleTimeout(target).kind();
                let token = self.schedule(kind, now, timeout)?;
                self.toggle_timeouts[target.slot()] = Some(token);
            }
        } else {
            self.controller.factory_mut().observe_toggle(target, on);
        }

        Ok(SelectOutcome::Toggled { target, press })
    }

    fn open_reboot_submenu(&mut self, now: I) -> Result<SelectOutcome, SessionError> {
        self.controller.enter_reboot_submenu()?;
        self.telemetry.record(
            MenuEventKind::SubmenuEntered(MenuVariant::Reboot),
            TelemetryPayload::None,
            now,
        );
        self.note_rebuild(now);

        let dismiss = self.timing.dismiss_delay;
        self.schedule(DeferredKind::Dismiss, now, dismiss)?;
        self.schedule(DeferredKind::Show, now, dismiss + self.timing.reopen_delay)?;
        self.phase = SessionPhase::Dismissing;
        Ok(SelectOutcome::SubmenuPending)
    }

    fn schedule_screenshot(&mut self, now: I) -> Result<SelectOutcome, SessionError> {
        if let Some(previous) = self.pending_screenshot.take() {
            self.cancel(previous, now);
        }
        let token = self.schedule(
            SessionTask::Screenshot.kind(),
            now,
            self.timing.screenshot_delay,
        )?;
        self.pending_screenshot = Some(token);
        Ok(SelectOutcome::Deferred(Effect::Screenshot))
    }

    fn begin_dismiss(&mut self, now: I) -> Result<CancelToken, SessionError> {
        let token = self.schedule(DeferredKind::Dismiss, now, self.timing.dismiss_delay)?;
        self.phase = SessionPhase::Dismissing;
        Ok(token)
    }

    fn confirm_toggle(&mut self, target: ToggleTarget, on: bool, now: I) {
        self.transitions[target.slot()] = None;
        self.controller.factory_mut().observe_toggle(target, on);
        if let Some(machine) = self
            .controller
            .toggle_mut(target)
            .and_then(Action::toggle_machine_mut)
        {
            machine.confirm(on);
        }
        if let Some(token) = self.toggle_timeouts[target.slot()].take() {
            self.cancel(token, now);
        }
        self.request_refresh(now);
    }

    /// Schedules a refresh, rebuilding on the spot when the queue has no room.
    fn request_refresh(&mut self, now: I) {
        if let Err(error) = self.schedule(DeferredKind::Refresh, now, self.timing.refresh_delay) {
            log::warn!("refresh not scheduled ({error}); rebuilding now");
            self.controller.rebuild();
            self.note_rebuild(now);
        }
    }

    /// Re-applies unconfirmed toggle states to a freshly opened menu.
    fn restore_transitions(&mut self) {
        for target in ToggleTarget::ALL {
            let Some((_, state)) = self.transitions[target.slot()] else {
                continue;
            };
            if let Some(machine) = self
                .controller
                .toggle_mut(target)
                .and_then(Action::toggle_machine_mut)
            {
                machine.set_state(state);
            }
        }
    }

    fn run(&mut self, command: DeferredCommand<I>, now: I) -> Option<SessionEvent> {
        match command.kind {
            DeferredKind::Dismiss => {
                self.phase = SessionPhase::Closed;
                self.telemetry
                    .record(MenuEventKind::SessionClosed, TelemetryPayload::None, now);
                Some(SessionEvent::Dismissed)
            }
            DeferredKind::Show => {
                self.phase = SessionPhase::Showing;
                Some(SessionEvent::Shown(self.controller.variant()))
            }
            DeferredKind::Refresh => {
                self.controller.rebuild();
                self.note_rebuild(now);
                Some(SessionEvent::Refreshed)
            }
            DeferredKind::Custom(code) => match SessionTask::from_raw(code) {
                Some(task) => self.run_task(task, command.token, now),
                None => {
                    log::warn!("ignoring unknown deferred task {code:#06x}");
                    None
                }
            },
        }
    }

    fn run_task(&mut self, task: SessionTask, token: CancelToken, now: I) -> Option<SessionEvent> {
        match task {
            SessionTask::Screenshot => {
                if self.pending_screenshot == Some(token) {
                    self.pending_screenshot = None;
                }
                self.effects.perform(Effect::Screenshot);
                None
            }
            SessionTask::TorchApply => {
                if let Some((pending, on)) = self.pending_torch
                    && pending == token
                {
                    self.pending_torch = None;
                    self.effects.perform(Effect::SetToggle {
                        target: ToggleTarget::Torch,
                        on,
                    });
                }
                None
            }
            SessionTask::ToggleTimeout(target) => {
                if self.toggle_timeouts[target.slot()] == Some(token) {
                    self.toggle_timeouts[target.slot()] = None;
                }
                let (key, state) = self.transitions[target.slot()].take()?;
                let restored = match self
                    .controller
                    .toggle_mut(target)
                    .and_then(Action::toggle_machine_mut)
                {
                    Some(machine) => machine.expire(),
                    None => {
                        ToggleStateMachine::new(state, TransitionMode::AwaitConfirmation).expire()
                    }
                }?;
                log::warn!("{key} confirmation timed out; back to {restored}");
                self.telemetry
                    .record_toggle(MenuEventKind::ToggleExpired(target), key, restored, now);
                Some(SessionEvent::ToggleTimedOut(key))
            }
        }
    }

    fn schedule(
        &mut self,
        kind: DeferredKind,
        now: I,
        delay: Duration,
    ) -> Result<CancelToken, SessionError> {
        let token = self.scheduler.schedule(kind, now, delay)?;
        self.telemetry
            .record_command_scheduled(kind, token, self.scheduler.len(), now);
        Ok(token)
    }

    fn cancel(&mut self, token: CancelToken, now: I) {
        let kind = self
            .scheduler
            .iter()
            .find(|command| command.token == token)
            .map(|command| command.kind);
        if let Some(kind) = kind {
            self.scheduler.cancel(token);
            self.telemetry
                .record_command_cancelled(kind, token, self.scheduler.len(), now);
        }
    }

    fn note_rebuild(&mut self, now: I) {
        let errors = self.controller.errors().len();
        self.telemetry.record_rebuild(
            self.controller.variant(),
            self.controller.visible_count(),
            errors,
            now,
        );
        if errors > 0 {
            self.telemetry.record(
                MenuEventKind::ConfigurationError,
                TelemetryPayload::None,
                now,
            );
        }
    }
}
