//! Single-threaded delayed command queue with cancel tokens.
//!
//! The scheduler never runs anything on its own: the owner calls
//! [`DeferredScheduler::poll`] with the current instant and handles each
//! command it returns. Commands of the same kind are independent of each
//! other; replacing an earlier request is always an explicit
//! [`DeferredScheduler::cancel`].

use core::fmt;
use core::ops::Add;
use core::time::Duration;

use heapless::Vec;
use thiserror::Error;

/// Default number of commands that may be outstanding at once.
pub const DEFAULT_CAPACITY: usize = 16;

/// What a deferred command asks its owner to do.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum DeferredKind {
    Dismiss,
    Refresh,
    Show,
    /// Owner-defined follow-up, identified by a free-form code.
    Custom(u16),
}

impl fmt::Display for DeferredKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeferredKind::Dismiss => f.write_str("dismiss"),
            DeferredKind::Refresh => f.write_str("refresh"),
            DeferredKind::Show => f.write_str("show"),
            DeferredKind::Custom(code) => write!(f, "custom({code:#06x})"),
        }
    }
}

/// Handle returned by [`DeferredScheduler::schedule`].
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct CancelToken(u32);

impl CancelToken {
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

/// A scheduled unit of delayed work.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct DeferredCommand<I> {
    pub kind: DeferredKind,
    pub token: CancelToken,
    pub fire_at: I,
    pub delay: Duration,
    seq: u32,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Error)]
pub enum ScheduleError {
    #[error("deferred queue is full; {kind} not scheduled")]
    QueueFull { kind: DeferredKind },
}

/// Bounded queue of [`DeferredCommand`]s ordered by deadline.
pub struct DeferredScheduler<I, const CAPACITY: usize = DEFAULT_CAPACITY> {
    pending: Vec<DeferredCommand<I>, CAPACITY>,
    next_token: u32,
    next_seq: u32,
}

impl<I, const CAPACITY: usize> DeferredScheduler<I, CAPACITY>
where
    I: Copy + Ord + Add<Duration, Output = I>,
{
    #[must_use]
    pub const fn new() -> Self {
        Self {
            pending: Vec::new(),
            next_token: 0,
            next_seq: 0,
        }
    }

    /// Queues `kind` to fire once `now + delay` has been reached.
    pub fn schedule(
        &mut self,
        kind: DeferredKind,
        now: I,
        delay: Duration,
    ) -> Result<CancelToken, ScheduleError> {
        let token = CancelToken(self.next_token);
        let command = DeferredCommand {
            kind,
            token,
            fire_at: now + delay,
            delay,
            seq: self.next_seq,
        };

        self.pending
            .push(command)
            .map_err(|_| ScheduleError::QueueFull { kind })?;

        self.next_token = self.next_token.wrapping_add(1);
        self.next_seq = self.next_seq.wrapping_add(1);
        log::trace!("scheduled {kind} as token {}", token.0);
        Ok(token)
    }

    /// Removes the command carrying `token`.
    ///
    /// Returns `false` when the command already fired or was cancelled before.
    pub fn cancel(&mut self, token: CancelToken) -> bool {
        match self.pending.iter().position(|command| command.token == token) {
            Some(index) => {
                self.pending.remove(index);
                log::trace!("cancelled token {}", token.0);
                true
            }
            None => false,
        }
    }

    /// Cancels every pending command of `kind`, returning how many were dropped.
    pub fn cancel_kind(&mut self, kind: DeferredKind) -> usize {
        let before = self.pending.len();
        self.pending.retain(|command| command.kind != kind);
        before - self.pending.len()
    }

    /// Pops the earliest command whose deadline is at or before `now`.
    ///
    /// Commands sharing a deadline come out in the order they were scheduled.
    pub fn poll(&mut self, now: I) -> Option<DeferredCommand<I>> {
        let index = self.earliest(|command| command.fire_at <= now)?;
        Some(self.pending.remove(index))
    }

    /// Pops the earliest pending command of `kind` regardless of its deadline.
    pub fn fire_now(&mut self, kind: DeferredKind) -> Option<DeferredCommand<I>> {
        let index = self.earliest(|command| command.kind == kind)?;
        Some(self.pending.remove(index))
    }

    /// Deadline of the next command to become due.
    #[must_use]
    pub fn next_deadline(&self) -> Option<I> {
        self.pending.iter().map(|command| command.fire_at).min()
    }

    #[must_use]
    pub fn is_pending(&self, token: CancelToken) -> bool {
        self.pending.iter().any(|command| command.token == token)
    }

    /// Number of pending commands of `kind`.
    #[must_use]
    pub fn pending(&self, kind: DeferredKind) -> usize {
        self.pending
            .iter()
            .filter(|command| command.kind == kind)
            .count()
    }

    /// Iterates pending commands in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &DeferredCommand<I>> {
        self.pending.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }

    fn earliest<P>(&self, mut predicate: P) -> Option<usize>
    where
        P: FnMut(&DeferredCommand<I>) -> bool,
    {
        self.pending
            .iter()
            .enumerate()
            .filter(|(_, command)| predicate(command))
            .min_by_key(|(_, command)| (command.fire_at, command.seq))
            .map(|(index, _)| index)
    }
}

impl<I, const CAPACITY: usize> Default for DeferredScheduler<I, CAPACITY>
where
    I: Copy + Ord + Add<Duration, Output = I>,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd)]
    struct MockInstant(u64);

    impl Add<Duration> for MockInstant {
        type Output = Self;

        fn add(self, rhs: Duration) -> Self::Output {
            let micros = u64::try_from(rhs.as_micros()).unwrap_or(u64::MAX);
            MockInstant(self.0.saturating_add(micros))
        }
    }

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    #[test]
    fn poll_respects_deadlines_and_order() {
        let mut scheduler = DeferredScheduler::<MockInstant, 4>::new();
        let now = MockInstant(0);

        scheduler
            .schedule(DeferredKind::Show, now, ms(300))
            .expect("schedule show");
        scheduler
            .schedule(DeferredKind::Dismiss, now, ms(0))
            .expect("schedule dismiss");

        let first = scheduler.poll(now).expect("dismiss due");
        assert_eq!(first.kind, DeferredKind::Dismiss);
        assert!(scheduler.poll(MockInstant(299_000)).is_none());

        let second = scheduler.poll(MockInstant(300_000)).expect("show due");
        assert_eq!(second.kind, DeferredKind::Show);
        assert!(scheduler.is_empty());
    }

    #[test]
    fn same_kind_commands_do_not_cancel_each_other() {
        let mut scheduler = DeferredScheduler::<MockInstant, 4>::new();
        let now = MockInstant(0);

        let first = scheduler
            .schedule(DeferredKind::Refresh, now, ms(10))
            .expect("first refresh");
        let second = scheduler
            .schedule(DeferredKind::Refresh, now, ms(10))
            .expect("second refresh");

        assert_eq!(scheduler.pending(DeferredKind::Refresh), 2);

        let due = MockInstant(10_000);
        assert_eq!(scheduler.poll(due).map(|command| command.token), Some(first));
        assert_eq!(scheduler.poll(due).map(|command| command.token), Some(second));
    }

    #[test]
    fn cancel_is_idempotent() {
        let mut scheduler = DeferredScheduler::<MockInstant, 4>::new();
        let token = scheduler
            .schedule(DeferredKind::Dismiss, MockInstant(0), ms(0))
            .expect("schedule");

        assert!(scheduler.cancel(token));
        assert!(!scheduler.cancel(token));

        let fired = scheduler
            .schedule(DeferredKind::Dismiss, MockInstant(0), ms(0))
            .expect("schedule");
        assert!(scheduler.poll(MockInstant(0)).is_some());
        assert!(!scheduler.cancel(fired));
    }

    #[test]
    fn fire_now_ignores_deadline() {
        let mut scheduler = DeferredScheduler::<MockInstant, 4>::new();
        scheduler
            .schedule(DeferredKind::Show, MockInstant(0), ms(5_000))
            .expect("schedule");

        let command = scheduler.fire_now(DeferredKind::Show).expect("forced");
        assert_eq!(command.delay, ms(5_000));
        assert!(scheduler.fire_now(DeferredKind::Show).is_none());
    }

    #[test]
    fn full_queue_reports_kind() {
        let mut scheduler = DeferredScheduler::<MockInstant, 1>::new();
        scheduler
            .schedule(DeferredKind::Dismiss, MockInstant(0), ms(0))
            .expect("first fits");

        let result = scheduler.schedule(DeferredKind::Custom(7), MockInstant(0), ms(0));
        assert_eq!(
            result,
            Err(ScheduleError::QueueFull {
                kind: DeferredKind::Custom(7)
            })
        );
        assert_eq!(scheduler.next_deadline(), Some(MockInstant(0)));
    }
}
