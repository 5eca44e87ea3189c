//! Flat registry of per-stream watchdog timers.
//!
//! Every timer of every stream lives in one map keyed by [`TimerId`]. The id
//! encodes the owning stream and the timer kind, so a fired timer can be
//! routed back to its stream without a secondary lookup.
use std::{fmt, time::Duration, time::Instant};

use fxhash::FxHashMap;

use crate::{error::TimerError, frame::StreamId};

const KINDS: u64 = 3;

/// What a timer watches.
#[repr(u8)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum TimerKind {
    /// Connection-level, waits for the peer to acknowledge our SETTINGS
    Settings = 0,
    /// Peer stopped sending input we still expect
    Recv = 1,
    /// Sending is stuck on flow control
    Send = 2,
}

/// Identifier of a registered timer.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

impl TimerId {
    /// Derive the timer id for `kind` owned by stream `id`
    pub fn new(id: StreamId, kind: TimerKind) -> TimerId {
        TimerId(u64::from(u32::from(id)) * KINDS + kind as u64)
    }

    /// Settings timer of the connection
    pub fn settings() -> TimerId {
        TimerId::new(StreamId::zero(), TimerKind::Settings)
    }

    /// Split the id into owning stream and kind
    pub fn decompose(&self) -> (StreamId, TimerKind) {
        let kind = match self.0 % KINDS {
            0 => TimerKind::Settings,
            1 => TimerKind::Recv,
            _ => TimerKind::Send,
        };
        // ids are only built by `new`, the quotient always fits in 31 bits
        (StreamId::from((self.0 / KINDS) as u32), kind)
    }

    pub fn stream_id(&self) -> StreamId {
        self.decompose().0
    }

    pub fn kind(&self) -> TimerKind {
        self.decompose().1
    }
}

impl fmt::Debug for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (id, kind) = self.decompose();
        write!(f, "TimerId({id}, {kind:?})")
    }
}

#[derive(Debug)]
struct Timer {
    delay: Duration,
    deadline: Option<Instant>,
}

/// Timer registry.
///
/// Timers are one-shot, an expired timer stays registered but disarmed.
#[derive(Debug, Default)]
pub struct Timers {
    timers: FxHashMap<TimerId, Timer>,
}

impl Timers {
    pub fn new() -> Self {
        Timers::default()
    }

    /// Register a disarmed timer
    pub fn add(&mut self, id: TimerId, delay: Duration) -> Result<(), TimerError> {
        if self.timers.contains_key(&id) {
            return Err(TimerError::Duplicate(id));
        }
        log::trace!("add timer {id:?}, delay {delay:?}");
        self.timers.insert(
            id,
            Timer {
                delay,
                deadline: None,
            },
        );
        Ok(())
    }

    pub fn remove(&mut self, id: TimerId) -> Result<(), TimerError> {
        log::trace!("remove timer {id:?}");
        self.timers
            .remove(&id)
            .map(|_| ())
            .ok_or(TimerError::NotFound(id))
    }

    /// Arm the timer, an armed timer keeps its current deadline
    pub fn start(&mut self, id: TimerId) -> Result<(), TimerError> {
        let timer = self.get_mut(id)?;
        if timer.deadline.is_none() {
            timer.deadline = Some(Instant::now() + timer.delay);
        }
        Ok(())
    }

    pub fn stop(&mut self, id: TimerId) -> Result<(), TimerError> {
        self.get_mut(id)?.deadline = None;
        Ok(())
    }

    /// Re-arm the timer with a fresh deadline
    pub fn restart(&mut self, id: TimerId) -> Result<(), TimerError> {
        let timer = self.get_mut(id)?;
        timer.deadline = Some(Instant::now() + timer.delay);
        Ok(())
    }

    /// Same as `restart` but leaves a disarmed timer disarmed
    pub fn restart_if_started(&mut self, id: TimerId) -> Result<(), TimerError> {
        let timer = self.get_mut(id)?;
        if timer.deadline.is_some() {
            timer.deadline = Some(Instant::now() + timer.delay);
        }
        Ok(())
    }

    pub fn contains(&self, id: TimerId) -> bool {
        self.timers.contains_key(&id)
    }

    /// Check if registered timer is armed
    pub fn is_started(&self, id: TimerId) -> Result<bool, TimerError> {
        self.timers
            .get(&id)
            .map(|t| t.deadline.is_some())
            .ok_or(TimerError::NotFound(id))
    }

    pub fn deadline(&self, id: TimerId) -> Result<Option<Instant>, TimerError> {
        self.timers
            .get(&id)
            .map(|t| t.deadline)
            .ok_or(TimerError::NotFound(id))
    }

    /// Earliest deadline among armed timers
    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers.values().filter_map(|t| t.deadline).min()
    }

    /// Disarm and return every timer whose deadline is not after `now`,
    /// earliest first.
    pub fn expired(&mut self, now: Instant) -> Vec<TimerId> {
        let mut expired: Vec<_> = self
            .timers
            .iter()
            .filter_map(|(id, t)| match t.deadline {
                Some(deadline) if deadline <= now => Some((deadline, *id)),
                _ => None,
            })
            .collect();
        expired.sort();

        expired
            .into_iter()
            .map(|(_, id)| {
                if let Some(timer) = self.timers.get_mut(&id) {
                    timer.deadline = None;
                }
                id
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }

    pub fn clear(&mut self) {
        self.timers.clear();
    }

    fn get_mut(&mut self, id: TimerId) -> Result<&mut Timer, TimerError> {
        self.timers.get_mut(&id).ok_or(TimerError::NotFound(id))
    }
}
