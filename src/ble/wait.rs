//! Bounded waiting for controller events.
//!
//! The gateway's `poll_event` returns immediately. Every place the bond
//! core needs an answer spins on it, so each spin is guarded by a
//! [`Deadline`]; running out of budget is [`Error::Timeout`].

use super::aci::Event;
use super::{RadioGateway, SessionState};
use crate::config::DEFAULT_POLL_LIMIT;
use crate::error::Error;

/// Budget for one event wait.
pub trait Deadline {
    /// Re-arm before a new wait.
    fn start(&mut self);

    /// Called after each empty poll; `true` ends the wait.
    fn expired(&mut self) -> bool;
}

impl<T: Deadline + ?Sized> Deadline for &mut T {
    fn start(&mut self) {
        (**self).start()
    }

    fn expired(&mut self) -> bool {
        (**self).expired()
    }
}

/// Allows a fixed number of empty polls per wait.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PollLimit {
    limit: u32,
    remaining: u32,
}

impl PollLimit {
    pub const fn new(limit: u32) -> Self {
        Self {
            limit,
            remaining: limit,
        }
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }
}

impl Default for PollLimit {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_LIMIT)
    }
}

impl Deadline for PollLimit {
    fn start(&mut self) {
        self.remaining = self.limit;
    }

    fn expired(&mut self) -> bool {
        if self.remaining == 0 {
            return true;
        }
        self.remaining -= 1;
        self.remaining == 0
    }
}

/// Wall-clock budget per wait.
#[cfg(feature = "time")]
#[derive(Clone, Copy, Debug)]
pub struct TimeLimit {
    timeout: embassy_time::Duration,
    started: embassy_time::Instant,
}

#[cfg(feature = "time")]
impl TimeLimit {
    pub fn new(timeout: embassy_time::Duration) -> Self {
        Self {
            timeout,
            started: embassy_time::Instant::now(),
        }
    }
}

#[cfg(feature = "time")]
impl Deadline for TimeLimit {
    fn start(&mut self) {
        self.started = embassy_time::Instant::now();
    }

    fn expired(&mut self) -> bool {
        self.started.elapsed() >= self.timeout
    }
}

/// Spin on `gateway` until it yields an event or `deadline` runs out.
pub fn next_event<G, D>(
    gateway: &mut G,
    session: &mut SessionState,
    deadline: &mut D,
) -> Result<Event, Error>
where
    G: RadioGateway + ?Sized,
    D: Deadline + ?Sized,
{
    deadline.start();
    loop {
        if let Some(event) = gateway.poll_event(session) {
            trace!("Event received with opcode {:x}", event.opcode());
            return Ok(event);
        }
        if deadline.expired() {
            warn!("No event from controller before deadline");
            return Err(Error::Timeout);
        }
    }
}
