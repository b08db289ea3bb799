//! Per-operation busy flag with request tokens.
//!
//! A second `begin` while a ticket for the current token is alive fails with
//! `Error::Busy`. `invalidate` bumps the token: the outstanding ticket stops
//! blocking new work and reports itself stale when its response arrives.

use std::sync::atomic::{AtomicU64, Ordering};

use docseek_core::{Error, Result};
use parking_lot::Mutex;

pub(crate) struct RequestGate {
    op: &'static str,
    current: AtomicU64,
    in_flight: Mutex<Option<u64>>,
}

impl RequestGate {
    pub fn new(op: &'static str) -> Self {
        Self {
            op,
            current: AtomicU64::new(0),
            in_flight: Mutex::new(None),
        }
    }

    pub fn begin(&self) -> Result<Ticket<'_>> {
        let mut in_flight = self.in_flight.lock();
        let token = self.current.load(Ordering::Acquire);
        if *in_flight == Some(token) {
            return Err(Error::Busy(self.op));
        }
        *in_flight = Some(token);
        Ok(Ticket { gate: self, token })
    }

    pub fn invalidate(&self) {
        self.current.fetch_add(1, Ordering::AcqRel);
    }

    pub fn is_busy(&self) -> bool {
        *self.in_flight.lock() == Some(self.current.load(Ordering::Acquire))
    }
}

pub(crate) struct Ticket<'a> {
    gate: &'a RequestGate,
    token: u64,
}

impl Ticket<'_> {
    /// False once the gate was invalidated after this ticket was issued.
    pub fn is_current(&self) -> bool {
        self.gate.current.load(Ordering::Acquire) == self.token
    }
}

impl Drop for Ticket<'_> {
    fn drop(&mut self) {
        let mut in_flight = self.gate.in_flight.lock();
        if *in_flight == Some(self.token) {
            *in_flight = None;
        }
    }
}
