//! Admission gate with drain-on-close.
//!
//! Every manager operation enters through [`Admission::admit`] and holds the
//! returned guard until it finishes. [`Admission::close`] stops new
//! admissions; [`Admission::drained`] then resolves once every guard handed
//! out before the close has been dropped.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use tokio::sync::Notify;

#[derive(Debug, Default)]
pub(crate) struct Admission {
    closed: AtomicBool,
    in_flight: AtomicUsize,
    idle: Notify,
}

/// Proof of admission. Dropping it releases the slot.
#[derive(Debug)]
pub(crate) struct AdmissionGuard<'a> {
    admission: &'a Admission,
}

impl Admission {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Admit one operation, or `None` once closed.
    ///
    /// The slot is taken before the flag is read, so an operation either
    /// observes the close or is counted by the drain that follows it.
    pub(crate) fn admit(&self) -> Option<AdmissionGuard<'_>> {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        if self.closed.load(Ordering::SeqCst) {
            self.release();
            return None;
        }
        Some(AdmissionGuard { admission: self })
    }

    /// Stop admitting. Returns `true` only for the call that performed the close.
    pub(crate) fn close(&self) -> bool {
        !self.closed.swap(true, Ordering::SeqCst)
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub(crate) fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Wait until no admitted operation is running.
    pub(crate) async fn drained(&self) {
        loop {
            let notified = self.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.in_flight.load(Ordering::SeqCst) == 0 {
                return;
            }
            notified.await;
        }
    }

    fn release(&self) {
        if self.in_flight.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.idle.notify_waiters();
        }
    }
}

impl Drop for AdmissionGuard<'_> {
    fn drop(&mut self) {
        self.admission.release();
    }
}
