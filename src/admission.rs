//! Bounded-concurrency gate for capture jobs.

use crate::{Error, Result};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{OwnedSemaphorePermit, Semaphore, TryAcquireError};

#[derive(Debug, Default)]
struct Counts {
    active: usize,
    peak: usize,
}

/// Admits at most `max_concurrency` jobs at a time.
///
/// One controller is built per run and handed to the scheduler; clones share
/// the same budget. Admission is granted through an [`AdmissionPermit`] that
/// gives the slot back when dropped, so every exit path of a job releases
/// exactly once. Waiters are not served in any particular order.
#[derive(Debug, Clone)]
pub struct AdmissionController {
    max: usize,
    slots: Arc<Semaphore>,
    counts: Arc<Mutex<Counts>>,
}

/// Proof of admission; dropping it releases the slot.
#[derive(Debug)]
pub struct AdmissionPermit {
    counts: Arc<Mutex<Counts>>,
    // Released after the active count is decremented in `drop`.
    _slot: OwnedSemaphorePermit,
}

fn lock(counts: &Mutex<Counts>) -> MutexGuard<'_, Counts> {
    counts.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl AdmissionController {
    /// Create a controller; zero concurrency is rejected.
    pub fn new(max_concurrency: usize) -> Result<Self> {
        if max_concurrency == 0 {
            return Err(Error::ConfigError(
                "max concurrency must be at least 1".into(),
            ));
        }
        if max_concurrency > Semaphore::MAX_PERMITS {
            return Err(Error::ConfigError(format!(
                "max concurrency {} exceeds the supported maximum",
                max_concurrency
            )));
        }
        Ok(Self {
            max: max_concurrency,
            slots: Arc::new(Semaphore::new(max_concurrency)),
            counts: Arc::new(Mutex::new(Counts::default())),
        })
    }

    /// Wait until fewer than `max_concurrency` jobs are active, then take a slot.
    pub async fn admit(&self) -> Result<AdmissionPermit> {
        let slot = self
            .slots
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| Error::Other("admission controller closed".into()))?;
        Ok(self.grant(slot))
    }

    /// Take a slot only if one is free right now.
    pub fn try_admit(&self) -> Option<AdmissionPermit> {
        match self.slots.clone().try_acquire_owned() {
            Ok(slot) => Some(self.grant(slot)),
            Err(TryAcquireError::NoPermits) | Err(TryAcquireError::Closed) => None,
        }
    }

    fn grant(&self, slot: OwnedSemaphorePermit) -> AdmissionPermit {
        let mut counts = lock(&self.counts);
        counts.active += 1;
        debug_assert!(counts.active <= self.max);
        counts.peak = counts.peak.max(counts.active);
        drop(counts);
        AdmissionPermit {
            counts: self.counts.clone(),
            _slot: slot,
        }
    }

    pub fn max_concurrency(&self) -> usize {
        self.max
    }

    /// Number of jobs currently holding a permit.
    pub fn active(&self) -> usize {
        lock(&self.counts).active
    }

    /// Highest `active` value observed since the controller was created.
    pub fn peak(&self) -> usize {
        lock(&self.counts).peak
    }
}

impl Drop for AdmissionPermit {
    fn drop(&mut self) {
        let mut counts = lock(&self.counts);
        counts.active = counts.active.saturating_sub(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn zero_concurrency_is_rejected() {
        let err = AdmissionController::new(0).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn try_admit_respects_bound() {
        let ctl = AdmissionController::new(2).unwrap();
        let a = ctl.try_admit().unwrap();
        let _b = ctl.try_admit().unwrap();
        assert!(ctl.try_admit().is_none());
        assert_eq!(ctl.active(), 2);

        drop(a);
        assert_eq!(ctl.active(), 1);
        assert!(ctl.try_admit().is_some());
        assert_eq!(ctl.peak(), 2);
    }

    #[tokio::test]
    async fn admit_waits_for_release() {
        let ctl = AdmissionController::new(1).unwrap();
        let held = ctl.admit().await.unwrap();

        let waiter = {
            let ctl = ctl.clone();
            tokio::spawn(async move { ctl.admit().await.map(|_| ()) })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiter.is_finished());

        drop(held);
        tokio::time::timeout(Duration::from_secs(2), waiter)
            .await
            .expect("waiter was never admitted")
            .unwrap()
            .unwrap();
        assert_eq!(ctl.active(), 0);
    }
}
