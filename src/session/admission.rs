//! Global connection admission control.

use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::{info, warn};

/// Race-free counter of admitted shell channels.
///
/// `try_admit` and `release` are the only mutation points; every admitted
/// channel must release exactly once, however it terminates.
#[derive(Debug)]
pub struct AdmissionController {
    current: AtomicUsize,
    max: usize,
}

impl AdmissionController {
    /// Create a controller with the configured maximum.
    pub fn new(max: usize) -> Self {
        Self {
            current: AtomicUsize::new(0),
            max,
        }
    }

    /// Atomically claim a slot. Fails without side effects once the
    /// maximum is reached.
    pub fn try_admit(&self) -> bool {
        let mut current = self.current.load(Ordering::Acquire);
        loop {
            if current >= self.max {
                return false;
            }
            match self.current.compare_exchange_weak(
                current,
                current + 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    info!("connections: {}/{}", current + 1, self.max);
                    return true;
                }
                Err(observed) => current = observed,
            }
        }
    }

    /// Return a previously claimed slot.
    pub fn release(&self) {
        match self
            .current
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
        {
            Ok(previous) => info!("connections: {}/{}", previous - 1, self.max),
            Err(_) => warn!("admission release without a matching admit"),
        }
    }

    /// Number of currently admitted channels.
    pub fn count(&self) -> usize {
        self.current.load(Ordering::Acquire)
    }

    /// Whether the configured maximum has been reached.
    pub fn at_capacity(&self) -> bool {
        self.count() >= self.max
    }

    /// Configured maximum.
    pub fn max(&self) -> usize {
        self.max
    }
}
