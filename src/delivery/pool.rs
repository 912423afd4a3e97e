//! The bounded driver pool.

use tracing::{debug, warn};

use crate::model::{Driver, DriverSnapshot};

/// Fixed set of drivers, owned exclusively by the delivery actor.
///
/// Reservation scans drivers in registration order and claims the first
/// available one in the same non-suspending call, so a reservation can never
/// be interleaved with another: the pool is a single-owner allocator and
/// double-booking is impossible by construction.
pub struct DriverPool {
    drivers: Vec<Driver>,
}

impl DriverPool {
    pub fn new(drivers: Vec<Driver>) -> Self {
        Self { drivers }
    }

    /// Claims the first available driver for `order_id`. No load balancing,
    /// no proximity weighting; the pool is small and bounded, so the linear
    /// scan is fine.
    pub fn reserve(&mut self, order_id: &str) -> Option<DriverSnapshot> {
        let driver = self.drivers.iter_mut().find(|d| d.available)?;
        driver.available = false;
        driver.current_order = Some(order_id.to_string());
        debug!(driver_id = %driver.id, %order_id, "Driver reserved");
        Some(driver.snapshot())
    }

    /// Frees a driver unconditionally. Idempotent: releasing an already free
    /// driver changes nothing.
    pub fn release(&mut self, driver_id: &str) {
        match self.drivers.iter_mut().find(|d| d.id == driver_id) {
            Some(driver) => {
                driver.available = true;
                driver.current_order = None;
                debug!(%driver_id, "Driver released");
            }
            None => warn!(%driver_id, "Release of unknown driver"),
        }
    }

    /// Current state of every driver, in registration order.
    pub fn drivers(&self) -> Vec<Driver> {
        self.drivers.clone()
    }

    pub fn available_count(&self) -> usize {
        self.drivers.iter().filter(|d| d.available).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserves_in_registration_order() {
        let mut pool = DriverPool::new(Driver::samples());
        let first = pool.reserve("o-1").expect("driver available");
        assert_eq!(first.id, "driver-1");
        let second = pool.reserve("o-2").expect("driver available");
        assert_eq!(second.id, "driver-2");
    }

    #[test]
    fn reserved_driver_is_unavailable_and_holds_one_order() {
        let mut pool = DriverPool::new(Driver::samples());
        pool.reserve("o-1").unwrap();
        let drivers = pool.drivers();
        let busy = &drivers[0];
        assert!(!busy.available);
        assert_eq!(busy.current_order.as_deref(), Some("o-1"));
        for driver in &drivers {
            assert_ne!(
                driver.available,
                driver.current_order.is_some(),
                "available XOR holds an order"
            );
        }
    }

    #[test]
    fn exhausted_pool_returns_none() {
        let mut pool = DriverPool::new(Driver::samples());
        for i in 0..4 {
            assert!(pool.reserve(&format!("o-{i}")).is_some());
        }
        assert!(pool.reserve("o-overflow").is_none());
        assert_eq!(pool.available_count(), 0);
    }

    #[test]
    fn released_driver_is_eligible_again() {
        let mut pool = DriverPool::new(Driver::samples());
        let snapshot = pool.reserve("o-1").unwrap();
        pool.release(&snapshot.id);
        let again = pool.reserve("o-2").expect("released driver reusable");
        assert_eq!(again.id, snapshot.id);
        // Releasing twice is harmless.
        pool.release(&snapshot.id);
        pool.release(&snapshot.id);
    }
}
