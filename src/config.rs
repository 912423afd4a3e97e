//! Timing and retry knobs for the simulated system.

use std::ops::RangeInclusive;
use std::time::Duration;

/// Controls how fast simulated time runs and how persistent the bus and the
/// driver allocator are.
///
/// The defaults mirror the original demo pacing: one simulated minute lasts
/// one wall-clock second, pickup takes three seconds, and a delivery draws a
/// duration between 15 and 30 simulated minutes. Tests shrink these to
/// milliseconds.
#[derive(Debug, Clone)]
pub struct SimulationConfig {
    /// Wall-clock length of one simulated minute.
    pub minute: Duration,
    /// Fixed delay between pickup and departure.
    pub pickup_delay: Duration,
    /// Range the delivery duration is drawn from, in simulated minutes. Also
    /// used for the ETA quoted at order creation.
    pub delivery_minutes: RangeInclusive<u32>,
    /// Number of progress legs in the transit simulation.
    pub transit_legs: u32,
    /// Simulated latency of one notification channel send.
    pub channel_latency: Duration,
    /// Depth of each declared queue.
    pub queue_capacity: usize,
    /// Bus-level redelivery limit for nacked messages.
    pub max_redeliveries: u32,
    /// Base backoff between redeliveries (grows linearly with the attempt).
    pub redelivery_backoff: Duration,
    /// How many times an `order.ready` without a free driver is requeued
    /// before it lands in the unassigned backlog.
    pub allocation_retries: u32,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            minute: Duration::from_secs(1),
            pickup_delay: Duration::from_secs(3),
            delivery_minutes: 15..=30,
            transit_legs: 5,
            channel_latency: Duration::from_millis(300),
            queue_capacity: 64,
            max_redeliveries: 3,
            redelivery_backoff: Duration::from_millis(500),
            allocation_retries: 3,
        }
    }
}

impl SimulationConfig {
    /// Duration of a preparation lasting `minutes` simulated minutes.
    pub fn scaled_minutes(&self, minutes: u32) -> Duration {
        self.minute * minutes
    }
}
