//! Per-step spawn count: continuous rate, periodic bursts, pointer spawns

use crate::config::EmissionConfig;

/// Turns the emission settings into a spawn count for each step.
///
/// The count is a request. Emit may satisfy fewer when the free list runs
/// dry; the scheduler never looks at the pool.
#[derive(Debug, Clone)]
pub struct SpawnScheduler {
    rate: f32,
    burst_interval: f32,
    burst_count: u32,
    pointer_rate: f32,
    burst_clock: f32,
}

impl SpawnScheduler {
    pub fn new(config: &EmissionConfig) -> Self {
        Self {
            rate: config.rate,
            burst_interval: config.burst_interval,
            burst_count: config.burst_count,
            pointer_rate: config.pointer_rate,
            burst_clock: 0.0,
        }
    }

    /// Spawn request for a step of length `dt`
    pub fn next(&mut self, dt: f32, pointer_active: bool) -> u32 {
        let mut count = per_step(self.rate, dt);

        if self.burst_interval > 0.0 && self.burst_count > 0 {
            self.burst_clock += dt;
            if self.burst_clock >= self.burst_interval {
                // At most one burst per step; the remainder carries over
                self.burst_clock = (self.burst_clock - self.burst_interval) % self.burst_interval;
                count = count.saturating_add(self.burst_count);
            }
        }

        if pointer_active {
            count = count.saturating_add(per_step(self.pointer_rate, dt));
        }
        count
    }

    pub fn reset(&mut self) {
        self.burst_clock = 0.0;
    }
}

/// `round(rate * dt)`; the float-to-int cast saturates
fn per_step(rate: f32, dt: f32) -> u32 {
    (rate * dt).round().max(0.0) as u32
}
