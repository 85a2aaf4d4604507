//! Configuration validation command

use anyhow::{Context, Result};
use ember_particles::{EngineConfig, Particle};
use std::mem::size_of;

pub fn run(path: &str) -> Result<()> {
    let config = EngineConfig::load(path)
        .with_context(|| format!("Configuration '{}' is invalid", path))?;

    let e = &config.emission;
    let m = &config.motion;
    let s = &config.simulation;

    println!("Configuration '{}' is valid", path);
    println!(
        "  capacity:   {} slots ({})",
        config.capacity,
        format_bytes(pool_bytes(config.capacity))
    );
    println!(
        "  emission:   {} /s, lifetime {}..{} s, shape {:?}",
        e.rate, e.lifetime_min, e.lifetime_max, e.shape
    );
    println!(
        "  motion:     force {:?}, drag {}, policy {:?}",
        m.force.to_array(),
        m.drag,
        m.policy
    );
    if m.pointer.enabled {
        println!(
            "  pointer:    strength {}, radius {}",
            m.pointer.strength, m.pointer.radius
        );
    }
    if s.prewarm {
        println!("  prewarm:    {} s", s.prewarm_time);
    }

    // Rough steady state: rate x mean lifetime
    let steady = e.rate * (e.lifetime_min + e.lifetime_max) * 0.5;
    if steady > config.capacity as f32 {
        println!(
            "  note: steady-state population ~{:.0} exceeds capacity; spawns will saturate",
            steady
        );
    }
    Ok(())
}

/// Device memory for the store, the free list and both alive lists
fn pool_bytes(capacity: u32) -> u64 {
    capacity as u64 * (size_of::<Particle>() as u64 + 3 * size_of::<u32>() as u64)
}

fn format_bytes(bytes: u64) -> String {
    const MIB: f64 = 1024.0 * 1024.0;
    if bytes as f64 >= MIB {
        format!("{:.1} MiB", bytes as f64 / MIB)
    } else {
        format!("{:.1} KiB", bytes as f64 / 1024.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_size_per_slot() {
        assert_eq!(pool_bytes(1), 92);
        assert_eq!(format_bytes(2048), "2.0 KiB");
        assert_eq!(format_bytes(3 * 1024 * 1024), "3.0 MiB");
    }
}
