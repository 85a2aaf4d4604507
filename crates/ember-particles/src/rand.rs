//! Random numbers for emission
//!
//! Two generators: `ParticleRng` is the host-side xorshift32 that produces
//! the per-step seed triple, and `WorkItemRng` is the stateless PCG hash each
//! Emit work item derives from (seeds, item index). The WGSL kernels carry a
//! line-for-line copy of `WorkItemRng`, so both backends draw from the same
//! distribution.

use ember_core::Vec3;
use std::f32::consts::{PI, TAU};

/// Host-side xorshift32 used once per step
pub struct ParticleRng {
    state: u32,
}

impl ParticleRng {
    pub fn new(seed: u32) -> Self {
        Self {
            state: if seed == 0 { 1 } else { seed },
        }
    }

    pub fn next_u32(&mut self) -> u32 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.state = x;
        x
    }

    /// Fresh seed triple for one Emit dispatch
    pub fn seed_triple(&mut self) -> [u32; 3] {
        [self.next_u32(), self.next_u32(), self.next_u32()]
    }
}

/// PCG-style integer hash, identical to `pcg_hash` in the WGSL kernels
pub fn pcg_hash(input: u32) -> u32 {
    let state = input.wrapping_mul(747_796_405).wrapping_add(2_891_336_453);
    let word = ((state >> ((state >> 28) + 4)) ^ state).wrapping_mul(277_803_737);
    (word >> 22) ^ word
}

/// Per-work-item generator seeded from the step seeds and the item index
pub struct WorkItemRng {
    state: u32,
}

impl WorkItemRng {
    pub fn new(seeds: [u32; 3], index: u32) -> Self {
        let mixed = pcg_hash(seeds[0] ^ pcg_hash(seeds[1] ^ pcg_hash(seeds[2])));
        Self {
            state: pcg_hash(index ^ mixed),
        }
    }

    pub fn next_u32(&mut self) -> u32 {
        self.state = pcg_hash(self.state);
        self.state
    }

    /// Returns a float in [0, 1)
    pub fn next_f32(&mut self) -> f32 {
        (self.next_u32() >> 8) as f32 * (1.0 / 16_777_216.0)
    }

    /// Returns a float in [min, max)
    pub fn range(&mut self, min: f32, max: f32) -> f32 {
        min + self.next_f32() * (max - min)
    }

    /// Returns a random unit direction vector (uniformly on sphere surface)
    pub fn random_direction(&mut self) -> Vec3 {
        // z uniform in [-1, 1), azimuth uniform: no rejection loop, so the
        // kernel copy stays branch-free
        let z = 1.0 - 2.0 * self.next_f32();
        let phi = self.next_f32() * TAU;
        let r = (1.0 - z * z).max(0.0).sqrt();
        Vec3::new(r * phi.cos(), r * phi.sin(), z)
    }

    /// Returns a direction within a cone around `base_dir` with half-angle `angle_rad`
    pub fn cone_direction(&mut self, base_dir: Vec3, angle_rad: f32) -> Vec3 {
        if angle_rad <= 0.0 {
            return base_dir.normalized();
        }
        if angle_rad >= PI {
            return self.random_direction();
        }

        // Random point in cone: uniform cos_theta in [cos_angle, 1], uniform phi in [0, 2pi]
        let cos_theta = self.range(angle_rad.cos(), 1.0);
        let sin_theta = (1.0 - cos_theta * cos_theta).max(0.0).sqrt();
        let phi = self.range(0.0, TAU);

        // Local direction in cone around +Z
        let local = Vec3::new(sin_theta * phi.cos(), sin_theta * phi.sin(), cos_theta);

        // Rotate from +Z to base_dir
        rotate_to_basis(base_dir, local)
    }
}

/// Rotates `local` (assumed around +Z) to align with `forward`
pub fn rotate_to_basis(forward: Vec3, local: Vec3) -> Vec3 {
    let mut fwd = forward.normalized();
    if fwd == Vec3::ZERO {
        fwd = Vec3::UP;
    }
    let up = if fwd.y.abs() > 0.99 { Vec3::RIGHT } else { Vec3::UP };
    let right = up.cross(&fwd).normalized();
    let actual_up = fwd.cross(&right);

    right * local.x + actual_up * local.y + fwd * local.z
}
