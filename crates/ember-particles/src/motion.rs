//! Motion policies: the per-particle update rule evaluated inside Simulate
//!
//! Policies are a closed set of strategies chosen by configuration. Every
//! policy goes through the same integration step:
//!
//! 1. `accel = force + policy.acceleration(..) + pointer pull`
//! 2. `v += accel * dt`, then `v *= max(0, 1 - drag * dt)`
//! 3. `p += v * dt`, then `policy.constrain(..)` (boundary handling)
//! 4. color remap
//!
//! `simulate` in the WGSL kernels is a transcription of [`MotionStep::advance`];
//! the two must change together.

use crate::config::{check_finite, check_non_negative, check_positive, check_range, MotionConfig};
use crate::curves::{lerp_color, ramp};
use crate::particle::Particle;
use bytemuck::{Pod, Zeroable};
use ember_core::{Color, Result, Vec3};
use serde::{Deserialize, Serialize};

// Policy, boundary and color tags, mirrored by the WGSL constants
pub const POLICY_NONE: u32 = 0;
pub const POLICY_SPIRAL: u32 = 1;
pub const POLICY_CURL_NOISE: u32 = 2;
pub const POLICY_SPHERICAL_SHELL: u32 = 3;
pub const POLICY_GALACTIC_DISK: u32 = 4;
pub const POLICY_RING_ORBIT: u32 = 5;

pub const COLOR_KEEP: u32 = 0;
pub const COLOR_LIFETIME: u32 = 1;
pub const COLOR_SPEED: u32 = 2;
pub const COLOR_RADIAL: u32 = 3;

const EPSILON: f32 = 1e-4;

/// Field effect applied on top of the global force
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MotionPolicy {
    None,
    /// Swirl around the emitter's Y axis, pulled toward `radius`, lifted up to `height`
    Spiral {
        force: f32,
        radius: f32,
        height: f32,
        turns: f32,
    },
    /// Divergence-free vortex field drifting with time
    CurlNoise { scale: f32, strength: f32, speed: f32 },
    /// Spring toward a sphere around the emitter
    SphericalShell {
        radius: f32,
        thickness: f32,
        stiffness: f32,
        #[serde(default)]
        boundary: BoundaryMode,
    },
    /// Differential rotation in the XZ plane with logarithmic spiral arms
    GalacticDisk {
        arms: u32,
        arm_tightness: f32,
        rotation_speed: f32,
        flatten: f32,
        compression: f32,
    },
    /// Orbit around Y, pulled onto a ring in the emitter's XZ plane
    RingOrbit {
        radius: f32,
        orbit_speed: f32,
        pull: f32,
    },
}

/// What the spherical shell does with particles that leave it
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundaryMode {
    #[default]
    None,
    /// Project onto the sphere and drop radial velocity
    SurfaceStick,
    /// Clamp into `radius ± thickness / 2` and reflect outgoing radial velocity
    ShellClamp,
}

impl BoundaryMode {
    fn tag(self) -> u32 {
        match self {
            BoundaryMode::None => 0,
            BoundaryMode::SurfaceStick => 1,
            BoundaryMode::ShellClamp => 2,
        }
    }
}

/// Color update written by Simulate
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ColorMode {
    /// Keep the color assigned at emission
    Keep,
    Lifetime { start: Color, end: Color },
    Speed { slow: Color, fast: Color, max_speed: f32 },
    Radial { inner: Color, outer: Color, max_radius: f32 },
}

/// Pull toward the pointer while it is active
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PointerAttraction {
    pub enabled: bool,
    pub strength: f32,
    /// No pull beyond this distance
    pub radius: f32,
}

impl Default for PointerAttraction {
    fn default() -> Self {
        Self {
            enabled: false,
            strength: 10.0,
            radius: 5.0,
        }
    }
}

impl PointerAttraction {
    pub fn validate(&self) -> Result<()> {
        check_finite("motion.pointer.strength", self.strength)?;
        check_positive("motion.pointer.radius", self.radius)
    }

    fn acceleration(&self, pointer: Vec3, position: Vec3) -> Vec3 {
        let rel = pointer - position;
        let d = rel.length();
        if d < EPSILON || d >= self.radius {
            return Vec3::ZERO;
        }
        rel * (self.strength * (1.0 - d / self.radius) / d)
    }
}

impl MotionPolicy {
    pub fn kind(&self) -> u32 {
        match self {
            MotionPolicy::None => POLICY_NONE,
            MotionPolicy::Spiral { .. } => POLICY_SPIRAL,
            MotionPolicy::CurlNoise { .. } => POLICY_CURL_NOISE,
            MotionPolicy::SphericalShell { .. } => POLICY_SPHERICAL_SHELL,
            MotionPolicy::GalacticDisk { .. } => POLICY_GALACTIC_DISK,
            MotionPolicy::RingOrbit { .. } => POLICY_RING_ORBIT,
        }
    }

    pub fn validate(&self) -> Result<()> {
        match *self {
            MotionPolicy::None => Ok(()),
            MotionPolicy::Spiral {
                force,
                radius,
                height,
                turns,
            } => {
                check_finite("motion.policy.force", force)?;
                check_non_negative("motion.policy.radius", radius)?;
                check_non_negative("motion.policy.height", height)?;
                check_finite("motion.policy.turns", turns)
            }
            MotionPolicy::CurlNoise {
                scale,
                strength,
                speed,
            } => {
                check_positive("motion.policy.scale", scale)?;
                check_finite("motion.policy.strength", strength)?;
                check_finite("motion.policy.speed", speed)
            }
            MotionPolicy::SphericalShell {
                radius,
                thickness,
                stiffness,
                ..
            } => {
                check_positive("motion.policy.radius", radius)?;
                check_non_negative("motion.policy.thickness", thickness)?;
                check_non_negative("motion.policy.stiffness", stiffness)
            }
            MotionPolicy::GalacticDisk {
                arms,
                arm_tightness,
                rotation_speed,
                flatten,
                compression,
            } => {
                check_range("motion.policy.arms", arms as f64, 1.0, 16.0)?;
                check_positive("motion.policy.arm_tightness", arm_tightness)?;
                check_finite("motion.policy.rotation_speed", rotation_speed)?;
                check_non_negative("motion.policy.flatten", flatten)?;
                check_finite("motion.policy.compression", compression)
            }
            MotionPolicy::RingOrbit {
                radius,
                orbit_speed,
                pull,
            } => {
                check_positive("motion.policy.radius", radius)?;
                check_finite("motion.policy.orbit_speed", orbit_speed)?;
                check_non_negative("motion.policy.pull", pull)
            }
        }
    }

    /// Acceleration contributed by the field at `rel` (position relative to the origin)
    pub fn acceleration(&self, rel: Vec3, vel: Vec3, time: f32) -> Vec3 {
        match *self {
            MotionPolicy::None => Vec3::ZERO,
            MotionPolicy::Spiral {
                force,
                radius,
                height,
                turns,
            } => {
                let lift = if height > 0.0 {
                    Vec3::UP * (force * (1.0 - rel.y / height).max(0.0))
                } else {
                    Vec3::ZERO
                };
                let planar = Vec3::new(rel.x, 0.0, rel.z);
                let dist = planar.length();
                if dist < EPSILON {
                    return lift;
                }
                let radial = planar * (1.0 / dist);
                let tangent = Vec3::new(-radial.z, 0.0, radial.x);
                tangent * (force * turns) + radial * ((radius - dist) * force) + lift
            }
            MotionPolicy::CurlNoise {
                scale,
                strength,
                speed,
            } => curl_field(rel, scale, time * speed) * strength,
            MotionPolicy::SphericalShell {
                radius, stiffness, ..
            } => {
                let d = rel.length();
                if d < EPSILON {
                    return Vec3::ZERO;
                }
                rel * (-(d - radius) * stiffness / d)
            }
            MotionPolicy::GalacticDisk {
                arms,
                arm_tightness,
                rotation_speed,
                flatten,
                compression,
            } => {
                let vertical = Vec3::UP * (-rel.y * flatten);
                let planar = Vec3::new(rel.x, 0.0, rel.z);
                let r = planar.length();
                if r < EPSILON {
                    return vertical;
                }
                let radial = planar * (1.0 / r);
                let tangent = Vec3::new(-radial.z, 0.0, radial.x);
                // Rotation curve rises linearly near the core, flattens outside
                let v_orbit = rotation_speed * r / (r + 1.0);
                let centripetal = radial * (-v_orbit * v_orbit / r);
                let steer = tangent * (v_orbit - vel.dot(&tangent));
                let theta = rel.z.atan2(rel.x);
                let phase = arms as f32 * (theta - r.ln() / arm_tightness);
                let arm = tangent * (-phase.sin() * compression);
                centripetal + steer + arm + vertical
            }
            MotionPolicy::RingOrbit {
                radius,
                orbit_speed,
                pull,
            } => {
                let planar = Vec3::new(rel.x, 0.0, rel.z);
                let r = planar.length();
                let radial = if r < EPSILON {
                    Vec3::RIGHT
                } else {
                    planar * (1.0 / r)
                };
                let tangent = Vec3::new(-radial.z, 0.0, radial.x);
                (radial * radius - rel) * pull + tangent * (orbit_speed - vel.dot(&tangent))
            }
        }
    }

    /// Post-integration boundary handling; returns the corrected (rel, vel)
    pub fn constrain(&self, rel: Vec3, vel: Vec3) -> (Vec3, Vec3) {
        let MotionPolicy::SphericalShell {
            radius,
            thickness,
            boundary,
            ..
        } = *self
        else {
            return (rel, vel);
        };
        let d = rel.length();
        if d < EPSILON {
            return (rel, vel);
        }
        let n = rel * (1.0 / d);
        let vr = vel.dot(&n);
        match boundary {
            BoundaryMode::None => (rel, vel),
            BoundaryMode::SurfaceStick => (n * radius, vel - n * vr),
            BoundaryMode::ShellClamp => {
                let inner = (radius - thickness * 0.5).max(0.0);
                let outer = radius + thickness * 0.5;
                if d > outer {
                    let vel = if vr > 0.0 { vel - n * (2.0 * vr) } else { vel };
                    (n * outer, vel)
                } else if d < inner {
                    let vel = if vr < 0.0 { vel - n * (2.0 * vr) } else { vel };
                    (n * inner, vel)
                } else {
                    (rel, vel)
                }
            }
        }
    }
}

/// Curl of the potential `(sin(a z + t), sin(a x + t), sin(a y + t)) / a`
/// plus a counter-phase octave. Each component ignores its own axis, so the
/// field has zero divergence.
pub fn curl_field(rel: Vec3, scale: f32, t: f32) -> Vec3 {
    let a = scale;
    Vec3::new(
        (a * rel.y + t).cos() - (a * rel.z - t).sin(),
        (a * rel.z + t).cos() - (a * rel.x - t).sin(),
        (a * rel.x + t).cos() - (a * rel.y - t).sin(),
    )
}

impl ColorMode {
    pub fn kind(&self) -> u32 {
        match self {
            ColorMode::Keep => COLOR_KEEP,
            ColorMode::Lifetime { .. } => COLOR_LIFETIME,
            ColorMode::Speed { .. } => COLOR_SPEED,
            ColorMode::Radial { .. } => COLOR_RADIAL,
        }
    }

    pub fn validate(&self) -> Result<()> {
        match *self {
            ColorMode::Keep | ColorMode::Lifetime { .. } => Ok(()),
            ColorMode::Speed { max_speed, .. } => check_positive("motion.color.max_speed", max_speed),
            ColorMode::Radial { max_radius, .. } => {
                check_positive("motion.color.max_radius", max_radius)
            }
        }
    }

    fn apply(&self, p: &mut Particle, rel: Vec3, vel: Vec3) {
        match *self {
            ColorMode::Keep => {}
            ColorMode::Lifetime { start, end } => p.set_color(lerp_color(start, end, p.age_ratio())),
            ColorMode::Speed {
                slow,
                fast,
                max_speed,
            } => p.set_color(lerp_color(slow, fast, ramp(vel.length(), max_speed))),
            ColorMode::Radial {
                inner,
                outer,
                max_radius,
            } => p.set_color(lerp_color(inner, outer, ramp(rel.length(), max_radius))),
        }
    }

    fn stops(&self) -> ([f32; 4], [f32; 4], f32) {
        match *self {
            ColorMode::Keep => ([0.0; 4], [0.0; 4], 0.0),
            ColorMode::Lifetime { start, end } => (start.to_array(), end.to_array(), 0.0),
            ColorMode::Speed {
                slow,
                fast,
                max_speed,
            } => (slow.to_array(), fast.to_array(), max_speed),
            ColorMode::Radial {
                inner,
                outer,
                max_radius,
            } => (inner.to_array(), outer.to_array(), max_radius),
        }
    }
}

/// Everything Simulate needs for one step, resolved from `MotionConfig`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionStep {
    pub force: Vec3,
    pub drag: f32,
    pub policy: MotionPolicy,
    pub color: ColorMode,
    pub pointer: PointerAttraction,
    /// Pointer position this step, `None` while the pointer is inactive
    pub pointer_position: Option<Vec3>,
    /// Center of the policy fields (the emitter position)
    pub origin: Vec3,
    pub dt: f32,
    /// Simulated seconds since start, drives time-varying fields
    pub time: f32,
}

impl MotionStep {
    pub fn new(config: &MotionConfig, origin: Vec3, dt: f32, time: f32) -> Self {
        Self {
            force: config.force,
            drag: config.drag,
            policy: config.policy,
            color: config.color,
            pointer: config.pointer,
            pointer_position: None,
            origin,
            dt,
            time,
        }
    }

    pub fn with_pointer(mut self, pointer: Option<Vec3>) -> Self {
        self.pointer_position = pointer;
        self
    }

    fn pointer_target(&self) -> Option<Vec3> {
        if self.pointer.enabled {
            self.pointer_position
        } else {
            None
        }
    }

    /// Age the particle and, if it survives, integrate it.
    /// Returns false when the particle retires this step.
    pub fn advance(&self, p: &mut Particle) -> bool {
        let dt = self.dt;
        p.life[0] += dt;
        if p.is_expired() {
            return false;
        }

        let position = p.position();
        let mut vel = p.velocity();

        let mut accel = self.force + self.policy.acceleration(position - self.origin, vel, self.time);
        if let Some(target) = self.pointer_target() {
            accel += self.pointer.acceleration(target, position);
        }

        vel += accel * dt;
        vel = vel * (1.0 - self.drag * dt).max(0.0);
        let moved = position + vel * dt;

        let (rel, vel) = self.policy.constrain(moved - self.origin, vel);
        p.set_position(self.origin + rel);
        p.set_velocity(vel);
        self.color.apply(p, rel, vel);
        true
    }
}

/// Simulate dispatch uniforms, matches WGSL `SimParams`.
/// 176 bytes (11 rows of vec4).
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct SimParams {
    pub force_drag: [f32; 4],    // xyz = force, w = drag
    pub timing: [f32; 4],        // x = dt, y = time
    pub origin: [f32; 4],        // xyz = field center
    pub policy: [f32; 4],        // policy-specific parameters
    pub pointer: [f32; 4],       // xyz = pointer position, w = strength
    pub pointer_extra: [f32; 4], // x = radius, y = 1.0 while active
    pub color_a: [f32; 4],
    pub color_b: [f32; 4],
    pub color_params: [f32; 4],  // x = ramp max
    pub kinds: [u32; 4],         // x = policy, y = boundary or arm count, z = color mode, w = item count
    pub _reserved: [u32; 4],
}

impl SimParams {
    pub fn new(step: &MotionStep, count: u32) -> Self {
        let (policy, aux) = match step.policy {
            MotionPolicy::None => ([0.0; 4], 0),
            MotionPolicy::Spiral {
                force,
                radius,
                height,
                turns,
            } => ([force, radius, height, turns], 0),
            MotionPolicy::CurlNoise {
                scale,
                strength,
                speed,
            } => ([scale, strength, speed, 0.0], 0),
            MotionPolicy::SphericalShell {
                radius,
                thickness,
                stiffness,
                boundary,
            } => ([radius, thickness, stiffness, 0.0], boundary.tag()),
            MotionPolicy::GalacticDisk {
                arms,
                arm_tightness,
                rotation_speed,
                flatten,
                compression,
            } => ([arm_tightness, rotation_speed, flatten, compression], arms),
            MotionPolicy::RingOrbit {
                radius,
                orbit_speed,
                pull,
            } => ([radius, orbit_speed, pull, 0.0], 0),
        };
        let (color_a, color_b, color_max) = step.color.stops();
        let pointer = step.pointer_target();

        Self {
            force_drag: step.force.extend(step.drag),
            timing: [step.dt, step.time, 0.0, 0.0],
            origin: step.origin.extend(0.0),
            policy,
            pointer: pointer.unwrap_or(Vec3::ZERO).extend(step.pointer.strength),
            pointer_extra: [
                step.pointer.radius,
                if pointer.is_some() { 1.0 } else { 0.0 },
                0.0,
                0.0,
            ],
            color_a,
            color_b,
            color_params: [color_max, 0.0, 0.0, 0.0],
            kinds: [step.policy.kind(), aux, step.color.kind(), count],
            _reserved: [0; 4],
        }
    }

    pub fn item_count(&self) -> u32 {
        self.kinds[3]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn particle_at(position: Vec3, velocity: Vec3, lifetime: f32) -> Particle {
        let mut p = Particle {
            life: [0.0, lifetime, 0.0, 0.0],
            ..Default::default()
        };
        p.set_position(position);
        p.set_velocity(velocity);
        p
    }

    fn step_with(policy: MotionPolicy) -> MotionStep {
        MotionStep {
            policy,
            ..MotionStep::new(&MotionConfig::default(), Vec3::ZERO, 0.1, 0.0)
        }
    }

    #[test]
    fn sim_params_layout() {
        assert_eq!(std::mem::size_of::<SimParams>(), 176);
    }

    #[test]
    fn free_flight_without_forces() {
        let step = step_with(MotionPolicy::None);
        let mut p = particle_at(Vec3::ZERO, Vec3::new(1.0, 0.0, 0.0), 10.0);
        for _ in 0..10 {
            assert!(step.advance(&mut p));
        }
        assert!((p.position().x - 1.0).abs() < 1e-4);
        assert_eq!(p.velocity(), Vec3::new(1.0, 0.0, 0.0));
    }

    #[test]
    fn expired_particle_is_not_integrated() {
        let step = step_with(MotionPolicy::None);
        let mut p = particle_at(Vec3::ZERO, Vec3::new(1.0, 0.0, 0.0), 0.1);
        assert!(!step.advance(&mut p));
        assert_eq!(p.position(), Vec3::ZERO);
    }

    #[test]
    fn gravity_and_drag() {
        let mut step = step_with(MotionPolicy::None);
        step.force = Vec3::new(0.0, -10.0, 0.0);
        let mut p = particle_at(Vec3::ZERO, Vec3::ZERO, 10.0);
        step.advance(&mut p);
        assert!((p.velocity().y + 1.0).abs() < 1e-5);

        step.force = Vec3::ZERO;
        step.drag = 5.0;
        step.advance(&mut p);
        assert!((p.velocity().y + 0.5).abs() < 1e-5);

        step.drag = 100.0;
        step.advance(&mut p);
        assert_eq!(p.velocity(), Vec3::ZERO);
    }

    #[test]
    fn curl_field_is_divergence_free() {
        let h = 1e-2;
        let (scale, t) = (0.7, 1.3);
        for point in [Vec3::new(0.3, -1.2, 2.0), Vec3::new(5.0, 0.1, -0.4)] {
            let dx = (curl_field(point + Vec3::new(h, 0.0, 0.0), scale, t).x
                - curl_field(point - Vec3::new(h, 0.0, 0.0), scale, t).x)
                / (2.0 * h);
            let dy = (curl_field(point + Vec3::new(0.0, h, 0.0), scale, t).y
                - curl_field(point - Vec3::new(0.0, h, 0.0), scale, t).y)
                / (2.0 * h);
            let dz = (curl_field(point + Vec3::new(0.0, 0.0, h), scale, t).z
                - curl_field(point - Vec3::new(0.0, 0.0, h), scale, t).z)
                / (2.0 * h);
            assert!((dx + dy + dz).abs() < 1e-3);
        }
    }

    #[test]
    fn spiral_swirls_and_pulls_to_radius() {
        let policy = MotionPolicy::Spiral {
            force: 1.0,
            radius: 2.0,
            height: 5.0,
            turns: 3.0,
        };
        let a = policy.acceleration(Vec3::new(4.0, 0.0, 0.0), Vec3::ZERO, 0.0);
        assert!(a.x < 0.0, "outside the radius pulls inward");
        assert!(a.z > 0.0, "tangential swirl");
        assert!(a.y > 0.0, "lift below the height");
        let top = policy.acceleration(Vec3::new(2.0, 6.0, 0.0), Vec3::ZERO, 0.0);
        assert!(top.y.abs() < 1e-6);
    }

    #[test]
    fn surface_stick_projects_onto_sphere() {
        let policy = MotionPolicy::SphericalShell {
            radius: 3.0,
            thickness: 0.0,
            stiffness: 0.0,
            boundary: BoundaryMode::SurfaceStick,
        };
        let (rel, vel) = policy.constrain(Vec3::new(0.0, 5.0, 0.0), Vec3::new(1.0, 2.0, 0.0));
        assert!((rel.length() - 3.0).abs() < 1e-5);
        assert!(vel.y.abs() < 1e-6);
        assert!((vel.x - 1.0).abs() < 1e-6);
    }

    #[test]
    fn shell_clamp_reflects_escaping_particles() {
        let policy = MotionPolicy::SphericalShell {
            radius: 3.0,
            thickness: 1.0,
            stiffness: 0.0,
            boundary: BoundaryMode::ShellClamp,
        };
        let (rel, vel) = policy.constrain(Vec3::new(4.0, 0.0, 0.0), Vec3::new(2.0, 0.0, 0.0));
        assert!((rel.x - 3.5).abs() < 1e-5);
        assert!((vel.x + 2.0).abs() < 1e-5);

        let (rel, vel) = policy.constrain(Vec3::new(1.0, 0.0, 0.0), Vec3::new(-1.0, 0.0, 0.0));
        assert!((rel.x - 2.5).abs() < 1e-5);
        assert!((vel.x - 1.0).abs() < 1e-5);

        let inside = Vec3::new(3.2, 0.0, 0.0);
        assert_eq!(policy.constrain(inside, Vec3::UP), (inside, Vec3::UP));
    }

    #[test]
    fn shell_spring_points_at_surface() {
        let policy = MotionPolicy::SphericalShell {
            radius: 3.0,
            thickness: 0.0,
            stiffness: 2.0,
            boundary: BoundaryMode::None,
        };
        let out = policy.acceleration(Vec3::new(5.0, 0.0, 0.0), Vec3::ZERO, 0.0);
        assert!((out.x + 4.0).abs() < 1e-5);
        let inside = policy.acceleration(Vec3::new(0.0, 1.0, 0.0), Vec3::ZERO, 0.0);
        assert!((inside.y - 4.0).abs() < 1e-5);
    }

    #[test]
    fn galactic_disk_flattens_and_orbits() {
        let policy = MotionPolicy::GalacticDisk {
            arms: 2,
            arm_tightness: 0.5,
            rotation_speed: 2.0,
            flatten: 1.0,
            compression: 0.0,
        };
        let a = policy.acceleration(Vec3::new(3.0, 1.0, 0.0), Vec3::ZERO, 0.0);
        assert!(a.y < 0.0, "pulled toward the disk plane");
        assert!(a.x < 0.0, "centripetal");
        assert!(a.z > 0.0, "spun up along the orbit");
    }

    #[test]
    fn ring_orbit_pulls_onto_ring() {
        let policy = MotionPolicy::RingOrbit {
            radius: 4.0,
            orbit_speed: 0.0,
            pull: 1.0,
        };
        let a = policy.acceleration(Vec3::new(2.0, 1.0, 0.0), Vec3::ZERO, 0.0);
        assert!((a.x - 2.0).abs() < 1e-5);
        assert!((a.y + 1.0).abs() < 1e-5);
    }

    #[test]
    fn pointer_pull_only_inside_radius() {
        let mut step = step_with(MotionPolicy::None);
        step.pointer = PointerAttraction {
            enabled: true,
            strength: 10.0,
            radius: 5.0,
        };
        let step = step.with_pointer(Some(Vec3::new(2.0, 0.0, 0.0)));
        let mut near = particle_at(Vec3::ZERO, Vec3::ZERO, 10.0);
        step.advance(&mut near);
        assert!(near.velocity().x > 0.0);

        let mut far = particle_at(Vec3::new(-10.0, 0.0, 0.0), Vec3::ZERO, 10.0);
        step.advance(&mut far);
        assert_eq!(far.velocity(), Vec3::ZERO);
    }

    #[test]
    fn disabled_pointer_is_ignored() {
        let step = step_with(MotionPolicy::None).with_pointer(Some(Vec3::new(1.0, 0.0, 0.0)));
        let params = SimParams::new(&step, 3);
        assert_eq!(params.pointer_extra[1], 0.0);
        let mut p = particle_at(Vec3::ZERO, Vec3::ZERO, 10.0);
        step.advance(&mut p);
        assert_eq!(p.velocity(), Vec3::ZERO);
    }

    #[test]
    fn lifetime_color_ramp() {
        let mut step = step_with(MotionPolicy::None);
        step.color = ColorMode::Lifetime {
            start: Color::new(1.0, 1.0, 1.0, 1.0),
            end: Color::new(1.0, 0.0, 0.0, 0.0),
        };
        step.dt = 1.0;
        let mut p = particle_at(Vec3::ZERO, Vec3::ZERO, 4.0);
        step.advance(&mut p);
        step.advance(&mut p);
        assert!((p.color[1] - 0.5).abs() < 1e-5);
        assert!((p.color[3] - 0.5).abs() < 1e-5);
    }

    #[test]
    fn encodes_policy_tags() {
        let mut step = step_with(MotionPolicy::GalacticDisk {
            arms: 3,
            arm_tightness: 0.4,
            rotation_speed: 1.0,
            flatten: 0.5,
            compression: 0.2,
        });
        step.color = ColorMode::Radial {
            inner: Color::WHITE,
            outer: Color::TRANSPARENT,
            max_radius: 8.0,
        };
        let params = SimParams::new(&step, 99);
        assert_eq!(params.kinds, [POLICY_GALACTIC_DISK, 3, COLOR_RADIAL, 99]);
        assert!((params.color_params[0] - 8.0).abs() < 1e-6);
        assert_eq!(params.item_count(), 99);
    }

    #[test]
    fn galactic_disk_needs_an_arm() {
        let policy = MotionPolicy::GalacticDisk {
            arms: 0,
            arm_tightness: 0.5,
            rotation_speed: 1.0,
            flatten: 0.0,
            compression: 0.0,
        };
        assert!(policy.validate().is_err());
    }

    #[test]
    fn parse_policy_from_toml() {
        #[derive(Deserialize)]
        struct Holder {
            policy: MotionPolicy,
            color: ColorMode,
        }
        let h: Holder = toml::from_str(
            r#"
policy = { kind = "curl_noise", scale = 0.5, strength = 2, speed = 1 }
color = { kind = "speed", slow = [0, 0, 1, 1], fast = [1, 0, 0, 1], max_speed = 4 }
"#,
        )
        .unwrap();
        assert_eq!(
            h.policy,
            MotionPolicy::CurlNoise {
                scale: 0.5,
                strength: 2.0,
                speed: 1.0
            }
        );
        assert_eq!(h.color.kind(), COLOR_SPEED);
    }
}
