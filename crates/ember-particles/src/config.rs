//! Engine configuration (parsed from TOML)
//!
//! Every option here changes either Emit's initialization rule or Simulate's
//! per-particle update rule. None of them touch the allocator or the
//! double-buffer contract; capacity only sizes the buffers.

use crate::emitter::EmissionShape;
use crate::motion::{ColorMode, MotionPolicy, PointerAttraction};
use ember_core::{Color, EmberError, Result, Vec3};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Largest supported pool. 2^20 records of 80 bytes stay under the default
/// 128 MiB storage-binding limit of wgpu devices.
pub const MAX_CAPACITY: u32 = 1 << 20;

/// Top-level configuration file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Number of particle slots. Fixed for the lifetime of a backend.
    pub capacity: u32,
    pub emission: EmissionConfig,
    pub motion: MotionConfig,
    pub simulation: SimulationConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            capacity: 1_000_000,
            emission: EmissionConfig::default(),
            motion: MotionConfig::default(),
            simulation: SimulationConfig::default(),
        }
    }
}

/// `[emission]` table: how many particles to spawn and how to initialize them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmissionConfig {
    /// Particles per second
    pub rate: f32,
    pub lifetime_min: f32,
    pub lifetime_max: f32,
    pub speed_min: f32,
    pub speed_max: f32,
    pub position: Vec3,
    pub direction: Vec3,
    /// Half-angle in degrees of the velocity cone for non-cone shapes
    pub spread: f32,
    pub shape: EmissionShape,
    pub color: Color,
    /// Opaque tag copied into every spawned record
    pub source_id: u32,
    /// Opaque classification flags copied into every spawned record
    pub flags: u32,
    /// Seconds between bursts; 0 disables bursts
    pub burst_interval: f32,
    pub burst_count: u32,
    /// Extra particles per second while the pointer is active
    pub pointer_rate: f32,
}

impl Default for EmissionConfig {
    fn default() -> Self {
        Self {
            rate: 100_000.0,
            lifetime_min: 5.0,
            lifetime_max: 10.0,
            speed_min: 0.5,
            speed_max: 2.0,
            position: Vec3::ZERO,
            direction: Vec3::UP,
            spread: 15.0,
            shape: EmissionShape::Shell { radius: 1.0 },
            color: Color::WHITE,
            source_id: 0,
            flags: 0,
            burst_interval: 0.0,
            burst_count: 0,
            pointer_rate: 0.0,
        }
    }
}

/// `[motion]` table: the Simulate update rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionConfig {
    /// Constant acceleration applied to every particle
    pub force: Vec3,
    /// Linear velocity damping per second
    pub drag: f32,
    pub policy: MotionPolicy,
    pub color: ColorMode,
    pub pointer: PointerAttraction,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            force: Vec3::ZERO,
            drag: 0.0,
            policy: MotionPolicy::None,
            color: ColorMode::Keep,
            pointer: PointerAttraction::default(),
        }
    }
}

/// `[simulation]` table: orchestration knobs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Run synthetic steps before the first real tick
    pub prewarm: bool,
    /// Seconds of simulated time covered by prewarm
    pub prewarm_time: f32,
    /// Log counters every N steps; 0 disables diagnostics
    pub diagnostics_interval: u32,
    /// Seed of the host RNG producing per-step seed triples
    pub seed: u32,
    /// Index count of the render mesh, copied into the draw arguments
    pub mesh_index_count: u32,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            prewarm: false,
            prewarm_time: 10.0,
            diagnostics_interval: 60,
            seed: 0xDEAD_BEEF,
            mesh_index_count: 6,
        }
    }
}

impl EngineConfig {
    /// Parse and validate a configuration from TOML source
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Reject configurations that cannot be run. Called once at setup;
    /// nothing is re-checked per step.
    pub fn validate(&self) -> Result<()> {
        check_range("capacity", self.capacity as f64, 1.0, MAX_CAPACITY as f64)?;

        let e = &self.emission;
        check_non_negative("emission.rate", e.rate)?;
        check_non_negative("emission.lifetime_min", e.lifetime_min)?;
        check_ordered("emission.lifetime", e.lifetime_min, e.lifetime_max)?;
        check_finite("emission.speed_min", e.speed_min)?;
        check_ordered("emission.speed", e.speed_min, e.speed_max)?;
        check_vec("emission.position", e.position)?;
        check_vec("emission.direction", e.direction)?;
        check_range("emission.spread", e.spread as f64, 0.0, 180.0)?;
        check_non_negative("emission.burst_interval", e.burst_interval)?;
        check_non_negative("emission.pointer_rate", e.pointer_rate)?;
        e.shape.validate()?;

        let m = &self.motion;
        check_vec("motion.force", m.force)?;
        check_non_negative("motion.drag", m.drag)?;
        m.policy.validate()?;
        m.color.validate()?;
        m.pointer.validate()?;

        let s = &self.simulation;
        check_non_negative("simulation.prewarm_time", s.prewarm_time)?;
        if s.mesh_index_count == 0 {
            return Err(EmberError::MissingResource(
                "render mesh: simulation.mesh_index_count must be non-zero".into(),
            ));
        }
        Ok(())
    }
}

pub(crate) fn check_finite(field: &str, value: f32) -> Result<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(EmberError::ValidationError(format!(
            "{field} must be finite, got {value}"
        )))
    }
}

pub(crate) fn check_non_negative(field: &str, value: f32) -> Result<()> {
    check_finite(field, value)?;
    check_range(field, value as f64, 0.0, f64::MAX)
}

pub(crate) fn check_positive(field: &str, value: f32) -> Result<()> {
    check_finite(field, value)?;
    if value > 0.0 {
        Ok(())
    } else {
        Err(EmberError::ValidationError(format!(
            "{field} must be positive, got {value}"
        )))
    }
}

pub(crate) fn check_range(field: &str, value: f64, min: f64, max: f64) -> Result<()> {
    if value < min || value > max || value.is_nan() {
        return Err(EmberError::ValueOutOfRange {
            field: field.to_string(),
            min,
            max,
            value,
        });
    }
    Ok(())
}

fn check_ordered(field: &str, min: f32, max: f32) -> Result<()> {
    check_finite(field, max)?;
    if min > max {
        return Err(EmberError::ValidationError(format!(
            "{field}: min ({min}) is greater than max ({max})"
        )));
    }
    Ok(())
}

pub(crate) fn check_vec(field: &str, v: Vec3) -> Result<()> {
    if v.is_finite() {
        Ok(())
    } else {
        Err(EmberError::ValidationError(format!(
            "{field} must be finite, got {v:?}"
        )))
    }
}
