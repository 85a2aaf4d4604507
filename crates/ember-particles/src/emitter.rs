//! Emission shapes and the Emit initialization rule

use crate::config::{check_positive, check_range, check_vec, EmissionConfig};
use crate::particle::Particle;
use crate::rand::WorkItemRng;
use bytemuck::{Pod, Zeroable};
use ember_core::{Result, Vec3};
use serde::{Deserialize, Serialize};
use std::f32::consts::TAU;

// Shape tags, mirrored by the WGSL `SHAPE_*` constants
pub const SHAPE_POINT: u32 = 0;
pub const SHAPE_SPHERE: u32 = 1;
pub const SHAPE_SHELL: u32 = 2;
pub const SHAPE_CONE: u32 = 3;
pub const SHAPE_BOX: u32 = 4;
pub const SHAPE_SPIRAL: u32 = 5;

/// Emission shape
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EmissionShape {
    Point,
    /// Uniform in the ball of the given radius
    Sphere { radius: f32 },
    /// On the sphere surface, moving outward
    Shell { radius: f32 },
    /// From the emitter position, directions within `angle` degrees of `direction`
    Cone { angle: f32 },
    Box { extents: Vec3 },
    /// Along a helix climbing the emitter's Y axis
    Spiral { radius: f32, turns: f32, height: f32 },
}

impl EmissionShape {
    /// Tag written to `EmitParams::info.x`
    pub fn kind(&self) -> u32 {
        match self {
            EmissionShape::Point => SHAPE_POINT,
            EmissionShape::Sphere { .. } => SHAPE_SPHERE,
            EmissionShape::Shell { .. } => SHAPE_SHELL,
            EmissionShape::Cone { .. } => SHAPE_CONE,
            EmissionShape::Box { .. } => SHAPE_BOX,
            EmissionShape::Spiral { .. } => SHAPE_SPIRAL,
        }
    }

    fn params(&self) -> [f32; 4] {
        match *self {
            EmissionShape::Point => [0.0; 4],
            EmissionShape::Sphere { radius } | EmissionShape::Shell { radius } => {
                [radius, 0.0, 0.0, 0.0]
            }
            EmissionShape::Cone { angle } => [angle.to_radians(), 0.0, 0.0, 0.0],
            EmissionShape::Box { extents } => extents.extend(0.0),
            EmissionShape::Spiral {
                radius,
                turns,
                height,
            } => [radius, turns, height, 0.0],
        }
    }

    pub fn validate(&self) -> Result<()> {
        match *self {
            EmissionShape::Point => Ok(()),
            EmissionShape::Sphere { radius } | EmissionShape::Shell { radius } => {
                check_positive("emission.shape.radius", radius)
            }
            EmissionShape::Cone { angle } => {
                check_range("emission.shape.angle", angle as f64, 0.0, 180.0)
            }
            EmissionShape::Box { extents } => check_vec("emission.shape.extents", extents),
            EmissionShape::Spiral {
                radius,
                turns,
                height,
            } => {
                check_positive("emission.shape.radius", radius)?;
                check_positive("emission.shape.turns", turns)?;
                check_positive("emission.shape.height", height)
            }
        }
    }
}

/// Emit dispatch uniforms, matches WGSL `EmitParams`.
/// 112 bytes (7 rows of vec4).
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct EmitParams {
    pub position: [f32; 4],  // xyz = emitter position
    pub direction: [f32; 4], // xyz = normalized direction, w = spread (radians)
    pub shape: [f32; 4],     // shape-specific parameters
    pub color: [f32; 4],     // initial rgba
    pub ranges: [f32; 4],    // lifetime min/max, speed min/max
    pub seeds: [u32; 4],     // xyz = seed triple, w = spawn count
    pub info: [u32; 4],      // x = shape kind, y = source id, z = flags
}

impl EmitParams {
    pub fn new(config: &EmissionConfig, seeds: [u32; 3], spawn_count: u32) -> Self {
        let mut direction = config.direction.normalized();
        if direction == Vec3::ZERO {
            direction = Vec3::UP;
        }
        Self {
            position: config.position.extend(0.0),
            direction: direction.extend(config.spread.to_radians()),
            shape: config.shape.params(),
            color: config.color.to_array(),
            ranges: [
                config.lifetime_min,
                config.lifetime_max,
                config.speed_min,
                config.speed_max,
            ],
            seeds: [seeds[0], seeds[1], seeds[2], spawn_count],
            info: [config.shape.kind(), config.source_id, config.flags, 0],
        }
    }

    pub fn spawn_count(&self) -> u32 {
        self.seeds[3]
    }

    pub fn seed_triple(&self) -> [u32; 3] {
        [self.seeds[0], self.seeds[1], self.seeds[2]]
    }
}

/// Initialize the record claimed by Emit work item `index`.
///
/// Pure function of (params, index, id): the caller owns slot claiming and
/// list appends. Kept in lockstep with `emit` in the WGSL kernels.
pub fn spawn_particle(params: &EmitParams, index: u32, id: u32) -> Particle {
    let mut rng = WorkItemRng::new(params.seed_triple(), index);

    let origin = Vec3::truncate(params.position);
    let base_dir = Vec3::truncate(params.direction);
    let spread = params.direction[3];
    let shape = params.shape;

    let lifetime = rng.range(params.ranges[0], params.ranges[1]);
    let speed = rng.range(params.ranges[2], params.ranges[3]);

    let (offset, dir) = match params.info[0] {
        SHAPE_SPHERE => {
            let d = rng.random_direction();
            let r = shape[0] * rng.next_f32().cbrt();
            (d * r, rng.cone_direction(base_dir, spread))
        }
        SHAPE_SHELL => {
            let d = rng.random_direction();
            (d * shape[0], d)
        }
        SHAPE_CONE => (Vec3::ZERO, rng.cone_direction(base_dir, shape[0])),
        SHAPE_BOX => {
            let x = rng.range(-shape[0], shape[0]);
            let y = rng.range(-shape[1], shape[1]);
            let z = rng.range(-shape[2], shape[2]);
            (Vec3::new(x, y, z), rng.cone_direction(base_dir, spread))
        }
        SHAPE_SPIRAL => {
            let t = rng.next_f32();
            let angle = t * shape[1] * TAU;
            let offset = Vec3::new(angle.cos() * shape[0], t * shape[2], angle.sin() * shape[0]);
            // Leave along the helix tangent
            let tangent = Vec3::new(-angle.sin(), 0.0, angle.cos());
            (offset, tangent)
        }
        _ => (Vec3::ZERO, rng.cone_direction(base_dir, spread)),
    };

    let mut particle = Particle {
        life: [0.0, lifetime, 0.0, 0.0],
        color: params.color,
        tags: [id, params.info[1], params.info[2], 0],
        ..Default::default()
    };
    particle.set_position(origin + offset);
    particle.set_velocity(dir * speed);
    particle
}
