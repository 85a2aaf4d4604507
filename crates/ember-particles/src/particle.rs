//! Device-visible record types: particle, counters, draw arguments

use bytemuck::{Pod, Zeroable};
use ember_core::{Color, ParticleId, Vec3};

/// One slot of the particle store, matches WGSL `Particle` struct.
/// 80 bytes, 16-byte aligned (5 rows of vec4).
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Particle {
    pub life: [f32; 4],     // x = age, y = lifetime
    pub velocity: [f32; 4], // xyz = velocity
    pub position: [f32; 4], // xyz = position
    pub color: [f32; 4],    // rgba
    pub tags: [u32; 4],     // x = id, y = source id, z = flags
}

impl Particle {
    pub fn age(&self) -> f32 {
        self.life[0]
    }

    pub fn lifetime(&self) -> f32 {
        self.life[1]
    }

    /// Normalized age in [0, 1]
    pub fn age_ratio(&self) -> f32 {
        if self.lifetime() <= 0.0 {
            1.0
        } else {
            (self.age() / self.lifetime()).min(1.0)
        }
    }

    pub fn is_expired(&self) -> bool {
        self.age() >= self.lifetime()
    }

    pub fn position(&self) -> Vec3 {
        Vec3::truncate(self.position)
    }

    pub fn velocity(&self) -> Vec3 {
        Vec3::truncate(self.velocity)
    }

    pub fn set_position(&mut self, p: Vec3) {
        self.position = p.extend(0.0);
    }

    pub fn set_velocity(&mut self, v: Vec3) {
        self.velocity = v.extend(0.0);
    }

    pub fn set_color(&mut self, c: Color) {
        self.color = c.to_array();
    }

    pub fn id(&self) -> ParticleId {
        ParticleId(self.tags[0])
    }

    pub fn source_id(&self) -> u32 {
        self.tags[1]
    }

    pub fn flags(&self) -> u32 {
        self.tags[2]
    }
}

/// Which of the two alive-index lists is meant.
///
/// The lists themselves never move; only the role they play in a step
/// (Emit/Simulate source vs. Simulate destination) changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    A,
    B,
}

impl Role {
    pub fn other(self) -> Self {
        match self {
            Role::A => Role::B,
            Role::B => Role::A,
        }
    }

    /// Index of the list in a two-element list array
    pub fn list_index(self) -> usize {
        match self {
            Role::A => 0,
            Role::B => 1,
        }
    }

    /// Word of the counter block holding this list's count
    pub fn counter_index(self) -> usize {
        self.list_index() + 1
    }
}

/// Word of the counter block holding the dead count
pub const DEAD_COUNTER: usize = 0;
/// Word of the counter block holding the next particle id
pub const NEXT_ID_COUNTER: usize = 3;

/// Snapshot of the device counter block `[dead, count_a, count_b, next_id]`.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct Counters {
    pub words: [u32; 4],
}

impl Counters {
    /// Counters for a freshly reset pool: everything dead
    pub fn all_dead(capacity: u32) -> Self {
        Self {
            words: [capacity, 0, 0, ParticleId::FIRST.raw()],
        }
    }

    pub fn dead(&self) -> u32 {
        self.words[DEAD_COUNTER]
    }

    pub fn alive(&self, role: Role) -> u32 {
        self.words[role.counter_index()]
    }

    pub fn next_id(&self) -> u32 {
        self.words[NEXT_ID_COUNTER]
    }

    /// Slots accounted for across the free list and both alive lists
    pub fn total(&self) -> u64 {
        self.dead() as u64 + self.alive(Role::A) as u64 + self.alive(Role::B) as u64
    }
}

/// Indexed indirect draw arguments in the standard 5 × u32 layout
/// consumed by `draw_indexed_indirect`.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct DrawArgs {
    pub index_count: u32,
    pub instance_count: u32,
    pub first_index: u32,
    pub base_vertex: i32,
    pub first_instance: u32,
}

impl DrawArgs {
    pub fn for_mesh(index_count: u32) -> Self {
        Self {
            index_count,
            ..Default::default()
        }
    }
}

/// Per-phase role selection, matches WGSL `PhaseParams`.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct PhaseParams {
    pub src_counter: u32,
    pub dst_counter: u32,
    pub capacity: u32,
    pub _pad: u32,
}

impl PhaseParams {
    pub fn new(current: Role, capacity: u32) -> Self {
        Self {
            src_counter: current.counter_index() as u32,
            dst_counter: current.other().counter_index() as u32,
            capacity,
            _pad: 0,
        }
    }
}
