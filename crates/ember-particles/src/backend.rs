//! The execution seam between the step orchestrator and the device
//!
//! A backend owns every pool buffer (particle store, free list, both alive
//! lists, counter block, draw arguments) and runs the three phase kernels
//! over them. Each call returns only after the phase is finished, so the
//! orchestrator never observes a half-applied phase.

use crate::emitter::EmitParams;
use crate::motion::MotionStep;
use crate::particle::{Counters, DrawArgs, Particle, Role};
use ember_core::{EmberError, Result};

/// One Emit dispatch: `params.spawn_count()` work items appending to `current`
#[derive(Debug, Clone, Copy)]
pub struct EmitDispatch {
    pub current: Role,
    pub params: EmitParams,
}

/// One Simulate dispatch: `count` work items reading `current`, writing `current.other()`
#[derive(Debug, Clone, Copy)]
pub struct SimulateDispatch {
    pub current: Role,
    /// Snapshot of `count[current]` taken after Emit
    pub count: u32,
    pub motion: MotionStep,
}

/// Device compute backend running the particle lifecycle phases
pub trait ComputeBackend {
    /// Short name for logs ("cpu", "wgpu: <adapter>")
    fn name(&self) -> &str;

    /// Number of particle slots
    fn capacity(&self) -> u32;

    /// Restore the all-dead state: every slot on the free list, both alive
    /// lists empty, ids restart, draw arguments sized for the mesh.
    fn reset(&mut self, mesh_index_count: u32) -> Result<()>;

    /// `args.instance_count = count[current]`
    fn update_args(&mut self, current: Role) -> Result<()>;

    fn emit(&mut self, dispatch: &EmitDispatch) -> Result<()>;

    fn simulate(&mut self, dispatch: &SimulateDispatch) -> Result<()>;

    /// Blocking read of the counter block. Reflects every phase issued before it.
    fn read_counters(&mut self) -> Result<Counters>;

    fn read_draw_args(&mut self) -> Result<DrawArgs>;

    /// Full pool readback for diagnostics and tests. Slow on the GPU backend.
    fn snapshot(&mut self) -> Result<PoolSnapshot>;
}

/// Host copy of every pool buffer
#[derive(Debug, Clone)]
pub struct PoolSnapshot {
    pub counters: Counters,
    pub draw_args: DrawArgs,
    pub particles: Vec<Particle>,
    pub free_list: Vec<u32>,
    /// Alive lists indexed by `Role::list_index`
    pub alive: [Vec<u32>; 2],
}

impl PoolSnapshot {
    pub fn capacity(&self) -> u32 {
        self.particles.len() as u32
    }

    /// The live prefix of the free list
    pub fn free_slots(&self) -> &[u32] {
        let dead = (self.counters.dead() as usize).min(self.free_list.len());
        &self.free_list[..dead]
    }

    /// The live prefix of an alive list
    pub fn alive_slots(&self, role: Role) -> &[u32] {
        let list = &self.alive[role.list_index()];
        let count = (self.counters.alive(role) as usize).min(list.len());
        &list[..count]
    }

    /// Records reachable from an alive list, in list order
    pub fn alive_particles(&self, role: Role) -> impl Iterator<Item = &Particle> + '_ {
        self.alive_slots(role)
            .iter()
            .filter_map(|slot| self.particles.get(*slot as usize))
    }

    /// Check that the free list and both alive lists partition the slots:
    /// the counts sum to capacity and every slot appears exactly once.
    pub fn check_partition(&self) -> Result<()> {
        let capacity = self.capacity();
        if self.counters.total() != capacity as u64 {
            return Err(EmberError::PoolCorrupted(format!(
                "dead {} + alive A {} + alive B {} != capacity {}",
                self.counters.dead(),
                self.counters.alive(Role::A),
                self.counters.alive(Role::B),
                capacity
            )));
        }

        let mut owner: Vec<Option<&'static str>> = vec![None; capacity as usize];
        let lists = [
            ("free", self.free_slots()),
            ("alive A", self.alive_slots(Role::A)),
            ("alive B", self.alive_slots(Role::B)),
        ];
        for (name, slots) in lists {
            for &slot in slots {
                let entry = owner.get_mut(slot as usize).ok_or_else(|| {
                    EmberError::PoolCorrupted(format!("{name} holds out-of-range slot {slot}"))
                })?;
                if let Some(previous) = entry.replace(name) {
                    return Err(EmberError::PoolCorrupted(format!(
                        "slot {slot} is in both {previous} and {name}"
                    )));
                }
            }
        }

        for role in [Role::A, Role::B] {
            if let Some(p) = self.alive_particles(role).find(|p| !p.id().is_assigned()) {
                return Err(EmberError::PoolCorrupted(format!(
                    "alive record at {:?} was never spawned",
                    p.position().to_array()
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(counters: [u32; 4], free: Vec<u32>, a: Vec<u32>, b: Vec<u32>) -> PoolSnapshot {
        PoolSnapshot {
            counters: Counters { words: counters },
            draw_args: DrawArgs::for_mesh(6),
            particles: (1..=4)
                .map(|id| Particle {
                    tags: [id, 0, 0, 0],
                    ..Default::default()
                })
                .collect(),
            free_list: free,
            alive: [a, b],
        }
    }

    #[test]
    fn valid_partition_passes() {
        let s = snapshot([2, 1, 1, 9], vec![3, 1, 7, 7], vec![0, 5, 5, 5], vec![2, 0, 0, 0]);
        assert!(s.check_partition().is_ok());
        assert_eq!(s.free_slots(), &[3, 1]);
        assert_eq!(s.alive_particles(Role::A).count(), 1);
    }

    #[test]
    fn count_mismatch_is_reported() {
        let s = snapshot([2, 1, 0, 1], vec![0, 1, 0, 0], vec![2, 0, 0, 0], vec![0; 4]);
        assert!(matches!(s.check_partition(), Err(EmberError::PoolCorrupted(_))));
    }

    #[test]
    fn duplicate_slot_is_reported() {
        let s = snapshot([2, 1, 1, 1], vec![0, 1, 0, 0], vec![2, 0, 0, 0], vec![1, 0, 0, 0]);
        let err = s.check_partition().unwrap_err();
        assert!(err.to_string().contains("slot 1"));
    }

    #[test]
    fn unspawned_alive_record_is_reported() {
        let mut s = snapshot([2, 1, 1, 9], vec![3, 1, 0, 0], vec![0, 0, 0, 0], vec![2, 0, 0, 0]);
        s.particles[2] = Particle::default();
        let err = s.check_partition().unwrap_err();
        assert!(err.to_string().contains("never spawned"));
    }
}
