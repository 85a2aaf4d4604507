//! Host implementation of the phase kernels
//!
//! Work items run on the rayon pool with no ordering between them, touching
//! shared state only through the atomic counter block and the free / alive
//! index arrays, exactly as the device kernels do. Records are produced in
//! the parallel pass and written back after it, so a phase never reads a
//! record another item of the same phase wrote.

use crate::backend::{ComputeBackend, EmitDispatch, PoolSnapshot, SimulateDispatch};
use crate::emitter::spawn_particle;
use crate::particle::{Counters, DrawArgs, Particle, Role, DEAD_COUNTER, NEXT_ID_COUNTER};
use ember_core::{EmberError, Result};
use rayon::prelude::*;
use std::sync::atomic::{AtomicU32, Ordering};

/// Particle pool and phase kernels in host memory
pub struct CpuBackend {
    capacity: u32,
    particles: Vec<Particle>,
    free_list: Vec<AtomicU32>,
    alive: [Vec<AtomicU32>; 2],
    counters: [AtomicU32; 4],
    args: DrawArgs,
}

fn zeroed(len: u32) -> Vec<AtomicU32> {
    (0..len).map(|_| AtomicU32::new(0)).collect()
}

impl CpuBackend {
    pub fn new(capacity: u32) -> Result<Self> {
        if capacity == 0 {
            return Err(EmberError::ValidationError(
                "particle pool capacity must be non-zero".into(),
            ));
        }
        let mut backend = Self {
            capacity,
            particles: vec![Particle::default(); capacity as usize],
            free_list: zeroed(capacity),
            alive: [zeroed(capacity), zeroed(capacity)],
            counters: Default::default(),
            args: DrawArgs::default(),
        };
        backend.reset(0)?;
        Ok(backend)
    }

    /// What a renderer consumes for `role`: the store, the list and the draw arguments
    pub fn render_view(&self, role: Role) -> RenderView<'_> {
        RenderView {
            particles: &self.particles,
            alive: &self.alive[role.list_index()],
            args: self.args,
            count: self.counters[role.counter_index()].load(Ordering::Acquire),
        }
    }

    /// Saturating pop: claim `free[dead - 1]` iff `dead > 0`
    fn pop_free(&self) -> Option<u32> {
        let dead = &self.counters[DEAD_COUNTER];
        let mut current = dead.load(Ordering::Acquire);
        loop {
            if current == 0 {
                return None;
            }
            match dead.compare_exchange_weak(current, current - 1, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => return Some(self.free_list[(current - 1) as usize].load(Ordering::Relaxed)),
                Err(actual) => current = actual,
            }
        }
    }

    /// Post-increment the id counter. 0 marks a never-spawned record, so the
    /// value is burned when the counter wraps.
    fn claim_id(&self) -> u32 {
        let next_id = &self.counters[NEXT_ID_COUNTER];
        let id = next_id.fetch_add(1, Ordering::AcqRel);
        if id != 0 {
            return id;
        }
        next_id.fetch_add(1, Ordering::AcqRel)
    }

    fn push_free(&self, slot: u32) {
        let index = self.counters[DEAD_COUNTER].fetch_add(1, Ordering::AcqRel);
        self.free_list[index as usize].store(slot, Ordering::Relaxed);
    }

    fn append_alive(&self, role: Role, slot: u32) {
        let index = self.counters[role.counter_index()].fetch_add(1, Ordering::AcqRel);
        self.alive[role.list_index()][index as usize].store(slot, Ordering::Relaxed);
    }

    fn load_counters(&self) -> Counters {
        Counters {
            words: std::array::from_fn(|i| self.counters[i].load(Ordering::Acquire)),
        }
    }
}

impl ComputeBackend for CpuBackend {
    fn name(&self) -> &str {
        "cpu"
    }

    fn capacity(&self) -> u32 {
        self.capacity
    }

    fn reset(&mut self, mesh_index_count: u32) -> Result<()> {
        self.particles.fill(Particle::default());
        for (i, slot) in self.free_list.iter().enumerate() {
            slot.store(i as u32, Ordering::Relaxed);
        }
        for list in &self.alive {
            for entry in list {
                entry.store(0, Ordering::Relaxed);
            }
        }
        for (word, value) in self.counters.iter().zip(Counters::all_dead(self.capacity).words) {
            word.store(value, Ordering::Release);
        }
        self.args = DrawArgs::for_mesh(mesh_index_count);
        Ok(())
    }

    fn update_args(&mut self, current: Role) -> Result<()> {
        self.args.instance_count = self.counters[current.counter_index()].load(Ordering::Acquire);
        Ok(())
    }

    fn emit(&mut self, dispatch: &EmitDispatch) -> Result<()> {
        let params = &dispatch.params;
        let this = &*self;
        let spawned: Vec<(u32, Particle)> = (0..params.spawn_count())
            .into_par_iter()
            .filter_map(|i| {
                // An exhausted pool drops the request
                let slot = this.pop_free()?;
                let id = this.claim_id();
                this.append_alive(dispatch.current, slot);
                Some((slot, spawn_particle(params, i, id)))
            })
            .collect();

        for (slot, particle) in spawned {
            self.particles[slot as usize] = particle;
        }
        Ok(())
    }

    fn simulate(&mut self, dispatch: &SimulateDispatch) -> Result<()> {
        let src = dispatch.current;
        let dst = src.other();
        let motion = &dispatch.motion;
        let this = &*self;
        let updated: Vec<(u32, Particle)> = (0..dispatch.count)
            .into_par_iter()
            .map(|k| {
                let slot = this.alive[src.list_index()][k as usize].load(Ordering::Relaxed);
                let mut particle = this.particles[slot as usize];
                this.counters[src.counter_index()].fetch_sub(1, Ordering::AcqRel);
                if motion.advance(&mut particle) {
                    this.append_alive(dst, slot);
                } else {
                    this.push_free(slot);
                }
                (slot, particle)
            })
            .collect();

        for (slot, particle) in updated {
            self.particles[slot as usize] = particle;
        }
        Ok(())
    }

    fn read_counters(&mut self) -> Result<Counters> {
        Ok(self.load_counters())
    }

    fn read_draw_args(&mut self) -> Result<DrawArgs> {
        Ok(self.args)
    }

    fn snapshot(&mut self) -> Result<PoolSnapshot> {
        let load = |list: &[AtomicU32]| -> Vec<u32> {
            list.iter().map(|v| v.load(Ordering::Relaxed)).collect()
        };
        Ok(PoolSnapshot {
            counters: self.load_counters(),
            draw_args: self.args,
            particles: self.particles.clone(),
            free_list: load(&self.free_list),
            alive: [load(&self.alive[0]), load(&self.alive[1])],
        })
    }
}

/// Borrowed renderer input: instance `i` is the record at the i-th alive entry
pub struct RenderView<'a> {
    particles: &'a [Particle],
    alive: &'a [AtomicU32],
    args: DrawArgs,
    /// Live entries in `alive` when the view was taken
    count: u32,
}

impl<'a> RenderView<'a> {
    pub fn draw_args(&self) -> DrawArgs {
        self.args
    }

    /// Instances drawn, never more than the list holds
    pub fn instance_count(&self) -> u32 {
        self.args.instance_count.min(self.count)
    }

    pub fn instance(&self, i: u32) -> Option<&'a Particle> {
        if i >= self.instance_count() {
            return None;
        }
        let slot = self.alive.get(i as usize)?.load(Ordering::Relaxed);
        self.particles.get(slot as usize)
    }

    pub fn instances(&self) -> impl Iterator<Item = &'a Particle> + '_ {
        (0..self.instance_count()).filter_map(move |i| self.instance(i))
    }
}

impl std::fmt::Debug for CpuBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CpuBackend")
            .field("capacity", &self.capacity)
            .field("counters", &self.load_counters())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EmissionConfig, MotionConfig};
    use crate::emitter::EmitParams;
    use crate::motion::MotionStep;
    use ember_core::Vec3;
    use std::collections::HashSet;

    fn emit(backend: &mut CpuBackend, current: Role, count: u32, lifetime: f32) {
        let config = EmissionConfig {
            lifetime_min: lifetime,
            lifetime_max: lifetime,
            ..Default::default()
        };
        let params = EmitParams::new(&config, [1, 2, 3], count);
        backend.emit(&EmitDispatch { current, params }).unwrap();
    }

    fn simulate(backend: &mut CpuBackend, current: Role, dt: f32) {
        let count = backend.read_counters().unwrap().alive(current);
        let motion = MotionStep::new(&MotionConfig::default(), Vec3::ZERO, dt, 0.0);
        backend
            .simulate(&SimulateDispatch {
                current,
                count,
                motion,
            })
            .unwrap();
    }

    #[test]
    fn fresh_pool_is_all_dead() {
        let mut backend = CpuBackend::new(64).unwrap();
        let snap = backend.snapshot().unwrap();
        assert_eq!(snap.counters, Counters::all_dead(64));
        snap.check_partition().unwrap();
        assert!(CpuBackend::new(0).is_err());
    }

    #[test]
    fn emit_saturates_without_double_claims() {
        let mut backend = CpuBackend::new(1000).unwrap();
        emit(&mut backend, Role::A, 5000, 1.0);
        let snap = backend.snapshot().unwrap();
        assert_eq!(snap.counters.dead(), 0);
        assert_eq!(snap.counters.alive(Role::A), 1000);
        snap.check_partition().unwrap();

        let ids: HashSet<u32> = snap.alive_particles(Role::A).map(|p| p.id().raw()).collect();
        assert_eq!(ids.len(), 1000);
        assert!(ids.iter().all(|id| (1..=1000).contains(id)));

        // Nothing left to claim
        emit(&mut backend, Role::A, 10, 1.0);
        assert_eq!(backend.read_counters().unwrap().alive(Role::A), 1000);
    }

    #[test]
    fn simulate_moves_survivors_and_frees_the_rest() {
        let mut backend = CpuBackend::new(100).unwrap();
        emit(&mut backend, Role::A, 30, 2.0);
        emit(&mut backend, Role::A, 20, 0.5);
        simulate(&mut backend, Role::A, 1.0);

        let snap = backend.snapshot().unwrap();
        snap.check_partition().unwrap();
        assert_eq!(snap.counters.alive(Role::A), 0);
        assert_eq!(snap.counters.alive(Role::B), 30);
        assert_eq!(snap.counters.dead(), 70);
        assert!(snap.alive_particles(Role::B).all(|p| p.age() == 1.0));
    }

    #[test]
    fn update_args_copies_the_current_count() {
        let mut backend = CpuBackend::new(10).unwrap();
        backend.reset(36).unwrap();
        emit(&mut backend, Role::B, 4, 1.0);
        backend.update_args(Role::B).unwrap();
        let args = backend.read_draw_args().unwrap();
        assert_eq!(args.index_count, 36);
        assert_eq!(args.instance_count, 4);
        assert_eq!(backend.render_view(Role::B).instances().count(), 4);
        backend.update_args(Role::A).unwrap();
        assert_eq!(backend.render_view(Role::A).instances().count(), 0);
    }

    #[test]
    fn render_view_is_clamped_to_the_live_count() {
        let mut backend = CpuBackend::new(50).unwrap();
        emit(&mut backend, Role::A, 10, 1.0);
        backend.update_args(Role::A).unwrap();
        // Args still say 10, but every record retires into the free list
        simulate(&mut backend, Role::A, 1.0);
        let view = backend.render_view(Role::B);
        assert_eq!(view.draw_args().instance_count, 10);
        assert_eq!(view.instance_count(), 0);
        assert_eq!(view.instances().count(), 0);
    }

    #[test]
    fn id_counter_wrap_skips_zero() {
        let mut backend = CpuBackend::new(16).unwrap();
        backend.counters[NEXT_ID_COUNTER].store(u32::MAX - 1, Ordering::Release);
        emit(&mut backend, Role::A, 4, 5.0);

        let snap = backend.snapshot().unwrap();
        snap.check_partition().unwrap();
        let ids: HashSet<u32> = snap.alive_particles(Role::A).map(|p| p.id().raw()).collect();
        assert_eq!(ids, HashSet::from([u32::MAX - 1, u32::MAX, 1, 2]));
        assert_eq!(snap.counters.next_id(), 3);
    }

    #[test]
    fn reset_restores_everything() {
        let mut backend = CpuBackend::new(10).unwrap();
        emit(&mut backend, Role::A, 7, 1.0);
        backend.reset(6).unwrap();
        let snap = backend.snapshot().unwrap();
        assert_eq!(snap.counters, Counters::all_dead(10));
        assert_eq!(snap.draw_args, DrawArgs::for_mesh(6));
    }
}
