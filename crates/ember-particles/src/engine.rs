//! Step orchestration: UpdateArgs → Emit → Simulate → conditional role swap

use crate::backend::{ComputeBackend, EmitDispatch, PoolSnapshot, SimulateDispatch};
use crate::config::EngineConfig;
use crate::emitter::EmitParams;
use crate::motion::MotionStep;
use crate::particle::{Counters, DrawArgs, Role};
use crate::rand::ParticleRng;
use crate::spawn::SpawnScheduler;
use ember_core::{EmberError, ParticleId, Result, Vec3};

/// Fixed timestep used by prewarm
pub const PREWARM_DT: f32 = 1.0 / 30.0;

/// What one step did
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepReport {
    /// 1-based index of the step
    pub step: u64,
    /// Spawn count handed to Emit
    pub requested: u32,
    /// Particles Emit actually claimed slots for
    pub emitted: u32,
    /// Snapshot count Simulate ran over (alive after Emit)
    pub simulated: u32,
    pub simulate_ran: bool,
    /// List holding the freshest particles after this step
    pub render_role: Role,
    /// Post-step counters, read only on diagnostic steps
    pub counters: Option<Counters>,
}

/// Owns a backend and drives the three-phase step over it.
///
/// Single-threaded: the engine issues phases in order and blocks once per
/// step on the post-Emit counter readback. The role of the current list is
/// host state; it flips only when Simulate ran. After a flip UpdateArgs runs
/// again for the new current list, so the draw arguments never count records
/// Simulate just retired.
pub struct ParticleEngine<B: ComputeBackend> {
    backend: B,
    config: EngineConfig,
    scheduler: SpawnScheduler,
    rng: ParticleRng,
    current: Role,
    /// `next_id` counter as of the last readback; ids claimed since give the emit count
    next_id: u32,
    pending_burst: u32,
    pointer: Option<Vec3>,
    /// Accumulated in f64; narrowed per step for the motion field
    time: f64,
    steps: u64,
}

impl<B: ComputeBackend> ParticleEngine<B> {
    /// Validate the configuration, reset the backend to the all-dead state,
    /// and prewarm if the configuration asks for it.
    pub fn new(backend: B, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        if backend.capacity() != config.capacity {
            return Err(EmberError::ValidationError(format!(
                "backend '{}' has {} slots, configuration asks for {}",
                backend.name(),
                backend.capacity(),
                config.capacity
            )));
        }

        let mut engine = Self {
            scheduler: SpawnScheduler::new(&config.emission),
            rng: ParticleRng::new(config.simulation.seed),
            backend,
            config,
            current: Role::A,
            next_id: ParticleId::FIRST.raw(),
            pending_burst: 0,
            pointer: None,
            time: 0.0,
            steps: 0,
        };
        engine.reset()?;
        log::info!(
            "Particle engine ready: {} slots on {}",
            engine.config.capacity,
            engine.backend.name()
        );

        if engine.config.simulation.prewarm {
            engine.prewarm(engine.config.simulation.prewarm_time)?;
        }
        Ok(engine)
    }

    /// Return to the all-dead state: every slot free, role A current, clocks at zero
    pub fn reset(&mut self) -> Result<()> {
        self.backend.reset(self.config.simulation.mesh_index_count)?;
        self.scheduler.reset();
        self.rng = ParticleRng::new(self.config.simulation.seed);
        self.current = Role::A;
        self.next_id = ParticleId::FIRST.raw();
        self.pending_burst = 0;
        self.time = 0.0;
        self.steps = 0;
        Ok(())
    }

    /// Run `ceil(seconds / PREWARM_DT)` steps at the fixed prewarm timestep
    pub fn prewarm(&mut self, seconds: f32) -> Result<()> {
        let steps = (seconds / PREWARM_DT).ceil().max(0.0) as u32;
        if steps == 0 {
            return Ok(());
        }
        log::info!("Prewarming {seconds}s ({steps} steps)");
        for _ in 0..steps {
            self.step(PREWARM_DT)?;
        }
        let counters = self.backend.read_counters()?;
        log::info!(
            "Prewarm finished: {} alive, {} dead",
            counters.alive(self.current),
            counters.dead()
        );
        Ok(())
    }

    /// Advance by `dt` seconds, spawning what the emission settings ask for
    pub fn step(&mut self, dt: f32) -> Result<StepReport> {
        let scheduled = self.scheduler.next(dt, self.pointer.is_some());
        let requested = scheduled.saturating_add(std::mem::take(&mut self.pending_burst));
        self.run_step(dt, requested)
    }

    /// Advance by `dt` seconds with an explicit spawn count
    pub fn run_step(&mut self, dt: f32, spawn_count: u32) -> Result<StepReport> {
        if !dt.is_finite() || dt < 0.0 {
            return Err(EmberError::ValidationError(format!(
                "timestep must be finite and non-negative, got {dt}"
            )));
        }
        let current = self.current;
        let capacity = self.backend.capacity();
        let requested = spawn_count.min(capacity);
        if spawn_count > capacity {
            log::warn!("Spawn request {spawn_count} clamped to pool capacity {capacity}");
        }

        self.backend.update_args(current)?;

        if requested > 0 {
            let params = EmitParams::new(&self.config.emission, self.rng.seed_triple(), requested);
            self.backend.emit(&EmitDispatch { current, params })?;
        }

        // Barrier: Emit is complete and its appends are visible
        let counters = self.backend.read_counters()?;
        let emitted = ids_claimed(self.next_id, counters.next_id());
        self.next_id = counters.next_id();
        if emitted < requested {
            log::debug!("Free list exhausted: emitted {emitted} of {requested} requested");
        }

        let simulated = counters.alive(current);
        let simulate_ran = simulated > 0;
        if simulate_ran {
            let motion = MotionStep::new(
                &self.config.motion,
                self.config.emission.position,
                dt,
                self.time as f32,
            )
            .with_pointer(self.pointer);
            self.backend.simulate(&SimulateDispatch {
                current,
                count: simulated,
                motion,
            })?;
            self.current = current.other();
            // Draw arguments follow the list the renderer now reads
            self.backend.update_args(self.current)?;
        } else {
            log::debug!("No live particles in list {current:?}; Simulate skipped");
        }

        self.time += dt as f64;
        self.steps += 1;

        let interval = self.config.simulation.diagnostics_interval as u64;
        let counters = if interval > 0 && self.steps % interval == 0 {
            let after = self.backend.read_counters()?;
            log::info!(
                "Step {}: {} alive, {} dead, {} spawned",
                self.steps,
                after.alive(self.current),
                after.dead(),
                emitted
            );
            Some(after)
        } else {
            None
        };

        Ok(StepReport {
            step: self.steps,
            requested,
            emitted,
            simulated,
            simulate_ran,
            render_role: self.current,
            counters,
        })
    }

    /// Add `count` particles to the next step's spawn request
    pub fn queue_burst(&mut self, count: u32) {
        self.pending_burst = self.pending_burst.saturating_add(count);
    }

    /// Set or clear the pointer position. While set, pointer attraction and
    /// pointer spawns are active.
    pub fn set_pointer(&mut self, pointer: Option<Vec3>) {
        self.pointer = pointer;
    }

    pub fn pointer(&self) -> Option<Vec3> {
        self.pointer
    }

    /// The list the next step emits into and simulates from
    pub fn current_role(&self) -> Role {
        self.current
    }

    /// The list a renderer should draw from. Always the freshest one, which
    /// after a swap is the list Simulate just filled.
    pub fn render_role(&self) -> Role {
        self.current
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn counters(&mut self) -> Result<Counters> {
        self.backend.read_counters()
    }

    pub fn draw_args(&mut self) -> Result<DrawArgs> {
        self.backend.read_draw_args()
    }

    pub fn snapshot(&mut self) -> Result<PoolSnapshot> {
        self.backend.snapshot()
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn into_backend(self) -> B {
        self.backend
    }
}

/// Ids Emit handed out while the id counter moved from `previous` to `next`.
/// The counter wraps, and a wrap burns the value 0 without spawning.
fn ids_claimed(previous: u32, next: u32) -> u32 {
    let delta = next.wrapping_sub(previous);
    if previous.wrapping_neg() < delta {
        delta - 1
    } else {
        delta
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EmissionConfig;
    use crate::cpu::CpuBackend;

    fn config(capacity: u32, lifetime: f32) -> EngineConfig {
        EngineConfig {
            capacity,
            emission: EmissionConfig {
                rate: 0.0,
                lifetime_min: lifetime,
                lifetime_max: lifetime,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn engine(capacity: u32, lifetime: f32) -> ParticleEngine<CpuBackend> {
        let backend = CpuBackend::new(capacity).unwrap();
        ParticleEngine::new(backend, config(capacity, lifetime)).unwrap()
    }

    #[test]
    fn two_step_lifecycle_scenario() {
        let mut e = engine(1000, 2.0);

        let r1 = e.run_step(1.0, 100).unwrap();
        assert_eq!(r1.emitted, 100);
        assert!(r1.simulate_ran);
        let c = e.counters().unwrap();
        assert_eq!(c.dead(), 900);
        assert_eq!(c.alive(e.current_role()), 100);
        assert_eq!(e.current_role(), Role::B);

        let r2 = e.run_step(1.0, 0).unwrap();
        assert!(r2.simulate_ran);
        let c = e.counters().unwrap();
        assert_eq!(c.dead(), 1000);
        assert_eq!(c.alive(Role::A), 0);
        assert_eq!(c.alive(Role::B), 0);

        let role = e.current_role();
        let r3 = e.run_step(1.0, 0).unwrap();
        assert!(!r3.simulate_ran);
        assert_eq!(e.current_role(), role);
    }

    #[test]
    fn empty_step_changes_nothing() {
        let mut e = engine(64, 1.0);
        let before = (e.counters().unwrap(), e.draw_args().unwrap(), e.current_role());
        let report = e.run_step(0.5, 0).unwrap();
        assert!(!report.simulate_ran);
        let after = (e.counters().unwrap(), e.draw_args().unwrap(), e.current_role());
        assert_eq!(before, after);
    }

    #[test]
    fn partition_holds_every_step() {
        let mut e = engine(500, 0.35);
        for i in 0..40u32 {
            let spawn = (i * 37) % 260;
            e.run_step(0.1, spawn).unwrap();
            let snap = e.snapshot().unwrap();
            snap.check_partition().unwrap();
            assert_eq!(snap.counters.alive(e.current_role().other()), 0);
        }
    }

    #[test]
    fn lifetime_survives_floor_l_over_dt_passes() {
        let mut e = engine(100, 2.5);
        e.run_step(1.0, 10).unwrap();
        let mut survivals = 0;
        loop {
            let alive = e.counters().unwrap().alive(e.current_role());
            if alive == 0 {
                break;
            }
            assert_eq!(alive, 10);
            survivals += 1;
            e.run_step(1.0, 0).unwrap();
        }
        assert_eq!(survivals, 2);
    }

    #[test]
    fn saturated_emit_reports_the_shortfall() {
        let mut e = engine(50, 10.0);
        let report = e.run_step(0.1, 80).unwrap();
        assert_eq!(report.requested, 50);
        assert_eq!(report.emitted, 50);
        let report = e.run_step(0.1, 5).unwrap();
        assert_eq!(report.emitted, 0);
        assert_eq!(e.counters().unwrap().dead(), 0);
    }

    #[test]
    fn ids_increase_across_steps() {
        let mut e = engine(100, 10.0);
        e.run_step(0.1, 10).unwrap();
        let first: Vec<u32> = e
            .snapshot()
            .unwrap()
            .alive_particles(e.current_role())
            .map(|p| p.id().raw())
            .collect();
        e.run_step(0.1, 10).unwrap();
        let snap = e.snapshot().unwrap();
        let newest = first.iter().max().copied().unwrap();
        let later: Vec<u32> = snap
            .alive_particles(e.current_role())
            .map(|p| p.id().raw())
            .filter(|id| !first.contains(id))
            .collect();
        assert_eq!(later.len(), 10);
        assert!(later.iter().all(|id| *id > newest));
    }

    #[test]
    fn draw_args_track_the_render_list() {
        let mut e = engine(100, 10.0);
        e.run_step(0.1, 7).unwrap();
        let args = e.draw_args().unwrap();
        assert_eq!(args.instance_count, 7);
        assert_eq!(args.index_count, 6);
        e.run_step(0.1, 0).unwrap();
        assert_eq!(e.draw_args().unwrap().instance_count, 7);
    }

    #[test]
    fn renderer_never_sees_retired_records() {
        let mut e = engine(100, 1.0);
        e.run_step(0.5, 10).unwrap();
        assert_eq!(e.backend().render_view(e.render_role()).instances().count(), 10);

        // Every particle retires on this step
        e.run_step(0.5, 0).unwrap();
        assert_eq!(e.draw_args().unwrap().instance_count, 0);
        assert_eq!(e.backend().render_view(e.render_role()).instances().count(), 0);

        let mut cfg = config(300, 0.2);
        cfg.emission.lifetime_max = 0.6;
        let mut e = ParticleEngine::new(CpuBackend::new(300).unwrap(), cfg).unwrap();
        for i in 0..30u32 {
            e.run_step(0.1, (i * 17) % 90).unwrap();
            let alive = e.counters().unwrap().alive(e.render_role());
            let view = e.backend().render_view(e.render_role());
            assert_eq!(view.instance_count(), alive);
            assert!(view.instances().all(|p| !p.is_expired()));
        }
    }

    #[test]
    fn bad_timestep_is_rejected() {
        let mut e = engine(10, 1.0);
        assert!(matches!(
            e.run_step(f32::NAN, 1),
            Err(EmberError::ValidationError(_))
        ));
        assert!(e.run_step(-0.1, 1).is_err());
        assert!(e.run_step(f32::INFINITY, 1).is_err());
        assert_eq!(e.steps(), 0);
        assert_eq!(e.counters().unwrap().dead(), 10);
        assert!(e.run_step(0.0, 1).is_ok());
    }

    #[test]
    fn clock_does_not_drift_over_long_runs() {
        let mut e = engine(8, 1.0);
        let dt = 1.0 / 60.0;
        for _ in 0..200_000 {
            e.run_step(dt, 0).unwrap();
        }
        let expected = 200_000.0 * dt as f64;
        assert!((e.time() - expected).abs() < 1e-6);
    }

    #[test]
    fn claimed_ids_skip_the_burned_zero() {
        assert_eq!(ids_claimed(1, 1), 0);
        assert_eq!(ids_claimed(5, 8), 3);
        // MAX, then 0 burned, then 1
        assert_eq!(ids_claimed(u32::MAX, 2), 2);
        // Only MAX; the counter rests at 0
        assert_eq!(ids_claimed(u32::MAX, 0), 1);
        // 0 burned, then 1
        assert_eq!(ids_claimed(0, 2), 1);
        assert_eq!(ids_claimed(0, 0), 0);
    }

    #[test]
    fn scheduled_rate_and_bursts() {
        let mut cfg = config(1000, 10.0);
        cfg.emission.rate = 100.0;
        let mut e = ParticleEngine::new(CpuBackend::new(1000).unwrap(), cfg).unwrap();
        assert_eq!(e.step(0.1).unwrap().emitted, 10);
        e.queue_burst(25);
        assert_eq!(e.step(0.1).unwrap().emitted, 35);
        assert_eq!(e.step(0.1).unwrap().emitted, 10);
    }

    #[test]
    fn prewarm_runs_fixed_steps() {
        let mut cfg = config(2000, 0.5);
        cfg.emission.rate = 300.0;
        cfg.simulation.prewarm = true;
        cfg.simulation.prewarm_time = 1.0;
        let mut e = ParticleEngine::new(CpuBackend::new(2000).unwrap(), cfg).unwrap();
        assert_eq!(e.steps(), 30);
        assert!((e.time() - 1.0).abs() < 1e-3);
        let alive = e.counters().unwrap().alive(e.current_role());
        assert!(alive > 0);
    }

    #[test]
    fn diagnostics_read_counters_on_interval() {
        let mut cfg = config(100, 10.0);
        cfg.simulation.diagnostics_interval = 3;
        let mut e = ParticleEngine::new(CpuBackend::new(100).unwrap(), cfg).unwrap();
        let reports: Vec<StepReport> = (0..6).map(|_| e.run_step(0.1, 1).unwrap()).collect();
        assert!(reports[0].counters.is_none());
        let third = reports[2].counters.unwrap();
        assert_eq!(third.alive(reports[2].render_role), 3);
        assert!(reports[5].counters.is_some());
    }

    #[test]
    fn capacity_mismatch_is_rejected() {
        let backend = CpuBackend::new(10).unwrap();
        assert!(ParticleEngine::new(backend, config(20, 1.0)).is_err());
    }

    #[test]
    fn pointer_activates_pointer_spawns() {
        let mut cfg = config(1000, 10.0);
        cfg.emission.pointer_rate = 200.0;
        let mut e = ParticleEngine::new(CpuBackend::new(1000).unwrap(), cfg).unwrap();
        assert_eq!(e.step(0.1).unwrap().requested, 0);
        e.set_pointer(Some(Vec3::new(1.0, 1.0, 0.0)));
        assert_eq!(e.step(0.1).unwrap().emitted, 20);
        e.set_pointer(None);
        assert_eq!(e.step(0.1).unwrap().requested, 0);
    }
}
