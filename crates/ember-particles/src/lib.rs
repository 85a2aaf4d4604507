//! Ember Particles - device-resident particle lifecycle engine
//!
//! Sustains a fixed-capacity particle population with:
//! - A particle store addressed by slot index
//! - A free list (dead pool) of unused slots
//! - Two alive-index lists whose source/destination roles swap every step
//! - Atomic step counters tying the three collections together
//! - A draw-argument block for indirect instanced rendering
//! - The three-phase step: UpdateArgs → Emit → Simulate
//!
//! The phases run behind the [`ComputeBackend`] seam. [`CpuBackend`] executes
//! every work item on the rayon pool against atomic counters; the wgpu
//! backend lives in `ember-gpu`. [`ParticleEngine`] is the single-threaded
//! orchestrator driving either one.

pub mod backend;
pub mod config;
pub mod cpu;
pub mod curves;
pub mod emitter;
pub mod engine;
pub mod motion;
pub mod particle;
pub mod rand;
pub mod spawn;

pub use backend::{ComputeBackend, EmitDispatch, PoolSnapshot, SimulateDispatch};
pub use config::{EmissionConfig, EngineConfig, MotionConfig, SimulationConfig, MAX_CAPACITY};
pub use cpu::{CpuBackend, RenderView};
pub use emitter::{EmissionShape, EmitParams};
pub use engine::{ParticleEngine, StepReport, PREWARM_DT};
pub use motion::{BoundaryMode, ColorMode, MotionPolicy, MotionStep, PointerAttraction, SimParams};
pub use particle::{
    Counters, DrawArgs, Particle, PhaseParams, Role, DEAD_COUNTER, NEXT_ID_COUNTER,
};
pub use spawn::SpawnScheduler;
