//! Ember GPU - wgpu compute backend for the particle lifecycle
//!
//! Runs UpdateArgs, Emit and Simulate as WGSL compute kernels over
//! device-resident buffers. The particle store, alive lists and draw
//! arguments stay on the device, where a renderer can bind them directly
//! for an indirect instanced draw.

mod backend;
mod context;
pub mod pipeline;
mod pool;

pub use backend::GpuBackend;
pub use context::GpuContext;
pub use pipeline::{LifecyclePipelines, WORKGROUP_SIZE};
pub use pool::{PoolBuffers, RenderBuffers};

/// WGSL source of the lifecycle kernels
pub const LIFECYCLE_SHADER: &str = include_str!("lifecycle.wgsl");
