//! `ComputeBackend` on a wgpu device

use crate::context::GpuContext;
use crate::pipeline::{workgroups_for, LifecyclePipelines};
use crate::pool::{PoolBuffers, RenderBuffers};
use ember_core::{EmberError, Result};
use ember_particles::{
    ComputeBackend, Counters, DrawArgs, EmitDispatch, Particle, PhaseParams, PoolSnapshot, Role,
    SimParams, SimulateDispatch,
};
use std::mem::size_of;

/// Particle pool resident in device memory.
///
/// Each phase is its own submission: parameter uploads queued with
/// `write_buffer` land before the dispatch that reads them, and submissions
/// on one queue execute in order, so every phase sees the previous phase's
/// writes. `read_counters` waits for the queue to drain.
pub struct GpuBackend {
    context: GpuContext,
    pipelines: LifecyclePipelines,
    pool: PoolBuffers,
    name: String,
}

impl GpuBackend {
    pub fn new(context: GpuContext, capacity: u32) -> Result<Self> {
        if capacity == 0 {
            return Err(EmberError::ValidationError(
                "particle pool capacity must be non-zero".into(),
            ));
        }
        let max = context.max_capacity(size_of::<Particle>() as u64);
        if capacity > max {
            return Err(EmberError::ValueOutOfRange {
                field: "capacity".into(),
                min: 1.0,
                max: max as f64,
                value: capacity as f64,
            });
        }

        let pipelines = LifecyclePipelines::new(&context.device);
        let pool = PoolBuffers::new(&context.device, &pipelines.bind_group_layout, capacity);
        pool.reset(&context.device, &context.queue, 0);
        let name = format!("wgpu ({})", context.adapter_name());

        Ok(Self {
            context,
            pipelines,
            pool,
            name,
        })
    }

    /// Convenience: headless device plus backend
    pub fn headless(capacity: u32) -> Result<Self> {
        Self::new(GpuContext::new_blocking()?, capacity)
    }

    pub fn context(&self) -> &GpuContext {
        &self.context
    }

    /// Buffers a renderer reads for `role`
    pub fn render_buffers(&self, role: Role) -> RenderBuffers<'_> {
        self.pool.render_buffers(role)
    }

    fn write_phase(&self, current: Role) {
        let params = PhaseParams::new(current, self.pool.capacity);
        self.context
            .queue
            .write_buffer(&self.pool.phase_params, 0, bytemuck::bytes_of(&params));
    }

    fn dispatch(&self, label: &str, pipeline: &wgpu::ComputePipeline, current: Role, workgroups: u32) {
        let mut encoder = self
            .context
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some(label) });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some(label),
                timestamp_writes: None,
            });
            pass.set_pipeline(pipeline);
            pass.set_bind_group(0, self.pool.bind_group(current), &[]);
            pass.dispatch_workgroups(workgroups, 1, 1);
        }
        self.context.queue.submit(std::iter::once(encoder.finish()));
    }
}

impl ComputeBackend for GpuBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn capacity(&self) -> u32 {
        self.pool.capacity
    }

    fn reset(&mut self, mesh_index_count: u32) -> Result<()> {
        self.pool
            .reset(&self.context.device, &self.context.queue, mesh_index_count);
        Ok(())
    }

    fn update_args(&mut self, current: Role) -> Result<()> {
        self.write_phase(current);
        self.dispatch("Particle UpdateArgs", &self.pipelines.update_args, current, 1);
        Ok(())
    }

    fn emit(&mut self, dispatch: &EmitDispatch) -> Result<()> {
        let count = dispatch.params.spawn_count();
        if count == 0 {
            return Ok(());
        }
        self.write_phase(dispatch.current);
        self.context.queue.write_buffer(
            &self.pool.emit_params,
            0,
            bytemuck::bytes_of(&dispatch.params),
        );
        self.dispatch(
            "Particle Emit",
            &self.pipelines.emit,
            dispatch.current,
            workgroups_for(count),
        );
        Ok(())
    }

    fn simulate(&mut self, dispatch: &SimulateDispatch) -> Result<()> {
        if dispatch.count == 0 {
            return Ok(());
        }
        let params = SimParams::new(&dispatch.motion, dispatch.count);
        self.write_phase(dispatch.current);
        self.context
            .queue
            .write_buffer(&self.pool.sim_params, 0, bytemuck::bytes_of(&params));
        self.dispatch(
            "Particle Simulate",
            &self.pipelines.simulate,
            dispatch.current,
            workgroups_for(dispatch.count),
        );
        Ok(())
    }

    fn read_counters(&mut self) -> Result<Counters> {
        let words: Vec<Counters> = self
            .context
            .read_buffer(&self.pool.counters, size_of::<Counters>() as u64)?;
        words
            .into_iter()
            .next()
            .ok_or_else(|| EmberError::ReadbackFailed("empty counter readback".into()))
    }

    fn read_draw_args(&mut self) -> Result<DrawArgs> {
        let args: Vec<DrawArgs> = self
            .context
            .read_buffer(&self.pool.draw_args, size_of::<DrawArgs>() as u64)?;
        args.into_iter()
            .next()
            .ok_or_else(|| EmberError::ReadbackFailed("empty draw-args readback".into()))
    }

    fn snapshot(&mut self) -> Result<PoolSnapshot> {
        let index_bytes = self.pool.index_bytes();
        let particles = self
            .context
            .read_buffer(&self.pool.particles, self.pool.particle_bytes())?;
        let free_list = self.context.read_buffer(&self.pool.free_list, index_bytes)?;
        let alive_a = self.context.read_buffer(&self.pool.alive[0], index_bytes)?;
        let alive_b = self.context.read_buffer(&self.pool.alive[1], index_bytes)?;
        Ok(PoolSnapshot {
            counters: self.read_counters()?,
            draw_args: self.read_draw_args()?,
            particles,
            free_list,
            alive: [alive_a, alive_b],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_particles::{EmissionConfig, EmitParams, NEXT_ID_COUNTER};
    use std::collections::HashSet;

    #[test]
    fn id_counter_wrap_skips_zero() {
        let Ok(mut backend) = GpuBackend::headless(16) else {
            eprintln!("No GPU adapter available, skipping");
            return;
        };
        let mut counters = Counters::all_dead(16);
        counters.words[NEXT_ID_COUNTER] = u32::MAX - 1;
        backend
            .context
            .queue
            .write_buffer(&backend.pool.counters, 0, bytemuck::bytes_of(&counters));

        let config = EmissionConfig {
            lifetime_min: 5.0,
            lifetime_max: 5.0,
            ..Default::default()
        };
        let params = EmitParams::new(&config, [1, 2, 3], 4);
        backend
            .emit(&EmitDispatch {
                current: Role::A,
                params,
            })
            .unwrap();

        let snap = backend.snapshot().unwrap();
        snap.check_partition().unwrap();
        let ids: HashSet<u32> = snap.alive_particles(Role::A).map(|p| p.id().raw()).collect();
        assert_eq!(ids, HashSet::from([u32::MAX - 1, u32::MAX, 1, 2]));
        assert_eq!(snap.counters.next_id(), 3);
    }
}
