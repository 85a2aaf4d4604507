//! Device buffers of the particle pool and the two role bind groups

use crate::pipeline::bindings;
use ember_particles::{Counters, DrawArgs, EmitParams, Particle, PhaseParams, Role, SimParams};
use std::mem::size_of;

/// Every buffer the lifecycle kernels touch
pub struct PoolBuffers {
    pub capacity: u32,
    pub particles: wgpu::Buffer,
    pub free_list: wgpu::Buffer,
    /// Indexed by `Role::list_index`
    pub alive: [wgpu::Buffer; 2],
    pub counters: wgpu::Buffer,
    pub draw_args: wgpu::Buffer,
    pub phase_params: wgpu::Buffer,
    pub emit_params: wgpu::Buffer,
    pub sim_params: wgpu::Buffer,
    /// Indexed by the current role's `list_index`
    bind_groups: [wgpu::BindGroup; 2],
}

/// What a renderer binds to draw the pool: `draw_indexed_indirect(draw_args, 0)`
/// with instance `i` reading `particles[alive[i]]`.
pub struct RenderBuffers<'a> {
    pub particles: &'a wgpu::Buffer,
    pub alive: &'a wgpu::Buffer,
    pub draw_args: &'a wgpu::Buffer,
}

fn storage_buffer(
    device: &wgpu::Device,
    label: &str,
    size: u64,
    extra: wgpu::BufferUsages,
) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some(label),
        size,
        usage: wgpu::BufferUsages::STORAGE
            | wgpu::BufferUsages::COPY_SRC
            | wgpu::BufferUsages::COPY_DST
            | extra,
        mapped_at_creation: false,
    })
}

fn entry(binding: u32, buffer: &wgpu::Buffer) -> wgpu::BindGroupEntry<'_> {
    wgpu::BindGroupEntry {
        binding,
        resource: buffer.as_entire_binding(),
    }
}

fn uniform_buffer(device: &wgpu::Device, label: &str, size: usize) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some(label),
        size: size as u64,
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

impl PoolBuffers {
    pub fn new(device: &wgpu::Device, layout: &wgpu::BindGroupLayout, capacity: u32) -> Self {
        let slots = capacity as u64;
        let index_bytes = slots * size_of::<u32>() as u64;

        let particles = storage_buffer(
            device,
            "Particle Store",
            slots * size_of::<Particle>() as u64,
            wgpu::BufferUsages::VERTEX,
        );
        let free_list = storage_buffer(
            device,
            "Particle Free List",
            index_bytes,
            wgpu::BufferUsages::empty(),
        );
        let alive = [
            storage_buffer(device, "Particle Alive List A", index_bytes, wgpu::BufferUsages::VERTEX),
            storage_buffer(device, "Particle Alive List B", index_bytes, wgpu::BufferUsages::VERTEX),
        ];
        let counters = storage_buffer(
            device,
            "Particle Counters",
            size_of::<Counters>() as u64,
            wgpu::BufferUsages::empty(),
        );
        let draw_args = storage_buffer(
            device,
            "Particle Draw Args",
            size_of::<DrawArgs>() as u64,
            wgpu::BufferUsages::INDIRECT,
        );

        let phase_params = uniform_buffer(device, "Particle Phase Params", size_of::<PhaseParams>());
        let emit_params = uniform_buffer(device, "Particle Emit Params", size_of::<EmitParams>());
        let sim_params = uniform_buffer(device, "Particle Sim Params", size_of::<SimParams>());

        let bind_group = |label: &str, src: &wgpu::Buffer, dst: &wgpu::Buffer| {
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(label),
                layout,
                entries: &[
                    entry(bindings::PHASE, &phase_params),
                    entry(bindings::EMIT, &emit_params),
                    entry(bindings::SIM, &sim_params),
                    entry(bindings::PARTICLES, &particles),
                    entry(bindings::FREE_LIST, &free_list),
                    entry(bindings::ALIVE_SRC, src),
                    entry(bindings::ALIVE_DST, dst),
                    entry(bindings::COUNTERS, &counters),
                    entry(bindings::DRAW_ARGS, &draw_args),
                ],
            })
        };
        let bind_groups = [
            bind_group("Particle Bind Group (A current)", &alive[0], &alive[1]),
            bind_group("Particle Bind Group (B current)", &alive[1], &alive[0]),
        ];

        Self {
            capacity,
            particles,
            free_list,
            alive,
            counters,
            draw_args,
            phase_params,
            emit_params,
            sim_params,
            bind_groups,
        }
    }

    /// Bind group with `current` as the Emit/Simulate source list
    pub fn bind_group(&self, current: Role) -> &wgpu::BindGroup {
        &self.bind_groups[current.list_index()]
    }

    pub fn render_buffers(&self, role: Role) -> RenderBuffers<'_> {
        RenderBuffers {
            particles: &self.particles,
            alive: &self.alive[role.list_index()],
            draw_args: &self.draw_args,
        }
    }

    /// Queue the all-dead state: free list `0..capacity`, empty alive lists,
    /// zeroed records, fresh counters and draw arguments for the mesh.
    pub fn reset(&self, device: &wgpu::Device, queue: &wgpu::Queue, mesh_index_count: u32) {
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Particle Pool Reset Encoder"),
        });
        encoder.clear_buffer(&self.particles, 0, None);
        for list in &self.alive {
            encoder.clear_buffer(list, 0, None);
        }
        queue.submit(std::iter::once(encoder.finish()));

        let slots: Vec<u32> = (0..self.capacity).collect();
        queue.write_buffer(&self.free_list, 0, bytemuck::cast_slice(&slots));
        queue.write_buffer(
            &self.counters,
            0,
            bytemuck::bytes_of(&Counters::all_dead(self.capacity)),
        );
        queue.write_buffer(
            &self.draw_args,
            0,
            bytemuck::bytes_of(&DrawArgs::for_mesh(mesh_index_count)),
        );
        queue.submit(std::iter::empty());
    }

    pub fn particle_bytes(&self) -> u64 {
        self.capacity as u64 * size_of::<Particle>() as u64
    }

    pub fn index_bytes(&self) -> u64 {
        self.capacity as u64 * size_of::<u32>() as u64
    }
}
