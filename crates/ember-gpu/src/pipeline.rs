//! Compute pipelines for the three lifecycle phases

/// Threads per workgroup of the `emit` and `simulate` kernels
pub const WORKGROUP_SIZE: u32 = 256;

/// Binding slots of the shared lifecycle bind group
pub mod bindings {
    pub const PHASE: u32 = 0;
    pub const EMIT: u32 = 1;
    pub const SIM: u32 = 2;
    pub const PARTICLES: u32 = 3;
    pub const FREE_LIST: u32 = 4;
    pub const ALIVE_SRC: u32 = 5;
    pub const ALIVE_DST: u32 = 6;
    pub const COUNTERS: u32 = 7;
    pub const DRAW_ARGS: u32 = 8;
}

/// Workgroups needed to cover `items` work items
pub fn workgroups_for(items: u32) -> u32 {
    items.div_ceil(WORKGROUP_SIZE)
}

/// The `update_args`, `emit` and `simulate` pipelines over one bind group layout
pub struct LifecyclePipelines {
    pub bind_group_layout: wgpu::BindGroupLayout,
    pub update_args: wgpu::ComputePipeline,
    pub emit: wgpu::ComputePipeline,
    pub simulate: wgpu::ComputePipeline,
}

fn uniform_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn storage_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only: false },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

impl LifecyclePipelines {
    pub fn new(device: &wgpu::Device) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Particle Lifecycle Shader"),
            source: wgpu::ShaderSource::Wgsl(crate::LIFECYCLE_SHADER.into()),
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            entries: &[
                uniform_entry(bindings::PHASE),
                uniform_entry(bindings::EMIT),
                uniform_entry(bindings::SIM),
                storage_entry(bindings::PARTICLES),
                storage_entry(bindings::FREE_LIST),
                storage_entry(bindings::ALIVE_SRC),
                storage_entry(bindings::ALIVE_DST),
                storage_entry(bindings::COUNTERS),
                storage_entry(bindings::DRAW_ARGS),
            ],
            label: Some("Particle Lifecycle Bind Group Layout"),
        });

        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Particle Lifecycle Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let compute = |label: &str, entry_point: &str| {
            device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some(label),
                layout: Some(&layout),
                module: &shader,
                entry_point: Some(entry_point),
                compilation_options: Default::default(),
                cache: None,
            })
        };

        Self {
            update_args: compute("Particle UpdateArgs Pipeline", "update_args"),
            emit: compute("Particle Emit Pipeline", "emit"),
            simulate: compute("Particle Simulate Pipeline", "simulate"),
            bind_group_layout,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workgroup_rounding() {
        assert_eq!(workgroups_for(0), 0);
        assert_eq!(workgroups_for(1), 1);
        assert_eq!(workgroups_for(256), 1);
        assert_eq!(workgroups_for(257), 2);
        assert_eq!(workgroups_for(1_000_000), 3907);
    }
}
