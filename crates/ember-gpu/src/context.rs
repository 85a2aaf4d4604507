//! Headless wgpu device for compute work

use ember_core::{EmberError, Result};

/// Device and queue with no surface attached
pub struct GpuContext {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    adapter_name: String,
}

impl GpuContext {
    /// Request an adapter and a device with default limits
    pub async fn new() -> Result<Self> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok_or(EmberError::AdapterNotFound)?;

        let adapter_name = adapter.get_info().name;

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Ember Compute Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                    memory_hints: Default::default(),
                },
                None,
            )
            .await
            .map_err(|e| EmberError::DeviceError(e.to_string()))?;

        log::info!("Using GPU adapter: {adapter_name}");

        Ok(Self {
            device,
            queue,
            adapter_name,
        })
    }

    /// Blocking wrapper around [`GpuContext::new`]
    pub fn new_blocking() -> Result<Self> {
        pollster::block_on(Self::new())
    }

    pub fn adapter_name(&self) -> &str {
        &self.adapter_name
    }

    /// Largest pool the device can bind as one storage buffer
    pub fn max_capacity(&self, record_size: u64) -> u32 {
        let limit = self.device.limits().max_storage_buffer_binding_size as u64;
        (limit / record_size).min(u32::MAX as u64) as u32
    }

    /// Copy `size` bytes of `source` into a mappable buffer and read them back.
    /// Blocks until every previously submitted command has finished.
    pub fn read_buffer<T: bytemuck::Pod>(&self, source: &wgpu::Buffer, size: u64) -> Result<Vec<T>> {
        let staging = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Ember Readback Buffer"),
            size,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Readback Encoder"),
            });
        encoder.copy_buffer_to_buffer(source, 0, &staging, 0, size);
        self.queue.submit(std::iter::once(encoder.finish()));

        let slice = staging.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        self.device.poll(wgpu::Maintain::Wait);

        rx.recv()
            .map_err(|e| EmberError::ReadbackFailed(e.to_string()))?
            .map_err(|e| EmberError::ReadbackFailed(e.to_string()))?;

        let data = slice.get_mapped_range();
        let values = data
            .chunks_exact(std::mem::size_of::<T>())
            .map(bytemuck::pod_read_unaligned)
            .collect();

        drop(data);
        staging.unmap();

        Ok(values)
    }
}
