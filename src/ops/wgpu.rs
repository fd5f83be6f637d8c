//! GPU-accelerated matrix multiplication using WGPU.
//!
//! This module owns the process-wide GPU context (adapter, device, queue and
//! the precompiled `matmul` compute pipeline) and the blocking dispatch that
//! runs one multiplication on it.
//!
//! The context is created lazily on first use via `lazy_static`. If no
//! adapter or device can be acquired, [`context`] returns `None` and the
//! dispatcher stays on the host path; that is a policy decision, not an
//! error. Once a multiplication has been submitted, every device-side
//! failure is reported as a [`GpuFailure`].
//!
//! All device errors are captured through error scopes so that a failing
//! submission surfaces as a `Result` rather than through wgpu's uncaptured
//! error handler.

use std::sync::mpsc;

use thiserror::Error;
use wgpu::util::DeviceExt;

use crate::matrix::Matrix;

const MATMUL: &str = include_str!("shaders/matmul.wgsl");

/// Side of the square workgroup declared in `matmul.wgsl`.
const WORKGROUP_SIZE: u32 = 16;

/// Errors raised while creating the GPU context.
#[derive(Debug, Error)]
pub enum GpuError {
    /// No suitable adapter.
    #[error("adapter error: {0}")]
    Adapter(#[from] wgpu::RequestAdapterError),
    /// The adapter refused to create a device.
    #[error("device error: {0}")]
    Device(#[from] wgpu::RequestDeviceError),
    /// The shader or pipeline failed validation.
    #[error("pipeline error: {0}")]
    Pipeline(String),
}

/// Errors raised by a multiplication after it was dispatched.
#[derive(Debug, Error)]
pub enum GpuFailure {
    /// There is no GPU context to dispatch to.
    #[error("no accelerator available")]
    Unavailable,
    /// Operands exceed the device's buffer or dispatch limits.
    #[error("operands {m}x{k} * {k}x{n} exceed device limits")]
    TooLarge { m: usize, k: usize, n: usize },
    /// The device reported a validation or out-of-memory error.
    #[error("device error: {0}")]
    Device(String),
    /// Waiting for the queue failed.
    #[error("poll error: {0}")]
    Poll(String),
    /// Reading the result back failed.
    #[error("readback error: {0}")]
    Map(String),
}

/// Holds the WGPU device, queue and the compiled `matmul` pipeline.
///
/// Initialized once globally and reused for all multiplications.
pub struct GpuContext {
    /// The actual GPU device.
    pub device: wgpu::Device,
    /// The queue commands are submitted to.
    pub queue: wgpu::Queue,
    bind_group_layout: wgpu::BindGroupLayout,
    pipeline: wgpu::ComputePipeline,
}

impl GpuContext {
    /// Selects the default adapter, creates a device and queue, and compiles
    /// the `matmul` pipeline.
    ///
    /// # Errors
    ///
    /// - [`GpuError::Adapter`] / [`GpuError::Device`] if acquisition fails
    /// - [`GpuError::Pipeline`] if the shader does not validate on this device
    pub fn new() -> Result<Self, GpuError> {
        let instance = wgpu::Instance::default();
        let adapter =
            pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions::default()))?;
        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("tiny_cnn"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            memory_hints: wgpu::MemoryHints::Performance,
            trace: wgpu::Trace::default(),
        }))?;

        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("matmul"),
            source: wgpu::ShaderSource::Wgsl(MATMUL.into()),
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("matmul_bgl"),
            entries: &[
                layout_entry(0, wgpu::BufferBindingType::Uniform),
                layout_entry(1, wgpu::BufferBindingType::Storage { read_only: true }),
                layout_entry(2, wgpu::BufferBindingType::Storage { read_only: true }),
                layout_entry(3, wgpu::BufferBindingType::Storage { read_only: false }),
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("matmul_pipeline_layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("matmul_pipeline"),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point: Some("main"),
            cache: None,
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        });

        if let Some(err) = pollster::block_on(device.pop_error_scope()) {
            return Err(GpuError::Pipeline(err.to_string()));
        }

        log::debug!("GPU context ready on {:?}", adapter.get_info().name);

        Ok(Self {
            device,
            queue,
            bind_group_layout,
            pipeline,
        })
    }

    /// Whether an `m x k` by `k x n` product fits this device's limits.
    #[must_use]
    pub fn fits(&self, m: usize, k: usize, n: usize) -> bool {
        let limits = self.device.limits();
        let max_binding = u64::from(limits.max_storage_buffer_binding_size).min(limits.max_buffer_size);
        let max_groups = u64::from(limits.max_compute_workgroups_per_dimension);
        let bytes = |len: usize| (len as u64).saturating_mul(4);

        [m, k, n].iter().all(|&d| u32::try_from(d).is_ok())
            && bytes(m.saturating_mul(k)) <= max_binding
            && bytes(k.saturating_mul(n)) <= max_binding
            && bytes(m.saturating_mul(n)) <= max_binding
            && (m as u64).div_ceil(u64::from(WORKGROUP_SIZE)) <= max_groups
            && (n as u64).div_ceil(u64::from(WORKGROUP_SIZE)) <= max_groups
    }

    /// Runs `out = a x b` on the device and blocks until the result is read back.
    fn run_matmul(
        &self,
        a: &[f32],
        b: &[f32],
        out: &mut [f32],
        (m, k, n): (u32, u32, u32),
    ) -> Result<(), GpuFailure> {
        let device = &self.device;
        let out_bytes = (out.len() * size_of::<f32>()) as u64;

        device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let dims = [m, k, n, 0u32];
        let dims_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("dims"),
            contents: bytemuck::bytes_of(&dims),
            usage: wgpu::BufferUsages::UNIFORM,
        });

        let a_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("A"),
            contents: bytemuck::cast_slice(a),
            usage: wgpu::BufferUsages::STORAGE,
        });

        let b_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("B"),
            contents: bytemuck::cast_slice(b),
            usage: wgpu::BufferUsages::STORAGE,
        });

        let c_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("C"),
            size: out_bytes,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });

        let staging_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("staging"),
            size: out_bytes,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("matmul_bind_group"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: dims_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: a_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: b_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: c_buffer.as_entire_binding(),
                },
            ],
        });

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("matmul_encoder"),
        });

        {
            let mut compute_pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("matmul_pass"),
                timestamp_writes: None,
            });
            compute_pass.set_pipeline(&self.pipeline);
            compute_pass.set_bind_group(0, &bind_group, &[]);
            compute_pass.dispatch_workgroups(n.div_ceil(WORKGROUP_SIZE), m.div_ceil(WORKGROUP_SIZE), 1);
        }

        encoder.copy_buffer_to_buffer(&c_buffer, 0, &staging_buffer, 0, out_bytes);

        self.queue.submit(Some(encoder.finish()));

        let validation = pollster::block_on(device.pop_error_scope());
        let out_of_memory = pollster::block_on(device.pop_error_scope());
        if let Some(err) = validation.or(out_of_memory) {
            return Err(GpuFailure::Device(err.to_string()));
        }

        let buffer_slice = staging_buffer.slice(..);
        let (tx, rx) = mpsc::channel();
        buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });

        device
            .poll(wgpu::PollType::Wait)
            .map_err(|e| GpuFailure::Poll(e.to_string()))?;

        rx.recv()
            .map_err(|_| GpuFailure::Map("map callback never ran".into()))?
            .map_err(|e| GpuFailure::Map(e.to_string()))?;

        {
            let view = buffer_slice.get_mapped_range();
            out.copy_from_slice(bytemuck::cast_slice(&view[..]));
        }
        staging_buffer.unmap();

        Ok(())
    }
}

fn layout_entry(binding: u32, ty: wgpu::BufferBindingType) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

lazy_static::lazy_static! {
    static ref GPU_CONTEXT: Option<GpuContext> = match GpuContext::new() {
        Ok(ctx) => Some(ctx),
        Err(err) => {
            log::warn!("accelerator unavailable, multiplies stay on the host: {err}");
            None
        }
    };
}

/// Returns the shared GPU context, creating it on first call.
///
/// `None` means no accelerator could be acquired; this is cached.
pub fn context() -> Option<&'static GpuContext> {
    GPU_CONTEXT.as_ref()
}

/// Multiplies `a x b` on the GPU.
///
/// The caller guarantees `a.cols() == b.rows()`.
///
/// # Errors
///
/// Returns a [`GpuFailure`] if there is no context, the operands are too
/// large for the device, or the device fails during execution. A failed
/// call never returns a partially written matrix.
pub fn matmul(a: &Matrix, b: &Matrix) -> Result<Matrix, GpuFailure> {
    let (m, k) = a.shape();
    let n = b.cols();

    if m == 0 || k == 0 || n == 0 {
        return Ok(Matrix::new(m, n));
    }

    let ctx = context().ok_or(GpuFailure::Unavailable)?;
    if !ctx.fits(m, k, n) {
        return Err(GpuFailure::TooLarge { m, k, n });
    }
    let dims = (
        u32::try_from(m).map_err(|_| GpuFailure::TooLarge { m, k, n })?,
        u32::try_from(k).map_err(|_| GpuFailure::TooLarge { m, k, n })?,
        u32::try_from(n).map_err(|_| GpuFailure::TooLarge { m, k, n })?,
    );

    let mut out = Matrix::new(m, n);
    ctx.run_matmul(a.as_slice(), b.as_slice(), out.as_mut_slice(), dims)?;
    Ok(out)
}
