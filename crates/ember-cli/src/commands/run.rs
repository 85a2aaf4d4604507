//! Headless simulation command

use anyhow::{Context, Result};
use ember_core::Vec3;
use ember_gpu::GpuBackend;
use ember_particles::{ComputeBackend, CpuBackend, EngineConfig, ParticleEngine, StepReport};
use std::time::Instant;

pub struct RunArgs {
    pub config: Option<String>,
    pub backend: String,
    pub steps: u32,
    pub dt: f32,
    pub capacity: Option<u32>,
    pub prewarm: bool,
    pub pointer: Option<[f32; 3]>,
    pub report_every: u32,
    pub verify: bool,
}

pub fn run(args: RunArgs) -> Result<()> {
    let config = load_config(&args)?;
    log::info!(
        "Running {} steps of {:.4} s on {} slots",
        args.steps,
        args.dt,
        config.capacity
    );

    match args.backend.as_str() {
        "gpu" => {
            let backend = GpuBackend::headless(config.capacity)
                .context("Failed to create the wgpu backend")?;
            drive(backend, config, &args)
        }
        _ => {
            let backend = CpuBackend::new(config.capacity)?;
            drive(backend, config, &args)
        }
    }
}

fn load_config(args: &RunArgs) -> Result<EngineConfig> {
    let mut config = match &args.config {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("Failed to load config: {}", path))?,
        None => EngineConfig::default(),
    };
    if let Some(capacity) = args.capacity {
        config.capacity = capacity;
    }
    if args.prewarm {
        config.simulation.prewarm = true;
    }
    config.validate()?;
    Ok(config)
}

fn drive<B: ComputeBackend>(backend: B, config: EngineConfig, args: &RunArgs) -> Result<()> {
    let name = backend.name().to_string();
    let mut engine = ParticleEngine::new(backend, config)?;
    engine.set_pointer(args.pointer.map(Vec3::from));

    println!("Backend: {}", name);

    let start = Instant::now();
    let mut emitted: u64 = 0;
    for i in 0..args.steps {
        let report = engine.step(args.dt)?;
        emitted += report.emitted as u64;
        if args.report_every > 0 && (i + 1) % args.report_every == 0 {
            print_report(&mut engine, &report)?;
        }
    }
    let elapsed = start.elapsed();

    let counters = engine.counters()?;
    let args_block = engine.draw_args()?;
    println!();
    println!(
        "Finished {} steps in {:.2?} ({:.3} ms/step)",
        args.steps,
        elapsed,
        elapsed.as_secs_f64() * 1000.0 / args.steps.max(1) as f64
    );
    println!("  emitted:   {}", emitted);
    println!(
        "  alive:     {} (drawing {} instances)",
        counters.alive(engine.current_role()),
        args_block.instance_count
    );
    println!("  dead:      {}", counters.dead());
    println!("  next id:   {}", counters.next_id());

    if args.verify {
        engine
            .snapshot()?
            .check_partition()
            .context("Pool verification failed")?;
        println!("  verify:    free list and alive list partition the pool");
    }
    Ok(())
}

fn print_report<B: ComputeBackend>(
    engine: &mut ParticleEngine<B>,
    report: &StepReport,
) -> Result<()> {
    let counters = match report.counters {
        Some(c) => c,
        None => engine.counters()?,
    };
    println!(
        "step {:>6}  t={:>7.2}s  emitted {:>6}/{:<6}  alive {:>8}  dead {:>8}",
        report.step,
        engine.time(),
        report.emitted,
        report.requested,
        counters.alive(engine.current_role()),
        counters.dead()
    );
    Ok(())
}
