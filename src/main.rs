//! Headless host for the circle physics sandbox
//!
//! Owns the real-time frame loop: accumulates frame time, steps the engine
//! at the adaptive fixed timestep, reads the snapshot and interpolation
//! factor exactly like a display surface would, and reports telemetry once
//! per second.

use std::time::{Duration, Instant};

use clap::Parser;

use circledrop::{Engine, EngineConfig, StepClock};

/// 2D circle physics sandbox
///
/// All arguments are positional and numeric; omitted ones fall back to their
/// defaults. Flags are 0 or 1. Pixel quantities are converted to world units
/// where the arena half-height is 1.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Initial window width in pixels
    #[arg(default_value_t = 1920.0)]
    window_width: f32,

    /// Initial window height in pixels
    #[arg(default_value_t = 1080.0)]
    window_height: f32,

    /// Smallest spawned radius in pixels
    #[arg(default_value_t = 10.0)]
    min_radius: f32,

    /// Largest spawned radius in pixels
    #[arg(default_value_t = 30.0)]
    max_radius: f32,

    /// Maximum number of circles
    #[arg(default_value_t = 100_000)]
    spawn_limit: usize,

    /// Gravity in pixels per second squared
    #[arg(default_value_t = 98.1)]
    gravity: f32,

    /// Circles spawned per second (0 spawns everything at once)
    #[arg(default_value_t = 100.0)]
    spawn_rate: f32,

    /// Coefficient of restitution in [0, 1]
    #[arg(default_value_t = 0.5)]
    restitution: f32,

    /// Draw circle outlines, 0 or 1; forwarded to the display surface
    #[arg(default_value_t = 1)]
    outline_circles: u8,

    /// Target physics frequency in hertz
    #[arg(default_value_t = 120.0)]
    physics_frequency: f64,

    /// Allow the physics frequency to adapt to load, 0 or 1
    #[arg(default_value_t = 1)]
    scale_physics: u8,

    /// Positional correction iterations per step
    #[arg(default_value_t = 3)]
    correction_iterations: u32,
}

fn main() {
    env_logger::init();

    let args = Args::parse();

    // Nonsense dimensions and radii are repaired rather than rejected; the
    // engine config clamps the radius range itself
    let window_width = args.window_width.max(100.0);
    let window_height = args.window_height.max(100.0);
    let min_radius = if args.min_radius <= 0.0 { 10.0 } else { args.min_radius };
    let spawn_limit = if args.spawn_limit == 0 { 500 } else { args.spawn_limit };

    let aspect_ratio = window_width / window_height;

    // The arena spans [-aspect, aspect] x [-1, 1]; pixel quantities map to
    // world units through the window height
    let to_world = 2.0 / window_height;

    log::info!(
        "starting: window {window_width}x{window_height}, radii {min_radius}..{} px, \
         limit {spawn_limit}, gravity {}, spawn rate {}, restitution {}, outlines {}",
        args.max_radius,
        args.gravity,
        args.spawn_rate,
        args.restitution,
        args.outline_circles != 0
    );

    let engine = Engine::new(EngineConfig {
        min_radius: min_radius * to_world,
        max_radius: args.max_radius * to_world,
        spawn_limit,
        gravity: args.gravity * to_world,
        restitution: args.restitution,
        spawn_rate: args.spawn_rate,
        initial_aspect_ratio: aspect_ratio,
        initial_window_height: window_height,
        correction_iterations: args.correction_iterations,
        seed: None,
        single_threaded: false,
        spatial_partitioning: true,
    });

    let clock = StepClock::new(args.physics_frequency, args.scale_physics != 0);

    run(engine, clock, aspect_ratio);
}

fn run(mut engine: Engine, mut clock: StepClock, aspect_ratio: f32) -> ! {
    engine.set_world_bounds(aspect_ratio, 1.0);

    let start_time = Instant::now();
    let mut last_time = start_time;
    let mut last_report = start_time;

    let mut frame_count = 0u32;
    let mut step_count = 0u32;
    let mut accumulated_step_time = 0.0f64;
    let mut accumulated_candidate_pairs = 0usize;

    loop {
        let now = Instant::now();
        let frame_time = now.duration_since(last_time).as_secs_f64();
        last_time = now;

        clock.advance(frame_time);

        while clock.should_step() {
            let sim_time = now.duration_since(start_time).as_secs_f64();
            let before = Instant::now();
            accumulated_candidate_pairs += engine.step(sim_time, clock.fixed_step() as f32);
            let step_time = before.elapsed().as_secs_f64();
            clock.complete_step(step_time);

            accumulated_step_time += step_time;
            step_count += 1;
        }

        // A display surface would lerp previous and current positions with
        // this factor; read both here the way a renderer would
        let _alpha = clock.alpha();
        let _snapshot = engine.snapshot();

        frame_count += 1;

        let report_elapsed = now.duration_since(last_report).as_secs_f64();
        if report_elapsed >= 1.0 {
            log::info!("circle count: {}", engine.circle_count());
            log::info!("average fps: {:.1}", f64::from(frame_count) / report_elapsed);
            log::info!(
                "physics frequency: {} Hz ({:.2} ms)",
                clock.actual_hz(),
                clock.fixed_step() * 1000.0
            );
            if step_count > 0 {
                log::info!(
                    "average step time: {:.2} ms",
                    accumulated_step_time / f64::from(step_count) * 1000.0
                );
                log::info!(
                    "average candidate pairs: {}",
                    accumulated_candidate_pairs / step_count as usize
                );
            }

            frame_count = 0;
            step_count = 0;
            accumulated_step_time = 0.0;
            accumulated_candidate_pairs = 0;
            last_report = now;
        }

        // Stand-in for vsync pacing
        std::thread::sleep(Duration::from_millis(1));
    }
}
