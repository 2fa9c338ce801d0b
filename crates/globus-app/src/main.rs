//! The binary entry point of the headless globe renderer.

use clap::Parser;
use glam::DVec2;
use globus_app::{AppError, FrameDriver, FrameLoop, PlatformDirs, Scene};
use globus_config::{CliArgs, Config};
use tracing::info;

fn main() {
    let args = CliArgs::parse();
    if let Err(e) = run(&args) {
        eprintln!("globus: {e}");
        std::process::exit(1);
    }
}

fn run(args: &CliArgs) -> Result<(), AppError> {
    let mut dirs = PlatformDirs::resolve()?;
    if let Some(config_dir) = &args.config {
        dirs = dirs.with_config_dir(config_dir);
    }
    dirs.create_dirs()?;

    let mut config = Config::load_or_create(&dirs.config_dir)?;
    config.apply_cli_overrides(args);
    globus_log::init_logging(Some(dirs.log_dir.as_path()), cfg!(debug_assertions), Some(&config));
    info!(config = %dirs.config_dir.display(), logs = %dirs.log_dir.display(), "starting");

    let mut scene = Scene::demo(&config)?;
    let mut driver = FrameDriver::new(&config)?;
    driver.set_pick_point(args.pick_point()?.map(|(x, y)| DVec2::new(x, y)));

    let mut frames = FrameLoop::new();
    for _ in 0..config.debug.frames {
        let report = frames.tick(|timestamp_ms| driver.render_frame(&mut scene, timestamp_ms))?;
        info!(
            frame = report.frame,
            ordered = report.ordered_renderables,
            surface = report.ordered_surface_renderables,
            draw_calls = report.draw_calls,
            picked = ?report.picked.as_ref().map(|p| p.kind),
            "frame complete"
        );
    }
    info!(frames = frames.frame_count(), "done");
    Ok(())
}
