//! Vulkan FTW
//!
//! Opens a window, bootstraps the Vulkan context on it and waits for the
//! window to close. Nothing is drawn; the context stops at "ready to record".

use std::process::ExitCode;

use ftw_engine::prelude::*;

const CONFIG_PATH: &str = "vulkan_ftw.toml";

fn init_logging(level: log::LevelFilter) {
    let mut builder = env_logger::Builder::from_default_env();
    // RUST_LOG wins over the configured level
    if std::env::var_os("RUST_LOG").is_none() {
        builder.filter_level(level);
    }
    builder.init();
}

fn run(config: &ApplicationConfig) -> Result<(), Box<dyn std::error::Error>> {
    let mut window = Window::new(&config.window.title, config.window.width, config.window.height)?;

    let mut bootstrap = Bootstrap::initialize(&config.renderer, &mut window)?;
    if let Some(gpu) = bootstrap.physical_device() {
        log::info!("Ready on {} ({:?})", gpu.name(), bootstrap.stage());
    }

    while !window.should_close() {
        window.wait_events();
        for event in window.drain_events() {
            match event {
                WindowEvent::CloseRequested => log::info!("Close requested"),
                WindowEvent::Resized(width, height) => {
                    log::warn!("Window resized to {}x{}; the swapchain is not re-created", width, height);
                }
                WindowEvent::Refresh => {}
            }
        }
    }

    bootstrap.teardown()?;
    Ok(())
}

fn main() -> ExitCode {
    let config = match ApplicationConfig::load_or_default(CONFIG_PATH).and_then(|config| {
        config.validate()?;
        Ok(config)
    }) {
        Ok(config) => config,
        Err(e) => {
            init_logging(log::LevelFilter::Info);
            log::error!("Invalid configuration in {}: {}", CONFIG_PATH, e);
            return ExitCode::FAILURE;
        }
    };

    init_logging(config.engine.level_filter());
    log::info!("Starting Vulkan FTW");

    match run(&config) {
        Ok(()) => {
            log::info!("Window closed, exiting");
            ExitCode::SUCCESS
        }
        Err(e) => {
            match e.downcast_ref::<VulkanError>() {
                Some(vulkan) => log::error!("Bootstrap failed at {}: {}", vulkan.stage_tag(), vulkan),
                None => log::error!("Startup failed: {}", e),
            }
            ExitCode::FAILURE
        }
    }
}
