mod app;
mod application;
mod cli;
mod config;
mod domain;
mod tools;
mod ui;
mod utils;

use std::process::ExitCode;

use clap::Parser;
use iced::{window, Size};
use tracing::error;
use tracing_subscriber::EnvFilter;

use crate::application::DownloadCoordinator;
use crate::config::AppConfig;
use crate::tools::Toolchain;

fn main() -> ExitCode {
    let cli = cli::Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| cli.log_directive().into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = cli.to_config();
    let toolchain = Toolchain::discover(&config.tools);

    if cli.interactive {
        return run_interactive(config, toolchain);
    }

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(%e, "failed to start async runtime");
            return ExitCode::FAILURE;
        }
    };

    runtime.block_on(async {
        if cli.check_tools {
            cli::check_tools(&toolchain).await
        } else {
            cli::run_once(&cli, &config, &toolchain).await
        }
    })
}

fn run_interactive(config: AppConfig, toolchain: Toolchain) -> ExitCode {
    let coordinator = DownloadCoordinator::from_config(&config, &toolchain);

    let result = iced::application(
        move || app::DownloadApp::new(config.clone(), coordinator.clone()),
        app::update,
        app::view,
    )
    .title("SongDown")
    .window(window::Settings {
        size: Size::new(640.0, 720.0),
        ..Default::default()
    })
    .run();

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(%e, "interactive session failed");
            ExitCode::FAILURE
        }
    }
}
