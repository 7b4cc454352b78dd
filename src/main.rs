// Console-less on Windows only for the GUI; maintenance commands attach to
// the launching terminal below.
#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

use std::process::ExitCode;

use clap::Parser;
use eframe::egui;

use pixel_quilt::app::QuiltApp;
use pixel_quilt::cli::{self, CliArgs};
use pixel_quilt::config::Settings;
use pixel_quilt::logger::{self, Mode};
use pixel_quilt::log_err;

fn main() -> ExitCode {
    let args = CliArgs::parse();

    // -- Maintenance mode -----------------------------------------------
    if let Some(command) = args.command {
        #[cfg(target_os = "windows")]
        attach_parent_console();
        logger::init(Mode::Maintenance);
        return cli::run(&args.store, command);
    }

    // -- GUI mode -------------------------------------------------------
    logger::init(Mode::Gui);

    let mut settings = Settings::load();
    args.store.apply(&mut settings);

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1100.0, 820.0])
            .with_min_inner_size([420.0, 480.0])
            .with_title("Pixel Quilt"),
        ..Default::default()
    };

    let app = match QuiltApp::new(settings) {
        Ok(app) => app,
        Err(e) => {
            log_err!("Could not start: {}", e);
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match eframe::run_native("Pixel Quilt", options, Box::new(move |_cc| Box::new(app))) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log_err!("GUI exited with error: {}", e);
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Release builds are SUBSYSTEM:WINDOWS, so reattach stdio to the terminal
/// that launched a maintenance command.
#[cfg(target_os = "windows")]
fn attach_parent_console() {
    unsafe extern "system" {
        fn AttachConsole(dwProcessId: u32) -> i32;
    }
    const ATTACH_PARENT_PROCESS: u32 = 0xFFFF_FFFF;
    unsafe {
        AttachConsole(ATTACH_PARENT_PROCESS);
    }
}
