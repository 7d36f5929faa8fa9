use anyhow::{Context, Result};
use clap::Parser;
use console::style;
use log::{error, info};
use object_scene_scanner::cli::Cli;
use object_scene_scanner::component::object_scanner::detection::class_table;
use object_scene_scanner::component::object_scanner::{Backends, CommandDetector, ObjectScanner};
use object_scene_scanner::config::{ScanSettings, save_settings};
use object_scene_scanner::init;
use object_scene_scanner::signal::setup_shutdown_signal;
use std::process::ExitCode;

fn run(cli: &Cli) -> Result<()> {
    let mut settings = ScanSettings::load(cli.config.as_deref())?;
    cli.apply(&mut settings)?;
    init::init(settings.verbosity);

    if let Some(path) = &cli.save_config {
        save_settings(path, &settings)?;
        info!("設定已儲存: {}", path.display());
    }
    settings.validate()?;

    let root = cli.root.as_deref().context("請指定影片資料夾")?;
    let shutdown_signal = setup_shutdown_signal()?;
    let detector = CommandDetector::spawn(&settings.detector_command)?;

    let scanner = ObjectScanner::new(settings, shutdown_signal);
    let summary = scanner.run(root, Backends::ffmpeg(Box::new(detector)))?;

    if summary.interrupted {
        info!("程式已中斷");
    } else {
        info!("程式正常結束");
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    if cli.list_classes {
        println!("{}", class_table());
        return ExitCode::SUCCESS;
    }

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            eprintln!("{} {e:#}", style("錯誤:").red().bold());
            ExitCode::FAILURE
        }
    }
}
