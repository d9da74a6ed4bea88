use log::{error, info};
use siftr_review::configuration::{Args, Config};
use siftr_review::controller::{Controller, FileSource};
use std::time::Instant;

fn main() {
    let started = Instant::now();
    let args = Args::from_args();

    // https://docs.rs/env_logger/latest/env_logger/
    let level = if args.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .format_target(false)
        .init();

    info!("Importing configuration");
    let config = Config::resolve(&args).unwrap_or_else(|e| {
        error!("Unable to import configuration: {}", e);
        std::process::exit(1);
    });
    info!("Configuration imported successfully");

    let controller = Controller::new(config)
        .unwrap_or_else(|e| {
            error!("Unable to create a controller instance: {}, exiting...", e);
            std::process::exit(1);
        })
        .verbose(args.verbose);

    if let Err(e) = controller.run(FileSource::new(&args.file), &args.flow_ids) {
        error!("Error occurred while reviewing {}: {}", args.file.display(), e);
        std::process::exit(1);
    }

    println!("execution time: {:.3} seconds", started.elapsed().as_secs_f64());
}
