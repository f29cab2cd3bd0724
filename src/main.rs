use std::process;

use clap::Parser;
use env_logger::{Builder, Env};
use log::{debug, error, info};

use stroke_pipeline::config::{Args, OutputFormat, PipelineConfig};
use stroke_pipeline::monitor::RunMonitor;
use stroke_pipeline::pipeline;

fn main() {
    let args = Args::parse();

    let env = Env::new().filter("STROKE_LOG");
    Builder::new()
        .filter(Some("stroke_pipeline"), args.log_level())
        .parse_env(env)
        .init();

    debug!("Arguments {:#?}", args);
    let config = PipelineConfig::from(&args);
    let monitor = RunMonitor::start();

    let report = match pipeline::run(&config) {
        Ok(report) => report,
        Err(e) => {
            error!("pipeline failed: {e}");
            process::exit(1);
        }
    };

    let usage = monitor.finish();
    match config.format {
        OutputFormat::Text => {
            println!("{}", pipeline::render_text(&report));
            println!("Time elapsed: {:?}", usage.elapsed);
            println!("Memory used: {} bytes", usage.memory_delta());
        }
        OutputFormat::Json => match pipeline::render_json(&report) {
            Ok(json) => {
                println!("{json}");
                info!(
                    "time elapsed {:?}, memory used {} bytes",
                    usage.elapsed,
                    usage.memory_delta()
                );
            }
            Err(e) => {
                error!("could not serialise report: {e}");
                process::exit(1);
            }
        },
    }
}
