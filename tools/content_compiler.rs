/// Content Compiler: compiles authored chapters and cases into runtime JSON.
///
/// Usage: content_compiler [--config <file>] [--source <dir>] [--output <dir>] [--check]

use clap::Parser;
use narrative_compiler::core::config::Config;
use narrative_compiler::core::pipeline::ContentPipeline;
use std::path::PathBuf;
use std::process;
use tracing::{error, info};

#[derive(Debug, Parser)]
#[command(
    name = "content_compiler",
    about = "Compile, validate and write narrative content"
)]
struct Args {
    /// Configuration file (RON). Defaults apply when it does not exist.
    #[arg(long, default_value = "narrative.ron")]
    config: PathBuf,

    /// Override the source directory.
    #[arg(long)]
    source: Option<PathBuf>,

    /// Override the output directory.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Chapter whose ending leads to ENDING.
    #[arg(long)]
    final_chapter: Option<u32>,

    /// Validate only, write nothing.
    #[arg(long, default_value_t = false)]
    check: bool,

    /// Print diagnostics as JSON instead of the text report.
    #[arg(long, default_value_t = false)]
    json: bool,
}

fn main() {
    let args = Args::parse();

    let mut config = if args.config.is_file() {
        match Config::load_from_ron(&args.config) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("ERROR: Failed to load config '{}': {}", args.config.display(), e);
                process::exit(1);
            }
        }
    } else {
        Config::default()
    };
    if let Some(source) = args.source {
        config.source_dir = source;
    }
    if let Some(output) = args.output {
        config.output_dir = output;
    }
    if args.final_chapter.is_some() {
        config.final_chapter = args.final_chapter;
    }

    config.logging.init();

    let pipeline = match ContentPipeline::builder().config(config.clone()).build() {
        Ok(pipeline) => pipeline,
        Err(e) => {
            error!(error = %e, "failed to load sources");
            eprintln!("ERROR: {}", e);
            process::exit(1);
        }
    };

    let output = pipeline.run();

    if args.json {
        match serde_json::to_string_pretty(&output.report) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("ERROR: {}", e);
                process::exit(1);
            }
        }
    } else {
        println!("\n=== Content Report ===\n");
        print!("{}", output.report.summary());
    }

    if !args.check && output.manifest.is_some() {
        match output.write_to(&config.output_dir) {
            Ok(files) => info!(files = files.len(), "content written"),
            Err(e) => {
                error!(error = %e, "failed to write content");
                eprintln!("ERROR: {}", e);
                process::exit(1);
            }
        }
    }

    process::exit(output.exit_code());
}
