/// Locale Audit: reports translation coverage against the reference language.
///
/// Usage: locale_audit [--config <file>] [--locales <dir>] [--content] [--report <file>]

use clap::Parser;
use narrative_compiler::core::config::Config;
use narrative_compiler::core::pipeline::{load_registry, write_json, ContentPipeline};
use narrative_compiler::core::registry::LocaleRegistry;
use narrative_compiler::core::resolver::{audit, AuditReport, TextBundle};
use std::path::PathBuf;
use std::process;
use tracing::{error, warn};

#[derive(Debug, Parser)]
#[command(
    name = "locale_audit",
    about = "Audit translation coverage for every registered language"
)]
struct Args {
    /// Configuration file (RON). Defaults apply when it does not exist.
    #[arg(long, default_value = "narrative.ron")]
    config: PathBuf,

    /// Override the locales directory.
    #[arg(long)]
    locales: Option<PathBuf>,

    /// Per-language bundle file name.
    #[arg(long, default_value = "ui.json")]
    file: String,

    /// Also audit chapter and case text from the compiled sources.
    #[arg(long, default_value_t = false)]
    content: bool,

    /// Fail if the registry lacks any of the builtin languages.
    #[arg(long, default_value_t = false)]
    require_builtin: bool,

    /// Where to write the detailed missing-key report.
    #[arg(long, default_value = "missing_keys_report.json")]
    report: PathBuf,
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
    if let Some(locales) = args.locales {
        config.locales_dir = locales;
    }

    config.logging.init();

    let registry = match load_registry(&config.locales_dir) {
        Ok(registry) => registry,
        Err(e) => {
            error!(error = %e, "invalid locale registry");
            eprintln!("ERROR: {}", e);
            process::exit(1);
        }
    };
    // Audit against the language every fallback chain ends at.
    if let Err(e) = registry.check_reference(&config.reference_language) {
        error!(error = %e, "reference language mismatch");
        eprintln!("ERROR: {}", e);
        process::exit(1);
    }
    let reference = registry.reference();

    println!("Registered languages: {}", registry.len());
    let rtl = registry.rtl_languages();
    if rtl.is_empty() {
        warn!("no right-to-left languages registered");
    } else {
        println!("Right-to-left: {}", rtl.join(", "));
    }

    if args.require_builtin {
        let required: Vec<&str> = LocaleRegistry::builtin().codes().collect();
        let missing = registry.required_languages_missing(&required);
        if !missing.is_empty() {
            eprintln!("ERROR: registry lacks required languages: {}", missing.join(", "));
            process::exit(1);
        }
    }

    let mut reports = Vec::new();

    match TextBundle::load_json_dir("ui", &config.locales_dir, &args.file) {
        Ok(bundle) => {
            if bundle.keys_for(reference).is_empty() {
                warn!(reference = %reference, "reference bundle is empty or missing");
            }
            reports.push(audit(&bundle, &registry, reference));
        }
        Err(e) => {
            error!(error = %e, "failed to load locale bundles");
            eprintln!("ERROR: {}", e);
            process::exit(1);
        }
    }

    if args.content {
        let pipeline = match ContentPipeline::builder().config(config.clone()).build() {
            Ok(pipeline) => pipeline,
            Err(e) => {
                eprintln!("ERROR: {}", e);
                process::exit(1);
            }
        };
        let output = pipeline.run();
        reports.push(audit(&TextBundle::from_chapters(&output.chapters), &registry, reference));
        reports.push(audit(&TextBundle::from_cases(&output.cases), &registry, reference));
    }

    for report in &reports {
        print_coverage(report);
    }

    match serde_json::to_string_pretty(&reports) {
        Ok(json) => {
            if let Err(e) = write_json(&args.report, &json) {
                eprintln!("ERROR: {}", e);
                process::exit(1);
            }
            println!("\nDetailed report: {}", args.report.display());
        }
        Err(e) => {
            eprintln!("ERROR: {}", e);
            process::exit(1);
        }
    }
}

fn print_coverage(report: &AuditReport) {
    println!(
        "\n=== {} ({} reference keys, {}) ===\n",
        report.surface, report.reference_keys, report.reference
    );
    if report.is_complete() {
        println!("No missing keys");
        return;
    }
    for language in report.incomplete_languages() {
        let missing = report.missing_for(language).map_or(0, |keys| keys.len());
        let coverage = report.coverage(language).unwrap_or(0.0);
        println!("{:<12} {:>6.1}%  {} missing", language, coverage, missing);
    }
    println!("\nSummary: {} missing keys", report.total_missing());
}
