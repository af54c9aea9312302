use clap::Parser;
use colored::Colorize;
use miette::{IntoDiagnostic, Result, WrapErr};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::info;

use reschiper::{Config, MappingReport, Obfuscator, PreviousMapping};

/// reschiper - Resource name obfuscation for Android App Bundles
#[derive(Parser, Debug)]
#[command(name = "reschiper")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the .aab bundle to obfuscate
    bundle: PathBuf,

    /// Output bundle (defaults to <name>-obfuscated.aab next to the input)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Keep rules - resources never renamed (can be specified multiple times)
    #[arg(short, long)]
    keep: Vec<String>,

    /// Mapping file from a previous run; its names are reused
    #[arg(long)]
    mapping: Option<PathBuf>,

    /// Where to write the mapping (defaults to <output>.mapping.txt)
    #[arg(long)]
    mapping_out: Option<PathBuf>,

    /// Also write the mapping report as JSON
    #[arg(long)]
    json_report: Option<PathBuf>,

    /// Glob of archive entries to remove (can be specified multiple times)
    #[arg(long)]
    file_filter: Vec<String>,

    /// Merge byte-identical resource files
    #[arg(long)]
    merge_duplicates: bool,

    /// Do not rename anything; only filter, merge and re-emit
    #[arg(long)]
    no_obfuscate: bool,

    /// Warn about references to missing resources instead of failing
    #[arg(long)]
    allow_unresolved: bool,

    /// Disable parallel XML processing
    #[arg(long)]
    sequential: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Quiet mode - only output errors
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    init_logging(cli.verbose, cli.quiet);

    info!("reschiper v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = load_config(&cli)?;

    run(&config, &cli)
}

fn init_logging(verbose: bool, quiet: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = if let Some(config_path) = &cli.config {
        Config::from_file(config_path)?
    } else {
        // Try to load from default locations next to the bundle
        Config::from_default_locations(bundle_dir(&cli.bundle))?
    };

    // Override with CLI arguments
    config.keep.extend(cli.keep.iter().cloned());
    config.file_filter.extend(cli.file_filter.iter().cloned());
    if cli.mapping.is_some() {
        config.mapping = cli.mapping.clone();
    }
    if cli.merge_duplicates {
        config.merge_duplicates = true;
    }
    if cli.no_obfuscate {
        config.enable_obfuscation = false;
    }
    if cli.allow_unresolved {
        config.fail_on_unresolved = false;
    }
    if cli.sequential {
        config.parallel = false;
    }

    Ok(config)
}

fn bundle_dir(bundle: &Path) -> &Path {
    match bundle.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    }
}

fn output_path(config: &Config, cli: &Cli) -> PathBuf {
    if let Some(output) = &cli.output {
        return output.clone();
    }
    let dir = bundle_dir(&cli.bundle);
    if let Some(name) = &config.output_name {
        return dir.join(name);
    }
    let stem = cli
        .bundle
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "bundle".to_string());
    dir.join(format!("{}-obfuscated.aab", stem))
}

fn mapping_path(output: &Path) -> PathBuf {
    let mut name = OsString::from(output.as_os_str());
    name.push(".mapping.txt");
    PathBuf::from(name)
}

fn run(config: &Config, cli: &Cli) -> Result<()> {
    let start_time = Instant::now();

    let bytes = std::fs::read(&cli.bundle)
        .into_diagnostic()
        .wrap_err_with(|| format!("Failed to read bundle: {}", cli.bundle.display()))?;

    let mut obfuscator = Obfuscator::new(config.clone());
    if let Some(path) = &config.mapping {
        let previous = PreviousMapping::from_file(path)?;
        info!("Loaded {} names from {}", previous.len(), path.display());
        obfuscator = obfuscator.with_previous_mapping(previous);
    }

    let output = obfuscator
        .run(&bytes)
        .into_diagnostic()
        .wrap_err_with(|| format!("Failed to obfuscate {}", cli.bundle.display()))?;

    let output_file = output_path(config, cli);
    std::fs::write(&output_file, &output.bundle)
        .into_diagnostic()
        .wrap_err_with(|| format!("Failed to write bundle: {}", output_file.display()))?;

    let mapping_file = cli
        .mapping_out
        .clone()
        .unwrap_or_else(|| mapping_path(&output_file));
    output.report.write_text(&mapping_file)?;

    if let Some(json_file) = &cli.json_report {
        output.report.write_json(json_file)?;
    }

    if !cli.quiet {
        print_summary(&output.report, &output_file, &mapping_file);
        println!(
            "{}",
            format!("⚡ Done in {:.2}s", start_time.elapsed().as_secs_f64()).green()
        );
    }

    Ok(())
}

fn print_summary(report: &MappingReport, output_file: &Path, mapping_file: &Path) {
    println!();
    println!("{}", "📦 Resource obfuscation summary:".bold());
    println!("  Renamed: {}", report.renamed.len().to_string().green());
    println!("  Kept:    {}", report.kept.len().to_string().cyan());
    if !report.merged.is_empty() {
        println!("  Merged duplicates: {}", report.merged.len());
    }
    if !report.filtered.is_empty() {
        println!("  Filtered files:    {}", report.filtered.len());
    }

    if !report.risks.is_empty() {
        println!();
        println!(
            "{}",
            format!(
                "⚠ {} renamed resources were also spelled out in XML strings; check name-based lookups:",
                report.risks.len()
            )
            .yellow()
        );
        for risk in report.risks.iter().take(10) {
            println!("    • {}/{} ({})", risk.type_name, risk.name, risk.id);
        }
        if report.risks.len() > 10 {
            println!("    ... and {} more", report.risks.len() - 10);
        }
    }

    println!();
    println!("{}", format!("✓ Bundle written to {}", output_file.display()).green());
    println!("{}", format!("✓ Mapping written to {}", mapping_file.display()).green());
}
