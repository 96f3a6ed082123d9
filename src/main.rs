//! Covjoin - CI Coverage Aggregation and PR Cleanup
//!
//! A CLI tool that merges per-shard coverage artifacts into one report,
//! publishes it to a coverage-tracking service, and cleans template
//! markup out of pull-request descriptions.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (merge, render, upload, or API failure)

mod artifacts;
mod cli;
mod combine;
mod config;
mod context;
mod errors;
mod models;
mod report;
mod sanitize;
mod upload;

use anyhow::{Context, Result};
use cli::{Args, Command, CoverageArgs, SanitizeArgs};
use config::Config;
use models::TriggerContext;
use report::SummarySink;
use std::time::Instant;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;
use upload::{OidcRequestEnv, Uploader};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Initialize logging
    init_logging(&args);

    info!("Covjoin v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    let result = match args.command.clone() {
        Some(Command::Coverage(cov_args)) => run_coverage(&args, cov_args).await,
        Some(Command::SanitizePr(san_args)) => run_sanitize(san_args).await,
        None => unreachable!("validated above"),
    };

    match result {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Pipeline failed: {}", e);
            eprintln!("\n❌ Error: {}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .covjoin.toml.
fn handle_init_config() -> Result<()> {
    let path = std::path::Path::new(".covjoin.toml");

    if path.exists() {
        eprintln!("⚠️  .covjoin.toml already exists. Remove it first or edit it manually.");
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content).context("Failed to write .covjoin.toml")?;

    println!("✅ Created .covjoin.toml with default settings.");
    println!("   Edit it to customize artifact pattern, report paths, and upload URL.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args) {
    let level = args.log_level();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

/// Run the coverage aggregation pipeline. Returns exit code 0.
///
/// Steps run strictly in sequence: discover -> stage -> combine ->
/// render XML -> render summary -> upload. Any step failure aborts the
/// run with a non-zero status.
async fn run_coverage(args: &Args, cov: CoverageArgs) -> Result<i32> {
    let start_time = Instant::now();

    // Load configuration
    let mut config = load_config(args)?;
    config.merge_with_args(&cov, args.verbose);

    // Classify the trigger exactly once; every later decision uses this.
    let trigger = TriggerContext::from_env()?;
    info!("Trigger context: {}", trigger);

    // Step 1: discover coverage artifacts
    println!("📥 Discovering coverage artifacts in: {}", config.artifacts.dir);
    let store = artifacts::ArtifactStore::new(
        cov.artifacts_dir.clone(),
        config.artifacts.pattern.clone(),
    );
    let shards = store.discover()?;

    // Handle --dry-run: list shards and exit
    if cov.dry_run {
        return handle_dry_run(&shards);
    }

    // Step 2: stage shard files into one working directory
    let staged = store.stage(&shards, !args.quiet)?;

    // Step 3: combine into one coverage database
    println!("🔗 Combining {} shard file(s)...", staged.paths.len());
    let data = combine::combine(&staged.paths)?;

    // Step 4: render the XML report
    println!("📝 Rendering XML report...");
    let xml = report::render_xml(&data)?;
    std::fs::write(&cov.xml_out, &xml)
        .with_context(|| format!("Failed to write XML report to {}", cov.xml_out.display()))?;
    info!("Wrote XML report to {}", cov.xml_out.display());

    // Step 5: append the Markdown summary to the step summary
    let summary = report::render_summary(&data, config.report.skip_covered, config.report.skip_empty);
    let sink = SummarySink::new(cov.summary_file.clone());
    sink.append(&summary)?;

    // Step 6: upload the XML report
    if cov.no_upload {
        warn!("Upload skipped (--no-upload)");
    } else {
        println!("🚀 Uploading report to {}", config.upload.url);
        let uploader = Uploader::new(config.upload.url.clone(), config.upload.timeout_seconds)?;
        let auth = uploader
            .resolve_auth(&trigger, cov.token.as_deref(), OidcRequestEnv::from_env())
            .await?;
        let result = uploader.upload(&xml, &auth).await?;

        match result.report_url {
            Some(url) => println!("   Report available at: {}", url),
            None => println!("   Service accepted the report (HTTP {})", result.status),
        }
    }

    // Print summary
    let duration = start_time.elapsed().as_secs_f64();
    println!("\n📊 Coverage Summary:");
    println!("   Shards merged: {}", data.shard_count);
    println!("   Files covered: {}", data.files.len());
    println!(
        "   Lines executed: {}/{} ({:.1}%)",
        data.total_executed(),
        data.total_coverable(),
        data.line_rate() * 100.0
    );
    println!("   Duration: {:.1}s", duration);
    println!("\n✅ Aggregation complete! XML report: {}", cov.xml_out.display());

    Ok(0)
}

/// Handle --dry-run: list discovered shards, exit.
fn handle_dry_run(shards: &[artifacts::DiscoveredShard]) -> Result<i32> {
    println!("\n🔍 Dry run: listing shards (no merge or upload)...\n");

    if shards.is_empty() {
        println!("   No matching coverage artifacts found.");
    } else {
        println!("   Found {} shard file(s) that would be merged:\n", shards.len());
        for shard in shards {
            println!(
                "     📄 {} ({} bytes, from {})",
                shard.path.display(),
                shard.size,
                shard.artifact
            );
        }
        println!("\n   Total: {} shard file(s)", shards.len());
    }

    println!("\n✅ Dry run complete. Nothing was merged or uploaded.");
    Ok(0)
}

/// Run the PR description sanitizer. Returns exit code 0.
async fn run_sanitize(san: SanitizeArgs) -> Result<i32> {
    let (owner, repo) = sanitize::parse_github_url(&san.repo_url)
        .with_context(|| format!("Unrecognized repository URL: {}", san.repo_url))?;

    println!("🧹 Sanitizing description of {}/{}#{}", owner, repo, san.pr);

    let sanitizer = sanitize::Sanitizer::new(san.api_url.clone(), san.token.clone())?;
    let outcome = sanitizer.sanitize(&owner, &repo, san.pr).await?;

    match outcome {
        sanitize::SanitizeOutcome::Updated => {
            println!("✅ Description cleaned and written back.");
        }
        sanitize::SanitizeOutcome::Unchanged => {
            println!("✅ Description already clean; nothing to do.");
        }
    }

    Ok(0)
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from .covjoin.toml");
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {}", e);
            Ok(Config::default())
        }
    }
}
