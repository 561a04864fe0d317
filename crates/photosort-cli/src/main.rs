use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use photosort_core::{
    CancellationToken, CancelledError, Config, LabelZone, MatchStrategy, ProcessControl,
    SamenessMode,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "photosort",
    version,
    about = "Google Photos Takeout sorter - match sidecars to media and file everything by month"
)]
struct Cli {
    /// Root directory holding extracted Takeout exports
    root: Option<PathBuf>,

    /// Directory of Takeout zip archives to extract into the root first
    #[arg(long)]
    archives: Option<PathBuf>,

    /// JSON config file; command line flags override it
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Name of the output folder under the root
    #[arg(long)]
    result_folder: Option<String>,

    /// Collision check: "pixel" (compare decoded images) or "name"
    #[arg(long)]
    sameness: Option<SamenessMode>,

    /// Sidecar matching: "substring" or "transform"
    #[arg(long)]
    matcher: Option<MatchStrategy>,

    /// Zone used for month labels: "utc" or "local"
    #[arg(long)]
    label_zone: Option<LabelZone>,

    /// Guess dates from filenames when no other date is found
    #[arg(long)]
    guess_from_filename: bool,

    /// Leave file modification times untouched
    #[arg(long)]
    no_mtime: bool,

    /// Keep drained export folders instead of removing them
    #[arg(long)]
    keep_exports: bool,

    /// Write a JSON run report to this path
    #[arg(long)]
    report: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn into_config(self) -> anyhow::Result<(Config, Option<PathBuf>)> {
        let mut config = match &self.config {
            Some(path) => Config::load(path)?,
            None => Config::default(),
        };
        if let Some(root) = self.root {
            config.root = root;
        }
        if let Some(archives) = self.archives {
            config.archive_dir = Some(archives);
        }
        if let Some(name) = self.result_folder {
            config.result_folder = name;
        }
        if let Some(mode) = self.sameness {
            config.sameness = mode;
        }
        if let Some(strategy) = self.matcher {
            config.matcher = strategy;
        }
        if let Some(zone) = self.label_zone {
            config.label_zone = zone;
        }
        config.guess_from_filename |= self.guess_from_filename;
        if self.no_mtime {
            config.preserve_mtime = false;
        }
        if self.keep_exports {
            config.remove_empty_exports = false;
        }
        Ok((config, self.report))
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let t_total = std::time::Instant::now();

    let (config, report_path) = cli.into_config()?;

    let token = CancellationToken::new();
    let handler_token = token.clone();
    ctrlc::set_handler(move || handler_token.cancel())?;
    let control = ProcessControl::new().with_cancel_token(token);

    let pb = ProgressBar::new(0);
    pb.set_style(ProgressStyle::default_bar().template("[{bar:40}] {pos}/{len} {msg}")?);
    pb.enable_steady_tick(Duration::from_millis(250));

    let pb_cb = pb.clone();
    let result = photosort_core::process_with_control(
        &config,
        &control,
        &move |stage, current, total, message| {
            let pb = &pb_cb;
            pb.set_length(total);
            pb.set_position(current + 1);
            pb.set_message(format!("{} {}", stage, message));
        },
    );
    pb.finish_and_clear();

    let summary = match result {
        Ok(summary) => summary,
        Err(e) if e.downcast_ref::<CancelledError>().is_some() => {
            tracing::warn!(root = %config.root.display(), "run cancelled");
            eprintln!("Cancelled. Run again on the same root to continue.");
            std::process::exit(130);
        }
        Err(e) => return Err(e),
    };

    if let Some(path) = &report_path {
        photosort_core::report::write_report(&summary, &config, path)?;
        eprintln!("Report written to {}", path.display());
    }

    eprintln!(
        "Done! {} relocated, {} duplicates removed, {} to {}, {} sidecars in {}, {} malformed, {} albums left ({:.2}s)",
        summary.relocated,
        summary.duplicates,
        summary.overflow,
        config.overflow_folder,
        summary.deferred.saturating_sub(summary.deferred_resolved),
        config.deferred_folder,
        summary.malformed,
        summary.albums_left,
        t_total.elapsed().as_secs_f64()
    );

    Ok(())
}
