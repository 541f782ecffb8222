use std::path::PathBuf;

use clap::Parser;

use codebundle::config::settings::Settings;

#[derive(Parser, Debug)]
#[command(
    name = "codebundle",
    version,
    about = "Compile a selected subset of a codebase into a single text archive"
)]
struct Cli {
    /// Directory to scan (default: current directory)
    #[arg(default_value = ".")]
    path: PathBuf,

    /// Archive output file
    #[arg(short = 'o', long, default_value = "codebase.txt")]
    output: PathBuf,

    /// Also write a JSON manifest of the selection
    #[arg(long)]
    manifest: Option<PathBuf>,

    /// Uncheck any entry with this name (repeatable), e.g. --exclude target
    #[arg(long = "exclude", value_name = "NAME")]
    excludes: Vec<String>,

    /// Maximum directory depth below the root
    #[arg(short = 'd', long)]
    max_depth: Option<usize>,

    /// Include hidden (dot-prefixed) entries
    #[arg(long)]
    hidden: bool,

    /// Entries between progress reports
    #[arg(long)]
    progress_interval: Option<usize>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so the archive summary on stdout stays clean.
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut settings = Settings {
        max_depth: cli.max_depth,
        ..Settings::default()
    };
    if cli.hidden {
        settings.hidden_prefix.clear();
    }
    if let Some(interval) = cli.progress_interval {
        settings.progress_interval = interval.max(1);
    }

    let root = std::fs::canonicalize(&cli.path)?;

    let mut app = codebundle::app::App::new(root, settings, cli.excludes);
    app.run(&cli.output, cli.manifest.as_deref()).await
}
