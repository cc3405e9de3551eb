use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use track_lineage::config::ConsolidationConfig;
use track_lineage::integration::{
    CancelToken, Command, FeedWriter, Outcome, Session, enrich, load_path, open_feed,
    write_identity_map,
};

#[derive(Parser)]
#[command(name = "track-lineage", version, about)]
struct Args {
    /// JSON configuration; missing keys keep their defaults.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    action: Action,
}

#[derive(Subcommand)]
enum Action {
    /// Load a feed and list its tracks.
    Summary {
        feed: PathBuf,
        /// Also list short unlabelled fragments.
        #[arg(long)]
        all: bool,
    },
    /// Load a feed, apply edits and write the resolved outputs.
    Run {
        feed: PathBuf,
        /// JSON array of commands, e.g. `[{"op": "merge", "master": 5, "slave": 7}]`.
        #[arg(long)]
        commands: Option<PathBuf>,
        /// Auto-stitch before the command script.
        #[arg(long)]
        stitch: bool,
        /// Absorb unlabelled noise after the command script.
        #[arg(long)]
        absorb: bool,
        /// Restore a pending autosave instead of starting from the feed.
        #[arg(long)]
        restore: bool,
        #[arg(long)]
        identity_map: Option<PathBuf>,
        /// Enriched feed; gzip-compressed when the name ends in `.gz`.
        #[arg(long)]
        enriched: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    let config = match &args.config {
        Some(path) => ConsolidationConfig::from_json_file(path)
            .with_context(|| format!("reading config {}", path.display()))?,
        None => ConsolidationConfig::default(),
    };

    match args.action {
        Action::Summary { feed, all } => summary(&feed, all, config),
        Action::Run {
            feed,
            commands,
            stitch,
            absorb,
            restore,
            identity_map,
            enriched,
        } => {
            let mut commands = match commands {
                Some(path) => read_commands(&path)?,
                None => Vec::new(),
            };
            if restore {
                commands.insert(0, Command::RestoreAutosave);
            }
            if stitch {
                commands.insert(usize::from(restore), Command::AutoStitch);
            }
            if absorb {
                commands.push(Command::AbsorbNoise);
            }
            run(&feed, commands, identity_map.as_deref(), enriched.as_deref(), config)
        }
    }
}

fn summary(feed: &Path, all: bool, config: ConsolidationConfig) -> Result<()> {
    config.validate()?;
    let (state, report) = load_path(feed, &CancelToken::new())
        .with_context(|| format!("loading {}", feed.display()))?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    writeln!(out, "{}", serde_json::to_string(&report)?)?;
    for row in state
        .store()
        .summaries(config.fps, !all, config.min_listed_secs)
    {
        writeln!(out, "{}", serde_json::to_string(&row)?)?;
    }
    Ok(())
}

fn read_commands(path: &Path) -> Result<Vec<Command>> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    serde_json::from_reader(io::BufReader::new(file))
        .with_context(|| format!("parsing commands in {}", path.display()))
}

fn run(
    feed: &Path,
    commands: Vec<Command>,
    identity_map: Option<&Path>,
    enriched: Option<&Path>,
    config: ConsolidationConfig,
) -> Result<()> {
    let cancel = CancelToken::new();
    let (state, _) =
        load_path(feed, &cancel).with_context(|| format!("loading {}", feed.display()))?;
    let mut session = Session::new(state, config)?;

    if session.has_pending_autosave() && !commands.contains(&Command::RestoreAutosave) {
        warn!("an autosave from an earlier session is pending; pass --restore to use it");
    }

    for (index, command) in commands.into_iter().enumerate() {
        match session.apply(command.clone()) {
            Ok(Outcome::Unchanged) => info!(index, ?command, "no change"),
            Ok(outcome) => info!(index, ?outcome, "applied"),
            Err(err) => {
                return Err(err).with_context(|| format!("command {index} ({command:?}) failed"));
            }
        }
    }
    session.save_autosave()?;

    if let Some(path) = identity_map {
        let mut writer = BufWriter::new(
            File::create(path).with_context(|| format!("creating {}", path.display()))?,
        );
        write_identity_map(session.state(), &mut writer)?;
        writer.flush()?;
    }
    if let Some(path) = enriched {
        let mut writer =
            FeedWriter::create(path).with_context(|| format!("creating {}", path.display()))?;
        let report = enrich(session.state(), open_feed(feed)?, &mut writer, &cancel)?;
        writer.finish()?;
        info!(?report, path = %path.display(), "enriched feed written");
    }

    session.discard_autosave()?;
    Ok(())
}
