mod commands;
mod render;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use occurrent_core::{CalendarFile, MemoryStore, OccurrentConfig};
use tracing::Level;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "occurrent")]
#[command(about = "List the occurrences of recurring events, with exceptions applied")]
struct Cli {
    /// Calendar file to read (defaults to calendar_file in the config)
    #[arg(short, long, global = true)]
    file: Option<PathBuf>,

    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Occurrences in a date range
    Between {
        /// First day (YYYY-MM-DD, defaults to today)
        #[arg(long)]
        from: Option<String>,

        /// Last day (YYYY-MM-DD, defaults to default_days after --from)
        #[arg(long)]
        to: Option<String>,

        /// The week containing this day
        #[arg(long, conflicts_with_all = ["from", "to", "month_of", "weekend_of"])]
        week_of: Option<String>,

        /// The month containing this day
        #[arg(long, conflicts_with_all = ["from", "to", "weekend_of"])]
        month_of: Option<String>,

        /// The weekend on or after this day
        #[arg(long, conflicts_with_all = ["from", "to"])]
        weekend_of: Option<String>,

        /// Include occurrences hidden from lists
        #[arg(long)]
        show_hidden: bool,

        /// Print JSON instead of an agenda
        #[arg(long)]
        json: bool,
    },
    /// The next few occurrences
    Upcoming {
        /// Start from this day (YYYY-MM-DD, defaults to now)
        #[arg(long)]
        after: Option<String>,

        /// How many occurrences to show
        #[arg(short = 'n', long, default_value_t = 10)]
        count: usize,

        /// Only this generator
        #[arg(short, long)]
        generator: Option<String>,

        /// Include occurrences hidden from lists
        #[arg(long)]
        show_hidden: bool,

        /// Print JSON instead of an agenda
        #[arg(long)]
        json: bool,
    },
    /// List generators and how they repeat
    Generators {
        /// Print JSON instead of a list
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new(Level::DEBUG.to_string())
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(Level::WARN.to_string()))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = OccurrentConfig::load()?;
    let store = load_store(&config, cli.file)?;

    match cli.command {
        Commands::Between {
            from,
            to,
            week_of,
            month_of,
            weekend_of,
            show_hidden,
            json,
        } => {
            let span = commands::between::Span {
                from,
                to,
                week_of,
                month_of,
                weekend_of,
            };
            let hide_hidden = config.hide_hidden && !show_hidden;
            commands::between::run(&store, &config, span, hide_hidden, json)
        }
        Commands::Upcoming {
            after,
            count,
            generator,
            show_hidden,
            json,
        } => {
            let hide_hidden = config.hide_hidden && !show_hidden;
            commands::upcoming::run(
                &store,
                after.as_deref(),
                count,
                generator.as_deref(),
                hide_hidden,
                json,
            )
        }
        Commands::Generators { json } => commands::generators::run(&store, json),
    }
}

fn load_store(config: &OccurrentConfig, file: Option<PathBuf>) -> Result<MemoryStore> {
    let path = file.unwrap_or_else(|| config.calendar_file_path());

    if !path.exists() {
        anyhow::bail!(
            "Calendar file not found: {}\n\n\
            Create it, or point occurrent at another file with:\n  \
            occurrent --file <path> between\n\n\
            The default location is set by calendar_file in {}",
            path.display(),
            OccurrentConfig::config_path()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|_| "the config file".into())
        );
    }

    Ok(CalendarFile::load(&path)?.into_store()?)
}
