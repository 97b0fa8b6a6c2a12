use clap::{Parser, Subcommand};
use cymru_enrich::EnrichConfig;
use tracing::Level;

mod commands;

use commands::enrich::EnrichArgs;
use commands::lookup::LookupArgs;

#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
#[clap(propagate_version = true)]
struct Cli {
    /// configuration file path, by default $HOME/.cymru-enrich/cymru-enrich.toml is used
    #[clap(short, long, global = true)]
    config: Option<String>,

    /// Print debug information
    #[clap(long, global = true)]
    debug: bool,

    /// Only print warnings and errors (overrides --debug)
    #[clap(short, long, global = true)]
    quiet: bool,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Enrich an `ip_count src_ip` table with Team Cymru ASN data and write it as CSV
    Enrich(EnrichArgs),

    /// Look up individual IP addresses
    Lookup(LookupArgs),

    /// Show the effective configuration
    Config,
}

fn main() {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let level = if cli.quiet {
        Level::WARN
    } else if cli.debug {
        Level::DEBUG
    } else {
        Level::INFO
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    let mut config = match EnrichConfig::new(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("ERROR: {:#}", e);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Enrich(args) => commands::enrich::run(&mut config, args),
        Commands::Lookup(args) => commands::lookup::run(&mut config, args),
        Commands::Config => {
            commands::config::run(&config);
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("ERROR: {:#}", e);
        std::process::exit(1);
    }
}
