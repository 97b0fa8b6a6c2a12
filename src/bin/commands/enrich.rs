use super::LookupTuningArgs;
use anyhow::{anyhow, Result};
use clap::Args;
use cymru_enrich::lens::cymru::{CymruLens, LookupProgress, LookupProgressCallback};
use cymru_enrich::{table, EnrichConfig};
use indicatif::{ProgressBar, ProgressStyle};
use signal_hook::consts::SIGINT;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::{info, warn};

/// Conventional exit status after SIGINT
const INTERRUPTED_EXIT_CODE: i32 = 130;

/// Arguments for the Enrich command
#[derive(Args)]
pub struct EnrichArgs {
    /// Whitespace-delimited input table with `ip_count src_ip` rows
    #[clap(short, long)]
    pub input_file: PathBuf,

    /// CSV file to write the enriched table to
    #[clap(short, long)]
    pub output_file: PathBuf,

    /// Do not show a progress bar
    #[clap(long)]
    pub no_progress: bool,

    #[clap(flatten)]
    pub tuning: LookupTuningArgs,
}

fn progress_callback(pb: ProgressBar) -> LookupProgressCallback {
    Arc::new(move |progress| match progress {
        LookupProgress::Started { total } => pb.set_length(total as u64),
        LookupProgress::AddressCompleted { .. } => pb.inc(1),
        LookupProgress::Completed { summary } => pb.finish_with_message(format!(
            "{} resolved, {} partial, {} missing",
            summary.resolved, summary.partial, summary.missing
        )),
    })
}

/// First Ctrl-C sets `cancel`, rows not yet looked up are written as not
/// attempted. A second Ctrl-C while the flag is set exits immediately.
fn register_interrupt(cancel: Arc<AtomicBool>) -> std::io::Result<()> {
    // registered first so it only sees the flag state from earlier signals
    signal_hook::flag::register_conditional_shutdown(
        SIGINT,
        INTERRUPTED_EXIT_CODE,
        cancel.clone(),
    )?;
    signal_hook::flag::register(SIGINT, cancel)?;
    Ok(())
}

pub fn run(config: &mut EnrichConfig, args: EnrichArgs) -> Result<()> {
    let EnrichArgs {
        input_file,
        output_file,
        no_progress,
        tuning,
    } = args;
    tuning.apply(config)?;

    let rows = table::read_input_table(&input_file)?;
    info!("read {} rows from {}", rows.len(), input_file.display());
    let addresses = table::addresses(&rows);

    let mut lens = CymruLens::from_config(config)?;
    if !no_progress {
        let sty = ProgressStyle::with_template(
            "[{elapsed_precise}] {bar:40.cyan/blue} {pos:>7}/{len:7} {eta} {msg}",
        )?
        .progress_chars("##-");
        let pb = ProgressBar::new(addresses.len() as u64);
        pb.set_style(sty);
        lens = lens.with_progress(progress_callback(pb));
    }

    register_interrupt(lens.cancel_flag())?;

    let batch = lens.lookup_all(&addresses)?;
    table::write_enriched_csv(&output_file, &rows, &batch.records)?;
    info!("wrote {} rows to {}", rows.len(), output_file.display());
    println!("{}", batch.summary.describe());

    if let Some(reason) = &batch.summary.halted {
        return Err(anyhow!("batch halted: {}", reason));
    }
    if batch.summary.cancelled {
        warn!("batch cancelled, {} rows not attempted", batch.summary.not_attempted);
    }
    Ok(())
}
