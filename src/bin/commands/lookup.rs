use super::LookupTuningArgs;
use anyhow::{anyhow, Result};
use clap::Args;
use cymru_enrich::lens::cymru::CymruLens;
use cymru_enrich::{EnrichConfig, OutputFormat};

/// Arguments for the Lookup command
#[derive(Args)]
pub struct LookupArgs {
    /// IP addresses to look up, e.g. 8.8.8.8 or 2001:4860:4860::8888
    #[clap(required = true)]
    pub addresses: Vec<String>,

    /// Output format
    #[clap(short, long, value_enum, default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,

    #[clap(flatten)]
    pub tuning: LookupTuningArgs,
}

pub fn run(config: &mut EnrichConfig, args: LookupArgs) -> Result<()> {
    let LookupArgs {
        addresses,
        format,
        tuning,
    } = args;
    tuning.apply(config)?;

    let lens = CymruLens::from_config(config)?;
    let batch = lens.lookup_all(&addresses)?;
    let rows = lens.to_rows(&addresses, &batch.records);
    println!("{}", lens.format_results(&rows, format));

    if let Some(reason) = &batch.summary.halted {
        return Err(anyhow!("lookups halted: {}", reason));
    }
    Ok(())
}
