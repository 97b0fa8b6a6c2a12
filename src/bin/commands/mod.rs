pub mod config;
pub mod enrich;
pub mod lookup;

use anyhow::{anyhow, Result};
use clap::Args;
use cymru_enrich::{EnrichConfig, TransportFailurePolicy};

/// Lookup settings that override the configuration file
#[derive(Args, Debug, Default)]
pub struct LookupTuningArgs {
    /// DNS resolver to query, as ip or ip:port (default: first nameserver in /etc/resolv.conf)
    #[clap(short, long)]
    pub resolver: Option<String>,

    /// Per-query timeout in milliseconds
    #[clap(long)]
    pub timeout_ms: Option<u64>,

    /// Extra attempts after a timeout or network error
    #[clap(long)]
    pub retries: Option<u32>,

    /// Number of addresses looked up in parallel
    #[clap(short = 'j', long)]
    pub concurrency: Option<usize>,

    /// Stop the batch at the first transport failure instead of recording it
    #[clap(long)]
    pub halt_on_transport_failure: bool,
}

impl LookupTuningArgs {
    pub fn apply(&self, config: &mut EnrichConfig) -> Result<()> {
        if let Some(resolver) = &self.resolver {
            config.resolver = Some(EnrichConfig::parse_resolver(resolver)?);
        }
        if let Some(timeout_ms) = self.timeout_ms {
            config.timeout_ms = timeout_ms;
        }
        if let Some(retries) = self.retries {
            config.retries = retries;
        }
        if let Some(concurrency) = self.concurrency {
            if concurrency == 0 {
                return Err(anyhow!("--concurrency must be at least 1"));
            }
            config.concurrency = concurrency;
        }
        if self.halt_on_transport_failure {
            config.on_transport_failure = TransportFailurePolicy::Halt;
        }
        Ok(())
    }
}
