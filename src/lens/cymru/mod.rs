//! Team Cymru IP-to-ASN lens
//!
//! Looks up routing and ownership metadata for IP addresses through the
//! Team Cymru DNS interface (<https://www.team-cymru.com/ip-asn-mapping>).
//!
//! Each address goes through up to three chained TXT queries:
//!
//! 1. origin (`<reversed>.origin.asn.cymru.com` or `origin6` for IPv6): ASN,
//!    BGP prefix, country code, registry, allocation date
//! 2. ASN description (`AS<asn>.asn.cymru.com`): AS name
//! 3. peer (`<reversed>.peer.asn.cymru.com`): BGP peer ASNs
//!
//! If the origin query yields nothing the address gets a
//! [`LookupRecord::Missing`] record and the follow-up queries are skipped.
//! Follow-up failures leave the field empty and are listed in
//! [`ResolvedRecord::issues`]. A batch always yields exactly one record per
//! input address, in input order.
//!
//! # Example
//!
//! ```rust,ignore
//! use cymru_enrich::lens::cymru::CymruLens;
//! use cymru_enrich::EnrichConfig;
//!
//! let config = EnrichConfig::new(&None)?;
//! let lens = CymruLens::from_config(&config)?;
//!
//! let batch = lens.lookup_all(&["8.8.8.8", "1.1.1.1"])?;
//! for record in &batch.records {
//!     println!("{:?} {}", record.asn(), record.country_code());
//! }
//! ```

pub mod assembler;
pub mod client;
pub mod encoder;
pub mod parser;
pub mod progress;
pub mod types;

pub use assembler::{BatchSummary, LookupBatch, ResultSlots};
pub use client::{RetryPolicy, TxtResolver, UdpTxtResolver};
pub use parser::{AsnAnswer, OriginAnswer, PeerAnswer};
pub use progress::{LookupProgress, LookupProgressCallback};
pub use types::{
    LookupError, LookupRecord, LookupRow, MissingReason, QueryStage, RecordStatus,
    ResolvedRecord, StageIssue, TransportFailurePolicy, MISSING_SENTINEL, RECORD_COLUMNS,
};

use crate::config::EnrichConfig;
use anyhow::{anyhow, Result};
use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Instant;
use tracing::{debug, info, warn};

#[cfg(feature = "display")]
use crate::lens::utils::{render_rows, truncate_name, OutputFormat, DEFAULT_NAME_MAX_LEN};

/// Default number of addresses looked up in parallel
pub const DEFAULT_CONCURRENCY: usize = 8;

/// Team Cymru lookup lens
pub struct CymruLens {
    resolver: Arc<dyn TxtResolver>,
    concurrency: usize,
    on_transport_failure: TransportFailurePolicy,
    cancel: Arc<AtomicBool>,
    progress: Option<LookupProgressCallback>,
}

impl CymruLens {
    /// Create a lens over any resolver
    pub fn new(resolver: Arc<dyn TxtResolver>) -> Self {
        Self {
            resolver,
            concurrency: DEFAULT_CONCURRENCY,
            on_transport_failure: TransportFailurePolicy::default(),
            cancel: Arc::new(AtomicBool::new(false)),
            progress: None,
        }
    }

    /// Create a lens querying the configured resolver over UDP.
    ///
    /// Fails when no resolver is configured and none can be found in the
    /// system configuration.
    pub fn from_config(config: &EnrichConfig) -> Result<Self> {
        let server = config.resolver_addr()?;
        let resolver = UdpTxtResolver::new(server, config.timeout())
            .with_retry_policy(config.retry_policy());
        info!(
            "using resolver {} (timeout: {:?}, retries: {})",
            server, config.timeout(), config.retries
        );

        Ok(Self::new(Arc::new(resolver))
            .with_concurrency(config.concurrency)
            .with_transport_failure_policy(config.on_transport_failure))
    }

    /// Set the number of addresses looked up in parallel (minimum 1)
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_transport_failure_policy(mut self, policy: TransportFailurePolicy) -> Self {
        self.on_transport_failure = policy;
        self
    }

    /// Attach a progress callback
    pub fn with_progress(mut self, callback: LookupProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    /// Flag that cancels batches run by this lens once set.
    ///
    /// Lookups already in flight complete; addresses not yet started are
    /// returned as not attempted. The flag is never cleared by the lens.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        self.cancel.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    fn emit(&self, progress: LookupProgress) {
        if let Some(callback) = &self.progress {
            callback(progress);
        }
    }

    /// Look up a single address.
    ///
    /// Never fails: every error ends up in the returned record.
    pub fn lookup_one(&self, address: &str) -> LookupRecord {
        let ip = match encoder::parse_address(address) {
            Ok(ip) => ip,
            Err(e) => {
                warn!("skipping {}", e);
                return LookupRecord::missing(e);
            }
        };

        let origin_name = encoder::origin_query_name(ip);
        let origin = match self
            .resolver
            .query_txt(&origin_name)
            .and_then(|raw| OriginAnswer::parse(&raw))
        {
            Ok(origin) => origin,
            Err(e) => {
                log_stage_error(QueryStage::Origin, address, &e);
                return LookupRecord::missing(e);
            }
        };

        let mut issues = Vec::new();

        let as_description = self
            .follow_up(
                QueryStage::AsnDescription,
                address,
                &encoder::asn_query_name(&origin.asn),
                AsnAnswer::parse,
                &mut issues,
            )
            .map(|a| a.description);

        let as_peers = self
            .follow_up(
                QueryStage::Peer,
                address,
                &encoder::peer_query_name(ip),
                PeerAnswer::parse,
                &mut issues,
            )
            .map(|p| p.peers);

        LookupRecord::Resolved(ResolvedRecord {
            asn: origin.asn,
            bgp_prefix: origin.bgp_prefix,
            country_code: origin.country_code,
            rir: origin.rir,
            allocation_date: origin.allocation_date,
            as_description,
            as_peers,
            issues,
        })
    }

    /// Run a query after a successful origin lookup, recording any failure
    fn follow_up<T>(
        &self,
        stage: QueryStage,
        address: &str,
        name: &str,
        parse: fn(&str) -> Result<T, LookupError>,
        issues: &mut Vec<StageIssue>,
    ) -> Option<T> {
        match self.resolver.query_txt(name).and_then(|raw| parse(&raw)) {
            Ok(value) => Some(value),
            Err(error) => {
                log_stage_error(stage, address, &error);
                issues.push(StageIssue { stage, error });
                None
            }
        }
    }

    /// Look up a batch of addresses on a bounded worker pool.
    ///
    /// The returned records line up with `addresses` one to one. Fails if
    /// the worker pool cannot be created, or if the resolver was unreachable
    /// for every address that was attempted.
    pub fn lookup_all<S>(&self, addresses: &[S]) -> Result<LookupBatch>
    where
        S: AsRef<str> + Sync,
    {
        let start = Instant::now();
        let total = addresses.len();
        info!(
            "starting lookups for {} addresses ({} workers)",
            total, self.concurrency
        );
        self.emit(LookupProgress::Started { total });

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.concurrency)
            .thread_name(|i| format!("cymru-lookup-{}", i))
            .build()
            .map_err(|e| anyhow!("Failed to create lookup worker pool: {}", e))?;

        let slots = ResultSlots::new(total);
        let halted: OnceLock<String> = OnceLock::new();
        let stop = AtomicBool::new(false);

        pool.install(|| {
            addresses
                .par_iter()
                .enumerate()
                .for_each(|(index, address)| {
                    if stop.load(Ordering::SeqCst) || self.is_cancelled() {
                        return;
                    }
                    let address = address.as_ref();
                    let record = self.lookup_one(address);

                    if self.on_transport_failure == TransportFailurePolicy::Halt
                        && record.has_transport_failure()
                    {
                        stop.store(true, Ordering::SeqCst);
                        let reason = format!("transport failure on {} ({})", address, record.status());
                        if halted.set(reason).is_ok() {
                            warn!("halting batch after transport failure on {}", address);
                        }
                    }

                    let status = record.record_status();
                    slots.fill(index, record);
                    self.emit(LookupProgress::AddressCompleted {
                        index,
                        address: address.to_string(),
                        status,
                    });
                });
        });

        let records = slots.finish();
        let summary = BatchSummary::from_records(
            &records,
            halted.into_inner(),
            self.is_cancelled(),
            start.elapsed(),
        );
        info!("finished lookups: {}", summary.describe());
        self.emit(LookupProgress::Completed {
            summary: summary.clone(),
        });

        if let Some(reason) = unreachable_reason(&records) {
            return Err(anyhow!(
                "resolver unreachable, every attempted lookup failed: {}",
                reason
            ));
        }

        Ok(LookupBatch { records, summary })
    }

    /// Pair records with the addresses they describe
    pub fn to_rows<S: AsRef<str>>(&self, addresses: &[S], records: &[LookupRecord]) -> Vec<LookupRow> {
        addresses
            .iter()
            .zip(records)
            .map(|(address, record)| LookupRow::new(address.as_ref(), record))
            .collect()
    }

    /// Format rows for display; free-text columns are shortened in tables
    #[cfg(feature = "display")]
    pub fn format_results(&self, rows: &[LookupRow], format: OutputFormat) -> String {
        let shortened: Vec<LookupRow>;
        let rows: &[LookupRow] = if format == OutputFormat::Table {
            shortened = rows
                .iter()
                .map(|r| LookupRow {
                    as_description: truncate_name(&r.as_description, DEFAULT_NAME_MAX_LEN),
                    as_peers: truncate_name(&r.as_peers, DEFAULT_NAME_MAX_LEN),
                    ..r.clone()
                })
                .collect();
            &shortened
        } else {
            rows
        };

        let header = format!("IP|{}", RECORD_COLUMNS.join("|"));
        render_rows(rows, format, &header, |r| {
            [
                r.address.as_str(),
                r.asn.as_str(),
                r.bgp_prefix.as_str(),
                r.country_code.as_str(),
                r.rir.as_str(),
                r.allocation_date.as_str(),
                r.as_description.as_str(),
                r.as_peers.as_str(),
                r.status.as_str(),
            ]
            .join("|")
        })
    }
}

/// First transport failure of a batch in which no lookup ever got an
/// answer from the resolver
fn unreachable_reason(records: &[LookupRecord]) -> Option<String> {
    let mut first = None;
    for record in records {
        match record {
            LookupRecord::Missing {
                reason: MissingReason::Failed(e),
            } if e.is_transport_failure() => {
                if first.is_none() {
                    first = Some(e.to_string());
                }
            }
            // never reached the resolver
            LookupRecord::Missing {
                reason: MissingReason::NotAttempted | MissingReason::Failed(LookupError::InvalidAddress { .. }),
            } => {}
            _ => return None,
        }
    }
    first
}

fn log_stage_error(stage: QueryStage, address: &str, error: &LookupError) {
    match error {
        LookupError::NoAnswer { .. } => debug!("{} lookup for {}: {}", stage, address, error),
        _ => warn!("{} lookup for {} failed: {}", stage, address, error),
    }
}
