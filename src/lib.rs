#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

//! cymru-enrich - IP-to-ASN enrichment over the Team Cymru DNS interface
//!
//! Takes a list of IP addresses (typically source addresses pulled from
//! logs), looks each one up against the Team Cymru IP-to-ASN mapping service
//! over plain DNS, and returns the origin ASN, BGP prefix, country, registry,
//! allocation date, AS description and BGP peers. It can be used as both a
//! command-line application and a library.
//!
//! # Feature Flags
//!
//! | Feature | Description | Key Dependencies |
//! |---------|-------------|------------------|
//! | (none) | Lookup lens, table I/O, configuration | `hickory-proto`, `rayon`, `csv`, `config` |
//! | `display` | Table formatting with `tabled` | `tabled` |
//! | `cli` | CLI binary (default) | All above + `clap`, `indicatif`, `signal-hook` |
//!
//! ```toml
//! # Library only
//! cymru-enrich = { version = "0.3", default-features = false }
//!
//! # Library with table rendering
//! cymru-enrich = { version = "0.3", default-features = false, features = ["display"] }
//! ```
//!
//! # Architecture
//!
//! - **[`lens::cymru`]**: the lookup engine
//!   - `encoder`: reverse-DNS query names
//!   - `client`: UDP TXT queries behind the `TxtResolver` trait
//!   - `parser`: pipe-delimited answer parsing
//!   - `assembler`: order-preserving result slots and batch summaries
//!   - `progress`: progress events for batch runs
//! - **[`table`]**: input table parsing and enriched CSV output
//! - **[`config`]**: configuration management
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use cymru_enrich::lens::cymru::CymruLens;
//! use cymru_enrich::{table, EnrichConfig};
//! use std::path::Path;
//!
//! let config = EnrichConfig::new(&None)?;
//! let lens = CymruLens::from_config(&config)?;
//!
//! let rows = table::read_input_table(Path::new("src_ips.txt"))?;
//! let batch = lens.lookup_all(&table::addresses(&rows))?;
//! table::write_enriched_csv(Path::new("enriched.csv"), &rows, &batch.records)?;
//! println!("{}", batch.summary.describe());
//! ```

pub mod config;
pub mod lens;
pub mod table;

pub use config::EnrichConfig;
pub use lens::cymru::{
    BatchSummary, CymruLens, LookupBatch, LookupError, LookupProgress, LookupRecord,
    TransportFailurePolicy,
};
pub use lens::utils::OutputFormat;
pub use table::InputRow;
