//! Lens module
//!
//! A lens bundles lookup logic with its output types so the same operations
//! can back the CLI and library callers alike. Each lens module exports:
//! - a **Lens struct** (`CymruLens`), the entry point for all operations
//! - **output types** (records, rows, summaries) and their formatting
//!
//! Implementation details (query encoding, wire I/O, answer parsing) live
//! in submodules and are re-exported only where callers need them, e.g. to
//! plug in their own resolver.
//!
//! ```rust,ignore
//! use cymru_enrich::lens::cymru::{CymruLens, LookupRecord};
//! ```

pub mod utils;

// CymruLens - IP-to-ASN lookups via Team Cymru DNS
pub mod cymru;
