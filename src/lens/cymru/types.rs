//! Record, status and error types for Team Cymru lookups

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Literal written for country code and RIR of an address that could not be resolved
pub const MISSING_SENTINEL: &str = "None";

// =============================================================================
// Errors
// =============================================================================

/// Per-address lookup errors.
///
/// None of these abort a batch; the lens turns them into [`LookupRecord::Missing`]
/// records or [`StageIssue`]s on a resolved record.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LookupError {
    /// Input is not a parseable IPv4 or IPv6 address
    #[error("invalid IP address: {input:?}")]
    InvalidAddress { input: String },

    /// The resolver answered, but without a usable TXT record
    #[error("no answer for {query} ({rcode})")]
    NoAnswer { query: String, rcode: String },

    /// The query never got a response: timeout, refused, unreachable resolver
    #[error("transport failure for {query}: {reason}")]
    TransportFailure { query: String, reason: String },

    /// The TXT answer has fewer fields than its layout requires
    #[error("malformed answer {answer:?}: expected at least {expected} fields, found {found}")]
    MalformedAnswer {
        expected: usize,
        found: usize,
        answer: String,
    },
}

impl LookupError {
    /// Short, stable name of the error kind
    pub fn kind(&self) -> &'static str {
        match self {
            LookupError::InvalidAddress { .. } => "invalid-address",
            LookupError::NoAnswer { .. } => "no-answer",
            LookupError::TransportFailure { .. } => "transport-failure",
            LookupError::MalformedAnswer { .. } => "malformed-answer",
        }
    }

    pub fn is_transport_failure(&self) -> bool {
        matches!(self, LookupError::TransportFailure { .. })
    }

    /// Kind plus the most useful detail, as written into the status column
    pub fn status_label(&self) -> String {
        match self {
            LookupError::NoAnswer { rcode, .. } => format!("{} ({})", self.kind(), rcode),
            LookupError::TransportFailure { reason, .. } => format!("{}: {}", self.kind(), reason),
            _ => self.kind().to_string(),
        }
    }
}

// =============================================================================
// Policies
// =============================================================================

/// What a batch does after an address hits a transport failure
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportFailurePolicy {
    /// Record the failure on that address and keep going
    #[default]
    Record,
    /// Stop issuing lookups; remaining addresses are marked not attempted
    Halt,
}

impl fmt::Display for TransportFailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportFailurePolicy::Record => write!(f, "record"),
            TransportFailurePolicy::Halt => write!(f, "halt"),
        }
    }
}

impl FromStr for TransportFailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "record" | "continue" | "skip" => Ok(Self::Record),
            "halt" | "stop" => Ok(Self::Halt),
            other => Err(format!(
                "unknown transport failure policy '{}', expected 'record' or 'halt'",
                other
            )),
        }
    }
}

// =============================================================================
// Records
// =============================================================================

/// The three queries issued per address, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QueryStage {
    Origin,
    AsnDescription,
    Peer,
}

impl fmt::Display for QueryStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryStage::Origin => write!(f, "origin"),
            QueryStage::AsnDescription => write!(f, "asn-description"),
            QueryStage::Peer => write!(f, "peer"),
        }
    }
}

/// A follow-up query that did not produce its field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageIssue {
    pub stage: QueryStage,
    pub error: LookupError,
}

/// Fields of an address whose origin lookup succeeded
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedRecord {
    pub asn: String,
    pub bgp_prefix: String,
    pub country_code: String,
    pub rir: String,
    pub allocation_date: String,
    /// `None` when the ASN-description query failed, see `issues`
    pub as_description: Option<String>,
    /// `None` when the peer query failed, see `issues`
    pub as_peers: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<StageIssue>,
}

impl ResolvedRecord {
    pub fn is_complete(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Why an address has no origin data
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingReason {
    /// The origin stage failed with this error
    Failed(LookupError),
    /// The batch was cancelled or halted before this address was looked up
    NotAttempted,
}

/// One output record per input address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum LookupRecord {
    Resolved(ResolvedRecord),
    Missing { reason: MissingReason },
}

/// Coarse outcome of a record, used for progress events and batch summaries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    Resolved,
    Partial,
    Missing,
    NotAttempted,
}

impl fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordStatus::Resolved => write!(f, "resolved"),
            RecordStatus::Partial => write!(f, "partial"),
            RecordStatus::Missing => write!(f, "missing"),
            RecordStatus::NotAttempted => write!(f, "not-attempted"),
        }
    }
}

impl LookupRecord {
    pub fn missing(error: LookupError) -> Self {
        LookupRecord::Missing {
            reason: MissingReason::Failed(error),
        }
    }

    pub fn not_attempted() -> Self {
        LookupRecord::Missing {
            reason: MissingReason::NotAttempted,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, LookupRecord::Resolved(_))
    }

    pub fn as_resolved(&self) -> Option<&ResolvedRecord> {
        match self {
            LookupRecord::Resolved(r) => Some(r),
            LookupRecord::Missing { .. } => None,
        }
    }

    pub fn record_status(&self) -> RecordStatus {
        match self {
            LookupRecord::Resolved(r) if r.is_complete() => RecordStatus::Resolved,
            LookupRecord::Resolved(_) => RecordStatus::Partial,
            LookupRecord::Missing {
                reason: MissingReason::NotAttempted,
            } => RecordStatus::NotAttempted,
            LookupRecord::Missing { .. } => RecordStatus::Missing,
        }
    }

    /// True if any stage of this address failed at the transport level
    pub fn has_transport_failure(&self) -> bool {
        match self {
            LookupRecord::Resolved(r) => r.issues.iter().any(|i| i.error.is_transport_failure()),
            LookupRecord::Missing {
                reason: MissingReason::Failed(e),
            } => e.is_transport_failure(),
            LookupRecord::Missing { .. } => false,
        }
    }

    pub fn asn(&self) -> Option<&str> {
        self.as_resolved().map(|r| r.asn.as_str())
    }

    pub fn bgp_prefix(&self) -> Option<&str> {
        self.as_resolved().map(|r| r.bgp_prefix.as_str())
    }

    /// Country code, or [`MISSING_SENTINEL`] for missing records
    pub fn country_code(&self) -> &str {
        self.as_resolved()
            .map(|r| r.country_code.as_str())
            .unwrap_or(MISSING_SENTINEL)
    }

    /// RIR, or [`MISSING_SENTINEL`] for missing records
    pub fn rir(&self) -> &str {
        self.as_resolved()
            .map(|r| r.rir.as_str())
            .unwrap_or(MISSING_SENTINEL)
    }

    pub fn allocation_date(&self) -> Option<&str> {
        self.as_resolved().map(|r| r.allocation_date.as_str())
    }

    pub fn as_description(&self) -> Option<&str> {
        self.as_resolved().and_then(|r| r.as_description.as_deref())
    }

    pub fn as_peers(&self) -> Option<&str> {
        self.as_resolved().and_then(|r| r.as_peers.as_deref())
    }

    /// Human-readable status, e.g. `resolved`, `partial: peer no-answer (NXDOMAIN)`
    pub fn status(&self) -> String {
        match self {
            LookupRecord::Resolved(r) if r.is_complete() => RecordStatus::Resolved.to_string(),
            LookupRecord::Resolved(r) => {
                let issues = r
                    .issues
                    .iter()
                    .map(|i| format!("{} {}", i.stage, i.error.status_label()))
                    .collect::<Vec<_>>()
                    .join("; ");
                format!("{}: {}", RecordStatus::Partial, issues)
            }
            LookupRecord::Missing {
                reason: MissingReason::Failed(e),
            } => e.status_label(),
            LookupRecord::Missing {
                reason: MissingReason::NotAttempted,
            } => RecordStatus::NotAttempted.to_string(),
        }
    }

    /// Flat column view in output order: ASN, BGP Prefix, Country Code, RIR,
    /// Allocation Date, AS Description, AS Peers, Lookup Status
    pub fn columns(&self) -> [String; 8] {
        let opt = |v: Option<&str>| v.unwrap_or_default().to_string();
        [
            opt(self.asn()),
            opt(self.bgp_prefix()),
            self.country_code().to_string(),
            self.rir().to_string(),
            opt(self.allocation_date()),
            opt(self.as_description()),
            opt(self.as_peers()),
            self.status(),
        ]
    }
}

/// Column names matching [`LookupRecord::columns`]
pub const RECORD_COLUMNS: [&str; 8] = [
    "ASN",
    "BGP Prefix",
    "Country Code",
    "RIR",
    "Allocation Date",
    "AS Description",
    "AS Peers",
    "Lookup Status",
];

/// Flattened record for display, keyed by the address it describes
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "display", derive(tabled::Tabled))]
pub struct LookupRow {
    #[serde(rename = "ip")]
    #[cfg_attr(feature = "display", tabled(rename = "IP"))]
    pub address: String,
    #[cfg_attr(feature = "display", tabled(rename = "ASN"))]
    pub asn: String,
    #[cfg_attr(feature = "display", tabled(rename = "Prefix"))]
    pub bgp_prefix: String,
    #[cfg_attr(feature = "display", tabled(rename = "CC"))]
    pub country_code: String,
    #[cfg_attr(feature = "display", tabled(rename = "RIR"))]
    pub rir: String,
    #[cfg_attr(feature = "display", tabled(rename = "Allocated"))]
    pub allocation_date: String,
    #[cfg_attr(feature = "display", tabled(rename = "AS Description"))]
    pub as_description: String,
    #[cfg_attr(feature = "display", tabled(rename = "AS Peers"))]
    pub as_peers: String,
    #[cfg_attr(feature = "display", tabled(rename = "Status"))]
    pub status: String,
}

impl LookupRow {
    pub fn new(address: &str, record: &LookupRecord) -> Self {
        let [asn, bgp_prefix, country_code, rir, allocation_date, as_description, as_peers, status] =
            record.columns();
        Self {
            address: address.to_string(),
            asn,
            bgp_prefix,
            country_code,
            rir,
            allocation_date,
            as_description,
            as_peers,
            status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolved() -> ResolvedRecord {
        ResolvedRecord {
            asn: "15169".to_string(),
            bgp_prefix: "8.8.8.0/24".to_string(),
            country_code: "US".to_string(),
            rir: "arin".to_string(),
            allocation_date: "2023-12-28".to_string(),
            as_description: Some("GOOGLE, US".to_string()),
            as_peers: Some("1299 2914 3257".to_string()),
            issues: vec![],
        }
    }

    #[test]
    fn test_missing_record_sentinels() {
        let record = LookupRecord::missing(LookupError::NoAnswer {
            query: "5.113.0.203.origin.asn.cymru.com.".to_string(),
            rcode: "NXDOMAIN".to_string(),
        });
        assert_eq!(record.country_code(), "None");
        assert_eq!(record.rir(), "None");
        assert_eq!(record.asn(), None);
        assert_eq!(record.bgp_prefix(), None);
        assert_eq!(record.allocation_date(), None);
        assert_eq!(record.as_description(), None);
        assert_eq!(record.as_peers(), None);
        assert_eq!(record.record_status(), RecordStatus::Missing);
        assert_eq!(record.status(), "no-answer (NXDOMAIN)");
    }

    #[test]
    fn test_resolved_columns() {
        let record = LookupRecord::Resolved(resolved());
        let cols = record.columns();
        assert_eq!(cols[0], "15169");
        assert_eq!(cols[2], "US");
        assert_eq!(cols[5], "GOOGLE, US");
        assert_eq!(cols[7], "resolved");
        assert_eq!(record.record_status(), RecordStatus::Resolved);
    }

    #[test]
    fn test_partial_status_names_failed_stage() {
        let mut r = resolved();
        r.as_peers = None;
        r.issues.push(StageIssue {
            stage: QueryStage::Peer,
            error: LookupError::TransportFailure {
                query: "8.8.8.8.peer.asn.cymru.com.".to_string(),
                reason: "timed out after 2000 ms".to_string(),
            },
        });
        let record = LookupRecord::Resolved(r);
        assert_eq!(record.record_status(), RecordStatus::Partial);
        assert!(record.has_transport_failure());
        assert_eq!(
            record.status(),
            "partial: peer transport-failure: timed out after 2000 ms"
        );
        assert_eq!(record.columns()[6], "");
    }

    #[test]
    fn test_not_attempted() {
        let record = LookupRecord::not_attempted();
        assert_eq!(record.record_status(), RecordStatus::NotAttempted);
        assert_eq!(record.status(), "not-attempted");
        assert_eq!(record.country_code(), MISSING_SENTINEL);
        assert!(!record.has_transport_failure());
    }

    #[test]
    fn test_transport_failure_policy_from_str() {
        assert_eq!(
            TransportFailurePolicy::from_str("record").unwrap(),
            TransportFailurePolicy::Record
        );
        assert_eq!(
            TransportFailurePolicy::from_str("HALT").unwrap(),
            TransportFailurePolicy::Halt
        );
        assert!(TransportFailurePolicy::from_str("retry").is_err());
        assert_eq!(TransportFailurePolicy::Halt.to_string(), "halt");
    }

    #[test]
    fn test_records_survive_json() {
        let mut partial = resolved();
        partial.as_description = None;
        partial.issues.push(StageIssue {
            stage: QueryStage::AsnDescription,
            error: LookupError::MalformedAnswer {
                expected: 5,
                found: 2,
                answer: "15169 | US".to_string(),
            },
        });
        let records = vec![
            LookupRecord::Resolved(resolved()),
            LookupRecord::Resolved(partial),
            LookupRecord::missing(LookupError::InvalidAddress {
                input: "x".to_string(),
            }),
            LookupRecord::not_attempted(),
        ];

        let json = serde_json::to_string(&records).unwrap();
        let parsed: Vec<LookupRecord> = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, records);

        let value = serde_json::to_value(&records[0]).unwrap();
        assert_eq!(value["result"], "resolved");
        assert!(value.get("issues").is_none());
    }

    #[test]
    fn test_lookup_row() {
        let row = LookupRow::new("8.8.8.8", &LookupRecord::Resolved(resolved()));
        assert_eq!(row.address, "8.8.8.8");
        assert_eq!(row.as_peers, "1299 2914 3257");
        let json = serde_json::to_value(&row).unwrap();
        assert_eq!(json["ip"], "8.8.8.8");
    }
}
