//! Ordered result assembly
//!
//! Every input position owns one write-once slot. Workers fill their own
//! slot in any order; [`ResultSlots::finish`] turns the slots back into a
//! vector aligned with the input, marking unfilled positions as not attempted.

use super::types::{LookupRecord, RecordStatus};
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use std::time::Duration;

/// Pre-sized, index-addressed result slots
pub struct ResultSlots {
    slots: Vec<OnceLock<LookupRecord>>,
}

impl ResultSlots {
    pub fn new(len: usize) -> Self {
        Self {
            slots: (0..len).map(|_| OnceLock::new()).collect(),
        }
    }

    /// Store the record for `index`.
    ///
    /// Returns false if the index is out of range or already filled; the
    /// first record written to a slot is kept.
    pub fn fill(&self, index: usize, record: LookupRecord) -> bool {
        self.slots
            .get(index)
            .map(|slot| slot.set(record).is_ok())
            .unwrap_or(false)
    }

    /// Consume the slots into input-ordered records
    pub fn finish(self) -> Vec<LookupRecord> {
        self.slots
            .into_iter()
            .map(|slot| slot.into_inner().unwrap_or_else(LookupRecord::not_attempted))
            .collect()
    }
}

/// Counts for a finished batch
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total: usize,
    pub resolved: usize,
    pub partial: usize,
    pub missing: usize,
    pub not_attempted: usize,
    /// Reason the batch stopped early under the halt policy
    #[serde(skip_serializing_if = "Option::is_none")]
    pub halted: Option<String>,
    pub cancelled: bool,
    pub duration_secs: f64,
}

impl BatchSummary {
    pub fn from_records(
        records: &[LookupRecord],
        halted: Option<String>,
        cancelled: bool,
        duration: Duration,
    ) -> Self {
        let mut summary = BatchSummary {
            total: records.len(),
            halted,
            cancelled,
            duration_secs: duration.as_secs_f64(),
            ..Default::default()
        };
        for record in records {
            match record.record_status() {
                RecordStatus::Resolved => summary.resolved += 1,
                RecordStatus::Partial => summary.partial += 1,
                RecordStatus::Missing => summary.missing += 1,
                RecordStatus::NotAttempted => summary.not_attempted += 1,
            }
        }
        summary
    }

    /// One-line description for logs and terminal output
    pub fn describe(&self) -> String {
        let mut line = format!(
            "{} addresses: {} resolved, {} partial, {} missing, {} not attempted ({:.1}s)",
            self.total,
            self.resolved,
            self.partial,
            self.missing,
            self.not_attempted,
            self.duration_secs
        );
        if let Some(reason) = &self.halted {
            line.push_str(&format!("; halted: {}", reason));
        } else if self.cancelled {
            line.push_str("; cancelled");
        }
        line
    }
}

/// Records of a finished batch, aligned with the input addresses
#[derive(Debug, Clone)]
pub struct LookupBatch {
    pub records: Vec<LookupRecord>,
    pub summary: BatchSummary,
}

impl LookupBatch {
    pub fn is_halted(&self) -> bool {
        self.summary.halted.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lens::cymru::types::{LookupError, ResolvedRecord};

    fn resolved(asn: &str) -> LookupRecord {
        LookupRecord::Resolved(ResolvedRecord {
            asn: asn.to_string(),
            bgp_prefix: String::new(),
            country_code: "US".to_string(),
            rir: "arin".to_string(),
            allocation_date: String::new(),
            as_description: None,
            as_peers: None,
            issues: vec![],
        })
    }

    #[test]
    fn test_slots_preserve_position_regardless_of_fill_order() {
        let slots = ResultSlots::new(3);
        assert!(slots.fill(2, resolved("3")));
        assert!(slots.fill(0, resolved("1")));
        assert!(slots.fill(1, resolved("2")));

        let records = slots.finish();
        let asns: Vec<_> = records.iter().map(|r| r.asn().unwrap()).collect();
        assert_eq!(asns, vec!["1", "2", "3"]);
    }

    #[test]
    fn test_unfilled_slots_become_not_attempted() {
        let slots = ResultSlots::new(3);
        slots.fill(1, resolved("2"));

        let records = slots.finish();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].record_status(), RecordStatus::NotAttempted);
        assert_eq!(records[1].asn(), Some("2"));
        assert_eq!(records[2].record_status(), RecordStatus::NotAttempted);
    }

    #[test]
    fn test_fill_rejects_second_write_and_out_of_range() {
        let slots = ResultSlots::new(1);
        assert!(slots.fill(0, resolved("1")));
        assert!(!slots.fill(0, resolved("9")));
        assert!(!slots.fill(5, resolved("9")));
        assert_eq!(slots.finish()[0].asn(), Some("1"));
    }

    #[test]
    fn test_summary_counts() {
        let records = vec![
            resolved("1"),
            LookupRecord::missing(LookupError::InvalidAddress {
                input: "x".to_string(),
            }),
            LookupRecord::not_attempted(),
        ];
        let summary = BatchSummary::from_records(
            &records,
            Some("transport failure".to_string()),
            false,
            Duration::from_millis(1500),
        );
        assert_eq!(summary.total, 3);
        assert_eq!(summary.resolved, 1);
        assert_eq!(summary.missing, 1);
        assert_eq!(summary.not_attempted, 1);
        assert!(summary.describe().contains("halted: transport failure"));
    }
}
