//! Positional rescue (post-alignment path, spec §4.5): groups aligned records that land on the
//! same coordinate into [`Stack`]s, merges barcode-near-duplicates within each stack, and routes
//! anything touched by a merge to a side-channel FASTQ for re-alignment.

mod record;
mod sortorder;
mod stack;

pub use record::{merge_records, AlignedRecord};
pub use sortorder::check_sort_order;
pub use stack::{Stack, StackGrouper};

use std::collections::HashMap;

use log::warn;

use crate::config::Config;
use crate::error::Result;

/// The two output streams positional rescue produces (spec §4.5 step 6).
#[derive(Debug, Default)]
pub struct RescueOutcome {
    /// Records written straight through to the output BAM, unchanged by any merge.
    pub bam_records: Vec<AlignedRecord>,
    /// Records routed to the side-channel FASTQ for re-alignment, read1 before read2.
    pub realign_fastq: Vec<AlignedRecord>,
}

/// Buffers one read-end of a pair until its mate arrives, so a merge-touched record always
/// drags its mate into the realign stream with it (spec §4.5 step 6: "its mate, if previously
/// seen, is flushed in paired order").
struct PairBuffer {
    pending: HashMap<String, AlignedRecord>,
}

impl PairBuffer {
    fn new() -> PairBuffer {
        PairBuffer {
            pending: HashMap::new(),
        }
    }

    /// Routes `record`, pairing it with a previously buffered mate of the same name if present.
    fn route(&mut self, record: AlignedRecord, outcome: &mut RescueOutcome) {
        if let Some(mate) = self.pending.remove(&record.name) {
            let (read1, read2) = if record.is_read1 {
                (record, mate)
            } else {
                (mate, record)
            };
            if read1.nc != 0 || read2.nc != 0 {
                outcome.realign_fastq.push(read1);
                outcome.realign_fastq.push(read2);
            } else {
                outcome.bam_records.push(read1);
                outcome.bam_records.push(read2);
            }
        } else {
            self.pending.insert(record.name.clone(), record);
        }
    }

    /// Flushes any mate-less records left at end of stream: each is routed on its own merit,
    /// with a warning since a well-formed paired BAM should never reach this point.
    fn flush_orphans(mut self, outcome: &mut RescueOutcome) {
        let mut names: Vec<String> = self.pending.keys().cloned().collect();
        names.sort();
        for name in names {
            let record = self.pending.remove(&name).unwrap();
            warn!("rescue: mate never seen for read {name}, flushing as orphan");
            if record.nc != 0 {
                outcome.realign_fastq.push(record);
            } else {
                outcome.bam_records.push(record);
            }
        }
    }
}

fn route_flattened(
    records: Vec<AlignedRecord>,
    is_se: bool,
    pair_buffer: &mut PairBuffer,
    outcome: &mut RescueOutcome,
) {
    for record in records {
        if is_se {
            if record.nc != 0 {
                outcome.realign_fastq.push(record);
            } else {
                outcome.bam_records.push(record);
            }
        } else {
            pair_buffer.route(record, outcome);
        }
    }
}

/// Runs the positional rescue collapser over a stream of already sort-order-validated aligned
/// records (spec §4.5 steps 1-6). Passthrough records (unmapped/secondary/supplementary/mate-
/// unmapped) are written straight to the output BAM without entering any stack.
pub fn run_positional_rescue(
    records: impl Iterator<Item = AlignedRecord>,
    config: &Config,
) -> Result<RescueOutcome> {
    let unclipped = matches!(config.cmpkey, crate::config::CmpKey::Unclipped);
    let mut grouper = StackGrouper::new(unclipped);
    let mut pair_buffer = PairBuffer::new();
    let mut outcome = RescueOutcome::default();

    for record in records {
        if record.is_passthrough() {
            outcome.bam_records.push(record);
            continue;
        }
        if let Some(stack) = grouper.push(record) {
            let flattened = stack.flatten(config);
            route_flattened(flattened, config.is_se, &mut pair_buffer, &mut outcome);
        }
    }
    if let Some(stack) = grouper.finish() {
        let flattened = stack.flatten(config);
        route_flattened(flattened, config.is_se, &mut pair_buffer, &mut outcome);
    }

    pair_buffer.flush_orphans(&mut outcome);
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn rec(name: &str, barcode: &str, pos: i64, is_read1: bool, nc: u32) -> AlignedRecord {
        AlignedRecord {
            name: name.to_string(),
            barcode: barcode.to_string(),
            tid: 0,
            pos,
            mate_tid: 0,
            mate_pos: pos + 200,
            unclipped_start: None,
            mate_unclipped_start: None,
            is_reverse: false,
            mate_is_reverse: true,
            is_read1,
            unmapped: false,
            secondary: false,
            supplementary: false,
            mate_unmapped: false,
            sequence: b"AACG".to_vec(),
            quality: vec![40; 4],
            pv: vec![40; 4],
            fa: vec![1; 4],
            fm: 1,
            rv: 0,
            fp: 1,
            nc,
        }
    }

    #[test]
    fn unmerged_pair_goes_straight_to_bam() {
        let config = Config::default();
        let r1 = rec("read1", "AAAA", 100, true, 0);
        let mut r2 = rec("read1", "AAAA", 300, false, 0);
        r2.pos = 300;
        let outcome = run_positional_rescue(vec![r1, r2].into_iter(), &config).unwrap();
        assert_eq!(outcome.bam_records.len(), 2);
        assert!(outcome.realign_fastq.is_empty());
    }

    #[test]
    fn merged_record_pulls_its_mate_into_realign_stream() {
        let config = Config::default();
        let mut r1a = rec("read1", "AAAA", 100, true, 0);
        let mut r1b = rec("read1-dup", "AAAT", 100, true, 0);
        r1a.name = "read1".to_string();
        r1b.sequence = b"AATG".to_vec();
        let r2 = rec("read1", "AAAA", 300, false, 0);
        let outcome = run_positional_rescue(vec![r1a, r1b, r2].into_iter(), &config).unwrap();
        assert_eq!(outcome.realign_fastq.len(), 2);
        assert!(outcome.bam_records.is_empty());
        assert!(outcome.realign_fastq[0].is_read1);
        assert!(!outcome.realign_fastq[1].is_read1);
    }

    #[test]
    fn passthrough_records_skip_stacking() {
        let config = Config::default();
        let mut unmapped = rec("u1", "AAAA", 100, true, 0);
        unmapped.unmapped = true;
        let outcome = run_positional_rescue(vec![unmapped].into_iter(), &config).unwrap();
        assert_eq!(outcome.bam_records.len(), 1);
    }

    #[test]
    fn orphaned_mate_is_flushed_with_warning_at_end_of_stream() {
        let config = Config::default();
        let r1 = rec("lonely", "AAAA", 100, true, 0);
        let outcome = run_positional_rescue(vec![r1].into_iter(), &config).unwrap();
        assert_eq!(outcome.bam_records.len(), 1);
    }
}
