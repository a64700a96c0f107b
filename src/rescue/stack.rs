//! Stack formation and flattening (spec §4.5 steps 2-5): records sharing an alignment position
//! (and, for paired data, a mate position) accumulate into one `Stack`; `flatten` then merges
//! barcode-near duplicates within it down to one record per distinct molecule.

use crate::config::Config;

use super::record::{grouping_position, mate_grouping_position, merge_records, AlignedRecord};

/// Grouping key for stack membership (spec §4.5 step 2), mirroring the original source's
/// `bmfsort_core_key`/`bmfsort_mate_key`: tid/position, strand, read-end, and — for paired data —
/// the mate's tid/position and strand. Read length also partitions the stack, since records of
/// different lengths can never be barcode-merge candidates (spec §4.5 step 3).
#[derive(Debug, Clone, PartialEq, Eq)]
struct StackKey {
    tid: i32,
    pos: i64,
    is_reverse: bool,
    is_read1: bool,
    mate_tid: i32,
    mate_pos: i64,
    mate_is_reverse: bool,
    length: usize,
}

fn stack_key(record: &AlignedRecord, unclipped: bool) -> Option<StackKey> {
    Some(StackKey {
        tid: record.tid,
        pos: grouping_position(record, unclipped)?,
        is_reverse: record.is_reverse,
        is_read1: record.is_read1,
        mate_tid: record.mate_tid,
        mate_pos: mate_grouping_position(record, unclipped)?,
        mate_is_reverse: record.mate_is_reverse,
        length: record.len(),
    })
}

/// A group of records that share a [`StackKey`] and are therefore barcode-merge candidates.
pub struct Stack {
    key: StackKey,
    records: Vec<AlignedRecord>,
}

impl Stack {
    fn new(first: AlignedRecord, key: StackKey) -> Stack {
        Stack {
            key,
            records: vec![first],
        }
    }

    fn matches(&self, record: &AlignedRecord, unclipped: bool) -> bool {
        stack_key(record, unclipped).as_ref() == Some(&self.key)
    }

    fn push(&mut self, record: AlignedRecord) {
        self.records.push(record);
    }

    /// Collapses barcode-near-duplicates within the stack (spec §4.5 steps 3-5): an O(n^2) scan
    /// comparing every live record against every other, merging on a Hamming distance at or
    /// below `mmthr`. Records outside any merge distance pass through unmodified.
    ///
    /// Per spec §4.5 step 4 ("merge i into j and mark i destroyed"), the *later* index in the
    /// pair survives and the earlier one is destroyed — not the reverse. Hamming distance is not
    /// transitive, so which record survives a merge determines which barcode later comparisons
    /// in the same stack run against; matching the spec's literal survivor choice here is what
    /// keeps this stack's final grouping consistent with the reference algorithm.
    pub fn flatten(self, config: &Config) -> Vec<AlignedRecord> {
        let mut live: Vec<Option<AlignedRecord>> = self.records.into_iter().map(Some).collect();

        for i in 0..live.len() {
            if live[i].is_none() {
                continue;
            }
            let mut j = i + 1;
            while j < live.len() {
                let merge = match (&live[i], &live[j]) {
                    (Some(p), Some(b)) => {
                        p.len() == b.len() && p.barcode_distance(b) <= config.mmthr
                    }
                    _ => false,
                };
                if merge {
                    let destroyed = live[i].take().unwrap();
                    let survivor = live[j].as_mut().unwrap();
                    merge_records(survivor, destroyed);
                    break;
                }
                j += 1;
            }
        }

        live.into_iter().flatten().collect()
    }
}

/// Groups a sorted stream of [`AlignedRecord`]s into [`Stack`]s, yielding each stack as soon as
/// the next record no longer belongs to it (spec §4.5 step 2). The input must already be sorted
/// by the configured [`crate::config::CmpKey`]; this function does not re-sort.
pub struct StackGrouper {
    unclipped: bool,
    current: Option<Stack>,
}

impl StackGrouper {
    pub fn new(unclipped: bool) -> StackGrouper {
        StackGrouper {
            unclipped,
            current: None,
        }
    }

    /// Feeds one more record in; returns a completed stack if this record started a new one.
    pub fn push(&mut self, record: AlignedRecord) -> Option<Stack> {
        if let Some(stack) = &self.current {
            if stack.matches(&record, self.unclipped) {
                self.current.as_mut().unwrap().push(record);
                return None;
            }
        }
        let key = stack_key(&record, self.unclipped);
        let finished = self.current.take();
        self.current = key.map(|key| Stack::new(record, key));
        finished
    }

    /// Flushes the final in-progress stack at end of stream.
    pub fn finish(&mut self) -> Option<Stack> {
        self.current.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn rec(name: &str, barcode: &str, tid: i32, pos: i64) -> AlignedRecord {
        AlignedRecord {
            name: name.to_string(),
            barcode: barcode.to_string(),
            tid,
            pos,
            mate_tid: tid,
            mate_pos: pos + 200,
            unclipped_start: None,
            mate_unclipped_start: None,
            is_reverse: false,
            mate_is_reverse: true,
            is_read1: true,
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
            nc: 0,
        }
    }

    #[test]
    fn records_at_same_position_form_one_stack() {
        let mut grouper = StackGrouper::new(false);
        assert!(grouper.push(rec("a", "AAAA", 0, 100)).is_none());
        assert!(grouper.push(rec("b", "AAAA", 0, 100)).is_none());
        let finished = grouper.push(rec("c", "AAAA", 0, 200));
        assert!(finished.is_some());
        assert_eq!(finished.unwrap().records.len(), 2);
        let last = grouper.finish().unwrap();
        assert_eq!(last.records.len(), 1);
    }

    #[test]
    fn flatten_merges_within_mismatch_threshold() {
        let config = Config::default();
        let stack = Stack::new(rec("a", "AAAA", 0, 100), stack_key(&rec("a", "AAAA", 0, 100), false).unwrap());
        let mut stack = stack;
        stack.push(rec("b", "AAAT", 0, 100));
        let out = stack.flatten(&config);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].fm, 2);
    }

    #[test]
    fn flatten_leaves_distant_barcodes_separate() {
        let config = Config::default();
        let key = stack_key(&rec("a", "AAAA", 0, 100), false).unwrap();
        let mut stack = Stack::new(rec("a", "AAAA", 0, 100), key);
        stack.push(rec("b", "TTTT", 0, 100));
        let out = stack.flatten(&config);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn flatten_follows_non_transitive_chain_via_surviving_later_index() {
        // AAAA(0)/ACAA(1) distance 1, ACAA(1)/ACCC(2) distance 2, AAAA(0)/ACCC(2) distance 3.
        // With mmthr=2: 0 merges into 1 (1 survives keeping barcode ACAA), then the surviving 1
        // is close enough to 2 to also merge, collapsing all three into one record.
        let mut config = Config::default();
        config.mmthr = 2;
        let key = stack_key(&rec("a", "AAAA", 0, 100), false).unwrap();
        let mut stack = Stack::new(rec("a", "AAAA", 0, 100), key);
        stack.push(rec("b", "ACAA", 0, 100));
        stack.push(rec("c", "ACCC", 0, 100));
        let out = stack.flatten(&config);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].fm, 3);
    }
}
