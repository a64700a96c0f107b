//! Property-based coverage for the invariants listed in the spec's testable-properties section,
//! beyond what each module's own example-based unit tests already exercise.

use proptest::prelude::*;

use consensus_core::barcode::is_passable;
use consensus_core::family::{collapse_family, Read};
use consensus_core::rescaler::NoopRescaler;
use consensus_core::rescue::{merge_records, AlignedRecord};
use consensus_core::shard::shard_index;

fn base_strategy() -> impl Strategy<Value = char> {
    prop::sample::select(vec!['A', 'C', 'G', 'T'])
}

fn sequence_strategy(len: usize) -> impl Strategy<Value = String> {
    prop::collection::vec(base_strategy(), len..=len)
        .prop_map(|chars| chars.into_iter().collect())
}

fn make_read(name: &str, barcode: &str, seq: &str, qual: u8) -> Read {
    Read {
        name: name.to_string(),
        barcode: barcode.to_string(),
        sequence: seq.as_bytes().to_vec(),
        quality: vec![qual; seq.len()],
        mate: 1,
        is_reverse_strand: false,
        pass_filter: true,
    }
}

proptest! {
    /// Property 2: order-independence. Shuffling a family's member order never changes the
    /// consensus sequence or PV array.
    #[test]
    fn order_independence_holds_for_arbitrary_families(
        seqs in prop::collection::vec(sequence_strategy(6), 2..6),
        quals in prop::collection::vec(20u8..60, 2..6),
    ) {
        let n = seqs.len().min(quals.len());
        let reads: Vec<Read> = (0..n)
            .map(|i| make_read(&format!("r{i}"), "ACGTAC", &seqs[i], quals[i]))
            .collect();

        let forward = collapse_family(&reads, 0.0, false, 10, &NoopRescaler);

        let mut reversed_reads = reads.clone();
        reversed_reads.reverse();
        let reversed = collapse_family(&reversed_reads, 0.0, false, 10, &NoopRescaler);

        prop_assert_eq!(forward.len(), reversed.len());
        for (f, r) in forward.iter().zip(reversed.iter()) {
            prop_assert_eq!(&f.sequence, &r.sequence);
            prop_assert_eq!(&f.pv, &r.pv);
        }
    }

    /// Property 4: FM accounting. The sum of FM across every output family equals the number of
    /// pass-filter input reads fed in (failing reads are generated here only as an on/off flag
    /// per read, keeping the arithmetic easy to check independent of grouping).
    #[test]
    fn fm_sum_equals_pass_filter_read_count(
        seq in sequence_strategy(5),
        pass_flags in prop::collection::vec(any::<bool>(), 1..8),
    ) {
        let reads: Vec<Read> = pass_flags
            .iter()
            .enumerate()
            .map(|(i, &pass)| {
                let mut r = make_read(&format!("r{i}"), "TTTTAA", &seq, 40);
                r.pass_filter = pass;
                r
            })
            .collect();

        let expected: u32 = pass_flags.iter().filter(|&&p| p).count() as u32;
        let out = collapse_family(&reads, 0.0, false, 10, &NoopRescaler);
        let total: u32 = out.iter().map(|c| c.fm).sum();
        prop_assert_eq!(total, expected);
    }

    /// Property 6: `is_passable` rejects the instant a homopolymer run reaches the threshold, not
    /// one base earlier.
    #[test]
    fn homopolymer_boundary_is_exact(threshold in 2usize..8, run_len in 1usize..10) {
        let barcode: String = std::iter::repeat('A').take(run_len).collect();
        let passable = is_passable(barcode.as_bytes(), threshold);
        prop_assert_eq!(passable, run_len < threshold);
    }

    /// Property 7: barcode sharder totality. The shard index is a pure function of the barcode's
    /// first k nucleotides, so two barcodes sharing that prefix always land in the same shard and
    /// the index is always within `[0, 4^k)`.
    #[test]
    fn shard_index_is_total_and_bounded(
        prefix in sequence_strategy(4),
        suffix_a in sequence_strategy(4),
        suffix_b in sequence_strategy(4),
    ) {
        let k = 4;
        let barcode_a = format!("{prefix}{suffix_a}");
        let barcode_b = format!("{prefix}{suffix_b}");
        let idx_a = shard_index(barcode_a.as_bytes(), k);
        let idx_b = shard_index(barcode_b.as_bytes(), k);
        prop_assert_eq!(idx_a, idx_b);
        prop_assert!(idx_a < 4usize.pow(k as u32));
    }
}

fn aligned_record(name: &str, barcode: &str, seq: &[u8]) -> AlignedRecord {
    AlignedRecord {
        name: name.to_string(),
        barcode: barcode.to_string(),
        tid: 0,
        pos: 100,
        mate_tid: 0,
        mate_pos: 300,
        unclipped_start: None,
        mate_unclipped_start: None,
        is_reverse: false,
        mate_is_reverse: true,
        is_read1: true,
        unmapped: false,
        secondary: false,
        supplementary: false,
        mate_unmapped: false,
        sequence: seq.to_vec(),
        quality: vec![40; seq.len()],
        pv: vec![40; seq.len()],
        fa: vec![1; seq.len()],
        fm: 1,
        rv: 0,
        fp: 1,
        nc: 0,
    }
}

/// Property 3: associativity of pairwise merge (sequence and FM only; PV rounding is allowed to
/// differ and is not checked here). Merging three mergeable records left-to-right or
/// right-to-left yields the same final sequence and FM.
#[test]
fn pairwise_merge_is_associative_in_sequence_and_fm() {
    let a = aligned_record("a", "AAAA", b"AACG");
    let b = aligned_record("b", "AAAT", b"AACG");
    let c = aligned_record("c", "AATA", b"AACG");

    let mut left_to_right = a.clone();
    merge_records(&mut left_to_right, b.clone());
    merge_records(&mut left_to_right, c.clone());

    let mut bc = b;
    merge_records(&mut bc, c);
    let mut right_to_left = a;
    merge_records(&mut right_to_left, bc);

    assert_eq!(left_to_right.sequence, right_to_left.sequence);
    assert_eq!(left_to_right.fm, right_to_left.fm);
}
