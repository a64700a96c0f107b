//! Family collapser (pre-alignment path, spec §4.4): groups a set of reads sharing an exact
//! barcode into one [`ConsensusRead`] per read-end.

use std::collections::HashMap;

use crate::barcode::{is_passable, reverse_complement};
use crate::rescaler::Rescaler;
use crate::seqbuf::{observations_from_read, ConsensusBuilder, ConsensusRead};

/// One demultiplexed input read (spec §3).
#[derive(Debug, Clone)]
pub struct Read {
    pub name: String,
    pub barcode: String,
    pub sequence: Vec<u8>,
    /// Phred-scale quality, one value per base of `sequence`.
    pub quality: Vec<u8>,
    /// `1` or `2`.
    pub mate: u8,
    pub is_reverse_strand: bool,
    pub pass_filter: bool,
}

impl Read {
    fn is_read1(&self) -> bool {
        self.mate == 1
    }
}

/// Canonicalizes a barcode for grouping when `annealed_check` is enabled: the lexicographically
/// smaller of the barcode and its reverse complement, so that reads of the same molecule
/// sequenced from either strand land in the same family.
fn canonical_barcode(barcode: &str, annealed_check: bool) -> String {
    if !annealed_check {
        return barcode.to_string();
    }
    let rc = String::from_utf8(reverse_complement(barcode.as_bytes())).unwrap_or_default();
    if rc < *barcode {
        rc
    } else {
        barcode.to_string()
    }
}

/// Grouping key: read-end, family length, and (possibly canonicalized) barcode (spec §4.4 step
/// 1 — "length is part of the grouping key").
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct GroupKey {
    mate: u8,
    length: usize,
    barcode: String,
}

/// Collapses a batch of reads sharing an exact barcode into one consensus read per read-end
/// (and, within a read-end, per observed length — see [`GroupKey`]).
///
/// Only pass-filter reads are collapsed (spec §7/§8 property 4: `FM` accounting covers pass-
/// filter input reads only). A family of size 1 is emitted unchanged except for tag insertion
/// (spec §4.4 "Failure semantics").
///
/// A read whose barcode fails [`is_passable`] (any `N`, or a homopolymer run reaching
/// `hp_threshold`) is dropped before grouping, the same as a fail-filter read (spec §4.2, §4.4).
pub fn collapse_family(
    reads: &[Read],
    min_frac_agreed: f64,
    annealed_check: bool,
    hp_threshold: usize,
    rescaler: &dyn Rescaler,
) -> Vec<ConsensusRead> {
    let mut groups: HashMap<GroupKey, Vec<usize>> = HashMap::new();

    for (idx, read) in reads.iter().enumerate() {
        if !read.pass_filter || !is_passable(read.barcode.as_bytes(), hp_threshold) {
            continue;
        }
        let key = GroupKey {
            mate: read.mate,
            length: read.sequence.len(),
            barcode: canonical_barcode(&read.barcode, annealed_check),
        };
        groups.entry(key).or_default().push(idx);
    }

    let mut keys: Vec<&GroupKey> = groups.keys().collect();
    // Deterministic output order: read1 before read2, then by barcode, then by length.
    keys.sort_by(|a, b| (a.mate, &a.barcode, a.length).cmp(&(b.mate, &b.barcode, b.length)));

    let mut out = Vec::with_capacity(keys.len());
    for key in keys {
        let indices = &groups[key];
        let mut builder = ConsensusBuilder::new(key.length);

        let mut best_name: Option<&str> = None;
        for &idx in indices {
            let read = &reads[idx];
            match best_name {
                Some(current) if current <= read.name.as_str() => {}
                _ => best_name = Some(&read.name),
            }
        }

        for &idx in indices {
            let read = &reads[idx];
            let was_rc = canonical_barcode(&read.barcode, annealed_check) != read.barcode;
            let (seq, qual);
            if was_rc {
                seq = reverse_complement(&read.sequence);
                qual = read.quality.iter().rev().copied().collect::<Vec<_>>();
            } else {
                seq = read.sequence.clone();
                qual = read.quality.clone();
            }
            let observations = observations_from_read(&seq, &qual, rescaler);
            builder.ingest(best_name.unwrap_or(&read.name), &observations, was_rc);
        }

        out.push(builder.finalize(min_frac_agreed));
    }

    out
}
