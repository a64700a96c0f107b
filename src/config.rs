//! Run configuration (spec §6). Loadable from a YAML file the way `parser::Cli` is in
//! `MaelLefeuvre-grups-rs`, but kept a plain struct here since the core has no simulation
//! sub-commands to branch on.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Error, Result};

/// Which sort-order contract the positional rescue pass enforces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CmpKey {
    /// `SO:positional_rescue`, keyed on `(tid, pos+1, strand, is_read1)`.
    Position,
    /// `SO:unclipped_rescue`, keyed on `(tid, unclipped_start+1, strand, is_read1)` via `SU`/`MU`.
    Unclipped,
}

impl CmpKey {
    /// The literal `@HD SO:` value this mode requires.
    pub fn sort_order_tag(self) -> &'static str {
        match self {
            CmpKey::Position => "positional_rescue",
            CmpKey::Unclipped => "unclipped_rescue",
        }
    }
}

/// All options the core recognizes (spec §6 table).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Rejects barcodes whose maximum homopolymer run reaches this value.
    pub hp_threshold: usize,
    /// Maximum Hamming distance for a rescue merge.
    pub mmthr: usize,
    /// Shard prefix length k; shards are binned into 4^k buckets.
    pub n_nucs: usize,
    /// Parallel family-collapse workers.
    pub workers: usize,
    /// Sort-order contract for the positional rescue pass.
    pub cmpkey: CmpKey,
    /// Consensus agreement fraction below which a position is masked to N.
    pub min_frac_agreed: f64,
    /// Single-end mode (no mate).
    pub is_se: bool,
    /// Enable reverse-complement barcode comparison during rescue.
    pub annealed_check: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            hp_threshold: 10,
            mmthr: 2,
            n_nucs: 4,
            workers: 4,
            cmpkey: CmpKey::Position,
            min_frac_agreed: 0.8,
            is_se: false,
            annealed_check: false,
        }
    }
}

impl Config {
    /// Loads and validates a configuration from a YAML file.
    ///
    /// `Config` errors are surfaced here, before any worker starts, per spec §7.
    pub fn from_yaml_path(path: impl AsRef<Path>) -> Result<Config> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks invariants that can be verified without touching any input file.
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(Error::Config("workers must be at least 1".into()));
        }
        if self.n_nucs == 0 || self.n_nucs > 16 {
            return Err(Error::Config("n_nucs must be in 1..=16".into()));
        }
        if !(0.0..=1.0).contains(&self.min_frac_agreed) {
            return Err(Error::Config("min_frac_agreed must be in [0.0, 1.0]".into()));
        }
        Ok(())
    }

    /// Number of barcode-prefix shards for this run: `4^n_nucs`.
    pub fn shard_count(&self) -> usize {
        4usize.pow(self.n_nucs as u32)
    }
}
