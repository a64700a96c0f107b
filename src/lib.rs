//! Molecular consensus engine for barcoded high-throughput sequencing reads.
//!
//! Two independent collapse paths share the same quality arithmetic and barcode predicate core:
//! a pre-alignment hash-demultiplex path ([`family`], [`shard`]) and a post-alignment positional
//! rescue path ([`rescue`]).

pub mod barcode;
pub mod config;
pub mod error;
pub mod family;
pub mod fastq;
pub mod quality;
pub mod rescaler;
pub mod rescue;
pub mod seqbuf;
pub mod shard;

pub use config::{CmpKey, Config};
pub use error::{Error, Result};
