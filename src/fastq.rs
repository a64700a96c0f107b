//! FASTQ comment grammars the core depends on (spec §6). Parsing and formatting of the full
//! FASTQ record (the `@name\nSEQ\n+\nQUAL\n` block) is an I/O-codec concern left to the external
//! splitter/writer; only the comment grammar carrying pass/fail flag, barcode, and output tags is
//! specified here, since its semantics bleed directly into the family collapser.

use crate::error::{Error, Result};
use crate::seqbuf::ConsensusRead;

/// One read as produced by the splitter: `@<read-name> ~#!#~|FP=<0|1>|BS=<barcode>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitComment {
    pub read_name: String,
    pub pass_filter: bool,
    pub barcode: String,
}

const SENTINEL: &str = "~#!#~|";

/// Parses a splitter-produced FASTQ comment line (without the leading `@`).
pub fn parse_split_comment(line: &str) -> Result<SplitComment> {
    let (read_name, rest) = line.split_once(' ').ok_or_else(|| Error::InputFormat {
        record: line.to_string(),
        reason: "missing space-separated comment field".into(),
    })?;

    let rest = rest.strip_prefix(SENTINEL).ok_or_else(|| Error::InputFormat {
        record: line.to_string(),
        reason: format!("comment does not start with sentinel {SENTINEL:?}"),
    })?;

    let mut fp: Option<bool> = None;
    let mut bs: Option<String> = None;
    for field in rest.split('|') {
        if field.is_empty() {
            continue;
        }
        let (key, value) = field.split_once('=').ok_or_else(|| Error::InputFormat {
            record: line.to_string(),
            reason: format!("malformed key=value field {field:?}"),
        })?;
        match key {
            "FP" => {
                fp = Some(match value {
                    "0" => false,
                    "1" => true,
                    other => {
                        return Err(Error::InputFormat {
                            record: line.to_string(),
                            reason: format!("FP must be 0 or 1, got {other:?}"),
                        })
                    }
                });
            }
            "BS" => bs = Some(value.to_string()),
            other => {
                return Err(Error::InputFormat {
                    record: line.to_string(),
                    reason: format!("unknown comment field {other:?}"),
                })
            }
        }
    }

    Ok(SplitComment {
        read_name: read_name.to_string(),
        pass_filter: fp.ok_or_else(|| Error::InputFormat {
            record: line.to_string(),
            reason: "missing FP field".into(),
        })?,
        barcode: bs.ok_or_else(|| Error::InputFormat {
            record: line.to_string(),
            reason: "missing BS field".into(),
        })?,
    })
}

/// Formats the family collapser's output comment: `@<name> PV:B:I,...  FA:B:I,...  FM:i:<n>
/// FP:i:1  RV:i:<count>` (spec §6).
pub fn format_consensus_comment(consensus: &ConsensusRead) -> String {
    let pv = consensus
        .pv
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(",");
    let fa = consensus
        .fa
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(",");

    format!(
        "@{} PV:B:I,{} FA:B:I,{} FM:i:{} FP:i:{} RV:i:{}",
        consensus.name, pv, fa, consensus.fm, consensus.fp, consensus.rv
    )
}

/// Encodes a consensus read's per-base quality as a Phred+33 FASTQ quality line.
pub fn format_quality_line(consensus: &ConsensusRead) -> String {
    consensus
        .quality
        .iter()
        .map(|&q| (q + 33) as char)
        .collect()
}
