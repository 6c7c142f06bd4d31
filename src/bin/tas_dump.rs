use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tas::{Date, Record, RecordKind, StoreConfig, TasStore};

/// 09:30:00 and 16:00:00 in seconds since midnight.
const MARKET_OPEN: i32 = 34_200;
const MARKET_CLOSE: i32 = 57_600;

#[derive(Parser)]
#[command(name = "tas-dump", version, about = "Inspect TAS trades and quotes files")]
struct Cli {
    /// JSON store configuration
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Skip checksum verification
    #[arg(long, global = true)]
    no_checksums: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print header fields and the per-day index
    Info { file: PathBuf },
    /// Print records, one per line
    Dump {
        file: PathBuf,
        /// Only this day (YYYY-MM-DD)
        #[arg(long)]
        date: Option<Date>,
        /// Keep records between 09:30 and 16:00
        #[arg(long)]
        market_hours: bool,
    },
    /// Decode every block and check its checksum
    Verify { file: PathBuf },
}

fn main() {
    env_logger::init();
    if let Err(err) = run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => StoreConfig::load(path).with_context(|| format!("load {}", path.display()))?,
        None => StoreConfig::default(),
    };
    if cli.no_checksums {
        config.checksums_enabled = false;
    }

    let stdout = io::stdout();
    let mut out = io::BufWriter::new(stdout.lock());
    match cli.command {
        Commands::Info { file } => {
            let store = open(&file, config)?;
            writeln!(out, "file:     {}", file.display())?;
            writeln!(out, "kind:     {}", store.kind().extension())?;
            writeln!(out, "exchange: {}", store.exchange())?;
            writeln!(out, "symbol:   {}", store.symbol())?;
            writeln!(out, "days:     {}", store.len())?;
            writeln!(out, "records:  {}", store.total_records())?;
            for entry in store.entries() {
                writeln!(
                    out,
                    "{} offset={} compressed={} uncompressed={} records={}",
                    entry.date,
                    entry.offset,
                    entry.size_compressed,
                    entry.size_uncompressed,
                    entry.record_count()
                )?;
            }
        }
        Commands::Dump {
            file,
            date,
            market_hours,
        } => {
            let store = open(&file, config)?;
            let dates: Vec<Date> = match date {
                Some(date) => vec![date],
                None => store.dates().collect(),
            };
            let total = dates.iter().map(|d| store.record_count(*d)).sum::<u64>().max(1);
            let mut done = 0u64;
            for date in dates {
                for record in store.get(date)? {
                    if market_hours && !(MARKET_OPEN..=MARKET_CLOSE).contains(&record.time) {
                        continue;
                    }
                    write_record(&mut out, store.kind(), date, &record)?;
                }
                done += store.record_count(date);
                log::info!("progress: {:.2}%", 100.0 * done as f64 / total as f64);
            }
        }
        Commands::Verify { file } => {
            let store = open(&file, config)?;
            let report = store.verify()?;
            writeln!(
                out,
                "blocks={} records={} index_ok={} checksum_failures={}",
                report.blocks,
                report.records,
                report.index_ok,
                report.checksum_failures.len()
            )?;
            for date in &report.checksum_failures {
                writeln!(out, "checksum mismatch: {date}")?;
            }
            out.flush()?;
            if !report.is_clean() {
                bail!("{} failed verification", file.display());
            }
        }
    }
    out.flush()?;
    Ok(())
}

fn open(file: &Path, config: StoreConfig) -> Result<TasStore> {
    TasStore::open(file, config).with_context(|| format!("open {}", file.display()))
}

fn write_record(out: &mut impl Write, kind: RecordKind, date: Date, r: &Record) -> io::Result<()> {
    match kind {
        RecordKind::Trades => writeln!(
            out,
            "{date} {} {} {} {} {} {}",
            r.time,
            r.price(),
            r.volume(),
            r.mode_or_g127,
            r.corr,
            r.code_str()
        ),
        RecordKind::Quotes => writeln!(
            out,
            "{date} {} {} {} {} {} {} {}",
            r.time,
            r.bid,
            r.ask,
            r.vol_bid,
            r.vol_ask,
            r.mode_or_g127,
            r.code_str()
        ),
    }
}
