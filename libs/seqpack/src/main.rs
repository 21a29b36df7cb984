use std::{fs::File, io::BufReader, path::PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use miette::IntoDiagnostic;
use seqpack::{ContextValue, FeatureKind, FeatureValue, PackConfig, Packet, Record};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Clone)]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
    #[clap(
        long,
        value_enum,
        default_value = "info",
        global = true,
        help = "Log level (error, warn, info, debug, trace)"
    )]
    log_level: LogLevel,
}

#[derive(Subcommand, Clone)]
enum Commands {
    #[command(about = "Pack a clip's packets into a record")]
    Pack(PackArgs),
    #[command(about = "Print a summary of a record")]
    Inspect(InspectArgs),
}

#[derive(clap::Args, Clone, Debug)]
struct PackArgs {
    #[clap(long, help = "Path to the TOML pack configuration")]
    config: PathBuf,
    #[clap(long, help = "Path to a JSON array of packets")]
    packets: PathBuf,
    #[clap(long, help = "Existing record to extend or replace")]
    seed: Option<PathBuf>,
    #[clap(long, short, help = "Path for the packed record")]
    output: PathBuf,
}

#[derive(clap::Args, Clone, Debug)]
struct InspectArgs {
    #[clap(help = "Path to the record")]
    path: PathBuf,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn as_str(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

fn main() -> miette::Result<()> {
    let args = Cli::parse();
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::builder().from_env_lossy()
    } else {
        EnvFilter::builder().parse_lossy(format!("seqpack={}", args.log_level.as_str()))
    };

    let _ = tracing_subscriber::fmt::fmt()
        .with_target(false)
        .with_env_filter(filter)
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::new(
            "%Y-%m-%d %H:%M:%S%.3f".to_string(),
        ))
        .try_init();

    match args.command {
        Commands::Pack(PackArgs {
            config,
            packets,
            seed,
            output,
        }) => {
            let config = PackConfig::load(&config)?;
            let file = File::open(&packets).into_diagnostic()?;
            let packets: Vec<Packet> =
                serde_json::from_reader(BufReader::new(file)).into_diagnostic()?;
            let seed = seed.map(Record::read).transpose()?;
            info!(packets = packets.len(), ?output, "packing");
            let record = seqpack::pack(&config, seed, packets)?;
            record.write(&output)?;
            Ok(())
        }
        Commands::Inspect(InspectArgs { path }) => {
            let record = Record::read(&path)?;
            println!("Record: {}", path.display());
            println!();
            println!("Context:");
            for (key, value) in record.context_entries() {
                println!("  {key}: {}", describe_context(value));
            }
            println!();
            println!("Features:");
            for (key, sequence) in record.features() {
                let span = match (sequence.timestamp_at(0), sequence.last_timestamp()) {
                    (Some(first), Some(last)) => format!("{first}..={last}"),
                    _ => "-".to_string(),
                };
                println!(
                    "  {key}: {} entries ({span}), {}",
                    sequence.len(),
                    sequence
                        .value_at(0)
                        .map(describe_value)
                        .unwrap_or("empty")
                );
                let labels = record.class_labels(key.name.as_deref());
                if key.kind == FeatureKind::ClassSegmentation && !labels.is_empty() {
                    println!("    class labels: {}", labels.join(", "));
                }
            }
            Ok(())
        }
    }
}

fn describe_context(value: &ContextValue) -> String {
    match value {
        ContextValue::Bytes(b) => match std::str::from_utf8(b) {
            Ok(s) => format!("{s:?}"),
            Err(_) => format!("<{} bytes>", b.len()),
        },
        ContextValue::Int(v) => v.to_string(),
        ContextValue::Float(v) => v.to_string(),
    }
}

fn describe_value(value: &FeatureValue) -> &'static str {
    match value {
        FeatureValue::Bytes(_) => "encoded bytes",
        FeatureValue::Floats(_) => "float vectors",
        FeatureValue::Boxes(_) => "box lists",
    }
}
