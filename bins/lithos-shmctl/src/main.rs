use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use lithos_config::SegmentConfig;
use lithos_shm::{AccessMode, OpenMode, Permissions, SharedMemory, SharedMemoryName};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "lithos-shmctl")]
#[command(about = "Create, inspect and remove lithos shared memory segments")]
struct Cli {
    /// Log filter used when RUST_LOG is not set
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create (or open) a segment and hold it for a while
    ///
    /// A segment created by this invocation is unlinked when the command
    /// exits. With the default `--hold-secs 0` that happens right after its
    /// size is reported.
    Create {
        /// Segment name, e.g. /lithos_md_bus
        #[arg(required_unless_present = "config", conflicts_with = "config")]
        name: Option<String>,

        /// Read segment settings from a TOML file instead of flags
        #[arg(long)]
        config: Option<PathBuf>,

        #[arg(long, default_value = "65536")]
        size: u64,

        /// exclusive_create | purge_and_create | open_or_create | open_existing
        #[arg(long, default_value = "open_or_create", value_parser = parse_open_mode)]
        mode: OpenMode,

        /// read_only | read_write
        #[arg(long, default_value = "read_write", value_parser = parse_access_mode)]
        access: AccessMode,

        /// Octal permission bits applied on creation
        #[arg(long, default_value = "600", value_parser = parse_octal)]
        permissions: u32,

        /// Seconds to keep the segment open before releasing it.
        /// 0 releases it immediately.
        #[arg(long, default_value = "0")]
        hold_secs: u64,
    },
    /// Open an existing segment read-only and report its size
    Inspect { name: String },
    /// Remove a segment name, e.g. one left behind by a crashed owner
    Unlink { name: String },
}

fn parse_open_mode(s: &str) -> Result<OpenMode, String> {
    [
        OpenMode::ExclusiveCreate,
        OpenMode::PurgeAndCreate,
        OpenMode::OpenOrCreate,
        OpenMode::OpenExisting,
    ]
    .into_iter()
    .find(|m| m.as_str() == s)
    .ok_or_else(|| format!("unknown open mode '{s}'"))
}

fn parse_access_mode(s: &str) -> Result<AccessMode, String> {
    [AccessMode::ReadOnly, AccessMode::ReadWrite]
        .into_iter()
        .find(|m| m.as_str() == s)
        .ok_or_else(|| format!("unknown access mode '{s}'"))
}

fn parse_octal(s: &str) -> Result<u32, String> {
    let digits = s.trim_start_matches("0o");
    u32::from_str_radix(digits, 8).map_err(|e| format!("invalid octal permissions '{s}': {e}"))
}

fn parse_name(s: &str) -> anyhow::Result<SharedMemoryName> {
    SharedMemoryName::try_from(s).with_context(|| format!("invalid segment name '{s}'"))
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

fn report(shm: &SharedMemory) -> anyhow::Result<()> {
    let size = shm.segment_size().context("failed to query segment size")?;
    println!(
        "{}: handle={} owner={} size={}",
        shm.name(),
        shm.handle(),
        shm.has_ownership(),
        size
    );
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Create {
            name,
            config,
            size,
            mode,
            access,
            permissions,
            hold_secs,
        } => {
            let shm = match (config, name) {
                (Some(path), _) => {
                    let cfg = SegmentConfig::load(path.display().to_string())?;
                    init_tracing(cli.log_level.as_deref().unwrap_or(&cfg.log_level));
                    cfg.create_segment()
                        .with_context(|| format!("failed to create '{}'", cfg.name))?
                }
                (None, Some(name)) => {
                    init_tracing(cli.log_level.as_deref().unwrap_or("info"));
                    let name = parse_name(&name)?;
                    SharedMemory::create(&name, access, mode, Permissions::from_bits(permissions), size)
                        .with_context(|| format!("failed to create '{name}'"))?
                }
                (None, None) => bail!("either a segment name or --config is required"),
            };

            report(&shm)?;
            if hold_secs > 0 {
                tracing::info!(name = %shm.name(), hold_secs, "holding segment");
                std::thread::sleep(Duration::from_secs(hold_secs));
            }
            // dropping removes the name if this invocation created it
        }
        Command::Inspect { name } => {
            init_tracing(cli.log_level.as_deref().unwrap_or("info"));
            let name = parse_name(&name)?;
            let shm = SharedMemory::create(
                &name,
                AccessMode::ReadOnly,
                OpenMode::OpenExisting,
                Permissions::NONE,
                0,
            )
            .with_context(|| format!("failed to open '{name}'"))?;
            report(&shm)?;
        }
        Command::Unlink { name } => {
            init_tracing(cli.log_level.as_deref().unwrap_or("info"));
            let name = parse_name(&name)?;
            let removed = SharedMemory::unlink_if_exist(&name)
                .with_context(|| format!("failed to unlink '{name}'"))?;
            if removed {
                println!("{name}: removed");
            } else {
                println!("{name}: not present");
            }
        }
    }

    Ok(())
}
