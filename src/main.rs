use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::filter::EnvFilter;

mod chain;
mod error;
mod log;
mod model;
mod render;
mod router;
mod spec;
#[cfg(test)]
mod testutil;
mod view;

use crate::chain::{FilterChainManager, Mutation};
use crate::error::ChainError;
use crate::log::filter::{parse_cluster_addr, parse_quad_selector};
use crate::log::{Filter, FilterChain, Io, LogField, LogSource, QuadSelector, ThreadedLogSource};
use crate::model::{Aggregate, Topology};
use crate::spec::ClusterAddr;

pub type Result<T> = anyhow::Result<T>;

#[derive(Parser)]
#[command(name = "chiplog")]
#[command(about = "Route chip simulator logs onto the chip topology", long_about = None)]
struct Cli {
    /// Logging level when RUST_LOG is unset. Accepts EnvFilter syntax, e.g. "debug"
    /// or "warn,chiplog::router=debug".
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Link the log onto the topology and write an HTML report.
    Report {
        #[command(flatten)]
        inputs: Inputs,

        #[command(flatten)]
        filters: FilterArgs,

        #[arg(short = 'o', long)]
        out: PathBuf,
    },

    /// Print one field of every record attached at or below a node, as JSON.
    Attr {
        #[command(flatten)]
        inputs: Inputs,

        #[command(flatten)]
        filters: FilterArgs,

        /// timestamp, cluster_id, area, unit, io, tid or packet.
        #[arg(long)]
        field: String,

        #[command(flatten)]
        node: NodeArgs,

        /// One entry per leaf below the selected cluster or host interface,
        /// instead of a single flat list.
        #[arg(long)]
        leaves: bool,
    },

    /// Link the log, then apply filter-chain edits in order and report what
    /// each relink attached.
    Session {
        #[command(flatten)]
        inputs: Inputs,

        #[command(flatten)]
        filters: FilterArgs,

        /// add:<kind=value>, update:<kind=value>, remove:<kind>, drop-tid:<tid>,
        /// range:<start>,<end>, clear or refresh. Repeatable, applied in order.
        #[arg(long = "step", required = true)]
        steps: Vec<Mutation>,

        /// Also write the HTML report of the final state.
        #[arg(short = 'o', long)]
        out: Option<PathBuf>,
    },
}

#[derive(Args)]
struct Inputs {
    /// Chip topology document (JSON).
    #[arg(long)]
    chip: PathBuf,

    /// Enablement document (JSON).
    #[arg(long)]
    enabled: PathBuf,

    /// Simulator log file.
    #[arg(long)]
    log: PathBuf,
}

#[derive(Args)]
struct FilterArgs {
    /// Keep records of this thread id (repeatable).
    #[arg(long = "tid")]
    tids: Vec<u32>,

    #[arg(long)]
    area: Option<String>,

    #[arg(long)]
    unit: Option<String>,

    /// in or out.
    #[arg(long)]
    io: Option<Io>,

    /// chip,die,quad,row,col
    #[arg(long, value_parser = parse_cluster_addr)]
    cluster: Option<ClusterAddr>,

    /// chip,die,quad
    #[arg(long, value_parser = parse_quad_selector)]
    quad: Option<QuadSelector>,

    /// Exact second.
    #[arg(long)]
    time: Option<i64>,

    #[arg(long, requires = "end")]
    start: Option<i64>,

    #[arg(long, requires = "start")]
    end: Option<i64>,
}

impl FilterArgs {
    fn to_chain(&self) -> FilterChain {
        let mut chain = FilterChain::new();
        if let Some(t) = self.time {
            chain.push(Filter::Time(t));
        }
        if let (Some(start), Some(end)) = (self.start, self.end) {
            chain.push(Filter::TimeRange { start, end });
        }
        if let Some(addr) = self.cluster {
            chain.push(Filter::Cluster(addr));
        }
        if let Some(sel) = self.quad {
            chain.push(Filter::Quad(sel));
        }
        if !self.tids.is_empty() {
            chain.push(Filter::ThreadId(self.tids.iter().copied().collect()));
        }
        if let Some(area) = &self.area {
            chain.push(Filter::Area(area.clone()));
        }
        if let Some(unit) = &self.unit {
            chain.push(Filter::Unit(unit.clone()));
        }
        if let Some(io) = self.io {
            chain.push(Filter::Io(io));
        }
        chain
    }
}

/// Node to project from; the deepest level given wins. Without `--at-die`
/// or `--at-host` the whole topology is used.
#[derive(Args)]
struct NodeArgs {
    #[arg(long, conflicts_with = "at_die")]
    at_host: bool,

    #[arg(long)]
    at_die: Option<usize>,

    #[arg(long, requires = "at_die")]
    at_quad: Option<i32>,

    #[arg(long, requires_all = ["at_quad", "at_col"])]
    at_row: Option<usize>,

    #[arg(long, requires_all = ["at_quad", "at_row"])]
    at_col: Option<usize>,
}

fn init_log(level: &str) {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| match EnvFilter::try_new(level) {
            Ok(filter) => Ok(filter),
            Err(e) => {
                eprintln!("invalid log level: {}, using info, err is: {}", level, e);
                EnvFilter::try_new("info")
            }
        })
        .unwrap_or_else(|_| EnvFilter::new("info"));

    if let Err(e) = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .try_init()
    {
        eprintln!("failed to init logger: {}", e);
    }
}

/// Load both documents, build every die and link the log under `filters`.
fn link(
    inputs: &Inputs,
    filters: &FilterArgs,
) -> Result<FilterChainManager<ThreadedLogSource>> {
    let chip = spec::load_chip_spec(&inputs.chip)?;
    let enabled = spec::load_enablement(&inputs.enabled)?;
    let mut topology = Topology::new(chip, enabled)?;
    topology.load_all_dies()?;

    let source = ThreadedLogSource::from_file(&inputs.log);
    let mut manager = FilterChainManager::with_chain(topology, source, filters.to_chain())?;
    manager.refresh()?;
    Ok(manager)
}

fn print_time_bounds<S: LogSource>(manager: &FilterChainManager<S>) -> Result<()> {
    match (manager.first_record_time()?, manager.last_record_time()?) {
        (Some(first), Some(last)) => println!("Log spans {}..={}", first, last),
        _ => println!("Log holds no records"),
    }
    Ok(())
}

fn write_report<S: LogSource>(manager: &FilterChainManager<S>, out: &Path) -> Result<()> {
    let data = view::snapshot(manager.topology(), manager.chain());
    let html = render::render_html_report(&data)?;
    std::fs::write(out, html)?;
    println!("Wrote {}", out.display());
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_log(&cli.log_level);

    match cli.cmd {
        Commands::Report {
            inputs,
            filters,
            out,
        } => {
            let manager = link(&inputs, &filters)?;
            print_time_bounds(&manager)?;
            write_report(&manager, &out)?;
        }
        Commands::Attr {
            inputs,
            filters,
            field,
            node,
            leaves,
        } => {
            let field: LogField = field.parse()?;
            let manager = link(&inputs, &filters)?;
            let topology = manager.topology();

            let values = if node.at_host {
                let host = topology.host_interface();
                if leaves {
                    serde_json::to_value(view::leaf_values(host.all_inner_details(), field))?
                } else {
                    serde_json::to_value(host.attribute_from_active_logs(field))?
                }
            } else {
                match (node.at_die, node.at_quad, node.at_row.zip(node.at_col)) {
                    (Some(d), Some(q), Some((row, col))) => {
                        let cluster = quad_of(topology, d, q)?
                            .cluster(row, col)
                            .ok_or_else(|| anyhow::anyhow!("no cluster at ({}, {})", row, col))?;
                        if leaves {
                            serde_json::to_value(view::leaf_values(
                                cluster.all_inner_details(),
                                field,
                            ))?
                        } else {
                            serde_json::to_value(cluster.attribute_from_active_logs(field))?
                        }
                    }
                    _ if leaves => {
                        anyhow::bail!("--leaves needs a cluster (--at-row/--at-col) or --at-host")
                    }
                    (None, _, _) => serde_json::to_value(topology.attribute_from_active_logs(field))?,
                    (Some(d), None, _) => serde_json::to_value(
                        die_of(topology, d)?.attribute_from_active_logs(field),
                    )?,
                    (Some(d), Some(q), None) => serde_json::to_value(
                        quad_of(topology, d, q)?.attribute_from_active_logs(field),
                    )?,
                }
            };
            println!("{}", serde_json::to_string_pretty(&values)?);
        }
        Commands::Session {
            inputs,
            filters,
            steps,
            out,
        } => {
            let mut manager = link(&inputs, &filters)?;
            print_time_bounds(&manager)?;
            for step in &steps {
                match manager.apply(step) {
                    Ok(stats) => println!("{}: {}", step, stats),
                    // A rejected edit leaves the chain and tree as they were.
                    Err(ChainError::State(e)) => println!("{}: rejected: {}", step, e),
                    Err(e) => return Err(e.into()),
                }
            }
            if let Some(out) = out {
                write_report(&manager, &out)?;
            }
        }
    }

    Ok(())
}

fn die_of(topology: &Topology, die: usize) -> Result<&model::Die> {
    topology
        .die(die)
        .ok_or_else(|| anyhow::anyhow!("die {} is not loaded", die))
}

fn quad_of(topology: &Topology, die: usize, quad: i32) -> Result<&model::Quad> {
    let (row, col) =
        spec::quad_position(quad).ok_or_else(|| anyhow::anyhow!("quad {} is out of range", quad))?;
    die_of(topology, die)?
        .quad(row, col)
        .ok_or_else(|| anyhow::anyhow!("die {} has no quad {}", die, quad))
}
