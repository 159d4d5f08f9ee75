use std::fs;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::{ArgAction, Args, Parser, Subcommand};
use ensemble_packer_core::config::EngineSpec;
use ensemble_packer_core::packer::corner_points::{Adjacency, adjacency_in};
use ensemble_packer_core::{EnsemblePacker, PackError, PackerConfig, Rect};
use rand::{Rng, SeedableRng};
use serde::Deserialize;
use tracing::{debug, info, warn};

#[derive(Parser, Debug)]
#[command(
    name = "ensemble-packer",
    about = "Drive an ensemble of rectangle packers over an item sequence",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    /// Show a progress bar while placing items (disable with --progress false or --quiet)
    #[arg(long, default_value_t = true, action=ArgAction::Set, global=true, help_heading = "Logging/UX")]
    progress: bool,
    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action=ArgAction::Count, global=true, help_heading = "Logging/UX")]
    verbose: u8,
    /// Quiet mode (overrides verbose)
    #[arg(
        short,
        long,
        default_value_t = false,
        global = true,
        help_heading = "Logging/UX"
    )]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Place an item sequence and print or export the layout
    Pack(PackArgs),
    /// Replay an item sequence, then list the pooled candidates for one more item
    Candidates(CandidatesArgs),
    /// Simple timing bench (runs the sequence, prints time + occupancy)
    Bench(BenchArgs),
}

#[derive(Args, Debug, Clone)]
struct BinArgs {
    /// Bin width
    #[arg(long, default_value_t = 100, help_heading = "Bin")]
    width: u32,
    /// Bin height
    #[arg(long, default_value_t = 100, help_heading = "Bin")]
    height: u32,
    /// Allow rotation (90deg)
    #[arg(long, default_value_t = true, action=ArgAction::Set, help_heading = "Bin")]
    allow_rotation: bool,
    /// Comma separated roster labels, e.g. maxrects-bssf,skyline-bl,corner-mr-ff-top35,corner-sl
    #[arg(long, help_heading = "Bin")]
    roster: Option<String>,
    /// Query roster members in parallel (requires core feature `parallel`)
    #[arg(long, default_value_t = false, help_heading = "Bin")]
    parallel: bool,
    /// YAML config file path (values in the file override the options above)
    #[arg(long, help_heading = "Bin")]
    config: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
struct ItemArgs {
    /// Item list: WxH,WxH,...
    #[arg(long, help_heading = "Items")]
    items: Option<String>,
    /// Generate this many random items instead of --items
    #[arg(long, conflicts_with = "items", help_heading = "Items")]
    random: Option<usize>,
    /// Seed for --random
    #[arg(long, default_value_t = 42, help_heading = "Items")]
    seed: u64,
    /// Smallest random side
    #[arg(long, default_value_t = 4, help_heading = "Items")]
    min_side: u32,
    /// Largest random side
    #[arg(long, default_value_t = 32, help_heading = "Items")]
    max_side: u32,
    /// Candidate selection: first | best-adjacency | lowest | index:N
    #[arg(long, default_value = "best-adjacency", help_heading = "Items")]
    policy: String,
}

#[derive(Parser, Debug, Clone)]
struct PackArgs {
    #[command(flatten)]
    bin: BinArgs,
    #[command(flatten)]
    items: ItemArgs,
    /// Output format: text | json
    #[arg(long, default_value = "text", value_parser = ["text", "json"], help_heading = "Export")]
    format: String,
    /// Write the layout as JSON to this file
    #[arg(long, help_heading = "Export")]
    out: Option<PathBuf>,
    /// Print the merged configuration (after CLI/YAML) and exit
    #[arg(long, default_value_t = false, help_heading = "Export")]
    print_config: bool,
    /// Output format for --print-config: json|yaml
    #[arg(long, default_value = "json", value_parser = ["json", "yaml"], help_heading = "Export")]
    print_config_format: String,
}

#[derive(Parser, Debug, Clone)]
struct CandidatesArgs {
    #[command(flatten)]
    bin: BinArgs,
    #[command(flatten)]
    items: ItemArgs,
    /// Item to query after the replay: WxH
    #[arg(long)]
    query: String,
    /// Output format: text | json
    #[arg(long, default_value = "text", value_parser = ["text", "json"])]
    format: String,
}

#[derive(Parser, Debug, Clone)]
struct BenchArgs {
    #[command(flatten)]
    bin: BinArgs,
    #[command(flatten)]
    items: ItemArgs,
    /// Number of timed runs
    #[arg(long, default_value_t = 5)]
    repeat: u32,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing_with_level(cli.quiet, cli.verbose);
    let progress = cli.progress && !cli.quiet;
    match &cli.command {
        Commands::Pack(args) => run_pack(args, progress),
        Commands::Candidates(args) => run_candidates(args),
        Commands::Bench(args) => run_bench(args),
    }
}

fn run_pack(cli: &PackArgs, show_progress: bool) -> anyhow::Result<()> {
    let cfg = build_config(&cli.bin)?;
    if cli.print_config {
        match cli.print_config_format.as_str() {
            "yaml" => println!("{}", serde_yaml::to_string(&cfg)?),
            _ => println!("{}", serde_json::to_string_pretty(&cfg)?),
        }
        return Ok(());
    }

    let items = load_items(&cli.items)?;
    let policy: Policy = cli.items.policy.parse()?;
    let mut ens = EnsemblePacker::from_config(&cfg).context("build ensemble")?;
    info!(
        members = ens.len(),
        items = items.len(),
        policy = %cli.items.policy,
        "packing"
    );
    let unplaced = run_sequence(&mut ens, &items, policy, show_progress)?;
    let layout = ens.layout();

    match cli.format.as_str() {
        "json" => {
            let mut value = ensemble_packer_core::layout_to_json(&layout);
            value["unplaced"] = serde_json::json!(unplaced);
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        _ => {
            for (i, r) in layout.rects.iter().enumerate() {
                println!("#{:<4} {:>4}x{:<4} at ({}, {})", i, r.w, r.h, r.x, r.y);
            }
            if !unplaced.is_empty() {
                println!("unplaced: {}", unplaced.len());
            }
            println!("{}", layout.stats.summary());
        }
    }

    if let Some(path) = &cli.out {
        let value = ensemble_packer_core::layout_to_json(&layout);
        fs::write(path, serde_json::to_string_pretty(&value)?)
            .with_context(|| format!("write {}", path.display()))?;
        info!(?path, rects = layout.rects.len(), "layout written");
    }
    Ok(())
}

fn run_candidates(cli: &CandidatesArgs) -> anyhow::Result<()> {
    let cfg = build_config(&cli.bin)?;
    let items = load_items(&cli.items)?;
    let policy: Policy = cli.items.policy.parse()?;
    let (qw, qh) = parse_size(&cli.query)?;
    let mut ens = EnsemblePacker::from_config(&cfg).context("build ensemble")?;
    run_sequence(&mut ens, &items, policy, false)?;

    let candidates = ens
        .get_candidates(qw, qh)
        .with_context(|| format!("query {qw}x{qh}"))?;
    let layout = ens.layout();
    match cli.format.as_str() {
        "json" => {
            let value = ensemble_packer_core::candidates_to_json(&layout, (qw, qh), &candidates);
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        _ => {
            println!(
                "{} candidates for {}x{} after {} placements",
                candidates.len(),
                qw,
                qh,
                layout.rects.len()
            );
            for c in &candidates {
                let adj = adjacency_in(layout.width, layout.height, &layout.rects, c);
                let rotated = if (c.w, c.h) != (qw, qh) { " rotated" } else { "" };
                println!(
                    "  ({:>4}, {:>4}) {}x{}{}  adjacency={:.3}",
                    c.x,
                    c.y,
                    c.w,
                    c.h,
                    rotated,
                    adj.score()
                );
            }
        }
    }
    Ok(())
}

fn run_bench(b: &BenchArgs) -> anyhow::Result<()> {
    let cfg = build_config(&b.bin)?;
    let items = load_items(&b.items)?;
    let policy: Policy = b.items.policy.parse()?;
    let mut best: Option<Duration> = None;
    let mut last = None;
    for _ in 0..b.repeat.max(1) {
        let mut ens = EnsemblePacker::from_config(&cfg)?;
        let start = Instant::now();
        run_sequence(&mut ens, &items, policy, false)?;
        let dur = start.elapsed();
        best = Some(best.map_or(dur, |d| d.min(dur)));
        last = Some(ens.stats());
    }
    if let (Some(dur), Some(stats)) = (best, last) {
        println!(
            "members={} placed={}/{} occupancy={:.2}% best={}",
            cfg.roster.len(),
            stats.num_rects,
            items.len(),
            stats.occupancy * 100.0,
            bench_fmt_dur(dur)
        );
    }
    Ok(())
}

fn bench_fmt_dur(d: Duration) -> String {
    let ms = d.as_secs_f64() * 1000.0;
    if ms >= 1.0 {
        format!("{:.1}ms", ms)
    } else {
        format!("{}us", d.as_micros())
    }
}

/// How the driver picks one placement out of the pooled candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Policy {
    First,
    BestAdjacency,
    Lowest,
    Index(usize),
}

impl FromStr for Policy {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase();
        Ok(match s.as_str() {
            "first" => Policy::First,
            "best-adjacency" | "adjacency" => Policy::BestAdjacency,
            "lowest" | "bottom-left" => Policy::Lowest,
            other => match other.strip_prefix("index:") {
                Some(n) => Policy::Index(
                    n.parse()
                        .with_context(|| format!("bad candidate index in '{other}'"))?,
                ),
                None => anyhow::bail!("unknown policy: {}", other),
            },
        })
    }
}

fn select(ens: &EnsemblePacker, w: u32, h: u32, policy: Policy) -> anyhow::Result<Option<Rect>> {
    let pick = match policy {
        Policy::Index(i) => {
            return match ens.get_candidate_at(w, h, i) {
                Ok(r) => Ok(Some(r)),
                Err(PackError::CandidateIndexOutOfRange { len: 0, .. }) => Ok(None),
                Err(PackError::CandidateIndexOutOfRange { len, .. }) => {
                    debug!(index = i, len, "index past pooled list, using last");
                    Ok(Some(ens.get_candidate_at(w, h, len - 1)?))
                }
                Err(e) => Err(e.into()),
            };
        }
        Policy::First => ens.get_candidates(w, h)?.first().copied(),
        Policy::Lowest => ens
            .get_candidates(w, h)?
            .into_iter()
            .min_by_key(|r| (r.top(), r.x)),
        Policy::BestAdjacency => {
            let placed = ens.rectangles();
            let mut best: Option<(Adjacency, Rect)> = None;
            for c in ens.get_candidates(w, h)? {
                let adj = adjacency_in(ens.width(), ens.height(), placed, &c);
                if best.as_ref().is_none_or(|(b, _)| adj > *b) {
                    best = Some((adj, c));
                }
            }
            best.map(|(_, r)| r)
        }
    };
    Ok(pick)
}

/// Feeds `items` through the ensemble in order. Returns the indices that found no place.
fn run_sequence(
    ens: &mut EnsemblePacker,
    items: &[(u32, u32)],
    policy: Policy,
    progress: bool,
) -> anyhow::Result<Vec<usize>> {
    use indicatif::{ProgressBar, ProgressStyle};
    let bar = if progress {
        let b = ProgressBar::new(items.len() as u64);
        if let Ok(style) = ProgressStyle::with_template(
            "{spinner:.green} placing {pos}/{len} [{elapsed_precise}] {wide_msg}",
        ) {
            b.set_style(style);
        }
        Some(b)
    } else {
        None
    };
    let mut unplaced = Vec::new();
    for (i, &(w, h)) in items.iter().enumerate() {
        if let Some(b) = &bar {
            b.set_message(format!("{w}x{h}"));
        }
        match select(ens, w, h, policy).with_context(|| format!("item #{i} ({w}x{h})"))? {
            Some(r) => ens.place_item(&r),
            None => {
                debug!(index = i, w, h, "no candidate");
                unplaced.push(i);
            }
        }
        if let Some(b) = &bar {
            b.inc(1);
        }
    }
    if let Some(b) = &bar {
        b.finish_and_clear();
    }
    if !unplaced.is_empty() {
        warn!(count = unplaced.len(), "items did not fit");
    }
    Ok(unplaced)
}

fn parse_size(s: &str) -> anyhow::Result<(u32, u32)> {
    let (w, h) = s
        .trim()
        .split_once(['x', 'X'])
        .with_context(|| format!("expected WxH, got '{s}'"))?;
    let w: u32 = w.trim().parse().with_context(|| format!("bad width in '{s}'"))?;
    let h: u32 = h.trim().parse().with_context(|| format!("bad height in '{s}'"))?;
    if w == 0 || h == 0 {
        anyhow::bail!("item {} has a zero side", s);
    }
    Ok((w, h))
}

fn parse_items(s: &str) -> anyhow::Result<Vec<(u32, u32)>> {
    s.split(',')
        .filter(|p| !p.trim().is_empty())
        .map(parse_size)
        .collect()
}

fn random_items(count: usize, seed: u64, min_side: u32, max_side: u32) -> Vec<(u32, u32)> {
    let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
    (0..count)
        .map(|_| {
            let w = rng.gen_range(min_side..=max_side);
            let h = rng.gen_range(min_side..=max_side);
            (w, h)
        })
        .collect()
}

fn load_items(a: &ItemArgs) -> anyhow::Result<Vec<(u32, u32)>> {
    if let Some(n) = a.random {
        if a.min_side == 0 || a.min_side > a.max_side {
            anyhow::bail!(
                "invalid random side range {}..={}",
                a.min_side,
                a.max_side
            );
        }
        return Ok(random_items(n, a.seed, a.min_side, a.max_side));
    }
    match &a.items {
        Some(s) => parse_items(s),
        None => Ok(Vec::new()),
    }
}

fn build_config(b: &BinArgs) -> anyhow::Result<PackerConfig> {
    let mut cfg = PackerConfig::builder()
        .with_bin(b.width, b.height)
        .allow_rotation(b.allow_rotation)
        .parallel(b.parallel)
        .build();
    if let Some(list) = &b.roster {
        cfg.roster = list
            .split(',')
            .filter(|s| !s.trim().is_empty())
            .map(|s| EngineSpec::from_str(s).map_err(anyhow::Error::msg))
            .collect::<anyhow::Result<_>>()?;
    }
    // Load config file if provided; values present in the file win
    if let Some(path) = &b.config {
        let file =
            fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
        let y: YamlConfig =
            serde_yaml::from_str(&file).with_context(|| format!("parse {}", path.display()))?;
        cfg = y.into_packer_config(cfg);
    }
    cfg.validate().context("invalid configuration")?;
    Ok(cfg)
}

fn init_tracing_with_level(quiet: bool, verbose: u8) {
    let level = if quiet {
        "error".to_string()
    } else {
        match verbose {
            0 => "info".into(),
            1 => "debug".into(),
            _ => "trace".into(),
        }
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

#[derive(Debug, Deserialize, Default)]
struct YamlConfig {
    bin_width: Option<u32>,
    bin_height: Option<u32>,
    allow_rotation: Option<bool>,
    parallel: Option<bool>,
    roster: Option<Vec<EngineSpec>>,
}

impl YamlConfig {
    fn into_packer_config(self, mut cfg: PackerConfig) -> PackerConfig {
        if let Some(v) = self.bin_width {
            cfg.bin_width = v;
        }
        if let Some(v) = self.bin_height {
            cfg.bin_height = v;
        }
        if let Some(v) = self.allow_rotation {
            cfg.allow_rotation = v;
        }
        if let Some(v) = self.parallel {
            cfg.parallel = v;
        }
        if let Some(v) = self.roster {
            cfg.roster = v;
        }
        cfg
    }
}
