use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};

use anyhow::Context as _;
use clap::{ArgAction, Parser};
use pixform::{SourceImage, TransformOpts, TransformSession};

/// Evaluate a per-pixel expression over zero or more input images and write the result.
#[derive(Parser, Debug)]
#[command(name = "pixform", version)]
struct Cli {
    /// Input images, bound to getp1, getp2, ... in order.
    inputs: Vec<PathBuf>,

    /// Output image path (format from extension).
    #[arg(long)]
    out: PathBuf,

    /// JSON options file; flags override its values.
    #[arg(long)]
    opts: Option<PathBuf>,

    /// Output width (defaults to the first input's).
    #[arg(long)]
    width: Option<u32>,

    /// Output height (defaults to the first input's).
    #[arg(long)]
    height: Option<u32>,

    /// Output channels: 1 grey, 2 grey+alpha, 3 RGB, 4 RGBA.
    #[arg(long)]
    channels: Option<u8>,

    /// Extra constant visible to the expression.
    #[arg(long = "const", value_name = "NAME=VALUE", value_parser = parse_const)]
    constants: Vec<(String, f64)>,

    /// Infix expression.
    #[arg(long, conflicts_with = "rpnexpr")]
    expr: Option<String>,

    /// Postfix (RPN) expression.
    #[arg(long)]
    rpnexpr: Option<String>,

    /// Worker threads for the row pool.
    #[arg(long)]
    threads: Option<usize>,

    /// Evaluate rows on the calling thread.
    #[arg(long)]
    serial: bool,

    /// Print the compiled program to stderr.
    #[arg(long)]
    dump_program: bool,

    /// Raise log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn parse_const(s: &str) -> Result<(String, f64), String> {
    let (name, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got '{s}'"))?;
    let value: f64 = value
        .trim()
        .parse()
        .map_err(|e| format!("invalid value for '{name}': {e}"))?;
    Ok((name.trim().to_owned(), value))
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let opts = resolve_opts(&cli)?;

    let images = cli
        .inputs
        .iter()
        .map(|p| image::open(p).with_context(|| format!("open input image '{}'", p.display())))
        .collect::<anyhow::Result<Vec<_>>>()?;
    let sources: Vec<&dyn SourceImage> = images.iter().map(|i| i as &dyn SourceImage).collect();

    let session = TransformSession::new(&opts, &sources)?;
    if cli.dump_program {
        eprint!("{}", session.program());
    }
    let out = session.run(&sources, None)?;

    if let Some(parent) = cli.out.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    out.into_dynamic()?
        .save(&cli.out)
        .with_context(|| format!("write image '{}'", cli.out.display()))?;

    eprintln!("wrote {}", cli.out.display());
    Ok(())
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}

fn read_opts_json(path: &Path) -> anyhow::Result<TransformOpts> {
    let f = File::open(path).with_context(|| format!("open options '{}'", path.display()))?;
    let r = BufReader::new(f);
    let opts: TransformOpts =
        serde_json::from_reader(r).with_context(|| "parse options JSON")?;
    Ok(opts)
}

fn resolve_opts(cli: &Cli) -> anyhow::Result<TransformOpts> {
    let mut opts = match &cli.opts {
        Some(path) => read_opts_json(path)?,
        None => TransformOpts::default(),
    };

    if cli.width.is_some() {
        opts.width = cli.width;
    }
    if cli.height.is_some() {
        opts.height = cli.height;
    }
    if let Some(c) = cli.channels {
        opts.channels = c;
    }
    for (name, value) in &cli.constants {
        opts.constants.insert(name.clone(), *value);
    }
    // A source given as a flag replaces whichever source the file had.
    if let Some(src) = &cli.expr {
        opts.expr = Some(src.clone());
        opts.rpnexpr = None;
    }
    if let Some(src) = &cli.rpnexpr {
        opts.rpnexpr = Some(src.clone());
        opts.expr = None;
    }
    if cli.threads.is_some() {
        opts.threads = cli.threads;
    }
    if cli.serial {
        opts.parallel = false;
    }
    Ok(opts)
}
