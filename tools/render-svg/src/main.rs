//! Render SVG documents into the recording canvas.
//!
//! Provides commands for:
//! - Rendering a file or URL and summarising (or dumping) the recorded draw commands
//! - Printing the tokens of path data
//! - Mapping a point through a transform list
//! - Timing the parser and renderer on generated scenes
//!
//! ## Usage
//!
//! ```bash
//! # Summarise a rendered frame
//! render-svg render drawing.svg --width 640 --height 480
//!
//! # Dump the command list with options from a file
//! render-svg render https://example.com/a.svg --options frame.json --json --output a.json
//!
//! # Inspect path data and transforms
//! render-svg tokens "M10-20l.5.5z"
//! render-svg transform "translate(10 20) rotate(90)" 1 0
//!
//! # Time parsing and rendering of generated scenes
//! render-svg bench --iterations 200 --output bench.json
//! ```

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::rc::Rc;
use std::time::Duration;

use clap::{ArgAction, Parser, Subcommand};
use svgpaint::path_parser::tokenize;
use svgpaint::{DefaultResourceLoader, Point, RenderOptions, SvgError, SvgRenderer, Transform};
use svgpaint_bench::Benchmark;
use svgpaint_canvas::CanvasRenderingContext2D;
use svgpaint_common::{
    init_logging, with_timeout, LogConfig, LogFormat, OptionExt, ResultExt, SvgPaintError,
};
use svgpaint_image::ImageConfig;
use svgpaint_net::FetchConfig;
use tracing::{debug, error, info};
use url::Url;

mod report;

/// Exit status for failures worth retrying (EX_TEMPFAIL).
const EXIT_TEMPFAIL: u8 = 75;

#[derive(Parser)]
#[command(name = "render-svg")]
#[command(about = "Render SVG documents into a recording canvas")]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Log output format: pretty, compact or json
    #[arg(long, default_value = "pretty", global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a document and report the recorded commands
    Render {
        /// Path or URL of the document
        input: String,
        /// Surface width
        #[arg(long, default_value = "800")]
        width: f64,
        /// Surface height
        #[arg(long, default_value = "600")]
        height: f64,
        /// JSON file with render options
        #[arg(long)]
        options: Option<PathBuf>,
        /// Seconds allowed for loading and rendering a remote document
        #[arg(long, default_value = "30")]
        timeout: u64,
        /// Print the full command list as JSON instead of a summary
        #[arg(long)]
        json: bool,
        /// Write the report to a file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print the tokens of path data, one per line
    Tokens {
        /// Path data, e.g. "M0,0 L10,10"
        #[arg(allow_hyphen_values = true)]
        path_data: String,
    },

    /// Map a point through a transform list
    Transform {
        /// Transform list, e.g. "translate(10) rotate(45)"
        transform: String,
        #[arg(allow_negative_numbers = true)]
        x: f64,
        #[arg(allow_negative_numbers = true)]
        y: f64,
    },

    /// Time path parsing, transform parsing and document rendering
    Bench {
        /// Timed iterations per benchmark
        #[arg(long, default_value = "100")]
        iterations: u64,
        /// Untimed warmup iterations per benchmark
        #[arg(long, default_value = "10")]
        warmup: u64,
        /// Write the suite as JSON to a file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(log_config(cli.verbose, cli.log_format));

    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(category = err.category(), retryable = err.is_retryable(), "{}", err);
            eprintln!("error: {}", err);
            ExitCode::from(exit_code(&err))
        }
    }
}

/// Logging for the verbosity count. Quiet JSON output uses the production setup.
fn log_config(verbose: u8, format: LogFormat) -> LogConfig {
    match (verbose, format) {
        (0, LogFormat::Json) => LogConfig::production(),
        (0, format) => LogConfig::default().with_format(format),
        (1, format) => LogConfig::debug().with_format(format),
        (_, format) => LogConfig::trace().with_format(format),
    }
}

fn exit_code(err: &SvgPaintError) -> u8 {
    if err.is_retryable() {
        EXIT_TEMPFAIL
    } else {
        1
    }
}

fn run(command: Commands) -> svgpaint_common::Result<()> {
    match command {
        Commands::Render {
            input,
            width,
            height,
            options,
            timeout,
            json,
            output,
        } => {
            let options = load_options(options.as_deref())?;
            let ctx = render_blocking(&input, width, height, &options, Duration::from_secs(timeout))?;

            let text = if json {
                report::commands_json(ctx.commands())?
            } else {
                report::summarize(width, height, ctx.commands())?.to_text()
            };
            report::emit(&text, output.as_deref())?;
        }

        Commands::Tokens { path_data } => {
            for token in tokenize(&path_data) {
                println!("{}", token);
            }
        }

        Commands::Transform { transform, x, y } => {
            let mut point = Point::new(x, y);
            Transform::parse(&transform, (0.0, 0.0)).apply_to_point(&mut point);
            println!("{} {}", point.x, point.y);
        }

        Commands::Bench {
            iterations,
            warmup,
            output,
        } => {
            let suite = Benchmark::new()
                .with_iterations(iterations)
                .with_warmup(warmup)
                .run_all();
            suite.print_summary();
            if let Some(path) = output {
                suite
                    .save_json(&path.to_string_lossy())
                    .context(format!("failed to save {}", path.display()))?;
                println!("Results written to: {}", path.display());
            }
        }
    }

    Ok(())
}

/// Render options from a JSON file, or the defaults.
fn load_options(path: Option<&Path>) -> svgpaint_common::Result<RenderOptions> {
    let Some(path) = path else {
        return Ok(RenderOptions::default());
    };
    let text = std::fs::read_to_string(path)?;
    let options = serde_json::from_str(&text).map_err(|e| {
        SvgPaintError::config_with_source(format!("invalid options {}", path.display()), e)
    })?;
    debug!(?options, "Loaded render options");
    Ok(options)
}

/// Base for the document's relative references: the URL itself or the file's location.
fn base_url(input: &str) -> Option<Url> {
    match Url::parse(input) {
        Ok(url) if url.scheme().len() > 1 => Some(url),
        _ => {
            let path = std::fs::canonicalize(input).ok()?;
            Url::from_file_path(path).ok()
        }
    }
}

fn is_remote(input: &str) -> bool {
    Url::parse(input)
        .map(|url| matches!(url.scheme(), "http" | "https"))
        .unwrap_or(false)
}

/// Map a document load failure onto the reporting categories.
fn load_error(input: &str, err: SvgError) -> SvgPaintError {
    let message = format!("failed to load {}", input);
    match err {
        SvgError::ParseError(detail) => SvgPaintError::parse(format!("{}: {}", message, detail)),
        SvgError::Dom(e) => SvgPaintError::parse_with_source(message, e),
        SvgError::Fetch(e) => SvgPaintError::fetch_with_source(message, e),
        SvgError::Resource(detail) => SvgPaintError::fetch(format!("{}: {}", message, detail)),
        SvgError::Image(e) => SvgPaintError::decode(format!("{}: {}", message, e)),
    }
}

/// Render on a current-thread runtime. Remote documents are bounded by `timeout`.
fn render_blocking(
    input: &str,
    width: f64,
    height: f64,
    options: &RenderOptions,
    timeout: Duration,
) -> svgpaint_common::Result<CanvasRenderingContext2D> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start runtime")?;

    runtime.block_on(async {
        if is_remote(input) {
            with_timeout(timeout, || render(input, width, height, options))
                .await
                .and_then(|rendered| rendered)
        } else {
            render(input, width, height, options).await
        }
    })
}

async fn render(
    input: &str,
    width: f64,
    height: f64,
    options: &RenderOptions,
) -> svgpaint_common::Result<CanvasRenderingContext2D> {
    let fetch = FetchConfig {
        base_url: base_url(input),
        ..FetchConfig::default()
    };
    let loader = DefaultResourceLoader::new(fetch, ImageConfig::default())
        .map_err(|e| SvgPaintError::config_with_source("failed to create loader", e))?;

    info!(input, width, height, "Rendering");
    let renderer = SvgRenderer::from_url(input, options.document.clone(), Rc::new(loader))
        .await
        .map_err(|e| load_error(input, e))?;
    renderer
        .root()
        .ok_or_not_found(format!("root element of {}", input))?;

    let mut ctx = CanvasRenderingContext2D::new(width, height);
    renderer.render(&mut ctx, options).await;
    Ok(ctx)
}
