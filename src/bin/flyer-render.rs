//! CLI binary for flyer-render.
//!
//! A thin shim over the library crate: `serve` runs the HTTP API, `render`
//! and `carousel` render from the terminal, `scan` lists the placeholders a
//! template contains.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use flyer_render::pipeline::encode;
use flyer_render::pipeline::input::{resolve_source, TemplateSource};
use flyer_render::server::{self, RenderCarouselBody};
use flyer_render::{
    render_carousel, render_flyer_to_file, Background, BatchProgressCallback,
    DataDictionary, Fetcher, FieldMapping, FlyerRequest, PostStep, ProgressCallback, QualityHint,
    RenderConfig, RenderOptions, Scanner,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress bar for carousel renders.
struct CliProgressCallback {
    bar: ProgressBar,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  [{bar:42.green/238}] {pos:>3}/{len} slides  ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Rendering");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self {
            bar,
            errors: AtomicUsize::new(0),
        })
    }
}

impl BatchProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total: usize) {
        self.bar.set_length(total as u64);
        self.bar.reset_eta();
    }

    fn on_slide_start(&self, slide: usize, _total: usize) {
        self.bar.set_message(format!("slide {slide}"));
    }

    fn on_slide_complete(&self, slide: usize, total: usize, png_len: usize) {
        self.bar.println(format!(
            "  {} Slide {:>3}/{:<3}  {}",
            green("✓"),
            slide,
            total,
            dim(&format!("{:>8} bytes", png_len)),
        ));
        self.bar.inc(1);
    }

    fn on_slide_error(&self, slide: usize, total: usize, error: &str) {
        self.errors.fetch_add(1, Ordering::SeqCst);
        let msg = if error.len() > 80 {
            let cut = (0..=79).rev().find(|&i| error.is_char_boundary(i)).unwrap_or(0);
            format!("{}\u{2026}", &error[..cut])
        } else {
            error.to_string()
        };
        self.bar
            .println(format!("  {} Slide {:>3}/{:<3}  {}", red("✗"), slide, total, red(&msg)));
    }

    fn on_batch_complete(&self, total: usize, success_count: usize) {
        self.bar.finish_and_clear();
        if success_count == total {
            eprintln!("{} {} slides rendered", green("✔"), bold(&total.to_string()));
        } else {
            eprintln!(
                "{} stopped after {}/{} slides",
                red("✘"),
                bold(&success_count.to_string()),
                total
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Run the HTTP API on port 3000
  flyer-render serve --addr 0.0.0.0:3000

  # Render a template from a CDN with inline data
  flyer-render render https://cdn.example.com/flyer.svg \
      --set address="123 Main St" --set price='$500,000' -o flyer.png

  # Data and field mapping from JSON files, retina output
  flyer-render render template.svg --data listing.json --mapping fields.json \
      --quality high -o flyer.png

  # Render a carousel manifest to a zip archive
  flyer-render carousel slides.json -o carousel.zip --zip

  # List the placeholders a template contains
  flyer-render scan template.svg

PLACEHOLDERS:
  dyno.key   {{key}}   {key}   ${key}   %key%
  The namespace ("dyno") is set with --namespace. Keys match case-insensitively.

CAROUSEL MANIFEST:
  {"slides": [{"svgUrl": "slide1.svg", "data": {...}, "fieldMappings": {...}}, ...],
   "width": 1080, "height": 1080, "quality": "standard"}
  svgUrl may be a URL or a local path.

ENVIRONMENT VARIABLES:
  RUST_LOG                 Log filter (overrides -v / -q)
  FLYER_ADDR               Listen address for `serve`
  FLYER_NAMESPACE          Dotted placeholder namespace
  FLYER_BACKGROUND         white, black, transparent, #rrggbb
  FLYER_POST_STEPS         Comma list of clean, minify, embed-images
"#;

/// Fill SVG flyer templates with data and rasterise them to PNG.
#[derive(Parser, Debug)]
#[command(
    name = "flyer-render",
    version,
    about = "Fill SVG flyer templates with data and rasterise them to PNG",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    render: RenderArgs,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "FLYER_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "FLYER_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP API.
    Serve {
        /// Address to listen on.
        #[arg(long, env = "FLYER_ADDR", default_value = "0.0.0.0:3000")]
        addr: SocketAddr,
    },

    /// Render one template to a PNG file.
    Render {
        /// Template URL or local path.
        template: String,

        /// Data dictionary: a JSON file path or an inline JSON object.
        #[arg(short, long)]
        data: Option<String>,

        /// Extra data entries, `key=value`. Repeatable; wins over --data.
        #[arg(long = "set", value_name = "KEY=VALUE")]
        set: Vec<String>,

        /// Field mapping: a JSON file path or an inline JSON object.
        #[arg(short, long)]
        mapping: Option<String>,

        /// Output PNG path.
        #[arg(short, long, default_value = "flyer.png")]
        output: PathBuf,

        #[command(flatten)]
        size: SizeArgs,

        /// Inline remote <image> references before rendering.
        #[arg(long)]
        embed_images: bool,

        /// Print a JSON summary on stdout.
        #[arg(long)]
        json: bool,
    },

    /// Render a carousel manifest, one PNG per slide or a single zip.
    Carousel {
        /// Manifest JSON file (same shape as the /api/render-carousel body).
        manifest: PathBuf,

        /// Output directory, or the zip file path with --zip.
        #[arg(short, long, default_value = "carousel")]
        output: PathBuf,

        /// Write a single zip archive instead of separate files.
        #[arg(long)]
        zip: bool,

        /// Disable progress bar.
        #[arg(long, env = "FLYER_NO_PROGRESS")]
        no_progress: bool,
    },

    /// List the placeholders found in a template.
    Scan {
        /// Template URL or local path.
        template: String,

        /// Print JSON instead of a table.
        #[arg(long)]
        json: bool,
    },
}

/// Settings shared by every subcommand.
#[derive(Args, Debug)]
struct RenderArgs {
    /// Namespace of the dotted placeholder syntax.
    #[arg(long, global = true, env = "FLYER_NAMESPACE", default_value = "dyno")]
    namespace: String,

    /// Also replace bare whole-word occurrences of data keys in text.
    #[arg(long, global = true, env = "FLYER_BARE_WORDS")]
    bare_words: bool,

    /// Fill painted behind the document.
    #[arg(long, global = true, env = "FLYER_BACKGROUND", default_value = "white")]
    background: Background,

    /// Post-substitution steps, comma separated.
    #[arg(long, global = true, env = "FLYER_POST_STEPS", value_delimiter = ',', default_value = "clean")]
    post_steps: Vec<PostStep>,

    /// Maximum raster width in pixels.
    #[arg(long, global = true, env = "FLYER_MAX_WIDTH", default_value_t = 4096)]
    max_width: u32,

    /// Maximum raster height in pixels.
    #[arg(long, global = true, env = "FLYER_MAX_HEIGHT", default_value_t = 4096)]
    max_height: u32,

    /// Warn when a substituted document exceeds this many bytes.
    #[arg(long, global = true, env = "FLYER_MAX_DOCUMENT_BYTES", default_value_t = flyer_render::DEFAULT_MAX_DOCUMENT_BYTES)]
    max_document_bytes: usize,

    /// Template fetch timeout in seconds.
    #[arg(long, global = true, env = "FLYER_DOCUMENT_TIMEOUT", default_value_t = 30)]
    document_timeout: u64,

    /// Per-image fetch timeout in seconds.
    #[arg(long, global = true, env = "FLYER_IMAGE_TIMEOUT", default_value_t = 15)]
    image_timeout: u64,
}

#[derive(Args, Debug)]
struct SizeArgs {
    /// Output width in pixels before the quality multiplier.
    #[arg(long)]
    width: Option<u32>,

    /// Height used when the template has no viewBox.
    #[arg(long)]
    height: Option<u32>,

    /// Resolution multiplier.
    #[arg(long, value_enum, default_value = "standard")]
    quality: QualityArg,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum QualityArg {
    Draft,
    Standard,
    High,
}

impl From<QualityArg> for QualityHint {
    fn from(v: QualityArg) -> Self {
        match v {
            QualityArg::Draft => QualityHint::Draft,
            QualityArg::Standard => QualityHint::Standard,
            QualityArg::High => QualityHint::High,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_writer(io::stderr)
        .init();

    match cli.command {
        Command::Serve { addr } => {
            let config = build_config(&cli.render, None)?;
            server::serve(addr, config)
                .await
                .with_context(|| format!("Server on {addr} failed"))?;
        }

        Command::Render {
            ref template,
            ref data,
            ref set,
            ref mapping,
            ref output,
            ref size,
            embed_images,
            json,
        } => {
            let config = build_config(&cli.render, None)?;
            let mut dict: DataDictionary = match data {
                Some(arg) => load_json(arg).context("Failed to load --data")?,
                None => DataDictionary::new(),
            };
            for entry in set {
                let (k, v) = entry
                    .split_once('=')
                    .with_context(|| format!("--set expects KEY=VALUE, got '{entry}'"))?;
                dict.insert(k.trim(), v);
            }
            let mapping: FieldMapping = match mapping {
                Some(arg) => load_json(arg).context("Failed to load --mapping")?,
                None => FieldMapping::new(),
            };

            let mut request = FlyerRequest::new(TemplateSource::from_arg(template), dict)
                .with_mapping(mapping)
                .with_options(RenderOptions {
                    width: size.width,
                    height: size.height,
                    quality: size.quality.into(),
                    ..Default::default()
                });
            request.embed_images = embed_images;

            let out = render_flyer_to_file(&request, output, &config)
                .await
                .context("Render failed")?;

            if json {
                let summary = serde_json::json!({
                    "output": output,
                    "width": out.width,
                    "height": out.height,
                    "size": out.size(),
                    "fieldsProcessed": out.substitution.replacement_count,
                    "placeholdersFound": out.substitution.stats.placeholders_found,
                    "warnings": out.substitution.warnings,
                    "renderTimeMs": out.render_time_ms,
                });
                println!("{}", serde_json::to_string_pretty(&summary).context("Failed to serialise summary")?);
            } else if !cli.quiet {
                for w in &out.substitution.warnings {
                    eprintln!("{} {}", yellow("⚠"), w);
                }
                eprintln!(
                    "{}  {}x{}  {} fields  {}ms  →  {}",
                    green("✔"),
                    out.width,
                    out.height,
                    out.substitution.replacement_count,
                    out.render_time_ms,
                    bold(&output.display().to_string()),
                );
            }
        }

        Command::Carousel {
            ref manifest,
            ref output,
            zip,
            no_progress,
        } => {
            let show_progress = !cli.quiet && !no_progress;
            let progress: Option<ProgressCallback> = if show_progress {
                Some(CliProgressCallback::new() as Arc<dyn BatchProgressCallback>)
            } else {
                None
            };
            let config = build_config(&cli.render, progress)?;

            let text = tokio::fs::read_to_string(manifest)
                .await
                .with_context(|| format!("Failed to read manifest {}", manifest.display()))?;
            let body: RenderCarouselBody =
                serde_json::from_str(&text).context("Invalid carousel manifest")?;
            let mut requests = body.into_requests().context("Invalid carousel manifest")?;
            // Manifests may name local files where the API only takes URLs.
            for req in &mut requests {
                if let TemplateSource::Url(u) = &req.source {
                    req.source = TemplateSource::from_arg(u);
                }
            }

            let outputs = render_carousel(&requests, &config)
                .await
                .context("Carousel failed")?;

            if zip {
                let pngs: Vec<&[u8]> = outputs.iter().map(|o| o.png.as_slice()).collect();
                let archive = encode::zip_slides(&pngs).context("Failed to build archive")?;
                write_file(output, &archive).await?;
                if !cli.quiet {
                    eprintln!("{}  {} slides  →  {}", green("✔"), outputs.len(), bold(&output.display().to_string()));
                }
            } else {
                tokio::fs::create_dir_all(output)
                    .await
                    .with_context(|| format!("Failed to create {}", output.display()))?;
                for (i, out) in outputs.iter().enumerate() {
                    let path = output.join(encode::slide_entry_name(i + 1));
                    write_file(&path, &out.png).await?;
                }
                if !cli.quiet {
                    eprintln!("{}  {} slides  →  {}/", green("✔"), outputs.len(), bold(&output.display().to_string()));
                }
            }
        }

        Command::Scan { ref template, json } => {
            let config = build_config(&cli.render, None)?;
            let fetcher = Fetcher::new(&config)?;
            let doc = resolve_source(&TemplateSource::from_arg(template), &fetcher)
                .await
                .context("Failed to load template")?;
            let found = Scanner::new(&config.namespace).scan(&doc);

            if json {
                let items: Vec<_> = found
                    .iter()
                    .map(|p| {
                        serde_json::json!({
                            "syntax": p.syntax,
                            "key": p.key,
                            "token": p.text(&doc),
                            "offset": p.span.start,
                        })
                    })
                    .collect();
                println!("{}", serde_json::to_string_pretty(&items).context("Failed to serialise placeholders")?);
            } else {
                for p in &found {
                    println!("{:>8}  {:<14} {}", p.span.start, format!("{:?}", p.syntax), p.text(&doc));
                }
                if !cli.quiet {
                    eprintln!("{}", dim(&format!("{} placeholders", found.len())));
                }
            }
        }
    }

    Ok(())
}

/// Map CLI args to `RenderConfig`.
fn build_config(args: &RenderArgs, progress: Option<ProgressCallback>) -> Result<RenderConfig> {
    let mut builder = RenderConfig::builder()
        .namespace(args.namespace.clone())
        .bare_word_fallback(args.bare_words)
        .background(args.background)
        .post_steps(args.post_steps.clone())
        .max_size(args.max_width, args.max_height)
        .max_document_bytes(args.max_document_bytes)
        .document_fetch_timeout_secs(args.document_timeout)
        .image_fetch_timeout_secs(args.image_timeout);
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }
    builder.build().context("Invalid configuration")
}

/// Parse `arg` as inline JSON when it looks like an object, else as a file path.
fn load_json<T: serde::de::DeserializeOwned>(arg: &str) -> Result<T> {
    let text = if arg.trim_start().starts_with('{') {
        arg.to_string()
    } else {
        std::fs::read_to_string(arg).with_context(|| format!("Failed to read {arg}"))?
    };
    serde_json::from_str(&text).with_context(|| format!("Invalid JSON in {arg}"))
}

async fn write_file(path: &Path, bytes: &[u8]) -> Result<()> {
    if path.as_os_str().is_empty() {
        bail!("Empty output path");
    }
    tokio::fs::write(path, bytes)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))
}
