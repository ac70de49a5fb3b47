//! CLI binary for edgequake-pdf2img.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ConversionConfig`, writes the artifact and prints a summary.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_pdf2img::{
    convert_stream_keyed, ConversionConfig, ConversionProgressCallback, ConversionResult,
    Converter, OutputFormat, ProgressCallback, SourceDocument, Stage,
};
use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Spinner that shows the current stage of whichever document moved last.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        bar.set_style(style);
        bar.set_prefix("pdf2img");
        bar.set_message("Starting…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self { bar })
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_stage_start(&self, name: &str, stage: Stage) {
        self.bar.set_message(format!("{name}: {stage}…"));
    }

    fn on_stage_error(&self, name: &str, stage: Stage, error: &str) {
        // Keep the first line only; engine errors carry multi-line hints.
        let first_line = error.lines().next().unwrap_or(error);
        self.bar.println(format!(
            "  {} {name}: {stage} failed  {}",
            red("✗"),
            dim(first_line)
        ));
    }

    fn on_fallback(&self, name: &str, _reason: &str) {
        self.bar.println(format!(
            "  {} {name}: using placeholder image",
            yellow("⚠")
        ));
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Thumbnail of page 1 (writes report.png)
  pdf2img report.pdf

  # Choose the output path
  pdf2img report.pdf -o thumbs/report.png

  # Several documents into one directory
  pdf2img a.pdf b.pdf c.pdf -o thumbs/

  # Smaller JPEG
  pdf2img --format jpeg --quality 80 --scale 1 report.pdf

  # Informative "preview not available" card, no rendering
  pdf2img --preview report.pdf

  # Check that PDFium can be loaded
  pdf2img --probe

  # JSON result
  pdf2img --json report.pdf

ENVIRONMENT VARIABLES:
  PDFIUM_LIB_PATH         PDFium library file or directory to bind first
  PDF2IMG_SCALE           Default zoom factor
  PDF2IMG_FORMAT          Default output format (png, jpeg)
  PDF2IMG_JPEG_QUALITY    Default JPEG quality
  RUST_LOG                Override log filtering

FINDING PDFIUM:
  1. --library-path / PDFIUM_LIB_PATH / ./lib
  2. The system library (libpdfium on the loader path)
  If neither works, a placeholder image is written instead of a render.
"#;

/// Render the first page of PDF files to preview images.
#[derive(Parser, Debug)]
#[command(
    name = "pdf2img",
    version,
    about = "Render the first page of PDF files to preview images",
    long_about = "Render the first page of PDF documents to PNG or JPEG thumbnails using \
PDFium. When PDFium cannot be loaded a placeholder image is produced instead.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// PDF files to convert.
    #[arg(required_unless_present = "probe")]
    inputs: Vec<PathBuf>,

    /// Output file (one input) or directory (several inputs).
    #[arg(short, long, env = "PDF2IMG_OUTPUT")]
    output: Option<PathBuf>,

    /// Produce the informative preview card instead of rendering.
    #[arg(long)]
    preview: bool,

    /// Output format: png or jpeg.
    #[arg(long, env = "PDF2IMG_FORMAT", value_enum, default_value = "png")]
    format: FormatArg,

    /// JPEG quality (1–100).
    #[arg(long, env = "PDF2IMG_JPEG_QUALITY", default_value_t = 90,
          value_parser = clap::value_parser!(u8).range(1..=100))]
    quality: u8,

    /// Zoom factor applied to the page's native size.
    #[arg(long, env = "PDF2IMG_SCALE", default_value_t = 2.0)]
    scale: f32,

    /// PDFium library file or directory to bind first.
    #[arg(long, env = "PDFIUM_LIB_PATH")]
    library_path: Option<PathBuf>,

    /// Also use the placeholder when rendering or encoding fails.
    #[arg(long)]
    fallback_on_render_failure: bool,

    /// Maximum documents converted at once.
    #[arg(short, long, default_value_t = 4)]
    concurrency: usize,

    /// Print results as JSON instead of a summary.
    #[arg(long)]
    json: bool,

    /// Only check whether the rendering engine loads.
    #[arg(long)]
    probe: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDF2IMG_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PDF2IMG_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum FormatArg {
    Png,
    Jpeg,
}

#[derive(Serialize)]
struct JsonRecord<'a> {
    input: String,
    output: Option<String>,
    #[serde(flatten)]
    result: &'a ConversionResult,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner carries the user-facing feedback; library INFO logs would
    // only fight with it for the terminal.
    let show_progress = !cli.quiet && !cli.json && !cli.probe;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let progress = show_progress.then(CliProgressCallback::new);
    let config = build_config(&cli, progress.clone().map(|p| p as ProgressCallback))?;
    let converter = Arc::new(Converter::new(config));

    // ── Probe mode ───────────────────────────────────────────────────────
    if cli.probe {
        let probe = converter.probe_engine().await;
        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&probe).context("Failed to serialise probe")?
            );
        } else if probe.available {
            println!(
                "{} PDFium available ({} via {})",
                green("✔"),
                probe.engine.as_deref().unwrap_or("unknown"),
                probe.source.as_deref().unwrap_or("unknown"),
            );
        } else {
            eprintln!("{} {}", red("✘"), probe.error.as_deref().unwrap_or("unknown error"));
        }
        if !probe.available {
            anyhow::bail!("PDF rendering engine is not available");
        }
        return Ok(());
    }

    // ── Read inputs ──────────────────────────────────────────────────────
    let mut documents = Vec::with_capacity(cli.inputs.len());
    for path in &cli.inputs {
        let doc = SourceDocument::from_path(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        documents.push(doc);
    }

    // ── Convert ──────────────────────────────────────────────────────────
    // Results are keyed by input position: display names repeat across
    // directories (a/x.pdf, b/x.pdf).
    let start = Instant::now();
    let mut results: Vec<(usize, ConversionResult)> = if cli.preview {
        let mut out = Vec::with_capacity(documents.len());
        for (i, doc) in documents.iter().enumerate() {
            out.push((i, converter.convert_preview(doc).await));
        }
        out
    } else {
        convert_stream_keyed(
            Arc::clone(&converter),
            documents.into_iter().enumerate(),
            cli.concurrency,
        )
        .collect()
        .await
    };
    results.sort_by_key(|(i, _)| *i);
    if let Some(p) = &progress {
        p.finish();
    }

    // ── Write artifacts ──────────────────────────────────────────────────
    let several = cli.inputs.len() > 1;
    let mut failures = 0usize;
    let mut records = Vec::with_capacity(results.len());
    let mut used = HashSet::new();

    for (i, result) in &results {
        let input = cli.inputs[*i].display().to_string();
        let written = match result.file() {
            Some(file) => {
                let path = claim_path(
                    output_path(cli.output.as_deref(), several, &file.name),
                    &mut used,
                );
                write_atomic(&path, file.bytes()).await?;
                Some(path)
            }
            None => {
                failures += 1;
                None
            }
        };

        if !cli.json && !cli.quiet {
            print_summary(&input, result, written.as_deref());
        }
        records.push(JsonRecord {
            input,
            output: written.map(|p| p.display().to_string()),
            result,
        });
    }

    if cli.json {
        let json = if several {
            serde_json::to_string_pretty(&records)
        } else {
            serde_json::to_string_pretty(&records[0])
        }
        .context("Failed to serialise output")?;
        println!("{json}");
    } else if !cli.quiet && several {
        eprintln!(
            "{}/{} documents in {}ms",
            results.len() - failures,
            results.len(),
            start.elapsed().as_millis()
        );
    }

    if failures > 0 {
        anyhow::bail!("{failures} of {} conversions failed", results.len());
    }
    Ok(())
}

/// Map CLI args to `ConversionConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ConversionConfig> {
    let format = match cli.format {
        FormatArg::Png => OutputFormat::Png,
        FormatArg::Jpeg => OutputFormat::Jpeg {
            quality: cli.quality,
        },
    };

    let mut builder = ConversionConfig::builder()
        .scale(cli.scale)
        .output_format(format)
        .fallback_on_render_failure(cli.fallback_on_render_failure);

    if let Some(ref path) = cli.library_path {
        builder = builder.library_path(path);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Where to write an artifact named `artifact_name`.
fn output_path(output: Option<&Path>, several: bool, artifact_name: &str) -> PathBuf {
    match output {
        Some(dir) if several || dir.is_dir() => dir.join(artifact_name),
        Some(file) => file.to_path_buf(),
        None => PathBuf::from(artifact_name),
    }
}

/// Reserve `path` for this run, appending `-1`, `-2`, … to the file stem
/// when an earlier artifact already took it.
fn claim_path(path: PathBuf, used: &mut HashSet<PathBuf>) -> PathBuf {
    if used.insert(path.clone()) {
        return path;
    }

    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    let mut n = 1usize;
    loop {
        let candidate = path.with_file_name(format!("{stem}-{n}{ext}"));
        if used.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}

/// Atomic write: write to temp, then rename.
async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    tokio::fs::write(&tmp, bytes)
        .await
        .with_context(|| format!("Failed to write {}", tmp.display()))?;
    tokio::fs::rename(&tmp, path)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

fn print_summary(name: &str, result: &ConversionResult, written: Option<&Path>) {
    match (result.file(), written) {
        (Some(file), Some(path)) => {
            let mark = if file.name.contains("_fallback.") || file.name.contains("_preview.") {
                yellow("◆")
            } else {
                green("✔")
            };
            eprintln!(
                "{mark} {name}  →  {}  {}",
                bold(&path.display().to_string()),
                dim(&format!("{}x{} px, {} bytes", file.width, file.height, file.len())),
            );
        }
        _ => eprintln!(
            "{} {name}  {}",
            red("✘"),
            result.error().unwrap_or("unknown error")
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_defaults() {
        let cli = Cli::try_parse_from(["pdf2img", "a.pdf"]).unwrap();
        assert_eq!(cli.inputs, vec![PathBuf::from("a.pdf")]);
        assert!(!cli.preview);
        let config = build_config(&cli, None).unwrap();
        assert_eq!(config.output_format, OutputFormat::Png);
        assert_eq!(config.scale, 2.0);
    }

    #[test]
    fn probe_needs_no_input() {
        let cli = Cli::try_parse_from(["pdf2img", "--probe"]).unwrap();
        assert!(cli.probe);
        assert!(cli.inputs.is_empty());
    }

    #[test]
    fn jpeg_flags_map_to_config() {
        let args = ["pdf2img", "--format", "jpeg", "--quality", "70", "a.pdf"];
        let cli = Cli::try_parse_from(args).unwrap();
        let config = build_config(&cli, None).unwrap();
        assert_eq!(config.output_format, OutputFormat::Jpeg { quality: 70 });
    }

    #[test]
    fn output_path_rules() {
        assert_eq!(output_path(None, false, "a.png"), PathBuf::from("a.png"));
        assert_eq!(
            output_path(Some(Path::new("out/x.png")), false, "a.png"),
            PathBuf::from("out/x.png")
        );
        assert_eq!(
            output_path(Some(Path::new("thumbs")), true, "a.png"),
            PathBuf::from("thumbs/a.png")
        );
    }

    #[test]
    fn same_artifact_name_gets_a_numbered_path() {
        let mut used = HashSet::new();
        let out = Some(Path::new("thumbs"));

        let first = claim_path(output_path(out, true, "x_fallback.png"), &mut used);
        let second = claim_path(output_path(out, true, "x_fallback.png"), &mut used);
        let third = claim_path(output_path(out, true, "x_fallback.png"), &mut used);
        let other = claim_path(output_path(out, true, "y.png"), &mut used);

        assert_eq!(first, PathBuf::from("thumbs/x_fallback.png"));
        assert_eq!(second, PathBuf::from("thumbs/x_fallback-1.png"));
        assert_eq!(third, PathBuf::from("thumbs/x_fallback-2.png"));
        assert_eq!(other, PathBuf::from("thumbs/y.png"));
    }

    #[test]
    fn numbered_path_skips_names_already_taken() {
        let mut used = HashSet::new();
        claim_path(PathBuf::from("x-1.png"), &mut used);
        claim_path(PathBuf::from("x.png"), &mut used);
        assert_eq!(claim_path(PathBuf::from("x.png"), &mut used), PathBuf::from("x-2.png"));
    }

    #[tokio::test]
    async fn inputs_with_the_same_file_name_write_separate_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        let mut used = HashSet::new();

        for bytes in [&b"first"[..], &b"second"[..]] {
            let path = claim_path(output_path(Some(&out), true, "x_fallback.png"), &mut used);
            write_atomic(&path, bytes).await.unwrap();
        }

        assert_eq!(std::fs::read(out.join("x_fallback.png")).unwrap(), b"first");
        assert_eq!(std::fs::read(out.join("x_fallback-1.png")).unwrap(), b"second");
    }
}
