use std::io::{self, Read};
use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, ValueEnum};
use tracing_subscriber::{EnvFilter, prelude::*};

use crate::cache::{DrawRequest, RenderCache};
use crate::config::{Config, load_config};
use crate::layout_dump::{LayoutDump, write_layout_dump};
use crate::payload::{NormalizedPayload, parse_payloads_str};
use crate::surface::{SvgSurface, write_output_svg};
use crate::theme::ThemeColors;

#[derive(Parser, Debug)]
#[command(
    name = "deptree",
    version,
    about = "Render the dependency neighborhood of one item as a layered tree"
)]
pub struct Args {
    /// Payload file (JSON or JSON5) or '-' for stdin
    #[arg(short = 'i', long = "input")]
    pub input: Option<PathBuf>,

    /// Output file (svg/png). Defaults to stdout for SVG if omitted.
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    /// Output format
    #[arg(short = 'e', long = "outputFormat", value_enum, default_value = "svg")]
    pub output_format: OutputFormat,

    /// Config JSON file (theme, themeVariables, layout, render)
    #[arg(short = 'c', long = "configFile")]
    pub config: Option<PathBuf>,

    /// Available width
    #[arg(short = 'w', long = "width", default_value_t = 480.0)]
    pub width: f32,

    /// Available height
    #[arg(short = 'H', long = "height", default_value_t = 240.0)]
    pub height: f32,

    /// Center the tree on this nid instead of the payload's current_nid
    #[arg(long = "nid")]
    pub nid: Option<u64>,

    /// Write the computed layout as JSON
    #[arg(long = "dumpLayout")]
    pub dump_layout: Option<PathBuf>,

    /// Use table-driven text widths instead of loading fonts
    #[arg(long = "fastText")]
    pub fast_text: bool,

    /// More logging (repeat for trace)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum OutputFormat {
    Svg,
    Png,
}

impl OutputFormat {
    fn extension(self) -> &'static str {
        match self {
            OutputFormat::Svg => "svg",
            OutputFormat::Png => "png",
        }
    }
}

pub fn run() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let mut config = load_config(args.config.as_deref())?;
    if args.fast_text {
        config.layout.fast_text_metrics = true;
    }

    let input = read_input(args.input.as_deref())?;
    let mut payloads = parse_payloads_str(&input)?;
    if payloads.is_empty() {
        return Err(anyhow::anyhow!("No payloads found in input"));
    }
    if let Some(nid) = args.nid {
        for payload in &mut payloads {
            payload.current_nid = nid;
        }
    }

    if payloads.len() == 1 {
        let output = match args.output_format {
            OutputFormat::Svg => args.output.clone(),
            OutputFormat::Png => Some(ensure_output(&args.output, "png")?),
        };
        return render_one(
            &payloads[0],
            &config,
            &args,
            output.as_deref(),
            args.dump_layout.as_deref(),
        );
    }

    let ext = args.output_format.extension();
    let outputs = resolve_multi_outputs(args.output.as_deref(), ext, payloads.len())?;
    let dumps = match args.dump_layout.as_deref() {
        Some(base) => Some(resolve_multi_outputs(Some(base), "json", payloads.len())?),
        None => None,
    };
    for (idx, payload) in payloads.iter().enumerate() {
        let dump = dumps.as_ref().map(|paths| paths[idx].as_path());
        render_one(payload, &config, &args, Some(&outputs[idx]), dump)?;
    }
    Ok(())
}

fn init_tracing(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    let _ = tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .with(filter)
        .try_init();
}

fn render_one(
    payload: &NormalizedPayload,
    config: &Config,
    args: &Args,
    output: Option<&Path>,
    dump_path: Option<&Path>,
) -> Result<()> {
    let colors = ThemeColors::new(&config.theme);
    let mut surface = SvgSurface::new(
        args.width,
        args.height,
        &config.theme.font_family,
        config.layout.fast_text_metrics,
    );
    let mut cache = RenderCache::new(config.clone());
    let request = DrawRequest {
        nid: payload.current_nid,
        payload,
        width: args.width,
        height: args.height,
        force: true,
    };
    cache.draw(request, &mut surface, &colors);
    let svg = surface.finish();

    match args.output_format {
        OutputFormat::Svg => write_output_svg(&svg, output)?,
        OutputFormat::Png => {
            let output = output.ok_or_else(|| anyhow::anyhow!("Output path required for png output"))?;
            write_png(&svg, output, config)?;
        }
    }

    if let (Some(path), Some(drawing)) = (dump_path, cache.drawing()) {
        let dump = LayoutDump::from_layout(&drawing.layout, Some(&drawing.hits))
            .with_perf(cache.snapshot());
        write_layout_dump(path, &dump)?;
    }
    Ok(())
}

#[cfg(feature = "png")]
fn write_png(svg: &str, output: &Path, config: &Config) -> Result<()> {
    crate::surface::write_output_png(svg, output, &config.theme.font_family)?;
    Ok(())
}

#[cfg(not(feature = "png"))]
fn write_png(_svg: &str, _output: &Path, _config: &Config) -> Result<()> {
    Err(anyhow::anyhow!("PNG output requires the `png` feature"))
}

fn read_input(path: Option<&Path>) -> Result<String> {
    if let Some(path) = path
        && path != Path::new("-")
    {
        return Ok(std::fs::read_to_string(path)?);
    }
    let mut buf = String::new();
    io::stdin().read_to_string(&mut buf)?;
    Ok(buf)
}

fn ensure_output(output: &Option<PathBuf>, ext: &str) -> Result<PathBuf> {
    if let Some(path) = output {
        return Ok(path.clone());
    }
    Err(anyhow::anyhow!("Output path required for {} output", ext))
}

/// One output path per payload: `dir/tree-N.ext` for a directory, otherwise
/// `stem-N.ext` next to the given file.
fn resolve_multi_outputs(output: Option<&Path>, ext: &str, count: usize) -> Result<Vec<PathBuf>> {
    let base =
        output.ok_or_else(|| anyhow::anyhow!("Output path required for multi-payload input"))?;
    if base.is_dir() {
        return Ok((0..count)
            .map(|idx| base.join(format!("tree-{}.{}", idx + 1, ext)))
            .collect());
    }
    let stem = base.file_stem().and_then(|s| s.to_str()).unwrap_or("tree");
    let parent = base.parent().unwrap_or_else(|| Path::new("."));
    Ok((0..count)
        .map(|idx| parent.join(format!("{}-{}.{}", stem, idx + 1, ext)))
        .collect())
}
