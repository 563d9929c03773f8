use crate::config::load_config;
use crate::ir::Person;
use crate::layout::{ArrangeMode, Placement, Viewport};
use crate::layout_dump::{layout_dump_string, write_layout_dump};
use crate::render::{render_svg, write_output_svg};
use crate::{DocumentLayout, document_cache, layout_document};
use anyhow::{Result, bail};
use clap::{Parser, ValueEnum};
use serde::Serialize;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "silsilah", version, about = "Family tree auto-layout")]
pub struct Args {
    /// Input family document (.json / .json5) or '-' for stdin
    #[arg(short = 'i', long = "input")]
    pub input: Option<PathBuf>,

    /// Output file. Defaults to stdout for JSON and SVG if omitted.
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    /// Output format
    #[arg(short = 'e', long = "outputFormat", value_enum, default_value = "json")]
    pub output_format: OutputFormat,

    /// Config JSON file
    #[arg(short = 'c', long = "configFile")]
    pub config: Option<PathBuf>,

    /// Preview width
    #[arg(short = 'w', long = "width", default_value_t = 1200.0)]
    pub width: f32,

    /// Preview height
    #[arg(short = 'H', long = "height", default_value_t = 800.0)]
    pub height: f32,

    /// Recompute fixed positions too
    #[arg(long = "auto-arrange")]
    pub auto_arrange: bool,

    /// Place one new person (JSON file or inline JSON) into the existing
    /// layout without a full relayout
    #[arg(long = "add")]
    pub add: Option<String>,

    /// Viewport for --add as x,y,width,height
    #[arg(long = "viewport", value_delimiter = ',')]
    pub viewport: Option<Vec<f32>>,

    /// Debug logging on stderr (overrides RUST_LOG)
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Svg,
    Png,
}

#[derive(Serialize)]
struct AddOutput<'a> {
    placement: Placement,
    positions: &'a crate::ir::PositionMap,
}

pub fn run() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let mut base_config = load_config(args.config.as_deref())?;
    base_config.render.width = args.width;
    base_config.render.height = args.height;

    let input = read_input(args.input.as_deref())?;
    let mode = if args.auto_arrange {
        ArrangeMode::AutoArrange
    } else {
        ArrangeMode::Relayout
    };

    if let Some(add) = args.add.as_deref() {
        let person = read_person(add)?;
        let viewport = parse_viewport(args.viewport.as_deref())?;
        let (document, config, mut cache) = document_cache(&input, &base_config, mode)?;
        debug!(
            stored = document.positions.is_some(),
            cached = cache.len(),
            "incremental cache ready"
        );
        let placement = cache.insert_new_person(&person, viewport, &config.layout);
        debug!(id = %person.id, strategy = ?placement.strategy, "person placed");
        let output = AddOutput {
            placement,
            positions: cache.positions(),
        };
        let json = serde_json::to_string_pretty(&output)?;
        return write_text(&json, args.output.as_deref());
    }

    let result = layout_document(&input, &base_config, mode)?;
    info!(
        persons = result.document.snapshot.persons.len(),
        placed = result.layout.positions.len(),
        converged = result.layout.stats.collision_converged,
        "layout computed"
    );

    write_result(&result, args.output_format, args.output.as_deref())
}

fn write_result(result: &DocumentLayout, format: OutputFormat, output: Option<&Path>) -> Result<()> {
    let snapshot = &result.document.snapshot;
    let config = &result.config;
    match format {
        OutputFormat::Json => match output {
            Some(path) => write_layout_dump(path, &result.layout, snapshot, &config.layout, &config.render),
            None => {
                let json =
                    layout_dump_string(&result.layout, snapshot, &config.layout, &config.render)?;
                write_text(&json, None)
            }
        },
        OutputFormat::Svg => {
            let svg = render_svg(&result.layout, snapshot, &config.theme, &config.layout, &config.render);
            write_output_svg(&svg, output)
        }
        OutputFormat::Png => write_png(result, output),
    }
}

#[cfg(feature = "png")]
fn write_png(result: &DocumentLayout, output: Option<&Path>) -> Result<()> {
    let config = &result.config;
    let svg = render_svg(
        &result.layout,
        &result.document.snapshot,
        &config.theme,
        &config.layout,
        &config.render,
    );
    let output = ensure_output(output, "png")?;
    crate::render::write_output_png(&svg, output, &config.render)
}

#[cfg(not(feature = "png"))]
fn write_png(_result: &DocumentLayout, _output: Option<&Path>) -> Result<()> {
    bail!("PNG output requires the `png` feature")
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
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

/// `--add` takes inline JSON when it starts with `{`, a file path otherwise.
fn read_person(arg: &str) -> Result<Person> {
    let text = if arg.trim_start().starts_with('{') {
        arg.to_string()
    } else {
        std::fs::read_to_string(arg)?
    };
    let person: Person = match serde_json::from_str(&text) {
        Ok(person) => person,
        Err(json_err) => json5::from_str(&text)
            .map_err(|_| anyhow::anyhow!("invalid person for --add: {json_err}"))?,
    };
    if person.id.trim().is_empty() {
        bail!("person for --add needs an id");
    }
    Ok(person)
}

fn parse_viewport(values: Option<&[f32]>) -> Result<Option<Viewport>> {
    match values {
        None => Ok(None),
        Some([x, y, width, height]) => Ok(Some(Viewport {
            x: *x,
            y: *y,
            width: *width,
            height: *height,
        })),
        Some(other) => bail!("viewport needs 4 values, got {}", other.len()),
    }
}

fn write_text(text: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => std::fs::write(path, text)?,
        None => println!("{text}"),
    }
    Ok(())
}

#[cfg_attr(not(feature = "png"), allow(dead_code))]
fn ensure_output<'a>(output: Option<&'a Path>, ext: &str) -> Result<&'a Path> {
    output.ok_or_else(|| anyhow::anyhow!("Output path required for {} output", ext))
}
