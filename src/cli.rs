use crate::config::{Config, load_config};
use crate::layout_dump::write_layout_dump;
use crate::model::BoxId;
use crate::render::{render_svg, write_output_svg};
use crate::scene::{Scene, parse_scene};
use crate::session::{CallerStep, MeasuredBuilder, Session};
use crate::surface::Canvas;
use anyhow::Result;
use clap::{Parser, ValueEnum};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "callbox", version, about = "Call-graph box layout engine")]
pub struct Args {
    /// Scene file (.json/.json5) or '-' for stdin
    #[arg(short = 'i', long = "input")]
    pub input: Option<PathBuf>,

    /// Output file. Defaults to stdout for SVG and JSON if omitted.
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    /// Output format
    #[arg(short = 'e', long = "outputFormat", value_enum, default_value = "svg")]
    pub output_format: OutputFormat,

    /// Config JSON file (themeVariables, router, tidy, split, codeBox)
    #[arg(short = 'c', long = "configFile")]
    pub config: Option<PathBuf>,

    /// Split this region box (requires --cut-line)
    #[arg(long = "split", requires = "cut_line")]
    pub split: Option<String>,

    /// Last line kept in the first half of the split
    #[arg(long = "cut-line")]
    pub cut_line: Option<u32>,

    /// Expand a function reference, as BOX:REFERENCE. Repeatable.
    #[arg(long = "expand")]
    pub expand: Vec<String>,

    /// Open a caller chain above this box (see --caller)
    #[arg(long = "callers", requires = "caller")]
    pub callers: Option<String>,

    /// One caller in the chain, as FUNCTION:REF[+REF...], nearest caller first
    #[arg(long = "caller", requires = "callers")]
    pub caller: Vec<String>,

    /// Tidy around these boxes, comma separated
    #[arg(long = "tidy", value_delimiter = ',')]
    pub tidy: Vec<String>,

    /// Jump animations to their end before writing output
    #[arg(long = "settle")]
    pub settle: bool,

    /// Verbose logging
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Svg,
    Png,
    Json,
}

pub fn run() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let config = load_config(args.config.as_deref())?;
    let input = read_input(args.input.as_deref())?;
    let scene = parse_scene(&input)?;
    let session = apply_operations(scene, &config, &args)?;

    match args.output_format {
        OutputFormat::Svg => {
            let svg = render_svg(&session, &config.theme, &config.render, &config.layout.code_box);
            write_output_svg(&svg, args.output.as_deref())?;
        }
        OutputFormat::Png => write_png(&session, &config, &args.output)?,
        OutputFormat::Json => {
            write_layout_dump(args.output.as_deref(), &session)?;
        }
    }
    Ok(())
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

/// Replay the requested operations on a fresh session. Every operation
/// starts at the same instant. Without `--settle` the output shows the boxes
/// where their slides begin.
fn apply_operations(scene: Scene, config: &Config, args: &Args) -> Result<Session<Canvas>> {
    let (mut session, index) = scene.into_session(config.layout.clone())?;
    let mut builder = MeasuredBuilder::new(&config.layout.code_box, &config.theme);
    let now = Duration::ZERO;

    if let (Some(host), Some(cut_line)) = (args.split.as_deref(), args.cut_line) {
        let outcome = session.split_box(&mut builder, &BoxId::from(host), cut_line)?;
        tracing::info!(first = %outcome.first, second = %outcome.second, "split {host}");
    }

    for request in &args.expand {
        let (host, reference) = parse_expand(request)?;
        match session.expand_reference(&index, &mut builder, &host, reference, now)? {
            Some(expansion) => {
                tracing::info!(
                    function = %expansion.function_name,
                    id = %expansion.function_box,
                    "expanded"
                );
            }
            None => tracing::warn!("nothing to expand for {request}"),
        }
    }

    if let Some(anchor) = args.callers.as_deref() {
        let chain = args
            .caller
            .iter()
            .map(|step| parse_caller(step))
            .collect::<Result<Vec<_>>>()?;
        let expansion =
            session.expand_callers(&index, &mut builder, &BoxId::from(anchor), &chain, now)?;
        tracing::info!(callers = expansion.boxes.len(), "expanded callers of {anchor}");
    }

    if !args.tidy.is_empty() {
        let inserted: Vec<BoxId> = args.tidy.iter().map(|id| BoxId::from(id.trim())).collect();
        session.tidy(&inserted, now)?;
    }

    if args.settle {
        session.settle();
    } else {
        session.tick(now);
    }
    Ok(session)
}

fn parse_expand(request: &str) -> Result<(BoxId, &str)> {
    let (host, reference) = request
        .split_once(':')
        .ok_or_else(|| anyhow::anyhow!("expected BOX:REFERENCE, got {request:?}"))?;
    if host.is_empty() || reference.is_empty() {
        return Err(anyhow::anyhow!("expected BOX:REFERENCE, got {request:?}"));
    }
    Ok((BoxId::from(host), reference))
}

fn parse_caller(step: &str) -> Result<CallerStep> {
    let (function, references) = step
        .split_once(':')
        .ok_or_else(|| anyhow::anyhow!("expected FUNCTION:REF[+REF...], got {step:?}"))?;
    let references: Vec<String> = references
        .split('+')
        .filter(|reference| !reference.is_empty())
        .map(str::to_string)
        .collect();
    if function.is_empty() || references.is_empty() {
        return Err(anyhow::anyhow!("expected FUNCTION:REF[+REF...], got {step:?}"));
    }
    Ok(CallerStep {
        function: function.to_string(),
        references,
    })
}

fn read_input(path: Option<&Path>) -> Result<String> {
    if let Some(path) = path {
        if path != Path::new("-") {
            return Ok(std::fs::read_to_string(path)?);
        }
    }
    let mut buf = String::new();
    io::stdin().read_to_string(&mut buf)?;
    Ok(buf)
}

#[cfg(feature = "png")]
fn write_png(session: &Session<Canvas>, config: &Config, output: &Option<PathBuf>) -> Result<()> {
    let output = ensure_output(output, "png")?;
    let svg = render_svg(session, &config.theme, &config.render, &config.layout.code_box);
    crate::render::write_output_png(&svg, &output, &config.render, &config.theme)
}

#[cfg(not(feature = "png"))]
fn write_png(
    _session: &Session<Canvas>,
    _config: &Config,
    _output: &Option<PathBuf>,
) -> Result<()> {
    Err(anyhow::anyhow!("PNG output requires the `png` feature"))
}

#[cfg_attr(not(feature = "png"), allow(dead_code))]
fn ensure_output(output: &Option<PathBuf>, ext: &str) -> Result<PathBuf> {
    if let Some(path) = output {
        return Ok(path.clone());
    }
    Err(anyhow::anyhow!("Output path required for {} output", ext))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::Surface;

    const SCENE: &str = r#"{
        "boxes": [
            { "id": "main", "kind": "codeRegion", "rect": { "left": 0, "top": 0, "width": 300, "height": 200 },
              "region": {
                "text": "let a = 1;\nhelper(a);\nlet b = 2;\nprint(b);",
                "start": { "line": 10, "character": 0 },
                "functionReferences": [
                  { "hash": "call-helper", "range": { "start": { "line": 11, "character": 0 }, "end": { "line": 11, "character": 6 } } }
                ]
              } }
        ],
        "index": {
            "functions": { "helper": { "name": "helper", "region": { "text": "fn helper(x) {\n  x\n}", "start": { "line": 40, "character": 0 } } } },
            "references": { "call-helper": { "function": "helper", "callRange": { "start": { "line": 11, "character": 0 }, "end": { "line": 11, "character": 9 } } } }
        }
    }"#;

    fn args(extra: &[&str]) -> Args {
        let mut argv = vec!["callbox"];
        argv.extend_from_slice(extra);
        Args::parse_from(argv)
    }

    #[test]
    fn parses_expand_requests() {
        let (host, reference) = parse_expand("main:call-helper").unwrap();
        assert_eq!(host, BoxId::from("main"));
        assert_eq!(reference, "call-helper");
        assert!(parse_expand("main").is_err());
        assert!(parse_expand(":x").is_err());
    }

    #[test]
    fn split_requires_cut_line() {
        assert!(Args::try_parse_from(["callbox", "--split", "main"]).is_err());
        let parsed = args(&["--split", "main", "--cut-line", "11", "-e", "json"]);
        assert_eq!(parsed.cut_line, Some(11));
        assert_eq!(parsed.output_format, OutputFormat::Json);
    }

    #[test]
    fn tidy_list_is_comma_separated() {
        let parsed = args(&["--tidy", "a,b"]);
        assert_eq!(parsed.tidy, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn expansion_splits_and_settles() {
        let scene = parse_scene(SCENE).unwrap();
        let parsed = args(&["--expand", "main:call-helper", "--settle"]);
        let session = apply_operations(scene, &Config::default(), &parsed).unwrap();
        assert!(session.animator().is_idle());
        assert_eq!(session.graph().len(), 3);
        assert!(!session.graph().contains(&BoxId::from("main")));
        assert!(session.context().is_expanded("call-helper"));
    }

    #[test]
    fn explicit_split_replaces_host() {
        let scene = parse_scene(SCENE).unwrap();
        let parsed = args(&["--split", "main", "--cut-line", "11"]);
        let session = apply_operations(scene, &Config::default(), &parsed).unwrap();
        assert_eq!(session.graph().len(), 2);
        assert_eq!(session.graph().connector_count(), 1);
        let orders: Vec<u32> = {
            let mut orders: Vec<u32> = session.regions().map(|(_, region)| region.order).collect();
            orders.sort();
            orders
        };
        assert_eq!(orders, vec![1, 2]);
    }

    #[test]
    fn parses_caller_steps() {
        let step = parse_caller("run:call-a+call-b").unwrap();
        assert_eq!(step.function, "run");
        assert_eq!(step.references, vec!["call-a".to_string(), "call-b".to_string()]);
        assert!(parse_caller("run").is_err());
        assert!(parse_caller("run:").is_err());
        assert!(Args::try_parse_from(["callbox", "--callers", "main"]).is_err());
    }

    #[test]
    fn caller_chain_hangs_above_anchor() {
        let scene = parse_scene(SCENE).unwrap();
        let parsed = args(&["--callers", "main", "--caller", "helper:call-main"]);
        let session = apply_operations(scene, &Config::default(), &parsed).unwrap();
        assert_eq!(session.graph().len(), 2);
        let parents = session.graph().get_parents(&BoxId::from("main"));
        assert_eq!(parents.len(), 1);
        let caller = session.surface().rect(&parents[0].box_id).unwrap();
        assert_eq!(caller.top, -300.0);
        assert!((caller.right() + 100.0).abs() < 1e-3);
    }
}
