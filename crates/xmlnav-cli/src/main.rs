use indexmap::IndexMap;
use serde::Serialize;
use std::io::Read;
use std::path::Path;
use xmlnav::metro::{MetroOptions, compute_layout_for_tree};
use xmlnav::{NodeId, XmlService, XmlSplitConfig, XmlTree};

#[derive(Debug)]
enum CliError {
    Usage(&'static str),
    Io(std::io::Error),
    Xml(xmlnav::Error),
    Json(serde_json::Error),
    Invalid { errors: usize },
    PathNotFound(String),
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliError::Usage(msg) => write!(f, "{msg}"),
            CliError::Io(err) => write!(f, "I/O error: {err}"),
            CliError::Xml(err) => write!(f, "{err}"),
            CliError::Json(err) => write!(f, "JSON error: {err}"),
            CliError::Invalid { errors } => write!(f, "Document is not valid ({errors} errors)"),
            CliError::PathNotFound(path) => write!(f, "No element at {path}"),
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<xmlnav::Error> for CliError {
    fn from(value: xmlnav::Error) -> Self {
        Self::Xml(value)
    }
}

impl From<serde_json::Error> for CliError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum PartsCommand {
    #[default]
    Info,
    Validate,
    Reconstruct,
    Search,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum Command {
    #[default]
    Tree,
    Line,
    Repair,
    Validate,
    Stats,
    Format,
    Analyze,
    Split,
    Parts(PartsCommand),
    Layout,
}

#[derive(Debug, Default)]
struct Args {
    command: Command,
    input: Option<String>,
    pretty: bool,
    verbose: bool,
    report: bool,
    case_sensitive: bool,
    out: Option<String>,
    config: Option<String>,
    threshold: Option<f64>,
    levels: Option<Vec<usize>>,
    xpath: Option<String>,
    term: Option<String>,
    depth: usize,
    canvas_width: f64,
    canvas_height: f64,
}

fn usage() -> &'static str {
    "xmlnav-cli\n\
\n\
USAGE:\n\
  xmlnav-cli [tree] [--pretty] [<path>|-]\n\
  xmlnav-cli line --xpath <path-expr> [<path>|-]\n\
  xmlnav-cli repair [--report] [--pretty] [--out <path>] [<path>|-]\n\
  xmlnav-cli validate [--pretty] [<path>|-]\n\
  xmlnav-cli stats [--pretty] [<path>|-]\n\
  xmlnav-cli format [--out <path>] [<path>|-]\n\
  xmlnav-cli analyze [--config <file.json>] [--threshold <pct>] [--levels <n,n>] [--pretty] [<path>|-]\n\
  xmlnav-cli split --out <dir> [--config <file.json>] [--threshold <pct>] [--levels <n,n>] [--pretty] [<path>|-]\n\
  xmlnav-cli parts info|validate|reconstruct [--pretty] <dir>\n\
  xmlnav-cli parts search <term> [--case-sensitive] [--pretty] <dir>\n\
  xmlnav-cli layout [--depth <n>] [--canvas-width <w>] [--canvas-height <h>] [--pretty] [<path>|-]\n\
\n\
GLOBAL FLAGS:\n\
  --verbose   log pipeline steps to stderr (otherwise RUST_LOG, default warn)\n\
\n\
NOTES:\n\
  - If <path> is omitted or '-', input is read from stdin.\n\
  - Paths look like /root[1]/item[2].\n\
  - validate exits with status 3 when the document has errors.\n\
"
}

fn next_value<'a>(it: &mut impl Iterator<Item = &'a String>) -> Result<&'a String, CliError> {
    it.next().ok_or(CliError::Usage(usage()))
}

fn parse_number<T: std::str::FromStr>(raw: &str) -> Result<T, CliError> {
    raw.trim().parse::<T>().map_err(|_| CliError::Usage(usage()))
}

/// Canvas sizes must be finite and positive.
fn parse_extent(raw: &str) -> Result<f64, CliError> {
    let value: f64 = parse_number(raw)?;
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(CliError::Usage(usage()))
    }
}

fn parse_args(argv: &[String]) -> Result<Args, CliError> {
    let mut args = Args {
        depth: 3,
        canvas_width: 2000.0,
        canvas_height: 1500.0,
        ..Default::default()
    };

    let mut it = argv.iter().skip(1);
    let mut command_seen = false;
    while let Some(a) = it.next() {
        match a.as_str() {
            "--help" | "-h" => return Err(CliError::Usage(usage())),
            cmd if !command_seen && !cmd.starts_with('-') && args.input.is_none() => {
                command_seen = true;
                args.command = match cmd {
                    "tree" => Command::Tree,
                    "line" => Command::Line,
                    "repair" => Command::Repair,
                    "validate" => Command::Validate,
                    "stats" => Command::Stats,
                    "format" => Command::Format,
                    "analyze" => Command::Analyze,
                    "split" => Command::Split,
                    "layout" => Command::Layout,
                    "parts" => {
                        let sub = match next_value(&mut it)?.as_str() {
                            "info" => PartsCommand::Info,
                            "validate" => PartsCommand::Validate,
                            "reconstruct" => PartsCommand::Reconstruct,
                            "search" => {
                                args.term = Some(next_value(&mut it)?.clone());
                                PartsCommand::Search
                            }
                            _ => return Err(CliError::Usage(usage())),
                        };
                        Command::Parts(sub)
                    }
                    path => {
                        args.input = Some(path.to_string());
                        Command::Tree
                    }
                };
            }
            "--pretty" => args.pretty = true,
            "--verbose" | "-v" => args.verbose = true,
            "--report" => args.report = true,
            "--case-sensitive" => args.case_sensitive = true,
            "--out" => args.out = Some(next_value(&mut it)?.clone()),
            "--config" => args.config = Some(next_value(&mut it)?.clone()),
            "--xpath" => args.xpath = Some(next_value(&mut it)?.clone()),
            "--threshold" => {
                let pct: f64 = parse_number(next_value(&mut it)?)?;
                if !(pct.is_finite() && pct >= 0.0) {
                    return Err(CliError::Usage(usage()));
                }
                args.threshold = Some(pct);
            }
            "--levels" => {
                let raw = next_value(&mut it)?;
                let levels = raw
                    .split(',')
                    .map(parse_number::<usize>)
                    .collect::<Result<Vec<_>, _>>()?;
                args.levels = Some(levels);
            }
            "--depth" => args.depth = parse_number(next_value(&mut it)?)?,
            "--canvas-width" => args.canvas_width = parse_extent(next_value(&mut it)?)?,
            "--canvas-height" => args.canvas_height = parse_extent(next_value(&mut it)?)?,
            "--" => {
                if let Some(rest) = it.next() {
                    if args.input.is_some() {
                        return Err(CliError::Usage(usage()));
                    }
                    args.input = Some(rest.clone());
                }
                if it.next().is_some() {
                    return Err(CliError::Usage(usage()));
                }
            }
            other if other.starts_with('-') && other != "-" => {
                return Err(CliError::Usage(usage()));
            }
            path => {
                if args.input.is_some() {
                    return Err(CliError::Usage(usage()));
                }
                command_seen = true;
                args.input = Some(path.to_string());
            }
        }
    }

    Ok(args)
}

fn read_input(input: Option<&str>) -> Result<String, CliError> {
    match input {
        None | Some("-") => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            Ok(buf)
        }
        Some(path) => Ok(std::fs::read_to_string(path)?),
    }
}

fn write_json(value: &impl Serialize, pretty: bool) -> Result<(), CliError> {
    use std::io::Write;
    let mut out = std::io::stdout().lock();
    if pretty {
        serde_json::to_writer_pretty(&mut out, value)?;
    } else {
        serde_json::to_writer(&mut out, value)?;
    }
    writeln!(out)?;
    Ok(())
}

fn write_text(text: &str, out: Option<&str>) -> Result<(), CliError> {
    match out {
        None => {
            print!("{text}");
            if !text.ends_with('\n') {
                println!();
            }
            Ok(())
        }
        Some(path) => {
            std::fs::write(path, text)?;
            Ok(())
        }
    }
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    // A subscriber installed by an embedding test harness wins.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

#[derive(Serialize)]
struct TreeOut<'a> {
    path: &'a str,
    tag: &'a str,
    name: &'a str,
    value: &'a str,
    attributes: &'a IndexMap<String, String>,
    line_number: usize,
    children: Vec<TreeOut<'a>>,
}

fn tree_out(tree: &XmlTree, id: NodeId) -> TreeOut<'_> {
    let node = tree.node(id);
    TreeOut {
        path: &node.path,
        tag: &node.tag,
        name: &node.name,
        value: &node.value,
        attributes: &node.attributes,
        line_number: node.line_number,
        children: node.children().iter().map(|&c| tree_out(tree, c)).collect(),
    }
}

fn split_config(args: &Args) -> Result<XmlSplitConfig, CliError> {
    let mut config = match &args.config {
        Some(path) => XmlSplitConfig::from_json(&std::fs::read_to_string(path)?)?,
        None => XmlSplitConfig::new(
            args.threshold.unwrap_or(15.0),
            args.levels.clone().unwrap_or_else(|| vec![2, 3]),
        ),
    };
    if args.config.is_some() {
        if let Some(pct) = args.threshold {
            config.set_threshold(pct);
        }
        if let Some(levels) = &args.levels {
            config.upper_levels = levels.clone();
        }
    }
    Ok(config)
}

fn run_parts(service: &XmlService, args: &Args, sub: PartsCommand) -> Result<(), CliError> {
    let Some(dir) = args.input.as_deref().filter(|d| *d != "-") else {
        return Err(CliError::Usage(usage()));
    };
    let dir = Path::new(dir);
    match sub {
        PartsCommand::Info => write_json(&service.split_project_info(dir)?, args.pretty),
        PartsCommand::Validate => {
            let problems = service.validate_split_project(dir)?;
            write_json(&problems, args.pretty)?;
            if problems.is_empty() {
                Ok(())
            } else {
                Err(CliError::Invalid {
                    errors: problems.values().map(Vec::len).sum(),
                })
            }
        }
        PartsCommand::Reconstruct => {
            write_text(&service.reconstruct_from_parts(dir)?, args.out.as_deref())
        }
        PartsCommand::Search => {
            let term = args.term.as_deref().unwrap_or_default();
            write_json(
                &service.search_split_project(dir, term, args.case_sensitive)?,
                args.pretty,
            )
        }
    }
}

fn run(args: Args) -> Result<(), CliError> {
    let service = XmlService::new();
    if let Command::Parts(sub) = args.command {
        return run_parts(&service, &args, sub);
    }

    let text = read_input(args.input.as_deref())?;
    tracing::debug!(command = ?args.command, bytes = text.len(), "input read");

    match args.command {
        Command::Tree => {
            let tree = service.build_tree(&text)?;
            write_json(&tree_out(&tree, tree.root_id()), args.pretty)
        }
        Command::Line => {
            let Some(xpath) = args.xpath.as_deref() else {
                return Err(CliError::Usage(usage()));
            };
            let tree = service.build_tree(&text)?;
            match tree.line_of(xpath) {
                Some(line) => {
                    println!("{line}");
                    Ok(())
                }
                None => Err(CliError::PathNotFound(xpath.to_string())),
            }
        }
        Command::Repair => {
            let (repaired, report) = service.repair(&text);
            if args.report {
                write_json(&report, args.pretty)
            } else {
                write_text(&repaired, args.out.as_deref())
            }
        }
        Command::Validate => {
            let result = service.validate(&text);
            write_json(&result, args.pretty)?;
            if result.is_valid {
                Ok(())
            } else {
                Err(CliError::Invalid {
                    errors: result.error_count(),
                })
            }
        }
        Command::Stats => write_json(&service.statistics(&text), args.pretty),
        Command::Format => write_text(&service.format(&text), args.out.as_deref()),
        Command::Analyze => {
            let config = split_config(&args)?;
            write_json(&service.analyze(&text, &config)?, args.pretty)
        }
        Command::Split => {
            let Some(out) = args.out.as_deref() else {
                return Err(CliError::Usage(usage()));
            };
            let config = split_config(&args)?;
            let metadata = match args.input.as_deref() {
                Some(path) if path != "-" => {
                    service.split_file(Path::new(path), Path::new(out), &config)?
                }
                _ => service.split(&text, Path::new(out), &config)?,
            };
            write_json(&metadata, args.pretty)
        }
        Command::Layout => {
            let tree = service.build_tree(&text)?;
            let opts = MetroOptions {
                max_depth: args.depth,
                canvas_width: args.canvas_width,
                canvas_height: args.canvas_height,
                ..Default::default()
            };
            write_json(&compute_layout_for_tree(&tree, &opts), args.pretty)
        }
        Command::Parts(_) => Ok(()),
    }
}

fn main() {
    let args = match parse_args(&std::env::args().collect::<Vec<_>>()) {
        Ok(v) => v,
        Err(CliError::Usage(msg)) => {
            eprintln!("{msg}");
            std::process::exit(2);
        }
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(1);
        }
    };
    init_tracing(args.verbose);

    match run(args) {
        Ok(()) => {}
        Err(CliError::Usage(msg)) => {
            eprintln!("{msg}");
            std::process::exit(2);
        }
        Err(err @ CliError::Invalid { .. }) => {
            eprintln!("{err}");
            std::process::exit(3);
        }
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(1);
        }
    }
}
