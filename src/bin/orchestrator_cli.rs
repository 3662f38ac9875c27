//! Orchestrator CLI — 路由表查看、质量门验证与自愈的命令行工具
//!
//! Usage:
//!   orchestrator-cli routes [--config <path>]                      Show resolved routes
//!   orchestrator-cli verify <file> [--config <path>] [--ground-truth <s>]...
//!   orchestrator-cli heal <file> [--config <path>] [--ground-truth <s>]... [--write]

use anyhow::{bail, Context};
use healing_orchestrator::config::CONFIG_ENV_VAR;
use healing_orchestrator::healing::HeuristicFixer;
use healing_orchestrator::{logging, OrchestratorConfig, VerificationContext};
use std::path::{Path, PathBuf};

fn main() {
    logging::init_with_default("warn");

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        print_usage();
        std::process::exit(1);
    }

    let outcome = match args[1].as_str() {
        "routes" => cmd_routes(&args[2..]),
        "verify" => cmd_verify(&args[2..]),
        "heal" => cmd_heal(&args[2..]),
        "version" | "--version" | "-V" => {
            cmd_version();
            Ok(0)
        }
        "help" | "--help" | "-h" => {
            print_usage();
            Ok(0)
        }
        other => {
            eprintln!("Unknown command: {other}");
            eprintln!();
            print_usage();
            Ok(1)
        }
    };

    match outcome {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("Error: {e:#}");
            std::process::exit(1);
        }
    }
}

fn print_usage() {
    println!(
        r#"orchestrator-cli — 弹性编排核心命令行工具

USAGE:
    orchestrator-cli <COMMAND> [OPTIONS]

COMMANDS:
    routes [--config <path>]                  Show the resolved route for every role
    verify <file> [OPTIONS]                   Run the eight quality gates over a file
    heal <file> [OPTIONS] [--write]           Verify, then auto-fix and re-verify
    version                                   Show version information
    help                                      Show this help message

OPTIONS:
    --config <path>                           Orchestrator config (YAML or JSON)
    --ground-truth <value>                    Value the content must contain (repeatable)

ENVIRONMENT:
    HEALING_ORCHESTRATOR_CONFIG               Config path used when --config is absent
    RUST_LOG                                  Log filter (default: warn)

EXIT STATUS:
    verify and heal exit 1 when the final report is not all green"#
    );
}

fn cmd_version() {
    println!("{}", version_line());
}

fn version_line() -> String {
    format!("{} {}", env!("CARGO_BIN_NAME"), env!("CARGO_PKG_VERSION"))
}

/// Parsed `<file> [--config p] [--ground-truth s]... [--write]`.
struct Options {
    file: Option<PathBuf>,
    config: Option<PathBuf>,
    ground_truth: Vec<String>,
    write: bool,
}

fn parse_options(args: &[String]) -> anyhow::Result<Options> {
    let mut opts = Options {
        file: None,
        config: None,
        ground_truth: Vec::new(),
        write: false,
    };
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--config" => {
                let value = iter.next().context("--config requires a path")?;
                opts.config = Some(PathBuf::from(value));
            }
            "--ground-truth" => {
                let value = iter.next().context("--ground-truth requires a value")?;
                opts.ground_truth.push(value.clone());
            }
            "--write" => opts.write = true,
            flag if flag.starts_with("--") => bail!("unknown option: {flag}"),
            positional => {
                if opts.file.is_some() {
                    bail!("unexpected argument: {positional}");
                }
                opts.file = Some(PathBuf::from(positional));
            }
        }
    }
    Ok(opts)
}

fn load_config(path: Option<&Path>) -> anyhow::Result<OrchestratorConfig> {
    match path {
        Some(p) => OrchestratorConfig::from_path(p)
            .with_context(|| format!("loading config {}", p.display())),
        None => OrchestratorConfig::from_env()
            .with_context(|| format!("loading config from ${CONFIG_ENV_VAR}")),
    }
}

fn read_content(opts: &Options) -> anyhow::Result<(PathBuf, String)> {
    let Some(file) = opts.file.clone() else {
        bail!("missing <file> argument");
    };
    let content =
        std::fs::read_to_string(&file).with_context(|| format!("reading {}", file.display()))?;
    Ok((file, content))
}

fn context_from(opts: &Options) -> VerificationContext {
    opts.ground_truth
        .iter()
        .fold(VerificationContext::new(), |ctx, value| ctx.with_ground_truth(value.clone()))
}

fn runtime() -> anyhow::Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("starting async runtime")
}

fn cmd_routes(args: &[String]) -> anyhow::Result<i32> {
    let opts = parse_options(args)?;
    let config = load_config(opts.config.as_deref())?;
    let router = config.build_router();

    println!("{:<16} {:<12} {:<28} FALLBACK", "ROLE", "PROVIDER", "MODEL");
    for (role, route) in router.list_routes() {
        println!(
            "{:<16} {:<12} {:<28} {}",
            role,
            route.provider,
            route.model,
            if route.is_fallback { "yes" } else { "no" }
        );
    }
    let ultimate = &router.config().ultimate_fallback;
    println!();
    println!("ultimate fallback: {} / {}", ultimate.provider, ultimate.model);
    Ok(0)
}

fn cmd_verify(args: &[String]) -> anyhow::Result<i32> {
    let opts = parse_options(args)?;
    let config = load_config(opts.config.as_deref())?;
    let (_, content) = read_content(&opts)?;
    let context = context_from(&opts);

    let verifier = config.build_verifier();
    let report = runtime()?.block_on(verifier.run(&content, &context));

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(if report.all_green() { 0 } else { 1 })
}

fn cmd_heal(args: &[String]) -> anyhow::Result<i32> {
    let opts = parse_options(args)?;
    let config = load_config(opts.config.as_deref())?;
    let (file, content) = read_content(&opts)?;
    let context = context_from(&opts);

    let pipeline = config.build_pipeline();
    let outcome = runtime()?.block_on(pipeline.run(content, &context, &HeuristicFixer));

    if opts.write && outcome.heal.is_some() {
        std::fs::write(&file, &outcome.content)
            .with_context(|| format!("writing {}", file.display()))?;
        eprintln!("wrote healed content to {}", file.display());
    }
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(if outcome.is_green() { 0 } else { 1 })
}
