use anyhow::{Context, Result, anyhow};
use log::debug;

use pn_verify::checker::{CheckError, CheckerBuilder, Verdict};
use pn_verify::config::CheckerConfig;
use pn_verify::model::ModelFile;
use pn_verify::options::Options;

const PN_VERIFY_HELP: &str = r#"Explicit-state model checker for Petri nets

USAGE:
    pn-verify --model <FILE> [OPTIONS]

OPTIONS:
    -m, --model <FILE>       Model file (.json or .ron)
    -c, --config <FILE>      TOML checker configuration [default: pn-verify.toml]
    -s, --strategy <KIND>    bfs | dfs | rdfs
        --mode <MODE>        reachability | safety | liveness (automaton properties only)
        --max-states <N>     Stop after exploring N states
        --seed <N>           Seed for randomised depth-first search
        --json               Print the report as JSON

ENVIRONMENT:
    PN_FLAGS                 Extra options, parsed before the command line
    PN_LOG, PN_LOG_STYLE     env_logger filter and style

EXIT STATUS:
    0 satisfied, 1 violated, 2 unknown, 3 error
"#;

fn main() {
    if std::env::var("PN_LOG").is_ok() {
        let e = env_logger::Env::new()
            .filter("PN_LOG")
            .write_style("PN_LOG_STYLE");
        env_logger::init_from_env(e);
    }

    let code = match run() {
        Ok(Verdict::Satisfied) => 0,
        Ok(Verdict::Violated) => 1,
        Ok(Verdict::Unknown) => 2,
        Err(err) => {
            eprintln!("error: {err:#}");
            3
        }
    };
    std::process::exit(code);
}

fn run() -> Result<Verdict> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.iter().any(|arg| arg == "-h" || arg == "--help") {
        print!("{PN_VERIFY_HELP}");
        std::process::exit(0);
    }

    let env_options = Options::parse_from_str(&std::env::var("PN_FLAGS").unwrap_or_default())
        .map_err(|err| anyhow!("invalid PN_FLAGS: {err}"))?;
    let cli_options =
        Options::parse_from_args(&args).map_err(|err| anyhow!("invalid arguments: {err}"))?;
    let options = env_options.merge(cli_options);
    debug!("PN options: {:?}", options);

    let model_path = options
        .model
        .clone()
        .ok_or_else(|| anyhow!("missing --model FILE, see --help"))?;
    let model = ModelFile::read(&model_path)
        .with_context(|| format!("Failed to load model file: {:?}", model_path))?;

    let mut config = CheckerConfig::load_from_file(options.config_path())?;
    options.apply(&mut config);
    debug!("checker config: {:?}", config);

    let search = config
        .search_options(&model.property)
        .map_err(CheckError::from)?;
    let automaton = model.automaton().context("Failed to build the property automaton")?;
    let mut checker = CheckerBuilder::new(model.net)
        .propositions(model.propositions)
        .automaton(automaton)
        .options(search)
        .limits(config.limits())
        .build()?;
    checker.run()?;

    let report = checker
        .report()
        .ok_or_else(|| anyhow!("search ended without a result"))?;
    if options.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{report}");
    }
    Ok(report.verdict)
}
