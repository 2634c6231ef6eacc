//! Parsing Options.
//! `--model {file}` 是唯一必需的参数, 其余参数覆盖配置文件中的同名项.

use clap::{Arg, ArgAction, Command};
use std::error::Error;
use std::path::PathBuf;

use crate::checker::{SearchMode, Strategy};
use crate::config::CheckerConfig;

fn make_options_parser() -> clap::Command {
    Command::new("pn-verify")
        .no_binary_name(true)
        .version("v0.1.0")
        .about("Explicit-state model checker for Petri nets")
        .arg(
            Arg::new("model")
                .short('m')
                .long("model")
                .value_name("FILE")
                .help("Model file (.json or .ron) holding the net, its propositions and the property"),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("TOML checker configuration, defaults to pn-verify.toml"),
        )
        .arg(
            Arg::new("strategy")
                .short('s')
                .long("strategy")
                .help("Frontier order for reachability and safety search")
                .value_parser(["bfs", "dfs", "rdfs"]),
        )
        .arg(
            Arg::new("mode")
                .long("mode")
                .help("Override the search mode implied by the property")
                .value_parser(["reachability", "safety", "liveness"]),
        )
        .arg(
            Arg::new("max-states")
                .long("max-states")
                .value_name("N")
                .value_parser(clap::value_parser!(usize)),
        )
        .arg(
            Arg::new("seed")
                .long("seed")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .help("Print the report as JSON")
                .action(ArgAction::SetTrue),
        )
}

#[derive(Debug, Default)]
pub struct Options {
    pub model: Option<PathBuf>,
    pub config: Option<PathBuf>,
    pub strategy: Option<Strategy>,
    pub mode: Option<SearchMode>,
    pub max_states: Option<usize>,
    pub seed: Option<u64>,
    pub json: bool,
}

impl Options {
    pub fn parse_from_str(s: &str) -> Result<Self, Box<dyn Error>> {
        let flags = shellwords::split(s)?;
        Self::parse_from_args(&flags)
    }

    pub fn parse_from_args(flags: &[String]) -> Result<Self, Box<dyn Error>> {
        let app = make_options_parser();
        let matches = app.try_get_matches_from(flags.iter())?;

        let strategy = matches
            .get_one::<String>("strategy")
            .map(|s| s.parse::<Strategy>())
            .transpose()?;
        let mode = matches
            .get_one::<String>("mode")
            .map(|s| s.parse::<SearchMode>())
            .transpose()?;

        Ok(Options {
            model: matches.get_one::<String>("model").map(PathBuf::from),
            config: matches.get_one::<String>("config").map(PathBuf::from),
            strategy,
            mode,
            max_states: matches.get_one::<usize>("max-states").copied(),
            seed: matches.get_one::<u64>("seed").copied(),
            json: matches.get_flag("json"),
        })
    }

    /// 后出现的参数优先: 环境变量中的参数先解析, 命令行再覆盖.
    pub fn merge(self, later: Options) -> Options {
        Options {
            model: later.model.or(self.model),
            config: later.config.or(self.config),
            strategy: later.strategy.or(self.strategy),
            mode: later.mode.or(self.mode),
            max_states: later.max_states.or(self.max_states),
            seed: later.seed.or(self.seed),
            json: self.json || later.json,
        }
    }

    pub fn config_path(&self) -> PathBuf {
        self.config
            .clone()
            .unwrap_or_else(|| PathBuf::from("pn-verify.toml"))
    }

    pub fn apply(&self, config: &mut CheckerConfig) {
        if let Some(strategy) = self.strategy {
            config.strategy = strategy;
        }
        if let Some(mode) = self.mode {
            config.mode = Some(mode);
        }
        if let Some(max) = self.max_states {
            config.max_states = Some(max);
        }
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
    }
}
