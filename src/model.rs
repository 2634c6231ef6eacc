//! 模型文件: 一个网、它的原子命题表与待检查的性质, 以 JSON 或 RON 存储.
//!
//! 性质以守卫文本给出时, 按命题名解析; 活性性质转为其否定的 Büchi 自动机,
//! 存在接受环即违反.
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::buchi::{BuchiAutomaton, ConditionError, Guard, PropositionTable};
use crate::checker::SearchMode;
use crate::net::Net;
use crate::net::io::{self, IoError};

#[derive(Debug, Error)]
pub enum ModelError {
    #[error(transparent)]
    Io(#[from] IoError),
    #[error(transparent)]
    Condition(#[from] ConditionError),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Property {
    /// `EF goal`.
    Reachable { goal: String },
    /// `AG good`.
    Invariant { good: String },
    /// `GF guard`, 违反当且仅当存在满足 `FG !guard` 的运行.
    InfinitelyOften { guard: String },
    /// `FG guard`, 违反当且仅当存在满足 `GF !guard` 的运行.
    EventuallyAlways { guard: String },
    /// 直接给出的自动机, 按 `mode` 解释其接受条件.
    Automaton {
        automaton: BuchiAutomaton,
        mode: SearchMode,
    },
}

impl Property {
    pub fn default_mode(&self) -> SearchMode {
        match self {
            Property::Reachable { .. } => SearchMode::Reachability,
            Property::Invariant { .. } => SearchMode::Safety,
            Property::InfinitelyOften { .. } | Property::EventuallyAlways { .. } => {
                SearchMode::Liveness
            }
            Property::Automaton { mode, .. } => *mode,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Property::Reachable { .. } => "reachable",
            Property::Invariant { .. } => "invariant",
            Property::InfinitelyOften { .. } => "infinitely_often",
            Property::EventuallyAlways { .. } => "eventually_always",
            Property::Automaton { .. } => "automaton",
        }
    }

    /// 只有直接给出的自动机可以换一种模式解释; 其余性质的自动机
    /// 按其固有模式构造, 换模式会颠倒结论.
    pub fn search_mode(&self, requested: Option<SearchMode>) -> Result<SearchMode, ConditionError> {
        let implied = self.default_mode();
        match requested {
            None => Ok(implied),
            Some(mode) if matches!(self, Property::Automaton { .. }) => Ok(mode),
            Some(mode) if mode == implied => Ok(mode),
            Some(requested) => Err(ConditionError::ModeMismatch {
                property: self.kind(),
                implied,
                requested,
            }),
        }
    }

    pub fn automaton(&self, table: &PropositionTable) -> Result<BuchiAutomaton, ConditionError> {
        Ok(match self {
            Property::Reachable { goal } => BuchiAutomaton::reachability(parse_guard(goal, table)?),
            Property::Invariant { good } => BuchiAutomaton::invariant(parse_guard(good, table)?),
            Property::InfinitelyOften { guard } => {
                BuchiAutomaton::persistence(parse_guard(guard, table)?.negate())
            }
            Property::EventuallyAlways { guard } => {
                BuchiAutomaton::recurrence(parse_guard(guard, table)?.negate())
            }
            Property::Automaton { automaton, .. } => automaton.clone(),
        })
    }
}

fn parse_guard(text: &str, table: &PropositionTable) -> Result<Guard, ConditionError> {
    Guard::parse(text, table).map_err(|source| ConditionError::Guard {
        guard: text.to_string(),
        source,
    })
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelFile {
    pub net: Net,
    #[serde(default)]
    pub propositions: PropositionTable,
    pub property: Property,
}

impl ModelFile {
    pub fn read(path: impl AsRef<Path>) -> Result<Self, ModelError> {
        let model: ModelFile = io::read_file(path)?;
        model.check_net()?;
        Ok(model)
    }

    pub fn from_text(content: &str, format: io::Format) -> Result<Self, ModelError> {
        let model: ModelFile = io::from_str(content, format)?;
        model.check_net()?;
        Ok(model)
    }

    fn check_net(&self) -> Result<(), IoError> {
        if self.net.is_well_formed() {
            Ok(())
        } else {
            Err(IoError::Malformed)
        }
    }

    pub fn default_mode(&self) -> SearchMode {
        self.property.default_mode()
    }

    pub fn search_mode(&self, requested: Option<SearchMode>) -> Result<SearchMode, ConditionError> {
        self.property.search_mode(requested)
    }

    pub fn automaton(&self) -> Result<BuchiAutomaton, ConditionError> {
        self.property.automaton(&self.propositions)
    }
}
