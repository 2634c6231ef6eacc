//! 搜索驱动.
//!
//! [`ModelChecker`] 是一个显式状态机 `Idle -> Running -> {Accepted, Rejected, Exhausted,
//! ResourceLimited}`, 每次 [`step`](ModelChecker::step) 至多展开一个状态, 展开前询问一次预算.
//! 可达性与安全性共用等待队列搜索; 活性 (接受环) 用单遍 Tarjan 或嵌套深度优先搜索.
//!
//! ```
//! use pn_verify::buchi::{AtomicProposition, BuchiAutomaton, Comparison, Guard, PropositionTable};
//! use pn_verify::checker::{CheckerBuilder, Outcome, SearchMode, SearchOptions, Verdict};
//! use pn_verify::net::{Net, Place, Transition};
//!
//! let mut net = Net::empty();
//! let p0 = net.add_place(Place::new("p0", 1));
//! let p1 = net.add_place(Place::new("p1", 0));
//! let t = net.add_transition(Transition::new("t"));
//! net.set_input_weight(p0, t, 1);
//! net.set_output_weight(p1, t, 1);
//!
//! let mut props = PropositionTable::new();
//! let done = props.push("done", AtomicProposition::Tokens { place: p1, cmp: Comparison::Ge, value: 1 });
//!
//! let mut checker = CheckerBuilder::new(net)
//!     .propositions(props)
//!     .automaton(BuchiAutomaton::reachability(Guard::prop(done)))
//!     .options(SearchOptions::new(SearchMode::Reachability))
//!     .build()
//!     .unwrap();
//! let outcome = checker.run().unwrap();
//! assert_eq!(outcome, Outcome::Accepted);
//! assert_eq!(outcome.verdict(SearchMode::Reachability), Verdict::Satisfied);
//! ```
use std::fmt;
use std::str::FromStr;

use log::{debug, error, info};
use serde::{Deserialize, Serialize};

use crate::buchi::{ConditionError, PropertyAutomaton, PropositionTable};
use crate::encoding::{MarkingEncoder, StateEncoder};
use crate::net::{NetModel, Weight};
use crate::product::{ProductState, ProductSuccessorGenerator};
use crate::ptrie::{DEFAULT_SPLIT_THRESHOLD, StateIndex};

pub mod budget;
mod context;
pub mod error;
pub mod frontier;
mod ndfs;
pub mod stats;
mod tarjan;
mod worklist;

pub use budget::{Budget, LimitReason, Limits, Unlimited};
pub use error::CheckError;
pub use frontier::{Frontier, Strategy};
pub use stats::SearchStatistics;

use context::{Interrupt, Progress, SearchContext};
use ndfs::NestedSearch;
use tarjan::TarjanSearch;
use worklist::Worklist;

/// 接受条件的解释方式.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    /// 到达接受位置即满足.
    #[default]
    Reachability,
    /// 到达接受 (坏) 位置即违反.
    Safety,
    /// 积中存在接受环即违反.
    Liveness,
}

impl FromStr for SearchMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "reachability" | "reach" => Ok(SearchMode::Reachability),
            "safety" => Ok(SearchMode::Safety),
            "liveness" | "ltl" => Ok(SearchMode::Liveness),
            other => Err(format!("unknown search mode `{other}`")),
        }
    }
}

impl fmt::Display for SearchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SearchMode::Reachability => "reachability",
            SearchMode::Safety => "safety",
            SearchMode::Liveness => "liveness",
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LivenessAlgorithm {
    #[default]
    #[serde(rename = "tarjan")]
    Tarjan,
    #[serde(rename = "ndfs")]
    NestedDfs,
}

impl FromStr for LivenessAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "tarjan" => Ok(LivenessAlgorithm::Tarjan),
            "ndfs" | "nested" => Ok(LivenessAlgorithm::NestedDfs),
            other => Err(format!("unknown liveness algorithm `{other}`")),
        }
    }
}

/// 一次运行的最终结果. 资源耗尽是结果而不是错误.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Outcome {
    Accepted,
    Rejected,
    Exhausted,
    ResourceLimited(LimitReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Verdict {
    Satisfied,
    Violated,
    Unknown,
}

impl Outcome {
    pub fn verdict(self, mode: SearchMode) -> Verdict {
        match (self, mode) {
            (Outcome::Accepted, _) => Verdict::Satisfied,
            (Outcome::Rejected, _) => Verdict::Violated,
            (Outcome::Exhausted, SearchMode::Reachability) => Verdict::Violated,
            (Outcome::Exhausted, _) => Verdict::Satisfied,
            (Outcome::ResourceLimited(_), _) => Verdict::Unknown,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Accepted => f.write_str("accepted"),
            Outcome::Rejected => f.write_str("rejected"),
            Outcome::Exhausted => f.write_str("exhausted"),
            Outcome::ResourceLimited(reason) => write!(f, "resource limited ({reason})"),
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Verdict::Satisfied => "satisfied",
            Verdict::Violated => "violated",
            Verdict::Unknown => "unknown",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckerState {
    Idle,
    Running,
    Accepted,
    Rejected,
    Exhausted,
    ResourceLimited(LimitReason),
    /// 致命错误之后; 不再前进.
    Aborted,
}

impl CheckerState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, CheckerState::Idle | CheckerState::Running)
    }

    pub fn outcome(self) -> Option<Outcome> {
        match self {
            CheckerState::Accepted => Some(Outcome::Accepted),
            CheckerState::Rejected => Some(Outcome::Rejected),
            CheckerState::Exhausted => Some(Outcome::Exhausted),
            CheckerState::ResourceLimited(reason) => Some(Outcome::ResourceLimited(reason)),
            CheckerState::Idle | CheckerState::Running | CheckerState::Aborted => None,
        }
    }
}

impl From<Outcome> for CheckerState {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Accepted => CheckerState::Accepted,
            Outcome::Rejected => CheckerState::Rejected,
            Outcome::Exhausted => CheckerState::Exhausted,
            Outcome::ResourceLimited(reason) => CheckerState::ResourceLimited(reason),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchOptions {
    pub mode: SearchMode,
    pub strategy: Strategy,
    pub liveness: LivenessAlgorithm,
    /// 任一库所令牌数超过此值的状态不再登记.
    pub token_bound: Option<Weight>,
    pub seed: u64,
    pub verify_encoding: bool,
    pub split_threshold: usize,
    pub node_limit: Option<usize>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            mode: SearchMode::default(),
            strategy: Strategy::default(),
            liveness: LivenessAlgorithm::default(),
            token_bound: None,
            seed: 0,
            verify_encoding: false,
            split_threshold: DEFAULT_SPLIT_THRESHOLD,
            node_limit: None,
        }
    }
}

impl SearchOptions {
    pub fn new(mode: SearchMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_liveness(mut self, liveness: LivenessAlgorithm) -> Self {
        self.liveness = liveness;
        self
    }

    pub fn with_token_bound(mut self, bound: Option<Weight>) -> Self {
        self.token_bound = bound;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_verify_encoding(mut self, verify: bool) -> Self {
        self.verify_encoding = verify;
        self
    }

    pub fn with_node_limit(mut self, limit: Option<usize>) -> Self {
        self.node_limit = limit;
        self
    }
}

/// 运行结束后的汇总.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Report {
    pub mode: SearchMode,
    pub outcome: Outcome,
    pub verdict: Verdict,
    pub statistics: SearchStatistics,
    /// 触发接受条件的状态.
    pub witness: Option<ProductState>,
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} check: {} ({})", self.mode, self.verdict, self.outcome)?;
        if let Some(witness) = &self.witness {
            writeln!(f, "witness: {witness:?}")?;
        }
        write!(f, "{}", self.statistics)
    }
}

enum Engine {
    Worklist(Worklist),
    Tarjan(TarjanSearch),
    Nested(NestedSearch),
}

impl Engine {
    fn for_options(options: &SearchOptions) -> Self {
        match (options.mode, options.liveness) {
            (SearchMode::Liveness, LivenessAlgorithm::Tarjan) => Engine::Tarjan(TarjanSearch::new()),
            (SearchMode::Liveness, LivenessAlgorithm::NestedDfs) => {
                Engine::Nested(NestedSearch::new())
            }
            _ => Engine::Worklist(Worklist::new(options.strategy, options.seed)),
        }
    }

    fn waiting(&self) -> usize {
        match self {
            Engine::Worklist(w) => w.waiting(),
            Engine::Tarjan(t) => t.waiting(),
            Engine::Nested(n) => n.waiting(),
        }
    }
}

pub struct ModelChecker<N, A, E = MarkingEncoder, B = Limits> {
    ctx: SearchContext<N, A, E, B>,
    engine: Engine,
    options: SearchOptions,
    state: CheckerState,
    witness: Option<ProductState>,
}

impl<N, A, E, B> ModelChecker<N, A, E, B>
where
    N: NetModel,
    A: PropertyAutomaton,
    E: StateEncoder<State = ProductState>,
    B: Budget,
{
    pub fn new(
        generator: ProductSuccessorGenerator<N, A>,
        encoder: E,
        budget: B,
        options: SearchOptions,
    ) -> Self {
        let index = StateIndex::new()
            .with_split_threshold(options.split_threshold)
            .with_node_limit(options.node_limit);
        Self {
            ctx: SearchContext {
                generator,
                encoder,
                budget,
                index,
                stats: SearchStatistics::new(),
                token_bound: options.token_bound,
                verify_encoding: options.verify_encoding,
                truncated: false,
            },
            engine: Engine::for_options(&options),
            options,
            state: CheckerState::Idle,
            witness: None,
        }
    }

    pub fn state(&self) -> CheckerState {
        self.state
    }

    pub fn statistics(&self) -> &SearchStatistics {
        &self.ctx.stats
    }

    pub fn index(&self) -> &StateIndex {
        &self.ctx.index
    }

    pub fn options(&self) -> &SearchOptions {
        &self.options
    }

    pub fn generator(&self) -> &ProductSuccessorGenerator<N, A> {
        &self.ctx.generator
    }

    /// 推进一步并返回新的状态. 终止状态下重复调用不再有副作用.
    pub fn step(&mut self) -> Result<CheckerState, CheckError> {
        match self.state {
            CheckerState::Idle => return self.begin(),
            CheckerState::Running => {}
            CheckerState::Aborted => return Err(CheckError::Aborted),
            done => return Ok(done),
        }
        let progress = match &mut self.engine {
            Engine::Worklist(w) => w.step(&mut self.ctx),
            Engine::Tarjan(t) => t.step(&mut self.ctx),
            Engine::Nested(n) => n.step(&mut self.ctx),
        };
        match progress {
            Ok(Progress::Continue) => Ok(self.state),
            Ok(Progress::Accepting(state)) => {
                debug!("acceptance condition holds at {state:?}");
                self.witness = Some(state);
                let outcome = match self.options.mode {
                    SearchMode::Reachability => Outcome::Accepted,
                    SearchMode::Safety | SearchMode::Liveness => Outcome::Rejected,
                };
                Ok(self.finish(outcome))
            }
            Ok(Progress::Exhausted) => {
                let outcome = self.ctx.exhausted();
                Ok(self.finish(outcome))
            }
            Err(interrupt) => self.interrupt(interrupt),
        }
    }

    /// 一直推进到终止状态.
    pub fn run(&mut self) -> Result<Outcome, CheckError> {
        loop {
            let state = self.step()?;
            if let Some(outcome) = state.outcome() {
                return Ok(outcome);
            }
        }
    }

    /// 终止后可用.
    pub fn report(&self) -> Option<Report> {
        let outcome = self.state.outcome()?;
        Some(Report {
            mode: self.options.mode,
            outcome,
            verdict: outcome.verdict(self.options.mode),
            statistics: self.ctx.stats,
            witness: self.witness.clone(),
        })
    }

    fn begin(&mut self) -> Result<CheckerState, CheckError> {
        info!(
            "{} search started (strategy {}, liveness {:?})",
            self.options.mode, self.options.strategy, self.options.liveness
        );
        self.ctx.budget.start();
        self.state = CheckerState::Running;
        let started = match &mut self.engine {
            Engine::Worklist(w) => w.start(&mut self.ctx),
            Engine::Tarjan(t) => t.start(&mut self.ctx),
            Engine::Nested(n) => n.start(&mut self.ctx),
        };
        match started {
            Ok(()) => Ok(self.state),
            Err(interrupt) => self.interrupt(interrupt),
        }
    }

    fn interrupt(&mut self, interrupt: Interrupt) -> Result<CheckerState, CheckError> {
        match interrupt {
            Interrupt::Limit(reason) => {
                info!("search stopped: {reason}");
                Ok(self.finish(Outcome::ResourceLimited(reason)))
            }
            Interrupt::Fault(err) => {
                error!("search aborted: {err}");
                self.ctx.stats.finish(self.engine.waiting());
                self.state = CheckerState::Aborted;
                Err(err)
            }
        }
    }

    fn finish(&mut self, outcome: Outcome) -> CheckerState {
        self.ctx.stats.finish(self.engine.waiting());
        self.state = outcome.into();
        info!(
            "{} search finished: {} ({}), {} explored, {} discovered",
            self.options.mode,
            outcome,
            outcome.verdict(self.options.mode),
            self.ctx.stats.explored,
            self.ctx.stats.discovered
        );
        self.state
    }
}

/// 组装网、命题、自动机与选项. 缺少自动机在构造时报错, 而非搜索中途.
pub struct CheckerBuilder<N, A> {
    net: N,
    propositions: PropositionTable,
    automaton: Option<A>,
    options: SearchOptions,
    limits: Limits,
}

impl<N: NetModel, A: PropertyAutomaton> CheckerBuilder<N, A> {
    pub fn new(net: N) -> Self {
        Self {
            net,
            propositions: PropositionTable::new(),
            automaton: None,
            options: SearchOptions::default(),
            limits: Limits::new(),
        }
    }

    pub fn propositions(mut self, propositions: PropositionTable) -> Self {
        self.propositions = propositions;
        self
    }

    pub fn automaton(mut self, automaton: A) -> Self {
        self.automaton = Some(automaton);
        self
    }

    pub fn options(mut self, options: SearchOptions) -> Self {
        self.options = options;
        self
    }

    pub fn limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    pub fn build(self) -> Result<ModelChecker<N, A>, CheckError> {
        let encoder = MarkingEncoder::for_net(&self.net);
        let limits = self.limits.clone();
        self.build_with(encoder, limits)
    }

    pub fn build_with<E, B>(self, encoder: E, budget: B) -> Result<ModelChecker<N, A, E, B>, CheckError>
    where
        E: StateEncoder<State = ProductState>,
        B: Budget,
    {
        let automaton = self.automaton.ok_or(ConditionError::Missing)?;
        let generator = ProductSuccessorGenerator::new(self.net, self.propositions, automaton)?;
        Ok(ModelChecker::new(generator, encoder, budget, self.options))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buchi::{AtomicProposition, BuchiAutomaton, Comparison, Guard};
    use crate::net::{Net, Place, Transition};

    /// p0 -> t -> p1, p1 -> u -> p0: 两个标识来回切换.
    fn toggle() -> (Net, PropositionTable) {
        let mut net = Net::empty();
        let p0 = net.add_place(Place::new("p0", 1));
        let p1 = net.add_place(Place::new("p1", 0));
        let t = net.add_transition(Transition::new("t"));
        let u = net.add_transition(Transition::new("u"));
        net.set_input_weight(p0, t, 1);
        net.set_output_weight(p1, t, 1);
        net.set_input_weight(p1, u, 1);
        net.set_output_weight(p0, u, 1);
        let mut props = PropositionTable::new();
        props.push(
            "right",
            AtomicProposition::Tokens { place: p1, cmp: Comparison::Ge, value: 1 },
        );
        (net, props)
    }

    fn checker(
        automaton: BuchiAutomaton,
        options: SearchOptions,
    ) -> ModelChecker<Net, BuchiAutomaton> {
        let (net, props) = toggle();
        CheckerBuilder::new(net)
            .propositions(props)
            .automaton(automaton)
            .options(options)
            .build()
            .unwrap()
    }

    #[test]
    fn first_step_leaves_idle() {
        let mut c = checker(
            BuchiAutomaton::safety(Guard::False),
            SearchOptions::new(SearchMode::Safety),
        );
        assert_eq!(c.state(), CheckerState::Idle);
        assert_eq!(c.step().unwrap(), CheckerState::Running);
        assert_eq!(c.statistics().discovered, 1);
        assert_eq!(c.statistics().explored, 0);
    }

    #[test]
    fn safety_holds_when_bad_state_is_unreachable() {
        let mut c = checker(
            BuchiAutomaton::safety(Guard::False),
            SearchOptions::new(SearchMode::Safety),
        );
        assert_eq!(c.run().unwrap(), Outcome::Exhausted);
        let report = c.report().unwrap();
        assert_eq!(report.verdict, Verdict::Satisfied);
        assert_eq!(report.statistics.explored, 2);
        assert_eq!(report.statistics.end_waiting, 0);
        assert!(report.witness.is_none());
    }

    #[test]
    fn terminal_state_is_sticky() {
        let mut c = checker(
            BuchiAutomaton::reachability(Guard::prop(crate::buchi::PropId::new(0))),
            SearchOptions::new(SearchMode::Reachability),
        );
        assert_eq!(c.run().unwrap(), Outcome::Accepted);
        let stats = *c.statistics();
        assert_eq!(c.step().unwrap(), CheckerState::Accepted);
        assert_eq!(*c.statistics(), stats);
    }

    #[test]
    fn both_liveness_algorithms_find_the_toggle_cycle() {
        let right = Guard::prop(crate::buchi::PropId::new(0));
        for algorithm in [LivenessAlgorithm::Tarjan, LivenessAlgorithm::NestedDfs] {
            let options = SearchOptions::new(SearchMode::Liveness).with_liveness(algorithm);
            let mut c = checker(BuchiAutomaton::recurrence(right.clone()), options);
            assert_eq!(c.run().unwrap(), Outcome::Rejected, "{algorithm:?}");
            assert!(c.report().unwrap().witness.is_some());
        }
    }

    #[test]
    fn liveness_without_accepting_cycle_is_exhausted() {
        let right = Guard::prop(crate::buchi::PropId::new(0));
        for algorithm in [LivenessAlgorithm::Tarjan, LivenessAlgorithm::NestedDfs] {
            let options = SearchOptions::new(SearchMode::Liveness).with_liveness(algorithm);
            // FG right 不成立: 每条运行都会离开 p1
            let mut c = checker(BuchiAutomaton::persistence(right.clone()), options);
            assert_eq!(c.run().unwrap(), Outcome::Exhausted, "{algorithm:?}");
            assert_eq!(c.statistics().end_waiting, 0);
        }
    }

    #[test]
    fn missing_automaton_is_reported_before_search() {
        let (net, props) = toggle();
        let result = CheckerBuilder::<Net, BuchiAutomaton>::new(net)
            .propositions(props)
            .build();
        assert!(matches!(
            result,
            Err(CheckError::UnsupportedCondition(ConditionError::Missing))
        ));
    }

    #[test]
    fn modes_parse_from_text() {
        assert_eq!("LTL".parse::<SearchMode>(), Ok(SearchMode::Liveness));
        assert_eq!("ndfs".parse::<LivenessAlgorithm>(), Ok(LivenessAlgorithm::NestedDfs));
        assert!("ctl".parse::<SearchMode>().is_err());
    }

    #[test]
    fn exhausted_reachability_is_a_violation() {
        assert_eq!(
            Outcome::Exhausted.verdict(SearchMode::Reachability),
            Verdict::Violated
        );
        assert_eq!(Outcome::Exhausted.verdict(SearchMode::Safety), Verdict::Satisfied);
        assert_eq!(
            Outcome::ResourceLimited(LimitReason::TimeLimit).verdict(SearchMode::Liveness),
            Verdict::Unknown
        );
    }
}
