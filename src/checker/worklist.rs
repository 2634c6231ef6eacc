use super::budget::Budget;
use super::context::{Interrupt, Progress, SearchContext};
use super::frontier::{Frontier, Strategy};
use crate::buchi::PropertyAutomaton;
use crate::encoding::StateEncoder;
use crate::net::NetModel;
use crate::net::index_vec::Idx;
use crate::product::ProductState;
use crate::ptrie::StateId;

/// 可达性与安全性共用的等待队列搜索.
///
/// 状态在被发现时插入索引, 新状态才入队; 接受条件在出队时检查一次.
pub(crate) struct Worklist {
    frontier: Frontier<(StateId, ProductState)>,
    expanded: Vec<bool>,
}

impl Worklist {
    pub(crate) fn new(strategy: Strategy, seed: u64) -> Self {
        Self {
            frontier: Frontier::new(strategy, seed),
            expanded: Vec::new(),
        }
    }

    pub(crate) fn waiting(&self) -> usize {
        self.frontier.len()
    }

    pub(crate) fn start<N, A, E, B>(
        &mut self,
        ctx: &mut SearchContext<N, A, E, B>,
    ) -> Result<(), Interrupt>
    where
        N: NetModel,
        A: PropertyAutomaton,
        E: StateEncoder<State = ProductState>,
        B: Budget,
    {
        let mut seeds = Vec::new();
        for state in ctx.generator.initial_states() {
            if let Some(lookup) = ctx.discover(&state)? {
                if !lookup.already_present {
                    seeds.push((lookup.id, state));
                }
            }
        }
        self.frontier.push_batch(seeds);
        ctx.stats.observe_waiting(self.frontier.len());
        Ok(())
    }

    pub(crate) fn step<N, A, E, B>(
        &mut self,
        ctx: &mut SearchContext<N, A, E, B>,
    ) -> Result<Progress, Interrupt>
    where
        N: NetModel,
        A: PropertyAutomaton,
        E: StateEncoder<State = ProductState>,
        B: Budget,
    {
        if self.frontier.is_empty() {
            return Ok(Progress::Exhausted);
        }
        ctx.check_budget()?;
        let Some((id, state)) = self.frontier.pop() else {
            return Ok(Progress::Exhausted);
        };
        if self.mark_expanded(id) {
            return Ok(Progress::Continue);
        }
        ctx.stats.refresh_waiting(self.frontier.len());
        ctx.stats.record_explored();

        if ctx.generator.is_accepting(&state) {
            return Ok(Progress::Accepting(state));
        }

        let mut fresh = Vec::new();
        for successor in ctx.generator.successors(&state)? {
            if let Some(lookup) = ctx.discover(&successor)? {
                if !lookup.already_present {
                    fresh.push((lookup.id, successor));
                }
            }
        }
        self.frontier.push_batch(fresh);
        ctx.stats.observe_waiting(self.frontier.len());
        Ok(Progress::Continue)
    }

    /// 返回此前是否已展开过.
    fn mark_expanded(&mut self, id: StateId) -> bool {
        let i = id.index();
        if self.expanded.len() <= i {
            self.expanded.resize(i + 1, false);
        }
        std::mem::replace(&mut self.expanded[i], true)
    }
}
