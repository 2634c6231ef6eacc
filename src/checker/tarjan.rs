//! 单遍 Tarjan 接受环检测.
//!
//! `cstack` 保存尚未归入已完成强连通分量的状态及其 lowlink, `dstack` 是深度优先路径,
//! `astack` 记录路径上接受状态在 `cstack` 中的位置. 一条回到 `cstack` 中位置 `to` 的边,
//! 若其 lowlink 不大于当前状态的 lowlink 且路径上存在位置不小于 `to` 的接受状态,
//! 则闭合了一个接受环.
use super::budget::Budget;
use super::context::{Interrupt, Progress, SearchContext};
use crate::buchi::PropertyAutomaton;
use crate::encoding::StateEncoder;
use crate::net::NetModel;
use crate::net::index_vec::Idx;
use crate::product::ProductState;
use crate::ptrie::StateId;

#[derive(Debug)]
struct CEntry {
    id: StateId,
    lowlink: usize,
}

#[derive(Debug)]
struct DEntry {
    pos: usize,
    state: ProductState,
    /// 尚未处理的后继, 从尾部取.
    pending: Vec<ProductState>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unseen,
    OnStack(usize),
    Done,
}

#[derive(Default)]
pub(crate) struct TarjanSearch {
    roots: Vec<(StateId, ProductState)>,
    cstack: Vec<CEntry>,
    dstack: Vec<DEntry>,
    astack: Vec<usize>,
    marks: Vec<Mark>,
}

impl TarjanSearch {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn waiting(&self) -> usize {
        self.dstack.len()
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
        for state in ctx.generator.initial_states() {
            if let Some(lookup) = ctx.discover(&state)? {
                if !lookup.already_present {
                    self.roots.push((lookup.id, state));
                }
            }
        }
        self.roots.reverse();
        ctx.stats.observe_waiting(self.roots.len());
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
        if self.dstack.is_empty() {
            while let Some((id, state)) = self.roots.pop() {
                if self.mark(id) == Mark::Unseen {
                    ctx.check_budget()?;
                    return self.push(ctx, id, state);
                }
            }
            return Ok(Progress::Exhausted);
        }
        ctx.check_budget()?;

        let Some(top) = self.dstack.last_mut() else {
            return Ok(Progress::Exhausted);
        };
        let Some(successor) = top.pending.pop() else {
            return self.pop(ctx);
        };
        let Some(lookup) = ctx.discover(&successor)? else {
            return Ok(Progress::Continue);
        };
        match self.mark(lookup.id) {
            Mark::Unseen => self.push(ctx, lookup.id, successor),
            Mark::OnStack(to) => {
                if self.update(to) {
                    Ok(Progress::Accepting(successor))
                } else {
                    Ok(Progress::Continue)
                }
            }
            Mark::Done => Ok(Progress::Continue),
        }
    }

    fn mark(&self, id: StateId) -> Mark {
        self.marks.get(id.index()).copied().unwrap_or(Mark::Unseen)
    }

    fn set_mark(&mut self, id: StateId, mark: Mark) {
        let i = id.index();
        if self.marks.len() <= i {
            self.marks.resize(i + 1, Mark::Unseen);
        }
        self.marks[i] = mark;
    }

    fn push<N, A, E, B>(
        &mut self,
        ctx: &mut SearchContext<N, A, E, B>,
        id: StateId,
        state: ProductState,
    ) -> Result<Progress, Interrupt>
    where
        N: NetModel,
        A: PropertyAutomaton,
        E: StateEncoder<State = ProductState>,
        B: Budget,
    {
        let pos = self.cstack.len();
        self.cstack.push(CEntry { id, lowlink: pos });
        self.set_mark(id, Mark::OnStack(pos));
        if ctx.generator.is_accepting(&state) {
            self.astack.push(pos);
        }
        let mut pending = ctx.generator.successors(&state)?;
        pending.reverse();
        self.dstack.push(DEntry {
            pos,
            state,
            pending,
        });
        ctx.stats.observe_waiting(self.dstack.len());
        Ok(Progress::Continue)
    }

    fn pop<N, A, E, B>(&mut self, ctx: &mut SearchContext<N, A, E, B>) -> Result<Progress, Interrupt>
    where
        N: NetModel,
        A: PropertyAutomaton,
        E: StateEncoder<State = ProductState>,
        B: Budget,
    {
        let Some(entry) = self.dstack.pop() else {
            return Ok(Progress::Continue);
        };
        let p = entry.pos;
        ctx.stats.record_explored();
        ctx.stats.refresh_waiting(self.dstack.len());

        let root = self.cstack[p].lowlink == p;
        if root {
            while self.cstack.len() > p {
                if let Some(done) = self.cstack.pop() {
                    self.set_mark(done.id, Mark::Done);
                }
            }
        }
        if self.astack.last() == Some(&p) {
            self.astack.pop();
        }
        if !root && !self.dstack.is_empty() && self.update(p) {
            return Ok(Progress::Accepting(entry.state));
        }
        Ok(Progress::Continue)
    }

    /// 以边 `dstack.top -> to` 更新 lowlink, 返回是否闭合了接受环.
    fn update(&mut self, to: usize) -> bool {
        let Some(from) = self.dstack.last().map(|d| d.pos) else {
            return false;
        };
        let low_to = self.cstack[to].lowlink;
        if low_to <= self.cstack[from].lowlink {
            self.cstack[from].lowlink = low_to;
            return self.astack.last().is_some_and(|&a| to <= a);
        }
        false
    }
}
