//! 嵌套深度优先搜索.
//!
//! 蓝色搜索在后序离开一个接受状态时, 从它出发启动红色搜索; 红色搜索碰到仍在蓝色栈上的
//! 状态即找到一个经过该接受状态的环. 红色标记在各次红色搜索之间保留.
use super::budget::Budget;
use super::context::{Interrupt, Progress, SearchContext};
use crate::buchi::PropertyAutomaton;
use crate::encoding::StateEncoder;
use crate::net::NetModel;
use crate::net::index_vec::Idx;
use crate::product::ProductState;
use crate::ptrie::StateId;

#[derive(Debug)]
struct BlueFrame {
    id: StateId,
    state: ProductState,
    pending: Vec<ProductState>,
    /// 已为此状态启动过红色搜索.
    red_started: bool,
}

#[derive(Debug, Default)]
pub(crate) struct NestedSearch {
    roots: Vec<(StateId, ProductState)>,
    blue: Vec<BlueFrame>,
    red: Vec<Vec<ProductState>>,
    visited: Vec<bool>,
    on_blue: Vec<bool>,
    red_seen: Vec<bool>,
}

fn flag(flags: &[bool], id: StateId) -> bool {
    flags.get(id.index()).copied().unwrap_or(false)
}

fn set_flag(flags: &mut Vec<bool>, id: StateId, value: bool) {
    let i = id.index();
    if flags.len() <= i {
        flags.resize(i + 1, false);
    }
    flags[i] = value;
}

impl NestedSearch {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn waiting(&self) -> usize {
        self.blue.len()
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
        if !self.red.is_empty() {
            ctx.check_budget()?;
            return self.red_step(ctx);
        }
        if self.blue.is_empty() {
            while let Some((id, state)) = self.roots.pop() {
                if !flag(&self.visited, id) {
                    ctx.check_budget()?;
                    return self.push_blue(ctx, id, state);
                }
            }
            return Ok(Progress::Exhausted);
        }
        ctx.check_budget()?;
        self.blue_step(ctx)
    }

    fn blue_step<N, A, E, B>(
        &mut self,
        ctx: &mut SearchContext<N, A, E, B>,
    ) -> Result<Progress, Interrupt>
    where
        N: NetModel,
        A: PropertyAutomaton,
        E: StateEncoder<State = ProductState>,
        B: Budget,
    {
        let Some(top) = self.blue.last_mut() else {
            return Ok(Progress::Exhausted);
        };
        if let Some(successor) = top.pending.pop() {
            if let Some(lookup) = ctx.discover(&successor)? {
                if !flag(&self.visited, lookup.id) {
                    return self.push_blue(ctx, lookup.id, successor);
                }
            }
            return Ok(Progress::Continue);
        }

        if !top.red_started && ctx.generator.is_accepting(&top.state) {
            top.red_started = true;
            let seed = top.id;
            let mut pending = ctx.generator.successors(&top.state)?;
            pending.reverse();
            set_flag(&mut self.red_seen, seed, true);
            self.red.push(pending);
            return Ok(Progress::Continue);
        }

        if let Some(frame) = self.blue.pop() {
            set_flag(&mut self.on_blue, frame.id, false);
            ctx.stats.record_explored();
            ctx.stats.refresh_waiting(self.blue.len());
        }
        Ok(Progress::Continue)
    }

    fn red_step<N, A, E, B>(
        &mut self,
        ctx: &mut SearchContext<N, A, E, B>,
    ) -> Result<Progress, Interrupt>
    where
        N: NetModel,
        A: PropertyAutomaton,
        E: StateEncoder<State = ProductState>,
        B: Budget,
    {
        let Some(top) = self.red.last_mut() else {
            return Ok(Progress::Continue);
        };
        let Some(successor) = top.pop() else {
            self.red.pop();
            return Ok(Progress::Continue);
        };
        // 蓝色搜索已登记过红色搜索可达的全部状态, 找不到的是被令牌上界截去的.
        let Some(id) = ctx.find(&successor)? else {
            return Ok(Progress::Continue);
        };
        if flag(&self.on_blue, id) {
            return Ok(Progress::Accepting(successor));
        }
        if !flag(&self.red_seen, id) {
            set_flag(&mut self.red_seen, id, true);
            let mut pending = ctx.generator.successors(&successor)?;
            pending.reverse();
            self.red.push(pending);
        }
        Ok(Progress::Continue)
    }

    fn push_blue<N, A, E, B>(
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
        set_flag(&mut self.visited, id, true);
        set_flag(&mut self.on_blue, id, true);
        let mut pending = ctx.generator.successors(&state)?;
        pending.reverse();
        self.blue.push(BlueFrame {
            id,
            state,
            pending,
            red_started: false,
        });
        ctx.stats.observe_waiting(self.blue.len());
        Ok(Progress::Continue)
    }
}
