use log::trace;
use smallvec::SmallVec;

use super::ProductState;
use crate::buchi::{ConditionError, PropSet, PropertyAutomaton, PropositionTable};
use crate::net::{FireError, Marking, NetModel};

/// 即时构造积的后继.
///
/// 只读地持有网、命题表与自动机, 对不同输入状态的调用互不影响.
#[derive(Debug, Clone)]
pub struct ProductSuccessorGenerator<N, A> {
    net: N,
    propositions: PropositionTable,
    automaton: A,
}

impl<N: NetModel, A: PropertyAutomaton> ProductSuccessorGenerator<N, A> {
    /// 组合前校验命题与自动机, 无法组合时在搜索开始前报错.
    pub fn new(
        net: N,
        propositions: PropositionTable,
        automaton: A,
    ) -> Result<Self, ConditionError> {
        propositions.validate(&net)?;
        automaton.validate(&propositions)?;
        Ok(Self {
            net,
            propositions,
            automaton,
        })
    }

    pub fn net(&self) -> &N {
        &self.net
    }

    pub fn automaton(&self) -> &A {
        &self.automaton
    }

    pub fn propositions(&self) -> &PropositionTable {
        &self.propositions
    }

    pub fn label(&self, marking: &Marking) -> PropSet {
        self.propositions.evaluate(&self.net, marking)
    }

    pub fn is_accepting(&self, state: &ProductState) -> bool {
        self.automaton.is_accepting(state.location)
    }

    /// `(M0, q')`, 其中 `q_init --g--> q'` 且 `g` 在 `M0` 上成立.
    pub fn initial_states(&self) -> Vec<ProductState> {
        let marking = self.net.initial_marking();
        let props = self.label(&marking);
        self.automaton
            .successors(self.automaton.initial_location(), &props)
            .into_iter()
            .map(|location| ProductState::new(marking.clone(), location))
            .collect()
    }

    /// 发生一个可发生迁移 (死锁时原地停留), 再按新标识的命题推进自动机.
    pub fn successors(&self, state: &ProductState) -> Result<Vec<ProductState>, FireError> {
        let enabled = self.net.enabled_transitions(&state.marking);
        let mut markings: SmallVec<[Marking; 4]> = SmallVec::new();
        if enabled.is_empty() {
            markings.push(state.marking.clone());
        } else {
            for transition in enabled {
                markings.push(self.net.fire_transition(&state.marking, transition)?);
            }
        }

        let mut out = Vec::with_capacity(markings.len());
        for marking in markings {
            let props = self.label(&marking);
            let targets = self.automaton.successors(state.location, &props);
            if targets.is_empty() {
                trace!("{:?}: automaton blocks at {}", marking, state.location);
                continue;
            }
            let mut targets = targets.into_iter().peekable();
            while let Some(location) = targets.next() {
                if targets.peek().is_some() {
                    out.push(ProductState::new(marking.clone(), location));
                } else {
                    out.push(ProductState::new(marking, location));
                    break;
                }
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buchi::{AtomicProposition, BuchiAutomaton, Comparison, Guard, LocationId};
    use crate::net::{Net, Place, PlaceId, Transition};

    fn two_step_net() -> (Net, PlaceId) {
        let mut net = Net::empty();
        let p0 = net.add_place(Place::new("p0", 1));
        let p1 = net.add_place(Place::new("p1", 0));
        let t = net.add_transition(Transition::new("t"));
        net.set_input_weight(p0, t, 1);
        net.set_output_weight(p1, t, 1);
        (net, p1)
    }

    fn goal_props(p1: PlaceId) -> PropositionTable {
        let mut table = PropositionTable::new();
        table.push(
            "done",
            AtomicProposition::Tokens { place: p1, cmp: Comparison::Ge, value: 1 },
        );
        table
    }

    #[test]
    fn guard_is_read_on_the_successor_marking() {
        let (net, p1) = two_step_net();
        let table = goal_props(p1);
        let goal = Guard::Prop(table.by_name("done").unwrap());
        let generator =
            ProductSuccessorGenerator::new(&net, table, BuchiAutomaton::reachability(goal)).unwrap();

        let init = generator.initial_states();
        assert_eq!(init.len(), 1);
        assert!(!generator.is_accepting(&init[0]));

        let next = generator.successors(&init[0]).unwrap();
        assert_eq!(next.len(), 1);
        assert_eq!(next[0].marking.tokens(p1), 1);
        assert!(generator.is_accepting(&next[0]));
    }

    #[test]
    fn deadlock_stutters() {
        let (net, p1) = two_step_net();
        let generator = ProductSuccessorGenerator::new(
            &net,
            goal_props(p1),
            BuchiAutomaton::from_labels(&[("loop", false)], vec![(0, Guard::True, 0)]),
        )
        .unwrap();
        let dead = ProductState::new(Marking::from_tokens([0, 1]), LocationId::new(0));
        let next = generator.successors(&dead).unwrap();
        assert_eq!(next, vec![dead]);
    }

    #[test]
    fn blocked_automaton_yields_nothing() {
        let (net, p1) = two_step_net();
        let generator = ProductSuccessorGenerator::new(
            &net,
            goal_props(p1),
            BuchiAutomaton::from_labels(&[("stuck", false)], vec![]),
        )
        .unwrap();
        assert!(generator.initial_states().is_empty());
        let state = ProductState::new(net.initial_marking(), LocationId::new(0));
        assert!(generator.successors(&state).unwrap().is_empty());
    }

    #[test]
    fn empty_automaton_is_unsupported() {
        let (net, p1) = two_step_net();
        assert_eq!(
            ProductSuccessorGenerator::new(&net, goal_props(p1), BuchiAutomaton::new()).err(),
            Some(ConditionError::Empty)
        );
    }
}
