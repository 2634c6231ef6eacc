//! Büchi automaton is a type of ω-automaton, which extends
//! a finite automaton to infinite inputs.
//!
//! 这里的自动机以位置下标表示, 边上带命题守卫 [`Guard`]. 检查器只通过
//! [`PropertyAutomaton`] 使用它: 初始位置、接受判定以及在给定命题集合下的后继位置.
use std::fmt;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use thiserror::Error;

use crate::checker::SearchMode;
use crate::net::ids::define_id;
use crate::net::index_vec::{Idx, IndexVec};

pub mod guard;
pub mod labels;

pub use guard::{Guard, GuardParseError};
pub use labels::{AtomicProposition, Comparison, PropId, PropSet, PropositionTable};

define_id!(
    /// 自动机位置.
    LocationId
);

impl fmt::Display for LocationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "q{}", self.index())
    }
}

/// 性质自动机无法与网组合的原因.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConditionError {
    #[error("no property automaton was attached to the checker")]
    Missing,
    #[error("automaton has no locations")]
    Empty,
    #[error("initial location {0} does not exist")]
    InitialOutOfRange(LocationId),
    #[error("edge {from} -> {to} targets a missing location")]
    TargetOutOfRange { from: LocationId, to: LocationId },
    #[error("guard at {location} references unknown proposition {prop}")]
    UnknownProposition { location: LocationId, prop: PropId },
    #[error("proposition `{name}` ({prop}) refers to a place or transition outside the net")]
    PropositionOutsideNet { prop: PropId, name: String },
    #[error("guard `{guard}` does not parse: {source}")]
    Guard {
        guard: String,
        #[source]
        source: GuardParseError,
    },
    #[error("a {property} property is checked in {implied} mode, not {requested}")]
    ModeMismatch {
        property: &'static str,
        implied: SearchMode,
        requested: SearchMode,
    },
}

/// 性质一侧对模型检查核心的全部要求.
pub trait PropertyAutomaton {
    fn location_count(&self) -> usize;

    fn initial_location(&self) -> LocationId;

    fn is_accepting(&self, location: LocationId) -> bool;

    /// 从 `location` 出发、守卫在 `props` 下成立的所有目标位置.
    fn successors(&self, location: LocationId, props: &PropSet) -> SmallVec<[LocationId; 4]>;

    /// 能否与给定命题表组合; 在任何搜索开始前调用.
    fn validate(&self, _propositions: &PropositionTable) -> Result<(), ConditionError> {
        if self.location_count() == 0 {
            return Err(ConditionError::Empty);
        }
        if self.initial_location().index() >= self.location_count() {
            return Err(ConditionError::InitialOutOfRange(self.initial_location()));
        }
        Ok(())
    }
}

impl<A: PropertyAutomaton + ?Sized> PropertyAutomaton for &A {
    fn location_count(&self) -> usize {
        (**self).location_count()
    }

    fn initial_location(&self) -> LocationId {
        (**self).initial_location()
    }

    fn is_accepting(&self, location: LocationId) -> bool {
        (**self).is_accepting(location)
    }

    fn successors(&self, location: LocationId, props: &PropSet) -> SmallVec<[LocationId; 4]> {
        (**self).successors(location, props)
    }

    fn validate(&self, propositions: &PropositionTable) -> Result<(), ConditionError> {
        (**self).validate(propositions)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub guard: Guard,
    pub to: LocationId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub name: String,
    #[serde(default)]
    pub accepting: bool,
    #[serde(default)]
    pub edges: Vec<Edge>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuchiAutomaton {
    pub locations: IndexVec<LocationId, Location>,
    pub initial: LocationId,
}

impl BuchiAutomaton {
    pub fn new() -> Self {
        Self {
            locations: IndexVec::new(),
            initial: LocationId::new(0),
        }
    }

    pub fn add_location(&mut self, name: impl Into<String>, accepting: bool) -> LocationId {
        self.locations.push(Location {
            name: name.into(),
            accepting,
            edges: Vec::new(),
        })
    }

    pub fn add_edge(&mut self, from: LocationId, guard: Guard, to: LocationId) {
        self.locations[from].edges.push(Edge { guard, to });
    }

    /// 由 `(名称, 是否接受)` 列表与 `(源, 守卫, 目标)` 边表构造, 第一个位置为初始位置.
    pub fn from_labels(labels: &[(&str, bool)], edges: Vec<(usize, Guard, usize)>) -> Self {
        let mut automaton = Self::new();
        for (name, accepting) in labels {
            automaton.add_location(*name, *accepting);
        }
        for (from, guard, to) in edges {
            automaton.add_edge(LocationId::from_usize(from), guard, LocationId::from_usize(to));
        }
        automaton
    }

    /// `EF goal`: 到达满足 `goal` 的标识后进入吸收的接受位置.
    pub fn reachability(goal: Guard) -> Self {
        Self::from_labels(
            &[("search", false), ("found", true)],
            vec![
                (0, goal.clone().negate(), 0),
                (0, goal, 1),
                (1, Guard::True, 1),
            ],
        )
    }

    /// 坏状态可达即违反; 结构与 [`reachability`](Self::reachability) 相同, 由检查模式解释.
    pub fn safety(bad: Guard) -> Self {
        Self::reachability(bad)
    }

    /// `AG good`, 即 `safety(¬good)`.
    pub fn invariant(good: Guard) -> Self {
        Self::safety(good.negate())
    }

    /// `FG g`: 存在接受环当且仅当存在最终一直满足 `g` 的无穷运行.
    pub fn persistence(g: Guard) -> Self {
        Self::from_labels(
            &[("wait", false), ("stable", true)],
            vec![(0, Guard::True, 0), (0, g.clone(), 1), (1, g, 1)],
        )
    }

    /// `GF g`: 接受位置恰在读到满足 `g` 的标识后进入.
    pub fn recurrence(g: Guard) -> Self {
        let not_g = g.clone().negate();
        Self::from_labels(
            &[("idle", false), ("seen", true)],
            vec![
                (0, not_g.clone(), 0),
                (0, g.clone(), 1),
                (1, g, 1),
                (1, not_g, 0),
            ],
        )
    }

    pub fn accepting_locations(&self) -> impl Iterator<Item = LocationId> + '_ {
        self.locations
            .iter_enumerated()
            .filter(|(_, loc)| loc.accepting)
            .map(|(id, _)| id)
    }
}

impl Default for BuchiAutomaton {
    fn default() -> Self {
        Self::new()
    }
}

impl PropertyAutomaton for BuchiAutomaton {
    fn location_count(&self) -> usize {
        self.locations.len()
    }

    fn initial_location(&self) -> LocationId {
        self.initial
    }

    fn is_accepting(&self, location: LocationId) -> bool {
        self.locations.get(location).is_some_and(|loc| loc.accepting)
    }

    fn successors(&self, location: LocationId, props: &PropSet) -> SmallVec<[LocationId; 4]> {
        let mut out: SmallVec<[LocationId; 4]> = SmallVec::new();
        let Some(loc) = self.locations.get(location) else {
            return out;
        };
        for edge in &loc.edges {
            if edge.guard.eval(props) && !out.contains(&edge.to) {
                out.push(edge.to);
            }
        }
        out
    }

    fn validate(&self, table: &PropositionTable) -> Result<(), ConditionError> {
        if self.locations.is_empty() {
            return Err(ConditionError::Empty);
        }
        if !self.locations.contains_index(self.initial) {
            return Err(ConditionError::InitialOutOfRange(self.initial));
        }
        for (from, location) in self.locations.iter_enumerated() {
            for edge in &location.edges {
                if !self.locations.contains_index(edge.to) {
                    return Err(ConditionError::TargetOutOfRange { from, to: edge.to });
                }
                if let Some(prop) = edge
                    .guard
                    .props()
                    .into_iter()
                    .find(|p| p.index() >= table.len())
                {
                    return Err(ConditionError::UnknownProposition {
                        location: from,
                        prop,
                    });
                }
            }
        }
        Ok(())
    }
}

impl fmt::Display for BuchiAutomaton {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "init = {}", self.initial)?;
        for (id, loc) in self.locations.iter_enumerated() {
            let mark = if loc.accepting { " (accepting)" } else { "" };
            writeln!(f, "{id} {}{mark}", loc.name)?;
            for edge in &loc.edges {
                writeln!(f, "  --[{}]--> {}", edge.guard, edge.to)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn goal_table() -> (PropositionTable, PropId) {
        let mut table = PropositionTable::new();
        let goal = table.push("goal", AtomicProposition::Deadlock);
        (table, goal)
    }

    #[test]
    fn reachability_moves_on_goal() {
        let (table, goal) = goal_table();
        let automaton = BuchiAutomaton::reachability(Guard::Prop(goal));
        automaton.validate(&table).unwrap();

        let with_goal: PropSet = [goal].into_iter().collect();
        let init = automaton.initial_location();
        assert_eq!(automaton.successors(init, &PropSet::new()).as_slice(), &[init]);
        let next = automaton.successors(init, &with_goal);
        assert_eq!(next.len(), 1);
        assert!(automaton.is_accepting(next[0]));
        assert!(!automaton.is_accepting(init));
    }

    #[test]
    fn invariant_accepts_on_violation() {
        let (_, goal) = goal_table();
        let automaton = BuchiAutomaton::invariant(Guard::Prop(goal));
        let next = automaton.successors(automaton.initial_location(), &PropSet::new());
        assert!(next.iter().any(|&l| automaton.is_accepting(l)));
    }

    #[test]
    fn validate_reports_dangling_parts() {
        let (table, _) = goal_table();
        assert_eq!(BuchiAutomaton::new().validate(&table), Err(ConditionError::Empty));

        let dangling = BuchiAutomaton::from_labels(&[("a", false)], vec![(0, Guard::True, 3)]);
        assert!(matches!(
            dangling.validate(&table),
            Err(ConditionError::TargetOutOfRange { .. })
        ));

        let unknown =
            BuchiAutomaton::from_labels(&[("a", true)], vec![(0, Guard::Prop(PropId::new(5)), 0)]);
        assert!(matches!(
            unknown.validate(&table),
            Err(ConditionError::UnknownProposition { .. })
        ));
    }
}
