//! 原子命题及其在标识上的求值.
use std::fmt;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use super::ConditionError;
use crate::net::ids::define_id;
use crate::net::index_vec::{Idx, IndexVec};
use crate::net::{Marking, NetModel, PlaceId, TransitionId, Weight};

define_id!(
    /// 命题表中的下标.
    PropId
);

impl fmt::Display for PropId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "a{}", self.index())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Comparison {
    Lt,
    Le,
    Eq,
    Ne,
    Ge,
    Gt,
}

impl Comparison {
    pub fn holds(self, lhs: Weight, rhs: Weight) -> bool {
        match self {
            Comparison::Lt => lhs < rhs,
            Comparison::Le => lhs <= rhs,
            Comparison::Eq => lhs == rhs,
            Comparison::Ne => lhs != rhs,
            Comparison::Ge => lhs >= rhs,
            Comparison::Gt => lhs > rhs,
        }
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            Comparison::Lt => "<",
            Comparison::Le => "≤",
            Comparison::Eq => "=",
            Comparison::Ne => "≠",
            Comparison::Ge => "≥",
            Comparison::Gt => ">",
        };
        f.write_str(symbol)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AtomicProposition {
    /// `M[place] cmp value`
    Tokens {
        place: PlaceId,
        cmp: Comparison,
        value: Weight,
    },
    /// `Σ M[p] cmp value`
    TokenSum {
        places: Vec<PlaceId>,
        cmp: Comparison,
        value: Weight,
    },
    Fireable(TransitionId),
    Deadlock,
}

impl AtomicProposition {
    fn needs_enabled(&self) -> bool {
        matches!(
            self,
            AtomicProposition::Fireable(_) | AtomicProposition::Deadlock
        )
    }

    fn evaluate(&self, marking: &Marking, enabled: &[TransitionId]) -> bool {
        let tokens = |place: &PlaceId| marking.0.get(*place).copied().unwrap_or(0);
        match self {
            AtomicProposition::Tokens { place, cmp, value } => cmp.holds(tokens(place), *value),
            AtomicProposition::TokenSum { places, cmp, value } => {
                let sum = places
                    .iter()
                    .fold(0 as Weight, |acc, p| acc.saturating_add(tokens(p)));
                cmp.holds(sum, *value)
            }
            AtomicProposition::Fireable(transition) => enabled.contains(transition),
            AtomicProposition::Deadlock => enabled.is_empty(),
        }
    }
}

impl fmt::Display for AtomicProposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AtomicProposition::Tokens { place, cmp, value } => write!(f, "{place} {cmp} {value}"),
            AtomicProposition::TokenSum { places, cmp, value } => {
                let terms: Vec<String> = places.iter().map(|p| p.to_string()).collect();
                write!(f, "({}) {cmp} {value}", terms.join(" + "))
            }
            AtomicProposition::Fireable(t) => write!(f, "fireable({t})"),
            AtomicProposition::Deadlock => write!(f, "deadlock"),
        }
    }
}

/// 一个标识上成立的命题集合.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct PropSet {
    words: SmallVec<[u64; 2]>,
}

impl PropSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, prop: PropId) {
        let (word, bit) = (prop.index() / 64, prop.index() % 64);
        if self.words.len() <= word {
            self.words.resize(word + 1, 0);
        }
        self.words[word] |= 1 << bit;
    }

    pub fn contains(&self, prop: PropId) -> bool {
        let (word, bit) = (prop.index() / 64, prop.index() % 64);
        self.words.get(word).is_some_and(|w| w & (1 << bit) != 0)
    }

    pub fn iter(&self) -> impl Iterator<Item = PropId> + '_ {
        self.words.iter().enumerate().flat_map(|(w, &word)| {
            (0..64)
                .filter(move |bit| word & (1 << bit) != 0)
                .map(move |bit| PropId::from_usize(w * 64 + bit))
        })
    }

    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|w| *w == 0)
    }
}

impl FromIterator<PropId> for PropSet {
    fn from_iter<I: IntoIterator<Item = PropId>>(iter: I) -> Self {
        let mut set = PropSet::new();
        for prop in iter {
            set.insert(prop);
        }
        set
    }
}

impl fmt::Debug for PropSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedProposition {
    pub name: String,
    pub prop: AtomicProposition,
}

/// 具名原子命题表, 为每个标识计算 [`PropSet`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PropositionTable {
    props: IndexVec<PropId, NamedProposition>,
}

impl PropositionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: impl Into<String>, prop: AtomicProposition) -> PropId {
        self.props.push(NamedProposition {
            name: name.into(),
            prop,
        })
    }

    pub fn len(&self) -> usize {
        self.props.len()
    }

    pub fn is_empty(&self) -> bool {
        self.props.is_empty()
    }

    pub fn get(&self, id: PropId) -> Option<&NamedProposition> {
        self.props.get(id)
    }

    pub fn by_name(&self, name: &str) -> Option<PropId> {
        self.props
            .iter_enumerated()
            .find(|(_, named)| named.name == name)
            .map(|(id, _)| id)
    }

    /// 命题中引用的库所与迁移必须存在于网中.
    pub fn validate<N: NetModel>(&self, net: &N) -> Result<(), ConditionError> {
        for (id, named) in self.props.iter_enumerated() {
            let in_net = match &named.prop {
                AtomicProposition::Tokens { place, .. } => place.index() < net.places_len(),
                AtomicProposition::TokenSum { places, .. } => {
                    places.iter().all(|p| p.index() < net.places_len())
                }
                AtomicProposition::Fireable(t) => t.index() < net.transitions_len(),
                AtomicProposition::Deadlock => true,
            };
            if !in_net {
                return Err(ConditionError::PropositionOutsideNet {
                    prop: id,
                    name: named.name.clone(),
                });
            }
        }
        Ok(())
    }

    pub fn evaluate<N: NetModel>(&self, net: &N, marking: &Marking) -> PropSet {
        let enabled = if self.props.iter().any(|named| named.prop.needs_enabled()) {
            net.enabled_transitions(marking)
        } else {
            Vec::new()
        };
        self.props
            .iter_enumerated()
            .filter(|(_, named)| named.prop.evaluate(marking, &enabled))
            .map(|(id, _)| id)
            .collect()
    }
}
