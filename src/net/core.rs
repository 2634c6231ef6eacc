//! 运行时: 可发生集与发生语义定义.
use std::fmt;

use thiserror::Error;

use crate::net::ids::{PlaceId, TransitionId};
use crate::net::incidence::Incidence;
#[cfg(any(feature = "inhibitor", feature = "reset"))]
use crate::net::incidence::IncidenceBool;
use crate::net::index_vec::{Idx, IndexVec};
use crate::net::structure::{Marking, Place, Transition, Weight};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FireError {
    #[error("transition {0:?} is out of bounds")]
    OutOfBounds(TransitionId),
    #[error("transition {0:?} is not enabled under the supplied marking")]
    NotEnabled(TransitionId),
    #[error("capacity exceeded at place {place:?}: {after} > {capacity}")]
    Capacity {
        place: PlaceId,
        after: Weight,
        capacity: Weight,
    },
    #[error("token count overflow at place {place:?} firing {transition:?}")]
    TokenOverflow {
        place: PlaceId,
        transition: TransitionId,
    },
    #[error("marking has {found} places but the net has {expected}")]
    MarkingShape { expected: usize, found: usize },
}

/// 模型检查核心对网模型的全部要求: 初始标识、可发生集枚举与单步发生.
///
/// 检查器只通过该 trait 访问网, 从不查看其内部编码.
pub trait NetModel {
    fn places_len(&self) -> usize;

    fn transitions_len(&self) -> usize;

    fn initial_marking(&self) -> Marking;

    fn enabled_transitions(&self, marking: &Marking) -> Vec<TransitionId>;

    fn fire_transition(
        &self,
        marking: &Marking,
        transition: TransitionId,
    ) -> Result<Marking, FireError>;

    fn is_transition_enabled(&self, transition: TransitionId, marking: &Marking) -> bool {
        self.enabled_transitions(marking).contains(&transition)
    }
}

impl<N: NetModel + ?Sized> NetModel for &N {
    fn places_len(&self) -> usize {
        (**self).places_len()
    }

    fn transitions_len(&self) -> usize {
        (**self).transitions_len()
    }

    fn initial_marking(&self) -> Marking {
        (**self).initial_marking()
    }

    fn enabled_transitions(&self, marking: &Marking) -> Vec<TransitionId> {
        (**self).enabled_transitions(marking)
    }

    fn fire_transition(
        &self,
        marking: &Marking,
        transition: TransitionId,
    ) -> Result<Marking, FireError> {
        (**self).fire_transition(marking, transition)
    }

    fn is_transition_enabled(&self, transition: TransitionId, marking: &Marking) -> bool {
        (**self).is_transition_enabled(transition, marking)
    }
}

#[derive(Clone, serde::Serialize, serde::Deserialize)]
pub struct Net {
    pub places: IndexVec<PlaceId, Place>,
    pub transitions: IndexVec<TransitionId, Transition>,
    pub pre: Incidence<Weight>,
    pub post: Incidence<Weight>,
    #[cfg(feature = "inhibitor")]
    #[serde(default)]
    pub inhibitor: Option<IncidenceBool>,
    #[cfg(feature = "reset")]
    #[serde(default)]
    pub reset: Option<IncidenceBool>,
}

impl fmt::Debug for Net {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Net")
            .field("places", &self.places)
            .field("transitions", &self.transitions)
            .field("pre", &self.pre)
            .field("post", &self.post)
            .finish()
    }
}

impl Net {
    pub fn empty() -> Self {
        Self {
            places: IndexVec::new(),
            transitions: IndexVec::new(),
            pre: Incidence::new(0, 0, 0),
            post: Incidence::new(0, 0, 0),
            #[cfg(feature = "inhibitor")]
            inhibitor: None,
            #[cfg(feature = "reset")]
            reset: None,
        }
    }

    pub fn add_place(&mut self, place: Place) -> PlaceId {
        let place_id = self.places.push(place);
        self.pre.push_place_with_default(0);
        self.post.push_place_with_default(0);
        #[cfg(feature = "inhibitor")]
        if let Some(inhibitor) = self.inhibitor.as_mut() {
            inhibitor.push_place();
        }
        #[cfg(feature = "reset")]
        if let Some(reset) = self.reset.as_mut() {
            reset.push_place();
        }
        place_id
    }

    pub fn add_transition(&mut self, transition: Transition) -> TransitionId {
        let transition_id = self.transitions.push(transition);
        self.pre.push_transition_with_default(0);
        self.post.push_transition_with_default(0);
        #[cfg(feature = "inhibitor")]
        if let Some(inhibitor) = self.inhibitor.as_mut() {
            inhibitor.push_transition();
        }
        #[cfg(feature = "reset")]
        if let Some(reset) = self.reset.as_mut() {
            reset.push_transition();
        }
        transition_id
    }

    pub fn set_input_weight(&mut self, place: PlaceId, transition: TransitionId, weight: Weight) {
        self.pre.set(place, transition, weight);
    }

    pub fn set_output_weight(&mut self, place: PlaceId, transition: TransitionId, weight: Weight) {
        self.post.set(place, transition, weight);
    }

    #[cfg(feature = "inhibitor")]
    pub fn set_inhibitor_arc(&mut self, place: PlaceId, transition: TransitionId, value: bool) {
        let (places, transitions) = (self.pre.places(), self.pre.transitions());
        self.inhibitor
            .get_or_insert_with(|| IncidenceBool::new(places, transitions))
            .set(place, transition, value);
    }

    #[cfg(feature = "reset")]
    pub fn set_reset_arc(&mut self, place: PlaceId, transition: TransitionId, value: bool) {
        let (places, transitions) = (self.pre.places(), self.pre.transitions());
        self.reset
            .get_or_insert_with(|| IncidenceBool::new(places, transitions))
            .set(place, transition, value);
    }

    /// 反序列化得到的网必须满足矩阵维度与库所/迁移数量一致.
    pub fn is_well_formed(&self) -> bool {
        let shape = |m: &Incidence<Weight>| {
            m.is_well_formed()
                && m.places() == self.places.len()
                && m.transitions() == self.transitions.len()
        };
        shape(&self.pre) && shape(&self.post)
    }

    #[cfg(feature = "inhibitor")]
    fn is_inhibitor_arc(&self, place: PlaceId, transition: TransitionId) -> bool {
        self.inhibitor
            .as_ref()
            .is_some_and(|matrix| matrix.get(place, transition))
    }

    #[cfg(not(feature = "inhibitor"))]
    fn is_inhibitor_arc(&self, _place: PlaceId, _transition: TransitionId) -> bool {
        false
    }
}

impl Default for Net {
    fn default() -> Self {
        Self::empty()
    }
}

impl NetModel for Net {
    fn places_len(&self) -> usize {
        self.places.len()
    }

    fn transitions_len(&self) -> usize {
        self.transitions.len()
    }

    fn initial_marking(&self) -> Marking {
        Marking::from_tokens(self.places.iter().map(|p| p.tokens))
    }

    fn enabled_transitions(&self, marking: &Marking) -> Vec<TransitionId> {
        self.transitions
            .indices()
            .filter(|&transition| self.is_transition_enabled(transition, marking))
            .collect()
    }

    fn fire_transition(
        &self,
        marking: &Marking,
        transition: TransitionId,
    ) -> Result<Marking, FireError> {
        if transition.index() >= self.transitions.len() {
            return Err(FireError::OutOfBounds(transition));
        }
        if marking.len() != self.places.len() {
            return Err(FireError::MarkingShape {
                expected: self.places.len(),
                found: marking.len(),
            });
        }
        if !self.is_transition_enabled(transition, marking) {
            return Err(FireError::NotEnabled(transition));
        }

        let mut next = marking.clone();

        for (place, &weight) in self.pre.column(transition) {
            if weight == 0 || self.is_inhibitor_arc(place, transition) {
                continue;
            }
            let tokens = next.tokens_mut(place);
            // 可发生已保证 tokens >= weight; checked_sub 守住非负性.
            *tokens = tokens
                .checked_sub(weight)
                .ok_or(FireError::NotEnabled(transition))?;
        }

        #[cfg(feature = "reset")]
        if let Some(reset) = self.reset.as_ref() {
            for place in self.places.indices() {
                if reset.get(place, transition) {
                    *next.tokens_mut(place) = 0;
                }
            }
        }

        for (place, &weight) in self.post.column(transition) {
            if weight == 0 {
                continue;
            }
            let tokens = next.tokens_mut(place);
            let after = tokens
                .checked_add(weight)
                .ok_or(FireError::TokenOverflow { place, transition })?;
            if let Some(capacity) = self.places[place].capacity {
                if after > capacity {
                    return Err(FireError::Capacity {
                        place,
                        after,
                        capacity,
                    });
                }
            }
            *tokens = after;
        }

        Ok(next)
    }

    fn is_transition_enabled(&self, transition: TransitionId, marking: &Marking) -> bool {
        if transition.index() >= self.transitions.len() || marking.len() != self.places.len() {
            return false;
        }
        self.pre.column(transition).all(|(place, &weight)| {
            if self.is_inhibitor_arc(place, transition) {
                marking.tokens(place) < weight
            } else {
                marking.tokens(place) >= weight
            }
        })
    }
}
