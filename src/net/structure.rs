//! P/T 网静态结构元素: 库所、迁移与标识.
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::net::ids::PlaceId;
use crate::net::index_vec::IndexVec;

pub type Weight = u64;

#[derive(Clone, Serialize, Deserialize, PartialEq, Eq, Hash, Debug)]
pub struct Place {
    pub name: String,
    pub tokens: Weight,
    /// `None` 表示无容量上限.
    #[serde(default)]
    pub capacity: Option<Weight>,
}

impl Place {
    pub fn new(name: impl Into<String>, tokens: Weight) -> Self {
        Self {
            name: name.into(),
            tokens,
            capacity: None,
        }
    }

    pub fn new_with_tokens_and_capacity(
        name: impl Into<String>,
        tokens: Weight,
        capacity: Weight,
    ) -> Self {
        Self {
            name: name.into(),
            tokens,
            capacity: Some(capacity),
        }
    }
}

#[derive(Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Transition {
    pub name: String,
}

impl Transition {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl fmt::Debug for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Transition").field(&self.name).finish()
    }
}

/// 标识 `M ∈ ℕ^{|P|}`.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Marking(pub IndexVec<PlaceId, Weight>);

impl Marking {
    pub fn new(initial: IndexVec<PlaceId, Weight>) -> Self {
        Self(initial)
    }

    pub fn from_tokens(tokens: impl IntoIterator<Item = Weight>) -> Self {
        Self(IndexVec::from_vec(tokens.into_iter().collect()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (PlaceId, &Weight)> {
        self.0.iter_enumerated()
    }

    pub fn tokens(&self, place: PlaceId) -> Weight {
        self.0[place]
    }

    pub fn tokens_mut(&mut self, place: PlaceId) -> &mut Weight {
        &mut self.0[place]
    }

    pub fn as_slice(&self) -> &[Weight] {
        self.0.as_slice()
    }

    pub fn max_tokens(&self) -> Weight {
        self.0.iter().copied().max().unwrap_or(0)
    }
}

impl fmt::Debug for Marking {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (place, tokens) in self.iter() {
            if *tokens > 0 {
                map.entry(&place, tokens);
            }
        }
        map.finish()
    }
}
