//! 网与性质自动机的同步积.
//!
//! 积状态 `(M, q)` 表示自动机读完截至 `M` (含) 的所有标识的命题集合后停在 `q`.
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::buchi::LocationId;
use crate::net::Marking;

pub mod successor;

pub use successor::ProductSuccessorGenerator;

#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProductState {
    pub marking: Marking,
    pub location: LocationId,
}

impl ProductState {
    pub fn new(marking: Marking, location: LocationId) -> Self {
        Self { marking, location }
    }
}

impl fmt::Debug for ProductState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:?}, {})", self.marking, self.location)
    }
}
