//! 输入、输出及扩展弧关系的邻接矩阵封装, 行按库所、列按迁移索引.
use std::fmt;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::net::ids::{PlaceId, TransitionId};
use crate::net::index_vec::{Idx, IndexVec};

type SmallRow<T> = SmallVec<[T; 4]>;

#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Incidence<T> {
    rows: IndexVec<PlaceId, SmallRow<T>>,
    cols: usize,
}

impl<T: Clone> Incidence<T> {
    pub fn new(places: usize, transitions: usize, default: T) -> Self {
        let mut rows = IndexVec::new();
        for _ in 0..places {
            rows.push(SmallRow::from_elem(default.clone(), transitions));
        }
        Self {
            rows,
            cols: transitions,
        }
    }

    pub fn push_place_with_default(&mut self, default: T) -> PlaceId {
        let mut row = SmallRow::new();
        row.resize(self.cols, default);
        self.rows.push(row)
    }

    pub fn push_transition_with_default(&mut self, default: T) -> TransitionId {
        let next = self.cols;
        for row in self.rows.iter_mut() {
            row.push(default.clone());
        }
        self.cols += 1;
        TransitionId::from_usize(next)
    }

    pub fn places(&self) -> usize {
        self.rows.len()
    }

    pub fn transitions(&self) -> usize {
        self.cols
    }

    pub fn set(&mut self, place: PlaceId, transition: TransitionId, value: T) {
        self.rows[place][transition.index()] = value;
    }

    pub fn get(&self, place: PlaceId, transition: TransitionId) -> &T {
        &self.rows[place][transition.index()]
    }

    /// Entries of one transition column, in place order.
    pub fn column(&self, transition: TransitionId) -> impl Iterator<Item = (PlaceId, &T)> {
        self.rows
            .iter_enumerated()
            .map(move |(place, row)| (place, &row[transition.index()]))
    }

    /// 行长度与列数一致, 反序列化外部文件后检查.
    pub fn is_well_formed(&self) -> bool {
        self.rows.iter().all(|row| row.len() == self.cols)
    }
}

impl<T: fmt::Debug> fmt::Debug for Incidence<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Incidence")
            .field("rows", &self.rows)
            .field("cols", &self.cols)
            .finish()
    }
}

#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IncidenceBool {
    rows: IndexVec<PlaceId, SmallRow<bool>>,
    cols: usize,
}

impl IncidenceBool {
    pub fn new(places: usize, transitions: usize) -> Self {
        let mut rows = IndexVec::new();
        for _ in 0..places {
            rows.push(SmallRow::from_elem(false, transitions));
        }
        Self {
            rows,
            cols: transitions,
        }
    }

    pub fn push_place(&mut self) -> PlaceId {
        self.rows.push(SmallRow::from_elem(false, self.cols))
    }

    pub fn push_transition(&mut self) -> TransitionId {
        let next = self.cols;
        for row in self.rows.iter_mut() {
            row.push(false);
        }
        self.cols += 1;
        TransitionId::from_usize(next)
    }

    pub fn get(&self, place: PlaceId, transition: TransitionId) -> bool {
        self.rows
            .get(place)
            .and_then(|row| row.get(transition.index()).copied())
            .unwrap_or(false)
    }

    pub fn set(&mut self, place: PlaceId, transition: TransitionId, value: bool) {
        self.rows[place][transition.index()] = value;
    }
}

impl fmt::Debug for IncidenceBool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IncidenceBool")
            .field("rows", &self.rows)
            .field("cols", &self.cols)
            .finish()
    }
}
