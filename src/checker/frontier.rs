//! 等待队列. 插入顺序决定搜索策略.
use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// 先进先出, 广度优先.
    #[default]
    Bfs,
    /// 后进先出, 深度优先.
    Dfs,
    /// 深度优先, 同一次展开产生的后继先随机打乱.
    Rdfs,
}

impl FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "bfs" => Ok(Strategy::Bfs),
            "dfs" => Ok(Strategy::Dfs),
            "rdfs" => Ok(Strategy::Rdfs),
            other => Err(format!("unknown search strategy `{other}`")),
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Strategy::Bfs => "bfs",
            Strategy::Dfs => "dfs",
            Strategy::Rdfs => "rdfs",
        })
    }
}

pub struct Frontier<T> {
    strategy: Strategy,
    items: VecDeque<T>,
    rng: StdRng,
}

impl<T> Frontier<T> {
    pub fn new(strategy: Strategy, seed: u64) -> Self {
        Self {
            strategy,
            items: VecDeque::new(),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn push(&mut self, item: T) {
        self.items.push_back(item);
    }

    /// 压入一次展开产生的全部新状态.
    pub fn push_batch(&mut self, mut batch: Vec<T>) {
        if self.strategy == Strategy::Rdfs {
            batch.shuffle(&mut self.rng);
        }
        self.items.extend(batch);
    }

    pub fn pop(&mut self) -> Option<T> {
        match self.strategy {
            Strategy::Bfs => self.items.pop_front(),
            Strategy::Dfs | Strategy::Rdfs => self.items.pop_back(),
        }
    }
}

impl<T> fmt::Debug for Frontier<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frontier")
            .field("strategy", &self.strategy)
            .field("len", &self.items.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(mut frontier: Frontier<u32>) -> Vec<u32> {
        std::iter::from_fn(|| frontier.pop()).collect()
    }

    #[test]
    fn bfs_is_fifo_and_dfs_is_lifo() {
        let mut bfs = Frontier::new(Strategy::Bfs, 0);
        let mut dfs = Frontier::new(Strategy::Dfs, 0);
        bfs.push_batch(vec![1, 2, 3]);
        dfs.push_batch(vec![1, 2, 3]);
        assert_eq!(drain(bfs), vec![1, 2, 3]);
        assert_eq!(drain(dfs), vec![3, 2, 1]);
    }

    #[test]
    fn rdfs_is_reproducible_for_a_seed() {
        let run = |seed| {
            let mut frontier = Frontier::new(Strategy::Rdfs, seed);
            frontier.push_batch((0..32).collect());
            drain(frontier)
        };
        assert_eq!(run(7), run(7));
        let mut sorted = run(7);
        sorted.sort();
        assert_eq!(sorted, (0..32).collect::<Vec<_>>());
    }

    #[test]
    fn strategy_parses_case_insensitively() {
        assert_eq!("RDFS".parse::<Strategy>(), Ok(Strategy::Rdfs));
        assert!("astar".parse::<Strategy>().is_err());
    }
}
