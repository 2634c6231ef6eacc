//! 资源预算: 驱动器在每个展开步之前询问一次, 超出即协作式停止.
use std::fmt;
use std::time::{Duration, Instant};

use log::debug;
use serde::{Deserialize, Serialize};

use super::stats::SearchStatistics;
use crate::util::mem_watcher;

/// 内存只每隔这么多步采样一次.
const MEMORY_SAMPLE_INTERVAL: u64 = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LimitReason {
    StateLimit,
    TimeLimit,
    MemoryLimit,
    /// 超过令牌上界的状态被截去, 状态空间不完整.
    TokenBound,
    /// 状态索引无法继续分配.
    AllocationFailure,
}

impl fmt::Display for LimitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            LimitReason::StateLimit => "state limit reached",
            LimitReason::TimeLimit => "time limit reached",
            LimitReason::MemoryLimit => "memory limit reached",
            LimitReason::TokenBound => "token bound exceeded",
            LimitReason::AllocationFailure => "state index allocation failed",
        };
        f.write_str(text)
    }
}

pub trait Budget {
    /// 搜索开始时调用一次.
    fn start(&mut self) {}

    fn exceeded(&mut self, stats: &SearchStatistics) -> Option<LimitReason>;
}

impl<F> Budget for F
where
    F: FnMut(&SearchStatistics) -> Option<LimitReason>,
{
    fn exceeded(&mut self, stats: &SearchStatistics) -> Option<LimitReason> {
        self(stats)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Unlimited;

impl Budget for Unlimited {
    fn exceeded(&mut self, _: &SearchStatistics) -> Option<LimitReason> {
        None
    }
}

/// 状态数、墙钟时间与常驻内存上限.
#[derive(Debug, Clone, Default)]
pub struct Limits {
    max_states: Option<usize>,
    time_limit: Option<Duration>,
    memory_limit_mb: Option<usize>,
    deadline: Option<Instant>,
    steps: u64,
}

impl Limits {
    pub fn new() -> Self {
        Self::default()
    }

    /// 已展开状态数达到 `max` 后停止.
    pub fn with_max_states(mut self, max: Option<usize>) -> Self {
        self.max_states = max;
        self
    }

    pub fn with_time_limit(mut self, limit: Option<Duration>) -> Self {
        self.time_limit = limit;
        self
    }

    pub fn with_memory_limit_mb(mut self, limit: Option<usize>) -> Self {
        self.memory_limit_mb = limit;
        self
    }
}

impl Budget for Limits {
    fn start(&mut self) {
        // 超出 `Instant` 表示范围的时限视为不限时
        self.deadline = self
            .time_limit
            .and_then(|limit| Instant::now().checked_add(limit));
        self.steps = 0;
    }

    fn exceeded(&mut self, stats: &SearchStatistics) -> Option<LimitReason> {
        self.steps += 1;
        if self.max_states.is_some_and(|max| stats.explored >= max) {
            return Some(LimitReason::StateLimit);
        }
        if self.deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            return Some(LimitReason::TimeLimit);
        }
        if let Some(limit) = self.memory_limit_mb {
            if self.steps % MEMORY_SAMPLE_INTERVAL == 0 {
                if let Some(mb) = mem_watcher::resident_megabytes() {
                    debug!("resident memory {mb} MB (limit {limit} MB)");
                    if mb >= limit {
                        return Some(LimitReason::MemoryLimit);
                    }
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_limit_counts_explored_states() {
        let mut limits = Limits::new().with_max_states(Some(2));
        limits.start();
        let mut stats = SearchStatistics::new();
        assert_eq!(limits.exceeded(&stats), None);
        stats.explored = 2;
        assert_eq!(limits.exceeded(&stats), Some(LimitReason::StateLimit));
    }

    #[test]
    fn zero_time_limit_expires_immediately() {
        let mut limits = Limits::new().with_time_limit(Some(Duration::ZERO));
        limits.start();
        assert_eq!(
            limits.exceeded(&SearchStatistics::new()),
            Some(LimitReason::TimeLimit)
        );
    }

    #[test]
    fn unrepresentable_deadline_means_no_deadline() {
        let mut limits = Limits::new().with_time_limit(Some(Duration::MAX));
        limits.start();
        assert_eq!(limits.exceeded(&SearchStatistics::new()), None);
    }

    #[test]
    fn closures_are_budgets() {
        let mut calls = 0;
        let mut budget = |_: &SearchStatistics| {
            calls += 1;
            (calls > 1).then_some(LimitReason::StateLimit)
        };
        assert_eq!(budget.exceeded(&SearchStatistics::new()), None);
        assert_eq!(
            budget.exceeded(&SearchStatistics::new()),
            Some(LimitReason::StateLimit)
        );
    }
}
