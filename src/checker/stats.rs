use std::fmt;

use serde::Serialize;

/// 搜索进度计数, 只由驱动器更新.
///
/// `explored` 与 `discovered` 单调不减; 任何时刻 `peak_waiting >= end_waiting`,
/// 且 `discovered >= explored`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SearchStatistics {
    /// 已完全展开的状态数.
    pub explored: usize,
    /// 生成过的不同状态数, 含尚未展开的.
    pub discovered: usize,
    /// 最近一次出队时的等待队列长度, 运行结束即为终止时的长度.
    pub end_waiting: usize,
    /// 观察到的最大等待队列长度.
    pub peak_waiting: usize,
}

impl SearchStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_explored(&mut self) {
        self.explored += 1;
    }

    pub(crate) fn record_discovered(&mut self) {
        self.discovered += 1;
    }

    /// 出队时调用.
    pub(crate) fn refresh_waiting(&mut self, waiting: usize) {
        self.end_waiting = waiting;
        self.observe_waiting(waiting);
    }

    pub(crate) fn observe_waiting(&mut self, waiting: usize) {
        self.peak_waiting = self.peak_waiting.max(waiting);
    }

    pub(crate) fn finish(&mut self, waiting: usize) {
        self.refresh_waiting(waiting);
    }
}

impl fmt::Display for SearchStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "discovered states: {}", self.discovered)?;
        writeln!(f, "explored states:   {}", self.explored)?;
        writeln!(f, "end waiting:       {}", self.end_waiting)?;
        write!(f, "peak waiting:      {}", self.peak_waiting)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn peak_is_a_running_maximum() {
        let mut stats = SearchStatistics::new();
        stats.observe_waiting(3);
        stats.refresh_waiting(5);
        stats.refresh_waiting(1);
        assert_eq!(stats.end_waiting, 1);
        assert_eq!(stats.peak_waiting, 5);
        assert!(stats.peak_waiting >= stats.end_waiting);
    }
}
