use thiserror::Error;

use crate::buchi::ConditionError;
use crate::net::FireError;
use crate::ptrie::IndexError;

/// 终止本次运行的致命错误.
///
/// 资源耗尽 (含状态索引的分配失败) 不在此列: 它们是正常结果
/// [`Outcome::ResourceLimited`](super::Outcome::ResourceLimited).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CheckError {
    #[error("encoding invariant violated: {0}")]
    EncodingInvariantViolation(String),
    #[error("unsupported condition: {0}")]
    UnsupportedCondition(#[from] ConditionError),
    #[error("net model fault: {0}")]
    Net(#[from] FireError),
    #[error("state index fault: {0}")]
    Index(IndexError),
    #[error("the run was aborted by an earlier error")]
    Aborted,
}
