//! 各搜索算法共享的运行期数据: 后继生成器、编码器、预算、状态索引与统计.
use log::{trace, warn};

use super::budget::{Budget, LimitReason};
use super::error::CheckError;
use super::stats::SearchStatistics;
use super::Outcome;
use crate::buchi::PropertyAutomaton;
use crate::encoding::StateEncoder;
use crate::net::{FireError, NetModel, Weight};
use crate::product::{ProductState, ProductSuccessorGenerator};
use crate::ptrie::{EncodedKey, IndexError, Lookup, StateId, StateIndex};

/// 中断一次展开的原因.
#[derive(Debug)]
pub(crate) enum Interrupt {
    Limit(LimitReason),
    Fault(CheckError),
}

impl From<IndexError> for Interrupt {
    fn from(err: IndexError) -> Self {
        match err {
            IndexError::AllocationFailure { resource } => {
                warn!("state index cannot grow {resource}");
                Interrupt::Limit(LimitReason::AllocationFailure)
            }
            other => Interrupt::Fault(CheckError::Index(other)),
        }
    }
}

impl From<CheckError> for Interrupt {
    fn from(err: CheckError) -> Self {
        Interrupt::Fault(err)
    }
}

impl From<FireError> for Interrupt {
    fn from(err: FireError) -> Self {
        Interrupt::Fault(CheckError::Net(err))
    }
}

/// 一步搜索的结果.
#[derive(Debug)]
pub(crate) enum Progress {
    Continue,
    /// 接受条件成立, 附带触发它的状态.
    Accepting(ProductState),
    Exhausted,
}

pub(crate) struct SearchContext<N, A, E, B> {
    pub(crate) generator: ProductSuccessorGenerator<N, A>,
    pub(crate) encoder: E,
    pub(crate) budget: B,
    pub(crate) index: StateIndex,
    pub(crate) stats: SearchStatistics,
    pub(crate) token_bound: Option<Weight>,
    pub(crate) verify_encoding: bool,
    /// 有状态因令牌上界被截去.
    pub(crate) truncated: bool,
}

impl<N, A, E, B> SearchContext<N, A, E, B>
where
    N: NetModel,
    A: PropertyAutomaton,
    E: StateEncoder<State = ProductState>,
    B: Budget,
{
    pub(crate) fn check_budget(&mut self) -> Result<(), Interrupt> {
        match self.budget.exceeded(&self.stats) {
            Some(reason) => Err(Interrupt::Limit(reason)),
            None => Ok(()),
        }
    }

    /// 编码并登记状态; 超出令牌上界的状态被截去, 返回 `None`.
    pub(crate) fn discover(&mut self, state: &ProductState) -> Result<Option<Lookup>, Interrupt> {
        if let Some(bound) = self.token_bound {
            if state.marking.max_tokens() > bound {
                if !self.truncated {
                    warn!("token bound {bound} exceeded, state space is truncated");
                }
                self.truncated = true;
                return Ok(None);
            }
        }
        let key = self.encoder.encode(state);
        let lookup = self.index.insert_or_find(&key)?;
        if self.verify_encoding {
            self.verify(state, &key)?;
        }
        if !lookup.already_present {
            self.stats.record_discovered();
            trace!("discovered {} = {:?}", lookup.id, state);
        }
        Ok(Some(lookup))
    }

    /// 只查不插.
    pub(crate) fn find(&self, state: &ProductState) -> Result<Option<StateId>, Interrupt> {
        Ok(self.index.find(&self.encoder.encode(state))?)
    }

    /// 同一状态两次编码必须一致, 且键必须解码回该状态; 否则已访问集合不再可信.
    fn verify(&self, state: &ProductState, key: &EncodedKey) -> Result<(), CheckError> {
        if self.encoder.encode(state) != *key {
            return Err(CheckError::EncodingInvariantViolation(format!(
                "encoding of {state:?} is not stable"
            )));
        }
        match self.encoder.decode(key) {
            Some(decoded) if decoded == *state => Ok(()),
            Some(other) => Err(CheckError::EncodingInvariantViolation(format!(
                "{state:?} and {other:?} share the key {key:?}"
            ))),
            None => Err(CheckError::EncodingInvariantViolation(format!(
                "key {key:?} of {state:?} does not decode"
            ))),
        }
    }

    pub(crate) fn exhausted(&self) -> Outcome {
        if self.truncated {
            Outcome::ResourceLimited(LimitReason::TokenBound)
        } else {
            Outcome::Exhausted
        }
    }
}
