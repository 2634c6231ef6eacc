//! # 状态索引（路径压缩比特字典树）
//!
//! 模型检查的已访问集合. 键是任意长度的比特序列 [`EncodedKey`]; 插入即查找,
//! 每个不同的键恰好报告一次"新状态". 结构要点:
//!
//! * 节点仅为数据, 存放在 [`StateIndex`] 拥有的连续数组中, 以 [`NodeId`] 相互引用;
//! * 键的未分叉后缀 (余部) 放入去重池, 条目以句柄加偏移引用, 多个条目可共享同一余部;
//! * 遍历协议 [`TraversalVisitor`] 由自由函数 [`traverse`] 驱动, 与节点类型解耦.
//!
//! ```rust
//! use pn_verify::ptrie::{EncodedKey, StateIndex};
//!
//! let mut index = StateIndex::new();
//! let k101 = EncodedKey::parse_bits("101").unwrap();
//! let k100 = EncodedKey::parse_bits("100").unwrap();
//! assert!(!index.insert_or_find(&k101).unwrap().already_present);
//! assert!(!index.insert_or_find(&k100).unwrap().already_present);
//! assert!(index.insert_or_find(&k101).unwrap().already_present);
//! ```
use std::fmt;

use thiserror::Error;

use crate::net::ids::define_id;
use crate::net::index_vec::Idx;

pub mod index;
pub mod key;
pub mod visitor;

pub use index::{DEFAULT_SPLIT_THRESHOLD, Lookup, StateIndex};
pub use key::EncodedKey;
pub use visitor::{KeyCollector, KeyMatcher, RemainderView, TraversalVisitor, traverse};

define_id!(
    /// 树节点在索引内部数组中的下标.
    NodeId
);
define_id!(
    /// 已存键的稳定编号, 按插入顺序分配.
    StateId
);

impl fmt::Display for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s{}", self.index())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IndexError {
    #[error("allocation failure: cannot grow {resource}")]
    AllocationFailure { resource: &'static str },
    #[error("key of {bits} bits exceeds the addressable length")]
    KeyTooLong { bits: usize },
    #[error("state index is inconsistent: {0}")]
    Inconsistent(String),
}
