//! 路径压缩的二进制字典树.
//!
//! 每个节点在固定比特位 `depth` 上分叉, 两侧要么指向子节点, 要么是一个按余部有序的桶.
//! 桶中条目只保存自己的余部句柄: 余部位串集中存放在 [`StateIndex`] 拥有的去重池中,
//! 后缀相同的键共享同一段余部. 桶超过阈值时整体下沉一层, 条目仅增加跳过位数.
use std::cmp::Ordering;
use std::mem;

use indexmap::IndexSet;
use log::trace;
use rustc_hash::FxBuildHasher;
use smallvec::SmallVec;

use super::key::{EncodedKey, cmp_runs, get_bit, shifted_bytes};
use super::{IndexError, NodeId, StateId};
use crate::net::index_vec::{Idx, IndexVec};

pub const DEFAULT_SPLIT_THRESHOLD: usize = 32;

const ROOT: NodeId = NodeId(0);

pub(crate) type Bucket = SmallVec<[StateId; 4]>;

#[derive(Debug, Clone, Default)]
pub(crate) enum Side {
    #[default]
    Empty,
    Branch(NodeId),
    Bucket(Bucket),
}

#[derive(Debug, Clone)]
pub(crate) struct Node {
    pub(crate) parent: Option<(NodeId, bool)>,
    pub(crate) depth: u32,
    pub(crate) sides: [Side; 2],
}

/// 一段共享的余部位串, 从字节边界开始存放.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct Remainder {
    pub(crate) bytes: SmallVec<[u8; 16]>,
    pub(crate) len: usize,
}

impl Remainder {
    fn from_suffix(key: &EncodedKey, from: usize) -> Self {
        let len = key.len_bits().saturating_sub(from);
        Self {
            bytes: shifted_bytes(key.as_bytes(), from, len).collect(),
            len,
        }
    }

    fn bit(&self, index: usize) -> Option<bool> {
        (index < self.len).then(|| get_bit(&self.bytes, index))
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct Entry {
    pub(crate) node: NodeId,
    pub(crate) side: bool,
    /// 余部池中的下标.
    pub(crate) remainder: usize,
    /// 余部中已由树路径消耗的前导位数.
    pub(crate) skip: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lookup {
    pub already_present: bool,
    pub id: StateId,
}

/// 已访问状态集合.
///
/// 只增不删; 每个插入的键获得一个稳定的 [`StateId`], 可据此重建原键.
#[derive(Debug, Clone)]
pub struct StateIndex {
    pub(crate) nodes: IndexVec<NodeId, Node>,
    pub(crate) entries: IndexVec<StateId, Entry>,
    pub(crate) remainders: IndexSet<Remainder, FxBuildHasher>,
    split_threshold: usize,
    node_limit: Option<usize>,
}

impl Default for StateIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl StateIndex {
    pub fn new() -> Self {
        let mut nodes = IndexVec::new();
        nodes.push(Node {
            parent: None,
            depth: 0,
            sides: Default::default(),
        });
        Self {
            nodes,
            entries: IndexVec::new(),
            remainders: IndexSet::with_hasher(FxBuildHasher),
            split_threshold: DEFAULT_SPLIT_THRESHOLD,
            node_limit: None,
        }
    }

    /// 桶内条目数超过 `threshold` 即分裂, 最小为 1.
    pub fn with_split_threshold(mut self, threshold: usize) -> Self {
        self.split_threshold = threshold.max(1);
        self
    }

    /// 节点总数 (含根) 的上限, 超出即报告 [`IndexError::AllocationFailure`].
    pub fn with_node_limit(mut self, limit: Option<usize>) -> Self {
        self.node_limit = limit;
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn remainder_count(&self) -> usize {
        self.remainders.len()
    }

    pub fn split_threshold(&self) -> usize {
        self.split_threshold
    }

    pub fn root(&self) -> NodeId {
        ROOT
    }

    pub fn insert_or_find(&mut self, key: &EncodedKey) -> Result<Lookup, IndexError> {
        let framed = key.framed()?;
        let (node, side) = self.descend(&framed, None)?;
        let from = self.nodes[node].depth as usize + 1;
        let position = match self.search_side(node, side, &framed, from) {
            Ok(id) => {
                return Ok(Lookup {
                    already_present: true,
                    id,
                });
            }
            Err(position) => position,
        };

        let id = self.push_entry(node, side, &framed, from)?;
        let threshold = self.split_threshold;
        let slot = &mut self.nodes[node].sides[side as usize];
        if matches!(slot, Side::Empty) {
            *slot = Side::Bucket(Bucket::new());
        }
        let overflow = match slot {
            Side::Bucket(bucket) => {
                bucket.insert(position, id);
                bucket.len() > threshold
            }
            _ => {
                return Err(IndexError::Inconsistent(format!(
                    "descent stopped at branch {node:?}"
                )));
            }
        };
        if overflow {
            self.split(node, side)?;
        }
        Ok(Lookup {
            already_present: false,
            id,
        })
    }

    pub fn find(&self, key: &EncodedKey) -> Result<Option<StateId>, IndexError> {
        let framed = key.framed()?;
        let (node, side) = self.descend(&framed, None)?;
        let from = self.nodes[node].depth as usize + 1;
        Ok(self.search_side(node, side, &framed, from).ok())
    }

    pub fn contains(&self, key: &EncodedKey) -> Result<bool, IndexError> {
        Ok(self.find(key)?.is_some())
    }

    /// 查找 `key` 时依次经过的节点.
    pub fn path(&self, key: &EncodedKey) -> Result<Vec<NodeId>, IndexError> {
        let framed = key.framed()?;
        let mut trail = Vec::new();
        self.descend(&framed, Some(&mut trail))?;
        Ok(trail)
    }

    /// 沿父指针回到根, 重建 `id` 对应的键.
    pub fn key(&self, id: StateId) -> Option<EncodedKey> {
        let entry = self.entries.get(id)?;
        let mut prefix = vec![entry.side];
        let mut cursor = entry.node;
        while let Some((parent, side)) = self.nodes.get(cursor)?.parent {
            prefix.push(side);
            cursor = parent;
        }
        let remainder = self.remainders.get_index(entry.remainder)?;
        let mut framed: EncodedKey = prefix.into_iter().rev().collect();
        for i in entry.skip..remainder.len {
            framed.push_bit(get_bit(&remainder.bytes, i));
        }
        framed.unframed()
    }

    /// 校验父子指针、深度、桶序及条目归属.
    pub fn check_consistency(&self) -> Result<(), IndexError> {
        let fail = |msg: String| Err(IndexError::Inconsistent(msg));
        let mut seen = vec![false; self.entries.len()];
        for (id, node) in self.nodes.iter_enumerated() {
            match node.parent {
                None if id != ROOT => return fail(format!("{id:?} has no parent")),
                Some((parent, side)) => {
                    let Some(up) = self.nodes.get(parent) else {
                        return fail(format!("{id:?} has dangling parent {parent:?}"));
                    };
                    if !matches!(up.sides[side as usize], Side::Branch(child) if child == id) {
                        return fail(format!("{parent:?} does not point back to {id:?}"));
                    }
                    if up.depth + 1 != node.depth {
                        return fail(format!("{id:?} depth {} under {}", node.depth, up.depth));
                    }
                }
                None => {}
            }
            for (side, slot) in node.sides.iter().enumerate() {
                let Side::Bucket(bucket) = slot else { continue };
                if bucket.is_empty() {
                    return fail(format!("{id:?} holds an empty bucket"));
                }
                for (k, &state) in bucket.iter().enumerate() {
                    let Some(entry) = self.entries.get(state) else {
                        return fail(format!("{id:?} references unknown {state:?}"));
                    };
                    if entry.node != id || entry.side != (side == 1) {
                        return fail(format!("{state:?} is filed under the wrong bucket"));
                    }
                    if std::mem::replace(&mut seen[state.index()], true) {
                        return fail(format!("{state:?} appears twice"));
                    }
                    if k > 0 && self.cmp_entries(bucket[k - 1], state)? != Ordering::Less {
                        return fail(format!("bucket of {id:?} is not strictly ordered"));
                    }
                }
            }
        }
        if let Some(missing) = seen.iter().position(|s| !s) {
            return fail(format!("{:?} is not reachable", StateId::from_usize(missing)));
        }
        Ok(())
    }

    pub(crate) fn remainder_of(&self, entry: &Entry) -> Result<(&[u8], usize), IndexError> {
        let remainder = self
            .remainders
            .get_index(entry.remainder)
            .ok_or_else(|| IndexError::Inconsistent(format!("remainder {}", entry.remainder)))?;
        Ok((&remainder.bytes, remainder.len))
    }

    fn descend(
        &self,
        framed: &EncodedKey,
        mut trail: Option<&mut Vec<NodeId>>,
    ) -> Result<(NodeId, bool), IndexError> {
        let mut node = ROOT;
        loop {
            if let Some(trail) = trail.as_deref_mut() {
                trail.push(node);
            }
            let depth = self.nodes[node].depth as usize;
            let bit = framed.bit(depth).ok_or_else(|| {
                IndexError::Inconsistent(format!("key ends inside the tree at bit {depth}"))
            })?;
            match &self.nodes[node].sides[bit as usize] {
                Side::Branch(child) => node = *child,
                _ => return Ok((node, bit)),
            }
        }
    }

    /// 在桶内二分查找; `Err` 给出插入位置.
    fn search_side(
        &self,
        node: NodeId,
        side: bool,
        framed: &EncodedKey,
        from: usize,
    ) -> Result<StateId, usize> {
        let Side::Bucket(bucket) = &self.nodes[node].sides[side as usize] else {
            return Err(0);
        };
        let key_len = framed.len_bits().saturating_sub(from);
        bucket
            .binary_search_by(|&id| {
                let entry = &self.entries[id];
                match self.remainders.get_index(entry.remainder) {
                    Some(rem) => cmp_runs(
                        &rem.bytes,
                        entry.skip,
                        rem.len - entry.skip,
                        framed.as_bytes(),
                        from,
                        key_len,
                    ),
                    None => Ordering::Less,
                }
            })
            .map(|k| bucket[k])
    }

    fn cmp_entries(&self, a: StateId, b: StateId) -> Result<Ordering, IndexError> {
        let (ea, eb) = (&self.entries[a], &self.entries[b]);
        let (ra, la) = self.remainder_of(ea)?;
        let (rb, lb) = self.remainder_of(eb)?;
        Ok(cmp_runs(ra, ea.skip, la - ea.skip, rb, eb.skip, lb - eb.skip))
    }

    fn push_entry(
        &mut self,
        node: NodeId,
        side: bool,
        framed: &EncodedKey,
        from: usize,
    ) -> Result<StateId, IndexError> {
        if self.entries.len() >= u32::MAX as usize {
            return Err(IndexError::AllocationFailure { resource: "state ids" });
        }
        self.entries
            .try_reserve(1)
            .map_err(|_| IndexError::AllocationFailure { resource: "entries" })?;
        self.remainders
            .try_reserve(1)
            .map_err(|_| IndexError::AllocationFailure { resource: "remainders" })?;
        let (remainder, _) = self.remainders.insert_full(Remainder::from_suffix(framed, from));
        Ok(self.entries.push(Entry {
            node,
            side,
            remainder,
            skip: 0,
        }))
    }

    fn alloc_node(&mut self, parent: NodeId, side: bool) -> Result<NodeId, IndexError> {
        if self.node_limit.is_some_and(|limit| self.nodes.len() >= limit) {
            return Err(IndexError::AllocationFailure { resource: "nodes" });
        }
        self.nodes
            .try_reserve(1)
            .map_err(|_| IndexError::AllocationFailure { resource: "nodes" })?;
        let depth = self.nodes[parent].depth + 1;
        Ok(self.nodes.push(Node {
            parent: Some((parent, side)),
            depth,
            sides: Default::default(),
        }))
    }

    /// 将溢出的桶下沉到新的子节点, 直到各桶均不超过阈值.
    fn split(&mut self, node: NodeId, side: bool) -> Result<(), IndexError> {
        let mut pending = vec![(node, side)];
        while let Some((node, side)) = pending.pop() {
            let overflow = matches!(
                &self.nodes[node].sides[side as usize],
                Side::Bucket(bucket) if bucket.len() > self.split_threshold
            );
            if !overflow {
                continue;
            }
            let child = self.alloc_node(node, side)?;
            let slot = &mut self.nodes[node].sides[side as usize];
            let Side::Bucket(bucket) = mem::replace(slot, Side::Branch(child)) else {
                continue;
            };

            let mut halves: [Bucket; 2] = Default::default();
            for id in bucket {
                let entry = &mut self.entries[id];
                let bit = self
                    .remainders
                    .get_index(entry.remainder)
                    .and_then(|rem| rem.bit(entry.skip))
                    .ok_or_else(|| {
                        IndexError::Inconsistent(format!("{id:?} has no bit left to split on"))
                    })?;
                entry.node = child;
                entry.side = bit;
                entry.skip += 1;
                halves[bit as usize].push(id);
            }
            trace!(
                "split {node:?}/{} into {child:?} ({} | {})",
                side as u8,
                halves[0].len(),
                halves[1].len()
            );
            for (b, half) in halves.into_iter().enumerate() {
                if !half.is_empty() {
                    self.nodes[child].sides[b] = Side::Bucket(half);
                    pending.push((child, b == 1));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(bits: &str) -> EncodedKey {
        EncodedKey::parse_bits(bits).unwrap()
    }

    #[test]
    fn insert_101_then_100_then_101() {
        let mut index = StateIndex::new();
        let a = index.insert_or_find(&key("101")).unwrap();
        assert!(!a.already_present);
        let b = index.insert_or_find(&key("100")).unwrap();
        assert!(!b.already_present);
        assert_ne!(a.id, b.id);
        let again = index.insert_or_find(&key("101")).unwrap();
        assert!(again.already_present);
        assert_eq!(again.id, a.id);
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn prefix_keys_are_distinct() {
        let mut index = StateIndex::new().with_split_threshold(1);
        for text in ["", "1", "10", "101", "1010", "0"] {
            assert!(!index.insert_or_find(&key(text)).unwrap().already_present);
        }
        for text in ["", "1", "10", "101", "1010", "0"] {
            assert!(index.insert_or_find(&key(text)).unwrap().already_present);
        }
        assert_eq!(index.len(), 6);
        index.check_consistency().unwrap();
    }

    #[test]
    fn split_keeps_keys_reachable() {
        let mut index = StateIndex::new().with_split_threshold(2);
        let keys: Vec<EncodedKey> = (0u16..200)
            .map(|i| EncodedKey::from_bytes(&i.to_be_bytes()))
            .collect();
        let ids: Vec<StateId> = keys
            .iter()
            .map(|k| index.insert_or_find(k).unwrap().id)
            .collect();
        assert!(index.node_count() > 1);
        index.check_consistency().unwrap();
        for (k, id) in keys.iter().zip(&ids) {
            assert_eq!(index.find(k).unwrap(), Some(*id));
            assert_eq!(index.key(*id).as_ref(), Some(k));
        }
        assert_eq!(index.find(&EncodedKey::from_bytes(&[0xff, 0xff])).unwrap(), None);
    }

    #[test]
    fn common_prefix_shares_nodes() {
        let mut index = StateIndex::new().with_split_threshold(1);
        let a = key("11010011");
        let b = key("11010100");
        let c = key("01110000");
        for k in [&a, &b, &c] {
            index.insert_or_find(k).unwrap();
        }
        let (pa, pb, pc) = (
            index.path(&a).unwrap(),
            index.path(&b).unwrap(),
            index.path(&c).unwrap(),
        );
        // 32 位长度头加 5 位公共前缀
        let shared = 32 + 5;
        assert!(pa.len() > shared && pb.len() > shared);
        assert_eq!(pa[..shared], pb[..shared]);
        assert_eq!(pa[..32], pc[..32]);
        assert_ne!(pa.get(33), pc.get(33));
    }

    #[test]
    fn identical_suffixes_share_a_remainder() {
        let mut index = StateIndex::new().with_split_threshold(1);
        // 两键在长度头之后的第一位分叉, 建出深度 32 的节点
        index.insert_or_find(&key("0110")).unwrap();
        index.insert_or_find(&key("1110")).unwrap();
        assert_eq!(index.remainder_count(), 2);

        // 两键分别落入该节点两侧的桶, 余部同为 "111"
        let a = index.insert_or_find(&key("0111")).unwrap();
        let b = index.insert_or_find(&key("1111")).unwrap();
        assert!(!a.already_present && !b.already_present);
        assert_eq!(index.entries[a.id].remainder, index.entries[b.id].remainder);
        assert_eq!(index.len(), 4);
        assert_eq!(index.remainder_count(), 3);
        assert!(index.remainder_count() < index.len());

        index.check_consistency().unwrap();
        for text in ["0110", "1110", "0111", "1111"] {
            let id = index.find(&key(text)).unwrap().unwrap();
            assert_eq!(index.key(id), Some(key(text)));
        }
    }

    #[test]
    fn node_limit_reports_allocation_failure() {
        let mut index = StateIndex::new()
            .with_split_threshold(1)
            .with_node_limit(Some(4));
        let mut failure = None;
        for i in 0u8..=255 {
            if let Err(err) = index.insert_or_find(&EncodedKey::from_bytes(&[i])) {
                failure = Some(err);
                break;
            }
        }
        assert!(matches!(
            failure,
            Some(IndexError::AllocationFailure { resource: "nodes" })
        ));
        assert!(index.node_count() <= 4);
    }
}
