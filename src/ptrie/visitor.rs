//! 遍历访问者协议与驱动它的自由函数 [`traverse`].
//!
//! 树的结构算法只负责按深度优先顺序报告比特位置; 访问者决定是否继续、
//! 如何记录每一位以及如何接收条目的余部. 节点本身不含任何行为.
use super::index::{Side, StateIndex};
use super::key::{EncodedKey, get_bit};
use super::{IndexError, NodeId, StateId};

/// 树遍历时委托给调用方的三种决策. 位置均为加长度头后的比特下标.
pub trait TraversalVisitor {
    /// 遍历回到位置 `index`; 返回 `false` 则剪去当前路径 (视为不匹配).
    fn back(&mut self, index: usize) -> bool;

    /// 在位置 `index` 记录一位; 返回 `false` 表示访问者无法继续承载, 遍历以分配失败终止.
    fn set(&mut self, index: usize, bit: bool) -> bool;

    /// 从位置 `index` 起接上条目的余部; 返回 `false` 与 [`set`](Self::set) 同义.
    fn set_remainder(&mut self, index: usize, remainder: RemainderView<'_>) -> bool;
}

/// 某个条目余部尚未被树路径消耗的部分.
#[derive(Clone, Copy)]
pub struct RemainderView<'a> {
    id: StateId,
    bytes: &'a [u8],
    from: usize,
    len: usize,
}

impl<'a> RemainderView<'a> {
    pub fn state_id(&self) -> StateId {
        self.id
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn bit(&self, index: usize) -> Option<bool> {
        (index < self.len).then(|| get_bit(self.bytes, self.from + index))
    }

    pub fn iter(&self) -> impl Iterator<Item = bool> + 'a {
        let (bytes, from) = (self.bytes, self.from);
        (0..self.len).map(move |i| get_bit(bytes, from + i))
    }
}

impl std::fmt::Debug for RemainderView<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let bits: EncodedKey = self.iter().collect();
        f.debug_struct("RemainderView")
            .field("id", &self.id)
            .field("bits", &bits)
            .finish()
    }
}

/// 深度优先遍历整棵树, 每一侧先 `back` 再 `set`, 桶内条目逐个 `set_remainder`.
pub fn traverse<V: TraversalVisitor + ?Sized>(
    index: &StateIndex,
    visitor: &mut V,
) -> Result<(), IndexError> {
    let mut stack: Vec<(NodeId, bool)> = vec![(index.root(), true), (index.root(), false)];
    while let Some((node, side)) = stack.pop() {
        let data = &index.nodes[node];
        let depth = data.depth as usize;
        let slot = &data.sides[side as usize];
        if matches!(slot, Side::Empty) || !visitor.back(depth) {
            continue;
        }
        if !visitor.set(depth, side) {
            return Err(IndexError::AllocationFailure { resource: "visitor" });
        }
        match slot {
            Side::Empty => {}
            Side::Branch(child) => {
                stack.push((*child, true));
                stack.push((*child, false));
            }
            Side::Bucket(bucket) => {
                for &id in bucket {
                    let entry = &index.entries[id];
                    let (bytes, len) = index.remainder_of(entry)?;
                    let view = RemainderView {
                        id,
                        bytes,
                        from: entry.skip,
                        len: len - entry.skip,
                    };
                    if !visitor.set_remainder(depth + 1, view) {
                        return Err(IndexError::AllocationFailure { resource: "visitor" });
                    }
                }
            }
        }
    }
    Ok(())
}

/// 枚举树中所有键, 按比特序.
#[derive(Debug, Default)]
pub struct KeyCollector {
    prefix: Vec<bool>,
    limit: Option<usize>,
    pub keys: Vec<(StateId, EncodedKey)>,
}

impl KeyCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// 收集超过 `limit` 个键时以分配失败终止.
    pub fn with_limit(limit: usize) -> Self {
        Self {
            limit: Some(limit),
            ..Self::default()
        }
    }
}

impl TraversalVisitor for KeyCollector {
    fn back(&mut self, index: usize) -> bool {
        self.prefix.truncate(index);
        true
    }

    fn set(&mut self, index: usize, bit: bool) -> bool {
        if self.prefix.len() != index {
            return false;
        }
        self.prefix.push(bit);
        true
    }

    fn set_remainder(&mut self, index: usize, remainder: RemainderView<'_>) -> bool {
        if self.prefix.len() != index || self.limit.is_some_and(|l| self.keys.len() >= l) {
            return false;
        }
        let framed: EncodedKey = self
            .prefix
            .iter()
            .copied()
            .chain(remainder.iter())
            .collect();
        match framed.unframed() {
            Some(key) => {
                self.keys.push((remainder.state_id(), key));
                true
            }
            None => false,
        }
    }
}

/// 只沿与目标键一致的路径下降, 不匹配的分支在下一层被 `back` 剪去.
#[derive(Debug)]
pub struct KeyMatcher {
    target: EncodedKey,
    mismatch: Option<usize>,
    pub found: Option<StateId>,
    /// `set` 被调用的次数, 反映剪枝效果.
    pub visited: usize,
}

impl KeyMatcher {
    pub fn new(key: &EncodedKey) -> Result<Self, IndexError> {
        Ok(Self {
            target: key.framed()?,
            mismatch: None,
            found: None,
            visited: 0,
        })
    }
}

impl TraversalVisitor for KeyMatcher {
    fn back(&mut self, index: usize) -> bool {
        if self.found.is_some() {
            return false;
        }
        match self.mismatch {
            Some(at) if at < index => false,
            _ => {
                self.mismatch = None;
                true
            }
        }
    }

    fn set(&mut self, index: usize, bit: bool) -> bool {
        self.visited += 1;
        if self.target.bit(index) != Some(bit) {
            self.mismatch = Some(index);
        }
        true
    }

    fn set_remainder(&mut self, index: usize, remainder: RemainderView<'_>) -> bool {
        if self.mismatch.is_none()
            && self.found.is_none()
            && self.target.len_bits() == index + remainder.len()
            && remainder
                .iter()
                .enumerate()
                .all(|(i, bit)| self.target.bit(index + i) == Some(bit))
        {
            self.found = Some(remainder.state_id());
        }
        true
    }
}
