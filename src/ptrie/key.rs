//! 位级键: 按 MSB 优先顺序存放的有限比特序列.
use std::cmp::Ordering;
use std::fmt;

use smallvec::SmallVec;

use super::IndexError;

/// 树内部为每个键加上的长度头 (大端 `u32`, 单位比特).
///
/// 加头后任意两个不同键互不为前缀, 因而每个键都终止于某个桶内.
pub(crate) const HEADER_BITS: usize = 32;

#[inline]
pub(crate) fn get_bit(bytes: &[u8], index: usize) -> bool {
    (bytes[index / 8] >> (7 - index % 8)) & 1 == 1
}

/// 比较 `a[a_from..a_from + a_len]` 与 `b[b_from..b_from + b_len]`: 先逐位, 再按长度.
pub(crate) fn cmp_runs(
    a: &[u8],
    a_from: usize,
    a_len: usize,
    b: &[u8],
    b_from: usize,
    b_len: usize,
) -> Ordering {
    for i in 0..a_len.min(b_len) {
        let (x, y) = (get_bit(a, a_from + i), get_bit(b, b_from + i));
        if x != y {
            return x.cmp(&y);
        }
    }
    a_len.cmp(&b_len)
}

/// 将 `src` 中从 `from` 开始的 `len` 位重新对齐到字节边界.
pub(crate) fn shifted_bytes(src: &[u8], from: usize, len: usize) -> impl Iterator<Item = u8> + '_ {
    (0..len.div_ceil(8)).map(move |k| {
        let mut byte = 0u8;
        for j in 0..8 {
            let i = k * 8 + j;
            if i < len && get_bit(src, from + i) {
                byte |= 0x80 >> j;
            }
        }
        byte
    })
}

/// 一个状态的编码. 相等即逐位相等: 末字节的填充位恒为 0.
#[derive(Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EncodedKey {
    bytes: SmallVec<[u8; 32]>,
    bits: usize,
}

impl EncodedKey {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(bits: usize) -> Self {
        Self {
            bytes: SmallVec::with_capacity(bits.div_ceil(8)),
            bits: 0,
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            bytes: SmallVec::from_slice(bytes),
            bits: bytes.len() * 8,
        }
    }

    /// 解析形如 `"101"` 的位串, 非 `0`/`1` 字符返回 `None`.
    pub fn parse_bits(text: &str) -> Option<Self> {
        text.chars()
            .map(|c| match c {
                '0' => Some(false),
                '1' => Some(true),
                _ => None,
            })
            .collect()
    }

    pub fn push_bit(&mut self, bit: bool) {
        if self.bits % 8 == 0 {
            self.bytes.push(0);
        }
        if bit {
            let last = self.bytes.len() - 1;
            self.bytes[last] |= 0x80 >> (self.bits % 8);
        }
        self.bits += 1;
    }

    pub fn push_byte(&mut self, byte: u8) {
        if self.bits % 8 == 0 {
            self.bytes.push(byte);
            self.bits += 8;
        } else {
            for j in 0..8 {
                self.push_bit(byte & (0x80 >> j) != 0);
            }
        }
    }

    pub fn extend_from_bytes(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.push_byte(byte);
        }
    }

    pub fn len_bits(&self) -> usize {
        self.bits
    }

    pub fn is_empty(&self) -> bool {
        self.bits == 0
    }

    pub fn bit(&self, index: usize) -> Option<bool> {
        (index < self.bits).then(|| get_bit(&self.bytes, index))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn iter(&self) -> impl Iterator<Item = bool> + '_ {
        (0..self.bits).map(|i| get_bit(&self.bytes, i))
    }

    /// 以长度头为前缀的树内表示.
    pub(crate) fn framed(&self) -> Result<EncodedKey, IndexError> {
        let header =
            u32::try_from(self.bits).map_err(|_| IndexError::KeyTooLong { bits: self.bits })?;
        if self.bits > u32::MAX as usize - HEADER_BITS {
            return Err(IndexError::KeyTooLong { bits: self.bits });
        }
        let mut framed = EncodedKey::with_capacity(HEADER_BITS + self.bits);
        framed.extend_from_bytes(&header.to_be_bytes());
        framed.bytes.extend_from_slice(&self.bytes);
        framed.bits += self.bits;
        Ok(framed)
    }

    /// [`framed`](Self::framed) 的逆; 头部长度与实际位数不符时返回 `None`.
    pub(crate) fn unframed(&self) -> Option<EncodedKey> {
        if self.bits < HEADER_BITS {
            return None;
        }
        let header = u32::from_be_bytes([self.bytes[0], self.bytes[1], self.bytes[2], self.bytes[3]]);
        let len = header as usize;
        if HEADER_BITS + len != self.bits {
            return None;
        }
        Some(EncodedKey {
            bytes: shifted_bytes(&self.bytes, HEADER_BITS, len).collect(),
            bits: len,
        })
    }
}

impl FromIterator<bool> for EncodedKey {
    fn from_iter<I: IntoIterator<Item = bool>>(iter: I) -> Self {
        let mut key = EncodedKey::new();
        for bit in iter {
            key.push_bit(bit);
        }
        key
    }
}

impl fmt::Display for EncodedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for bit in self.iter() {
            f.write_str(if bit { "1" } else { "0" })?;
        }
        Ok(())
    }
}

impl fmt::Debug for EncodedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.bits <= 64 {
            write!(f, "EncodedKey({self})")
        } else {
            write!(f, "EncodedKey({} bits)", self.bits)
        }
    }
}
