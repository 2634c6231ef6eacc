//! 状态编码: 把积状态变成状态索引的位键.
//!
//! 编码必须确定且单射; [`MarkingEncoder`] 依次写出位置与各库所的 LEB128 变长整数,
//! 字段数固定且每个变长整数自定界, 因而不同状态的编码互不相同.
use crate::buchi::LocationId;
use crate::net::{Marking, NetModel, Weight};
use crate::product::ProductState;
use crate::ptrie::EncodedKey;

pub trait StateEncoder {
    type State;

    fn encode(&self, state: &Self::State) -> EncodedKey;

    /// 仅用于校验编码; 不可解码时返回 `None`.
    fn decode(&self, key: &EncodedKey) -> Option<Self::State>;
}

impl<E: StateEncoder + ?Sized> StateEncoder for &E {
    type State = E::State;

    fn encode(&self, state: &Self::State) -> EncodedKey {
        (**self).encode(state)
    }

    fn decode(&self, key: &EncodedKey) -> Option<Self::State> {
        (**self).decode(key)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarkingEncoder {
    places: usize,
}

impl MarkingEncoder {
    pub fn new(places: usize) -> Self {
        Self { places }
    }

    pub fn for_net<N: NetModel>(net: &N) -> Self {
        Self::new(net.places_len())
    }
}

fn write_varint(key: &mut EncodedKey, mut value: u64) {
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            key.push_byte(byte);
            return;
        }
        key.push_byte(byte | 0x80);
    }
}

fn read_varint(bytes: &[u8], pos: &mut usize) -> Option<u64> {
    let mut value = 0u64;
    for shift in (0..64).step_by(7) {
        let byte = *bytes.get(*pos)?;
        *pos += 1;
        let chunk = u64::from(byte & 0x7f);
        if shift == 63 && chunk > 1 {
            return None;
        }
        value |= chunk << shift;
        if byte & 0x80 == 0 {
            // 拒绝非最短编码, 保证解码结果与编码一一对应
            if byte == 0 && shift > 0 {
                return None;
            }
            return Some(value);
        }
    }
    None
}

impl StateEncoder for MarkingEncoder {
    type State = ProductState;

    fn encode(&self, state: &ProductState) -> EncodedKey {
        let mut key = EncodedKey::with_capacity(8 * (state.marking.len() + 1));
        write_varint(&mut key, u64::from(state.location.raw()));
        for (_, &tokens) in state.marking.iter() {
            write_varint(&mut key, tokens);
        }
        key
    }

    fn decode(&self, key: &EncodedKey) -> Option<ProductState> {
        if key.len_bits() % 8 != 0 {
            return None;
        }
        let bytes = key.as_bytes();
        let mut pos = 0;
        let location = u32::try_from(read_varint(bytes, &mut pos)?).ok()?;
        let mut tokens: Vec<Weight> = Vec::with_capacity(self.places);
        for _ in 0..self.places {
            tokens.push(read_varint(bytes, &mut pos)?);
        }
        (pos == bytes.len()).then(|| {
            ProductState::new(Marking::from_tokens(tokens), LocationId::new(location))
        })
    }
}
