//! 短码生成
//!
//! 进程级单调递增计数器，按固定字母表编码为定长短码。
//! 码值可预测，但短码本身不作为秘密使用。

use std::sync::atomic::{AtomicU64, Ordering};

use super::models::ShortCode;
use crate::errors::{Result, SafelinkError};

/// 短码长度
pub const CODE_LENGTH: usize = 6;

/// 字母表；计数器 0 编码为 `AAAAAA`
pub const CODE_ALPHABET: &[u8; 62] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

const BASE: u64 = CODE_ALPHABET.len() as u64;

/// 62^6，可分配的短码总数
pub const CODE_SPACE: u64 = BASE.pow(CODE_LENGTH as u32);

/// 字节到码值的查表，-1 表示不在字母表中
static DECODE_TABLE: [i8; 256] = {
    let mut table = [-1i8; 256];
    let mut i = 0;
    while i < CODE_ALPHABET.len() {
        table[CODE_ALPHABET[i] as usize] = i as i8;
        i += 1;
    }
    table
};

#[inline]
pub fn is_code_byte(b: u8) -> bool {
    DECODE_TABLE[b as usize] >= 0
}

/// 编码计数器值；超出码空间时返回 None
pub fn encode(mut value: u64) -> Option<ShortCode> {
    if value >= CODE_SPACE {
        return None;
    }
    let mut buf = [CODE_ALPHABET[0]; CODE_LENGTH];
    for slot in buf.iter_mut().rev() {
        *slot = CODE_ALPHABET[(value % BASE) as usize];
        value /= BASE;
    }
    Some(ShortCode::from_bytes(buf))
}

/// 解码短码为计数器值
pub fn decode(code: &ShortCode) -> u64 {
    code.as_bytes()
        .iter()
        .fold(0u64, |acc, b| acc * BASE + DECODE_TABLE[*b as usize] as u64)
}

/// 短码分配器
#[derive(Debug)]
pub struct CodeGenerator {
    next: AtomicU64,
}

impl CodeGenerator {
    /// `next` 为下一个要分配的计数器值
    pub fn new(next: u64) -> Self {
        Self {
            next: AtomicU64::new(next),
        }
    }

    /// 根据回放看到的短码构造，种子为最大码值 + 1
    pub fn seeded_past<'a, I>(codes: I) -> Self
    where
        I: IntoIterator<Item = &'a ShortCode>,
    {
        let next = codes
            .into_iter()
            .map(|c| decode(c) + 1)
            .max()
            .unwrap_or(0);
        Self::new(next)
    }

    /// 分配一个新短码
    pub fn allocate(&self) -> Result<ShortCode> {
        let value = self.next.fetch_add(1, Ordering::Relaxed);
        encode(value).ok_or_else(|| {
            SafelinkError::code_space_exhausted(format!(
                "All {} short codes of length {} are allocated",
                CODE_SPACE, CODE_LENGTH
            ))
        })
    }

    /// 下一个将被分配的计数器值
    pub fn peek(&self) -> u64 {
        self.next.load(Ordering::Relaxed)
    }
}
