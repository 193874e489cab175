//! 验证码占位猜测
//!
//! OCR 引擎完全不可用时生成一个看起来像验证码的字符串。
//! 几乎不可能猜中，只是让流程能继续走下去；调用方必须把它和真实识别结果区分开。

use chrono::Utc;

/// 大写字母 + 数字
pub const ALPHANUMERIC: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
pub const DIGITS: &str = "0123456789";
pub const LETTERS: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// 依次为：5 位混合、4 位混合、6 位混合、5 位数字、5 位字母
const STRATEGIES: [(usize, &str); 5] = [
    (5, ALPHANUMERIC),
    (4, ALPHANUMERIC),
    (6, ALPHANUMERIC),
    (5, DIGITS),
    (5, LETTERS),
];

/// 种子来源
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedSource {
    /// 当前毫秒时间戳
    WallClock,
    /// 固定种子（测试用）
    Fixed(u64),
}

/// 可注入种子的占位生成器
#[derive(Debug, Clone, Copy)]
pub struct FallbackGenerator {
    seed: SeedSource,
}

impl Default for FallbackGenerator {
    fn default() -> Self {
        Self::wall_clock()
    }
}

impl FallbackGenerator {
    pub fn wall_clock() -> Self {
        Self {
            seed: SeedSource::WallClock,
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            seed: SeedSource::Fixed(seed),
        }
    }

    fn current_seed(&self) -> u64 {
        match self.seed {
            SeedSource::WallClock => Utc::now().timestamp_millis().max(0) as u64,
            SeedSource::Fixed(seed) => seed,
        }
    }

    /// 生成一个 4-6 位的占位字符串
    pub fn generate(&self) -> String {
        generate_from_seed(self.current_seed())
    }
}

/// 同一个种子总是得到同一个结果；每 10 秒切换一次策略
pub fn generate_from_seed(seed: u64) -> String {
    let (length, charset) = STRATEGIES[((seed / 10_000) % STRATEGIES.len() as u64) as usize];
    let chars = charset.as_bytes();

    (0..length)
        .map(|i| {
            let index = seed
                .wrapping_add((i as u64).wrapping_mul(23))
                .wrapping_add((length as u64).wrapping_mul(7))
                % chars.len() as u64;
            chars[index as usize] as char
        })
        .collect()
}
