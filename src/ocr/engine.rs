//! OCR 引擎接口
//!
//! 引擎是黑盒：图片字节进，原始文本和置信度出。

use async_trait::async_trait;

use crate::error::OcrResult;

/// 页面分割模式（tesseract `--psm`）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SegmentationMode {
    /// 单行文本
    SingleLine = 7,
    /// 单个单词
    SingleWord = 8,
    /// 单个字符
    SingleChar = 10,
    /// 原始行，不做额外处理
    RawLine = 13,
}

impl SegmentationMode {
    pub fn code(self) -> u8 {
        self as u8
    }
}

/// 识别引擎模式（tesseract `--oem`）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineMode {
    /// 仅传统引擎
    LegacyOnly = 0,
    /// 仅神经网络
    LstmOnly = 1,
    /// 默认组合
    Combined = 3,
}

impl EngineMode {
    pub fn code(self) -> u8 {
        self as u8
    }
}

/// 一组识别参数
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecognitionConfig {
    /// 在 [`RECOGNITION_CONFIGS`] 中的序号，排名相同时按它决定先后
    pub id: usize,
    pub segmentation: SegmentationMode,
    pub engine: EngineMode,
}

/// 验证码识别依次尝试的四组参数
pub const RECOGNITION_CONFIGS: [RecognitionConfig; 4] = [
    RecognitionConfig {
        id: 0,
        segmentation: SegmentationMode::SingleLine,
        engine: EngineMode::Combined,
    },
    RecognitionConfig {
        id: 1,
        segmentation: SegmentationMode::SingleWord,
        engine: EngineMode::LstmOnly,
    },
    RecognitionConfig {
        id: 2,
        segmentation: SegmentationMode::SingleChar,
        engine: EngineMode::LegacyOnly,
    },
    RecognitionConfig {
        id: 3,
        segmentation: SegmentationMode::RawLine,
        engine: EngineMode::Combined,
    },
];

/// 引擎的原始输出
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecognition {
    pub text: String,
    /// 0-100
    pub confidence: f32,
}

/// OCR 引擎
#[async_trait]
pub trait OcrEngine: Send + Sync {
    /// 引擎名称（日志用）
    fn name(&self) -> &'static str;

    /// 按给定参数识别图片
    ///
    /// # 参数
    /// - `image`: 图片字节（PNG）
    /// - `config`: 分割模式和引擎模式
    /// - `whitelist`: 允许的字符集合
    ///
    /// # 返回
    /// 只有引擎本身不可用或出错时才返回 `Err`，识别不出文字返回空文本。
    async fn recognize(
        &self,
        image: &[u8],
        config: RecognitionConfig,
        whitelist: &str,
    ) -> OcrResult<RawRecognition>;
}
