//! 验证码 OCR 识别引擎
//!
//! ## 职责
//!
//! 给定图片字节，返回排好序的文本候选；不认识会话、cookie 和门户。
//!
//! ## 模块划分
//!
//! - `engine` - 引擎接口和四组识别参数
//! - `tesseract` / `remote` - 两个引擎实现（本地命令行、远程 OCR 服务）
//! - `pool` - 有界工作池
//! - `resolver` - 清洗、过滤、排序，以及引擎不可用时的占位猜测
//! - `fallback` - 可注入种子的占位生成器

pub mod engine;
pub mod fallback;
pub mod pool;
pub mod remote;
pub mod resolver;
pub mod tesseract;

use std::sync::Arc;

use tracing::info;

pub use engine::{OcrEngine, RawRecognition, RecognitionConfig, RECOGNITION_CONFIGS};
pub use fallback::FallbackGenerator;
pub use pool::OcrPool;
pub use remote::RemoteOcr;
pub use resolver::{CaptchaProfile, CaptchaResolver, Candidate, Resolution, ResolutionSource};
pub use tesseract::TesseractCli;

use crate::config::Config;
use crate::error::OcrResult;

/// 按配置选择引擎：设置了 OCR 服务地址则用远程服务，否则用本地 tesseract
pub fn create_engine(config: &Config) -> OcrResult<Arc<dyn OcrEngine>> {
    match &config.ocr_api_url {
        Some(url) => {
            info!("🔍 使用远程 OCR 服务: {}", url);
            Ok(Arc::new(RemoteOcr::new(url, config.ocr_timeout())?))
        }
        None => {
            info!("🔍 使用本地 tesseract: {}", config.tesseract_path);
            Ok(Arc::new(TesseractCli::new(
                config.tesseract_path.clone(),
                config.ocr_timeout(),
            )))
        }
    }
}

/// 组装完整的验证码识别器
pub fn create_resolver(config: &Config) -> OcrResult<CaptchaResolver> {
    let engine = create_engine(config)?;
    Ok(CaptchaResolver::new(
        OcrPool::new(engine, config.ocr_workers),
        FallbackGenerator::wall_clock(),
    ))
}
