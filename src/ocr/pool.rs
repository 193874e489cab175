//! OCR 工作池
//!
//! 识别任务在独立的 tokio 任务里执行，并由信号量限制同时进行的数量，
//! 一个号码的验证码识别不会占满整个运行时。

use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::Semaphore;

use super::engine::{OcrEngine, RawRecognition, RecognitionConfig};
use crate::error::{OcrError, OcrResult};

#[derive(Clone)]
pub struct OcrPool {
    engine: Arc<dyn OcrEngine>,
    permits: Arc<Semaphore>,
}

impl OcrPool {
    /// # 参数
    /// - `engine`: 实际的识别引擎
    /// - `workers`: 同时进行的识别数量（至少为 1）
    pub fn new(engine: Arc<dyn OcrEngine>, workers: usize) -> Self {
        Self {
            engine,
            permits: Arc::new(Semaphore::new(workers.max(1))),
        }
    }

    pub fn engine_name(&self) -> &'static str {
        self.engine.name()
    }

    /// 在工作池中执行一次识别
    pub async fn recognize(
        &self,
        image: Arc<[u8]>,
        config: RecognitionConfig,
        whitelist: Arc<str>,
    ) -> OcrResult<RawRecognition> {
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| OcrError::Pool(e.to_string()))?;
        let engine = self.engine.clone();

        let handle = tokio::spawn(async move {
            let _permit = permit;
            engine.recognize(&image, config, &whitelist).await
        });

        handle.await.map_err(|e| OcrError::Pool(e.to_string()))?
    }

    /// 用多组参数识别同一张图片，结果顺序与 `configs` 一致
    pub async fn recognize_all(
        &self,
        image: Arc<[u8]>,
        configs: &[RecognitionConfig],
        whitelist: Arc<str>,
    ) -> Vec<(RecognitionConfig, OcrResult<RawRecognition>)> {
        let tasks = configs.iter().map(|config| {
            let image = image.clone();
            let whitelist = whitelist.clone();
            async move { (*config, self.recognize(image, *config, whitelist).await) }
        });
        join_all(tasks).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocr::engine::RECOGNITION_CONFIGS;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// 记录同时进行的最大识别数
    struct SlowEngine {
        active: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl OcrEngine for SlowEngine {
        fn name(&self) -> &'static str {
            "slow"
        }

        async fn recognize(
            &self,
            _image: &[u8],
            config: RecognitionConfig,
            _whitelist: &str,
        ) -> OcrResult<RawRecognition> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.active.fetch_sub(1, Ordering::SeqCst);
            Ok(RawRecognition {
                text: format!("CFG{}", config.id),
                confidence: 50.0,
            })
        }
    }

    #[tokio::test]
    async fn concurrency_is_bounded_and_order_kept() {
        let engine = Arc::new(SlowEngine {
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        });
        let pool = OcrPool::new(engine.clone(), 2);

        let results = pool
            .recognize_all(Arc::from(&b"img"[..]), &RECOGNITION_CONFIGS, Arc::from("AB"))
            .await;

        let texts: Vec<String> = results
            .into_iter()
            .map(|(_, r)| r.unwrap().text)
            .collect();
        assert_eq!(texts, ["CFG0", "CFG1", "CFG2", "CFG3"]);
        assert!(engine.peak.load(Ordering::SeqCst) <= 2);
    }
}
