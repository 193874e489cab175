//! 远程 OCR 服务
//!
//! `POST {base}/ocr/base64`，请求体 `{imageData, options}`，
//! 响应 `{success, result: {text, confidence}}`。

use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::engine::{OcrEngine, RawRecognition, RecognitionConfig};
use crate::error::{OcrError, OcrResult};

const ENGINE_NAME: &str = "remote-ocr";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct OcrRequest<'a> {
    image_data: String,
    options: OcrOptions<'a>,
}

#[derive(Debug, Serialize)]
struct OcrOptions<'a> {
    whitelist: &'a str,
    psm: u8,
    oem: u8,
}

#[derive(Debug, Deserialize)]
struct OcrResponse {
    success: bool,
    #[serde(default)]
    result: Option<OcrPayload>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OcrPayload {
    #[serde(default)]
    text: String,
    #[serde(default)]
    confidence: f32,
}

/// 远程 OCR 客户端
pub struct RemoteOcr {
    client: Client,
    endpoint: String,
}

impl RemoteOcr {
    /// # 参数
    /// - `base_url`: 服务地址，例如 `http://localhost:3001`
    /// - `timeout`: 单次识别超时
    pub fn new(base_url: &str, timeout: Duration) -> OcrResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| OcrError::Unreachable {
                engine: ENGINE_NAME,
                reason: e.to_string(),
            })?;
        Ok(Self {
            client,
            endpoint: format!("{}/ocr/base64", base_url.trim_end_matches('/')),
        })
    }
}

#[async_trait]
impl OcrEngine for RemoteOcr {
    fn name(&self) -> &'static str {
        ENGINE_NAME
    }

    async fn recognize(
        &self,
        image: &[u8],
        config: RecognitionConfig,
        whitelist: &str,
    ) -> OcrResult<RawRecognition> {
        let request = OcrRequest {
            image_data: format!("data:image/png;base64,{}", STANDARD.encode(image)),
            options: OcrOptions {
                whitelist,
                psm: config.segmentation.code(),
                oem: config.engine.code(),
            },
        };

        debug!("POST {} (psm {})", self.endpoint, config.segmentation.code());

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| OcrError::Unreachable {
                engine: ENGINE_NAME,
                reason: e.to_string(),
            })?;

        let status = response.status();
        let body: OcrResponse = response.json().await.map_err(|e| OcrError::Engine {
            engine: ENGINE_NAME,
            reason: format!("HTTP {}: 无法解析响应: {}", status.as_u16(), e),
        })?;

        if !status.is_success() || !body.success {
            return Err(OcrError::Engine {
                engine: ENGINE_NAME,
                reason: body
                    .error
                    .unwrap_or_else(|| format!("HTTP {}", status.as_u16())),
            });
        }

        let payload = body.result.ok_or_else(|| OcrError::Engine {
            engine: ENGINE_NAME,
            reason: "响应缺少 result".to_string(),
        })?;

        Ok(RawRecognition {
            text: payload.text,
            confidence: payload.confidence,
        })
    }
}
