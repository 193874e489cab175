//! 本地 tesseract 命令行引擎

use std::io::ErrorKind;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use super::engine::{OcrEngine, RawRecognition, RecognitionConfig};
use crate::error::{OcrError, OcrResult};

const ENGINE_NAME: &str = "tesseract";

/// 调用本地 `tesseract` 可执行文件
///
/// 图片通过 stdin 传入，结果以 TSV 从 stdout 读回，不落临时文件。
pub struct TesseractCli {
    binary: String,
    timeout: Duration,
}

impl TesseractCli {
    pub fn new(binary: impl Into<String>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            timeout,
        }
    }

    fn command(&self, config: RecognitionConfig, whitelist: &str) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.args(["stdin", "stdout"])
            .args(["--psm", &config.segmentation.code().to_string()])
            .args(["--oem", &config.engine.code().to_string()])
            .args(["-c", &format!("tessedit_char_whitelist={}", whitelist)])
            .arg("tsv")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    async fn run(&self, image: &[u8], config: RecognitionConfig, whitelist: &str) -> OcrResult<String> {
        let mut child = self.command(config, whitelist).spawn().map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                OcrError::Unreachable {
                    engine: ENGINE_NAME,
                    reason: format!("找不到可执行文件 {}", self.binary),
                }
            } else {
                OcrError::Unreachable {
                    engine: ENGINE_NAME,
                    reason: e.to_string(),
                }
            }
        })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(image).await.map_err(|e| OcrError::Engine {
                engine: ENGINE_NAME,
                reason: format!("写入图片失败: {}", e),
            })?;
        }

        let output = child.wait_with_output().await.map_err(|e| OcrError::Engine {
            engine: ENGINE_NAME,
            reason: e.to_string(),
        })?;

        if !output.status.success() {
            return Err(OcrError::Engine {
                engine: ENGINE_NAME,
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl OcrEngine for TesseractCli {
    fn name(&self) -> &'static str {
        ENGINE_NAME
    }

    async fn recognize(
        &self,
        image: &[u8],
        config: RecognitionConfig,
        whitelist: &str,
    ) -> OcrResult<RawRecognition> {
        debug!(
            "tesseract --psm {} --oem {}",
            config.segmentation.code(),
            config.engine.code()
        );

        let tsv = tokio::time::timeout(self.timeout, self.run(image, config, whitelist))
            .await
            .map_err(|_| OcrError::Unreachable {
                engine: ENGINE_NAME,
                reason: format!("超时 ({:?})", self.timeout),
            })??;

        Ok(parse_tsv(&tsv))
    }
}

/// 解析 `tsv` 输出：拼接 level 5（单词）行的文本，置信度取平均
fn parse_tsv(tsv: &str) -> RawRecognition {
    let mut words = Vec::new();
    let mut confidences = Vec::new();

    for line in tsv.lines().skip(1) {
        let columns: Vec<&str> = line.split('\t').collect();
        if columns.len() < 12 || columns[0] != "5" {
            continue;
        }
        let Ok(conf) = columns[10].parse::<f32>() else {
            continue;
        };
        let text = columns[11].trim();
        if conf < 0.0 || text.is_empty() {
            continue;
        }
        words.push(text);
        confidences.push(conf);
    }

    let confidence = if confidences.is_empty() {
        0.0
    } else {
        confidences.iter().sum::<f32>() / confidences.len() as f32
    };

    RawRecognition {
        text: words.join(" "),
        confidence,
    }
}
