//! 验证码识别与候选排序

use std::sync::Arc;

use phf::phf_ordered_map;
use tracing::{debug, warn};

use super::engine::{RecognitionConfig, RECOGNITION_CONFIGS};
use super::fallback::FallbackGenerator;
use super::pool::OcrPool;

/// 识别时允许的字符
pub const CAPTCHA_WHITELIST: &str =
    "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// 占位猜测的候选使用的 config_id
pub const FALLBACK_CONFIG_ID: usize = usize::MAX;

/// 容易混淆的字符对，双向各一条
///
/// 目前只用来计算 [`Candidate::alternatives`]，不参与排序也不会被提交。
static AMBIGUOUS_CHARS: phf::OrderedMap<char, char> = phf_ordered_map! {
    '0' => 'O',
    'O' => '0',
    '1' => 'I',
    'I' => '1',
    '5' => 'S',
    'S' => '5',
    '6' => 'G',
    'G' => '6',
    '8' => 'B',
    'B' => '8',
    '2' => 'Z',
    'Z' => '2',
};

/// 一类验证码的识别约束
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CaptchaProfile {
    pub whitelist: &'static str,
    pub min_len: usize,
    pub max_len: usize,
    /// 理想长度，排序时按 `|len - ideal_len|` 升序
    pub ideal_len: f32,
}

impl CaptchaProfile {
    /// 门户验证码：4-8 位字母数字，理想长度 5.5
    pub const PORTAL: CaptchaProfile = CaptchaProfile {
        whitelist: CAPTCHA_WHITELIST,
        min_len: 4,
        max_len: 8,
        ideal_len: 5.5,
    };

    fn accepts(&self, text: &str) -> bool {
        (self.min_len..=self.max_len).contains(&text.chars().count())
    }
}

/// 一个识别候选
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub text: String,
    pub confidence: f32,
    pub config_id: usize,
    /// 按混淆表替换后的其他拼写
    pub alternatives: Vec<String>,
}

/// 候选来源
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionSource {
    /// 真实 OCR 结果
    Ocr,
    /// 引擎不可用时的占位猜测
    Fallback,
}

/// 一张验证码图片的识别结果
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    /// 已排序，第一个即选中的文本
    pub candidates: Vec<Candidate>,
    pub source: ResolutionSource,
}

impl Resolution {
    pub fn chosen(&self) -> Option<&Candidate> {
        self.candidates.first()
    }

    /// 选中的文本，没有候选时为空串
    pub fn chosen_text(&self) -> &str {
        self.chosen().map(|c| c.text.as_str()).unwrap_or("")
    }

    pub fn is_fallback(&self) -> bool {
        self.source == ResolutionSource::Fallback
    }
}

/// 验证码识别器
#[derive(Clone)]
pub struct CaptchaResolver {
    pool: OcrPool,
    fallback: FallbackGenerator,
    configs: Vec<RecognitionConfig>,
}

impl CaptchaResolver {
    pub fn new(pool: OcrPool, fallback: FallbackGenerator) -> Self {
        Self {
            pool,
            fallback,
            configs: RECOGNITION_CONFIGS.to_vec(),
        }
    }

    /// 用全部参数组识别图片并排序
    ///
    /// 所有参数组都报错（引擎不可用）时改用占位猜测；
    /// 引擎正常但没有合格候选时返回空列表。
    pub async fn resolve(&self, image: &[u8], profile: &CaptchaProfile) -> Resolution {
        let image: Arc<[u8]> = Arc::from(image);
        let results = self
            .pool
            .recognize_all(image, &self.configs, Arc::from(profile.whitelist))
            .await;

        let mut candidates = Vec::new();
        let mut engine_failures = 0;
        for (config, result) in results {
            match result {
                Ok(raw) => {
                    let text = clean_text(&raw.text);
                    debug!(
                        "OCR config {} (psm {}): '{}' -> '{}' ({:.1})",
                        config.id,
                        config.segmentation.code(),
                        raw.text.trim(),
                        text,
                        raw.confidence
                    );
                    if profile.accepts(&text) {
                        candidates.push(Candidate {
                            alternatives: ambiguous_spellings(&text),
                            text,
                            confidence: raw.confidence,
                            config_id: config.id,
                        });
                    }
                }
                Err(e) => {
                    engine_failures += 1;
                    warn!("OCR config {} 识别失败: {}", config.id, e);
                }
            }
        }

        if engine_failures == self.configs.len() {
            let guess = self.fallback.generate();
            warn!(
                target: "captcha_fallback",
                engine = self.pool.engine_name(),
                "⚠️ OCR 引擎不可用，使用占位猜测 '{}'",
                guess
            );
            return Resolution {
                candidates: vec![Candidate {
                    text: guess,
                    confidence: 0.0,
                    config_id: FALLBACK_CONFIG_ID,
                    alternatives: Vec::new(),
                }],
                source: ResolutionSource::Fallback,
            };
        }

        rank_candidates(&mut candidates, profile.ideal_len);
        Resolution {
            candidates,
            source: ResolutionSource::Ocr,
        }
    }
}

/// 去掉所有非字母数字字符
pub fn clean_text(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_alphanumeric()).collect()
}

/// 排序：长度离理想值越近越靠前，其次置信度降序，再相同则保持参数组顺序
pub fn rank_candidates(candidates: &mut [Candidate], ideal_len: f32) {
    let distance = |c: &Candidate| (c.text.chars().count() as f32 - ideal_len).abs();
    candidates.sort_by(|a, b| {
        distance(a)
            .total_cmp(&distance(b))
            .then_with(|| b.confidence.total_cmp(&a.confidence))
    });
}

/// 每个出现在文本中的混淆字符，整体替换一次得到一个拼写
pub fn ambiguous_spellings(text: &str) -> Vec<String> {
    AMBIGUOUS_CHARS
        .entries()
        .filter(|(from, _)| text.contains(**from))
        .map(|(from, to)| text.replace(*from, &to.to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{OcrError, OcrResult};
    use crate::ocr::engine::{OcrEngine, RawRecognition};
    use async_trait::async_trait;

    fn candidate(text: &str, confidence: f32, config_id: usize) -> Candidate {
        Candidate {
            text: text.to_string(),
            confidence,
            config_id,
            alternatives: Vec::new(),
        }
    }

    #[test]
    fn ranking_prefers_length_then_confidence() {
        let mut candidates = vec![
            candidate("AB12", 70.0, 0),
            candidate("ABC123", 90.0, 1),
            candidate("ABCDE", 60.0, 2),
        ];
        rank_candidates(&mut candidates, 5.5);
        let order: Vec<&str> = candidates.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(order, ["ABC123", "ABCDE", "AB12"]);
    }

    #[test]
    fn ranking_ties_keep_config_order() {
        let mut candidates = vec![candidate("XYZ12", 80.0, 0), candidate("QWE34", 80.0, 1)];
        rank_candidates(&mut candidates, 5.5);
        assert_eq!(candidates[0].config_id, 0);
    }

    #[test]
    fn cleaning_keeps_only_alphanumerics() {
        assert_eq!(clean_text(" a-B 3.\n4_ñ"), "aB34");
    }

    #[test]
    fn ambiguous_spellings_follow_table_order() {
        assert_eq!(ambiguous_spellings("B0S"), ["BOS", "B05", "80S"]);
        assert!(ambiguous_spellings("XYW").is_empty());
    }

    /// 按参数组返回固定文本
    struct ScriptedEngine(Vec<OcrResult<RawRecognition>>);

    #[async_trait]
    impl OcrEngine for ScriptedEngine {
        fn name(&self) -> &'static str {
            "scripted"
        }

        async fn recognize(
            &self,
            _image: &[u8],
            config: RecognitionConfig,
            _whitelist: &str,
        ) -> OcrResult<RawRecognition> {
            match &self.0[config.id] {
                Ok(raw) => Ok(raw.clone()),
                Err(_) => Err(OcrError::Unreachable {
                    engine: "scripted",
                    reason: "down".into(),
                }),
            }
        }
    }

    fn raw(text: &str, confidence: f32) -> OcrResult<RawRecognition> {
        Ok(RawRecognition {
            text: text.into(),
            confidence,
        })
    }

    fn down() -> OcrResult<RawRecognition> {
        Err(OcrError::Unreachable {
            engine: "scripted",
            reason: "down".into(),
        })
    }

    fn resolver(script: Vec<OcrResult<RawRecognition>>) -> CaptchaResolver {
        let pool = OcrPool::new(Arc::new(ScriptedEngine(script)), 4);
        CaptchaResolver::new(pool, FallbackGenerator::seeded(0))
    }

    #[tokio::test]
    async fn out_of_range_candidates_are_dropped() {
        let resolution = resolver(vec![
            raw("A B", 99.0),
            raw("K7Q-2X", 55.0),
            raw("TOOLONGTEXT", 99.0),
            raw("", 0.0),
        ])
        .resolve(b"png", &CaptchaProfile::PORTAL)
        .await;

        assert_eq!(resolution.source, ResolutionSource::Ocr);
        assert_eq!(resolution.candidates.len(), 1);
        assert_eq!(resolution.chosen_text(), "K7Q2X");
        assert_eq!(resolution.chosen().unwrap().config_id, 1);
    }

    #[tokio::test]
    async fn nothing_usable_gives_empty_ocr_resolution() {
        let resolution = resolver(vec![raw("", 0.0), down(), raw("?", 1.0), down()])
            .resolve(b"png", &CaptchaProfile::PORTAL)
            .await;

        assert_eq!(resolution.source, ResolutionSource::Ocr);
        assert_eq!(resolution.chosen_text(), "");
    }

    #[tokio::test]
    async fn engine_down_uses_seeded_fallback() {
        let resolution = resolver(vec![down(), down(), down(), down()])
            .resolve(b"png", &CaptchaProfile::PORTAL)
            .await;

        assert!(resolution.is_fallback());
        assert_eq!(resolution.chosen_text(), "9WJ6T");
        assert_eq!(resolution.chosen().unwrap().config_id, FALLBACK_CONFIG_ID);
    }
}
