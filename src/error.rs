use thiserror::Error;

/// 应用程序错误类型
///
/// 结构性问题（找不到 iframe、脚本、令牌）和"查询未决"都不是错误，
/// 它们是 [`crate::models::CheckOutcome`] 的变体。
#[derive(Debug, Error)]
pub enum AppError {
    /// 号码格式错误
    #[error("号码校验错误: {0}")]
    Validation(#[from] ValidationError),
    /// 网络传输错误（超时、DNS、TLS、异常状态码）
    #[error("传输错误: {0}")]
    Transport(#[from] TransportError),
    /// 验证码无法识别
    #[error("验证码错误: {0}")]
    Captcha(#[from] CaptchaError),
    /// 缓存错误（只在 cache 模块内部出现）
    #[error("缓存错误: {0}")]
    Cache(#[from] CacheError),
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
}

/// 号码校验错误
#[derive(Debug, Error)]
pub enum ValidationError {
    /// 无法解析为电话号码
    #[error("无法解析号码 '{input}': {reason}")]
    Unparseable { input: String, reason: String },
    /// 号码在乌拉圭编号计划中无效
    #[error("号码 '{input}' 不是有效的乌拉圭号码")]
    InvalidForRegion { input: String },
    /// 号码属于其他国家
    #[error("号码 '{input}' 不属于乌拉圭")]
    ForeignNumber { input: String },
}

/// 网络传输错误
#[derive(Debug, Error)]
pub enum TransportError {
    /// 请求失败（超时、连接、TLS 等）
    #[error("请求 {url} 失败: {source}")]
    RequestFailed {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    /// 远端返回了不可接受的状态码
    #[error("请求 {url} 返回状态码 {status}")]
    BadStatus { url: String, status: u16 },
    /// 构建 HTTP 客户端失败
    #[error("无法构建 HTTP 客户端 ({profile}): {source}")]
    ClientBuild {
        profile: &'static str,
        #[source]
        source: reqwest::Error,
    },
    /// URL 无法解析
    #[error("无效的 URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
}

/// 验证码错误
#[derive(Debug, Error)]
pub enum CaptchaError {
    /// 内层重试耗尽仍未得到可用的验证码文本
    #[error("第 {outer_attempt} 轮验证码在 {inner_attempts} 次识别后仍无法解出: {reason}")]
    Unsolvable {
        outer_attempt: u32,
        inner_attempts: u32,
        reason: String,
    },
}

/// OCR 引擎错误
#[derive(Debug, Error)]
pub enum OcrError {
    /// 引擎不可达（进程无法启动、HTTP 连接失败、超时）
    #[error("OCR 引擎不可达 ({engine}): {reason}")]
    Unreachable { engine: &'static str, reason: String },
    /// 引擎返回错误
    #[error("OCR 引擎返回错误 ({engine}): {reason}")]
    Engine { engine: &'static str, reason: String },
    /// 工作池已关闭或任务崩溃
    #[error("OCR 工作池错误: {0}")]
    Pool(String),
}

/// 缓存错误
#[derive(Debug, Error)]
pub enum CacheError {
    /// 后端不可达或执行失败
    #[error("缓存后端 {backend} 操作失败: {reason}")]
    Backend { backend: &'static str, reason: String },
    /// 存储的记录结构损坏
    #[error("缓存后端 {backend} 中的记录 {key} 已损坏: {reason}")]
    Corrupt {
        backend: &'static str,
        key: String,
        reason: String,
    },
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 读取配置文件失败
    #[error("无法读取配置文件 {path}: {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// TOML 解析失败
    #[error("配置文件 {path} 解析失败: {source}")]
    TomlParseFailed {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    /// 页面提取规则（正则、选择器）无效
    #[error("无效的提取规则 '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },
    /// 配置项取值超出允许范围
    #[error("配置项 {key} 取值无效: {reason}")]
    InvalidValue { key: &'static str, reason: String },
}

// ========== 便捷构造函数 ==========

impl AppError {
    /// 创建请求失败错误
    pub fn request_failed(url: impl Into<String>, source: reqwest::Error) -> Self {
        AppError::Transport(TransportError::RequestFailed {
            url: url.into(),
            source,
        })
    }

    /// 创建状态码错误
    pub fn bad_status(url: impl Into<String>, status: u16) -> Self {
        AppError::Transport(TransportError::BadStatus {
            url: url.into(),
            status,
        })
    }

    /// 创建 URL 无效错误
    pub fn invalid_url(url: impl Into<String>, reason: impl ToString) -> Self {
        AppError::Transport(TransportError::InvalidUrl {
            url: url.into(),
            reason: reason.to_string(),
        })
    }

    /// 是否为传输层错误
    pub fn is_transport(&self) -> bool {
        matches!(self, AppError::Transport(_))
    }
}

impl CacheError {
    /// 创建后端错误
    pub fn backend(backend: &'static str, reason: impl ToString) -> Self {
        CacheError::Backend {
            backend,
            reason: reason.to_string(),
        }
    }

    /// 创建记录损坏错误
    pub fn corrupt(backend: &'static str, key: impl Into<String>, reason: impl ToString) -> Self {
        CacheError::Corrupt {
            backend,
            key: key.into(),
            reason: reason.to_string(),
        }
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;

/// 缓存操作结果类型
pub type CacheResult<T> = Result<T, CacheError>;

/// OCR 操作结果类型
pub type OcrResult<T> = Result<T, OcrError>;
