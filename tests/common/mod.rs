//! 集成测试共用的门户模拟和脚本化 OCR 引擎

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use no_llame_check::config::Config;
use no_llame_check::error::{OcrError, OcrResult};
use no_llame_check::ocr::{
    CaptchaResolver, FallbackGenerator, OcrEngine, OcrPool, RawRecognition, RecognitionConfig,
};
use no_llame_check::portal::SessionProtocol;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const BASE: &str = "/tramites-en-linea/TramitesEnLinea/";
pub const SESSION_COOKIE: &str = "JSESSIONID=abc123";

pub const REGISTERED_REPLY: &str = r#"<html><body><div class="formContainer">
<field attName="RAF_RESPUESTA_STR">El número 98297150 se encuentra en el Registro No llame</field>
</div></body></html>"#;

pub const NOT_REGISTERED_REPLY: &str = r#"<html><body>
<field attName="RAF_RESPUESTA_STR">El número 98297150 no está registrado</field>
</body></html>"#;

pub const WRONG_CAPTCHA_REPLY: &str = "<html><body>Captcha incorrecto</body></html>";

pub fn page(name: &str) -> String {
    format!("{}{}", BASE, name)
}

/// 每次都返回同一段文本的引擎，记录调用次数
pub struct FixedEngine {
    text: Option<String>,
    pub calls: AtomicUsize,
}

impl FixedEngine {
    pub fn reading(text: &str) -> Arc<Self> {
        Arc::new(Self {
            text: Some(text.to_string()),
            calls: AtomicUsize::new(0),
        })
    }

    /// 引擎不可达
    pub fn down() -> Arc<Self> {
        Arc::new(Self {
            text: None,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OcrEngine for FixedEngine {
    fn name(&self) -> &'static str {
        "fixed"
    }

    async fn recognize(
        &self,
        _image: &[u8],
        _config: RecognitionConfig,
        _whitelist: &str,
    ) -> OcrResult<RawRecognition> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.text {
            Some(text) => Ok(RawRecognition {
                text: text.clone(),
                confidence: 90.0,
            }),
            None => Err(OcrError::Unreachable {
                engine: "fixed",
                reason: "connection refused".into(),
            }),
        }
    }
}

pub fn test_config(server: &MockServer) -> Config {
    Config {
        portal_origin: server.uri(),
        captcha_backoff_ms: 0,
        request_timeout_secs: 5,
        fallback_timeout_secs: 5,
        ..Config::default()
    }
}

pub fn protocol(server: &MockServer, engine: Arc<FixedEngine>) -> SessionProtocol {
    protocol_with(&test_config(server), engine)
}

pub fn protocol_with(config: &Config, engine: Arc<FixedEngine>) -> SessionProtocol {
    let resolver = CaptchaResolver::new(OcrPool::new(engine, 4), FallbackGenerator::seeded(0));
    SessionProtocol::from_config(config, resolver).unwrap()
}

/// 只会说明文 HTTP 的端口：收到 ClientHello 后回一行 HTTP 并断开，`hold` 不为空时先挂起
///
/// 返回端口号和已接受的连接数
pub async fn plaintext_listener(hold: Option<std::time::Duration>) -> (u16, Arc<AtomicUsize>) {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let accepted = Arc::new(AtomicUsize::new(0));
    let counter = accepted.clone();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            counter.fetch_add(1, Ordering::SeqCst);
            tokio::spawn(async move {
                let mut hello = [0u8; 1024];
                let _ = socket.read(&mut hello).await;
                if let Some(hold) = hold {
                    tokio::time::sleep(hold).await;
                }
                let _ = socket.write_all(b"HTTP/1.1 400 Bad Request\r\n\r\n").await;
                let _ = socket.shutdown().await;
            });
        }
    });
    (port, accepted)
}

/// 入口页：一个 iframe，并下发会话 cookie
pub async fn mount_entry(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path(page("apia.portal.PortalAction.run")))
        .and(query_param("dshId", "1057"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("set-cookie", format!("{}; Path=/; HttpOnly", SESSION_COOKIE))
                .set_body_string(
                    r#"<html><body><iframe id="main" src="apia.portal.Frame.run?dshId=1057"></iframe></body></html>"#,
                ),
        )
        .mount(server)
        .await;
}

/// iframe 页面：脚本里给出 workArea 地址
pub async fn mount_frame(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path(page("apia.portal.Frame.run")))
        .and(header("cookie", SESSION_COOKIE))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<html><script>
                function load() {
                    document.getElementById('workArea').src = "/tramites-en-linea/TramitesEnLinea/apia.execution.WorkArea.run?tabId=T1&tokenId=K1";
                }
            </script></html>"#,
        ))
        .mount(server)
        .await;
}

/// workArea、号码提交、待签名表单、验证码图片
pub async fn mount_session_steps(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path(page("apia.execution.WorkArea.run")))
        .and(query_param("tabId", "T1"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>workarea</html>"))
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path(page("apia.execution.FormAction.run")))
        .and(query_param("action", "processFieldSubmit"))
        .and(query_param("tokenId", "K1"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<response/>"))
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path(page("apia.execution.TaskAction.run")))
        .and(query_param("action", "hasSignableForms"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<signable>false</signable>"))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path(page("captchaImg")))
        .and(query_param("captchaName", "T1E_6619"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "image/png")
                .set_body_bytes(vec![0x89, b'P', b'N', b'G']),
        )
        .mount(server)
        .await;
}

/// 完整门户，最后一步返回 `reply`，期望被调用 `expected` 次
pub async fn mount_portal(server: &MockServer, reply: &str, expected: u64) {
    mount_entry(server).await;
    mount_frame(server).await;
    mount_session_steps(server).await;

    Mock::given(method("POST"))
        .and(path(page("apia.execution.TaskAction.run")))
        .and(query_param("action", "gotoNextStep"))
        .and(query_param("currentTab", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_string(reply.to_string()))
        .expect(expected)
        .mount(server)
        .await;
}
