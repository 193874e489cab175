mod common;

use std::sync::Arc;

use common::*;
use no_llame_check::cache::{MemoryCache, ResultCache};
use no_llame_check::models::CheckOutcome;
use no_llame_check::orchestrator::PhoneCheckService;
use wiremock::matchers::{any, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn service(server: &MockServer, memory: &MemoryCache) -> PhoneCheckService {
    let protocol = protocol(server, FixedEngine::reading("ABC12"));
    PhoneCheckService::new(
        Arc::new(protocol),
        ResultCache::new(Arc::new(memory.clone()), 24),
    )
}

#[tokio::test]
async fn second_check_is_served_from_cache() {
    let server = MockServer::start().await;
    // 门户只应被完整访问一次
    mount_portal(&server, REGISTERED_REPLY, 1).await;

    let memory = MemoryCache::new();
    let service = service(&server, &memory);

    let first = service.check("+598 98 297 150", false).await;
    assert!(first.success);
    assert!(!first.from_cache);
    assert_eq!(first.is_in_record(), Some(true));
    assert_eq!(first.phone_number.as_ref().unwrap().normalized, "98297150");
    assert_eq!(memory.len().await, 1);

    let second = service.check("098297150", false).await;
    assert!(second.success);
    assert!(second.from_cache);
    assert!(second.cached_at.is_some());
    assert!(second.captcha.is_none());
    assert_eq!(second.registry_check, first.registry_check);
}

#[tokio::test]
async fn ignore_cache_still_refreshes_entry() {
    let server = MockServer::start().await;
    mount_portal(&server, NOT_REGISTERED_REPLY, 2).await;

    let memory = MemoryCache::new();
    let service = service(&server, &memory);

    service.check("98297150", false).await;
    let refreshed = service.check("98297150", true).await;

    assert!(!refreshed.from_cache);
    assert_eq!(refreshed.is_in_record(), Some(false));
    assert_eq!(memory.len().await, 1);
}

#[tokio::test]
async fn unresolved_outcome_is_not_cached() {
    let server = MockServer::start().await;
    mount_portal(&server, WRONG_CAPTCHA_REPLY, 10).await;

    let memory = MemoryCache::new();
    let response = service(&server, &memory).check("98297150", false).await;

    assert!(response.success);
    assert_eq!(
        response.registry_check,
        Some(CheckOutcome::Unresolved {
            captcha_solve_attempts: 10
        })
    );
    assert_eq!(response.is_in_record(), None);
    assert_eq!(memory.len().await, 0);
}

#[tokio::test]
async fn structural_error_is_reported_and_not_cached() {
    let server = MockServer::start().await;
    mount_entry(&server).await;
    // 相对地址，且缺少 tokenId
    Mock::given(method("GET"))
        .and(path(page("apia.portal.Frame.run")))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<script>document.getElementById("workArea").src = "apia.execution.WorkArea.run?tabId=T1";</script>"#,
        ))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/apia.execution.WorkArea.run"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let memory = MemoryCache::new();
    let response = service(&server, &memory).check("98297150", false).await;

    assert!(!response.success);
    assert_eq!(response.registry_check, Some(CheckOutcome::TokensNotFound));
    assert_eq!(response.error.as_deref(), Some("tokens_not_found"));
    assert_eq!(memory.len().await, 0);
}

#[tokio::test]
async fn invalid_number_never_reaches_portal() {
    let server = MockServer::start().await;
    mount_portal(&server, REGISTERED_REPLY, 0).await;

    let memory = MemoryCache::new();
    let response = service(&server, &memory).check("hola", false).await;

    assert!(!response.success);
    assert!(response.phone_number.is_none());
    assert!(response.error.is_some());
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn transport_failure_is_reported_in_response() {
    let server = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let memory = MemoryCache::new();
    let response = service(&server, &memory).check("98297150", false).await;

    assert!(!response.success);
    assert!(response.registry_check.is_none());
    assert!(response.error.unwrap().contains("500"));
}
