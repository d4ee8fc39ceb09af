mod config_and_errors {
    use crate::{validate_config, Config, ErrorSeverity, ServiceError, Viewport, SIZE_CEILING};
    use std::time::Duration;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.port, 8080);
        assert_eq!(config.cache_ttl, Duration::from_secs(86_400));
        assert_eq!(config.navigation_timeout, Duration::from_secs(30));
        assert_eq!(config.readiness_timeout, Duration::from_secs(10));
        assert_eq!(config.readiness_selector, "svg");
        assert_eq!(config.size_ceiling, 7_900_000);
        assert_eq!(config.size_ceiling, SIZE_CEILING);
        assert!(config.preflight_probe);
    }

    #[test]
    fn test_viewport_default() {
        let viewport = Viewport::default();
        assert_eq!(viewport.width, 1080);
        assert_eq!(viewport.height, 1080);
        assert_eq!(viewport.device_scale_factor, 2.0);
        assert!(!viewport.mobile);
    }

    #[test]
    fn test_validate_config() {
        assert!(validate_config(&Config::default()).is_ok());

        let config = Config {
            port: 0,
            ..Default::default()
        };
        assert!(validate_config(&config).is_err());

        let config = Config {
            cache_ttl: Duration::from_secs(0),
            ..Default::default()
        };
        assert!(validate_config(&config).is_err());

        let config = Config {
            readiness_selector: String::new(),
            ..Default::default()
        };
        assert!(validate_config(&config).is_err());

        let config = Config {
            viewport: Viewport {
                width: 0,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_chrome_args_generation() {
        let config = Config::default();
        let args = crate::get_chrome_args(&config);

        assert!(args.contains(&"--headless".to_string()));
        assert!(args.contains(&"--no-sandbox".to_string()));
        assert!(args.contains(&"--disable-gpu".to_string()));
        assert!(args.contains(&format!(
            "--window-size={},{}",
            config.viewport.width, config.viewport.height
        )));
    }

    #[test]
    fn test_chrome_args_user_agent() {
        let config = Config {
            user_agent: Some("probe-bot/1.0".to_string()),
            ..Default::default()
        };
        let args = crate::get_chrome_args(&config);
        assert!(args.contains(&"--user-agent=probe-bot/1.0".to_string()));
    }

    #[test]
    fn test_error_classification() {
        assert!(ServiceError::MissingParameter.is_client_error());
        assert!(ServiceError::InvalidUrl("x".to_string()).is_client_error());
        assert!(!ServiceError::NavigationFailed("x".to_string()).is_client_error());

        assert!(ServiceError::ContentNotReady("x".to_string()).is_non_fatal());
        assert!(ServiceError::CacheAccessFailed("x".to_string()).is_non_fatal());
        assert!(!ServiceError::WorkerCrashed("x".to_string()).is_non_fatal());
    }

    #[test]
    fn test_error_severity() {
        assert_eq!(
            ServiceError::InvalidUrl("x".to_string()).severity(),
            ErrorSeverity::Low
        );
        assert_eq!(
            ServiceError::CaptureFailed("x".to_string()).severity(),
            ErrorSeverity::Medium
        );
        assert_eq!(
            ServiceError::BrowserUnavailable("x".to_string()).severity(),
            ErrorSeverity::High
        );
        assert_eq!(
            ServiceError::WorkerCrashed("x".to_string()).severity(),
            ErrorSeverity::High
        );
    }

    #[test]
    fn test_error_kind_tags_are_stable() {
        assert_eq!(ServiceError::MissingParameter.kind(), "missing_parameter");
        assert_eq!(
            ServiceError::NavigationFailed("x".to_string()).kind(),
            "navigation_failed"
        );
        assert_eq!(
            ServiceError::WorkerCrashed("x".to_string()).kind(),
            "worker_crashed"
        );
    }
}

mod quality_ladder {
    use crate::{capture_within_budget, MockBrowserPage, Viewport};
    use mockall::predicate::eq;

    // A small ceiling keeps the fixtures readable; the ladder only ever
    // compares lengths against it.
    const CEILING: usize = 1_000;

    #[tokio::test]
    async fn test_first_capture_under_ceiling_is_kept() {
        let mut page = MockBrowserPage::new();
        page.expect_capture_jpeg()
            .with(eq(100))
            .times(1)
            .returning(|_| Ok(vec![7u8; 900]));
        page.expect_set_viewport().times(0);

        let bytes = capture_within_budget(&page, CEILING, &Viewport::default())
            .await
            .unwrap();
        assert_eq!(bytes, vec![7u8; 900]);
    }

    #[tokio::test]
    async fn test_ladder_stops_after_quality_80() {
        let mut page = MockBrowserPage::new();
        page.expect_capture_jpeg()
            .with(eq(100))
            .times(1)
            .returning(|_| Ok(vec![0u8; 1_500]));
        page.expect_capture_jpeg()
            .with(eq(80))
            .times(1)
            .returning(|_| Ok(vec![1u8; 600]));
        // No viewport change on the first downgrade step.
        page.expect_set_viewport().times(0);

        let bytes = capture_within_budget(&page, CEILING, &Viewport::default())
            .await
            .unwrap();
        assert_eq!(bytes, vec![1u8; 600]);
    }

    #[tokio::test]
    async fn test_ladder_exhaustion_returns_third_capture() {
        let mut page = MockBrowserPage::new();
        page.expect_capture_jpeg()
            .with(eq(100))
            .times(1)
            .returning(|_| Ok(vec![0u8; 1_500]));
        page.expect_capture_jpeg()
            .with(eq(80))
            .times(1)
            .returning(|_| Ok(vec![1u8; 1_400]));
        page.expect_set_viewport()
            .with(eq(1080), eq(1080), eq(1.0))
            .times(1)
            .returning(|_, _, _| Ok(()));
        page.expect_capture_jpeg()
            .with(eq(85))
            .times(1)
            .returning(|_| Ok(vec![2u8; 1_300]));

        // Still over the ceiling: accepted as-is, no fourth attempt.
        let bytes = capture_within_budget(&page, CEILING, &Viewport::default())
            .await
            .unwrap();
        assert_eq!(bytes, vec![2u8; 1_300]);
    }

    #[tokio::test]
    async fn test_capture_error_propagates() {
        let mut page = MockBrowserPage::new();
        page.expect_capture_jpeg()
            .with(eq(100))
            .times(1)
            .returning(|_| Err(crate::ServiceError::CaptureFailed("boom".to_string())));

        let err = capture_within_budget(&page, CEILING, &Viewport::default())
            .await
            .unwrap_err();
        assert!(matches!(err, crate::ServiceError::CaptureFailed(_)));
    }
}

mod cleanup {
    use crate::{
        render_with_session, Config, MockBrowserPage, MockBrowserSession, ServiceError,
    };
    use url::Url;

    fn happy_page_until_capture() -> MockBrowserPage {
        let mut page = MockBrowserPage::new();
        page.expect_set_viewport().returning(|_, _, _| Ok(()));
        page.expect_navigate().returning(|_, _| Ok(()));
        page.expect_wait_for_element().returning(|_, _| Ok(1));
        page.expect_title()
            .returning(|| Some("chart page".to_string()));
        page.expect_capture_jpeg()
            .returning(|_| Err(ServiceError::CaptureFailed("tab gone".to_string())));
        page.expect_close().times(1).returning(|| Ok(()));
        page
    }

    #[tokio::test]
    async fn test_page_and_session_closed_despite_capture_failure() {
        let mut session = MockBrowserSession::new();
        session
            .expect_open_page()
            .times(1)
            .returning(|| Ok(Box::new(happy_page_until_capture())));
        session.expect_is_crashed().return_const(false);
        session.expect_close().times(1).returning(|| Ok(()));

        let url = Url::parse("https://example.com").unwrap();
        let err = render_with_session(&session, &url, &Config::default(), None)
            .await
            .unwrap_err();

        // The original failure survives cleanup.
        assert!(matches!(err, ServiceError::CaptureFailed(_)));
    }

    #[tokio::test]
    async fn test_cleanup_errors_do_not_mask_the_original_failure() {
        let mut session = MockBrowserSession::new();
        session.expect_open_page().times(1).returning(|| {
            let mut page = MockBrowserPage::new();
            page.expect_set_viewport().returning(|_, _, _| Ok(()));
            page.expect_navigate().returning(|_, _| {
                Err(ServiceError::NavigationFailed("dns failure".to_string()))
            });
            page.expect_close()
                .times(1)
                .returning(|| Err(ServiceError::PageError("already closed".to_string())));
            Ok(Box::new(page))
        });
        session.expect_is_crashed().return_const(false);
        session
            .expect_close()
            .times(1)
            .returning(|| Err(ServiceError::PageError("socket dropped".to_string())));

        let url = Url::parse("https://example.com").unwrap();
        let err = render_with_session(&session, &url, &Config::default(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NavigationFailed(_)));
    }

    #[tokio::test]
    async fn test_session_closed_when_page_open_fails() {
        let mut session = MockBrowserSession::new();
        session
            .expect_open_page()
            .times(1)
            .returning(|| Err(ServiceError::PageError("no target".to_string())));
        session.expect_is_crashed().return_const(false);
        session.expect_close().times(1).returning(|| Ok(()));

        let url = Url::parse("https://example.com").unwrap();
        let err = render_with_session(&session, &url, &Config::default(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::PageError(_)));
    }

    #[tokio::test]
    async fn test_dead_worker_retags_failure_as_crash() {
        let mut session = MockBrowserSession::new();
        session
            .expect_open_page()
            .times(1)
            .returning(|| Ok(Box::new(happy_page_until_capture())));
        session.expect_is_crashed().return_const(true);
        session.expect_close().times(1).returning(|| Ok(()));

        let url = Url::parse("https://example.com").unwrap();
        let err = render_with_session(&session, &url, &Config::default(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::WorkerCrashed(_)));
    }

    #[tokio::test]
    async fn test_readiness_timeout_does_not_abort_capture() {
        let mut session = MockBrowserSession::new();
        session.expect_open_page().times(1).returning(|| {
            let mut page = MockBrowserPage::new();
            page.expect_set_viewport().returning(|_, _, _| Ok(()));
            page.expect_navigate().returning(|_, _| Ok(()));
            page.expect_wait_for_element().returning(|_, _| {
                Err(ServiceError::ContentNotReady("no `svg` element".to_string()))
            });
            page.expect_title().returning(|| Some("slow page".to_string()));
            page.expect_body_excerpt()
                .returning(|_| Some("<div>loading</div>".to_string()));
            page.expect_capture_jpeg()
                .returning(|_| Ok(vec![0xFF, 0xD8, 0xFF, 0xE0]));
            page.expect_close().times(1).returning(|| Ok(()));
            Ok(Box::new(page))
        });
        session.expect_is_crashed().return_const(false);
        session.expect_close().times(1).returning(|| Ok(()));

        let url = Url::parse("https://example.com").unwrap();
        let bytes = render_with_session(&session, &url, &Config::default(), None)
            .await
            .unwrap();
        assert_eq!(bytes, vec![0xFF, 0xD8, 0xFF, 0xE0]);
    }
}

mod service_flow {
    use crate::{
        Cache, Config, ImageSource, MemoryCache, MockCache, MockRenderer, ScreenshotService,
        ServiceError,
    };
    use std::sync::Arc;
    use std::time::Duration;

    const JPEG_STUB: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00];

    #[tokio::test]
    async fn test_cache_idempotence_second_request_skips_render() {
        let cache = Arc::new(MemoryCache::new());
        let mut renderer = MockRenderer::new();
        renderer
            .expect_render()
            .times(1)
            .returning(|_| Ok(JPEG_STUB.to_vec()));

        let service = ScreenshotService::new(Config::default(), cache, Arc::new(renderer));

        let first = service.fetch("https://example.com").await.unwrap();
        assert_eq!(first.source, ImageSource::Render);

        // Different spelling, same normalized key.
        let second = service.fetch("HTTPS://example.com/").await.unwrap();
        assert_eq!(second.source, ImageSource::Cache);
        assert_eq!(first.bytes, second.bytes);
    }

    #[tokio::test]
    async fn test_invalid_url_never_reaches_renderer() {
        let cache = Arc::new(MemoryCache::new());
        let renderer = MockRenderer::new();
        let service = ScreenshotService::new(Config::default(), cache, Arc::new(renderer));

        let err = service.fetch("not a url").await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidUrl(_)));
    }

    #[tokio::test]
    async fn test_cache_read_failure_degrades_to_render() {
        let mut cache = MockCache::new();
        cache
            .expect_get()
            .times(1)
            .returning(|_| Err(ServiceError::CacheAccessFailed("store down".to_string())));
        cache
            .expect_put()
            .times(1)
            .returning(|_, _, _| Err(ServiceError::CacheAccessFailed("store down".to_string())));

        let mut renderer = MockRenderer::new();
        renderer
            .expect_render()
            .times(1)
            .returning(|_| Ok(JPEG_STUB.to_vec()));

        let service =
            ScreenshotService::new(Config::default(), Arc::new(cache), Arc::new(renderer));

        // Both the failed read and the failed write are swallowed.
        let outcome = service.fetch("https://example.com").await.unwrap();
        assert_eq!(outcome.source, ImageSource::Render);
        assert_eq!(outcome.bytes, JPEG_STUB.to_vec());
    }

    #[tokio::test]
    async fn test_render_failure_propagates_and_nothing_is_cached() {
        let cache = Arc::new(MemoryCache::new());
        let mut renderer = MockRenderer::new();
        renderer
            .expect_render()
            .times(1)
            .returning(|_| Err(ServiceError::NavigationFailed("timeout".to_string())));

        let service = ScreenshotService::new(Config::default(), cache.clone(), Arc::new(renderer));

        let err = service.fetch("https://example.com").await.unwrap_err();
        assert!(matches!(err, ServiceError::NavigationFailed(_)));
        assert_eq!(cache.get("https://example.com/").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_render_result_is_stored_with_configured_ttl() {
        let mut cache = MockCache::new();
        cache.expect_get().times(1).returning(|_| Ok(None));
        cache
            .expect_put()
            .withf(|key, value, ttl| {
                key == "https://example.com/"
                    && value.as_slice() == JPEG_STUB
                    && *ttl == Duration::from_secs(86_400)
            })
            .times(1)
            .returning(|_, _, _| Ok(()));

        let mut renderer = MockRenderer::new();
        renderer
            .expect_render()
            .times(1)
            .returning(|_| Ok(JPEG_STUB.to_vec()));

        let service =
            ScreenshotService::new(Config::default(), Arc::new(cache), Arc::new(renderer));
        service.fetch("https://example.com").await.unwrap();
    }
}

mod http_responses {
    use crate::{
        screenshot_handler, AppState, Config, MemoryCache, MockRenderer, ScreenshotService,
        ServiceError,
    };
    use axum::extract::{Query, State};
    use axum::response::IntoResponse;
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::time::Instant;

    fn state_with_renderer(renderer: MockRenderer) -> AppState {
        let service = ScreenshotService::new(
            Config::default(),
            Arc::new(MemoryCache::new()),
            Arc::new(renderer),
        );
        let recorder = metrics_exporter_prometheus::PrometheusBuilder::new().build_recorder();
        AppState {
            service: Arc::new(service),
            metrics: recorder.handle(),
            started_at: Instant::now(),
        }
    }

    async fn body_string(response: axum::response::Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_missing_url_parameter() {
        let state = state_with_renderer(MockRenderer::new());

        let response = screenshot_handler(State(state), Query(HashMap::new())).await;

        assert_eq!(response.status(), 400);
        assert_eq!(
            response.headers().get("x-browser-worker").unwrap(),
            "error-no-url"
        );
        let body = body_string(response).await;
        assert!(body.contains("?url="));
    }

    #[tokio::test]
    async fn test_malformed_url() {
        let state = state_with_renderer(MockRenderer::new());
        let mut params = HashMap::new();
        params.insert("url".to_string(), "not a url".to_string());

        let response = screenshot_handler(State(state), Query(params)).await;

        assert_eq!(response.status(), 400);
        let body = body_string(response).await;
        assert!(body.starts_with("Invalid URL:"));
    }

    #[tokio::test]
    async fn test_successful_render_response() {
        let mut renderer = MockRenderer::new();
        renderer
            .expect_render()
            .times(1)
            .returning(|_| Ok(vec![0xFF, 0xD8, 0xFF]));
        let state = state_with_renderer(renderer);

        let mut params = HashMap::new();
        params.insert("url".to_string(), "https://example.com".to_string());

        let response = screenshot_handler(State(state), Query(params)).await;

        assert_eq!(response.status(), 200);
        assert_eq!(
            response.headers().get("content-type").unwrap(),
            "image/jpeg"
        );
        assert_eq!(
            response.headers().get("x-browser-worker").unwrap(),
            "success"
        );
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(bytes.to_vec(), vec![0xFF, 0xD8, 0xFF]);
    }

    #[tokio::test]
    async fn test_worker_crash_response_carries_error_code() {
        let mut renderer = MockRenderer::new();
        renderer
            .expect_render()
            .times(1)
            .returning(|_| Err(ServiceError::WorkerCrashed("handler exited".to_string())));
        let state = state_with_renderer(renderer);

        let mut params = HashMap::new();
        params.insert("url".to_string(), "https://example.com".to_string());

        let response = screenshot_handler(State(state), Query(params)).await;

        assert_eq!(response.status(), 500);
        assert_eq!(response.headers().get("x-error-code").unwrap(), "1042");
        let body = body_string(response).await;
        assert!(body.starts_with("Browser worker crashed:"));
    }

    #[tokio::test]
    async fn test_generic_failure_response() {
        let mut renderer = MockRenderer::new();
        renderer
            .expect_render()
            .times(1)
            .returning(|_| Err(ServiceError::NavigationFailed("refused".to_string())));
        let state = state_with_renderer(renderer);

        let mut params = HashMap::new();
        params.insert("url".to_string(), "https://example.com".to_string());

        let response = screenshot_handler(State(state), Query(params)).await;

        assert_eq!(response.status(), 500);
        assert!(response.headers().get("x-error-code").is_none());
        let content_type = response.headers().get("content-type").unwrap();
        assert!(content_type.to_str().unwrap().starts_with("text/plain"));
        let body = body_string(response).await;
        assert!(body.starts_with("Browser worker error:"));
        assert!(body.contains("refused"));
    }

    #[tokio::test]
    async fn test_error_responses_direct_mapping() {
        // Every taxonomy member maps to a complete response, never a panic.
        let errors = vec![
            ServiceError::MissingParameter,
            ServiceError::InvalidUrl("bad".to_string()),
            ServiceError::BrowserUnavailable("no binding".to_string()),
            ServiceError::NavigationFailed("dns".to_string()),
            ServiceError::CaptureFailed("boom".to_string()),
            ServiceError::WorkerCrashed("dead".to_string()),
            ServiceError::Internal("oops".to_string()),
        ];

        for err in errors {
            let is_client = err.is_client_error();
            let response = err.into_response();
            if is_client {
                assert_eq!(response.status(), 400);
            } else {
                assert_eq!(response.status(), 500);
            }
        }
    }
}
