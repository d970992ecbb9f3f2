//! # リレーアプリケーション構築
//!
//! DI（検証器・トランスポート・サービス）の初期化とルーター構築を担当する。
//! `main.rs` は設定読み込みとサーバー起動に集中する。

use std::{sync::Arc, time::Duration};

use anyhow::Context as _;
use axum::{
    Router,
    http::StatusCode,
    middleware::from_fn_with_state,
    routing::{get, post},
};
use pingmailer_domain::clock::{Clock, SystemClock};
use pingmailer_infra::{
    ApplicationTokenCache,
    ClientCredentialsValidator,
    DeliveryEngine,
    IntrospectionValidator,
    MailTransport,
    TokenValidator,
    notification::{NoopMailTransport, SmtpMailTransport},
    token::http_client,
};
use pingmailer_shared::observability::{MakeRequestUuidV7, RequestSpan};
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::{
    config::{MailTransportKind, OAuth2Config, RelayConfig},
    handler::{HealthState, NotifyState, health_check, notify},
    middleware::{AuthState, require_bearer_token},
    usecase::notification::{NotificationService, TemplateRenderer},
};

/// ログのスパンに載せるサービス名
pub const SERVICE_NAME: &str = "pingmailer-relay";

/// リクエスト処理全体のタイムアウト
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// 起動時に組み立てる依存
pub struct RelayComponents {
    pub validator: Arc<dyn TokenValidator>,
    pub service:   Arc<NotificationService>,
}

/// ルーター構築に必要な設定
#[derive(Debug, Clone)]
pub struct RouterConfig {
    pub version:          String,
    pub echo_auth_errors: bool,
    pub dev_auth_bypass:  bool,
}

impl From<&RelayConfig> for RouterConfig {
    fn from(config: &RelayConfig) -> Self {
        Self {
            version:          config.version.clone(),
            echo_auth_errors: config.echo_auth_errors,
            dev_auth_bypass:  config.dev_auth_bypass,
        }
    }
}

/// 設定から依存を組み立てる
pub fn build_components(config: &RelayConfig) -> anyhow::Result<RelayComponents> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let validator = build_validator(&config.oauth2, clock)?;

    let transport: Arc<dyn MailTransport> = match config.mail_transport {
        MailTransportKind::Smtp => Arc::new(SmtpMailTransport::new()),
        MailTransportKind::Noop => {
            tracing::warn!("MAIL_TRANSPORT=noop: メールは送信されずログ出力のみ行われます");
            Arc::new(NoopMailTransport)
        }
    };

    let renderer = TemplateRenderer::new().context("組み込みテンプレートのパースに失敗しました")?;
    let service = Arc::new(NotificationService::new(
        renderer,
        DeliveryEngine::new(transport),
        config.delivery_mode,
    ));

    tracing::info!(
        delivery_mode = ?config.delivery_mode,
        mail_transport = ?config.mail_transport,
        "通知サービスを初期化"
    );

    Ok(RelayComponents { validator, service })
}

fn build_validator(
    oauth2: &OAuth2Config,
    clock: Arc<dyn Clock>,
) -> anyhow::Result<Arc<dyn TokenValidator>> {
    let client = http_client().context("HTTP クライアントの作成に失敗しました")?;

    let validator: Arc<dyn TokenValidator> = match oauth2 {
        OAuth2Config::Introspection {
            introspect_url,
            expectations,
        } => {
            tracing::info!(
                introspect_url = %introspect_url,
                expected_audience = ?expectations.audience,
                expected_issuer = ?expectations.issuer,
                "イントロスペクションでトークンを検証します"
            );
            Arc::new(IntrospectionValidator::new(
                client,
                introspect_url.clone(),
                expectations.clone(),
                clock,
            ))
        }
        OAuth2Config::ClientCredentials(credentials) => {
            tracing::warn!(
                token_url = %credentials.token_url,
                client_id = %credentials.client_id,
                "client credentials 方式: リレー自身のアプリケーショントークンを持つ呼び出し元だけが通過できます"
            );
            Arc::new(ClientCredentialsValidator::new(
                client,
                credentials.clone(),
                Arc::new(ApplicationTokenCache::new()),
                clock,
            ))
        }
    };

    Ok(validator)
}

/// ルーターを構築する
///
/// `/notify` の認証はメソッドルーターに付けるため、POST 以外は認証より先に 405 になる。
pub fn build_router(
    config: RouterConfig,
    validator: Arc<dyn TokenValidator>,
    service: Arc<NotificationService>,
) -> Router {
    let request_span = RequestSpan::new(SERVICE_NAME, config.version.clone());
    let health_state = Arc::new(HealthState {
        version: config.version,
    });
    let notify_state = Arc::new(NotifyState { service });

    let notify_route = if config.dev_auth_bypass {
        tracing::warn!("========================================");
        tracing::warn!("⚠️  DEV_AUTH_BYPASS が有効です！");
        tracing::warn!("   /notify は認証なしで受け付けます");
        tracing::warn!("   本番環境では絶対に有効にしないでください");
        tracing::warn!("========================================");
        post(notify)
    } else {
        let auth_state = AuthState {
            validator,
            echo_errors: config.echo_auth_errors,
        };
        post(notify).route_layer(from_fn_with_state(auth_state, require_bearer_token))
    };

    // Request ID レイヤー（下に書いたものが外側）
    // 1. SetRequestIdLayer（最外）: UUID v7 を生成（クライアント提供値があればそれを使う）
    // 2. TraceLayer: スパンに service / request_id / path を含める
    // 3. PropagateRequestIdLayer: レスポンスヘッダーに x-request-id をコピー
    // 4. TimeoutLayer: 30 秒を超えたリクエストは 408
    Router::new()
        .route("/health", get(health_check))
        .with_state(health_state)
        .merge(
            Router::new()
                .route("/notify", notify_route)
                .with_state(notify_state),
        )
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            REQUEST_TIMEOUT,
        ))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http().make_span_with(request_span))
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV7))
}
