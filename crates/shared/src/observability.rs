//! # Observability 基盤
//!
//! トレーシング初期化と、リクエスト単位のスパン・Request ID の生成を提供する。
//!
//! ## ログに載るフィールド
//!
//! | フィールド | 出どころ |
//! |-----------|---------|
//! | `service` / `version` | [`RequestSpan`]（起動時に決まる値） |
//! | `request_id` | `x-request-id` ヘッダー（[`MakeRequestUuidV7`] が未指定時に採番） |
//! | `method` / `path` | リクエスト行。クエリ文字列はログに残さない |
//!
//! バックグラウンド配送のログも受付時のスパンを引き継ぐため、同じ `request_id` で追跡できる。

/// Request ID を運ぶ HTTP ヘッダー名
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// `RUST_LOG` 未設定時のフィルタ
///
/// ターゲットはクレート名（ハイフンはアンダースコア）で一致させる。
pub const DEFAULT_LOG_FILTER: &str =
    "info,pingmailer_relay=debug,pingmailer_infra=debug,pingmailer_shared=debug";

/// ログ出力形式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// 1 行 1 JSON（ログ収集基盤向け）
    Json,
    /// 人間が読む形式（ローカル開発向け）
    #[default]
    Pretty,
}

impl LogFormat {
    /// `LOG_FORMAT` の値を解釈する。大文字小文字と前後の空白は区別しない
    ///
    /// 不明な値は Pretty にする。サブスクライバの初期化前なので警告は stderr に出す。
    pub fn parse(s: &str) -> Self {
        let normalized = s.trim();
        if normalized.eq_ignore_ascii_case("json") {
            Self::Json
        } else if normalized.eq_ignore_ascii_case("pretty") {
            Self::Pretty
        } else {
            eprintln!("WARNING: unknown LOG_FORMAT={s:?}, falling back to pretty");
            Self::Pretty
        }
    }

    pub fn from_env() -> Self {
        std::env::var("LOG_FORMAT")
            .map(|val| Self::parse(&val))
            .unwrap_or_default()
    }
}

/// トレーシング初期化設定
#[derive(Debug, Clone)]
pub struct TracingConfig {
    pub log_format:     LogFormat,
    /// `RUST_LOG` が未設定または不正なときに使うフィルタ
    pub default_filter: String,
}

impl TracingConfig {
    pub fn from_env() -> Self {
        Self {
            log_format:     LogFormat::from_env(),
            default_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

/// グローバルサブスクライバを登録する
///
/// JSON ではイベントのフィールドをトップレベルに展開し、現在のリクエストスパン
/// （`service` / `request_id` など）を `span` として添える。
#[cfg(feature = "observability")]
pub fn init_tracing(config: TracingConfig) {
    use tracing_subscriber::{Layer as _, layer::SubscriberExt, util::SubscriberInitExt};

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.default_filter));

    let fmt_layer = match config.log_format {
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .flatten_event(true)
            .with_current_span(true)
            .with_span_list(false)
            .boxed(),
        LogFormat::Pretty => tracing_subscriber::fmt::layer().with_target(false).boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}

/// UUID v7 で Request ID を生成する `MakeRequestId` 実装
///
/// 時刻順にソート可能なため、ログを Request ID で並べても到着順になる。
#[cfg(feature = "observability")]
#[derive(Debug, Clone, Copy, Default)]
pub struct MakeRequestUuidV7;

#[cfg(feature = "observability")]
impl tower_http::request_id::MakeRequestId for MakeRequestUuidV7 {
    fn make_request_id<B>(
        &mut self,
        _request: &http::Request<B>,
    ) -> Option<tower_http::request_id::RequestId> {
        let id = uuid::Uuid::now_v7().to_string();
        http::HeaderValue::from_str(&id)
            .ok()
            .map(tower_http::request_id::RequestId::new)
    }
}

/// `TraceLayer::make_span_with` に渡すリクエストスパン
///
/// `SetRequestIdLayer` より内側で使う。外側で付与された `x-request-id` をスパンに含める。
#[cfg(feature = "observability")]
#[derive(Debug, Clone)]
pub struct RequestSpan {
    service: &'static str,
    version: String,
}

#[cfg(feature = "observability")]
impl RequestSpan {
    pub fn new(service: &'static str, version: impl Into<String>) -> Self {
        Self {
            service,
            version: version.into(),
        }
    }
}

#[cfg(feature = "observability")]
impl<B> tower_http::trace::MakeSpan<B> for RequestSpan {
    fn make_span(&mut self, request: &http::Request<B>) -> tracing::Span {
        let request_id = request
            .headers()
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("-");

        tracing::info_span!(
            "request",
            service = self.service,
            version = %self.version,
            method = %request.method(),
            path = request.uri().path(),
            request_id = %request_id,
        )
    }
}
