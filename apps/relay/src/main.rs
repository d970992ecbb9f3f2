//! # Pingmailer リレーサーバー
//!
//! OAuth2 ベアラートークンで保護された通知メールのリレー。
//!
//! ## アーキテクチャ
//!
//! ```text
//! ┌──────────────┐     ┌──────────────┐     ┌──────────────┐
//! │    Caller    │────▶│    Relay     │────▶│ SMTP server  │
//! │              │     │  port: 8080  │     │ (per request)│
//! └──────────────┘     └──────────────┘     └──────────────┘
//!                             │
//!                             ▼
//!                      ┌──────────────┐
//!                      │ OAuth2 server│
//!                      └──────────────┘
//! ```
//!
//! ## 環境変数
//!
//! | 変数名 | 必須 | 説明 |
//! |--------|------|------|
//! | `PINGMAILER_HOST` | No | バインドアドレス（デフォルト: `0.0.0.0`） |
//! | `PINGMAILER_PORT` | No | ポート番号（デフォルト: `8080`） |
//! | `OAUTH2_INTROSPECT_URL` | どちらか | イントロスペクションエンドポイント |
//! | `OAUTH2_TOKEN_URL` / `OAUTH2_CLIENT_ID` / `OAUTH2_CLIENT_SECRET` | どちらか | client credentials |
//! | `TLS_CERT_FILE` / `TLS_KEY_FILE` | No | 両方設定すると HTTPS |
//! | `DELIVERY_MODE` | No | `sync` / `async`（デフォルト: `async`） |
//! | `MAIL_TRANSPORT` | No | `smtp` / `noop`（デフォルト: `smtp`） |
//!
//! 全項目は [`pingmailer_relay::config`] を参照。
//!
//! ## 起動方法
//!
//! ```bash
//! # 開発環境（.env ファイルを使用）
//! cargo run -p pingmailer-relay
//!
//! # 本番環境（環境変数を直接指定）
//! OAUTH2_INTROSPECT_URL=https://auth.example.com/introspect cargo run -p pingmailer-relay --release
//! ```

use anyhow::Context as _;
use pingmailer_relay::{
    app_builder::{RouterConfig, SERVICE_NAME, build_components, build_router},
    config::RelayConfig,
    serve::serve,
};
use pingmailer_shared::observability::{TracingConfig, init_tracing};

/// リレーサーバーのエントリーポイント
///
/// 以下の順序で初期化を行う:
///
/// 1. 環境変数の読み込み（.env ファイル）
/// 2. トレーシングの初期化
/// 3. 設定の読み込みと検証（不備があれば非 0 で終了）
/// 4. 依存の組み立てとルーターの構築
/// 5. サーバーの起動
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env ファイルを読み込む（存在する場合）
    dotenvy::dotenv().ok();

    init_tracing(TracingConfig::from_env());

    let config = RelayConfig::from_env().context("設定の読み込みに失敗しました")?;

    // reqwest / lettre / axum-server が共有する rustls の暗号プロバイダ
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        tracing::debug!("rustls の暗号プロバイダは設定済み");
    }

    tracing::info!(
        service = SERVICE_NAME,
        version = %config.version,
        "リレーを起動します: {}:{}",
        config.host,
        config.port
    );

    let components = build_components(&config)?;
    let app = build_router(
        RouterConfig::from(&config),
        components.validator,
        components.service.clone(),
    );

    serve(&config, app, components.service).await
}
