//! # サーバー起動とグレースフルシャットダウン
//!
//! TLS 設定があれば HTTPS、なければ HTTP で待ち受ける。
//!
//! SIGINT / SIGTERM を受けると新規接続の受付を止め、開いている接続の終了を猶予時間まで待つ。
//! その後、バックグラウンド配送の完了を同じ猶予時間まで待ってから終了する。

use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Context as _;
use axum::Router;
use axum_server::{Handle, tls_rustls::RustlsConfig};

use crate::{config::RelayConfig, usecase::notification::NotificationService};

/// サーバーを起動し、シャットダウンが完了するまで待つ
pub async fn serve(
    config: &RelayConfig,
    app: Router,
    service: Arc<NotificationService>,
) -> anyhow::Result<()> {
    let addr = resolve_addr(&config.host, config.port).await?;

    let handle = Handle::new();
    tokio::spawn(graceful_shutdown(handle.clone(), config.shutdown_grace));

    match &config.tls {
        Some(tls) => {
            let rustls = RustlsConfig::from_pem_file(&tls.cert_file, &tls.key_file)
                .await
                .with_context(|| {
                    format!(
                        "TLS 証明書の読み込みに失敗しました: cert={}, key={}",
                        tls.cert_file.display(),
                        tls.key_file.display()
                    )
                })?;
            tracing::info!("リレーが起動しました: https://{}", addr);
            axum_server::bind_rustls(addr, rustls)
                .handle(handle)
                .serve(app.into_make_service())
                .await?;
        }
        None => {
            tracing::info!("リレーが起動しました: http://{}", addr);
            axum_server::bind(addr)
                .handle(handle)
                .serve(app.into_make_service())
                .await?;
        }
    }

    service.drain(config.shutdown_grace).await;
    tracing::info!("リレーを停止しました");

    Ok(())
}

async fn resolve_addr(host: &str, port: u16) -> anyhow::Result<SocketAddr> {
    tokio::net::lookup_host((host, port))
        .await
        .with_context(|| format!("アドレスの解決に失敗しました: {host}:{port}"))?
        .next()
        .with_context(|| format!("アドレスが見つかりません: {host}:{port}"))
}

async fn graceful_shutdown(handle: Handle, grace: Duration) {
    shutdown_signal().await;
    tracing::info!(
        grace_secs = grace.as_secs(),
        "シャットダウンシグナルを受信: 接続の終了を待機"
    );
    handle.graceful_shutdown(Some(grace));
}

/// SIGINT（Ctrl+C）または SIGTERM を待つ
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Ctrl+C ハンドラの登録に失敗");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "SIGTERM ハンドラの登録に失敗");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
