//! # ヘルスチェックハンドラ
//!
//! `/health` は認証なしで常に `{"status":"ok","version":...}` を返す。
//! 依存先（認可サーバー、SMTP）の状態は確認しない。

use std::sync::Arc;

use axum::{Json, extract::State};
use pingmailer_shared::HealthResponse;

/// ヘルスチェック用の State
pub struct HealthState {
    pub version: String,
}

/// リレーのヘルスチェックエンドポイント
pub async fn health_check(State(state): State<Arc<HealthState>>) -> Json<HealthResponse> {
    Json(HealthResponse::ok(state.version.clone()))
}
