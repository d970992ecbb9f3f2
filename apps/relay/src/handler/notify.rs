//! # 通知ハンドラ
//!
//! `POST /notify` のボディを検証し、通知サービスに渡す。
//!
//! | 結果 | ステータス | ボディ |
//! |-----|-----------|-------|
//! | 同期配送の完了 | 200 | `Email sent successfully`（text/plain） |
//! | バックグラウンド配送に受付 | 202 | `{"status":"ok","message":"Email queued successfully"}` |
//! | 検証エラー | 400 | [`pingmailer_shared::ErrorResponse`] |
//! | テンプレート / 同期配送エラー | 500 | [`pingmailer_shared::ErrorResponse`] |

use std::sync::Arc;

use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::{
    error::RelayError,
    usecase::notification::{DispatchOutcome, NotificationRequest, NotificationService},
};

/// 同期配送完了時のボディ
const SENT_MESSAGE: &str = "Email sent successfully";

/// 通知ハンドラの State
pub struct NotifyState {
    pub service: Arc<NotificationService>,
}

/// 202 Accepted のボディ
#[derive(Debug, Serialize)]
struct QueuedResponse {
    status:  &'static str,
    message: &'static str,
}

/// 通知メールを送信する
#[tracing::instrument(skip_all)]
pub async fn notify(
    State(state): State<Arc<NotifyState>>,
    body: Bytes,
) -> Result<Response, RelayError> {
    let notification = NotificationRequest::decode(&body)?.validate()?;

    let response = match state.service.dispatch(notification).await? {
        DispatchOutcome::Delivered => (StatusCode::OK, SENT_MESSAGE).into_response(),
        DispatchOutcome::Queued => (
            StatusCode::ACCEPTED,
            Json(QueuedResponse {
                status:  "ok",
                message: "Email queued successfully",
            }),
        )
            .into_response(),
    };

    Ok(response)
}
