//! # リレーのエラー定義
//!
//! リレー固有のエラーと、HTTP レスポンス（RFC 9457）への変換を定義する。
//!
//! | エラー | ステータス |
//! |-------|-----------|
//! | リクエスト検証 | 400 |
//! | 認証 | 401 |
//! | テンプレート | 500 |
//! | 配送（同期モードのみ） | 500 |

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use pingmailer_domain::notification::{DeliveryError, RequestError, TemplateError};
use pingmailer_shared::{
    ErrorResponse,
    event_log::error::{category, kind},
};
use thiserror::Error;

/// リレーで発生するエラー
#[derive(Debug, Error)]
pub enum RelayError {
    /// リクエスト検証エラー
    #[error(transparent)]
    BadRequest(#[from] RequestError),

    /// 認証エラー（detail は認証ゲートが決める）
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// テンプレートエラー
    #[error(transparent)]
    Template(#[from] TemplateError),

    /// 配送エラー
    #[error(transparent)]
    Delivery(#[from] DeliveryError),
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let body = match &self {
            RelayError::BadRequest(e) => ErrorResponse::bad_request(e.to_string()),
            RelayError::Unauthorized(detail) => ErrorResponse::unauthorized(detail.clone()),
            RelayError::Template(e) => {
                tracing::error!(
                    error.category = category::INTERNAL,
                    error.kind = kind::TEMPLATE,
                    error = %e,
                    "テンプレートのレンダリングに失敗"
                );
                ErrorResponse::template_error(e.to_string())
            }
            RelayError::Delivery(e) => {
                tracing::error!(
                    error.category = category::EXTERNAL_SERVICE,
                    error.kind = kind::SMTP_DELIVERY,
                    error = %e,
                    "メール配送に失敗"
                );
                ErrorResponse::delivery_failed()
            }
        };

        let status =
            StatusCode::from_u16(body.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(body)).into_response()
    }
}
