//! # 認証ミドルウェア
//!
//! `Authorization: Bearer <token>` を取り出して [`TokenValidator`] で検証し、
//! 失敗したリクエストを 401 で拒否する。検証に通ったリクエストはそのまま次に渡す。
//!
//! ## 使い方
//!
//! ```rust,ignore
//! use axum::middleware::from_fn_with_state;
//!
//! let auth_state = AuthState {
//!     validator:   validator.clone(),
//!     echo_errors: false,
//! };
//!
//! Router::new()
//!     .route("/notify", post(notify))
//!     .route_layer(from_fn_with_state(auth_state, require_bearer_token))
//! ```
//!
//! ## レスポンスの detail
//!
//! 検証器の内部状態を漏らさないよう、既定では固定文言を返す。
//!
//! | エラー | detail |
//! |-------|--------|
//! | ヘッダーなし / 形式不正 | `invalid authorization token` |
//! | それ以外 | `invalid or expired token` |
//!
//! `echo_errors` が有効な場合はエラーの Display をそのまま返す。

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{Request, header::AUTHORIZATION},
    middleware::Next,
    response::{IntoResponse, Response},
};
use pingmailer_domain::auth::{AuthError, BearerToken};
use pingmailer_infra::TokenValidator;
use pingmailer_shared::{
    event_log::{
        error::{category, kind},
        event,
    },
    log_business_event,
};

use crate::error::RelayError;

/// ヘッダー不正時の detail
const INVALID_HEADER_DETAIL: &str = "invalid authorization token";
/// 検証失敗時の detail
const INVALID_TOKEN_DETAIL: &str = "invalid or expired token";

/// 認証ミドルウェアの状態
#[derive(Clone)]
pub struct AuthState {
    pub validator:   Arc<dyn TokenValidator>,
    /// 401 の detail に検証エラーの内容を含めるか
    pub echo_errors: bool,
}

/// 認証ミドルウェア
///
/// ベアラートークンを検証し、失敗した場合は 401 Unauthorized を返す。
pub async fn require_bearer_token(
    State(state): State<AuthState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    // 非 ASCII のヘッダー値は形式不正として扱う
    let header = match request.headers().get(AUTHORIZATION) {
        Some(value) => match value.to_str() {
            Ok(value) => Some(value),
            Err(_) => return reject(&state, AuthError::MalformedHeader),
        },
        None => None,
    };

    let token = match BearerToken::from_authorization(header) {
        Ok(token) => token,
        Err(e) => return reject(&state, e),
    };

    if let Err(e) = state.validator.validate(&token).await {
        return reject(&state, e);
    }

    log_business_event!(
        event.category = event::category::AUTH,
        event.action = event::action::TOKEN_ACCEPTED,
        event.result = event::result::SUCCESS,
        "トークン検証成功"
    );

    next.run(request).await
}

fn reject(state: &AuthState, error: AuthError) -> Response {
    let error_kind: &'static str = (&error).into();

    if error.is_header_error() {
        tracing::debug!(auth.error_kind = error_kind, error = %error, "Authorization ヘッダー不正");
    } else {
        tracing::warn!(
            error.category = category::EXTERNAL_SERVICE,
            error.kind = kind::TOKEN_VALIDATION,
            auth.error_kind = error_kind,
            error = %error,
            "トークン検証失敗"
        );
    }
    log_business_event!(
        event.category = event::category::AUTH,
        event.action = event::action::TOKEN_REJECTED,
        event.result = event::result::FAILURE,
        auth.error_kind = error_kind,
        "トークンを拒否"
    );

    let detail = if state.echo_errors {
        error.to_string()
    } else if error.is_header_error() {
        INVALID_HEADER_DETAIL.to_string()
    } else {
        INVALID_TOKEN_DETAIL.to_string()
    };

    RelayError::Unauthorized(detail).into_response()
}
