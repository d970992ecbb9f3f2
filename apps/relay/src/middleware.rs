//! # ミドルウェア
//!
//! リレー用のミドルウェアを提供する。

mod auth;

pub use auth::{AuthState, require_bearer_token};
