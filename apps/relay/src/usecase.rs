//! # ユースケース層
//!
//! HTTP に依存しないリレーの処理をまとめる。

pub mod notification;
