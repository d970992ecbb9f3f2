//! # 通知サービス
//!
//! 検証済みの通知をレンダリングし、配送モードに応じて同期またはバックグラウンドで配送する。
//!
//! ## 設計方針
//!
//! - **レンダリングは常にリクエスト内で行う**: テンプレートエラーは配送モードに関係なく 500 で返す
//! - **バックグラウンド配送は [`TaskTracker`] で追跡**: シャットダウン時に猶予時間まで完了を待つ
//! - **パニックを隔離**: 配送タスクを内側の `tokio::spawn` で実行し、パニックはログに記録して握りつぶす

use std::time::Duration;

use pingmailer_domain::notification::{DeliveryError, EmailMessage, SmtpSettings};
use pingmailer_infra::DeliveryEngine;
use pingmailer_shared::{
    event_log::{
        error::{category, kind},
        event,
    },
    log_business_event,
};
use tokio_util::task::TaskTracker;
use tracing::Instrument as _;

use super::{
    request::ValidatedNotification,
    template_renderer::TemplateRenderer,
};
use crate::{config::DeliveryMode, error::RelayError};

/// 通知の受付結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// 同期モードで配送まで完了した
    Delivered,
    /// バックグラウンド配送に受け付けた
    Queued,
}

/// 通知サービス
pub struct NotificationService {
    renderer: TemplateRenderer,
    engine:   DeliveryEngine,
    mode:     DeliveryMode,
    tracker:  TaskTracker,
}

impl NotificationService {
    pub fn new(renderer: TemplateRenderer, engine: DeliveryEngine, mode: DeliveryMode) -> Self {
        Self {
            renderer,
            engine,
            mode,
            tracker: TaskTracker::new(),
        }
    }

    /// 通知をレンダリングして配送する
    pub async fn dispatch(
        &self,
        notification: ValidatedNotification,
    ) -> Result<DispatchOutcome, RelayError> {
        let content = self
            .renderer
            .render(&notification.template, &notification.data)?;
        let email = EmailMessage {
            from: notification.sender,
            to: notification.recipient_email,
            content,
        };
        let smtp = notification.smtp;

        match self.mode {
            DeliveryMode::Sync => {
                deliver_and_log(&self.engine, &smtp, &email).await?;
                Ok(DispatchOutcome::Delivered)
            }
            DeliveryMode::Async => {
                self.spawn_delivery(smtp, email);
                Ok(DispatchOutcome::Queued)
            }
        }
    }

    fn spawn_delivery(&self, smtp: SmtpSettings, email: EmailMessage) {
        log_business_event!(
            event.category = event::category::NOTIFICATION,
            event.action = event::action::NOTIFICATION_QUEUED,
            event.result = event::result::SUCCESS,
            smtp.host = %smtp.host,
            recipient = %email.to,
            "通知をバックグラウンド配送に受け付け"
        );

        // 受付時のリクエストスパンを引き継ぎ、配送ログを同じ request_id で追えるようにする
        let span = tracing::Span::current();
        let engine = self.engine.clone();
        let delivery = tokio::spawn(
            async move {
                // 失敗はログに記録済みなので結果は捨てる
                let _ = deliver_and_log(&engine, &smtp, &email).await;
            }
            .instrument(span.clone()),
        );

        self.tracker.spawn(
            async move {
                if let Err(e) = delivery.await {
                    tracing::error!(
                        error.category = category::INTERNAL,
                        error.kind = kind::BACKGROUND_TASK,
                        error = %e,
                        "バックグラウンド配送タスクが異常終了"
                    );
                }
            }
            .instrument(span),
        );
    }

    /// バックグラウンド配送中のタスク数
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// 新規受付を止め、実行中の配送の完了を `grace` まで待つ
    ///
    /// 猶予内にすべて完了すれば `true` を返す。
    pub async fn drain(&self, grace: Duration) -> bool {
        self.tracker.close();
        let pending = self.tracker.len();
        if pending > 0 {
            tracing::info!(pending, "バックグラウンド配送の完了を待機");
        }

        match tokio::time::timeout(grace, self.tracker.wait()).await {
            Ok(()) => true,
            Err(_) => {
                tracing::warn!(
                    pending = self.tracker.len(),
                    "猶予時間内にバックグラウンド配送が完了しなかった"
                );
                false
            }
        }
    }
}

async fn deliver_and_log(
    engine: &DeliveryEngine,
    smtp: &SmtpSettings,
    email: &EmailMessage,
) -> Result<(), DeliveryError> {
    match engine.deliver(smtp, email).await {
        Ok(()) => {
            log_business_event!(
                event.category = event::category::NOTIFICATION,
                event.action = event::action::NOTIFICATION_SENT,
                event.result = event::result::SUCCESS,
                smtp.host = %smtp.host,
                recipient = %email.to,
                "通知を配送"
            );
            Ok(())
        }
        Err(e) => {
            log_business_event!(
                event.category = event::category::NOTIFICATION,
                event.action = event::action::NOTIFICATION_FAILED,
                event.result = event::result::FAILURE,
                smtp.host = %smtp.host,
                recipient = %email.to,
                error = %e,
                "通知の配送に失敗"
            );
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        io,
        sync::{Arc, Mutex},
    };

    use pingmailer_domain::notification::{TemplateContext, TemplateError};
    use pingmailer_infra::{RetryPolicy, mock::MockMailTransport};
    use pretty_assertions::assert_eq;
    use tracing_subscriber::fmt::MakeWriter;

    use super::*;
    use crate::usecase::notification::template_renderer::{
        BuiltinTemplate,
        TemplateData,
        TemplateSource,
    };

    fn notification(template: TemplateSource) -> ValidatedNotification {
        ValidatedNotification {
            smtp: SmtpSettings {
                host:     "smtp.example.com".to_string(),
                port:     587,
                username: "mailer".to_string(),
                password: "secret".to_string(),
            },
            sender: "noreply@example.com".to_string(),
            recipient_email: "a@b.com".to_string(),
            template,
            data: TemplateData::Default(TemplateContext {
                name:     "User".to_string(),
                email:    "a@b.com".to_string(),
                app_name: "Application".to_string(),
            }),
        }
    }

    fn welcome() -> ValidatedNotification {
        notification(TemplateSource::Builtin(BuiltinTemplate::Welcome))
    }

    fn service(transport: &MockMailTransport, mode: DeliveryMode) -> NotificationService {
        let engine = DeliveryEngine::with_policy(
            Arc::new(transport.clone()),
            RetryPolicy {
                max_attempts: 3,
                backoff:      Duration::from_millis(500),
            },
        );
        NotificationService::new(TemplateRenderer::new().unwrap(), engine, mode)
    }

    #[tokio::test]
    async fn test_同期モードは配送完了後にdeliveredを返す() {
        let transport = MockMailTransport::new();
        let sut = service(&transport, DeliveryMode::Sync);

        let outcome = sut.dispatch(welcome()).await.unwrap();

        assert_eq!(outcome, DispatchOutcome::Delivered);
        let sent = transport.sent();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].formatted.contains("Subject: Welcome to Application, User!"));
        assert_eq!(sent[0].smtp.host, "smtp.example.com");
    }

    #[tokio::test(start_paused = true)]
    async fn test_同期モードで配送が尽きれば配送エラーになる() {
        let transport = MockMailTransport::always_failing();
        let sut = service(&transport, DeliveryMode::Sync);

        let result = sut.dispatch(welcome()).await;

        assert!(matches!(
            result,
            Err(RelayError::Delivery(DeliveryError::Exhausted { attempts: 3, .. }))
        ));
        assert_eq!(transport.attempts(), 3);
    }

    #[tokio::test]
    async fn test_非同期モードはqueuedを返しバックグラウンドで配送する() {
        let transport = MockMailTransport::new();
        let sut = service(&transport, DeliveryMode::Async);

        let outcome = sut.dispatch(welcome()).await.unwrap();
        assert_eq!(outcome, DispatchOutcome::Queued);

        assert!(sut.drain(Duration::from_secs(5)).await);
        assert_eq!(transport.sent().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_非同期モードの配送失敗はリクエストに影響しない() {
        let transport = MockMailTransport::always_failing();
        let sut = service(&transport, DeliveryMode::Async);

        let outcome = sut.dispatch(welcome()).await.unwrap();

        assert_eq!(outcome, DispatchOutcome::Queued);
        assert!(sut.drain(Duration::from_secs(5)).await);
        assert_eq!(transport.attempts(), 3);
        assert!(transport.sent().is_empty());
    }

    #[tokio::test]
    async fn test_テンプレートエラーは配送モードに関係なく返し送信しない() {
        let transport = MockMailTransport::new();
        let sut = service(&transport, DeliveryMode::Async);

        let result = sut
            .dispatch(notification(TemplateSource::Inline(
                "{% block subject %}x{% endblock subject %}".to_string(),
            )))
            .await;

        assert!(matches!(
            result,
            Err(RelayError::Template(TemplateError::Parse(_)))
        ));
        assert_eq!(sut.in_flight(), 0);
        assert_eq!(transport.attempts(), 0);
    }

    /// テスト中のログを溜めるライター
    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl CapturedLogs {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    impl io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for CapturedLogs {
        type Writer = Self;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    #[tokio::test]
    async fn test_配送タスクのパニックはログに残り後続の配送は続く() {
        let logs = CapturedLogs::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(logs.clone())
            .with_ansi(false)
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let transport = MockMailTransport::panicking_times(1);
        let sut = service(&transport, DeliveryMode::Async);

        assert_eq!(
            sut.dispatch(welcome()).await.unwrap(),
            DispatchOutcome::Queued
        );
        while sut.in_flight() > 0 {
            tokio::task::yield_now().await;
        }

        // パニックの後も次のリクエストは受け付けて配送される
        assert_eq!(
            sut.dispatch(welcome()).await.unwrap(),
            DispatchOutcome::Queued
        );
        assert!(sut.drain(Duration::from_secs(5)).await);

        assert_eq!(transport.attempts(), 2);
        assert_eq!(transport.sent().len(), 1);
        let output = logs.contents();
        assert!(output.contains(kind::BACKGROUND_TASK), "{output}");
        assert!(output.contains("panicked"), "{output}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_猶予時間内に終わらない配送はdrainでfalseになる() {
        let transport = MockMailTransport::always_failing();
        let sut = service(&transport, DeliveryMode::Async);

        sut.dispatch(welcome()).await.unwrap();

        // リトライのバックオフ合計 1 秒より短い猶予
        assert!(!sut.drain(Duration::from_millis(100)).await);
    }
}
