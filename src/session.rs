use std::future::Future;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::capture::CaptureImage;
use crate::config::Settings;
use crate::error::OcrTranslatorError;
use crate::translate::TranslationResult;
use crate::workflow::Workflow;

struct PendingRequest {
    id: Uuid,
    handle: JoinHandle<TranslationResult>,
}

/// Owns at most one in-flight request.
///
/// Submitting a new request or cancelling detaches the previous task. It is
/// never aborted: its HTTP call runs to completion or timeout and the result
/// is dropped. The next task starts only once the detached one has settled,
/// so the manager never sees two requests at once.
pub struct Session {
    workflow: Arc<Workflow>,
    pending: Option<PendingRequest>,
    detached: Option<JoinHandle<TranslationResult>>,
}

impl Session {
    pub fn new(workflow: Arc<Workflow>) -> Self {
        Self {
            workflow,
            pending: None,
            detached: None,
        }
    }

    /// Start translating a capture; `settings` is the snapshot for this request
    pub fn submit_capture(&mut self, image: CaptureImage, settings: Settings) -> Uuid {
        let id = Uuid::new_v4();
        let workflow = self.workflow.clone();
        self.spawn_after_previous(id, async move { workflow.process_capture(id, image, &settings).await });
        id
    }

    pub fn submit_text(&mut self, text: String, settings: Settings) -> Uuid {
        let id = Uuid::new_v4();
        let workflow = self.workflow.clone();
        self.spawn_after_previous(id, async move { workflow.translate_text(id, &text, &settings).await });
        id
    }

    pub fn pending_id(&self) -> Option<Uuid> {
        self.pending.as_ref().map(|p| p.id)
    }

    /// Forget the pending request; returns its id if there was one
    pub fn cancel(&mut self) -> Option<Uuid> {
        let pending = self.pending.take()?;
        info!("Cancelled request {}; a late response will be discarded", pending.id);
        self.detached = Some(pending.handle);
        Some(pending.id)
    }

    /// Wait for the pending request. None when nothing is pending.
    pub async fn wait(&mut self) -> Option<TranslationResult> {
        let pending = self.pending.take()?;
        let result = match pending.handle.await {
            Ok(result) => result,
            Err(e) => {
                error!("Translation task for request {} failed: {}", pending.id, e);
                let err = OcrTranslatorError::Provider(format!("Translation task failed: {}", e));
                TranslationResult::failure(pending.id, None, String::new(), &err)
            }
        };
        Some(result)
    }

    fn spawn_after_previous<F>(&mut self, id: Uuid, work: F)
    where
        F: Future<Output = TranslationResult> + Send + 'static,
    {
        let previous = match self.pending.take() {
            Some(previous) => {
                info!("Request {} superseded by {}; its result will be discarded", previous.id, id);
                Some(previous.handle)
            }
            None => self.detached.take(),
        };

        let handle = tokio::spawn(async move {
            if let Some(previous) = previous {
                match previous.await {
                    Ok(stale) => debug!("Discarded result of request {}", stale.request_id()),
                    Err(e) => debug!("Detached task ended without a result: {}", e),
                }
            }
            work.await
        });
        self.pending = Some(PendingRequest { id, handle });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::tests::sample_png;
    use crate::config::TranslationMode;
    use crate::http::{HttpRequest, HttpResponse, MockHttpTransport};
    use crate::manager::TranslationManager;
    use crate::ocr::MockOcrEngine;

    fn settings() -> Settings {
        let mut settings = Settings::default();
        settings.openai.api_key = "sk-test".to_string();
        settings.openai.model = "gpt-4o-mini".to_string();
        settings.language.target_language = "en".to_string();
        settings.translation.mode = TranslationMode::CombinedVision;
        settings
    }

    fn workflow(transport: MockHttpTransport) -> Arc<Workflow> {
        let mut tesseract = MockOcrEngine::new();
        tesseract.expect_extract_text().never();
        let mut vision = MockOcrEngine::new();
        vision.expect_extract_text().never();
        Arc::new(Workflow::with_engines(
            TranslationManager::new(Arc::new(transport)),
            Arc::new(tesseract),
            Arc::new(vision),
        ))
    }

    fn reply(content: &str) -> HttpResponse {
        HttpResponse {
            status: 200,
            body: serde_json::json!({"choices": [{"message": {"content": content}}]}).to_string(),
        }
    }

    #[tokio::test]
    async fn test_wait_returns_submitted_result() {
        let mut transport = MockHttpTransport::new();
        transport.expect_send().times(1).returning(|_| Ok(reply("Hello")));

        let mut session = Session::new(workflow(transport));
        let id = session.submit_text("こんにちは".to_string(), settings());
        assert_eq!(session.pending_id(), Some(id));

        let result = session.wait().await.unwrap();
        assert_eq!(result.request_id(), id);
        assert_eq!(result.translated_text(), "Hello");
        assert!(session.wait().await.is_none());
    }

    #[tokio::test]
    async fn test_superseded_result_is_discarded() {
        let mut transport = MockHttpTransport::new();
        transport
            .expect_send()
            .withf(|req: &HttpRequest| req.body.as_ref().unwrap()["messages"][1]["content"] == "first")
            .returning(|_| Ok(reply("stale")));
        transport
            .expect_send()
            .withf(|req: &HttpRequest| req.body.as_ref().unwrap()["messages"][1]["content"] == "second")
            .returning(|_| Ok(reply("fresh")));

        let mut session = Session::new(workflow(transport));
        let first = session.submit_text("first".to_string(), settings());
        let second = session.submit_text("second".to_string(), settings());
        assert_ne!(first, second);
        assert_eq!(session.pending_id(), Some(second));

        let result = session.wait().await.unwrap();
        assert_eq!(result.request_id(), second);
        assert_eq!(result.translated_text(), "fresh");
    }

    #[tokio::test]
    async fn test_cancel_drops_pending() {
        let mut transport = MockHttpTransport::new();
        transport.expect_send().returning(|_| Ok(reply("late")));

        let mut session = Session::new(workflow(transport));
        let image = CaptureImage::from_bytes(sample_png(8, 8)).unwrap();
        let id = session.submit_capture(image, settings());

        assert_eq!(session.cancel(), Some(id));
        assert_eq!(session.pending_id(), None);
        assert!(session.wait().await.is_none());
        assert_eq!(session.cancel(), None);
    }

    #[tokio::test]
    async fn test_submit_after_cancel_waits_for_detached_task() {
        let mut transport = MockHttpTransport::new();
        let mut seq = mockall::Sequence::new();
        transport
            .expect_send()
            .withf(|req: &HttpRequest| req.body.as_ref().unwrap()["messages"][1]["content"] == "first")
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(reply("stale")));
        transport
            .expect_send()
            .withf(|req: &HttpRequest| req.body.as_ref().unwrap()["messages"][1]["content"] == "second")
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(reply("fresh")));

        let mut session = Session::new(workflow(transport));
        let first = session.submit_text("first".to_string(), settings());
        assert_eq!(session.cancel(), Some(first));

        let second = session.submit_text("second".to_string(), settings());
        let result = session.wait().await.unwrap();
        assert_eq!(result.request_id(), second);
        assert_eq!(result.translated_text(), "fresh");
        assert!(result.is_success());
    }
}
