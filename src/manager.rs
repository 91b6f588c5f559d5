use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, error, info, warn};

use crate::config::{ProviderKind, Settings};
use crate::error::{OcrTranslatorError, Result};
use crate::http::HttpTransport;
use crate::translate::{TranslationInput, TranslationRequest, TranslationResult, TranslatorFactory};

/// Per-request state. `Succeeded` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestState {
    Idle,
    Requesting,
    Succeeded,
    Failed,
}

/// Idle -> Requesting -> {Succeeded, Failed} -> Idle, nothing else
#[derive(Debug)]
pub struct RequestLifecycle {
    state: RequestState,
}

impl RequestLifecycle {
    pub fn new() -> Self {
        Self { state: RequestState::Idle }
    }

    pub fn state(&self) -> RequestState {
        self.state
    }

    pub fn begin(&mut self) -> Result<()> {
        self.transition(RequestState::Idle, RequestState::Requesting)
    }

    pub fn finish(&mut self, succeeded: bool) -> Result<()> {
        let next = if succeeded { RequestState::Succeeded } else { RequestState::Failed };
        self.transition(RequestState::Requesting, next)
    }

    pub fn reset(&mut self) -> Result<()> {
        match self.state {
            RequestState::Succeeded | RequestState::Failed => {
                self.state = RequestState::Idle;
                Ok(())
            }
            other => Err(invalid_transition(other, RequestState::Idle)),
        }
    }

    fn transition(&mut self, from: RequestState, to: RequestState) -> Result<()> {
        if self.state != from {
            return Err(invalid_transition(self.state, to));
        }
        debug!("Request state {:?} -> {:?}", from, to);
        self.state = to;
        Ok(())
    }
}

impl Default for RequestLifecycle {
    fn default() -> Self {
        Self::new()
    }
}

fn invalid_transition(from: RequestState, to: RequestState) -> OcrTranslatorError {
    OcrTranslatorError::InvalidRequest(format!("Invalid request state transition {:?} -> {:?}", from, to))
}

/// Picks the backend for the current settings and forwards one request to it.
///
/// Settings are read on every call, so switching provider between two calls
/// takes effect immediately and never reuses the old credential or endpoint.
/// A call that arrives while another is in flight is refused, never queued.
pub struct TranslationManager {
    transport: Arc<dyn HttpTransport>,
    lifecycle: Mutex<RequestLifecycle>,
}

/// Settles the lifecycle when a request future is dropped mid-flight
struct InFlight<'a> {
    lifecycle: &'a Mutex<RequestLifecycle>,
    settled: bool,
}

impl InFlight<'_> {
    fn settle(mut self, succeeded: bool) -> Result<()> {
        self.settled = true;
        let mut lifecycle = lock(self.lifecycle);
        lifecycle.finish(succeeded)?;
        lifecycle.reset()
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        warn!("Request dropped before completion");
        let mut lifecycle = lock(self.lifecycle);
        if let Err(e) = lifecycle.finish(false).and_then(|_| lifecycle.reset()) {
            error!("Failed to settle abandoned request: {}", e);
        }
    }
}

fn lock(lifecycle: &Mutex<RequestLifecycle>) -> MutexGuard<'_, RequestLifecycle> {
    lifecycle.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl TranslationManager {
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            transport,
            lifecycle: Mutex::new(RequestLifecycle::new()),
        }
    }

    pub fn state(&self) -> RequestState {
        lock(&self.lifecycle).state()
    }

    /// Always yields a result; errors become failure results and are logged
    pub async fn translate(&self, request: &TranslationRequest, settings: &Settings) -> TranslationResult {
        let provider = settings.api.selected_api;

        let begun = lock(&self.lifecycle).begin();
        if let Err(e) = begun {
            warn!("Request {} refused: {}", request.id(), e);
            let busy = OcrTranslatorError::InvalidRequest(format!(
                "Another translation request is in progress ({})",
                e
            ));
            return failure(request, None, &busy);
        }
        let in_flight = InFlight { lifecycle: &self.lifecycle, settled: false };

        let outcome = self.dispatch(request, settings).await;
        let settled = in_flight.settle(outcome.is_ok());

        match outcome.and_then(|result| settled.map(|_| result)) {
            Ok(result) => {
                info!("Request {} succeeded via {}", request.id(), provider);
                result
            }
            Err(e) => {
                error!("Request {} failed via {}: {}", request.id(), provider, e);
                let provider = (!matches!(e, OcrTranslatorError::Config(_))).then_some(provider);
                failure(request, provider, &e)
            }
        }
    }

    async fn dispatch(&self, request: &TranslationRequest, settings: &Settings) -> Result<TranslationResult> {
        let config = settings.active_provider()?;
        let service = TranslatorFactory::create_translator(config.provider, self.transport.clone());
        service.translate(request, &config).await
    }

    /// Check the key stored for `provider`, independent of the selected one
    pub async fn verify_api_key(&self, provider: ProviderKind, settings: &Settings) -> Result<()> {
        let config = settings.provider_config(provider)?;
        let service = TranslatorFactory::create_translator(provider, self.transport.clone());
        info!("Verifying {} API key", provider);
        service.verify_api_key(&config).await
    }
}

fn failure(request: &TranslationRequest, provider: Option<ProviderKind>, error: &OcrTranslatorError) -> TranslationResult {
    let original = match request.input() {
        TranslationInput::Text(text) => text.clone(),
        TranslationInput::Image { .. } => String::new(),
    };
    TranslationResult::failure(request.id(), provider, original, error)
}
