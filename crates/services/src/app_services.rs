//! Assembles the session store, gateway, streaming controller, and
//! progress driver behind one app-facing handle.

use std::sync::Arc;

use tracing::debug;

use sitequiz_core::time::Clock;
use sitequiz_core::urlnorm;

use crate::error::SubmitError;
use crate::gateway::{GatewayConfig, PreviewImageResponse, SubmissionApi, SubmissionGateway};
use crate::progress::ProgressDriver;
use crate::store::SessionStore;
use crate::streaming::{SseTransport, StreamController, StreamTransport};

pub struct AppServices {
    store: SessionStore,
    gateway: Arc<dyn SubmissionApi>,
    controller: StreamController,
    progress: ProgressDriver,
}

impl AppServices {
    /// Wire services against a live backend at `config.base_url`.
    #[must_use]
    pub fn http(config: GatewayConfig, clock: Clock) -> Self {
        let transport = Arc::new(SseTransport::new(config.base_url.clone()));
        Self::new(Arc::new(SubmissionGateway::new(config)), transport, clock)
    }

    /// Wire services from explicit collaborators. Tests inject mock
    /// gateway and transport implementations here.
    #[must_use]
    pub fn new(
        gateway: Arc<dyn SubmissionApi>,
        transport: Arc<dyn StreamTransport>,
        clock: Clock,
    ) -> Self {
        let store = SessionStore::new();
        let controller = StreamController::new(store.clone(), transport);
        let progress = ProgressDriver::spawn(clock, &store);
        Self {
            store,
            gateway,
            controller,
            progress,
        }
    }

    #[must_use]
    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    #[must_use]
    pub fn progress(&self) -> &ProgressDriver {
        &self.progress
    }

    /// Submit a URL for analysis and open the streaming channel.
    ///
    /// The store is reset synchronously before the request is issued, so
    /// stale questions from a prior session are never visible alongside
    /// the new URL. On failure the error is returned for inline display
    /// and no channel is opened.
    ///
    /// # Errors
    ///
    /// Returns `SubmitError` for invalid input or a failed gateway call.
    pub async fn submit(&self, raw_url: &str) -> Result<(), SubmitError> {
        let normalized = urlnorm::normalize(raw_url)?;

        self.store.start_session(normalized.clone());
        let response = self.gateway.generate_content(&normalized).await?;
        debug!(session_id = %response.session_id, "submission accepted");

        self.store.set_session_id(response.session_id.clone());
        self.store.set_links(response.links);
        self.controller.connect(&response.session_id).await;
        Ok(())
    }

    /// Fetch a preview image for the current page; callers fall back to a
    /// placeholder on error.
    ///
    /// # Errors
    ///
    /// Returns `SubmitError` when the preview call fails.
    pub async fn preview_image(&self, url: &str) -> Result<PreviewImageResponse, SubmitError> {
        self.gateway.preview_image(url).await
    }

    /// Tear down the streaming channel. Safe to call at any point.
    pub fn shutdown(&self) {
        self.controller.disconnect();
    }
}
