//! Callback handlers for the drawing UI.
//!
//! The UI answers a preview through two routes:
//!
//! - [`APPLY_ROUTE`]: an outline; the handler rasterizes and composites it
//!   against the session's source batch, stores the result and fires the
//!   session's signal.
//! - [`CANCEL_ROUTE`]: fires the signal without a result.
//!
//! Handlers run on the host's request threads. Every apply that finds its
//! session fires the signal exactly once on every path, including panics,
//! so the waiting node never hangs until its timeout because of a handler
//! failure.

use std::sync::Arc;

use cutout_pipeline::{Dimensions, PipelineError, Polygon, polygon_crop};

use crate::channel::{ApplyRequest, CallbackResponse, CancelRequest};
use crate::config::HostConfig;
use crate::error::{HostError, SessionError};
use crate::session::{Session, SessionStore};
use crate::signal::Resolution;

/// Route that receives a drawn outline.
pub const APPLY_ROUTE: &str = "/irregular_cropper/apply";

/// Route that cancels a session.
pub const CANCEL_ROUTE: &str = "/irregular_cropper/cancel";

/// Fires [`Resolution::Failed`] on drop unless finished first.
struct CompletionGuard {
    session: Arc<Session>,
    armed: bool,
}

impl CompletionGuard {
    const fn new(session: Arc<Session>) -> Self {
        Self {
            session,
            armed: true,
        }
    }

    fn finish(mut self, resolution: Resolution) {
        self.armed = false;
        self.session.signal().resolve(resolution);
    }
}

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        if self.armed {
            tracing::error!(
                session_id = %self.session.id(),
                "apply aborted; completing session empty"
            );
            self.session.signal().resolve(Resolution::Failed);
        }
    }
}

/// Handlers for both callback routes, sharing one session store.
#[derive(Debug, Clone)]
pub struct CropHandlers {
    store: Arc<SessionStore>,
    config: HostConfig,
}

impl CropHandlers {
    /// Handlers answering sessions in `store`.
    #[must_use]
    pub const fn new(store: Arc<SessionStore>, config: HostConfig) -> Self {
        Self { store, config }
    }

    /// Handle an outline from the UI.
    #[must_use]
    pub fn apply(&self, request: ApplyRequest) -> CallbackResponse {
        let session_id = request.session_id.clone();
        match self.try_apply(request) {
            Ok(()) => CallbackResponse::ok(),
            Err(e) => {
                e.log(&session_id, "apply failed");
                CallbackResponse::failed(e.to_string())
            }
        }
    }

    fn try_apply(&self, request: ApplyRequest) -> Result<(), HostError> {
        let ApplyRequest {
            session_id,
            path_points,
            image_width,
            image_height,
        } = request;

        let mut polygon = Polygon::new(path_points);
        let received = polygon.len();
        if polygon.truncate(self.config.max_path_points) {
            tracing::warn!(
                session_id = %session_id,
                received,
                kept = self.config.max_path_points,
                "outline truncated"
            );
        }

        let session = self
            .store
            .get(&session_id)
            .ok_or_else(|| SessionError::NotFound(session_id.clone()))?;
        let guard = CompletionGuard::new(Arc::clone(&session));

        if polygon.len() < Polygon::MIN_POINTS {
            guard.finish(Resolution::Rejected);
            return Err(PipelineError::InsufficientPoints {
                count: polygon.len(),
            }
            .into());
        }

        // Bounds the supersampled coverage buffer the rasterizer allocates.
        let canvas = Dimensions::new(image_width, image_height);
        if canvas.area() > self.config.oversize_pixels {
            guard.finish(Resolution::Rejected);
            return Err(HostError::CanvasTooLarge {
                canvas,
                limit: self.config.oversize_pixels,
            });
        }

        let result = match polygon_crop(
            session.source(),
            &polygon,
            canvas,
            session.params(),
            &self.config.raster,
        ) {
            Ok(result) => result,
            Err(e) => {
                guard.finish(Resolution::Failed);
                return Err(e.into());
            }
        };

        let output = result.image.dimensions();
        self.store.publish_result(&session_id, result.image, result.mask);
        guard.finish(Resolution::Applied);

        tracing::info!(
            session_id = %session_id,
            points = polygon.len(),
            %canvas,
            %output,
            "crop applied"
        );
        Ok(())
    }

    /// Handle a cancel from the UI.
    #[must_use]
    pub fn cancel(&self, request: &CancelRequest) -> CallbackResponse {
        match self
            .store
            .signal_complete(&request.session_id, Resolution::Cancelled)
        {
            Ok(()) => {
                tracing::info!(session_id = %request.session_id, "crop cancelled");
                CallbackResponse::ok()
            }
            Err(e) => {
                let e = HostError::from(e);
                e.log(&request.session_id, "cancel failed");
                CallbackResponse::failed(e.to_string())
            }
        }
    }

    /// Route a raw JSON request body and return the JSON response body.
    ///
    /// Malformed bodies and unknown routes are answered with
    /// `{"success": false, "error": ...}`.
    #[must_use]
    pub fn dispatch(&self, route: &str, body: &str) -> String {
        let response = match route {
            APPLY_ROUTE => serde_json::from_str::<ApplyRequest>(body)
                .map(|request| self.apply(request))
                .map_err(HostError::from),
            CANCEL_ROUTE => serde_json::from_str::<CancelRequest>(body)
                .map(|request| self.cancel(&request))
                .map_err(HostError::from),
            other => Err(HostError::UnknownRoute(other.to_owned())),
        }
        .unwrap_or_else(|e| {
            tracing::warn!(route, error = %e, "callback rejected");
            CallbackResponse::failed(e.to_string())
        });

        serde_json::to_string(&response)
            .unwrap_or_else(|_| String::from(r#"{"success":false}"#))
    }
}
