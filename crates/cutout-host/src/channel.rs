//! Messages exchanged with the drawing UI and the channel that carries
//! them to it.
//!
//! The node pushes one [`PreviewMessage`] per session under
//! [`PREVIEW_EVENT`]. The UI answers through the callback routes with an
//! [`ApplyRequest`] or a [`CancelRequest`], each acknowledged by a
//! [`CallbackResponse`].

use std::sync::{Mutex, PoisonError};

use cutout_pipeline::{CropMode, CropParams, FillPolicy, Point};
use serde::{Deserialize, Serialize};

use crate::error::ChannelError;
use crate::session::SessionId;

/// Event name of the preview push.
pub const PREVIEW_EVENT: &str = "irregular_cropper_update";

/// Outbound push channel to the UI.
///
/// Implementations must be usable from the node's thread while callback
/// handlers run on others.
pub trait UiChannel: Send + Sync {
    /// Deliver `payload` under `event`.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError`] if the transport refused the message.
    fn publish(&self, event: &str, payload: serde_json::Value) -> Result<(), ChannelError>;
}

impl<C: UiChannel + ?Sized> UiChannel for std::sync::Arc<C> {
    fn publish(&self, event: &str, payload: serde_json::Value) -> Result<(), ChannelError> {
        (**self).publish(event, payload)
    }
}

/// Preview pushed to the UI when a session opens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviewMessage {
    /// Session the UI must echo back.
    pub session_id: SessionId,
    /// `data:image/png;base64,...` thumbnail of the first batch item.
    pub encoded_preview_image: String,
    /// Drawing tool to open with.
    pub crop_mode: CropMode,
    /// Background fill that will be applied.
    pub background_fill: FillPolicy,
    /// Edge smoothing radius.
    pub edge_smooth: u32,
    /// Whether the result will be trimmed.
    pub auto_crop: bool,
    /// Padding around the trimmed result.
    pub crop_padding: u32,
}

impl PreviewMessage {
    /// Preview for `session_id` carrying the node's parameters.
    #[must_use]
    pub const fn new(
        session_id: SessionId,
        encoded_preview_image: String,
        params: &CropParams,
    ) -> Self {
        Self {
            session_id,
            encoded_preview_image,
            crop_mode: params.crop_mode,
            background_fill: params.background_fill,
            edge_smooth: params.edge_smooth,
            auto_crop: params.auto_crop,
            crop_padding: params.crop_padding,
        }
    }
}

/// Body of the apply route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplyRequest {
    /// Session being answered.
    #[serde(alias = "node_id")]
    pub session_id: SessionId,
    /// Outline in canvas pixels.
    pub path_points: Vec<Point>,
    /// Width of the canvas the outline was drawn on.
    pub image_width: u32,
    /// Height of the canvas the outline was drawn on.
    pub image_height: u32,
}

/// Body of the cancel route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelRequest {
    /// Session being cancelled.
    #[serde(alias = "node_id")]
    pub session_id: SessionId,
}

/// Acknowledgement returned by both routes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallbackResponse {
    /// Whether the request was accepted.
    pub success: bool,
    /// Reason for rejection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CallbackResponse {
    /// Accepted.
    #[must_use]
    pub const fn ok() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    /// Rejected with a reason.
    #[must_use]
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
        }
    }
}

/// Channel that keeps every message in memory.
#[derive(Debug, Default)]
pub struct MemoryChannel {
    sent: Mutex<Vec<(String, serde_json::Value)>>,
}

impl MemoryChannel {
    /// Empty channel.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every `(event, payload)` published so far, oldest first.
    #[must_use]
    pub fn sent(&self) -> Vec<(String, serde_json::Value)> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl UiChannel for MemoryChannel {
    fn publish(&self, event: &str, payload: serde_json::Value) -> Result<(), ChannelError> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((event.to_owned(), payload));
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn apply_request_accepts_legacy_node_id() {
        let body = r#"{
            "node_id": "42",
            "path_points": [{"x": 0, "y": 0}, {"x": 5, "y": 0}, {"x": 5, "y": 5}],
            "image_width": 10,
            "image_height": 10
        }"#;
        let req: ApplyRequest = serde_json::from_str(body).unwrap();
        assert_eq!(req.session_id, SessionId::from("42"));
        assert_eq!(req.path_points.len(), 3);
    }

    #[test]
    fn success_response_omits_error() {
        let json = serde_json::to_string(&CallbackResponse::ok()).unwrap();
        assert_eq!(json, r#"{"success":true}"#);
    }

    #[test]
    fn preview_message_wire_shape() {
        let msg = PreviewMessage::new(
            SessionId::from("7"),
            "data:image/png;base64,AAAA".to_owned(),
            &CropParams::default(),
        );
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["session_id"], "7");
        assert_eq!(json["crop_mode"], "polygon");
        assert_eq!(json["background_fill"], "transparent");
        assert_eq!(json["crop_padding"], 10);
    }

    #[test]
    fn memory_channel_records_in_order() {
        let channel = MemoryChannel::new();
        channel.publish("a", serde_json::json!(1)).unwrap();
        channel.publish("b", serde_json::json!(2)).unwrap();
        let sent = channel.sent();
        assert_eq!(sent[0].0, "a");
        assert_eq!(sent[1].1, serde_json::json!(2));
    }
}
