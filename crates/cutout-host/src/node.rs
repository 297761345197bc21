//! The interactive crop node.
//!
//! One execution runs through these states:
//!
//! ```text
//! Idle -> AwaitingInput -> Completed | TimedOut | Cancelled | Failed -> Terminated
//! ```
//!
//! The node opens a session, pushes a preview to the UI, then blocks on
//! the session's signal. Whatever happens, it returns an image and a mask:
//! the user's cut-out when one arrived, otherwise the input unchanged with
//! an all-ones mask. The session is removed on every path.

use std::sync::Arc;

use cutout_pipeline::{
    BorderParams, CropParams, Dimensions, ImageBatch, MaskBatch, PipelineError, crop_with_border,
};

use crate::channel::{PREVIEW_EVENT, PreviewMessage, UiChannel};
use crate::config::HostConfig;
use crate::error::HostError;
use crate::preview::encode_preview;
use crate::session::{SessionId, SessionStore};
use crate::signal::{Resolution, WaitOutcome};

/// Lifecycle of one node execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CropState {
    /// Not started.
    Idle,
    /// Preview sent; waiting for the UI.
    AwaitingInput,
    /// The UI applied an outline and a result is available.
    Completed,
    /// No answer within the wait timeout.
    TimedOut,
    /// The UI cancelled.
    Cancelled,
    /// Something went wrong; the input passes through.
    Failed,
    /// Session removed.
    Terminated,
}

/// What the node hands downstream.
#[derive(Debug, Clone, PartialEq)]
pub struct CropOutput {
    /// Cut-out batch, or the input on passthrough.
    pub image: ImageBatch,
    /// Selection mask aligned with `image`.
    pub mask: MaskBatch,
    /// Final state before teardown.
    pub state: CropState,
}

impl CropOutput {
    fn passthrough(image: ImageBatch, state: CropState) -> Self {
        let mask = MaskBatch::ones(image.dimensions());
        Self { image, mask, state }
    }
}

/// Removes the session when dropped.
struct SessionGuard<'a> {
    store: &'a SessionStore,
    id: &'a SessionId,
}

impl SessionGuard<'_> {
    fn take(&self) -> (Option<ImageBatch>, Option<MaskBatch>) {
        self.store.take_and_destroy(self.id)
    }
}

impl Drop for SessionGuard<'_> {
    fn drop(&mut self) {
        // No-op when `take` already ran.
        self.store.take_and_destroy(self.id);
        transition(self.id, CropState::Terminated);
    }
}

fn transition(id: &SessionId, state: CropState) {
    tracing::debug!(session_id = %id, ?state, "crop state");
}

/// Warn-only size check.
///
/// # Errors
///
/// Returns [`HostError::Oversized`] when `dimensions` has more than `limit`
/// pixels.
pub fn check_size(dimensions: Dimensions, limit: u64) -> Result<(), HostError> {
    if dimensions.area() > limit {
        Err(HostError::Oversized { dimensions, limit })
    } else {
        Ok(())
    }
}

/// Interactive crop node bound to a session store and a UI channel.
#[derive(Debug)]
pub struct IrregularCropNode<C> {
    store: Arc<SessionStore>,
    channel: C,
    config: HostConfig,
}

impl<C: UiChannel> IrregularCropNode<C> {
    /// Node using `store` for sessions and `channel` for previews.
    #[must_use]
    pub const fn new(store: Arc<SessionStore>, channel: C, config: HostConfig) -> Self {
        Self {
            store,
            channel,
            config,
        }
    }

    /// Node on the process-wide store with default settings.
    #[must_use]
    pub fn with_global_store(channel: C) -> Self {
        Self::new(SessionStore::global(), channel, HostConfig::default())
    }

    /// The store sessions live in, for wiring up [`crate::CropHandlers`].
    #[must_use]
    pub fn store(&self) -> Arc<SessionStore> {
        Arc::clone(&self.store)
    }

    /// Run one interactive crop. Never fails: every error ends in
    /// passthrough.
    ///
    /// Blocks the calling thread until the UI answers or the wait timeout
    /// passes.
    pub fn execute(
        &self,
        session_id: SessionId,
        image: ImageBatch,
        params: CropParams,
    ) -> CropOutput {
        let params = params.clamped();
        transition(&session_id, CropState::Idle);

        let source = Arc::new(image);
        let (state, result) = self.run(&session_id, &source, &params);
        if let Some((image, mask)) = result {
            return CropOutput { image, mask, state };
        }
        // The session is gone, so the batch is normally unshared again.
        let image = Arc::try_unwrap(source).unwrap_or_else(|shared| ImageBatch::clone(&shared));
        CropOutput::passthrough(image, state)
    }

    /// The session's lifetime: everything between create and destroy.
    fn run(
        &self,
        session_id: &SessionId,
        source: &Arc<ImageBatch>,
        params: &CropParams,
    ) -> (CropState, Option<(ImageBatch, MaskBatch)>) {
        if let Err(e) = check_size(source.dimensions(), self.config.oversize_pixels) {
            e.log(session_id, "large input");
        }

        if let Err(e) = self.store.create(session_id.clone(), Arc::clone(source), *params) {
            // The live session belongs to another execution; leave it alone.
            HostError::from(e).log(session_id, "cannot open session; passing input through");
            return (CropState::Failed, None);
        }
        let guard = SessionGuard {
            store: &self.store,
            id: session_id,
        };

        if let Err(e) = self.publish_preview(session_id, source, params) {
            e.log(session_id, "preview not delivered; passing input through");
            transition(session_id, CropState::Failed);
            return (CropState::Failed, None);
        }
        transition(session_id, CropState::AwaitingInput);

        let resolution = match self.store.wait(session_id, self.config.wait_timeout) {
            WaitOutcome::Completed(resolution) => resolution,
            WaitOutcome::TimedOut => {
                HostError::TimedOut.log(session_id, "passing input through");
                transition(session_id, CropState::TimedOut);
                return (CropState::TimedOut, None);
            }
        };

        let state = match resolution {
            Resolution::Applied => CropState::Completed,
            Resolution::Cancelled => CropState::Cancelled,
            Resolution::Rejected | Resolution::Failed | Resolution::Expired => CropState::Failed,
        };
        transition(session_id, state);

        match guard.take() {
            (Some(image), mask) => {
                let mask = mask.unwrap_or_else(|| MaskBatch::ones(image.dimensions()));
                (state, Some((image, mask)))
            }
            (None, _) => (state, None),
        }
    }

    fn publish_preview(
        &self,
        session_id: &SessionId,
        image: &ImageBatch,
        params: &CropParams,
    ) -> Result<(), HostError> {
        let first = image.frames().first().ok_or(PipelineError::EmptyBatch)?;
        let encoded = encode_preview(first, self.config.preview_max_edge)?;
        let message = PreviewMessage::new(session_id.clone(), encoded, params);
        self.channel
            .publish(PREVIEW_EVENT, serde_json::to_value(&message)?)?;
        Ok(())
    }
}

/// Run the mask border node.
///
/// Unlike the interactive node this one has no fallback: bad parameters
/// or misaligned masks are reported to the host.
///
/// # Errors
///
/// Returns [`HostError::Pipeline`] if the border pipeline rejects its
/// inputs.
pub fn mask_border(
    image: &ImageBatch,
    mask: &MaskBatch,
    params: &BorderParams,
) -> Result<ImageBatch, HostError> {
    let output = crop_with_border(image, mask, params)?;
    tracing::info!(
        frames = output.len(),
        input = %image.dimensions(),
        output = %output.dimensions(),
        border_width = params.border_width,
        "border applied"
    );
    Ok(output)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use cutout_pipeline::Frame;
    use cutout_pipeline::types::Rgb32FImage;

    use super::*;
    use crate::channel::MemoryChannel;
    use crate::error::ChannelError;

    struct BrokenChannel;

    impl UiChannel for BrokenChannel {
        fn publish(&self, event: &str, _: serde_json::Value) -> Result<(), ChannelError> {
            Err(ChannelError {
                event: event.to_owned(),
                reason: "socket closed".to_owned(),
            })
        }
    }

    fn source() -> ImageBatch {
        ImageBatch::single(Frame::Rgb(Rgb32FImage::from_pixel(12, 8, image::Rgb([0.5; 3]))))
    }

    fn quick_config() -> HostConfig {
        HostConfig {
            wait_timeout: Duration::from_millis(30),
            ..HostConfig::default()
        }
    }

    #[test]
    fn timeout_passes_input_through() {
        let store = Arc::new(SessionStore::default());
        let channel = Arc::new(MemoryChannel::new());
        let node =
            IrregularCropNode::new(Arc::clone(&store), Arc::clone(&channel), quick_config());
        let output = node.execute(SessionId::from("n1"), source(), CropParams::default());

        assert_eq!(output.state, CropState::TimedOut);
        assert_eq!(output.image, source());
        assert_eq!(output.mask, MaskBatch::ones(Dimensions::new(12, 8)));
        assert!(store.is_empty());

        let sent = channel.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, PREVIEW_EVENT);
        assert_eq!(sent[0].1["session_id"], "n1");
        assert!(
            sent[0].1["encoded_preview_image"]
                .as_str()
                .unwrap()
                .starts_with("data:image/png;base64,")
        );
    }

    #[test]
    fn passthrough_hands_back_the_callers_buffer() {
        let node = IrregularCropNode::new(
            Arc::new(SessionStore::default()),
            MemoryChannel::new(),
            quick_config(),
        );
        let input = source();
        let buffer = input.frames()[0].samples().as_ptr();
        let output = node.execute(SessionId::from("n3"), input, CropParams::default());
        assert_eq!(output.state, CropState::TimedOut);
        assert_eq!(output.image.frames()[0].samples().as_ptr(), buffer);
    }

    #[test]
    fn broken_channel_passes_input_through() {
        let store = Arc::new(SessionStore::default());
        let node = IrregularCropNode::new(Arc::clone(&store), BrokenChannel, quick_config());
        let output = node.execute(SessionId::from("n2"), source(), CropParams::default());
        assert_eq!(output.state, CropState::Failed);
        assert_eq!(output.image, source());
        assert!(store.is_empty());
    }

    #[test]
    fn duplicate_session_leaves_existing_one_alone() {
        let store = Arc::new(SessionStore::default());
        store
            .create(SessionId::from("dup"), source(), CropParams::default())
            .unwrap();
        let node =
            IrregularCropNode::new(Arc::clone(&store), MemoryChannel::new(), quick_config());
        let output = node.execute(SessionId::from("dup"), source(), CropParams::default());
        assert_eq!(output.state, CropState::Failed);
        assert!(store.contains(&SessionId::from("dup")));
    }

    #[test]
    fn mask_border_reports_misaligned_mask() {
        let err = mask_border(
            &source(),
            &MaskBatch::ones(Dimensions::new(3, 3)),
            &BorderParams::default(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            HostError::Pipeline(PipelineError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn mask_border_outputs_rgba() {
        let output = mask_border(
            &source(),
            &MaskBatch::ones(Dimensions::new(12, 8)),
            &BorderParams::default(),
        )
        .unwrap();
        assert_eq!(output.channels(), 4);
        assert_eq!(output.dimensions(), Dimensions::new(12, 8));
    }

    #[test]
    fn oversize_check() {
        assert!(check_size(Dimensions::new(4096, 4096), 4096 * 4096).is_ok());
        assert!(check_size(Dimensions::new(4097, 4096), 4096 * 4096).is_err());
    }
}
