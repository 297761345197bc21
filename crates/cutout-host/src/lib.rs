//! cutout-host: Session handshake and node glue for the cutout pipeline.
//!
//! The interactive crop is a rendezvous between two threads that never
//! call each other:
//!
//! 1. The node thread ([`IrregularCropNode::execute`]) opens a session in
//!    the [`SessionStore`], pushes a preview over a [`UiChannel`] and
//!    blocks on the session's [`CompletionSignal`].
//! 2. A request thread ([`CropHandlers`]) receives the user's outline,
//!    runs `cutout_pipeline::polygon_crop`, stores the result and fires
//!    the signal.
//! 3. The node wakes, takes the result and removes the session.
//!
//! Timeouts, cancels and handler failures all end with the node passing
//! its input through unchanged.

pub mod channel;
pub mod config;
pub mod error;
pub mod handlers;
pub mod node;
pub mod preview;
pub mod registry;
pub mod session;
pub mod signal;

pub use channel::{
    ApplyRequest, CallbackResponse, CancelRequest, MemoryChannel, PREVIEW_EVENT, PreviewMessage,
    UiChannel,
};
pub use config::HostConfig;
pub use error::{ChannelError, ErrorKind, HostError, SessionError};
pub use handlers::{APPLY_ROUTE, CANCEL_ROUTE, CropHandlers};
pub use node::{CropOutput, CropState, IrregularCropNode, mask_border};
pub use registry::{NODES, NodeDescriptor};
pub use session::{SessionId, SessionStore};
pub use signal::{CompletionSignal, Resolution, WaitOutcome};
