//! Declarative node descriptors for host registration.
//!
//! Each node is described once in a static table: its inputs with their
//! widget ranges and defaults, its outputs, and where it appears in the
//! host's menu. Hosts read the table (or its JSON) to build their UI and
//! to type-check connections.

use cutout_pipeline::{BorderColor, BorderParams, CropMode, CropParams, FillPolicy};
use serde::Serialize;

/// Menu category both nodes are listed under.
pub const CATEGORY: &str = "Put-Tools/Image";

/// Type of a connection socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SocketType {
    /// Image batch.
    Image,
    /// Mask batch.
    Mask,
    /// Integer widget.
    Int,
    /// Boolean toggle.
    Boolean,
    /// One of a fixed list of strings.
    Combo,
    /// Host-assigned node id.
    UniqueId,
    /// Matches every other socket type.
    Any,
}

impl SocketType {
    /// Returns `true` if an output of type `other` may feed this socket.
    #[must_use]
    pub fn accepts(self, other: Self) -> bool {
        self == Self::Any || other == Self::Any || self == other
    }
}

/// Widget and default for one input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ParamKind {
    /// Connection only.
    Socket {
        /// Accepted connection type.
        socket: SocketType,
    },
    /// Integer slider.
    Int {
        /// Initial value.
        default: u32,
        /// Lowest accepted value.
        min: u32,
        /// Highest accepted value.
        max: u32,
        /// Slider step.
        step: u32,
    },
    /// Toggle.
    Boolean {
        /// Initial value.
        default: bool,
    },
    /// Drop-down.
    Choice {
        /// Accepted values, in menu order.
        options: &'static [&'static str],
        /// Initial value.
        default: &'static str,
    },
}

impl ParamKind {
    /// Socket type a connection into this input must have.
    #[must_use]
    pub const fn socket(self) -> SocketType {
        match self {
            Self::Socket { socket } => socket,
            Self::Int { .. } => SocketType::Int,
            Self::Boolean { .. } => SocketType::Boolean,
            Self::Choice { .. } => SocketType::Combo,
        }
    }
}

/// One named input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct InputSpec {
    /// Parameter name.
    pub name: &'static str,
    /// Widget and default.
    pub kind: ParamKind,
    /// Filled in by the host rather than shown to the user.
    pub hidden: bool,
}

/// One named output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OutputSpec {
    /// Output label.
    pub name: &'static str,
    /// Output type.
    pub socket: SocketType,
}

/// Everything a host needs to list and wire a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NodeDescriptor {
    /// Registration key.
    pub name: &'static str,
    /// Label shown in menus.
    pub display_name: &'static str,
    /// Menu category.
    pub category: &'static str,
    /// Entry point name.
    pub function: &'static str,
    /// Inputs in widget order.
    pub inputs: &'static [InputSpec],
    /// Outputs in socket order.
    pub outputs: &'static [OutputSpec],
}

impl NodeDescriptor {
    /// Look up an input by name.
    #[must_use]
    pub fn input(&self, name: &str) -> Option<&InputSpec> {
        self.inputs.iter().find(|i| i.name == name)
    }
}

const fn visible(name: &'static str, kind: ParamKind) -> InputSpec {
    InputSpec {
        name,
        kind,
        hidden: false,
    }
}

const fn connection(name: &'static str, socket: SocketType) -> InputSpec {
    visible(name, ParamKind::Socket { socket })
}

const CROP_MODES: [&str; 2] = [CropMode::ALL[0].as_str(), CropMode::ALL[1].as_str()];
const FILLS: [&str; 4] = [
    FillPolicy::ALL[0].as_str(),
    FillPolicy::ALL[1].as_str(),
    FillPolicy::ALL[2].as_str(),
    FillPolicy::ALL[3].as_str(),
];
const BORDER_COLORS: [&str; 3] = [
    BorderColor::ALL[0].as_str(),
    BorderColor::ALL[1].as_str(),
    BorderColor::ALL[2].as_str(),
];

const CROP_PADDING: ParamKind = ParamKind::Int {
    default: 10,
    min: 0,
    max: CropParams::CROP_PADDING_MAX,
    step: 1,
};

/// The interactive cropper.
pub const IRREGULAR_CROPPER: NodeDescriptor = NodeDescriptor {
    name: "IrregularCropper",
    display_name: "Irregular Cropper",
    category: CATEGORY,
    function: "irregular_crop",
    inputs: &[
        connection("image", SocketType::Image),
        visible(
            "crop_mode",
            ParamKind::Choice {
                options: &CROP_MODES,
                default: "polygon",
            },
        ),
        visible(
            "background_fill",
            ParamKind::Choice {
                options: &FILLS,
                default: "transparent",
            },
        ),
        visible(
            "edge_smooth",
            ParamKind::Int {
                default: 0,
                min: 0,
                max: CropParams::EDGE_SMOOTH_MAX,
                step: 1,
            },
        ),
        visible("auto_crop", ParamKind::Boolean { default: true }),
        visible("crop_padding", CROP_PADDING),
        InputSpec {
            name: "unique_id",
            kind: ParamKind::Socket {
                socket: SocketType::UniqueId,
            },
            hidden: true,
        },
    ],
    outputs: &[
        OutputSpec {
            name: "cropped_image",
            socket: SocketType::Image,
        },
        OutputSpec {
            name: "selection",
            socket: SocketType::Mask,
        },
    ],
};

/// The mask border compositor.
pub const MASK_WHITE_BORDER: NodeDescriptor = NodeDescriptor {
    name: "MaskWhiteBorder",
    display_name: "Mask Border",
    category: CATEGORY,
    function: "crop_with_border",
    inputs: &[
        connection("image", SocketType::Image),
        connection("mask", SocketType::Mask),
        visible(
            "border_width",
            ParamKind::Int {
                default: 20,
                min: 0,
                max: BorderParams::BORDER_WIDTH_MAX,
                step: 1,
            },
        ),
        visible(
            "border_color",
            ParamKind::Choice {
                options: &BORDER_COLORS,
                default: "white",
            },
        ),
        visible("auto_crop", ParamKind::Boolean { default: true }),
        visible("crop_padding", CROP_PADDING),
    ],
    outputs: &[OutputSpec {
        name: "cropped_with_border",
        socket: SocketType::Image,
    }],
};

/// Every node this crate provides.
pub const NODES: &[NodeDescriptor] = &[IRREGULAR_CROPPER, MASK_WHITE_BORDER];

/// Find a node by registration key.
#[must_use]
pub fn lookup(name: &str) -> Option<&'static NodeDescriptor> {
    NODES.iter().find(|node| node.name == name)
}
