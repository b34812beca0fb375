use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{json, Value};

use crate::error::{WuffsError, WuffsResult};

pub const STANDARD_FORMAT: &str = "javax_imageio_1.0";
pub const VENDOR_NODE: &str = "wuffs_imageio";

/// Minimal element tree: a name, string attributes and ordered children.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetadataNode {
    pub name: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<MetadataNode>,
}

impl MetadataNode {
    #[inline]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: BTreeMap::new(),
            children: Vec::new(),
        }
    }

    #[inline]
    fn leaf(name: &str, attr: &str, value: impl Into<String>) -> Self {
        let mut n = Self::new(name);
        n.attributes.insert(attr.to_owned(), value.into());
        n
    }

    #[inline]
    fn with_children(mut self, children: impl IntoIterator<Item = MetadataNode>) -> Self {
        self.children.extend(children);
        self
    }

    pub fn child(&self, name: &str) -> Option<&MetadataNode> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }
}

/// Read-only per-image metadata derived from the probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BasicImageMetadata {
    pub width: i32,
    pub height: i32,
    pub num_channels: i32,
}

impl BasicImageMetadata {
    #[inline]
    pub fn new(width: i32, height: i32, num_channels: i32) -> Self {
        Self {
            width,
            height,
            num_channels,
        }
    }

    #[inline]
    pub fn is_read_only(&self) -> bool {
        true
    }

    #[inline]
    fn alpha(&self) -> &'static str {
        if self.num_channels == 4 {
            "nonpremultiplied"
        } else {
            "none"
        }
    }

    #[inline]
    pub fn format_names(&self) -> &'static [&'static str] {
        &[STANDARD_FORMAT]
    }

    pub fn as_tree(&self, format_name: &str) -> WuffsResult<MetadataNode> {
        if format_name != STANDARD_FORMAT {
            return Err(WuffsError::UnsupportedMetadataFormat(format_name.to_owned()));
        }

        Ok(MetadataNode::new(STANDARD_FORMAT).with_children([
            MetadataNode::new("Chroma").with_children([
                MetadataNode::leaf("ColorSpaceType", "name", "RGB"),
                MetadataNode::leaf("NumChannels", "value", self.num_channels.to_string()),
            ]),
            MetadataNode::new("Dimension").with_children([
                MetadataNode::leaf("ImageOrientation", "value", "Normal"),
                MetadataNode::leaf("HorizontalPixelSize", "value", "1.0"),
                MetadataNode::leaf("VerticalPixelSize", "value", "1.0"),
                MetadataNode::leaf("HorizontalPixelOffset", "value", "0.0"),
                MetadataNode::leaf("VerticalPixelOffset", "value", "0.0"),
            ]),
            MetadataNode::new("Document").with_children([MetadataNode::leaf(
                "ImageCreationTime",
                "value",
                "1970-01-01T00:00:00Z",
            )]),
            MetadataNode::new("Transparency")
                .with_children([MetadataNode::leaf("Alpha", "value", self.alpha())]),
            MetadataNode::new(VENDOR_NODE).with_children([
                MetadataNode::leaf("Width", "value", self.width.to_string()),
                MetadataNode::leaf("Height", "value", self.height.to_string()),
            ]),
        ]))
    }

    pub fn merge_tree(&mut self, _format_name: &str, _root: &MetadataNode) -> WuffsResult<()> {
        Err(WuffsError::ReadOnlyMetadata)
    }

    pub fn reset(&mut self) -> WuffsResult<()> {
        Err(WuffsError::ReadOnlyMetadata)
    }

    pub fn to_json(&self) -> Value {
        json!({
            "schema": "wuffs_imageio.meta.v1",
            "width": self.width,
            "height": self.height,
            "channels": self.num_channels,
            "alpha": self.alpha(),
        })
    }
}
