//! Values that flow between nodes
//!
//! Every node produces exactly one [`NodeValue`]. Multi-output nodes return a
//! [`NodeValue::Bundle`] keyed by output port name, which the input resolver
//! unwraps per connection.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A value produced by a node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "kebab-case")]
pub enum NodeValue {
    /// Image data (data URL or base64) as returned by the backend
    Image(String),
    /// Plain text
    Text(String),
    /// Ordered list of texts
    TextArray(Vec<String>),
    /// Ordered list of images
    ImageArray(Vec<String>),
    /// Ordered list of colors (hex strings)
    Palette(Vec<String>),
    /// Named sub-results of a multi-output node
    Bundle(BTreeMap<String, NodeValue>),
}

impl NodeValue {
    pub fn image(data: impl Into<String>) -> Self {
        Self::Image(data.into())
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    /// Build a bundle from (name, value) pairs
    pub fn bundle<I, K>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, NodeValue)>,
        K: Into<String>,
    {
        Self::Bundle(fields.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Text content, if this is a text value
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Image data, if this is a single image
    pub fn as_image(&self) -> Option<&str> {
        match self {
            Self::Image(data) => Some(data),
            _ => None,
        }
    }

    /// Text list, if this is a text array
    pub fn as_text_array(&self) -> Option<&[String]> {
        match self {
            Self::TextArray(items) => Some(items),
            _ => None,
        }
    }

    /// Images carried by this value: a single image or an image array
    pub fn images(&self) -> Option<Vec<String>> {
        match self {
            Self::Image(data) => Some(vec![data.clone()]),
            Self::ImageArray(items) => Some(items.clone()),
            _ => None,
        }
    }

    /// Named field of a bundle
    pub fn field(&self, name: &str) -> Option<&NodeValue> {
        match self {
            Self::Bundle(fields) => fields.get(name),
            _ => None,
        }
    }

    pub fn is_bundle(&self) -> bool {
        matches!(self, Self::Bundle(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tagged_serialization() {
        let value = NodeValue::image("data:image/png;base64,AAAA");
        let json = serde_json::to_value(&value).unwrap();
        assert_eq!(json["kind"], "image");
        assert_eq!(json["value"], "data:image/png;base64,AAAA");

        let arr = NodeValue::TextArray(vec!["a".into(), "b".into()]);
        let json = serde_json::to_value(&arr).unwrap();
        assert_eq!(json["kind"], "text-array");
    }

    #[test]
    fn test_bundle_field_access() {
        let bundle = NodeValue::bundle([
            ("description", NodeValue::text("a red fox")),
            ("palette", NodeValue::Palette(vec!["#ff0000".into()])),
        ]);
        assert!(bundle.is_bundle());
        assert_eq!(
            bundle.field("description").and_then(NodeValue::as_text),
            Some("a red fox")
        );
        assert!(bundle.field("missing").is_none());
        assert!(NodeValue::text("x").field("description").is_none());
    }

    #[test]
    fn test_images_accepts_single_and_array() {
        assert_eq!(NodeValue::image("a").images(), Some(vec!["a".to_string()]));
        assert_eq!(
            NodeValue::ImageArray(vec!["a".into(), "b".into()]).images(),
            Some(vec!["a".to_string(), "b".to_string()])
        );
        assert_eq!(NodeValue::text("a").images(), None);
    }
}
