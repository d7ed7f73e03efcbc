//! Document and frame rendering options.

use serde::{Deserialize, Serialize};

/// Options fixed for the lifetime of a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentOptions {
    /// Size of `rem`
    pub root_em_size: f64,
    /// Initial size of `em`
    pub em_size: f64,
    /// Request raster images anonymously. `None` leaves the choice to the loader.
    pub anonymous_cross_origin: Option<bool>,
}

impl Default for DocumentOptions {
    fn default() -> Self {
        Self {
            root_em_size: 12.0,
            em_size: 12.0,
            anonymous_cross_origin: None,
        }
    }
}

/// Options for one rendered frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderOptions {
    /// Keep the surface size instead of adopting the root's width and height.
    pub ignore_dimensions: bool,
    /// Skip clearing the surface before drawing.
    pub ignore_clear: bool,
    /// Scale the drawing to this width.
    pub scale_width: Option<f64>,
    /// Scale the drawing to this height.
    pub scale_height: Option<f64>,
    /// Override the root's `x`.
    pub offset_x: Option<f64>,
    /// Override the root's `y`.
    pub offset_y: Option<f64>,
    /// Options for documents built from these settings.
    pub document: DocumentOptions,
}

impl RenderOptions {
    /// Options used to draw an embedded document into its host box.
    pub fn embedded(width: f64, height: f64) -> Self {
        Self {
            ignore_dimensions: true,
            ignore_clear: true,
            scale_width: Some(width),
            scale_height: Some(height),
            offset_x: Some(0.0),
            offset_y: Some(0.0),
            document: DocumentOptions::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = DocumentOptions::default();
        assert_eq!(options.root_em_size, 12.0);
        assert_eq!(options.em_size, 12.0);
        assert_eq!(options.anonymous_cross_origin, None);
    }

    #[test]
    fn test_partial_json() {
        let options: RenderOptions =
            serde_json::from_str(r#"{"ignore_clear": true, "document": {"em_size": 16}}"#).unwrap();
        assert!(options.ignore_clear);
        assert!(!options.ignore_dimensions);
        assert_eq!(options.scale_width, None);
        assert_eq!(options.document.em_size, 16.0);
        assert_eq!(options.document.root_em_size, 12.0);
    }
}
