//! Registry type definitions for legacy widget recognition.

use serde::{Deserialize, Serialize};

/// Versioned catalog of CMS widget idioms the lowering pass recognizes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct WidgetCatalog {
    /// Catalog revision; bump when recognition rules change.
    pub version: u32,
    /// Comparison marker spans (`compare-better`, ...).
    pub comparisons: Vec<ComparisonMarker>,
    /// Table classes identifying prev/next navigation footers.
    pub navigation_classes: Vec<String>,
    /// Span classes rendering icon ligatures.
    pub icon_classes: Vec<String>,
    /// Icon ligature names mapped to literal glyphs.
    pub icon_glyphs: Vec<IconGlyph>,
    /// Component used for comparison callouts.
    pub callout_component: String,
}

impl Default for WidgetCatalog {
    fn default() -> Self {
        super::defaults::default_devsite_catalog()
    }
}

/// Tone of a comparison marker.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    /// Recommended practice.
    Positive,
    /// Discouraged practice.
    Negative,
}

impl Tone {
    /// Callout `type` prop for this tone.
    pub fn callout_type(self) -> &'static str {
        match self {
            Tone::Positive => "success",
            Tone::Negative => "warning",
        }
    }

    /// Glyph prefixed to list items carrying this tone.
    pub fn glyph(self) -> &'static str {
        match self {
            Tone::Positive => "✅",
            Tone::Negative => "⚠️",
        }
    }
}

/// One comparison marker class.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonMarker {
    /// Class carried by the marker span.
    pub class: String,
    /// Positive or negative.
    pub tone: Tone,
    /// Label used when the span itself is empty.
    pub label: String,
}

/// Icon ligature replaced by a glyph.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IconGlyph {
    /// Ligature text inside the icon span (e.g. `arrow_back`).
    pub name: String,
    /// Replacement text.
    pub glyph: String,
}

impl WidgetCatalog {
    /// Finds the comparison marker for `class`.
    pub fn comparison(&self, class: &str) -> Option<&ComparisonMarker> {
        self.comparisons.iter().find(|m| m.class == class)
    }

    /// Whether `class` tags a navigation table.
    pub fn is_navigation(&self, class: &str) -> bool {
        self.navigation_classes.iter().any(|c| c == class)
    }

    /// Whether `class` tags an icon span.
    pub fn is_icon(&self, class: &str) -> bool {
        self.icon_classes.iter().any(|c| c == class)
    }

    /// Glyph for an icon ligature name.
    pub fn glyph(&self, name: &str) -> Option<&str> {
        self.icon_glyphs
            .iter()
            .find(|g| g.name == name)
            .map(|g| g.glyph.as_str())
    }

    /// Every class the normalizer must keep as a marker.
    pub fn marker_classes(&self) -> Vec<String> {
        self.comparisons
            .iter()
            .map(|m| m.class.clone())
            .chain(self.navigation_classes.iter().cloned())
            .chain(self.icon_classes.iter().cloned())
            .collect()
    }
}
