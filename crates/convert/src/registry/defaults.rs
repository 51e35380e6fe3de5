//! Built-in widget catalog for Devsite content.

use super::types::{ComparisonMarker, IconGlyph, Tone, WidgetCatalog};
use once_cell::sync::Lazy;

static DEVSITE_CATALOG: Lazy<WidgetCatalog> = Lazy::new(|| WidgetCatalog {
    version: 1,
    comparisons: vec![
        comparison("compare-better", Tone::Positive, "Better"),
        comparison("compare-yes", Tone::Positive, "Yes"),
        comparison("compare-worse", Tone::Negative, "Worse"),
        comparison("compare-no", Tone::Negative, "No"),
    ],
    navigation_classes: vec!["nav-footer".to_string(), "navigation".to_string()],
    icon_classes: vec![
        "material-icons".to_string(),
        "material-symbols-outlined".to_string(),
    ],
    icon_glyphs: [
        ("arrow_back", "←"),
        ("arrow_back_ios", "←"),
        ("navigate_before", "←"),
        ("chevron_left", "←"),
        ("west", "←"),
        ("arrow_forward", "→"),
        ("arrow_forward_ios", "→"),
        ("navigate_next", "→"),
        ("chevron_right", "→"),
        ("east", "→"),
    ]
    .into_iter()
    .map(|(name, glyph)| IconGlyph {
        name: name.to_string(),
        glyph: glyph.to_string(),
    })
    .collect(),
    callout_component: "Aside".to_string(),
});

/// Creates the default Devsite widget catalog.
///
/// # Example
///
/// ```
/// use devmdx_convert::registry::defaults::default_devsite_catalog;
///
/// let catalog = default_devsite_catalog();
/// assert!(catalog.comparison("compare-better").is_some());
/// assert_eq!(catalog.glyph("arrow_back"), Some("←"));
/// ```
pub fn default_devsite_catalog() -> WidgetCatalog {
    DEVSITE_CATALOG.clone()
}

fn comparison(class: &str, tone: Tone, label: &str) -> ComparisonMarker {
    ComparisonMarker {
        class: class.to_string(),
        tone,
        label: label.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marker_classes_cover_every_widget() {
        let classes = default_devsite_catalog().marker_classes();
        for class in ["compare-worse", "nav-footer", "material-icons"] {
            assert!(classes.iter().any(|c| c == class), "missing {class}");
        }
    }

    #[test]
    fn tones_map_to_callout_types() {
        let catalog = default_devsite_catalog();
        let better = catalog.comparison("compare-better").unwrap();
        assert_eq!(better.tone.callout_type(), "success");
        let worse = catalog.comparison("compare-worse").unwrap();
        assert_eq!(worse.tone.glyph(), "⚠️");
    }

    #[test]
    fn catalog_parses_from_yaml_with_defaults() {
        let catalog: WidgetCatalog =
            serde_yaml::from_str("version: 2\nnavigationClasses: [pager]\n").unwrap();
        assert_eq!(catalog.version, 2);
        assert!(catalog.is_navigation("pager"));
        assert!(!catalog.is_navigation("nav-footer"));
        assert_eq!(catalog.callout_component, "Aside");
    }
}
