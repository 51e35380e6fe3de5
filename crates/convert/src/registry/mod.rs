//! Widget registry: which CMS idioms are recognized and how they lower.

/// Built-in catalog.
pub mod defaults;
/// Catalog types.
pub mod types;

pub use defaults::default_devsite_catalog;
pub use types::{ComparisonMarker, IconGlyph, Tone, WidgetCatalog};
