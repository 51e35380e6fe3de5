#![deny(missing_docs)]
//! devmdx conversion engine: widget catalog, rewrite passes and the pipeline
//! that turns legacy CMS pages into MDX.

/// Converter configuration loaded from YAML.
pub mod config;
/// Parse → passes → serialize orchestration.
pub mod pipeline;
/// Widget catalog describing the recognized CMS idioms.
pub mod registry;
/// Tree rewrite passes.
pub mod transform;

pub use config::{CodeLanguageOptions, ConfigError, ConvertConfig, LinkOptions, LinkStyle};
pub use pipeline::{Pipeline, TransformOutput, transform};
pub use registry::{WidgetCatalog, default_devsite_catalog};
pub use transform::{FnPass, Pass, PassContext};
