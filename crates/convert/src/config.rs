//! Conversion configuration loaded from YAML.

use crate::registry::WidgetCatalog;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Error raised while loading a configuration file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read config {path}: {source}")]
    Io {
        /// Path that failed.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The file is not valid YAML for [`ConvertConfig`].
    #[error("invalid config: {0}")]
    Parse(#[from] serde_yaml::Error),
}

/// Everything the pipeline can be tuned with.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct ConvertConfig {
    /// Widget idioms recognized by the lowering pass.
    pub catalog: WidgetCatalog,
    /// Values substituted for `{{ name }}` interpolations.
    pub variables: BTreeMap<String, String>,
    /// Relative link rewriting.
    pub links: LinkOptions,
    /// Language detection for unlabeled code blocks.
    pub code_languages: CodeLanguageOptions,
    /// HTML elements removed together with their content.
    pub drop_elements: Vec<String>,
}

impl Default for ConvertConfig {
    fn default() -> Self {
        Self {
            catalog: WidgetCatalog::default(),
            variables: BTreeMap::new(),
            links: LinkOptions::default(),
            code_languages: CodeLanguageOptions::default(),
            drop_elements: vec![
                "devsite-mathjax".to_string(),
                "script".to_string(),
                "style".to_string(),
            ],
        }
    }
}

impl ConvertConfig {
    /// Parses a YAML document; missing fields take their defaults.
    pub fn from_yaml_str(source: &str) -> Result<Self, ConfigError> {
        if source.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(source)?)
    }

    /// Reads and parses a YAML file.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&source)
    }
}

/// How relative links to converted documents are rewritten.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LinkStyle {
    /// Leave hrefs untouched.
    #[default]
    Keep,
    /// `/path/page.md` becomes `/path/page/`.
    Pretty,
    /// `/path/page.md` becomes `/path/page.<extension>`.
    Extension,
}

/// Link rewriting options.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct LinkOptions {
    /// Rewrite style.
    pub style: LinkStyle,
    /// Target extension for [`LinkStyle::Extension`].
    pub extension: String,
    /// Source extensions that identify links to converted documents.
    pub source_extensions: Vec<String>,
}

impl Default for LinkOptions {
    fn default() -> Self {
        Self {
            style: LinkStyle::Keep,
            extension: "mdx".to_string(),
            source_extensions: vec!["md".to_string(), "html".to_string()],
        }
    }
}

/// Substring rule assigning a language to an unlabeled code block.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LanguagePattern {
    /// Text that must appear in the block.
    pub contains: String,
    /// Language assigned on match.
    pub lang: String,
}

/// Code language detection options.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct CodeLanguageOptions {
    /// Rules tried in order; the first match wins.
    pub patterns: Vec<LanguagePattern>,
    /// Language used when nothing matches.
    pub fallback: String,
}

impl Default for CodeLanguageOptions {
    fn default() -> Self {
        let patterns = [
            ("<?xml", "xml"),
            ("<!DOCTYPE html", "html"),
            ("#!/bin/bash", "bash"),
            ("#!/bin/sh", "sh"),
            ("#include <", "cpp"),
            ("package main", "go"),
            ("public static void main", "java"),
        ]
        .into_iter()
        .map(|(contains, lang)| LanguagePattern {
            contains: contains.to_string(),
            lang: lang.to_string(),
        })
        .collect();
        Self {
            patterns,
            fallback: "text".to_string(),
        }
    }
}
