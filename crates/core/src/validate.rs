//! Optional post-serialization check with the MDX compiler.

use crate::frontmatter::{FrontmatterError, extract_frontmatter};
use mdxjs::{JsxRuntime, MdxParseOptions, Options, compile};

/// Error returned when converted text does not compile as MDX.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    /// The leading YAML block is not valid.
    #[error("frontmatter: {0}")]
    Frontmatter(#[from] FrontmatterError),
    /// mdxjs rejected the body.
    #[error("MDX compilation error: {0}")]
    Compile(String),
}

/// Compiles `text` with mdxjs and reports the first error.
///
/// The frontmatter block is parsed as YAML and stripped first because
/// mdxjs does not accept it.
pub fn validate_mdx(text: &str, filepath: &str) -> Result<(), ValidationError> {
    let extraction = extract_frontmatter(text)?;
    let body = &text[extraction.body_start..];

    let options = Options {
        filepath: Some(filepath.to_string()),
        jsx_runtime: Some(JsxRuntime::Automatic),
        parse: MdxParseOptions::gfm(),
        ..Default::default()
    };
    compile(body, &options).map_err(|e| ValidationError::Compile(e.to_string()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_clean_output() {
        let text = "---\ntitle: 'Hello'\n---\n\n# Hello\n\n| a | b |\n| --- | --- |\n| 1 | 2 |\n\n<Aside type=\"note\">\nBody &#123;x&#125;\n</Aside>\n";
        assert!(validate_mdx(text, "doc.mdx").is_ok());
    }

    #[test]
    fn rejects_unclosed_component() {
        let err = validate_mdx("<Aside>\n\ntext\n", "doc.mdx").unwrap_err();
        assert!(matches!(err, ValidationError::Compile(_)));
    }

    #[test]
    fn rejects_bad_frontmatter() {
        let err = validate_mdx("---\ntitle: [\n", "doc.mdx").unwrap_err();
        assert!(matches!(err, ValidationError::Frontmatter(_)));
    }
}
