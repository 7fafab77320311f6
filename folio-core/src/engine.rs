//! Trait seams for the external rendering collaborators
//!
//! The pipeline treats the diagram engine, math typesetter and syntax
//! highlighter as black-box transformers. Each seam carries the options the
//! pipeline is contractually required to pass, and a plain built-in
//! implementation that produces safe escaped markup without any external
//! engine, so the CLI works out of the box.

use anyhow::Result;

use crate::html;

/// Diagram rendering security level.
///
/// Two levels exist in the wild; the stricter one is the default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SecurityLevel {
    #[default]
    Strict,
    Loose,
}

impl SecurityLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            SecurityLevel::Strict => "strict",
            SecurityLevel::Loose => "loose",
        }
    }
}

/// Initialization options for the diagram engine.
#[derive(Debug, Clone)]
pub struct DiagramInit {
    /// Theme name understood by the engine ("dark" or "default").
    pub theme: String,
    pub security_level: SecurityLevel,
}

/// Successful diagram render output.
#[derive(Debug, Clone)]
pub struct DiagramSvg {
    pub svg: String,
}

/// A text-to-diagram engine driven by fenced diagram source.
///
/// `initialize` must be called with the current theme before each render
/// batch; a stale theme produces visually inconsistent diagrams rather than
/// errors. `render` failures carry a human-readable message and are degraded
/// per diagram by the pipeline, never aborting sibling items.
#[allow(async_fn_in_trait)]
pub trait DiagramEngine {
    fn initialize(&mut self, options: &DiagramInit);

    async fn render(&self, element_id: &str, source: &str) -> Result<DiagramSvg>;
}

/// Typesetting options for a single math expression.
///
/// `throw_on_error` and `strict` are always false when called from the
/// pipeline; a conforming engine should then degrade internally rather than
/// fail, but the pipeline still catches `Err` and falls back to showing the
/// original delimited source.
#[derive(Debug, Clone, Copy)]
pub struct MathOptions {
    pub display_mode: bool,
    pub throw_on_error: bool,
    pub strict: bool,
}

impl MathOptions {
    pub fn for_display(display_mode: bool) -> Self {
        Self {
            display_mode,
            throw_on_error: false,
            strict: false,
        }
    }
}

/// Converts LaTeX-like math source into typeset HTML.
pub trait MathEngine {
    fn typeset(&self, source: &str, options: &MathOptions) -> Result<String>;
}

/// Produces highlighted HTML for one code block.
///
/// Errors propagate: a broken highlighter is a rendering bug, not a
/// per-item degradable condition.
pub trait Highlighter {
    fn highlight(&self, code: &str, language: Option<&str>) -> Result<String>;
}

/// Fallback diagram engine: shows the diagram source as preformatted text.
#[derive(Debug, Default)]
pub struct PlainDiagramEngine {
    theme: String,
}

impl DiagramEngine for PlainDiagramEngine {
    fn initialize(&mut self, options: &DiagramInit) {
        self.theme = options.theme.clone();
    }

    async fn render(&self, _element_id: &str, source: &str) -> Result<DiagramSvg> {
        Ok(DiagramSvg {
            svg: format!(
                "<pre class=\"diagram-source\">{}</pre>",
                html::escape(source.trim_end())
            ),
        })
    }
}

/// Fallback math engine: wraps the escaped source in a styled span.
#[derive(Debug, Default)]
pub struct PlainMathEngine;

impl MathEngine for PlainMathEngine {
    fn typeset(&self, source: &str, options: &MathOptions) -> Result<String> {
        let class = if options.display_mode {
            "math math-display"
        } else {
            "math math-inline"
        };
        Ok(format!(
            "<span class=\"{}\">{}</span>",
            class,
            html::escape(source)
        ))
    }
}

/// Fallback highlighter: escaped code, no token coloring.
#[derive(Debug, Default)]
pub struct PlainHighlighter;

impl Highlighter for PlainHighlighter {
    fn highlight(&self, code: &str, _language: Option<&str>) -> Result<String> {
        Ok(html::escape(code))
    }
}
