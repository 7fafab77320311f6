//! Markdown rendering pipeline with protected math, diagram and code spans
//!
//! Raw spread text mixes standard Markdown with three content classes the
//! Markdown parser must never touch: `$...$`/`$$...$$` math, fenced
//! ```` ```mermaid ```` diagrams, and syntax-highlighted code blocks. The
//! pipeline shields them with placeholder tokens, runs the Markdown
//! transform, then re-injects and finishes each class in a fixed stage
//! order. The order is a hard contract; reordering stages corrupts output.
//!
//! Stages of [`prepare`] (pure, synchronous):
//!
//! 1. extract block math (`$$...$$`) into placeholder tokens;
//! 2. extract inline math (`$...$`, single line) into placeholder tokens;
//! 3. Markdown → HTML (GFM extensions, soft breaks become hard breaks);
//! 4. rewrite literal `[ ]` / `[x]` bullets into task-list checkboxes;
//! 5. scan the *original* source for diagram fences, in document order;
//! 6. swap rendered diagram code blocks for empty placeholder containers,
//!    Nth container pairing with Nth captured source;
//! 7. re-inject math tokens as placeholder elements carrying the escaped
//!    source in a data attribute.
//!
//! [`Renderer::render_to_html`] then executes the deferred jobs: diagrams
//! (async, sequential, per-item degradable), syntax highlighting (fatal on
//! error), and math typesetting (per-item fallback to the delimited
//! source). Block math extraction must precede inline extraction so `$$` is
//! never misread as two adjacent inline delimiters.

use anyhow::Result;
use once_cell::sync::Lazy;
use pulldown_cmark::{html as md_html, Event, Options, Parser};
use regex::Regex;

use crate::config::ThemeVariant;
use crate::engine::{DiagramEngine, DiagramInit, Highlighter, MathEngine, MathOptions};
use crate::html;

/// Fence language tag that marks a diagram block.
pub const DIAGRAM_LANGUAGE: &str = "mermaid";

static BLOCK_MATH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)\$\$(.+?)\$\$").expect("block math pattern"));
static INLINE_MATH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$([^$\n]+?)\$").expect("inline math pattern"));
static TASK_UNCHECKED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<li>\s*\[ \]\s*").expect("unchecked task pattern"));
static TASK_CHECKED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<li>\s*\[x\]\s*").expect("checked task pattern"));
static TASK_LIST_UL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"<ul>\s*(<li class="task-list-item">)"#).expect("task ul pattern"));
static DIAGRAM_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```mermaid\n(.*?)```").expect("diagram fence pattern"));
static DIAGRAM_CODE_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?s)<pre><code class="language-mermaid">(.*?)</code></pre>"#)
        .expect("diagram code block pattern")
});
static CODE_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?s)<pre><code(?: class="language-([^"]*)")?>(.*?)</code></pre>"#)
        .expect("code block pattern")
});

/// Per-render placeholder allocator.
///
/// Tokens come from a monotonically increasing counter local to one render
/// call, never from content hashes, so they cannot collide with user text
/// and concurrent renders of distinct documents are independent.
#[derive(Debug, Default)]
pub struct RenderContext {
    next_index: usize,
}

impl RenderContext {
    pub fn new() -> Self {
        Self::default()
    }

    fn next(&mut self) -> usize {
        let index = self.next_index;
        self.next_index += 1;
        index
    }

    // Fixed-width indices so no token is a prefix of another; `replacen`
    // must never match one token inside a longer one.
    fn math_token(&mut self, display: bool) -> String {
        if display {
            format!("MATH_BLOCK_{:04}", self.next())
        } else {
            format!("MATH_INLINE_{:04}", self.next())
        }
    }

    fn diagram_id(&mut self) -> String {
        format!("mermaid-{}", self.next())
    }
}

/// A protected math span awaiting typesetting.
#[derive(Debug, Clone, PartialEq, Eq)]
struct MathSpan {
    token: String,
    content: String,
    display: bool,
}

/// Deferred diagram render, paired with its placeholder container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagramJob {
    pub element_id: String,
    /// Exact placeholder markup as committed to the HTML.
    pub placeholder: String,
    pub source: String,
}

/// Deferred math typesetting, paired with its placeholder element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MathJob {
    /// Exact placeholder markup as committed to the HTML.
    pub placeholder: String,
    pub content: String,
    pub display: bool,
}

/// Output of the pure preparation stage: committed HTML plus the deferred
/// post-processing jobs. The caller decides when to attach the HTML to a
/// display surface and execute the jobs.
#[derive(Debug, Clone)]
pub struct Prepared {
    pub html: String,
    pub diagrams: Vec<DiagramJob>,
    pub math: Vec<MathJob>,
}

/// Run the base Markdown transform: GFM extensions plus soft-break to
/// hard-break conversion, no protected-span handling.
pub fn markdown_to_html(source: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_FOOTNOTES);

    let parser = Parser::new_ext(source, options).map(|event| match event {
        Event::SoftBreak => Event::HardBreak,
        other => other,
    });

    let mut out = String::new();
    md_html::push_html(&mut out, parser);
    out
}

/// Run the synchronous pipeline stages over one document.
pub fn prepare(source: &str, ctx: &mut RenderContext) -> Prepared {
    let mut math_spans = Vec::new();

    // Stage 1: block math first, so $$ is never read as two inline delimiters.
    let shielded = extract_math(source, &BLOCK_MATH, true, ctx, &mut math_spans);
    // Stage 2: inline math.
    let shielded = extract_math(&shielded, &INLINE_MATH, false, ctx, &mut math_spans);

    // Stage 3: base Markdown transform.
    let html = markdown_to_html(&shielded);

    // Stage 4: task-list rewrite.
    let html = rewrite_task_lists(&html);

    // Stage 5: diagram sources come from the original text, not the HTML.
    let diagram_sources = scan_diagram_fences(source);

    // Stage 6: swap rendered diagram code blocks for placeholder containers.
    let (html, containers) = replace_diagram_blocks(&html, ctx);

    // Position is the only correlation key between container and source, so
    // both lists must stay in document order.
    let diagrams = containers
        .into_iter()
        .zip(diagram_sources)
        .map(|((element_id, placeholder), source)| DiagramJob {
            element_id,
            placeholder,
            source,
        })
        .collect();

    // Stage 7: math tokens become placeholder elements.
    let (html, math) = inject_math_placeholders(html, math_spans);

    Prepared {
        html,
        diagrams,
        math,
    }
}

fn extract_math(
    source: &str,
    pattern: &Regex,
    display: bool,
    ctx: &mut RenderContext,
    spans: &mut Vec<MathSpan>,
) -> String {
    pattern
        .replace_all(source, |caps: &regex::Captures<'_>| {
            let token = ctx.math_token(display);
            spans.push(MathSpan {
                token: token.clone(),
                content: caps[1].trim().to_string(),
                display,
            });
            token
        })
        .into_owned()
}

fn rewrite_task_lists(html: &str) -> String {
    let html = TASK_UNCHECKED.replace_all(
        html,
        r#"<li class="task-list-item"><input type="checkbox" disabled> "#,
    );
    let html = TASK_CHECKED.replace_all(
        &html,
        r#"<li class="task-list-item"><input type="checkbox" checked disabled> "#,
    );
    TASK_LIST_UL
        .replace_all(&html, r#"<ul class="contains-task-list">$1"#)
        .into_owned()
}

fn scan_diagram_fences(source: &str) -> Vec<String> {
    DIAGRAM_FENCE
        .captures_iter(source)
        .map(|caps| caps[1].to_string())
        .collect()
}

fn replace_diagram_blocks(html: &str, ctx: &mut RenderContext) -> (String, Vec<(String, String)>) {
    let mut containers = Vec::new();
    let html = DIAGRAM_CODE_BLOCK
        .replace_all(html, |_: &regex::Captures<'_>| {
            let id = ctx.diagram_id();
            let placeholder = format!(r#"<div class="mermaid-diagram" id="{}"></div>"#, id);
            containers.push((id, placeholder.clone()));
            placeholder
        })
        .into_owned();
    (html, containers)
}

fn inject_math_placeholders(mut html: String, spans: Vec<MathSpan>) -> (String, Vec<MathJob>) {
    let mut jobs = Vec::with_capacity(spans.len());

    for span in spans {
        let escaped = html::escape(&span.content);
        let placeholder = if span.display {
            format!(
                r#"<div class="math-placeholder" data-math="{}" data-display="true"></div>"#,
                escaped
            )
        } else {
            format!(
                r#"<span class="math-placeholder" data-math="{}" data-display="false"></span>"#,
                escaped
            )
        };

        html = html.replacen(&span.token, &placeholder, 1);
        jobs.push(MathJob {
            placeholder,
            content: span.content,
            display: span.display,
        });
    }

    (html, jobs)
}

/// Markdown renderer owning the three engine collaborators and the theme.
///
/// Callers must serialize renders that target the same display surface; the
/// renderer does not coordinate concurrent writes to one container.
pub struct Renderer<D, M, H> {
    diagram: D,
    math: M,
    highlighter: H,
    theme: ThemeVariant,
}

impl<D, M, H> Renderer<D, M, H>
where
    D: DiagramEngine,
    M: MathEngine,
    H: Highlighter,
{
    pub fn new(diagram: D, math: M, highlighter: H, theme: ThemeVariant) -> Self {
        let mut renderer = Self {
            diagram,
            math,
            highlighter,
            theme,
        };
        renderer.init_diagram_engine();
        renderer
    }

    pub fn theme(&self) -> ThemeVariant {
        self.theme
    }

    /// Switch theme and re-initialize the diagram engine. A stale theme
    /// produces visually inconsistent diagrams rather than errors, so this
    /// must be called whenever the ambient theme changes.
    pub fn set_theme(&mut self, theme: ThemeVariant) {
        self.theme = theme;
        self.init_diagram_engine();
    }

    fn init_diagram_engine(&mut self) {
        self.diagram.initialize(&DiagramInit {
            theme: self.theme.diagram_theme().to_string(),
            security_level: Default::default(),
        });
    }

    /// Render one document to finished HTML.
    ///
    /// Diagram and math failures degrade per item; highlighter failures
    /// propagate. Diagrams are awaited sequentially in document order.
    pub async fn render_to_html(&mut self, source: &str) -> Result<String> {
        // The engine theme must be current for every batch that could
        // contain diagrams.
        self.init_diagram_engine();

        let mut ctx = RenderContext::new();
        let prepared = prepare(source, &mut ctx);
        let mut html = prepared.html;

        for job in &prepared.diagrams {
            let rendered = match self.diagram.render(&job.element_id, &job.source).await {
                Ok(output) => format!(
                    r#"<div class="mermaid-diagram" id="{}">{}</div>"#,
                    job.element_id, output.svg
                ),
                Err(err) => {
                    log::warn!("diagram {} failed to render: {err:#}", job.element_id);
                    format!(
                        r#"<div class="mermaid-diagram" id="{}"><pre class="diagram-error">Mermaid Error: {}</pre></div>"#,
                        job.element_id,
                        html::escape(&format!("{err:#}"))
                    )
                }
            };
            html = html.replacen(&job.placeholder, &rendered, 1);
        }

        html = self.highlight_code_blocks(&html)?;

        for job in &prepared.math {
            let rendered = match self
                .math
                .typeset(&job.content, &MathOptions::for_display(job.display))
            {
                Ok(output) if job.display => format!("<div>{}</div>", output),
                Ok(output) => format!("<span>{}</span>", output),
                Err(err) => {
                    // Users routinely type partial formulas while composing;
                    // show the original delimited source, no error dressing.
                    log::debug!("math typesetting failed: {err:#}");
                    if job.display {
                        html::escape(&format!("$${}$$", job.content))
                    } else {
                        html::escape(&format!("${}$", job.content))
                    }
                }
            };
            html = html.replacen(&job.placeholder, &rendered, 1);
        }

        Ok(html)
    }

    fn highlight_code_blocks(&self, html: &str) -> Result<String> {
        let mut out = String::with_capacity(html.len());
        let mut last = 0;

        for caps in CODE_BLOCK.captures_iter(html) {
            let Some(whole) = caps.get(0) else { continue };
            out.push_str(&html[last..whole.start()]);

            let language = caps.get(1).map(|m| m.as_str());
            let code = html::unescape(caps.get(2).map(|m| m.as_str()).unwrap_or_default());
            let highlighted = self.highlighter.highlight(&code, language)?;

            let class_attr = language
                .map(|lang| format!(r#" class="language-{}""#, lang))
                .unwrap_or_default();
            out.push_str(&format!(
                r#"<pre class="code-block">{}<code{}>{}</code></pre>"#,
                copy_button(),
                class_attr,
                highlighted
            ));

            last = whole.end();
        }

        out.push_str(&html[last..]);
        Ok(out)
    }
}

/// Copy-to-clipboard affordance attached to every highlighted code block.
fn copy_button() -> &'static str {
    concat!(
        r#"<button class="code-copy-btn" title="Copy code">"#,
        r#"<svg width="14" height="14" viewBox="0 0 16 16" fill="currentColor">"#,
        r#"<path d="M0 6.75C0 5.784.784 5 1.75 5h1.5a.75.75 0 0 1 0 1.5h-1.5a.25.25 0 0 0-.25.25v7.5c0 .138.112.25.25.25h7.5a.25.25 0 0 0 .25-.25v-1.5a.75.75 0 0 1 1.5 0v1.5A1.75 1.75 0 0 1 9.25 16h-7.5A1.75 1.75 0 0 1 0 14.25Z"></path>"#,
        r#"<path d="M5 1.75C5 .784 5.784 0 6.75 0h7.5C15.216 0 16 .784 16 1.75v7.5A1.75 1.75 0 0 1 14.25 11h-7.5A1.75 1.75 0 0 1 5 9.25Zm1.75-.25a.25.25 0 0 0-.25.25v7.5c0 .138.112.25.25.25h7.5a.25.25 0 0 0 .25-.25v-7.5a.25.25 0 0 0-.25-.25Z"></path>"#,
        r#"</svg></button>"#,
    )
}
