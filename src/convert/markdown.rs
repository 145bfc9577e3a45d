//! Markdown to templated-HTML converter.
//!
//! Source files carry an optional front-matter header of `key: value` lines
//! terminated by a blank line. The body is rendered to HTML, then filled
//! into the template named by the `template` key (default `"default"`) from
//! the site's `_templates` directory. The render context holds every header
//! key plus the generated `content`.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use minijinja::{AutoEscape, Environment, ErrorKind};
use regex::Regex;

use crate::config::TEMPLATES_DIR;
use crate::document::{join_full, join_path};
use crate::error::Result;

use super::{Converter, ConverterFactory, ErrorMessage};

/// Template used when the header names none.
pub const DEFAULT_TEMPLATE: &str = "default";

static HEADER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\w+):[ \t]?(.*)$").expect("valid header pattern"));

/// Factory for [`MarkdownConverter`]. Matches `.md` and `.markdown` files.
pub struct MarkdownFactory;

impl ConverterFactory for MarkdownFactory {
    fn matches(&self, path: &str) -> bool {
        path.ends_with(".md") || path.ends_with(".markdown")
    }

    fn create(&self, site_root: &Path, path: &str) -> Box<dyn Converter> {
        Box::new(MarkdownConverter::new(site_root, path))
    }
}

/// Converts one Markdown file into HTML through a site template.
pub struct MarkdownConverter {
    full_path: PathBuf,
    target_path: String,
    full_target_path: PathBuf,
    templates_dir: PathBuf,
}

impl MarkdownConverter {
    pub fn new(site_root: &Path, path: &str) -> Self {
        let target_path = swap_extension(path, "html");
        Self {
            full_path: join_full(site_root, path),
            full_target_path: join_full(site_root, &target_path),
            target_path,
            templates_dir: site_root.join(TEMPLATES_DIR),
        }
    }

    fn template_environment(&self) -> Environment<'_> {
        let mut env = Environment::new();
        env.set_loader(minijinja::path_loader(&self.templates_dir));
        // Raw HTML content must pass through untouched.
        env.set_auto_escape_callback(|_| AutoEscape::None);
        env
    }
}

impl Converter for MarkdownConverter {
    fn target(&self) -> &str {
        &self.target_path
    }

    // The converter re-renders unconditionally on every build pass, so the
    // selected template is not reported as a tracked dependency.
    fn dependencies(&self) -> Vec<String> {
        Vec::new()
    }

    fn convert(&self) -> Result<Option<ErrorMessage>> {
        let text = fs::read_to_string(&self.full_path)?;
        let (header, body) = parse_header(&text);

        let mut context: BTreeMap<String, String> = header;
        let content = comrak::markdown_to_html(body, &comrak::Options::default());

        let template_name = format!(
            "{}.html",
            context
                .get("template")
                .map(String::as_str)
                .unwrap_or(DEFAULT_TEMPLATE)
        );
        let template_file = join_path(TEMPLATES_DIR, &template_name);
        context.insert("content".to_string(), content);

        let env = self.template_environment();
        let template = match env.get_template(&template_name) {
            Ok(template) => template,
            Err(e) if e.kind() == ErrorKind::TemplateNotFound => {
                return Ok(Some(ErrorMessage::new(
                    template_file,
                    format!("Template '{template_name}' was not found."),
                )));
            }
            Err(e) => {
                return Ok(Some(ErrorMessage::new(
                    template_file,
                    format!("Template syntax error: {e}."),
                )));
            }
        };

        let html = match template.render(&context) {
            Ok(html) => html,
            Err(e) => {
                return Ok(Some(ErrorMessage::new(
                    template_file,
                    format!("Template rendering failed: {e}."),
                )));
            }
        };

        fs::write(&self.full_target_path, html)?;
        Ok(None)
    }
}

/// Split a source file into its front-matter header and body.
///
/// The header ends at the first line that is blank or does not look like
/// `key: value`; a single blank separator line is consumed. Keys are
/// lowercased.
fn parse_header(text: &str) -> (BTreeMap<String, String>, &str) {
    let mut header = BTreeMap::new();
    let mut offset = 0;

    for line in text.split_inclusive('\n') {
        let trimmed = line.trim_end_matches(['\n', '\r']);
        if trimmed.is_empty() {
            offset += line.len();
            break;
        }
        let Some(caps) = HEADER_RE.captures(trimmed) else {
            break;
        };
        header.insert(caps[1].to_lowercase(), caps[2].to_string());
        offset += line.len();
    }

    (header, &text[offset..])
}

/// Replace the final extension of a relative POSIX path.
fn swap_extension(path: &str, ext: &str) -> String {
    let stem = match path.rfind('.') {
        Some(i) if i > path.rfind('/').map_or(0, |s| s + 1) => &path[..i],
        _ => path,
    };
    format!("{stem}.{ext}")
}
