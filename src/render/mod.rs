use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex_lite::Regex;

use crate::catalog::TemplateFile;
use crate::compose::CompositionPlan;
use crate::error::{FormworkError, Result};

/// The whole template grammar: a flat `{{name}}` reference. No conditionals,
/// no loops; conditional content is handled upstream by bundle selection.
fn placeholder_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_]*)\s*\}\}").expect("placeholder regex is valid")
    })
}

/// One fully rendered output file. `relative_path` contains no placeholders.
#[derive(Debug, Clone)]
pub struct RenderedArtifact {
    pub relative_path: String,
    pub content: Vec<u8>,
    pub customizable: bool,
}

/// Substitute every placeholder in `text` against the variable map.
///
/// A reference to a name the map does not contain fails the whole run; a
/// half-rendered file is worse than no file.
pub fn substitute(text: &str, variables: &BTreeMap<String, String>, file: &str) -> Result<String> {
    let re = placeholder_re();
    let mut out = String::with_capacity(text.len());
    let mut last = 0;

    for caps in re.captures_iter(text) {
        let whole = caps.get(0).expect("capture 0 always present");
        let name = &caps[1];
        let value = variables
            .get(name)
            .ok_or_else(|| FormworkError::UnknownPlaceholder {
                file: file.to_string(),
                name: name.to_string(),
            })?;
        out.push_str(&text[last..whole.start()]);
        out.push_str(value);
        last = whole.end();
    }
    out.push_str(&text[last..]);

    Ok(out)
}

/// Placeholder identifiers referenced by `text`, in order of appearance.
pub fn placeholder_names(text: &str) -> Vec<String> {
    placeholder_re()
        .captures_iter(text)
        .map(|caps| caps[1].to_string())
        .collect()
}

/// Whether `text` still contains a placeholder token. Used by the validator
/// as defense in depth against a renderer bug.
pub fn has_placeholder(text: &str) -> bool {
    placeholder_re().is_match(text)
}

/// Render one template against the variable map.
///
/// Pure: the same template and variables always produce the same bytes.
/// Binary templates pass through verbatim; their path still renders.
pub fn render_file(
    template: &TemplateFile,
    variables: &BTreeMap<String, String>,
) -> Result<RenderedArtifact> {
    let relative_path = substitute(&template.relative_path, variables, &template.relative_path)?;

    let content = if template.binary {
        template.content.clone()
    } else {
        match std::str::from_utf8(&template.content) {
            Ok(text) => substitute(text, variables, &template.relative_path)?.into_bytes(),
            // Not valid UTF-8 despite the text classification; copy verbatim.
            Err(_) => template.content.clone(),
        }
    };

    Ok(RenderedArtifact {
        relative_path,
        content,
        customizable: template.customizable,
    })
}

/// Render every file in a composition plan. Fails on the first unresolved
/// placeholder, before anything touches disk.
pub fn render_plan(
    plan: &CompositionPlan,
    variables: &BTreeMap<String, String>,
) -> Result<Vec<RenderedArtifact>> {
    plan.files
        .iter()
        .map(|template| render_file(template, variables))
        .collect()
}
