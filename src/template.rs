use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use serde_json::Value;

use crate::util::read_json;

/// A fill target loaded from the template directory. The lowercased file
/// stem doubles as the selection keyword.
#[derive(Debug, Clone)]
pub struct Template {
    pub name: String,
    pub document: Value,
}

#[derive(Debug, Clone)]
pub struct TemplateLibrary {
    templates: Vec<Template>,
}

impl TemplateLibrary {
    pub fn load(dir: &Path) -> Result<Self> {
        let entries = fs::read_dir(dir)
            .with_context(|| format!("failed to read template directory: {}", dir.display()))?;

        let mut templates = Vec::new();
        for entry in entries {
            let entry = entry
                .with_context(|| format!("failed to read entry in {}", dir.display()))?;
            let path = entry.path();

            let is_json = path
                .extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| ext.eq_ignore_ascii_case("json"))
                .unwrap_or(false);
            if !is_json {
                continue;
            }

            let name = path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .map(|stem| stem.to_ascii_lowercase())
                .with_context(|| format!("invalid UTF-8 template filename: {}", path.display()))?;

            let document: Value = read_json(&path)?;
            if !document.is_object() {
                bail!("template {} must be a JSON object", path.display());
            }

            templates.push(Template { name, document });
        }

        templates.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(Self { templates })
    }

    /// Picks the first template whose name occurs as a keyword in the
    /// product name, case-insensitively.
    pub fn select(&self, product_name: &str) -> Option<&Template> {
        let haystack = product_name.to_ascii_lowercase();
        self.templates
            .iter()
            .find(|template| haystack.contains(&template.name))
    }

    pub fn names(&self) -> Vec<&str> {
        self.templates
            .iter()
            .map(|template| template.name.as_str())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}
