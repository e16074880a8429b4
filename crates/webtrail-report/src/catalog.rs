//! Locale-aware message templates.

use std::borrow::Cow;
use std::collections::HashMap;
use std::path::Path;
use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::error::CatalogError;

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{(\d+)\}").expect("valid placeholder pattern"));

/// Locale key of the bundle consulted after every locale-specific one.
pub const ROOT_LOCALE: &str = "";

const BUILTIN_EN: &str = include_str!("messages/en.toml");

/// Message templates keyed by locale and message key.
///
/// A lookup for `de_DE` consults the `de_DE` bundle, then `de`, then the
/// root bundle. Keys without any template render as the key itself.
#[derive(Debug, Clone, Default)]
pub struct MessageCatalog {
    bundles: HashMap<String, HashMap<String, String>>,
}

impl MessageCatalog {
    /// Creates a catalog without any templates.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Creates a catalog whose root bundle holds the built-in English
    /// templates.
    pub fn builtin() -> Self {
        let mut catalog = Self::empty();
        if let Err(e) = catalog.load_toml(ROOT_LOCALE, BUILTIN_EN) {
            tracing::error!(error = %e, "built-in message bundle is invalid");
        }
        catalog
    }

    /// Adds `templates` to the bundle for `locale`, replacing existing keys.
    pub fn add_bundle<I, K, V>(&mut self, locale: &str, templates: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let bundle = self.bundles.entry(locale.to_string()).or_default();
        for (key, template) in templates {
            bundle.insert(key.into(), template.into());
        }
    }

    /// Parses a TOML document into the bundle for `locale`.
    ///
    /// Nested tables are flattened into dotted keys, so `[test] start = ".."`
    /// and `"test.start" = ".."` define the same key.
    pub fn load_toml(&mut self, locale: &str, source: &str) -> Result<usize, CatalogError> {
        let table: toml::Table = source.parse()?;
        let mut templates = Vec::new();
        flatten(String::new(), table, &mut templates)?;
        let count = templates.len();
        self.add_bundle(locale, templates);
        tracing::debug!(locale, count, "loaded message bundle");
        Ok(count)
    }

    /// Reads a TOML bundle for `locale` from `path`.
    pub fn load_toml_file(&mut self, locale: &str, path: &Path) -> Result<usize, CatalogError> {
        let source = std::fs::read_to_string(path).map_err(|e| CatalogError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        self.load_toml(locale, &source)
    }

    /// Returns the template for `key`, walking the locale fallback chain.
    pub fn template(&self, key: &str, locale: &str) -> Option<&str> {
        fallback_chain(locale)
            .filter_map(|candidate| self.bundles.get(candidate))
            .find_map(|bundle| bundle.get(key))
            .map(String::as_str)
    }

    /// Renders `key` for `locale` with positional `args`.
    ///
    /// `{n}` is replaced by argument `n`; absent arguments render as empty
    /// text, indices past the argument list stay as written.
    pub fn render(&self, key: &str, locale: &str, args: &[Option<&str>]) -> String {
        let template = self.template(key, locale).unwrap_or(key);
        substitute(template, args).into_owned()
    }
}

fn flatten(
    prefix: String,
    table: toml::Table,
    out: &mut Vec<(String, String)>,
) -> Result<(), CatalogError> {
    for (name, value) in table {
        let key = if prefix.is_empty() {
            name
        } else {
            format!("{prefix}.{name}")
        };
        match value {
            toml::Value::String(template) => out.push((key, template)),
            toml::Value::Table(nested) => flatten(key, nested, out)?,
            _ => return Err(CatalogError::NotAString { key }),
        }
    }
    Ok(())
}

/// `de_DE_x` yields `de_DE_x`, `de_DE`, `de`, then the root locale.
fn fallback_chain(locale: &str) -> impl Iterator<Item = &str> {
    let mut next = Some(locale);
    std::iter::from_fn(move || {
        let current = next?;
        next = if current.is_empty() {
            None
        } else {
            Some(current.rfind('_').map_or(ROOT_LOCALE, |at| &current[..at]))
        };
        Some(current)
    })
}

fn substitute<'t>(template: &'t str, args: &[Option<&str>]) -> Cow<'t, str> {
    PLACEHOLDER.replace_all(template, |caps: &Captures<'_>| {
        let index = caps[1].parse::<usize>().ok();
        match index.and_then(|i| args.get(i)) {
            Some(arg) => arg.unwrap_or("").to_string(),
            None => caps[0].to_string(),
        }
    })
}
