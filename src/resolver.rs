use std::fmt;
use std::path::{Component, Path, PathBuf};

const STYLESHEET_EXTENSIONS: [&str; 4] = ["css", "less", "sass", "scss"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    BadExtension(String),
    NotFound(String),
}

impl fmt::Display for ResolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolveError::BadExtension(url) => {
                write!(f, "stylesheet URL has a disallowed extension: {}", url)
            }
            ResolveError::NotFound(url) => write!(f, "stylesheet URL does not resolve: {}", url),
        }
    }
}

// Maps stylesheet URLs within the known roots to validated local paths.
pub trait UrlResolver: Send + Sync {
    fn resolve(&self, href: &str) -> Result<PathBuf, ResolveError>;
}

#[derive(Debug, Default)]
pub struct LocalUrlResolver {
    roots: Vec<(String, PathBuf)>,
}

impl LocalUrlResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_root(mut self, url_prefix: impl Into<String>, dir: impl Into<PathBuf>) -> Self {
        self.roots.push((url_prefix.into(), dir.into()));
        self
    }
}

impl UrlResolver for LocalUrlResolver {
    fn resolve(&self, href: &str) -> Result<PathBuf, ResolveError> {
        let trimmed = strip_query(href);
        if !has_stylesheet_extension(trimmed) {
            return Err(ResolveError::BadExtension(href.to_string()));
        }
        for (prefix, dir) in &self.roots {
            let Some(rest) = trimmed.strip_prefix(prefix.as_str()) else {
                continue;
            };
            let relative = Path::new(rest.trim_start_matches('/'));
            // Reject anything that could escape the root.
            if relative
                .components()
                .any(|c| !matches!(c, Component::Normal(_)))
            {
                return Err(ResolveError::NotFound(href.to_string()));
            }
            let path = dir.join(relative);
            if path.is_file() {
                return Ok(path);
            }
            return Err(ResolveError::NotFound(href.to_string()));
        }
        Err(ResolveError::NotFound(href.to_string()))
    }
}

fn strip_query(href: &str) -> &str {
    let end = href
        .find(|c| c == '?' || c == '#')
        .unwrap_or(href.len());
    &href[..end]
}

fn has_stylesheet_extension(url: &str) -> bool {
    let Some(ext) = url.rsplit('.').next() else {
        return false;
    };
    if ext.len() == url.len() {
        return false;
    }
    STYLESHEET_EXTENSIONS
        .iter()
        .any(|known| ext.eq_ignore_ascii_case(known))
}
