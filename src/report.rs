use kuchiki::NodeRef;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    IllegalCssAtRule,
    IllegalCssImportRule,
    IllegalCssProperty,
    IllegalCssImportant,
    UnrecognizedCss,
    CssParseError,
    TooMuchCss,
    BadFileExtension,
    PathNotFound,
    StylesheetFileReadError,
    MissingBodyElement,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::IllegalCssAtRule => "illegal_css_at_rule",
            ErrorCode::IllegalCssImportRule => "illegal_css_import_rule",
            ErrorCode::IllegalCssProperty => "illegal_css_property",
            ErrorCode::IllegalCssImportant => "illegal_css_important",
            ErrorCode::UnrecognizedCss => "unrecognized_css",
            ErrorCode::CssParseError => "css_parse_error",
            ErrorCode::TooMuchCss => "too_much_css",
            ErrorCode::BadFileExtension => "amp_css_bad_file_extension",
            ErrorCode::PathNotFound => "amp_css_path_not_found",
            ErrorCode::StylesheetFileReadError => "stylesheet_file_read_error",
            ErrorCode::MissingBodyElement => "missing_body_element",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    pub code: ErrorCode,
    pub message: Option<String>,
    pub property_name: Option<String>,
    pub property_value: Option<String>,
    pub at_rule_name: Option<String>,
    pub url: Option<String>,
    pub overage_bytes: Option<usize>,
}

impl ValidationError {
    pub fn new(code: ErrorCode) -> Self {
        Self {
            code,
            message: None,
            property_name: None,
            property_value: None,
            at_rule_name: None,
            url: None,
            overage_bytes: None,
        }
    }

    pub fn at_rule(name: impl Into<String>) -> Self {
        let mut error = Self::new(ErrorCode::IllegalCssAtRule);
        error.at_rule_name = Some(name.into());
        error
    }

    pub fn property(name: impl Into<String>, value: impl Into<String>) -> Self {
        let mut error = Self::new(ErrorCode::IllegalCssProperty);
        error.property_name = Some(name.into());
        error.property_value = Some(value.into());
        error
    }

    pub fn important(name: impl Into<String>) -> Self {
        let mut error = Self::new(ErrorCode::IllegalCssImportant);
        error.property_name = Some(name.into());
        error
    }

    pub fn parse(message: impl Into<String>) -> Self {
        let mut error = Self::new(ErrorCode::CssParseError);
        error.message = Some(message.into());
        error
    }

    pub fn too_much(overage_bytes: usize) -> Self {
        let mut error = Self::new(ErrorCode::TooMuchCss);
        error.overage_bytes = Some(overage_bytes);
        error
    }

    pub fn for_url(code: ErrorCode, url: impl Into<String>) -> Self {
        let mut error = Self::new(code);
        error.url = Some(url.into());
        error
    }
}

pub trait ValidationSink {
    fn report(&self, error: &ValidationError, node: &NodeRef);
}

// Collecting sink; handy for tests and for callers that batch-report.
#[derive(Clone, Default)]
pub struct CollectedErrors {
    inner: Arc<Mutex<Vec<ValidationError>>>,
}

impl CollectedErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn take(&self) -> Vec<ValidationError> {
        match self.inner.lock() {
            Ok(mut errors) => errors.drain(..).collect(),
            Err(_) => Vec::new(),
        }
    }

    pub fn codes(&self) -> Vec<&'static str> {
        match self.inner.lock() {
            Ok(errors) => errors.iter().map(|e| e.code.as_str()).collect(),
            Err(_) => Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().map(|errors| errors.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ValidationSink for CollectedErrors {
    fn report(&self, error: &ValidationError, _node: &NodeRef) {
        if let Ok(mut errors) = self.inner.lock() {
            errors.push(error.clone());
        }
    }
}
