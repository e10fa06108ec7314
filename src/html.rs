use crate::cache::{CachedStylesheet, ParseCache};
use crate::debug::DebugLogger;
use crate::options::ParseOptions;
use crate::perf::Telemetry;
use crate::report::{ErrorCode, ValidationError, ValidationSink};
use crate::resolver::{ResolveError, UrlResolver};
use crate::shake::shake_stylesheet;
use crate::spec::PlatformSpec;
use crate::stylesheet::parse_and_filter;
use html5ever::{LocalName, Namespace, QualName};
use kuchiki::{Attribute, ExpandedName, NodeRef};
use md5::Md5;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

const HTML_NS: &str = "http://www.w3.org/1999/xhtml";
const INLINE_CLASS_PREFIX: &str = "amp-wp-";
const INLINE_CLASS_HEX_LEN: usize = 7;

#[derive(Debug, Clone, Default)]
pub struct SanitizeSummary {
    pub custom_bytes: usize,
    pub keyframes_bytes: usize,
    pub stylesheet_count: usize,
    pub inline_style_count: usize,
    pub excluded_count: usize,
    pub cache_hits: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SheetKind {
    Custom,
    Keyframes,
}

impl SheetKind {
    fn as_str(&self) -> &'static str {
        match self {
            SheetKind::Custom => "custom",
            SheetKind::Keyframes => "keyframes",
        }
    }
}

enum Admission {
    Admitted,
    Deduplicated,
    Rejected { overage: usize },
}

// Content-addressed accumulator for one stylesheet kind. Insertion order is
// document order of the admitted sources.
struct Accumulator {
    sheets: Vec<(String, String)>,
    seen: HashSet<String>,
    size: usize,
    max_bytes: usize,
}

impl Accumulator {
    fn new(max_bytes: usize) -> Self {
        Self {
            sheets: Vec::new(),
            seen: HashSet::new(),
            size: 0,
            max_bytes,
        }
    }

    fn admit(&mut self, css: String) -> Admission {
        let fingerprint = sha256_hex(&css);
        if self.seen.contains(&fingerprint) {
            return Admission::Deduplicated;
        }
        if self.size + css.len() > self.max_bytes {
            return Admission::Rejected {
                overage: self.size + css.len() - self.max_bytes,
            };
        }
        self.size += css.len();
        self.seen.insert(fingerprint.clone());
        self.sheets.push((fingerprint, css));
        Admission::Admitted
    }

    fn concat(&self) -> String {
        self.sheets
            .iter()
            .map(|(_, css)| css.as_str())
            .collect()
    }
}

pub(crate) struct StyleCollector<'a> {
    spec: &'a PlatformSpec,
    resolver: Option<&'a dyn UrlResolver>,
    cache: &'a dyn ParseCache,
    debug: Option<&'a DebugLogger>,
    telemetry: Option<&'a dyn Telemetry>,
    tree_shaking: bool,
    used_classes: HashSet<String>,
    custom: Accumulator,
    keyframes: Accumulator,
    custom_host: Option<NodeRef>,
    parse_seconds: f64,
    summary: SanitizeSummary,
}

impl<'a> StyleCollector<'a> {
    pub fn new(
        spec: &'a PlatformSpec,
        resolver: Option<&'a dyn UrlResolver>,
        cache: &'a dyn ParseCache,
        debug: Option<&'a DebugLogger>,
        telemetry: Option<&'a dyn Telemetry>,
        tree_shaking: bool,
    ) -> Self {
        Self {
            spec,
            resolver,
            cache,
            debug,
            telemetry,
            tree_shaking,
            used_classes: HashSet::new(),
            custom: Accumulator::new(spec.style_custom.max_bytes),
            keyframes: Accumulator::new(spec.style_keyframes.max_bytes),
            custom_host: None,
            parse_seconds: 0.0,
            summary: SanitizeSummary::default(),
        }
    }

    pub fn run(mut self, document: &NodeRef, sink: &dyn ValidationSink) -> SanitizeSummary {
        self.used_classes = collect_used_classes(document);

        let sources: Vec<NodeRef> = match document.select("style,link") {
            Ok(matches) => matches.map(|m| m.as_node().clone()).collect(),
            Err(_) => Vec::new(),
        };
        for node in sources {
            let Some(name) = element_name(&node) else {
                continue;
            };
            match name.as_str() {
                "style" => self.process_style(&node, sink),
                "link" => self.process_link(&node, sink),
                _ => {}
            }
        }

        let styled: Vec<NodeRef> = match document.select("[style]") {
            Ok(matches) => matches.map(|m| m.as_node().clone()).collect(),
            Err(_) => Vec::new(),
        };
        for node in styled {
            self.process_style_attribute(&node, sink);
        }

        self.emit_custom(document);
        self.emit_keyframes(document, sink);

        if let Some(telemetry) = self.telemetry {
            telemetry.record_span(
                "css.parse",
                self.parse_seconds,
                "total CSS parsing time for the sanitize pass",
            );
        }
        if let Some(debug) = self.debug {
            debug.emit_summary("sanitize");
            debug.flush();
        }

        self.summary.custom_bytes = self.custom.size;
        self.summary.keyframes_bytes = self.keyframes.size;
        self.summary
    }

    fn process_style(&mut self, node: &NodeRef, sink: &dyn ValidationSink) {
        let Some(element) = node.as_element() else {
            return;
        };
        let (keyframes, custom_candidate, media) = {
            let attrs = element.attributes.borrow();
            if attrs.contains("amp-boilerplate") || attrs.contains("amp4ads-boilerplate") {
                return;
            }
            if let Some(kind) = attrs.get("type") {
                if !kind.trim().is_empty() && !kind.trim().eq_ignore_ascii_case("text/css") {
                    return;
                }
            }
            (
                attrs.contains("amp-keyframes"),
                attrs.contains("amp-custom"),
                attrs.get("media").map(|m| m.to_string()),
            )
        };

        self.summary.stylesheet_count += 1;
        let css = wrap_in_media(node.text_contents(), media.as_deref());
        let kind = if keyframes {
            SheetKind::Keyframes
        } else {
            SheetKind::Custom
        };
        let options = self.options_for(kind);
        let out = self.pipeline(&css, &options, node, sink);

        let admitted = if out.is_empty() {
            true
        } else {
            self.admit(kind, out, node, sink)
        };
        // The first amp-custom style element stays in the tree; the emitter
        // replaces its contents with the concatenated output.
        if admitted && custom_candidate && self.custom_host.is_none() {
            self.custom_host = Some(node.clone());
        } else {
            node.detach();
        }
    }

    fn process_link(&mut self, node: &NodeRef, sink: &dyn ValidationSink) {
        let Some(element) = node.as_element() else {
            return;
        };
        let (href, media) = {
            let attrs = element.attributes.borrow();
            let rel = attrs.get("rel").unwrap_or("");
            if !rel
                .split_whitespace()
                .any(|token| token.eq_ignore_ascii_case("stylesheet"))
            {
                return;
            }
            (
                attrs.get("href").unwrap_or("").to_string(),
                attrs.get("media").map(|m| m.to_string()),
            )
        };
        if href.is_empty() {
            return;
        }
        if self.spec.is_allowed_font_url(&href) {
            return;
        }

        self.summary.stylesheet_count += 1;
        let Some(resolver) = self.resolver else {
            self.reject_source(
                node,
                sink,
                ValidationError::for_url(ErrorCode::PathNotFound, href),
            );
            return;
        };
        let path = match resolver.resolve(&href) {
            Ok(path) => path,
            Err(ResolveError::BadExtension(url)) => {
                self.reject_source(
                    node,
                    sink,
                    ValidationError::for_url(ErrorCode::BadFileExtension, url),
                );
                return;
            }
            Err(ResolveError::NotFound(url)) => {
                self.reject_source(
                    node,
                    sink,
                    ValidationError::for_url(ErrorCode::PathNotFound, url),
                );
                return;
            }
        };
        let css = match std::fs::read_to_string(&path) {
            Ok(css) => css,
            Err(err) => {
                let mut error = ValidationError::new(ErrorCode::StylesheetFileReadError);
                error.message = Some(err.to_string());
                error.url = Some(href);
                self.reject_source(node, sink, error);
                return;
            }
        };

        let css = wrap_in_media(css, media.as_deref());
        let mut options = self.options_for(SheetKind::Custom);
        options.stylesheet_url = Some(href);
        options.stylesheet_path = Some(path.display().to_string());
        let out = self.pipeline(&css, &options, node, sink);
        if !out.is_empty() {
            self.admit(SheetKind::Custom, out, node, sink);
        }
        node.detach();
    }

    fn process_style_attribute(&mut self, node: &NodeRef, sink: &dyn ValidationSink) {
        let Some(element) = node.as_element() else {
            return;
        };
        let value = element
            .attributes
            .borrow()
            .get("style")
            .unwrap_or("")
            .trim()
            .to_string();
        if value.is_empty() {
            element.attributes.borrow_mut().remove("style");
            return;
        }

        self.summary.inline_style_count += 1;
        let class = format!(
            "{}{}",
            INLINE_CLASS_PREFIX,
            &md5_hex(&value)[..INLINE_CLASS_HEX_LEN]
        );
        let css = format!(".{}{{{}}}", class, value);
        let mut options = self.options_for(SheetKind::Custom);
        options.class_selector_tree_shaking = false;
        options.convert_width_to_max_width = true;
        let out = self.pipeline(&css, &options, node, sink);

        if out.is_empty() {
            element.attributes.borrow_mut().remove("style");
            return;
        }
        let admitted = self.admit(SheetKind::Custom, out, node, sink);
        let mut attrs = element.attributes.borrow_mut();
        attrs.remove("style");
        if admitted {
            let existing = attrs.get("class").unwrap_or("").to_string();
            if !existing.split_whitespace().any(|token| token == class) {
                let merged = if existing.trim().is_empty() {
                    class
                } else {
                    format!("{} {}", existing.trim(), class)
                };
                attrs.insert("class", merged);
            }
        }
    }

    fn pipeline(
        &mut self,
        css: &str,
        options: &ParseOptions,
        node: &NodeRef,
        sink: &dyn ValidationSink,
    ) -> String {
        let key = options.cache_key(css);
        let cached = match self.cache.get(&key) {
            Some(hit) => {
                self.summary.cache_hits += 1;
                if let Some(debug) = self.debug {
                    debug.increment("css.cache_hits", 1);
                }
                hit
            }
            None => {
                let started = Instant::now();
                let (parts, errors) = parse_and_filter(css, options);
                self.parse_seconds += started.elapsed().as_secs_f64();
                let value = Arc::new(CachedStylesheet { parts, errors });
                self.cache.set(&key, Arc::clone(&value));
                value
            }
        };
        for error in &cached.errors {
            sink.report(error, node);
            if let Some(debug) = self.debug {
                debug.log_reject(error.code.as_str(), &reject_detail(error));
            }
        }
        let used = if options.class_selector_tree_shaking && !options.validate_keyframes {
            Some(&self.used_classes)
        } else {
            None
        };
        shake_stylesheet(&cached.parts, used)
    }

    fn admit(
        &mut self,
        kind: SheetKind,
        css: String,
        node: &NodeRef,
        sink: &dyn ValidationSink,
    ) -> bool {
        let bytes = css.len();
        let admission = match kind {
            SheetKind::Custom => self.custom.admit(css),
            SheetKind::Keyframes => self.keyframes.admit(css),
        };
        match admission {
            Admission::Rejected { overage } => {
                sink.report(&ValidationError::too_much(overage), node);
                self.summary.excluded_count += 1;
                if let Some(debug) = self.debug {
                    debug.increment("css.sheets_excluded", 1);
                    debug.log_sheet(kind.as_str(), bytes, false);
                }
                false
            }
            Admission::Admitted | Admission::Deduplicated => {
                if let Some(debug) = self.debug {
                    debug.increment("css.sheets_admitted", 1);
                    debug.log_sheet(kind.as_str(), bytes, true);
                }
                true
            }
        }
    }

    fn reject_source(&mut self, node: &NodeRef, sink: &dyn ValidationSink, error: ValidationError) {
        sink.report(&error, node);
        self.summary.excluded_count += 1;
        if let Some(debug) = self.debug {
            debug.log_reject(error.code.as_str(), &reject_detail(&error));
        }
        node.detach();
    }

    fn emit_custom(&mut self, document: &NodeRef) {
        let css = self.custom.concat();
        let host = match self.custom_host.take() {
            Some(host) => host,
            None => {
                let style = new_style_element("amp-custom");
                ensure_head(document).append(style.clone());
                style
            }
        };
        let children: Vec<NodeRef> = host.children().collect();
        for child in children {
            child.detach();
        }
        if !css.is_empty() {
            host.append(NodeRef::new_text(css));
        }
    }

    fn emit_keyframes(&mut self, document: &NodeRef, sink: &dyn ValidationSink) {
        if self.keyframes.sheets.is_empty() {
            return;
        }
        let body = match document.select_first("body") {
            Ok(body) => body.as_node().clone(),
            Err(_) => {
                sink.report(
                    &ValidationError::new(ErrorCode::MissingBodyElement),
                    document,
                );
                return;
            }
        };
        let style = new_style_element("amp-keyframes");
        style.append(NodeRef::new_text(self.keyframes.concat()));
        body.append(style);
    }

    fn options_for(&self, kind: SheetKind) -> ParseOptions {
        let cdata = match kind {
            SheetKind::Custom => &self.spec.style_custom,
            SheetKind::Keyframes => &self.spec.style_keyframes,
        };
        let mut options = ParseOptions::for_cdata(cdata, self.spec);
        if !self.tree_shaking {
            options.class_selector_tree_shaking = false;
        }
        options
    }
}

fn element_name(node: &NodeRef) -> Option<String> {
    node.as_element()
        .map(|element| element.name.local.as_ref().to_ascii_lowercase())
}

fn wrap_in_media(css: String, media: Option<&str>) -> String {
    match media {
        Some(media) if !media.trim().is_empty() && !media.trim().eq_ignore_ascii_case("all") => {
            format!("@media {}{{{}}}", media.trim(), css)
        }
        _ => css,
    }
}

fn collect_used_classes(document: &NodeRef) -> HashSet<String> {
    let mut used = HashSet::new();
    if let Ok(matches) = document.select("[class]") {
        for element in matches {
            if let Some(value) = element.attributes.borrow().get("class") {
                for token in value.split_whitespace() {
                    used.insert(token.to_string());
                }
            }
        }
    }
    used
}

fn reject_detail(error: &ValidationError) -> String {
    error
        .at_rule_name
        .as_deref()
        .or(error.property_name.as_deref())
        .or(error.url.as_deref())
        .or(error.message.as_deref())
        .unwrap_or("")
        .to_string()
}

fn new_style_element(flag: &str) -> NodeRef {
    NodeRef::new_element(
        QualName::new(None, Namespace::from(HTML_NS), LocalName::from("style")),
        vec![(
            ExpandedName::new(Namespace::from(""), LocalName::from(flag)),
            Attribute {
                prefix: None,
                value: String::new(),
            },
        )],
    )
}

fn ensure_head(document: &NodeRef) -> NodeRef {
    if let Ok(head) = document.select_first("head") {
        return head.as_node().clone();
    }
    let head = NodeRef::new_element(
        QualName::new(None, Namespace::from(HTML_NS), LocalName::from("head")),
        Vec::<(ExpandedName, Attribute)>::new(),
    );
    match document.select_first("html") {
        Ok(html) => html.as_node().prepend(head.clone()),
        Err(_) => document.prepend(head.clone()),
    }
    head
}

fn sha256_hex(text: &str) -> String {
    format!("{:x}", Sha256::digest(text.as_bytes()))
}

fn md5_hex(text: &str) -> String {
    format!("{:x}", Md5::digest(text.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::LruParseCache;
    use crate::report::CollectedErrors;
    use crate::resolver::LocalUrlResolver;
    use kuchiki::traits::TendrilSink;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn parse(html: &str) -> NodeRef {
        kuchiki::parse_html().one(html)
    }

    fn run_pass(
        document: &NodeRef,
        spec: &PlatformSpec,
        resolver: Option<&dyn UrlResolver>,
        tree_shaking: bool,
    ) -> (SanitizeSummary, Vec<ValidationError>) {
        let cache = LruParseCache::default();
        let sink = CollectedErrors::new();
        let collector = StyleCollector::new(spec, resolver, &cache, None, None, tree_shaking);
        let summary = collector.run(document, &sink);
        (summary, sink.take())
    }

    fn custom_css(document: &NodeRef) -> String {
        document
            .select_first("style[amp-custom]")
            .map(|style| style.as_node().text_contents())
            .unwrap_or_default()
    }

    fn style_element_count(document: &NodeRef) -> usize {
        document
            .select("style")
            .map(|styles| styles.count())
            .unwrap_or(0)
    }

    fn temp_dir(tag: &str) -> std::path::PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        let dir = std::env::temp_dir().join(format!(
            "ampcss_html_{}_{}_{}",
            tag,
            std::process::id(),
            nanos
        ));
        std::fs::create_dir_all(&dir).expect("create temp dir");
        dir
    }

    #[test]
    fn unused_class_rules_are_shaken() {
        let document = parse(
            "<html><head><style>.foo{color:red}.bar{color:blue}</style></head>\
             <body><p class=\"foo\">x</p></body></html>",
        );
        let spec = PlatformSpec::amp_default();
        let (summary, errors) = run_pass(&document, &spec, None, true);
        assert!(errors.is_empty());
        assert_eq!(custom_css(&document), ".foo{color:red}");
        assert_eq!(summary.custom_bytes, ".foo{color:red}".len());
        assert_eq!(style_element_count(&document), 1);
    }

    #[test]
    fn inline_style_attribute_becomes_class_rule() {
        let document = parse("<html><head></head><body><p style=\"color:red\">x</p></body></html>");
        let spec = PlatformSpec::amp_default();
        let (summary, errors) = run_pass(&document, &spec, None, true);
        assert!(errors.is_empty());
        assert_eq!(summary.inline_style_count, 1);

        let expected_class = format!("amp-wp-{}", &md5_hex("color:red")[..7]);
        let p = document.select_first("p").expect("p element");
        let attrs = p.attributes.borrow();
        assert!(attrs.get("style").is_none());
        assert_eq!(attrs.get("class"), Some(expected_class.as_str()));
        assert_eq!(
            custom_css(&document),
            format!(".{}{{color:red}}", expected_class)
        );
    }

    #[test]
    fn inline_width_is_converted_to_max_width() {
        let document =
            parse("<html><head></head><body><p style=\"width:50px\">x</p></body></html>");
        let spec = PlatformSpec::amp_default();
        let (_, errors) = run_pass(&document, &spec, None, true);
        assert!(errors.is_empty());
        assert!(custom_css(&document).contains("{max-width:50px}"));
    }

    #[test]
    fn inline_style_with_no_surviving_declarations_only_drops_attribute() {
        let document =
            parse("<html><head></head><body><p style=\"behavior:url(x)\">x</p></body></html>");
        let spec = PlatformSpec::amp_default();
        let (_, errors) = run_pass(&document, &spec, None, true);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].code, ErrorCode::IllegalCssProperty);
        let p = document.select_first("p").expect("p element");
        let attrs = p.attributes.borrow();
        assert!(attrs.get("style").is_none());
        assert!(attrs.get("class").is_none());
        assert_eq!(custom_css(&document), "");
    }

    #[test]
    fn over_budget_sheet_is_rejected_with_overage() {
        let mut spec = PlatformSpec::amp_default();
        spec.style_custom.max_bytes = 21;
        let document = parse(
            "<html><head><style>.foo{color:red}</style><style>.bar{color:teal}</style></head>\
             <body></body></html>",
        );
        let (summary, errors) = run_pass(&document, &spec, None, false);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].code, ErrorCode::TooMuchCss);
        assert_eq!(errors[0].overage_bytes, Some(10));
        assert_eq!(summary.excluded_count, 1);
        assert_eq!(custom_css(&document), ".foo{color:red}");
        assert_eq!(summary.custom_bytes, 15);
    }

    #[test]
    fn identical_sheets_are_deduplicated() {
        let document = parse(
            "<html><head><style>.a{color:red}</style><style>.a{color:red}</style></head>\
             <body><p class=a></p></body></html>",
        );
        let spec = PlatformSpec::amp_default();
        let (summary, errors) = run_pass(&document, &spec, None, true);
        assert!(errors.is_empty());
        assert_eq!(custom_css(&document), ".a{color:red}");
        assert_eq!(summary.custom_bytes, ".a{color:red}".len());
    }

    #[test]
    fn keyframes_style_is_emitted_as_last_body_child() {
        let document = parse(
            "<html><head><style amp-keyframes>@keyframes a{from{opacity:0}to{opacity:1}}</style>\
             </head><body><p>x</p></body></html>",
        );
        let spec = PlatformSpec::amp_default();
        let (summary, errors) = run_pass(&document, &spec, None, true);
        assert!(errors.is_empty());
        assert!(summary.keyframes_bytes > 0);

        let body = document.select_first("body").expect("body");
        let last = body
            .as_node()
            .children()
            .filter(|child| child.as_element().is_some())
            .last()
            .expect("last body element");
        let element = last.as_element().expect("element");
        assert_eq!(element.name.local.as_ref(), "style");
        assert!(element.attributes.borrow().contains("amp-keyframes"));
        assert!(last.text_contents().contains("@keyframes a"));
        // The source element in head is gone.
        assert!(document.select_first("head style[amp-keyframes]").is_err());
    }

    #[test]
    fn keyframes_without_body_reports_missing_body() {
        let document = NodeRef::new_document();
        let html = NodeRef::new_element(
            QualName::new(None, Namespace::from(HTML_NS), LocalName::from("html")),
            Vec::<(ExpandedName, Attribute)>::new(),
        );
        let head = NodeRef::new_element(
            QualName::new(None, Namespace::from(HTML_NS), LocalName::from("head")),
            Vec::<(ExpandedName, Attribute)>::new(),
        );
        let style = new_style_element("amp-keyframes");
        style.append(NodeRef::new_text("@keyframes a{from{opacity:0}}"));
        head.append(style);
        html.append(head);
        document.append(html);

        let spec = PlatformSpec::amp_default();
        let (_, errors) = run_pass(&document, &spec, None, true);
        assert!(errors
            .iter()
            .any(|e| e.code == ErrorCode::MissingBodyElement));
        assert!(document.select_first("style[amp-keyframes]").is_err());
    }

    #[test]
    fn linked_stylesheet_is_inlined_and_link_removed() {
        let dir = temp_dir("link");
        std::fs::write(dir.join("site.css"), ".foo{color:red}.bar{color:blue}")
            .expect("write css");
        let resolver = LocalUrlResolver::new().add_root("https://h/assets/", &dir);
        let document = parse(
            "<html><head><link rel=\"stylesheet\" href=\"https://h/assets/site.css\"></head>\
             <body><p class=foo></p></body></html>",
        );
        let spec = PlatformSpec::amp_default();
        let (summary, errors) = run_pass(&document, &spec, Some(&resolver), true);
        assert!(errors.is_empty());
        assert_eq!(summary.stylesheet_count, 1);
        assert_eq!(custom_css(&document), ".foo{color:red}");
        assert!(document.select_first("link").is_err());
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn linked_stylesheet_media_is_preserved_as_media_frame() {
        let dir = temp_dir("media");
        std::fs::write(dir.join("print.css"), ".foo{color:red}").expect("write css");
        let resolver = LocalUrlResolver::new().add_root("https://h/assets/", &dir);
        let document = parse(
            "<html><head>\
             <link rel=\"stylesheet\" href=\"https://h/assets/print.css\" media=\"print\">\
             </head><body><p class=foo></p></body></html>",
        );
        let spec = PlatformSpec::amp_default();
        let (_, errors) = run_pass(&document, &spec, Some(&resolver), true);
        assert!(errors.is_empty());
        assert_eq!(custom_css(&document), "@media print{.foo{color:red}}");
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn link_with_bad_extension_is_rejected() {
        let resolver = LocalUrlResolver::new().add_root("https://h/", std::env::temp_dir());
        let document = parse(
            "<html><head><link rel=stylesheet href=\"https://h/site.txt\"></head><body></body></html>",
        );
        let spec = PlatformSpec::amp_default();
        let (summary, errors) = run_pass(&document, &spec, Some(&resolver), true);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].code, ErrorCode::BadFileExtension);
        assert_eq!(summary.excluded_count, 1);
        assert!(document.select_first("link").is_err());
    }

    #[test]
    fn link_that_does_not_resolve_is_rejected() {
        let document = parse(
            "<html><head><link rel=stylesheet href=\"https://h/gone.css\"></head><body></body></html>",
        );
        let spec = PlatformSpec::amp_default();
        let resolver = LocalUrlResolver::new();
        let (_, errors) = run_pass(&document, &spec, Some(&resolver), true);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].code, ErrorCode::PathNotFound);
        assert!(document.select_first("link").is_err());
    }

    #[test]
    fn allowed_font_provider_links_are_left_alone() {
        let document = parse(
            "<html><head>\
             <link rel=stylesheet href=\"https://fonts.googleapis.com/css?family=Lato\">\
             </head><body></body></html>",
        );
        let spec = PlatformSpec::amp_default();
        let (summary, errors) = run_pass(&document, &spec, None, true);
        assert!(errors.is_empty());
        assert_eq!(summary.stylesheet_count, 0);
        assert!(document.select_first("link").is_ok());
    }

    #[test]
    fn boilerplate_and_foreign_type_styles_are_skipped() {
        let document = parse(
            "<html><head>\
             <style amp-boilerplate>body{visibility:hidden}</style>\
             <style type=\"text/plain\">not css</style>\
             </head><body></body></html>",
        );
        let spec = PlatformSpec::amp_default();
        let (summary, errors) = run_pass(&document, &spec, None, true);
        assert!(errors.is_empty());
        assert_eq!(summary.stylesheet_count, 0);
        assert!(document
            .select_first("style[amp-boilerplate]")
            .is_ok());
        assert!(document.select_first("style[type]").is_ok());
    }

    #[test]
    fn styles_inside_svg_are_sanitized_like_any_other() {
        let document = parse(
            "<html><head></head><body>\
             <svg><style>.foo{color:red}.bar{color:teal}</style></svg>\
             <p class=foo></p></body></html>",
        );
        let spec = PlatformSpec::amp_default();
        let (summary, errors) = run_pass(&document, &spec, None, true);
        assert!(errors.is_empty());
        assert_eq!(summary.stylesheet_count, 1);
        assert_eq!(custom_css(&document), ".foo{color:red}");
        assert!(document.select_first("svg style").is_err());
    }

    #[test]
    fn existing_amp_custom_host_is_reused() {
        let document = parse(
            "<html><head><style amp-custom>.a{color:red}</style>\
             <style>.b{color:teal}</style></head>\
             <body><p class=\"a b\"></p></body></html>",
        );
        let spec = PlatformSpec::amp_default();
        let (_, errors) = run_pass(&document, &spec, None, true);
        assert!(errors.is_empty());
        assert_eq!(style_element_count(&document), 1);
        assert_eq!(custom_css(&document), ".a{color:red}.b{color:teal}");
    }

    #[test]
    fn head_is_created_when_absent() {
        let document = NodeRef::new_document();
        let html = NodeRef::new_element(
            QualName::new(None, Namespace::from(HTML_NS), LocalName::from("html")),
            Vec::<(ExpandedName, Attribute)>::new(),
        );
        let body = NodeRef::new_element(
            QualName::new(None, Namespace::from(HTML_NS), LocalName::from("body")),
            Vec::<(ExpandedName, Attribute)>::new(),
        );
        let style = NodeRef::new_element(
            QualName::new(None, Namespace::from(HTML_NS), LocalName::from("style")),
            Vec::<(ExpandedName, Attribute)>::new(),
        );
        style.append(NodeRef::new_text("p{color:red}"));
        body.append(style);
        html.append(body);
        document.append(html);

        let spec = PlatformSpec::amp_default();
        let (_, errors) = run_pass(&document, &spec, None, true);
        assert!(errors.is_empty());
        let head_style = document
            .select_first("head style[amp-custom]")
            .expect("amp-custom in created head");
        assert_eq!(head_style.as_node().text_contents(), "p{color:red}");
    }

    #[test]
    fn cached_errors_replay_against_the_new_origin() {
        let spec = PlatformSpec::amp_default();
        let cache = LruParseCache::default();
        let html = "<html><head><style>@import url(x.css);.a{color:red}</style></head>\
                    <body><p class=a></p></body></html>";

        let first = parse(html);
        let sink = CollectedErrors::new();
        let summary = StyleCollector::new(&spec, None, &cache, None, None, true)
            .run(&first, &sink);
        assert_eq!(summary.cache_hits, 0);
        assert_eq!(sink.take().len(), 1);

        let second = parse(html);
        let sink = CollectedErrors::new();
        let summary = StyleCollector::new(&spec, None, &cache, None, None, true)
            .run(&second, &sink);
        assert_eq!(summary.cache_hits, 1);
        let errors = sink.take();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].code, ErrorCode::IllegalCssImportRule);
        assert_eq!(custom_css(&second), ".a{color:red}");
    }

    #[test]
    fn document_order_is_preserved_across_source_kinds() {
        let document = parse(
            "<html><head><style>.a{color:red}</style><style>.b{color:blue}</style></head>\
             <body><p class=\"a b\" style=\"margin:0\"></p></body></html>",
        );
        let spec = PlatformSpec::amp_default();
        let (_, errors) = run_pass(&document, &spec, None, true);
        assert!(errors.is_empty());
        let css = custom_css(&document);
        let a = css.find(".a{").expect("first sheet");
        let b = css.find(".b{").expect("second sheet");
        let inline = css.find(".amp-wp-").expect("inline sheet");
        assert!(a < b && b < inline);
    }
}
