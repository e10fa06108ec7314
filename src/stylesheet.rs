use crate::options::ParseOptions;
use crate::report::{ErrorCode, ValidationError};
use crate::shake::selector_classes;
use lightningcss::properties::Property;
use lightningcss::rules::font_face::{FontFaceProperty, FontFaceRule, Source};
use lightningcss::rules::keyframes::KeyframesRule;
use lightningcss::rules::style::StyleRule;
use lightningcss::rules::CssRule;
use lightningcss::stylesheet::{ParserOptions, PrinterOptions, StyleSheet};
use lightningcss::traits::ToCss;
use std::borrow::Cow;
use url::Url;

// An impossible ID raises specificity by 1,0,0 without changing the match
// set; prefixed onto the selectors of the clone that absorbs `!important`
// declarations.
pub(crate) const SPECIFICITY_PREFIX: &str = ":root:not(#FK_ID) ";

// A parsed stylesheet is an ordered mix of opaque text chunks (at-rule
// frames, keyframes, font-face blocks) and declaration tuples that the tree
// shaker can drop selector-by-selector without re-parsing.
#[derive(Debug, Clone, PartialEq)]
pub enum StylesheetPart {
    Raw(String),
    Rule(RuleTuple),
}

#[derive(Debug, Clone, PartialEq)]
pub struct RuleTuple {
    pub selectors: Vec<SelectorClasses>,
    pub block: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectorClasses {
    pub selector: String,
    pub classes: Vec<String>,
}

pub fn parse_and_filter(
    css: &str,
    options: &ParseOptions,
) -> (Vec<StylesheetPart>, Vec<ValidationError>) {
    let mut walker = Walker {
        options,
        parts: Vec::new(),
        errors: Vec::new(),
    };
    // Font descriptor blocks cannot carry !important and lightningcss has no
    // representation for one there; the marker is stripped up front and each
    // occurrence reported against its declaration name. A disallowed
    // font-face is removed wholesale, so only the at-rule error is raised.
    let (css, font_face_important) = strip_font_face_important(css);
    if walker.at_rule_allowed("font-face") {
        for name in font_face_important {
            walker.errors.push(ValidationError::important(name));
        }
    }
    match StyleSheet::parse(&css, ParserOptions::default()) {
        Ok(sheet) => walker.walk_rules(sheet.rules.0),
        Err(err) => walker.errors.push(ValidationError::parse(err.to_string())),
    }
    (walker.parts, walker.errors)
}

fn compact<'a>() -> PrinterOptions<'a> {
    PrinterOptions {
        minify: true,
        ..PrinterOptions::default()
    }
}

#[derive(Clone, Copy, PartialEq)]
enum DeclarationContext {
    RuleSet,
    Keyframe,
}

struct Walker<'a> {
    options: &'a ParseOptions,
    parts: Vec<StylesheetPart>,
    errors: Vec<ValidationError>,
}

impl<'a> Walker<'a> {
    fn walk_rules<'i>(&mut self, rules: Vec<CssRule<'i>>) {
        for rule in rules {
            match rule {
                CssRule::Ignored => {}
                CssRule::Import(import) => {
                    self.errors.push(ValidationError::for_url(
                        ErrorCode::IllegalCssImportRule,
                        import.url.as_ref(),
                    ));
                }
                CssRule::Style(style) => self.style_rule(style),
                CssRule::Media(media) => {
                    if self.at_rule_allowed("media") {
                        let query = media.query.to_css_string(compact()).unwrap_or_default();
                        self.parts
                            .push(StylesheetPart::Raw(format!("@media {query}{{")));
                        self.walk_rules(media.rules.0);
                        self.parts.push(StylesheetPart::Raw("}".to_string()));
                    } else {
                        self.errors.push(ValidationError::at_rule("media"));
                    }
                }
                CssRule::Supports(supports) => {
                    if self.at_rule_allowed("supports") {
                        let condition =
                            supports.condition.to_css_string(compact()).unwrap_or_default();
                        self.parts
                            .push(StylesheetPart::Raw(format!("@supports {condition}{{")));
                        self.walk_rules(supports.rules.0);
                        self.parts.push(StylesheetPart::Raw("}".to_string()));
                    } else {
                        self.errors.push(ValidationError::at_rule("supports"));
                    }
                }
                CssRule::FontFace(font_face) => {
                    if self.at_rule_allowed("font-face") {
                        self.font_face_rule(font_face);
                    } else {
                        self.errors.push(ValidationError::at_rule("font-face"));
                    }
                }
                CssRule::Keyframes(keyframes) => {
                    if self.at_rule_allowed("keyframes") {
                        self.keyframes_rule(keyframes);
                    } else {
                        self.errors.push(ValidationError::at_rule("keyframes"));
                    }
                }
                CssRule::Unknown(unknown) => {
                    let name = unknown.name.as_ref().to_string();
                    if self.at_rule_allowed(&name) {
                        self.push_raw_rule(CssRule::Unknown(unknown));
                    } else {
                        self.errors.push(ValidationError::at_rule(name));
                    }
                }
                other => match other.to_css_string(compact()) {
                    Ok(text) if text.trim_start().starts_with('@') => {
                        let name = at_rule_name(&text);
                        if self.at_rule_allowed(&name) {
                            self.parts.push(StylesheetPart::Raw(text));
                        } else {
                            self.errors.push(ValidationError::at_rule(name));
                        }
                    }
                    _ => self
                        .errors
                        .push(ValidationError::new(ErrorCode::UnrecognizedCss)),
                },
            }
        }
    }

    fn at_rule_allowed(&self, name: &str) -> bool {
        self.options
            .allowed_at_rules
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(name))
    }

    fn style_rule<'i>(&mut self, style: StyleRule<'i>) {
        for _ in &style.rules.0 {
            self.errors
                .push(ValidationError::new(ErrorCode::UnrecognizedCss));
        }

        let selector_text = style.selectors.to_css_string(compact()).unwrap_or_default();
        let selectors: Vec<SelectorClasses> = split_selector_list(&selector_text)
            .into_iter()
            .map(|selector| SelectorClasses {
                classes: selector_classes(&selector),
                selector,
            })
            .collect();
        if selectors.is_empty() {
            return;
        }

        if self.options.validate_keyframes {
            // Keyframes-only stylesheets leave rule sets untouched.
            let block = style.declarations.to_css_string(compact()).unwrap_or_default();
            self.parts.push(StylesheetPart::Rule(RuleTuple {
                selectors,
                block: format!("{{{block}}}"),
            }));
            return;
        }

        let mut kept = Vec::new();
        for property in &style.declarations.declarations {
            if let Some(text) = self.filter_declaration(property, DeclarationContext::RuleSet) {
                kept.push(text);
            }
        }
        let mut important = Vec::new();
        for property in &style.declarations.important_declarations {
            if let Some(text) = self.filter_declaration(property, DeclarationContext::RuleSet) {
                important.push(text);
            }
        }
        if kept.is_empty() && important.is_empty() {
            return;
        }
        if !kept.is_empty() {
            self.parts.push(StylesheetPart::Rule(RuleTuple {
                selectors: selectors.clone(),
                block: format!("{{{}}}", kept.join(";")),
            }));
        }
        if !important.is_empty() {
            let boosted = selectors
                .iter()
                .map(|entry| SelectorClasses {
                    selector: format!("{}{}", SPECIFICITY_PREFIX, entry.selector),
                    classes: entry.classes.clone(),
                })
                .collect();
            self.parts.push(StylesheetPart::Rule(RuleTuple {
                selectors: boosted,
                block: format!("{{{}}}", important.join(";")),
            }));
        }
    }

    fn font_face_rule<'i>(&mut self, mut font_face: FontFaceRule<'i>) {
        let rewriter = FontSrcRewriter::new(self.options.stylesheet_url.as_deref());
        for property in font_face.properties.iter_mut() {
            if let FontFaceProperty::Source(sources) = property {
                rewriter.rewrite(sources);
            }
        }
        self.push_raw_rule(CssRule::FontFace(font_face));
    }

    fn keyframes_rule<'i>(&mut self, mut keyframes: KeyframesRule<'i>) {
        for frame in keyframes.keyframes.iter_mut() {
            let declarations = std::mem::take(&mut frame.declarations.declarations);
            let mut kept = Vec::with_capacity(declarations.len());
            for property in declarations {
                if self
                    .filter_declaration(&property, DeclarationContext::Keyframe)
                    .is_some()
                {
                    kept.push(property);
                }
            }
            frame.declarations.declarations = kept;

            let important = std::mem::take(&mut frame.declarations.important_declarations);
            for property in important {
                self.errors
                    .push(ValidationError::important(declaration_name(&property)));
            }
        }
        self.push_raw_rule(CssRule::Keyframes(keyframes));
    }

    fn filter_declaration(
        &mut self,
        property: &Property,
        context: DeclarationContext,
    ) -> Option<String> {
        let text = property.to_css_string(false, compact()).ok()?;
        let (name, value) = match text.split_once(':') {
            Some((name, value)) => (name.trim().to_string(), value.trim().to_string()),
            None => (text.trim().to_string(), String::new()),
        };
        if !self.declaration_allowed(&name) {
            self.errors.push(ValidationError::property(name, value));
            return None;
        }
        if context == DeclarationContext::RuleSet
            && self.options.convert_width_to_max_width
            && name.eq_ignore_ascii_case("width")
        {
            return Some(format!("max-width:{value}"));
        }
        Some(text)
    }

    fn declaration_allowed(&self, name: &str) -> bool {
        let name = name.to_ascii_lowercase();
        let base = vendor_stripped(&name);
        if !self.options.property_whitelist.is_empty() {
            return self
                .options
                .property_whitelist
                .iter()
                .any(|allowed| allowed.eq_ignore_ascii_case(base));
        }
        // Blacklist entries may carry their vendor prefix (-moz-binding), so
        // both the raw and the stripped name are checked.
        !self
            .options
            .property_blacklist
            .iter()
            .any(|blocked| blocked.eq_ignore_ascii_case(base) || blocked.eq_ignore_ascii_case(&name))
    }

    fn push_raw_rule<'i>(&mut self, rule: CssRule<'i>) {
        if let Ok(text) = rule.to_css_string(compact()) {
            if !text.is_empty() {
                self.parts.push(StylesheetPart::Raw(text));
            }
        }
    }
}

fn declaration_name(property: &Property) -> String {
    property
        .to_css_string(false, compact())
        .ok()
        .and_then(|text| {
            text.split_once(':')
                .map(|(name, _)| name.trim().to_string())
        })
        .unwrap_or_default()
}

fn vendor_stripped(name: &str) -> &str {
    if name.starts_with("--") || !name.starts_with('-') {
        return name;
    }
    match name[1..].find('-') {
        Some(idx) => &name[idx + 2..],
        None => name,
    }
}

fn strip_font_face_important(css: &str) -> (Cow<'_, str>, Vec<String>) {
    let mut names = Vec::new();
    let mut spans: Vec<(usize, usize)> = Vec::new();
    let mut search = 0;
    while let Some(at) = find_ignore_case(css, "@font-face", search) {
        let Some(open_rel) = css[at..].find('{') else {
            break;
        };
        let open = at + open_rel;
        let close = block_end(css, open);
        collect_important_spans(css, open + 1, close, &mut spans, &mut names);
        search = close.max(open + 1);
    }
    if spans.is_empty() {
        return (Cow::Borrowed(css), names);
    }
    let mut out = String::with_capacity(css.len());
    let mut last = 0;
    for (start, end) in spans {
        out.push_str(&css[last..start]);
        last = end;
    }
    out.push_str(&css[last..]);
    (Cow::Owned(out), names)
}

fn find_ignore_case(haystack: &str, needle: &str, from: usize) -> Option<usize> {
    let tail = haystack.as_bytes().get(from..)?;
    tail.windows(needle.len())
        .position(|window| window.eq_ignore_ascii_case(needle.as_bytes()))
        .map(|pos| from + pos)
}

fn block_end(css: &str, open: usize) -> usize {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    for (offset, ch) in css[open..].char_indices() {
        match quote {
            Some(q) => {
                if ch == q {
                    quote = None;
                }
            }
            None => match ch {
                '"' | '\'' => quote = Some(ch),
                '{' => depth += 1,
                '}' => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        return open + offset;
                    }
                }
                _ => {}
            },
        }
    }
    css.len()
}

fn collect_important_spans(
    css: &str,
    start: usize,
    end: usize,
    spans: &mut Vec<(usize, usize)>,
    names: &mut Vec<String>,
) {
    let bytes = css.as_bytes();
    let mut quote: Option<u8> = None;
    let mut idx = start;
    while idx < end {
        let byte = bytes[idx];
        match quote {
            Some(q) => {
                if byte == q {
                    quote = None;
                }
                idx += 1;
            }
            None if byte == b'"' || byte == b'\'' => {
                quote = Some(byte);
                idx += 1;
            }
            None if byte == b'!' => {
                let mut cursor = idx + 1;
                while cursor < end && bytes[cursor].is_ascii_whitespace() {
                    cursor += 1;
                }
                let after = cursor + "important".len();
                let matched = after <= end
                    && css
                        .get(cursor..after)
                        .map_or(false, |word| word.eq_ignore_ascii_case("important"))
                    && (after >= css.len() || !is_ident_byte(bytes[after]));
                if matched {
                    names.push(declaration_name_before(css, start, idx));
                    spans.push((idx, after));
                    idx = after;
                } else {
                    idx += 1;
                }
            }
            None => idx += 1,
        }
    }
}

fn is_ident_byte(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_'
}

fn declaration_name_before(css: &str, block_start: usize, bang: usize) -> String {
    let segment_start = css[block_start..bang]
        .rfind(';')
        .map(|pos| block_start + pos + 1)
        .unwrap_or(block_start);
    let segment = &css[segment_start..bang];
    segment
        .split_once(':')
        .map(|(name, _)| name.trim().to_string())
        .unwrap_or_else(|| segment.trim().to_string())
}

fn at_rule_name(text: &str) -> String {
    text.trim_start()
        .trim_start_matches('@')
        .chars()
        .take_while(|c| c.is_alphanumeric() || *c == '-')
        .collect()
}

fn split_selector_list(list: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    for ch in list.chars() {
        match quote {
            Some(q) => {
                current.push(ch);
                if ch == q {
                    quote = None;
                }
            }
            None => match ch {
                '"' | '\'' => {
                    quote = Some(ch);
                    current.push(ch);
                }
                '(' | '[' => {
                    depth += 1;
                    current.push(ch);
                }
                ')' | ']' => {
                    depth = depth.saturating_sub(1);
                    current.push(ch);
                }
                ',' if depth == 0 => {
                    let selector = current.trim();
                    if !selector.is_empty() {
                        out.push(selector.to_string());
                    }
                    current.clear();
                }
                _ => current.push(ch),
            },
        }
    }
    let selector = current.trim();
    if !selector.is_empty() {
        out.push(selector.to_string());
    }
    out
}

// Rewrites @font-face src URLs: relative URLs are joined against the origin
// stylesheet's directory, and data: URLs are replaced with a file URL guessed
// from the first non-data sibling plus the data URL's MIME subtype.
struct FontSrcRewriter {
    base: Option<Url>,
}

impl FontSrcRewriter {
    fn new(stylesheet_url: Option<&str>) -> Self {
        Self {
            base: stylesheet_url.and_then(|raw| Url::parse(raw).ok()),
        }
    }

    fn rewrite(&self, sources: &mut Vec<Source>) {
        // Relatives first, so the data-URL guess works from final URLs.
        for source in sources.iter_mut() {
            if let Source::Url(url_source) = source {
                if let Some(resolved) = self.resolve_relative(url_source.url.url.as_ref()) {
                    url_source.url.url = resolved.into();
                }
            }
        }
        let sibling = sources.iter().find_map(|source| match source {
            Source::Url(url_source) if !url_source.url.url.as_ref().starts_with("data:") => {
                Some(url_source.url.url.as_ref().to_string())
            }
            _ => None,
        });
        let Some(sibling) = sibling else {
            return;
        };
        for source in sources.iter_mut() {
            if let Source::Url(url_source) = source {
                let current = url_source.url.url.as_ref().to_string();
                if let Some(guessed) = guess_file_url(&current, &sibling) {
                    url_source.url.url = guessed.into();
                }
            }
        }
    }

    fn resolve_relative(&self, raw: &str) -> Option<String> {
        let base = self.base.as_ref()?;
        // Host-relative and protocol-relative URLs are taken as already
        // resolved; only stylesheet-relative paths are joined.
        if raw.is_empty() || raw.starts_with('/') || raw.starts_with("data:") {
            return None;
        }
        if Url::parse(raw).is_ok() {
            return None;
        }
        base.join(raw).ok().map(|joined| joined.to_string())
    }
}

fn guess_file_url(data_url: &str, sibling: &str) -> Option<String> {
    let rest = data_url.strip_prefix("data:")?;
    let mime_end = rest
        .find(|c| c == ';' || c == ',')
        .unwrap_or(rest.len());
    let mime = &rest[..mime_end];
    let subtype = mime.rsplit('/').next().unwrap_or(mime);
    let extension = subtype.rsplit('-').next().unwrap_or(subtype);
    if extension.is_empty() {
        return None;
    }

    let query = sibling
        .find(|c| c == '?' || c == '#')
        .unwrap_or(sibling.len());
    let (path, suffix) = sibling.split_at(query);
    let dot = path.rfind('.')?;
    if path[dot..].contains('/') {
        return None;
    }
    Some(format!("{}.{}{}", &path[..dot], extension, suffix))
}
