use crate::stylesheet::StylesheetPart;
use std::collections::HashSet;

// Class names a selector depends on. `:not(...)` groups are dropped first so
// `.a:not(.b)` never depends on `.b`; attribute groups are dropped so quoted
// values cannot contribute false class tokens.
pub fn selector_classes(selector: &str) -> Vec<String> {
    let stripped = strip_groups(selector);
    let mut classes = Vec::new();
    let mut chars = stripped.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch != '.' {
            continue;
        }
        let mut ident = String::new();
        while let Some(&next) = chars.peek() {
            if next.is_alphanumeric() || next == '-' || next == '_' {
                ident.push(next);
                chars.next();
            } else {
                break;
            }
        }
        if !ident.is_empty() && !classes.contains(&ident) {
            classes.push(ident);
        }
    }
    classes
}

fn strip_groups(selector: &str) -> String {
    let mut out = String::with_capacity(selector.len());
    let bytes = selector.as_bytes();
    let mut idx = 0;
    while idx < bytes.len() {
        let rest = &selector[idx..];
        if rest
            .get(..5)
            .map_or(false, |head| head.eq_ignore_ascii_case(":not("))
        {
            idx += skip_parenthesized(rest);
            continue;
        }
        if bytes[idx] == b'[' {
            idx += skip_bracketed(rest);
            continue;
        }
        // Walk one full char; selectors may hold non-ascii idents.
        let ch_len = rest.chars().next().map(|c| c.len_utf8()).unwrap_or(1);
        out.push_str(&rest[..ch_len]);
        idx += ch_len;
    }
    out
}

fn skip_parenthesized(rest: &str) -> usize {
    let mut depth = 0usize;
    for (offset, ch) in rest.char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return offset + 1;
                }
            }
            _ => {}
        }
    }
    rest.len()
}

fn skip_bracketed(rest: &str) -> usize {
    let mut quote: Option<char> = None;
    for (offset, ch) in rest.char_indices().skip(1) {
        match (quote, ch) {
            (Some(q), _) if ch == q => quote = None,
            (Some(_), _) => {}
            (None, '"') | (None, '\'') => quote = Some(ch),
            (None, ']') => return offset + 1,
            _ => {}
        }
    }
    rest.len()
}

// Concatenate the retained parts of a parsed stylesheet. `used` is the
// document's class set; `None` disables shaking entirely.
pub fn shake_stylesheet(parts: &[StylesheetPart], used: Option<&HashSet<String>>) -> String {
    let mut out = String::new();
    for part in parts {
        match part {
            StylesheetPart::Raw(text) => out.push_str(text),
            StylesheetPart::Rule(rule) => {
                let retained: Vec<&str> = rule
                    .selectors
                    .iter()
                    .filter(|entry| match used {
                        Some(used) => entry.classes.iter().all(|class| used.contains(class)),
                        None => true,
                    })
                    .map(|entry| entry.selector.as_str())
                    .collect();
                if retained.is_empty() {
                    continue;
                }
                out.push_str(&retained.join(","));
                out.push_str(&rule.block);
            }
        }
    }
    out
}
