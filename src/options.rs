use crate::spec::{CdataSpec, PlatformSpec};
use sha2::{Digest, Sha256};

// The recognized parse options, exactly. Anything else a caller might want
// to pass has no field here and therefore cannot reach the pipeline.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParseOptions {
    pub allowed_at_rules: Vec<String>,
    pub property_whitelist: Vec<String>,
    pub property_blacklist: Vec<String>,
    pub validate_keyframes: bool,
    pub class_selector_tree_shaking: bool,
    pub convert_width_to_max_width: bool,
    pub stylesheet_url: Option<String>,
    pub stylesheet_path: Option<String>,
}

impl ParseOptions {
    pub fn for_cdata(spec: &CdataSpec, platform: &PlatformSpec) -> Self {
        Self {
            allowed_at_rules: spec.allowed_at_rules.clone(),
            property_whitelist: spec.allowed_declarations.clone(),
            property_blacklist: platform.property_blacklist.clone(),
            validate_keyframes: spec.validate_keyframes,
            class_selector_tree_shaking: !spec.validate_keyframes,
            convert_width_to_max_width: false,
            stylesheet_url: None,
            stylesheet_path: None,
        }
    }

    // Cache key over the stylesheet text and every option that affects the
    // parsed result. The tree-shaking flag is deliberately excluded: shaking
    // runs after cache lookup, against the current document's class set.
    pub fn cache_key(&self, css: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(css.as_bytes());
        hasher.update([0u8]);
        hasher.update(self.canonical_fields().as_bytes());
        format!("{:x}", hasher.finalize())
    }

    fn canonical_fields(&self) -> String {
        let mut fields = String::new();
        push_field(&mut fields, "allowed_at_rules", &sorted(&self.allowed_at_rules));
        push_field(
            &mut fields,
            "convert_width_to_max_width",
            &self.convert_width_to_max_width.to_string(),
        );
        push_field(
            &mut fields,
            "property_blacklist",
            &sorted(&self.property_blacklist),
        );
        push_field(
            &mut fields,
            "property_whitelist",
            &sorted(&self.property_whitelist),
        );
        push_field(
            &mut fields,
            "stylesheet_path",
            self.stylesheet_path.as_deref().unwrap_or(""),
        );
        push_field(
            &mut fields,
            "stylesheet_url",
            self.stylesheet_url.as_deref().unwrap_or(""),
        );
        push_field(
            &mut fields,
            "validate_keyframes",
            &self.validate_keyframes.to_string(),
        );
        fields
    }
}

fn sorted(values: &[String]) -> String {
    let mut values: Vec<&str> = values.iter().map(|v| v.as_str()).collect();
    values.sort_unstable();
    values.join(",")
}

fn push_field(out: &mut String, key: &str, value: &str) {
    out.push_str(key);
    out.push('=');
    out.push_str(value);
    out.push('\n');
}
