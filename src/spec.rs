use regex::Regex;

// AMP byte caps for the two stylesheet kinds.
const CUSTOM_STYLE_MAX_BYTES: usize = 75_000;
const KEYFRAMES_STYLE_MAX_BYTES: usize = 500_000;

const ALLOWED_FONT_HOSTS: &str = concat!(
    r"^https://(cloud\.typography\.com|fast\.fonts\.net|fonts\.googleapis\.com",
    r"|use\.typekit\.net|maxcdn\.bootstrapcdn\.com|use\.fontawesome\.com)/"
);

#[derive(Debug, Clone)]
pub struct CdataSpec {
    pub max_bytes: usize,
    pub allowed_at_rules: Vec<String>,
    pub allowed_declarations: Vec<String>,
    pub validate_keyframes: bool,
}

#[derive(Debug, Clone)]
pub struct PlatformSpec {
    pub style_custom: CdataSpec,
    pub style_keyframes: CdataSpec,
    pub property_blacklist: Vec<String>,
    pub allowed_font_hosts: Option<Regex>,
}

impl PlatformSpec {
    pub fn amp_default() -> Self {
        Self {
            style_custom: CdataSpec {
                max_bytes: CUSTOM_STYLE_MAX_BYTES,
                allowed_at_rules: string_list(&[
                    "font-face",
                    "keyframes",
                    "media",
                    "page",
                    "supports",
                ]),
                allowed_declarations: Vec::new(),
                validate_keyframes: false,
            },
            style_keyframes: CdataSpec {
                max_bytes: KEYFRAMES_STYLE_MAX_BYTES,
                allowed_at_rules: string_list(&["keyframes", "media", "supports"]),
                allowed_declarations: string_list(&[
                    "animation-timing-function",
                    "offset-distance",
                    "opacity",
                    "transform",
                    "visibility",
                ]),
                validate_keyframes: true,
            },
            property_blacklist: string_list(&["behavior", "-moz-binding"]),
            allowed_font_hosts: Regex::new(ALLOWED_FONT_HOSTS).ok(),
        }
    }

    pub fn is_allowed_font_url(&self, url: &str) -> bool {
        self.allowed_font_hosts
            .as_ref()
            .map(|pattern| pattern.is_match(url))
            .unwrap_or(false)
    }
}

fn string_list(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}
