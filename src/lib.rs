mod cache;
mod debug;
mod error;
mod html;
mod options;
mod perf;
mod report;
mod resolver;
mod shake;
mod spec;
mod stylesheet;

pub use cache::{CachedStylesheet, LruParseCache, ParseCache};
pub use error::AmpCssError;
pub use html::SanitizeSummary;
pub use options::ParseOptions;
pub use perf::Telemetry;
pub use report::{CollectedErrors, ErrorCode, ValidationError, ValidationSink};
pub use resolver::{LocalUrlResolver, ResolveError, UrlResolver};
pub use shake::selector_classes;
pub use spec::{CdataSpec, PlatformSpec};
pub use stylesheet::{RuleTuple, SelectorClasses, StylesheetPart};

use debug::DebugLogger;
use html::StyleCollector;
use kuchiki::traits::TendrilSink;
use kuchiki::NodeRef;
use perf::PerfLogger;
use std::path::PathBuf;
use std::sync::Arc;

// One configured sanitizer; a single instance serves any number of
// documents and shares its parse cache between them.
pub struct AmpCss {
    spec: PlatformSpec,
    resolver: Option<Arc<dyn UrlResolver>>,
    cache: Arc<dyn ParseCache>,
    debug: Option<Arc<DebugLogger>>,
    perf: Option<Arc<PerfLogger>>,
    telemetry: Option<Arc<dyn Telemetry>>,
    tree_shaking: bool,
}

#[derive(Clone)]
pub struct AmpCssBuilder {
    spec: PlatformSpec,
    resolver: Option<Arc<dyn UrlResolver>>,
    cache: Option<Arc<dyn ParseCache>>,
    debug_path: Option<PathBuf>,
    perf_path: Option<PathBuf>,
    telemetry: Option<Arc<dyn Telemetry>>,
    tree_shaking: bool,
}

impl AmpCssBuilder {
    pub fn new() -> Self {
        Self {
            spec: PlatformSpec::amp_default(),
            resolver: None,
            cache: None,
            debug_path: None,
            perf_path: None,
            telemetry: None,
            tree_shaking: true,
        }
    }

    pub fn platform_spec(mut self, spec: PlatformSpec) -> Self {
        self.spec = spec;
        self
    }

    pub fn url_resolver(mut self, resolver: Arc<dyn UrlResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    // Share one cache across sanitizers to deduplicate parse work between
    // documents; defaults to a per-instance LRU.
    pub fn parse_cache(mut self, cache: Arc<dyn ParseCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn tree_shaking(mut self, enabled: bool) -> Self {
        self.tree_shaking = enabled;
        self
    }

    pub fn debug_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.debug_path = Some(path.into());
        self
    }

    pub fn perf_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.perf_path = Some(path.into());
        self
    }

    pub fn telemetry(mut self, telemetry: Arc<dyn Telemetry>) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    pub fn build(self) -> Result<AmpCss, AmpCssError> {
        let debug = match &self.debug_path {
            Some(path) => Some(Arc::new(DebugLogger::new(path)?)),
            None => None,
        };
        let perf = match &self.perf_path {
            Some(path) => Some(Arc::new(PerfLogger::new(path)?)),
            None => None,
        };
        Ok(AmpCss {
            spec: self.spec,
            resolver: self.resolver,
            cache: self
                .cache
                .unwrap_or_else(|| Arc::new(LruParseCache::default())),
            debug,
            perf,
            telemetry: self.telemetry,
            tree_shaking: self.tree_shaking,
        })
    }
}

impl Default for AmpCssBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl AmpCss {
    pub fn builder() -> AmpCssBuilder {
        AmpCssBuilder::new()
    }

    // Sanitize the stylesheets of a parsed document in place. Validation
    // errors go to the sink tagged with their origin node; the pass itself
    // always runs to completion.
    pub fn sanitize_document(
        &self,
        document: &NodeRef,
        sink: &dyn ValidationSink,
    ) -> SanitizeSummary {
        let telemetry: Option<&dyn Telemetry> = match &self.telemetry {
            Some(telemetry) => Some(telemetry.as_ref()),
            None => self.perf.as_ref().map(|perf| perf.as_ref() as &dyn Telemetry),
        };
        let collector = StyleCollector::new(
            &self.spec,
            self.resolver.as_deref(),
            self.cache.as_ref(),
            self.debug.as_deref(),
            telemetry,
            self.tree_shaking,
        );
        collector.run(document, sink)
    }

    pub fn sanitize_html(&self, html: &str, sink: &dyn ValidationSink) -> String {
        let document = kuchiki::parse_html().one(html);
        self.sanitize_document(&document, sink);
        document.to_string()
    }
}
