//! Template engine: configuration, parsing, and the parsed [`Template`].
//!
//! The [`Engine`] owns everything that shapes parsing and rendering: the
//! tag registry, the default filters, the source loader used by `include`
//! and `extends`, the optional document cache, and the optional tick
//! callback. An engine is configured once and then only read, so it can
//! be shared between threads while templates are parsed and rendered.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use liquid_rs_core::logging::render_span;
use liquid_rs_core::{LiquidError, LiquidResult, Settings};
use tracing::debug;

use crate::cache::{content_hash, DocumentCache, MemoryCache, TemplateDependency};
use crate::context::{Assigns, Context, TickFn};
use crate::filters::{Filter, FilterArgs, FilterRegistry};
use crate::lexer::{tokenize, Token};
use crate::library::TagRegistry;
use crate::loaders::{FileSystemLoader, SourceLoader};
use crate::parser::{Document, Node, Parser};
use crate::value::Value;

/// The template engine.
///
/// # Examples
///
/// ```
/// use liquid_rs_template::engine::Engine;
/// use liquid_rs_template::loaders::StringLoader;
/// use liquid_rs_template::value::Value;
///
/// let loader = StringLoader::new();
/// loader.add("greeting", "Hello {{ name }}!");
/// let engine = Engine::new().with_loader(loader);
///
/// let template = engine.parse("{% include 'greeting' %}").unwrap();
/// let out = template
///     .render([("name".to_string(), Value::from("World"))].into())
///     .unwrap();
/// assert_eq!(out, "Hello World!");
/// ```
pub struct Engine {
    tags: TagRegistry,
    filters: FilterRegistry,
    loader: Option<Arc<dyn SourceLoader>>,
    cache: Option<Arc<dyn DocumentCache>>,
    tick: Option<TickFn>,
}

impl Engine {
    /// Creates an engine with the built-in tags and standard filters, and
    /// no loader or cache.
    pub fn new() -> Self {
        Self {
            tags: TagRegistry::with_builtins(),
            filters: FilterRegistry::standard(),
            loader: None,
            cache: None,
            tick: None,
        }
    }

    /// Creates an engine from settings: a filesystem loader over the
    /// configured directories and, if enabled, an in-memory cache.
    pub fn from_settings(settings: &Settings) -> Self {
        let mut engine = Self::new();

        let templates = &settings.templates;
        if !templates.dirs.is_empty() {
            let mut loader = FileSystemLoader::new(templates.dirs.clone());
            if let Some(ext) = &templates.extension {
                loader = loader.with_extension(ext.clone());
            }
            engine = engine.with_loader(loader);
        }

        if settings.cache.enabled {
            let cache = settings
                .cache
                .max_entries
                .map_or_else(MemoryCache::new, MemoryCache::with_capacity);
            engine = engine.with_cache(Arc::new(cache));
        }

        debug!(
            dirs = ?templates.dirs,
            cache = settings.cache.enabled,
            "engine configured from settings"
        );
        engine
    }

    #[must_use]
    pub fn with_loader(self, loader: impl SourceLoader + 'static) -> Self {
        self.with_shared_loader(Arc::new(loader))
    }

    /// Installs a loader the caller keeps a handle to.
    #[must_use]
    pub fn with_shared_loader(mut self, loader: Arc<dyn SourceLoader>) -> Self {
        self.loader = Some(loader);
        self
    }

    /// Installs a document cache. The handle can be shared between engines.
    #[must_use]
    pub fn with_cache(mut self, cache: Arc<dyn DocumentCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Installs a callback run before each node is rendered.
    #[must_use]
    pub fn with_tick(mut self, tick: TickFn) -> Self {
        self.tick = Some(tick);
        self
    }

    /// Registers a custom tag. Affects templates parsed afterwards.
    pub fn register_tag<F>(&mut self, name: impl Into<String>, constructor: F)
    where
        F: Fn(&str, &mut Parser<'_>) -> LiquidResult<Box<dyn Node>> + Send + Sync + 'static,
    {
        self.tags.register(name, constructor);
    }

    /// Adds a default filter, available to every template this engine parses.
    pub fn register_filter(&mut self, filter: impl Filter + 'static) {
        self.filters.register(filter);
    }

    pub fn register_filter_fn<F>(&mut self, name: impl Into<String>, func: F)
    where
        F: Fn(&Value, &FilterArgs) -> LiquidResult<Value> + Send + Sync + 'static,
    {
        self.filters.register_fn(name, func);
    }

    pub const fn tags(&self) -> &TagRegistry {
        &self.tags
    }

    pub const fn filters(&self) -> &FilterRegistry {
        &self.filters
    }

    /// The configured loader.
    ///
    /// # Errors
    ///
    /// Returns `MissingFilesystem` if none was configured.
    pub fn loader(&self) -> LiquidResult<&Arc<dyn SourceLoader>> {
        self.loader
            .as_ref()
            .ok_or_else(|| LiquidError::MissingFilesystem("No file system".to_string()))
    }

    pub fn cache(&self) -> Option<&Arc<dyn DocumentCache>> {
        self.cache.as_ref()
    }

    /// Parses template source.
    pub fn parse(&self, source: &str) -> LiquidResult<Template> {
        self.parse_named(None, source)
    }

    /// Loads template `name` through the loader and parses it.
    pub fn parse_file(&self, name: &str) -> LiquidResult<Template> {
        let source = self.loader()?.read(name)?;
        self.parse_named(Some(name), &source)
    }

    /// Loads, parses, and renders template `name`.
    pub fn render_file(&self, name: &str, assigns: Assigns) -> LiquidResult<String> {
        self.parse_file(name)?.render(assigns)
    }

    fn parse_named(&self, name: Option<&str>, source: &str) -> LiquidResult<Template> {
        let hash = content_hash(source);
        let document = self.cached_document(&hash, || self.parse_tokens(&tokenize(source), 0))?;
        Ok(Template {
            document,
            name: name.map(str::to_string),
            filters: self.filters.clone(),
            tick: self.tick.clone(),
        })
    }

    pub(crate) fn parse_tokens(&self, tokens: &[Token], depth: usize) -> LiquidResult<Document> {
        Parser::nested(self, tokens, depth)?.parse_document()
    }

    /// Returns the cached document under `hash` if it is still current,
    /// otherwise runs `parse` and stores the result.
    pub(crate) fn cached_document(
        &self,
        hash: &str,
        parse: impl FnOnce() -> LiquidResult<Document>,
    ) -> LiquidResult<Arc<Document>> {
        let Some(cache) = &self.cache else {
            return parse().map(Arc::new);
        };

        if let Some(document) = cache.read(hash) {
            if !document.has_volatile_dependencies() {
                debug!(hash, "document cache hit");
                return Ok(document);
            }
            debug!(hash, "cached document is volatile, re-parsing");
        } else {
            debug!(hash, "document cache miss");
        }

        let document = Arc::new(parse()?);
        if !cache.write(hash, Arc::clone(&document)) {
            debug!(hash, "document cache refused entry");
        }
        Ok(document)
    }

    /// Reads and parses a template pulled in at `depth` by `include` or
    /// `extends`. `prepare` may rewrite the tokens before parsing; the
    /// cache key is always the hash of the unmodified source.
    pub(crate) fn load_dependency(
        &self,
        name: &str,
        depth: usize,
        prepare: impl FnOnce(Vec<Token>) -> LiquidResult<Vec<Token>>,
    ) -> LiquidResult<TemplateDependency> {
        let loader = self.loader()?;
        let source = loader.read(name)?;
        let hash = content_hash(&source);
        let document = self.cached_document(&hash, || {
            let tokens = prepare(tokenize(&source))?;
            self.parse_tokens(&tokens, depth + 1)
        })?;
        Ok(TemplateDependency::new(
            name,
            hash,
            document,
            Arc::clone(loader),
            self.cache.clone(),
        ))
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("tags", &self.tags)
            .field("filters", &self.filters)
            .field("loader", &self.loader.is_some())
            .field("cache", &self.cache.is_some())
            .field("tick", &self.tick.is_some())
            .finish()
    }
}

/// A parsed template, ready to render any number of times.
#[derive(Clone)]
pub struct Template {
    document: Arc<Document>,
    name: Option<String>,
    filters: FilterRegistry,
    tick: Option<TickFn>,
}

impl Template {
    pub fn document(&self) -> &Document {
        &self.document
    }

    /// The name it was loaded under, for templates read through a loader.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Renders with the engine's filters.
    pub fn render(&self, assigns: Assigns) -> LiquidResult<String> {
        self.render_with(assigns, None, HashMap::new())
    }

    /// Renders with extra filters for this call only, and initial
    /// register values for stateful tags.
    pub fn render_with(
        &self,
        assigns: Assigns,
        filters: Option<&FilterRegistry>,
        registers: HashMap<String, Value>,
    ) -> LiquidResult<String> {
        let mut ctx = Context::with_assigns(assigns)
            .with_filters(self.filters.clone())
            .with_tick(self.tick.clone());
        if let Some(extra) = filters {
            ctx.add_filters(extra);
        }
        ctx.extend_registers(registers);
        self.render_context(&mut ctx)
    }

    /// Renders against a caller-built context.
    pub fn render_context(&self, ctx: &mut Context) -> LiquidResult<String> {
        let span = render_span(self.name.as_deref().unwrap_or("<inline>"));
        let _guard = span.enter();
        let output = self.document.render(ctx);
        if let Err(err) = &output {
            debug!(error = %err, "render failed");
        }
        output
    }
}

impl fmt::Debug for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Template")
            .field("name", &self.name)
            .field("document", &self.document)
            .finish_non_exhaustive()
    }
}
