// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Dependency injection module
//!
//! Components are registered in a static [`Catalog`] of factories, each with a
//! pseudo location such as `services/data/insert_data.service`. At startup the
//! configured location globs and names select which factories run, in the
//! order injectables, middlewares, services. A factory receives a [`Context`]
//! holding the collaborators it declared, looked up among the components
//! loaded before it.

use std::{
    any::{Any, type_name},
    collections::HashSet,
    fmt,
    sync::Arc,
};

use futures::future::BoxFuture;
use glob::{MatchOptions, Pattern};
use tracing::{Span, error, info, info_span};

use crate::{
    config::ServerConfig,
    error::LoadError,
    middleware::{Middleware, MiddlewareRegistry, STANDARD, Standard},
    server::Lifecycle,
    service::{Service, ServiceRegistry},
};

/// Dependency name that always refers to the server itself
pub const API_SERVER: &str = "apiServer";

/// Type-erased loaded component
pub type Component = Arc<dyn Any + Send + Sync>;

/// Result type for loader operations
pub type LoadResult<T> = Result<T, LoadError>;

/// Factory function building a component from its context
pub type Constructor = for<'a> fn(&'a Context) -> BoxFuture<'a, LoadResult<Instance>>;

/// Kind of a component, which decides when it is loaded and where it is kept
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentKind {
    /// Shared collaborator such as a store or a client
    Injectable,
    /// Group of request adapters
    Middleware,
    /// Owner of documented HTTP operations
    Service,
}

impl ComponentKind {
    /// Lowercase name
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Injectable => "injectable",
            Self::Middleware => "middleware",
            Self::Service => "service",
        }
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A constructed component
pub enum Instance {
    /// Injectable value
    Injectable(Component),
    /// Middleware group
    Middleware(Arc<dyn Middleware>),
    /// Service, kept both type-erased for injection and as a service
    Service {
        /// Type-erased handle used when another component depends on it
        component: Component,
        /// Service handle used for routing
        service: Arc<dyn Service>,
    },
}

impl Instance {
    /// Wrap an injectable value
    pub fn injectable<T: Any + Send + Sync>(value: T) -> Self {
        Self::Injectable(Arc::new(value))
    }

    /// Wrap a middleware
    pub fn middleware<M: Middleware + 'static>(middleware: M) -> Self {
        Self::Middleware(Arc::new(middleware))
    }

    /// Wrap a service
    pub fn service<S: Service + 'static>(service: S) -> Self {
        let service = Arc::new(service);
        Self::Service {
            component: Arc::clone(&service) as Component,
            service,
        }
    }

    /// Kind of the wrapped component
    pub fn kind(&self) -> ComponentKind {
        match self {
            Self::Injectable(_) => ComponentKind::Injectable,
            Self::Middleware(_) => ComponentKind::Middleware,
            Self::Service { .. } => ComponentKind::Service,
        }
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Injectable(_) => f.write_str("Instance::Injectable"),
            Self::Middleware(m) => f.debug_tuple("Instance::Middleware").field(m).finish(),
            Self::Service { service, .. } => {
                f.debug_tuple("Instance::Service").field(service).finish()
            }
        }
    }
}

/// Registration of one component
#[derive(Clone, Copy)]
pub struct ComponentFactory {
    /// Component name, the key it is loaded and injected under
    pub name: &'static str,
    /// Pseudo path matched against location globs
    pub location: &'static str,
    /// Component kind
    pub kind: ComponentKind,
    /// Names of the collaborators the constructor needs
    pub dependencies: &'static [&'static str],
    constructor: Constructor,
}

impl ComponentFactory {
    /// Register an injectable
    pub const fn injectable(
        name: &'static str,
        location: &'static str,
        dependencies: &'static [&'static str],
        constructor: Constructor,
    ) -> Self {
        Self {
            name,
            location,
            kind: ComponentKind::Injectable,
            dependencies,
            constructor,
        }
    }

    /// Register a middleware
    pub const fn middleware(
        name: &'static str,
        location: &'static str,
        dependencies: &'static [&'static str],
        constructor: Constructor,
    ) -> Self {
        Self {
            name,
            location,
            kind: ComponentKind::Middleware,
            dependencies,
            constructor,
        }
    }

    /// Register a service
    pub const fn service(
        name: &'static str,
        location: &'static str,
        dependencies: &'static [&'static str],
        constructor: Constructor,
    ) -> Self {
        Self {
            name,
            location,
            kind: ComponentKind::Service,
            dependencies,
            constructor,
        }
    }
}

impl fmt::Debug for ComponentFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentFactory")
            .field("name", &self.name)
            .field("location", &self.location)
            .field("kind", &self.kind)
            .field("dependencies", &self.dependencies)
            .finish_non_exhaustive()
    }
}

/// Static registry of every component the binary knows about
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    factories: Vec<ComponentFactory>,
}

impl Catalog {
    /// Create an empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a factory
    #[must_use]
    pub fn register(mut self, factory: ComponentFactory) -> Self {
        self.factories.push(factory);
        self
    }

    /// Registered factories in registration order
    pub fn factories(&self) -> &[ComponentFactory] {
        &self.factories
    }

    /// Select the factories of `kind` requested by `names` or `patterns`
    ///
    /// Exact name matches come first, in the order given, then location glob
    /// matches in registration order. The first occurrence of a location wins.
    ///
    /// # Errors
    ///
    /// Returns `LoadError::ComponentNotFound` for an unknown name and
    /// `LoadError::InvalidPattern` for a pattern that does not compile.
    pub fn locate(
        &self,
        kind: ComponentKind,
        patterns: &[String],
        names: &[String],
    ) -> LoadResult<Vec<&ComponentFactory>> {
        let candidates: Vec<&ComponentFactory> =
            self.factories.iter().filter(|f| f.kind == kind).collect();

        let mut located = Vec::new();
        for name in names {
            let factory = candidates
                .iter()
                .find(|f| f.name == name.as_str())
                .ok_or_else(|| LoadError::ComponentNotFound {
                    name: name.clone(),
                    kind: kind.as_str(),
                })?;
            located.push(*factory);
        }

        let globs = patterns
            .iter()
            .map(|pattern| location_pattern(pattern))
            .collect::<LoadResult<Vec<_>>>()?;
        located.extend(
            candidates
                .iter()
                .copied()
                .filter(|f| globs.iter().any(|glob| matches_location(glob, f.location))),
        );

        let mut seen = HashSet::new();
        located.retain(|f| seen.insert(f.location));
        Ok(located)
    }
}

/// `*` and `?` never cross a `/`; only `**` spans directories
const LOCATION_MATCH: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// Compile a location glob
///
/// # Errors
///
/// Returns `LoadError::InvalidPattern` if the pattern is not a valid glob.
pub fn location_pattern(pattern: &str) -> LoadResult<Pattern> {
    Pattern::new(pattern).map_err(|source| LoadError::InvalidPattern {
        pattern: pattern.to_string(),
        source,
    })
}

/// Whether `location` is selected by `pattern`
pub fn matches_location(pattern: &Pattern, location: &str) -> bool {
    pattern.matches_with(location, LOCATION_MATCH)
}

/// Everything a constructor can reach
#[derive(Clone)]
pub struct Context {
    config: Arc<ServerConfig>,
    lifecycle: Arc<Lifecycle>,
    dependencies: Vec<(String, Component)>,
}

impl Context {
    /// Create a context from resolved collaborators
    pub fn new(
        config: Arc<ServerConfig>,
        lifecycle: Arc<Lifecycle>,
        dependencies: Vec<(String, Component)>,
    ) -> Self {
        Self {
            config,
            lifecycle,
            dependencies,
        }
    }

    /// Shared server configuration
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Lifecycle of the server being assembled
    pub fn lifecycle(&self) -> &Arc<Lifecycle> {
        &self.lifecycle
    }

    /// Span to instrument the work of `component` with
    pub fn logger(&self, component: &str) -> Span {
        info_span!("component", component = %component)
    }

    /// A declared collaborator, looked up case-insensitively
    ///
    /// # Errors
    ///
    /// Returns `LoadError::UndeclaredDependency` if the name was not declared
    /// and `LoadError::UnexpectedType` if the collaborator is not a `T`.
    pub fn get<T: Any + Send + Sync>(&self, name: &str) -> LoadResult<Arc<T>> {
        let component = find_ignore_case(&self.dependencies, name).ok_or_else(|| {
            LoadError::UndeclaredDependency {
                name: name.to_string(),
            }
        })?;

        Arc::clone(component)
            .downcast::<T>()
            .map_err(|_| LoadError::UnexpectedType {
                name: name.to_string(),
                expected: type_name::<T>(),
            })
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.dependencies.iter().map(|(n, _)| n.as_str()).collect();
        f.debug_struct("Context")
            .field("dependencies", &names)
            .finish_non_exhaustive()
    }
}

fn find_ignore_case<'a>(entries: &'a [(String, Component)], name: &str) -> Option<&'a Component> {
    entries
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, component)| component)
}

/// Components loaded at startup
#[derive(Default)]
pub struct LoadedComponents {
    injectables: Vec<(String, Component)>,
    service_components: Vec<(String, Component)>,
    /// Loaded middlewares, `STANDARD` included
    pub middlewares: MiddlewareRegistry,
    /// Loaded services
    pub services: ServiceRegistry,
}

impl fmt::Debug for LoadedComponents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let injectables: Vec<&str> = self.injectables.iter().map(|(n, _)| n.as_str()).collect();
        f.debug_struct("LoadedComponents")
            .field("injectables", &injectables)
            .field("middlewares", &self.middlewares)
            .field("services", &self.services)
            .finish()
    }
}

impl LoadedComponents {
    /// Names of the loaded injectables in load order
    pub fn injectable_names(&self) -> impl Iterator<Item = &str> {
        self.injectables.iter().map(|(n, _)| n.as_str())
    }

    fn context_for(
        &self,
        factory: &ComponentFactory,
        config: &Arc<ServerConfig>,
        lifecycle: &Arc<Lifecycle>,
    ) -> LoadResult<Context> {
        let mut dependencies = Vec::with_capacity(factory.dependencies.len());
        for name in factory.dependencies {
            if name.eq_ignore_ascii_case(API_SERVER) {
                continue;
            }
            let component = find_ignore_case(&self.injectables, name)
                .or_else(|| find_ignore_case(&self.service_components, name))
                .ok_or_else(|| LoadError::FailedToLoadInjectable {
                    missing_injectable_name: (*name).to_string(),
                })?;
            dependencies.push(((*name).to_string(), Arc::clone(component)));
        }
        Ok(Context::new(
            Arc::clone(config),
            Arc::clone(lifecycle),
            dependencies,
        ))
    }

    async fn load(
        &mut self,
        factory: &ComponentFactory,
        config: &Arc<ServerConfig>,
        lifecycle: &Arc<Lifecycle>,
    ) -> LoadResult<()> {
        let context = self.context_for(factory, config, lifecycle)?;
        let instance = (factory.constructor)(&context).await?;
        let name = factory.name.to_string();

        match (factory.kind, instance) {
            (ComponentKind::Injectable, Instance::Injectable(component)) => {
                self.injectables.push((name, component));
            }
            (ComponentKind::Middleware, Instance::Middleware(middleware)) => {
                self.middlewares.insert(name, middleware);
            }
            (ComponentKind::Service, Instance::Service { component, service }) => {
                self.service_components.push((name.clone(), component));
                self.services.insert(name, service);
            }
            (expected, instance) => {
                return Err(LoadError::KindMismatch {
                    name,
                    expected: expected.as_str(),
                    actual: instance.kind().as_str(),
                });
            }
        }

        info!(
            component = factory.name,
            kind = %factory.kind,
            location = factory.location,
            "loaded component"
        );
        Ok(())
    }
}

/// Load the components selected by the configuration
///
/// Injectables are loaded first, then middlewares (after which the built-in
/// `STANDARD` group is registered), then services.
///
/// # Errors
///
/// Returns the first `LoadError`; the offending location is logged.
pub async fn load_components(
    catalog: &Catalog,
    config: &Arc<ServerConfig>,
    lifecycle: &Arc<Lifecycle>,
) -> LoadResult<LoadedComponents> {
    let selection = &config.components;
    let stages = [
        (
            ComponentKind::Injectable,
            &selection.injectable_locations,
            &selection.injectables,
        ),
        (
            ComponentKind::Middleware,
            &selection.middleware_locations,
            &selection.middlewares,
        ),
        (
            ComponentKind::Service,
            &selection.service_locations,
            &selection.services,
        ),
    ];

    let mut loaded = LoadedComponents::default();
    for (kind, patterns, names) in stages {
        for factory in catalog.locate(kind, patterns, names)? {
            loaded
                .load(factory, config, lifecycle)
                .await
                .inspect_err(|e| {
                    error!(
                        location = factory.location,
                        error = %e,
                        "Encountered an error when attempting to load component"
                    );
                })?;
        }
        if kind == ComponentKind::Middleware {
            loaded.middlewares.insert(STANDARD, Arc::new(Standard));
        }
    }

    Ok(loaded)
}
