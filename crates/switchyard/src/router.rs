//! Main router implementation.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::trace;

use crate::binder::ParameterPlan;
use crate::config::RouterConfig;
use crate::container::{Container, ContainerSlot};
use crate::controller::{Controller, ControllerInfo};
use crate::error::{ConfigError, Result, RouterError};
use crate::handler::{self, BoxedHandler, HandlerFn};
use crate::method::Method;
use crate::middleware::{self, MiddlewareRef};
use crate::path::{normalize_path, segments};
use crate::resolver;
use crate::table::{Handler, RouteId, RouteSource, RouteTable};

/// What a pattern is registered with.
pub enum Target<C, R> {
    /// A closure handler.
    Closure(BoxedHandler<C, R>),
    /// A controller, expanded on first match.
    Controller(ControllerInfo<C, R>),
}

/// A freshly registered route, for further configuration.
pub struct RouteHandle<'r, C, R> {
    table: &'r mut RouteTable<C, R>,
    id: RouteId,
}

impl<C, R> RouteHandle<'_, C, R> {
    /// Returns the normalized pattern.
    pub fn pattern(&self) -> &str {
        self.table.route(self.id).pattern()
    }

    /// Returns the route id.
    pub const fn id(&self) -> RouteId {
        self.id
    }

    /// Appends route-level middleware.
    ///
    /// # Errors
    ///
    /// Fails on a route with reflection disabled.
    pub fn middleware(
        self,
        middleware: impl IntoIterator<Item = MiddlewareRef<C, R>>,
    ) -> Result<Self> {
        let route = self.table.route_mut(self.id);
        if route.reflection_disabled {
            return Err(ConfigError::MiddlewareOnRawRoute {
                pattern: route.pattern().to_string(),
            }
            .into());
        }
        route.middleware.extend(middleware);
        Ok(self)
    }

    /// Pins the route to one controller member, skipping expansion.
    ///
    /// # Errors
    ///
    /// Fails on a closure route.
    pub fn member(self, name: &str) -> Result<Self> {
        let route = self.table.route_mut(self.id);
        if let RouteSource::Controller { member, .. } = &mut route.source {
            *member = Some(name.to_string());
        } else {
            return Err(ConfigError::MemberOnClosure {
                pattern: route.pattern().to_string(),
            }
            .into());
        }
        Ok(self)
    }

    /// Passes the captured segments to the closure as plain strings.
    ///
    /// # Errors
    ///
    /// Fails on a controller route, or when middleware is already attached.
    pub fn disable_reflection(self) -> Result<Self> {
        let route = self.table.route_mut(self.id);
        let pattern = route.pattern().to_string();
        if matches!(route.source, RouteSource::Controller { .. }) {
            return Err(ConfigError::ReflectionOnController { pattern }.into());
        }
        if !route.middleware.is_empty() {
            return Err(ConfigError::MiddlewareOnRawRoute { pattern }.into());
        }
        route.reflection_disabled = true;
        Ok(self)
    }

    /// Restricts the route to `methods`.
    #[must_use]
    pub fn methods(self, methods: impl IntoIterator<Item = Method>) -> Self {
        self.table.route_mut(self.id).methods.extend(methods);
        self
    }
}

/// Routes registered inside one `Router::group` call.
pub struct GroupHandle<'r, C, R> {
    table: &'r mut RouteTable<C, R>,
    group: usize,
}

impl<C, R> GroupHandle<'_, C, R> {
    /// Appends middleware to every route of the group.
    ///
    /// # Errors
    ///
    /// Fails if any route of the group has reflection disabled.
    pub fn middleware(
        self,
        middleware: impl IntoIterator<Item = MiddlewareRef<C, R>>,
    ) -> Result<Self> {
        let middleware: Vec<_> = middleware.into_iter().collect();
        self.table.group_middleware(self.group, &middleware)?;
        Ok(self)
    }
}

/// The selected handler, copied out of the table so the lock is released
/// before anything user-provided runs.
struct Selected<C, R> {
    handler: Arc<Handler<C, R>>,
    route_middleware: Vec<MiddlewareRef<C, R>>,
    raw: bool,
    captured: Vec<String>,
}

/// Routes paths to closures and controller methods.
///
/// `C` is the request context threaded through middleware and handed to
/// handlers; `R` is the handler result.
pub struct Router<C = (), R = String> {
    table: RwLock<RouteTable<C, R>>,
    container: ContainerSlot,
    config: RouterConfig,
}

impl<C: 'static, R: 'static> Default for Router<C, R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: 'static, R: 'static> Router<C, R> {
    /// Creates a new empty router.
    pub fn new() -> Self {
        Self::with_config(RouterConfig::default())
    }

    /// Creates a router with custom settings.
    pub fn with_config(config: RouterConfig) -> Self {
        Self {
            table: RwLock::new(RouteTable::new()),
            container: ContainerSlot::new(),
            config,
        }
    }

    /// Returns the settings.
    pub const fn config(&self) -> &RouterConfig {
        &self.config
    }

    fn read(&self) -> RwLockReadGuard<'_, RouteTable<C, R>> {
        self.table.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, RouteTable<C, R>> {
        self.table.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn table_mut(&mut self) -> &mut RouteTable<C, R> {
        self.table.get_mut().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers `target` under `pattern`.
    ///
    /// # Errors
    ///
    /// Fails if the normalized pattern is taken and `overwrite` is not set.
    pub fn register(
        &mut self,
        pattern: &str,
        target: Target<C, R>,
        overwrite: bool,
    ) -> Result<RouteHandle<'_, C, R>> {
        let table = self.table_mut();
        let (source, callable) = match target {
            Target::Closure(callable) => (RouteSource::Closure, Some(callable)),
            Target::Controller(info) => (RouteSource::Controller { info, member: None }, None),
        };
        let id = table.register(pattern, source, overwrite)?;
        if let Some(callable) = callable {
            let route = table.route_mut(id);
            let label = format!("closure@{}", route.pattern);
            route.handlers.push(Arc::new(Handler::new(label, callable)));
        }
        Ok(RouteHandle { table, id })
    }

    /// Adds a closure route accepting any method.
    ///
    /// # Errors
    ///
    /// Fails if the pattern is already registered.
    pub fn add<Args: 'static, F>(&mut self, pattern: &str, f: F) -> Result<RouteHandle<'_, C, R>>
    where
        F: HandlerFn<C, R, Args>,
    {
        self.register(pattern, Target::Closure(handler::erase_fn(f)), false)
    }

    /// Registers controller `T` as an entry point.
    ///
    /// # Errors
    ///
    /// Fails if the pattern is already registered.
    pub fn entry_point<T: Controller<C, R>>(
        &mut self,
        pattern: &str,
    ) -> Result<RouteHandle<'_, C, R>> {
        self.register(pattern, Target::Controller(ControllerInfo::of::<T>()), false)
    }

    /// Registers controller `T`, replacing any route with the same pattern.
    ///
    /// # Errors
    ///
    /// See [`Router::register`].
    pub fn entry_point_overwrite<T: Controller<C, R>>(
        &mut self,
        pattern: &str,
    ) -> Result<RouteHandle<'_, C, R>> {
        self.register(pattern, Target::Controller(ControllerInfo::of::<T>()), true)
    }

    fn add_with<Args: 'static, F>(
        &mut self,
        method: Method,
        pattern: &str,
        f: F,
    ) -> Result<RouteHandle<'_, C, R>>
    where
        F: HandlerFn<C, R, Args>,
    {
        Ok(self.add(pattern, f)?.methods([method]))
    }

    /// Adds a GET route.
    ///
    /// # Errors
    ///
    /// Fails if the pattern is already registered.
    pub fn get<Args: 'static, F>(&mut self, pattern: &str, f: F) -> Result<RouteHandle<'_, C, R>>
    where
        F: HandlerFn<C, R, Args>,
    {
        self.add_with(Method::Get, pattern, f)
    }

    /// Adds a POST route.
    ///
    /// # Errors
    ///
    /// Fails if the pattern is already registered.
    pub fn post<Args: 'static, F>(&mut self, pattern: &str, f: F) -> Result<RouteHandle<'_, C, R>>
    where
        F: HandlerFn<C, R, Args>,
    {
        self.add_with(Method::Post, pattern, f)
    }

    /// Adds a PUT route.
    ///
    /// # Errors
    ///
    /// Fails if the pattern is already registered.
    pub fn put<Args: 'static, F>(&mut self, pattern: &str, f: F) -> Result<RouteHandle<'_, C, R>>
    where
        F: HandlerFn<C, R, Args>,
    {
        self.add_with(Method::Put, pattern, f)
    }

    /// Adds a PATCH route.
    ///
    /// # Errors
    ///
    /// Fails if the pattern is already registered.
    pub fn patch<Args: 'static, F>(&mut self, pattern: &str, f: F) -> Result<RouteHandle<'_, C, R>>
    where
        F: HandlerFn<C, R, Args>,
    {
        self.add_with(Method::Patch, pattern, f)
    }

    /// Adds a DELETE route.
    ///
    /// # Errors
    ///
    /// Fails if the pattern is already registered.
    pub fn delete<Args: 'static, F>(&mut self, pattern: &str, f: F) -> Result<RouteHandle<'_, C, R>>
    where
        F: HandlerFn<C, R, Args>,
    {
        self.add_with(Method::Delete, pattern, f)
    }

    /// Adds a route with any method.
    ///
    /// # Errors
    ///
    /// Fails if the pattern is already registered.
    pub fn any<Args: 'static, F>(&mut self, pattern: &str, f: F) -> Result<RouteHandle<'_, C, R>>
    where
        F: HandlerFn<C, R, Args>,
    {
        self.add(pattern, f)
    }

    /// Runs `routes` and returns a handle over every route it registered.
    ///
    /// Groups nest; a route belongs to the innermost open group only.
    ///
    /// # Errors
    ///
    /// Returns the first error raised by `routes`.
    pub fn group<F>(&mut self, routes: F) -> Result<GroupHandle<'_, C, R>>
    where
        F: FnOnce(&mut Self) -> Result<()>,
    {
        let (group, previous) = self.table_mut().open_group();
        let outcome = routes(self);
        let table = self.table_mut();
        table.close_group(previous);
        outcome?;
        Ok(GroupHandle { table, group })
    }

    /// Installs the container used for controllers, `Dep` parameters and
    /// middleware referenced by type. Takes effect on the next dispatch.
    pub fn set_container(&self, container: impl Container + 'static) {
        self.container.set(container);
    }

    /// Removes the container.
    pub fn clear_container(&self) {
        self.container.clear();
    }

    /// Returns the container slot shared with compiled handlers.
    pub const fn container(&self) -> &ContainerSlot {
        &self.container
    }

    /// Number of registered routes, including expanded ones.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Returns `true` when nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Dispatches `path` with `ctx`, returning the handler's result.
    ///
    /// `method` defaults to the configured default method.
    ///
    /// # Errors
    ///
    /// `NotFound` and `MethodNotAllowed` for unmatched requests,
    /// `ArgumentBinding` for segments that do not fit the handler,
    /// `Configuration` for wiring mistakes, and anything middleware or the
    /// handler return.
    pub fn dispatch(&self, path: &str, ctx: &mut C, method: Option<&str>) -> Result<R> {
        let path = normalize_path(path);
        let segments: Vec<&str> = segments(&path).collect();
        trace!(path = %path, method = ?method, "dispatching");

        let selected = self.select(&path, &segments, method)?;
        let compiled = Arc::clone(selected.handler.compile(&self.container)?);
        let bound = if selected.raw {
            compiled.plan().bind_raw(&selected.captured)
        } else {
            compiled
                .plan()
                .bind(&selected.captured, &self.config.datetime_formats)?
        };

        let refs: Vec<MiddlewareRef<C, R>> = selected
            .route_middleware
            .iter()
            .chain(&selected.handler.middleware)
            .cloned()
            .collect();
        let layers = middleware::resolve_all(&refs, &self.container)?;

        trace!(
            handler = selected.handler.label(),
            middleware = layers.len(),
            "invoking handler"
        );
        let pipeline = middleware::chain(&layers, |ctx: &mut C| compiled.invoke(ctx, bound));
        pipeline.run(ctx)
    }

    /// Dispatches `path` with a default context and the default method.
    ///
    /// # Errors
    ///
    /// See [`Router::dispatch`].
    pub fn dispatch_path(&self, path: &str) -> Result<R>
    where
        C: Default,
    {
        self.dispatch(path, &mut C::default(), None)
    }

    /// Returns the compiled plan of the handler `path` and `method` select,
    /// if it has been compiled.
    pub fn cached_plan(&self, path: &str, method: Option<&str>) -> Option<Arc<ParameterPlan>> {
        let method = self.requested(method).ok();
        let path = normalize_path(path);
        let segments: Vec<&str> = segments(&path).collect();
        let table = self.read();
        let (id, _) = table.lookup(&segments)?;
        table.route(id).select(method)?.cached_plan()
    }

    fn requested<'m>(&self, method: Option<&'m str>) -> std::result::Result<Method, &'m str> {
        method.map_or(Ok(self.config.default_method), |name| {
            Method::parse(name).ok_or(name)
        })
    }

    /// Matches the path, expanding controllers until a route with handlers
    /// is found, then picks the handler for `method`.
    fn select(
        &self,
        path: &str,
        segments: &[&str],
        method: Option<&str>,
    ) -> Result<Selected<C, R>> {
        let requested = self.requested(method);
        loop {
            let pending = {
                let table = self.read();
                let (id, captured) = table
                    .lookup(segments)
                    .ok_or_else(|| RouterError::not_found(path))?;
                let route = table.route(id);
                trace!(route = %route.pattern(), captured = captured.len(), "matched route");

                if route.needs_expansion() {
                    id
                } else if route.handlers.is_empty() {
                    return Err(RouterError::NotFound {
                        path: path.to_string(),
                        reason: route
                            .controller_name()
                            .map(|name| format!("no matching declared route in class {name}")),
                    });
                } else {
                    let handler = route.select(requested.ok());
                    return match handler {
                        Some(handler) => Ok(Selected {
                            handler: Arc::clone(handler),
                            route_middleware: route.middleware.clone(),
                            raw: route.reflection_disabled,
                            captured,
                        }),
                        None => Err(RouterError::MethodNotAllowed {
                            method: requested
                                .map_or_else(str::to_ascii_uppercase, |m| m.as_str().to_string()),
                            path: path.to_string(),
                            allowed: route.allowed_methods(),
                        }),
                    };
                }
            };
            resolver::expand(&mut self.write(), pending, &self.config)?;
        }
    }
}
