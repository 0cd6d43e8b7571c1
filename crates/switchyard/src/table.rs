//! The route table: routes, their handlers, and pattern lookup.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

use tracing::{debug, warn};

use crate::binder::{Bound, ParameterPlan};
use crate::container::ContainerSlot;
use crate::controller::ControllerInfo;
use crate::error::{ConfigError, Result};
use crate::handler::{BoxedHandler, CallError};
use crate::method::Method;
use crate::middleware::MiddlewareRef;
use crate::path::PathPattern;
use crate::trie::Node;

/// Index of a route in the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RouteId(usize);

/// What a route was registered with.
pub enum RouteSource<C, R> {
    /// A closure; the route has exactly one handler.
    Closure,
    /// A controller expanded on first match.
    Controller {
        /// The controller.
        info: ControllerInfo<C, R>,
        /// Member pinned with `RouteHandle::member`.
        member: Option<String>,
    },
}

impl<C, R> fmt::Debug for RouteSource<C, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closure => f.write_str("Closure"),
            Self::Controller { info, member } => f
                .debug_struct("Controller")
                .field("info", info)
                .field("member", member)
                .finish(),
        }
    }
}

/// A handler with its compiled parameter plan.
pub struct CompiledHandler<C, R> {
    plan: Arc<ParameterPlan>,
    callable: BoxedHandler<C, R>,
    container: ContainerSlot,
}

impl<C, R> CompiledHandler<C, R> {
    /// Returns the parameter plan.
    pub const fn plan(&self) -> &Arc<ParameterPlan> {
        &self.plan
    }

    /// Resolves deferred arguments and calls the handler.
    pub fn invoke(&self, ctx: &C, bound: Vec<Bound>) -> Result<R> {
        let raws: Vec<Option<String>> = bound
            .iter()
            .map(|b| b.raw().map(ToString::to_string))
            .collect();
        let args = self.plan.resolve(bound, ctx, &self.container)?;
        self.callable
            .call(&self.container, args)
            .map_err(|err| match err {
                CallError::Arg(index) => self
                    .plan
                    .extract_error(index, raws.get(index).and_then(Option::as_deref)),
                CallError::Router(err) => err,
            })
    }
}

/// One handler of a route.
pub struct Handler<C, R> {
    pub(crate) label: String,
    pub(crate) param_names: &'static [&'static str],
    pub(crate) methods: Vec<Method>,
    pub(crate) middleware: Vec<MiddlewareRef<C, R>>,
    pub(crate) callable: BoxedHandler<C, R>,
    pub(crate) declared: Option<PathPattern>,
    compiled: OnceLock<Arc<CompiledHandler<C, R>>>,
}

impl<C, R> Handler<C, R> {
    pub(crate) fn new(label: String, callable: BoxedHandler<C, R>) -> Self {
        Self {
            label,
            param_names: &[],
            methods: Vec::new(),
            middleware: Vec::new(),
            callable,
            declared: None,
            compiled: OnceLock::new(),
        }
    }

    /// Returns the handler label.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Returns the compiled handler, compiling its plan on first use.
    ///
    /// A plan that fails to compile is not stored; the next call retries.
    pub fn compile(&self, container: &ContainerSlot) -> Result<&Arc<CompiledHandler<C, R>>> {
        if let Some(compiled) = self.compiled.get() {
            return Ok(compiled);
        }
        let plan = ParameterPlan::compile(
            &self.label,
            self.param_names,
            self.callable.shapes(),
            self.declared.as_ref(),
        )?;
        let compiled = Arc::new(CompiledHandler {
            plan: Arc::new(plan),
            callable: Arc::clone(&self.callable),
            container: container.clone(),
        });
        Ok(self.compiled.get_or_init(|| compiled))
    }

    /// Returns the plan if it has been compiled.
    pub fn cached_plan(&self) -> Option<Arc<ParameterPlan>> {
        self.compiled.get().map(|c| Arc::clone(c.plan()))
    }
}

impl<C, R> fmt::Debug for Handler<C, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handler")
            .field("label", &self.label)
            .field("methods", &self.methods)
            .field("middleware", &self.middleware)
            .field("declared", &self.declared)
            .field("compiled", &self.compiled.get().is_some())
            .finish_non_exhaustive()
    }
}

/// A registered pattern.
#[derive(Debug)]
pub struct Route<C, R> {
    pub(crate) pattern: PathPattern,
    pub(crate) source: RouteSource<C, R>,
    pub(crate) methods: Vec<Method>,
    pub(crate) middleware: Vec<MiddlewareRef<C, R>>,
    pub(crate) handlers: Vec<Arc<Handler<C, R>>>,
    pub(crate) expanded: bool,
    pub(crate) reflection_disabled: bool,
}

impl<C, R> Route<C, R> {
    pub(crate) const fn new(pattern: PathPattern, source: RouteSource<C, R>) -> Self {
        Self {
            pattern,
            source,
            methods: Vec::new(),
            middleware: Vec::new(),
            handlers: Vec::new(),
            expanded: false,
            reflection_disabled: false,
        }
    }

    /// Returns the normalized pattern.
    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    /// Methods accepted by `handler`; empty accepts any.
    pub fn methods_of<'a>(&'a self, handler: &'a Handler<C, R>) -> &'a [Method] {
        if handler.methods.is_empty() {
            &self.methods
        } else {
            &handler.methods
        }
    }

    /// Returns the first handler accepting `method`.
    ///
    /// `None` stands for a verb outside [`Method`], which only handlers
    /// without declared methods accept.
    pub fn select(&self, method: Option<Method>) -> Option<&Arc<Handler<C, R>>> {
        self.handlers.iter().find(|h| {
            let methods = self.methods_of(h);
            methods.is_empty() || method.is_some_and(|m| methods.contains(&m))
        })
    }

    /// Union of the declared methods, in declaration order.
    pub fn allowed_methods(&self) -> Vec<String> {
        let mut allowed: Vec<String> = Vec::new();
        for method in self.handlers.iter().flat_map(|h| self.methods_of(h)) {
            let name = method.as_str();
            if !allowed.iter().any(|m| m == name) {
                allowed.push(name.to_string());
            }
        }
        allowed
    }

    /// Returns `true` for controller routes not yet expanded.
    ///
    /// Handlers pushed here by another controller's expansion do not count.
    pub const fn needs_expansion(&self) -> bool {
        !self.expanded && matches!(self.source, RouteSource::Controller { .. })
    }

    /// Controller name for controller routes.
    pub fn controller_name(&self) -> Option<&'static str> {
        match &self.source {
            RouteSource::Controller { info, .. } => Some(info.name()),
            RouteSource::Closure => None,
        }
    }
}

/// Routes, the pattern maps and the trie.
#[derive(Debug)]
pub struct RouteTable<C, R> {
    routes: Vec<Route<C, R>>,
    static_routes: HashMap<String, RouteId>,
    wildcard_routes: HashMap<String, RouteId>,
    trie: Node<RouteId>,
    groups: Vec<Vec<RouteId>>,
    active_group: Option<usize>,
}

impl<C, R> Default for RouteTable<C, R> {
    fn default() -> Self {
        Self {
            routes: Vec::new(),
            static_routes: HashMap::new(),
            wildcard_routes: HashMap::new(),
            trie: Node::new(),
            groups: Vec::new(),
            active_group: None,
        }
    }
}

impl<C, R> RouteTable<C, R> {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `pattern`.
    ///
    /// A pattern that normalizes to an already registered one is rejected
    /// unless `overwrite` is set, in which case the new route replaces it.
    pub fn register(
        &mut self,
        pattern: &str,
        source: RouteSource<C, R>,
        overwrite: bool,
    ) -> std::result::Result<RouteId, ConfigError> {
        let pattern = PathPattern::new(pattern);
        if self.find_pattern(&pattern).is_some() {
            if !overwrite {
                return Err(ConfigError::DuplicatePattern {
                    pattern: pattern.as_str().to_string(),
                });
            }
            warn!(pattern = %pattern.as_str(), "overwriting registered route");
        }
        let id = self.insert(Route::new(pattern, source));
        if let Some(group) = self.active_group {
            self.groups[group].push(id);
        }
        debug!(pattern = %self.route(id).pattern(), "registered route");
        Ok(id)
    }

    /// Adds a route without duplicate checks.
    pub(crate) fn insert(&mut self, route: Route<C, R>) -> RouteId {
        let id = RouteId(self.routes.len());
        let key = route.pattern.as_str().to_string();
        self.trie.insert(route.pattern.segments(), id);
        if route.pattern.is_static() {
            self.static_routes.insert(key, id);
        } else {
            self.wildcard_routes.insert(key, id);
        }
        self.routes.push(route);
        id
    }

    /// Returns the route registered under the normalized `pattern`.
    pub fn find_pattern(&self, pattern: &PathPattern) -> Option<RouteId> {
        let map = if pattern.is_static() {
            &self.static_routes
        } else {
            &self.wildcard_routes
        };
        map.get(pattern.as_str()).copied()
    }

    /// Matches request segments: exact static routes first, then the trie.
    pub fn lookup(&self, segments: &[&str]) -> Option<(RouteId, Vec<String>)> {
        if let Some(id) = self.static_routes.get(&segments.join("/")) {
            return Some((*id, Vec::new()));
        }
        self.trie.find(segments)
    }

    /// Returns a route.
    pub fn route(&self, id: RouteId) -> &Route<C, R> {
        &self.routes[id.0]
    }

    /// Returns a route mutably.
    pub fn route_mut(&mut self, id: RouteId) -> &mut Route<C, R> {
        &mut self.routes[id.0]
    }

    /// Number of routes, including replaced ones.
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Returns `true` when nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Opens a group; returns its index and the previously active group.
    pub(crate) fn open_group(&mut self) -> (usize, Option<usize>) {
        let group = self.groups.len();
        self.groups.push(Vec::new());
        (group, self.active_group.replace(group))
    }

    /// Restores the group that was active before `open_group`.
    pub(crate) fn close_group(&mut self, previous: Option<usize>) {
        self.active_group = previous;
    }

    /// Appends middleware to every route of `group`.
    pub(crate) fn group_middleware(
        &mut self,
        group: usize,
        middleware: &[MiddlewareRef<C, R>],
    ) -> std::result::Result<(), ConfigError> {
        let members = self.groups.get(group).cloned().unwrap_or_default();
        if let Some(raw) = members
            .iter()
            .map(|id| self.route(*id))
            .find(|route| route.reflection_disabled)
        {
            return Err(ConfigError::MiddlewareOnRawRoute {
                pattern: raw.pattern().to_string(),
            });
        }
        for id in &members {
            self.route_mut(*id)
                .middleware
                .extend(middleware.iter().cloned());
        }
        debug!(
            routes = members.len(),
            middleware = middleware.len(),
            "added group middleware"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::erase_fn;

    fn closure_route(table: &mut RouteTable<(), String>, pattern: &str) -> RouteId {
        let id = table
            .register(pattern, RouteSource::Closure, false)
            .unwrap();
        let route = table.route_mut(id);
        let label = format!("closure@{}", route.pattern());
        route.handlers.push(Arc::new(Handler::new(
            label,
            erase_fn::<(), String, _, _>(|| "ok"),
        )));
        id
    }

    fn lookup(table: &RouteTable<(), String>, path: &str) -> Option<(RouteId, Vec<String>)> {
        let segments: Vec<&str> = crate::path::segments(path).collect();
        table.lookup(&segments)
    }

    #[test]
    fn test_duplicate_detection() {
        let mut table = RouteTable::new();
        closure_route(&mut table, "/user/{id}");
        let err = table
            .register("/user/*", RouteSource::Closure, false)
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "route with pattern 'user/*' is already registered"
        );
        let replaced = table
            .register("/user/*", RouteSource::Closure, true)
            .unwrap();
        assert_eq!(lookup(&table, "user/5").map(|(id, _)| id), Some(replaced));
    }

    #[test]
    fn test_static_and_wildcard_maps_are_separate() {
        let mut table = RouteTable::new();
        let literal = closure_route(&mut table, "/files");
        let wild = closure_route(&mut table, "/files/*");
        assert_eq!(lookup(&table, "/files"), Some((literal, vec![])));
        assert_eq!(
            lookup(&table, "/files/a"),
            Some((wild, vec!["a".to_string()]))
        );
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_groups_collect_innermost_only() {
        let mut table = RouteTable::<(), String>::new();
        let (outer, none) = table.open_group();
        assert_eq!(none, None);
        let a = closure_route(&mut table, "a");
        let (inner, previous) = table.open_group();
        assert_eq!(previous, Some(outer));
        let b = closure_route(&mut table, "b");
        table.close_group(previous);
        let c = closure_route(&mut table, "c");
        table.close_group(none);
        closure_route(&mut table, "d");

        let tag = MiddlewareRef::from_fn(
            |ctx: &mut (), next: crate::middleware::Next<'_, (), String>| next.run(ctx),
        );
        table.group_middleware(outer, &[tag.clone()]).unwrap();
        table.group_middleware(inner, &[tag]).unwrap();
        assert_eq!(table.route(a).middleware.len(), 1);
        assert_eq!(table.route(b).middleware.len(), 1);
        assert_eq!(table.route(c).middleware.len(), 1);
    }

    #[test]
    fn test_method_selection() {
        let mut table = RouteTable::new();
        let id = closure_route(&mut table, "users");
        let route = table.route_mut(id);
        route.methods = vec![Method::Get, Method::Head];
        assert!(route.select(Some(Method::Get)).is_some());
        assert!(route.select(Some(Method::Post)).is_none());
        assert!(route.select(None).is_none());
        assert_eq!(route.allowed_methods(), vec!["GET", "HEAD"]);

        let any = closure_route(&mut table, "any");
        assert!(table.route(any).select(None).is_some());
        assert!(table.route(any).allowed_methods().is_empty());
    }
}
