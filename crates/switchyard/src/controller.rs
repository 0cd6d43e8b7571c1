//! Controllers: types whose public methods are expanded into routes.
//!
//! A controller lists its members once, as a static declaration table. Most
//! controllers get it from the `#[routes]` attribute; it can also be written
//! by hand:
//!
//! ```
//! use switchyard::{Controller, Member, Method, RouteDecl, Router};
//!
//! struct Users;
//!
//! impl Users {
//!     fn index(&self) -> String {
//!         "all users".to_string()
//!     }
//!
//!     fn show(&self, id: i64) -> String {
//!         format!("user {id}")
//!     }
//! }
//!
//! impl Controller<(), String> for Users {
//!     fn members() -> Vec<Member<(), String>> {
//!         vec![
//!             Member::new("index", Self::index),
//!             Member::new("show", Self::show)
//!                 .params(&["id"])
//!                 .route(RouteDecl::new("/users/*").methods([Method::Get])),
//!         ]
//!     }
//!
//!     fn construct() -> Option<Self> {
//!         Some(Self)
//!     }
//! }
//!
//! let mut router: Router = Router::new();
//! router.entry_point::<Users>("/users").unwrap();
//! assert_eq!(router.dispatch_path("/users/7").unwrap(), "user 7");
//! ```

use std::any::type_name;
use std::fmt;
use std::sync::Arc;

use crate::container::ContainerSlot;
use crate::error::{ConfigError, Result};
use crate::handler::{self, BoxedHandler, MethodFn};
use crate::method::Method;
use crate::middleware::MiddlewareRef;

/// A type whose methods are route handlers.
pub trait Controller<C, R>: Send + Sync + Sized + 'static {
    /// Path prefix shared by the declared routes.
    const BASE_PATH: Option<&'static str> = None;

    /// The member table.
    fn members() -> Vec<Member<C, R>>;

    /// Builds an instance when the container has none.
    fn construct() -> Option<Self> {
        None
    }

    /// Name used in error messages.
    fn name() -> &'static str {
        short_type_name::<Self>()
    }
}

fn short_type_name<T>() -> &'static str {
    let full = type_name::<T>();
    let head = full.split('<').next().unwrap_or(full);
    head.rsplit("::").next().unwrap_or(head)
}

/// Returns the instance a controller method is called on.
///
/// The container is asked first; otherwise [`Controller::construct`] is used.
pub fn instance<C, R, T: Controller<C, R>>(container: &ContainerSlot) -> Result<Arc<T>> {
    match container.try_resolve::<T>() {
        Ok(Some(found)) => return Ok(found),
        Ok(None) | Err(ConfigError::MissingContainer { .. }) => {}
        Err(err) => return Err(err.into()),
    }
    if let Some(built) = T::construct() {
        return Ok(Arc::new(built));
    }
    let type_name = type_name::<T>();
    let err = if container.is_set() {
        ConfigError::UnresolvedDependency { type_name }
    } else {
        ConfigError::MissingContainer { type_name }
    };
    Err(err.into())
}

/// A route declared on a controller member.
pub struct RouteDecl<C, R> {
    /// Declared path, relative to the base path unless it already starts with it.
    pub path: String,
    /// Accepted methods; empty accepts any.
    pub methods: Vec<Method>,
    /// Member-level middleware.
    pub middleware: Vec<MiddlewareRef<C, R>>,
}

impl<C, R> RouteDecl<C, R> {
    /// Declares a route at `path`.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            methods: Vec::new(),
            middleware: Vec::new(),
        }
    }

    /// Restricts the route to `methods`.
    #[must_use]
    pub fn methods(mut self, methods: impl IntoIterator<Item = Method>) -> Self {
        self.methods.extend(methods);
        self
    }

    /// Adds member-level middleware.
    #[must_use]
    pub fn middleware(mut self, middleware: MiddlewareRef<C, R>) -> Self {
        self.middleware.push(middleware);
        self
    }
}

impl<C, R> Clone for RouteDecl<C, R> {
    fn clone(&self) -> Self {
        Self {
            path: self.path.clone(),
            methods: self.methods.clone(),
            middleware: self.middleware.clone(),
        }
    }
}

impl<C, R> fmt::Debug for RouteDecl<C, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteDecl")
            .field("path", &self.path)
            .field("methods", &self.methods)
            .field("middleware", &self.middleware)
            .finish()
    }
}

/// One controller method.
pub struct Member<C, R> {
    pub(crate) name: &'static str,
    pub(crate) params: &'static [&'static str],
    pub(crate) public: bool,
    pub(crate) routes: Vec<RouteDecl<C, R>>,
    pub(crate) callable: BoxedHandler<C, R>,
}

impl<C: 'static, R: 'static> Member<C, R> {
    /// Creates a public member calling `f`.
    pub fn new<T, Args, F>(name: &'static str, f: F) -> Self
    where
        T: Controller<C, R>,
        F: MethodFn<T, C, R, Args>,
        Args: 'static,
    {
        Self {
            name,
            params: &[],
            public: true,
            routes: Vec::new(),
            callable: handler::erase_method::<T, C, R, Args, F>(f),
        }
    }
}

impl<C, R> Member<C, R> {
    /// Names the parameters, for error messages.
    #[must_use]
    pub const fn params(mut self, names: &'static [&'static str]) -> Self {
        self.params = names;
        self
    }

    /// Sets visibility. Non-public members are never routed.
    #[must_use]
    pub const fn public(mut self, public: bool) -> Self {
        self.public = public;
        self
    }

    /// Adds a route declaration.
    #[must_use]
    pub fn route(mut self, decl: RouteDecl<C, R>) -> Self {
        self.routes.push(decl);
        self
    }

    /// Returns the member name.
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Returns `true` if the member can be routed.
    pub const fn is_public(&self) -> bool {
        self.public
    }

    /// Returns the route declarations.
    pub fn routes(&self) -> &[RouteDecl<C, R>] {
        &self.routes
    }
}

impl<C, R> fmt::Debug for Member<C, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Member")
            .field("name", &self.name)
            .field("params", &self.params)
            .field("public", &self.public)
            .field("routes", &self.routes)
            .finish_non_exhaustive()
    }
}

/// Type-erased controller description stored on a route.
pub struct ControllerInfo<C, R> {
    pub(crate) name: &'static str,
    pub(crate) base_path: Option<&'static str>,
    pub(crate) members: fn() -> Vec<Member<C, R>>,
}

impl<C, R> ControllerInfo<C, R> {
    /// Describes `T`.
    pub fn of<T: Controller<C, R>>() -> Self {
        Self {
            name: T::name(),
            base_path: T::BASE_PATH,
            members: T::members,
        }
    }

    /// Returns the controller name.
    pub const fn name(&self) -> &'static str {
        self.name
    }
}

impl<C, R> Clone for ControllerInfo<C, R> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            base_path: self.base_path,
            members: self.members,
        }
    }
}

impl<C, R> fmt::Debug for ControllerInfo<C, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControllerInfo")
            .field("name", &self.name)
            .field("base_path", &self.base_path)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::{Resolved, TypeKey};
    use crate::error::RouterError;

    struct Greeter {
        greeting: &'static str,
    }

    impl Greeter {
        fn hello(&self, name: String) -> String {
            format!("{} {name}", self.greeting)
        }
    }

    impl Controller<(), String> for Greeter {
        fn members() -> Vec<Member<(), String>> {
            vec![Member::new("hello", Self::hello).params(&["name"])]
        }
    }

    struct Counter;

    impl Controller<(), String> for Counter {
        fn members() -> Vec<Member<(), String>> {
            Vec::new()
        }

        fn construct() -> Option<Self> {
            Some(Self)
        }
    }

    #[test]
    fn test_short_name() {
        assert_eq!(<Greeter as Controller<(), String>>::name(), "Greeter");
        assert_eq!(short_type_name::<Vec<String>>(), "Vec");
    }

    #[test]
    fn test_instance_prefers_container() {
        let slot = ContainerSlot::new();
        assert!(instance::<(), String, Counter>(&slot).is_ok());
        assert!(matches!(
            instance::<(), String, Greeter>(&slot),
            Err(RouterError::Configuration(ConfigError::MissingContainer { .. }))
        ));

        slot.set(|key: &TypeKey| -> Option<Resolved> {
            key.is::<Greeter>()
                .then(|| Arc::new(Greeter { greeting: "hi" }) as Resolved)
        });
        let greeter = instance::<(), String, Greeter>(&slot).unwrap();
        assert_eq!(greeter.hello("bob".to_string()), "hi bob");

        slot.set(|_: &TypeKey| -> Option<Resolved> { None });
        assert!(matches!(
            instance::<(), String, Greeter>(&slot),
            Err(RouterError::Configuration(ConfigError::UnresolvedDependency { .. }))
        ));
    }

    #[test]
    fn test_member_builder() {
        let members = Greeter::members();
        let member = &members[0];
        assert_eq!(member.name(), "hello");
        assert!(member.is_public());
        assert_eq!(member.params, &["name"]);
        assert_eq!(member.callable.shapes().len(), 1);

        let hidden: Member<(), String> = Member::new("hello", Greeter::hello)
            .public(false)
            .route(RouteDecl::new("/hello/*").methods([Method::Get, Method::Post]));
        assert!(!hidden.is_public());
        assert_eq!(hidden.routes()[0].methods, vec![Method::Get, Method::Post]);
    }
}
