//! # switchyard
//!
//! Synchronous request routing and dispatch with typed parameter binding.
//!
//! This crate provides:
//! - A segment trie matching literal and wildcard patterns
//! - Closure routes and controller entry points expanded on first match
//! - Declarative controller routes with a shared base path
//! - Typed coercion of path segments into handler arguments
//! - Middleware pipelines on routes, groups and declared members
//! - A swappable dependency container for controllers and injected services
//!
//! ## Quick Start
//!
//! ```rust
//! use switchyard::{Router, RouterError};
//!
//! let mut router: Router = Router::new();
//! router.get("/users/{id}", |id: u64| format!("user {id}")).unwrap();
//! router.add("/wild/*/wild", |segment: String| segment).unwrap();
//!
//! assert_eq!(router.dispatch_path("/users/42").unwrap(), "user 42");
//! assert_eq!(router.dispatch_path("/wild/card/wild").unwrap(), "card");
//! assert!(matches!(
//!     router.dispatch("/users/42", &mut (), Some("DELETE")),
//!     Err(RouterError::MethodNotAllowed { .. })
//! ));
//! ```
//!
//! ## Path Patterns
//!
//! A pattern is a `/`-separated list of segments. `*` and full-segment
//! `{name}` placeholders match exactly one path segment; the matched value is
//! handed to the next path-bound handler parameter. Segments beyond a
//! matched route are appended to the captures, so `/files` also serves
//! `/files/a/b` to a handler taking `Rest<String>`.
//!
//! ## Parameters
//!
//! Handler parameters implement [`Param`]: strings, integers, floats and
//! `bool` are coerced from segments, `chrono` dates from the configured
//! formats, and `#[derive(PathEnum)]` enums by case value or name.
//! `Option<T>` and [`OrDefault<T>`] make a parameter optional, [`Rest<T>`]
//! takes all remaining segments, [`Context<C>`] receives the request context
//! and [`Dep<T>`] is resolved through the container.
//!
//! ## Controllers
//!
//! ```rust
//! use switchyard::{Controller, Member, Router};
//!
//! struct Pages;
//!
//! impl Pages {
//!     fn index(&self) -> String {
//!         "home".to_string()
//!     }
//!
//!     fn about_team(&self) -> String {
//!         "team".to_string()
//!     }
//! }
//!
//! impl Controller<(), String> for Pages {
//!     fn members() -> Vec<Member<(), String>> {
//!         vec![
//!             Member::new("index", Self::index),
//!             Member::new("about_team", Self::about_team),
//!         ]
//!     }
//!
//!     fn construct() -> Option<Self> {
//!         Some(Self)
//!     }
//! }
//!
//! let mut router: Router = Router::new();
//! router.entry_point::<Pages>("/pages").unwrap();
//! assert_eq!(router.dispatch_path("/pages").unwrap(), "home");
//! assert_eq!(router.dispatch_path("/pages/about/team").unwrap(), "team");
//! ```

extern crate self as switchyard;

mod binder;
mod config;
mod container;
mod controller;
mod error;
mod handler;
mod method;
mod middleware;
mod param;
mod path;
mod resolver;
mod router;
mod table;
mod trie;

pub use binder::{Bound, ParameterDescriptor, ParameterPlan};
pub use config::RouterConfig;
pub use container::{Container, ContainerSlot, Resolved, TypeKey};
pub use controller::{Controller, ControllerInfo, Member, RouteDecl};
pub use error::{BindingError, ConfigError, Result, RouterError};
pub use handler::{BoxedHandler, ErasedHandler, HandlerFn, MethodFn};
pub use method::Method;
pub use middleware::{Middleware, MiddlewareRef, Next, SharedMiddleware};
#[doc(hidden)]
pub use param::extract_enum;
pub use param::{
    Arg, CaseValue, Context, Dep, EnumBacking, EnumCase, EnumSpec, OrDefault, Param, ParamKind,
    ParamShape, PathEnum, Rest, ScalarKind, Value,
};
pub use path::PathPattern;
pub use router::{GroupHandle, RouteHandle, Router, Target};
pub use table::RouteId;
