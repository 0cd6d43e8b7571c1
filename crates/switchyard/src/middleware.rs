//! Middleware support for dispatch.
//!
//! Middleware wraps the handler call. Each layer receives the request context
//! and a [`Next`] continuation; it may adjust the context, call `next.run`,
//! inspect or replace the result, or return without calling the handler.
//!
//! # Example
//!
//! ```
//! use switchyard::{Middleware, Next, Result, RouterError};
//!
//! struct RequireUser;
//!
//! impl Middleware<Option<String>, String> for RequireUser {
//!     fn handle(
//!         &self,
//!         user: &mut Option<String>,
//!         next: Next<'_, Option<String>, String>,
//!     ) -> Result<String> {
//!         if user.is_none() {
//!             return Err(RouterError::Rejected("login required".to_string()));
//!         }
//!         next.run(user)
//!     }
//! }
//! ```

use std::any::type_name;
use std::fmt;
use std::sync::Arc;

use crate::container::{ContainerSlot, TypeKey};
use crate::error::{ConfigError, Result};

/// Trait for middleware that wraps handler execution.
pub trait Middleware<C, R>: Send + Sync {
    /// Handles the request, usually by calling `next.run(ctx)`.
    fn handle(&self, ctx: &mut C, next: Next<'_, C, R>) -> Result<R>;
}

/// The rest of the pipeline.
pub struct Next<'a, C, R> {
    inner: Box<dyn FnOnce(&mut C) -> Result<R> + 'a>,
}

impl<'a, C, R> Next<'a, C, R> {
    pub(crate) fn new(f: impl FnOnce(&mut C) -> Result<R> + 'a) -> Self {
        Self { inner: Box::new(f) }
    }

    /// Runs the remaining middleware and the handler.
    pub fn run(self, ctx: &mut C) -> Result<R> {
        (self.inner)(ctx)
    }
}

impl<C, R> fmt::Debug for Next<'_, C, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Next").finish_non_exhaustive()
    }
}

/// Shared middleware instance.
pub type SharedMiddleware<C, R> = Arc<dyn Middleware<C, R>>;

type ResolveFn<C, R> = fn(&ContainerSlot) -> Result<SharedMiddleware<C, R>>;

enum Source<C, R> {
    Instance(SharedMiddleware<C, R>),
    Resolve { key: TypeKey, resolve: ResolveFn<C, R> },
}

/// A middleware attached to a route or handler.
///
/// Either a live instance or a type that is resolved through the router's
/// container each time the pipeline is built.
pub struct MiddlewareRef<C, R> {
    name: &'static str,
    source: Source<C, R>,
}

impl<C: 'static, R: 'static> MiddlewareRef<C, R> {
    /// Wraps a middleware instance.
    pub fn instance<M: Middleware<C, R> + 'static>(middleware: M) -> Self {
        Self {
            name: type_name::<M>(),
            source: Source::Instance(Arc::new(middleware)),
        }
    }

    /// Refers to middleware of type `M`, resolved through the container.
    pub fn of<M: Middleware<C, R> + 'static>() -> Self {
        Self {
            name: type_name::<M>(),
            source: Source::Resolve {
                key: TypeKey::of::<M>(),
                resolve: resolve_typed::<C, R, M>,
            },
        }
    }

    /// Uses a closure as middleware.
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(&mut C, Next<'_, C, R>) -> Result<R> + Send + Sync + 'static,
    {
        Self {
            name: type_name::<F>(),
            source: Source::Instance(Arc::new(FnMiddleware(f))),
        }
    }
}

impl<C, R> MiddlewareRef<C, R> {
    /// Returns the middleware type name.
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Returns the live instance, resolving it through `container` if needed.
    pub fn resolve(&self, container: &ContainerSlot) -> Result<SharedMiddleware<C, R>> {
        match &self.source {
            Source::Instance(middleware) => Ok(Arc::clone(middleware)),
            Source::Resolve { resolve, .. } => resolve(container),
        }
    }

    /// Returns the container key for type references.
    pub const fn key(&self) -> Option<TypeKey> {
        match &self.source {
            Source::Instance(_) => None,
            Source::Resolve { key, .. } => Some(*key),
        }
    }
}

impl<C, R> Clone for MiddlewareRef<C, R> {
    fn clone(&self) -> Self {
        let source = match &self.source {
            Source::Instance(middleware) => Source::Instance(Arc::clone(middleware)),
            Source::Resolve { key, resolve } => Source::Resolve {
                key: *key,
                resolve: *resolve,
            },
        };
        Self {
            name: self.name,
            source,
        }
    }
}

impl<C, R> fmt::Debug for MiddlewareRef<C, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("MiddlewareRef").field(&self.name).finish()
    }
}

fn resolve_typed<C, R, M>(container: &ContainerSlot) -> Result<SharedMiddleware<C, R>>
where
    C: 'static,
    R: 'static,
    M: Middleware<C, R> + 'static,
{
    let key = TypeKey::of::<M>();
    let object = container
        .resolve_key(&key)?
        .ok_or(ConfigError::UnresolvedDependency {
            type_name: key.name(),
        })?;
    let middleware = object
        .downcast::<M>()
        .map_err(|_| ConfigError::NotMiddleware {
            type_name: key.name(),
        })?;
    Ok(middleware)
}

struct FnMiddleware<F>(F);

impl<C, R, F> Middleware<C, R> for FnMiddleware<F>
where
    F: Fn(&mut C, Next<'_, C, R>) -> Result<R> + Send + Sync,
{
    fn handle(&self, ctx: &mut C, next: Next<'_, C, R>) -> Result<R> {
        (self.0)(ctx, next)
    }
}

/// Builds the chain around `core`; the first middleware is the outermost.
pub(crate) fn chain<'a, C, R>(
    middleware: &'a [SharedMiddleware<C, R>],
    core: impl FnOnce(&mut C) -> Result<R> + 'a,
) -> Next<'a, C, R> {
    middleware
        .iter()
        .rev()
        .fold(Next::new(core), |next, layer| {
            Next::new(move |ctx: &mut C| layer.handle(ctx, next))
        })
}

/// Resolves every reference, in order.
pub(crate) fn resolve_all<C, R>(
    refs: &[MiddlewareRef<C, R>],
    container: &ContainerSlot,
) -> Result<Vec<SharedMiddleware<C, R>>> {
    refs.iter().map(|r| r.resolve(container)).collect()
}
