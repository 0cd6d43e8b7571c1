//! Typed handler signatures and their type-erased form.
//!
//! Closures implement [`HandlerFn`] and controller methods implement
//! [`MethodFn`], for up to eight parameters. Both report the static shapes of
//! their parameters and convert bound arguments back into typed values when
//! called. The router stores them behind [`ErasedHandler`].

use std::marker::PhantomData;
use std::sync::Arc;

use crate::container::ContainerSlot;
use crate::controller::{self, Controller};
use crate::error::RouterError;
use crate::param::{Arg, Param, ParamShape};

/// Failure of a type-erased call.
#[derive(Debug)]
pub enum CallError {
    /// The argument at this index did not convert to the parameter type.
    Arg(usize),
    /// The call could not be prepared or the handler failed.
    Router(RouterError),
}

impl From<RouterError> for CallError {
    fn from(err: RouterError) -> Self {
        Self::Router(err)
    }
}

/// A closure usable as a route handler.
///
/// `Args` is the tuple of parameter types; it only exists to keep the
/// per-arity impls apart and is inferred at registration.
pub trait HandlerFn<C, R, Args>: Send + Sync + 'static {
    /// Shapes of the parameters, in order.
    fn shapes() -> Vec<ParamShape>;

    /// Calls the closure; `Err(i)` means argument `i` did not convert.
    fn invoke(&self, args: Vec<Arg<'_, C>>) -> Result<R, usize>;
}

/// A controller method usable as a route handler.
pub trait MethodFn<T, C, R, Args>: Send + Sync + 'static {
    /// Shapes of the parameters after the receiver, in order.
    fn shapes() -> Vec<ParamShape>;

    /// Calls the method on `target`; `Err(i)` means argument `i` did not convert.
    fn invoke(&self, target: &T, args: Vec<Arg<'_, C>>) -> Result<R, usize>;
}

macro_rules! impl_handler_fn {
    ($($ty:ident),*) => {
        impl<C, R, F, O, $($ty,)*> HandlerFn<C, R, ($($ty,)*)> for F
        where
            F: Fn($($ty),*) -> O + Send + Sync + 'static,
            O: Into<R>,
            $($ty: Param<C>,)*
        {
            fn shapes() -> Vec<ParamShape> {
                vec![$(<$ty as Param<C>>::shape()),*]
            }

            #[allow(non_snake_case, unused_mut, unused_variables, unused_assignments)]
            fn invoke(&self, args: Vec<Arg<'_, C>>) -> Result<R, usize> {
                let mut args = args.into_iter();
                let mut index: usize = 0;
                $(
                    let $ty = args.next().and_then(<$ty as Param<C>>::extract).ok_or(index)?;
                    index += 1;
                )*
                Ok(self($($ty),*).into())
            }
        }

        impl<T, C, R, F, O, $($ty,)*> MethodFn<T, C, R, ($($ty,)*)> for F
        where
            F: Fn(&T, $($ty),*) -> O + Send + Sync + 'static,
            O: Into<R>,
            $($ty: Param<C>,)*
        {
            fn shapes() -> Vec<ParamShape> {
                vec![$(<$ty as Param<C>>::shape()),*]
            }

            #[allow(non_snake_case, unused_mut, unused_variables, unused_assignments)]
            fn invoke(&self, target: &T, args: Vec<Arg<'_, C>>) -> Result<R, usize> {
                let mut args = args.into_iter();
                let mut index: usize = 0;
                $(
                    let $ty = args.next().and_then(<$ty as Param<C>>::extract).ok_or(index)?;
                    index += 1;
                )*
                Ok(self(target, $($ty),*).into())
            }
        }
    };
}

impl_handler_fn!();
impl_handler_fn!(P1);
impl_handler_fn!(P1, P2);
impl_handler_fn!(P1, P2, P3);
impl_handler_fn!(P1, P2, P3, P4);
impl_handler_fn!(P1, P2, P3, P4, P5);
impl_handler_fn!(P1, P2, P3, P4, P5, P6);
impl_handler_fn!(P1, P2, P3, P4, P5, P6, P7);
impl_handler_fn!(P1, P2, P3, P4, P5, P6, P7, P8);

/// Type-erased handler stored in the route table.
pub trait ErasedHandler<C, R>: Send + Sync {
    /// Parameter shapes, read once when the plan is compiled.
    fn shapes(&self) -> Vec<ParamShape>;

    /// Calls the handler with bound arguments.
    fn call(&self, container: &ContainerSlot, args: Vec<Arg<'_, C>>) -> Result<R, CallError>;
}

/// Shared erased handler.
pub type BoxedHandler<C, R> = Arc<dyn ErasedHandler<C, R>>;

struct FnHandler<F, Args> {
    f: F,
    _args: PhantomData<fn() -> Args>,
}

impl<C, R, F, Args> ErasedHandler<C, R> for FnHandler<F, Args>
where
    F: HandlerFn<C, R, Args>,
{
    fn shapes(&self) -> Vec<ParamShape> {
        F::shapes()
    }

    fn call(&self, _container: &ContainerSlot, args: Vec<Arg<'_, C>>) -> Result<R, CallError> {
        self.f.invoke(args).map_err(CallError::Arg)
    }
}

struct MethodHandler<T, F, Args> {
    f: F,
    _marker: PhantomData<fn() -> (T, Args)>,
}

impl<T, C, R, F, Args> ErasedHandler<C, R> for MethodHandler<T, F, Args>
where
    T: Controller<C, R>,
    F: MethodFn<T, C, R, Args>,
    C: 'static,
    R: 'static,
{
    fn shapes(&self) -> Vec<ParamShape> {
        F::shapes()
    }

    fn call(&self, container: &ContainerSlot, args: Vec<Arg<'_, C>>) -> Result<R, CallError> {
        let target = controller::instance::<C, R, T>(container)?;
        self.f.invoke(&target, args).map_err(CallError::Arg)
    }
}

/// Erases a closure handler.
pub fn erase_fn<C, R, Args, F>(f: F) -> BoxedHandler<C, R>
where
    F: HandlerFn<C, R, Args>,
    C: 'static,
    R: 'static,
    Args: 'static,
{
    Arc::new(FnHandler {
        f,
        _args: PhantomData,
    })
}

/// Erases a controller method.
pub fn erase_method<T, C, R, Args, F>(f: F) -> BoxedHandler<C, R>
where
    T: Controller<C, R>,
    F: MethodFn<T, C, R, Args>,
    C: 'static,
    R: 'static,
    Args: 'static,
{
    Arc::new(MethodHandler {
        f,
        _marker: PhantomData,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::param::{OrDefault, ParamKind, ScalarKind, Value};

    fn shapes_of<Args, F: HandlerFn<(), String, Args>>(_: &F) -> Vec<ParamShape> {
        F::shapes()
    }

    #[test]
    fn test_closure_shapes() {
        let f = |id: i64, name: String, page: OrDefault<u32>| format!("{id}{name}{}", page.0);
        let shapes = shapes_of(&f);
        assert_eq!(shapes.len(), 3);
        assert!(matches!(shapes[0].kind, ParamKind::Scalar(ScalarKind::Int { .. })));
        assert!(shapes[2].has_default);
        assert!(shapes_of(&|| "x").is_empty());
    }

    #[test]
    fn test_erased_call() {
        let handler = erase_fn::<(), String, _, _>(|id: i64, name: String| format!("{name}#{id}"));
        let out = handler
            .call(
                &ContainerSlot::new(),
                vec![Arg::Value(Value::Int(7)), Arg::Value(Value::Str("ada".into()))],
            )
            .unwrap();
        assert_eq!(out, "ada#7");
    }

    #[test]
    fn test_conversion_failure_reports_index() {
        let handler = erase_fn::<(), String, _, _>(|a: u8, b: u8| (a + b).to_string());
        let err = handler
            .call(
                &ContainerSlot::new(),
                vec![Arg::Value(Value::Int(1)), Arg::Value(Value::Int(999))],
            )
            .unwrap_err();
        assert!(matches!(err, CallError::Arg(1)));
    }
}
