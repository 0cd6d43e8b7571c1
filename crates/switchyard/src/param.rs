//! Handler parameter types.
//!
//! Every type a handler can take implements [`Param`]. The impl reports a
//! static [`ParamShape`] (read once when the handler's plan is compiled) and
//! converts a bound [`Value`] into the concrete argument at call time.

use std::any::type_name;
use std::ops::Deref;
use std::sync::Arc;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, Utc};

use crate::container::{Resolved, TypeKey};

/// Scalar kinds coerced from a single path segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarKind {
    /// Taken verbatim.
    Str,
    /// Parsed as an integer within `min..=max`.
    Int { min: i128, max: i128 },
    /// Parsed as a finite 64-bit float.
    Float,
    /// Parsed as a finite 32-bit float.
    Float32,
    /// `true/false/1/0/on/off/yes/no`, ignoring case.
    Bool,
}

impl ScalarKind {
    /// Name used in binding error messages.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Str => "string",
            Self::Int { .. } => "int",
            Self::Float => "float",
            Self::Float32 => "32-bit float",
            Self::Bool => "bool",
        }
    }
}

/// How an enum's cases are matched against a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumBacking {
    /// The segment is parsed as an integer and compared with case values.
    Int,
    /// The segment must equal a case value exactly.
    String,
    /// The segment is compared with case names, ignoring ASCII case.
    Unit,
}

/// The value a case is matched by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaseValue {
    /// Integer-backed case.
    Int(i64),
    /// String-backed case.
    Str(&'static str),
    /// Case without a backing value.
    Unit,
}

/// A single enum case.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnumCase {
    /// Variant name.
    pub name: &'static str,
    /// Backing value.
    pub value: CaseValue,
}

/// Static description of an enum usable as a path parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnumSpec {
    /// Enum type name.
    pub name: &'static str,
    /// How cases are matched.
    pub backing: EnumBacking,
    /// Cases in declaration order.
    pub cases: &'static [EnumCase],
}

impl EnumSpec {
    /// Returns the index of the case matching `raw`.
    pub fn find(&self, raw: &str) -> Option<usize> {
        match self.backing {
            EnumBacking::Int => {
                let n: i64 = raw.parse().ok()?;
                self.cases
                    .iter()
                    .position(|c| c.value == CaseValue::Int(n))
            }
            EnumBacking::String => self
                .cases
                .iter()
                .position(|c| matches!(c.value, CaseValue::Str(v) if v == raw)),
            EnumBacking::Unit => self
                .cases
                .iter()
                .position(|c| c.name.eq_ignore_ascii_case(raw)),
        }
    }
}

/// An enum that can be bound from a path segment.
///
/// Usually derived with `#[derive(PathEnum)]`.
pub trait PathEnum: Sized + 'static {
    /// Case table.
    const SPEC: EnumSpec;

    /// Returns the variant at `index` in [`EnumSpec::cases`].
    fn from_case(index: usize) -> Option<Self>;
}

/// The closed set of parameter kinds the binder dispatches on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamKind {
    /// Coerced from one segment.
    Scalar(ScalarKind),
    /// Matched against an enum's cases.
    Enum(EnumSpec),
    /// Parsed with the configured date/time formats.
    DateTime,
    /// Receives the in-flight request context.
    Context,
    /// Resolved through the container at call time.
    Object(TypeKey),
    /// Consumes every remaining segment.
    Variadic(Box<ParamKind>),
}

impl ParamKind {
    /// Returns `true` when the parameter is filled from path segments.
    pub const fn is_path_bound(&self) -> bool {
        !matches!(self, Self::Context | Self::Object(_))
    }

    /// Returns `true` for [`ParamKind::Variadic`].
    pub const fn is_variadic(&self) -> bool {
        matches!(self, Self::Variadic(_))
    }
}

/// Static shape of a parameter type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamShape {
    /// Parameter kind.
    pub kind: ParamKind,
    /// Rust type name.
    pub type_name: &'static str,
    /// Receives `None` when no value can be bound.
    pub nullable: bool,
    /// Receives a default when no value can be bound.
    pub has_default: bool,
}

impl ParamShape {
    /// Creates a required shape.
    pub const fn new(kind: ParamKind, type_name: &'static str) -> Self {
        Self {
            kind,
            type_name,
            nullable: false,
            has_default: false,
        }
    }

    /// Shape of a scalar type `T`.
    pub fn scalar<T>(kind: ScalarKind) -> Self {
        Self::new(ParamKind::Scalar(kind), type_name::<T>())
    }

    /// Shape of a [`PathEnum`] type.
    pub fn of_enum<T: PathEnum>() -> Self {
        Self::new(ParamKind::Enum(T::SPEC), type_name::<T>())
    }

    /// Returns `true` when a missing value is not an error.
    pub const fn is_optional(&self) -> bool {
        self.nullable || self.has_default
    }
}

/// A bound argument value.
#[derive(Debug, Clone)]
pub enum Value {
    /// No value: the parameter falls back to `None` or its default.
    Null,
    /// String segment.
    Str(String),
    /// Integer.
    Int(i128),
    /// Float.
    Float(f64),
    /// Boolean.
    Bool(bool),
    /// Index into an [`EnumSpec`]'s cases.
    Enum(usize),
    /// Date and time.
    DateTime(DateTime<FixedOffset>),
    /// Object from the container.
    Object(Resolved),
    /// Variadic values.
    List(Vec<Value>),
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a.to_bits() == b.to_bits(),
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Enum(a), Self::Enum(b)) => a == b,
            (Self::DateTime(a), Self::DateTime(b)) => a == b,
            (Self::Object(a), Self::Object(b)) => Arc::ptr_eq(a, b),
            (Self::List(a), Self::List(b)) => a == b,
            _ => false,
        }
    }
}

/// Input handed to [`Param::extract`].
#[derive(Debug)]
pub enum Arg<'a, C> {
    /// A bound value.
    Value(Value),
    /// The request context.
    Context(&'a C),
}

/// A type a handler can take as a parameter.
///
/// `extract` returns `None` when the argument does not fit the type; the
/// binder turns that into the matching error for the parameter's kind.
pub trait Param<C>: Sized {
    /// Static shape of the parameter.
    fn shape() -> ParamShape;

    /// Converts the bound argument.
    fn extract(arg: Arg<'_, C>) -> Option<Self>;
}

impl<C> Param<C> for String {
    fn shape() -> ParamShape {
        ParamShape::scalar::<Self>(ScalarKind::Str)
    }

    fn extract(arg: Arg<'_, C>) -> Option<Self> {
        match arg {
            Arg::Value(Value::Str(s)) => Some(s),
            _ => None,
        }
    }
}

macro_rules! impl_int_param {
    ($($ty:ty),*) => {
        $(
            impl<C> Param<C> for $ty {
                #[allow(clippy::cast_lossless, clippy::cast_possible_wrap)]
                fn shape() -> ParamShape {
                    ParamShape::scalar::<Self>(ScalarKind::Int {
                        min: Self::MIN as i128,
                        max: Self::MAX as i128,
                    })
                }

                fn extract(arg: Arg<'_, C>) -> Option<Self> {
                    match arg {
                        Arg::Value(Value::Int(n)) => Self::try_from(n).ok(),
                        _ => None,
                    }
                }
            }
        )*
    };
}

impl_int_param!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

impl<C> Param<C> for f64 {
    fn shape() -> ParamShape {
        ParamShape::scalar::<Self>(ScalarKind::Float)
    }

    fn extract(arg: Arg<'_, C>) -> Option<Self> {
        match arg {
            Arg::Value(Value::Float(f)) => Some(f),
            _ => None,
        }
    }
}

impl<C> Param<C> for f32 {
    fn shape() -> ParamShape {
        ParamShape::scalar::<Self>(ScalarKind::Float32)
    }

    #[allow(clippy::cast_possible_truncation)]
    fn extract(arg: Arg<'_, C>) -> Option<Self> {
        match arg {
            Arg::Value(Value::Float(f)) => Some(f as Self).filter(|f| f.is_finite()),
            _ => None,
        }
    }
}

impl<C> Param<C> for bool {
    fn shape() -> ParamShape {
        ParamShape::scalar::<Self>(ScalarKind::Bool)
    }

    fn extract(arg: Arg<'_, C>) -> Option<Self> {
        match arg {
            Arg::Value(Value::Bool(b)) => Some(b),
            _ => None,
        }
    }
}

impl<C, T: Param<C>> Param<C> for Option<T> {
    fn shape() -> ParamShape {
        ParamShape {
            nullable: true,
            type_name: type_name::<Self>(),
            ..T::shape()
        }
    }

    fn extract(arg: Arg<'_, C>) -> Option<Self> {
        match arg {
            Arg::Value(Value::Null) => Some(None),
            arg => T::extract(arg).map(Some),
        }
    }
}

/// A parameter that falls back to `T::default()` when its segment is
/// missing or does not convert.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OrDefault<T>(pub T);

impl<T> OrDefault<T> {
    /// Returns the inner value.
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> Deref for OrDefault<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

impl<C, T: Param<C> + Default> Param<C> for OrDefault<T> {
    fn shape() -> ParamShape {
        ParamShape {
            has_default: true,
            type_name: type_name::<T>(),
            ..T::shape()
        }
    }

    fn extract(arg: Arg<'_, C>) -> Option<Self> {
        match arg {
            Arg::Value(Value::Null) => Some(Self(T::default())),
            arg => T::extract(arg).map(Self),
        }
    }
}

/// A variadic parameter: every remaining segment, each coerced as `T`.
///
/// Must be the last parameter of its handler.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Rest<T>(pub Vec<T>);

impl<T> Rest<T> {
    /// Returns the collected values.
    pub fn into_inner(self) -> Vec<T> {
        self.0
    }
}

impl<T> Deref for Rest<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        &self.0
    }
}

impl<C, T: Param<C>> Param<C> for Rest<T> {
    fn shape() -> ParamShape {
        ParamShape::new(
            ParamKind::Variadic(Box::new(T::shape().kind)),
            type_name::<Self>(),
        )
    }

    fn extract(arg: Arg<'_, C>) -> Option<Self> {
        match arg {
            Arg::Value(Value::List(values)) => values
                .into_iter()
                .map(|v| T::extract(Arg::Value(v)))
                .collect::<Option<Vec<_>>>()
                .map(Self),
            _ => None,
        }
    }
}

/// A clone of the request context.
#[derive(Debug, Clone, Default)]
pub struct Context<C>(pub C);

impl<C> Deref for Context<C> {
    type Target = C;

    fn deref(&self) -> &C {
        &self.0
    }
}

impl<C: Clone> Param<C> for Context<C> {
    fn shape() -> ParamShape {
        ParamShape::new(ParamKind::Context, type_name::<C>())
    }

    fn extract(arg: Arg<'_, C>) -> Option<Self> {
        match arg {
            Arg::Context(ctx) => Some(Self(ctx.clone())),
            Arg::Value(_) => None,
        }
    }
}

/// A dependency resolved through the router's container.
#[derive(Debug)]
pub struct Dep<T>(pub Arc<T>);

impl<T> Clone for Dep<T> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<T> Deref for Dep<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

impl<C, T: Send + Sync + 'static> Param<C> for Dep<T> {
    fn shape() -> ParamShape {
        ParamShape::new(ParamKind::Object(TypeKey::of::<T>()), type_name::<T>())
    }

    fn extract(arg: Arg<'_, C>) -> Option<Self> {
        match arg {
            Arg::Value(Value::Object(object)) => object.downcast::<T>().ok().map(Self),
            _ => None,
        }
    }
}

fn date_time<C>(arg: Arg<'_, C>) -> Option<DateTime<FixedOffset>> {
    match arg {
        Arg::Value(Value::DateTime(dt)) => Some(dt),
        _ => None,
    }
}

impl<C> Param<C> for DateTime<FixedOffset> {
    fn shape() -> ParamShape {
        ParamShape::new(ParamKind::DateTime, type_name::<Self>())
    }

    fn extract(arg: Arg<'_, C>) -> Option<Self> {
        date_time(arg)
    }
}

impl<C> Param<C> for DateTime<Utc> {
    fn shape() -> ParamShape {
        ParamShape::new(ParamKind::DateTime, type_name::<Self>())
    }

    fn extract(arg: Arg<'_, C>) -> Option<Self> {
        date_time(arg).map(|dt| dt.with_timezone(&Utc))
    }
}

impl<C> Param<C> for NaiveDateTime {
    fn shape() -> ParamShape {
        ParamShape::new(ParamKind::DateTime, type_name::<Self>())
    }

    fn extract(arg: Arg<'_, C>) -> Option<Self> {
        date_time(arg).map(|dt| dt.naive_local())
    }
}

impl<C> Param<C> for NaiveDate {
    fn shape() -> ParamShape {
        ParamShape::new(ParamKind::DateTime, type_name::<Self>())
    }

    fn extract(arg: Arg<'_, C>) -> Option<Self> {
        date_time(arg).map(|dt| dt.date_naive())
    }
}

/// Extracts a [`PathEnum`] case; used by the derived `Param` impls.
#[doc(hidden)]
pub fn extract_enum<C, T: PathEnum>(arg: Arg<'_, C>) -> Option<T> {
    match arg {
        Arg::Value(Value::Enum(index)) => T::from_case(index),
        _ => None,
    }
}
