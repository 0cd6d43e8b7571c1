//! Parameter plans: compiled once per handler, applied on every dispatch.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime};
use tracing::debug;

use crate::container::{ContainerSlot, TypeKey};
use crate::error::{BindingError, ConfigError, Result, RouterError};
use crate::param::{Arg, ParamKind, ParamShape, ScalarKind, Value};
use crate::path::PathPattern;

/// A named handler parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterDescriptor {
    /// Parameter name, or `argN` when unknown.
    pub name: String,
    /// Static shape reported by the parameter type.
    pub shape: ParamShape,
}

/// Value bound for one parameter before the handler runs.
///
/// Context and container objects are deferred until call time, after the
/// middleware pipeline has run.
#[derive(Debug, Clone, PartialEq)]
pub enum Bound {
    /// A value coerced from the path.
    Ready {
        /// Coerced value.
        value: Value,
        /// Source segment, kept for error messages.
        raw: Option<String>,
    },
    /// The request context.
    Context,
    /// A container object.
    Object {
        /// Requested type.
        key: TypeKey,
        /// Receives `None` when the object cannot be resolved.
        nullable: bool,
    },
}

impl Bound {
    /// Returns the segment the value was coerced from.
    pub fn raw(&self) -> Option<&str> {
        match self {
            Self::Ready { raw, .. } => raw.as_deref(),
            Self::Context | Self::Object { .. } => None,
        }
    }
}

/// The compiled argument recipe of one handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterPlan {
    handler: String,
    params: Vec<ParameterDescriptor>,
}

impl ParameterPlan {
    /// Compiles a plan from the handler's parameter shapes.
    ///
    /// `declared` is the pattern a declarative route was registered under;
    /// when given, it must carry at least one wildcard per required
    /// path-bound parameter.
    pub fn compile(
        handler: &str,
        names: &[&str],
        shapes: Vec<ParamShape>,
        declared: Option<&PathPattern>,
    ) -> std::result::Result<Self, ConfigError> {
        let params: Vec<ParameterDescriptor> = shapes
            .into_iter()
            .enumerate()
            .map(|(i, shape)| ParameterDescriptor {
                name: names
                    .get(i)
                    .map_or_else(|| format!("arg{i}"), ToString::to_string),
                shape,
            })
            .collect();

        let last = params.len().saturating_sub(1);
        if let Some((_, p)) = params
            .iter()
            .enumerate()
            .find(|(i, p)| p.shape.kind.is_variadic() && *i != last)
        {
            return Err(ConfigError::VariadicNotLast {
                handler: handler.to_string(),
                param: p.name.clone(),
            });
        }

        let plan = Self {
            handler: handler.to_string(),
            params,
        };

        if let Some(pattern) = declared {
            let expected = plan.required_path_params();
            if pattern.wildcards() < expected {
                return Err(ConfigError::WildcardMismatch {
                    pattern: pattern.as_str().to_string(),
                    wildcards: pattern.wildcards(),
                    handler: plan.handler.clone(),
                    expected,
                });
            }
        }

        debug!(handler = %plan.handler, params = plan.params.len(), "compiled parameter plan");
        Ok(plan)
    }

    /// Returns the handler label.
    pub fn handler(&self) -> &str {
        &self.handler
    }

    /// Returns the parameter descriptors in declaration order.
    pub fn params(&self) -> &[ParameterDescriptor] {
        &self.params
    }

    /// Number of parameters that must be filled from a path segment.
    pub fn required_path_params(&self) -> usize {
        self.params
            .iter()
            .filter(|p| {
                p.shape.kind.is_path_bound()
                    && !p.shape.kind.is_variadic()
                    && !p.shape.is_optional()
            })
            .count()
    }

    /// Binds captured segments to the parameters.
    pub fn bind(
        &self,
        segments: &[String],
        formats: &[String],
    ) -> std::result::Result<Vec<Bound>, BindingError> {
        let mut rest = segments.iter();
        let mut bound = Vec::with_capacity(self.params.len());

        for param in &self.params {
            let shape = &param.shape;
            let slot = match &shape.kind {
                ParamKind::Context => Bound::Context,
                ParamKind::Object(key) => Bound::Object {
                    key: *key,
                    nullable: shape.nullable,
                },
                ParamKind::Variadic(inner) => {
                    let values = rest
                        .by_ref()
                        .map(|raw| {
                            coerce(inner, raw, formats)
                                .ok_or_else(|| self.invalid(param, inner, raw))
                        })
                        .collect::<std::result::Result<Vec<_>, _>>()?;
                    Bound::Ready {
                        value: Value::List(values),
                        raw: None,
                    }
                }
                kind => match rest.next() {
                    None if shape.is_optional() => Bound::Ready {
                        value: Value::Null,
                        raw: None,
                    },
                    None => {
                        return Err(BindingError::MissingArgument {
                            handler: self.handler.clone(),
                            param: param.name.clone(),
                            type_name: shape.type_name,
                        })
                    }
                    Some(raw) => match coerce(kind, raw, formats) {
                        Some(value) => Bound::Ready {
                            value,
                            raw: Some(raw.clone()),
                        },
                        None if shape.is_optional() && !matches!(kind, ParamKind::Enum(_)) => {
                            Bound::Ready {
                                value: Value::Null,
                                raw: Some(raw.clone()),
                            }
                        }
                        None => return Err(self.invalid(param, kind, raw)),
                    },
                },
            };
            bound.push(slot);
        }

        let extra: Vec<String> = rest.cloned().collect();
        if !extra.is_empty() {
            return Err(BindingError::TooManyArguments {
                handler: self.handler.clone(),
                extra,
            });
        }
        Ok(bound)
    }

    /// Binds segments as plain strings, without coercion or injection.
    ///
    /// Missing segments bind `Null`; a variadic parameter takes the rest.
    pub fn bind_raw(&self, segments: &[String]) -> Vec<Bound> {
        let mut rest = segments.iter();
        self.params
            .iter()
            .map(|param| {
                let value = if param.shape.kind.is_variadic() {
                    Value::List(rest.by_ref().map(|s| Value::Str(s.clone())).collect())
                } else {
                    rest.next().map_or(Value::Null, |s| Value::Str(s.clone()))
                };
                Bound::Ready { value, raw: None }
            })
            .collect()
    }

    /// Turns bound values into call arguments, resolving deferred ones.
    pub fn resolve<'a, C>(
        &self,
        bound: Vec<Bound>,
        ctx: &'a C,
        container: &ContainerSlot,
    ) -> Result<Vec<Arg<'a, C>>> {
        bound
            .into_iter()
            .map(|slot| match slot {
                Bound::Ready { value, .. } => Ok(Arg::Value(value)),
                Bound::Context => Ok(Arg::Context(ctx)),
                Bound::Object { key, nullable } => resolve_object(container, key, nullable),
            })
            .collect()
    }

    /// Error for a parameter whose bound value did not convert to its type.
    pub fn extract_error(&self, index: usize, raw: Option<&str>) -> RouterError {
        let Some(param) = self.params.get(index) else {
            return BindingError::MissingArgument {
                handler: self.handler.clone(),
                param: format!("arg{index}"),
                type_name: "unknown",
            }
            .into();
        };
        match &param.shape.kind {
            ParamKind::Object(_) => ConfigError::WrongDependencyType {
                type_name: param.shape.type_name,
            }
            .into(),
            kind => self.invalid(param, kind, raw.unwrap_or_default()).into(),
        }
    }

    fn invalid(&self, param: &ParameterDescriptor, kind: &ParamKind, raw: &str) -> BindingError {
        let handler = self.handler.clone();
        let name = param.name.clone();
        let value = raw.to_string();
        match kind {
            ParamKind::Enum(spec) => BindingError::InvalidEnum {
                handler,
                param: name,
                value,
                enum_name: spec.name,
            },
            ParamKind::DateTime => BindingError::InvalidDateTime {
                handler,
                param: name,
                value,
            },
            ParamKind::Scalar(scalar) => BindingError::InvalidValue {
                handler,
                param: name,
                value,
                expected: scalar.name(),
            },
            _ => BindingError::InvalidValue {
                handler,
                param: name,
                value,
                expected: param.shape.type_name,
            },
        }
    }
}

fn resolve_object<'a, C>(
    container: &ContainerSlot,
    key: TypeKey,
    nullable: bool,
) -> Result<Arg<'a, C>> {
    match container.resolve_key(&key) {
        Ok(Some(object)) => Ok(Arg::Value(Value::Object(object))),
        Ok(None) | Err(ConfigError::MissingContainer { .. }) if nullable => {
            Ok(Arg::Value(Value::Null))
        }
        Ok(None) => Err(ConfigError::UnresolvedDependency {
            type_name: key.name(),
        }
        .into()),
        Err(err) => Err(err.into()),
    }
}

/// Coerces one segment according to `kind`.
pub fn coerce(kind: &ParamKind, raw: &str, formats: &[String]) -> Option<Value> {
    match kind {
        ParamKind::Scalar(ScalarKind::Str) => Some(Value::Str(raw.to_string())),
        ParamKind::Scalar(ScalarKind::Int { min, max }) => raw
            .parse::<i128>()
            .ok()
            .filter(|n| (*min..=*max).contains(n))
            .map(Value::Int),
        ParamKind::Scalar(ScalarKind::Float) => raw
            .parse::<f64>()
            .ok()
            .filter(|f| f.is_finite())
            .map(Value::Float),
        ParamKind::Scalar(ScalarKind::Float32) => raw
            .parse::<f32>()
            .ok()
            .filter(|f| f.is_finite())
            .map(|f| Value::Float(f64::from(f))),
        ParamKind::Scalar(ScalarKind::Bool) => parse_bool(raw).map(Value::Bool),
        ParamKind::Enum(spec) => spec.find(raw).map(Value::Enum),
        ParamKind::DateTime => parse_datetime(raw, formats).map(Value::DateTime),
        ParamKind::Context | ParamKind::Object(_) | ParamKind::Variadic(_) => None,
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "true" | "1" | "on" | "yes" => Some(true),
        "false" | "0" | "off" | "no" => Some(false),
        _ => None,
    }
}

/// Parses `raw` with the first format that accepts it.
///
/// Each format is tried with an offset, then as a naive date-time, then as a
/// date at midnight. Naive values are taken as UTC.
pub fn parse_datetime(raw: &str, formats: &[String]) -> Option<DateTime<FixedOffset>> {
    formats.iter().find_map(|format| {
        DateTime::parse_from_str(raw, format)
            .ok()
            .or_else(|| {
                NaiveDateTime::parse_from_str(raw, format)
                    .ok()
                    .map(|dt| dt.and_utc().fixed_offset())
            })
            .or_else(|| {
                NaiveDate::parse_from_str(raw, format)
                    .ok()
                    .and_then(|d| d.and_hms_opt(0, 0, 0))
                    .map(|dt| dt.and_utc().fixed_offset())
            })
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{Datelike, Timelike};

    use super::*;
    use crate::config::RouterConfig;
    use crate::container::Resolved;
    use crate::param::{Context, Dep, OrDefault, Param, Rest};

    fn shapes2<A: Param<()>, B: Param<()>>() -> Vec<ParamShape> {
        vec![A::shape(), B::shape()]
    }

    fn segs(list: &[&str]) -> Vec<String> {
        list.iter().map(ToString::to_string).collect()
    }

    fn formats() -> Vec<String> {
        RouterConfig::default().datetime_formats
    }

    fn plan(shapes: Vec<ParamShape>) -> ParameterPlan {
        ParameterPlan::compile("test", &["a", "b"], shapes, None).unwrap()
    }

    #[test]
    fn test_scalar_coercion() {
        let plan = plan(shapes2::<i64, bool>());
        let bound = plan.bind(&segs(&["123", "yes"]), &formats()).unwrap();
        assert_eq!(
            bound[0],
            Bound::Ready {
                value: Value::Int(123),
                raw: Some("123".into())
            }
        );
        assert!(matches!(
            &bound[1],
            Bound::Ready {
                value: Value::Bool(true),
                ..
            }
        ));
        let err = plan.bind(&segs(&["abc", "yes"]), &formats()).unwrap_err();
        assert!(matches!(err, BindingError::InvalidValue { expected: "int", .. }));
    }

    #[test]
    fn test_integer_range_checked_on_coercion() {
        let plan = plan(shapes2::<u64, Option<u8>>());
        let bound = plan
            .bind(&segs(&["18446744073709551615", "300"]), &formats())
            .unwrap();
        assert!(matches!(
            &bound[0],
            Bound::Ready { value: Value::Int(n), .. } if *n == i128::from(u64::MAX)
        ));
        assert!(matches!(
            &bound[1],
            Bound::Ready {
                value: Value::Null,
                ..
            }
        ));

        let err = plan.bind(&segs(&["-1"]), &formats()).unwrap_err();
        assert!(matches!(err, BindingError::InvalidValue { expected: "int", .. }));
    }

    #[test]
    fn test_float32_range() {
        let plan = plan(shapes2::<f32, Option<f32>>());
        let err = plan.bind(&segs(&["1e39", "1"]), &formats()).unwrap_err();
        assert!(matches!(
            err,
            BindingError::InvalidValue { expected: "32-bit float", .. }
        ));
        let bound = plan.bind(&segs(&["2.5", "1e39"]), &formats()).unwrap();
        assert!(matches!(
            &bound[1],
            Bound::Ready {
                value: Value::Null,
                ..
            }
        ));
    }

    #[test]
    fn test_optional_and_nullable_fallbacks() {
        let plan = plan(shapes2::<OrDefault<i32>, Option<f64>>());
        let bound = plan.bind(&segs(&["x", "inf"]), &formats()).unwrap();
        assert!(bound.iter().all(|b| matches!(
            b,
            Bound::Ready {
                value: Value::Null,
                ..
            }
        )));
        let bound = plan.bind(&[], &formats()).unwrap();
        assert_eq!(bound.len(), 2);
    }

    #[test]
    fn test_missing_and_extra_arguments() {
        let plan = plan(shapes2::<String, String>());
        assert!(matches!(
            plan.bind(&segs(&["one"]), &formats()),
            Err(BindingError::MissingArgument { ref param, .. }) if param == "b"
        ));
        assert!(matches!(
            plan.bind(&segs(&["1", "2", "3"]), &formats()),
            Err(BindingError::TooManyArguments { ref extra, .. }) if extra == &["3".to_string()]
        ));
    }

    #[test]
    fn test_variadic_consumes_rest() {
        let plan = plan(shapes2::<String, Rest<String>>());
        let bound = plan
            .bind(&segs(&["head", "is-", "var", "i", "a", "dic"]), &formats())
            .unwrap();
        let Bound::Ready {
            value: Value::List(values),
            ..
        } = &bound[1]
        else {
            panic!("expected list");
        };
        assert_eq!(values.len(), 5);

        let shapes = shapes2::<Rest<String>, String>();
        let err = ParameterPlan::compile("test", &["a", "b"], shapes, None).unwrap_err();
        assert!(matches!(err, ConfigError::VariadicNotLast { ref param, .. } if param == "a"));
    }

    #[test]
    fn test_wildcard_count_check() {
        let shapes = shapes2::<i64, Option<String>>();
        let one = PathPattern::new("user/*");
        assert!(ParameterPlan::compile("h", &[], shapes.clone(), Some(&one)).is_ok());
        let none = PathPattern::new("user");
        let err = ParameterPlan::compile("Ctl::show", &[], shapes, Some(&none)).unwrap_err();
        assert_eq!(
            err.to_string(),
            "route 'user' has 0 wildcard(s) but handler 'Ctl::show' expects 1 route parameter(s)"
        );
        let injected = shapes2::<Dep<String>, Context<()>>();
        assert!(ParameterPlan::compile("h", &[], injected, Some(&none)).is_ok());
    }

    #[test]
    fn test_positional_names() {
        let plan = ParameterPlan::compile("h", &[], shapes2::<i8, i8>(), None).unwrap();
        assert_eq!(plan.params()[1].name, "arg1");
    }

    #[test]
    fn test_datetime_formats() {
        let f = formats();
        let d = parse_datetime("2024-03-05", &f).unwrap();
        assert_eq!((d.year(), d.month(), d.day(), d.hour()), (2024, 3, 5, 0));
        let dt = parse_datetime("2024-03-05T10:20:30", &f).unwrap();
        assert_eq!(dt.minute(), 20);
        let tz = parse_datetime("2024-03-05T10:20:30+02:00", &f).unwrap();
        assert_eq!(tz.offset().local_minus_utc(), 7200);
        assert!(parse_datetime("05/03/2024", &f).is_none());
    }

    #[test]
    fn test_bool_words() {
        for (raw, expected) in [("ON", true), ("no", false), ("1", true), ("False", false)] {
            assert_eq!(parse_bool(raw), Some(expected));
        }
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn test_raw_binding() {
        let plan = plan(shapes2::<String, Rest<String>>());
        let bound = plan.bind_raw(&segs(&["1", "2", "3"]));
        assert_eq!(
            bound[0],
            Bound::Ready {
                value: Value::Str("1".into()),
                raw: None
            }
        );
        assert!(matches!(&bound[1], Bound::Ready { value: Value::List(v), .. } if v.len() == 2));
    }

    #[test]
    fn test_resolve_deferred() {
        let plan = plan(shapes2::<Dep<String>, Option<Dep<u8>>>());
        let bound = plan.bind(&[], &formats()).unwrap();
        let slot = ContainerSlot::new();
        let err = plan.resolve(bound.clone(), &(), &slot).unwrap_err();
        assert!(matches!(
            err,
            RouterError::Configuration(ConfigError::MissingContainer { .. })
        ));

        slot.set(|key: &TypeKey| -> Option<Resolved> {
            key.is::<String>().then(|| Arc::new(String::from("svc")) as Resolved)
        });
        let args = plan.resolve(bound, &(), &slot).unwrap();
        assert!(matches!(args[0], Arg::Value(Value::Object(_))));
        assert!(matches!(args[1], Arg::Value(Value::Null)));
    }
}
