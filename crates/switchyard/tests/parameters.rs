//! Tests for typed parameter binding through dispatch.
//!
//! These tests verify coercion of path segments into:
//! - Enums derived with `#[derive(PathEnum)]` (string, int and unit backed)
//! - Scalars, dates and variadic lists
//! - Optional and defaulted parameters

use chrono::{DateTime, FixedOffset, NaiveDate};
use switchyard::{
    BindingError, EnumBacking, OrDefault, PathEnum, Rest, Router, RouterConfig, RouterError,
};
use switchyard_derive::PathEnum;

#[derive(Debug, PartialEq, PathEnum)]
enum Grade {
    #[path_enum(value = "A")]
    A,
    #[path_enum(value = "B")]
    B,
    #[path_enum(value = "C")]
    C,
}

#[derive(Debug, PartialEq, PathEnum)]
enum Priority {
    Low = 1,
    High = 10,
    Urgent,
}

#[derive(Debug, PartialEq, PathEnum)]
enum Color {
    Red,
    Green,
}

#[test]
fn test_path_enum_specs() {
    assert_eq!(Grade::SPEC.backing, EnumBacking::String);
    assert_eq!(Priority::SPEC.backing, EnumBacking::Int);
    assert_eq!(Color::SPEC.backing, EnumBacking::Unit);
    assert_eq!(Priority::SPEC.find("11"), Some(2));
    assert_eq!(Color::SPEC.cases[1].name, "Green");
    assert_eq!(Grade::from_case(1), Some(Grade::B));
    assert_eq!(Grade::from_case(3), None);
}

#[test]
fn test_string_backed_enum() {
    let mut router: Router = Router::new();
    router.add("/grade/*", |g: Grade| format!("{g:?}")).unwrap();

    assert_eq!(router.dispatch_path("/grade/B").unwrap(), "B");
    assert!(matches!(
        router.dispatch_path("/grade/b"),
        Err(RouterError::ArgumentBinding(BindingError::InvalidEnum { enum_name: "Grade", .. }))
    ));
}

#[test]
fn test_int_backed_enum() {
    let mut router: Router = Router::new();
    router.add("/priority/*", |p: Priority| format!("{p:?}")).unwrap();

    assert_eq!(router.dispatch_path("/priority/10").unwrap(), "High");
    assert_eq!(router.dispatch_path("/priority/11").unwrap(), "Urgent");
    for bad in ["5", "high"] {
        assert!(matches!(
            router.dispatch_path(&format!("/priority/{bad}")),
            Err(RouterError::ArgumentBinding(BindingError::InvalidEnum { .. }))
        ));
    }
}

#[test]
fn test_unit_enum_and_optional_enum() {
    let mut router: Router = Router::new();
    router.add("/color/*", |c: Color| format!("{c:?}")).unwrap();
    router
        .add("/maybe", |c: Option<Color>| format!("{c:?}"))
        .unwrap();

    assert_eq!(router.dispatch_path("/color/GREEN").unwrap(), "Green");
    assert_eq!(router.dispatch_path("/maybe").unwrap(), "None");
    assert_eq!(router.dispatch_path("/maybe/red").unwrap(), "Some(Red)");
    assert!(matches!(
        router.dispatch_path("/maybe/blue"),
        Err(RouterError::ArgumentBinding(BindingError::InvalidEnum { .. }))
    ));
}

#[test]
fn test_scalars() {
    let mut router: Router = Router::new();
    router
        .add("/calc/*/*", |x: f64, double: bool| {
            let value = if double { x * 2.0 } else { x };
            format!("{value}")
        })
        .unwrap();

    assert_eq!(router.dispatch_path("/calc/1.5/yes").unwrap(), "3");
    assert_eq!(router.dispatch_path("/calc/1.5/off").unwrap(), "1.5");
    assert!(matches!(
        router.dispatch_path("/calc/NaN/on"),
        Err(RouterError::ArgumentBinding(BindingError::InvalidValue { expected: "float", .. }))
    ));
    assert!(matches!(
        router.dispatch_path("/calc/1/maybe"),
        Err(RouterError::ArgumentBinding(BindingError::InvalidValue { expected: "bool", .. }))
    ));
}

#[test]
fn test_integer_range() {
    let mut router: Router = Router::new();
    router.add("/byte/*", |b: u8| b.to_string()).unwrap();

    assert_eq!(router.dispatch_path("/byte/255").unwrap(), "255");
    let err = router.dispatch_path("/byte/256").unwrap_err();
    assert!(matches!(err, RouterError::ArgumentBinding(_)));
    assert!(err.to_string().contains("'256'"));
}

#[test]
fn test_full_width_unsigned() {
    let mut router: Router = Router::new();
    router.add("/n/*", |n: u64| n.to_string()).unwrap();

    assert_eq!(
        router.dispatch_path("/n/18446744073709551615").unwrap(),
        "18446744073709551615"
    );
    assert!(matches!(
        router.dispatch_path("/n/18446744073709551616"),
        Err(RouterError::ArgumentBinding(BindingError::InvalidValue { expected: "int", .. }))
    ));
}

#[test]
fn test_out_of_range_optional_falls_back() {
    let mut router: Router = Router::new();
    router.add("/o", |n: Option<u8>| format!("{n:?}")).unwrap();
    router.add("/d", |n: OrDefault<i8>| n.0.to_string()).unwrap();

    assert_eq!(router.dispatch_path("/o/x").unwrap(), "None");
    assert_eq!(router.dispatch_path("/o/300").unwrap(), "None");
    assert_eq!(router.dispatch_path("/o/200").unwrap(), "Some(200)");
    assert_eq!(router.dispatch_path("/d/-129").unwrap(), "0");
    assert_eq!(router.dispatch_path("/d/-128").unwrap(), "-128");
}

#[test]
fn test_single_precision_range() {
    let mut router: Router = Router::new();
    router.add("/f/*", |f: f32| f.to_string()).unwrap();

    assert_eq!(router.dispatch_path("/f/0.5").unwrap(), "0.5");
    assert!(matches!(
        router.dispatch_path("/f/1e39"),
        Err(RouterError::ArgumentBinding(BindingError::InvalidValue {
            expected: "32-bit float",
            ..
        }))
    ));
}

#[test]
fn test_defaults_and_missing() {
    let mut router: Router = Router::new();
    router
        .add("/page", |page: OrDefault<u32>, size: Option<u32>| {
            format!("{}:{}", *page, size.unwrap_or(20))
        })
        .unwrap();
    router.add("/need/*", |id: u64| id.to_string()).unwrap();

    assert_eq!(router.dispatch_path("/page").unwrap(), "0:20");
    assert_eq!(router.dispatch_path("/page/3/50").unwrap(), "3:50");
    assert_eq!(router.dispatch_path("/page/x/y").unwrap(), "0:20");
    assert!(matches!(
        router.dispatch_path("/need"),
        Err(RouterError::ArgumentBinding(BindingError::MissingArgument { .. }))
    ));
}

#[test]
fn test_variadic_parameters() {
    let mut router: Router = Router::new();
    router
        .add("/sum", |first: i64, rest: Rest<i64>| {
            (first + rest.iter().sum::<i64>()).to_string()
        })
        .unwrap();
    router
        .add("/files/*", |dir: String, parts: Rest<String>| {
            format!("{dir}:{}", parts.join("/"))
        })
        .unwrap();

    assert_eq!(router.dispatch_path("/sum/1/2/3/4").unwrap(), "10");
    assert_eq!(router.dispatch_path("/sum/1").unwrap(), "1");
    assert!(matches!(
        router.dispatch_path("/sum/1/two"),
        Err(RouterError::ArgumentBinding(BindingError::InvalidValue { .. }))
    ));
    assert_eq!(
        router.dispatch_path("/files/docs/a/b.txt").unwrap(),
        "docs:a/b.txt"
    );
}

#[test]
fn test_dates() {
    let mut router: Router = Router::new();
    router.add("/day/*", |d: NaiveDate| d.to_string()).unwrap();
    router
        .add("/at/*", |at: DateTime<FixedOffset>| at.to_rfc3339())
        .unwrap();

    assert_eq!(router.dispatch_path("/day/2024-03-05").unwrap(), "2024-03-05");
    assert_eq!(
        router.dispatch_path("/at/2024-03-05T10:20:30+02:00").unwrap(),
        "2024-03-05T10:20:30+02:00"
    );
    assert!(matches!(
        router.dispatch_path("/day/05.03.2024"),
        Err(RouterError::ArgumentBinding(BindingError::InvalidDateTime { .. }))
    ));
}

#[test]
fn test_configured_formats_and_method() {
    let mut config = RouterConfig::from_json(r#"{ "default_method": "POST" }"#).unwrap();
    config.datetime_formats = vec!["%d.%m.%Y".to_string()];
    let mut router: Router = Router::with_config(config);
    router.post("/day/*", |d: NaiveDate| d.to_string()).unwrap();

    assert_eq!(router.dispatch_path("/day/05.03.2024").unwrap(), "2024-03-05");
    assert!(matches!(
        router.dispatch("/day/05.03.2024", &mut (), Some("GET")),
        Err(RouterError::MethodNotAllowed { .. })
    ));
}
