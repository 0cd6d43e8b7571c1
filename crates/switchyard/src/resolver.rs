//! Controller expansion.
//!
//! A controller route starts with no handlers. The first time it matches,
//! its member table is read and turned into handlers: either on explicitly
//! declared paths, or on paths derived from the member names.

use std::sync::Arc;

use tracing::debug;

use crate::config::RouterConfig;
use crate::controller::{ControllerInfo, Member};
use crate::error::ConfigError;
use crate::method::Method;
use crate::middleware::MiddlewareRef;
use crate::path::PathPattern;
use crate::table::{Handler, Route, RouteId, RouteSource, RouteTable};

type Target<C, R> = (PathPattern, Handler<C, R>);

/// Expands the controller behind `id` into handlers.
///
/// Does nothing for routes expanded before. Every target is computed before
/// the table is touched, so a failing controller leaves the table unchanged.
/// The entry's own handlers are placed ahead of handlers other controllers
/// contributed to the same pattern.
pub(crate) fn expand<C, R>(
    table: &mut RouteTable<C, R>,
    id: RouteId,
    config: &RouterConfig,
) -> Result<(), ConfigError> {
    let route = table.route(id);
    if !route.needs_expansion() {
        return Ok(());
    }
    let RouteSource::Controller { info, member } = &route.source else {
        return Ok(());
    };
    let info = info.clone();
    let pinned = member.clone();
    let entry = route.pattern.clone();
    let entry_methods = route.methods.clone();
    let entry_middleware = route.middleware.clone();
    let members = (info.members)();

    let targets = match pinned {
        Some(name) => vec![(entry.clone(), pinned_handler(&info, members, &name)?)],
        None if is_declarative(&info, &members) => {
            declared_targets(&info, &members, &entry, &entry_methods)?
        }
        None => conventional_targets(&info, &members, &entry, &entry_methods, config),
    };

    let count = targets.len();
    let mut own = 0;
    for (pattern, mut handler) in targets {
        let target = match table.find_pattern(&pattern) {
            Some(existing) => existing,
            None => {
                let mut created = Route::new(
                    pattern,
                    RouteSource::Controller {
                        info: info.clone(),
                        member: None,
                    },
                );
                created.expanded = true;
                table.insert(created)
            }
        };
        let handlers = &mut table.route_mut(target).handlers;
        if target == id {
            handlers.insert(own, Arc::new(handler));
            own += 1;
        } else {
            handler.middleware = inherit(&entry_middleware, handler.middleware);
            handlers.push(Arc::new(handler));
        }
    }
    table.route_mut(id).expanded = true;

    debug!(
        controller = info.name(),
        entry = %entry.as_str(),
        handlers = count,
        "expanded controller"
    );
    Ok(())
}

fn is_declarative<C, R>(info: &ControllerInfo<C, R>, members: &[Member<C, R>]) -> bool {
    info.base_path.is_some() || members.iter().any(|m| !m.routes.is_empty())
}

fn label<C, R>(info: &ControllerInfo<C, R>, member: &Member<C, R>) -> String {
    format!("{}::{}", info.name(), member.name)
}

fn handler<C, R>(
    info: &ControllerInfo<C, R>,
    member: &Member<C, R>,
    methods: Vec<Method>,
) -> Handler<C, R> {
    let mut handler = Handler::new(label(info, member), Arc::clone(&member.callable));
    handler.param_names = member.params;
    handler.methods = methods;
    handler
}

fn pinned_handler<C, R>(
    info: &ControllerInfo<C, R>,
    members: Vec<Member<C, R>>,
    name: &str,
) -> Result<Handler<C, R>, ConfigError> {
    let member = members
        .into_iter()
        .find(|m| m.name == name)
        .ok_or_else(|| ConfigError::UnknownMember {
            controller: info.name(),
            member: name.to_string(),
        })?;
    if !member.public {
        return Err(ConfigError::MemberNotPublic {
            controller: info.name(),
            member: name.to_string(),
        });
    }
    Ok(handler(info, &member, Vec::new()))
}

fn declared_targets<C, R>(
    info: &ControllerInfo<C, R>,
    members: &[Member<C, R>],
    entry: &PathPattern,
    entry_methods: &[Method],
) -> Result<Vec<Target<C, R>>, ConfigError> {
    let base = info.base_path.map(PathPattern::new);
    if let Some(base) = &base {
        if !entry.starts_with(base) {
            return Err(ConfigError::BasePathMismatch {
                controller: info.name(),
                base: base.to_string(),
                pattern: entry.as_str().to_string(),
            });
        }
    }

    let mut targets = Vec::new();
    for member in members.iter().filter(|m| m.public) {
        for decl in &member.routes {
            let sub = PathPattern::new(&decl.path);
            let pattern = match &base {
                Some(base) => base.join(&sub.strip_prefix(base).unwrap_or(sub)),
                None => sub,
            };
            let methods = if decl.methods.is_empty() {
                entry_methods.to_vec()
            } else {
                decl.methods.clone()
            };
            let mut handler = handler(info, member, methods);
            handler.middleware.clone_from(&decl.middleware);
            handler.declared = Some(pattern.clone());
            targets.push((pattern, handler));
        }
    }
    Ok(targets)
}

fn conventional_targets<C, R>(
    info: &ControllerInfo<C, R>,
    members: &[Member<C, R>],
    entry: &PathPattern,
    entry_methods: &[Method],
    config: &RouterConfig,
) -> Vec<Target<C, R>> {
    members
        .iter()
        .filter(|m| m.public)
        .map(|member| {
            let pattern = if config.is_entry_member(member.name) {
                entry.clone()
            } else {
                entry.join(&PathPattern::new(&member.name.replace('_', "/")))
            };
            (pattern, handler(info, member, entry_methods.to_vec()))
        })
        .collect()
}

fn inherit<C, R>(
    entry: &[MiddlewareRef<C, R>],
    own: Vec<MiddlewareRef<C, R>>,
) -> Vec<MiddlewareRef<C, R>> {
    entry.iter().cloned().chain(own).collect()
}
