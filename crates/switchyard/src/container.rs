//! Dependency container seam.
//!
//! The router owns no container implementation. It talks to one through the
//! [`Container`] trait and reads it through a shared [`ContainerSlot`], so a
//! container swapped in between two dispatches is picked up by handlers whose
//! factories were built earlier.

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

use arc_swap::ArcSwapOption;

use crate::error::ConfigError;

/// Identifies a type requested from the container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeKey {
    id: TypeId,
    name: &'static str,
}

impl TypeKey {
    /// Returns the key for `T`.
    pub fn of<T: 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// Returns the type id.
    pub const fn id(&self) -> TypeId {
        self.id
    }

    /// Returns the Rust type name.
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Returns `true` if this key identifies `T`.
    pub fn is<T: 'static>(&self) -> bool {
        self.id == TypeId::of::<T>()
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// A value produced by the container.
pub type Resolved = Arc<dyn Any + Send + Sync>;

/// Resolves instances by type.
///
/// Any `Fn(&TypeKey) -> Option<Resolved>` closure is a container:
///
/// ```
/// use std::sync::Arc;
/// use switchyard::{Container, Resolved, TypeKey};
///
/// struct Mailer;
///
/// let container = |key: &TypeKey| -> Option<Resolved> {
///     key.is::<Mailer>().then(|| Arc::new(Mailer) as Resolved)
/// };
/// assert!(container.resolve(&TypeKey::of::<Mailer>()).is_some());
/// assert!(container.resolve(&TypeKey::of::<String>()).is_none());
/// ```
pub trait Container: Send + Sync {
    /// Returns an instance for `key`, or `None` if the type is unknown.
    fn resolve(&self, key: &TypeKey) -> Option<Resolved>;
}

impl<F> Container for F
where
    F: Fn(&TypeKey) -> Option<Resolved> + Send + Sync,
{
    fn resolve(&self, key: &TypeKey) -> Option<Resolved> {
        self(key)
    }
}

/// Shared accessor to the currently installed container.
#[derive(Clone, Default)]
pub struct ContainerSlot {
    inner: Arc<ArcSwapOption<Box<dyn Container>>>,
}

impl ContainerSlot {
    /// Creates an empty slot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs `container`, replacing the previous one.
    pub fn set(&self, container: impl Container + 'static) {
        self.inner.store(Some(Arc::new(Box::new(container))));
    }

    /// Removes the installed container.
    pub fn clear(&self) {
        self.inner.store(None);
    }

    /// Returns `true` when a container is installed.
    pub fn is_set(&self) -> bool {
        self.inner.load().is_some()
    }

    /// Looks `key` up in the current container.
    ///
    /// Returns `Ok(None)` when a container is installed but does not know the
    /// type.
    pub fn resolve_key(&self, key: &TypeKey) -> Result<Option<Resolved>, ConfigError> {
        let guard = self.inner.load();
        let container = guard.as_ref().ok_or(ConfigError::MissingContainer {
            type_name: key.name(),
        })?;
        Ok(container.resolve(key))
    }

    /// Resolves `T` through the current container.
    pub fn try_resolve<T: Send + Sync + 'static>(&self) -> Result<Option<Arc<T>>, ConfigError> {
        let key = TypeKey::of::<T>();
        self.resolve_key(&key)?
            .map(|value| {
                value
                    .downcast::<T>()
                    .map_err(|_| ConfigError::WrongDependencyType {
                        type_name: key.name(),
                    })
            })
            .transpose()
    }

    /// Resolves `T`, failing when it is unknown to the container.
    pub fn resolve<T: Send + Sync + 'static>(&self) -> Result<Arc<T>, ConfigError> {
        self.try_resolve::<T>()?
            .ok_or(ConfigError::UnresolvedDependency {
                type_name: std::any::type_name::<T>(),
            })
    }
}

impl fmt::Debug for ContainerSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContainerSlot")
            .field("set", &self.is_set())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Service(u32);

    fn container_with(value: u32) -> impl Container {
        move |key: &TypeKey| -> Option<Resolved> {
            if key.is::<Service>() {
                Some(Arc::new(Service(value)))
            } else if key.is::<String>() {
                Some(Arc::new(42_u8))
            } else {
                None
            }
        }
    }

    #[test]
    fn test_missing_container() {
        let slot = ContainerSlot::new();
        assert!(matches!(
            slot.resolve::<Service>(),
            Err(ConfigError::MissingContainer { .. })
        ));
    }

    #[test]
    fn test_resolve_and_swap() {
        let slot = ContainerSlot::new();
        let reader = slot.clone();
        slot.set(container_with(1));
        assert_eq!(*reader.resolve::<Service>().unwrap(), Service(1));
        slot.set(container_with(2));
        assert_eq!(*reader.resolve::<Service>().unwrap(), Service(2));
        slot.clear();
        assert!(!reader.is_set());
    }

    #[test]
    fn test_unknown_and_wrong_type() {
        let slot = ContainerSlot::new();
        slot.set(container_with(1));
        assert!(slot.try_resolve::<u64>().unwrap().is_none());
        assert!(matches!(
            slot.resolve::<u64>(),
            Err(ConfigError::UnresolvedDependency { .. })
        ));
        assert!(matches!(
            slot.resolve::<String>(),
            Err(ConfigError::WrongDependencyType { .. })
        ));
    }
}
