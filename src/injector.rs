//! Singleton dependency container.
//!
//! The container is a composition root: factories are registered once at
//! process start, and the first [`Container::resolve`] of a type runs its
//! factory (resolving the factory's own dependencies recursively) and caches
//! the instance. Every later resolution of the same type returns the same
//! `Arc`. There is no scoping beyond singletons and no per-request instance.
//!
//! Cycles in the declared graph are a fatal configuration error, detected
//! with a resolution-in-progress stack and reported with the offending type
//! chain. The cache is process-wide state with no teardown path; tests that
//! need isolation use [`Container::reset`].

use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::Error;

type AnyArc = Arc<dyn Any + Send + Sync>;
type Factory = Arc<dyn Fn(&mut Container) -> Result<AnyArc, Error> + Send + Sync>;

#[derive(Default)]
pub struct Container {
    factories: HashMap<TypeId, (&'static str, Factory)>,
    singletons: HashMap<TypeId, AnyArc>,
    resolving: Vec<(TypeId, &'static str)>,
}

impl Container {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory for `T`. The factory may resolve its own
    /// dependencies from the container it is handed.
    pub fn provide<T, F>(&mut self, factory: F)
    where
        T: Send + Sync + 'static,
        F: Fn(&mut Container) -> Result<T, Error> + Send + Sync + 'static,
    {
        let factory: Factory = Arc::new(move |container| {
            factory(container).map(|value| Arc::new(value) as AnyArc)
        });
        self.factories
            .insert(TypeId::of::<T>(), (type_name::<T>(), factory));
    }

    /// Register an already-constructed instance as the singleton for `T`.
    pub fn provide_value<T: Send + Sync + 'static>(&mut self, value: T) {
        self.singletons.insert(TypeId::of::<T>(), Arc::new(value));
    }

    /// Resolve the singleton for `T`, constructing and caching it on first
    /// use.
    pub fn resolve<T: Send + Sync + 'static>(&mut self) -> Result<Arc<T>, Error> {
        let id = TypeId::of::<T>();

        if let Some(existing) = self.singletons.get(&id) {
            return Arc::clone(existing)
                .downcast::<T>()
                .map_err(|_| Error::configuration(format!("type confusion for {}", type_name::<T>())));
        }

        let (name, factory) = self
            .factories
            .get(&id)
            .map(|(name, factory)| (*name, Arc::clone(factory)))
            .ok_or_else(|| {
                Error::configuration(format!("no provider registered for {}", type_name::<T>()))
            })?;

        if self.resolving.iter().any(|(other, _)| *other == id) {
            let mut chain: Vec<&str> = self.resolving.iter().map(|(_, n)| *n).collect();
            chain.push(name);
            return Err(Error::configuration(format!(
                "cyclic dependency graph: {}",
                chain.join(" -> ")
            )));
        }

        self.resolving.push((id, name));
        let produced = factory(self);
        self.resolving.pop();

        let instance = produced?;
        self.singletons.insert(id, Arc::clone(&instance));
        instance
            .downcast::<T>()
            .map_err(|_| Error::configuration(format!("type confusion for {}", type_name::<T>())))
    }

    /// Drop every cached singleton, keeping the registered factories.
    /// Test-isolation hook; never called on the serving path.
    pub fn reset(&mut self) {
        self.singletons.clear();
        self.resolving.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Config {
        port: u16,
    }

    #[derive(Debug)]
    struct Service {
        config: Arc<Config>,
    }

    #[test]
    fn resolves_the_same_singleton_twice() {
        let mut container = Container::new();
        container.provide(|_| Ok(Config { port: 8080 }));
        let first = container.resolve::<Config>().expect("first");
        let second = container.resolve::<Config>().expect("second");
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.port, 8080);
    }

    #[test]
    fn factories_resolve_their_dependencies() {
        let mut container = Container::new();
        container.provide(|_| Ok(Config { port: 9000 }));
        container.provide(|c| {
            Ok(Service {
                config: c.resolve::<Config>()?,
            })
        });
        let service = container.resolve::<Service>().expect("service");
        assert_eq!(service.config.port, 9000);
    }

    #[test]
    fn missing_provider_is_a_configuration_error() {
        let mut container = Container::new();
        let err = container.resolve::<Service>().expect_err("must fail");
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn cycles_are_fatal_and_name_the_chain() {
        #[derive(Debug)]
        struct A;
        struct B;
        let mut container = Container::new();
        container.provide(|c| {
            c.resolve::<B>()?;
            Ok(A)
        });
        container.provide(|c| {
            c.resolve::<A>()?;
            Ok(B)
        });
        let err = container.resolve::<A>().expect_err("cycle");
        let message = err.to_string();
        assert!(message.contains("cyclic dependency graph"), "{message}");
        assert!(message.contains("A"), "{message}");
        assert!(message.contains("B"), "{message}");
    }

    #[test]
    fn reset_drops_cached_instances() {
        let mut container = Container::new();
        container.provide(|_| Ok(Config { port: 1 }));
        let first = container.resolve::<Config>().expect("first");
        container.reset();
        let second = container.resolve::<Config>().expect("second");
        assert!(!Arc::ptr_eq(&first, &second));
    }
}
