//! Concurrent tables behind the container
//!
//! Uses DashMap for lock-free concurrent access. Three tables are kept:
//! resolution strategies per service type, live instances per concrete
//! service type, and every type name the container has seen.
//!
//! Callers never hold a guard from these maps while running user code; every
//! accessor clones out of the map before returning.

use crate::factory::Strategy;
use crate::{Instance, ServiceType, TypeName};
use ahash::RandomState;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// A registered strategy and the key it was registered under.
#[derive(Clone)]
pub(crate) struct Registration {
    pub key: Arc<str>,
    pub strategy: Strategy,
    /// Position of the first registration for this service type
    pub sequence: u64,
}

/// Thread-safe tables for strategies, instances and type names
pub(crate) struct ServiceStorage {
    strategies: DashMap<ServiceType, Registration, RandomState>,
    instances: DashMap<ServiceType, Instance, RandomState>,
    type_names: DashMap<String, ServiceType, RandomState>,
    next_sequence: AtomicU64,
}

impl ServiceStorage {
    /// Create with pre-allocated capacity and optimized shards.
    pub fn with_capacity(capacity: usize) -> Self {
        // Scale shards based on expected capacity and concurrency needs
        let shard_amount = if capacity <= 16 {
            8
        } else if capacity <= 64 {
            16
        } else {
            32
        };
        Self {
            strategies: DashMap::with_capacity_and_hasher_and_shard_amount(
                capacity,
                RandomState::new(),
                shard_amount,
            ),
            instances: DashMap::with_capacity_and_hasher_and_shard_amount(
                capacity,
                RandomState::new(),
                shard_amount,
            ),
            type_names: DashMap::with_capacity_and_hasher_and_shard_amount(
                capacity * 2,
                RandomState::new(),
                shard_amount,
            ),
            next_sequence: AtomicU64::new(0),
        }
    }

    // =========================================================================
    // Strategies
    // =========================================================================

    #[inline]
    pub fn registration(&self, service: &ServiceType) -> Option<Registration> {
        self.strategies.get(service).map(|r| r.value().clone())
    }

    /// Install or replace the strategy for `service`.
    ///
    /// A replaced registration keeps its original position.
    pub fn insert_strategy(&self, service: ServiceType, key: Arc<str>, strategy: Strategy) {
        match self.strategies.entry(service) {
            Entry::Occupied(mut occupied) => {
                let registration = occupied.get_mut();
                registration.key = key;
                registration.strategy = strategy;
            }
            Entry::Vacant(vacant) => {
                vacant.insert(Registration {
                    key,
                    strategy,
                    sequence: self.next_sequence.fetch_add(1, Ordering::Relaxed),
                });
            }
        }
    }

    /// Install a fixed instance unless `service` already has a strategy.
    ///
    /// Returns whether the instance was installed.
    pub fn insert_fixed(&self, service: ServiceType, key: Arc<str>, instance: Instance) -> bool {
        match self.strategies.entry(service.clone()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(vacant) => {
                self.instances.insert(service, instance);
                vacant.insert(Registration {
                    key,
                    strategy: Strategy::Fixed,
                    sequence: self.next_sequence.fetch_add(1, Ordering::Relaxed),
                });
                true
            }
        }
    }

    #[inline]
    pub fn contains(&self, service: &ServiceType) -> bool {
        self.strategies.contains_key(service)
    }

    /// True when `service` has a strategy of its own or via its generic definition.
    pub fn can_resolve(&self, service: &ServiceType) -> bool {
        self.contains(service)
            || service
                .generic_definition()
                .is_some_and(|definition| self.contains(&definition))
    }

    /// Snapshot of all registrations in registration order.
    pub fn registrations(&self) -> Vec<(ServiceType, Registration)> {
        let mut all: Vec<(ServiceType, Registration)> = self
            .strategies
            .iter()
            .map(|r| (r.key().clone(), r.value().clone()))
            .collect();
        all.sort_by_key(|(_, registration)| registration.sequence);
        all
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    // =========================================================================
    // Instances
    // =========================================================================

    #[inline]
    pub fn cached(&self, service: &ServiceType) -> Option<Instance> {
        self.instances.get(service).map(|r| r.value().clone())
    }

    /// Overwrite the cached instance for `service`.
    #[inline]
    pub fn cache(&self, service: ServiceType, instance: Instance) {
        self.instances.insert(service, instance);
    }

    /// Cache `instance` unless another one is already present.
    ///
    /// Returns the cached instance and whether it was the one passed in.
    pub fn cache_if_absent(&self, service: ServiceType, instance: Instance) -> (Instance, bool) {
        match self.instances.entry(service) {
            Entry::Occupied(occupied) => (occupied.get().clone(), false),
            Entry::Vacant(vacant) => {
                vacant.insert(instance.clone());
                (instance, true)
            }
        }
    }

    /// Remove the cache entry holding `instance`.
    pub fn remove_instance(&self, instance: &Instance) -> Option<ServiceType> {
        let service = self
            .instances
            .iter()
            .find(|r| r.value().ptr_eq(instance))
            .map(|r| r.key().clone())?;

        self.instances
            .remove_if(&service, |_, cached| cached.ptr_eq(instance))
            .map(|(service, _)| service)
    }

    // =========================================================================
    // Type names
    // =========================================================================

    /// Record `service` and everything it is built from under their full names.
    pub fn remember(&self, service: &ServiceType) {
        if self.type_names.contains_key(&service.full_name()) {
            return;
        }

        if service.is_generic_definition() {
            self.type_names
                .insert(service.name().to_string(), service.clone());
        }
        self.type_names.insert(service.full_name(), service.clone());

        if let Some(definition) = service.generic_definition() {
            self.remember(&definition);
        }
        for argument in service.type_arguments() {
            self.remember(argument);
        }
    }

    /// Map a full type name back to a known type.
    ///
    /// Bound generics that were never seen as a whole are rebuilt from their
    /// definition and arguments.
    pub fn lookup(&self, name: &TypeName) -> Option<ServiceType> {
        if let Some(known) = self.type_names.get(&name.to_string()) {
            return Some(known.value().clone());
        }
        if name.arguments().is_empty() {
            return None;
        }

        let definition = self
            .type_names
            .get(name.base())
            .map(|r| r.value().clone())
            .filter(ServiceType::is_generic_definition)?;
        let arguments = name
            .arguments()
            .iter()
            .map(|argument| self.lookup(argument))
            .collect::<Option<Vec<_>>>()?;

        definition.bind(arguments).ok()
    }
}

impl std::fmt::Debug for ServiceStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceStorage")
            .field("strategies", &self.strategies.len())
            .field("instances", &self.instances.len())
            .field("type_names", &self.type_names.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Order;
    struct RepositoryDef;

    fn repository() -> ServiceType {
        ServiceType::definition::<RepositoryDef>(1).named("app::Repository")
    }

    fn order() -> ServiceType {
        ServiceType::of::<Order>().named("app::Order")
    }

    #[test]
    fn test_fixed_insert_is_first_wins() {
        let storage = ServiceStorage::with_capacity(0);
        let first = Instance::new(1u32);

        assert!(storage.insert_fixed(order(), "a".into(), first.clone()));
        assert!(!storage.insert_fixed(order(), "b".into(), Instance::new(2u32)));

        assert!(storage.cached(&order()).unwrap().ptr_eq(&first));
        assert_eq!(&*storage.registration(&order()).unwrap().key, "a");
    }

    #[test]
    fn test_overwrite_keeps_sequence() {
        let storage = ServiceStorage::with_capacity(0);
        storage.insert_strategy(order(), "first".into(), Strategy::Fixed);
        storage.insert_strategy(ServiceType::of::<u8>(), "second".into(), Strategy::Fixed);
        storage.insert_strategy(order(), "again".into(), Strategy::Fixed);

        let keys: Vec<String> = storage
            .registrations()
            .into_iter()
            .map(|(_, r)| r.key.to_string())
            .collect();
        assert_eq!(keys, vec!["again", "second"]);
    }

    #[test]
    fn test_can_resolve_via_definition() {
        let storage = ServiceStorage::with_capacity(0);
        storage.insert_strategy(repository(), "repo".into(), Strategy::Fixed);

        let bound = repository().bind([order()]).unwrap();
        assert!(storage.can_resolve(&bound));
        assert!(!storage.contains(&bound));
        assert!(!storage.can_resolve(&order()));
    }

    #[test]
    fn test_cache_if_absent_and_remove() {
        let storage = ServiceStorage::with_capacity(0);
        let first = Instance::new(1u32);

        let (winner, inserted) = storage.cache_if_absent(order(), first.clone());
        assert!(inserted && winner.ptr_eq(&first));

        let (winner, inserted) = storage.cache_if_absent(order(), Instance::new(2u32));
        assert!(!inserted && winner.ptr_eq(&first));

        assert_eq!(storage.remove_instance(&Instance::new(3u32)), None);
        assert_eq!(storage.remove_instance(&first), Some(order()));
        assert!(storage.cached(&order()).is_none());
    }

    #[test]
    fn test_lookup_rebuilds_bound_generics() {
        let storage = ServiceStorage::with_capacity(0);
        storage.remember(&repository());
        storage.remember(&order());

        let name = TypeName::parse("app::Repository<app::Order>").unwrap();
        let found = storage.lookup(&name).unwrap();
        assert_eq!(found, repository().bind([order()]).unwrap());

        assert!(storage.lookup(&TypeName::parse("app::Order").unwrap()).is_some());
        assert!(storage.lookup(&TypeName::parse("Non.Existent.Type").unwrap()).is_none());
        assert!(storage.lookup(&TypeName::parse("app::Order<app::Order>").unwrap()).is_none());
    }

    #[test]
    fn test_remember_walks_arguments() {
        let storage = ServiceStorage::with_capacity(0);
        storage.remember(&repository().bind([order()]).unwrap());

        assert!(storage.lookup(&TypeName::parse("app::Order").unwrap()).is_some());
        assert!(storage.lookup(&TypeName::parse("app::Repository<_>").unwrap()).is_some());
    }
}
