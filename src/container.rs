//! The service container
//!
//! The `Container` maps service types to resolution strategies and builds
//! implementations by resolving their constructor parameters recursively.

use crate::factory::Strategy;
use crate::lifecycle::start_instance;
use crate::selector::{Selection, select_constructor};
use crate::storage::{Registration, ServiceStorage};
use crate::{
    Arguments, ComponentDescriptor, ContainerConfig, ContainerError, Injectable, Instance,
    Lifestyle, Result, ServiceType, TypeName,
};
use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::{Arc, Weak};

#[cfg(feature = "logging")]
use tracing::{debug, trace};

// =============================================================================
// Thread-Local Construction Stack
// =============================================================================

thread_local! {
    /// Service types currently under construction on this thread, tagged with
    /// the container that is building them.
    static CONSTRUCTION_STACK: RefCell<Vec<(usize, ServiceType)>> = const { RefCell::new(Vec::new()) };
}

/// Pops the construction stack when dropped, including on unwind.
struct ConstructionGuard;

impl Drop for ConstructionGuard {
    fn drop(&mut self) {
        CONSTRUCTION_STACK.with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}

// =============================================================================
// Container
// =============================================================================

struct ContainerInner {
    storage: ServiceStorage,
    config: ContainerConfig,
}

/// Inversion-of-control container.
///
/// Cloning a `Container` yields another handle to the same registrations.
///
/// # Examples
///
/// ```rust
/// use service_container::{ComponentDescriptor, Container, Lifestyle, ServiceType};
/// use std::sync::Arc;
///
/// struct Database { url: String }
/// struct Reports { db: Arc<Database> }
///
/// let container = Container::new();
/// container
///     .register_self(
///         "database",
///         ComponentDescriptor::builder::<Database>()
///             .constructor([], |_| Ok(Database { url: "postgres://localhost".into() }))
///             .build(),
///         Lifestyle::Singleton,
///     )
///     .unwrap();
/// container
///     .register_self(
///         "reports",
///         ComponentDescriptor::builder::<Reports>()
///             .constructor([ServiceType::of::<Database>()], |args| Ok(Reports { db: args.get(0)? }))
///             .build(),
///         Lifestyle::Singleton,
///     )
///     .unwrap();
///
/// let reports = container.get::<Reports>(&ServiceType::of::<Reports>()).unwrap();
/// assert_eq!(reports.db.url, "postgres://localhost");
/// ```
#[derive(Clone)]
pub struct Container {
    inner: Arc<ContainerInner>,
}

/// Non-owning handle to a [`Container`].
///
/// Components that need to call back into the container they were built by
/// hold one of these so the container can still be dropped.
#[derive(Clone)]
pub struct WeakContainer {
    inner: Weak<ContainerInner>,
}

impl WeakContainer {
    /// The container, if it is still alive.
    #[inline]
    pub fn upgrade(&self) -> Option<Container> {
        self.inner.upgrade().map(|inner| Container { inner })
    }
}

impl std::fmt::Debug for WeakContainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeakContainer")
            .field("alive", &(self.inner.strong_count() > 0))
            .finish()
    }
}

impl Container {
    /// Create an empty container with the default configuration.
    #[inline]
    pub fn new() -> Self {
        Self::with_config(ContainerConfig::default())
    }

    /// Create a container with pre-allocated capacity.
    #[inline]
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_config(ContainerConfig::new().capacity(capacity))
    }

    pub fn with_config(config: ContainerConfig) -> Self {
        #[cfg(feature = "logging")]
        debug!(
            target: "service_container",
            capacity = config.expected_capacity(),
            detect_cycles = config.cycle_detection(),
            "Creating service container"
        );

        Self {
            inner: Arc::new(ContainerInner {
                storage: ServiceStorage::with_capacity(config.expected_capacity()),
                config,
            }),
        }
    }

    #[inline]
    pub fn config(&self) -> &ContainerConfig {
        &self.inner.config
    }

    /// A weak handle that does not keep the container alive.
    #[inline]
    pub fn downgrade(&self) -> WeakContainer {
        WeakContainer {
            inner: Arc::downgrade(&self.inner),
        }
    }

    #[inline]
    fn storage(&self) -> &ServiceStorage {
        &self.inner.storage
    }

    // =========================================================================
    // Registration Methods
    // =========================================================================

    /// Register a caller-supplied instance for `service`.
    ///
    /// Does nothing if `service` is already resolvable. Otherwise the instance
    /// is cached and, if it is auto-start, started immediately.
    pub fn register_instance(
        &self,
        key: impl Into<String>,
        service: ServiceType,
        instance: Instance,
    ) -> Result<()> {
        let key: Arc<str> = Arc::from(key.into());

        if !self
            .storage()
            .insert_fixed(service.clone(), Arc::clone(&key), instance.clone())
        {
            #[cfg(feature = "logging")]
            debug!(
                target: "service_container",
                key = %key,
                service = %service,
                "Service already registered, ignoring instance"
            );
            return Ok(());
        }

        #[cfg(feature = "logging")]
        debug!(
            target: "service_container",
            key = %key,
            service = %service,
            lifestyle = "fixed_instance",
            service_count = self.storage().len(),
            "Registered service instance"
        );

        self.storage().remember(&service);
        start_instance(&instance, &service)?;
        Ok(())
    }

    /// Register `component` as the implementation of `service`.
    ///
    /// Replaces any existing strategy for `service`. If the component is
    /// auto-start it is constructed and started right away; when its
    /// dependencies are not registered yet the start is deferred to
    /// [`Container::start_all`] or its first resolve.
    pub fn register_type(
        &self,
        key: impl Into<String>,
        service: ServiceType,
        component: ComponentDescriptor,
        lifestyle: Lifestyle,
    ) -> Result<()> {
        let key: Arc<str> = Arc::from(key.into());

        #[cfg(feature = "logging")]
        debug!(
            target: "service_container",
            key = %key,
            service = %service,
            implementation = %component.implementation(),
            lifestyle = ?lifestyle,
            service_count = self.storage().len() + 1,
            "Registering component"
        );

        self.storage().remember(&service);
        self.storage().remember(component.implementation());

        let eager = if component.is_auto_start() {
            match self.create_instance(&service, &component) {
                Ok(instance) => {
                    self.storage().cache(service.clone(), instance.clone());
                    Some(instance)
                }
                Err(err) if err.is_construction_error() => {
                    #[cfg(feature = "logging")]
                    debug!(
                        target: "service_container",
                        service = %service,
                        error = %err,
                        "Auto-start component not constructible yet, deferring start"
                    );
                    None
                }
                Err(err) => return Err(err),
            }
        } else {
            None
        };

        self.storage()
            .insert_strategy(service.clone(), key, Strategy::new(component, lifestyle));

        if let Some(instance) = eager {
            start_instance(&instance, &service)?;
        }
        Ok(())
    }

    /// Register a singleton implementation of `service`.
    #[inline]
    pub fn register_component(
        &self,
        key: impl Into<String>,
        service: ServiceType,
        component: ComponentDescriptor,
    ) -> Result<()> {
        self.register_type(key, service, component, Lifestyle::Singleton)
    }

    /// Register `component` under its own implementation type.
    #[inline]
    pub fn register_self(
        &self,
        key: impl Into<String>,
        component: ComponentDescriptor,
        lifestyle: Lifestyle,
    ) -> Result<()> {
        let service = component.implementation().clone();
        self.register_type(key, service, component, lifestyle)
    }

    /// Facilities are not supported.
    pub fn add_facility(&self, _key: impl Into<String>, _facility: Instance) -> Result<()> {
        Err(ContainerError::unsupported("add_facility"))
    }

    /// Property injection is not supported.
    pub fn register_with_parameters(
        &self,
        _key: impl Into<String>,
        _service: ServiceType,
        _component: ComponentDescriptor,
        _properties: HashMap<String, String>,
    ) -> Result<()> {
        Err(ContainerError::unsupported("register_with_parameters"))
    }

    // =========================================================================
    // Resolution Methods
    // =========================================================================

    /// Resolve an instance of `service`.
    ///
    /// Bound generic service types fall back to a strategy registered for
    /// their unbound definition.
    pub fn resolve(&self, service: &ServiceType) -> Result<Instance> {
        if let Some(registration) = self.storage().registration(service) {
            return self.dispatch(service, registration);
        }

        if let Some(definition) = service.generic_definition() {
            if let Some(registration) = self.storage().registration(&definition) {
                #[cfg(feature = "logging")]
                trace!(
                    target: "service_container",
                    service = %service,
                    definition = %definition,
                    "Resolving through generic definition"
                );
                return self.dispatch(service, registration);
            }
        }

        #[cfg(feature = "logging")]
        debug!(
            target: "service_container",
            service = %service,
            "Service not found"
        );

        Err(ContainerError::not_found(service))
    }

    /// Resolve by full type name, e.g. `app::Repository<app::Order>`.
    pub fn resolve_key(&self, key: &str) -> Result<Instance> {
        let service = self
            .type_for_name(key)
            .ok_or_else(|| ContainerError::UnknownType { key: key.to_string() })?;
        self.resolve(&service)
    }

    /// Map a full type name to a type the container has seen.
    pub fn type_for_name(&self, name: &str) -> Option<ServiceType> {
        let parsed = TypeName::parse(name)?;
        self.storage().lookup(&parsed)
    }

    /// Resolve `service` and downcast it to `T`.
    pub fn get<T: Injectable>(&self, service: &ServiceType) -> Result<Arc<T>> {
        let instance = self.resolve(service)?;
        instance
            .downcast::<T>()
            .ok_or_else(|| ContainerError::TypeMismatch {
                service: service.full_name(),
                expected: std::any::type_name::<T>(),
            })
    }

    /// Resolve an abstract `dyn Trait` service, held as `Arc<dyn Trait>`.
    pub fn get_dyn<S: ?Sized + Send + Sync + 'static>(&self, service: &ServiceType) -> Result<Arc<S>> {
        self.get::<Arc<S>>(service).map(|shared| Arc::clone(&*shared))
    }

    /// Resolve the service registered under `T`'s own type.
    #[inline]
    pub fn get_concrete<T: Injectable>(&self) -> Result<Arc<T>> {
        self.get::<T>(&ServiceType::of::<T>())
    }

    /// Resolve by full type name and downcast to `T`.
    pub fn get_by_key<T: Injectable>(&self, key: &str) -> Result<Arc<T>> {
        let instance = self.resolve_key(key)?;
        instance
            .downcast::<T>()
            .ok_or_else(|| ContainerError::TypeMismatch {
                service: key.to_string(),
                expected: std::any::type_name::<T>(),
            })
    }

    /// Try to resolve, returning None on any failure.
    #[inline]
    pub fn try_get<T: Injectable>(&self, service: &ServiceType) -> Option<Arc<T>> {
        self.get::<T>(service).ok()
    }

    fn dispatch(&self, service: &ServiceType, registration: Registration) -> Result<Instance> {
        match registration.strategy {
            Strategy::Fixed => self
                .storage()
                .cached(service)
                .ok_or_else(|| ContainerError::not_found(service)),
            Strategy::Singleton(component) => {
                if let Some(instance) = self.storage().cached(service) {
                    #[cfg(feature = "logging")]
                    trace!(
                        target: "service_container",
                        service = %service,
                        key = %registration.key,
                        "Returning cached singleton"
                    );
                    return Ok(instance);
                }

                let instance = self.create_instance(service, &component)?;
                let (instance, inserted) = self.storage().cache_if_absent(service.clone(), instance);
                if inserted {
                    start_instance(&instance, service)?;
                }
                Ok(instance)
            }
            Strategy::Transient(component) => self.create_instance(service, &component),
        }
    }

    /// Build one instance of `component` for the requested `service`.
    fn create_instance(&self, service: &ServiceType, component: &ComponentDescriptor) -> Result<Instance> {
        let _guard = self.enter_construction(service)?;

        let component = component.specialize(service.type_arguments())?;
        let storage = self.storage();

        let constructor = match select_constructor(component.constructors(), |p| storage.can_resolve(p)) {
            Selection::Found(constructor) => constructor,
            Selection::Unsatisfied(missing) => {
                #[cfg(feature = "logging")]
                debug!(
                    target: "service_container",
                    implementation = %component.implementation(),
                    missing = missing.len(),
                    "No resolvable constructor"
                );
                return Err(ContainerError::NoResolvableConstructor {
                    implementation: component.implementation().full_name(),
                    missing,
                });
            }
        };

        let values = constructor
            .parameters()
            .iter()
            .map(|parameter| self.resolve(parameter))
            .collect::<Result<Vec<_>>>()?;

        let arguments = Arguments::new(self, constructor.parameters(), values);
        let instance = constructor.invoke(&arguments)?;

        #[cfg(feature = "logging")]
        debug!(
            target: "service_container",
            service = %service,
            implementation = %component.implementation(),
            parameters = constructor.parameters().len(),
            "Constructed component"
        );

        storage.remember(component.implementation());
        Ok(instance)
    }

    fn enter_construction(&self, service: &ServiceType) -> Result<Option<ConstructionGuard>> {
        if !self.inner.config.cycle_detection() {
            return Ok(None);
        }

        let owner = Arc::as_ptr(&self.inner) as usize;
        CONSTRUCTION_STACK.with(|stack| {
            let mut stack = stack.borrow_mut();

            if let Some(start) = stack
                .iter()
                .position(|(o, pending)| *o == owner && pending == service)
            {
                let mut chain: Vec<ServiceType> = stack[start..]
                    .iter()
                    .filter(|(o, _)| *o == owner)
                    .map(|(_, pending)| pending.clone())
                    .collect();
                chain.push(service.clone());

                #[cfg(feature = "logging")]
                debug!(
                    target: "service_container",
                    service = %service,
                    depth = chain.len(),
                    "Circular dependency detected"
                );
                return Err(ContainerError::CircularDependency { chain });
            }

            stack.push((owner, service.clone()));
            Ok(Some(ConstructionGuard))
        })
    }

    // =========================================================================
    // Lifecycle Methods
    // =========================================================================

    /// Remove `instance` from the instance cache.
    ///
    /// The next singleton resolve of its service type builds a new instance.
    /// No teardown hook runs; unknown instances are ignored.
    pub fn release(&self, instance: &Instance) {
        let removed = self.storage().remove_instance(instance);

        #[cfg(feature = "logging")]
        if let Some(service) = removed {
            debug!(
                target: "service_container",
                service = %service,
                "Released instance"
            );
        }
        #[cfg(not(feature = "logging"))]
        let _ = removed;
    }

    /// Construct and start every auto-start component that has no live instance.
    ///
    /// Components are visited in registration order. Stops at the first error.
    pub fn start_all(&self) -> Result<()> {
        let registrations = self.storage().registrations();

        #[cfg(feature = "logging")]
        debug!(
            target: "service_container",
            registrations = registrations.len(),
            "Starting auto-start components"
        );

        for (service, registration) in registrations {
            let Some(component) = registration.strategy.component() else {
                continue;
            };
            if !component.is_auto_start() || self.storage().cached(&service).is_some() {
                continue;
            }

            let instance = self.create_instance(&service, component)?;
            let (instance, inserted) = self.storage().cache_if_absent(service.clone(), instance);
            if inserted {
                start_instance(&instance, &service)?;
            }
        }
        Ok(())
    }

    /// Cached auto-start instances, in registration order.
    ///
    /// Pass the result to [`stop_all`](crate::lifecycle::stop_all) on shutdown.
    pub fn started_components(&self) -> Vec<Instance> {
        self.storage()
            .registrations()
            .into_iter()
            .filter_map(|(service, _)| self.storage().cached(&service))
            .filter(Instance::is_auto_start)
            .collect()
    }

    // =========================================================================
    // Query Methods
    // =========================================================================

    /// Check if `service` has a strategy of its own or via its generic definition.
    #[inline]
    pub fn contains(&self, service: &ServiceType) -> bool {
        self.storage().can_resolve(service)
    }

    /// Lifestyle of the strategy registered for exactly `service`.
    pub fn lifestyle(&self, service: &ServiceType) -> Option<Lifestyle> {
        self.storage()
            .registration(service)
            .map(|registration| registration.strategy.lifestyle())
    }

    /// Key the strategy for exactly `service` was registered under.
    pub fn registration_key(&self, service: &ServiceType) -> Option<String> {
        self.storage()
            .registration(service)
            .map(|registration| registration.key.to_string())
    }

    /// Number of registered service types.
    #[inline]
    pub fn len(&self) -> usize {
        self.storage().len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.storage().is_empty()
    }

    /// Registered service types, in registration order.
    pub fn registered_types(&self) -> Vec<ServiceType> {
        self.storage()
            .registrations()
            .into_iter()
            .map(|(service, _)| service)
            .collect()
    }
}

impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Container")
            .field("storage", &self.inner.storage)
            .field("config", &self.inner.config)
            .finish()
    }
}
