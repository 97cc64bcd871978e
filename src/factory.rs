//! Component descriptors and resolution strategies
//!
//! A [`ComponentDescriptor`] is the container's substitute for reflection: it
//! names the implementation type, lists its constructors with their parameter
//! service types, and records whether the component is auto-start. Open
//! generic implementations carry a specializer instead, which produces a
//! closed descriptor once concrete type arguments are known.
//!
//! ```rust
//! use service_container::{ComponentDescriptor, ServiceType};
//! use std::sync::Arc;
//!
//! struct Database;
//! struct Reports {
//!     db: Arc<Database>,
//! }
//!
//! let descriptor = ComponentDescriptor::builder::<Reports>()
//!     .constructor([ServiceType::of::<Database>()], |args| {
//!         Ok(Reports { db: args.get(0)? })
//!     })
//!     .build();
//!
//! assert_eq!(descriptor.constructors().len(), 1);
//! assert!(!descriptor.is_auto_start());
//! ```

use crate::{AutoStart, Container, ContainerError, Injectable, Instance, Lifestyle, Result, ServiceType};
use std::fmt;
use std::sync::Arc;

#[cfg(feature = "logging")]
use tracing::trace;

/// Types that describe how the container builds them.
///
/// Usually derived with `#[derive(Component)]` (feature `derive`).
pub trait Component: Injectable {
    /// The descriptor used to register this type.
    fn descriptor() -> ComponentDescriptor;
}

// =============================================================================
// Arguments
// =============================================================================

/// Resolved constructor arguments, in declaration order.
pub struct Arguments<'a> {
    container: &'a Container,
    parameters: &'a [ServiceType],
    values: Vec<Instance>,
}

impl<'a> Arguments<'a> {
    pub(crate) fn new(
        container: &'a Container,
        parameters: &'a [ServiceType],
        values: Vec<Instance>,
    ) -> Self {
        Self {
            container,
            parameters,
            values,
        }
    }

    /// The argument at `index`, downcast to `T`.
    ///
    /// # Errors
    ///
    /// `TypeMismatch` when the resolved instance is not a `T`, `Internal` when
    /// `index` is out of range.
    pub fn get<T: Injectable>(&self, index: usize) -> Result<Arc<T>> {
        self.instance(index)?
            .downcast::<T>()
            .ok_or_else(|| ContainerError::TypeMismatch {
                service: self
                    .parameters
                    .get(index)
                    .map(ServiceType::full_name)
                    .unwrap_or_default(),
                expected: std::any::type_name::<T>(),
            })
    }

    /// The argument at `index` for an abstract `dyn Trait` parameter.
    ///
    /// Such services are held as `Arc<dyn Trait>`; this returns that handle.
    pub fn get_dyn<S: ?Sized + Send + Sync + 'static>(&self, index: usize) -> Result<Arc<S>> {
        self.get::<Arc<S>>(index).map(|shared| Arc::clone(&*shared))
    }

    /// The type-erased argument at `index`.
    pub fn instance(&self, index: usize) -> Result<&Instance> {
        self.values.get(index).ok_or_else(|| {
            ContainerError::Internal(format!(
                "constructor argument {index} out of range ({} declared)",
                self.values.len()
            ))
        })
    }

    /// The container performing the construction.
    #[inline]
    pub fn container(&self) -> &'a Container {
        self.container
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

// =============================================================================
// Constructor
// =============================================================================

type BuildFn = Arc<dyn Fn(&Arguments<'_>) -> Result<Instance> + Send + Sync>;

/// One way of building an implementation: parameter types plus a build function.
#[derive(Clone)]
pub struct Constructor {
    parameters: Vec<ServiceType>,
    build: BuildFn,
}

impl Constructor {
    /// Parameter service types, in order.
    #[inline]
    pub fn parameters(&self) -> &[ServiceType] {
        &self.parameters
    }

    #[inline]
    pub(crate) fn invoke(&self, arguments: &Arguments<'_>) -> Result<Instance> {
        (self.build)(arguments)
    }
}

impl fmt::Debug for Constructor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Constructor")
            .field("parameters", &self.parameters)
            .finish()
    }
}

// =============================================================================
// ComponentDescriptor
// =============================================================================

type SpecializeFn = Arc<dyn Fn(&[ServiceType]) -> Result<ComponentDescriptor> + Send + Sync>;

/// How to build one implementation type.
#[derive(Clone)]
pub struct ComponentDescriptor {
    implementation: ServiceType,
    kind: DescriptorKind,
}

#[derive(Clone)]
enum DescriptorKind {
    Closed {
        constructors: Arc<[Constructor]>,
        auto_start: bool,
    },
    Open {
        specialize: SpecializeFn,
    },
}

impl ComponentDescriptor {
    /// Start building a closed descriptor for `T`.
    #[inline]
    pub fn builder<T: Injectable>() -> DescriptorBuilder<T> {
        DescriptorBuilder::new()
    }

    /// The descriptor a [`Component`] declares for itself.
    #[inline]
    pub fn of<C: Component>() -> Self {
        C::descriptor()
    }

    /// An open generic implementation.
    ///
    /// `definition` is the unbound implementation type; `specialize` receives
    /// the concrete type arguments of the requested service and returns the
    /// closed descriptor for that instantiation.
    pub fn open_generic<F>(definition: ServiceType, specialize: F) -> Self
    where
        F: Fn(&[ServiceType]) -> Result<ComponentDescriptor> + Send + Sync + 'static,
    {
        Self {
            implementation: definition,
            kind: DescriptorKind::Open {
                specialize: Arc::new(specialize),
            },
        }
    }

    /// The implementation type.
    #[inline]
    pub fn implementation(&self) -> &ServiceType {
        &self.implementation
    }

    /// Declared constructors; empty for open generic descriptors.
    pub fn constructors(&self) -> &[Constructor] {
        match &self.kind {
            DescriptorKind::Closed { constructors, .. } => constructors,
            DescriptorKind::Open { .. } => &[],
        }
    }

    /// Whether instances built from this descriptor are auto-start.
    pub fn is_auto_start(&self) -> bool {
        matches!(
            self.kind,
            DescriptorKind::Closed {
                auto_start: true,
                ..
            }
        )
    }

    #[inline]
    pub fn is_open_generic(&self) -> bool {
        matches!(self.kind, DescriptorKind::Open { .. })
    }

    /// Close an open generic descriptor over `arguments`.
    ///
    /// Closed descriptors are returned unchanged.
    pub fn specialize(&self, arguments: &[ServiceType]) -> Result<ComponentDescriptor> {
        let DescriptorKind::Open { specialize } = &self.kind else {
            return Ok(self.clone());
        };

        if arguments.is_empty() {
            return Err(ContainerError::Specialization {
                implementation: self.implementation.full_name(),
                reason: "no type arguments supplied by the requested service".into(),
            });
        }

        #[cfg(feature = "logging")]
        trace!(
            target: "service_container",
            implementation = %self.implementation,
            arguments = arguments.len(),
            "Specializing open generic implementation"
        );

        let closed = specialize(arguments)?;
        if closed.is_open_generic() {
            return Err(ContainerError::Specialization {
                implementation: self.implementation.full_name(),
                reason: "specializer returned another open descriptor".into(),
            });
        }
        Ok(closed)
    }
}

impl fmt::Debug for ComponentDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentDescriptor")
            .field("implementation", &self.implementation)
            .field("constructors", &self.constructors().len())
            .field("auto_start", &self.is_auto_start())
            .field("open_generic", &self.is_open_generic())
            .finish()
    }
}

// =============================================================================
// DescriptorBuilder
// =============================================================================

type TypedBuildFn<T> = Arc<dyn Fn(&Arguments<'_>) -> Result<T> + Send + Sync>;
type WrapFn<T> = Arc<dyn Fn(T) -> Instance + Send + Sync>;

/// Builder for closed descriptors.
pub struct DescriptorBuilder<T> {
    implementation: ServiceType,
    constructors: Vec<(Vec<ServiceType>, TypedBuildFn<T>)>,
    wrap: WrapFn<T>,
    auto_start: bool,
}

impl<T: Injectable> DescriptorBuilder<T> {
    fn new() -> Self {
        Self {
            implementation: ServiceType::of::<T>(),
            constructors: Vec::new(),
            wrap: Arc::new(Instance::new::<T>),
            auto_start: false,
        }
    }

    /// Override the implementation type, e.g. to name a bound generic.
    pub fn implementation_type(mut self, implementation: ServiceType) -> Self {
        self.implementation = implementation;
        self
    }

    /// Declare a constructor.
    pub fn constructor<I, F>(mut self, parameters: I, build: F) -> Self
    where
        I: IntoIterator<Item = ServiceType>,
        F: Fn(&Arguments<'_>) -> Result<T> + Send + Sync + 'static,
    {
        self.constructors
            .push((parameters.into_iter().collect(), Arc::new(build)));
        self
    }

    pub fn build(self) -> ComponentDescriptor {
        let wrap = self.wrap;
        let constructors: Arc<[Constructor]> = self
            .constructors
            .into_iter()
            .map(|(parameters, build)| {
                let wrap = Arc::clone(&wrap);
                Constructor {
                    parameters,
                    build: Arc::new(move |arguments: &Arguments<'_>| {
                        build(arguments).map(|value| wrap(value))
                    }),
                }
            })
            .collect();

        ComponentDescriptor {
            implementation: self.implementation,
            kind: DescriptorKind::Closed {
                constructors,
                auto_start: self.auto_start,
            },
        }
    }
}

impl<T: Injectable + AutoStart> DescriptorBuilder<T> {
    /// Mark the component as auto-start.
    pub fn auto_start(mut self) -> Self {
        let wrap: WrapFn<T> = Arc::new(Instance::startable::<T>);
        self.wrap = wrap;
        self.auto_start = true;
        self
    }

    /// Mark the component as auto-start and hand out instances as `Arc<S>`.
    ///
    /// Use this when the component is registered under an abstract
    /// `dyn Trait` service: consumers receive the `Arc<dyn Trait>` produced by
    /// `upcast`, and the start hook runs on the concrete `T`.
    ///
    /// ```rust
    /// use service_container::prelude::*;
    ///
    /// trait Listener: Send + Sync {
    ///     fn port(&self) -> u16;
    /// }
    ///
    /// struct TcpListener;
    ///
    /// impl Listener for TcpListener {
    ///     fn port(&self) -> u16 { 8080 }
    /// }
    ///
    /// impl AutoStart for TcpListener {
    ///     fn start(&self) -> Result<()> { Ok(()) }
    /// }
    ///
    /// let container = Container::new();
    /// container.register_component(
    ///     "listener",
    ///     ServiceType::of::<dyn Listener>(),
    ///     ComponentDescriptor::builder::<TcpListener>()
    ///         .constructor([], |_| Ok(TcpListener))
    ///         .auto_start_as(|listener| listener as Arc<dyn Listener>)
    ///         .build(),
    /// )?;
    ///
    /// let listener = container.get_dyn::<dyn Listener>(&ServiceType::of::<dyn Listener>())?;
    /// assert_eq!(listener.port(), 8080);
    /// # Ok::<(), ContainerError>(())
    /// ```
    pub fn auto_start_as<S, F>(mut self, upcast: F) -> Self
    where
        S: ?Sized + Send + Sync + 'static,
        F: Fn(Arc<T>) -> Arc<S> + Send + Sync + 'static,
    {
        let wrap: WrapFn<T> =
            Arc::new(move |value: T| Instance::startable_as(Arc::new(value), &upcast));
        self.wrap = wrap;
        self.auto_start = true;
        self
    }
}

// =============================================================================
// Strategy
// =============================================================================

/// How a registered service type is resolved.
#[derive(Clone)]
pub(crate) enum Strategy {
    /// Built once per concrete service type, then cached
    Singleton(ComponentDescriptor),
    /// Built on every resolve
    Transient(ComponentDescriptor),
    /// Served from the instance cache only
    Fixed,
}

impl Strategy {
    pub(crate) fn new(component: ComponentDescriptor, lifestyle: Lifestyle) -> Self {
        match lifestyle {
            Lifestyle::Transient => Strategy::Transient(component),
            Lifestyle::Singleton | Lifestyle::FixedInstance => Strategy::Singleton(component),
        }
    }

    #[inline]
    pub(crate) fn lifestyle(&self) -> Lifestyle {
        match self {
            Strategy::Singleton(_) => Lifestyle::Singleton,
            Strategy::Transient(_) => Lifestyle::Transient,
            Strategy::Fixed => Lifestyle::FixedInstance,
        }
    }

    #[inline]
    pub(crate) fn component(&self) -> Option<&ComponentDescriptor> {
        match self {
            Strategy::Singleton(component) | Strategy::Transient(component) => Some(component),
            Strategy::Fixed => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Engine;

    struct Car {
        engine: Arc<Engine>,
    }

    struct Starter;

    impl AutoStart for Starter {
        fn start(&self) -> Result<()> {
            Ok(())
        }
    }

    struct ListDef;

    struct List {
        item: ServiceType,
    }

    fn car() -> ComponentDescriptor {
        ComponentDescriptor::builder::<Car>()
            .constructor([ServiceType::of::<Engine>()], |args| {
                Ok(Car {
                    engine: args.get(0)?,
                })
            })
            .constructor([], |_| Ok(Car { engine: Arc::new(Engine) }))
            .build()
    }

    #[test]
    fn test_builder_records_constructors() {
        let descriptor = car();
        assert_eq!(descriptor.implementation(), &ServiceType::of::<Car>());
        assert_eq!(descriptor.constructors().len(), 2);
        assert_eq!(descriptor.constructors()[0].parameters(), &[ServiceType::of::<Engine>()]);
        assert!(descriptor.constructors()[1].parameters().is_empty());
        assert!(!descriptor.is_auto_start());
        assert!(!descriptor.is_open_generic());
    }

    #[test]
    fn test_invoke_builds_instance() {
        let container = Container::new();
        let descriptor = car();
        let constructor = &descriptor.constructors()[0];
        let arguments = Arguments::new(
            &container,
            constructor.parameters(),
            vec![Instance::new(Engine)],
        );

        let instance = constructor.invoke(&arguments).unwrap();
        let car = instance.downcast::<Car>().unwrap();
        assert!(arguments.get::<Engine>(0).is_ok());
        let _ = &car.engine;
    }

    #[test]
    fn test_argument_type_mismatch() {
        let container = Container::new();
        let parameters = [ServiceType::of::<Engine>()];
        let arguments = Arguments::new(&container, &parameters, vec![Instance::new(5u8)]);

        let err = arguments.get::<Engine>(0).err().unwrap();
        assert!(matches!(err, ContainerError::TypeMismatch { .. }));
        assert!(matches!(
            arguments.instance(3).unwrap_err(),
            ContainerError::Internal(_)
        ));
    }

    trait Horn: Send + Sync {
        fn sound(&self) -> &'static str;
    }

    #[derive(Debug)]
    struct Klaxon;

    impl Horn for Klaxon {
        fn sound(&self) -> &'static str {
            "awooga"
        }
    }

    #[test]
    fn test_get_dyn_unwraps_shared_handle() {
        let container = Container::new();
        let parameters = [ServiceType::of::<dyn Horn>()];
        let arguments = Arguments::new(
            &container,
            &parameters,
            vec![Instance::new(Arc::new(Klaxon) as Arc<dyn Horn>)],
        );

        let horn = arguments.get_dyn::<dyn Horn>(0).unwrap();
        assert_eq!(horn.sound(), "awooga");
        assert!(matches!(
            arguments.get::<Klaxon>(0).unwrap_err(),
            ContainerError::TypeMismatch { .. }
        ));
    }

    impl Horn for Starter {
        fn sound(&self) -> &'static str {
            "beep"
        }
    }

    #[test]
    fn test_auto_start_as_exposes_abstract_handle() {
        let descriptor = ComponentDescriptor::builder::<Starter>()
            .constructor([], |_| Ok(Starter))
            .auto_start_as(|starter| starter as Arc<dyn Horn>)
            .build();
        assert!(descriptor.is_auto_start());
        assert_eq!(descriptor.implementation(), &ServiceType::of::<Starter>());

        let container = Container::new();
        let arguments = Arguments::new(&container, &[], Vec::new());
        let instance = descriptor.constructors()[0].invoke(&arguments).unwrap();
        assert!(instance.is_auto_start());
        assert_eq!(instance.downcast::<Arc<dyn Horn>>().unwrap().sound(), "beep");
    }

    #[test]
    fn test_auto_start_wraps_lifecycle() {
        let descriptor = ComponentDescriptor::builder::<Starter>()
            .constructor([], |_| Ok(Starter))
            .auto_start()
            .build();
        assert!(descriptor.is_auto_start());

        let container = Container::new();
        let arguments = Arguments::new(&container, &[], Vec::new());
        let instance = descriptor.constructors()[0].invoke(&arguments).unwrap();
        assert!(instance.is_auto_start());
    }

    #[test]
    fn test_specialize_open_generic() {
        let definition = ServiceType::definition::<ListDef>(1).named("app::List");
        let open = ComponentDescriptor::open_generic(definition.clone(), move |arguments| {
            let item = arguments[0].clone();
            let implementation = ServiceType::definition::<ListDef>(1)
                .named("app::List")
                .bind([item.clone()])?;
            Ok(ComponentDescriptor::builder::<List>()
                .implementation_type(implementation)
                .constructor([], move |_| Ok(List { item: item.clone() }))
                .build())
        });

        assert!(open.is_open_generic());
        assert!(open.constructors().is_empty());

        let closed = open.specialize(&[ServiceType::of::<u32>()]).unwrap();
        assert!(!closed.is_open_generic());
        assert_eq!(closed.implementation().generic_definition(), Some(definition));

        let err = open.specialize(&[]).unwrap_err();
        assert!(matches!(err, ContainerError::Specialization { .. }));
    }

    #[test]
    fn test_closed_specialize_is_identity() {
        let closed = car().specialize(&[ServiceType::of::<u8>()]).unwrap();
        assert_eq!(closed.implementation(), &ServiceType::of::<Car>());
        assert_eq!(closed.constructors().len(), 2);
    }

    #[test]
    fn test_strategy_lifestyle() {
        assert_eq!(Strategy::new(car(), Lifestyle::Transient).lifestyle(), Lifestyle::Transient);
        assert_eq!(Strategy::new(car(), Lifestyle::FixedInstance).lifestyle(), Lifestyle::Singleton);
        assert!(Strategy::Fixed.component().is_none());
    }
}
