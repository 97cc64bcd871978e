//! Catalog-driven registration
//!
//! A [`TypeFinder`] yields every component the application knows about along
//! with the services each one declares. [`ServiceRegistrator`] is an
//! auto-start component: once the container starts it, it registers every
//! declared service as a singleton.
//!
//! ```rust
//! use service_container::{
//!     CatalogEntry, ComponentDescriptor, Container, ServiceDeclaration, ServiceRegistrator,
//!     ServiceType, StaticTypeCatalog,
//! };
//! use std::sync::Arc;
//!
//! struct SmtpMailer;
//!
//! let catalog = StaticTypeCatalog::new().with(
//!     CatalogEntry::new(
//!         ComponentDescriptor::builder::<SmtpMailer>()
//!             .constructor([], |_| Ok(SmtpMailer))
//!             .build(),
//!     )
//!     .service(ServiceDeclaration::new()),
//! );
//!
//! let container = Container::new();
//! ServiceRegistrator::install(&container, Arc::new(catalog)).unwrap();
//!
//! assert!(container.get_concrete::<SmtpMailer>().is_ok());
//! ```

use crate::{
    AutoStart, Component, ComponentDescriptor, Container, ContainerError, Instance, Lifestyle,
    Result, ServiceType, WeakContainer,
};
use std::sync::Arc;

#[cfg(feature = "logging")]
use tracing::{debug, trace};

/// A service a component declares it provides.
///
/// Both parts are optional: the service type defaults to the component's own
/// type and the key defaults to the service type's full name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceDeclaration {
    service_type: Option<ServiceType>,
    key: Option<String>,
}

impl ServiceDeclaration {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register under `service_type` instead of the component type.
    pub fn service_type(mut self, service_type: ServiceType) -> Self {
        self.service_type = Some(service_type);
        self
    }

    /// Register under an explicit key.
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// The service type to register, given the declaring component's type.
    pub fn resolve_service_type(&self, component: &ServiceType) -> ServiceType {
        self.service_type
            .clone()
            .unwrap_or_else(|| component.clone())
    }

    /// The registration key for `service`.
    pub fn resolve_key(&self, service: &ServiceType) -> String {
        self.key.clone().unwrap_or_else(|| service.full_name())
    }
}

/// A component found in a type catalog.
#[derive(Debug, Clone)]
pub struct CatalogEntry {
    component: ComponentDescriptor,
    services: Vec<ServiceDeclaration>,
}

impl CatalogEntry {
    pub fn new(component: ComponentDescriptor) -> Self {
        Self {
            component,
            services: Vec::new(),
        }
    }

    /// Add a service declaration.
    pub fn service(mut self, declaration: ServiceDeclaration) -> Self {
        self.services.push(declaration);
        self
    }

    #[inline]
    pub fn component(&self) -> &ComponentDescriptor {
        &self.component
    }

    #[inline]
    pub fn services(&self) -> &[ServiceDeclaration] {
        &self.services
    }

    fn matches(&self, base: &ServiceType) -> bool {
        *base == ServiceType::any()
            || self.component.implementation() == base
            || self
                .services
                .iter()
                .any(|declaration| declaration.service_type.as_ref() == Some(base))
    }
}

/// Source of the application's components.
pub trait TypeFinder: Send + Sync {
    /// Components assignable to `base`. [`ServiceType::any`] matches everything.
    fn find<'a>(&'a self, base: &ServiceType) -> Box<dyn Iterator<Item = CatalogEntry> + 'a>;
}

/// In-memory [`TypeFinder`].
#[derive(Debug, Clone, Default)]
pub struct StaticTypeCatalog {
    entries: Vec<CatalogEntry>,
}

impl StaticTypeCatalog {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`StaticTypeCatalog::push`].
    pub fn with(mut self, entry: CatalogEntry) -> Self {
        self.push(entry);
        self
    }

    pub fn push(&mut self, entry: CatalogEntry) {
        self.entries.push(entry);
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl TypeFinder for StaticTypeCatalog {
    fn find<'a>(&'a self, base: &ServiceType) -> Box<dyn Iterator<Item = CatalogEntry> + 'a> {
        let base = base.clone();
        Box::new(
            self.entries
                .iter()
                .filter(move |entry| entry.matches(&base))
                .cloned(),
        )
    }
}

// =============================================================================
// ServiceRegistrator
// =============================================================================

/// Registers every service declared in a [`TypeFinder`] when started.
pub struct ServiceRegistrator {
    finder: Arc<dyn TypeFinder>,
    container: WeakContainer,
}

impl ServiceRegistrator {
    pub fn new(finder: Arc<dyn TypeFinder>, container: WeakContainer) -> Self {
        Self { finder, container }
    }

    /// Service type under which the finder is registered, holding an
    /// `Arc<dyn TypeFinder>`.
    #[inline]
    pub fn finder_service_type() -> ServiceType {
        ServiceType::of::<dyn TypeFinder>()
    }

    /// Register `finder` and the registrator itself, which runs immediately.
    pub fn install(container: &Container, finder: Arc<dyn TypeFinder>) -> Result<()> {
        container.register_instance(
            "type_finder",
            Self::finder_service_type(),
            Instance::new(finder),
        )?;
        container.register_self("service_registrator", Self::descriptor(), Lifestyle::Singleton)
    }

    /// Register every declared service. Returns how many registrations were made.
    pub fn register_all(&self) -> Result<usize> {
        let container = self.container.upgrade().ok_or_else(|| {
            ContainerError::Internal("service registrator outlived its container".into())
        })?;

        let mut registered = 0;
        for entry in self.finder.find(&ServiceType::any()) {
            for declaration in entry.services() {
                let service = declaration.resolve_service_type(entry.component().implementation());
                let key = declaration.resolve_key(&service);

                #[cfg(feature = "logging")]
                trace!(
                    target: "service_container",
                    key = %key,
                    service = %service,
                    implementation = %entry.component().implementation(),
                    "Registering catalog service"
                );

                container.register_component(key, service, entry.component().clone())?;
                registered += 1;
            }
        }

        #[cfg(feature = "logging")]
        debug!(
            target: "service_container",
            registered,
            "Registered catalog services"
        );

        Ok(registered)
    }
}

impl AutoStart for ServiceRegistrator {
    fn start(&self) -> Result<()> {
        self.register_all().map(|_| ())
    }
}

impl Component for ServiceRegistrator {
    fn descriptor() -> ComponentDescriptor {
        ComponentDescriptor::builder::<Self>()
            .constructor([Self::finder_service_type()], |args| {
                Ok(Self::new(args.get_dyn(0)?, args.container().downgrade()))
            })
            .auto_start()
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    trait Mailer: Send + Sync {
        fn relay(&self) -> &str;
    }

    struct SmtpMailer;
    impl Mailer for SmtpMailer {
        fn relay(&self) -> &str {
            "smtp"
        }
    }

    struct Newsletter {
        mailer: Arc<dyn Mailer>,
    }

    struct Indexer {
        starts: Arc<AtomicUsize>,
    }

    impl AutoStart for Indexer {
        fn start(&self) -> Result<()> {
            self.starts.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn mailer_type() -> ServiceType {
        ServiceType::of::<dyn Mailer>()
    }

    fn catalog(starts: &Arc<AtomicUsize>) -> StaticTypeCatalog {
        let starts = Arc::clone(starts);
        StaticTypeCatalog::new()
            .with(
                CatalogEntry::new(
                    ComponentDescriptor::builder::<Arc<dyn Mailer>>()
                        .constructor([], |_| Ok(Arc::new(SmtpMailer) as Arc<dyn Mailer>))
                        .build(),
                )
                .service(ServiceDeclaration::new().service_type(mailer_type()).key("mailer")),
            )
            .with(
                CatalogEntry::new(
                    ComponentDescriptor::builder::<Newsletter>()
                        .constructor([mailer_type()], |args| {
                            Ok(Newsletter {
                                mailer: args.get_dyn(0)?,
                            })
                        })
                        .build(),
                )
                .service(ServiceDeclaration::new()),
            )
            .with(CatalogEntry::new(
                ComponentDescriptor::builder::<u64>()
                    .constructor([], |_| Ok(0u64))
                    .build(),
            ))
            .with(
                CatalogEntry::new(
                    ComponentDescriptor::builder::<Indexer>()
                        .constructor([], move |_| {
                            Ok(Indexer {
                                starts: Arc::clone(&starts),
                            })
                        })
                        .auto_start()
                        .build(),
                )
                .service(ServiceDeclaration::new()),
            )
    }

    #[test]
    fn test_declaration_defaults() {
        let component = ServiceType::of::<SmtpMailer>();
        let declaration = ServiceDeclaration::new();

        let service = declaration.resolve_service_type(&component);
        assert_eq!(service, component);
        assert_eq!(declaration.resolve_key(&service), component.full_name());

        let explicit = ServiceDeclaration::new().service_type(mailer_type()).key("m");
        assert_eq!(explicit.resolve_service_type(&component), mailer_type());
        assert_eq!(explicit.resolve_key(&mailer_type()), "m");
    }

    #[test]
    fn test_catalog_filters_by_base() {
        let starts = Arc::new(AtomicUsize::new(0));
        let catalog = catalog(&starts);

        assert_eq!(catalog.find(&ServiceType::any()).count(), 4);
        assert_eq!(catalog.find(&mailer_type()).count(), 1);
        assert_eq!(catalog.find(&ServiceType::of::<Newsletter>()).count(), 1);
        assert_eq!(catalog.find(&ServiceType::of::<String>()).count(), 0);
    }

    #[test]
    fn test_install_registers_catalog() {
        let starts = Arc::new(AtomicUsize::new(0));
        let container = Container::new();

        ServiceRegistrator::install(&container, Arc::new(catalog(&starts))).unwrap();

        let newsletter = container.get_concrete::<Newsletter>().unwrap();
        assert_eq!(newsletter.mailer.relay(), "smtp");
        assert_eq!(container.registration_key(&mailer_type()).as_deref(), Some("mailer"));
        assert!(!container.contains(&ServiceType::of::<u64>()));
        assert_eq!(starts.load(Ordering::SeqCst), 1);
        assert!(container.contains(&ServiceType::of::<ServiceRegistrator>()));
    }

    trait Crawler: Send + Sync {
        fn pages(&self) -> usize;
    }

    impl Crawler for Indexer {
        fn pages(&self) -> usize {
            self.starts.load(Ordering::SeqCst)
        }
    }

    #[test]
    fn test_auto_start_entry_under_declared_service() {
        let starts = Arc::new(AtomicUsize::new(0));
        let shared = Arc::clone(&starts);
        let crawler_type = ServiceType::of::<dyn Crawler>();
        let catalog = StaticTypeCatalog::new().with(
            CatalogEntry::new(
                ComponentDescriptor::builder::<Indexer>()
                    .constructor([], move |_| {
                        Ok(Indexer {
                            starts: Arc::clone(&shared),
                        })
                    })
                    .auto_start_as(|indexer| indexer as Arc<dyn Crawler>)
                    .build(),
            )
            .service(ServiceDeclaration::new().service_type(crawler_type.clone())),
        );

        let container = Container::new();
        ServiceRegistrator::install(&container, Arc::new(catalog)).unwrap();

        assert_eq!(starts.load(Ordering::SeqCst), 1);
        let crawler = container.get_dyn::<dyn Crawler>(&crawler_type).unwrap();
        assert_eq!(crawler.pages(), 1);
        assert_eq!(
            container.registration_key(&crawler_type),
            Some(crawler_type.full_name())
        );
    }

    #[test]
    fn test_registrator_needs_live_container() {
        let starts = Arc::new(AtomicUsize::new(0));
        let registrator = {
            let container = Container::new();
            ServiceRegistrator::new(Arc::new(catalog(&starts)), container.downgrade())
        };

        let err = registrator.start().unwrap_err();
        assert!(matches!(err, ContainerError::Internal(_)));
    }

    #[test]
    fn test_registrator_as_deferred_component() {
        let starts = Arc::new(AtomicUsize::new(0));
        let container = Container::new();

        container
            .register_self("registrator", ServiceRegistrator::descriptor(), Lifestyle::Singleton)
            .unwrap();
        assert!(!container.contains(&mailer_type()));

        container
            .register_instance(
                "finder",
                ServiceRegistrator::finder_service_type(),
                Instance::new(Arc::new(catalog(&starts)) as Arc<dyn TypeFinder>),
            )
            .unwrap();
        container.start_all().unwrap();

        assert!(container.contains(&mailer_type()));
        assert_eq!(starts.load(Ordering::SeqCst), 1);
    }
}
