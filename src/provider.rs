//! Provider traits and instance handles
//!
//! These types define what can be injected, how long it lives, and how a
//! constructed value travels through the container once its static type has
//! been erased.

use crate::AutoStart;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Marker trait for types that can be held by the container.
///
/// This is automatically implemented for all types that are `Send + Sync + 'static`.
/// You never need to implement this manually.
///
/// # Examples
///
/// ```rust
/// // Any type that is Send + Sync + 'static works automatically
/// #[derive(Clone)]
/// struct MailSender {
///     relay: String,
/// }
///
/// // No impl needed - it just works!
/// ```
pub trait Injectable: Send + Sync + 'static {}

// Blanket implementation - everything that's Send + Sync + 'static is Injectable
impl<T: Send + Sync + 'static> Injectable for T {}

/// Service lifestyle
///
/// `register_type` only distinguishes transient from everything else; any
/// non-transient lifestyle installs a singleton strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Lifestyle {
    /// One instance per concrete service type, built on first resolve
    #[default]
    Singleton,

    /// New instance built on every resolve, never cached
    Transient,

    /// A caller-supplied instance registered with `register_instance`
    FixedInstance,
}

// =============================================================================
// Instance
// =============================================================================

/// A type-erased, shared service instance.
///
/// Cloning an `Instance` clones the handle, not the value. Two handles are the
/// same instance when [`Instance::ptr_eq`] holds.
#[derive(Clone)]
pub struct Instance {
    value: Arc<dyn Any + Send + Sync>,
    lifecycle: Option<Arc<dyn AutoStart>>,
    type_name: &'static str,
}

impl Instance {
    /// Wrap a plain value.
    #[inline]
    pub fn new<T: Injectable>(value: T) -> Self {
        Self::from_arc(Arc::new(value))
    }

    /// Wrap an already shared value.
    #[inline]
    pub fn from_arc<T: Injectable>(value: Arc<T>) -> Self {
        Self {
            value,
            lifecycle: None,
            type_name: std::any::type_name::<T>(),
        }
    }

    /// Wrap a lifecycle-managed value. Registering or constructing it through
    /// the container invokes its start hook.
    #[inline]
    pub fn startable<T: Injectable + AutoStart>(value: T) -> Self {
        Self::startable_arc(Arc::new(value))
    }

    /// Shared variant of [`Instance::startable`].
    pub fn startable_arc<T: Injectable + AutoStart>(value: Arc<T>) -> Self {
        let lifecycle: Arc<dyn AutoStart> = value.clone();
        Self {
            value,
            lifecycle: Some(lifecycle),
            type_name: std::any::type_name::<T>(),
        }
    }

    /// Lifecycle-managed value exposed through a shared handle of another type.
    ///
    /// The instance holds the `Arc<S>` returned by `upcast`, so consumers of an
    /// abstract `dyn Trait` service see `Arc<dyn Trait>`, while the start hook
    /// still runs on the concrete `T`.
    pub fn startable_as<T, S>(value: Arc<T>, upcast: impl FnOnce(Arc<T>) -> Arc<S>) -> Self
    where
        T: Injectable + AutoStart,
        S: ?Sized + Send + Sync + 'static,
    {
        let lifecycle: Arc<dyn AutoStart> = value.clone();
        Self {
            value: Arc::new(upcast(value)),
            lifecycle: Some(lifecycle),
            type_name: std::any::type_name::<Arc<S>>(),
        }
    }

    /// Downcast to the concrete type.
    #[inline]
    pub fn downcast<T: Injectable>(&self) -> Option<Arc<T>> {
        Arc::clone(&self.value).downcast::<T>().ok()
    }

    /// True when the held value is a `T`.
    #[inline]
    pub fn is<T: Injectable>(&self) -> bool {
        self.value.is::<T>()
    }

    /// Pointer identity.
    #[inline]
    pub fn ptr_eq(&self, other: &Instance) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.value), Arc::as_ptr(&other.value))
    }

    /// Whether this instance carries the auto-start capability.
    #[inline]
    pub fn is_auto_start(&self) -> bool {
        self.lifecycle.is_some()
    }

    /// Lifecycle view of the same allocation, if the value is auto-start.
    #[inline]
    pub fn as_auto_start(&self) -> Option<&Arc<dyn AutoStart>> {
        self.lifecycle.as_ref()
    }

    /// Rust type name of the held value.
    #[inline]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("type_name", &self.type_name)
            .field("auto_start", &self.is_auto_start())
            .finish()
    }
}
