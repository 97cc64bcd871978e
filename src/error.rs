//! Error types for the service container

use crate::ServiceType;
use thiserror::Error;

/// Errors that can occur while registering, resolving or starting services
#[derive(Error, Debug, Clone)]
pub enum ContainerError {
    /// No strategy is registered for the service type or its generic definition
    #[error("Couldn't find any service of the type {service}")]
    ServiceNotFound { service: String },

    /// A key could not be parsed into a type the container knows about
    #[error("Unknown service type name: {key}")]
    UnknownType { key: String },

    /// None of the implementation's constructors can be satisfied
    #[error("{}", render_missing(.implementation, .missing))]
    NoResolvableConstructor {
        implementation: String,
        missing: Vec<ServiceType>,
    },

    /// An open generic implementation could not be specialized
    #[error("Cannot specialize {implementation}: {reason}")]
    Specialization {
        implementation: String,
        reason: String,
    },

    /// A service type was revisited while it was still being constructed
    #[error("Circular dependency detected: {}", render_chain(.chain))]
    CircularDependency { chain: Vec<ServiceType> },

    /// The resolved instance is not of the requested Rust type
    #[error("Service {service} is not a {expected}")]
    TypeMismatch {
        service: String,
        expected: &'static str,
    },

    /// The operation is intentionally not provided by this container
    #[error("{operation} is not supported by this container")]
    Unsupported { operation: &'static str },

    /// Internal error
    #[error("Internal container error: {0}")]
    Internal(String),
}

impl ContainerError {
    /// Create a ServiceNotFound error for a service type
    #[inline]
    pub fn not_found(service: &ServiceType) -> Self {
        Self::ServiceNotFound {
            service: service.full_name(),
        }
    }

    /// Create an Unsupported error
    #[inline]
    pub fn unsupported(operation: &'static str) -> Self {
        Self::Unsupported { operation }
    }

    /// True for the "service not found" family: nothing matched the request.
    pub fn is_resolution_error(&self) -> bool {
        matches!(self, Self::ServiceNotFound { .. } | Self::UnknownType { .. })
    }

    /// True when an implementation had no fully satisfiable constructor.
    pub fn is_construction_error(&self) -> bool {
        matches!(self, Self::NoResolvableConstructor { .. })
    }

    /// Missing parameter types carried by a construction error.
    pub fn missing_parameters(&self) -> &[ServiceType] {
        match self {
            Self::NoResolvableConstructor { missing, .. } => missing,
            _ => &[],
        }
    }
}

fn render_missing(implementation: &str, missing: &[ServiceType]) -> String {
    let mut message = format!("Could not find resolvable constructor for class {implementation}");
    for parameter in missing {
        message.push_str("\nCould not resolve ");
        message.push_str(&parameter.full_name());
    }
    message
}

fn render_chain(chain: &[ServiceType]) -> String {
    chain
        .iter()
        .map(ServiceType::full_name)
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// Result type alias for container operations
pub type Result<T> = std::result::Result<T, ContainerError>;
