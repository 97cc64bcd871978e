//! Runtime service type descriptors
//!
//! Rust has no runtime reflection over generic types, so the container works
//! on explicit descriptors instead. A [`ServiceType`] is a `TypeId` plus a
//! display name, optionally shaped as an *unbound generic definition* (a
//! template with an arity) or a *bound generic* (a definition plus concrete
//! type arguments).
//!
//! ```rust
//! use service_container::ServiceType;
//!
//! struct Order;
//! struct RepositoryDef;
//!
//! let repository = ServiceType::definition::<RepositoryDef>(1).named("app::Repository");
//! let orders = repository.bind([ServiceType::of::<Order>().named("app::Order")]).unwrap();
//!
//! assert!(orders.is_generic());
//! assert_eq!(orders.full_name(), "app::Repository<app::Order>");
//! assert_eq!(orders.generic_definition(), Some(repository));
//! ```

use crate::{ContainerError, Result};
use std::any::{Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Identity of a service or implementation type.
///
/// Equality and hashing use the `TypeId` and the generic shape; the display
/// name is informational only.
#[derive(Clone)]
pub struct ServiceType {
    type_id: TypeId,
    name: &'static str,
    shape: Shape,
}

#[derive(Clone, PartialEq, Eq, Hash)]
enum Shape {
    /// An ordinary, non-generic type
    Plain,
    /// A generic template not yet specialized
    Definition { arity: usize },
    /// A generic template specialized with concrete arguments
    Bound { arguments: Arc<[ServiceType]> },
}

impl ServiceType {
    /// Descriptor for a concrete Rust type (including `dyn Trait`).
    #[inline]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
            shape: Shape::Plain,
        }
    }

    /// Descriptor for an unbound generic definition.
    ///
    /// `D` is a marker type that stands for the template; `arity` is the
    /// number of type arguments it expects.
    #[inline]
    pub fn definition<D: ?Sized + 'static>(arity: usize) -> Self {
        Self {
            type_id: TypeId::of::<D>(),
            name: std::any::type_name::<D>(),
            shape: Shape::Definition { arity },
        }
    }

    /// The catch-all base type used when scanning a type catalog.
    #[inline]
    pub fn any() -> Self {
        Self::of::<dyn Any + Send + Sync>()
    }

    /// Replace the display name.
    #[inline]
    pub fn named(mut self, name: &'static str) -> Self {
        self.name = name;
        self
    }

    /// Specialize an unbound definition with concrete type arguments.
    ///
    /// # Errors
    ///
    /// Fails with [`ContainerError::Specialization`] when `self` is not an
    /// unbound definition or the argument count does not match its arity.
    pub fn bind(&self, arguments: impl IntoIterator<Item = ServiceType>) -> Result<ServiceType> {
        let arguments: Arc<[ServiceType]> = arguments.into_iter().collect();

        match self.shape {
            Shape::Definition { arity } if arity == arguments.len() => Ok(Self {
                type_id: self.type_id,
                name: self.name,
                shape: Shape::Bound { arguments },
            }),
            Shape::Definition { arity } => Err(ContainerError::Specialization {
                implementation: self.full_name(),
                reason: format!("expected {arity} type arguments, got {}", arguments.len()),
            }),
            _ => Err(ContainerError::Specialization {
                implementation: self.full_name(),
                reason: "not an unbound generic definition".into(),
            }),
        }
    }

    /// The underlying `TypeId`.
    #[inline]
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Display name without type arguments.
    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// True for a bound generic (a definition with concrete arguments).
    #[inline]
    pub fn is_generic(&self) -> bool {
        matches!(self.shape, Shape::Bound { .. })
    }

    /// True for an unbound generic definition.
    #[inline]
    pub fn is_generic_definition(&self) -> bool {
        matches!(self.shape, Shape::Definition { .. })
    }

    /// Number of type parameters (definitions) or arguments (bound generics).
    pub fn arity(&self) -> usize {
        match &self.shape {
            Shape::Plain => 0,
            Shape::Definition { arity } => *arity,
            Shape::Bound { arguments } => arguments.len(),
        }
    }

    /// Concrete type arguments of a bound generic; empty otherwise.
    pub fn type_arguments(&self) -> &[ServiceType] {
        match &self.shape {
            Shape::Bound { arguments } => arguments,
            _ => &[],
        }
    }

    /// The unbound definition a bound generic was specialized from.
    pub fn generic_definition(&self) -> Option<ServiceType> {
        match &self.shape {
            Shape::Bound { arguments } => Some(Self {
                type_id: self.type_id,
                name: self.name,
                shape: Shape::Definition {
                    arity: arguments.len(),
                },
            }),
            _ => None,
        }
    }

    /// Full name including type arguments, e.g. `app::Repository<app::Order>`.
    ///
    /// Unbound definitions print their parameters as `_`.
    pub fn full_name(&self) -> String {
        match &self.shape {
            Shape::Plain => self.name.to_string(),
            Shape::Definition { arity } => {
                let holes = vec!["_"; *arity].join(", ");
                format!("{}<{}>", self.name, holes)
            }
            Shape::Bound { arguments } => {
                let arguments: Vec<String> = arguments.iter().map(ServiceType::full_name).collect();
                format!("{}<{}>", self.name, arguments.join(", "))
            }
        }
    }
}

impl PartialEq for ServiceType {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id && self.shape == other.shape
    }
}

impl Eq for ServiceType {}

impl Hash for ServiceType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_id.hash(state);
        self.shape.hash(state);
    }
}

impl fmt::Debug for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ServiceType({})", self.full_name())
    }
}

impl fmt::Display for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_name())
    }
}

// =============================================================================
// Type name parsing
// =============================================================================

/// A parsed full type name: a base path plus nested type arguments.
///
/// Used to turn string keys back into [`ServiceType`]s. Parsing is purely
/// syntactic; whether the names exist is up to the container's type table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeName {
    base: String,
    arguments: Vec<TypeName>,
}

impl TypeName {
    /// Parse a full type name such as `app::Map<app::Key, alloc::vec::Vec<u8>>`.
    ///
    /// Returns `None` for empty or unbalanced input.
    pub fn parse(input: &str) -> Option<TypeName> {
        let input = input.trim();
        if input.is_empty() {
            return None;
        }

        let Some(open) = top_level_open(input) else {
            return balanced(input).then(|| TypeName {
                base: input.to_string(),
                arguments: Vec::new(),
            });
        };

        let inner = &input[open + 1..input.len() - 1];
        let base = input[..open].trim();
        if base.is_empty() {
            return None;
        }

        let arguments = split_top_level(inner)?
            .into_iter()
            .map(TypeName::parse)
            .collect::<Option<Vec<_>>>()?;

        Some(TypeName {
            base: base.to_string(),
            arguments,
        })
    }

    /// The base path, without arguments.
    pub fn base(&self) -> &str {
        &self.base
    }

    /// Parsed type arguments.
    pub fn arguments(&self) -> &[TypeName] {
        &self.arguments
    }
}

impl fmt::Display for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.base)?;
        if !self.arguments.is_empty() {
            f.write_str("<")?;
            for (i, argument) in self.arguments.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{argument}")?;
            }
            f.write_str(">")?;
        }
        Ok(())
    }
}

/// Position of the `<` opening an argument list that closes at the very end
/// of `input`, if there is one.
fn top_level_open(input: &str) -> Option<usize> {
    if !input.ends_with('>') {
        return None;
    }

    let bytes = input.as_bytes();
    let mut depth = 0i32;
    let mut open = None;

    for (i, &b) in bytes.iter().enumerate() {
        match b {
            b'(' | b'[' => depth += 1,
            b')' | b']' => depth -= 1,
            b'<' => {
                if depth == 0 && open.is_none() {
                    if i == 0 {
                        return None;
                    }
                    open = Some(i);
                }
                depth += 1;
            }
            b'>' if i > 0 && bytes[i - 1] == b'-' => {}
            b'>' => {
                depth -= 1;
                if depth == 0 && open.is_some() && i != bytes.len() - 1 {
                    return None;
                }
            }
            _ => {}
        }
        if depth < 0 {
            return None;
        }
    }

    if depth == 0 { open } else { None }
}

fn balanced(input: &str) -> bool {
    let bytes = input.as_bytes();
    let mut depth = 0i32;
    for (i, &b) in bytes.iter().enumerate() {
        match b {
            b'(' | b'[' | b'<' => depth += 1,
            b'>' if i > 0 && bytes[i - 1] == b'-' => {}
            b')' | b']' | b'>' => depth -= 1,
            _ => {}
        }
        if depth < 0 {
            return false;
        }
    }
    depth == 0
}

fn split_top_level(inner: &str) -> Option<Vec<&str>> {
    let bytes = inner.as_bytes();
    let mut depth = 0i32;
    let mut start = 0;
    let mut parts = Vec::new();

    for (i, &b) in bytes.iter().enumerate() {
        match b {
            b'(' | b'[' | b'<' => depth += 1,
            b'>' if i > 0 && bytes[i - 1] == b'-' => {}
            b')' | b']' | b'>' => depth -= 1,
            b',' if depth == 0 => {
                parts.push(&inner[start..i]);
                start = i + 1;
            }
            _ => {}
        }
        if depth < 0 {
            return None;
        }
    }
    parts.push(&inner[start..]);

    if parts.iter().any(|p| p.trim().is_empty()) {
        return None;
    }
    Some(parts)
}
