//! Constructor selection
//!
//! The greediest constructor whose parameters are all resolvable wins. When
//! none is satisfiable the attempt with the fewest unresolvable parameters is
//! reported, so the error names what the caller most likely forgot to
//! register.

use crate::{Constructor, ServiceType};

/// Outcome of [`select_constructor`].
#[derive(Debug)]
pub(crate) enum Selection<'a> {
    /// A constructor whose parameters can all be resolved
    Found(&'a Constructor),
    /// Parameters missing from the closest attempt
    Unsatisfied(Vec<ServiceType>),
}

/// Pick the constructor to use.
///
/// Among fully satisfiable constructors the one with the most parameters is
/// chosen; ties go to the first declared.
pub(crate) fn select_constructor<'a, F>(constructors: &'a [Constructor], can_resolve: F) -> Selection<'a>
where
    F: Fn(&ServiceType) -> bool,
{
    let mut best: Option<&'a Constructor> = None;
    let mut closest: Option<Vec<ServiceType>> = None;

    for constructor in constructors {
        let missing: Vec<ServiceType> = constructor
            .parameters()
            .iter()
            .filter(|parameter| !can_resolve(parameter))
            .cloned()
            .collect();

        if missing.is_empty() {
            if best.is_none_or(|b| constructor.parameters().len() > b.parameters().len()) {
                best = Some(constructor);
            }
        } else if closest.as_ref().is_none_or(|c| missing.len() < c.len()) {
            closest = Some(missing);
        }
    }

    match best {
        Some(constructor) => Selection::Found(constructor),
        None => Selection::Unsatisfied(closest.unwrap_or_default()),
    }
}
