//! Classifier predicates.
//!
//! Pure functions deciding how a class or property takes part in
//! generation. Conventions the meta-models follow:
//!
//! - enumerations are classes whose name ends in `Kind` or `Sort`;
//! - a `SimpleAttribute` stereotype flattens a class to a string attribute;
//! - everything under a profile package is excluded;
//! - names starting with `~` are documentation-only placeholders.

use crate::model::{ClassId, Model, PropertyId};
use std::collections::HashSet;

/// Name suffixes that mark a class as an enumeration.
pub const ENUMERATION_SUFFIXES: [&str; 2] = ["Kind", "Sort"];

/// Stereotype flattening a class to a primitive string.
pub const SIMPLE_ATTRIBUTE_STEREOTYPE: &str = "SimpleAttribute";

/// Prefix of documentation-only placeholder classes.
pub const TILDE_PREFIX: char = '~';

/// Whether a class name denotes an enumeration.
pub fn is_enumeration_name(name: &str) -> bool {
    ENUMERATION_SUFFIXES
        .iter()
        .any(|suffix| name.ends_with(suffix))
}

pub fn is_enumeration(model: &Model, class: ClassId) -> bool {
    is_enumeration_name(&model.class(class).name)
}

/// Whether the class, or any class it transitively generalizes, carries the
/// `SimpleAttribute` stereotype.
pub fn is_simple_type(model: &Model, class: ClassId) -> bool {
    let mut seen = HashSet::new();
    let mut stack = vec![class];

    while let Some(id) = stack.pop() {
        if !seen.insert(id) {
            continue;
        }
        let c = model.class(id);
        if c.stereotypes.iter().any(|s| s == SIMPLE_ATTRIBUTE_STEREOTYPE) {
            return true;
        }
        stack.extend(c.generalizations.iter().copied());
    }

    false
}

/// Whether the class is owned, directly or transitively, by a profile.
pub fn is_in_profile(model: &Model, class: ClassId) -> bool {
    let mut seen = HashSet::new();
    let mut package = model.class(class).package;

    while let Some(id) = package {
        if !seen.insert(id) {
            break;
        }
        let p = model.package(id);
        if p.is_profile {
            return true;
        }
        package = p.owner;
    }

    false
}

pub fn is_tilde_type(model: &Model, class: ClassId) -> bool {
    model.class(class).name.starts_with(TILDE_PREFIX)
}

/// Whether the property is an end of a stereotype extension.
pub fn is_extension_end(model: &Model, property: PropertyId) -> bool {
    model
        .property(property)
        .association
        .is_some_and(|a| model.association(a).is_extension)
}

/// Whether a class is emitted as a class of the generated object model.
pub fn is_candidate(model: &Model, class: ClassId) -> bool {
    !(is_enumeration(model, class)
        || is_simple_type(model, class)
        || is_in_profile(model, class)
        || is_tilde_type(model, class))
}
