//! Class hierarchy traversal and ordering.
//!
//! Classes are emitted so that every base class is declared before any of
//! its subclasses. Bases are the explicit generalizations plus the implicit
//! base introduced by a `baseClass` attribute on an association (the
//! metaclass a stereotype extends).

use crate::error::GenerateError;
use crate::model::{ClassId, Model, PropertyId};
use std::collections::HashSet;

/// Name of the attribute that introduces an implicit base class.
pub const BASE_CLASS_ATTRIBUTE: &str = "baseClass";

/// Direct bases of a class, in declared order, without duplicates.
pub fn bases(model: &Model, class: ClassId) -> Vec<ClassId> {
    let mut result: Vec<ClassId> = Vec::new();

    let explicit = model.class(class).generalizations.iter().copied();
    let implicit = model
        .attributes(class)
        .filter(|(_, a)| {
            a.association.is_some() && a.name.as_deref() == Some(BASE_CLASS_ATTRIBUTE)
        })
        .filter_map(|(_, a)| a.ty.class());

    for base in explicit.chain(implicit) {
        if !result.contains(&base) {
            result.push(base);
        }
    }

    result
}

/// Order classes so that bases precede subclasses.
///
/// Bases reached through a candidate are emitted too, even when they were
/// not in the input. A class reachable through several paths is emitted
/// once, at its first encounter. Cyclic generalizations are reported as
/// [`GenerateError::CircularGeneralization`].
pub fn order_classes(
    model: &Model,
    classes: impl IntoIterator<Item = ClassId>,
) -> Result<Vec<ClassId>, GenerateError> {
    let mut orderer = Orderer {
        model,
        visited: HashSet::new(),
        in_progress: Vec::new(),
        result: Vec::new(),
    };

    for class in classes {
        orderer.visit(class)?;
    }

    Ok(orderer.result)
}

struct Orderer<'m> {
    model: &'m Model,
    visited: HashSet<ClassId>,
    /// Classes on the current recursion path.
    in_progress: Vec<ClassId>,
    result: Vec<ClassId>,
}

impl Orderer<'_> {
    fn visit(&mut self, class: ClassId) -> Result<(), GenerateError> {
        if self.visited.contains(&class) {
            return Ok(());
        }

        if let Some(start) = self.in_progress.iter().position(|c| *c == class) {
            let cycle = self.in_progress[start..]
                .iter()
                .chain(std::iter::once(&class))
                .map(|c| self.model.class(*c).name.clone())
                .collect();
            return Err(GenerateError::CircularGeneralization { cycle });
        }

        self.in_progress.push(class);
        for base in bases(self.model, class) {
            self.visit(base)?;
        }
        self.in_progress.pop();

        self.visited.insert(class);
        self.result.push(class);
        Ok(())
    }
}

/// Whether an attribute shadows an attribute of the same name defined on a
/// (transitive) base of its owner.
pub fn is_reassignment(model: &Model, property: PropertyId) -> bool {
    let Some(owner) = model.owning_class(property) else {
        return false;
    };
    let Some(name) = model.property(property).name.as_deref() else {
        return false;
    };

    let mut seen = HashSet::new();
    let mut stack = bases(model, owner);

    while let Some(class) = stack.pop() {
        if !seen.insert(class) {
            continue;
        }
        if model
            .attributes(class)
            .any(|(_, a)| a.name.as_deref() == Some(name))
        {
            return true;
        }
        stack.extend(bases(model, class));
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PropertyDef;

    fn names(model: &Model, order: &[ClassId]) -> Vec<String> {
        order.iter().map(|c| model.class(*c).name.clone()).collect()
    }

    #[test]
    fn test_bases_before_subclass() {
        let mut model = Model::new();
        let sub = model.add_class("Sub");
        let base = model.add_class("Base");
        model.add_generalization(sub, base);

        let order = order_classes(&model, [sub, base]).unwrap();
        assert_eq!(names(&model, &order), vec!["Base", "Sub"]);
    }

    #[test]
    fn test_diamond_emitted_once() {
        let mut model = Model::new();
        let root = model.add_class("Root");
        let left = model.add_class("Left");
        let right = model.add_class("Right");
        let bottom = model.add_class("Bottom");
        model.add_generalization(left, root);
        model.add_generalization(right, root);
        model.add_generalization(bottom, left);
        model.add_generalization(bottom, right);

        let order = order_classes(&model, [bottom, right, left, root]).unwrap();
        assert_eq!(names(&model, &order), vec!["Root", "Left", "Right", "Bottom"]);
    }

    #[test]
    fn test_bases_outside_candidates_are_emitted() {
        let mut model = Model::new();
        let base = model.add_class("Base");
        let sub = model.add_class("Sub");
        model.add_generalization(sub, base);

        let order = order_classes(&model, [sub]).unwrap();
        assert_eq!(names(&model, &order), vec!["Base", "Sub"]);
    }

    #[test]
    fn test_cycle_is_reported() {
        let mut model = Model::new();
        let a = model.add_class("A");
        let b = model.add_class("B");
        model.add_generalization(a, b);
        model.add_generalization(b, a);

        let err = order_classes(&model, [a]).unwrap_err();
        assert_eq!(
            err,
            GenerateError::CircularGeneralization {
                cycle: vec!["A".to_string(), "B".to_string(), "A".to_string()]
            }
        );
    }

    #[test]
    fn test_base_class_attribute_is_implicit_base() {
        let mut model = Model::new();
        let stereotype = model.add_class("Block");
        let metaclass = model.add_class("Class");
        let extension = model.add_association(None, true);
        model.add_attribute(
            stereotype,
            PropertyDef::named(BASE_CLASS_ATTRIBUTE)
                .typed(metaclass)
                .in_association(extension),
        );

        assert_eq!(bases(&model, stereotype), vec![metaclass]);
        let order = order_classes(&model, [stereotype]).unwrap();
        assert_eq!(names(&model, &order), vec!["Class", "Block"]);
    }

    #[test]
    fn test_base_class_without_association_is_ordinary() {
        let mut model = Model::new();
        let class = model.add_class("Holder");
        let other = model.add_class("Class");
        model.add_attribute(class, PropertyDef::named(BASE_CLASS_ATTRIBUTE).typed(other));

        assert!(bases(&model, class).is_empty());
    }

    #[test]
    fn test_reassignment_detected_through_bases() {
        let mut model = Model::new();
        let root = model.add_class("Root");
        let mid = model.add_class("Mid");
        let leaf = model.add_class("Leaf");
        model.add_generalization(mid, root);
        model.add_generalization(leaf, mid);
        model.add_attribute(root, PropertyDef::named("owner"));
        let shadow = model.add_attribute(leaf, PropertyDef::named("owner"));
        let fresh = model.add_attribute(leaf, PropertyDef::named("parts"));

        assert!(is_reassignment(&model, shadow));
        assert!(!is_reassignment(&model, fresh));
    }
}
