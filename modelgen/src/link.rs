//! Phase 2: associations.
//!
//! Runs after every class is declared, so relations can refer to any class
//! regardless of declaration order. For each ordered class, in declared
//! attribute order, this emits association, derived union and redefinition
//! bindings, followed by the `subsets` registrations that feed derived
//! unions.

use crate::classify::is_extension_end;
use crate::coerce::{bound_arguments, composite_argument};
use crate::declare::DeclaredClasses;
use crate::error::{Diagnostics, GenerateError, Warning};
use crate::language::SuperModel;
use crate::model::{ClassId, Model, Property, PropertyId, PropertyType};
use crate::overrides::Overrides;
use crate::resolve::{
    find_feature, find_inherited_feature, EmittedNames, Feature, Import, ImportSet,
};
use std::collections::HashSet;
use std::fmt;

/// Slot naming the derived unions a property contributes to.
pub const SUBSETS_SLOT: &str = "subsets";

/// Slot naming the feature a property redefines.
pub const REDEFINES_SLOT: &str = "redefines";

/// A statement of the association block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    /// Member override text, verbatim.
    Override(String),
    Association {
        owner: String,
        name: String,
        target: String,
        /// Rendered bound, composite and opposite arguments.
        arguments: String,
    },
    DerivedUnion {
        owner: String,
        name: String,
        target: String,
        bounds: String,
    },
    Redefinition {
        owner: String,
        name: String,
        target: String,
        redefined: String,
        opposite: String,
    },
    Import(Import),
    /// `<union_owner>.<union>.add(<owner>.<name>)`
    SubsetRegistration {
        union_owner: String,
        union: String,
        owner: String,
        name: String,
    },
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Statement::Override(text) => f.write_str(text),
            Statement::Association {
                owner,
                name,
                target,
                arguments,
            } => write!(
                f,
                "{owner}.{name} = association(\"{name}\", {target}{arguments})"
            ),
            Statement::DerivedUnion {
                owner,
                name,
                target,
                bounds,
            } => write!(
                f,
                "{owner}.{name} = derivedunion(\"{name}\", {target}{bounds})"
            ),
            Statement::Redefinition {
                owner,
                name,
                target,
                redefined,
                opposite,
            } => write!(
                f,
                "{owner}.{name} = redefine({owner}, \"{name}\", {target}, {redefined}{opposite})"
            ),
            Statement::Import(import) => write!(f, "{}", import),
            Statement::SubsetRegistration {
                union_owner,
                union,
                owner,
                name,
            } => write!(
                f,
                "{union_owner}.{union}.add({owner}.{name})  # type: ignore[attr-defined]"
            ),
        }
    }
}

/// Result of phase 2.
#[derive(Debug, Clone, Default)]
pub struct LinkedAssociations {
    pub statements: Vec<Statement>,
}

impl LinkedAssociations {
    pub fn lines(&self) -> Vec<String> {
        self.statements.iter().map(ToString::to_string).collect()
    }
}

/// Run phase 2 over the classes declared in phase 1.
pub fn link_associations(
    model: &Model,
    declared: &DeclaredClasses,
    super_models: &[SuperModel],
    overrides: &Overrides,
    diagnostics: &mut Diagnostics,
) -> Result<LinkedAssociations, GenerateError> {
    let mut statements = Vec::new();
    link_associations_into(
        model,
        declared,
        super_models,
        overrides,
        diagnostics,
        |statement| {
            statements.push(statement);
            Ok::<_, GenerateError>(())
        },
    )?;
    Ok(LinkedAssociations { statements })
}

/// Run phase 2, handing each statement to `emit` as soon as it is final.
///
/// Redefinitions are held back until the attributes of their class are
/// done, so they are emitted after that class's associations.
pub fn link_associations_into<E, F>(
    model: &Model,
    declared: &DeclaredClasses,
    super_models: &[SuperModel],
    overrides: &Overrides,
    diagnostics: &mut Diagnostics,
    emit: F,
) -> Result<(), E>
where
    E: From<GenerateError>,
    F: FnMut(Statement) -> Result<(), E>,
{
    let mut linker = Linker {
        model,
        super_models,
        overrides,
        names: &declared.names,
        imports: declared.imports.clone(),
        registered: HashSet::new(),
        emitted: 0,
        emit,
    };

    for &class in &declared.ordered {
        linker.associations(class, diagnostics)?;
        linker.subsets(class, diagnostics)?;
    }

    tracing::debug!(statements = linker.emitted, "linked associations");
    Ok(())
}

/// (union owner, union, contributor owner, contributor) of a registration.
type RegistrationKey = (String, String, String, String);

struct Linker<'a, F> {
    model: &'a Model,
    super_models: &'a [SuperModel],
    overrides: &'a Overrides,
    names: &'a EmittedNames,
    imports: ImportSet,
    registered: HashSet<RegistrationKey>,
    emitted: usize,
    emit: F,
}

impl<'a, E, F> Linker<'a, F>
where
    E: From<GenerateError>,
    F: FnMut(Statement) -> Result<(), E>,
{
    fn push(&mut self, statement: Statement) -> Result<(), E> {
        self.emitted += 1;
        (self.emit)(statement)
    }

    /// Whether a property takes part in association linking at all.
    fn links(&self, property: PropertyId) -> bool {
        matches!(self.model.property(property).ty, PropertyType::Class(_))
            && !is_extension_end(self.model, property)
    }

    fn associations(&mut self, class: ClassId, diagnostics: &mut Diagnostics) -> Result<(), E> {
        let model = self.model;
        let owner = self.names.name(model, class).to_string();
        let mut redefinitions = Vec::new();

        for (property, prop) in model.attributes(class) {
            let key = model.qualified_name(property);
            if let Some(text) = self.overrides.get_override(&key) {
                self.push(Statement::Override(text.to_string()))?;
                continue;
            }
            if !self.links(property) {
                continue;
            }

            let target = self.target_name(prop);

            if let Some(redefined) = prop.slot_value(REDEFINES_SLOT) {
                let redefined = self.qualify_redefined(
                    class,
                    &key,
                    redefined,
                    &mut redefinitions,
                    diagnostics,
                )?;
                redefinitions.push(Statement::Redefinition {
                    owner: owner.clone(),
                    name: prop.name_or_empty().to_string(),
                    target,
                    redefined,
                    opposite: self.opposite_argument(prop),
                });
            } else if prop.is_derived {
                self.push(Statement::DerivedUnion {
                    owner: owner.clone(),
                    name: prop.name_or_empty().to_string(),
                    target,
                    bounds: bound_arguments(&prop.multiplicity),
                })?;
            } else {
                let Some(name) = prop.name.clone() else {
                    return Err(GenerateError::UnnamedAttribute {
                        class: model.class(class).name.clone(),
                    }
                    .into());
                };
                let arguments = format!(
                    "{}{}{}",
                    bound_arguments(&prop.multiplicity),
                    composite_argument(prop.aggregation),
                    self.opposite_argument(prop)
                );
                self.push(Statement::Association {
                    owner: owner.clone(),
                    name,
                    target,
                    arguments,
                })?;
            }
        }

        for statement in redefinitions {
            self.push(statement)?;
        }
        Ok(())
    }

    fn subsets(&mut self, class: ClassId, diagnostics: &mut Diagnostics) -> Result<(), E> {
        let model = self.model;
        let owner = self.names.name(model, class).to_string();

        for (property, prop) in model.attributes(class) {
            if !self.links(property) {
                continue;
            }
            let feature = model.qualified_name(property);
            let name = prop.name_or_empty().to_string();

            for value in prop.slot_values(SUBSETS_SLOT) {
                for target in value.split(',').map(str::trim).filter(|t| !t.is_empty()) {
                    let found = find_feature(model, class, target, self.super_models)?;
                    let Some(found) = found else {
                        diagnostics.warn(Warning::SubsetUndefined {
                            feature: feature.clone(),
                            target: target.to_string(),
                        });
                        continue;
                    };

                    if !found.property().is_derived {
                        diagnostics.warn(Warning::SubsetNotDerivedUnion {
                            feature: feature.clone(),
                            target: target.to_string(),
                        });
                        continue;
                    }

                    let union_owner = self.feature_owner(&found);
                    let union = found.property().name_or_empty().to_string();
                    let key = (union_owner.clone(), union.clone(), owner.clone(), name.clone());
                    if !self.registered.insert(key) {
                        continue;
                    }

                    if let Some(import) = self.feature_import(&found) {
                        if self.imports.insert(&import) {
                            self.push(Statement::Import(import))?;
                        }
                    }
                    self.push(Statement::SubsetRegistration {
                        union_owner,
                        union,
                        owner: owner.clone(),
                        name: name.clone(),
                    })?;
                }
            }
        }

        Ok(())
    }

    /// Qualify an unqualified `redefines` value as `Owner.feature`.
    ///
    /// Values already containing a `.` are used as is. Unresolvable values
    /// are used as is and reported.
    fn qualify_redefined(
        &mut self,
        class: ClassId,
        feature: &str,
        value: &str,
        statements: &mut Vec<Statement>,
        diagnostics: &mut Diagnostics,
    ) -> Result<String, GenerateError> {
        let value = value.trim();
        if value.contains('.') {
            return Ok(value.to_string());
        }

        match find_inherited_feature(self.model, class, value, self.super_models)? {
            Some(found) => {
                if let Some(import) = self.feature_import(&found) {
                    if self.imports.insert(&import) {
                        statements.push(Statement::Import(import));
                    }
                }
                Ok(format!("{}.{}", self.feature_owner(&found), value))
            }
            None => {
                diagnostics.warn(Warning::RedefinitionUnresolved {
                    feature: feature.to_string(),
                    target: value.to_string(),
                });
                Ok(value.to_string())
            }
        }
    }

    /// Name of the class owning a found feature, as referred to in output.
    fn feature_owner(&self, found: &Feature<'_>) -> String {
        match found.model.owning_class(found.property) {
            Some(owner) if std::ptr::eq(found.model, self.model) => {
                self.names.name(self.model, owner).to_string()
            }
            Some(owner) => found.model.class(owner).name.clone(),
            None => String::new(),
        }
    }

    /// Import of the owner of a feature found in a super model.
    fn feature_import(&self, found: &Feature<'_>) -> Option<Import> {
        let element_type = found.element_type.as_ref()?;
        let owner = found.owner_name()?;
        Some(Import::new(element_type.module.clone(), owner))
    }

    fn target_name(&self, prop: &Property) -> String {
        prop.ty
            .class()
            .map(|target| self.names.name(self.model, target).to_string())
            .unwrap_or_default()
    }

    /// `, opposite="<name>"` when the opposite end is named and owned by a
    /// class.
    fn opposite_argument(&self, prop: &Property) -> String {
        let Some(opposite) = prop.opposite else {
            return String::new();
        };
        let end = self.model.property(opposite);
        match (&end.name, self.model.owning_class(opposite)) {
            (Some(name), Some(_)) => format!(", opposite=\"{}\"", name),
            _ => String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::declare::declare_classes;
    use crate::hierarchy::order_classes;
    use crate::model::{PropertyDef, UpperBound};

    fn link(model: &Model, overrides: &Overrides) -> (Vec<String>, Vec<Warning>) {
        let ordered = order_classes(model, model.classes().map(|(id, _)| id)).unwrap();
        let mut diagnostics = Diagnostics::new();
        let declared =
            declare_classes(model, ordered, &[], overrides, &mut diagnostics).unwrap();
        let mut diagnostics = Diagnostics::new();
        let linked =
            link_associations(model, &declared, &[], overrides, &mut diagnostics).unwrap();
        (linked.lines(), diagnostics.into_warnings())
    }

    #[test]
    fn test_plain_association() {
        let mut model = Model::new();
        let x = model.add_class("X");
        let y = model.add_class("Y");
        model.add_attribute(
            x,
            PropertyDef::named("items")
                .typed(y)
                .lower(0)
                .upper(UpperBound::Unlimited),
        );

        let (lines, _) = link(&model, &Overrides::new());
        assert_eq!(lines, vec!["X.items = association(\"items\", Y)"]);
    }

    #[test]
    fn test_association_arguments() {
        let mut model = Model::new();
        let x = model.add_class("X");
        let y = model.add_class("Y");
        let parts = model.add_attribute(
            x,
            PropertyDef::named("parts")
                .typed(y)
                .lower(1)
                .upper(UpperBound::Finite(3))
                .composite(),
        );
        let whole = model.add_attribute(
            y,
            PropertyDef::named("whole")
                .typed(x)
                .upper(UpperBound::Finite(1)),
        );
        model.set_opposites(parts, whole);

        let (lines, _) = link(&model, &Overrides::new());
        assert_eq!(
            lines,
            vec![
                "X.parts = association(\"parts\", Y, lower=1, upper=3, composite=True, opposite=\"whole\")",
                "Y.whole = association(\"whole\", X, upper=1, opposite=\"parts\")",
            ]
        );
    }

    #[test]
    fn test_opposite_owned_by_association_is_omitted() {
        let mut model = Model::new();
        let x = model.add_class("X");
        let assoc = model.add_association(None, false);
        let end = model.add_owned_end(assoc, PropertyDef::named("source").typed(x));
        let target = model.add_attribute(
            x,
            PropertyDef::named("target").typed(x).in_association(assoc),
        );
        model.set_opposites(target, end);

        let (lines, _) = link(&model, &Overrides::new());
        assert_eq!(lines, vec!["X.target = association(\"target\", X)"]);
    }

    #[test]
    fn test_redefinition_follows_associations() {
        let mut model = Model::new();
        let base = model.add_class("Base");
        let sub = model.add_class("Sub");
        let item = model.add_class("Item");
        model.add_generalization(sub, base);
        model.add_attribute(base, PropertyDef::named("items").typed(item));
        model.add_attribute(
            sub,
            PropertyDef::named("special")
                .typed(item)
                .slot(REDEFINES_SLOT, "items"),
        );
        model.add_attribute(sub, PropertyDef::named("extra").typed(item));

        let (lines, warnings) = link(&model, &Overrides::new());
        assert_eq!(
            lines,
            vec![
                "Base.items = association(\"items\", Item)",
                "Sub.extra = association(\"extra\", Item)",
                "Sub.special = redefine(Sub, \"special\", Item, Base.items)",
            ]
        );
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_qualified_redefinition_is_kept() {
        let mut model = Model::new();
        let a = model.add_class("A");
        model.add_attribute(
            a,
            PropertyDef::named("owner")
                .typed(a)
                .upper(UpperBound::Finite(1))
                .slot(REDEFINES_SLOT, "Element.owner"),
        );

        let (lines, warnings) = link(&model, &Overrides::new());
        assert_eq!(
            lines,
            vec!["A.owner = redefine(A, \"owner\", A, Element.owner)"]
        );
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_unresolved_redefinition_warns() {
        let mut model = Model::new();
        let a = model.add_class("A");
        model.add_attribute(
            a,
            PropertyDef::named("x")
                .typed(a)
                .slot(REDEFINES_SLOT, "missing"),
        );

        let (lines, warnings) = link(&model, &Overrides::new());
        assert_eq!(lines, vec!["A.x = redefine(A, \"x\", A, missing)"]);
        assert_eq!(
            warnings,
            vec![Warning::RedefinitionUnresolved {
                feature: "A.x".to_string(),
                target: "missing".to_string()
            }]
        );
    }

    #[test]
    fn test_derived_union_and_subsets() {
        let mut model = Model::new();
        let base = model.add_class("Namespace");
        let sub = model.add_class("Package");
        let element = model.add_class("Element");
        model.add_generalization(sub, base);
        model.add_attribute(
            base,
            PropertyDef::named("member").typed(element).derived(),
        );
        model.add_attribute(
            sub,
            PropertyDef::named("packagedElement")
                .typed(element)
                .slot(SUBSETS_SLOT, "member, member"),
        );

        let (lines, warnings) = link(&model, &Overrides::new());
        assert_eq!(
            lines,
            vec![
                "Namespace.member = derivedunion(\"member\", Element)",
                "Package.packagedElement = association(\"packagedElement\", Element)",
                "Namespace.member.add(Package.packagedElement)  # type: ignore[attr-defined]",
            ]
        );
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_subset_warnings() {
        let mut model = Model::new();
        let a = model.add_class("A");
        model.add_attribute(a, PropertyDef::named("plain").typed(a));
        model.add_attribute(
            a,
            PropertyDef::named("x")
                .typed(a)
                .slot(SUBSETS_SLOT, "plain, nowhere"),
        );

        let (lines, warnings) = link(&model, &Overrides::new());
        assert_eq!(lines.len(), 2);
        assert_eq!(
            warnings,
            vec![
                Warning::SubsetNotDerivedUnion {
                    feature: "A.x".to_string(),
                    target: "plain".to_string()
                },
                Warning::SubsetUndefined {
                    feature: "A.x".to_string(),
                    target: "nowhere".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_member_override_replaces_binding() {
        let mut model = Model::new();
        let a = model.add_class("A");
        let b = model.add_class("B");
        model.add_attribute(a, PropertyDef::named("b").typed(b));

        let mut overrides = Overrides::new();
        overrides.insert("A.b", Some("relation_one[B]"), "A.b = custom(\"b\", B)");

        let (lines, _) = link(&model, &overrides);
        assert_eq!(lines, vec!["A.b = custom(\"b\", B)"]);
    }

    #[test]
    fn test_unnamed_end_is_fatal() {
        let mut model = Model::new();
        let a = model.add_class("A");
        model.add_attribute(a, PropertyDef::unnamed().typed(a));

        let err = link_associations(
            &model,
            &declared_only(a),
            &[],
            &Overrides::new(),
            &mut Diagnostics::new(),
        )
        .unwrap_err();
        assert_eq!(
            err,
            GenerateError::UnnamedAttribute {
                class: "A".to_string()
            }
        );
    }

    fn declared_only(class: ClassId) -> DeclaredClasses {
        DeclaredClasses {
            ordered: vec![class],
            declarations: Vec::new(),
            operations: Vec::new(),
            names: EmittedNames::new(),
            imports: ImportSet::new(),
        }
    }

    #[test]
    fn test_unnamed_derived_union_is_not_fatal() {
        let mut model = Model::new();
        let a = model.add_class("A");
        model.add_attribute(a, PropertyDef::unnamed().typed(a).derived());

        let linked = link_associations(
            &model,
            &declared_only(a),
            &[],
            &Overrides::new(),
            &mut Diagnostics::new(),
        )
        .unwrap();
        assert_eq!(linked.lines(), vec!["A. = derivedunion(\"\", A)"]);
    }

    #[test]
    fn test_statements_stream_in_order() {
        let mut model = Model::new();
        let base = model.add_class("Base");
        let sub = model.add_class("Sub");
        model.add_generalization(sub, base);
        model.add_attribute(base, PropertyDef::named("items").typed(base).derived());
        model.add_attribute(
            sub,
            PropertyDef::named("parts")
                .typed(base)
                .slot(SUBSETS_SLOT, "items"),
        );
        let ordered = order_classes(&model, model.classes().map(|(id, _)| id)).unwrap();
        let declared = declare_classes(
            &model,
            ordered,
            &[],
            &Overrides::new(),
            &mut Diagnostics::new(),
        )
        .unwrap();

        let mut streamed = Vec::new();
        link_associations_into(
            &model,
            &declared,
            &[],
            &Overrides::new(),
            &mut Diagnostics::new(),
            |statement| {
                streamed.push(statement.to_string());
                Ok::<_, GenerateError>(())
            },
        )
        .unwrap();

        let (lines, _) = link(&model, &Overrides::new());
        assert_eq!(streamed, lines);
        assert_eq!(streamed.len(), 3);
    }

    #[test]
    fn test_emit_error_stops_linking() {
        let mut model = Model::new();
        let a = model.add_class("A");
        model.add_attribute(a, PropertyDef::named("first").typed(a));
        model.add_attribute(a, PropertyDef::named("second").typed(a));

        let mut calls = 0;
        let result = link_associations_into(
            &model,
            &declared_only(a),
            &[],
            &Overrides::new(),
            &mut Diagnostics::new(),
            |_| {
                calls += 1;
                Err(GenerateError::UnnamedAttribute {
                    class: "sink".to_string(),
                })
            },
        );
        assert!(result.is_err());
        assert_eq!(calls, 1);
    }
}
