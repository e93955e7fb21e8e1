//! Phase 1: class declarations.
//!
//! Every ordered class becomes one [`Declaration`]: an override block, an
//! import of a type a super model already generated, or a class statement
//! with its scalar, enumeration and relation members. Associations are left
//! to the link phase, which runs once every class name exists.

use crate::classify::is_extension_end;
use crate::coerce::default_argument;
use crate::error::{Diagnostics, GenerateError, Warning};
use crate::hierarchy::{bases, is_reassignment};
use crate::language::SuperModel;
use crate::model::{ClassId, Model, PrimitiveKind, PropertyId, PropertyType};
use crate::overrides::Overrides;
use crate::resolve::{resolve_import, EmittedNames, Import, ImportSet};
use std::fmt;

/// Indentation of class body lines.
pub const INDENT: &str = "    ";

/// A member line inside a class body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Member {
    /// `name: <type text>` from a member override.
    Override { name: String, type_text: String },
    /// Typed scalar attribute.
    Attribute {
        name: String,
        kind: PrimitiveKind,
        /// Rendered `, default=...` argument, possibly empty.
        default: String,
    },
    /// Enumeration attribute; the first literal is the default.
    Enumeration { name: String, literals: Vec<String> },
    /// Reference to another class.
    Relation {
        name: String,
        target: String,
        singular: bool,
        /// A base already defines an attribute of the same name.
        reassignment: bool,
    },
}

impl fmt::Display for Member {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Member::Override { name, type_text } => write!(f, "{}: {}", name, type_text),
            Member::Attribute {
                name,
                kind,
                default,
            } => write!(
                f,
                "{name}: _attribute[{kind}] = _attribute(\"{name}\", {kind}{default})"
            ),
            Member::Enumeration { name, literals } => {
                let values = literals
                    .iter()
                    .map(|l| format!("\"{}\"", l))
                    .collect::<Vec<_>>()
                    .join(", ");
                let first = literals.first().map(String::as_str).unwrap_or_default();
                write!(f, "{name} = _enumeration(\"{name}\", ({values}), \"{first}\")")
            }
            Member::Relation {
                name,
                target,
                singular,
                reassignment,
            } => {
                let multiplicity = if *singular { "one" } else { "many" };
                write!(f, "{}: relation_{}[{}]", name, multiplicity, target)?;
                if *reassignment {
                    f.write_str("  # type: ignore[assignment]")?;
                }
                Ok(())
            }
        }
    }
}

/// A class statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassDeclaration {
    pub class: ClassId,
    pub name: String,
    /// Emitted base names, sorted.
    pub bases: Vec<String>,
    pub members: Vec<Member>,
}

impl ClassDeclaration {
    fn render(&self, lines: &mut Vec<String>) {
        lines.push(format!("class {}({}):", self.name, self.bases.join(", ")));
        if self.members.is_empty() {
            lines.push(format!("{}pass", INDENT));
        } else {
            lines.extend(self.members.iter().map(|m| format!("{}{}", INDENT, m)));
        }
        lines.push(String::new());
        lines.push(String::new());
    }
}

/// What phase 1 emits for one ordered class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Declaration {
    /// Class override text, verbatim.
    Override { class: ClassId, text: String },
    /// The class is imported from a super model.
    Import {
        class: ClassId,
        import: Import,
        /// `false` when an identical import was emitted before.
        emitted: bool,
    },
    Class(ClassDeclaration),
}

impl Declaration {
    pub fn class(&self) -> ClassId {
        match self {
            Declaration::Override { class, .. } | Declaration::Import { class, .. } => *class,
            Declaration::Class(declaration) => declaration.class,
        }
    }

    /// Append the output lines of this declaration.
    pub fn render(&self, lines: &mut Vec<String>) {
        match self {
            Declaration::Override { text, .. } => lines.push(text.clone()),
            Declaration::Import {
                import, emitted, ..
            } => {
                if *emitted {
                    lines.push(import.to_string());
                }
            }
            Declaration::Class(declaration) => declaration.render(lines),
        }
    }
}

/// Result of phase 1.
#[derive(Debug, Clone)]
pub struct DeclaredClasses {
    /// Classes in emission order.
    pub ordered: Vec<ClassId>,
    /// One declaration per ordered class.
    pub declarations: Vec<Declaration>,
    /// Operation override blocks, per class in order.
    pub operations: Vec<String>,
    pub names: EmittedNames,
    pub imports: ImportSet,
}

impl DeclaredClasses {
    /// Output lines of the declaration block.
    pub fn declaration_lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        for declaration in &self.declarations {
            declaration.render(&mut lines);
        }
        lines
    }
}

/// Run phase 1 over the ordered classes.
pub fn declare_classes(
    model: &Model,
    ordered: Vec<ClassId>,
    super_models: &[SuperModel],
    overrides: &Overrides,
    diagnostics: &mut Diagnostics,
) -> Result<DeclaredClasses, GenerateError> {
    let mut names = EmittedNames::new();
    let mut imports = ImportSet::new();

    // Imports are decided up front so every declaration sees final names.
    let mut resolved: Vec<Option<Import>> = Vec::with_capacity(ordered.len());
    for &class in &ordered {
        let name = &model.class(class).name;
        let import = if overrides.has_override(name) || !bases(model, class).is_empty() {
            None
        } else {
            resolve_import(model, class, &ordered, super_models)?
        };
        if let Some(alias) = import.as_ref().and_then(|i| i.alias.as_deref()) {
            names.set_alias(class, alias);
        }
        resolved.push(import);
    }

    let mut declarations = Vec::with_capacity(ordered.len());
    for (&class, import) in ordered.iter().zip(resolved) {
        let name = &model.class(class).name;

        let declaration = if let Some(text) = overrides.get_override(name) {
            Declaration::Override {
                class,
                text: text.to_string(),
            }
        } else if let Some(import) = import {
            let emitted = imports.insert(&import);
            Declaration::Import {
                class,
                import,
                emitted,
            }
        } else {
            Declaration::Class(declare_class(model, class, &names, overrides, diagnostics)?)
        };
        declarations.push(declaration);
    }

    let operations = ordered
        .iter()
        .flat_map(|class| operation_overrides(model, *class, overrides))
        .collect();

    tracing::debug!(classes = declarations.len(), "declared classes");

    Ok(DeclaredClasses {
        ordered,
        declarations,
        operations,
        names,
        imports,
    })
}

fn declare_class(
    model: &Model,
    class: ClassId,
    names: &EmittedNames,
    overrides: &Overrides,
    diagnostics: &mut Diagnostics,
) -> Result<ClassDeclaration, GenerateError> {
    let class_name = &model.class(class).name;

    let mut base_names: Vec<String> = bases(model, class)
        .into_iter()
        .map(|b| names.name(model, b).to_string())
        .collect();
    base_names.sort();

    let mut attributes: Vec<PropertyId> = model.class(class).attributes.clone();
    attributes.sort_by(|a, b| {
        model
            .property(*a)
            .name_or_empty()
            .cmp(model.property(*b).name_or_empty())
    });

    let mut members = Vec::new();
    for property in attributes {
        if let Some(member) = declare_member(model, property, names, overrides, diagnostics)? {
            members.push(member);
        }
    }

    let mut operations: Vec<&str> = model
        .class(class)
        .operations
        .iter()
        .map(|o| o.name.as_deref().unwrap_or_default())
        .collect();
    operations.sort_unstable();

    for operation in operations {
        let key = format!("{}.{}", class_name, operation);
        if overrides.has_override(&key) {
            if let Some(type_text) = overrides.get_type(&key) {
                members.push(Member::Override {
                    name: operation.to_string(),
                    type_text: type_text.to_string(),
                });
            }
        } else {
            diagnostics.warn(Warning::OperationWithoutImplementation { operation: key });
        }
    }

    Ok(ClassDeclaration {
        class,
        name: names.name(model, class).to_string(),
        bases: base_names,
        members,
    })
}

fn declare_member(
    model: &Model,
    property: PropertyId,
    names: &EmittedNames,
    overrides: &Overrides,
    diagnostics: &mut Diagnostics,
) -> Result<Option<Member>, GenerateError> {
    if is_extension_end(model, property) {
        return Ok(None);
    }

    let prop = model.property(property);
    let feature = model.qualified_name(property);

    if overrides.has_override(&feature) {
        let member = match (&prop.name, overrides.get_type(&feature)) {
            (Some(name), Some(type_text)) => Some(Member::Override {
                name: name.clone(),
                type_text: type_text.to_string(),
            }),
            _ => None,
        };
        return Ok(member);
    }

    if prop.is_derived && prop.ty.class().is_none() {
        diagnostics.warn(Warning::DerivedWithoutImplementation { feature });
        return Ok(None);
    }

    let Some(name) = prop.name.clone() else {
        let class = model
            .owning_class(property)
            .map(|c| model.class(c).name.clone())
            .unwrap_or_default();
        return Err(GenerateError::UnnamedAttribute { class });
    };

    let member = match &prop.ty {
        PropertyType::Primitive(kind) => Member::Attribute {
            default: default_argument(&feature, *kind, prop.default.as_ref())?,
            kind: *kind,
            name,
        },
        PropertyType::Enumeration(enumeration) => {
            let literals: Vec<String> = model
                .attributes(*enumeration)
                .map(|(_, literal)| literal.name_or_empty().to_string())
                .collect();
            if literals.is_empty() {
                return Err(GenerateError::EmptyEnumeration {
                    feature,
                    enumeration: model.class(*enumeration).name.clone(),
                });
            }
            Member::Enumeration { name, literals }
        }
        PropertyType::Class(target) => Member::Relation {
            name,
            target: names.name(model, *target).to_string(),
            singular: prop.multiplicity.is_singular(),
            reassignment: is_reassignment(model, property),
        },
        PropertyType::Unresolved(type_value) => {
            return Err(GenerateError::UnknownTypeValue {
                feature,
                type_value: type_value.clone(),
            })
        }
        PropertyType::Unset => return Err(GenerateError::UnresolvableAttribute { feature }),
    };

    Ok(Some(member))
}

/// Override blocks of a class's operations, sorted by operation name.
fn operation_overrides(model: &Model, class: ClassId, overrides: &Overrides) -> Vec<String> {
    let class_name = &model.class(class).name;
    let mut operations: Vec<&str> = model
        .class(class)
        .operations
        .iter()
        .map(|o| o.name.as_deref().unwrap_or_default())
        .collect();
    operations.sort_unstable();

    operations
        .into_iter()
        .filter_map(|operation| {
            overrides
                .get_override(&format!("{}.{}", class_name, operation))
                .map(str::to_string)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hierarchy::order_classes;
    use crate::model::{DefaultValue, PropertyDef, UpperBound};
    use crate::normalize::normalize;

    fn declare(model: &Model, overrides: &Overrides) -> (DeclaredClasses, Vec<Warning>) {
        let ordered = order_classes(model, model.classes().map(|(id, _)| id)).unwrap();
        let mut diagnostics = Diagnostics::new();
        let declared = declare_classes(model, ordered, &[], overrides, &mut diagnostics).unwrap();
        (declared, diagnostics.into_warnings())
    }

    #[test]
    fn test_member_rendering() {
        let scalar = Member::Attribute {
            name: "body".to_string(),
            kind: PrimitiveKind::String,
            default: ", default=\"\"".to_string(),
        };
        assert_eq!(
            scalar.to_string(),
            "body: _attribute[str] = _attribute(\"body\", str, default=\"\")"
        );

        let enumeration = Member::Enumeration {
            name: "kind".to_string(),
            literals: vec!["in".to_string(), "out".to_string()],
        };
        assert_eq!(
            enumeration.to_string(),
            "kind = _enumeration(\"kind\", (\"in\", \"out\"), \"in\")"
        );

        let relation = Member::Relation {
            name: "owner".to_string(),
            target: "Element".to_string(),
            singular: true,
            reassignment: true,
        };
        assert_eq!(
            relation.to_string(),
            "owner: relation_one[Element]  # type: ignore[assignment]"
        );
    }

    #[test]
    fn test_empty_class_gets_pass() {
        let mut model = Model::new();
        let a = model.add_class("A");
        let b = model.add_class("B");
        model.add_generalization(b, a);

        let (declared, _) = declare(&model, &Overrides::new());
        assert_eq!(
            declared.declaration_lines(),
            vec!["class A():", "    pass", "", "", "class B(A):", "    pass", "", ""]
        );
    }

    #[test]
    fn test_members_sorted_by_name() {
        let mut model = Model::new();
        let x = model.add_class("X");
        let y = model.add_class("Y");
        model.add_attribute(x, PropertyDef::named("zeta").type_value("int"));
        model.add_attribute(
            x,
            PropertyDef::named("alpha")
                .typed(y)
                .upper(UpperBound::Finite(1)),
        );
        normalize(&mut model).unwrap();

        let (declared, _) = declare(&model, &Overrides::new());
        let lines = declared.declaration_lines();
        assert_eq!(lines[0], "class X():");
        assert_eq!(lines[1], "    alpha: relation_one[Y]");
        assert_eq!(lines[2], "    zeta: _attribute[int] = _attribute(\"zeta\", int)");
    }

    #[test]
    fn test_enumeration_member() {
        let mut model = Model::new();
        let owner = model.add_class("Property");
        let kind = model.add_class("AggregationKind");
        for literal in ["none", "shared", "composite"] {
            model.add_attribute(kind, PropertyDef::named(literal));
        }
        model.add_attribute(owner, PropertyDef::named("aggregation").typed(kind));
        normalize(&mut model).unwrap();

        let ordered = vec![owner];
        let declared =
            declare_classes(&model, ordered, &[], &Overrides::new(), &mut Diagnostics::new())
                .unwrap();
        assert_eq!(
            declared.declaration_lines()[1],
            "    aggregation = _enumeration(\"aggregation\", (\"none\", \"shared\", \"composite\"), \"none\")"
        );
    }

    #[test]
    fn test_empty_enumeration_is_fatal() {
        let mut model = Model::new();
        let owner = model.add_class("Property");
        let kind = model.add_class("EmptyKind");
        model.add_attribute(owner, PropertyDef::named("kind").typed(kind));
        normalize(&mut model).unwrap();

        let err = declare_classes(
            &model,
            vec![owner],
            &[],
            &Overrides::new(),
            &mut Diagnostics::new(),
        )
        .unwrap_err();
        assert!(matches!(err, GenerateError::EmptyEnumeration { .. }));
    }

    #[test]
    fn test_derived_without_type_warns() {
        let mut model = Model::new();
        let a = model.add_class("A");
        model.add_attribute(a, PropertyDef::named("members").derived());

        let (declared, warnings) = declare(&model, &Overrides::new());
        assert_eq!(declared.declaration_lines()[1], "    pass");
        assert_eq!(
            warnings,
            vec![Warning::DerivedWithoutImplementation {
                feature: "A.members".to_string()
            }]
        );
    }

    #[test]
    fn test_untyped_attribute_is_fatal() {
        let mut model = Model::new();
        let a = model.add_class("A");
        model.add_attribute(a, PropertyDef::named("x"));

        let err = declare_classes(
            &model,
            vec![a],
            &[],
            &Overrides::new(),
            &mut Diagnostics::new(),
        )
        .unwrap_err();
        assert_eq!(
            err,
            GenerateError::UnresolvableAttribute {
                feature: "A.x".to_string()
            }
        );
    }

    #[test]
    fn test_unnamed_member_is_fatal() {
        let mut model = Model::new();
        let a = model.add_class("A");
        model.add_attribute(a, PropertyDef::unnamed().typed(a).derived());

        let err = declare_classes(
            &model,
            vec![a],
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

    #[test]
    fn test_unnamed_untyped_derived_only_warns() {
        let mut model = Model::new();
        let a = model.add_class("A");
        model.add_attribute(a, PropertyDef::unnamed().derived());

        let (declared, warnings) = declare(&model, &Overrides::new());
        assert_eq!(declared.declaration_lines()[1], "    pass");
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn test_default_value_is_coerced() {
        let mut model = Model::new();
        let a = model.add_class("A");
        model.add_attribute(
            a,
            PropertyDef::named("flag")
                .type_value("Boolean")
                .default_value(DefaultValue::Text("false".to_string())),
        );
        normalize(&mut model).unwrap();

        let (declared, _) = declare(&model, &Overrides::new());
        assert_eq!(
            declared.declaration_lines()[1],
            "    flag: _attribute[bool] = _attribute(\"flag\", bool, default=False)"
        );
    }

    #[test]
    fn test_overrides() {
        let mut model = Model::new();
        let a = model.add_class("A");
        let b = model.add_class("B");
        model.add_attribute(a, PropertyDef::named("computed").derived());
        model.add_operation(a, "run");
        model.add_operation(a, "stop");

        let mut overrides = Overrides::new();
        overrides.insert("A.computed", Some("derived[B]"), "A.computed = derived(\"computed\", B)");
        overrides.insert("A.run", Some("Callable[[], None]"), "def _run(self): ...\nA.run = _run");
        overrides.insert("B", None, "class B(A):\n    pass");

        let ordered = vec![a, b];
        let mut diagnostics = Diagnostics::new();
        let declared =
            declare_classes(&model, ordered, &[], &overrides, &mut diagnostics).unwrap();

        assert_eq!(
            declared.declaration_lines(),
            vec![
                "class A():",
                "    computed: derived[B]",
                "    run: Callable[[], None]",
                "",
                "",
                "class B(A):\n    pass",
            ]
        );
        assert_eq!(declared.operations, vec!["def _run(self): ...\nA.run = _run"]);
        assert_eq!(
            diagnostics.into_warnings(),
            vec![Warning::OperationWithoutImplementation {
                operation: "A.stop".to_string()
            }]
        );
    }

    #[test]
    fn test_reassignment_marker() {
        let mut model = Model::new();
        let base = model.add_class("Base");
        let sub = model.add_class("Sub");
        model.add_generalization(sub, base);
        model.add_attribute(base, PropertyDef::named("owner").typed(base));
        model.add_attribute(
            sub,
            PropertyDef::named("owner")
                .typed(sub)
                .upper(UpperBound::Finite(1)),
        );

        let (declared, _) = declare(&model, &Overrides::new());
        let lines = declared.declaration_lines();
        assert!(lines.contains(&"    owner: relation_many[Base]".to_string()));
        assert!(lines
            .contains(&"    owner: relation_one[Sub]  # type: ignore[assignment]".to_string()));
    }
}
