//! JSON model documents.
//!
//! A document lists packages, classes and associations. Elements refer to
//! each other by string id:
//!
//! ```json
//! {
//!   "packages": [{ "id": "p1", "name": "Kernel" }],
//!   "classes": [
//!     {
//!       "id": "c1",
//!       "name": "Element",
//!       "package": "p1",
//!       "attributes": [
//!         { "id": "a1", "name": "owner", "type": "c1", "upper": 1, "derived": true }
//!       ]
//!     }
//!   ]
//! }
//! ```
//!
//! Loading resolves every id into the typed ids of a [`Model`].

use crate::error::ModelError;
use crate::model::{
    AggregationKind, AssociationId, ClassId, DefaultValue, Model, PackageId, PrimitiveKind,
    PropertyDef, PropertyId, UpperBound,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

/// Serialized model document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelDocument {
    pub packages: Vec<PackageDoc>,
    pub classes: Vec<ClassDoc>,
    pub associations: Vec<AssociationDoc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageDoc {
    pub id: String,
    pub name: String,
    /// Owning package id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package: Option<String>,
    #[serde(default)]
    pub profile: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassDoc {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package: Option<String>,
    /// Ids of the general classes.
    #[serde(default)]
    pub generalizations: Vec<String>,
    #[serde(default)]
    pub stereotypes: Vec<String>,
    #[serde(default)]
    pub attributes: Vec<PropertyDoc>,
    /// Operation names.
    #[serde(default)]
    pub operations: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssociationDoc {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Stereotype extension association.
    #[serde(default)]
    pub extension: bool,
    /// Ends owned by the association rather than by a class.
    #[serde(default)]
    pub owned_ends: Vec<PropertyDoc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PropertyDoc {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Id of the class the property is typed by.
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_ref: Option<String>,
    /// Raw type value: a primitive alias or a class name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub type_value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lower: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upper: Option<UpperBound>,
    pub derived: bool,
    pub aggregation: AggregationKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<DefaultValue>,
    /// Id of the opposite end.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub opposite: Option<String>,
    /// Id of the association this end belongs to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub association: Option<String>,
    /// Stereotype slots, e.g. `subsets` and `redefines`.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub slots: BTreeMap<String, String>,
}

/// Read a model document from disk.
pub fn load_model(path: &Path) -> Result<Model, ModelError> {
    let content = std::fs::read_to_string(path).map_err(|e| ModelError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    let model = parse_model(&content)?;
    tracing::debug!(path = %path.display(), classes = model.class_count(), "loaded model");
    Ok(model)
}

/// Parse a model document from JSON text.
pub fn parse_model(content: &str) -> Result<Model, ModelError> {
    let document: ModelDocument = serde_json::from_str(content)?;
    document.into_model()
}

impl ModelDocument {
    /// Build the in-memory model, resolving all id references.
    pub fn into_model(self) -> Result<Model, ModelError> {
        Builder::default().build(self)
    }
}

#[derive(Default)]
struct Builder {
    model: Model,
    packages: HashMap<String, PackageId>,
    classes: HashMap<String, ClassId>,
    associations: HashMap<String, AssociationId>,
    properties: HashMap<String, PropertyId>,
    /// (property, opposite id) pairs resolved once every property exists.
    opposites: Vec<(PropertyId, String)>,
}

impl Builder {
    fn build(mut self, document: ModelDocument) -> Result<Model, ModelError> {
        for package in &document.packages {
            let id = self.model.add_package(&package.name, None, package.profile);
            insert_unique(&mut self.packages, "package", &package.id, id)?;
        }
        for package in &document.packages {
            if let Some(owner) = &package.package {
                let owner = lookup(&self.packages, "package", owner, &package.id)?;
                self.model
                    .set_package_owner(self.packages[&package.id], Some(owner));
            }
        }

        for class in &document.classes {
            let id = self.model.add_class(&class.name);
            insert_unique(&mut self.classes, "class", &class.id, id)?;
        }
        for association in &document.associations {
            let id = self
                .model
                .add_association(association.name.clone(), association.extension);
            insert_unique(&mut self.associations, "association", &association.id, id)?;
        }

        for class in &document.classes {
            self.fill_class(class)?;
        }
        for association in &document.associations {
            let id = self.associations[&association.id];
            for end in &association.owned_ends {
                let def = self.property_def(end, &association.id)?;
                let property = self.model.add_owned_end(id, def);
                self.register_property(end, property)?;
            }
        }

        for (property, opposite) in std::mem::take(&mut self.opposites) {
            let referrer = self.model.qualified_name(property);
            let target = lookup(&self.properties, "property", &opposite, &referrer)?;
            self.model.set_opposite(property, target);
        }

        Ok(self.model)
    }

    fn fill_class(&mut self, class: &ClassDoc) -> Result<(), ModelError> {
        let id = self.classes[&class.id];

        if let Some(package) = &class.package {
            let package = lookup(&self.packages, "package", package, &class.id)?;
            self.model.set_class_package(id, package);
        }
        for general in &class.generalizations {
            let general = lookup(&self.classes, "class", general, &class.id)?;
            self.model.add_generalization(id, general);
        }
        for stereotype in &class.stereotypes {
            self.model.apply_stereotype(id, stereotype.as_str());
        }
        for operation in &class.operations {
            self.model.add_operation(id, operation.as_str());
        }
        for attribute in &class.attributes {
            let def = self.property_def(attribute, &class.id)?;
            let property = self.model.add_attribute(id, def);
            self.register_property(attribute, property)?;
        }

        Ok(())
    }

    fn property_def(&self, doc: &PropertyDoc, owner: &str) -> Result<PropertyDef, ModelError> {
        let referrer = format!("{}.{}", owner, doc.id);
        let mut def = PropertyDef {
            name: doc.name.clone(),
            is_derived: doc.derived,
            aggregation: doc.aggregation,
            default: doc.default.clone(),
            ..PropertyDef::default()
        };
        def.multiplicity.lower = doc.lower;
        def.multiplicity.upper = doc.upper;

        // A primitive type value takes precedence over a class reference.
        let primitive = doc
            .type_value
            .as_deref()
            .filter(|v| PrimitiveKind::from_alias(v).is_some());
        def = match (primitive, &doc.type_ref, &doc.type_value) {
            (Some(value), _, _) => def.type_value(value),
            (None, Some(class), _) => def.typed(lookup(&self.classes, "class", class, &referrer)?),
            (None, None, Some(value)) => def.type_value(value.as_str()),
            (None, None, None) => def,
        };

        if let Some(association) = &doc.association {
            def = def.in_association(lookup(
                &self.associations,
                "association",
                association,
                &referrer,
            )?);
        }
        for (feature, value) in &doc.slots {
            def = def.slot(feature.as_str(), value.as_str());
        }

        Ok(def)
    }

    fn register_property(&mut self, doc: &PropertyDoc, id: PropertyId) -> Result<(), ModelError> {
        insert_unique(&mut self.properties, "property", &doc.id, id)?;
        if let Some(opposite) = &doc.opposite {
            self.opposites.push((id, opposite.clone()));
        }
        Ok(())
    }
}

fn insert_unique<T>(
    ids: &mut HashMap<String, T>,
    kind: &'static str,
    id: &str,
    value: T,
) -> Result<(), ModelError> {
    if ids.contains_key(id) {
        return Err(ModelError::DuplicateId {
            kind,
            id: id.to_string(),
        });
    }
    ids.insert(id.to_string(), value);
    Ok(())
}

fn lookup<T: Copy>(
    ids: &HashMap<String, T>,
    kind: &'static str,
    id: &str,
    referrer: &str,
) -> Result<T, ModelError> {
    ids.get(id).copied().ok_or_else(|| ModelError::UnknownReference {
        kind,
        id: id.to_string(),
        referrer: referrer.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::is_in_profile;
    use crate::model::{PropertyType, UpperBound};

    const DOCUMENT: &str = r#"{
        "packages": [
            { "id": "kernel", "name": "Kernel" },
            { "id": "profile", "name": "Profile", "profile": true },
            { "id": "nested", "name": "Stereotypes", "package": "profile" }
        ],
        "classes": [
            {
                "id": "element",
                "name": "Element",
                "package": "kernel",
                "attributes": [
                    { "id": "element-owner", "name": "owner", "type": "element",
                      "upper": 1, "derived": true, "opposite": "element-owned" },
                    { "id": "element-owned", "name": "ownedElement", "type": "element",
                      "upper": "*", "derived": true, "opposite": "element-owner" }
                ],
                "operations": ["isKindOf"]
            },
            {
                "id": "comment",
                "name": "Comment",
                "generalizations": ["element"],
                "attributes": [
                    { "id": "comment-body", "name": "body", "type_value": "String",
                      "default": "" },
                    { "id": "comment-annotated", "name": "annotatedElement",
                      "type": "element", "association": "annotation",
                      "slots": { "subsets": "ownedElement" } }
                ]
            },
            { "id": "block", "name": "Block", "package": "nested" }
        ],
        "associations": [
            {
                "id": "annotation",
                "owned_ends": [
                    { "id": "annotation-end", "type": "comment", "lower": 0 }
                ]
            }
        ]
    }"#;

    #[test]
    fn test_parse_builds_model() {
        let model = parse_model(DOCUMENT).unwrap();
        assert_eq!(model.class_count(), 3);

        let element = model.find_class("Element").unwrap();
        let comment = model.find_class("Comment").unwrap();
        assert_eq!(model.class(comment).generalizations, vec![element]);
        assert_eq!(model.class(element).operations.len(), 1);

        let attrs: Vec<_> = model.attributes(element).map(|(id, _)| id).collect();
        let owner = model.property(attrs[0]);
        assert_eq!(owner.ty, PropertyType::Class(element));
        assert_eq!(owner.multiplicity.upper, Some(UpperBound::Finite(1)));
        assert_eq!(owner.opposite, Some(attrs[1]));
        assert_eq!(
            model.property(attrs[1]).multiplicity.upper,
            Some(UpperBound::Unlimited)
        );
    }

    #[test]
    fn test_parse_slots_and_associations() {
        let model = parse_model(DOCUMENT).unwrap();
        let comment = model.find_class("Comment").unwrap();
        let (_, annotated) = model
            .attributes(comment)
            .find(|(_, a)| a.name.as_deref() == Some("annotatedElement"))
            .unwrap();

        assert_eq!(annotated.slot_value("subsets"), Some("ownedElement"));
        let association = annotated.association.unwrap();
        assert_eq!(model.association(association).owned_ends.len(), 1);
    }

    #[test]
    fn test_parse_nested_profile() {
        let model = parse_model(DOCUMENT).unwrap();
        let block = model.find_class("Block").unwrap();
        assert!(is_in_profile(&model, block));
    }

    #[test]
    fn test_primitive_type_value_wins_over_reference() {
        let model = parse_model(
            r#"{ "classes": [ { "id": "a", "name": "A", "attributes": [
                { "id": "x", "name": "x", "type": "a", "type_value": "int" } ] } ] }"#,
        )
        .unwrap();
        let a = model.find_class("A").unwrap();
        let (_, x) = model.attributes(a).next().unwrap();
        assert_eq!(x.ty, PropertyType::Unresolved("int".to_string()));
    }

    #[test]
    fn test_duplicate_id_is_error() {
        let err = parse_model(
            r#"{ "classes": [ { "id": "a", "name": "A" }, { "id": "a", "name": "B" } ] }"#,
        )
        .unwrap_err();
        assert!(matches!(err, ModelError::DuplicateId { kind: "class", .. }));
    }

    #[test]
    fn test_unknown_reference_is_error() {
        let err = parse_model(
            r#"{ "classes": [ { "id": "a", "name": "A", "generalizations": ["missing"] } ] }"#,
        )
        .unwrap_err();
        match err {
            ModelError::UnknownReference { kind, id, referrer } => {
                assert_eq!(kind, "class");
                assert_eq!(id, "missing");
                assert_eq!(referrer, "a");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_invalid_upper_bound_is_error() {
        let err = parse_model(
            r#"{ "classes": [ { "id": "a", "name": "A", "attributes": [
                { "id": "x", "name": "x", "upper": "many" } ] } ] }"#,
        )
        .unwrap_err();
        assert!(matches!(err, ModelError::Json(_)));
    }

    #[test]
    fn test_load_model_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_model(&dir.path().join("missing.json")).unwrap_err();
        assert!(matches!(err, ModelError::Io { .. }));
    }
}
