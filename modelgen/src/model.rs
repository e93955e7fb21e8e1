//! In-memory meta-model repository.
//!
//! The repository is an arena of packages, classes, associations and
//! properties addressed by typed ids. It is built once (by the document
//! loader or programmatically), normalized once, and then only read by the
//! generator.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a package within a [`Model`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PackageId(usize);

/// Identifier of a class within a [`Model`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClassId(usize);

/// Identifier of an association within a [`Model`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AssociationId(usize);

/// Identifier of a property (attribute or association end) within a [`Model`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PropertyId(usize);

/// A package. Packages nest; a profile package marks everything it
/// (transitively) owns as profile-internal.
#[derive(Debug, Clone)]
pub struct Package {
    pub name: String,
    pub owner: Option<PackageId>,
    pub is_profile: bool,
}

/// A class of the meta-model.
#[derive(Debug, Clone)]
pub struct Class {
    pub name: String,
    pub package: Option<PackageId>,
    /// Direct generalizations (edges to base classes), in declared order.
    pub generalizations: Vec<ClassId>,
    /// Names of the applied stereotypes.
    pub stereotypes: Vec<String>,
    /// Owned attributes, in declared order.
    pub attributes: Vec<PropertyId>,
    pub operations: Vec<Operation>,
}

/// An owned operation. Only its name matters to the generator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operation {
    pub name: Option<String>,
}

/// An association between classes.
#[derive(Debug, Clone)]
pub struct Association {
    pub name: Option<String>,
    /// Stereotype extension associations connect a stereotype to the
    /// metaclass it extends.
    pub is_extension: bool,
    pub owned_ends: Vec<PropertyId>,
}

/// Who owns a property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyOwner {
    Class(ClassId),
    Association(AssociationId),
}

/// Primitive value kinds an attribute can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    String,
    Boolean,
    Integer,
    UnlimitedNatural,
}

impl PrimitiveKind {
    /// Canonicalize a raw type value alias.
    pub fn from_alias(alias: &str) -> Option<Self> {
        match alias {
            "String" | "str" | "object" => Some(Self::String),
            "Boolean" | "bool" => Some(Self::Boolean),
            "Integer" | "int" => Some(Self::Integer),
            "UnlimitedNatural" => Some(Self::UnlimitedNatural),
            _ => None,
        }
    }

    /// The type name used in generated declarations.
    pub fn type_name(self) -> &'static str {
        match self {
            Self::String => "str",
            Self::Boolean => "bool",
            Self::Integer => "int",
            Self::UnlimitedNatural => "UnlimitedNatural",
        }
    }
}

impl fmt::Display for PrimitiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

/// The type of a property.
///
/// Loading produces `Unset`, `Unresolved` or `Class`; normalization turns
/// every `Unresolved` into `Primitive` or `Class`, and tags class references
/// to enumerations as `Enumeration`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum PropertyType {
    #[default]
    Unset,
    /// A raw type value string not resolved yet.
    Unresolved(String),
    Primitive(PrimitiveKind),
    Class(ClassId),
    Enumeration(ClassId),
}

impl PropertyType {
    /// The referenced class, for class and enumeration types.
    pub fn class(&self) -> Option<ClassId> {
        match self {
            Self::Class(id) | Self::Enumeration(id) => Some(*id),
            _ => None,
        }
    }

    pub fn is_unset(&self) -> bool {
        matches!(self, Self::Unset)
    }
}

/// Aggregation kind of an association end.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregationKind {
    #[default]
    None,
    Shared,
    Composite,
}

/// Upper multiplicity bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "BoundRepr", into = "BoundRepr")]
pub enum UpperBound {
    Finite(u32),
    /// `*`
    Unlimited,
}

impl UpperBound {
    /// Parse the textual form: `*` or a non-negative integer.
    pub fn parse(text: &str) -> Option<Self> {
        match text.trim() {
            "*" => Some(Self::Unlimited),
            digits => digits.parse().ok().map(Self::Finite),
        }
    }
}

impl fmt::Display for UpperBound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Finite(n) => write!(f, "{}", n),
            Self::Unlimited => f.write_str("*"),
        }
    }
}

/// Serialized form of an [`UpperBound`]: a number or a string.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum BoundRepr {
    Count(u32),
    Text(String),
}

impl TryFrom<BoundRepr> for UpperBound {
    type Error = String;

    fn try_from(repr: BoundRepr) -> Result<Self, Self::Error> {
        match repr {
            BoundRepr::Count(n) => Ok(Self::Finite(n)),
            BoundRepr::Text(text) => {
                Self::parse(&text).ok_or_else(|| format!("invalid upper bound '{}'", text))
            }
        }
    }
}

impl From<UpperBound> for BoundRepr {
    fn from(bound: UpperBound) -> Self {
        match bound {
            UpperBound::Finite(n) => BoundRepr::Count(n),
            UpperBound::Unlimited => BoundRepr::Text("*".to_string()),
        }
    }
}

/// Multiplicity bounds. Absent bounds are `None`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Multiplicity {
    pub lower: Option<u32>,
    pub upper: Option<UpperBound>,
}

impl Multiplicity {
    /// Whether at most one value is allowed (upper bound exactly 1).
    pub fn is_singular(&self) -> bool {
        self.upper == Some(UpperBound::Finite(1))
    }
}

/// A typed literal value specification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Literal {
    String(String),
    Integer(i64),
    Boolean(bool),
    UnlimitedNatural(UpperBound),
}

/// Default value of an attribute: either a literal specification or raw
/// text as typed into the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DefaultValue {
    Literal(Literal),
    Text(String),
}

/// A stereotype slot applied to a property (`subsets`, `redefines`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slot {
    pub feature: String,
    pub value: String,
}

/// A property: class attribute or association end.
#[derive(Debug, Clone)]
pub struct Property {
    pub name: Option<String>,
    pub owner: PropertyOwner,
    pub ty: PropertyType,
    pub multiplicity: Multiplicity,
    pub is_derived: bool,
    pub aggregation: AggregationKind,
    pub default: Option<DefaultValue>,
    pub opposite: Option<PropertyId>,
    pub association: Option<AssociationId>,
    pub slots: Vec<Slot>,
}

impl Property {
    /// Name or the empty string for unnamed ends.
    pub fn name_or_empty(&self) -> &str {
        self.name.as_deref().unwrap_or("")
    }

    /// First value of the slot with the given defining feature.
    pub fn slot_value(&self, feature: &str) -> Option<&str> {
        self.slots
            .iter()
            .find(|s| s.feature == feature)
            .map(|s| s.value.as_str())
    }

    /// Values of every slot with the given defining feature.
    pub fn slot_values<'a>(&'a self, feature: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.slots
            .iter()
            .filter(move |s| s.feature == feature)
            .map(|s| s.value.as_str())
    }
}

/// Description of a property to add to a model.
#[derive(Debug, Clone, Default)]
pub struct PropertyDef {
    pub name: Option<String>,
    pub ty: PropertyType,
    pub multiplicity: Multiplicity,
    pub is_derived: bool,
    pub aggregation: AggregationKind,
    pub default: Option<DefaultValue>,
    pub association: Option<AssociationId>,
    pub slots: Vec<Slot>,
}

impl PropertyDef {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Default::default()
        }
    }

    pub fn unnamed() -> Self {
        Self::default()
    }

    pub fn typed(mut self, class: ClassId) -> Self {
        self.ty = PropertyType::Class(class);
        self
    }

    pub fn type_value(mut self, value: impl Into<String>) -> Self {
        self.ty = PropertyType::Unresolved(value.into());
        self
    }

    pub fn lower(mut self, lower: u32) -> Self {
        self.multiplicity.lower = Some(lower);
        self
    }

    pub fn upper(mut self, upper: UpperBound) -> Self {
        self.multiplicity.upper = Some(upper);
        self
    }

    pub fn derived(mut self) -> Self {
        self.is_derived = true;
        self
    }

    pub fn composite(mut self) -> Self {
        self.aggregation = AggregationKind::Composite;
        self
    }

    pub fn default_value(mut self, value: DefaultValue) -> Self {
        self.default = Some(value);
        self
    }

    pub fn in_association(mut self, association: AssociationId) -> Self {
        self.association = Some(association);
        self
    }

    pub fn slot(mut self, feature: impl Into<String>, value: impl Into<String>) -> Self {
        self.slots.push(Slot {
            feature: feature.into(),
            value: value.into(),
        });
        self
    }
}

/// The meta-model repository.
#[derive(Debug, Clone, Default)]
pub struct Model {
    packages: Vec<Package>,
    classes: Vec<Class>,
    associations: Vec<Association>,
    properties: Vec<Property>,
}

impl Model {
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // Construction
    // =========================================================================

    pub fn add_package(
        &mut self,
        name: impl Into<String>,
        owner: Option<PackageId>,
        is_profile: bool,
    ) -> PackageId {
        self.packages.push(Package {
            name: name.into(),
            owner,
            is_profile,
        });
        PackageId(self.packages.len() - 1)
    }

    pub fn set_package_owner(&mut self, package: PackageId, owner: Option<PackageId>) {
        self.packages[package.0].owner = owner;
    }

    pub fn add_class(&mut self, name: impl Into<String>) -> ClassId {
        self.classes.push(Class {
            name: name.into(),
            package: None,
            generalizations: Vec::new(),
            stereotypes: Vec::new(),
            attributes: Vec::new(),
            operations: Vec::new(),
        });
        ClassId(self.classes.len() - 1)
    }

    pub fn set_class_package(&mut self, class: ClassId, package: PackageId) {
        self.classes[class.0].package = Some(package);
    }

    pub fn add_generalization(&mut self, specific: ClassId, general: ClassId) {
        self.classes[specific.0].generalizations.push(general);
    }

    pub fn apply_stereotype(&mut self, class: ClassId, stereotype: impl Into<String>) {
        self.classes[class.0].stereotypes.push(stereotype.into());
    }

    pub fn add_operation(&mut self, class: ClassId, name: impl Into<String>) {
        self.classes[class.0].operations.push(Operation {
            name: Some(name.into()),
        });
    }

    pub fn add_association(&mut self, name: Option<String>, is_extension: bool) -> AssociationId {
        self.associations.push(Association {
            name,
            is_extension,
            owned_ends: Vec::new(),
        });
        AssociationId(self.associations.len() - 1)
    }

    /// Add an owned attribute to a class.
    pub fn add_attribute(&mut self, class: ClassId, def: PropertyDef) -> PropertyId {
        let id = self.push_property(PropertyOwner::Class(class), def);
        self.classes[class.0].attributes.push(id);
        id
    }

    /// Add an end owned by the association itself.
    pub fn add_owned_end(&mut self, association: AssociationId, def: PropertyDef) -> PropertyId {
        let def = PropertyDef {
            association: Some(association),
            ..def
        };
        let id = self.push_property(PropertyOwner::Association(association), def);
        self.associations[association.0].owned_ends.push(id);
        id
    }

    /// Make two properties each other's opposite.
    pub fn set_opposites(&mut self, a: PropertyId, b: PropertyId) {
        self.properties[a.0].opposite = Some(b);
        self.properties[b.0].opposite = Some(a);
    }

    pub fn set_opposite(&mut self, property: PropertyId, opposite: PropertyId) {
        self.properties[property.0].opposite = Some(opposite);
    }

    fn push_property(&mut self, owner: PropertyOwner, def: PropertyDef) -> PropertyId {
        self.properties.push(Property {
            name: def.name,
            owner,
            ty: def.ty,
            multiplicity: def.multiplicity,
            is_derived: def.is_derived,
            aggregation: def.aggregation,
            default: def.default,
            opposite: None,
            association: def.association,
            slots: def.slots,
        });
        PropertyId(self.properties.len() - 1)
    }

    pub(crate) fn property_mut(&mut self, id: PropertyId) -> &mut Property {
        &mut self.properties[id.0]
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub fn package(&self, id: PackageId) -> &Package {
        &self.packages[id.0]
    }

    pub fn class(&self, id: ClassId) -> &Class {
        &self.classes[id.0]
    }

    pub fn association(&self, id: AssociationId) -> &Association {
        &self.associations[id.0]
    }

    pub fn property(&self, id: PropertyId) -> &Property {
        &self.properties[id.0]
    }

    /// All classes in insertion order.
    pub fn classes(&self) -> impl Iterator<Item = (ClassId, &Class)> {
        self.classes.iter().enumerate().map(|(i, c)| (ClassId(i), c))
    }

    /// Ids of all properties in insertion order.
    pub fn property_ids(&self) -> impl Iterator<Item = PropertyId> {
        (0..self.properties.len()).map(PropertyId)
    }

    /// Classes matching a predicate, in insertion order.
    pub fn select_classes<'a, F>(&'a self, predicate: F) -> impl Iterator<Item = ClassId> + 'a
    where
        F: Fn(ClassId, &Class) -> bool + 'a,
    {
        self.classes()
            .filter(move |(id, c)| predicate(*id, c))
            .map(|(id, _)| id)
    }

    /// First class with the given name.
    pub fn find_class(&self, name: &str) -> Option<ClassId> {
        self.select_classes(|_, c| c.name == name).next()
    }

    /// Owned attributes of a class with their ids, in declared order.
    pub fn attributes(&self, class: ClassId) -> impl Iterator<Item = (PropertyId, &Property)> {
        self.classes[class.0]
            .attributes
            .iter()
            .map(move |id| (*id, &self.properties[id.0]))
    }

    /// The class owning a property, if it is a class attribute.
    pub fn owning_class(&self, property: PropertyId) -> Option<ClassId> {
        match self.properties[property.0].owner {
            PropertyOwner::Class(id) => Some(id),
            PropertyOwner::Association(_) => None,
        }
    }

    pub fn class_count(&self) -> usize {
        self.classes.len()
    }

    /// `Owner.name` of a property, for diagnostics.
    pub fn qualified_name(&self, property: PropertyId) -> String {
        let prop = &self.properties[property.0];
        let owner = match prop.owner {
            PropertyOwner::Class(id) => self.classes[id.0].name.as_str(),
            PropertyOwner::Association(id) => self.associations[id.0]
                .name
                .as_deref()
                .unwrap_or("<association>"),
        };
        format!("{}.{}", owner, prop.name_or_empty())
    }
}
