//! # modelgen
//!
//! Model-driven source generation. A meta-model of classes, properties,
//! associations, generalizations and stereotypes goes in; object-model
//! declarations come out: classes with inheritance, typed attributes,
//! enumerations and bidirectional associations, including derived unions
//! and redefinitions.
//!
//! Generation runs in two phases over a normalized [`Model`]:
//!
//! 1. [`declare`]: every candidate class, bases first, becomes a class
//!    statement, an override block, or an import of a type a super model
//!    already generated.
//! 2. [`link`]: associations, derived unions, redefinitions and `subsets`
//!    registrations, once every class name exists.
//!
//! ## Example
//!
//! ```
//! use modelgen::{normalize, Generator, Model, PropertyDef, UpperBound};
//!
//! let mut model = Model::new();
//! let element = model.add_class("Element");
//! let comment = model.add_class("Comment");
//! model.add_generalization(comment, element);
//! model.add_attribute(comment, PropertyDef::named("body").type_value("String"));
//! model.add_attribute(
//!     comment,
//!     PropertyDef::named("annotatedElement")
//!         .typed(element)
//!         .upper(UpperBound::Unlimited),
//! );
//! normalize(&mut model).unwrap();
//!
//! let output = Generator::new(&model).generate().unwrap();
//! let content = output.content();
//! assert!(content.contains("class Comment(Element):"));
//! assert!(content.contains(
//!     "Comment.annotatedElement = association(\"annotatedElement\", Element)"
//! ));
//! ```

pub mod classify;
pub mod coerce;
pub mod declare;
pub mod document;
pub mod error;
pub mod generator;
pub mod hierarchy;
pub mod language;
pub mod link;
pub mod model;
pub mod normalize;
pub mod overrides;
pub mod resolve;

pub use declare::{DeclaredClasses, Declaration, Member};
pub use document::{load_model, parse_model, ModelDocument};
pub use error::{Error, GenerateError, ModelError, OverrideError, Result, Warning};
pub use generator::{ClassOrigin, GeneratedClass, GeneratedOutput, Generator, HEADER};
pub use language::{default_module, ElementType, GeneratedLanguage, ModelingLanguage, SuperModel};
pub use link::{LinkedAssociations, Statement};
pub use model::{
    AggregationKind, ClassId, DefaultValue, Literal, Model, Multiplicity, PrimitiveKind,
    PropertyDef, PropertyId, PropertyType, UpperBound,
};
pub use normalize::normalize;
pub use overrides::Overrides;

use std::path::Path;

/// Load a model document and normalize it.
pub fn load_normalized(path: &Path) -> Result<Model> {
    let mut model = load_model(path)?;
    normalize(&mut model)?;
    Ok(model)
}
