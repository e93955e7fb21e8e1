//! Cross-model resolution.
//!
//! Classes are identified across models by name. Within one generation
//! unit names are expected to be unique; when they are not, the import of a
//! super-model type is aliased and the alias is recorded in
//! [`EmittedNames`]. The logical class name in the model never changes.

use crate::classify::{is_enumeration, is_in_profile};
use crate::error::GenerateError;
use crate::hierarchy::bases;
use crate::language::{ElementType, SuperModel};
use crate::model::{ClassId, Model, Property, PropertyId};
use std::collections::{HashMap, HashSet};
use std::fmt;

/// A class found in a super model.
#[derive(Debug, Clone)]
pub struct SuperClass<'a> {
    /// Generated type provided by the super model's language.
    pub element_type: ElementType,
    pub model: &'a Model,
    pub class: ClassId,
}

/// Find a same-named class in the super models, in declaration order.
///
/// Profile classes and enumerations never match. A match whose language
/// does not provide a generated type is an internal consistency violation.
pub fn in_super_model<'a>(
    name: &str,
    super_models: &'a [SuperModel],
) -> Result<Option<SuperClass<'a>>, GenerateError> {
    for super_model in super_models {
        let model = &super_model.model;
        let found = model
            .select_classes(|_, c| c.name == name)
            .find(|cid| !(is_in_profile(model, *cid) || is_enumeration(model, *cid)));

        if let Some(class) = found {
            let element_type = super_model.language.lookup_element(name).ok_or_else(|| {
                GenerateError::MissingGeneratedType {
                    language: super_model.language.id().to_string(),
                    class: name.to_string(),
                }
            })?;
            return Ok(Some(SuperClass {
                element_type,
                model,
                class,
            }));
        }
    }

    Ok(None)
}

/// A feature (attribute) found by name.
#[derive(Debug, Clone)]
pub struct Feature<'a> {
    pub model: &'a Model,
    pub property: PropertyId,
    /// Set when the feature was reached through a super model.
    pub element_type: Option<ElementType>,
}

impl<'a> Feature<'a> {
    pub fn property(&self) -> &'a Property {
        self.model.property(self.property)
    }

    /// Name of the class owning the feature.
    pub fn owner_name(&self) -> Option<&'a str> {
        self.model
            .owning_class(self.property)
            .map(|c| self.model.class(c).name.as_str())
    }
}

/// Find a feature by name on a class, its bases, and then on the same-named
/// class of a super model.
pub fn find_feature<'a>(
    model: &'a Model,
    class: ClassId,
    name: &str,
    super_models: &'a [SuperModel],
) -> Result<Option<Feature<'a>>, GenerateError> {
    let mut finder = FeatureFinder {
        super_models,
        visited: HashSet::new(),
    };
    finder.find(model, class, name)
}

/// Like [`find_feature`], but skips the attributes the class owns itself.
pub fn find_inherited_feature<'a>(
    model: &'a Model,
    class: ClassId,
    name: &str,
    super_models: &'a [SuperModel],
) -> Result<Option<Feature<'a>>, GenerateError> {
    let mut finder = FeatureFinder {
        super_models,
        visited: HashSet::new(),
    };
    finder.visited.insert((model_key(model), class));
    finder.inherited(model, class, name)
}

struct FeatureFinder<'a> {
    super_models: &'a [SuperModel],
    /// (model address, class) pairs already searched.
    visited: HashSet<(usize, ClassId)>,
}

impl<'a> FeatureFinder<'a> {
    fn find(
        &mut self,
        model: &'a Model,
        class: ClassId,
        name: &str,
    ) -> Result<Option<Feature<'a>>, GenerateError> {
        if !self.visited.insert((model_key(model), class)) {
            return Ok(None);
        }

        if let Some((property, _)) = model
            .attributes(class)
            .find(|(_, a)| a.name.as_deref() == Some(name))
        {
            return Ok(Some(Feature {
                model,
                property,
                element_type: None,
            }));
        }

        self.inherited(model, class, name)
    }

    fn inherited(
        &mut self,
        model: &'a Model,
        class: ClassId,
        name: &str,
    ) -> Result<Option<Feature<'a>>, GenerateError> {
        for base in bases(model, class) {
            if let Some(feature) = self.find(model, base, name)? {
                return Ok(Some(feature));
            }
        }

        if let Some(super_class) = in_super_model(&model.class(class).name, self.super_models)? {
            let same = std::ptr::eq(super_class.model, model) && super_class.class == class;
            if !same {
                let found = self.find(super_class.model, super_class.class, name)?;
                return Ok(found.map(|feature| Feature {
                    element_type: Some(super_class.element_type),
                    ..feature
                }));
            }
        }

        Ok(None)
    }
}

fn model_key(model: &Model) -> usize {
    model as *const Model as usize
}

/// An import statement for a generated type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Import {
    pub module: String,
    pub name: String,
    pub alias: Option<String>,
}

impl Import {
    pub fn new(module: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            name: name.into(),
            alias: None,
        }
    }

    pub fn aliased(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Name the import binds in the generated module.
    pub fn local_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}

impl fmt::Display for Import {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "from {} import {}", self.module, self.name)?;
        if let Some(alias) = &self.alias {
            write!(f, " as {}", alias)?;
        }
        Ok(())
    }
}

/// Imports already emitted; each import appears once in the output.
#[derive(Debug, Clone, Default)]
pub struct ImportSet {
    seen: HashSet<Import>,
}

impl ImportSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an import. Returns `false` if it was emitted before.
    pub fn insert(&mut self, import: &Import) -> bool {
        self.seen.insert(import.clone())
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

/// Identifiers used for classes in the generated output.
///
/// A class is emitted under its own name unless its import had to be
/// aliased.
#[derive(Debug, Clone, Default)]
pub struct EmittedNames {
    aliases: HashMap<ClassId, String>,
}

impl EmittedNames {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_alias(&mut self, class: ClassId, alias: impl Into<String>) {
        self.aliases.insert(class, alias.into());
    }

    pub fn alias(&self, class: ClassId) -> Option<&str> {
        self.aliases.get(&class).map(String::as_str)
    }

    /// The identifier a class is referred to by in the output.
    pub fn name<'m>(&'m self, model: &'m Model, class: ClassId) -> &'m str {
        self.alias(class).unwrap_or(&model.class(class).name)
    }
}

/// Import replacing the declaration of a class that has no local bases,
/// when a super model already generated it.
///
/// The import is aliased as `_<Name>` when several of the ordered classes
/// share the name.
pub fn resolve_import(
    model: &Model,
    class: ClassId,
    ordered: &[ClassId],
    super_models: &[SuperModel],
) -> Result<Option<Import>, GenerateError> {
    let name = &model.class(class).name;
    let Some(super_class) = in_super_model(name, super_models)? else {
        return Ok(None);
    };

    let import = Import::new(super_class.element_type.module, super_class.element_type.name);
    let namesakes = ordered
        .iter()
        .filter(|c| model.class(**c).name == *name)
        .count();

    if namesakes > 1 {
        Ok(Some(import.aliased(format!("_{}", name))))
    } else {
        Ok(Some(import))
    }
}
