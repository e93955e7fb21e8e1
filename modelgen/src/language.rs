//! Modeling languages and super models.
//!
//! A super model is a model that was generated before and that the current
//! model extends. Its modeling language knows which types that generation
//! produced and in which module they live, so the current generation can
//! import them instead of declaring them again.

use crate::classify::is_candidate;
use crate::model::Model;
use std::collections::BTreeSet;
use std::fmt;

/// A generated type: the module it lives in and its name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementType {
    pub module: String,
    pub name: String,
}

impl ElementType {
    pub fn new(module: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.module, self.name)
    }
}

/// Registry of the types a modeling language provides.
pub trait ModelingLanguage: Send + Sync {
    /// Short identifier of the language (e.g. "UML").
    fn id(&self) -> &str;

    /// Look up a generated type by class name.
    fn lookup_element(&self, name: &str) -> Option<ElementType>;
}

/// A modeling language whose types were generated from a model.
///
/// It provides exactly the classes that generating its model emits as
/// class declarations.
#[derive(Debug, Clone)]
pub struct GeneratedLanguage {
    id: String,
    module: String,
    types: BTreeSet<String>,
}

impl GeneratedLanguage {
    pub fn new(
        id: impl Into<String>,
        module: impl Into<String>,
        types: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            id: id.into(),
            module: module.into(),
            types: types.into_iter().map(Into::into).collect(),
        }
    }

    /// Build the registry from the model the language was generated from.
    pub fn from_model(id: impl Into<String>, module: impl Into<String>, model: &Model) -> Self {
        let types = model
            .select_classes(|cid, _| is_candidate(model, cid))
            .map(|cid| model.class(cid).name.clone());
        Self::new(id, module, types)
    }

    pub fn types(&self) -> impl Iterator<Item = &str> {
        self.types.iter().map(String::as_str)
    }
}

impl ModelingLanguage for GeneratedLanguage {
    fn id(&self) -> &str {
        &self.id
    }

    fn lookup_element(&self, name: &str) -> Option<ElementType> {
        self.types
            .contains(name)
            .then(|| ElementType::new(self.module.clone(), name))
    }
}

/// Default module path of a language: `<prefix>.<Lang>.<lang>`.
pub fn default_module(prefix: &str, language: &str) -> String {
    if prefix.is_empty() {
        format!("{}.{}", language, language.to_lowercase())
    } else {
        format!("{}.{}.{}", prefix, language, language.to_lowercase())
    }
}

/// A previously generated model this generation may import from.
pub struct SuperModel {
    pub language: Box<dyn ModelingLanguage>,
    pub model: Model,
}

impl SuperModel {
    pub fn new(language: impl ModelingLanguage + 'static, model: Model) -> Self {
        Self {
            language: Box::new(language),
            model,
        }
    }

    /// A super model whose language is derived from the model itself.
    pub fn generated(id: impl Into<String>, module: impl Into<String>, model: Model) -> Self {
        let language = GeneratedLanguage::from_model(id, module, &model);
        Self::new(language, model)
    }
}

impl fmt::Debug for SuperModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SuperModel")
            .field("language", &self.language.id())
            .field("classes", &self.model.class_count())
            .finish()
    }
}
