//! Normalization pass.
//!
//! Runs once after loading, before any emission. Raw type value strings are
//! resolved into explicit [`PropertyType`] variants so the emitter never has
//! to inspect strings:
//!
//! | Type value | Result |
//! |------------|--------|
//! | `String`, `str`, `object` | `Primitive(String)` |
//! | `Boolean`, `bool` | `Primitive(Boolean)` |
//! | `Integer`, `int` | `Primitive(Integer)` |
//! | `UnlimitedNatural` | `Primitive(UnlimitedNatural)` |
//! | name of a class in the model | `Class`, composite aggregation |
//!
//! Class references to simple types are flattened to strings and class
//! references to enumerations become `Enumeration`.

use crate::classify::{is_enumeration, is_simple_type};
use crate::error::GenerateError;
use crate::model::{AggregationKind, Model, PrimitiveKind, PropertyType};

/// Normalize every property of the model in place.
pub fn normalize(model: &mut Model) -> Result<(), GenerateError> {
    let ids: Vec<_> = model.property_ids().collect();

    for id in ids {
        let mut composite = false;
        let mut ty = match model.property(id).ty.clone() {
            PropertyType::Unresolved(value) => match PrimitiveKind::from_alias(&value) {
                Some(kind) => PropertyType::Primitive(kind),
                None => match model.find_class(&value) {
                    Some(class) => {
                        composite = true;
                        PropertyType::Class(class)
                    }
                    None => PropertyType::Unresolved(value),
                },
            },
            other => other,
        };

        if let Some(class) = ty.class() {
            if is_simple_type(model, class) {
                ty = PropertyType::Primitive(PrimitiveKind::String);
            } else if is_enumeration(model, class) {
                ty = PropertyType::Enumeration(class);
            } else {
                ty = PropertyType::Class(class);
            }
        }

        if let PropertyType::Unresolved(value) = &ty {
            return Err(GenerateError::UnknownTypeValue {
                feature: model.qualified_name(id),
                type_value: value.clone(),
            });
        }

        let prop = model.property_mut(id);
        prop.ty = ty;
        if composite {
            prop.aggregation = AggregationKind::Composite;
        }
    }

    tracing::debug!(properties = model.property_ids().count(), "normalized model");
    Ok(())
}
