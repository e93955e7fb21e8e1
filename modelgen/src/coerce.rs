//! Default-value and multiplicity coercion.
//!
//! Translates multiplicity bounds and literal default values into the
//! literal syntax of generated declarations.

use crate::error::GenerateError;
use crate::model::{AggregationKind, DefaultValue, Literal, Multiplicity, PrimitiveKind, UpperBound};

/// Lower bound literal, or `None` when absent or zero.
pub fn lower_literal(multiplicity: &Multiplicity) -> Option<u32> {
    multiplicity.lower.filter(|lower| *lower != 0)
}

/// Upper bound literal, or `None` when absent or unbounded.
pub fn upper_literal(multiplicity: &Multiplicity) -> Option<u32> {
    match multiplicity.upper {
        Some(UpperBound::Finite(n)) => Some(n),
        Some(UpperBound::Unlimited) | None => None,
    }
}

/// `, lower=N, upper=M` with the omitted parts left out.
pub fn bound_arguments(multiplicity: &Multiplicity) -> String {
    let mut args = String::new();
    if let Some(lower) = lower_literal(multiplicity) {
        args.push_str(&format!(", lower={}", lower));
    }
    if let Some(upper) = upper_literal(multiplicity) {
        args.push_str(&format!(", upper={}", upper));
    }
    args
}

/// `, composite=True` for composite aggregation.
pub fn composite_argument(aggregation: AggregationKind) -> &'static str {
    if aggregation == AggregationKind::Composite {
        ", composite=True"
    } else {
        ""
    }
}

/// `, default=<literal>` for an attribute default, or the empty string.
pub fn default_argument(
    feature: &str,
    kind: PrimitiveKind,
    value: Option<&DefaultValue>,
) -> Result<String, GenerateError> {
    match value {
        Some(value) => Ok(format!(", default={}", default_literal(feature, kind, value)?)),
        None => Ok(String::new()),
    }
}

/// Coerce a default value to a literal of the given primitive kind.
pub fn default_literal(
    feature: &str,
    kind: PrimitiveKind,
    value: &DefaultValue,
) -> Result<String, GenerateError> {
    let mismatch = || GenerateError::DefaultValueMismatch {
        feature: feature.to_string(),
        kind: kind.to_string(),
        value: raw_text(value),
    };

    match kind {
        PrimitiveKind::Integer => match value {
            DefaultValue::Literal(Literal::Integer(n)) => Ok(n.to_string()),
            DefaultValue::Literal(Literal::UnlimitedNatural(UpperBound::Finite(n))) => {
                Ok(n.to_string())
            }
            DefaultValue::Literal(Literal::String(text)) | DefaultValue::Text(text) => text
                .trim()
                .parse::<i64>()
                .map(|n| n.to_string())
                .map_err(|_| mismatch()),
            _ => Err(mismatch()),
        },
        PrimitiveKind::String => match value {
            DefaultValue::Literal(Literal::String(text)) | DefaultValue::Text(text) => {
                Ok(quote(text))
            }
            _ => Err(mismatch()),
        },
        PrimitiveKind::Boolean => match value {
            DefaultValue::Literal(Literal::Boolean(b)) => Ok(bool_literal(*b).to_string()),
            DefaultValue::Literal(Literal::String(text)) | DefaultValue::Text(text) => {
                match text.trim() {
                    "true" | "True" => Ok(bool_literal(true).to_string()),
                    "false" | "False" => Ok(bool_literal(false).to_string()),
                    _ => Err(mismatch()),
                }
            }
            _ => Err(mismatch()),
        },
        PrimitiveKind::UnlimitedNatural => Err(GenerateError::UnknownValueType {
            feature: feature.to_string(),
            kind: kind.to_string(),
            value: raw_text(value),
        }),
    }
}

fn bool_literal(value: bool) -> &'static str {
    if value {
        "True"
    } else {
        "False"
    }
}

/// Double-quoted string literal with `\`, `"` and control characters
/// escaped.
pub fn quote(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

fn raw_text(value: &DefaultValue) -> String {
    match value {
        DefaultValue::Text(text) => text.clone(),
        DefaultValue::Literal(Literal::String(text)) => text.clone(),
        DefaultValue::Literal(Literal::Integer(n)) => n.to_string(),
        DefaultValue::Literal(Literal::Boolean(b)) => b.to_string(),
        DefaultValue::Literal(Literal::UnlimitedNatural(bound)) => bound.to_string(),
    }
}
