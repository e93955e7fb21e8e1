//! Generation driver.
//!
//! Ties the phases together: candidate selection, ordering, class
//! declarations and association linking, and assembles the output blocks in
//! their fixed order.

use crate::classify::is_candidate;
use crate::declare::{declare_classes, Declaration, DeclaredClasses};
use crate::error::{Diagnostics, Error, GenerateError, Warning};
use crate::hierarchy::order_classes;
use crate::language::SuperModel;
use crate::link::link_associations_into;
use crate::model::Model;
use crate::overrides::Overrides;
use std::io::{self, Write};

/// Preamble of every generated module.
pub const HEADER: &str = "\
# This file is generated by modelgen. DO NOT EDIT!
# ruff: noqa: F401, E402, F811
# fmt: off

from __future__ import annotations

from gaphor.core.modeling.properties import (
    association,
    attribute as _attribute,
    derived,
    derivedunion,
    enumeration as _enumeration,
    redefine,
    relation_many,
    relation_one,
)

from gaphor.core.modeling.base import UnlimitedNatural
";

/// How a class ended up in the output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassOrigin {
    /// Declared by this generation.
    Declared,
    /// Imported from a super model's module.
    Imported { module: String },
    /// Replaced by an override block.
    Overridden,
}

/// A class of the generated module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedClass {
    /// Class name in the model.
    pub name: String,
    /// Identifier the output uses for the class.
    pub emitted_name: String,
    pub origin: ClassOrigin,
}

/// Generated module.
#[derive(Debug, Clone)]
pub struct GeneratedOutput {
    /// Output lines. Override blocks may span several physical lines.
    pub lines: Vec<String>,

    /// Classes in emission order.
    pub classes: Vec<GeneratedClass>,

    /// Warnings raised while generating.
    pub warnings: Vec<Warning>,
}

impl GeneratedOutput {
    /// Complete module text, newline terminated.
    pub fn content(&self) -> String {
        let mut content = String::new();
        for line in &self.lines {
            content.push_str(line);
            content.push('\n');
        }
        content
    }

    /// Write the module line by line.
    pub fn write_to<W: Write>(&self, mut writer: W) -> io::Result<()> {
        for line in &self.lines {
            writeln!(writer, "{}", line)?;
        }
        writer.flush()
    }
}

/// Generates an object-model module from a normalized model.
pub struct Generator<'a> {
    model: &'a Model,
    super_models: &'a [SuperModel],
    overrides: Option<&'a Overrides>,
}

impl<'a> Generator<'a> {
    pub fn new(model: &'a Model) -> Self {
        Self {
            model,
            super_models: &[],
            overrides: None,
        }
    }

    /// Models whose generated types may be imported instead of declared.
    pub fn with_super_models(mut self, super_models: &'a [SuperModel]) -> Self {
        self.super_models = super_models;
        self
    }

    pub fn with_overrides(mut self, overrides: &'a Overrides) -> Self {
        self.overrides = Some(overrides);
        self
    }

    /// Run both phases and assemble the module.
    pub fn generate(&self) -> Result<GeneratedOutput, GenerateError> {
        let model = self.model;
        let mut lines = Vec::new();
        let (declared, warnings) = self.emit(|line| {
            lines.push(line);
            Ok::<_, GenerateError>(())
        })?;

        let classes = declared
            .declarations
            .iter()
            .map(|declaration| {
                let class = declaration.class();
                let origin = match declaration {
                    Declaration::Override { .. } => ClassOrigin::Overridden,
                    Declaration::Import { import, .. } => ClassOrigin::Imported {
                        module: import.module.clone(),
                    },
                    Declaration::Class(_) => ClassOrigin::Declared,
                };
                GeneratedClass {
                    name: model.class(class).name.clone(),
                    emitted_name: declared.names.name(model, class).to_string(),
                    origin,
                }
            })
            .collect();

        Ok(GeneratedOutput {
            lines,
            classes,
            warnings,
        })
    }

    /// Run both phases, writing the module as it is produced.
    ///
    /// The header goes out once every class is declared and each
    /// association statement follows as soon as it is linked, so the module
    /// is never held in memory as a whole.
    pub fn generate_to<W: Write>(&self, mut writer: W) -> Result<Vec<Warning>, Error> {
        let (_, warnings) = self.emit(|line| {
            writeln!(writer, "{}", line)?;
            Ok::<_, Error>(())
        })?;
        writer.flush()?;
        Ok(warnings)
    }

    /// Hand every output line to `line`, in module order.
    fn emit<E, F>(&self, mut line: F) -> Result<(DeclaredClasses, Vec<Warning>), E>
    where
        E: From<GenerateError>,
        F: FnMut(String) -> Result<(), E>,
    {
        let model = self.model;
        let empty = Overrides::new();
        let overrides = self.overrides.unwrap_or(&empty);
        let mut diagnostics = Diagnostics::new();

        let candidates = model.select_classes(|id, _| is_candidate(model, id));
        let ordered = order_classes(model, candidates)?;
        tracing::debug!(classes = ordered.len(), "ordered classes");

        let declared = declare_classes(
            model,
            ordered,
            self.super_models,
            overrides,
            &mut diagnostics,
        )?;

        let mut count = 0;
        let mut emit = |text: String| {
            count += 1;
            line(text)
        };

        for header in HEADER.lines() {
            emit(header.to_string())?;
        }
        emit(String::new())?;
        emit(String::new())?;
        if let Some(header) = overrides.header() {
            emit(header.to_string())?;
        }
        let mut block = Vec::new();
        for declaration in &declared.declarations {
            declaration.render(&mut block);
            for text in block.drain(..) {
                emit(text)?;
            }
        }
        for operation in &declared.operations {
            emit(operation.clone())?;
        }
        emit(String::new())?;

        link_associations_into(
            model,
            &declared,
            self.super_models,
            overrides,
            &mut diagnostics,
            |statement| emit(statement.to_string()),
        )?;

        let warnings = diagnostics.into_warnings();
        tracing::info!(lines = count, warnings = warnings.len(), "generated module");

        Ok((declared, warnings))
    }
}
