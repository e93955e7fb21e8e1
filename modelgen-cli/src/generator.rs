//! Module generator for the CLI.
//!
//! Loads every input the configuration names, builds the super models and
//! runs the library generator over the normalized model.

use crate::config::{Config, SuperModelSpec};
use crate::error::CliResult;
use modelgen::{
    load_normalized, GeneratedOutput, Generator, Model, Overrides, SuperModel, Warning,
};
use std::io::Write;

/// Everything a generation reads.
struct Inputs {
    model: Model,
    super_models: Vec<SuperModel>,
    overrides: Overrides,
}

impl Inputs {
    fn generator(&self) -> Generator<'_> {
        Generator::new(&self.model)
            .with_super_models(&self.super_models)
            .with_overrides(&self.overrides)
    }
}

/// Generates a module from the inputs a configuration names.
pub struct ModuleGenerator {
    config: Config,
}

impl ModuleGenerator {
    /// Create a new module generator with the given configuration.
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Load all inputs and generate the module.
    pub fn generate(&self) -> CliResult<GeneratedOutput> {
        let inputs = self.load()?;
        Ok(inputs.generator().generate()?)
    }

    /// Load all inputs and stream the module into `writer` line by line.
    pub fn generate_to<W: Write>(&self, writer: W) -> CliResult<Vec<Warning>> {
        let inputs = self.load()?;
        Ok(inputs.generator().generate_to(writer)?)
    }

    fn load(&self) -> CliResult<Inputs> {
        let model_path = self.config.model()?;
        tracing::info!(model = %model_path.display(), "loading model");
        Ok(Inputs {
            model: load_normalized(model_path)?,
            super_models: self.load_super_models()?,
            overrides: self.load_overrides()?,
        })
    }

    fn load_super_models(&self) -> CliResult<Vec<SuperModel>> {
        self.config
            .super_models()?
            .into_iter()
            .map(|spec| self.load_super_model(spec))
            .collect()
    }

    fn load_super_model(&self, spec: SuperModelSpec) -> CliResult<SuperModel> {
        let module = self.config.module_for(&spec.language);
        tracing::debug!(super_model = %spec, module = %module, "loading super model");
        let model = load_normalized(&spec.path)?;
        Ok(SuperModel::generated(spec.language, module, model))
    }

    fn load_overrides(&self) -> CliResult<Overrides> {
        match self.config.input.overrides {
            Some(ref path) => {
                tracing::debug!(overrides = %path.display(), "loading overrides");
                Ok(Overrides::load(path)?)
            }
            None => Ok(Overrides::new()),
        }
    }
}
