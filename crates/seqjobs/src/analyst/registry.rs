use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use log::info;

use crate::config::AnalystsConfig;
use crate::error::RegistryError;

use super::metontiime::MetontiimeAnalyst;
use super::text_stats::TextStatsAnalyst;
use super::types::{AnalysisOutcome, AnalysisParams, AnalystDescriptor, DatabaseSpec};
use super::Analyst;

/// Name-keyed collection of analysts, built at startup and shared read-only.
///
/// Keys are lower-cased; lookups are case-insensitive. Iteration follows
/// registration order.
#[derive(Default)]
pub struct AnalystRegistry {
    analysts: HashMap<String, Arc<dyn Analyst>>,
    order: Vec<String>,
}

impl AnalystRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the registry with the built-in analysts enabled in `config`.
    pub fn from_config(config: &AnalystsConfig) -> Result<Self, RegistryError> {
        let mut registry = Self::new();

        registry.register(
            MetontiimeAnalyst::KEY,
            Arc::new(MetontiimeAnalyst::new(config.metontiime.clone())),
        )?;

        if config.example.enabled {
            registry.register(TextStatsAnalyst::KEY, Arc::new(TextStatsAnalyst::new()))?;
            info!("Example analyst registered (demo mode)");
        }

        info!("Analyst registry initialized with: {:?}", registry.names());
        Ok(registry)
    }

    /// Registers `analyst` under `name`.
    ///
    /// Fails with [`RegistryError::ContractViolation`] if the analyst's
    /// declarations are unusable and with [`RegistryError::DuplicateAnalyst`]
    /// if the name is taken. The registry is unchanged on failure.
    pub fn register(&mut self, name: &str, analyst: Arc<dyn Analyst>) -> Result<(), RegistryError> {
        let key = normalize(name);
        check_contract(&key, analyst.as_ref())?;

        if self.analysts.contains_key(&key) {
            return Err(RegistryError::DuplicateAnalyst(key));
        }

        self.order.push(key.clone());
        self.analysts.insert(key.clone(), analyst);
        info!("Registered analyst: {}", key);
        Ok(())
    }

    /// Replaces the analyst registered under `name`, keeping its position,
    /// or appends it if the name is new.
    pub fn replace(&mut self, name: &str, analyst: Arc<dyn Analyst>) -> Result<(), RegistryError> {
        let key = normalize(name);
        check_contract(&key, analyst.as_ref())?;

        if self.analysts.insert(key.clone(), analyst).is_none() {
            self.order.push(key.clone());
        }
        info!("Replaced analyst: {}", key);
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Option<Arc<dyn Analyst>> {
        self.analysts.get(&normalize(name)).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.analysts.contains_key(&normalize(name))
    }

    /// Registered keys in registration order.
    pub fn names(&self) -> Vec<String> {
        self.order.clone()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn describe(&self, name: &str) -> Option<AnalystDescriptor> {
        let key = normalize(name);
        self.analysts.get(&key).map(|a| descriptor(&key, a.as_ref()))
    }

    pub fn describe_all(&self) -> Vec<AnalystDescriptor> {
        self.order
            .iter()
            .filter_map(|key| self.analysts.get(key).map(|a| descriptor(key, a.as_ref())))
            .collect()
    }

    /// Supported databases across all analysts, first declaration wins on
    /// duplicate names.
    pub fn all_databases(&self) -> Vec<DatabaseSpec> {
        let mut seen = HashSet::new();
        let mut databases = Vec::new();
        for key in &self.order {
            if let Some(analyst) = self.analysts.get(key) {
                for db in analyst.supported_databases() {
                    if seen.insert(db.name.clone()) {
                        databases.push(db);
                    }
                }
            }
        }
        databases
    }

    /// Resolves `name` and runs its analysis.
    pub fn dispatch(
        &self,
        name: &str,
        params: &AnalysisParams,
    ) -> Result<AnalysisOutcome, RegistryError> {
        let analyst = self
            .lookup(name)
            .ok_or_else(|| RegistryError::UnknownAnalyst(name.to_string()))?;

        info!("Running analysis with {} analyst...", normalize(name));
        Ok(analyst.analyze(params)?)
    }
}

fn normalize(name: &str) -> String {
    name.trim().to_lowercase()
}

fn descriptor(key: &str, analyst: &dyn Analyst) -> AnalystDescriptor {
    AnalystDescriptor {
        name: key.to_string(),
        display_name: analyst.name().to_string(),
        description: analyst.description().to_string(),
        version: analyst.version().to_string(),
        required_inputs: analyst.required_inputs(),
        supported_databases: analyst.supported_databases(),
    }
}

fn violation(key: &str, reason: String) -> RegistryError {
    RegistryError::ContractViolation {
        name: key.to_string(),
        reason,
    }
}

/// Checks the runtime half of the analyst contract. The operations
/// themselves are guaranteed by the trait.
fn check_contract(key: &str, analyst: &dyn Analyst) -> Result<(), RegistryError> {
    if key.is_empty() {
        return Err(violation(key, "name must not be empty".to_string()));
    }
    // Key ends up in job output directory names.
    if !key
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(violation(
            key,
            "name may only contain letters, digits, '-' and '_'".to_string(),
        ));
    }
    if analyst.version().trim().is_empty() {
        return Err(violation(key, "version must not be empty".to_string()));
    }

    let inputs = analyst.required_inputs();
    if inputs != analyst.required_inputs() {
        return Err(violation(
            key,
            "required_inputs() returned different declarations on repeated calls".to_string(),
        ));
    }

    let mut input_names = HashSet::new();
    for input in &inputs {
        if input.name.trim().is_empty() {
            return Err(violation(key, "input names must not be empty".to_string()));
        }
        if !input_names.insert(input.name.as_str()) {
            return Err(violation(key, format!("duplicate input '{}'", input.name)));
        }
        if let Some(ext) = input.extensions.iter().find(|e| !e.starts_with('.')) {
            return Err(violation(
                key,
                format!("extension '{}' of input '{}' must start with '.'", ext, input.name),
            ));
        }
        if !input.options.is_empty() && input.kind != super::InputKind::String {
            return Err(violation(
                key,
                format!("options declared on non-string input '{}'", input.name),
            ));
        }
    }

    let databases = analyst.supported_databases();
    if databases != analyst.supported_databases() {
        return Err(violation(
            key,
            "supported_databases() returned different declarations on repeated calls".to_string(),
        ));
    }

    let mut db_names = HashSet::new();
    for db in &databases {
        if db.name.trim().is_empty() {
            return Err(violation(key, "database names must not be empty".to_string()));
        }
        if !db_names.insert(db.name.to_lowercase()) {
            return Err(violation(key, format!("duplicate database '{}'", db.name)));
        }
    }

    Ok(())
}
