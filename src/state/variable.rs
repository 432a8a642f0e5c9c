//! Variables by scope, with scope parents for lookup through enclosing scopes.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::StateViolation;
use crate::value::VariableRecord;

const ENTITY: &str = "variable";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableInstance {
    pub value: Value,
    pub process_instance_key: i64,
    pub process_definition_key: i64,
    pub bpmn_process_id: String,
    pub tenant_id: String,
}

impl From<&VariableRecord> for VariableInstance {
    fn from(record: &VariableRecord) -> Self {
        Self {
            value: record.value.clone(),
            process_instance_key: record.process_instance_key,
            process_definition_key: record.process_definition_key,
            bpmn_process_id: record.bpmn_process_id.clone(),
            tenant_id: record.tenant_id.clone(),
        }
    }
}

/// Variables per scope, plus the scope hierarchy used for lookups that
/// fall through to enclosing scopes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VariableState {
    scopes: BTreeMap<i64, BTreeMap<String, VariableInstance>>,
    parents: BTreeMap<i64, i64>,
}

impl VariableState {
    /// Variable defined directly in `scope_key`, without looking at parents.
    pub fn get_local(&self, scope_key: i64, name: &str) -> Option<&VariableInstance> {
        self.scopes.get(&scope_key).and_then(|vars| vars.get(name))
    }

    /// Resolve `name` from `scope_key` outward through enclosing scopes.
    pub fn get(&self, scope_key: i64, name: &str) -> Option<&VariableInstance> {
        let mut current = Some(scope_key);
        while let Some(key) = current {
            if let Some(variable) = self.get_local(key, name) {
                return Some(variable);
            }
            current = self.parents.get(&key).copied();
        }
        None
    }

    pub fn scope_variables(&self, scope_key: i64) -> impl Iterator<Item = (&str, &Value)> {
        self.scopes
            .get(&scope_key)
            .into_iter()
            .flat_map(|vars| vars.iter().map(|(name, v)| (name.as_str(), &v.value)))
    }

    pub fn parent_scope(&self, scope_key: i64) -> Option<i64> {
        self.parents.get(&scope_key).copied()
    }

    pub(crate) fn create_scope(&mut self, scope_key: i64, parent: Option<i64>) {
        if let Some(parent) = parent {
            self.parents.insert(scope_key, parent);
        }
    }

    pub(crate) fn remove_scope(&mut self, scope_key: i64) {
        self.scopes.remove(&scope_key);
        self.parents.remove(&scope_key);
    }

    pub(crate) fn set_local(&mut self, record: &VariableRecord) {
        self.scopes
            .entry(record.scope_key)
            .or_default()
            .insert(record.name.clone(), VariableInstance::from(record));
    }

    pub(crate) fn migrate(&mut self, record: &VariableRecord) -> Result<(), StateViolation> {
        let variable = self
            .scopes
            .get_mut(&record.scope_key)
            .and_then(|vars| vars.get_mut(&record.name))
            .ok_or_else(|| {
                StateViolation::not_found(ENTITY, format!("{}@{}", record.name, record.scope_key))
            })?;
        variable.process_definition_key = record.process_definition_key;
        variable.bpmn_process_id = record.bpmn_process_id.clone();
        Ok(())
    }
}
