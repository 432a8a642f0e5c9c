//! Deployed forms.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{VersionIndex, latest_in};
use crate::error::StateViolation;
use crate::value::FormRecord;

const ENTITY: &str = "form";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FormState {
    forms: BTreeMap<i64, FormRecord>,
    versions: VersionIndex,
}

impl FormState {
    pub fn get(&self, form_key: i64) -> Option<&FormRecord> {
        self.forms.get(&form_key)
    }

    /// Highest deployed version of `form_id` for the tenant.
    pub fn latest(&self, tenant_id: &str, form_id: &str) -> Option<&FormRecord> {
        latest_in(&self.versions, tenant_id, form_id).and_then(|key| self.forms.get(&key))
    }

    pub fn is_empty(&self) -> bool {
        self.forms.is_empty()
    }

    pub(crate) fn put(&mut self, record: &FormRecord) -> Result<(), StateViolation> {
        let key = record.form_key;
        if self.forms.contains_key(&key) {
            return Err(StateViolation::already_exists(ENTITY, key));
        }
        self.versions.insert((
            record.tenant_id.clone(),
            record.form_id.clone(),
            record.version,
            key,
        ));
        self.forms.insert(key, record.clone());
        Ok(())
    }

    pub(crate) fn delete(&mut self, key: i64) -> Result<(), StateViolation> {
        let record = self
            .forms
            .remove(&key)
            .ok_or_else(|| StateViolation::not_found(ENTITY, key))?;
        self.versions
            .remove(&(record.tenant_id, record.form_id, record.version, key));
        Ok(())
    }
}
