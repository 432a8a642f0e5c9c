//! Process instances banned after an unrecoverable error.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Process instances that hit an unrecoverable processing error. Commands
/// for them are rejected until the instance is cleaned up elsewhere.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BannedInstanceState {
    banned: BTreeSet<i64>,
}

impl BannedInstanceState {
    /// Whether records of this process instance must no longer be processed.
    pub fn is_banned(&self, process_instance_key: i64) -> bool {
        self.banned.contains(&process_instance_key)
    }

    pub fn iter(&self) -> impl Iterator<Item = i64> + '_ {
        self.banned.iter().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.banned.is_empty()
    }

    /// Banning twice is a no-op.
    pub(crate) fn ban(&mut self, process_instance_key: i64) {
        self.banned.insert(process_instance_key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ban_is_idempotent() {
        let mut state = BannedInstanceState::default();
        state.ban(4);
        state.ban(4);
        assert!(state.is_banned(4));
        assert_eq!(state.iter().collect::<Vec<_>>(), vec![4]);
    }
}
