use std::collections::BTreeMap;

use crate::protocol::{Attribute, Message, Value};


/// Last known value of every attribute seen so far.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PumpState {
    values: BTreeMap<Attribute, Value>
}

impl PumpState {
    pub fn get(&self, attribute: Attribute) -> Option<Value> {
        self.values.get(&attribute).copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}


/// Suppresses redundant publications: only attributes whose value differs
/// from the last one seen are reported as changed.
#[derive(Debug, Default)]
pub struct StateCache {
    state: PumpState
}

impl StateCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attributes `message` reports with a value different from the cache.
    /// Attributes the message doesn't report are never included.
    pub fn diff(&self, message: &Message) -> Vec<(Attribute, Value)> {
        message.reported()
            .into_iter()
            .filter(|(attribute, value)| self.state.get(*attribute) != Some(*value))
            .collect()
    }

    /// Record every attribute `message` reports and return the ones that changed.
    pub fn apply(&mut self, message: &Message) -> Vec<(Attribute, Value)> {
        let changes = self.diff(message);

        for (attribute, value) in message.reported() {
            self.state.values.insert(attribute, value);
        }

        changes
    }

    pub fn state(&self) -> &PumpState {
        &self.state
    }
}
