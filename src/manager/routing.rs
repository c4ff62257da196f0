//! Schema → machine routing tables.

use crate::core::{Capability, StateMachine, WILDCARD_SCHEMA};
use std::collections::HashMap;
use std::sync::Arc;

/// Machines subscribed to one capability, keyed by schema.
///
/// Machines are kept in registration order under each schema.
#[derive(Default)]
struct RoutingTable {
    by_schema: HashMap<String, Vec<Arc<dyn StateMachine>>>,
}

impl RoutingTable {
    fn insert(&mut self, schema: String, machine: Arc<dyn StateMachine>) {
        self.by_schema.entry(schema).or_default().push(machine);
    }

    fn remove(&mut self, identifier: &str) {
        self.by_schema.retain(|_, machines| {
            machines.retain(|m| m.identifier() != identifier);
            !machines.is_empty()
        });
    }

    /// Machines listed under `key`, then machines listed under the wildcard.
    fn matching<'a>(&'a self, key: &str) -> impl Iterator<Item = &'a Arc<dyn StateMachine>> + 'a {
        let literal = if key == WILDCARD_SCHEMA {
            None
        } else {
            self.by_schema.get(key)
        };
        let wildcard = self.by_schema.get(WILDCARD_SCHEMA);
        literal.into_iter().flatten().chain(wildcard.into_iter().flatten())
    }
}

/// One routing table per capability.
#[derive(Default)]
pub(crate) struct RoutingTables {
    tables: [RoutingTable; 5],
}

impl RoutingTables {
    /// Add `machine` under every schema it subscribed to, per capability.
    pub(crate) fn insert(&mut self, machine: &Arc<dyn StateMachine>) {
        for capability in Capability::ALL {
            for schema in machine.subscriptions(capability) {
                self.tables[capability.index()].insert(schema, Arc::clone(machine));
            }
        }
    }

    pub(crate) fn remove(&mut self, identifier: &str) {
        for table in &mut self.tables {
            table.remove(identifier);
        }
    }

    pub(crate) fn matching<'a>(
        &'a self,
        capability: Capability,
        key: &str,
    ) -> impl Iterator<Item = &'a Arc<dyn StateMachine>> + 'a {
        self.tables[capability.index()].matching(key)
    }
}
