use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use super::super::ds::hw_addr::EthernetAddress;
use super::super::ds::ports::PortNumber;

/// Learned MAC address to port mapping of one switch.
#[derive(Debug, Default, Clone)]
pub struct ForwardingTable {
    ports: HashMap<EthernetAddress, PortNumber>,
}

impl ForwardingTable {
    pub fn new() -> Self {
        ForwardingTable {
            ports: HashMap::new(),
        }
    }

    /// Records `addr` as reachable through `port`, returning the port it was
    /// previously learned on.
    pub fn learn(&mut self, addr: EthernetAddress, port: PortNumber) -> Option<PortNumber> {
        self.ports.insert(addr, port)
    }

    pub fn lookup(&self, addr: &EthernetAddress) -> Option<PortNumber> {
        self.ports.get(addr).cloned()
    }

    pub fn len(&self) -> usize {
        self.ports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ports.is_empty()
    }
}

/// Forwarding tables of all switches keyed by datapath id.
///
/// The outer lock is only held while a table is looked up or created, each
/// table has its own lock.
#[derive(Debug, Default)]
pub struct MacTableStore {
    tables: Mutex<HashMap<u64, Arc<Mutex<ForwardingTable>>>>,
}

impl MacTableStore {
    pub fn new() -> Self {
        MacTableStore::default()
    }

    fn tables(&self) -> MutexGuard<HashMap<u64, Arc<Mutex<ForwardingTable>>>> {
        self.tables.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Table of `datapath_id`, created empty on first use.
    pub fn table(&self, datapath_id: u64) -> Arc<Mutex<ForwardingTable>> {
        let mut tables = self.tables();
        Arc::clone(
            tables
                .entry(datapath_id)
                .or_insert_with(|| Arc::new(Mutex::new(ForwardingTable::new()))),
        )
    }

    pub fn get(&self, datapath_id: u64) -> Option<Arc<Mutex<ForwardingTable>>> {
        self.tables().get(&datapath_id).map(Arc::clone)
    }

    /// Port `addr` was last seen on at `datapath_id`.
    pub fn lookup(&self, datapath_id: u64, addr: &EthernetAddress) -> Option<PortNumber> {
        let table = self.get(datapath_id)?;
        let table = table.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        table.lookup(addr)
    }

    pub fn switch_count(&self) -> usize {
        self.tables().len()
    }
}
