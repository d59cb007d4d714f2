//! Mapping of path local addresses to link classes.

use std::collections::HashMap;
use std::net::IpAddr;

use super::{get_network_interfaces, NetworkInterface};
use crate::types::LinkClass;

/// Classifies a path by the local address it is bound to.
///
/// Implemented by the host environment; the scheduler only consumes results.
pub trait Classify: Send + Sync {
    fn classify(&self, local_addr: IpAddr) -> Option<LinkClass>;
}

impl<F> Classify for F
where
    F: Fn(IpAddr) -> Option<LinkClass> + Send + Sync,
{
    fn classify(&self, local_addr: IpAddr) -> Option<LinkClass> {
        self(local_addr)
    }
}

/// Address table built from interface enumeration.
///
/// Addresses owned by a known WiFi interface classify as WiFi; any other
/// known address falls back to `default_class`, mirroring setups where
/// everything that is not WLAN is the cellular modem.
#[derive(Debug, Clone, Default)]
pub struct InterfaceClassifier {
    by_addr: HashMap<IpAddr, LinkClass>,
    default_class: Option<LinkClass>,
}

impl InterfaceClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from the host's current interfaces.
    pub fn from_system() -> Self {
        Self::from_interfaces(&get_network_interfaces())
    }

    pub fn from_interfaces(interfaces: &[NetworkInterface]) -> Self {
        let mut classifier = Self::new();
        for iface in interfaces.iter().filter(|i| !i.is_loopback) {
            if let Some(class) = iface.link_class {
                classifier.insert(iface.address, class);
            }
        }
        classifier
    }

    /// Class for addresses not in the table.
    pub fn with_default(mut self, class: LinkClass) -> Self {
        self.default_class = Some(class);
        self
    }

    pub fn insert(&mut self, addr: IpAddr, class: LinkClass) {
        self.by_addr.insert(addr, class);
    }

    pub fn len(&self) -> usize {
        self.by_addr.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_addr.is_empty()
    }
}

impl Classify for InterfaceClassifier {
    fn classify(&self, local_addr: IpAddr) -> Option<LinkClass> {
        self.by_addr.get(&local_addr).copied().or(self.default_class)
    }
}
