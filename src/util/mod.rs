//! Interface enumeration and link classification helpers.

use std::net::IpAddr;

use crate::types::LinkClass;

mod classify;
mod interface;

pub use classify::*;
pub use interface::*;

/// Network interface information.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkInterface {
    pub name: String,
    pub index: u32,
    pub address: IpAddr,
    pub is_up: bool,
    pub is_running: bool,
    pub is_loopback: bool,
    pub link_class: Option<LinkClass>,
}

/// Guess the link class from the interface name.
///
/// Only radio links are classified; wired, tunnel and loopback interfaces
/// return `None`. USB network adapters are left unclassified since most are
/// Ethernet dongles; USB modems show up as `wwan*`.
pub fn guess_link_class(name: &str) -> Option<LinkClass> {
    let name = name.to_lowercase();

    if name.starts_with("wl") {
        Some(LinkClass::Wifi)
    } else if name.starts_with("wwan")
        || name.starts_with("rmnet")
        || name.starts_with("ccmni")
        || name.starts_with("pdp")
        || name.starts_with("cell")
    {
        Some(LinkClass::Cellular)
    } else {
        None
    }
}

/// Get interface index by name.
#[cfg(unix)]
pub fn if_nametoindex(name: &str) -> Option<u32> {
    use std::ffi::CString;
    let cname = CString::new(name).ok()?;
    let idx = unsafe { libc::if_nametoindex(cname.as_ptr()) };
    if idx == 0 {
        None
    } else {
        Some(idx)
    }
}

#[cfg(not(unix))]
pub fn if_nametoindex(_name: &str) -> Option<u32> {
    None
}
