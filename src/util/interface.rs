//! Network interface discovery.

use std::net::IpAddr;

use super::{guess_link_class, NetworkInterface};

/// Get all network interfaces with their addresses.
#[cfg(unix)]
pub fn get_network_interfaces() -> Vec<NetworkInterface> {
    get_interfaces_via_getifaddrs()
}

#[cfg(not(unix))]
pub fn get_network_interfaces() -> Vec<NetworkInterface> {
    vec![]
}

/// Get all usable interfaces (up, not loopback, not link-local).
pub fn get_usable_interfaces() -> Vec<NetworkInterface> {
    get_network_interfaces()
        .into_iter()
        .filter(|i| i.is_up && !i.is_loopback && is_routable(i.address))
        .collect()
}

fn is_routable(addr: IpAddr) -> bool {
    match addr {
        IpAddr::V4(v4) => !v4.is_loopback() && !v4.is_link_local(),
        IpAddr::V6(v6) => !v6.is_loopback() && (v6.segments()[0] & 0xffc0) != 0xfe80,
    }
}

#[cfg(unix)]
fn get_interfaces_via_getifaddrs() -> Vec<NetworkInterface> {
    use std::ffi::CStr;

    let mut interfaces = Vec::new();

    unsafe {
        let mut ifaddrs: *mut libc::ifaddrs = std::ptr::null_mut();
        if libc::getifaddrs(std::ptr::addr_of_mut!(ifaddrs)) != 0 {
            return interfaces;
        }

        let mut current = ifaddrs;
        while !current.is_null() {
            let ifa = &*current;

            if !ifa.ifa_name.is_null() && !ifa.ifa_addr.is_null() {
                let name = CStr::from_ptr(ifa.ifa_name).to_string_lossy().into_owned();
                let family = i32::from((*ifa.ifa_addr).sa_family);

                #[allow(clippy::cast_ptr_alignment)]
                let address = match family {
                    libc::AF_INET => {
                        let sockaddr = ifa.ifa_addr.cast::<libc::sockaddr_in>();
                        Some(IpAddr::V4(std::net::Ipv4Addr::from(u32::from_be(
                            (*sockaddr).sin_addr.s_addr,
                        ))))
                    }
                    libc::AF_INET6 => {
                        let sockaddr = ifa.ifa_addr.cast::<libc::sockaddr_in6>();
                        Some(IpAddr::V6(std::net::Ipv6Addr::from((*sockaddr).sin6_addr.s6_addr)))
                    }
                    _ => None,
                };

                if let Some(address) = address {
                    let flags = ifa.ifa_flags as i32;
                    interfaces.push(NetworkInterface {
                        index: super::if_nametoindex(&name).unwrap_or(0),
                        link_class: guess_link_class(&name),
                        name,
                        address,
                        is_up: (flags & libc::IFF_UP) != 0,
                        is_running: (flags & libc::IFF_RUNNING) != 0,
                        is_loopback: (flags & libc::IFF_LOOPBACK) != 0,
                    });
                }
            }

            current = ifa.ifa_next;
        }

        libc::freeifaddrs(ifaddrs);
    }

    interfaces
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_network_interfaces() {
        let interfaces = get_network_interfaces();

        #[cfg(unix)]
        {
            let has_loopback = interfaces.iter().any(|i| i.is_loopback);
            assert!(has_loopback, "Should have loopback interface");
        }

        for iface in get_usable_interfaces() {
            assert!(!iface.is_loopback);
        }
        let _ = interfaces;
    }

    #[test]
    fn test_is_routable() {
        assert!(is_routable("192.168.1.10".parse().unwrap()));
        assert!(!is_routable("127.0.0.1".parse().unwrap()));
        assert!(!is_routable("169.254.3.4".parse().unwrap()));
        assert!(!is_routable("fe80::1".parse().unwrap()));
        assert!(is_routable("2001:db8::1".parse().unwrap()));
    }
}
