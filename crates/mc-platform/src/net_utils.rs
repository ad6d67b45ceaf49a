use local_ip_address::list_afinet_netifas;
use std::net::{IpAddr, Ipv4Addr};
use tracing::{debug, warn};

/// Best address for other machines on the LAN to reach this host.
///
/// 检测可供局域网其他设备连接的本机地址。
///
/// Prefers a private IPv4 on a physical interface, then whatever the OS
/// reports as the default local address.
pub fn lan_ip() -> Option<IpAddr> {
    if let Some(ip) = private_lan_ipv4() {
        return Some(IpAddr::V4(ip));
    }
    match local_ip_address::local_ip() {
        Ok(ip) => Some(ip),
        Err(err) => {
            warn!(error = %err, "failed to determine local IP");
            None
        }
    }
}

fn private_lan_ipv4() -> Option<Ipv4Addr> {
    let interfaces = match list_afinet_netifas() {
        Ok(ifaces) => ifaces,
        Err(err) => {
            warn!(error = %err, "failed to enumerate network interfaces");
            return None;
        }
    };

    interfaces.into_iter().find_map(|(iface_name, ip)| match ip {
        IpAddr::V4(v4)
            if !v4.is_loopback()
                && !v4.is_link_local()
                && !is_tunnel_interface(&iface_name)
                && is_private_ipv4(v4) =>
        {
            debug!(ip = %v4, interface = %iface_name, "detected LAN IP");
            Some(v4)
        }
        _ => None,
    })
}

fn is_tunnel_interface(name: &str) -> bool {
    name.contains("tun") || name.contains("tap") || name.starts_with("docker") || name.starts_with("veth")
}

fn is_private_ipv4(ip: Ipv4Addr) -> bool {
    let octets = ip.octets();
    match octets[0] {
        10 => true,
        172 => (16..=31).contains(&octets[1]),
        192 => octets[1] == 168,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn private_ranges_detected() {
        assert!(is_private_ipv4(Ipv4Addr::new(10, 0, 0, 1)));
        assert!(is_private_ipv4(Ipv4Addr::new(172, 16, 0, 1)));
        assert!(is_private_ipv4(Ipv4Addr::new(192, 168, 1, 1)));
        assert!(!is_private_ipv4(Ipv4Addr::new(8, 8, 8, 8)));
        assert!(!is_private_ipv4(Ipv4Addr::new(172, 32, 0, 1)));
        assert!(!is_private_ipv4(Ipv4Addr::LOCALHOST));
    }

    #[test]
    fn virtual_interfaces_skipped() {
        assert!(is_tunnel_interface("utun3"));
        assert!(is_tunnel_interface("tap0"));
        assert!(is_tunnel_interface("docker0"));
        assert!(!is_tunnel_interface("eth0"));
        assert!(!is_tunnel_interface("wlan0"));
    }

    #[test]
    fn lan_ip_does_not_panic() {
        // May be None on a machine without a network
        let _ = lan_ip();
    }
}
