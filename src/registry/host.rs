//! Host name validation

use std::net::{IpAddr, Ipv6Addr};

/// Whether `host` is a DNS name or an IP literal, optionally followed by `:port`
pub fn is_valid_host(host: &str) -> bool {
    if host.is_empty() {
        return false;
    }
    if host.parse::<IpAddr>().is_ok() {
        return true;
    }
    // [v6]:port
    if let Some(rest) = host.strip_prefix('[') {
        return match rest.split_once(']') {
            Some((addr, "")) => addr.parse::<Ipv6Addr>().is_ok(),
            Some((addr, port)) => {
                addr.parse::<Ipv6Addr>().is_ok()
                    && port.strip_prefix(':').is_some_and(is_valid_port)
            }
            None => false,
        };
    }

    let (name, port) = match host.rsplit_once(':') {
        Some((name, port)) => (name, Some(port)),
        None => (host, None),
    };
    if port.is_some_and(|p| !is_valid_port(p)) {
        return false;
    }
    name.parse::<IpAddr>().is_ok() || is_valid_domain(name)
}

fn is_valid_port(port: &str) -> bool {
    !port.is_empty() && port.chars().all(|c| c.is_ascii_digit()) && port.parse::<u16>().is_ok_and(|p| p > 0)
}

fn is_valid_domain(name: &str) -> bool {
    let name = name.strip_suffix('.').unwrap_or(name);
    if name.is_empty() || name.len() > 253 {
        return false;
    }
    name.split('.').all(|label| {
        !label.is_empty()
            && label.len() <= 63
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
    })
}
