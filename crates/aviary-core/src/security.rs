//! Shared network-safety helpers used by any subsystem that makes outbound
//! requests to a URL supplied by configuration or webhook input (RSS feeds,
//! url_tracking/youtube middleware stages, vision/oEmbed clients).

use std::net::IpAddr;

/// Check if an IP address is safe to connect to from an outbound request.
///
/// Rejects loopback, private (RFC 1918), link-local, carrier-grade NAT,
/// IPv4-mapped IPv6 addresses that map to unsafe IPs, multicast, unspecified,
/// and deprecated site-local IPv6 — the same SSRF-prevention rule the
/// dispatch engine needs before fetching any attacker-influenced URL.
pub fn is_safe_ip(ip: &IpAddr) -> bool {
    if ip.is_loopback() || ip.is_unspecified() || ip.is_multicast() {
        return false;
    }

    match ip {
        IpAddr::V4(v4) => {
            let octets = v4.octets();
            if octets[0] == 10 {
                return false;
            }
            if octets[0] == 172 && (16..=31).contains(&octets[1]) {
                return false;
            }
            if octets[0] == 192 && octets[1] == 168 {
                return false;
            }
            if octets[0] == 169 && octets[1] == 254 {
                return false;
            }
            if octets[0] == 100 && (64..=127).contains(&octets[1]) {
                return false;
            }
            true
        }
        IpAddr::V6(v6) => {
            if let Some(v4) = v6.to_ipv4_mapped() {
                return is_safe_ip(&IpAddr::V4(v4));
            }

            let segments = v6.segments();
            if (segments[0] & 0xfe00) == 0xfc00 {
                return false;
            }
            if (segments[0] & 0xffc0) == 0xfe80 {
                return false;
            }
            if (segments[0] & 0xffc0) == 0xfec0 {
                return false;
            }

            true
        }
    }
}

/// Normalize an IPv4-mapped IPv6 address down to its IPv4 form; otherwise
/// return the address unchanged, so an allowlist entry of `203.0.113.5`
/// matches a client that arrives as `::ffff:203.0.113.5`.
pub fn normalize_ip(ip: IpAddr) -> IpAddr {
    match ip {
        IpAddr::V6(v6) => v6.to_ipv4_mapped().map(IpAddr::V4).unwrap_or(IpAddr::V6(v6)),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_ipv4_mapped_loopback() {
        let ip: IpAddr = "::ffff:127.0.0.1".parse().unwrap();
        assert!(!is_safe_ip(&ip));
    }

    #[test]
    fn rejects_ipv4_mapped_private() {
        assert!(!is_safe_ip(&"::ffff:10.0.0.1".parse().unwrap()));
        assert!(!is_safe_ip(&"::ffff:192.168.1.1".parse().unwrap()));
        assert!(!is_safe_ip(&"::ffff:172.16.0.1".parse().unwrap()));
    }

    #[test]
    fn rejects_ipv4_mapped_link_local() {
        assert!(!is_safe_ip(&"::ffff:169.254.169.254".parse().unwrap()));
    }

    #[test]
    fn rejects_multicast() {
        assert!(!is_safe_ip(&"ff02::1".parse().unwrap()));
    }

    #[test]
    fn rejects_private_ipv4() {
        assert!(!is_safe_ip(&"10.0.0.1".parse().unwrap()));
        assert!(!is_safe_ip(&"192.168.1.1".parse().unwrap()));
        assert!(!is_safe_ip(&"172.16.0.1".parse().unwrap()));
        assert!(!is_safe_ip(&"100.64.0.1".parse().unwrap()));
    }

    #[test]
    fn rejects_loopback_and_unspecified() {
        assert!(!is_safe_ip(&"127.0.0.1".parse().unwrap()));
        assert!(!is_safe_ip(&"::1".parse().unwrap()));
        assert!(!is_safe_ip(&"0.0.0.0".parse().unwrap()));
    }

    #[test]
    fn allows_public_addresses() {
        assert!(is_safe_ip(&"8.8.8.8".parse().unwrap()));
        assert!(is_safe_ip(&"2606:4700:4700::1111".parse().unwrap()));
    }

    #[test]
    fn normalizes_ipv4_mapped() {
        let mapped: IpAddr = "::ffff:203.0.113.5".parse().unwrap();
        assert_eq!(normalize_ip(mapped), "203.0.113.5".parse::<IpAddr>().unwrap());
    }

    #[test]
    fn normalize_leaves_plain_ipv4_and_ipv6_alone() {
        let v4: IpAddr = "203.0.113.5".parse().unwrap();
        assert_eq!(normalize_ip(v4), v4);
        let v6: IpAddr = "2606:4700::1".parse().unwrap();
        assert_eq!(normalize_ip(v6), v6);
    }
}
