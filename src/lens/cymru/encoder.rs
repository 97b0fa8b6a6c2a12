//! Query name construction for the Team Cymru DNS interface
//!
//! All names are fully qualified (trailing dot) and built without I/O.

use super::types::LookupError;
use std::net::IpAddr;

/// Zone answering IPv4 origin queries
pub const ORIGIN_V4_ZONE: &str = "origin.asn.cymru.com.";
/// Zone answering IPv6 origin queries
pub const ORIGIN_V6_ZONE: &str = "origin6.asn.cymru.com.";
/// Zone answering peer queries for both address families
pub const PEER_ZONE: &str = "peer.asn.cymru.com.";
/// Zone answering `AS<number>` description queries
pub const ASN_ZONE: &str = "asn.cymru.com.";

/// Parse an input address, surrounding whitespace allowed
pub fn parse_address(input: &str) -> Result<IpAddr, LookupError> {
    input
        .trim()
        .parse::<IpAddr>()
        .map_err(|_| LookupError::InvalidAddress {
            input: input.to_string(),
        })
}

/// Reverse an address the way reverse-DNS zones expect it.
///
/// IPv4 reverses the four octets; IPv6 reverses all 32 nibbles of the
/// expanded address, lowercase.
pub fn reverse_address(ip: IpAddr) -> String {
    match ip {
        IpAddr::V4(v4) => {
            let o = v4.octets();
            format!("{}.{}.{}.{}", o[3], o[2], o[1], o[0])
        }
        IpAddr::V6(v6) => v6
            .octets()
            .iter()
            .rev()
            .flat_map(|b| [b & 0x0f, b >> 4])
            .map(|nibble| format!("{:x}", nibble))
            .collect::<Vec<_>>()
            .join("."),
    }
}

/// Reversed address under an arbitrary zone
pub fn reverse_query_name(ip: IpAddr, zone: &str) -> String {
    format!("{}.{}", reverse_address(ip), zone.trim_start_matches('.'))
}

/// Origin query name, picking the v4 or v6 zone from the address family
pub fn origin_query_name(ip: IpAddr) -> String {
    let zone = match ip {
        IpAddr::V4(_) => ORIGIN_V4_ZONE,
        IpAddr::V6(_) => ORIGIN_V6_ZONE,
    };
    reverse_query_name(ip, zone)
}

pub fn peer_query_name(ip: IpAddr) -> String {
    reverse_query_name(ip, PEER_ZONE)
}

/// ASN description query name, e.g. `701` becomes `AS701.asn.cymru.com.`.
///
/// Origin answers for multi-origin prefixes list several ASNs separated by
/// spaces; the first one is used. An `AS` prefix on the input is accepted.
pub fn asn_query_name(asn: &str) -> String {
    let first = asn.split_whitespace().next().unwrap_or_default();
    let number = first
        .strip_prefix("AS")
        .or_else(|| first.strip_prefix("as"))
        .unwrap_or(first);
    format!("AS{}.{}", number, ASN_ZONE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_origin_v4() {
        let ip = parse_address("31.108.90.216").unwrap();
        assert_eq!(
            origin_query_name(ip),
            "216.90.108.31.origin.asn.cymru.com."
        );
    }

    #[test]
    fn test_origin_v6() {
        let ip = parse_address("2001:4860:b002::68").unwrap();
        assert_eq!(
            origin_query_name(ip),
            "8.6.0.0.0.0.0.0.0.0.0.0.0.0.0.0.0.0.0.0.2.0.0.b.0.6.8.4.1.0.0.2.origin6.asn.cymru.com."
        );
    }

    #[test]
    fn test_peer_names() {
        let v4 = parse_address("8.8.8.8").unwrap();
        assert_eq!(peer_query_name(v4), "8.8.8.8.peer.asn.cymru.com.");

        let v6 = parse_address("2001:db8::1").unwrap();
        let name = peer_query_name(v6);
        assert!(name.starts_with("1.0.0.0."));
        assert!(name.ends_with(".8.b.d.0.1.0.0.2.peer.asn.cymru.com."));
    }

    #[test]
    fn test_reverse_v6_has_32_nibbles() {
        let ip = parse_address("::1").unwrap();
        let reversed = reverse_address(ip);
        assert_eq!(reversed.split('.').count(), 32);
        assert!(reversed.starts_with("1.0.0"));
    }

    #[test]
    fn test_asn_query_name() {
        assert_eq!(asn_query_name("701"), "AS701.asn.cymru.com.");
        assert_eq!(asn_query_name(" 15169 "), "AS15169.asn.cymru.com.");
        assert_eq!(asn_query_name("23028 701"), "AS23028.asn.cymru.com.");
        assert_eq!(asn_query_name("AS13335"), "AS13335.asn.cymru.com.");
    }

    #[test]
    fn test_invalid_address() {
        let err = parse_address("not-an-ip").unwrap_err();
        assert_eq!(
            err,
            LookupError::InvalidAddress {
                input: "not-an-ip".to_string()
            }
        );
        assert!(parse_address("300.1.1.1").is_err());
        assert!(parse_address(" 1.1.1.1 ").is_ok());
    }

    #[test]
    fn test_reverse_query_name_tolerates_leading_dot() {
        let ip = parse_address("1.2.3.4").unwrap();
        assert_eq!(
            reverse_query_name(ip, ".example.net."),
            "4.3.2.1.example.net."
        );
    }
}
