//! CIDR network ranges
//!
//! Replacement for a relational engine's native network types: ranges are
//! parsed and normalized here, and containment is an explicit numeric
//! mask-and-compare over the fixed-width address representation.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;
use thiserror::Error;

/// Errors raised while parsing CIDR text
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CidrParseError {
    #[error("'{0}' does not appear to be an IPv4 or IPv6 network")]
    InvalidNetwork(String),

    #[error("invalid prefix length in '{0}'")]
    InvalidPrefix(String),
}

/// An IPv4 or IPv6 network range in CIDR notation
///
/// The stored address is always the network address: host bits present in
/// the input are masked off during construction, so two spellings of the
/// same range compare equal and render identically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CidrRange {
    network: IpAddr,
    prefix_len: u8,
}

impl CidrRange {
    /// Build a range from an address and prefix length
    ///
    /// The prefix length must not exceed the address family width. Host
    /// bits in `addr` are collapsed to the network address.
    pub fn new(addr: IpAddr, prefix_len: u8) -> Result<Self, CidrParseError> {
        let network = match addr {
            IpAddr::V4(v4) => {
                if prefix_len > 32 {
                    return Err(CidrParseError::InvalidPrefix(format!(
                        "{}/{}",
                        addr, prefix_len
                    )));
                }
                IpAddr::V4(Ipv4Addr::from(u32::from(v4) & v4_mask(prefix_len)))
            }
            IpAddr::V6(v6) => {
                if prefix_len > 128 {
                    return Err(CidrParseError::InvalidPrefix(format!(
                        "{}/{}",
                        addr, prefix_len
                    )));
                }
                IpAddr::V6(Ipv6Addr::from(u128::from(v6) & v6_mask(prefix_len)))
            }
        };

        Ok(CidrRange {
            network,
            prefix_len,
        })
    }

    /// The network address (host bits zeroed)
    pub fn network(&self) -> IpAddr {
        self.network
    }

    /// The prefix length in bits
    pub fn prefix_len(&self) -> u8 {
        self.prefix_len
    }

    /// Whether `ip` falls inside this range
    ///
    /// An address matches iff its numeric value masked by the prefix equals
    /// the network address. Addresses of the other family never match.
    pub fn contains(&self, ip: &IpAddr) -> bool {
        match (self.network, ip) {
            (IpAddr::V4(net), IpAddr::V4(ip)) => {
                u32::from(*ip) & v4_mask(self.prefix_len) == u32::from(net)
            }
            (IpAddr::V6(net), IpAddr::V6(ip)) => {
                u128::from(*ip) & v6_mask(self.prefix_len) == u128::from(net)
            }
            _ => false,
        }
    }
}

fn v4_mask(prefix_len: u8) -> u32 {
    match prefix_len {
        0 => 0,
        len => u32::MAX << (32 - len as u32),
    }
}

fn v6_mask(prefix_len: u8) -> u128 {
    match prefix_len {
        0 => 0,
        len => u128::MAX << (128 - len as u32),
    }
}

impl FromStr for CidrRange {
    type Err = CidrParseError;

    /// Parse `addr/prefix` text; a bare address is treated as a
    /// full-length prefix (a single-host range).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s.split_once('/') {
            Some((addr_part, prefix_part)) => {
                let addr = IpAddr::from_str(addr_part)
                    .map_err(|_| CidrParseError::InvalidNetwork(s.to_string()))?;
                let prefix_len = prefix_part
                    .parse::<u8>()
                    .map_err(|_| CidrParseError::InvalidPrefix(s.to_string()))?;
                CidrRange::new(addr, prefix_len)
            }
            None => {
                let addr = IpAddr::from_str(s)
                    .map_err(|_| CidrParseError::InvalidNetwork(s.to_string()))?;
                let prefix_len = match addr {
                    IpAddr::V4(_) => 32,
                    IpAddr::V6(_) => 128,
                };
                CidrRange::new(addr, prefix_len)
            }
        }
    }
}

impl fmt::Display for CidrRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.network, self.prefix_len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(s: &str) -> CidrRange {
        s.parse().unwrap()
    }

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn test_parse_and_display() {
        assert_eq!(range("173.99.253.0/24").to_string(), "173.99.253.0/24");
        assert_eq!(range("2001:db8::/32").to_string(), "2001:db8::/32");
    }

    #[test]
    fn test_host_bits_collapsed() {
        assert_eq!(range("10.0.0.5/24").to_string(), "10.0.0.0/24");
        assert_eq!(range("2001:db8::1/64").to_string(), "2001:db8::/64");
    }

    #[test]
    fn test_bare_address_is_host_range() {
        assert_eq!(range("10.0.0.5").to_string(), "10.0.0.5/32");
        assert_eq!(range("2001:db8::1").to_string(), "2001:db8::1/128");
    }

    #[test]
    fn test_invalid_input() {
        assert!("invalid_cidr".parse::<CidrRange>().is_err());
        assert!("10.0.0.0/33".parse::<CidrRange>().is_err());
        assert!("10.0.0.0/abc".parse::<CidrRange>().is_err());
        assert!("2001:db8::/129".parse::<CidrRange>().is_err());
        assert!("".parse::<CidrRange>().is_err());
    }

    #[test]
    fn test_contains_boundaries() {
        let r = range("173.99.253.0/24");

        // Network address, an interior address, and the last address
        assert!(r.contains(&ip("173.99.253.0")));
        assert!(r.contains(&ip("173.99.253.17")));
        assert!(r.contains(&ip("173.99.253.255")));

        // One past either edge
        assert!(!r.contains(&ip("173.99.252.255")));
        assert!(!r.contains(&ip("173.99.254.0")));
    }

    #[test]
    fn test_contains_zero_prefix() {
        let all_v4 = range("0.0.0.0/0");
        assert!(all_v4.contains(&ip("8.8.8.8")));
        assert!(all_v4.contains(&ip("255.255.255.255")));
        assert!(!all_v4.contains(&ip("2001:db8::1")));
    }

    #[test]
    fn test_contains_host_range() {
        let r = range("192.0.2.7/32");
        assert!(r.contains(&ip("192.0.2.7")));
        assert!(!r.contains(&ip("192.0.2.8")));
    }

    #[test]
    fn test_cross_family_never_matches() {
        let v4 = range("10.0.0.0/8");
        let v6 = range("::/0");
        assert!(!v4.contains(&ip("::ffff:10.0.0.1")));
        assert!(!v6.contains(&ip("10.0.0.1")));
    }

    #[test]
    fn test_ipv6_containment() {
        let r = range("2001:db8::/32");
        assert!(r.contains(&ip("2001:db8::1")));
        assert!(r.contains(&ip("2001:db8:ffff:ffff:ffff:ffff:ffff:ffff")));
        assert!(!r.contains(&ip("2001:db9::1")));
    }

    #[test]
    fn test_normalized_spellings_compare_equal() {
        assert_eq!(range("10.0.0.5/24"), range("10.0.0.0/24"));
    }
}
