//! XACML `ipAddress` values.
//!
//! Grammar, IPv4: `addr[/mask][:portrange]`; IPv6: `[addr][/[mask]][:portrange]`.
//! A mask is either an address of the same family or a prefix length.
//! Only literals are accepted; nothing is ever resolved.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

use super::{DatatypeId, LexicalText};
use crate::error::ValueError;

// ---------------------------------------------------------------------------
// PortRange
// ---------------------------------------------------------------------------

/// Inclusive port range; a missing bound is open. Both bounds missing matches
/// any port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PortRange {
    lower: Option<u16>,
    upper: Option<u16>,
}

impl PortRange {
    pub const UNBOUND: PortRange = PortRange {
        lower: None,
        upper: None,
    };

    pub fn new(lower: Option<u16>, upper: Option<u16>) -> Option<Self> {
        match (lower, upper) {
            (Some(l), Some(u)) if l > u => None,
            _ => Some(Self { lower, upper }),
        }
    }

    pub fn single(port: u16) -> Self {
        Self {
            lower: Some(port),
            upper: Some(port),
        }
    }

    pub fn lower_bound(&self) -> Option<u16> {
        self.lower
    }

    pub fn upper_bound(&self) -> Option<u16> {
        self.upper
    }

    pub fn is_unbound(&self) -> bool {
        self.lower.is_none() && self.upper.is_none()
    }

    pub fn contains(&self, port: u16) -> bool {
        self.lower.map_or(true, |l| port >= l) && self.upper.map_or(true, |u| port <= u)
    }
}

fn parse_port(s: &str) -> Option<u16> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

impl FromStr for PortRange {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || format!("invalid port range `{}`", s);
        if let Some(upper) = s.strip_prefix('-') {
            let upper = parse_port(upper).ok_or_else(invalid)?;
            return Ok(Self {
                lower: None,
                upper: Some(upper),
            });
        }
        match s.split_once('-') {
            Some((lower, upper)) => {
                let lower = parse_port(lower).ok_or_else(invalid)?;
                let upper = if upper.is_empty() {
                    None
                } else {
                    Some(parse_port(upper).ok_or_else(invalid)?)
                };
                PortRange::new(Some(lower), upper).ok_or_else(invalid)
            }
            None => parse_port(s).map(PortRange::single).ok_or_else(invalid),
        }
    }
}

impl fmt::Display for PortRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.lower, self.upper) {
            (Some(l), Some(u)) if l == u => write!(f, "{}", l),
            (Some(l), Some(u)) => write!(f, "{}-{}", l, u),
            (Some(l), None) => write!(f, "{}-", l),
            (None, Some(u)) => write!(f, "-{}", u),
            (None, None) => Ok(()),
        }
    }
}

// ---------------------------------------------------------------------------
// IpAddressValue
// ---------------------------------------------------------------------------

/// Parsed once at construction. Equality and hashing use the parsed
/// (address, mask, port range) triple, so `[::A]` equals `[::a]`.
#[derive(Debug, Clone)]
pub struct IpAddressValue {
    lexical: String,
    address: IpAddr,
    mask: Option<IpAddr>,
    port_range: PortRange,
}

impl IpAddressValue {
    pub fn address(&self) -> IpAddr {
        self.address
    }

    pub fn mask(&self) -> Option<IpAddr> {
        self.mask
    }

    pub fn port_range(&self) -> PortRange {
        self.port_range
    }

    /// Lexical form rebuilt from the parsed parts: lowercase compressed IPv6,
    /// masks as addresses. Values that compare equal render identically.
    pub fn normalized(&self) -> String {
        let mut out = match self.address {
            IpAddr::V4(a) => a.to_string(),
            IpAddr::V6(a) => format!("[{}]", a),
        };
        match self.mask {
            Some(IpAddr::V4(m)) => out.push_str(&format!("/{}", m)),
            Some(IpAddr::V6(m)) => out.push_str(&format!("/[{}]", m)),
            None => {}
        }
        if !self.port_range.is_unbound() {
            out.push_str(&format!(":{}", self.port_range));
        }
        out
    }

    fn triple(&self) -> (IpAddr, Option<IpAddr>, PortRange) {
        (self.address, self.mask, self.port_range)
    }
}

impl PartialEq for IpAddressValue {
    fn eq(&self, other: &Self) -> bool {
        self.triple() == other.triple()
    }
}

impl Eq for IpAddressValue {}

impl Hash for IpAddressValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.triple().hash(state);
    }
}

impl FromStr for IpAddressValue {
    type Err = ValueError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let s = input.trim();
        let parsed = if s.starts_with('[') {
            parse_ipv6(s)
        } else {
            parse_ipv4(s)
        };
        let (address, mask, port_range) =
            parsed.map_err(|reason| ValueError::format(DatatypeId::IpAddress, input, reason))?;
        Ok(Self {
            lexical: s.to_string(),
            address,
            mask,
            port_range,
        })
    }
}

type Parsed = (IpAddr, Option<IpAddr>, PortRange);

fn parse_ipv4(s: &str) -> Result<Parsed, String> {
    let address = |a: &str| {
        Ipv4Addr::from_str(a)
            .map(IpAddr::V4)
            .map_err(|_| format!("`{}` is not an IPv4 address literal", a))
    };
    let mask_pos = s.find('/');
    let range_pos = s.find(':');

    match (mask_pos, range_pos) {
        (None, None) => Ok((address(s)?, None, PortRange::UNBOUND)),
        (None, Some(r)) => Ok((address(&s[..r])?, None, s[r + 1..].parse()?)),
        (Some(m), None) => Ok((
            address(&s[..m])?,
            Some(ipv4_mask(&s[m + 1..])?),
            PortRange::UNBOUND,
        )),
        (Some(m), Some(r)) if r > m => Ok((
            address(&s[..m])?,
            Some(ipv4_mask(&s[m + 1..r])?),
            s[r + 1..].parse()?,
        )),
        (Some(_), Some(_)) => Err("port range must follow the mask".to_string()),
    }
}

fn ipv4_mask(s: &str) -> Result<IpAddr, String> {
    if let Some(prefix) = prefix_length(s, 32)? {
        let bits = if prefix == 0 { 0 } else { u32::MAX << (32 - prefix) };
        return Ok(IpAddr::V4(Ipv4Addr::from(bits)));
    }
    Ipv4Addr::from_str(s)
        .map(IpAddr::V4)
        .map_err(|_| format!("`{}` is not an IPv4 mask", s))
}

fn ipv6_mask(s: &str) -> Result<IpAddr, String> {
    if let Some(prefix) = prefix_length(s, 128)? {
        let bits = if prefix == 0 { 0 } else { u128::MAX << (128 - prefix) };
        return Ok(IpAddr::V6(Ipv6Addr::from(bits)));
    }
    Ipv6Addr::from_str(s)
        .map(IpAddr::V6)
        .map_err(|_| format!("`{}` is not an IPv6 mask", s))
}

/// `Ok(None)` when `s` is not all digits (an address-form mask).
fn prefix_length(s: &str, max: u32) -> Result<Option<u32>, String> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return Ok(None);
    }
    match s.parse::<u32>() {
        Ok(p) if p <= max => Ok(Some(p)),
        _ => Err(format!("prefix length `{}` exceeds {}", s, max)),
    }
}

fn parse_ipv6(s: &str) -> Result<Parsed, String> {
    let close = s
        .find(']')
        .ok_or_else(|| "missing `]` after IPv6 address".to_string())?;
    let literal = &s[1..close];
    let address = Ipv6Addr::from_str(literal)
        .map(IpAddr::V6)
        .map_err(|_| format!("`{}` is not an IPv6 address literal", literal))?;

    let mut rest = &s[close + 1..];
    let mask = match rest.strip_prefix('/') {
        Some(m) => {
            let inner = m
                .strip_prefix('[')
                .ok_or_else(|| "IPv6 mask must be enclosed in brackets".to_string())?;
            let end = inner
                .find(']')
                .ok_or_else(|| "missing `]` after IPv6 mask".to_string())?;
            rest = &inner[end + 1..];
            Some(ipv6_mask(&inner[..end])?)
        }
        None => None,
    };

    let port_range = if rest.is_empty() {
        PortRange::UNBOUND
    } else {
        rest.strip_prefix(':')
            .ok_or_else(|| format!("unexpected trailing characters `{}`", rest))?
            .parse()?
    };
    Ok((address, mask, port_range))
}

impl fmt::Display for IpAddressValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.lexical)
    }
}

impl LexicalText for IpAddressValue {
    fn text(&self) -> &str {
        &self.lexical
    }
}
