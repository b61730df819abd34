use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

/// Inclusive, contiguous port range. `low > high` is a valid, empty range.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortRange {
    pub low: u16,
    pub high: u16,
}

impl PortRange {
    pub fn new(low: u16, high: u16) -> Self {
        Self { low, high }
    }

    /// Number of ports in the range; zero when `low > high`.
    pub fn len(&self) -> u64 {
        if self.low > self.high {
            0
        } else {
            u64::from(self.high - self.low) + 1
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Ports in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = u16> {
        self.low..=self.high
    }

    /// Parse a range spec for the command line.
    ///
    /// Supported forms:
    /// - single port number: `80`
    /// - inclusive range: `1-1024`
    /// - anything after `#` is ignored, surrounding whitespace is trimmed
    pub fn parse(s: &str) -> Result<Self> {
        let spec = s.split('#').next().map(str::trim).unwrap_or("");
        if spec.is_empty() {
            bail!("empty port range");
        }

        if let Some((a, b)) = spec.split_once('-') {
            let low = parse_port_str(a.trim())
                .with_context(|| format!("invalid start in range: {a}"))?;
            let high = parse_port_str(b.trim())
                .with_context(|| format!("invalid end in range: {b}"))?;
            return Ok(Self::new(low, high));
        }

        let p = parse_port_str(spec).with_context(|| format!("invalid port value: {spec}"))?;
        Ok(Self::new(p, p))
    }
}

impl Default for PortRange {
    fn default() -> Self {
        Self::new(1, 1024)
    }
}

impl std::fmt::Display for PortRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.low, self.high)
    }
}

impl std::str::FromStr for PortRange {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

fn parse_port_str(s: &str) -> Result<u16> {
    let val: u32 = s.parse::<u32>().map_err(|e| anyhow::anyhow!(e))?;
    if val == 0 || val > 65535 {
        bail!("port out of range: {val}");
    }
    Ok(val as u16)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_single_port() {
        assert_eq!(PortRange::parse(" 443 ").unwrap(), PortRange::new(443, 443));
    }

    #[test]
    fn parse_range_with_comment() {
        let r = PortRange::parse("8000-8002  # dev servers").unwrap();
        assert_eq!(r, PortRange::new(8000, 8002));
        assert_eq!(r.iter().collect::<Vec<_>>(), vec![8000, 8001, 8002]);
    }

    #[test]
    fn reversed_range_is_empty() {
        let r = PortRange::parse("5-1").unwrap();
        assert!(r.is_empty());
        assert_eq!(r.iter().count(), 0);
    }

    #[test]
    fn invalid_values_error() {
        assert!(PortRange::parse("70000").is_err());
        assert!(PortRange::parse("0-10").is_err());
        assert!(PortRange::parse("http").is_err());
        assert!(PortRange::parse("  # nothing").is_err());
    }

    #[test]
    fn full_range_len() {
        assert_eq!(PortRange::new(1, 65535).len(), 65535);
    }
}
