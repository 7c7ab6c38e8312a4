//! Port types a box can request forwarding for.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Traffic type of a requested port forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortType {
    /// Plain HTTP forwarding.
    Http,
    /// TLS-terminated HTTPS forwarding.
    Https,
    /// Raw TCP forwarding.
    Tcp,
}

impl PortType {
    /// Return the port type as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Https => "https",
            Self::Tcp => "tcp",
        }
    }
}

impl fmt::Display for PortType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for PortType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "http" => Ok(Self::Http),
            "https" => Ok(Self::Https),
            "tcp" => Ok(Self::Tcp),
            other => Err(AppError::validation(format!("Unknown port type '{other}'"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        for pt in [PortType::Http, PortType::Https, PortType::Tcp] {
            assert_eq!(pt.as_str().parse::<PortType>().unwrap(), pt);
        }
    }

    #[test]
    fn test_unknown_port_type() {
        assert!("udp".parse::<PortType>().is_err());
    }
}
