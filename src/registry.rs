//! Registry address resolution
//!
//! Device enumeration reports driver configuration locations as raw
//! `\Registry\...` strings. Parsing maps them to a hive plus subpath so the
//! registry capability can read values; the result is informational only and
//! never feeds the transaction engine.

use serde::{Deserialize, Serialize};

use crate::error::{DisplayError, DisplayResult};

const MACHINE_PREFIX: &str = "\\Registry\\Machine\\";
const USER_PREFIX: &str = "\\Registry\\User\\";

/// Root hive of a registry address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegistryHive {
    LocalMachine,
    Users,
}

/// A parsed device registry address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryAddress {
    pub hive: RegistryHive,
    pub path: String,
}

impl RegistryAddress {
    /// Parses a raw device key string. Fails with `InvalidRegistryAddress`
    /// when the string does not start with a known hive prefix.
    pub fn parse(device_key: &str) -> DisplayResult<Self> {
        if let Some(path) = strip_prefix_ignore_case(device_key, MACHINE_PREFIX) {
            return Ok(Self {
                hive: RegistryHive::LocalMachine,
                path: path.to_string(),
            });
        }
        if let Some(path) = strip_prefix_ignore_case(device_key, USER_PREFIX) {
            return Ok(Self {
                hive: RegistryHive::Users,
                path: path.to_string(),
            });
        }
        Err(DisplayError::InvalidRegistryAddress(device_key.to_string()))
    }
}

impl std::fmt::Display for RegistryAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let root = match self.hive {
            RegistryHive::LocalMachine => "HKEY_LOCAL_MACHINE",
            RegistryHive::Users => "HKEY_USERS",
        };
        write!(f, "{}\\{}", root, self.path)
    }
}

fn strip_prefix_ignore_case<'a>(value: &'a str, prefix: &str) -> Option<&'a str> {
    if value.len() >= prefix.len() && value[..prefix.len()].eq_ignore_ascii_case(prefix) {
        Some(&value[prefix.len()..])
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_machine_key() {
        let address = RegistryAddress::parse(
            "\\Registry\\Machine\\System\\CurrentControlSet\\Control\\Video\\{guid}\\0000",
        )
        .unwrap();
        assert_eq!(address.hive, RegistryHive::LocalMachine);
        assert_eq!(
            address.path,
            "System\\CurrentControlSet\\Control\\Video\\{guid}\\0000"
        );
    }

    #[test]
    fn test_parse_is_case_insensitive() {
        let address = RegistryAddress::parse("\\REGISTRY\\MACHINE\\System\\Key").unwrap();
        assert_eq!(address.hive, RegistryHive::LocalMachine);
        assert_eq!(address.path, "System\\Key");
    }

    #[test]
    fn test_parse_user_key() {
        let address = RegistryAddress::parse("\\Registry\\User\\S-1-5-21\\Console").unwrap();
        assert_eq!(address.hive, RegistryHive::Users);
    }

    #[test]
    fn test_parse_rejects_malformed_key() {
        let err = RegistryAddress::parse("System\\CurrentControlSet").unwrap_err();
        assert!(matches!(err, DisplayError::InvalidRegistryAddress(_)));

        let err = RegistryAddress::parse("").unwrap_err();
        assert!(matches!(err, DisplayError::InvalidRegistryAddress(_)));
    }
}
