//! Permission names and patterns.
//!
//! A permission is named `<resource>.<action>`, e.g. `orders.create`.
//! Patterns add a `*` wildcard on either side (`*.view`, `orders.*`, `*.*`)
//! and are only used when seeding role policies; grants themselves always
//! name a concrete permission.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::util::ids::is_segment;
use crate::{Error, Result};

/// A validated `<resource>.<action>` permission name.
///
/// # Examples
///
/// ```
/// use bizops_core::PermissionName;
///
/// let name: PermissionName = "orders.create".parse().unwrap();
/// assert_eq!(name.resource(), "orders");
/// assert_eq!(name.action(), "create");
/// assert_eq!(PermissionName::new("orders", "create").unwrap(), name);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PermissionName {
    full: String,
    dot: usize,
}

impl PermissionName {
    /// Builds a permission name from its resource and action.
    pub fn new(resource: &str, action: &str) -> Result<Self> {
        if !is_segment(resource) {
            return Err(Error::validation_field(
                "permission",
                format!("invalid resource '{resource}'"),
            ));
        }
        if !is_segment(action) {
            return Err(Error::validation_field(
                "permission",
                format!("invalid action '{action}'"),
            ));
        }
        Ok(Self {
            full: format!("{resource}.{action}"),
            dot: resource.len(),
        })
    }

    /// The resource half, e.g. `orders`.
    pub fn resource(&self) -> &str {
        &self.full[..self.dot]
    }

    /// The action half, e.g. `create`.
    pub fn action(&self) -> &str {
        &self.full[self.dot + 1..]
    }

    /// The full `<resource>.<action>` string.
    pub fn as_str(&self) -> &str {
        &self.full
    }
}

impl FromStr for PermissionName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (resource, action) = s.trim().split_once('.').ok_or_else(|| {
            Error::validation_field(
                "permission",
                format!("'{s}' is not of the form <resource>.<action>"),
            )
        })?;
        Self::new(resource, action)
    }
}

impl fmt::Display for PermissionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full)
    }
}

impl AsRef<str> for PermissionName {
    fn as_ref(&self) -> &str {
        &self.full
    }
}

impl Serialize for PermissionName {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.full)
    }
}

impl<'de> Deserialize<'de> for PermissionName {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// One side of a [`PermissionPattern`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    /// Matches any value.
    Any,
    /// Matches exactly this value.
    Exact(String),
}

impl Segment {
    fn parse(segment: &str, what: &str) -> Result<Self> {
        if segment == "*" {
            Ok(Self::Any)
        } else if is_segment(segment) {
            Ok(Self::Exact(segment.to_string()))
        } else {
            Err(Error::validation_field(
                "permission",
                format!("invalid {what} '{segment}' in pattern"),
            ))
        }
    }

    fn matches(&self, value: &str) -> bool {
        match self {
            Self::Any => true,
            Self::Exact(v) => v == value,
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => f.write_str("*"),
            Self::Exact(v) => f.write_str(v),
        }
    }
}

/// A permission pattern such as `*.view` or `orders.*`.
///
/// # Examples
///
/// ```
/// use bizops_core::{PermissionName, PermissionPattern};
///
/// let pattern: PermissionPattern = "*.view".parse().unwrap();
/// assert!(pattern.matches(&"orders.view".parse().unwrap()));
/// assert!(!pattern.matches(&"orders.edit".parse().unwrap()));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PermissionPattern {
    resource: Segment,
    action: Segment,
}

impl PermissionPattern {
    /// The resource side of the pattern.
    pub fn resource(&self) -> &Segment {
        &self.resource
    }

    /// The action side of the pattern.
    pub fn action(&self) -> &Segment {
        &self.action
    }

    /// Returns the concrete permission when the pattern has no wildcard.
    pub fn as_exact(&self) -> Option<PermissionName> {
        match (&self.resource, &self.action) {
            (Segment::Exact(r), Segment::Exact(a)) => PermissionName::new(r, a).ok(),
            _ => None,
        }
    }

    /// Whether `name` is covered by this pattern.
    pub fn matches(&self, name: &PermissionName) -> bool {
        self.resource.matches(name.resource()) && self.action.matches(name.action())
    }
}

impl FromStr for PermissionPattern {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (resource, action) = s.trim().split_once('.').ok_or_else(|| {
            Error::validation_field(
                "permission",
                format!("'{s}' is not of the form <resource>.<action>"),
            )
        })?;
        Ok(Self {
            resource: Segment::parse(resource, "resource")?,
            action: Segment::parse(action, "action")?,
        })
    }
}

impl fmt::Display for PermissionPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.resource, self.action)
    }
}
