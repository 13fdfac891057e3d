//! Resource addresses: ordered `type=name` paths into the management tree.

use ember_common::{ManagementError, ManagementResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const SEGMENT_SEPARATOR: char = '/';
const PAIR_SEPARATOR: char = '=';

/// One `(type, name)` segment of an address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PathElement {
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
}

impl PathElement {
    pub fn new(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            name: name.into(),
        }
    }

    fn validate(&self, input: &str) -> ManagementResult<()> {
        if self.kind.is_empty() || self.name.is_empty() {
            return Err(ManagementError::invalid_address(
                input,
                "segment type and name must be non-empty",
            ));
        }
        let reserved = |s: &str| s.contains(SEGMENT_SEPARATOR) || s.contains(PAIR_SEPARATOR);
        if reserved(&self.kind) || reserved(&self.name) {
            return Err(ManagementError::invalid_address(
                input,
                format!(
                    "segment '{}' contains a reserved character ('{}' or '{}')",
                    self,
                    SEGMENT_SEPARATOR,
                    PAIR_SEPARATOR
                ),
            ));
        }
        Ok(())
    }
}

impl fmt::Display for PathElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.kind, PAIR_SEPARATOR, self.name)
    }
}

/// A validated, non-empty path of [`PathElement`]s.
///
/// Equality and ordering are structural, segment by segment, so a parent
/// always sorts directly before its descendants.
///
/// ```
/// use ember_management::ResourceAddress;
///
/// let address: ResourceAddress = "subsystem=logging/file-handler=FILE-TEST".parse().unwrap();
/// assert_eq!(address.len(), 2);
/// assert_eq!(address.last().name, "FILE-TEST");
/// assert_eq!(address.to_string(), "subsystem=logging/file-handler=FILE-TEST");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ResourceAddress {
    elements: Vec<PathElement>,
}

impl ResourceAddress {
    /// Build an address, rejecting empty paths, empty segments and repeated
    /// segment types at adjacent positions.
    pub fn new(elements: Vec<PathElement>) -> ManagementResult<Self> {
        let rendered = render(&elements);
        if elements.is_empty() {
            return Err(ManagementError::invalid_address(
                rendered,
                "address must have at least one segment",
            ));
        }
        for element in &elements {
            element.validate(&rendered)?;
        }
        if let Some(pair) = elements.windows(2).find(|pair| pair[0].kind == pair[1].kind) {
            return Err(ManagementError::invalid_address(
                rendered.clone(),
                format!("segment type '{}' repeated at adjacent positions", pair[1].kind),
            ));
        }
        Ok(Self { elements })
    }

    /// Single-segment address.
    pub fn of(kind: impl Into<String>, name: impl Into<String>) -> ManagementResult<Self> {
        Self::new(vec![PathElement::new(kind, name)])
    }

    /// A new address with `element` appended.
    pub fn append(&self, element: PathElement) -> ManagementResult<Self> {
        let mut elements = self.elements.clone();
        elements.push(element);
        Self::new(elements)
    }

    /// The enclosing address, or `None` for a top-level resource.
    pub fn parent(&self) -> Option<Self> {
        if self.elements.len() < 2 {
            return None;
        }
        Some(Self {
            elements: self.elements[..self.elements.len() - 1].to_vec(),
        })
    }

    /// The terminal segment.
    pub fn last(&self) -> &PathElement {
        // Non-empty by construction.
        &self.elements[self.elements.len() - 1]
    }

    pub fn elements(&self) -> &[PathElement] {
        &self.elements
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// True if `self` is `other` or lies underneath it.
    pub fn starts_with(&self, other: &ResourceAddress) -> bool {
        self.elements.starts_with(&other.elements)
    }

    /// True if `self` lies strictly underneath `other`.
    pub fn is_descendant_of(&self, other: &ResourceAddress) -> bool {
        self.elements.len() > other.elements.len() && self.starts_with(other)
    }
}

fn render(elements: &[PathElement]) -> String {
    elements
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(&SEGMENT_SEPARATOR.to_string())
}

impl fmt::Display for ResourceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", render(&self.elements))
    }
}

impl FromStr for ResourceAddress {
    type Err = ManagementError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let trimmed = input.strip_prefix(SEGMENT_SEPARATOR).unwrap_or(input);
        if trimmed.is_empty() {
            return Err(ManagementError::invalid_address(input, "address is empty"));
        }

        let mut elements = Vec::new();
        for segment in trimmed.split(SEGMENT_SEPARATOR) {
            if segment.is_empty() {
                return Err(ManagementError::invalid_address(input, "empty segment"));
            }
            let (kind, name) = segment.split_once(PAIR_SEPARATOR).ok_or_else(|| {
                ManagementError::invalid_address(
                    input,
                    format!("segment '{}' is not of the form type=name", segment),
                )
            })?;
            elements.push(PathElement::new(kind, name));
        }

        Self::new(elements).map_err(|e| match e {
            ManagementError::InvalidAddress { reason, .. } => {
                ManagementError::invalid_address(input, reason)
            }
            other => other,
        })
    }
}

impl TryFrom<String> for ResourceAddress {
    type Error = ManagementError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ResourceAddress> for String {
    fn from(address: ResourceAddress) -> Self {
        address.to_string()
    }
}
