//! Index tuples shared by parameter, variable and constraint tables.
//!
//! Every entry of a table is keyed by an [`IndexTuple`] whose components are the members of the
//! table's declared [`Dimension`]s, in order.
use serde::{Deserialize, Serialize};
use std::fmt;
use std::rc::Rc;
use strum::{Display, EnumString};

/// A single component of an index tuple
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IndexValue {
    /// A step (operational or yearly) or segment number
    Step(u32),
    /// A set member identified by name (carrier, technology, node, edge, ...)
    Label(Rc<str>),
}

impl fmt::Display for IndexValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Step(step) => write!(f, "{step}"),
            Self::Label(label) => write!(f, "{label}"),
        }
    }
}

impl From<u32> for IndexValue {
    fn from(value: u32) -> Self {
        Self::Step(value)
    }
}

impl From<&str> for IndexValue {
    fn from(value: &str) -> Self {
        Self::Label(Rc::from(value))
    }
}

impl From<&IndexValue> for IndexValue {
    fn from(value: &IndexValue) -> Self {
        value.clone()
    }
}

impl From<&Rc<str>> for IndexValue {
    fn from(value: &Rc<str>) -> Self {
        Self::Label(Rc::clone(value))
    }
}

/// Implement `From<&ID>` for [`IndexValue`] for the given ID types
macro_rules! impl_index_value_from_id {
    ($($id:ty),+) => {
        $(
            impl From<&$id> for crate::index::IndexValue {
                fn from(value: &$id) -> Self {
                    Self::Label(std::rc::Rc::clone(&value.0))
                }
            }
        )+
    };
}
pub(crate) use impl_index_value_from_id;

/// An ordered tuple of index components
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct IndexTuple(pub Vec<IndexValue>);

impl IndexTuple {
    /// The number of components in the tuple
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the tuple has no components (i.e. indexes a scalar)
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for IndexTuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, value) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{value}")?;
        }
        write!(f, ")")
    }
}

/// Build an [`IndexTuple`] from a list of components
macro_rules! index {
    () => {
        crate::index::IndexTuple(Vec::new())
    };
    ($($value:expr),+ $(,)?) => {
        crate::index::IndexTuple(vec![$(crate::index::IndexValue::from($value)),+])
    };
}
pub(crate) use index;

/// A named index set over which a table is declared
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    /// All carriers
    SetCarriers,
    /// Input carriers of a technology
    SetInputCarriers,
    /// Output carriers of a technology
    SetOutputCarriers,
    /// All technologies
    SetTechnologies,
    /// Nodes of the network
    SetNodes,
    /// Edges of the network
    SetEdges,
    /// The locations of a technology (nodes or edges, depending on category)
    SetLocation,
    /// Operational (aggregated) time steps
    SetTimeStepsOperation,
    /// Yearly investment time steps
    SetTimeStepsYearly,
    /// Segments of a piecewise-affine function
    SetSegments,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_display() {
        let idx = index!["boiler", "node1", 3u32];
        assert_eq!(idx.to_string(), "(boiler, node1, 3)");
        assert_eq!(index![].to_string(), "()");
    }

    #[test]
    fn test_index_json() {
        let idx = index!["pipeline", "a-b", 7u32];
        let json = serde_json::to_string(&idx).unwrap();
        assert_eq!(json, r#"["pipeline","a-b",7]"#);
        let back: IndexTuple = serde_json::from_str(&json).unwrap();
        assert_eq!(back, idx);
    }
}
