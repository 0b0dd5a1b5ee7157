//! The parameter store: typed, multi-dimensional lookup tables.
//!
//! Every table is declared over the [`Dimension`]s of its [`ParameterName`]. Values are inserted
//! while a model is being constructed for a horizon step and are read-only afterwards.
use crate::error::ModelError;
use crate::index::{Dimension, IndexTuple};
use crate::sets::SetRegistry;
use anyhow::{Result, bail, ensure};
use indexmap::IndexMap;

pub mod attribute;
pub mod name;
pub use attribute::{AttributeData, AttributeSeries};
pub use name::{ElementKind, Granularity, ParameterName};

/// The values of a single parameter, keyed by index tuple
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterTable {
    /// The name of the parameter
    pub name: ParameterName,
    /// The values, in insertion order
    pub values: IndexMap<IndexTuple, f64>,
}

impl ParameterTable {
    /// Create a new empty table
    pub fn new(name: ParameterName) -> Self {
        Self {
            name,
            values: IndexMap::new(),
        }
    }

    /// The index sets of this table
    pub fn dimensions(&self) -> &'static [Dimension] {
        self.name.dimensions()
    }

    /// Get the value at the given index, if present
    pub fn get(&self, index: &IndexTuple) -> Option<f64> {
        self.values.get(index).copied()
    }
}

/// All parameter tables of a model for one scenario and horizon step
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterStore {
    tables: IndexMap<ParameterName, ParameterTable>,
}

impl ParameterStore {
    /// Insert a value, checking the index against the table's declared index sets.
    ///
    /// Raises a [`ModelError::DataConsistency`] if the index has the wrong number of components,
    /// if a component is not a member of its set or if a value has already been inserted at this
    /// index.
    pub fn insert(
        &mut self,
        sets: &SetRegistry,
        name: ParameterName,
        index: IndexTuple,
        value: f64,
    ) -> Result<()> {
        let dimensions = name.dimensions();
        ensure!(
            index.len() == dimensions.len(),
            ModelError::data_consistency(
                name,
                format!(
                    "index {index} has {} components but the parameter is declared over {}",
                    index.len(),
                    dimensions.len()
                )
            )
        );

        for (dimension, member) in dimensions.iter().zip(&index.0) {
            ensure!(
                sets.contains(*dimension, member),
                ModelError::data_consistency(
                    name,
                    format!("{member} in index {index} is not a member of {dimension}")
                )
            );
        }

        let table = self
            .tables
            .entry(name)
            .or_insert_with(|| ParameterTable::new(name));
        if table.values.insert(index.clone(), value).is_some() {
            bail!(ModelError::data_consistency(
                name,
                format!("duplicate value at index {index}")
            ));
        }

        Ok(())
    }

    /// Look up a value.
    ///
    /// It is an error to look up an index for which no value was inserted.
    pub fn extract(&self, name: ParameterName, index: &IndexTuple) -> Result<f64> {
        match self.get(name, index) {
            Some(value) => Ok(value),
            None => bail!(ModelError::data_consistency(
                name,
                format!("no value at index {index}")
            )),
        }
    }

    /// Look up a value, returning `None` if it is absent
    pub fn get(&self, name: ParameterName, index: &IndexTuple) -> Option<f64> {
        self.tables.get(&name).and_then(|table| table.get(index))
    }

    /// Get the table for a parameter
    pub fn table(&self, name: ParameterName) -> Option<&ParameterTable> {
        self.tables.get(&name)
    }

    /// Iterate over all tables in the order they were first populated
    pub fn iter(&self) -> impl Iterator<Item = &ParameterTable> {
        self.tables.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::simple_sets;
    use crate::index::index;
    use rstest::rstest;

    fn consistency_error(result: Result<()>) -> ModelError {
        result
            .unwrap_err()
            .downcast::<ModelError>()
            .expect("Expected a ModelError")
    }

    #[rstest]
    fn test_insert_and_extract(simple_sets: SetRegistry) {
        let mut store = ParameterStore::default();
        store
            .insert(
                &simple_sets,
                ParameterName::Demand,
                index!["B", "node1", 0u32],
                10.0,
            )
            .unwrap();
        assert_eq!(
            store
                .extract(ParameterName::Demand, &index!["B", "node1", 0u32])
                .unwrap(),
            10.0
        );
        assert!(
            store
                .extract(ParameterName::Demand, &index!["B", "node2", 0u32])
                .is_err()
        );
    }

    #[rstest]
    fn test_insert_wrong_arity(simple_sets: SetRegistry) {
        let mut store = ParameterStore::default();
        let err = consistency_error(store.insert(
            &simple_sets,
            ParameterName::Demand,
            index!["B", "node1"],
            1.0,
        ));
        assert!(matches!(err, ModelError::DataConsistency { .. }));
        assert!(err.to_string().contains("declared over 3"));
    }

    #[rstest]
    #[case(index!["B", "node3", 0u32])]
    #[case(index!["B", "node1", 99u32])]
    #[case(index!["C", "node1", 0u32])]
    #[case(index!["B", 1u32, 0u32])]
    fn test_insert_unknown_member(simple_sets: SetRegistry, #[case] index: IndexTuple) {
        let mut store = ParameterStore::default();
        let err = consistency_error(store.insert(
            &simple_sets,
            ParameterName::Demand,
            index,
            1.0,
        ));
        assert!(err.to_string().contains("is not a member of"));
    }

    #[rstest]
    fn test_insert_duplicate(simple_sets: SetRegistry) {
        let mut store = ParameterStore::default();
        let idx = index!["converter"];
        store
            .insert(&simple_sets, ParameterName::Lifetime, idx.clone(), 10.0)
            .unwrap();
        let err = consistency_error(store.insert(
            &simple_sets,
            ParameterName::Lifetime,
            idx,
            20.0,
        ));
        assert!(err.to_string().contains("duplicate value"));
    }

    #[rstest]
    fn test_scalar_table(simple_sets: SetRegistry) {
        let mut store = ParameterStore::default();
        store
            .insert(
                &simple_sets,
                ParameterName::PreviousCarbonEmissions,
                index![],
                3.0,
            )
            .unwrap();
        assert_eq!(
            store.get(ParameterName::PreviousCarbonEmissions, &index![]),
            Some(3.0)
        );
    }
}
