//! Raw attribute values of a model element, as provided by the input files.
use super::ParameterName;
use indexmap::IndexMap;
use std::rc::Rc;

/// A map of location and step to value for a time-indexed attribute.
///
/// The step is a full-resolution time step within the year for operational attributes and a
/// yearly step index for yearly ones. For attributes which are only indexed by location, the
/// step is ignored.
pub type AttributeSeries = IndexMap<(Rc<str>, Option<u32>), f64>;

/// The attribute values of a single element (carrier or technology)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttributeData {
    /// Values which apply at every location and time step
    pub scalars: IndexMap<ParameterName, f64>,
    /// Values which apply at specific locations and (optionally) time steps
    pub series: IndexMap<ParameterName, AttributeSeries>,
}

impl AttributeData {
    /// Get the value of an attribute for the given location and step.
    ///
    /// Looks for an entry at the exact step first, then for an entry covering all steps at this
    /// location and finally falls back to the element-wide scalar value.
    pub fn get(&self, name: ParameterName, location: &str, step: Option<u32>) -> Option<f64> {
        if let Some(series) = self.series.get(&name) {
            let key = |step| (Rc::from(location), step);
            let exact = step.and_then(|step| series.get(&key(Some(step))));
            if let Some(value) = exact.or_else(|| series.get(&key(None))) {
                return Some(*value);
            }
        }

        self.scalars.get(&name).copied()
    }

    /// Get the element-wide value of an attribute
    pub fn scalar(&self, name: ParameterName) -> Option<f64> {
        self.scalars.get(&name).copied()
    }

    /// Whether a value is provided anywhere for this attribute
    pub fn contains(&self, name: ParameterName) -> bool {
        self.scalars.contains_key(&name) || self.series.contains_key(&name)
    }

    /// Replace all values of an attribute with a single element-wide value
    pub fn overwrite(&mut self, name: ParameterName, value: f64) {
        self.series.shift_remove(&name);
        self.scalars.insert(name, value);
    }

    /// Multiply all values of an attribute by a factor.
    ///
    /// If no value has been provided for the attribute, the default is scaled instead. Returns
    /// false if there is nothing to scale (i.e. the attribute is required and missing).
    pub fn scale(&mut self, name: ParameterName, factor: f64) -> bool {
        if !self.contains(name) {
            let Some(default) = name.default_value() else {
                return false;
            };
            self.scalars.insert(name, default * factor);
            return true;
        }

        if let Some(value) = self.scalars.get_mut(&name) {
            *value *= factor;
        }
        if let Some(series) = self.series.get_mut(&name) {
            for value in series.values_mut() {
                *value *= factor;
            }
        }

        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::assert_approx_eq;
    use rstest::{fixture, rstest};

    #[fixture]
    fn data() -> AttributeData {
        let mut data = AttributeData::default();
        data.scalars.insert(ParameterName::Demand, 1.0);
        let series = data.series.entry(ParameterName::Demand).or_default();
        series.insert((Rc::from("node1"), Some(2)), 5.0);
        series.insert((Rc::from("node2"), None), 3.0);
        data
    }

    #[rstest]
    #[case("node1", Some(2), Some(5.0))]
    #[case("node1", Some(3), Some(1.0))]
    #[case("node2", Some(3), Some(3.0))]
    #[case("node3", None, Some(1.0))]
    fn test_get(
        data: AttributeData,
        #[case] location: &str,
        #[case] step: Option<u32>,
        #[case] expected: Option<f64>,
    ) {
        assert_eq!(data.get(ParameterName::Demand, location, step), expected);
    }

    #[rstest]
    fn test_get_missing(data: AttributeData) {
        assert_eq!(data.get(ParameterName::ImportPrice, "node1", Some(0)), None);
    }

    #[rstest]
    fn test_overwrite(mut data: AttributeData) {
        data.overwrite(ParameterName::Demand, 7.0);
        assert_eq!(data.get(ParameterName::Demand, "node1", Some(2)), Some(7.0));
        assert!(data.series.is_empty());
    }

    #[rstest]
    fn test_scale(mut data: AttributeData) {
        assert!(data.scale(ParameterName::Demand, 2.0));
        assert_approx_eq!(
            f64,
            data.get(ParameterName::Demand, "node1", Some(2)).unwrap(),
            10.0
        );
        assert_approx_eq!(f64, data.scalar(ParameterName::Demand).unwrap(), 2.0);

        // Scaling an attribute with a default value
        assert!(data.scale(ParameterName::MaxLoad, 0.5));
        assert_eq!(data.scalar(ParameterName::MaxLoad), Some(0.5));

        // Nothing to scale for a missing required attribute
        assert!(!data.scale(ParameterName::Lifetime, 2.0));
    }
}
