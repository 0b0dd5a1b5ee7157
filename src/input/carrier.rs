//! Code for reading carrier-related information from CSV files.
use super::*;
use crate::carrier::{Carrier, CarrierID, CarrierMap};
use crate::id::IDCollection;
use crate::network::NodeSet;
use serde::Deserialize;

const CARRIERS_FILE_NAME: &str = "carriers.csv";
const CARRIER_ATTRIBUTES_FILE_NAME: &str = "carrier_attributes.csv";
const CARRIER_TIME_SERIES_FILE_NAME: &str = "carrier_time_series.csv";

#[derive(Debug, Deserialize, PartialEq)]
struct CarrierRaw {
    id: CarrierID,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize, PartialEq)]
struct CarrierAttributeRaw {
    carrier_id: String,
    attribute: String,
    value: f64,
}

#[derive(Debug, Deserialize, PartialEq)]
struct CarrierTimeSeriesRaw {
    carrier_id: String,
    attribute: String,
    node_id: String,
    #[serde(deserialize_with = "deserialise_optional_step", default)]
    time_step: Option<u32>,
    value: f64,
}

/// Read carriers and their attributes.
///
/// # Arguments
///
/// * `model_dir` - Folder containing model configuration files
/// * `nodes` - The nodes of the network
/// * `system` - The `[system]` parameters, which give the valid time steps
pub fn read_carriers(
    model_dir: &Path,
    nodes: &NodeSet,
    system: &SystemParameters,
) -> Result<CarrierMap> {
    let file_path = model_dir.join(CARRIERS_FILE_NAME);
    let mut carriers = read_carriers_from_iter(read_csv(&file_path)?)
        .with_context(|| input_err_msg(&file_path))?;

    let file_path = model_dir.join(CARRIER_ATTRIBUTES_FILE_NAME);
    read_carrier_attributes_from_iter(read_csv_optional(&file_path)?, &mut carriers)
        .with_context(|| input_err_msg(&file_path))?;

    let file_path = model_dir.join(CARRIER_TIME_SERIES_FILE_NAME);
    read_carrier_time_series_from_iter(
        read_csv_optional(&file_path)?,
        &mut carriers,
        nodes,
        system,
    )
    .with_context(|| input_err_msg(&file_path))?;

    Ok(carriers)
}

fn read_carriers_from_iter<I>(iter: I) -> Result<CarrierMap>
where
    I: Iterator<Item = CarrierRaw>,
{
    let mut carriers = CarrierMap::new();
    for raw in iter {
        let carrier = Carrier {
            id: raw.id.clone(),
            description: raw.description,
            attributes: AttributeData::default(),
        };
        ensure!(
            carriers.insert(raw.id.clone(), carrier).is_none(),
            "Duplicate carrier ID {}",
            raw.id
        );
    }

    Ok(carriers)
}

fn read_carrier_attributes_from_iter<I>(iter: I, carriers: &mut CarrierMap) -> Result<()>
where
    I: Iterator<Item = CarrierAttributeRaw>,
{
    for raw in iter {
        let id = carriers.get_id_by_str(&raw.carrier_id)?;
        let carrier = &mut carriers[&id];
        add_scalar_attribute(
            &mut carrier.attributes,
            &raw.carrier_id,
            ElementKind::Carrier,
            &raw.attribute,
            raw.value,
        )?;
    }

    Ok(())
}

fn read_carrier_time_series_from_iter<I>(
    iter: I,
    carriers: &mut CarrierMap,
    nodes: &NodeSet,
    system: &SystemParameters,
) -> Result<()>
where
    I: Iterator<Item = CarrierTimeSeriesRaw>,
{
    for raw in iter {
        let id = carriers.get_id_by_str(&raw.carrier_id)?;
        nodes.get_id_by_str(&raw.node_id)?;
        let carrier = &mut carriers[&id];
        add_series_attribute(
            &mut carrier.attributes,
            &raw.carrier_id,
            ElementKind::Carrier,
            &raw.attribute,
            (&raw.node_id, raw.time_step),
            raw.value,
            system,
        )?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::simple_model;
    use crate::model::Model;
    use crate::parameter::ParameterName;
    use float_cmp::assert_approx_eq;
    use rstest::rstest;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    fn carriers() -> CarrierMap {
        read_carriers_from_iter(
            [
                CarrierRaw {
                    id: "gas".into(),
                    description: "Natural gas".into(),
                },
                CarrierRaw {
                    id: "heat".into(),
                    description: String::new(),
                },
            ]
            .into_iter(),
        )
        .unwrap()
    }

    fn series_raw(attribute: &str, time_step: Option<u32>, value: f64) -> CarrierTimeSeriesRaw {
        CarrierTimeSeriesRaw {
            carrier_id: "heat".into(),
            attribute: attribute.into(),
            node_id: "node1".into(),
            time_step,
            value,
        }
    }

    #[rstest]
    fn test_read_carriers(simple_model: Model) {
        let dir = tempdir().unwrap();
        {
            let mut file = File::create(dir.path().join(CARRIERS_FILE_NAME)).unwrap();
            writeln!(file, "id,description\ngas,Natural gas\nheat,").unwrap();
        }
        {
            let mut file = File::create(dir.path().join(CARRIER_TIME_SERIES_FILE_NAME)).unwrap();
            writeln!(
                file,
                "carrier_id,attribute,node_id,time_step,value
heat,demand,node1,,5
heat,demand,node1,1,7"
            )
            .unwrap();
        }

        let mut system = simple_model.system().clone();
        system.unaggregated_time_steps_per_year = 2;
        let carriers = read_carriers(dir.path(), &simple_model.nodes, &system).unwrap();
        assert_eq!(carriers.len(), 2);
        assert_eq!(carriers["gas"].description, "Natural gas");
        let heat = &carriers["heat"].attributes;
        assert_eq!(heat.get(ParameterName::Demand, "node1", Some(0)), Some(5.0));
        assert_eq!(heat.get(ParameterName::Demand, "node1", Some(1)), Some(7.0));
        assert_eq!(heat.get(ParameterName::Demand, "node2", Some(1)), None);
    }

    #[test]
    fn test_read_carriers_duplicate() {
        let raw = [
            CarrierRaw {
                id: "gas".into(),
                description: String::new(),
            },
            CarrierRaw {
                id: "gas".into(),
                description: String::new(),
            },
        ];
        assert!(read_carriers_from_iter(raw.into_iter()).is_err());
    }

    #[test]
    fn test_read_carrier_attributes() {
        let mut carriers = carriers();
        let raw = CarrierAttributeRaw {
            carrier_id: "gas".into(),
            attribute: "import_price".into(),
            value: 30.0,
        };
        read_carrier_attributes_from_iter(std::iter::once(raw), &mut carriers).unwrap();
        assert_approx_eq!(
            f64,
            carriers["gas"]
                .attributes
                .scalar(ParameterName::ImportPrice)
                .unwrap(),
            30.0
        );
    }

    fn attribute_raw(carrier_id: &str, attribute: &str, value: f64) -> CarrierAttributeRaw {
        CarrierAttributeRaw {
            carrier_id: carrier_id.into(),
            attribute: attribute.into(),
            value,
        }
    }

    #[rstest]
    #[case(attribute_raw("coal", "import_price", 1.0))]
    #[case(attribute_raw("gas", "lifetime", 1.0))]
    #[case(attribute_raw("gas", "import_price", f64::NAN))]
    fn test_read_carrier_attributes_invalid(#[case] raw: CarrierAttributeRaw) {
        let mut carriers = carriers();
        assert!(read_carrier_attributes_from_iter(std::iter::once(raw), &mut carriers).is_err());
    }

    #[rstest]
    #[case(series_raw("demand", Some(1), 1.0))]
    #[case(series_raw("shed_demand_price", None, 1.0))]
    fn test_read_carrier_time_series(simple_model: Model, #[case] raw: CarrierTimeSeriesRaw) {
        let mut system = simple_model.system().clone();
        system.unaggregated_time_steps_per_year = 2;
        let mut carriers = carriers();
        read_carrier_time_series_from_iter(
            std::iter::once(raw),
            &mut carriers,
            &simple_model.nodes,
            &system,
        )
        .unwrap();
    }

    #[rstest]
    #[case(series_raw("demand", Some(2), 1.0))]
    #[case(series_raw("shed_demand_price", Some(0), 1.0))]
    #[case(CarrierTimeSeriesRaw { node_id: "node3".into(), ..series_raw("demand", None, 1.0) })]
    fn test_read_carrier_time_series_invalid(
        simple_model: Model,
        #[case] raw: CarrierTimeSeriesRaw,
    ) {
        let mut system = simple_model.system().clone();
        system.unaggregated_time_steps_per_year = 2;
        let mut carriers = carriers();
        assert!(
            read_carrier_time_series_from_iter(
                std::iter::once(raw),
                &mut carriers,
                &simple_model.nodes,
                &system,
            )
            .is_err()
        );
    }
}
