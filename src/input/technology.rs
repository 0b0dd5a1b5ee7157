//! Code for reading technology-related information from CSV files.
use super::*;
use crate::carrier::{CarrierID, CarrierMap};
use crate::id::IDCollection;
use crate::model::ExistingCapacity;
use crate::network::{EdgeMap, Location, NodeSet};
use crate::pwa::PiecewiseAffine;
use crate::technology::{
    Approximation, Technology, TechnologyCategory, TechnologyID, TechnologyMap,
};
use indexmap::IndexMap;
use log::warn;
use serde::Deserialize;
use serde_string_enum::DeserializeLabeledStringEnum;

const TECHNOLOGIES_FILE_NAME: &str = "technologies.csv";
const TECHNOLOGY_ATTRIBUTES_FILE_NAME: &str = "technology_attributes.csv";
const TECHNOLOGY_TIME_SERIES_FILE_NAME: &str = "technology_time_series.csv";
const CONVERSION_EFFICIENCIES_FILE_NAME: &str = "conversion_efficiencies.csv";
const PWA_SUPPORT_POINTS_FILE_NAME: &str = "pwa_support_points.csv";
const EXISTING_CAPACITIES_FILE_NAME: &str = "existing_capacities.csv";

#[derive(Debug, Deserialize, PartialEq)]
struct TechnologyRaw {
    id: TechnologyID,
    category: TechnologyCategory,
    reference_carrier: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    capex_approximation: Option<Approximation>,
    #[serde(default)]
    conversion_approximation: Option<Approximation>,
}

#[derive(Debug, Deserialize, PartialEq)]
struct TechnologyAttributeRaw {
    technology_id: String,
    attribute: String,
    value: f64,
}

#[derive(Debug, Deserialize, PartialEq)]
struct TechnologyTimeSeriesRaw {
    technology_id: String,
    attribute: String,
    location: String,
    #[serde(deserialize_with = "deserialise_optional_step", default)]
    time_step: Option<u32>,
    value: f64,
}

#[derive(Debug, Deserialize, PartialEq)]
struct ConversionEfficiencyRaw {
    technology_id: String,
    input_carrier: String,
    output_carrier: String,
    efficiency: f64,
}

/// The function a set of support points describes
#[derive(DeserializeLabeledStringEnum, Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum PwaFunction {
    #[string = "capex"]
    Capex,
    #[string = "conversion"]
    Conversion,
}

#[derive(Debug, Deserialize, PartialEq)]
struct SupportPointRaw {
    technology_id: String,
    function: PwaFunction,
    x: f64,
    y: f64,
}

#[derive(Debug, Deserialize, PartialEq)]
struct ExistingCapacityRaw {
    technology_id: String,
    location: String,
    capacity: f64,
    remaining_lifetime: f64,
}

/// The kind of element the attributes of a technology category are checked against
fn element_kind(category: TechnologyCategory) -> ElementKind {
    match category {
        TechnologyCategory::Conversion => ElementKind::Technology,
        TechnologyCategory::Transport => ElementKind::TransportTechnology,
        TechnologyCategory::Storage => ElementKind::StorageTechnology,
    }
}

/// Look up a location of a technology by ID: an edge for transport technologies, else a node
fn find_location(
    technology: &Technology,
    location: &str,
    nodes: &NodeSet,
    edges: &EdgeMap,
) -> Result<Location> {
    let location = match technology.category {
        TechnologyCategory::Transport => Location::Edge(edges.get_id_by_str(location)?),
        _ => Location::Node(nodes.get_id_by_str(location)?),
    };

    Ok(location)
}

/// Read technologies and their attributes.
///
/// Only the technologies selected in the `[system]` section are returned.
///
/// # Arguments
///
/// * `model_dir` - Folder containing model configuration files
/// * `carriers` - The carriers of the model
/// * `nodes` - The nodes of the network
/// * `edges` - The edges of the network
/// * `system` - The `[system]` parameters
pub fn read_technologies(
    model_dir: &Path,
    carriers: &CarrierMap,
    nodes: &NodeSet,
    edges: &EdgeMap,
    system: &SystemParameters,
) -> Result<TechnologyMap> {
    let file_path = model_dir.join(TECHNOLOGIES_FILE_NAME);
    let mut technologies = read_technologies_from_iter(read_csv(&file_path)?, carriers)
        .with_context(|| input_err_msg(&file_path))?;

    let file_path = model_dir.join(TECHNOLOGY_ATTRIBUTES_FILE_NAME);
    read_technology_attributes_from_iter(read_csv_optional(&file_path)?, &mut technologies)
        .with_context(|| input_err_msg(&file_path))?;

    let file_path = model_dir.join(TECHNOLOGY_TIME_SERIES_FILE_NAME);
    read_technology_time_series_from_iter(
        read_csv_optional(&file_path)?,
        &mut technologies,
        (nodes, edges),
        system,
    )
    .with_context(|| input_err_msg(&file_path))?;

    let file_path = model_dir.join(CONVERSION_EFFICIENCIES_FILE_NAME);
    read_conversion_efficiencies_from_iter(
        read_csv_optional(&file_path)?,
        &mut technologies,
        carriers,
    )
    .with_context(|| input_err_msg(&file_path))?;

    let file_path = model_dir.join(PWA_SUPPORT_POINTS_FILE_NAME);
    read_support_points_from_iter(read_csv_optional(&file_path)?, &mut technologies)
        .with_context(|| input_err_msg(&file_path))?;

    select_technologies(technologies, system)
}

fn read_technologies_from_iter<I>(iter: I, carriers: &CarrierMap) -> Result<TechnologyMap>
where
    I: Iterator<Item = TechnologyRaw>,
{
    let mut technologies = TechnologyMap::new();
    for raw in iter {
        let reference_carrier = carriers.get_id_by_str(&raw.reference_carrier)?;
        let conversion_approximation = raw.conversion_approximation.unwrap_or_default();
        ensure!(
            raw.category == TechnologyCategory::Conversion
                || conversion_approximation == Approximation::Linear,
            "Only conversion technologies can have a piecewise-affine conversion (technology {})",
            raw.id
        );

        let technology = Technology {
            id: raw.id.clone(),
            category: raw.category,
            reference_carrier,
            description: raw.description,
            capex_approximation: raw.capex_approximation.unwrap_or_default(),
            conversion_approximation,
            attributes: AttributeData::default(),
            conversion_efficiencies: IndexMap::new(),
            capex_pwa: None,
            conversion_pwa: None,
        };
        ensure!(
            technologies.insert(raw.id.clone(), technology).is_none(),
            "Duplicate technology ID {}",
            raw.id
        );
    }

    Ok(technologies)
}

fn read_technology_attributes_from_iter<I>(iter: I, technologies: &mut TechnologyMap) -> Result<()>
where
    I: Iterator<Item = TechnologyAttributeRaw>,
{
    for raw in iter {
        let id = technologies.get_id_by_str(&raw.technology_id)?;
        let technology = &mut technologies[&id];
        add_scalar_attribute(
            &mut technology.attributes,
            &raw.technology_id,
            element_kind(technology.category),
            &raw.attribute,
            raw.value,
        )?;
    }

    Ok(())
}

fn read_technology_time_series_from_iter<I>(
    iter: I,
    technologies: &mut TechnologyMap,
    (nodes, edges): (&NodeSet, &EdgeMap),
    system: &SystemParameters,
) -> Result<()>
where
    I: Iterator<Item = TechnologyTimeSeriesRaw>,
{
    for raw in iter {
        let id = technologies.get_id_by_str(&raw.technology_id)?;
        let technology = &mut technologies[&id];
        find_location(technology, &raw.location, nodes, edges)?;
        add_series_attribute(
            &mut technology.attributes,
            &raw.technology_id,
            element_kind(technology.category),
            &raw.attribute,
            (&raw.location, raw.time_step),
            raw.value,
            system,
        )?;
    }

    Ok(())
}

fn read_conversion_efficiencies_from_iter<I>(
    iter: I,
    technologies: &mut TechnologyMap,
    carriers: &CarrierMap,
) -> Result<()>
where
    I: Iterator<Item = ConversionEfficiencyRaw>,
{
    for raw in iter {
        let id = technologies.get_id_by_str(&raw.technology_id)?;
        let technology = &mut technologies[&id];
        ensure!(
            technology.category == TechnologyCategory::Conversion,
            "Technology {id} is not a conversion technology, so cannot have conversion efficiencies"
        );

        let input: CarrierID = carriers.get_id_by_str(&raw.input_carrier)?;
        let output: CarrierID = carriers.get_id_by_str(&raw.output_carrier)?;
        ensure!(
            input != output,
            "Technology {id} cannot convert carrier {input} into itself"
        );
        ensure!(
            technology
                .conversion_efficiencies
                .insert((input.clone(), output.clone()), raw.efficiency)
                .is_none(),
            "Duplicate conversion efficiency from {input} to {output} for technology {id}"
        );
    }

    Ok(())
}

fn read_support_points_from_iter<I>(iter: I, technologies: &mut TechnologyMap) -> Result<()>
where
    I: Iterator<Item = SupportPointRaw>,
{
    let mut points: IndexMap<(TechnologyID, PwaFunction), Vec<(f64, f64)>> = IndexMap::new();
    for raw in iter {
        let id = technologies.get_id_by_str(&raw.technology_id)?;
        points
            .entry((id, raw.function))
            .or_default()
            .push((raw.x, raw.y));
    }

    for ((id, function), mut points) in points {
        let technology = &mut technologies[&id];
        let approximation = match function {
            PwaFunction::Capex => technology.capex_approximation,
            PwaFunction::Conversion => technology.conversion_approximation,
        };
        if approximation == Approximation::Linear {
            warn!("Ignoring support points for technology {id}, which uses a linear approximation");
            continue;
        }

        points.sort_by(|a, b| a.0.total_cmp(&b.0));
        let pwa = PiecewiseAffine::new(&id.0, points)?;
        match function {
            PwaFunction::Capex => technology.capex_pwa = Some(pwa),
            PwaFunction::Conversion => technology.conversion_pwa = Some(pwa),
        }
    }

    Ok(())
}

/// Keep only the technologies listed in the `[system]` section, for each category with a list
fn select_technologies(
    mut technologies: TechnologyMap,
    system: &SystemParameters,
) -> Result<TechnologyMap> {
    // Checked against all technologies, as unselected ones are skipped later
    for id in &system.set_bidirectional_transport_technologies {
        let Ok(id) = technologies.get_id(id) else {
            bail!(ModelError::configuration(
                id,
                "technology is listed as bidirectional but has no data"
            ));
        };
        ensure!(
            technologies[&id].category == TechnologyCategory::Transport,
            ModelError::configuration(&id, "only transport technologies can be bidirectional")
        );
    }

    for (category, selection) in [
        (
            TechnologyCategory::Conversion,
            &system.set_conversion_technologies,
        ),
        (
            TechnologyCategory::Transport,
            &system.set_transport_technologies,
        ),
        (
            TechnologyCategory::Storage,
            &system.set_storage_technologies,
        ),
    ] {
        let Some(selection) = selection else {
            continue;
        };

        for id in selection {
            let Ok(id) = technologies.get_id(id) else {
                bail!(ModelError::configuration(
                    id,
                    "technology is selected in [system] but has no data"
                ));
            };
            ensure!(
                technologies[&id].category == category,
                ModelError::configuration(
                    &id,
                    "technology is listed in the set of another category"
                )
            );
        }
        technologies.retain(|id, technology| {
            technology.category != category || selection.contains(id)
        });
    }

    Ok(technologies)
}

/// Read existing capacities.
///
/// # Arguments
///
/// * `model_dir` - Folder containing model configuration files
/// * `technologies` - The technologies of the model
/// * `nodes` - The nodes of the network
/// * `edges` - The edges of the network
pub fn read_existing_capacities(
    model_dir: &Path,
    technologies: &TechnologyMap,
    nodes: &NodeSet,
    edges: &EdgeMap,
) -> Result<Vec<ExistingCapacity>> {
    let file_path = model_dir.join(EXISTING_CAPACITIES_FILE_NAME);
    read_existing_capacities_from_iter(
        read_csv_optional(&file_path)?,
        technologies,
        nodes,
        edges,
    )
    .with_context(|| input_err_msg(&file_path))
}

fn read_existing_capacities_from_iter<I>(
    iter: I,
    technologies: &TechnologyMap,
    nodes: &NodeSet,
    edges: &EdgeMap,
) -> Result<Vec<ExistingCapacity>>
where
    I: Iterator<Item = ExistingCapacityRaw>,
{
    let mut existing = Vec::new();
    for raw in iter {
        let Ok(id) = technologies.get_id_by_str(&raw.technology_id) else {
            warn!(
                "Ignoring existing capacity of technology {}, which is not part of the model",
                raw.technology_id
            );
            continue;
        };
        let technology = &technologies[&id];
        let location = find_location(technology, &raw.location, nodes, edges)?;
        ensure!(
            raw.capacity.is_finite() && raw.capacity >= 0.0,
            "Existing capacity of technology {id} at {location} must be a finite number not less \
            than zero"
        );
        ensure!(
            raw.remaining_lifetime >= 0.0,
            "Remaining lifetime of technology {id} at {location} cannot be negative"
        );

        existing.push(ExistingCapacity {
            technology: id,
            location,
            capacity: raw.capacity,
            remaining_lifetime: raw.remaining_lifetime,
        });
    }

    Ok(existing)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{assert_error, simple_model};
    use crate::model::Model;
    use crate::parameter::ParameterName;
    use float_cmp::assert_approx_eq;
    use rstest::rstest;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    fn technology_raw(id: &str, category: TechnologyCategory) -> TechnologyRaw {
        TechnologyRaw {
            id: id.into(),
            category,
            reference_carrier: "A".into(),
            description: String::new(),
            capex_approximation: None,
            conversion_approximation: None,
        }
    }

    fn technologies(model: &Model) -> TechnologyMap {
        read_technologies_from_iter(
            [
                technology_raw("boiler", TechnologyCategory::Conversion),
                technology_raw("pipe", TechnologyCategory::Transport),
                technology_raw("tank", TechnologyCategory::Storage),
            ]
            .into_iter(),
            &model.carriers,
        )
        .unwrap()
    }

    fn write_file(dir: &Path, file_name: &str, contents: &str) {
        let mut file = File::create(dir.join(file_name)).unwrap();
        writeln!(file, "{contents}").unwrap();
    }

    #[rstest]
    fn test_read_technologies(simple_model: Model) {
        let dir = tempdir().unwrap();
        write_file(
            dir.path(),
            TECHNOLOGIES_FILE_NAME,
            "id,category,reference_carrier,description,capex_approximation,conversion_approximation
boiler,conversion,B,Makes B,,pwa
pipe,transport,A,Moves A,linear,",
        );
        write_file(
            dir.path(),
            TECHNOLOGY_ATTRIBUTES_FILE_NAME,
            "technology_id,attribute,value\nboiler,lifetime,20\npipe,loss_flow,0.01",
        );
        write_file(
            dir.path(),
            TECHNOLOGY_TIME_SERIES_FILE_NAME,
            "technology_id,attribute,location,time_step,value\npipe,distance,node1-node2,,5",
        );
        write_file(
            dir.path(),
            CONVERSION_EFFICIENCIES_FILE_NAME,
            "technology_id,input_carrier,output_carrier,efficiency\nboiler,A,B,0.9",
        );
        write_file(
            dir.path(),
            PWA_SUPPORT_POINTS_FILE_NAME,
            "technology_id,function,x,y\nboiler,conversion,10,8\nboiler,conversion,0,0",
        );

        let technologies = read_technologies(
            dir.path(),
            &simple_model.carriers,
            &simple_model.nodes,
            &simple_model.edges,
            simple_model.system(),
        )
        .unwrap();
        assert_eq!(technologies.len(), 2);

        let boiler = &technologies["boiler"];
        assert_eq!(boiler.category, TechnologyCategory::Conversion);
        assert_eq!(boiler.capex_approximation, Approximation::Linear);
        assert_eq!(
            boiler.conversion_approximation,
            Approximation::PiecewiseAffine
        );
        assert_approx_eq!(
            f64,
            boiler.scalar_attribute(ParameterName::Lifetime).unwrap(),
            20.0
        );
        assert_approx_eq!(
            f64,
            boiler.conversion_efficiencies[&("A".into(), "B".into())],
            0.9
        );
        // Points are sorted by x
        assert_eq!(
            boiler.conversion_pwa.as_ref().unwrap().points(),
            &[(0.0, 0.0), (10.0, 8.0)]
        );

        let pipe = &technologies["pipe"];
        assert_approx_eq!(
            f64,
            pipe.distance(&simple_model.edges["node1-node2"]),
            5.0
        );
        assert!(pipe.distance(&simple_model.edges["node2-node1"]).is_infinite());
    }

    #[rstest]
    fn test_read_technologies_unknown_carrier(simple_model: Model) {
        let raw = TechnologyRaw {
            reference_carrier: "C".into(),
            ..technology_raw("boiler", TechnologyCategory::Conversion)
        };
        assert!(read_technologies_from_iter(std::iter::once(raw), &simple_model.carriers).is_err());
    }

    #[rstest]
    fn test_pwa_conversion_only_for_conversion(simple_model: Model) {
        let raw = TechnologyRaw {
            conversion_approximation: Some(Approximation::PiecewiseAffine),
            ..technology_raw("tank", TechnologyCategory::Storage)
        };
        assert!(read_technologies_from_iter(std::iter::once(raw), &simple_model.carriers).is_err());
    }

    #[rstest]
    #[case("boiler", "loss_flow")]
    #[case("tank", "loss_flow")]
    #[case("pipe", "efficiency_charge")]
    #[case("heater", "lifetime")]
    fn test_read_technology_attributes_invalid(
        simple_model: Model,
        #[case] technology_id: &str,
        #[case] attribute: &str,
    ) {
        let mut technologies = technologies(&simple_model);
        let raw = TechnologyAttributeRaw {
            technology_id: technology_id.into(),
            attribute: attribute.into(),
            value: 1.0,
        };
        assert!(
            read_technology_attributes_from_iter(std::iter::once(raw), &mut technologies).is_err()
        );
    }

    #[rstest]
    #[case("boiler", "node1-node2")]
    #[case("pipe", "node1")]
    fn test_time_series_wrong_location(
        simple_model: Model,
        #[case] technology_id: &str,
        #[case] location: &str,
    ) {
        let mut technologies = technologies(&simple_model);
        let raw = TechnologyTimeSeriesRaw {
            technology_id: technology_id.into(),
            attribute: "capacity_limit".into(),
            location: location.into(),
            time_step: None,
            value: 1.0,
        };
        assert!(
            read_technology_time_series_from_iter(
                std::iter::once(raw),
                &mut technologies,
                (&simple_model.nodes, &simple_model.edges),
                simple_model.system(),
            )
            .is_err()
        );
    }

    #[rstest]
    #[case("pipe", "A", "B")]
    #[case("boiler", "A", "A")]
    #[case("boiler", "A", "C")]
    fn test_read_conversion_efficiencies_invalid(
        simple_model: Model,
        #[case] technology_id: &str,
        #[case] input: &str,
        #[case] output: &str,
    ) {
        let mut technologies = technologies(&simple_model);
        let raw = ConversionEfficiencyRaw {
            technology_id: technology_id.into(),
            input_carrier: input.into(),
            output_carrier: output.into(),
            efficiency: 0.5,
        };
        assert!(
            read_conversion_efficiencies_from_iter(
                std::iter::once(raw),
                &mut technologies,
                &simple_model.carriers,
            )
            .is_err()
        );
    }

    #[rstest]
    fn test_linear_support_points_ignored(simple_model: Model) {
        let mut technologies = technologies(&simple_model);
        let points = [(0.0, 0.0), (1.0, 1.0)].map(|(x, y)| SupportPointRaw {
            technology_id: "boiler".into(),
            function: PwaFunction::Capex,
            x,
            y,
        });
        read_support_points_from_iter(points.into_iter(), &mut technologies).unwrap();
        assert!(technologies["boiler"].capex_pwa.is_none());
    }

    #[rstest]
    fn test_select_technologies(simple_model: Model) {
        let mut system = simple_model.system().clone();
        system.set_conversion_technologies = Some(Vec::new());
        system.set_storage_technologies = Some(vec!["tank".into()]);
        let selected = select_technologies(technologies(&simple_model), &system).unwrap();
        assert_eq!(
            selected.keys().map(|id| id.0.as_ref()).collect::<Vec<_>>(),
            ["pipe", "tank"]
        );

        system.set_storage_technologies = Some(vec!["pipe".into()]);
        assert!(select_technologies(technologies(&simple_model), &system).is_err());
        system.set_storage_technologies = Some(vec!["nothing".into()]);
        assert!(select_technologies(technologies(&simple_model), &system).is_err());
    }

    #[rstest]
    fn test_select_bidirectional(simple_model: Model) {
        let mut system = simple_model.system().clone();
        system.set_bidirectional_transport_technologies = vec!["pipe".into()];
        assert!(select_technologies(technologies(&simple_model), &system).is_ok());

        system.set_bidirectional_transport_technologies = vec!["pip".into()];
        assert_error!(
            select_technologies(technologies(&simple_model), &system),
            "Configuration error for pip: technology is listed as bidirectional but has no data"
        );

        system.set_bidirectional_transport_technologies = vec!["tank".into()];
        assert_error!(
            select_technologies(technologies(&simple_model), &system),
            "Configuration error for tank: only transport technologies can be bidirectional"
        );
    }

    #[rstest]
    fn test_read_existing_capacities(simple_model: Model) {
        let technologies = technologies(&simple_model);
        let raw = |technology_id: &str, location: &str, capacity| ExistingCapacityRaw {
            technology_id: technology_id.into(),
            location: location.into(),
            capacity,
            remaining_lifetime: 5.0,
        };
        let read = |rows: Vec<ExistingCapacityRaw>| {
            read_existing_capacities_from_iter(
                rows.into_iter(),
                &technologies,
                &simple_model.nodes,
                &simple_model.edges,
            )
        };

        let existing = read(vec![
            raw("boiler", "node1", 2.0),
            raw("pipe", "node2-node1", 1.0),
            raw("heater", "node1", 1.0),
        ])
        .unwrap();
        assert_eq!(existing.len(), 2);
        assert_eq!(existing[1].location, Location::Edge("node2-node1".into()));

        assert!(read(vec![raw("boiler", "node1-node2", 1.0)]).is_err());
        assert!(read(vec![raw("boiler", "node1", -1.0)]).is_err());
    }
}
