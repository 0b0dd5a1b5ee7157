//! The typed names of all parameters known to the model.
use crate::index::Dimension;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumMessage, EnumString};

/// The kind of element an input attribute can be given for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum ElementKind {
    /// A carrier
    Carrier,
    /// Any technology
    Technology,
    /// Transport technologies only
    TransportTechnology,
    /// Storage technologies only
    StorageTechnology,
}

/// How an input attribute is indexed in time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Granularity {
    /// A single value per element
    Scalar,
    /// One value per location
    Location,
    /// One value per location and full-resolution time step (aggregated to operational steps)
    Operation,
    /// One value per location and yearly step
    Yearly,
}

/// The name of a parameter.
///
/// Names that can be given as input attributes are parsed from their snake case form (e.g.
/// `import_price`). The others are derived while constructing the model.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    EnumString,
    EnumIter,
    EnumMessage,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[allow(missing_docs)]
pub enum ParameterName {
    #[strum(message = "Demand of carrier at node")]
    Demand,
    #[strum(message = "Maximum import flow of carrier at node")]
    AvailabilityImport,
    #[strum(message = "Maximum export flow of carrier at node")]
    AvailabilityExport,
    #[strum(message = "Maximum yearly import of carrier at node")]
    AvailabilityImportYearly,
    #[strum(message = "Maximum yearly export of carrier at node")]
    AvailabilityExportYearly,
    #[strum(message = "Import price of carrier at node")]
    ImportPrice,
    #[strum(message = "Export price of carrier at node")]
    ExportPrice,
    #[strum(message = "Carbon intensity of importing carrier at node")]
    CarbonIntensityCarrier,
    #[strum(message = "Price of shedding demand of carrier at node")]
    ShedDemandPrice,
    #[strum(message = "Minimum capacity built if the technology is installed")]
    MinBuiltCapacity,
    #[strum(message = "Maximum capacity built if the technology is installed")]
    MaxBuiltCapacity,
    #[strum(message = "Maximum total capacity of technology at location")]
    CapacityLimit,
    #[strum(message = "Minimum load of technology relative to capacity")]
    MinLoad,
    #[strum(message = "Maximum load of technology relative to capacity")]
    MaxLoad,
    #[strum(message = "Lifetime of technology in years")]
    Lifetime,
    #[strum(message = "Variable operating cost per unit of reference flow")]
    OpexSpecific,
    #[strum(message = "Fixed operating cost per unit of capacity and year")]
    FixedOpexSpecific,
    #[strum(message = "Capital cost per unit of built capacity")]
    CapexSpecific,
    #[strum(message = "Carbon intensity per unit of reference flow")]
    CarbonIntensityTechnology,
    #[strum(message = "Whether the technology may be installed at location (0 or 1)")]
    AvailabilityTechnology,
    #[strum(message = "Interest rate used to annualise capex")]
    InterestRate,
    #[strum(message = "Loss of transported carrier per unit of distance")]
    LossFlow,
    #[strum(message = "Capital cost per unit of distance if the edge is used")]
    CapexPerDistance,
    #[strum(message = "Length of an edge")]
    Distance,
    #[strum(message = "Efficiency of charging storage")]
    EfficiencyCharge,
    #[strum(message = "Efficiency of discharging storage")]
    EfficiencyDischarge,
    #[strum(message = "Fraction of stored energy lost per hour")]
    SelfDischarge,
    #[strum(message = "Ratio of energy capacity to power capacity of storage")]
    EnergyToPowerRatio,
    #[strum(message = "Output per unit of input between two carriers of a conversion technology")]
    ConversionEfficiency,
    #[strum(message = "Share of capex charged in each year")]
    FractionalAnnuity,
    #[strum(message = "Existing capacity still available in year")]
    ExistingCapacity,
    #[strum(message = "Capex of existing capacity still available in year")]
    ExistingCapex,
    #[strum(message = "Duration of operational time step in hours")]
    TimeStepsOperationDuration,
    #[strum(message = "Slope of capex segment")]
    CapexSlope,
    #[strum(message = "Intercept of capex segment")]
    CapexIntercept,
    #[strum(message = "Lower bound of built capacity in capex segment")]
    CapexLowerBound,
    #[strum(message = "Upper bound of built capacity in capex segment")]
    CapexUpperBound,
    #[strum(message = "Slope of conversion segment")]
    ConversionSlope,
    #[strum(message = "Intercept of conversion segment")]
    ConversionIntercept,
    #[strum(message = "Lower bound of input flow in conversion segment")]
    ConversionLowerBound,
    #[strum(message = "Upper bound of input flow in conversion segment")]
    ConversionUpperBound,
    #[strum(message = "Maximum total carbon emissions in year")]
    CarbonEmissionsLimit,
    #[strum(message = "Maximum cumulative carbon emissions")]
    CarbonEmissionsBudget,
    #[strum(message = "Carbon emissions of previous horizon steps")]
    PreviousCarbonEmissions,
}

impl ParameterName {
    /// A human-readable description of the parameter
    pub fn description(self) -> &'static str {
        self.get_message().unwrap_or_default()
    }

    /// The kind of element this parameter can be provided as an input attribute for.
    ///
    /// Returns `None` for parameters which are derived while building the model.
    pub fn input_element(self) -> Option<ElementKind> {
        match self {
            Self::Demand
            | Self::AvailabilityImport
            | Self::AvailabilityExport
            | Self::AvailabilityImportYearly
            | Self::AvailabilityExportYearly
            | Self::ImportPrice
            | Self::ExportPrice
            | Self::CarbonIntensityCarrier
            | Self::ShedDemandPrice => Some(ElementKind::Carrier),
            Self::MinBuiltCapacity
            | Self::MaxBuiltCapacity
            | Self::CapacityLimit
            | Self::MinLoad
            | Self::MaxLoad
            | Self::Lifetime
            | Self::OpexSpecific
            | Self::FixedOpexSpecific
            | Self::CapexSpecific
            | Self::CarbonIntensityTechnology
            | Self::AvailabilityTechnology
            | Self::InterestRate => Some(ElementKind::Technology),
            Self::LossFlow | Self::CapexPerDistance | Self::Distance => {
                Some(ElementKind::TransportTechnology)
            }
            Self::EfficiencyCharge
            | Self::EfficiencyDischarge
            | Self::SelfDischarge
            | Self::EnergyToPowerRatio => Some(ElementKind::StorageTechnology),
            _ => None,
        }
    }

    /// How an input attribute is indexed
    pub fn granularity(self) -> Granularity {
        match self {
            Self::Demand
            | Self::AvailabilityImport
            | Self::AvailabilityExport
            | Self::ImportPrice
            | Self::ExportPrice
            | Self::MinLoad
            | Self::MaxLoad
            | Self::OpexSpecific => Granularity::Operation,
            Self::AvailabilityImportYearly
            | Self::AvailabilityExportYearly
            | Self::AvailabilityTechnology
            | Self::CarbonEmissionsLimit => Granularity::Yearly,
            Self::CarbonIntensityCarrier
            | Self::ShedDemandPrice
            | Self::CapacityLimit
            | Self::FixedOpexSpecific
            | Self::CapexSpecific
            | Self::CarbonIntensityTechnology
            | Self::Distance => Granularity::Location,
            _ => Granularity::Scalar,
        }
    }

    /// The value used when an attribute is not provided, or `None` if it is required
    pub fn default_value(self) -> Option<f64> {
        match self {
            Self::Lifetime | Self::CapexSpecific => None,
            Self::MaxBuiltCapacity
            | Self::CapacityLimit
            | Self::AvailabilityImportYearly
            | Self::AvailabilityExportYearly
            | Self::ShedDemandPrice
            | Self::Distance
            | Self::CarbonEmissionsLimit
            | Self::CarbonEmissionsBudget => Some(f64::INFINITY),
            Self::MaxLoad
            | Self::AvailabilityTechnology
            | Self::EfficiencyCharge
            | Self::EfficiencyDischarge
            | Self::EnergyToPowerRatio => Some(1.0),
            _ => Some(0.0),
        }
    }

    /// The index sets of the table for this parameter
    pub fn dimensions(self) -> &'static [Dimension] {
        use Dimension as D;

        match self {
            Self::Demand
            | Self::AvailabilityImport
            | Self::AvailabilityExport
            | Self::ImportPrice
            | Self::ExportPrice => &[D::SetCarriers, D::SetNodes, D::SetTimeStepsOperation],
            Self::AvailabilityImportYearly | Self::AvailabilityExportYearly => {
                &[D::SetCarriers, D::SetNodes, D::SetTimeStepsYearly]
            }
            Self::CarbonIntensityCarrier | Self::ShedDemandPrice => &[D::SetCarriers, D::SetNodes],
            Self::MinBuiltCapacity
            | Self::MaxBuiltCapacity
            | Self::Lifetime
            | Self::InterestRate
            | Self::FractionalAnnuity
            | Self::LossFlow
            | Self::CapexPerDistance
            | Self::EfficiencyCharge
            | Self::EfficiencyDischarge
            | Self::SelfDischarge
            | Self::EnergyToPowerRatio => &[D::SetTechnologies],
            Self::CapacityLimit
            | Self::FixedOpexSpecific
            | Self::CapexSpecific
            | Self::CarbonIntensityTechnology => &[D::SetTechnologies, D::SetLocation],
            Self::Distance => &[D::SetTechnologies, D::SetEdges],
            Self::MinLoad | Self::MaxLoad | Self::OpexSpecific => {
                &[D::SetTechnologies, D::SetLocation, D::SetTimeStepsOperation]
            }
            Self::AvailabilityTechnology | Self::ExistingCapacity | Self::ExistingCapex => {
                &[D::SetTechnologies, D::SetLocation, D::SetTimeStepsYearly]
            }
            Self::ConversionEfficiency => {
                &[D::SetTechnologies, D::SetInputCarriers, D::SetOutputCarriers]
            }
            Self::TimeStepsOperationDuration => &[D::SetTimeStepsOperation],
            Self::CapexSlope
            | Self::CapexIntercept
            | Self::CapexLowerBound
            | Self::CapexUpperBound
            | Self::ConversionSlope
            | Self::ConversionIntercept
            | Self::ConversionLowerBound
            | Self::ConversionUpperBound => &[D::SetTechnologies, D::SetSegments],
            Self::CarbonEmissionsLimit => &[D::SetTimeStepsYearly],
            Self::CarbonEmissionsBudget | Self::PreviousCarbonEmissions => &[],
        }
    }
}
