//! Technologies and the constraints shared by all technology categories.
//!
//! Every technology has a capacity at each of its locations which is built up over the yearly
//! time steps and bounds how much of its reference carrier it can produce, transport or store.
//! The category-specific flows and constraints live in the submodules.
use crate::carrier::CarrierID;
use crate::error::ModelError;
use crate::id::define_id_type;
use crate::index::{IndexTuple, impl_index_value_from_id, index};
use crate::network::{Edge, Location};
use crate::parameter::{AttributeData, ParameterName};
use crate::pwa::PiecewiseAffine;
use crate::simulation::optimisation::constraints::ConstraintName;
use crate::simulation::optimisation::{
    Contribution, ModelContext, ProblemBuilder, Variable, VariableName,
};
use crate::time_step::{OperationStep, YearlyStep};
use anyhow::{Result, bail, ensure};
use indexmap::IndexMap;
use serde_string_enum::DeserializeLabeledStringEnum;

pub mod conversion;
pub mod storage;
pub mod transport;

define_id_type! {TechnologyID}
impl_index_value_from_id!(TechnologyID);

/// Technologies, indexed by ID
pub type TechnologyMap = IndexMap<TechnologyID, Technology>;

/// The category of a technology
#[derive(DeserializeLabeledStringEnum, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TechnologyCategory {
    /// Converts input carriers into output carriers at a node
    #[string = "conversion"]
    Conversion,
    /// Moves its reference carrier along an edge
    #[string = "transport"]
    Transport,
    /// Stores its reference carrier at a node
    #[string = "storage"]
    Storage,
}

/// How a nonlinear relation is approximated
#[derive(DeserializeLabeledStringEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Approximation {
    /// A single linear relation
    #[default]
    #[string = "linear"]
    Linear,
    /// A piecewise-affine function over support points
    #[string = "pwa"]
    PiecewiseAffine,
}

/// A technology which can be built at the locations of its category
#[derive(Debug, Clone, PartialEq)]
pub struct Technology {
    /// Unique identifier for the technology (e.g. "heat_pump")
    pub id: TechnologyID,
    /// The category of the technology
    pub category: TechnologyCategory,
    /// The carrier which capacity and load are measured in
    pub reference_carrier: CarrierID,
    /// Text description of the technology
    pub description: String,
    /// How built capacity is related to capex
    pub capex_approximation: Approximation,
    /// How input is related to output (conversion technologies only)
    pub conversion_approximation: Approximation,
    /// Numeric attributes
    pub attributes: AttributeData,
    /// Output per unit of input, keyed by (input, output) carrier
    pub conversion_efficiencies: IndexMap<(CarrierID, CarrierID), f64>,
    /// Support points of capex against built capacity
    pub capex_pwa: Option<PiecewiseAffine>,
    /// Support points of output against input (conversion technologies only)
    pub conversion_pwa: Option<PiecewiseAffine>,
}

impl Technology {
    /// Get the value of an attribute at a location and (optionally) time step.
    ///
    /// Falls back to the default value. It is an error if the attribute is required and missing.
    pub fn attribute(&self, name: ParameterName, location: &str, step: Option<u32>) -> Result<f64> {
        match self
            .attributes
            .get(name, location, step)
            .or_else(|| name.default_value())
        {
            Some(value) => Ok(value),
            None => bail!(ModelError::missing_attribute(&self.id, name)),
        }
    }

    /// Get the value of an attribute which does not depend on location or time
    pub fn scalar_attribute(&self, name: ParameterName) -> Result<f64> {
        match self.attributes.scalar(name).or_else(|| name.default_value()) {
            Some(value) => Ok(value),
            None => bail!(ModelError::missing_attribute(&self.id, name)),
        }
    }

    /// The length of an edge as seen by this technology.
    ///
    /// A `distance` attribute for the edge takes precedence over the edge's own distance.
    pub fn distance(&self, edge: &Edge) -> f64 {
        self.attributes
            .get(ParameterName::Distance, &edge.id.0, None)
            .unwrap_or(edge.distance)
    }

    /// The capex per unit of built capacity at a location.
    ///
    /// For transport technologies without the distance-dependent fixed capex part, the capex
    /// defaults to `capex_per_distance` times the distance of the edge. Edges which cannot be
    /// used have zero capex.
    pub fn capex_specific(
        &self,
        location: &Location,
        edge: Option<&Edge>,
        double_capex_transport: bool,
    ) -> Result<f64> {
        let given = self
            .attributes
            .get(ParameterName::CapexSpecific, location.as_str(), None);
        if let Some(edge) = edge
            && !double_capex_transport
            && given.is_none()
            && self.attributes.contains(ParameterName::CapexPerDistance)
        {
            let distance = self.distance(edge);
            if !distance.is_finite() {
                return Ok(0.0);
            }
            let per_distance = self.scalar_attribute(ParameterName::CapexPerDistance)?;
            return Ok(per_distance * distance);
        }

        match given {
            Some(value) => Ok(value),
            None => bail!(ModelError::missing_attribute(
                &self.id,
                ParameterName::CapexSpecific
            )),
        }
    }

    /// The capex of the given built capacity at a location
    pub fn capex_of(
        &self,
        capacity: f64,
        location: &Location,
        edge: Option<&Edge>,
        double_capex_transport: bool,
    ) -> Result<f64> {
        if self.capex_approximation == Approximation::PiecewiseAffine {
            let Some(pwa) = &self.capex_pwa else {
                bail!(ModelError::configuration(
                    &self.id,
                    "piecewise-affine capex requires capex support points"
                ));
            };
            let Some(capex) = pwa.evaluate(capacity) else {
                bail!(ModelError::data_consistency(
                    &self.id,
                    format!("capacity {capacity} is outside the capex support points")
                ));
            };
            return Ok(capex);
        }

        Ok(self.capex_specific(location, edge, double_capex_transport)? * capacity)
    }
}

/// The constraints on capacity, load and costs shared by all technologies
pub struct TechnologyBase;

impl Contribution for TechnologyBase {
    fn name(&self) -> &'static str {
        "technology base"
    }

    fn contributes_sets(&self, ctx: &mut ModelContext) -> Result<()> {
        for technology in ctx.model().technologies.values() {
            if technology.capex_approximation != Approximation::PiecewiseAffine {
                continue;
            }
            let Some(pwa) = &technology.capex_pwa else {
                bail!(ModelError::configuration(
                    &technology.id,
                    "piecewise-affine capex requires capex support points"
                ));
            };
            ctx.sets
                .capex_segments
                .insert(technology.id.clone(), pwa.segments().len());
        }

        Ok(())
    }

    fn contributes_parameters(&self, ctx: &mut ModelContext) -> Result<()> {
        let model = ctx.model();
        let baseline = ctx.input.baseline;
        let system = model.system();
        let time_steps = ctx.time_steps().clone();
        let first_year = time_steps.first_year();

        for technology in model.technologies.values() {
            let id = &technology.id;
            for name in [
                ParameterName::MinBuiltCapacity,
                ParameterName::MaxBuiltCapacity,
                ParameterName::Lifetime,
                ParameterName::InterestRate,
            ] {
                let value = technology.scalar_attribute(name)?;
                ctx.add_parameter(name, index![id], value)?;
            }

            let lifetime = technology.scalar_attribute(ParameterName::Lifetime)?;
            ensure!(
                lifetime > 0.0,
                ModelError::data_consistency(id, "lifetime must be greater than zero")
            );
            let annuity = crate::finance::fractional_annuity(
                lifetime,
                technology.scalar_attribute(ParameterName::InterestRate)?,
                system.fraction_of_year(),
            );
            ctx.add_parameter(ParameterName::FractionalAnnuity, index![id], annuity)?;

            for location in ctx.sets.locations_of(id).to_vec() {
                let loc = location.as_str();
                let edge = edge_of(ctx, &location);
                for name in [
                    ParameterName::CapacityLimit,
                    ParameterName::FixedOpexSpecific,
                    ParameterName::CarbonIntensityTechnology,
                ] {
                    let value = technology.attribute(name, loc, None)?;
                    ctx.add_parameter(name, index![id, &location], value)?;
                }
                if technology.capex_approximation == Approximation::Linear {
                    let value = technology.capex_specific(
                        &location,
                        edge.as_ref(),
                        system.double_capex_transport,
                    )?;
                    ctx.add_parameter(ParameterName::CapexSpecific, index![id, &location], value)?;
                }

                for name in [
                    ParameterName::MinLoad,
                    ParameterName::MaxLoad,
                    ParameterName::OpexSpecific,
                ] {
                    for step in time_steps.iter_operation_steps() {
                        let value = time_steps.aggregate_mean(step, |full_step| {
                            technology.attribute(name, loc, Some(full_step))
                        })?;
                        ctx.add_parameter(name, index![id, &location, step], value)?;
                    }
                }

                for year in time_steps.years().iter().copied() {
                    let idx = index![id, &location, year];
                    let availability = technology.attribute(
                        ParameterName::AvailabilityTechnology,
                        loc,
                        Some(year),
                    )?;
                    ctx.add_parameter(
                        ParameterName::AvailabilityTechnology,
                        idx.clone(),
                        availability,
                    )?;

                    let interval = system.interval_between_years;
                    let existing =
                        baseline.existing_capacity(id, &location, year, first_year, interval);
                    ctx.add_parameter(ParameterName::ExistingCapacity, idx.clone(), existing)?;
                    let existing_capex =
                        baseline.existing_capex(id, &location, year, first_year, interval);
                    ctx.add_parameter(ParameterName::ExistingCapex, idx, existing_capex)?;
                }
            }

            if let Some(pwa) = technology
                .capex_pwa
                .as_ref()
                .filter(|_| technology.capex_approximation == Approximation::PiecewiseAffine)
            {
                add_segment_parameters(
                    ctx,
                    id,
                    pwa,
                    [
                        ParameterName::CapexSlope,
                        ParameterName::CapexIntercept,
                        ParameterName::CapexLowerBound,
                        ParameterName::CapexUpperBound,
                    ],
                )?;
            }
        }

        Ok(())
    }

    fn contributes_variables(
        &self,
        ctx: &ModelContext,
        builder: &mut ProblemBuilder,
    ) -> Result<()> {
        for id in ctx.sets.technologies.keys() {
            let max_built = ctx.parameter(ParameterName::MaxBuiltCapacity, &index![id])?;
            let segments = ctx.sets.capex_segments.get(id).copied();

            for location in ctx.sets.locations_of(id) {
                let usable = is_usable(ctx, id, location)?;
                let install = usable && needs_install(ctx, id, location)?;

                for year in ctx.time_steps().years().iter().copied() {
                    let idx = index![id, location, year];
                    let availability = ctx.parameter(ParameterName::AvailabilityTechnology, &idx)?;
                    let max = if !usable || (!install && availability <= 0.0) {
                        0.0
                    } else if install {
                        f64::INFINITY
                    } else {
                        max_built
                    };

                    builder.add_variable(VariableName::BuiltCapacity, idx.clone(), 0.0, max, 0.0)?;
                    builder.add_variable(
                        VariableName::Capacity,
                        idx.clone(),
                        0.0,
                        f64::INFINITY,
                        0.0,
                    )?;
                    for name in [VariableName::Capex, VariableName::CapexYearly] {
                        builder.add_variable(
                            name,
                            idx.clone(),
                            f64::NEG_INFINITY,
                            f64::INFINITY,
                            0.0,
                        )?;
                    }
                    if install {
                        builder.add_binary(VariableName::InstallTechnology, idx.clone(), true)?;
                        for segment in 0..segments.unwrap_or(0) {
                            let seg_idx = index![id, location, year, segment as u32];
                            builder.add_binary(
                                VariableName::CapexSegmentSelect,
                                seg_idx.clone(),
                                true,
                            )?;
                            builder.add_variable(
                                VariableName::CapexSegmentAux,
                                seg_idx,
                                0.0,
                                f64::INFINITY,
                                0.0,
                            )?;
                        }
                    }
                }

                for step in ctx.time_steps().iter_operation_steps() {
                    let idx = index![id, location, step];
                    for name in [VariableName::CostOpex, VariableName::CarbonEmissionsTechnology] {
                        builder.add_variable(
                            name,
                            idx.clone(),
                            f64::NEG_INFINITY,
                            f64::INFINITY,
                            0.0,
                        )?;
                    }
                    let min_load = ctx.parameter(ParameterName::MinLoad, &idx)?;
                    if usable && min_load > 0.0 {
                        builder.add_binary(VariableName::TechOnVar, idx, true)?;
                    }
                }
            }
        }

        Ok(())
    }

    fn contributes_constraints(
        &self,
        ctx: &ModelContext,
        builder: &mut ProblemBuilder,
    ) -> Result<()> {
        for id in ctx.sets.technologies.keys() {
            for location in ctx.sets.locations_of(id) {
                for year in ctx.time_steps().years().iter().copied() {
                    add_install_constraints(ctx, builder, id, location, year)?;
                    add_capacity_constraints(ctx, builder, id, location, year)?;
                    add_capex_constraints(ctx, builder, id, location, year)?;
                }
                for step in ctx.time_steps().iter_operation_steps() {
                    add_operation_constraints(ctx, builder, id, location, step)?;
                }
            }
        }

        Ok(())
    }
}

/// Add the parameters of each segment of a piecewise-affine function.
///
/// `names` are the slope, intercept, lower bound and upper bound parameters, in that order.
fn add_segment_parameters(
    ctx: &mut ModelContext,
    id: &TechnologyID,
    pwa: &PiecewiseAffine,
    names: [ParameterName; 4],
) -> Result<()> {
    for (segment_index, segment) in pwa.segments().iter().enumerate() {
        let values = [segment.slope, segment.intercept, segment.lower, segment.upper];
        for (name, value) in names.into_iter().zip(values) {
            ctx.add_parameter(name, index![id, segment_index as u32], value)?;
        }
    }

    Ok(())
}

/// The edge a location refers to, if it is an edge
fn edge_of(ctx: &ModelContext, location: &Location) -> Option<Edge> {
    match location {
        Location::Edge(edge) => ctx.sets.edges.get(edge).cloned(),
        Location::Node(_) => None,
    }
}

/// Whether a technology can be built at a location at all.
///
/// Transport technologies cannot be built on edges of infinite length.
pub fn is_usable(ctx: &ModelContext, id: &TechnologyID, location: &Location) -> Result<bool> {
    match location {
        Location::Edge(edge) => {
            let distance = ctx.parameter(ParameterName::Distance, &index![id, edge])?;
            Ok(distance.is_finite())
        }
        Location::Node(_) => Ok(true),
    }
}

/// Whether the technology needs an install indicator at a location.
///
/// This is the case for piecewise-affine capex, for a minimum built capacity and for the
/// distance-dependent capex of transport technologies.
fn needs_install(ctx: &ModelContext, id: &TechnologyID, location: &Location) -> Result<bool> {
    if ctx.sets.capex_segments.contains_key(id) {
        return Ok(true);
    }
    if ctx.parameter(ParameterName::MinBuiltCapacity, &index![id])? > 0.0 {
        return Ok(true);
    }

    Ok(distance_capex(ctx, id, location)? > 0.0)
}

/// The capex charged when a transport technology is installed on an edge, regardless of capacity
fn distance_capex(ctx: &ModelContext, id: &TechnologyID, location: &Location) -> Result<f64> {
    let Location::Edge(edge) = location else {
        return Ok(0.0);
    };
    if !ctx.model().system().double_capex_transport {
        return Ok(0.0);
    }

    let distance = ctx.parameter(ParameterName::Distance, &index![id, edge])?;
    if !distance.is_finite() {
        return Ok(0.0);
    }
    let per_distance = ctx.parameter(ParameterName::CapexPerDistance, &index![id])?;

    Ok(distance * per_distance)
}

/// The upper bound of the capacity built in a single year when the technology is installed
fn install_big_m(ctx: &ModelContext, id: &TechnologyID, location: &Location) -> Result<f64> {
    let max_built = ctx.parameter(ParameterName::MaxBuiltCapacity, &index![id])?;
    let limit = ctx.parameter(ParameterName::CapacityLimit, &index![id, location])?;
    let mut big_m = max_built.min(limit);
    if let Some(pwa) = ctx.model().technologies.get(id).and_then(|t| t.capex_pwa.as_ref())
        && ctx.sets.capex_segments.contains_key(id)
    {
        big_m = big_m.min(pwa.upper());
    }

    ensure!(
        big_m.is_finite(),
        ModelError::configuration(
            id,
            format!(
                "an install indicator is needed at {location}, so max_built_capacity or \
                capacity_limit must be finite"
            )
        )
    );

    Ok(big_m)
}

/// The yearly steps of this horizon step whose built capacity is still available in `year`
pub fn alive_years(ctx: &ModelContext, lifetime: f64, year: YearlyStep) -> Vec<YearlyStep> {
    let interval = ctx.model().system().interval_between_years as f64;
    ctx.time_steps()
        .years()
        .iter()
        .copied()
        .filter(|built| *built <= year && ((year - built) as f64) * interval < lifetime)
        .collect()
}

/// The terms of the flow that capacity and load are measured in
pub fn reference_flow_terms(
    ctx: &ModelContext,
    builder: &ProblemBuilder,
    id: &TechnologyID,
    location: &Location,
    step: OperationStep,
) -> Result<Vec<(Variable, f64)>> {
    let category = ctx.sets.technologies[id];
    let terms = match category {
        TechnologyCategory::Conversion => {
            let carrier = &ctx.sets.reference_carrier[id];
            let name = if ctx.sets.output_carriers[id].contains(carrier) {
                VariableName::OutputFlow
            } else {
                VariableName::InputFlow
            };
            vec![(builder.variable(name, &index![id, carrier, location, step])?, 1.0)]
        }
        TechnologyCategory::Transport => vec![(
            builder.variable(VariableName::CarrierFlow, &index![id, location, step])?,
            1.0,
        )],
        TechnologyCategory::Storage => [
            VariableName::CarrierFlowCharge,
            VariableName::CarrierFlowDischarge,
        ]
        .into_iter()
        .map(|name| Ok((builder.variable(name, &index![id, location, step])?, 1.0)))
        .collect::<Result<_>>()?,
    };

    Ok(terms)
}

/// Link built capacity to the install indicator
fn add_install_constraints(
    ctx: &ModelContext,
    builder: &mut ProblemBuilder,
    id: &TechnologyID,
    location: &Location,
    year: YearlyStep,
) -> Result<()> {
    let idx = index![id, location, year];
    let Some(install) = builder.find_variable(VariableName::InstallTechnology, &idx) else {
        return Ok(());
    };
    let built = builder.variable(VariableName::BuiltCapacity, &idx)?;

    let min_built = ctx.parameter(ParameterName::MinBuiltCapacity, &index![id])?;
    if min_built > 0.0 {
        builder.add_constraint(
            ConstraintName::TechnologyMinCapacity,
            idx.clone(),
            0.0,
            f64::INFINITY,
            [(built, 1.0), (install, -min_built)],
        );
    }

    let big_m = install_big_m(ctx, id, location)?;
    builder.add_constraint(
        ConstraintName::TechnologyMaxCapacity,
        idx.clone(),
        f64::NEG_INFINITY,
        0.0,
        [(built, 1.0), (install, -big_m)],
    );

    let availability = ctx.parameter(ParameterName::AvailabilityTechnology, &idx)?;
    builder.add_constraint(
        ConstraintName::TechnologyAvailability,
        idx,
        f64::NEG_INFINITY,
        availability,
        [(install, 1.0)],
    );

    Ok(())
}

/// Add the capacity limit and the lifetime balance
fn add_capacity_constraints(
    ctx: &ModelContext,
    builder: &mut ProblemBuilder,
    id: &TechnologyID,
    location: &Location,
    year: YearlyStep,
) -> Result<()> {
    let idx = index![id, location, year];
    let capacity = builder.variable(VariableName::Capacity, &idx)?;
    let built = builder.variable(VariableName::BuiltCapacity, &idx)?;
    let existing = ctx.parameter(ParameterName::ExistingCapacity, &idx)?;
    let limit = ctx.parameter(ParameterName::CapacityLimit, &index![id, location])?;

    if existing > limit {
        builder.add_equality(
            ConstraintName::TechnologyCapacityLimit,
            idx.clone(),
            0.0,
            [(built, 1.0)],
        );
    } else if limit.is_finite() {
        builder.add_constraint(
            ConstraintName::TechnologyCapacityLimit,
            idx.clone(),
            f64::NEG_INFINITY,
            limit,
            [(capacity, 1.0)],
        );
    }

    let lifetime = ctx.parameter(ParameterName::Lifetime, &index![id])?;
    let mut terms = vec![(capacity, 1.0)];
    for built_year in alive_years(ctx, lifetime, year) {
        let built =
            builder.variable(VariableName::BuiltCapacity, &index![id, location, built_year])?;
        terms.push((built, -1.0));
    }
    builder.add_equality(ConstraintName::TechnologyLifetime, idx, existing, terms);

    Ok(())
}

/// Add the capex of built capacity and its annualised value
fn add_capex_constraints(
    ctx: &ModelContext,
    builder: &mut ProblemBuilder,
    id: &TechnologyID,
    location: &Location,
    year: YearlyStep,
) -> Result<()> {
    let idx = index![id, location, year];
    let capex = builder.variable(VariableName::Capex, &idx)?;
    let built = builder.variable(VariableName::BuiltCapacity, &idx)?;
    let install = builder.find_variable(VariableName::InstallTechnology, &idx);

    match (ctx.sets.capex_segments.get(id), install) {
        (Some(num_segments), Some(install)) => {
            add_capex_segment_constraints(
                ctx,
                builder,
                &idx,
                *num_segments,
                capex,
                built,
                install,
            )?;
        }
        (Some(_), None) => {
            // Technology cannot be built here
            builder.add_equality(ConstraintName::Capex, idx.clone(), 0.0, [(capex, 1.0)]);
        }
        (None, _) => {
            let capex_specific =
                ctx.parameter(ParameterName::CapexSpecific, &index![id, location])?;
            let mut terms = vec![(capex, 1.0), (built, -capex_specific)];
            if let Some(install) = install {
                terms.push((install, -distance_capex(ctx, id, location)?));
            }
            builder.add_equality(ConstraintName::Capex, idx.clone(), 0.0, terms);
        }
    }

    let annuity = ctx.parameter(ParameterName::FractionalAnnuity, &index![id])?;
    let lifetime = ctx.parameter(ParameterName::Lifetime, &index![id])?;
    let existing_capex = ctx.parameter(ParameterName::ExistingCapex, &idx)?;
    let capex_yearly = builder.variable(VariableName::CapexYearly, &idx)?;
    let mut terms = vec![(capex_yearly, 1.0)];
    for built_year in alive_years(ctx, lifetime, year) {
        let capex = builder.variable(VariableName::Capex, &index![id, location, built_year])?;
        terms.push((capex, -annuity));
    }
    builder.add_equality(
        ConstraintName::CapexYearly,
        idx,
        annuity * existing_capex,
        terms,
    );

    Ok(())
}

/// Select at most one capex segment when installed and tie built capacity and capex to it
fn add_capex_segment_constraints(
    ctx: &ModelContext,
    builder: &mut ProblemBuilder,
    idx: &IndexTuple,
    num_segments: usize,
    capex: Variable,
    built: Variable,
    install: Variable,
) -> Result<()> {
    let id = &idx.0[0];
    let mut selection = vec![(install, -1.0)];
    let mut built_terms = vec![(built, 1.0)];
    let mut capex_terms = vec![(capex, 1.0)];

    for segment in 0..num_segments as u32 {
        let mut seg_idx = idx.clone();
        seg_idx.0.push(segment.into());
        let select = builder.variable(VariableName::CapexSegmentSelect, &seg_idx)?;
        let aux = builder.variable(VariableName::CapexSegmentAux, &seg_idx)?;
        let param_idx = index![id, segment];
        let slope = ctx.parameter(ParameterName::CapexSlope, &param_idx)?;
        let intercept = ctx.parameter(ParameterName::CapexIntercept, &param_idx)?;
        let lower = ctx.parameter(ParameterName::CapexLowerBound, &param_idx)?;
        let upper = ctx.parameter(ParameterName::CapexUpperBound, &param_idx)?;

        builder.add_constraint(
            ConstraintName::CapexSegmentLower,
            seg_idx.clone(),
            0.0,
            f64::INFINITY,
            [(aux, 1.0), (select, -lower)],
        );
        builder.add_constraint(
            ConstraintName::CapexSegmentUpper,
            seg_idx,
            f64::NEG_INFINITY,
            0.0,
            [(aux, 1.0), (select, -upper)],
        );

        selection.push((select, 1.0));
        built_terms.push((aux, -1.0));
        capex_terms.extend([(aux, -slope), (select, -intercept)]);
    }

    builder.add_equality(ConstraintName::CapexSegmentSelection, idx.clone(), 0.0, selection);
    builder.add_equality(ConstraintName::CapexSegmentBuilt, idx.clone(), 0.0, built_terms);
    builder.add_equality(ConstraintName::Capex, idx.clone(), 0.0, capex_terms);

    Ok(())
}

/// The largest capacity a technology can have at a location in a year
fn capacity_upper_bound(
    ctx: &ModelContext,
    id: &TechnologyID,
    location: &Location,
    year: YearlyStep,
) -> Result<f64> {
    let existing = ctx.parameter(ParameterName::ExistingCapacity, &index![id, location, year])?;
    let limit = ctx.parameter(ParameterName::CapacityLimit, &index![id, location])?;
    if !is_usable(ctx, id, location)? {
        return Ok(existing);
    }

    let max_built = ctx.parameter(ParameterName::MaxBuiltCapacity, &index![id])?;
    let lifetime = ctx.parameter(ParameterName::Lifetime, &index![id])?;
    let num_builds = alive_years(ctx, lifetime, year).len() as f64;

    Ok(limit.min(existing + num_builds * max_built).max(existing))
}

/// Add the load limits, opex and emissions of an operational time step
fn add_operation_constraints(
    ctx: &ModelContext,
    builder: &mut ProblemBuilder,
    id: &TechnologyID,
    location: &Location,
    step: OperationStep,
) -> Result<()> {
    let idx = index![id, location, step];
    let year = ctx.time_steps().invest_step_of(step);
    let capacity = builder.variable(VariableName::Capacity, &index![id, location, year])?;
    let flow = reference_flow_terms(ctx, builder, id, location, step)?;

    let max_load = ctx.parameter(ParameterName::MaxLoad, &idx)?;
    builder.add_constraint(
        ConstraintName::MaxLoad,
        idx.clone(),
        f64::NEG_INFINITY,
        0.0,
        flow.iter().copied().chain([(capacity, -max_load)]),
    );

    if let Some(on) = builder.find_variable(VariableName::TechOnVar, &idx) {
        let min_load = ctx.parameter(ParameterName::MinLoad, &idx)?;
        let big_m = capacity_upper_bound(ctx, id, location, year)?;
        ensure!(
            big_m.is_finite(),
            ModelError::configuration(
                id,
                format!(
                    "min_load is set at {location}, so max_built_capacity or capacity_limit \
                    must be finite"
                )
            )
        );

        builder.add_constraint(
            ConstraintName::MinLoadOn,
            idx.clone(),
            f64::NEG_INFINITY,
            0.0,
            flow.iter().copied().chain([(on, -big_m)]),
        );
        builder.add_constraint(
            ConstraintName::MinLoad,
            idx.clone(),
            -min_load * big_m,
            f64::INFINITY,
            flow.iter()
                .copied()
                .chain([(capacity, -min_load), (on, -min_load * big_m)]),
        );
    }

    let opex_specific = ctx.parameter(ParameterName::OpexSpecific, &idx)?;
    let cost_opex = builder.variable(VariableName::CostOpex, &idx)?;
    builder.add_equality(
        ConstraintName::Opex,
        idx.clone(),
        0.0,
        std::iter::once((cost_opex, 1.0))
            .chain(flow.iter().map(|(var, coeff)| (*var, -opex_specific * coeff))),
    );

    let intensity = ctx.parameter(
        ParameterName::CarbonIntensityTechnology,
        &index![id, location],
    )?;
    let emissions = builder.variable(VariableName::CarbonEmissionsTechnology, &idx)?;
    builder.add_equality(
        ConstraintName::CarbonEmissionsTechnology,
        idx,
        0.0,
        std::iter::once((emissions, 1.0))
            .chain(flow.iter().map(|(var, coeff)| (*var, -intensity * coeff))),
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{assert_error, simple_model, solve_first_step};
    use crate::model::Model;
    use float_cmp::assert_approx_eq;
    use rstest::rstest;

    #[rstest]
    fn test_missing_attribute_names_technology(mut simple_model: Model) {
        let converter = simple_model.technologies.get_mut("converter").unwrap();
        converter
            .attributes
            .scalars
            .shift_remove(&ParameterName::Lifetime);
        assert_error!(
            converter.scalar_attribute(ParameterName::Lifetime),
            "Technology converter is missing required attribute `lifetime`"
        );
    }

    #[rstest]
    fn test_attribute_default(simple_model: Model) {
        let converter = &simple_model.technologies["converter"];
        assert_eq!(
            converter
                .attribute(ParameterName::MaxLoad, "node1", Some(0))
                .unwrap(),
            1.0
        );
        assert_eq!(
            converter
                .attribute(ParameterName::CapacityLimit, "node1", None)
                .unwrap(),
            f64::INFINITY
        );
    }

    #[rstest]
    fn test_capex_of_pwa(mut simple_model: Model) {
        let converter = simple_model.technologies.get_mut("converter").unwrap();
        converter.capex_approximation = Approximation::PiecewiseAffine;
        converter.capex_pwa =
            Some(PiecewiseAffine::new("converter", vec![(0.0, 0.0), (10.0, 50.0)]).unwrap());
        let location = Location::Node("node1".into());

        assert_approx_eq!(
            f64,
            converter.capex_of(4.0, &location, None, true).unwrap(),
            20.0
        );
        let err = converter
            .capex_of(11.0, &location, None, true)
            .unwrap_err()
            .downcast::<ModelError>()
            .unwrap();
        assert!(matches!(err, ModelError::DataConsistency { .. }));
    }

    #[rstest]
    fn test_min_built_capacity(mut simple_model: Model) {
        // The converter must be built in chunks of at least 30, even though only 10 is needed
        let converter = simple_model.technologies.get_mut("converter").unwrap();
        converter
            .attributes
            .overwrite(ParameterName::MinBuiltCapacity, 30.0);
        converter
            .attributes
            .overwrite(ParameterName::MaxBuiltCapacity, 100.0);

        let (_, solution) = solve_first_step(&simple_model);
        let built = solution
            .value(
                VariableName::BuiltCapacity,
                &index!["converter", "node1", 0u32],
            )
            .unwrap();
        assert_approx_eq!(f64, built, 30.0, epsilon = 1e-6);
        let not_built = solution
            .value(
                VariableName::BuiltCapacity,
                &index!["converter", "node2", 0u32],
            )
            .unwrap();
        assert_approx_eq!(f64, not_built, 0.0, epsilon = 1e-6);
    }

    #[rstest]
    fn test_install_needs_finite_bound(mut simple_model: Model) {
        simple_model
            .technologies
            .get_mut("converter")
            .unwrap()
            .attributes
            .overwrite(ParameterName::MinBuiltCapacity, 1.0);

        let err = crate::fixture::construct_first_step(&simple_model).unwrap_err();
        let model_err = err.downcast_ref::<ModelError>().unwrap();
        assert!(matches!(model_err, ModelError::Configuration { .. }));
    }

    #[rstest]
    fn test_min_load(mut simple_model: Model) {
        // With a minimum load of 50%, the converter must be built no larger than twice its output
        let converter = simple_model.technologies.get_mut("converter").unwrap();
        converter.attributes.overwrite(ParameterName::MinLoad, 0.5);
        converter
            .attributes
            .overwrite(ParameterName::CapacityLimit, 100.0);

        let (_, solution) = solve_first_step(&simple_model);
        let output = solution
            .value(
                VariableName::OutputFlow,
                &index!["converter", "B", "node1", 0u32],
            )
            .unwrap();
        assert_approx_eq!(f64, output, 10.0, epsilon = 1e-6);
        let capacity = solution
            .value(VariableName::Capacity, &index!["converter", "node1", 0u32])
            .unwrap();
        assert!(capacity <= 20.0 + 1e-6);
    }
}
