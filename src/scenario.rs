//! Scenarios: named sets of overrides applied on top of the base configuration.
use crate::error::ModelError;
use crate::id::define_id_type;
use crate::model::Model;
use crate::parameter::{AttributeData, ElementKind, ParameterName};
use crate::technology::TechnologyCategory;
use anyhow::{Result, bail, ensure};
use log::debug;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

define_id_type! {ScenarioID}

impl ScenarioID {
    /// The ID of the base scenario
    pub fn base() -> Self {
        Self::new("")
    }

    /// Whether this is the base scenario
    pub fn is_base(&self) -> bool {
        self.0.is_empty()
    }
}

/// The overrides making up a named scenario
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScenarioDefinition {
    /// The overrides, applied in order
    #[serde(default)]
    pub overrides: Vec<Override>,
}

/// A change to one attribute of one element
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Override {
    /// The ID of a carrier or technology
    pub element: String,
    /// The name of the attribute
    pub attribute: String,
    /// Replace every value of the attribute with this one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    /// Multiply every value of the attribute by this factor
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub factor: Option<f64>,
}

/// How an override changes an attribute
#[derive(Debug, Clone, Copy, PartialEq)]
enum Change {
    Value(f64),
    Factor(f64),
}

impl Override {
    fn change(&self) -> Result<Change> {
        match (self.value, self.factor) {
            (Some(value), None) => Ok(Change::Value(value)),
            (None, Some(factor)) => Ok(Change::Factor(factor)),
            _ => bail!(ModelError::configuration(
                &self.element,
                format!(
                    "override of `{}` must have exactly one of `value` and `factor`",
                    self.attribute
                )
            )),
        }
    }
}

/// Apply a change to the attribute data of an element
fn apply_change(
    attributes: &mut AttributeData,
    element: &str,
    name: ParameterName,
    change: Change,
) -> Result<()> {
    match change {
        Change::Value(value) => attributes.overwrite(name, value),
        Change::Factor(factor) => ensure!(
            attributes.scale(name, factor),
            ModelError::missing_attribute(element, name)
        ),
    }

    Ok(())
}

/// Check that an attribute can be given for an element of the given kind
fn check_element_kind(
    element: &str,
    name: ParameterName,
    category: Option<TechnologyCategory>,
) -> Result<()> {
    let allowed = matches!(
        (name.input_element(), category),
        (Some(ElementKind::Carrier), None)
            | (Some(ElementKind::Technology), Some(_))
            | (
                Some(ElementKind::TransportTechnology),
                Some(TechnologyCategory::Transport)
            )
            | (Some(ElementKind::StorageTechnology), Some(TechnologyCategory::Storage))
    );
    ensure!(
        allowed,
        ModelError::configuration(element, format!("`{name}` cannot be set for this element"))
    );

    Ok(())
}

/// Apply a single override to a model
fn apply_override(model: &mut Model, item: &Override) -> Result<()> {
    let change = item.change()?;
    let Ok(name) = ParameterName::from_str(&item.attribute) else {
        bail!(ModelError::configuration(
            &item.element,
            format!("unknown attribute `{}`", item.attribute)
        ));
    };

    if let Some(carrier) = model.carriers.get_mut(item.element.as_str()) {
        check_element_kind(&item.element, name, None)?;
        return apply_change(&mut carrier.attributes, &item.element, name, change);
    }

    let Some(technology) = model.technologies.get_mut(item.element.as_str()) else {
        bail!(ModelError::configuration(
            &item.element,
            "override refers to an unknown carrier or technology"
        ));
    };

    if name == ParameterName::ConversionEfficiency {
        ensure!(
            technology.category == TechnologyCategory::Conversion,
            ModelError::configuration(
                &item.element,
                "only conversion technologies have efficiencies"
            )
        );
        for efficiency in technology.conversion_efficiencies.values_mut() {
            match change {
                Change::Value(value) => *efficiency = value,
                Change::Factor(factor) => *efficiency *= factor,
            }
        }
        return Ok(());
    }

    check_element_kind(&item.element, name, Some(technology.category))?;
    apply_change(&mut technology.attributes, &item.element, name, change)
}

/// Create a copy of the base model with the overrides of a scenario applied.
///
/// The base model is left untouched.
pub fn apply_scenario(base: &Model, definition: &ScenarioDefinition) -> Result<Model> {
    let mut model = base.clone();
    for item in &definition.overrides {
        debug!(
            "Applying override of {} for {}",
            item.attribute, item.element
        );
        apply_override(&mut model, item)?;
    }

    Ok(model)
}
