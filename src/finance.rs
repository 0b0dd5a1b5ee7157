//! General functions related to finance.

/// Calculates the capital recovery factor (CRF) for a given lifetime and interest rate.
///
/// The CRF is used to annualise capital costs over the lifetime of a technology.
pub fn capital_recovery_factor(lifetime: f64, interest_rate: f64) -> f64 {
    if lifetime <= 0.0 {
        return 0.0;
    }
    if interest_rate == 0.0 {
        return 1.0 / lifetime;
    }
    let factor = (1.0 + interest_rate).powf(lifetime);
    (interest_rate * factor) / (factor - 1.0)
}

/// Calculates the share of capex charged per year of the modelled time steps
///
/// # Arguments
///
/// * `lifetime` - Lifetime of the technology in years
/// * `interest_rate` - Interest rate used to annualise capex
/// * `fraction_of_year` - Share of a year covered by the modelled time steps
pub fn fractional_annuity(lifetime: f64, interest_rate: f64, fraction_of_year: f64) -> f64 {
    capital_recovery_factor(lifetime, interest_rate) * fraction_of_year
}
