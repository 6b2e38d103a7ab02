//! Propulsion mode descriptors, vehicle mass properties, and the transfer-planner feasibility gate.

use orbitmap_core::constants::G0;

/// Simple propulsion mode enumeration. Additional parameters can be layered on per mode.
#[derive(Debug, Clone)]
pub enum PropulsionMode {
    /// Instantaneous impulsive burn (e.g., chemical engine, upper stage).
    Impulsive {
        max_delta_v_km_s: f64,
        isp_seconds: f64,
        max_thrust_newtons: Option<f64>,
    },
    /// Continuous thrust with bounded acceleration and specific impulse.
    Continuous {
        max_thrust_newtons: f64,
        isp_seconds: f64,
        max_acceleration_m_s2: Option<f64>,
    },
    /// Hybrid strategies (placeholder for future modelling).
    Hybrid,
}

impl PropulsionMode {
    fn isp_seconds(&self) -> Option<f64> {
        match self {
            PropulsionMode::Impulsive { isp_seconds, .. }
            | PropulsionMode::Continuous { isp_seconds, .. } => Some(*isp_seconds),
            PropulsionMode::Hybrid => None,
        }
    }

    fn max_thrust_newtons(&self) -> Option<f64> {
        match self {
            PropulsionMode::Impulsive {
                max_thrust_newtons, ..
            } => *max_thrust_newtons,
            PropulsionMode::Continuous {
                max_thrust_newtons, ..
            } => Some(*max_thrust_newtons),
            PropulsionMode::Hybrid => None,
        }
    }
}

/// Vehicle definition as reported by the server's ship record, trimmed to what the feasibility
/// gate needs: this client never simulates a burn, only checks whether one is affordable.
#[derive(Debug, Clone)]
pub struct Vehicle {
    pub name: String,
    pub dry_mass_kg: f64,
    pub propellant_mass_kg: f64,
    pub propulsion: PropulsionMode,
}

impl Vehicle {
    pub fn initial_mass_kg(&self) -> f64 {
        self.dry_mass_kg + self.propellant_mass_kg
    }
}

/// Propellant mass consumed by a single burn of `dv_km_s`, via the Tsiolkovsky rocket equation
/// with exhaust velocity `isp_seconds * g0`. Returns `None` if the mode has no defined Isp
/// (`PropulsionMode::Hybrid`) or the burn would consume more propellant than `mass_before` less
/// the vehicle's dry mass allows.
pub fn propellant_for_delta_v(
    mode: &PropulsionMode,
    mass_before_kg: f64,
    dv_km_s: f64,
) -> Option<f64> {
    if dv_km_s.abs() < 1e-9 {
        return Some(0.0);
    }
    let isp_seconds = mode.isp_seconds()?;
    let exhaust_velocity_m_s = isp_seconds * G0;
    if exhaust_velocity_m_s <= 0.0 {
        return None;
    }
    let dv_m_s = dv_km_s * 1000.0;
    let mass_after = mass_before_kg * (-dv_m_s / exhaust_velocity_m_s).exp();
    let propellant_used = mass_before_kg - mass_after;
    if !propellant_used.is_finite() || propellant_used < 0.0 {
        return None;
    }
    Some(propellant_used)
}

/// Thrust-to-weight ratio at a given mass and local surface gravity. `None` when the propulsion
/// mode has no defined maximum thrust.
pub fn thrust_to_weight(mode: &PropulsionMode, mass_kg: f64, surface_gravity_m_s2: f64) -> Option<f64> {
    let thrust = mode.max_thrust_newtons()?;
    if mass_kg <= 0.0 || surface_gravity_m_s2 <= 0.0 {
        return None;
    }
    Some(thrust / (mass_kg * surface_gravity_m_s2))
}

/// Inputs to the transfer-planner feasibility gate (spec §4.8): whether a quoted transfer is
/// affordable for the ship that would fly it.
#[derive(Debug, Clone)]
pub struct FeasibilityInputs {
    pub vehicle: Vehicle,
    pub dv_needed_km_s: f64,
    pub dv_remaining_km_s: f64,
    /// Surface gravity at each surface site the path touches, for the thrust-to-weight check.
    pub surface_site_gravities_m_s2: Vec<f64>,
    /// Positive means the ship is radiating less heat than it produces (overheating).
    pub waste_heat_surplus_w: f64,
}

/// Per-criterion and aggregate outcome of the feasibility gate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeasibilityReport {
    pub delta_v_ok: bool,
    pub fuel_ok: bool,
    pub thrust_to_weight_ok: bool,
    pub thermal_ok: bool,
}

impl FeasibilityReport {
    /// The confirm button is enabled iff every criterion passes.
    pub fn is_feasible(&self) -> bool {
        self.delta_v_ok && self.fuel_ok && self.thrust_to_weight_ok && self.thermal_ok
    }
}

/// Evaluate the feasibility gate described in spec §4.8.
pub fn evaluate_feasibility(inputs: &FeasibilityInputs) -> FeasibilityReport {
    let delta_v_ok = inputs.dv_needed_km_s <= inputs.dv_remaining_km_s;

    let fuel_needed_kg = propellant_for_delta_v(
        &inputs.vehicle.propulsion,
        inputs.vehicle.initial_mass_kg(),
        inputs.dv_needed_km_s,
    );
    let fuel_ok = matches!(
        fuel_needed_kg,
        Some(needed) if needed <= inputs.vehicle.propellant_mass_kg
    );

    let thrust_to_weight_ok = inputs.surface_site_gravities_m_s2.iter().all(|&g| {
        thrust_to_weight(&inputs.vehicle.propulsion, inputs.vehicle.initial_mass_kg(), g)
            .is_some_and(|twr| twr >= 1.0)
    });

    let thermal_ok = inputs.waste_heat_surplus_w <= 0.0;

    FeasibilityReport {
        delta_v_ok,
        fuel_ok,
        thrust_to_weight_ok,
        thermal_ok,
    }
}
