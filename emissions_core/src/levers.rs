//! Policy levers: pure transformations of a scenario branch.
//!
//! Every lever takes the branch by reference, validates its parameters and
//! returns a new state. A rejected lever leaves the input untouched. Levers
//! compose in the fixed order given by [`LeverKind::ORDER`]; later levers
//! read categories that earlier ones already rewrote.

use std::fmt;

use bitflags::bitflags;
use emissions_schema::LeverSettings;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    context::ScenarioState,
    engine_config::{ElectricVehicleConfig, EngineConfig},
    error::EmissionsError,
    reference::{CountryTables, LcaTable, PriceTable, RoleIndex},
    vector::{DemandVector, ProductId},
};

bitflags! {
    /// Set of levers enabled for (or applied to) a policy run.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct LeverFlags: u8 {
        const EFFICIENCY_RETROFIT = 1 << 0;
        const LOCAL_GENERATION = 1 << 1;
        const LOCAL_HEATING = 1 << 2;
        const BIOFUEL = 1 << 3;
        const ELECTRIC_VEHICLES = 1 << 4;
        const MODAL_SHIFT = 1 << 5;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LeverKind {
    EfficiencyRetrofit,
    LocalGeneration,
    LocalHeating,
    Biofuel,
    ElectricVehicles,
    ModalShift,
}

impl LeverKind {
    /// Application order when several levers fire in the same year.
    pub const ORDER: [LeverKind; 6] = [
        LeverKind::EfficiencyRetrofit,
        LeverKind::LocalGeneration,
        LeverKind::LocalHeating,
        LeverKind::Biofuel,
        LeverKind::ElectricVehicles,
        LeverKind::ModalShift,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            LeverKind::EfficiencyRetrofit => "efficiency_retrofit",
            LeverKind::LocalGeneration => "local_generation",
            LeverKind::LocalHeating => "local_heating",
            LeverKind::Biofuel => "biofuel",
            LeverKind::ElectricVehicles => "electric_vehicles",
            LeverKind::ModalShift => "modal_shift",
        }
    }

    pub const fn rank(self) -> usize {
        match self {
            LeverKind::EfficiencyRetrofit => 0,
            LeverKind::LocalGeneration => 1,
            LeverKind::LocalHeating => 2,
            LeverKind::Biofuel => 3,
            LeverKind::ElectricVehicles => 4,
            LeverKind::ModalShift => 5,
        }
    }

    pub const fn flag(self) -> LeverFlags {
        match self {
            LeverKind::EfficiencyRetrofit => LeverFlags::EFFICIENCY_RETROFIT,
            LeverKind::LocalGeneration => LeverFlags::LOCAL_GENERATION,
            LeverKind::LocalHeating => LeverFlags::LOCAL_HEATING,
            LeverKind::Biofuel => LeverFlags::BIOFUEL,
            LeverKind::ElectricVehicles => LeverFlags::ELECTRIC_VEHICLES,
            LeverKind::ModalShift => LeverFlags::MODAL_SHIFT,
        }
    }
}

impl fmt::Display for LeverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl LeverFlags {
    /// Lever names in application order.
    pub fn names(self) -> Vec<&'static str> {
        LeverKind::ORDER
            .iter()
            .filter(|kind| self.contains(kind.flag()))
            .map(LeverKind::as_str)
            .collect()
    }
}

/// Target split of heating-fuel spend for the local heating lever.
///
/// `district + electricity + combustible` covers the whole heating budget;
/// `liquids + solids + gases` splits the combustible part.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct HeatingMix {
    pub district: f64,
    pub electricity: f64,
    pub combustible: f64,
    pub liquids: f64,
    pub solids: f64,
    pub gases: f64,
    pub district_value: Option<f64>,
    pub total_heat_fuel: Option<f64>,
}

impl HeatingMix {
    fn is_unset(&self) -> bool {
        [
            self.district,
            self.electricity,
            self.combustible,
            self.liquids,
            self.solids,
            self.gases,
        ]
        .iter()
        .all(|value| *value == 0.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PolicyLever {
    EfficiencyRetrofit {
        scaler: f64,
    },
    LocalGeneration {
        scaler: f64,
        elec_type: String,
    },
    LocalHeating(HeatingMix),
    Biofuel {
        scaler: f64,
    },
    ElectricVehicles {
        scaler: f64,
    },
    ModalShift {
        fuel_scaler: f64,
        pt_scaler: f64,
        veh_scaler: f64,
    },
}

/// Reference data a lever may consult while rewriting a branch.
#[derive(Debug, Clone, Copy)]
pub struct LeverEnv<'a> {
    pub roles: &'a RoleIndex,
    pub country: &'a CountryTables,
    pub config: &'a EngineConfig,
}

impl PolicyLever {
    pub fn kind(&self) -> LeverKind {
        match self {
            PolicyLever::EfficiencyRetrofit { .. } => LeverKind::EfficiencyRetrofit,
            PolicyLever::LocalGeneration { .. } => LeverKind::LocalGeneration,
            PolicyLever::LocalHeating(_) => LeverKind::LocalHeating,
            PolicyLever::Biofuel { .. } => LeverKind::Biofuel,
            PolicyLever::ElectricVehicles { .. } => LeverKind::ElectricVehicles,
            PolicyLever::ModalShift { .. } => LeverKind::ModalShift,
        }
    }

    pub fn apply(
        &self,
        state: &ScenarioState,
        env: &LeverEnv<'_>,
    ) -> Result<ScenarioState, EmissionsError> {
        match self {
            PolicyLever::EfficiencyRetrofit { scaler } => {
                efficiency_retrofit(state, env.roles, *scaler)
            }
            PolicyLever::LocalGeneration { scaler, elec_type } => {
                local_generation(state, env.roles, &env.country.lca, *scaler, elec_type)
            }
            PolicyLever::LocalHeating(mix) => local_heating(
                state,
                env.roles,
                mix,
                env.config.numerics().conservation_tolerance(),
            ),
            PolicyLever::Biofuel { scaler } => biofuel_substitution(state, env.roles, *scaler),
            PolicyLever::ElectricVehicles { scaler } => electric_vehicle_conversion(
                state,
                env.roles,
                &env.country.prices,
                env.config.electric_vehicles(),
                *scaler,
            ),
            PolicyLever::ModalShift {
                fuel_scaler,
                pt_scaler,
                veh_scaler,
            } => modal_shift(state, env.roles, *fuel_scaler, *pt_scaler, *veh_scaler),
        }
    }
}

/// Enabled levers, held in application order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LeverPlan {
    levers: Vec<PolicyLever>,
}

impl LeverPlan {
    pub fn new(mut levers: Vec<PolicyLever>) -> Self {
        levers.sort_by_key(|lever| lever.kind().rank());
        Self { levers }
    }

    pub fn from_settings(settings: &LeverSettings) -> Self {
        let mut levers = Vec::new();
        if let Some(retrofit) = &settings.efficiency_retrofit {
            levers.push(PolicyLever::EfficiencyRetrofit {
                scaler: retrofit.scaler,
            });
        }
        if let Some(generation) = &settings.local_generation {
            levers.push(PolicyLever::LocalGeneration {
                scaler: generation.scaler,
                elec_type: generation.elec_type.clone(),
            });
        }
        if let Some(heating) = &settings.local_heating {
            levers.push(PolicyLever::LocalHeating(HeatingMix {
                district: heating.district_prop,
                electricity: heating.elec_heat_prop,
                combustible: heating.combustible_prop,
                liquids: heating.liquids_prop,
                solids: heating.solids_prop,
                gases: heating.gases_prop,
                district_value: heating.district_value,
                total_heat_fuel: heating.total_heat_fuel,
            }));
        }
        if let Some(biofuel) = &settings.biofuel {
            levers.push(PolicyLever::Biofuel {
                scaler: biofuel.scaler,
            });
        }
        if let Some(ev) = &settings.electric_vehicles {
            levers.push(PolicyLever::ElectricVehicles { scaler: ev.scaler });
        }
        if let Some(shift) = &settings.modal_shift {
            levers.push(PolicyLever::ModalShift {
                fuel_scaler: shift.fuel_scaler,
                pt_scaler: shift.pt_scaler,
                veh_scaler: shift.veh_scaler,
            });
        }
        Self::new(levers)
    }

    pub fn is_empty(&self) -> bool {
        self.levers.is_empty()
    }

    pub fn levers(&self) -> &[PolicyLever] {
        &self.levers
    }

    pub fn flags(&self) -> LeverFlags {
        self.levers
            .iter()
            .fold(LeverFlags::empty(), |flags, lever| flags | lever.kind().flag())
    }

    /// Folds every lever over `state` in application order.
    pub fn apply(
        &self,
        state: &ScenarioState,
        env: &LeverEnv<'_>,
    ) -> Result<ScenarioState, EmissionsError> {
        let mut current = state.clone();
        for lever in &self.levers {
            current = lever.apply(&current, env)?;
            debug!(
                target: "emissions::levers",
                lever = %lever.kind(),
                year = current.year,
                "policy.applied={}",
                lever.kind()
            );
        }
        Ok(current)
    }
}

fn check_non_negative(
    lever: LeverKind,
    parameter: &'static str,
    value: f64,
) -> Result<(), EmissionsError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(EmissionsError::InvalidLeverParameter {
            lever,
            parameter,
            value,
        })
    }
}

/// A share of some category total: non-negative and at most 100%.
fn check_share(lever: LeverKind, parameter: &'static str, value: f64) -> Result<(), EmissionsError> {
    check_non_negative(lever, parameter, value)?;
    if value > 1.0 {
        return Err(EmissionsError::ConservationViolation {
            lever,
            requested: value,
        });
    }
    Ok(())
}

/// Rescales every electricity category to reach `new_total`, with
/// `heating_spend` of it attributed to heating.
fn set_electricity(state: &mut ScenarioState, roles: &RoleIndex, new_total: f64, heating_spend: f64) {
    let current = state.total_electricity(roles);
    if current > 0.0 {
        state.demand.scale_products(&roles.electricity, new_total / current);
    } else {
        state.demand.add(roles.unspecified_electricity, new_total);
    }
    state.elec_heating_share = if new_total > 0.0 {
        (heating_spend / new_total).clamp(0.0, 1.0)
    } else {
        0.0
    };
}

/// Cuts heating demand by `scaler`: combustible fuels, district heat and the
/// heating part of electricity shrink by `1 - scaler`.
pub fn efficiency_retrofit(
    state: &ScenarioState,
    roles: &RoleIndex,
    scaler: f64,
) -> Result<ScenarioState, EmissionsError> {
    check_share(LeverKind::EfficiencyRetrofit, "scaler", scaler)?;
    let keep = 1.0 - scaler;

    let mut next = state.clone();
    next.demand.scale_products(&roles.combustible_heating(), keep);

    let heating = state.heating_electricity(roles);
    let non_heating = state.non_heating_electricity(roles);
    set_electricity(&mut next, roles, non_heating + heating * keep, heating * keep);

    next.demand.scale_products(&roles.district_heat, keep);
    Ok(next)
}

/// Replaces `scaler` of grid electricity with local generation, booked on
/// the unspecified-electricity category at the technology's LCA intensity.
pub fn local_generation(
    state: &ScenarioState,
    roles: &RoleIndex,
    lca: &LcaTable,
    scaler: f64,
    elec_type: &str,
) -> Result<ScenarioState, EmissionsError> {
    check_share(LeverKind::LocalGeneration, "scaler", scaler)?;
    let (direct, indirect) = lca.intensity(elec_type).ok_or_else(|| {
        let known: Vec<&str> = lca.technologies().collect();
        EmissionsError::configuration(format!(
            "no LCA intensity for generation type '{elec_type}' (known: {})",
            known.join(", ")
        ))
    })?;

    let mut next = state.clone();
    let freed = next.demand.sum_of(&roles.grid_electricity) * scaler;
    next.demand.scale_products(&roles.grid_electricity, 1.0 - scaler);
    next.demand.add(roles.unspecified_electricity, freed);
    next.intensities
        .set(roles.unspecified_electricity, direct, indirect);
    Ok(next)
}

/// Redistributes the heating-fuel budget across district heat, heating
/// electricity and the liquid/solid/gas categories.
pub fn local_heating(
    state: &ScenarioState,
    roles: &RoleIndex,
    mix: &HeatingMix,
    tolerance: f64,
) -> Result<ScenarioState, EmissionsError> {
    let lever = LeverKind::LocalHeating;
    for (name, value) in [
        ("district_prop", mix.district),
        ("elec_heat_prop", mix.electricity),
        ("combustible_prop", mix.combustible),
        ("liquids_prop", mix.liquids),
        ("solids_prop", mix.solids),
        ("gases_prop", mix.gases),
    ] {
        check_share(lever, name, value)?;
    }
    if let Some(value) = mix.district_value {
        check_non_negative(lever, "district_value", value)?;
    }
    if let Some(total) = mix.total_heat_fuel {
        check_non_negative(lever, "total_heat_fuel", total)?;
    }

    let liquids = state.demand.sum_of(&roles.heating_liquids);
    let solids = state.demand.sum_of(&roles.heating_solids);
    let gases = state.demand.sum_of(&roles.heating_gases);
    let district = state.demand.sum_of(&roles.district_heat);
    let heating_elec = state.heating_electricity(roles);
    let current_total = liquids + solids + gases + district + heating_elec;

    let mix = if mix.is_unset() {
        let share = |part: f64, whole: f64| if whole > 0.0 { part / whole } else { 0.0 };
        let combustible = liquids + solids + gases;
        HeatingMix {
            district: share(district, current_total),
            electricity: share(heating_elec, current_total),
            combustible: share(combustible, current_total),
            liquids: share(liquids, combustible),
            solids: share(solids, combustible),
            gases: share(gases, combustible),
            ..*mix
        }
    } else {
        let top = mix.district + mix.electricity + mix.combustible;
        if (top - 1.0).abs() > tolerance {
            return Err(EmissionsError::ConservationViolation {
                lever,
                requested: top,
            });
        }
        if mix.combustible > 0.0 {
            let split = mix.liquids + mix.solids + mix.gases;
            if (split - 1.0).abs() > tolerance {
                return Err(EmissionsError::ConservationViolation {
                    lever,
                    requested: split,
                });
            }
        }
        *mix
    };

    // A combustible share with no products to carry it would drop out of the
    // heating budget.
    for (share, group) in [
        (mix.combustible * mix.liquids, &roles.heating_liquids),
        (mix.combustible * mix.solids, &roles.heating_solids),
        (mix.combustible * mix.gases, &roles.heating_gases),
    ] {
        if share > 0.0 && group.is_empty() {
            return Err(EmissionsError::ConservationViolation {
                lever,
                requested: share,
            });
        }
    }

    let total = match mix.total_heat_fuel {
        Some(total) if total > 0.0 => total,
        _ => current_total,
    };

    let mut next = state.clone();
    if total > 0.0 {
        let combustible = total * mix.combustible;
        next.demand.distribute(&roles.district_heat, total * mix.district);
        next.demand
            .distribute(&roles.heating_liquids, combustible * mix.liquids);
        next.demand
            .distribute(&roles.heating_solids, combustible * mix.solids);
        next.demand
            .distribute(&roles.heating_gases, combustible * mix.gases);

        let heating = total * mix.electricity;
        let non_heating = state.non_heating_electricity(roles);
        set_electricity(&mut next, roles, non_heating + heating, heating);
    }

    if let Some(value) = mix.district_value {
        for &id in &roles.district_heat {
            next.intensities.direct.set(id, value);
        }
    }
    Ok(next)
}

/// Raises the biofuel share of road fuel to `scaler`, keeping the petrol to
/// diesel split and the four-category total unchanged.
pub fn biofuel_substitution(
    state: &ScenarioState,
    roles: &RoleIndex,
    scaler: f64,
) -> Result<ScenarioState, EmissionsError> {
    check_share(LeverKind::Biofuel, "scaler", scaler)?;

    let demand = &state.demand;
    let petrol = demand.get(roles.motor_gasoline) + demand.get(roles.biogasoline);
    let diesel = demand.get(roles.gas_diesel_oil) + demand.get(roles.biodiesel);
    let total = petrol + diesel;

    let mut next = state.clone();
    if total <= 0.0 {
        return Ok(next);
    }
    let petrol_share = petrol / total;
    let diesel_share = diesel / total;

    next.demand
        .set(roles.biogasoline, scaler * total * petrol_share);
    next.demand.set(roles.biodiesel, scaler * total * diesel_share);
    next.demand
        .set(roles.motor_gasoline, (1.0 - scaler) * total * petrol_share);
    next.demand
        .set(roles.gas_diesel_oil, (1.0 - scaler) * total * diesel_share);
    Ok(next)
}

/// Electricity spend needed to replace `scaler` of road-fuel spend.
///
/// Fuel spend is converted to litres at the pump price, to kWh of fuel
/// energy, divided by the drivetrain efficiency gain and priced at the
/// electricity tariff.
pub fn electric_vehicle_electricity_spend(
    demand: &DemandVector,
    roles: &RoleIndex,
    prices: &PriceTable,
    ev: &ElectricVehicleConfig,
    scaler: f64,
) -> Result<f64, EmissionsError> {
    for (name, price) in [
        ("petrol", prices.petrol),
        ("diesel", prices.diesel),
        ("electricity", prices.electricity),
    ] {
        if !price.is_finite() || price <= 0.0 {
            return Err(EmissionsError::configuration(format!(
                "{name} price {price} cannot convert fuel spend"
            )));
        }
    }

    let petrol_spend = demand.get(roles.motor_gasoline) + demand.get(roles.biogasoline);
    let diesel_spend = demand.get(roles.gas_diesel_oil) + demand.get(roles.biodiesel);
    let fuel_kwh = scaler * petrol_spend / prices.petrol * ev.petrol_kwh_per_litre()
        + scaler * diesel_spend / prices.diesel * ev.diesel_kwh_per_litre();
    let electric_kwh = fuel_kwh / ev.efficiency_gain();
    Ok(electric_kwh * prices.electricity)
}

/// Moves `scaler` of road-fuel spend to electricity.
pub fn electric_vehicle_conversion(
    state: &ScenarioState,
    roles: &RoleIndex,
    prices: &PriceTable,
    ev: &ElectricVehicleConfig,
    scaler: f64,
) -> Result<ScenarioState, EmissionsError> {
    check_share(LeverKind::ElectricVehicles, "scaler", scaler)?;
    let added = electric_vehicle_electricity_spend(&state.demand, roles, prices, ev, scaler)?;

    let mut next = state.clone();
    next.demand.scale_products(&roles.transport_fuels(), 1.0 - scaler);

    let heating = state.heating_electricity(roles);
    let total = state.total_electricity(roles) + added;
    set_electricity(&mut next, roles, total, heating);
    Ok(next)
}

/// Shrinks road fuel and vehicle spend and grows public transport, each by
/// its own percentage.
pub fn modal_shift(
    state: &ScenarioState,
    roles: &RoleIndex,
    fuel_scaler: f64,
    pt_scaler: f64,
    veh_scaler: f64,
) -> Result<ScenarioState, EmissionsError> {
    let lever = LeverKind::ModalShift;
    check_share(lever, "fuel_scaler", fuel_scaler)?;
    check_share(lever, "veh_scaler", veh_scaler)?;
    check_non_negative(lever, "pt_scaler", pt_scaler)?;

    let mut next = state.clone();
    next.demand
        .scale_products(&roles.transport_fuels(), 1.0 - fuel_scaler);
    next.demand.scale_products(&roles.vehicles, 1.0 - veh_scaler);
    next.demand
        .scale_products(&roles.public_transport, 1.0 + pt_scaler);
    Ok(next)
}

/// Products whose demand any lever may rewrite.
pub fn touched_products(roles: &RoleIndex) -> Vec<ProductId> {
    let mut ids = roles.electricity.clone();
    ids.extend(roles.combustible_heating());
    ids.extend_from_slice(&roles.district_heat);
    ids.extend(roles.transport_fuels());
    ids.extend_from_slice(&roles.vehicles);
    ids.extend_from_slice(&roles.public_transport);
    ids.sort_unstable();
    ids.dedup();
    ids
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        context::{ScenarioContext, ScenarioInputs},
        reference::ReferenceData,
    };

    fn context(country: &str) -> ScenarioContext {
        ScenarioContext::new(
            ReferenceData::builtin(),
            EngineConfig::builtin(),
            ScenarioInputs::new(country, 2020, 1000.0),
        )
        .expect("context builds")
    }

    fn close(a: f64, b: f64, tolerance: f64) -> bool {
        (a - b).abs() <= tolerance * a.abs().max(b.abs()).max(1.0)
    }

    #[test]
    fn biofuel_substitution_conserves_fuel_total() {
        let ctx = context("Ireland");
        let roles = ctx.roles();
        let state = ctx.fresh_state();
        let fuels = roles.transport_fuels();
        let before = state.demand.sum_of(&fuels);

        let next = biofuel_substitution(&state, roles, 0.5).expect("lever applies");
        assert!((next.demand.sum_of(&fuels) - before).abs() < 1e-6);

        let bio = next.demand.get(roles.biogasoline) + next.demand.get(roles.biodiesel);
        assert!((bio - 0.5 * before).abs() < 1e-6);
    }

    #[test]
    fn biofuel_substitution_keeps_petrol_diesel_ratio() {
        let ctx = context("Germany");
        let roles = ctx.roles();
        let state = ctx.fresh_state();
        let petrol = |s: &ScenarioState| {
            s.demand.get(roles.motor_gasoline) + s.demand.get(roles.biogasoline)
        };
        let diesel = |s: &ScenarioState| {
            s.demand.get(roles.gas_diesel_oil) + s.demand.get(roles.biodiesel)
        };

        let next = biofuel_substitution(&state, roles, 0.2).expect("lever applies");
        assert!(close(
            petrol(&next) / diesel(&next),
            petrol(&state) / diesel(&state),
            1e-12
        ));
    }

    #[test]
    fn biofuel_above_full_share_is_rejected_without_mutation() {
        let ctx = context("Ireland");
        let state = ctx.fresh_state();
        let snapshot = state.clone();
        let err = biofuel_substitution(&state, ctx.roles(), 1.2).expect_err("should reject");
        assert_eq!(
            err,
            EmissionsError::ConservationViolation {
                lever: LeverKind::Biofuel,
                requested: 1.2
            }
        );
        assert_eq!(state, snapshot);
    }

    #[test]
    fn retrofit_cuts_combustibles_to_seventy_percent() {
        let ctx = context("Ireland");
        let roles = ctx.roles();
        let state = ctx.fresh_state();
        let next = efficiency_retrofit(&state, roles, 0.3).expect("lever applies");

        for id in roles.combustible_heating() {
            assert!(close(next.demand.get(id), state.demand.get(id) * 0.7, 1e-12));
        }
        for &id in &roles.district_heat {
            assert!(close(next.demand.get(id), state.demand.get(id) * 0.7, 1e-12));
        }
        assert!(close(
            next.non_heating_electricity(roles),
            state.non_heating_electricity(roles),
            1e-9
        ));
        assert!(close(
            next.heating_electricity(roles),
            state.heating_electricity(roles) * 0.7,
            1e-9
        ));
    }

    #[test]
    fn local_generation_moves_grid_spend_to_unspecified() {
        let ctx = context("Poland");
        let roles = ctx.roles();
        let state = ctx.fresh_state();
        let lca = &ctx.country().lca;

        let next = local_generation(&state, roles, lca, 0.25, "solar_pv").expect("lever applies");
        assert!(close(
            next.total_electricity(roles),
            state.total_electricity(roles),
            1e-12
        ));
        let grid_before = state.demand.sum_of(&roles.grid_electricity);
        assert!(close(
            next.demand.sum_of(&roles.grid_electricity),
            grid_before * 0.75,
            1e-12
        ));
        let (direct, indirect) = lca.intensity("solar_pv").expect("solar in builtin LCA");
        let nec = roles.unspecified_electricity;
        assert_eq!(next.intensities.direct.get(nec), direct);
        assert_eq!(next.intensities.indirect.get(nec), indirect);
    }

    #[test]
    fn local_generation_rejects_unknown_technology() {
        let ctx = context("Poland");
        let err = local_generation(
            &ctx.fresh_state(),
            ctx.roles(),
            &ctx.country().lca,
            0.25,
            "fusion",
        )
        .expect_err("unknown technology");
        let known: Vec<&str> = ctx.country().lca.technologies().collect();
        assert!(known.contains(&"solar_pv"));
        assert_eq!(
            err,
            EmissionsError::Configuration(format!(
                "no LCA intensity for generation type 'fusion' (known: {})",
                known.join(", ")
            ))
        );
    }

    #[test]
    fn local_heating_redistributes_budget() {
        let ctx = context("Finland");
        let roles = ctx.roles();
        let state = ctx.fresh_state();
        let total = state.total_heating_fuel(roles);
        let mix = HeatingMix {
            district: 0.5,
            electricity: 0.2,
            combustible: 0.3,
            liquids: 0.0,
            solids: 0.5,
            gases: 0.5,
            district_value: Some(0.05),
            total_heat_fuel: None,
        };

        let next = local_heating(&state, roles, &mix, 1e-6).expect("lever applies");
        assert!(close(next.total_heating_fuel(roles), total, 1e-9));
        assert!(close(
            next.demand.sum_of(&roles.district_heat),
            total * 0.5,
            1e-9
        ));
        assert!(close(next.heating_electricity(roles), total * 0.2, 1e-9));
        assert!(next.demand.sum_of(&roles.heating_liquids).abs() < 1e-9);
        assert!(close(
            next.non_heating_electricity(roles),
            state.non_heating_electricity(roles),
            1e-9
        ));
        for &id in &roles.district_heat {
            assert_eq!(next.intensities.direct.get(id), 0.05);
        }
    }

    #[test]
    fn local_heating_with_zero_mix_keeps_current_shares() {
        let ctx = context("Sweden");
        let roles = ctx.roles();
        let state = ctx.fresh_state();
        let next =
            local_heating(&state, roles, &HeatingMix::default(), 1e-6).expect("lever applies");
        for id in touched_products(roles) {
            assert!(close(next.demand.get(id), state.demand.get(id), 1e-9));
        }
    }

    #[test]
    fn local_heating_rejects_share_for_missing_fuel_group() {
        let reference = std::sync::Arc::new(
            ReferenceData::from_json_str(crate::reference::tests::TINY)
                .expect("tiny dataset should parse"),
        );
        let ctx = ScenarioContext::new(
            reference,
            EngineConfig::builtin(),
            ScenarioInputs::new("Testland", 2020, 1000.0),
        )
        .expect("context builds");
        let roles = ctx.roles();
        assert!(roles.heating_gases.is_empty());

        let state = ctx.fresh_state();
        let mix = HeatingMix {
            district: 0.5,
            combustible: 0.5,
            gases: 1.0,
            total_heat_fuel: Some(100.0),
            ..HeatingMix::default()
        };
        let err =
            local_heating(&state, roles, &mix, 1e-6).expect_err("gas share has no products");
        assert_eq!(
            err,
            EmissionsError::ConservationViolation {
                lever: LeverKind::LocalHeating,
                requested: 0.5,
            }
        );

        let all_district = HeatingMix {
            district: 1.0,
            total_heat_fuel: Some(100.0),
            ..HeatingMix::default()
        };
        let next = local_heating(&state, roles, &all_district, 1e-6).expect("lever applies");
        assert!(close(next.total_heating_fuel(roles), 100.0, 1e-9));
    }

    #[test]
    fn local_heating_rejects_over_allocation() {
        let ctx = context("Sweden");
        let mix = HeatingMix {
            district: 0.7,
            electricity: 0.4,
            combustible: 0.1,
            liquids: 1.0,
            ..HeatingMix::default()
        };
        let err = local_heating(&ctx.fresh_state(), ctx.roles(), &mix, 1e-6)
            .expect_err("over-allocation");
        assert!(matches!(
            err,
            EmissionsError::ConservationViolation {
                lever: LeverKind::LocalHeating,
                ..
            }
        ));
    }

    #[test]
    fn electric_vehicles_full_conversion_empties_fuel() {
        let ctx = context("Ireland");
        let roles = ctx.roles();
        let state = ctx.fresh_state();
        let prices = &ctx.country().prices;
        let ev = ctx.config().electric_vehicles();

        let added = electric_vehicle_electricity_spend(&state.demand, roles, prices, ev, 1.0)
            .expect("prices valid");
        let next =
            electric_vehicle_conversion(&state, roles, prices, ev, 1.0).expect("lever applies");

        for id in roles.transport_fuels() {
            assert_eq!(next.demand.get(id), 0.0);
        }
        assert!(close(
            next.total_electricity(roles),
            state.total_electricity(roles) + added,
            1e-6
        ));
        assert!(close(
            next.heating_electricity(roles),
            state.heating_electricity(roles),
            1e-9
        ));
    }

    #[test]
    fn electric_vehicle_spend_follows_energy_constants() {
        let ctx = context("Ireland");
        let roles = ctx.roles();
        let state = ctx.fresh_state();
        let prices = &ctx.country().prices;
        let ev = ctx.config().electric_vehicles();

        let petrol =
            state.demand.get(roles.motor_gasoline) + state.demand.get(roles.biogasoline);
        let diesel = state.demand.get(roles.gas_diesel_oil) + state.demand.get(roles.biodiesel);
        let kwh = (petrol / prices.petrol * 34.2 * 0.278 + diesel / prices.diesel * 38.6 * 0.278)
            * 0.5
            / 4.54;
        let expected = kwh * prices.electricity;
        let actual = electric_vehicle_electricity_spend(&state.demand, roles, prices, ev, 0.5)
            .expect("prices valid");
        assert!(close(actual, expected, 1e-12));
    }

    #[test]
    fn modal_shift_applies_independent_percentages() {
        let ctx = context("Germany");
        let roles = ctx.roles();
        let state = ctx.fresh_state();
        let next = modal_shift(&state, roles, 0.1, 0.5, 0.2).expect("lever applies");

        for id in roles.transport_fuels() {
            assert!(close(next.demand.get(id), state.demand.get(id) * 0.9, 1e-12));
        }
        for &id in &roles.vehicles {
            assert!(close(next.demand.get(id), state.demand.get(id) * 0.8, 1e-12));
        }
        for &id in &roles.public_transport {
            assert!(close(next.demand.get(id), state.demand.get(id) * 1.5, 1e-12));
        }
    }

    #[test]
    fn negative_parameters_are_invalid() {
        let ctx = context("Germany");
        let err = modal_shift(&ctx.fresh_state(), ctx.roles(), 0.1, -0.5, 0.2)
            .expect_err("negative pt");
        assert_eq!(
            err,
            EmissionsError::InvalidLeverParameter {
                lever: LeverKind::ModalShift,
                parameter: "pt_scaler",
                value: -0.5
            }
        );
    }

    #[test]
    fn plan_sorts_levers_into_application_order() {
        let plan = LeverPlan::new(vec![
            PolicyLever::ModalShift {
                fuel_scaler: 0.1,
                pt_scaler: 0.1,
                veh_scaler: 0.1,
            },
            PolicyLever::Biofuel { scaler: 0.1 },
            PolicyLever::EfficiencyRetrofit { scaler: 0.1 },
        ]);
        let kinds: Vec<LeverKind> = plan.levers().iter().map(PolicyLever::kind).collect();
        assert_eq!(
            kinds,
            vec![
                LeverKind::EfficiencyRetrofit,
                LeverKind::Biofuel,
                LeverKind::ModalShift
            ]
        );
        assert_eq!(
            plan.flags().names(),
            vec!["efficiency_retrofit", "biofuel", "modal_shift"]
        );
    }

    #[test]
    fn plan_leaves_input_state_untouched() {
        let ctx = context("Ireland");
        let env = LeverEnv {
            roles: ctx.roles(),
            country: ctx.country(),
            config: ctx.config(),
        };
        let plan = LeverPlan::new(vec![
            PolicyLever::EfficiencyRetrofit { scaler: 0.4 },
            PolicyLever::ElectricVehicles { scaler: 0.6 },
        ]);
        let state = ctx.fresh_state().branch_for_policy();
        let snapshot = state.clone();
        let next = plan.apply(&state, &env).expect("plan applies");
        assert_eq!(state, snapshot);
        assert_ne!(next.demand, snapshot.demand);
    }

    #[test]
    fn failing_lever_aborts_whole_plan() {
        let ctx = context("Ireland");
        let env = LeverEnv {
            roles: ctx.roles(),
            country: ctx.country(),
            config: ctx.config(),
        };
        let plan = LeverPlan::new(vec![
            PolicyLever::EfficiencyRetrofit { scaler: 0.4 },
            PolicyLever::Biofuel { scaler: 3.0 },
        ]);
        let err = plan
            .apply(&ctx.fresh_state(), &env)
            .expect_err("biofuel share above one");
        assert!(matches!(
            err,
            EmissionsError::ConservationViolation {
                lever: LeverKind::Biofuel,
                ..
            }
        ));
    }
}
