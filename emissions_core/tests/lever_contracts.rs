use emissions_core::{
    levers::{biofuel_substitution, electric_vehicle_conversion, electric_vehicle_electricity_spend},
    EmissionsError, EngineConfig, LeverFlags, LeverKind, ReferenceData, ScenarioContext,
    ScenarioInputs, Sector,
};

fn context(country: &str) -> ScenarioContext {
    ScenarioContext::new(
        ReferenceData::builtin(),
        EngineConfig::builtin(),
        ScenarioInputs::new(country, 2020, 1000.0),
    )
    .expect("context builds")
}

#[test]
fn lever_application_order_is_fixed() {
    let names = LeverFlags::all().names().join("\n");
    insta::assert_snapshot!(names, @r###"
    efficiency_retrofit
    local_generation
    local_heating
    biofuel
    electric_vehicles
    modal_shift
    "###);
}

#[test]
fn sector_names_are_stable() {
    let names: Vec<&str> = Sector::variants().iter().map(Sector::as_str).collect();
    insta::assert_snapshot!(names.join(","), @"household_energy,household_other,transport_fuel,transport_other,air_transport,food,tangible_goods,services");
}

#[test]
fn full_electric_vehicle_conversion_moves_all_fuel_spend() {
    for country in ["Ireland", "Germany", "Finland"] {
        let ctx = context(country);
        let roles = ctx.roles();
        let prices = &ctx.country().prices;
        let ev = ctx.config().electric_vehicles();
        let state = ctx.fresh_state();

        let converted = electric_vehicle_electricity_spend(&state.demand, roles, prices, ev, 1.0)
            .expect("prices are positive");
        let next = electric_vehicle_conversion(&state, roles, prices, ev, 1.0)
            .expect("conversion applies");

        for id in roles.transport_fuels() {
            assert_eq!(next.demand.get(id), 0.0, "{country}");
        }
        let expected = state.total_electricity(roles) + converted;
        let actual = next.total_electricity(roles);
        assert!(
            (actual - expected).abs() <= 1e-6 * expected,
            "{country}: {actual} vs {expected}"
        );
    }
}

#[test]
fn biofuel_conservation_holds_for_every_builtin_country() {
    let reference = ReferenceData::builtin();
    let names: Vec<String> = reference.country_names().map(str::to_string).collect();
    assert_eq!(names.len(), 5);
    for country in names {
        let ctx = context(&country);
        let roles = ctx.roles();
        let fuels = roles.transport_fuels();
        let state = ctx.fresh_state();
        let next = biofuel_substitution(&state, roles, 0.5).expect("substitution applies");
        assert!(
            (next.demand.sum_of(&fuels) - state.demand.sum_of(&fuels)).abs() <= 1e-6,
            "{country}"
        );
    }
}

#[test]
fn over_full_biofuel_share_is_a_conservation_violation() {
    let ctx = context("Ireland");
    let err = biofuel_substitution(&ctx.fresh_state(), ctx.roles(), 1.5)
        .expect_err("share above one");
    assert_eq!(
        err.to_string(),
        "biofuel requested 1.500000 of its operating total, which exceeds 100%"
    );
    assert!(matches!(
        err,
        EmissionsError::ConservationViolation {
            lever: LeverKind::Biofuel,
            ..
        }
    ));
}
