//! Each loading stage depends on the units of the previous ones.

use fu_engine::{EngineError, UnitRegistry};
use fu_units::{DefinitionLoader, FactorKey, FlowRegistry, FlowSpec, PathLayout, SpeciesList, UnitsError};

fn hydrogen() -> FlowSpec {
    FlowSpec::new("Hydrogen")
        .unwrap()
        .with_factor(FactorKey::EnergyContentLhv, "33.33 kWh/kg")
        .with_factor(FactorKey::DensityNorm, "0.08988 kg/m3")
}

fn undefined(err: &UnitsError) -> Option<&str> {
    match err {
        UnitsError::Engine(e) => match e.root_cause() {
            EngineError::UndefinedUnit(u) => Some(u.as_str()),
            _ => None,
        },
        _ => None,
    }
}

#[test]
fn flows_before_static_units_fail() {
    let reg = FlowRegistry::new().unwrap();
    let err = reg.generate_flow_definitions("H2", &hydrogen()).unwrap_err();
    assert!(undefined(&err).is_some(), "{err}");

    let reg = FlowRegistry::with_static(PathLayout::bundled()).unwrap();
    let block = reg.generate_flow_definitions("H2", &hydrogen()).unwrap();
    assert!(block.unit_names().contains(&"cubic_meter_H2"));
}

#[test]
fn currencies_before_base_currency_fail() {
    let layout = PathLayout::bundled();
    let mut engine = UnitRegistry::with_defaults().unwrap();
    let err = engine
        .load_definitions(&layout.currency_file("EUR"))
        .map_err(UnitsError::from)
        .unwrap_err();
    assert_eq!(undefined(&err), Some("USD_2024"));

    engine.load_definitions(&layout.currency_file("USD")).unwrap();
    engine.load_definitions(&layout.currency_file("EUR")).unwrap();
    assert!(engine.contains("EUR_2005"));
}

#[test]
fn documented_order_loads_everything() {
    let layout = PathLayout::bundled();
    let mut engine = UnitRegistry::with_defaults().unwrap();
    let mut species = SpeciesList::builtin();
    let loader = DefinitionLoader::new(&layout);
    let currencies = loader.load_all(&mut engine, &mut species).unwrap();
    assert_eq!(currencies, ["USD", "EUR"]);
    for flow in ["H2", "NG", "NH3", "MeOH", "H2O"] {
        loader.load_flow(&mut engine, flow).unwrap();
    }
    assert!(engine.contains("MWh_H2_LHV"));
    assert!(engine.contains("t__CH4"));
    assert_eq!(engine.context_ids(), ["AR4GWP100", "AR5GWP100", "AR6GWP100"]);
}
