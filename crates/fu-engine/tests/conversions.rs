//! Engine conversion factors cross-checked against `uom`.

use fu_core::{Tolerances, nearly_equal};
use fu_engine::{EngineError, RedefinitionPolicy, UnitRegistry};
use uom::si::f64::{Energy, Mass, Volume};

fn registry() -> UnitRegistry {
    UnitRegistry::with_defaults().unwrap()
}

fn factor(reg: &UnitRegistry, from: &str, to: &str) -> f64 {
    let q = reg.parse_expression(&format!("1 {from}")).unwrap();
    let target = reg.parse_units(to).unwrap();
    reg.convert(&q, &target, None).unwrap().magnitude
}

fn close(a: f64, b: f64) -> bool {
    nearly_equal(a, b, Tolerances { abs: 0.0, rel: 1e-9 })
}

/// uom stores some imperial constants with 7 significant digits.
fn close_to_uom(a: f64, b: f64) -> bool {
    nearly_equal(a, b, Tolerances { abs: 0.0, rel: 1e-6 })
}

#[test]
fn energy_matches_uom() {
    use uom::si::energy::{joule, kilowatt_hour};
    let reg = registry();
    let expected = Energy::new::<kilowatt_hour>(1.0).get::<joule>();
    assert!(close(factor(&reg, "kWh", "J"), expected));
    assert!(close(factor(&reg, "MWh", "kWh"), 1000.0));
}

#[test]
fn volume_matches_uom() {
    use uom::si::volume::{cubic_foot, cubic_meter, liter};
    let reg = registry();
    let cf = Volume::new::<cubic_foot>(1.0).get::<cubic_meter>();
    assert!(close_to_uom(factor(&reg, "cubic_foot", "m ** 3"), cf));
    assert!(close(factor(&reg, "cubic_foot", "m ** 3"), 0.028316846592));
    let l = Volume::new::<liter>(1.0).get::<cubic_meter>();
    assert!(close(factor(&reg, "L", "m**3"), l));
}

#[test]
fn mass_matches_uom() {
    use uom::si::mass::{gram, pound};
    let reg = registry();
    let lb = Mass::new::<pound>(1.0).get::<gram>();
    assert!(close_to_uom(factor(&reg, "lb", "g"), lb));
    assert!(close(factor(&reg, "lb", "g"), 453.59237));
    assert!(close(factor(&reg, "ton", "kg"), 907.18474));
    assert!(close(factor(&reg, "t", "g"), 1e6));
}

#[test]
fn compound_units_convert() {
    let reg = registry();
    // 33.33 kWh/kg expressed in MJ/kg
    let q = reg.parse_expression("33.33 kWh / kg").unwrap();
    let out = reg
        .convert(&q, &reg.parse_units("MJ / kg").unwrap(), None)
        .unwrap();
    assert!(close(out.magnitude, 33.33 * 3.6));
}

#[test]
fn definitions_file_with_import_and_context() {
    let tmp = tempfile::tempdir().unwrap();
    let dir = tmp.path();
    std::fs::write(
        dir.join("base.txt"),
        "# base\nUSD_2024 = [currency] = USD\n@import extra.txt\n",
    )
    .unwrap();
    std::fs::write(
        dir.join("extra.txt"),
        "EUR_2024 = USD_2024 * 1.08 = EUR\n@context cheap\n    EUR_2024 = USD_2024 * 0.5\n@end\n",
    )
    .unwrap();

    let mut reg = registry();
    reg.load_definitions(&dir.join("base.txt")).unwrap();
    assert!(close(factor(&reg, "EUR", "USD"), 1.08));

    let q = reg.parse_expression("2 EUR").unwrap();
    let usd = reg.parse_units("USD").unwrap();
    let cheap = reg.convert(&q, &usd, Some("cheap")).unwrap();
    assert!(close(cheap.magnitude, 1.0));
}

#[test]
fn missing_file_is_io_error() {
    let mut reg = registry();
    let err = reg
        .load_definitions(std::path::Path::new("/nonexistent/flowunits.txt"))
        .unwrap_err();
    assert!(matches!(err, EngineError::Io { .. }));
}

#[test]
fn empty_registry_knows_nothing() {
    let mut reg = UnitRegistry::new();
    reg.set_redefinition_policy(RedefinitionPolicy::Error);
    assert!(matches!(
        reg.define("kilogram_H2 = 1e3 * gram"),
        Err(EngineError::UndefinedUnit(u)) if u == "gram"
    ));
}
