//! Regenerate the definition files from `data/` and load the result.

use fu_generate::{DataLayout, GenerateError, generate_all};
use fu_units::{FlowRegistry, PathLayout};

fn generate_into(root: &std::path::Path) -> Vec<std::path::PathBuf> {
    let bundled = PathLayout::bundled();
    std::fs::copy(bundled.plain(), root.join("plain.txt")).unwrap();
    let layout = PathLayout::new(root);
    std::fs::create_dir_all(layout.generated()).unwrap();

    let registry = FlowRegistry::with_static(layout.clone()).unwrap();
    generate_all(&DataLayout::bundled(), &registry, &layout.generated()).unwrap()
}

#[test]
fn regenerated_tree_supports_hydrogen_pricing() {
    let dir = tempfile::tempdir().unwrap();
    let written = generate_into(dir.path());
    assert!(written.iter().all(|p| p.is_file()));

    let layout = PathLayout::new(dir.path());
    assert!(layout.flow_file("H2").is_file());
    assert!(layout.currency_file("EUR").is_file());
    assert!(layout.species_list().is_file());

    let mut reg = FlowRegistry::bootstrap(layout).unwrap();
    reg.define_flows(["H2"]).unwrap();
    let q = reg
        .convert_str("1 USD_2020 / kg_H2", "EUR_2024 / MWh_H2_LHV", None)
        .unwrap();
    assert!((q.magnitude - 33.0).abs() < 1.0, "got {}", q.magnitude);
}

#[test]
fn regenerated_flows_match_bundled_unit_names() {
    let dir = tempfile::tempdir().unwrap();
    generate_into(dir.path());
    let fresh = PathLayout::new(dir.path());
    let bundled = PathLayout::bundled();

    let names = |path: std::path::PathBuf| -> Vec<String> {
        std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .filter(|l| !l.starts_with('#') && !l.trim().is_empty())
            .filter_map(|l| l.split(" = ").next().map(str::to_string))
            .collect()
    };
    for id in fu_generate::flows::SUPPORTED_FLOWS {
        assert_eq!(names(fresh.flow_file(id)), names(bundled.flow_file(id)), "{id}");
    }
}

#[test]
fn output_must_be_a_directory() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("generated");
    std::fs::write(&file, "").unwrap();
    let registry = FlowRegistry::with_static(PathLayout::bundled()).unwrap();
    let err = generate_all(&DataLayout::bundled(), &registry, &file).unwrap_err();
    assert!(matches!(err, GenerateError::NotADirectory(_)));
}
