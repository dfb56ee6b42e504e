use std::path::Path;

#[test]
fn demo_projects_load_and_validate() {
    let root = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("..")
        .join("demos")
        .join("cells");
    let demos = ["nmc_graphite.yaml", "pulse_screening.yaml"];

    for name in demos {
        let path = root.join(name);
        let project = cf_design::load_yaml(&path)
            .unwrap_or_else(|e| panic!("Failed to load {}: {}", name, e));
        cf_design::validate_project(&project)
            .unwrap_or_else(|e| panic!("Failed to validate {}: {}", name, e));
        assert!(!project.designs.is_empty(), "{name} defines no designs");
    }
}
