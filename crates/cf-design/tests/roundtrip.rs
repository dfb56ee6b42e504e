use cf_design::reference::reference_project;
use cf_design::schema::*;
use cf_design::{load_yaml, save_yaml, validate_project};

#[test]
fn roundtrip_yaml_empty_project() {
    let project = CellProject::new("Empty Project");

    validate_project(&project).unwrap();

    let temp_dir = std::env::temp_dir();
    let path = temp_dir.join("cf_design_roundtrip_empty.yaml");

    save_yaml(&path, &project).unwrap();
    let loaded = load_yaml(&path).unwrap();

    assert_eq!(project, loaded);
}

#[test]
fn roundtrip_yaml_reference_project() {
    let project = reference_project();

    validate_project(&project).unwrap();

    let temp_dir = std::env::temp_dir();
    let path = temp_dir.join("cf_design_roundtrip_reference.yaml");

    save_yaml(&path, &project).unwrap();
    let loaded = load_yaml(&path).unwrap();

    assert_eq!(project, loaded);
}

#[test]
fn roundtrip_json_reference_project() {
    let project = reference_project();

    let temp_dir = std::env::temp_dir();
    let path = temp_dir.join("cf_design_roundtrip_reference.json");

    cf_design::save_json(&path, &project).unwrap();
    let loaded = cf_design::load_json(&path).unwrap();

    assert_eq!(project, loaded);
}

#[test]
fn save_rejects_invalid_project() {
    let mut project = reference_project();
    project.runs[0].protocol_id = "nowhere".to_string();

    let temp_dir = std::env::temp_dir();
    let path = temp_dir.join("cf_design_invalid.yaml");

    let result = save_yaml(&path, &project);
    assert!(result.is_err());
}
