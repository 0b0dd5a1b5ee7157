use zen2::input::load_model;
use zen2::technology::TechnologyCategory;
use std::path::{Path, PathBuf};

/// Get the path to an example model.
fn get_model_dir(name: &str) -> PathBuf {
    Path::new(file!())
        .parent()
        .unwrap()
        .parent()
        .unwrap()
        .join("demos")
        .join(name)
}

/// An integration test which attempts to load the example models
#[test]
fn test_load_model() {
    let model = load_model(get_model_dir("simple")).unwrap();
    assert_eq!(model.dataset, "simple");
    assert_eq!(model.nodes.len(), 1);
    assert_eq!(model.technologies.len(), 2);
    assert_eq!(model.existing_capacities.len(), 1);

    let model = load_model(get_model_dir("network")).unwrap();
    assert_eq!(model.edges.len(), 6);
    assert_eq!(
        model.technologies["power_line"].category,
        TechnologyCategory::Transport
    );
    assert_eq!(model.parameters.scenarios.len(), 1);
}
