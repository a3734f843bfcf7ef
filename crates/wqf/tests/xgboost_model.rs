//! Loading XGBoost JSON models from disk and forecasting with them.

use std::fs;
use std::path::Path;

use approx::assert_abs_diff_eq;
use ndarray::Array2;
use serde_json::{json, Value};

use wqf::model::xgboost::load_model;
use wqf::model::{ModelError, ModelLoader};
use wqf::testing::{cube, forecast_chl_no3, stump_tree_json, xgb_model_json};
use wqf::{
    FileModelLoader, Forecast, ForecastParams, ModelRegistry, ModelSpec, Parallelism,
    PointPredictor,
};

/// `0.5 + (chl < 1 ? -0.25 : 0.75) + (no3 < 0.3 ? 0.1 : 1.0)`
fn model_json() -> Value {
    xgb_model_json(
        &["chl", "t-1_chl", "no3"],
        "reg:squarederror",
        0.5,
        vec![stump_tree_json(0, 1.0, -0.25, 0.75), stump_tree_json(2, 0.3, 0.1, 1.0)],
    )
}

fn write(dir: &Path, name: &str, value: &Value) {
    fs::write(dir.join(name), serde_json::to_string_pretty(value).unwrap()).unwrap();
}

#[test]
fn loaded_model_predicts_table_rows() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "model.json", &model_json());

    let model = load_model(dir.path().join("model.json")).unwrap();
    assert_eq!(model.feature_names(), &["chl", "t-1_chl", "no3"]);

    let table = Array2::from_shape_vec(
        (4, 3),
        vec![
            0.5, 9.0, 0.1, //
            2.0, 9.0, 0.1, //
            2.0, 9.0, 0.9, //
            f32::NAN, 9.0, f32::NAN,
        ],
    )
    .unwrap();
    for parallelism in [Parallelism::Sequential, Parallelism::Parallel] {
        let y = model.predict(table.view(), parallelism);
        assert_abs_diff_eq!(y[0], 0.35, epsilon = 1e-6);
        assert_abs_diff_eq!(y[1], 1.35, epsilon = 1e-6);
        assert_abs_diff_eq!(y[2], 2.25, epsilon = 1e-6);
        // missing values go left
        assert_abs_diff_eq!(y[3], 0.35, epsilon = 1e-6);
    }
}

#[test]
fn model_without_feature_names_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let mut doc = model_json();
    doc["learner"]["feature_names"] = json!([]);
    write(dir.path(), "anon.json", &doc);

    let err = load_model(dir.path().join("anon.json")).unwrap_err();
    assert!(matches!(err, ModelError::MissingFeatureNames(_)));
}

#[test]
fn unreadable_and_malformed_files_are_reported() {
    let dir = tempfile::tempdir().unwrap();
    let err = load_model(dir.path().join("absent.json")).unwrap_err();
    assert!(matches!(err, ModelError::Io { .. }));

    fs::write(dir.path().join("broken.json"), "{ not json").unwrap();
    let err = load_model(dir.path().join("broken.json")).unwrap_err();
    assert!(matches!(err, ModelError::Json { .. }));
}

#[test]
fn registry_resolves_relative_to_document() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir(dir.path().join("models")).unwrap();
    write(&dir.path().join("models"), "central.json", &model_json());
    write(
        dir.path(),
        "registry.json",
        &json!({"models": {"default": "models/central.json", "coastal": "models/coastal.json"}}),
    );

    let registry = ModelRegistry::from_file(dir.path().join("registry.json")).unwrap();
    assert_eq!(registry.len(), 2);
    assert_eq!(registry.default_name(), Some("default"));
    assert_eq!(registry.to_string(), "{coastal, default}");
    assert_eq!(
        registry.file("default").unwrap(),
        dir.path().join("models").join("central.json")
    );
    assert!(registry.model("default").is_ok());
    // registered, but the file does not exist
    assert!(matches!(registry.model("coastal"), Err(ModelError::Io { .. })));
}

#[test]
fn loader_prefers_registry_then_paths() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "central.json", &model_json());
    let registry = ModelRegistry::from_entries([("central", dir.path().join("central.json"))]);
    let loader = FileModelLoader::new(registry);

    assert!(loader.load(&ModelSpec::new("central")).is_ok());
    assert!(loader.load(&ModelSpec::try_from(dir.path().join("central.json")).unwrap()).is_ok());
    match loader.load(&ModelSpec::new("elsewhere")) {
        Err(ModelError::UnknownModel { spec, known }) => {
            assert_eq!(spec, "elsewhere");
            assert_eq!(known, "{central}");
        }
        other => panic!("unexpected result {other:?}"),
    }
}

#[test]
fn forecast_rehydrates_from_params() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "central.json", &model_json());
    let loader = FileModelLoader::new(ModelRegistry::from_entries([(
        "central",
        dir.path().join("central.json"),
    )]));

    let params = ForecastParams::new("central", 2).with_n_threads(2);
    let f = Forecast::from_params(params.clone(), &loader).unwrap();
    assert_eq!(f.history(), 1);

    let json = serde_json::to_value(&f).unwrap();
    assert_eq!(json, json!({"model": "central", "horizon": 2, "n_threads": 2, "test": false}));
    let restored: ForecastParams = serde_json::from_value(json).unwrap();
    assert_eq!(restored, params);

    let chl = cube(3, 2, 2, |t, _, _| [0.5, 2.0, 0.2][t]);
    let no3 = cube(3, 2, 2, |_, _, _| 0.1);
    let y = forecast_chl_no3(&f, &chl, &no3).unwrap();
    // day 1 reads chl = 2.0, day 2 reads chl = 0.2
    assert!(y.index_axis(ndarray::Axis(0), 0).iter().all(|&v| (v - 1.35).abs() < 1e-6));
    assert!(y.index_axis(ndarray::Axis(0), 1).iter().all(|&v| (v - 0.35).abs() < 1e-6));
}
