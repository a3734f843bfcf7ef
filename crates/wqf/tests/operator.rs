//! End-to-end runs of the forecast operator on synthetic datasets.

use std::sync::Arc;

use approx::assert_abs_diff_eq;
use ndarray::{Array3, Ix1, Ix3};
use rstest::rstest;

use wqf::block::BlockError;
use wqf::data::{ArrayData, Dataset, DatasetBuilder};
use wqf::model::ModelError;
use wqf::testing::{
    cube, forecast_chl_no3, synthetic_dataset, ClosureLoader, ClosureModel,
};
use wqf::{
    ChunkSize, Error, FileModelLoader, Forecast, ForecastConfig, ForecastOp, ForecastParams,
    Gaussian, Mode, ModelRegistry, Operator,
};

fn model() -> ClosureModel {
    ClosureModel::new(&["chl", "t-1_chl", "no3"], |row| 0.6 * row[0] + 0.3 * row[1] + row[2])
}

fn source() -> (Array3<f32>, Array3<f32>, Dataset) {
    let chl = cube(5, 4, 6, |t, i, j| 0.5 + ((t * 5 + i * 6 + j) % 7) as f32 * 0.25);
    let no3 = cube(5, 4, 6, |t, i, j| {
        if t == 4 && i == 0 && j == 0 {
            f32::NAN
        } else {
            0.2
        }
    });
    let ds = synthetic_dataset(chl.clone(), no3.clone(), [2, 2, 3]).unwrap();
    (chl, no3, ds)
}

fn run(config: ForecastConfig, ds: &Dataset) -> Result<Dataset, Error> {
    ForecastOp::new(config, Arc::new(ClosureLoader::new(model()))).run(ds)
}

fn chl_of(ds: &Dataset) -> Array3<f32> {
    let data = ds.variable("chl").unwrap().data().data().to_f32();
    data.into_dimensionality::<Ix3>().unwrap()
}

fn time_of(ds: &Dataset) -> Vec<i64> {
    match ds.variable("time").unwrap().data().data() {
        ArrayData::Int64(a) => a.clone().into_dimensionality::<Ix1>().unwrap().to_vec(),
        other => panic!("unexpected time dtype {}", other.dtype()),
    }
}

fn assert_same(a: &Array3<f32>, b: &Array3<f32>) {
    assert_eq!(a.dim(), b.dim());
    for (x, y) in a.iter().zip(b.iter()) {
        if y.is_nan() {
            assert!(x.is_nan());
        } else {
            assert_abs_diff_eq!(*x, *y, epsilon = 1e-6);
        }
    }
}

#[rstest]
#[case::synchronous(Mode::Synchronous, 1)]
#[case::multithreading(Mode::Multithreading, 3)]
fn forecast_dataset_layout(#[case] mode: Mode, #[case] n_workers: usize) {
    let (chl, no3, ds) = source();
    let config = ForecastConfig::builder()
        .model("central")
        .horizon(2)
        .mode(mode)
        .n_workers(n_workers)
        .build()
        .unwrap();
    let out = run(config, &ds).unwrap();

    assert_eq!(out.dim_size("time"), Some(2));
    assert_eq!(out.dim_size("lat"), Some(4));
    assert_eq!(out.dim_size("lon"), Some(6));
    assert_eq!(time_of(&out), vec![3, 4]);
    assert_eq!(out.variable("lat").unwrap().data(), ds.variable("lat").unwrap().data());
    assert_eq!(out.data_vars().map(|(name, _)| name).collect::<Vec<_>>(), vec!["chl"]);

    // source chunking kept along lat/lon, one forecast block along time
    assert_eq!(out.variable("chl").unwrap().data().chunk_shape(), vec![2, 2, 3]);

    let f = Forecast::new(ForecastParams::new("central", 2), Arc::new(model())).unwrap();
    let expected = forecast_chl_no3(&f, &chl, &no3).unwrap();
    let got = chl_of(&out);
    assert_same(&got, &expected);
    assert!(got[[1, 0, 0]].is_nan());
}

#[test]
fn configuration_becomes_attributes() {
    let (_, _, ds) = source();
    let config = ForecastConfig::builder()
        .model("central")
        .chunk_size_lat(ChunkSize::Full)
        .build()
        .unwrap();
    let out = run(config.clone(), &ds).unwrap();

    for (name, value) in config.to_attrs() {
        assert_eq!(out.attr(name), Some(value.as_str()));
    }
    assert_eq!(out.attr("gaussian_filter"), Some("none"));
    assert_eq!(out.attr("chunk_size_lat"), Some("full"));
    assert_eq!(out.variable("chl").unwrap().data().chunk_shape(), vec![1, 4, 3]);
}

#[test]
fn test_mode_replays_history() {
    let (chl, no3, ds) = source();
    let config = ForecastConfig::builder()
        .model("central")
        .horizon(2)
        .test(true)
        .chunk_size_lon(ChunkSize::Fixed(4))
        .build()
        .unwrap();
    let out = run(config, &ds).unwrap();

    assert_eq!(time_of(&out), vec![2, 3, 4]);
    let params = ForecastParams::new("central", 2).with_test(true);
    let f = Forecast::new(params, Arc::new(model())).unwrap();
    let expected = forecast_chl_no3(&f, &chl, &no3).unwrap();
    assert_same(&chl_of(&out), &expected);
}

#[test]
fn smoothing_filter_is_applied_after_forecast() {
    let (chl, no3, ds) = source();
    let config = ForecastConfig::builder()
        .model("central")
        .horizon(1)
        .gaussian_filter(1.5)
        .mode(Mode::Synchronous)
        .build()
        .unwrap();
    let out = run(config, &ds).unwrap();

    let f = Forecast::new(ForecastParams::new("central", 1), Arc::new(model())).unwrap();
    let forecast = forecast_chl_no3(&f, &chl, &no3).unwrap();
    let expected = Gaussian::from_fwhm(1.5).filter(forecast.view());
    let got = chl_of(&out);
    for (x, y) in got.iter().zip(expected.iter()) {
        if y.is_nan() {
            assert!(x.is_nan());
        } else {
            assert_abs_diff_eq!(*x, *y, epsilon = 1e-4);
        }
    }
    assert_eq!(out.attr("gaussian_filter"), Some("1.5"));
}

#[test]
fn missing_coordinate_is_reported() {
    let (chl, _, _) = source();
    let mut builder = DatasetBuilder::new();
    builder
        .declare_dimension("time", 5)
        .unwrap()
        .declare_dimension("lat", 4)
        .unwrap()
        .declare_dimension("lon", 6)
        .unwrap();
    builder
        .declare_variable("chl", &["time", "lat", "lon"])
        .unwrap()
        .declare_variable("no3", &["time", "lat", "lon"])
        .unwrap();
    builder
        .bind_array("chl", wqf::ChunkedArray::single_chunk(chl.into_dyn()))
        .unwrap();
    builder
        .bind_constant("no3", 0.1, wqf::DType::Float32)
        .unwrap();

    let config = ForecastConfig::builder().model("central").build().unwrap();
    let err = run(config, &builder.build()).unwrap_err();
    assert!(matches!(err, Error::MissingVariable(ref v) if v == "time"));
}

#[test]
fn missing_feature_aborts_the_run() {
    let (_, _, ds) = source();
    let loader = ClosureLoader::new(ClosureModel::new(&["chl", "sst"], |row| row[0] + row[1]));
    let config = ForecastConfig::builder()
        .model("central")
        .mode(Mode::Synchronous)
        .build()
        .unwrap();
    let err = ForecastOp::new(config, Arc::new(loader))
        .run(&ds)
        .unwrap_err();
    match err {
        Error::Block(BlockError::Algorithm { source, .. }) => {
            assert_eq!(source.to_string(), "missing input feature 'sst'");
        }
        other => panic!("unexpected error {other}"),
    }
}

#[test]
fn unknown_model_fails_before_processing() {
    let (_, _, ds) = source();
    let registry = ModelRegistry::from_entries([("central", "/nonexistent/central.json")]);
    let loader = FileModelLoader::new(registry);
    let config = ForecastConfig::builder().model("coastal").build().unwrap();
    let err = ForecastOp::new(config, Arc::new(loader))
        .run(&ds)
        .unwrap_err();
    assert!(matches!(err, Error::Model(ModelError::UnknownModel { .. })));
}

#[test]
fn depth_profiles_are_not_features() {
    let (chl, no3, ds) = source();
    let mut builder = DatasetBuilder::new();
    builder
        .declare_dimension_chunked("time", 5, 2)
        .unwrap()
        .declare_dimension_chunked("depth", 2, 1)
        .unwrap()
        .declare_dimension_chunked("lat", 4, 2)
        .unwrap()
        .declare_dimension_chunked("lon", 6, 3)
        .unwrap();
    for vid in ["time", "lat", "lon", "chl", "no3"] {
        let dims = ds.variable(vid).unwrap().dims().to_vec();
        let dims: Vec<&str> = dims.iter().map(String::as_str).collect();
        builder.declare_variable(vid, &dims).unwrap();
        builder.add_dataset_array(vid, vid, &ds).unwrap();
    }
    builder
        .declare_variable("thetao", &["time", "depth", "lat", "lon"])
        .unwrap()
        .bind_constant("thetao", 12.0, wqf::DType::Float32)
        .unwrap();

    let config = ForecastConfig::builder()
        .model("central")
        .mode(Mode::Synchronous)
        .verbosity(wqf::Verbosity::Warning)
        .build()
        .unwrap();
    let out = run(config, &builder.build()).unwrap();
    assert_eq!(out.dim_size("depth"), None);

    let f = Forecast::new(ForecastParams::new("central", 1), Arc::new(model())).unwrap();
    let expected = forecast_chl_no3(&f, &chl, &no3).unwrap();
    assert_same(&chl_of(&out), &expected);
}

#[test]
fn oversized_fixed_chunks_span_the_axis() {
    let (_, _, ds) = source();
    let config = ForecastConfig::builder()
        .model("central")
        .chunk_size_lat(ChunkSize::Fixed(100))
        .chunk_size_lon(ChunkSize::Fixed(4))
        .verbosity(wqf::Verbosity::Warning)
        .build()
        .unwrap();
    let out = run(config, &ds).unwrap();
    assert_eq!(out.variable("chl").unwrap().data().chunk_shape(), vec![1, 4, 4]);
}
