use std::fs;
use std::path::Path;

use nc_dataset::{AttrValue, Dataset, Error, Format, Mode, OpenOptions, Values};
use serde_json::{Value, json};
use tempfile::TempDir;

fn tempdir() -> TempDir {
    env_logger::try_init().ok();
    tempfile::tempdir().expect("should be able to create temp dir")
}

fn write_node(root: &Path, rel: &str, node: Value) {
    let dir = root.join(rel);
    fs::create_dir_all(&dir).expect("create node dir");
    fs::write(
        dir.join("zarr.json"),
        serde_json::to_vec_pretty(&node).expect("serialize node"),
    )
    .expect("write zarr.json");
}

fn write_group(root: &Path, rel: &str, attributes: Value) {
    write_node(
        root,
        rel,
        json!({
            "zarr_format": 3,
            "node_type": "group",
            "attributes": attributes,
        }),
    );
}

/// Single-chunk, uncompressed, little-endian array.
fn write_array(root: &Path, rel: &str, shape: &[u64], dims: &[&str], data_type: &str) {
    let fill_value = if data_type.starts_with("float") {
        json!(0.0)
    } else {
        json!(0)
    };
    write_node(
        root,
        rel,
        json!({
            "zarr_format": 3,
            "node_type": "array",
            "shape": shape,
            "data_type": data_type,
            "chunk_grid": {"name": "regular", "configuration": {"chunk_shape": shape}},
            "chunk_key_encoding": {"name": "default", "configuration": {"separator": "/"}},
            "fill_value": fill_value,
            "codecs": [{"name": "bytes", "configuration": {"endian": "little"}}],
            "attributes": {"units": "K"},
            "dimension_names": dims,
        }),
    );
}

/// Write the only chunk of a 1-d array.
fn write_chunk(root: &Path, rel: &str, bytes: Vec<u8>) {
    let dir = root.join(rel).join("c");
    fs::create_dir_all(&dir).expect("create chunk dir");
    fs::write(dir.join("0"), bytes).expect("write chunk");
}

/// Root attributes including "T"/"F" flags, dims x=10 and y=20, variables temp and pressure.
fn sample() -> TempDir {
    let dir = tempdir();
    write_group(
        dir.path(),
        "",
        json!({
            "title": "sample",
            "has_ice": "T",
            "has_land": "F",
            "version": 3,
            "scale": 1.5,
            "levels": [1, 2, 3],
        }),
    );
    write_array(dir.path(), "temp", &[10, 20], &["x", "y"], "float64");
    write_array(dir.path(), "pressure", &[10, 20], &["x", "y"], "float32");
    dir
}

#[test]
fn test_booleans_converted() {
    let dir = sample();
    let ds = Dataset::open(dir.path()).expect("open sample");
    assert_eq!(ds.attributes["has_ice"], AttrValue::Bool(true));
    assert_eq!(ds.attributes["has_land"], AttrValue::Bool(false));
    assert_eq!(ds.attributes["title"], AttrValue::from("sample"));
    assert_eq!(ds.attributes["version"], AttrValue::Int(3));
    assert_eq!(ds.attributes["scale"], AttrValue::Float(1.5));
    assert_eq!(ds.attributes["levels"], AttrValue::from(vec![1i64, 2, 3]));
}

#[test]
fn test_booleans_kept_when_disabled() {
    let dir = sample();
    let ds = OpenOptions::new()
        .convert_booleans(false)
        .open(dir.path())
        .expect("open sample");
    assert_eq!(ds.attributes["has_ice"], AttrValue::from("T"));
    assert_eq!(ds.attributes["has_land"], AttrValue::from("F"));
    assert!(!ds.convert_booleans());
}

#[test]
fn test_dimensions() {
    let dir = sample();
    let ds = Dataset::open(dir.path()).expect("open sample");
    assert_eq!(ds.dimensions.list(), vec!["x", "y"]);
    assert_eq!(ds.dimensions["x"], 10);
    assert_eq!(ds.dimensions["y"], 20);

    let mut out = Vec::new();
    ds.dimensions.write_dir(&mut out).unwrap();
    assert_eq!(String::from_utf8(out).unwrap(), "x 10\ny 20\n");
}

#[test]
fn test_no_groups() {
    let dir = sample();
    let ds = Dataset::open(dir.path()).expect("open sample");
    assert!(ds.groups.list().is_empty());
}

#[test]
fn test_variables_are_handles() {
    let dir = sample();
    let ds = Dataset::open(dir.path()).expect("open sample");
    assert_eq!(ds.variables.list(), vec!["pressure", "temp"]);

    let temp = &ds.variables["temp"];
    assert_eq!(temp.name(), "temp");
    assert_eq!(temp.path(), "/temp");
    assert_eq!(temp.shape(), &[10, 20]);
    assert_eq!(temp.size(), 200);
    assert_eq!(temp.dtype(), "float64");
    assert_eq!(
        temp.dimensions(),
        &[Some("x".to_string()), Some("y".to_string())]
    );
    assert_eq!(temp.attributes()["units"], AttrValue::from("K"));
    assert_eq!(temp.to_string(), "<variable temp float64 (x: 10, y: 20)>");
    assert_eq!(ds.variables["pressure"].dtype(), "float32");
}

#[test]
fn test_unwritten_chunks_read_as_fill() {
    let dir = sample();
    let ds = Dataset::open(dir.path()).expect("open sample");
    let data = ds.variables["temp"].read().expect("read temp");
    assert_eq!(data.shape, vec![10, 20]);
    assert_eq!(data.values, Values::Float(vec![0.0; 200]));
}

#[test]
fn test_read_values() {
    let dir = tempdir();
    write_group(dir.path(), "", json!({}));
    write_array(dir.path(), "time", &[4], &["time"], "float64");
    write_chunk(
        dir.path(),
        "time",
        [0.0f64, 0.5, 1.0, 1.5]
            .iter()
            .flat_map(|v| v.to_le_bytes())
            .collect(),
    );
    write_array(dir.path(), "count", &[4], &["time"], "int32");
    write_chunk(
        dir.path(),
        "count",
        [3i32, -1, 4, 1]
            .iter()
            .flat_map(|v| v.to_le_bytes())
            .collect(),
    );

    let ds = Dataset::open(dir.path()).expect("open");
    assert_eq!(ds.dimensions["time"], 4);

    let time = ds.variables["time"].read().expect("read time");
    assert_eq!(time.values, Values::Float(vec![0.0, 0.5, 1.0, 1.5]));

    let count = ds.variables["count"].read().expect("read count");
    assert_eq!(count.shape, vec![4]);
    assert_eq!(count.values, Values::Int(vec![3, -1, 4, 1]));
    assert_eq!(count.to_f64(), vec![3.0, -1.0, 4.0, 1.0]);
}

#[test]
fn test_open_close_lifecycle() {
    let dir = sample();
    let mut ds = Dataset::open(dir.path()).expect("open sample");
    assert!(ds.is_open());
    assert!(ds.time_closed().is_none());
    assert_eq!(ds.mode(), Mode::Read);
    assert_eq!(ds.format(), Format::Netcdf4);
    assert!(ds.clobber());
    assert!(!ds.diskless());
    assert!(!ds.persist());
    assert_eq!(ds.path(), dir.path());

    ds.close().expect("close");
    assert!(!ds.is_open());
    let closed = ds.time_closed().expect("close time should be set");
    assert!(closed >= ds.time_opened());
}

#[test]
fn test_close_twice_fails() {
    let dir = sample();
    let mut ds = Dataset::open(dir.path()).expect("open sample");
    ds.close().expect("first close");
    assert!(matches!(ds.close(), Err(Error::Closed)));
    assert!(!ds.is_open());
}

#[test]
fn test_handles_fail_after_close() {
    let dir = sample();
    let mut ds = Dataset::open(dir.path()).expect("open sample");
    let temp = ds.variables["temp"].clone();
    ds.close().expect("close");
    assert!(matches!(temp.read(), Err(Error::Closed)));
    // metadata copied at open time is still there
    assert_eq!(temp.shape(), &[10, 20]);
    assert_eq!(ds.dimensions["x"], 10);
}

#[test]
fn test_handles_fail_after_drop() {
    let dir = sample();
    let ds = Dataset::open(dir.path()).expect("open sample");
    let temp = ds.variables["temp"].clone();
    drop(ds);
    assert!(matches!(temp.read(), Err(Error::Closed)));
}

#[test]
fn test_nonexistent_path() {
    let dir = tempdir();
    let result = Dataset::open(dir.path().join("missing.nc"));
    assert!(matches!(result, Err(Error::Open { .. })));
}

#[test]
fn test_directory_without_metadata() {
    let dir = tempdir();
    let result = Dataset::open(dir.path());
    assert!(matches!(result, Err(Error::Open { .. })));
}

#[test]
fn test_nested_groups() {
    let dir = sample();
    write_group(
        dir.path(),
        "forecast",
        json!({"model": "gfs", "ensemble": "T"}),
    );
    write_array(dir.path(), "forecast/surface_temp", &[3], &["lat"], "float32");
    write_group(dir.path(), "forecast/hourly", json!({}));

    let ds = Dataset::open(dir.path()).expect("open sample");
    assert_eq!(ds.groups.list(), vec!["forecast"]);
    // groups do not add root dimensions
    assert_eq!(ds.dimensions.list(), vec!["x", "y"]);

    let handle = &ds.groups["forecast"];
    assert_eq!(handle.name(), "forecast");
    assert_eq!(handle.path(), "/forecast");
    assert_eq!(handle.to_string(), "<group /forecast>");

    let forecast = handle.load().expect("load group");
    assert_eq!(forecast.path(), "/forecast");
    assert_eq!(forecast.attributes["model"], AttrValue::from("gfs"));
    assert_eq!(forecast.attributes["ensemble"], AttrValue::Bool(true));
    assert_eq!(forecast.dimensions["lat"], 3);
    assert_eq!(forecast.variables.list(), vec!["surface_temp"]);
    assert_eq!(forecast.variables["surface_temp"].path(), "/forecast/surface_temp");
    assert_eq!(forecast.groups.list(), vec!["hourly"]);

    let hourly = ds.group("/forecast/hourly").expect("load by path");
    assert!(hourly.attributes.is_empty());
    assert!(hourly.variables.is_empty());
}

#[test]
fn test_conflicting_dimensions() {
    let dir = sample();
    write_array(dir.path(), "bad", &[11], &["x"], "float64");
    let result = Dataset::open(dir.path());
    assert!(matches!(result, Err(Error::General(_))));
}

#[test]
fn test_create_hierarchy() {
    let dir = tempdir();
    let path = dir.path().join("new.zarr");
    let mut opts = OpenOptions::new();
    opts.mode(Mode::Write).format(Format::Zarr);

    let mut ds = opts.open(&path).expect("create");
    assert!(ds.attributes.is_empty());
    assert!(ds.dimensions.is_empty());
    assert!(ds.groups.is_empty());
    assert!(ds.variables.is_empty());
    ds.close().expect("close");

    let reopened = Dataset::open(&path).expect("reopen");
    assert!(reopened.variables.is_empty());
    drop(reopened);

    opts.clobber(false);
    assert!(matches!(opts.open(&path), Err(Error::Open { .. })));

    opts.clobber(true);
    opts.open(&path).expect("clobber existing");
}

#[test]
fn test_diskless_zarr_rejected() {
    let dir = sample();
    let result = OpenOptions::new().diskless(true).open(dir.path());
    assert!(matches!(result, Err(Error::Open { .. })));
}

#[test]
fn test_options_from_json() {
    let dir = sample();
    let opts = OpenOptions::from_json(r#"{"convert_booleans": false}"#).expect("parse options");
    let ds = opts.open(dir.path()).expect("open sample");
    assert_eq!(ds.attributes["has_ice"], AttrValue::from("T"));
}

#[test]
fn test_containers_serialize() {
    let dir = sample();
    let ds = Dataset::open(dir.path()).expect("open sample");
    let value = serde_json::to_value(&ds.attributes).expect("serialize");
    assert_eq!(value["has_ice"], json!(true));
    assert_eq!(value["levels"], json!([1, 2, 3]));
    assert_eq!(
        serde_json::to_value(&ds.dimensions).unwrap(),
        json!({"x": 10, "y": 20})
    );
}
