//! CLI command tests
//!
//! This module contains all tests for the CLI commands.

use std::path::PathBuf;

use adoptima_core::models::Channel;
use adoptima_core::{load_csv, AppConfig, OptimizerSettings};
use tempfile::TempDir;

use crate::commands::{self, format_money, parse_allocation, OptimizeArgs};

fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.forest.trees = 10;
    config.optimizer = OptimizerSettings {
        samples: 100,
        ..Default::default()
    };
    config
}

/// Write the default dataset into a temp dir, returning (dir, csv path)
fn setup_dataset() -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("data.csv");
    commands::cmd_generate(&test_config(), Some(24), Some(42), Some(&path)).unwrap();
    (dir, path)
}

fn optimize_args<'a>(data: &'a PathBuf, model: &'a str) -> OptimizeArgs<'a> {
    OptimizeArgs {
        budget: 100_000.0,
        data: Some(data.as_path()),
        model,
        scenario: "normal",
        current: None,
        min: None,
        max: None,
        load_model: None,
        json: false,
    }
}

// ========== Allocation Parsing Tests ==========

#[test]
fn test_parse_allocation() {
    let allocation = parse_allocation("social=15000, search=25000,email=8000,promo=$12_000").unwrap();
    assert_eq!(allocation.len(), 4);
    assert_eq!(allocation[&Channel::SocialMedia], 15_000.0);
    assert_eq!(allocation[&Channel::Promotions], 12_000.0);
}

#[test]
fn test_parse_allocation_errors() {
    assert!(parse_allocation("").is_err());
    assert!(parse_allocation("social").is_err());
    assert!(parse_allocation("tv=100").is_err());
    assert!(parse_allocation("email=abc").is_err());
    assert!(parse_allocation("email=-5").is_err());
    assert!(parse_allocation("email=5,email=6").is_err());
}

#[test]
fn test_format_money() {
    assert_eq!(format_money(0.0), "$0");
    assert_eq!(format_money(999.4), "$999");
    assert_eq!(format_money(1_234_567.8), "$1,234,568");
    assert_eq!(format_money(-25_000.0), "-$25,000");
}

#[test]
fn test_parse_model_and_scenario() {
    assert!(commands::parse_model("forest").is_ok());
    assert!(commands::parse_model("svm").is_err());
    assert!(commands::parse_scenario("holiday").is_ok());
    assert!(commands::parse_scenario("boom").is_err());
}

// ========== Data Command Tests ==========

#[test]
fn test_cmd_generate_writes_csv() {
    let (_dir, path) = setup_dataset();
    let dataset = load_csv(&path).unwrap();
    assert_eq!(dataset.len(), 24);
    assert_eq!(dataset.channels().len(), 4);
}

#[test]
fn test_cmd_summary() {
    let (_dir, path) = setup_dataset();
    assert!(commands::cmd_summary(&test_config(), Some(&path)).is_ok());
}

#[test]
fn test_cmd_summary_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope.csv");
    assert!(commands::cmd_summary(&test_config(), Some(&missing)).is_err());
}

// ========== Model Command Tests ==========

#[test]
fn test_cmd_train_and_save() {
    let (dir, path) = setup_dataset();
    let model_path = dir.path().join("forest.json");

    commands::cmd_train(&test_config(), Some(&path), "forest", Some(&model_path)).unwrap();
    assert!(model_path.exists());
}

#[test]
fn test_cmd_train_unknown_model() {
    let (_dir, path) = setup_dataset();
    assert!(commands::cmd_train(&test_config(), Some(&path), "svm", None).is_err());
}

#[test]
fn test_cmd_predict() {
    let (_dir, path) = setup_dataset();
    let result = commands::cmd_predict(
        &test_config(),
        Some(&path),
        "linear",
        "holiday",
        "social=15000,search=25000,email=8000,promotions=12000",
    );
    assert!(result.is_ok());
}

// ========== Plan Command Tests ==========

#[test]
fn test_cmd_optimize_both_models() {
    let (_dir, path) = setup_dataset();
    for model in ["linear", "forest"] {
        let args = optimize_args(&path, model);
        assert!(commands::cmd_optimize(&test_config(), &args).is_ok());
    }
}

#[test]
fn test_cmd_optimize_with_bounds_and_json() {
    let (_dir, path) = setup_dataset();
    let args = OptimizeArgs {
        min: Some("email=5000"),
        max: Some("search=40000"),
        current: Some("social=20000,search=30000,email=10000,promotions=20000"),
        json: true,
        ..optimize_args(&path, "linear")
    };
    assert!(commands::cmd_optimize(&test_config(), &args).is_ok());
}

#[test]
fn test_cmd_optimize_infeasible() {
    let (_dir, path) = setup_dataset();
    let args = OptimizeArgs {
        budget: 1_000.0,
        min: Some("email=5000"),
        ..optimize_args(&path, "linear")
    };
    assert!(commands::cmd_optimize(&test_config(), &args).is_err());
}

#[test]
fn test_cmd_optimize_with_saved_model() {
    let (dir, path) = setup_dataset();
    let model_path = dir.path().join("linear.json");
    commands::cmd_train(&test_config(), Some(&path), "linear", Some(&model_path)).unwrap();

    let args = OptimizeArgs {
        load_model: Some(model_path.as_path()),
        ..optimize_args(&path, "linear")
    };
    assert!(commands::cmd_optimize(&test_config(), &args).is_ok());

    // The saved model is linear, so asking for a forest fails
    let mismatched = OptimizeArgs {
        load_model: Some(model_path.as_path()),
        ..optimize_args(&path, "forest")
    };
    assert!(commands::cmd_optimize(&test_config(), &mismatched).is_err());
}

#[test]
fn test_cmd_scenarios() {
    let (_dir, path) = setup_dataset();
    assert!(commands::cmd_scenarios(&test_config(), Some(&path), "linear", 100_000.0).is_ok());
}
