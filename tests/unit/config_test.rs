//! Tests for configuration parsing and validation

use adaptive_scheduler::config::SchedulerConfig;
use std::time::Duration;

#[test]
fn test_json_partial_config_uses_defaults() {
    let cfg = SchedulerConfig::from_json_str(r#"{"min_workers": 1, "max_workers": 6}"#).unwrap();
    assert_eq!(cfg.min_workers, 1);
    assert_eq!(cfg.max_workers, 6);
    assert_eq!(cfg.scale_step, 2);
    assert!((cfg.upper_threshold - 0.8).abs() < f64::EPSILON);
    assert!((cfg.lower_threshold - 0.3).abs() < f64::EPSILON);
    assert_eq!(cfg.idle_grace(), Duration::from_secs(30));
    assert_eq!(cfg.scale_interval(), Duration::from_secs(10));
    assert_eq!(cfg.max_backlog, None);
    assert_eq!(cfg.worker_name_prefix, "sched-worker");
}

#[test]
fn test_json_full_config() {
    let cfg = SchedulerConfig::from_json_str(
        r#"{
            "min_workers": 0,
            "max_workers": 16,
            "scale_step": 4,
            "upper_threshold": 0.9,
            "lower_threshold": 0.1,
            "idle_grace_ms": 1000,
            "scale_interval_ms": 500,
            "default_task_timeout_ms": 2500,
            "max_backlog": 256,
            "thread_stack_size": 1048576,
            "worker_name_prefix": "optimizer"
        }"#,
    )
    .unwrap();
    assert_eq!(cfg.min_workers, 0);
    assert_eq!(cfg.default_task_timeout(), Duration::from_millis(2500));
    assert_eq!(cfg.max_backlog, Some(256));
    assert_eq!(cfg.thread_stack_size, 1 << 20);
}

#[test]
fn test_json_rejects_invalid_values() {
    let err = SchedulerConfig::from_json_str(r#"{"min_workers": 5, "max_workers": 2}"#).unwrap_err();
    assert!(err.contains("min_workers"));

    let err = SchedulerConfig::from_json_str(r#"{"max_workers": 0}"#).unwrap_err();
    assert!(err.contains("max_workers"));

    assert!(SchedulerConfig::from_json_str("not json").unwrap_err().contains("parse error"));
}

#[test]
fn test_validation_rules() {
    let base = SchedulerConfig::new().with_min_workers(1).with_max_workers(4);
    assert!(base.clone().validate().is_ok());
    assert!(base.clone().with_scale_step(0).validate().is_err());
    assert!(base.clone().with_thresholds(0.8, 0.3).validate().is_err());
    assert!(base.clone().with_thresholds(0.5, 0.5).validate().is_err());
    assert!(base.clone().with_thresholds(0.1, 1.5).validate().is_err());
    assert!(base.clone().with_scale_interval(Duration::ZERO).validate().is_err());
    assert!(base.clone().with_default_task_timeout(Duration::ZERO).validate().is_err());
    assert!(base.clone().with_max_backlog(0).validate().is_err());
    assert!(base.with_thread_stack_size(0).validate().is_err());
}

#[test]
fn test_serialize_round_trip_through_json() {
    let cfg = SchedulerConfig::new()
        .with_min_workers(3)
        .with_max_workers(9)
        .with_worker_name_prefix("batch");
    let json = serde_json::to_string(&cfg).unwrap();
    assert_eq!(SchedulerConfig::from_json_str(&json).unwrap(), cfg);
}
