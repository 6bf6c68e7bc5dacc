#![allow(dead_code)]

use std::io::Write;

use env_logger::Builder;

use dslab_transcoding::core::config::SimulationConfig;

/// Enables log output of simulation components, controlled by `RUST_LOG`.
pub fn init_logger() {
    let _ = Builder::from_default_env()
        .format(|buf, record| writeln!(buf, "{}", record.args()))
        .is_test(true)
        .try_init();
}

pub fn assert_float_eq(x: f64, y: f64, eps: f64) {
    assert!(x > y - eps && x < y + eps, "{} != {}", x, y);
}

pub fn name_wrapper(file_name: &str) -> String {
    format!("test-configs/{}", file_name)
}

/// Test config without workload section.
pub fn test_config() -> SimulationConfig {
    init_logger();
    let mut config = SimulationConfig::from_file(&name_wrapper("config.yaml")).unwrap();
    config.workload = None;
    config
}
