// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serial_test::serial;

const VARS: &[&str] = &[
    "PORT",
    "API_TOKEN",
    "DOCKER_HOST",
    "DEFAULT_IMAGE",
    "MEMORY_LIMIT",
    "CPU_LIMIT",
    "DATA_DIR",
    "CONTAINER_NETWORK",
    "LOG_DIR",
    "SHUTDOWN_TIMEOUT_MS",
];

fn clear() {
    for key in VARS {
        std::env::remove_var(key);
    }
}

#[test]
#[serial]
fn defaults_when_unset() {
    clear();

    assert_eq!(port(), 3000);
    assert_eq!(api_token(), None);
    assert_eq!(docker_host(), "unix:///var/run/docker.sock");
    assert_eq!(default_image(), "ubuntu:22.04");
    assert_eq!(memory_limit(), 536_870_912);
    assert_eq!(cpu_limit(), 1_000_000_000);
    assert_eq!(data_dir(), PathBuf::from("./data"));
    assert_eq!(container_network(), None);
    assert_eq!(log_dir(), None);
    assert_eq!(shutdown_timeout(), Duration::from_secs(30));
}

#[test]
#[serial]
fn reads_overrides() {
    clear();
    std::env::set_var("PORT", "8088");
    std::env::set_var("API_TOKEN", "s3cret");
    std::env::set_var("DOCKER_HOST", "tcp://10.0.0.5:2375");
    std::env::set_var("DEFAULT_IMAGE", "debian:12");
    std::env::set_var("MEMORY_LIMIT", "1073741824");
    std::env::set_var("CPU_LIMIT", "2000000000");
    std::env::set_var("DATA_DIR", "/var/lib/vibox");
    std::env::set_var("CONTAINER_NETWORK", "vibox-net");
    std::env::set_var("LOG_DIR", "/var/log/vibox");
    std::env::set_var("SHUTDOWN_TIMEOUT_MS", "1500");

    assert_eq!(port(), 8088);
    assert_eq!(api_token().as_deref(), Some("s3cret"));
    assert_eq!(docker_host(), "tcp://10.0.0.5:2375");
    assert_eq!(default_image(), "debian:12");
    assert_eq!(memory_limit(), 1_073_741_824);
    assert_eq!(cpu_limit(), 2_000_000_000);
    assert_eq!(data_dir(), PathBuf::from("/var/lib/vibox"));
    assert_eq!(container_network().as_deref(), Some("vibox-net"));
    assert_eq!(log_dir(), Some(PathBuf::from("/var/log/vibox")));
    assert_eq!(shutdown_timeout(), Duration::from_millis(1500));

    clear();
}

#[test]
#[serial]
fn invalid_port_falls_back() {
    for value in ["abc", "-1", "70000", "0x50"] {
        clear();
        std::env::set_var("PORT", value);
        assert_eq!(port(), DEFAULT_PORT, "PORT={value}");
    }
    clear();
}

#[test]
#[serial]
fn invalid_limits_fall_back() {
    clear();
    std::env::set_var("MEMORY_LIMIT", "lots");
    std::env::set_var("CPU_LIMIT", "0");
    std::env::set_var("SHUTDOWN_TIMEOUT_MS", "soon");

    assert_eq!(memory_limit(), DEFAULT_MEMORY_LIMIT);
    assert_eq!(cpu_limit(), DEFAULT_CPU_LIMIT);
    assert_eq!(shutdown_timeout(), DEFAULT_SHUTDOWN_TIMEOUT);

    clear();
}

#[test]
#[serial]
fn empty_values_are_unset() {
    clear();
    std::env::set_var("API_TOKEN", "");
    std::env::set_var("DOCKER_HOST", "  ");

    assert_eq!(api_token(), None);
    assert_eq!(docker_host(), DEFAULT_DOCKER_HOST);

    clear();
}
