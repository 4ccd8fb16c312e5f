// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Docker Engine API adapter.

use super::{ContainerEngine, ContainerSpec, ContainerStatus, EngineError, ExecOutput, ExecSession};
use async_trait::async_trait;
use bollard::container::{
    Config, CreateContainerOptions, InspectContainerOptions, LogOutput, RemoveContainerOptions,
    StartContainerOptions, StopContainerOptions,
};
use bollard::exec::{CreateExecOptions, ResizeExecOptions, StartExecOptions, StartExecResults};
use bollard::image::CreateImageOptions;
use bollard::models::{
    ContainerInspectResponse, ContainerStateStatusEnum, HostConfig, RestartPolicy,
    RestartPolicyNameEnum,
};
use bollard::{Docker, API_DEFAULT_VERSION};
use futures_util::{StreamExt, TryStreamExt};
use std::collections::HashMap;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio_util::io::StreamReader;

/// Seconds before an engine API call is abandoned.
const API_TIMEOUT_SECS: u64 = 120;

/// Label marking containers created by this gateway.
const MANAGED_LABEL: &str = "vibox.managed";

/// Container engine backed by the Docker Engine API.
#[derive(Clone)]
pub struct DockerEngine {
    docker: Docker,
}

impl DockerEngine {
    /// Connect to the engine at `host`.
    ///
    /// Accepts `unix:///path/to/docker.sock`, `tcp://host:port` and
    /// `http://host:port`. An empty host uses the local defaults
    /// (`DOCKER_HOST` or the platform socket).
    pub fn connect(host: &str) -> Result<Self, EngineError> {
        let docker = match parse_host(host) {
            EngineHost::LocalDefaults => Docker::connect_with_local_defaults(),
            EngineHost::Socket(path) => {
                Docker::connect_with_socket(&path, API_TIMEOUT_SECS, API_DEFAULT_VERSION)
            }
            EngineHost::Http(addr) => {
                Docker::connect_with_http(&addr, API_TIMEOUT_SECS, API_DEFAULT_VERSION)
            }
        }
        .map_err(api_error)?;
        Ok(Self { docker })
    }

    /// Check that the engine answers.
    pub async fn ping(&self) -> Result<(), EngineError> {
        self.docker.ping().await.map_err(api_error)?;
        Ok(())
    }

    async fn ensure_image(&self, image: &str) -> Result<(), EngineError> {
        if self.docker.inspect_image(image).await.is_ok() {
            return Ok(());
        }

        tracing::info!(%image, "pulling image");
        let options = CreateImageOptions {
            from_image: image,
            ..Default::default()
        };
        self.docker
            .create_image(Some(options), None, None)
            .try_collect::<Vec<_>>()
            .await
            .map_err(|e| EngineError::Api(format!("pull {image}: {}", describe(&e))))?;
        tracing::info!(%image, "image pulled");
        Ok(())
    }

    async fn inspect(&self, container_id: &str) -> Result<ContainerInspectResponse, EngineError> {
        self.docker
            .inspect_container(container_id, None::<InspectContainerOptions>)
            .await
            .map_err(|e| engine_error(container_id, e))
    }

    async fn exit_code(&self, exec_id: &str) -> Result<i64, EngineError> {
        let inspect = self.docker.inspect_exec(exec_id).await.map_err(api_error)?;
        Ok(inspect.exit_code.unwrap_or(-1))
    }
}

#[async_trait]
impl ContainerEngine for DockerEngine {
    async fn create_container(&self, spec: &ContainerSpec) -> Result<String, EngineError> {
        self.ensure_image(&spec.image).await?;

        let host_config = HostConfig {
            memory: Some(spec.memory_limit),
            nano_cpus: Some(spec.cpu_limit),
            network_mode: spec.network.clone(),
            restart_policy: Some(RestartPolicy {
                name: Some(RestartPolicyNameEnum::NO),
                ..Default::default()
            }),
            ..Default::default()
        };
        let config = Config {
            image: Some(spec.image.clone()),
            cmd: Some(vec!["/bin/sh".to_string()]),
            tty: Some(true),
            open_stdin: Some(true),
            attach_stdin: Some(true),
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            labels: Some(HashMap::from([(MANAGED_LABEL.to_string(), "true".to_string())])),
            host_config: Some(host_config),
            ..Default::default()
        };
        let options = CreateContainerOptions {
            name: spec.name.clone(),
            platform: None,
        };

        let response = self
            .docker
            .create_container(Some(options), config)
            .await
            .map_err(api_error)?;
        for warning in &response.warnings {
            tracing::warn!(container = %spec.name, %warning, "engine warning on create");
        }
        tracing::info!(container = %spec.name, container_id = %response.id, "container created");
        Ok(response.id)
    }

    async fn start_container(&self, container_id: &str) -> Result<(), EngineError> {
        self.docker
            .start_container(container_id, None::<StartContainerOptions<String>>)
            .await
            .map_err(|e| engine_error(container_id, e))
    }

    async fn stop_container(
        &self,
        container_id: &str,
        timeout: Duration,
    ) -> Result<(), EngineError> {
        let t = i64::try_from(timeout.as_secs()).unwrap_or(i64::MAX);
        self.docker
            .stop_container(container_id, Some(StopContainerOptions { t }))
            .await
            .map_err(|e| engine_error(container_id, e))
    }

    async fn remove_container(&self, container_id: &str) -> Result<(), EngineError> {
        let options = RemoveContainerOptions {
            force: true,
            ..Default::default()
        };
        self.docker
            .remove_container(container_id, Some(options))
            .await
            .map_err(|e| engine_error(container_id, e))
    }

    async fn inspect_status(&self, container_id: &str) -> Result<ContainerStatus, EngineError> {
        let inspect = self.inspect(container_id).await?;
        Ok(map_status(inspect.state.and_then(|s| s.status)))
    }

    async fn container_address(&self, container_id: &str) -> Result<String, EngineError> {
        let inspect = self.inspect(container_id).await?;
        let running = inspect
            .state
            .as_ref()
            .and_then(|s| s.status.as_ref())
            .is_some_and(|s| *s == ContainerStateStatusEnum::RUNNING);
        if !running {
            return Err(EngineError::Api(format!("container {container_id} is not running")));
        }
        pick_address(&inspect)
            .ok_or_else(|| EngineError::Api(format!("container {container_id} has no address")))
    }

    async fn exec_interactive(
        &self,
        container_id: &str,
        cmd: &[String],
    ) -> Result<ExecSession, EngineError> {
        let options = CreateExecOptions {
            cmd: Some(cmd.to_vec()),
            env: Some(vec!["TERM=xterm-256color".to_string()]),
            attach_stdin: Some(true),
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            tty: Some(true),
            ..Default::default()
        };
        let exec = self
            .docker
            .create_exec(container_id, options)
            .await
            .map_err(|e| engine_error(container_id, e))?;

        let start = StartExecOptions {
            detach: false,
            tty: true,
            output_capacity: None,
        };
        match self.docker.start_exec(&exec.id, Some(start)).await.map_err(api_error)? {
            StartExecResults::Attached { output, input } => {
                let bytes = output.map(|chunk| {
                    chunk.map(LogOutput::into_bytes).map_err(std::io::Error::other)
                });
                Ok(ExecSession {
                    exec_id: exec.id,
                    output: Box::pin(StreamReader::new(bytes)),
                    input,
                })
            }
            StartExecResults::Detached => {
                Err(EngineError::Api("exec started detached".to_string()))
            }
        }
    }

    async fn resize_exec(&self, exec_id: &str, cols: u16, rows: u16) -> Result<(), EngineError> {
        let options = ResizeExecOptions {
            width: cols,
            height: rows,
        };
        self.docker.resize_exec(exec_id, options).await.map_err(api_error)
    }

    async fn exec_once(
        &self,
        container_id: &str,
        cmd: &[String],
    ) -> Result<ExecOutput, EngineError> {
        let options = CreateExecOptions {
            cmd: Some(cmd.to_vec()),
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            tty: Some(false),
            ..Default::default()
        };
        let exec = self
            .docker
            .create_exec(container_id, options)
            .await
            .map_err(|e| engine_error(container_id, e))?;

        let mut result = ExecOutput::default();
        if let StartExecResults::Attached { mut output, .. } =
            self.docker.start_exec(&exec.id, None).await.map_err(api_error)?
        {
            while let Some(chunk) = output.next().await {
                collect_output(&mut result, chunk.map_err(api_error)?);
            }
        }
        result.exit_code = self.exit_code(&exec.id).await?;
        Ok(result)
    }

    async fn copy_file(
        &self,
        container_id: &str,
        path: &str,
        content: &[u8],
    ) -> Result<(), EngineError> {
        // The path travels as a positional argument, never through the shell parser.
        let cmd = vec![
            "sh".to_string(),
            "-c".to_string(),
            "cat > \"$1\"".to_string(),
            "vibox-copy".to_string(),
            path.to_string(),
        ];
        let options = CreateExecOptions {
            cmd: Some(cmd),
            attach_stdin: Some(true),
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            tty: Some(false),
            ..Default::default()
        };
        let exec = self
            .docker
            .create_exec(container_id, options)
            .await
            .map_err(|e| engine_error(container_id, e))?;

        let mut result = ExecOutput::default();
        match self.docker.start_exec(&exec.id, None).await.map_err(api_error)? {
            StartExecResults::Attached { mut output, mut input } => {
                input.write_all(content).await?;
                input.shutdown().await?;
                drop(input);
                while let Some(chunk) = output.next().await {
                    collect_output(&mut result, chunk.map_err(api_error)?);
                }
            }
            StartExecResults::Detached => {
                return Err(EngineError::Api("exec started detached".to_string()));
            }
        }

        let code = self.exit_code(&exec.id).await?;
        if code != 0 {
            return Err(EngineError::Api(format!(
                "copy to {path} exited with {code}: {}",
                result.stderr.trim()
            )));
        }
        Ok(())
    }
}

/// Where the engine lives, parsed from a host string.
#[derive(Debug, PartialEq, Eq)]
enum EngineHost {
    LocalDefaults,
    Socket(String),
    Http(String),
}

fn parse_host(host: &str) -> EngineHost {
    let host = host.trim();
    if host.is_empty() {
        return EngineHost::LocalDefaults;
    }
    if let Some(path) = host.strip_prefix("unix://") {
        return EngineHost::Socket(path.to_string());
    }
    if let Some(addr) = host.strip_prefix("tcp://") {
        return EngineHost::Http(format!("http://{addr}"));
    }
    if host.starts_with("http://") {
        return EngineHost::Http(host.to_string());
    }
    EngineHost::Socket(host.to_string())
}

fn map_status(status: Option<ContainerStateStatusEnum>) -> ContainerStatus {
    match status {
        Some(ContainerStateStatusEnum::CREATED) => ContainerStatus::Created,
        Some(ContainerStateStatusEnum::RUNNING) => ContainerStatus::Running,
        Some(ContainerStateStatusEnum::PAUSED) => ContainerStatus::Paused,
        Some(ContainerStateStatusEnum::RESTARTING) => ContainerStatus::Restarting,
        Some(ContainerStateStatusEnum::REMOVING) => ContainerStatus::Removing,
        Some(ContainerStateStatusEnum::EXITED) => ContainerStatus::Exited,
        Some(ContainerStateStatusEnum::DEAD) => ContainerStatus::Dead,
        _ => ContainerStatus::Unknown,
    }
}

/// The default-network address, else the first named network with one.
fn pick_address(inspect: &ContainerInspectResponse) -> Option<String> {
    let settings = inspect.network_settings.as_ref()?;
    if let Some(ip) = settings.ip_address.as_deref().filter(|ip| !ip.is_empty()) {
        return Some(ip.to_string());
    }
    let networks = settings.networks.as_ref()?;
    let mut names: Vec<&String> = networks.keys().collect();
    names.sort();
    names.into_iter().find_map(|name| {
        networks
            .get(name)?
            .ip_address
            .as_deref()
            .filter(|ip| !ip.is_empty())
            .map(str::to_string)
    })
}

fn collect_output(result: &mut ExecOutput, chunk: LogOutput) {
    match chunk {
        LogOutput::StdErr { message } => {
            result.stderr.push_str(&String::from_utf8_lossy(&message));
        }
        LogOutput::StdOut { message } | LogOutput::Console { message } => {
            result.stdout.push_str(&String::from_utf8_lossy(&message));
        }
        LogOutput::StdIn { .. } => {}
    }
}

fn engine_error(container_id: &str, e: bollard::errors::Error) -> EngineError {
    match e {
        bollard::errors::Error::DockerResponseServerError {
            status_code: 404, ..
        } => EngineError::NotFound(container_id.to_string()),
        other => api_error(other),
    }
}

fn api_error(e: bollard::errors::Error) -> EngineError {
    EngineError::Api(describe(&e))
}

fn describe(e: &bollard::errors::Error) -> String {
    match e {
        bollard::errors::Error::DockerResponseServerError { message, .. } => message.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
#[path = "docker_tests.rs"]
mod tests;
