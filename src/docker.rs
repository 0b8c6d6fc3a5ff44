use crate::model::{
    ActionMap, Container, EngineInfo, Image, Listing, NODE_AVAILABILITIES, Network, ResourceKind,
    SwarmNode, SwarmService, Volume,
};
use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command as TokioCommand;
use tracing::debug;

const JSON_FORMAT: &str = "{{json .}}";
const STOP_GRACE_SECS: &str = "10";

#[derive(Debug, Clone)]
pub struct DockerCli {
    binary: String,
    host: Option<String>,
}

impl DockerCli {
    pub fn new(host: Option<String>) -> Self {
        Self {
            binary: "docker".to_string(),
            host: host.filter(|host| !host.trim().is_empty()),
        }
    }

    fn command(&self, args: &[String]) -> TokioCommand {
        let mut cmd = TokioCommand::new(&self.binary);
        if let Some(host) = &self.host {
            cmd.arg("-H").arg(host);
        }
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    async fn output(&self, args: &[String]) -> Result<std::process::Output> {
        debug!(args = ?args, "running docker");
        self.command(args)
            .output()
            .await
            .with_context(|| format!("failed to execute {} {}", self.binary, display_args(args)))
    }

    /// Runs docker and returns stdout, failing with the trimmed stderr on a non-zero exit.
    async fn run(&self, args: &[String]) -> Result<String> {
        let output = self.output(args).await?;
        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        if output.status.success() {
            return Ok(stdout);
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        let reason = stderr.trim();
        if reason.is_empty() {
            bail!("docker {} exited with {}", display_args(args), output.status);
        }
        bail!("{reason}");
    }

    /// Like `run`, but keeps stderr in the rendered text for commands whose output is shown to the user.
    async fn run_combined(&self, args: &[String]) -> Result<String> {
        let output = self.output(args).await?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        let rendered = if stderr.trim().is_empty() {
            stdout.to_string()
        } else if stdout.trim().is_empty() {
            stderr.to_string()
        } else {
            format!("{stdout}\n{stderr}")
        };

        let subcommand = args.first().map(String::as_str).unwrap_or_default();
        if output.status.success() {
            Ok(rendered)
        } else if rendered.trim().is_empty() {
            Err(anyhow!("docker {subcommand} exited with {}", output.status))
        } else {
            Err(anyhow!("{}", rendered.trim_end()))
                .context(format!("docker {subcommand} exited with {}", output.status))
        }
    }

    async fn list<T: DeserializeOwned>(&self, args: Vec<String>) -> Result<Vec<T>> {
        let raw = self.run(&args).await?;
        parse_json_lines(&raw)
    }

    async fn inspect(&self, kind: ResourceKind, id: &str) -> Result<Value> {
        require_id(kind, id)?;
        let raw = self.run(&inspect_args(kind, id)).await?;
        let parsed: Value = serde_json::from_str(&raw)
            .with_context(|| format!("failed to decode inspect output for {kind} {id}"))?;
        match parsed {
            Value::Array(mut items) if !items.is_empty() => Ok(items.swap_remove(0)),
            Value::Array(_) => bail!("no such {kind}: {id}"),
            other => Ok(other),
        }
    }

    async fn mutate(&self, kind: ResourceKind, id: &str, args: Vec<String>) -> Result<()> {
        require_id(kind, id)?;
        self.run(&args).await.map(|_| ())
    }

    pub async fn engine_info(&self) -> Result<EngineInfo> {
        let raw = self
            .run(&strings(&["info", "--format", JSON_FORMAT]))
            .await?;
        serde_json::from_str(raw.trim()).context("failed to decode docker info")
    }
}

/// Capability surface every resource adapter exposes. Operations a kind does not support
/// fail with a descriptive error instead of being probed for at call sites.
#[async_trait]
pub trait ResourceService: Send + Sync {
    fn kind(&self) -> ResourceKind;

    async fn list(&self) -> Result<Listing>;

    async fn inspect(&self, id: &str) -> Result<Value>;

    async fn remove(&self, id: &str, force: bool) -> Result<()>;

    async fn start(&self, _id: &str) -> Result<()> {
        Err(unsupported("start", self.kind()))
    }

    async fn stop(&self, _id: &str) -> Result<()> {
        Err(unsupported("stop", self.kind()))
    }

    async fn restart(&self, _id: &str) -> Result<()> {
        Err(unsupported("restart", self.kind()))
    }

    async fn logs(&self, _id: &str, _tail: usize) -> Result<String> {
        Err(unsupported("logs", self.kind()))
    }

    async fn exec(&self, _id: &str, _args: &[String]) -> Result<String> {
        Err(unsupported("exec", self.kind()))
    }

    async fn scale(&self, _id: &str, _replicas: u64) -> Result<()> {
        Err(unsupported("scale", self.kind()))
    }

    async fn update_availability(&self, _id: &str, _availability: &str) -> Result<()> {
        Err(unsupported("availability", self.kind()))
    }

    /// Keys the table accepts for this kind. The view legend is rendered from the same map.
    fn actions(&self) -> ActionMap {
        self.kind().actions()
    }
}

pub struct ContainerService {
    cli: DockerCli,
}

#[async_trait]
impl ResourceService for ContainerService {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Containers
    }

    async fn list(&self) -> Result<Listing> {
        let items: Vec<Container> = self.cli.list(list_args(self.kind())).await?;
        Ok(Listing::Containers(items))
    }

    async fn inspect(&self, id: &str) -> Result<Value> {
        self.cli.inspect(self.kind(), id).await
    }

    async fn remove(&self, id: &str, force: bool) -> Result<()> {
        self.cli
            .mutate(self.kind(), id, remove_args(self.kind(), id, force))
            .await
    }

    async fn start(&self, id: &str) -> Result<()> {
        self.cli.mutate(self.kind(), id, strings(&["start", id])).await
    }

    async fn stop(&self, id: &str) -> Result<()> {
        self.cli
            .mutate(self.kind(), id, strings(&["stop", "-t", STOP_GRACE_SECS, id]))
            .await
    }

    async fn restart(&self, id: &str) -> Result<()> {
        self.cli
            .mutate(self.kind(), id, strings(&["restart", "-t", STOP_GRACE_SECS, id]))
            .await
    }

    async fn logs(&self, id: &str, tail: usize) -> Result<String> {
        require_id(self.kind(), id)?;
        self.cli.run_combined(&logs_args(self.kind(), id, tail)).await
    }

    async fn exec(&self, id: &str, args: &[String]) -> Result<String> {
        require_id(self.kind(), id)?;
        if args.is_empty() {
            bail!("invalid argument: empty command");
        }
        let mut full = strings(&["exec", id]);
        full.extend(args.iter().cloned());
        self.cli.run_combined(&full).await
    }
}

pub struct ImageService {
    cli: DockerCli,
}

#[async_trait]
impl ResourceService for ImageService {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Images
    }

    async fn list(&self) -> Result<Listing> {
        let items: Vec<Image> = self.cli.list(list_args(self.kind())).await?;
        Ok(Listing::Images(items))
    }

    async fn inspect(&self, id: &str) -> Result<Value> {
        self.cli.inspect(self.kind(), id).await
    }

    async fn remove(&self, id: &str, force: bool) -> Result<()> {
        self.cli
            .mutate(self.kind(), id, remove_args(self.kind(), id, force))
            .await
    }
}

pub struct VolumeService {
    cli: DockerCli,
}

#[async_trait]
impl ResourceService for VolumeService {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Volumes
    }

    async fn list(&self) -> Result<Listing> {
        let items: Vec<Volume> = self.cli.list(list_args(self.kind())).await?;
        Ok(Listing::Volumes(items))
    }

    async fn inspect(&self, id: &str) -> Result<Value> {
        self.cli.inspect(self.kind(), id).await
    }

    async fn remove(&self, id: &str, force: bool) -> Result<()> {
        self.cli
            .mutate(self.kind(), id, remove_args(self.kind(), id, force))
            .await
    }
}

pub struct NetworkService {
    cli: DockerCli,
}

#[async_trait]
impl ResourceService for NetworkService {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Networks
    }

    async fn list(&self) -> Result<Listing> {
        let items: Vec<Network> = self.cli.list(list_args(self.kind())).await?;
        Ok(Listing::Networks(items))
    }

    async fn inspect(&self, id: &str) -> Result<Value> {
        self.cli.inspect(self.kind(), id).await
    }

    async fn remove(&self, id: &str, force: bool) -> Result<()> {
        self.cli
            .mutate(self.kind(), id, remove_args(self.kind(), id, force))
            .await
    }
}

pub struct SwarmServiceService {
    cli: DockerCli,
}

#[async_trait]
impl ResourceService for SwarmServiceService {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Services
    }

    async fn list(&self) -> Result<Listing> {
        let items: Vec<SwarmService> = self.cli.list(list_args(self.kind())).await?;
        Ok(Listing::Services(items))
    }

    async fn inspect(&self, id: &str) -> Result<Value> {
        self.cli.inspect(self.kind(), id).await
    }

    async fn remove(&self, id: &str, force: bool) -> Result<()> {
        self.cli
            .mutate(self.kind(), id, remove_args(self.kind(), id, force))
            .await
    }

    async fn logs(&self, id: &str, tail: usize) -> Result<String> {
        require_id(self.kind(), id)?;
        self.cli.run_combined(&logs_args(self.kind(), id, tail)).await
    }

    async fn scale(&self, id: &str, replicas: u64) -> Result<()> {
        let target = format!("{id}={replicas}");
        self.cli
            .mutate(self.kind(), id, strings(&["service", "scale", &target]))
            .await
    }
}

pub struct SwarmNodeService {
    cli: DockerCli,
}

#[async_trait]
impl ResourceService for SwarmNodeService {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Nodes
    }

    async fn list(&self) -> Result<Listing> {
        let items: Vec<SwarmNode> = self.cli.list(list_args(self.kind())).await?;
        Ok(Listing::Nodes(items))
    }

    async fn inspect(&self, id: &str) -> Result<Value> {
        self.cli.inspect(self.kind(), id).await
    }

    async fn remove(&self, id: &str, force: bool) -> Result<()> {
        self.cli
            .mutate(self.kind(), id, remove_args(self.kind(), id, force))
            .await
    }

    async fn update_availability(&self, id: &str, availability: &str) -> Result<()> {
        if !NODE_AVAILABILITIES.contains(&availability) {
            bail!("invalid argument: availability must be one of active, pause, drain");
        }
        self.cli
            .mutate(
                self.kind(),
                id,
                strings(&["node", "update", "--availability", availability, id]),
            )
            .await
    }
}

#[derive(Clone, Default)]
pub struct ServiceSet {
    services: HashMap<ResourceKind, Arc<dyn ResourceService>>,
    cli: Option<DockerCli>,
}

impl ServiceSet {
    pub fn docker(cli: DockerCli) -> Self {
        let mut set = Self {
            services: HashMap::new(),
            cli: Some(cli.clone()),
        };
        set.insert(Arc::new(ContainerService { cli: cli.clone() }));
        set.insert(Arc::new(ImageService { cli: cli.clone() }));
        set.insert(Arc::new(VolumeService { cli: cli.clone() }));
        set.insert(Arc::new(NetworkService { cli: cli.clone() }));
        set.insert(Arc::new(SwarmServiceService { cli: cli.clone() }));
        set.insert(Arc::new(SwarmNodeService { cli }));
        set
    }

    pub fn insert(&mut self, service: Arc<dyn ResourceService>) {
        self.services.insert(service.kind(), service);
    }

    pub fn get(&self, kind: ResourceKind) -> Result<Arc<dyn ResourceService>> {
        self.services
            .get(&kind)
            .cloned()
            .ok_or_else(|| anyhow!("{kind} service not available"))
    }

    pub async fn engine_info(&self) -> Result<EngineInfo> {
        match &self.cli {
            Some(cli) => cli.engine_info().await,
            None => bail!("engine service not available"),
        }
    }
}

pub fn parse_json_lines<T: DeserializeOwned>(raw: &str) -> Result<Vec<T>> {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .enumerate()
        .map(|(index, line)| {
            serde_json::from_str(line)
                .with_context(|| format!("failed to decode docker output line {}", index + 1))
        })
        .collect()
}

fn require_id(kind: ResourceKind, id: &str) -> Result<()> {
    if id.trim().is_empty() {
        bail!("invalid argument: empty {kind} id");
    }
    Ok(())
}

fn unsupported(operation: &str, kind: ResourceKind) -> anyhow::Error {
    anyhow!("{operation} is not supported for {}", kind.title().to_lowercase())
}

fn object_command(kind: ResourceKind) -> &'static str {
    match kind {
        ResourceKind::Containers => "container",
        ResourceKind::Images => "image",
        ResourceKind::Volumes => "volume",
        ResourceKind::Networks => "network",
        ResourceKind::Services => "service",
        ResourceKind::Nodes => "node",
    }
}

fn list_args(kind: ResourceKind) -> Vec<String> {
    let mut args = match kind {
        ResourceKind::Containers => strings(&["ps", "-a"]),
        ResourceKind::Images => strings(&["images"]),
        other => strings(&[object_command(other), "ls"]),
    };
    args.extend(strings(&["--format", JSON_FORMAT]));
    args
}

fn inspect_args(kind: ResourceKind, id: &str) -> Vec<String> {
    strings(&[object_command(kind), "inspect", id])
}

fn remove_args(kind: ResourceKind, id: &str, force: bool) -> Vec<String> {
    let mut args = match kind {
        ResourceKind::Containers => strings(&["rm"]),
        ResourceKind::Images => strings(&["rmi"]),
        other => strings(&[object_command(other), "rm"]),
    };
    let accepts_force = !matches!(kind, ResourceKind::Networks | ResourceKind::Services);
    if force && accepts_force {
        args.push("-f".to_string());
    }
    args.push(id.to_string());
    args
}

fn logs_args(kind: ResourceKind, id: &str, tail: usize) -> Vec<String> {
    let mut args = match kind {
        ResourceKind::Services => strings(&["service", "logs"]),
        _ => strings(&["logs"]),
    };
    args.extend(strings(&["--tail", &tail.to_string(), "--timestamps", id]));
    args
}

fn strings(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|part| part.to_string()).collect()
}

fn display_args(args: &[String]) -> String {
    args.join(" ")
}
