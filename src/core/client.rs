//! The orchestrator: composes pluggable collaborators into the Function lifecycle.
//!
//! `Client` is built via `Client::builder()...build()`, the idiomatic stand-in for
//! the functional-options pattern: every collaborator defaults to "absent", and
//! lifecycle methods that need one return `MissingConfig` if it was never supplied.

use crate::core::cancellation::Cancellation;
use crate::core::defaults;
use crate::core::error::FuncError;
use crate::core::function::{self, Function};
use crate::core::instances::{self, Describer, Instance, LocalInstances};
use crate::core::invoker::{self, Message};
use crate::core::migration;
use crate::core::progress::{NoopProgressListener, ProgressListener};
use crate::core::repositories::Repositories;
use crate::core::templates::Templates;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployStatus {
    Failed,
    Deployed,
    Updated,
}

#[derive(Debug, Clone)]
pub struct DeploymentResult {
    pub status: DeployStatus,
    pub url: String,
    pub namespace: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ListedInstance {
    pub name: String,
    pub namespace: Option<String>,
    pub runtime: String,
    pub url: String,
    pub ready: bool,
}

/// A handle to a locally running instance started by `Runner::run`: the route it's
/// reachable at, an error stream, and a stop function. Dropping it without calling
/// `stop` leaves the process/runner to clean up on its own.
pub struct Job {
    pub name: String,
    route: String,
    errors: std::sync::mpsc::Receiver<FuncError>,
    stop_fn: Box<dyn FnOnce() + Send>,
}

impl Job {
    pub fn new(
        name: impl Into<String>,
        route: impl Into<String>,
        errors: std::sync::mpsc::Receiver<FuncError>,
        stop_fn: impl FnOnce() + Send + 'static,
    ) -> Job {
        Job {
            name: name.into(),
            route: route.into(),
            errors,
            stop_fn: Box::new(stop_fn),
        }
    }

    /// Where `Invoke` can reach this instance, once `Client::run` registers it.
    pub fn route(&self) -> &str {
        &self.route
    }

    pub fn errors(&self) -> &std::sync::mpsc::Receiver<FuncError> {
        &self.errors
    }

    pub fn stop(self) {
        (self.stop_fn)()
    }
}

pub trait Builder: Send + Sync {
    fn build(&self, function: &Function, cancellation: &Cancellation) -> Result<(), FuncError>;
}

pub trait Pusher: Send + Sync {
    fn push(&self, function: &Function, cancellation: &Cancellation) -> Result<String, FuncError>;
}

pub trait Deployer: Send + Sync {
    fn deploy(
        &self,
        function: &Function,
        cancellation: &Cancellation,
    ) -> Result<DeploymentResult, FuncError>;
}

pub trait Runner: Send + Sync {
    fn run(&self, function: &Function, cancellation: &Cancellation) -> Result<Job, FuncError>;
}

pub trait Remover: Send + Sync {
    fn remove(&self, name: &str, cancellation: &Cancellation) -> Result<(), FuncError>;
}

pub trait Lister: Send + Sync {
    fn list(&self, cancellation: &Cancellation) -> Result<Vec<ListedInstance>, FuncError>;
}

pub trait DnsProvider: Send + Sync {
    fn provide(&self, function: &Function) -> Result<(), FuncError>;
}

pub trait PipelinesProvider: Send + Sync {
    fn run(&self, function: &Function, cancellation: &Cancellation) -> Result<(), FuncError>;
    fn remove(&self, function: &Function, cancellation: &Cancellation) -> Result<(), FuncError>;
}

fn missing(collaborator: &str) -> FuncError {
    FuncError::MissingConfig(format!("no {collaborator} is configured"))
}

fn join_errors(a: Result<(), FuncError>, b: Result<(), FuncError>) -> Result<(), FuncError> {
    match (a, b) {
        (Ok(()), Ok(())) => Ok(()),
        (Err(e), Ok(())) | (Ok(()), Err(e)) => Err(e),
        (Err(e1), Err(e2)) => Err(FuncError::Transport {
            context: "remove".to_string(),
            source: Box::new(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("{e1}\n{e2}"),
            )),
        }),
    }
}

/// Where to remove from: a name always wins over a root (S4); a root-only removal
/// loads the Function there and requires it to be initialized before the remover is
/// ever called.
pub struct RemoveRequest {
    pub name: Option<String>,
    pub root: Option<PathBuf>,
    pub delete_all: bool,
}

#[derive(Default)]
pub struct ClientBuilder {
    builder: Option<Box<dyn Builder>>,
    pusher: Option<Box<dyn Pusher>>,
    deployer: Option<Box<dyn Deployer>>,
    runner: Option<Box<dyn Runner>>,
    remover: Option<Box<dyn Remover>>,
    lister: Option<Box<dyn Lister>>,
    describer: Option<Box<dyn Describer>>,
    dns_provider: Option<Box<dyn DnsProvider>>,
    pipelines_provider: Option<Box<dyn PipelinesProvider>>,
    progress: Option<Box<dyn ProgressListener>>,
    repositories_path: Option<PathBuf>,
    single_uri_repository: Option<String>,
}

impl ClientBuilder {
    pub fn with_builder(mut self, b: impl Builder + 'static) -> Self {
        self.builder = Some(Box::new(b));
        self
    }
    pub fn with_pusher(mut self, p: impl Pusher + 'static) -> Self {
        self.pusher = Some(Box::new(p));
        self
    }
    pub fn with_deployer(mut self, d: impl Deployer + 'static) -> Self {
        self.deployer = Some(Box::new(d));
        self
    }
    pub fn with_runner(mut self, r: impl Runner + 'static) -> Self {
        self.runner = Some(Box::new(r));
        self
    }
    pub fn with_remover(mut self, r: impl Remover + 'static) -> Self {
        self.remover = Some(Box::new(r));
        self
    }
    pub fn with_lister(mut self, l: impl Lister + 'static) -> Self {
        self.lister = Some(Box::new(l));
        self
    }
    pub fn with_describer(mut self, d: impl Describer + 'static) -> Self {
        self.describer = Some(Box::new(d));
        self
    }
    pub fn with_dns_provider(mut self, d: impl DnsProvider + 'static) -> Self {
        self.dns_provider = Some(Box::new(d));
        self
    }
    pub fn with_pipelines_provider(mut self, p: impl PipelinesProvider + 'static) -> Self {
        self.pipelines_provider = Some(Box::new(p));
        self
    }
    pub fn with_progress_listener(mut self, p: impl ProgressListener + 'static) -> Self {
        self.progress = Some(Box::new(p));
        self
    }
    pub fn with_repositories_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.repositories_path = Some(path.into());
        self
    }
    pub fn with_single_uri_repository(mut self, uri: impl Into<String>) -> Self {
        self.single_uri_repository = Some(uri.into());
        self
    }

    pub fn build(self) -> Client {
        let repositories = match self.single_uri_repository {
            Some(uri) => Repositories::with_single_uri_override(uri),
            None => Repositories::new(self.repositories_path),
        };
        Client {
            builder: self.builder,
            pusher: self.pusher,
            deployer: self.deployer,
            runner: self.runner,
            remover: self.remover,
            lister: self.lister,
            describer: self.describer,
            dns_provider: self.dns_provider,
            pipelines_provider: self.pipelines_provider,
            progress: self.progress.unwrap_or_else(|| Box::new(NoopProgressListener)),
            repositories,
            local_instances: LocalInstances::new(),
            http_client: reqwest::blocking::Client::new(),
        }
    }
}

pub struct Client {
    builder: Option<Box<dyn Builder>>,
    pusher: Option<Box<dyn Pusher>>,
    deployer: Option<Box<dyn Deployer>>,
    runner: Option<Box<dyn Runner>>,
    remover: Option<Box<dyn Remover>>,
    lister: Option<Box<dyn Lister>>,
    describer: Option<Box<dyn Describer>>,
    dns_provider: Option<Box<dyn DnsProvider>>,
    pipelines_provider: Option<Box<dyn PipelinesProvider>>,
    progress: Box<dyn ProgressListener>,
    repositories: Repositories,
    local_instances: LocalInstances,
    http_client: reqwest::blocking::Client,
}

impl Client {
    pub fn builder() -> ClientBuilder {
        ClientBuilder::default()
    }

    pub fn local_instances(&self) -> &LocalInstances {
        &self.local_instances
    }

    /// Run `f` on the current thread while a second, observer thread polls
    /// `cancellation` and calls `self.progress.stopping()` the moment it trips. This
    /// is the "one observer task per lifecycle call" that notices a collaborator
    /// ignoring cancellation mid-call and lets the progress listener say so, even
    /// though the orchestrator itself never forcibly interrupts `f`.
    fn watch_cancellation<T>(&self, cancellation: &Cancellation, f: impl FnOnce() -> T) -> T {
        let done = AtomicBool::new(false);
        let progress = self.progress.as_ref();
        std::thread::scope(|scope| {
            scope.spawn(|| {
                while !done.load(Ordering::SeqCst) {
                    if cancellation.is_cancelled() {
                        progress.stopping();
                        return;
                    }
                    std::thread::sleep(Duration::from_millis(20));
                }
            });
            let result = f();
            done.store(true, Ordering::SeqCst);
            result
        })
    }

    /// Resolve `root` to absolute, refuse a non-empty/already-initialized directory,
    /// default `Name` from the last path segment, materialize the template, stamp
    /// `Created`, and write `func.yaml`.
    pub fn create(
        &self,
        mut cfg: Function,
        template: &str,
        cancellation: &Cancellation,
    ) -> Result<Function, FuncError> {
        cancellation.check()?;
        let root = cfg
            .root
            .canonicalize()
            .unwrap_or_else(|_| cfg.root.clone());
        std::fs::create_dir_all(&root)?;
        function::ensure_empty_root(&root)?;
        cfg.root = root;

        if cfg.name.trim().is_empty() {
            cfg.name = cfg
                .root
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .ok_or_else(|| FuncError::Validation("root has no usable directory name".to_string()))?;
        }
        cfg.spec_version = migration::CURRENT_SPEC_VERSION.to_string();

        let templates = Templates::new(&self.repositories);
        self.watch_cancellation(cancellation, || templates.write(&mut cfg, template))?;

        function::ensure_run_data_dir(&cfg.root)?;
        cfg.created = crate::core::time::now_epoch_secs();
        cfg.write()?;
        self.progress.complete(&format!("created {}", cfg.name));
        Ok(cfg)
    }

    /// Default `Registry`, derive `Image` if unset, invoke the `Builder`, persist the
    /// Function, and stamp `.func/built` with the fresh fingerprint.
    pub fn build(&self, root: &Path, cancellation: &Cancellation) -> Result<Function, FuncError> {
        let mut f = Function::load(root)?;
        if f.registry.trim().is_empty() {
            f.registry = defaults::DEFAULT_REGISTRY.to_string();
        }
        f.ensure_image()?;
        cancellation.check()?;
        self.progress.increment(&format!("building {}", f.image));
        if let Some(builder) = &self.builder {
            self.watch_cancellation(cancellation, || builder.build(&f, cancellation))?;
        }
        f.write()?;
        function::write_built_fingerprint(&f.root)?;
        self.progress.complete(&format!("built {}", f.image));
        Ok(f)
    }

    /// Refuse if not built, invoke the `Pusher`, persist the returned digest.
    pub fn push(&self, root: &Path, cancellation: &Cancellation) -> Result<Function, FuncError> {
        let mut f = Function::load(root)?;
        if !function::is_built(&f.root) {
            return Err(FuncError::NotBuilt(format!(
                "{} has not been built",
                f.root.display()
            )));
        }
        cancellation.check()?;
        let digest = match &self.pusher {
            Some(pusher) => self.watch_cancellation(cancellation, || pusher.push(&f, cancellation))?,
            None => String::new(),
        };
        f.image_digest = digest;
        f.write()?;
        self.progress.complete(&format!("pushed {}", f.image));
        Ok(f)
    }

    /// Refuse if no image reference is set, invoke the `Deployer`.
    pub fn deploy(
        &self,
        root: &Path,
        cancellation: &Cancellation,
    ) -> Result<DeploymentResult, FuncError> {
        let f = Function::load(root)?;
        if f.image.trim().is_empty() && f.image_digest.trim().is_empty() {
            return Err(FuncError::MissingConfig(
                "an image reference is required to deploy".to_string(),
            ));
        }
        cancellation.check()?;
        let deployer = self.deployer.as_ref().ok_or_else(|| missing("deployer"))?;
        let result = self.watch_cancellation(cancellation, || deployer.deploy(&f, cancellation))?;
        self.progress.complete(&format!("deployed {}", f.name));
        Ok(result)
    }

    pub fn route(&self, root: &Path) -> Result<(), FuncError> {
        let f = Function::load(root)?;
        let dns = self
            .dns_provider
            .as_ref()
            .ok_or_else(|| missing("DNS provider"))?;
        dns.provide(&f)
    }

    /// Refuse if not initialized, invoke the `Runner`, and register the resulting
    /// instance so `Invoke` can find it locally.
    pub fn run(&self, root: &Path, cancellation: &Cancellation) -> Result<Job, FuncError> {
        let f = Function::load(root)?;
        if !f.is_initialized() {
            return Err(FuncError::NotInitialized(format!(
                "{} is not an initialized function",
                f.root.display()
            )));
        }
        let runner = self.runner.as_ref().ok_or_else(|| missing("runner"))?;
        let job = self.watch_cancellation(cancellation, || runner.run(&f, cancellation))?;
        self.local_instances.register(Instance {
            name: job.name.clone(),
            route: job.route().to_string(),
            ..Instance::default()
        });
        Ok(job)
    }

    /// Resolve `target` (local instance, then remote describe, then raw URL) and
    /// send `message` per the Function's declared invocation format.
    pub fn invoke(
        &self,
        root: &Path,
        target: &str,
        message: &Message,
        cancellation: &Cancellation,
    ) -> Result<(), FuncError> {
        let f = Function::load(root)?;
        let instance = instances::resolve(
            target,
            &self.local_instances,
            self.describer.as_deref(),
            cancellation,
        )?;
        let format = f
            .invocation
            .as_ref()
            .map(|i| i.format)
            .unwrap_or_default();
        self.watch_cancellation(cancellation, || {
            invoker::invoke(&self.http_client, &instance.route, format, message)
        })
    }

    /// If `name` is given, delegate straight to the `Describer`; otherwise load the
    /// Function at `root`, require it to be initialized, and describe it by name.
    pub fn info(
        &self,
        name: Option<&str>,
        root: Option<&Path>,
        cancellation: &Cancellation,
    ) -> Result<Instance, FuncError> {
        let describer = self.describer.as_ref().ok_or_else(|| missing("describer"))?;
        let resolved_name = match name {
            Some(n) => n.to_string(),
            None => {
                let root = root.ok_or_else(|| {
                    FuncError::Validation("info requires a name or a root path".to_string())
                })?;
                let f = Function::load(root)?;
                if !f.is_initialized() {
                    return Err(FuncError::NotInitialized(format!(
                        "{} is not an initialized function",
                        f.root.display()
                    )));
                }
                f.name
            }
        };
        self.watch_cancellation(cancellation, || describer.describe(&resolved_name, cancellation))
    }

    pub fn list(&self, cancellation: &Cancellation) -> Result<Vec<ListedInstance>, FuncError> {
        let lister = self.lister.as_ref().ok_or_else(|| missing("lister"))?;
        self.watch_cancellation(cancellation, || lister.list(cancellation))
    }

    /// Name takes precedence over root and root is never consulted when a name is
    /// given (S4); a root-only removal loads the Function and requires it to be
    /// initialized before the remover is invoked at all. When `delete_all` and a
    /// Function is available, the remover and the pipelines provider run
    /// concurrently and their errors are joined with a newline.
    pub fn remove(&self, req: RemoveRequest, cancellation: &Cancellation) -> Result<(), FuncError> {
        let function = match (&req.name, &req.root) {
            (Some(_), _) => None,
            (None, Some(root)) => Some(Function::load(root)?),
            (None, None) => {
                return Err(FuncError::Validation(
                    "remove requires a name or a root path".to_string(),
                ))
            }
        };

        let resolved_name = match (&req.name, &function) {
            (Some(name), _) => name.clone(),
            (None, Some(f)) => {
                if !f.is_initialized() {
                    return Err(FuncError::NotInitialized(format!(
                        "{} is not an initialized function",
                        f.root.display()
                    )));
                }
                f.name.clone()
            }
            (None, None) => unreachable!(),
        };

        cancellation.check()?;

        if req.delete_all {
            if let Some(f) = &function {
                let (remover_result, pipelines_result) = self.watch_cancellation(cancellation, || {
                    rayon::join(
                        || match &self.remover {
                            Some(remover) => remover.remove(&resolved_name, cancellation),
                            None => Ok(()),
                        },
                        || match &self.pipelines_provider {
                            Some(pipelines) => pipelines.remove(f, cancellation),
                            None => Ok(()),
                        },
                    )
                });
                return join_errors(remover_result, pipelines_result);
            }
        }

        match &self.remover {
            Some(remover) => self.watch_cancellation(cancellation, || remover.remove(&resolved_name, cancellation)),
            None => Ok(()),
        }
    }

    /// Create -> Build -> Push -> Deploy -> Route, strictly sequential, one progress
    /// increment per phase.
    pub fn new_function(
        &self,
        cfg: Function,
        template: &str,
        cancellation: &Cancellation,
    ) -> Result<DeploymentResult, FuncError> {
        self.progress.set_total(5);
        let f = self.create(cfg, template, cancellation)?;
        self.progress.increment("created");
        let f = self.build(&f.root, cancellation)?;
        self.progress.increment("built");
        let f = self.push(&f.root, cancellation)?;
        self.progress.increment("pushed");
        let result = self.deploy(&f.root, cancellation)?;
        self.progress.increment("deployed");
        self.route(&f.root)?;
        self.progress.complete("routed");
        Ok(result)
    }

    /// True iff the Function loads, has an image reference, and `.func/built`
    /// matches the current build fingerprint.
    pub fn built(root: &Path) -> bool {
        function::is_built(root)
    }
}
