//! Command-line surface for `funcctl`: argument parsing and dispatch to `core::client::Client`.
//!
//! The CLI wires no collaborators of its own — by default every pluggable
//! subsystem (builder, pusher, deployer, ...) is absent, so lifecycle commands that
//! need one fail with a `MissingConfig` error naming it. Embedding applications are
//! expected to construct their own `Client` with real collaborators and either call
//! into `core` directly or extend this CLI.

use crate::core::cancellation::Cancellation;
use crate::core::client::{Client, ClientBuilder, RemoveRequest};
use crate::core::function::{BuildType, Function};
use crate::core::invoker::Message;
use crate::core::progress::TerminalProgressListener;
use crate::core::repositories::Repositories;
use crate::core::templates::Templates;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(
    name = "funcctl",
    version = env!("CARGO_PKG_VERSION"),
    about = "Create, build, deploy, and invoke scale-to-zero Functions"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create a new Function project from a template
    Create(CreateCli),
    /// Build a Function's container image
    Build(PathCli),
    /// Push a built image to its registry
    Push(PathCli),
    /// Deploy a pushed image
    Deploy(PathCli),
    /// Provision DNS routing for a deployed Function
    Route(PathCli),
    /// Run a Function locally
    Run(PathCli),
    /// Invoke a running instance
    Invoke(InvokeCli),
    /// Describe a Function or running instance
    Info(InfoCli),
    /// List deployed instances
    List,
    /// Remove a deployed instance
    Remove(RemoveCli),
    /// Manage template repositories
    #[clap(subcommand)]
    Repository(RepositoryCommand),
    /// List or inspect templates
    #[clap(subcommand)]
    Templates(TemplatesCommand),
}

#[derive(clap::Args, Debug)]
pub struct PathCli {
    /// Function project directory (defaults to the current directory)
    #[clap(long, default_value = ".")]
    pub path: PathBuf,
}

#[derive(clap::Args, Debug)]
pub struct CreateCli {
    /// Directory to create the Function in (defaults to the current directory)
    #[clap(long, default_value = ".")]
    pub path: PathBuf,
    /// Function name (defaults to the directory's base name)
    #[clap(long)]
    pub name: Option<String>,
    /// Language runtime, e.g. `go`, `node`
    #[clap(long)]
    pub runtime: String,
    /// Template, bare for the default repository or `repo/name` otherwise
    #[clap(long, default_value = "http")]
    pub template: String,
    /// OCI registry to derive the image name from
    #[clap(long)]
    pub registry: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct InvokeCli {
    /// Function project directory (defaults to the current directory)
    #[clap(long, default_value = ".")]
    pub path: PathBuf,
    /// Instance name, or a raw URL
    pub target: String,
    /// Invocation message ID
    #[clap(long, default_value = "")]
    pub id: String,
    /// Invocation message source
    #[clap(long, default_value = "/cli")]
    pub source: String,
    /// Invocation message type
    #[clap(long, default_value = "")]
    pub kind: String,
    /// Invocation message data
    #[clap(long, default_value = "")]
    pub data: String,
}

#[derive(clap::Args, Debug)]
pub struct InfoCli {
    /// Instance name (defaults to the Function at --path)
    pub name: Option<String>,
    /// Function project directory, used when --name is omitted
    #[clap(long, default_value = ".")]
    pub path: PathBuf,
}

#[derive(clap::Args, Debug)]
pub struct RemoveCli {
    /// Instance name (takes precedence over --path)
    pub name: Option<String>,
    /// Function project directory, used when a name is not given
    #[clap(long)]
    pub path: Option<PathBuf>,
    /// Also remove any associated CI/CD pipeline
    #[clap(long)]
    pub all: bool,
}

#[derive(Subcommand, Debug)]
pub enum RepositoryCommand {
    /// List known repositories
    List,
    /// Clone a repository and add it under the given name
    Add { name: String, uri: String },
    Rename { from: String, to: String },
    Remove { name: String },
}

#[derive(Subcommand, Debug)]
pub enum TemplatesCommand {
    /// List templates available for a runtime
    List { runtime: String },
}

#[cfg(unix)]
fn repositories_path() -> Option<PathBuf> {
    std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".config/func/repositories"))
}

#[cfg(not(unix))]
fn repositories_path() -> Option<PathBuf> {
    None
}

fn client_builder() -> ClientBuilder {
    let builder = Client::builder().with_progress_listener(TerminalProgressListener::new());
    match repositories_path() {
        Some(path) => builder.with_repositories_path(path),
        None => builder,
    }
}

pub fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cancellation = Cancellation::new();
    let client = client_builder().build();

    match cli.command {
        Command::Create(args) => {
            let registry = args.registry.unwrap_or_default();
            let cfg = Function {
                root: args.path,
                name: args.name.unwrap_or_default(),
                runtime: args.runtime,
                registry,
                build_type: BuildType::Local,
                ..Function::default()
            };
            client.create(cfg, &args.template, &cancellation)?;
        }
        Command::Build(args) => {
            client.build(&args.path, &cancellation)?;
        }
        Command::Push(args) => {
            client.push(&args.path, &cancellation)?;
        }
        Command::Deploy(args) => {
            client.deploy(&args.path, &cancellation)?;
        }
        Command::Route(args) => {
            client.route(&args.path)?;
        }
        Command::Run(args) => {
            let job = client.run(&args.path, &cancellation)?;
            println!("running: {}", job.name);
        }
        Command::Invoke(args) => {
            let message = Message {
                id: args.id,
                source: args.source,
                kind: args.kind,
                data: args.data,
            };
            client.invoke(&args.path, &args.target, &message, &cancellation)?;
        }
        Command::Info(args) => {
            let instance = client.info(args.name.as_deref(), Some(&args.path), &cancellation)?;
            println!("{instance:#?}");
        }
        Command::List => {
            let instances = client.list(&cancellation)?;
            for instance in instances {
                println!("{}\t{}\t{}", instance.name, instance.runtime, instance.url);
            }
        }
        Command::Remove(args) => {
            let req = RemoveRequest {
                name: args.name,
                root: args.path,
                delete_all: args.all,
            };
            client.remove(req, &cancellation)?;
        }
        Command::Repository(cmd) => run_repository_command(cmd)?,
        Command::Templates(cmd) => run_templates_command(cmd)?,
    }
    Ok(())
}

fn run_repository_command(cmd: RepositoryCommand) -> anyhow::Result<()> {
    let repositories = Repositories::new(repositories_path());
    match cmd {
        RepositoryCommand::List => {
            for repo in repositories.all()? {
                println!("{}", repo.name);
            }
        }
        RepositoryCommand::Add { name, uri } => {
            repositories.add(&name, &uri)?;
            println!("added {name}");
        }
        RepositoryCommand::Rename { from, to } => {
            repositories.rename(&from, &to)?;
            println!("renamed {from} to {to}");
        }
        RepositoryCommand::Remove { name } => {
            repositories.remove(&name)?;
            println!("removed {name}");
        }
    }
    Ok(())
}

fn run_templates_command(cmd: TemplatesCommand) -> anyhow::Result<()> {
    let repositories = Repositories::new(repositories_path());
    let templates = Templates::new(&repositories);
    match cmd {
        TemplatesCommand::List { runtime } => {
            for name in templates.list(&runtime)? {
                println!("{name}");
            }
        }
    }
    Ok(())
}
