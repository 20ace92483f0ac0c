//! zypper-docker: apply package updates and patches to SUSE based container images.
//!
//! Every operation runs the package manager inside a transient container
//! created from the target image. Updates are committed as a new image, listing
//! commands discard the container. Images are classified as SUSE based or not
//! by probing them once; the verdicts are cached on disk and shared between
//! invocations.
use std::sync::Arc;

use cache::ImageCache;
use cli::{Cli, Command, CommitArgs};
use config::Config;
use context::Context;
use engine::{DockerEngine, Engine};
use signal::Cancellation;
use update::{ListKind, UpdateKind, UpdateRequest};

pub mod cache;
pub mod cli;
pub mod config;
pub mod container;
pub mod context;
pub mod driver;
pub mod engine;
pub mod error;
pub mod exit;
pub mod fsutil;
pub mod inspect;
pub mod reference;
pub mod runner;
pub mod signal;
pub mod update;

/// Runs the command described by `cli` and returns the process exit code.
///
/// Listing commands pass the informational exit code of the package manager
/// through, e.g. `100` when updates are available.
///
/// # Errors
///
/// Possible errors include:
/// - Invalid configuration in the environment or on the command line.
/// - Failure to connect to the container engine.
/// - Any failure of the requested operation, including an interruption by a signal.
pub async fn run(cli: Cli) -> Result<u8, Box<dyn std::error::Error>> {
    let mut config = Config::from_env()?;
    config.add_hosts(cli.add_hosts)?;

    let cancellation = Cancellation::new();
    let _signals = signal::install_handler(cancellation.clone())?;

    let candidates = ImageCache::default_candidates(config.cache_dir.clone());
    let mut cache = tokio::task::spawn_blocking(move || ImageCache::load(candidates)).await?;

    let command = match cli.command {
        Command::CleanCache => {
            cache.reset().await?;
            println!("Image cache cleared");
            return Ok(0);
        }
        Command::ListUpdates { image } => EngineCommand::List(ListKind::Updates, image),
        Command::ListPatches { image } => EngineCommand::List(ListKind::Patches, image),
        Command::PatchCheck { image } => EngineCommand::List(ListKind::PatchCheck, image),
        Command::Update(args) => EngineCommand::Commit(UpdateKind::Update, args),
        Command::Patch(args) => EngineCommand::Commit(UpdateKind::Patch, args),
        Command::Ps { ignore_failures } => EngineCommand::Ps { ignore_failures },
    };

    let engine = Arc::new(DockerEngine::connect().await?);
    let mut ctx = Context::new(engine, cache, cancellation, &config);
    let code = dispatch(&mut ctx, command).await?;
    if ctx.cancellation().is_cancelled() {
        return Err("interrupted".into());
    }

    Ok(u8::try_from(code).map_err(|_| format!("exit code {code} is out of range"))?)
}

/// Commands that need a connection to the container engine.
enum EngineCommand {
    List(ListKind, String),
    Commit(UpdateKind, CommitArgs),
    Ps { ignore_failures: bool },
}

async fn dispatch<E: Engine>(
    ctx: &mut Context<E>,
    command: EngineCommand,
) -> Result<i64, Box<dyn std::error::Error>> {
    match command {
        EngineCommand::List(kind, image) => list(ctx, kind, &image).await,
        EngineCommand::Commit(kind, args) => commit(ctx, kind, args).await,
        EngineCommand::Ps { ignore_failures } => {
            match inspect::list_containers(ctx, ignore_failures).await? {
                Some(state) => print!("{state}"),
                None => println!("There are no running containers to analyze"),
            }
            Ok(0)
        }
    }
}

async fn list<E: Engine>(
    ctx: &mut Context<E>,
    kind: ListKind,
    image: &str,
) -> Result<i64, Box<dyn std::error::Error>> {
    let code = update::list_updates(ctx, kind, image, Some(Box::new(tokio::io::stdout()))).await?;
    Ok(code)
}

async fn commit<E: Engine>(
    ctx: &mut Context<E>,
    kind: UpdateKind,
    args: CommitArgs,
) -> Result<i64, Box<dyn std::error::Error>> {
    let request = UpdateRequest {
        kind,
        image: args.image,
        destination: args.new_image,
        comment: args.message,
        author: args.author,
    };
    let destination =
        update::perform_update(ctx, &request, Some(Box::new(tokio::io::stdout()))).await?;
    println!("{destination} successfully created");
    Ok(0)
}
