//! Command line surface.
use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "zypper-docker")]
#[command(author, version, about = "Patch and update SUSE based container images", long_about = None)]
pub struct Cli {
    /// Print debug output.
    #[arg(long, global = true)]
    pub debug: bool,

    /// Add a custom `host:ip` mapping to every container, may be repeated.
    #[arg(long = "add-host", value_name = "HOST:IP", global = true)]
    pub add_hosts: Vec<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List all the available updates.
    #[command(name = "list-updates", visible_alias = "lu")]
    ListUpdates {
        image: String,
    },
    /// List all the available patches.
    #[command(name = "list-patches", visible_alias = "lp")]
    ListPatches {
        image: String,
    },
    /// Check for patches, the exit code tells whether any are needed.
    #[command(name = "patch-check", visible_alias = "pchk")]
    PatchCheck {
        image: String,
    },
    /// Install all available updates and commit the result.
    #[command(visible_alias = "up")]
    Update(CommitArgs),
    /// Install all needed patches and commit the result.
    Patch(CommitArgs),
    /// List running containers whose image has been updated.
    Ps {
        /// Skip containers whose image cannot be resolved.
        #[arg(long)]
        ignore_failures: bool,
    },
    /// Forget every cached image classification.
    #[command(name = "clean-cache")]
    CleanCache,
}

#[derive(Debug, Args)]
pub struct CommitArgs {
    /// Image to update.
    pub image: String,
    /// `repository[:tag]` of the image to create.
    pub new_image: String,
    /// Author recorded in the new image.
    #[arg(long, default_value = "")]
    pub author: String,
    /// Commit message recorded in the new image.
    #[arg(short, long, default_value = "")]
    pub message: String,
}
