//! CLI definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;

/// strata - build and install packages from the repositories and the AUR
#[derive(Parser)]
#[command(name = "strata")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Print errors only
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Coloring: auto, always, never
    #[arg(long, global = true, default_value = "auto")]
    pub color: String,

    /// Configuration file merged over the global one
    #[arg(long, global = true, env = "STRATA_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Resolve, build and install packages
    Install(InstallArgs),

    /// Upgrade installed packages
    Upgrade(UpgradeArgs),

    /// Record the current upstream commit of installed development packages
    Gendb,

    /// Print the dependency graph of targets without installing
    Graph(GraphArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

/// Where targets may come from.
#[derive(Args, Default)]
pub struct ModeArgs {
    /// Only consider the sync repositories
    #[arg(long, conflicts_with = "aur")]
    pub repo: bool,

    /// Only consider the AUR
    #[arg(long)]
    pub aur: bool,
}

/// Flags shared by everything that installs.
#[derive(Args, Default)]
pub struct BuildFlags {
    /// Do not rebuild packages that are already installed at the same version
    #[arg(long)]
    pub needed: bool,

    /// When to rebuild existing archives: no, yes, all, tree
    #[arg(long)]
    pub rebuild: Option<String>,

    /// Skip runtime and check dependency resolution
    #[arg(long = "nodeps")]
    pub no_deps: bool,

    /// Skip check dependencies
    #[arg(long = "nocheck")]
    pub no_check: bool,

    /// Build packages but do not install them
    #[arg(long)]
    pub download_only: bool,

    /// Install every target as a dependency
    #[arg(long = "asdeps", conflicts_with = "as_explicit")]
    pub as_deps: bool,

    /// Install every package as explicitly installed
    #[arg(long = "asexplicit")]
    pub as_explicit: bool,

    /// Never ask for confirmation
    #[arg(long = "noconfirm")]
    pub no_confirm: bool,

    /// Remove packages only needed for building after installing
    #[arg(long)]
    pub remove_make_deps: bool,

    #[command(flatten)]
    pub mode: ModeArgs,
}

#[derive(Args)]
pub struct InstallArgs {
    /// Packages to install, as `[repo/|aur/]name[op version]`
    #[arg(required_unless_present = "srcinfo")]
    pub targets: Vec<String>,

    /// Build and install the PKGBUILD in this directory
    #[arg(long, value_name = "DIR")]
    pub srcinfo: Option<PathBuf>,

    #[command(flatten)]
    pub build: BuildFlags,
}

#[derive(Args)]
pub struct UpgradeArgs {
    /// Extra packages to install along with the upgrade
    pub targets: Vec<String>,

    /// Check development packages for new upstream commits
    #[arg(long)]
    pub devel: bool,

    /// Offer older AUR versions as upgrades
    #[arg(long)]
    pub downgrade: bool,

    /// Do not upgrade these packages
    #[arg(long, value_name = "NAME")]
    pub exclude: Vec<String>,

    /// Never upgrade these packages
    #[arg(long, value_name = "NAME")]
    pub ignore: Vec<String>,

    #[command(flatten)]
    pub build: BuildFlags,
}

#[derive(Clone, Copy, ValueEnum, Default)]
pub enum FormatArg {
    #[default]
    Layers,
    Dot,
}

#[derive(Args)]
pub struct GraphArgs {
    /// Packages to resolve
    #[arg(required_unless_present = "srcinfo")]
    pub targets: Vec<String>,

    /// Resolve the PKGBUILD in this directory
    #[arg(long, value_name = "DIR")]
    pub srcinfo: Option<PathBuf>,

    /// Output format
    #[arg(long, value_enum, default_value_t = FormatArg::Layers)]
    pub format: FormatArg,

    /// Skip runtime and check dependency resolution
    #[arg(long = "nodeps")]
    pub no_deps: bool,

    #[command(flatten)]
    pub mode: ModeArgs,
}

#[derive(Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}
