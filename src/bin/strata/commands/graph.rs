//! `strata graph` command
//!
//! Prints the layers a set of targets would be installed in, or the
//! dependency graph as Graphviz.

use anyhow::Result;

use super::{apply_mode, GlobalArgs, Session};
use crate::cli::{FormatArg, GraphArgs};
use strata::ops::{graph, GraphFormat, SyncOptions};

pub fn execute(global: &GlobalArgs, args: GraphArgs) -> Result<()> {
    let session = Session::open(global)?;

    let mut opts = SyncOptions::from_config(session.ctx.config());
    apply_mode(&mut opts, &args.mode);
    opts.resolve.no_deps |= args.no_deps;
    opts.targets = args.targets;
    opts.srcinfo_dir = args.srcinfo;

    let format = match args.format {
        FormatArg::Layers => GraphFormat::Layers,
        FormatArg::Dot => GraphFormat::Dot,
    };

    let out = graph(&session.ctx, &session.backends(), &opts, format)?;
    print!("{}", out);

    Ok(())
}
