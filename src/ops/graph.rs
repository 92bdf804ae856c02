//! Implementation of `strata graph`.

use std::fmt::Write;

use anyhow::Result;

use super::sync::{Backends, SyncOptions};
use crate::core::package::{PackageRef, PackageSource};
use crate::planner::InstallPlan;
use crate::util::context::GlobalContext;

/// How `strata graph` prints a resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GraphFormat {
    /// Graphviz, one node per package, edges pointing at prerequisites.
    Dot,
    /// The install layers, first to last.
    #[default]
    Layers,
}

/// Resolve `opts.targets` without installing anything and render the result.
pub fn graph(
    ctx: &GlobalContext,
    backends: &Backends<'_>,
    opts: &SyncOptions,
    format: GraphFormat,
) -> Result<String> {
    let mut grapher = backends.grapher(opts.resolve.clone());
    if let Some(dir) = &opts.srcinfo_dir {
        grapher.graph_from_srcinfo(dir)?;
    }
    grapher.graph_from_targets(&opts.targets)?;
    let resolution = grapher.finish()?;

    Ok(match format {
        GraphFormat::Dot => resolution.graph.to_dot(|_, pkg| node_attrs(pkg)),
        GraphFormat::Layers => {
            let plan = InstallPlan::new(&resolution.graph, &ctx.build_dir());
            render_layers(&plan)
        }
    })
}

fn node_attrs(pkg: Option<&PackageRef>) -> String {
    let Some(pkg) = pkg else {
        return String::new();
    };
    let color = match pkg.source {
        PackageSource::RemoteBinary => "forestgreen",
        PackageSource::SourceBuild => "dodgerblue",
        PackageSource::LocalSourceFile => "darkorange",
    };
    let shape = if pkg.reason.is_dependency() { "ellipse" } else { "box" };
    format!("color={}, shape={}, tooltip=\"{} ({})\"", color, shape, pkg, pkg.reason)
}

fn render_layers(plan: &InstallPlan) -> String {
    let mut out = String::new();
    for (i, layer) in plan.layers.iter().enumerate() {
        let names: Vec<String> = layer.values().map(|pkg| pkg.to_string()).collect();
        let _ = writeln!(out, "{}: {}", i, names.join(" "));
    }
    out
}
