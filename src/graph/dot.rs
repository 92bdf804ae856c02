//! Graphviz rendering.

use std::fmt::Write;

use super::DependencyGraph;

impl<V> DependencyGraph<V> {
    /// Render the graph in DOT format.
    ///
    /// `attrs` returns extra node attributes (e.g. `color=red`) or an empty string.
    pub fn to_dot<F>(&self, attrs: F) -> String
    where
        F: Fn(&str, Option<&V>) -> String,
    {
        let mut out = String::from("digraph {\n    rankdir=LR;\n");

        for name in self.node_names() {
            let extra = attrs(name, self.node_info(name));
            if extra.is_empty() {
                let _ = writeln!(out, "    \"{}\";", name);
            } else {
                let _ = writeln!(out, "    \"{}\" [{}];", name, extra);
            }
        }

        for (child, parent) in self.edges() {
            let _ = writeln!(out, "    \"{}\" -> \"{}\";", child, parent);
        }

        for (alias, name) in &self.aliases {
            let _ = writeln!(
                out,
                "    \"{}\" -> \"{}\" [style=dashed, label=\"provides\"];",
                name, alias
            );
        }

        out.push_str("}\n");
        out
    }
}
