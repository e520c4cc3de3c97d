//! Resource dependency graph of a snapshot.
//!
//! Edges run from a resource to the resources its descriptor references, and
//! from each command (or pass) to the resources its arguments reference.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;

use framescope_shared::{
    EncoderItem, FrameCommand, FrameSnapshot, PassKind, ResourceId, ResourceKind, Value,
};

/// A command, pass or encoder that refers to resources.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandUse {
    pub sequence: u64,
    pub label: String,
    pub references: BTreeSet<ResourceId>,
}

/// Dependencies-first creation order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreationOrder {
    /// Resources whose whole dependency closure is present and acyclic
    pub order: Vec<ResourceId>,
    /// Referenced ids with no record in the snapshot
    pub unresolved: BTreeSet<ResourceId>,
    /// Ids found on a reference cycle; left out of `order`
    pub cyclic: BTreeSet<ResourceId>,
}

#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    frame_id: u64,
    kinds: BTreeMap<ResourceId, ResourceKind>,
    labels: BTreeMap<ResourceId, String>,
    dependencies: BTreeMap<ResourceId, BTreeSet<ResourceId>>,
    uses: Vec<CommandUse>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Visit {
    Active,
    Done(bool),
}

impl DependencyGraph {
    pub fn build(snapshot: &FrameSnapshot) -> Self {
        let mut graph = DependencyGraph {
            frame_id: snapshot.frame_id,
            ..Default::default()
        };

        for record in &snapshot.resources {
            graph.kinds.insert(record.id, record.kind);
            if let Some(label) = record.descriptor.get("label").and_then(Value::as_str) {
                graph.labels.insert(record.id, label.to_owned());
            }
            graph
                .dependencies
                .insert(record.id, record.descriptor.refs().into_iter().collect());
        }

        for command in &snapshot.commands {
            match command {
                FrameCommand::Base(base) => {
                    graph.add_use(base.sequence, base.opcode.to_string(), &base.args);
                }
                FrameCommand::Encoder(encoder) => {
                    graph.add_use(
                        encoder.start_sequence,
                        format!("encoder {}", encoder.id),
                        std::slice::from_ref(&encoder.descriptor),
                    );
                    for item in &encoder.items {
                        match item {
                            EncoderItem::Pass(pass) => {
                                let kind = match pass.pass_kind {
                                    PassKind::Render => "render",
                                    PassKind::Compute => "compute",
                                };
                                graph.add_use(
                                    pass.start_sequence,
                                    format!("{kind} pass {}", pass.id),
                                    std::slice::from_ref(&pass.descriptor),
                                );
                                for cmd in &pass.items {
                                    graph.add_use(cmd.sequence, cmd.opcode.to_string(), &cmd.args);
                                }
                            }
                            EncoderItem::Command(cmd) => {
                                graph.add_use(cmd.sequence, cmd.opcode.to_string(), &cmd.args);
                            }
                        }
                    }
                }
            }
        }
        graph.uses.sort_by_key(|usage| usage.sequence);
        graph
    }

    fn add_use(&mut self, sequence: u64, label: String, values: &[Value]) {
        let references: BTreeSet<ResourceId> = values.iter().flat_map(Value::refs).collect();
        if !references.is_empty() {
            self.uses.push(CommandUse {
                sequence,
                label,
                references,
            });
        }
    }

    pub fn frame_id(&self) -> u64 {
        self.frame_id
    }

    pub fn resource_count(&self) -> usize {
        self.kinds.len()
    }

    pub fn kind_of(&self, id: ResourceId) -> Option<ResourceKind> {
        self.kinds.get(&id).copied()
    }

    /// Resources `id`'s descriptor references directly.
    pub fn dependencies_of(&self, id: ResourceId) -> impl Iterator<Item = ResourceId> + '_ {
        self.dependencies.get(&id).into_iter().flatten().copied()
    }

    /// Resources whose descriptors reference `id` directly.
    pub fn dependents_of(&self, id: ResourceId) -> Vec<ResourceId> {
        self.dependencies
            .iter()
            .filter(|(_, deps)| deps.contains(&id))
            .map(|(dependent, _)| *dependent)
            .collect()
    }

    /// Commands in sequence order, each with the resources it references.
    pub fn command_uses(&self) -> &[CommandUse] {
        &self.uses
    }

    /// Every `(from, to)` resource edge.
    pub fn edges(&self) -> impl Iterator<Item = (ResourceId, ResourceId)> + '_ {
        self.dependencies
            .iter()
            .flat_map(|(from, deps)| deps.iter().map(move |to| (*from, *to)))
    }

    /// Referenced ids, from descriptors or commands, that have no record.
    pub fn missing_references(&self) -> BTreeSet<ResourceId> {
        self.dependencies
            .values()
            .flatten()
            .chain(self.uses.iter().flat_map(|usage| usage.references.iter()))
            .filter(|id| !self.kinds.contains_key(id))
            .copied()
            .collect()
    }

    /// Orders every resource after the resources it depends on.
    pub fn creation_order(&self) -> CreationOrder {
        let mut result = CreationOrder::default();
        let mut state: BTreeMap<ResourceId, Visit> = BTreeMap::new();
        for id in self.kinds.keys() {
            self.visit(*id, &mut state, &mut result);
        }
        result
    }

    /// Returns whether `id` and everything it depends on can be created.
    fn visit(
        &self,
        id: ResourceId,
        state: &mut BTreeMap<ResourceId, Visit>,
        result: &mut CreationOrder,
    ) -> bool {
        match state.get(&id) {
            Some(Visit::Done(creatable)) => return *creatable,
            Some(Visit::Active) => {
                result.cyclic.insert(id);
                return false;
            }
            None => {}
        }
        if !self.kinds.contains_key(&id) {
            result.unresolved.insert(id);
            state.insert(id, Visit::Done(false));
            return false;
        }

        state.insert(id, Visit::Active);
        let mut creatable = true;
        for dep in self.dependencies_of(id) {
            creatable &= self.visit(dep, state, result);
        }
        state.insert(id, Visit::Done(creatable));
        if creatable {
            result.order.push(id);
        }
        creatable
    }

    /// Graphviz rendering: boxes for resources, ellipses for commands,
    /// dashed nodes for missing ids.
    pub fn to_dot(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "digraph frame_{} {{", self.frame_id);
        let _ = writeln!(out, "    rankdir=LR;");
        let _ = writeln!(out, "    node [shape=box];");

        for (id, kind) in &self.kinds {
            let label = match self.labels.get(id) {
                Some(name) => format!("{kind} {id}\\n{}", escape(name)),
                None => format!("{kind} {id}"),
            };
            let _ = writeln!(out, "    r{} [label=\"{label}\"];", id.get());
        }
        for id in self.missing_references() {
            let _ = writeln!(
                out,
                "    r{} [label=\"{id} (missing)\", style=dashed];",
                id.get()
            );
        }
        for (from, to) in self.edges() {
            let _ = writeln!(out, "    r{} -> r{};", from.get(), to.get());
        }
        for usage in &self.uses {
            let _ = writeln!(
                out,
                "    c{} [shape=ellipse, label=\"{}: {}\"];",
                usage.sequence,
                usage.sequence,
                escape(&usage.label)
            );
            for id in &usage.references {
                let _ = writeln!(out, "    c{} -> r{};", usage.sequence, id.get());
            }
        }
        out.push_str("}\n");
        out
    }
}

fn escape(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;
    use framescope_shared::{BaseCommand, QueueOp, ResourceRecord};

    fn id(n: u64) -> ResourceId {
        ResourceId::new(n)
    }

    fn record(n: u64, kind: ResourceKind, refs: &[u64]) -> ResourceRecord {
        ResourceRecord {
            id: id(n),
            kind,
            descriptor: Value::object([(
                "refs",
                Value::Array(refs.iter().map(|r| Value::from(id(*r))).collect()),
            )]),
            data: None,
        }
    }

    fn snapshot(resources: Vec<ResourceRecord>, commands: Vec<FrameCommand>) -> FrameSnapshot {
        FrameSnapshot {
            frame_id: 1,
            timing: Default::default(),
            surface_size: Default::default(),
            surface_config: Value::Null,
            adapter_options: Value::Null,
            device_descriptor: Value::Null,
            resources,
            commands,
        }
    }

    #[test]
    fn test_creation_order_puts_dependencies_first() {
        let graph = DependencyGraph::build(&snapshot(
            vec![
                record(1, ResourceKind::BindGroup, &[3, 2]),
                record(2, ResourceKind::Buffer, &[]),
                record(3, ResourceKind::BindGroupLayout, &[]),
            ],
            vec![],
        ));
        let order = graph.creation_order();
        assert_eq!(order.order, vec![id(2), id(3), id(1)]);
        assert!(order.unresolved.is_empty());
        assert!(order.cyclic.is_empty());
    }

    #[test]
    fn test_unresolved_ids_reported() {
        let graph = DependencyGraph::build(&snapshot(
            vec![record(1, ResourceKind::BindGroup, &[9])],
            vec![FrameCommand::Base(BaseCommand {
                sequence: 0,
                opcode: QueueOp::WriteBuffer,
                args: vec![Value::from(id(8))],
            })],
        ));
        let order = graph.creation_order();
        assert!(order.order.is_empty());
        assert_eq!(order.unresolved, BTreeSet::from([id(9)]));
        assert_eq!(graph.missing_references(), BTreeSet::from([id(8), id(9)]));
    }

    #[test]
    fn test_cycle_reported() {
        let graph = DependencyGraph::build(&snapshot(
            vec![
                record(1, ResourceKind::BindGroup, &[2]),
                record(2, ResourceKind::BindGroupLayout, &[1]),
                record(3, ResourceKind::Sampler, &[]),
            ],
            vec![],
        ));
        let order = graph.creation_order();
        assert_eq!(order.order, vec![id(3)]);
        assert!(order.cyclic.contains(&id(1)));
    }

    #[test]
    fn test_dependents_and_edges() {
        let graph = DependencyGraph::build(&snapshot(
            vec![
                record(1, ResourceKind::BindGroup, &[2]),
                record(2, ResourceKind::Buffer, &[]),
                record(3, ResourceKind::BindGroup, &[2]),
            ],
            vec![],
        ));
        assert_eq!(graph.dependents_of(id(2)), vec![id(1), id(3)]);
        assert_eq!(graph.edges().count(), 2);
        assert_eq!(graph.dependencies_of(id(1)).collect::<Vec<_>>(), vec![id(2)]);
    }

    #[test]
    fn test_dot_output() {
        let mut labelled = record(2, ResourceKind::Buffer, &[]);
        labelled.descriptor = Value::object([("label", Value::from("ve\"rts"))]);
        let graph = DependencyGraph::build(&snapshot(
            vec![record(1, ResourceKind::BindGroup, &[2]), labelled],
            vec![FrameCommand::Base(BaseCommand {
                sequence: 4,
                opcode: QueueOp::WriteBuffer,
                args: vec![Value::from(id(2))],
            })],
        ));
        let dot = graph.to_dot();
        assert!(dot.starts_with("digraph frame_1 {"));
        assert!(dot.contains("r1 -> r2;"));
        assert!(dot.contains("c4 -> r2;"));
        assert!(dot.contains("ve\\\"rts"));
        assert!(dot.trim_end().ends_with('}'));
    }
}
