use itertools::Itertools;
use smallvec::SmallVec;

use crate::{
    error::{Error, Result},
    request::DataRequest,
    ComponentMask, SystemDesc,
};

/// The components a system reads and writes, over all of its buffers
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Access {
    /// Components which are only read
    pub reads: ComponentMask,
    /// Components which are written
    pub writes: ComponentMask,
}

impl Access {
    /// Collects the access of a set of requests
    pub fn from_requests<'a>(requests: impl IntoIterator<Item = &'a DataRequest>) -> Self {
        let mut access = Self::default();
        for request in requests {
            if request.is_write() {
                access.writes.set(request.component);
            } else {
                access.reads.set(request.component);
            }
        }

        access
    }

    /// Returns true if running both systems concurrently could race
    pub fn conflicts(&self, other: &Self) -> bool {
        self.writes.intersects(&(other.reads | other.writes))
            || other.writes.intersects(&self.reads)
    }
}

/// A system and its resolved edges.
///
/// `incoming` holds the nodes which must finish before this one starts,
/// `outgoing` the nodes waiting for this one. Both are indices into the node
/// list.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SystemNode {
    /// Index of the system in registration order
    pub system: usize,
    /// Nodes this node depends on
    pub incoming: SmallVec<[usize; 4]>,
    /// Nodes depending on this node
    pub outgoing: SmallVec<[usize; 4]>,
}

impl SystemNode {
    fn new(system: usize) -> Self {
        Self {
            system,
            ..Default::default()
        }
    }
}

fn add_edge(nodes: &mut [SystemNode], from: usize, to: usize) {
    if !nodes[to].incoming.contains(&from) {
        nodes[to].incoming.push(from);
        nodes[from].outgoing.push(to);
    }
}

/// Builds one node per system with an edge `a -> b` for every
/// `b.depends_on(a)`.
///
/// The returned nodes are in registration order and unsorted.
pub fn order_by_dependencies(descs: &[&SystemDesc]) -> Result<Vec<SystemNode>> {
    let mut nodes = (0..descs.len()).map(SystemNode::new).collect_vec();

    for (index, desc) in descs.iter().enumerate() {
        for dependency in desc.dependencies() {
            let from = descs
                .iter()
                .position(|v| v.name() == dependency)
                .ok_or_else(|| Error::UnknownDependency {
                    system: desc.name().into(),
                    dependency: dependency.clone(),
                })?;

            add_edge(&mut nodes, from, index);
        }
    }

    Ok(nodes)
}

/// Same as [`order_by_dependencies`], with an additional edge between every
/// pair of systems whose accesses conflict.
///
/// Inferred edges point from the system which comes first in the dependency
/// order, falling back to registration order, so they never introduce a
/// cycle.
pub fn order_by_components(descs: &[&SystemDesc], access: &[Access]) -> Result<Vec<SystemNode>> {
    assert_eq!(descs.len(), access.len(), "Mismatched access list");

    let mut nodes = order_by_dependencies(descs)?;
    let order = sort_topologically(nodes.clone(), descs)?
        .into_iter()
        .map(|v| v.system)
        .collect_vec();

    for (i, &a) in order.iter().enumerate() {
        for &b in &order[i + 1..] {
            if access[a].conflicts(&access[b]) {
                add_edge(&mut nodes, a, b);
            }
        }
    }

    Ok(nodes)
}

/// Sorts nodes so that every node comes after all of its dependencies.
///
/// Each pass takes every node without remaining dependencies, in their current
/// order. Edges are re-indexed to the new positions. A pass which takes no
/// nodes means the remaining nodes form or depend on a cycle.
pub fn sort_topologically(
    nodes: Vec<SystemNode>,
    descs: &[&SystemDesc],
) -> Result<Vec<SystemNode>> {
    let n = nodes.len();
    let mut remaining = nodes.iter().map(|v| v.incoming.len()).collect_vec();
    let mut placed = vec![false; n];
    let mut order = Vec::with_capacity(n);

    while order.len() < n {
        let ready = (0..n)
            .filter(|&i| !placed[i] && remaining[i] == 0)
            .collect_vec();

        if ready.is_empty() {
            let cycle = (0..n)
                .filter(|&i| !placed[i])
                .map(|i| descs[nodes[i].system].name().to_string())
                .collect_vec();

            return Err(Error::DependencyCycle(cycle));
        }

        for i in ready {
            placed[i] = true;
            order.push(i);
            for &next in &nodes[i].outgoing {
                remaining[next] -= 1;
            }
        }
    }

    let mut position = vec![0; n];
    for (new, &old) in order.iter().enumerate() {
        position[old] = new;
    }

    Ok(order
        .iter()
        .map(|&old| {
            let node = &nodes[old];
            SystemNode {
                system: node.system,
                incoming: node.incoming.iter().map(|&v| position[v]).collect(),
                outgoing: node.outgoing.iter().map(|&v| position[v]).collect(),
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{ComponentId, Usage};

    fn names(nodes: &[SystemNode], descs: &[&SystemDesc]) -> Vec<String> {
        nodes
            .iter()
            .map(|v| descs[v.system].name().to_string())
            .collect()
    }

    #[test]
    fn chain() {
        let descs = [
            SystemDesc::new("c").depends_on("b"),
            SystemDesc::new("b").depends_on("a"),
            SystemDesc::new("a"),
        ];
        let descs = descs.iter().collect_vec();

        let nodes = order_by_dependencies(&descs).unwrap();
        let sorted = sort_topologically(nodes, &descs).unwrap();
        assert_eq!(names(&sorted, &descs), ["a", "b", "c"]);

        // Edges point to earlier nodes after re-indexing
        for (i, node) in sorted.iter().enumerate() {
            assert!(node.incoming.iter().all(|&v| v < i));
            assert!(node.outgoing.iter().all(|&v| v > i));
        }
    }

    #[test]
    fn diamond() {
        let descs = [
            SystemDesc::new("d").depends_on("b").depends_on("c"),
            SystemDesc::new("b").depends_on("a"),
            SystemDesc::new("c").depends_on("a").depends_on("a"),
            SystemDesc::new("a"),
        ];
        let descs = descs.iter().collect_vec();

        let nodes = order_by_dependencies(&descs).unwrap();
        let sorted = names(&sort_topologically(nodes, &descs).unwrap(), &descs);

        assert_eq!(sorted.first().map(String::as_str), Some("a"));
        assert_eq!(sorted.last().map(String::as_str), Some("d"));
        assert_eq!(sorted.len(), 4);
    }

    #[test]
    fn cycle() {
        let descs = [
            SystemDesc::new("a").depends_on("c"),
            SystemDesc::new("b").depends_on("a"),
            SystemDesc::new("c").depends_on("b"),
            SystemDesc::new("d"),
        ];
        let descs = descs.iter().collect_vec();

        let nodes = order_by_dependencies(&descs).unwrap();
        assert_eq!(
            sort_topologically(nodes, &descs),
            Err(Error::DependencyCycle(vec![
                "a".into(),
                "b".into(),
                "c".into()
            ]))
        );
    }

    #[test]
    fn unknown_dependency() {
        let descs = [SystemDesc::new("a").depends_on("missing")];
        let descs = descs.iter().collect_vec();

        assert_eq!(
            order_by_dependencies(&descs),
            Err(Error::UnknownDependency {
                system: "a".into(),
                dependency: "missing".into()
            })
        );
    }

    #[test]
    fn infer_conflicts() {
        let position = ComponentId::new(0);
        let velocity = ComponentId::new(1);
        let mass = ComponentId::new(2);

        let request =
            |component, usage| DataRequest::new(component, usage, crate::Cardinality::Required);

        // Registered before `integrate` but explicitly ordered after it
        let render = SystemDesc::new("render").depends_on("integrate");
        let integrate = SystemDesc::new("integrate");
        let gravity = SystemDesc::new("gravity");
        let inspect = SystemDesc::new("inspect");
        let descs = [&render, &integrate, &gravity, &inspect];

        let access = [
            Access::from_requests(&[request(position, Usage::Read)]),
            Access::from_requests(&[
                request(position, Usage::Write),
                request(velocity, Usage::Read),
            ]),
            Access::from_requests(&[request(velocity, Usage::Write), request(mass, Usage::Read)]),
            Access::from_requests(&[request(mass, Usage::Read)]),
        ];

        let nodes = order_by_components(&descs, &access).unwrap();
        // integrate writes position which render reads
        assert_eq!(nodes[0].incoming.as_slice(), [1]);
        // gravity writes velocity which integrate reads, registered later
        assert_eq!(nodes[2].incoming.as_slice(), [1]);
        // Both only read mass
        assert!(nodes[3].incoming.is_empty());

        let sorted = names(&sort_topologically(nodes, &descs).unwrap(), &descs);
        assert_eq!(sorted, ["integrate", "inspect", "render", "gravity"]);
    }
}
