use crate::error::RenderError;
use crate::vertex::{Arc, Vertex};
use std::collections::{HashMap, HashSet};

/// Read-only query structure over one render's vertices and arcs.
///
/// Built once per render call; borrows the study it was built from.
#[derive(Debug)]
pub struct Digraph<'a> {
    vertices: HashMap<&'a str, &'a Vertex>,
    arcs: HashSet<(&'a str, &'a str)>,
    sources: Vec<&'a str>,
    next: HashMap<&'a str, Vec<&'a str>>,
}

impl<'a> Digraph<'a> {
    /// Duplicate arcs are kept once. Heads are listed in arc order. A
    /// `unique_name` given twice fails with `DuplicateVertex`.
    pub fn new<V, A>(vertices: V, arcs: A) -> Result<Self, RenderError>
    where
        V: IntoIterator<Item = &'a Vertex>,
        A: IntoIterator<Item = &'a Arc>,
    {
        let mut index = HashMap::new();
        let mut sources = Vec::new();
        for v in vertices {
            if index.insert(v.unique_name(), v).is_some() {
                return Err(RenderError::DuplicateVertex {
                    name: v.unique_name().to_string(),
                });
            }
            if v.is_source() {
                sources.push(v.unique_name());
            }
        }

        let mut arc_set = HashSet::new();
        let mut next: HashMap<&'a str, Vec<&'a str>> = HashMap::new();
        for arc in arcs {
            if arc_set.insert((arc.tail(), arc.head())) {
                next.entry(arc.tail()).or_default().push(arc.head());
            }
        }

        Ok(Digraph {
            vertices: index,
            arcs: arc_set,
            sources,
            next,
        })
    }

    pub fn vertex(&self, name: &str) -> Option<&'a Vertex> {
        self.vertices.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.vertices.contains_key(name)
    }

    pub fn vertex_names(&self) -> impl Iterator<Item = &'a str> + '_ {
        self.vertices.keys().copied()
    }

    pub fn arcs(&self) -> impl Iterator<Item = (&'a str, &'a str)> + '_ {
        self.arcs.iter().copied()
    }

    pub fn sources(&self) -> &[&'a str] {
        &self.sources
    }

    /// Heads reachable by one arc from `name`; empty for a terminal.
    pub fn next(&self, name: &str) -> &[&'a str] {
        self.next.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_terminal(&self, name: &str) -> bool {
        self.next(name).is_empty()
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn arc_count(&self) -> usize {
        self.arcs.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vertex::{ItemKind, Material, Process};

    #[test]
    fn adjacency_keeps_arc_order_and_drops_duplicates() {
        let vertices: Vec<Vertex> = vec![
            Material::create("s1", "S1", ItemKind::Source).into(),
            Process::create("p1", None).into(),
            Process::create("p2", None).into(),
        ];
        let arcs = vec![
            Arc::new("s1", "p2"),
            Arc::new("s1", "p1"),
            Arc::new("s1", "p2"),
        ];
        let graph = Digraph::new(&vertices, &arcs).unwrap();

        assert_eq!(graph.next("s1"), &["p2", "p1"]);
        assert_eq!(graph.arc_count(), 2);
        assert!(graph.is_terminal("p1"));
        assert_eq!(graph.sources(), &["s1"]);
    }

    #[test]
    fn duplicate_name_is_rejected() {
        let vertices: Vec<Vertex> = vec![
            Material::create("s1", "S1", ItemKind::Source).into(),
            Process::create("s1", None).into(),
        ];
        let arcs: Vec<Arc> = Vec::new();
        assert_eq!(
            Digraph::new(&vertices, &arcs).unwrap_err(),
            RenderError::DuplicateVertex {
                name: "s1".to_string()
            }
        );
    }

    #[test]
    fn unknown_tail_has_no_heads() {
        let vertices: Vec<Vertex> = Vec::new();
        let arcs: Vec<Arc> = Vec::new();
        let graph = Digraph::new(&vertices, &arcs).unwrap();
        assert!(graph.next("missing").is_empty());
        assert!(!graph.contains("missing"));
    }
}
