use crate::error::RenderError;
use crate::graph::Digraph;
use crate::union_find::DisjointSet;
use log::debug;

/// One source-to-terminal walk through the graph, as vertex names.
pub type RowPath<'a> = Vec<&'a str>;

/// Paths of one connected component.
#[derive(Debug)]
pub struct ComponentPaths<'a> {
    /// Sorted source names of the component.
    pub sources: Vec<&'a str>,
    pub members: Vec<&'a str>,
    pub paths: Result<Vec<RowPath<'a>>, RenderError>,
}

#[derive(Debug, Default)]
pub struct ReferenceTable<'a> {
    pub components: Vec<ComponentPaths<'a>>,
}

impl<'a> ReferenceTable<'a> {
    /// All row-paths in component order; the first broken component aborts.
    pub fn into_row_paths(self) -> Result<Vec<RowPath<'a>>, RenderError> {
        let mut rows = Vec::new();
        for component in self.components {
            rows.extend(component.paths?);
        }
        Ok(rows)
    }

    pub fn failed(&self) -> impl Iterator<Item = &ComponentPaths<'a>> {
        self.components.iter().filter(|c| c.paths.is_err())
    }
}

/// Partitions the graph into connected components and enumerates every
/// maximal directed path from each SOURCE vertex.
///
/// Components are ordered by their smallest source name, sources within a
/// component are sorted, and paths follow DFS pre-order over the arc order,
/// so the same input always yields the same rows.
///
/// An arc endpoint missing from the vertex set fails the whole build.
/// A cycle only fails the component it is found in.
pub fn build_reference_table<'a>(graph: &Digraph<'a>) -> Result<ReferenceTable<'a>, RenderError> {
    let mut names: Vec<&'a str> = graph.vertex_names().collect();
    names.sort_unstable();
    let mut sets = DisjointSet::new(names.iter().copied());

    let mut arcs: Vec<(&'a str, &'a str)> = graph.arcs().collect();
    arcs.sort_unstable();
    for (tail, head) in arcs {
        sets.union_by_name(tail, head)
            .map_err(|missing| RenderError::MissingVertex {
                name: missing.to_string(),
            })?;
    }

    let mut components = Vec::new();
    for members in sets.groups() {
        let mut sources: Vec<&'a str> = members
            .iter()
            .copied()
            .filter(|n| graph.vertex(n).is_some_and(|v| v.is_source()))
            .collect();
        if sources.is_empty() {
            debug!("skipping component of {} vertices without a source", members.len());
            continue;
        }
        sources.sort_unstable();

        let paths = component_paths(graph, &sources);
        if let Ok(p) = &paths {
            debug!("component rooted at {} yields {} row-paths", sources[0], p.len());
        }
        components.push(ComponentPaths {
            sources,
            members,
            paths,
        });
    }
    components.sort_by(|a, b| a.sources[0].cmp(b.sources[0]));

    Ok(ReferenceTable { components })
}

fn component_paths<'a>(
    graph: &Digraph<'a>,
    sources: &[&'a str],
) -> Result<Vec<RowPath<'a>>, RenderError> {
    let mut out = Vec::new();
    let mut path = Vec::new();
    for &source in sources {
        walk(graph, source, &mut path, &mut out)?;
    }
    Ok(out)
}

fn walk<'a>(
    graph: &Digraph<'a>,
    name: &'a str,
    path: &mut Vec<&'a str>,
    out: &mut Vec<RowPath<'a>>,
) -> Result<(), RenderError> {
    if path.contains(&name) {
        return Err(RenderError::Cycle {
            name: name.to_string(),
        });
    }
    path.push(name);
    let heads = graph.next(name);
    if heads.is_empty() {
        out.push(path.clone());
    } else {
        for &head in heads {
            walk(graph, head, path, out)?;
        }
    }
    path.pop();
    Ok(())
}
