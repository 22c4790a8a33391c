use std::collections::HashMap;

/// Disjoint-set forest over vertex names.
///
/// Names map to dense indices in the order they are given. `find` uses path
/// halving, `union` attaches the smaller tree under the larger.
#[derive(Debug, Clone)]
pub struct DisjointSet<'a> {
    parent: Vec<usize>,
    size: Vec<usize>,
    names: Vec<&'a str>,
    index: HashMap<&'a str, usize>,
}

impl<'a> DisjointSet<'a> {
    pub fn new<I>(names: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut index = HashMap::new();
        let mut ordered = Vec::new();
        for name in names {
            if !index.contains_key(name) {
                index.insert(name, ordered.len());
                ordered.push(name);
            }
        }
        let n = ordered.len();
        DisjointSet {
            parent: (0..n).collect(),
            size: vec![1; n],
            names: ordered,
            index,
        }
    }

    pub fn len(&self) -> usize {
        self.parent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parent.is_empty()
    }

    pub fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    /// Returns the root of the merged set.
    pub fn union(&mut self, a: usize, b: usize) -> usize {
        let mut ra = self.find(a);
        let mut rb = self.find(b);
        if ra == rb {
            return ra;
        }
        if self.size[ra] < self.size[rb] {
            std::mem::swap(&mut ra, &mut rb);
        }
        self.parent[rb] = ra;
        self.size[ra] += self.size[rb];
        ra
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn name_of(&self, index: usize) -> Option<&'a str> {
        self.names.get(index).copied()
    }

    /// Root name of the set containing `name`, or `None` for an unknown name.
    pub fn find_by_name(&mut self, name: &str) -> Option<&'a str> {
        let i = self.index_of(name)?;
        let root = self.find(i);
        Some(self.names[root])
    }

    /// Fails with the first unknown name.
    pub fn union_by_name<'n>(&mut self, a: &'n str, b: &'n str) -> Result<&'a str, &'n str> {
        let ia = self.index_of(a).ok_or(a)?;
        let ib = self.index_of(b).ok_or(b)?;
        let root = self.union(ia, ib);
        Ok(self.names[root])
    }

    /// Members grouped by root. Groups are ordered by their first member in
    /// construction order, members keep construction order.
    pub fn groups(&mut self) -> Vec<Vec<&'a str>> {
        let mut slot: HashMap<usize, usize> = HashMap::new();
        let mut groups: Vec<Vec<&'a str>> = Vec::new();
        for i in 0..self.len() {
            let root = self.find(i);
            let g = *slot.entry(root).or_insert_with(|| {
                groups.push(Vec::new());
                groups.len() - 1
            });
            groups[g].push(self.names[i]);
        }
        groups
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn union_joins_components() {
        let mut ds = DisjointSet::new(["a", "b", "c", "d"]);
        assert!(ds.union_by_name("a", "b").is_ok());
        assert!(ds.union_by_name("c", "b").is_ok());
        assert_eq!(ds.find_by_name("a"), ds.find_by_name("c"));
        assert_ne!(ds.find_by_name("a"), ds.find_by_name("d"));
        assert_eq!(ds.groups(), vec![vec!["a", "b", "c"], vec!["d"]]);
    }

    #[test]
    fn smaller_tree_goes_under_larger() {
        let mut ds = DisjointSet::new(["a", "b", "c"]);
        ds.union(0, 1);
        let root = ds.union(2, 0);
        assert_eq!(root, ds.find(0));
        assert_ne!(root, 2);
    }

    #[test]
    fn unknown_name_is_reported() {
        let mut ds = DisjointSet::new(["a"]);
        assert_eq!(ds.union_by_name("a", "zz"), Err("zz"));
        assert_eq!(ds.find_by_name("zz"), None);
    }
}
