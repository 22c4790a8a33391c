/*!
# Sample Sheets

Table-building engine for ISA-Tab sample sheets, written in Rust.

## Overview

An investigation imported from ISA-Tab files arrives as a directed graph of
materials (sources, samples, extracts, data files) and processes, one graph
per study with extra arcs for each of its assays. This crate turns that graph
into the two-level tables shown and edited in the sample sheet UI, and derives
the per-column editing configuration stored for each project.

## Pipeline

1. **Graph Model** (`graph`) - reverse index, arc set, sources and adjacency.
2. **Union-Find** (`union_find`) - partitions the graph into connected
   components.
3. **Reference Table** (`reference`) - every source-to-terminal path of each
   component, in a stable order.
4. **Sample Sheet Tables** (`rendering`) - top header, field header and cells,
   split into a study table and one table per assay.
5. **Sheet Configuration** (`sheet_config`) - versioned field configuration
   built from the tables, validated against a minimum version and restored
   across re-imports.

Every render is a pure function of its input: a fresh graph and union-find
are built per call and nothing is shared between calls.

## Persistence

- Sheet configuration JSON blobs per project (`saving::ConfigStore`)
- Cached tables per study as gzip-compressed bincode (`saving::TableCache`)

## Modules

- **vertex**: materials, processes, arcs, studies and assays
- **graph**: query structure over one render's vertices and arcs
- **union_find**: disjoint sets over vertex names
- **reference**: row-path enumeration
- **table**: rendered table types and the row schema
- **rendering**: study and assay table builder
- **sheet_config**: editing configuration
- **saving**: configuration store and table cache
- **settings**: engine settings
- **error**: error types
*/

pub mod error;
pub mod graph;
pub mod reference;
pub mod rendering;
pub mod saving;
pub mod settings;
pub mod sheet_config;
pub mod table;
pub mod union_find;
pub mod vertex;

pub use error::*;
pub use graph::Digraph;
pub use reference::{ComponentPaths, ReferenceTable, RowPath, build_reference_table};
pub use rendering::{LinkResolver, NoLinks, render_study, render_study_with};
pub use saving::{ConfigStore, FileConfigStore, MemoryConfigStore, TableCache};
pub use settings::Settings;
pub use sheet_config::*;
pub use table::*;
pub use union_find::DisjointSet;
pub use vertex::*;
