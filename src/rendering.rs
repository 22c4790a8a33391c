use crate::error::RenderError;
use crate::graph::Digraph;
use crate::reference::build_reference_table;
use crate::settings::Settings;
use crate::table::{
    Category, Cell, ColumnKey, ColumnType, FieldHeader, HeaderType, ObjClass, RenderedTable,
    RowSchema, StudyTables, TopHeader, finite_number,
};
use crate::vertex::{
    AttrValue, Assay, Attribute, ItemKind, Material, Process, Scalar, Study, Vertex,
};
use indexmap::IndexMap;
use log::{debug, info};
use std::collections::HashSet;

/// Seam to the storage backend: resolves file links for DATA vertices.
pub trait LinkResolver {
    fn data_link(&self, study: &Study, assay: Option<&Assay>, material: &Material) -> Option<String>;
}

/// Resolves no links.
pub struct NoLinks;

impl LinkResolver for NoLinks {
    fn data_link(&self, _: &Study, _: Option<&Assay>, _: &Material) -> Option<String> {
        None
    }
}

/// Renders a study with default settings and no file links.
pub fn render_study(study: &Study) -> Result<StudyTables, RenderError> {
    render_study_with(study, &Settings::default(), &NoLinks)
}

/// Builds the study table and one table per assay.
///
/// Row-paths are computed once over the study arcs plus all assay arcs.
/// Each path is cut after its sample for the study table, and contributes
/// whole to every assay owning one of its vertices past the sample.
pub fn render_study_with(
    study: &Study,
    settings: &Settings,
    links: &dyn LinkResolver,
) -> Result<StudyTables, RenderError> {
    let graph = Digraph::new(&study.vertices, study.all_arcs())?;
    let paths = build_reference_table(&graph)?.into_row_paths()?;

    let mut rows: Vec<Vec<&Vertex>> = Vec::with_capacity(paths.len());
    for path in &paths {
        let row = path
            .iter()
            .map(|name| {
                graph.vertex(name).ok_or_else(|| RenderError::MissingVertex {
                    name: name.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        rows.push(row);
    }

    if rows.is_empty() {
        info!("study {} has no row-paths", study.name);
        return Ok(StudyTables {
            study: RenderedTable::default(),
            assays: study
                .assays
                .iter()
                .map(|a| (a.id.clone(), RenderedTable::default()))
                .collect(),
        });
    }

    let sample_index = locate_sample(0, &rows[0])?;
    for (i, row) in rows.iter().enumerate().skip(1) {
        let found = locate_sample(i, row)?;
        if found != sample_index {
            return Err(RenderError::SampleIndexMismatch {
                row: i,
                expected: sample_index,
                found,
            });
        }
    }
    debug!("study {}: sample at path position {}", study.name, sample_index);

    let mut seen = HashSet::new();
    let study_rows: Vec<&[&Vertex]> = rows
        .iter()
        .map(|r| &r[..=sample_index])
        .filter(|r| {
            !settings.study_dedup || seen.insert(r.iter().map(|v| v.unique_name()).collect::<Vec<_>>())
        })
        .collect();
    let ctx = Context {
        study,
        assay: None,
        links,
    };
    let study_table = build_table(&study.name, &study_rows, &ctx)?;

    let mut assays = IndexMap::new();
    for assay in &study.assays {
        let assay_rows: Vec<&[&Vertex]> = rows
            .iter()
            .filter(|r| r[sample_index + 1..].iter().any(|v| assay.contains(v)))
            .map(|r| r.as_slice())
            .collect();
        let ctx = Context {
            study,
            assay: Some(assay),
            links,
        };
        let table = build_table(&assay.id, &assay_rows, &ctx)?;
        debug!("assay {}: {} rows", assay.id, table.table_data.len());
        assays.insert(assay.id.clone(), table);
    }

    info!(
        "rendered study {}: {} study rows, {} assay tables",
        study.name,
        study_table.table_data.len(),
        assays.len()
    );
    Ok(StudyTables {
        study: study_table,
        assays,
    })
}

fn locate_sample(row: usize, vertices: &[&Vertex]) -> Result<usize, RenderError> {
    let mut samples = vertices.iter().enumerate().filter(|(_, v)| v.is_sample());
    let (index, _) = samples.next().ok_or(RenderError::NoSample { row })?;
    let extra = samples.count();
    if extra > 0 {
        return Err(RenderError::MultipleSamples {
            row,
            count: extra + 1,
        });
    }
    Ok(index)
}

struct Context<'s> {
    study: &'s Study,
    assay: Option<&'s Assay>,
    links: &'s dyn LinkResolver,
}

/// One rendered column of one vertex.
struct Column {
    key: ColumnKey,
    label: String,
    cell: Cell,
    ontology: bool,
}

#[derive(Default)]
struct ColumnStats {
    ontology: bool,
    unit: bool,
    numeric: bool,
    values: usize,
}

fn build_table(label: &str, rows: &[&[&Vertex]], ctx: &Context) -> Result<RenderedTable, RenderError> {
    let mut table = RenderedTable::default();
    let Some(first) = rows.first() else {
        return Ok(table);
    };

    let mut schema_columns = Vec::new();
    for vertex in first.iter() {
        let columns = vertex_columns(vertex, ctx);
        table.top_header.push(TopHeader {
            value: group_label(vertex),
            category: category(vertex),
            colspan: columns.len(),
        });
        for c in columns {
            table.field_header.push(FieldHeader {
                value: c.label,
                name: c.key.name.clone(),
                header_type: c.key.header_type,
                obj_cls: obj_cls(vertex),
                item_type: c.key.category,
                col_type: ColumnType::Plain,
                num_col: false,
            });
            schema_columns.push(c.key);
        }
    }
    let schema = RowSchema::new(label, schema_columns);
    debug!("table {}: {} columns from first row", label, schema.len());

    let mut stats: Vec<ColumnStats> = (0..schema.len())
        .map(|_| ColumnStats {
            numeric: true,
            ..ColumnStats::default()
        })
        .collect();
    let mut previous: Option<&[&Vertex]> = None;

    for (i, row) in rows.iter().enumerate() {
        let shared = previous.map_or(0, |p| shared_prefix(p, row));
        let mut keys = Vec::with_capacity(schema.len());
        let mut cells = Vec::with_capacity(schema.len());
        for (j, vertex) in row.iter().enumerate() {
            for mut c in vertex_columns(vertex, ctx) {
                c.cell.repeat = j < shared;
                if let Some(s) = stats.get_mut(cells.len()) {
                    s.ontology |= c.ontology;
                    s.unit |= c.cell.unit.is_some();
                    if let Some(v) = &c.cell.value {
                        s.values += 1;
                        s.numeric &= finite_number(v).is_some();
                    }
                }
                keys.push(c.key);
                cells.push(c.cell);
            }
        }
        schema.validate(i, &keys)?;
        table.table_data.push(cells);
        previous = Some(*row);
    }

    for (header, s) in table.field_header.iter_mut().zip(&stats) {
        header.col_type = column_type(header, s);
        header.num_col = s.numeric
            && s.values > 0
            && !matches!(header.header_type, HeaderType::Protocol | HeaderType::Name);
    }
    Ok(table)
}

fn shared_prefix(a: &[&Vertex], b: &[&Vertex]) -> usize {
    a.iter()
        .zip(b)
        .take_while(|(x, y)| x.unique_name() == y.unique_name())
        .count()
}

fn column_type(header: &FieldHeader, s: &ColumnStats) -> ColumnType {
    match header.header_type {
        HeaderType::Name if header.item_type == Category::Data => ColumnType::LinkFile,
        HeaderType::Name => ColumnType::Name,
        HeaderType::Protocol => ColumnType::Protocol,
        HeaderType::Performer => ColumnType::Contact,
        HeaderType::PerformDate => ColumnType::Date,
        _ if s.ontology => ColumnType::Ontology,
        _ if s.unit => ColumnType::Unit,
        _ => ColumnType::Plain,
    }
}

fn category(vertex: &Vertex) -> Category {
    match vertex {
        Vertex::Material(m) => m.kind.into(),
        Vertex::Process(_) => Category::Process,
    }
}

fn obj_cls(vertex: &Vertex) -> ObjClass {
    match vertex {
        Vertex::Material(_) => ObjClass::Material,
        Vertex::Process(_) => ObjClass::Process,
    }
}

fn group_label(vertex: &Vertex) -> String {
    match vertex {
        Vertex::Material(m) => m
            .material_type
            .clone()
            .unwrap_or_else(|| m.kind.label().to_string()),
        Vertex::Process(p) => p.protocol.clone().unwrap_or_else(|| "Process".to_string()),
    }
}

fn vertex_columns(vertex: &Vertex, ctx: &Context) -> Vec<Column> {
    match vertex {
        Vertex::Material(m) => material_columns(m, ctx),
        Vertex::Process(p) => process_columns(p),
    }
}

fn material_columns(m: &Material, ctx: &Context) -> Vec<Column> {
    let category = Category::from(m.kind);
    let mut name_cell = Cell::text(Some(&m.name));
    if m.kind == ItemKind::Data {
        name_cell.link = ctx.links.data_link(ctx.study, ctx.assay, m);
    }
    let mut columns = vec![fixed(category, HeaderType::Name, "Name", name_cell, &m.unique_name)];

    if let Some(label) = &m.extract_label {
        columns.push(attribute_column(
            category,
            HeaderType::ExtractLabel,
            "Label",
            label,
            &m.unique_name,
        ));
    }
    for (name, attr) in &m.characteristics {
        columns.push(attribute_column(
            category,
            HeaderType::Characteristics,
            name,
            attr,
            &m.unique_name,
        ));
    }
    if m.kind == ItemKind::Sample {
        for (name, attr) in &m.factor_values {
            columns.push(attribute_column(
                category,
                HeaderType::FactorValues,
                name,
                attr,
                &m.unique_name,
            ));
        }
    }
    push_comments(&mut columns, category, &m.comments, &m.unique_name);
    columns
}

fn process_columns(p: &Process) -> Vec<Column> {
    let category = Category::Process;
    let mut columns = Vec::new();
    match &p.protocol {
        Some(protocol) => columns.push(fixed(
            category,
            HeaderType::Protocol,
            "Protocol",
            Cell::text(Some(protocol)),
            &p.unique_name,
        )),
        None => columns.push(fixed(
            category,
            HeaderType::Name,
            "Name",
            Cell::text(p.name.as_deref()),
            &p.unique_name,
        )),
    }
    for (name, attr) in &p.parameter_values {
        columns.push(attribute_column(
            category,
            HeaderType::ParameterValues,
            name,
            attr,
            &p.unique_name,
        ));
    }
    if let Some(performer) = &p.performer {
        columns.push(fixed(
            category,
            HeaderType::Performer,
            "Performer",
            Cell::text(Some(performer)),
            &p.unique_name,
        ));
    }
    if let Some(date) = &p.perform_date {
        columns.push(fixed(
            category,
            HeaderType::PerformDate,
            "Perform Date",
            Cell::text(Some(date)),
            &p.unique_name,
        ));
    }
    push_comments(&mut columns, category, &p.comments, &p.unique_name);
    columns
}

fn push_comments(
    columns: &mut Vec<Column>,
    category: Category,
    comments: &IndexMap<String, String>,
    vertex: &str,
) {
    for (name, text) in comments {
        columns.push(Column {
            key: key(category, HeaderType::Comments, name),
            label: name.clone(),
            cell: with_vertex(Cell::text(Some(text)), vertex),
            ontology: false,
        });
    }
}

fn fixed(category: Category, header_type: HeaderType, label: &str, cell: Cell, vertex: &str) -> Column {
    Column {
        key: key(category, header_type, label),
        label: label.to_string(),
        cell: with_vertex(cell, vertex),
        ontology: false,
    }
}

fn attribute_column(
    category: Category,
    header_type: HeaderType,
    name: &str,
    attr: &Attribute,
    vertex: &str,
) -> Column {
    let (cell, ontology) = attribute_cell(attr);
    Column {
        key: key(category, header_type, name),
        label: name.to_string(),
        cell: with_vertex(cell, vertex),
        ontology,
    }
}

fn key(category: Category, header_type: HeaderType, name: &str) -> ColumnKey {
    ColumnKey {
        category,
        header_type,
        name: name.to_string(),
    }
}

fn with_vertex(mut cell: Cell, vertex: &str) -> Cell {
    cell.attrs.insert("vertex".to_string(), vertex.to_string());
    cell
}

/// Ontology terms display their name and link to their accession. Multiple
/// values are joined with `;`.
fn attribute_cell(attr: &Attribute) -> (Cell, bool) {
    let mut cell = Cell::default();
    let mut ontology = false;

    if let Some(value) = &attr.value {
        let scalars = value.scalars();
        let names: Vec<&str> = scalars.iter().map(|s| s.display()).collect();
        let joined = names.join(";");
        if !joined.is_empty() {
            cell.value = Some(joined);
        }
        let terms: Vec<_> = scalars
            .iter()
            .filter_map(|s| match s {
                Scalar::Ontology(t) => Some(t),
                Scalar::Plain(_) => None,
            })
            .collect();
        if !terms.is_empty() {
            ontology = true;
            let accessions: Vec<&str> = terms.iter().map(|t| t.accession.as_str()).collect();
            let sources: Vec<&str> = terms.iter().map(|t| t.ontology_name.as_str()).collect();
            cell.link = Some(accessions.join(";")).filter(|s| !s.is_empty());
            cell.tooltip = Some(sources.join(";")).filter(|s| !s.is_empty());
        }
        if matches!(value, AttrValue::Multiple(_)) {
            cell.attrs.insert("multiple".to_string(), scalars.len().to_string());
        }
    }

    if let Some(unit) = &attr.unit {
        cell.unit = Some(unit.display().to_string()).filter(|s| !s.is_empty());
        if let Scalar::Ontology(t) = unit {
            cell.attrs.insert("unit_accession".to_string(), t.accession.clone());
        }
    }
    (cell, ontology)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vertex::{Arc, OntologyRef, Scalar};

    fn chain() -> Study {
        let mut study = Study::create("s");
        let mut source = Material::create("s1", "S1", ItemKind::Source);
        source
            .characteristics
            .insert("age".to_string(), Attribute::plain("42").with_unit(Scalar::Plain("year".into())));
        let sample = Material::create("sm1", "SM1", ItemKind::Sample);
        study.vertices = vec![
            source.into(),
            Process::create("p1", Some("collect")).into(),
            sample.into(),
        ];
        study.arcs = vec![Arc::new("s1", "p1"), Arc::new("p1", "sm1")];
        study
    }

    #[test]
    fn characteristics_follow_name_column() {
        let tables = render_study(&chain()).unwrap();
        let labels: Vec<&str> = tables
            .study
            .field_header
            .iter()
            .map(|h| h.value.as_str())
            .collect();
        assert_eq!(labels, vec!["Name", "age", "Protocol", "Name"]);
        let age = &tables.study.table_data[0][1];
        assert_eq!(age.value.as_deref(), Some("42"));
        assert_eq!(age.unit.as_deref(), Some("year"));
        assert_eq!(tables.study.field_header[1].col_type, ColumnType::Unit);
        assert!(tables.study.field_header[1].num_col);
    }

    #[test]
    fn top_header_spans_vertex_columns() {
        let tables = render_study(&chain()).unwrap();
        let spans: Vec<(Category, usize)> = tables
            .study
            .top_header
            .iter()
            .map(|h| (h.category, h.colspan))
            .collect();
        assert_eq!(
            spans,
            vec![(Category::Source, 2), (Category::Process, 1), (Category::Sample, 1)]
        );
        assert_eq!(tables.study.top_header[1].value, "collect");
    }

    #[test]
    fn row_without_sample_fails() {
        let mut study = Study::create("s");
        study.vertices = vec![
            Material::create("s1", "S1", ItemKind::Source).into(),
            Process::create("p1", None).into(),
        ];
        study.arcs = vec![Arc::new("s1", "p1")];
        assert_eq!(render_study(&study), Err(RenderError::NoSample { row: 0 }));
    }

    #[test]
    fn two_samples_in_one_row_fail() {
        let mut study = Study::create("s");
        study.vertices = vec![
            Material::create("s1", "S1", ItemKind::Source).into(),
            Material::create("a", "A", ItemKind::Sample).into(),
            Material::create("b", "B", ItemKind::Sample).into(),
        ];
        study.arcs = vec![Arc::new("s1", "a"), Arc::new("a", "b")];
        assert_eq!(
            render_study(&study),
            Err(RenderError::MultipleSamples { row: 0, count: 2 })
        );
    }

    #[test]
    fn multiple_ontology_terms_join() {
        let term = |n: &str, acc: &str| {
            Scalar::Ontology(OntologyRef {
                name: n.to_string(),
                accession: acc.to_string(),
                ontology_name: "EFO".to_string(),
            })
        };
        let attr = Attribute {
            value: Some(AttrValue::Multiple(vec![term("a", "EFO:1"), term("b", "EFO:2")])),
            unit: None,
        };
        let (cell, ontology) = attribute_cell(&attr);
        assert!(ontology);
        assert_eq!(cell.value.as_deref(), Some("a;b"));
        assert_eq!(cell.link.as_deref(), Some("EFO:1;EFO:2"));
        assert_eq!(cell.attrs.get("multiple").map(String::as_str), Some("2"));
    }

    #[test]
    fn repeated_prefix_is_flagged() {
        let mut study = chain();
        study.vertices.push(Material::create("sm2", "SM2", ItemKind::Sample).into());
        study.arcs.push(Arc::new("p1", "sm2"));
        let tables = render_study(&study).unwrap();
        let rows = &tables.study.table_data;
        assert_eq!(rows.len(), 2);
        assert!(rows[0].iter().all(|c| !c.repeat));
        assert!(rows[1][0].repeat && rows[1][2].repeat);
        assert!(!rows[1][3].repeat);
    }
}
