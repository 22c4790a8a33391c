#![allow(dead_code)]

use samplesheets::{
    Arc, Assay, Attribute, ItemKind, Material, OntologyRef, Process, RenderedTable, Scalar, Study,
};

pub fn source(name: &str) -> Material {
    Material::create(name, name, ItemKind::Source)
}

pub fn sample(name: &str) -> Material {
    Material::create(name, name, ItemKind::Sample)
}

pub fn data(name: &str, assay: &str) -> Material {
    let mut m = Material::create(name, name, ItemKind::Data);
    m.material_type = Some("Raw Data File".to_string());
    m.assay = Some(assay.to_string());
    m
}

pub fn protocol(name: &str, protocol: &str) -> Process {
    Process::create(name, Some(protocol))
}

pub fn assay_protocol(name: &str, protocol: &str, assay: &str) -> Process {
    let mut p = Process::create(name, Some(protocol));
    p.assay = Some(assay.to_string());
    p
}

pub fn assay(id: &str, arcs: &[(&str, &str)]) -> Assay {
    Assay {
        id: id.to_string(),
        display_name: format!("Assay {}", id),
        arcs: arcs.iter().map(|(t, h)| Arc::new(t, h)).collect(),
        marker: None,
    }
}

pub fn arcs(pairs: &[(&str, &str)]) -> Vec<Arc> {
    pairs.iter().map(|(t, h)| Arc::new(t, h)).collect()
}

pub fn ontology(name: &str, accession: &str, ontology_name: &str) -> Attribute {
    Attribute {
        value: Some(samplesheets::AttrValue::Single(Scalar::Ontology(OntologyRef {
            name: name.to_string(),
            accession: accession.to_string(),
            ontology_name: ontology_name.to_string(),
        }))),
        unit: None,
    }
}

/// S1 -> P1 -> SM1 in the study, SM1 -> P2 -> D1 in assay `a1`.
pub fn linear_study() -> Study {
    let mut study = Study::create("study1");
    study.vertices = vec![
        source("S1").into(),
        protocol("P1", "sample collection").into(),
        sample("SM1").into(),
        assay_protocol("P2", "sequencing", "a1").into(),
        data("D1", "a1").into(),
    ];
    study.arcs = arcs(&[("S1", "P1"), ("P1", "SM1")]);
    study.assays = vec![assay("a1", &[("SM1", "P2"), ("P2", "D1")])];
    study
}

/// Two assays branching off the same sample.
pub fn two_assay_study() -> Study {
    let mut study = Study::create("study2");
    study.vertices = vec![
        source("S1").into(),
        protocol("P1", "sample collection").into(),
        sample("SM1").into(),
        assay_protocol("P2a", "sequencing", "a1").into(),
        data("D1a", "a1").into(),
        assay_protocol("P2b", "mass spec", "a2").into(),
        data("D1b", "a2").into(),
    ];
    study.arcs = arcs(&[("S1", "P1"), ("P1", "SM1")]);
    study.assays = vec![
        assay("a1", &[("SM1", "P2a"), ("P2a", "D1a")]),
        assay("a2", &[("SM1", "P2b"), ("P2b", "D1b")]),
    ];
    study
}

pub fn values(row: &[samplesheets::Cell]) -> Vec<Option<String>> {
    row.iter().map(|c| c.value.clone()).collect()
}

fn vertex_of(cell: &samplesheets::Cell) -> Option<&str> {
    cell.attrs.get("vertex").map(String::as_str)
}

/// Every assay row's study part equals the study row walking the same
/// vertices, cell for cell.
pub fn assert_study_prefix(study: &RenderedTable, assay: &RenderedTable) {
    let Some(len) = assay.sample_prefix_len() else {
        return;
    };
    assert_eq!(study.field_header.len(), len);
    for row in &assay.table_data {
        let walk: Vec<_> = row[..len].iter().map(vertex_of).collect();
        let matching = study
            .table_data
            .iter()
            .find(|s| s.iter().map(vertex_of).collect::<Vec<_>>() == walk)
            .unwrap_or_else(|| panic!("no study row walks {:?}", walk));
        for (a, s) in row[..len].iter().zip(matching) {
            assert_eq!(
                (&a.value, &a.unit, &a.link, &a.tooltip),
                (&s.value, &s.unit, &s.link, &s.tooltip),
                "assay cell differs from study cell for {:?}",
                vertex_of(a)
            );
        }
    }
}
