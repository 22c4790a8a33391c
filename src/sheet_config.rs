use crate::error::{ConfigError, SheetError};
use crate::rendering::{NoLinks, render_study_with};
use crate::saving::ConfigStore;
use crate::settings::Settings;
use crate::table::{ColumnType, HeaderType, RenderedTable, StudyTables, finite_number};
use crate::vertex::Study;
use indexmap::IndexMap;
use lazy_static::lazy_static;
use log::{debug, info, warn};
use regex::Regex;
use semver::Version;
use serde::{Deserialize, Serialize};

lazy_static! {
    static ref VERSION_REGEX: Regex = Regex::new(r"^(\d+)(?:\.(\d+))?(?:\.(\d+))?$").unwrap();
}

pub const DATE_REGEX: &str = r"^\d{4}-\d{2}-\d{2}$";

/// Parses `"1"`, `"1.2"` or `"1.2.3"`; missing components are zero.
pub fn parse_version(s: &str) -> Option<Version> {
    let caps = VERSION_REGEX.captures(s.trim())?;
    let part = |i: usize| -> Option<u64> {
        match caps.get(i) {
            Some(m) => m.as_str().parse().ok(),
            None => Some(0),
        }
    };
    Some(Version::new(part(1)?, part(2)?, part(3)?))
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldFormat {
    String,
    Integer,
    Double,
    Ontology,
    Protocol,
}

/// Editing configuration of one column.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EditField {
    pub name: String,
    #[serde(rename = "type")]
    pub header_type: HeaderType,
    pub editable: bool,
    pub format: FieldFormat,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<[f64; 2]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regex: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unit: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_default: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ontologies: Vec<String>,
    #[serde(default)]
    pub allow_list: bool,
    #[serde(default)]
    pub allow_query: bool,
}

/// Stand-in for a study column inside an assay node list.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldRef {
    pub name: String,
    #[serde(rename = "type")]
    pub header_type: HeaderType,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldConfig {
    Edit(EditField),
    Reference(FieldRef),
}

impl FieldConfig {
    pub fn name(&self) -> &str {
        match self {
            FieldConfig::Edit(f) => &f.name,
            FieldConfig::Reference(f) => &f.name,
        }
    }

    pub fn header_type(&self) -> HeaderType {
        match self {
            FieldConfig::Edit(f) => f.header_type,
            FieldConfig::Reference(f) => f.header_type,
        }
    }

    pub fn as_edit(&self) -> Option<&EditField> {
        match self {
            FieldConfig::Edit(f) => Some(f),
            FieldConfig::Reference(_) => None,
        }
    }

    fn same_column(&self, other: &FieldConfig) -> bool {
        self.name() == other.name() && self.header_type() == other.header_type()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodeConfig {
    pub header: String,
    pub fields: Vec<FieldConfig>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AssayConfig {
    pub display_name: String,
    pub nodes: Vec<NodeConfig>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StudyConfig {
    pub display_name: String,
    pub nodes: Vec<NodeConfig>,
    pub assays: IndexMap<String, AssayConfig>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SheetConfig {
    pub version: String,
    pub studies: IndexMap<String, StudyConfig>,
}

impl SheetConfig {
    pub fn from_json(blob: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(blob).map_err(|e| ConfigError::Malformed(e.to_string()))
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn study(&self, name: &str) -> Result<&StudyConfig, ConfigError> {
        self.studies
            .get(name)
            .ok_or_else(|| ConfigError::UnknownStudy(name.to_string()))
    }

    /// Node list of a study (`assay == None`) or of one of its assays.
    pub fn nodes(&self, study: &str, assay: Option<&str>) -> Option<&[NodeConfig]> {
        let s = self.studies.get(study)?;
        match assay {
            None => Some(&s.nodes),
            Some(a) => s.assays.get(a).map(|a| a.nodes.as_slice()),
        }
    }

    /// Entry point for edit actions, which change one field at a time.
    pub fn field_mut(
        &mut self,
        study: &str,
        assay: Option<&str>,
        node: usize,
        field: usize,
    ) -> Option<&mut FieldConfig> {
        let s = self.studies.get_mut(study)?;
        let nodes = match assay {
            None => &mut s.nodes,
            Some(a) => &mut s.assays.get_mut(a)?.nodes,
        };
        nodes.get_mut(node)?.fields.get_mut(field)
    }
}

/// Builds configuration for every study from its freshly rendered tables.
pub fn build_sheet_config<'a, I>(studies: I, settings: &Settings) -> SheetConfig
where
    I: IntoIterator<Item = (&'a Study, &'a StudyTables)>,
{
    let mut config = SheetConfig {
        version: settings.config_version.clone(),
        studies: IndexMap::new(),
    };
    for (study, tables) in studies {
        config
            .studies
            .insert(study.name.clone(), build_study_config(study, tables, settings));
    }
    info!(
        "built sheet configuration {} for {} studies",
        config.version,
        config.studies.len()
    );
    config
}

pub fn build_study_config(study: &Study, tables: &StudyTables, settings: &Settings) -> StudyConfig {
    let nodes = build_nodes(&tables.study, 0, settings);
    let mut assays = IndexMap::new();
    for assay in &study.assays {
        let Some(table) = tables.assays.get(&assay.id) else {
            continue;
        };
        let split = table.sample_group().map_or(0, |g| g + 1);
        let mut nodes = reference_nodes(table, split);
        nodes.extend(build_nodes(table, split, settings));
        assays.insert(
            assay.id.clone(),
            AssayConfig {
                display_name: assay.display_name.clone(),
                nodes,
            },
        );
    }
    StudyConfig {
        display_name: study.display_name.clone(),
        nodes,
        assays,
    }
}

fn reference_nodes(table: &RenderedTable, until: usize) -> Vec<NodeConfig> {
    let offsets = table.group_offsets();
    table
        .top_header
        .iter()
        .zip(offsets)
        .take(until)
        .map(|(top, start)| NodeConfig {
            header: top.value.clone(),
            fields: table.field_header[start..start + top.colspan]
                .iter()
                .map(|h| {
                    FieldConfig::Reference(FieldRef {
                        name: h.name.clone(),
                        header_type: h.header_type,
                    })
                })
                .collect(),
        })
        .collect()
}

fn build_nodes(table: &RenderedTable, from: usize, settings: &Settings) -> Vec<NodeConfig> {
    let offsets = table.group_offsets();
    table
        .top_header
        .iter()
        .zip(offsets)
        .skip(from)
        .map(|(top, start)| NodeConfig {
            header: top.value.clone(),
            fields: (start..start + top.colspan)
                .map(|i| FieldConfig::Edit(build_field(table, i, settings)))
                .collect(),
        })
        .collect()
}

fn build_field(table: &RenderedTable, index: usize, settings: &Settings) -> EditField {
    let header = &table.field_header[index];
    let mut field = EditField {
        name: header.name.clone(),
        header_type: header.header_type,
        editable: header.header_type != HeaderType::Name || settings.name_columns_editable,
        format: FieldFormat::String,
        range: None,
        regex: None,
        default: None,
        unit: Vec::new(),
        unit_default: None,
        ontologies: Vec::new(),
        allow_list: false,
        allow_query: false,
    };

    match header.col_type {
        ColumnType::Protocol => {
            field.format = FieldFormat::Protocol;
            field.default = single_value(table, index);
            if field.default.is_none() {
                debug!("no single protocol in column {}, default left unset", header.name);
            }
        }
        ColumnType::Ontology => {
            field.format = FieldFormat::Ontology;
            if settings.is_allow_list_field(&header.name) {
                field.ontologies = settings.allow_list_ontologies.clone();
                field.allow_list = true;
            } else {
                field.ontologies = distinct(
                    table
                        .column(index)
                        .filter_map(|c| c.tooltip.as_deref())
                        .flat_map(|t| t.split(';')),
                );
                field.allow_query = true;
            }
        }
        ColumnType::Date => field.regex = Some(DATE_REGEX.to_string()),
        _ if header.num_col => numeric_format(table, index, &mut field),
        _ => {}
    }

    if header.col_type == ColumnType::Unit || header.num_col {
        field.unit = distinct(table.column(index).filter_map(|c| c.unit.as_deref()));
        if field.unit.len() == 1 {
            field.unit_default = field.unit.first().cloned();
        }
    }
    field
}

fn numeric_format(table: &RenderedTable, index: usize, field: &mut EditField) {
    let values: Vec<&str> = table
        .column(index)
        .filter_map(|c| c.value.as_deref())
        .map(str::trim)
        .collect();
    let numbers: Vec<f64> = values.iter().filter_map(|v| finite_number(v)).collect();
    let Some(first) = numbers.first() else {
        return;
    };
    field.format = if values.iter().all(|v| v.parse::<i64>().is_ok()) {
        FieldFormat::Integer
    } else {
        FieldFormat::Double
    };
    let (min, max) = numbers
        .iter()
        .fold((*first, *first), |(lo, hi), &n| (lo.min(n), hi.max(n)));
    field.range = Some([min, max]);
}

/// The column's value when every row carries the same non-empty one.
fn single_value(table: &RenderedTable, index: usize) -> Option<String> {
    let mut values = table.column(index).map(|c| c.value.as_deref());
    let first = values.next()??;
    if values.all(|v| v == Some(first)) {
        Some(first.to_string())
    } else {
        None
    }
}

fn distinct<'a>(items: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for item in items.filter(|s| !s.is_empty()) {
        if !out.iter().any(|o| o == item) {
            out.push(item.to_string());
        }
    }
    out
}

/// A configuration is valid when its version is at least
/// `min_config_version` and every field regex compiles. Invalid
/// configurations are rebuilt, never upgraded.
pub fn validate_sheet_config(config: &SheetConfig, settings: &Settings) -> Result<(), ConfigError> {
    let found = parse_version(&config.version)
        .ok_or_else(|| ConfigError::InvalidVersion(config.version.clone()))?;
    let required = parse_version(&settings.min_config_version)
        .ok_or_else(|| ConfigError::InvalidVersion(settings.min_config_version.clone()))?;
    if found < required {
        return Err(ConfigError::Outdated {
            found: config.version.clone(),
            required: settings.min_config_version.clone(),
        });
    }

    for study in config.studies.values() {
        let assay_nodes = study.assays.values().flat_map(|a| a.nodes.iter());
        for node in study.nodes.iter().chain(assay_nodes) {
            for field in node.fields.iter().filter_map(FieldConfig::as_edit) {
                if let Some(pattern) = &field.regex {
                    Regex::new(pattern).map_err(|source| ConfigError::InvalidRegex {
                        field: field.name.clone(),
                        source,
                    })?;
                }
            }
        }
    }
    Ok(())
}

/// Rebuilds configuration from fresh tables while keeping user-authored
/// settings of every column that still exists at the same node. Only derived
/// defaults (the single-protocol default) are refreshed.
pub fn restore_sheet_config<'a, I>(existing: &SheetConfig, studies: I, settings: &Settings) -> SheetConfig
where
    I: IntoIterator<Item = (&'a Study, &'a StudyTables)>,
{
    let mut fresh = build_sheet_config(studies, settings);
    let mut kept = 0;
    for (name, study) in fresh.studies.iter_mut() {
        let Some(old) = existing.studies.get(name) else {
            continue;
        };
        kept += merge_nodes(&mut study.nodes, &old.nodes);
        for (assay_id, assay) in study.assays.iter_mut() {
            if let Some(old_assay) = old.assays.get(assay_id) {
                kept += merge_nodes(&mut assay.nodes, &old_assay.nodes);
            }
        }
    }
    info!("restored sheet configuration, {} fields kept", kept);
    fresh
}

fn merge_nodes(fresh: &mut [NodeConfig], old: &[NodeConfig]) -> usize {
    let mut kept = 0;
    for (node, old_node) in fresh.iter_mut().zip(old) {
        if node.header != old_node.header {
            continue;
        }
        for (j, field) in node.fields.iter_mut().enumerate() {
            let previous = {
                let current: &FieldConfig = field;
                old_node
                    .fields
                    .get(j)
                    .filter(|f| f.same_column(current))
                    .or_else(|| old_node.fields.iter().find(|f| f.same_column(current)))
            };
            if let (FieldConfig::Edit(new), Some(FieldConfig::Edit(prev))) = (&mut *field, previous) {
                let derived = new.default.take();
                let refresh = new.format == FieldFormat::Protocol && prev.format == FieldFormat::Protocol;
                *new = prev.clone();
                if refresh {
                    new.default = derived;
                }
                kept += 1;
            }
        }
    }
    kept
}

/// Returns the stored configuration for `project` if it is valid, otherwise
/// renders `studies`, builds a new configuration and stores it. The check and
/// the write happen in one store update.
pub fn get_sheet_config(
    store: &dyn ConfigStore,
    project: &str,
    studies: &[Study],
    settings: &Settings,
) -> Result<SheetConfig, SheetError> {
    settings.check()?;
    let mut result = None;
    store.update(project, &mut |blob| {
        let stored = match blob {
            Some(b) => SheetConfig::from_json(&b)
                .and_then(|c| validate_sheet_config(&c, settings).map(|_| c)),
            None => Err(ConfigError::Missing),
        };
        match stored {
            Ok(config) => {
                result = Some(config);
                Ok(None)
            }
            Err(e) => {
                warn!("rebuilding sheet configuration for {}: {}", project, e);
                let mut tables = Vec::with_capacity(studies.len());
                for study in studies {
                    tables.push(render_study_with(study, settings, &NoLinks)?);
                }
                let config = build_sheet_config(studies.iter().zip(tables.iter()), settings);
                let json = config.to_json().map_err(crate::error::StoreError::from)?;
                result = Some(config);
                Ok(Some(json))
            }
        }
    })?;
    result.ok_or_else(|| SheetError::Config(ConfigError::Missing))
}
