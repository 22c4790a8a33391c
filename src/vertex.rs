use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

pub type AssayId = String;

/// Ordered attribute mapping; import order is header order.
pub type Attributes = IndexMap<String, Attribute>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ItemKind {
    Source,
    Sample,
    Material,
    Data,
}

impl ItemKind {
    pub fn label(&self) -> &'static str {
        match self {
            ItemKind::Source => "Source",
            ItemKind::Sample => "Sample",
            ItemKind::Material => "Material",
            ItemKind::Data => "Data",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OntologyRef {
    pub name: String,
    pub accession: String,
    pub ontology_name: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Ontology(OntologyRef),
    Plain(String),
}

impl Scalar {
    pub fn display(&self) -> &str {
        match self {
            Scalar::Ontology(term) => &term.name,
            Scalar::Plain(s) => s,
        }
    }

    pub fn is_ontology(&self) -> bool {
        matches!(self, Scalar::Ontology(_))
    }
}

/// A list of one element stays a list; collapsing happens when rendering.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Single(Scalar),
    Multiple(Vec<Scalar>),
}

impl AttrValue {
    pub fn scalars(&self) -> &[Scalar] {
        match self {
            AttrValue::Single(s) => std::slice::from_ref(s),
            AttrValue::Multiple(v) => v,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    #[serde(default)]
    pub value: Option<AttrValue>,
    #[serde(default)]
    pub unit: Option<Scalar>,
}

impl Attribute {
    pub fn plain(value: &str) -> Self {
        Attribute {
            value: Some(AttrValue::Single(Scalar::Plain(value.to_string()))),
            unit: None,
        }
    }

    pub fn with_unit(mut self, unit: Scalar) -> Self {
        self.unit = Some(unit);
        self
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Material {
    pub unique_name: String,
    pub name: String,
    pub kind: ItemKind,
    /// ISA column label, e.g. "Extract Name" or "Raw Data File".
    #[serde(default)]
    pub material_type: Option<String>,
    #[serde(default)]
    pub characteristics: Attributes,
    #[serde(default)]
    pub factor_values: Attributes,
    #[serde(default)]
    pub extract_label: Option<Attribute>,
    #[serde(default)]
    pub comments: IndexMap<String, String>,
    #[serde(default)]
    pub assay: Option<AssayId>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Process {
    pub unique_name: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub protocol: Option<String>,
    #[serde(default)]
    pub parameter_values: Attributes,
    #[serde(default)]
    pub performer: Option<String>,
    #[serde(default)]
    pub perform_date: Option<String>,
    #[serde(default)]
    pub comments: IndexMap<String, String>,
    #[serde(default)]
    pub assay: Option<AssayId>,
}

impl Material {
    pub fn create(unique_name: &str, name: &str, kind: ItemKind) -> Self {
        Material {
            unique_name: unique_name.to_string(),
            name: name.to_string(),
            kind,
            material_type: None,
            characteristics: IndexMap::new(),
            factor_values: IndexMap::new(),
            extract_label: None,
            comments: IndexMap::new(),
            assay: None,
        }
    }
}

impl Process {
    pub fn create(unique_name: &str, protocol: Option<&str>) -> Self {
        Process {
            unique_name: unique_name.to_string(),
            name: None,
            protocol: protocol.map(str::to_string),
            parameter_values: IndexMap::new(),
            performer: None,
            perform_date: None,
            comments: IndexMap::new(),
            assay: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "obj_cls")]
pub enum Vertex {
    Material(Material),
    Process(Process),
}

impl Vertex {
    pub fn unique_name(&self) -> &str {
        match self {
            Vertex::Material(m) => &m.unique_name,
            Vertex::Process(p) => &p.unique_name,
        }
    }

    pub fn assay(&self) -> Option<&str> {
        match self {
            Vertex::Material(m) => m.assay.as_deref(),
            Vertex::Process(p) => p.assay.as_deref(),
        }
    }

    /// `None` for processes.
    pub fn item_kind(&self) -> Option<ItemKind> {
        match self {
            Vertex::Material(m) => Some(m.kind),
            Vertex::Process(_) => None,
        }
    }

    pub fn is_source(&self) -> bool {
        self.item_kind() == Some(ItemKind::Source)
    }

    pub fn is_sample(&self) -> bool {
        self.item_kind() == Some(ItemKind::Sample)
    }
}

impl From<Material> for Vertex {
    fn from(m: Material) -> Self {
        Vertex::Material(m)
    }
}

impl From<Process> for Vertex {
    fn from(p: Process) -> Self {
        Vertex::Process(p)
    }
}

/// Directed arc `(tail, head)`: tail produces input consumed by head.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Arc(pub String, pub String);

impl Arc {
    pub fn new(tail: &str, head: &str) -> Self {
        Arc(tail.to_string(), head.to_string())
    }

    pub fn tail(&self) -> &str {
        &self.0
    }

    pub fn head(&self) -> &str {
        &self.1
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Assay {
    pub id: AssayId,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub arcs: Vec<Arc>,
    /// Legacy membership test: a substring embedded in vertex names at import.
    #[serde(default)]
    pub marker: Option<String>,
}

impl Assay {
    pub fn contains(&self, vertex: &Vertex) -> bool {
        if vertex.assay() == Some(self.id.as_str()) {
            return true;
        }
        match &self.marker {
            Some(marker) => vertex.unique_name().contains(marker.as_str()),
            None => false,
        }
    }
}

/// Vertices of a study and its assays, with the study's own arcs and each
/// assay's arcs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Study {
    pub name: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub vertices: Vec<Vertex>,
    #[serde(default)]
    pub arcs: Vec<Arc>,
    #[serde(default)]
    pub assays: Vec<Assay>,
}

impl Study {
    pub fn create(name: &str) -> Self {
        Study {
            name: name.to_string(),
            display_name: name.to_string(),
            vertices: Vec::new(),
            arcs: Vec::new(),
            assays: Vec::new(),
        }
    }

    /// Study arcs followed by every assay's arcs.
    pub fn all_arcs(&self) -> impl Iterator<Item = &Arc> {
        self.arcs
            .iter()
            .chain(self.assays.iter().flat_map(|a| a.arcs.iter()))
    }
}
