//! Serializable contracts shared between the `ssview` engine, its CLI and
//! hosts that render `WidgetView` snapshots.

use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// One alternative visualization of the same family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RenderingType {
    #[serde(rename = "rscape")]
    PrimaryAnalysis,
    #[serde(rename = "rscape-cyk")]
    OptimizedAnalysis,
    #[serde(rename = "cons")]
    Conservation,
    #[serde(rename = "fcbp")]
    BasepairConservation,
    #[serde(rename = "cov")]
    Covariation,
    #[serde(rename = "ent")]
    Entropy,
    #[serde(rename = "maxcm")]
    OptimalParse,
    #[serde(rename = "norm")]
    Normal,
    #[serde(rename = "rchie")]
    ArcDiagram,
}

pub const DEFAULT_CANDIDATES: [RenderingType; 8] = [
    RenderingType::PrimaryAnalysis,
    RenderingType::Conservation,
    RenderingType::BasepairConservation,
    RenderingType::Covariation,
    RenderingType::Entropy,
    RenderingType::OptimalParse,
    RenderingType::Normal,
    RenderingType::ArcDiagram,
];

impl RenderingType {
    pub const ALL: [RenderingType; 9] = [
        RenderingType::PrimaryAnalysis,
        RenderingType::OptimizedAnalysis,
        RenderingType::Conservation,
        RenderingType::BasepairConservation,
        RenderingType::Covariation,
        RenderingType::Entropy,
        RenderingType::OptimalParse,
        RenderingType::Normal,
        RenderingType::ArcDiagram,
    ];

    /// Path segment used by the image service.
    pub fn slug(self) -> &'static str {
        match self {
            Self::PrimaryAnalysis => "rscape",
            Self::OptimizedAnalysis => "rscape-cyk",
            Self::Conservation => "cons",
            Self::BasepairConservation => "fcbp",
            Self::Covariation => "cov",
            Self::Entropy => "ent",
            Self::OptimalParse => "maxcm",
            Self::Normal => "norm",
            Self::ArcDiagram => "rchie",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::PrimaryAnalysis => "R-scape",
            Self::OptimizedAnalysis => "R-scape optimised structure",
            Self::Conservation => "Sequence conservation",
            Self::BasepairConservation => "Basepair conservation",
            Self::Covariation => "Covariation",
            Self::Entropy => "Sequence entropy",
            Self::OptimalParse => "Maximum CM parse",
            Self::Normal => "Normal",
            Self::ArcDiagram => "R-chie arc diagram",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::PrimaryAnalysis => {
                "Consensus structure annotated by R-scape; green base pairs show statistically significant covariation."
            }
            Self::OptimizedAnalysis => {
                "Structure predicted by R-scape's CaCoFold, maximising the number of significantly covarying pairs."
            }
            Self::Conservation => {
                "Nucleotides coloured by how conserved they are across the seed alignment."
            }
            Self::BasepairConservation => {
                "Base pairs coloured by the fraction of seed sequences that form a canonical pair."
            }
            Self::Covariation => {
                "Base pairs coloured by the amount of compensatory mutation observed in the seed alignment."
            }
            Self::Entropy => "Positions coloured by their relative sequence entropy.",
            Self::OptimalParse => {
                "The maximum-scoring parse of the covariance model, drawn without sequence information."
            }
            Self::Normal => "The consensus secondary structure with no additional colouring.",
            Self::ArcDiagram => {
                "Arc diagram produced by R-chie showing the consensus structure above the alignment."
            }
        }
    }

    /// Arc diagrams are genuinely raster; every other type is expected as vector markup.
    pub fn expects_raster(self) -> bool {
        self == Self::ArcDiagram
    }
}

impl fmt::Display for RenderingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownRenderingType(pub String);

impl fmt::Display for UnknownRenderingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Unknown rendering type '{}'", self.0)
    }
}

impl std::error::Error for UnknownRenderingType {}

impl FromStr for RenderingType {
    type Err = UnknownRenderingType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim();
        Self::ALL
            .into_iter()
            .find(|t| t.slug().eq_ignore_ascii_case(needle))
            .ok_or_else(|| UnknownRenderingType(needle.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadStatus {
    Loading,
    Loaded,
    Error,
    Unavailable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TogglePhase {
    #[default]
    AllVisible,
    StructureOnly,
    SequenceOnly,
}

impl TogglePhase {
    pub fn next(self) -> Self {
        match self {
            Self::AllVisible => Self::StructureOnly,
            Self::StructureOnly => Self::SequenceOnly,
            Self::SequenceOnly => Self::AllVisible,
        }
    }
}

/// Semantic tiers of the annotation palette.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    SignificantPair,
    Conserved97,
    Conserved90,
    Conserved75,
    Conserved50,
}

impl Tier {
    pub const ALL: [Tier; 5] = [
        Tier::SignificantPair,
        Tier::Conserved97,
        Tier::Conserved90,
        Tier::Conserved75,
        Tier::Conserved50,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::SignificantPair => "Significant covariation",
            Self::Conserved97 => "97% conserved",
            Self::Conserved90 => "90% conserved",
            Self::Conserved75 => "75% conserved",
            Self::Conserved50 => "50% conserved",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AnnotationSummary {
    pub basepairs: usize,
    pub significant_basepairs: usize,
    pub tooltips: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "format", rename_all = "snake_case")]
pub enum DiagramContent {
    Vector { markup: String },
    Raster { url: String, mime: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewportView {
    pub zoom: f64,
    pub pan_x: f64,
    pub pan_y: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SlotView {
    pub content: Option<DiagramContent>,
    pub placeholder: bool,
    pub annotation: Option<AnnotationSummary>,
    pub viewport: Option<ViewportView>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonView {
    pub status: LoadStatus,
    pub message: Option<String>,
    pub slot: SlotView,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LensView {
    pub left: f64,
    pub top: f64,
    pub diameter: f64,
    pub background_x: f64,
    pub background_y: f64,
    pub background_width: f64,
    pub background_height: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegendEntry {
    pub tier: Tier,
    pub colour: String,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeOption {
    pub rendering: RenderingType,
    pub label: String,
}

/// Everything a host needs to draw the widget at one point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WidgetView {
    pub entity: String,
    pub selected: RenderingType,
    pub options: Vec<TypeOption>,
    pub status: LoadStatus,
    pub message: Option<String>,
    pub description: Option<String>,
    pub legend: Vec<LegendEntry>,
    pub toggle_phase: Option<TogglePhase>,
    pub main: SlotView,
    pub comparison: Option<ComparisonView>,
    pub lens: Option<LensView>,
    pub editor_url: Option<String>,
}
