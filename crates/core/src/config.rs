use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::aggregate::BranchValues;
use crate::color::{default_palette, Color};
use crate::error::ConfigError;
use crate::geometry::{FocusState, MaxDepth, Viewport};
use crate::tiling::TilingSpec;
use crate::treemap::BreadcrumbSpec;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    #[default]
    Sunburst,
    Treemap,
}

impl FromStr for ChartKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sunburst" => Ok(Self::Sunburst),
            "treemap" => Ok(Self::Treemap),
            _ => Err(ConfigError::UnknownKind(s.to_string())),
        }
    }
}

impl fmt::Display for ChartKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Sunburst => "sunburst",
            Self::Treemap => "treemap",
        })
    }
}

impl FromStr for BranchValues {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "remainder" => Ok(Self::Remainder),
            "total" => Ok(Self::Total),
            _ => Err(ConfigError::UnknownBranchValues(s.to_string())),
        }
    }
}

/// Everything one layout pass of one chart reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartConfig {
    #[serde(default)]
    pub kind: ChartKind,
    #[serde(default)]
    pub branch_values: BranchValues,
    /// Without values, whether branches weigh one extra unit.
    #[serde(default)]
    pub count_branches: bool,
    #[serde(default)]
    pub focus: Option<String>,
    #[serde(default)]
    pub max_depth: MaxDepth,
    #[serde(default)]
    pub viewport: Viewport,
    #[serde(default)]
    pub tiling: TilingSpec,
    #[serde(default)]
    pub breadcrumb: Option<BreadcrumbSpec>,
    #[serde(default = "default_palette")]
    pub palette: Vec<Color>,
    /// Explicit colors by node id.
    #[serde(default)]
    pub colors: HashMap<String, Color>,
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            kind: ChartKind::default(),
            branch_values: BranchValues::default(),
            count_branches: false,
            focus: None,
            max_depth: MaxDepth::default(),
            viewport: Viewport::default(),
            tiling: TilingSpec::default(),
            breadcrumb: None,
            palette: default_palette(),
            colors: HashMap::new(),
        }
    }
}

impl ChartConfig {
    pub fn focus_state(&self) -> FocusState {
        FocusState::new(self.focus.as_deref(), self.max_depth)
    }

    /// Range checks serde cannot express. The tiling block is already
    /// checked when parsed but may have been edited in code since.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, v) in [("viewport.width", self.viewport.width), ("viewport.height", self.viewport.height)] {
            if !(v.is_finite() && v >= 0.0) {
                return Err(ConfigError::OutOfRange {
                    field,
                    expected: "a non-negative number",
                    got: v,
                });
            }
        }
        self.tiling.validate()?;
        if let Some(b) = &self.breadcrumb {
            b.validate()?;
        }
        Ok(())
    }
}
