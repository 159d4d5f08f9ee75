//! Engine roster and bin configuration.
//! Key notes:
//!   - every roster member is built against the same `bin_width`/`bin_height`/`allow_rotation`
//!   - `parallel` only has an effect when the crate feature "parallel" is on

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// MaxRects placement heuristics.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MaxRectsHeuristic {
    /// Every fitting free rectangle scores the same; ties fall back to lowest top, then left.
    FirstFit,
    BottomLeft,
    BestShortSideFit,
    BestAreaFit,
    BestLongSideFit,
    ContactPoint,
}

impl FromStr for MaxRectsHeuristic {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ff" | "firstfit" => Ok(Self::FirstFit),
            "bl" | "bottomleft" => Ok(Self::BottomLeft),
            "bssf" | "bestshortsidefit" => Ok(Self::BestShortSideFit),
            "baf" | "bestareafit" => Ok(Self::BestAreaFit),
            "blsf" | "bestlongsidefit" => Ok(Self::BestLongSideFit),
            "cp" | "contactpoint" => Ok(Self::ContactPoint),
            _ => Err(()),
        }
    }
}

/// Skyline placement heuristics.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SkylineHeuristic {
    BottomLeft,
    MinWaste,
}

impl FromStr for SkylineHeuristic {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "bl" | "bottomleft" => Ok(Self::BottomLeft),
            "minwaste" | "mw" => Ok(Self::MinWaste),
            _ => Err(()),
        }
    }
}

/// Free-rect choice heuristics for the skyline waste map.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum GuillotineChoice {
    BestAreaFit,
    BestShortSideFit,
    BestLongSideFit,
    WorstAreaFit,
    WorstShortSideFit,
    WorstLongSideFit,
}

impl FromStr for GuillotineChoice {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "baf" | "bestareafit" => Ok(Self::BestAreaFit),
            "bssf" | "bestshortsidefit" => Ok(Self::BestShortSideFit),
            "blsf" | "bestlongsidefit" => Ok(Self::BestLongSideFit),
            "waf" | "worstareafit" => Ok(Self::WorstAreaFit),
            "wssf" | "worstshortsidefit" => Ok(Self::WorstShortSideFit),
            "wlsf" | "worstlongsidefit" => Ok(Self::WorstLongSideFit),
            _ => Err(()),
        }
    }
}

/// One roster member of an ensemble.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EngineSpec {
    /// Plain MaxRects engine returning its single best position.
    MaxRects {
        #[serde(default = "default_mr_heuristic")]
        heuristic: MaxRectsHeuristic,
    },
    /// Skyline engine returning its single best position.
    Skyline {
        #[serde(default = "default_skyline_heuristic")]
        heuristic: SkylineHeuristic,
        /// Recover gaps under the skyline with a guillotine-style free list.
        #[serde(default)]
        use_waste_map: bool,
        #[serde(default = "default_g_choice")]
        g_choice: GuillotineChoice,
    },
    /// Corner-anchored candidates over a MaxRects free list, ranked by adjacency.
    CornerPointsMr {
        /// Fitness used to decide whether an orientation fits a free rectangle.
        #[serde(default = "default_mr_heuristic")]
        heuristic: MaxRectsHeuristic,
        /// Keep at most this many candidates. `None` keeps all of them.
        #[serde(default)]
        top_k: Option<usize>,
    },
    /// Every skyline placement point, both orientations.
    CornerPointsSl,
}

impl EngineSpec {
    /// Short label used in logs and CLI output.
    pub fn label(&self) -> String {
        match self {
            EngineSpec::MaxRects { heuristic } => format!("maxrects-{}", mr_short(heuristic)),
            EngineSpec::Skyline {
                heuristic,
                use_waste_map,
                ..
            } => {
                let base = format!("skyline-{}", sky_short(heuristic));
                if *use_waste_map {
                    format!("{base}+waste")
                } else {
                    base
                }
            }
            EngineSpec::CornerPointsMr { heuristic, top_k } => match top_k {
                Some(k) => format!("corner-mr-{}-top{}", mr_short(heuristic), k),
                None => format!("corner-mr-{}", mr_short(heuristic)),
            },
            EngineSpec::CornerPointsSl => "corner-sl".into(),
        }
    }
}

fn mr_short(h: &MaxRectsHeuristic) -> &'static str {
    match h {
        MaxRectsHeuristic::FirstFit => "ff",
        MaxRectsHeuristic::BottomLeft => "bl",
        MaxRectsHeuristic::BestShortSideFit => "bssf",
        MaxRectsHeuristic::BestAreaFit => "baf",
        MaxRectsHeuristic::BestLongSideFit => "blsf",
        MaxRectsHeuristic::ContactPoint => "cp",
    }
}

/// Parses the labels produced by [`EngineSpec::label`], e.g. `maxrects-bssf`,
/// `skyline-mw+waste`, `corner-mr-ff-top35`, `corner-sl`.
impl FromStr for EngineSpec {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase();
        let mr = |h: &str| {
            h.parse::<MaxRectsHeuristic>()
                .map_err(|_| format!("unknown maxrects heuristic '{h}' in '{s}'"))
        };
        if s == "corner-sl" {
            return Ok(Self::CornerPointsSl);
        }
        if let Some(rest) = s.strip_prefix("corner-mr-") {
            let (h, top_k) = match rest.split_once("-top") {
                Some((h, k)) => {
                    let k = k
                        .parse::<usize>()
                        .map_err(|_| format!("bad top-k '{k}' in '{s}'"))?;
                    (h, Some(k))
                }
                None => (rest, None),
            };
            return Ok(Self::CornerPointsMr {
                heuristic: mr(h)?,
                top_k,
            });
        }
        if let Some(h) = s.strip_prefix("maxrects-") {
            return Ok(Self::MaxRects { heuristic: mr(h)? });
        }
        if let Some(rest) = s.strip_prefix("skyline-") {
            let (h, use_waste_map) = match rest.strip_suffix("+waste") {
                Some(h) => (h, true),
                None => (rest, false),
            };
            let heuristic = h
                .parse::<SkylineHeuristic>()
                .map_err(|_| format!("unknown skyline heuristic '{h}' in '{s}'"))?;
            return Ok(Self::Skyline {
                heuristic,
                use_waste_map,
                g_choice: default_g_choice(),
            });
        }
        Err(format!("unknown engine '{s}'"))
    }
}

fn sky_short(h: &SkylineHeuristic) -> &'static str {
    match h {
        SkylineHeuristic::BottomLeft => "bl",
        SkylineHeuristic::MinWaste => "mw",
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackerConfig {
    /// Bin width.
    pub bin_width: u32,
    /// Bin height.
    pub bin_height: u32,
    /// Allow 90° rotations; applies to every roster member.
    pub allow_rotation: bool,
    /// Query roster members in parallel when feature "parallel" is on.
    #[serde(default = "default_parallel")]
    pub parallel: bool,
    /// Ordered roster. The first member's placed list is the canonical occupancy view.
    #[serde(default = "default_roster")]
    pub roster: Vec<EngineSpec>,
}

impl Default for PackerConfig {
    fn default() -> Self {
        Self {
            bin_width: 100,
            bin_height: 100,
            allow_rotation: true,
            parallel: default_parallel(),
            roster: default_roster(),
        }
    }
}

impl PackerConfig {
    /// Validates the configuration parameters.
    ///
    /// Returns an error if:
    /// - Bin dimensions are zero
    /// - The roster is empty
    /// - A corner-point generator has a `top_k` of zero
    pub fn validate(&self) -> crate::error::Result<()> {
        use crate::error::PackError;

        if self.bin_width == 0 || self.bin_height == 0 {
            return Err(PackError::InvalidDimension {
                width: self.bin_width,
                height: self.bin_height,
            });
        }

        if self.roster.is_empty() {
            return Err(PackError::InvalidConfig(
                "roster must contain at least one engine".into(),
            ));
        }

        for spec in &self.roster {
            if let EngineSpec::CornerPointsMr { top_k: Some(0), .. } = spec {
                return Err(PackError::InvalidConfig(format!(
                    "{}: top_k must be > 0 (use no bound to keep every candidate)",
                    spec.label()
                )));
            }
        }

        Ok(())
    }
}

fn default_mr_heuristic() -> MaxRectsHeuristic {
    MaxRectsHeuristic::FirstFit
}
fn default_skyline_heuristic() -> SkylineHeuristic {
    SkylineHeuristic::BottomLeft
}
fn default_g_choice() -> GuillotineChoice {
    GuillotineChoice::BestAreaFit
}
fn default_parallel() -> bool {
    false
}

/// Six single-position heuristics plus a corner-point generator capped at 35 candidates.
pub fn default_roster() -> Vec<EngineSpec> {
    vec![
        EngineSpec::MaxRects {
            heuristic: MaxRectsHeuristic::FirstFit,
        },
        EngineSpec::MaxRects {
            heuristic: MaxRectsHeuristic::BottomLeft,
        },
        EngineSpec::MaxRects {
            heuristic: MaxRectsHeuristic::BestShortSideFit,
        },
        EngineSpec::MaxRects {
            heuristic: MaxRectsHeuristic::BestAreaFit,
        },
        EngineSpec::Skyline {
            heuristic: SkylineHeuristic::BottomLeft,
            use_waste_map: false,
            g_choice: default_g_choice(),
        },
        EngineSpec::MaxRects {
            heuristic: MaxRectsHeuristic::BestLongSideFit,
        },
        EngineSpec::CornerPointsMr {
            heuristic: MaxRectsHeuristic::FirstFit,
            top_k: Some(35),
        },
    ]
}

/// Builder for `PackerConfig` for ergonomic construction.
#[derive(Debug, Default, Clone)]
pub struct PackerConfigBuilder {
    cfg: PackerConfig,
}

impl PackerConfigBuilder {
    pub fn new() -> Self {
        Self {
            cfg: PackerConfig::default(),
        }
    }
    pub fn with_bin(mut self, w: u32, h: u32) -> Self {
        self.cfg.bin_width = w;
        self.cfg.bin_height = h;
        self
    }
    pub fn allow_rotation(mut self, v: bool) -> Self {
        self.cfg.allow_rotation = v;
        self
    }
    pub fn parallel(mut self, v: bool) -> Self {
        self.cfg.parallel = v;
        self
    }
    /// Replaces the roster.
    pub fn roster(mut self, v: Vec<EngineSpec>) -> Self {
        self.cfg.roster = v;
        self
    }
    /// Appends one member to the roster.
    pub fn engine(mut self, v: EngineSpec) -> Self {
        self.cfg.roster.push(v);
        self
    }
    pub fn build(self) -> PackerConfig {
        self.cfg
    }
}

impl PackerConfig {
    /// Create a fluent builder for `PackerConfig`.
    pub fn builder() -> PackerConfigBuilder {
        PackerConfigBuilder::new()
    }
}
