use crate::theme::Theme;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

const TITLE_PREFIXES: [&str; 14] = [
    "Raden Mas",
    "Raden Ayu",
    "Raden Ajeng",
    "Raden",
    "Kanjeng",
    "Gusti",
    "Tengku",
    "Teuku",
    "Sultan",
    "Pangeran",
    "Andi",
    "Datuk",
    "Tuanku",
    "Sutan",
];

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("{field} must be a finite number, got {value}")]
    NotFinite { field: &'static str, value: f32 },
    #[error("{field} must be greater than zero, got {value}")]
    NotPositive { field: &'static str, value: f32 },
    #[error("{field} must not be negative, got {value}")]
    Negative { field: &'static str, value: f32 },
    #[error("{field} must be within [0, 1], got {value}")]
    OutOfUnitRange { field: &'static str, value: f32 },
    #[error("{field} must be at least 1")]
    Zero { field: &'static str },
}

/// What to do with a parent-to-child cluster edge that does not point to a
/// lower rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CycleBreaking {
    /// Drop the edge.
    Ignore,
    /// Lay out a placeholder copy of the child one row below the parent.
    CloneNode,
    /// Drop the edge from placement but report it for drawing.
    CrossLink,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MultiSpouseOrdering {
    MarriageOrder,
    BirthDate,
    Input,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GenerationAlignment {
    /// Rows come from the generation index.
    Strict,
    /// Rows come from longest-path layering of the cluster graph.
    Relaxed,
}

/// Which placer produces the initial cluster x positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LayeredPlacer {
    /// `dagre_rust`, falling back to the median placer when it yields nothing.
    Dagre,
    /// Median crossing reduction with feasible balancing sweeps.
    Median,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutRules {
    pub spouse_ordering: bool,
    pub birth_date_sort: bool,
    pub parent_centering: bool,
    pub resolve_overlaps: bool,
    pub cross_lineage_grouping: bool,
    pub show_orphans: bool,
    pub normalize_positions: bool,
    pub compaction: bool,
    pub title_grouping: bool,
    pub center_husband_between_two_wives: bool,
    pub cycle_breaking: CycleBreaking,
    pub multi_spouse_ordering: MultiSpouseOrdering,
    pub generation_alignment: GenerationAlignment,
    pub layered_placer: LayeredPlacer,
}

impl Default for LayoutRules {
    fn default() -> Self {
        Self {
            spouse_ordering: true,
            birth_date_sort: true,
            parent_centering: true,
            resolve_overlaps: true,
            cross_lineage_grouping: true,
            show_orphans: true,
            normalize_positions: true,
            compaction: true,
            title_grouping: true,
            center_husband_between_two_wives: true,
            cycle_breaking: CycleBreaking::CrossLink,
            multi_spouse_ordering: MultiSpouseOrdering::MarriageOrder,
            generation_alignment: GenerationAlignment::Strict,
            layered_placer: LayeredPlacer::Dagre,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollisionConfig {
    pub base_passes: usize,
    pub people_per_extra_pass: usize,
    pub max_passes: usize,
    pub final_passes: usize,
    pub row_tolerance: f32,
}

impl Default for CollisionConfig {
    fn default() -> Self {
        Self {
            base_passes: 10,
            people_per_extra_pass: 20,
            max_passes: 60,
            final_passes: 5,
            row_tolerance: 1.0,
        }
    }
}

impl CollisionConfig {
    /// Pass budget for a tree of `people` persons.
    pub fn pass_budget(&self, people: usize) -> usize {
        let extra = people / self.people_per_extra_pass.max(1);
        (self.base_passes + extra).min(self.max_passes).max(1)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AestheticConfig {
    pub parent_centering_iterations: usize,
    pub child_pull_threshold: f32,
    pub child_pull_factor: f32,
    pub title_damping: f32,
    pub title_prefixes: Vec<String>,
}

impl Default for AestheticConfig {
    fn default() -> Self {
        Self {
            parent_centering_iterations: 3,
            child_pull_threshold: 240.0,
            child_pull_factor: 0.3,
            title_damping: 0.3,
            title_prefixes: TITLE_PREFIXES.iter().map(|value| value.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncrementalConfig {
    pub jitter: f32,
}

impl Default for IncrementalConfig {
    fn default() -> Self {
        Self { jitter: 30.0 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutConfig {
    pub node_width: f32,
    pub node_height: f32,
    pub generation_spacing: f32,
    pub sibling_spacing: f32,
    pub spouse_gap: f32,
    pub margin: f32,
    pub min_gap: f32,
    pub orphan_gap: f32,
    pub orphan_columns: usize,
    pub orphan_row_gap: f32,
    pub cross_lineage_spacing_multiplier: f32,
    pub cross_lineage_pull_multiplier: f32,
    pub compaction_fraction: f32,
    pub order_passes: usize,
    pub collision: CollisionConfig,
    pub aesthetics: AestheticConfig,
    pub incremental: IncrementalConfig,
    pub rules: LayoutRules,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            node_width: 180.0,
            node_height: 80.0,
            generation_spacing: 200.0,
            sibling_spacing: 60.0,
            spouse_gap: 40.0,
            margin: 50.0,
            min_gap: 20.0,
            orphan_gap: 150.0,
            orphan_columns: 6,
            orphan_row_gap: 40.0,
            cross_lineage_spacing_multiplier: 1.5,
            cross_lineage_pull_multiplier: 2.0,
            compaction_fraction: 0.5,
            order_passes: 4,
            collision: CollisionConfig::default(),
            aesthetics: AestheticConfig::default(),
            incremental: IncrementalConfig::default(),
            rules: LayoutRules::default(),
        }
    }
}

impl LayoutConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("nodeWidth", self.node_width),
            ("nodeHeight", self.node_height),
            ("generationSpacing", self.generation_spacing),
            ("crossLineageSpacingMultiplier", self.cross_lineage_spacing_multiplier),
            ("crossLineagePullMultiplier", self.cross_lineage_pull_multiplier),
            ("collision.rowTolerance", self.collision.row_tolerance),
        ];
        let non_negative = [
            ("siblingSpacing", self.sibling_spacing),
            ("spouseGap", self.spouse_gap),
            ("margin", self.margin),
            ("minGap", self.min_gap),
            ("orphanGap", self.orphan_gap),
            ("orphanRowGap", self.orphan_row_gap),
            ("aesthetics.childPullThreshold", self.aesthetics.child_pull_threshold),
            ("incremental.jitter", self.incremental.jitter),
        ];
        let unit = [
            ("compactionFraction", self.compaction_fraction),
            ("aesthetics.childPullFactor", self.aesthetics.child_pull_factor),
            ("aesthetics.titleDamping", self.aesthetics.title_damping),
        ];
        let counts = [
            ("orphanColumns", self.orphan_columns),
            ("collision.maxPasses", self.collision.max_passes),
            ("collision.peoplePerExtraPass", self.collision.people_per_extra_pass),
        ];

        for (field, value) in positive.iter().chain(&non_negative).chain(&unit) {
            if !value.is_finite() {
                return Err(ConfigError::NotFinite {
                    field,
                    value: *value,
                });
            }
        }
        for (field, value) in positive {
            if value <= 0.0 {
                return Err(ConfigError::NotPositive { field, value });
            }
        }
        for (field, value) in non_negative {
            if value < 0.0 {
                return Err(ConfigError::Negative { field, value });
            }
        }
        for (field, value) in unit {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::OutOfUnitRange { field, value });
            }
        }
        for (field, value) in counts {
            if value == 0 {
                return Err(ConfigError::Zero { field });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    pub width: f32,
    pub height: f32,
    pub background: String,
    pub show_generation_labels: bool,
    pub generation_label_prefix: String,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: 1200.0,
            height: 800.0,
            background: "#FFFFFF".to_string(),
            show_generation_labels: true,
            generation_label_prefix: "Generation".to_string(),
        }
    }
}

impl RenderConfig {
    /// Row caption for a generation index, e.g. `Generation 2`.
    pub fn generation_label(&self, generation: usize) -> String {
        let prefix = self.generation_label_prefix.trim();
        if prefix.is_empty() {
            generation.to_string()
        } else {
            format!("{prefix} {generation}")
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub theme: Theme,
    pub layout: LayoutConfig,
    pub render: RenderConfig,
}

impl Default for Config {
    fn default() -> Self {
        let theme = Theme::modern();
        let render = RenderConfig {
            background: theme.background.clone(),
            ..Default::default()
        };
        Self {
            theme,
            layout: LayoutConfig::default(),
            render,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct LayoutRulesFile {
    spouse_ordering: Option<bool>,
    birth_date_sort: Option<bool>,
    parent_centering: Option<bool>,
    resolve_overlaps: Option<bool>,
    cross_lineage_grouping: Option<bool>,
    show_orphans: Option<bool>,
    normalize_positions: Option<bool>,
    compaction: Option<bool>,
    title_grouping: Option<bool>,
    center_husband_between_two_wives: Option<bool>,
    cycle_breaking: Option<CycleBreaking>,
    multi_spouse_ordering: Option<MultiSpouseOrdering>,
    generation_alignment: Option<GenerationAlignment>,
    layered_placer: Option<LayeredPlacer>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct CollisionConfigFile {
    base_passes: Option<usize>,
    people_per_extra_pass: Option<usize>,
    max_passes: Option<usize>,
    final_passes: Option<usize>,
    row_tolerance: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct AestheticConfigFile {
    parent_centering_iterations: Option<usize>,
    child_pull_threshold: Option<f32>,
    child_pull_factor: Option<f32>,
    title_damping: Option<f32>,
    title_prefixes: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct IncrementalConfigFile {
    jitter: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct LayoutConfigFile {
    node_width: Option<f32>,
    node_height: Option<f32>,
    generation_spacing: Option<f32>,
    sibling_spacing: Option<f32>,
    spouse_gap: Option<f32>,
    margin: Option<f32>,
    min_gap: Option<f32>,
    orphan_gap: Option<f32>,
    orphan_columns: Option<usize>,
    orphan_row_gap: Option<f32>,
    cross_lineage_spacing_multiplier: Option<f32>,
    cross_lineage_pull_multiplier: Option<f32>,
    compaction_fraction: Option<f32>,
    order_passes: Option<usize>,
    collision: Option<CollisionConfigFile>,
    aesthetics: Option<AestheticConfigFile>,
    incremental: Option<IncrementalConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct RenderConfigFile {
    width: Option<f32>,
    height: Option<f32>,
    background: Option<String>,
    show_generation_labels: Option<bool>,
    generation_label_prefix: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct ConfigFile {
    theme: Option<String>,
    layout: Option<LayoutConfigFile>,
    rules: Option<LayoutRulesFile>,
    render: Option<RenderConfigFile>,
}

impl ConfigFile {
    fn apply(self, config: &mut Config) {
        if let Some(theme_name) = self.theme.as_deref() {
            if theme_name == "classic" {
                config.theme = Theme::classic();
            } else if theme_name == "modern" || theme_name == "default" {
                config.theme = Theme::modern();
            }
            config.render.background = config.theme.background.clone();
        }
        if let Some(layout) = self.layout {
            layout.apply(&mut config.layout);
        }
        if let Some(rules) = self.rules {
            rules.apply(&mut config.layout.rules);
        }
        if let Some(render) = self.render {
            render.apply(&mut config.render);
        }
    }
}

impl LayoutConfigFile {
    fn apply(self, config: &mut LayoutConfig) {
        if let Some(v) = self.node_width {
            config.node_width = v;
        }
        if let Some(v) = self.node_height {
            config.node_height = v;
        }
        if let Some(v) = self.generation_spacing {
            config.generation_spacing = v;
        }
        if let Some(v) = self.sibling_spacing {
            config.sibling_spacing = v;
        }
        if let Some(v) = self.spouse_gap {
            config.spouse_gap = v;
        }
        if let Some(v) = self.margin {
            config.margin = v;
        }
        if let Some(v) = self.min_gap {
            config.min_gap = v;
        }
        if let Some(v) = self.orphan_gap {
            config.orphan_gap = v;
        }
        if let Some(v) = self.orphan_columns {
            config.orphan_columns = v;
        }
        if let Some(v) = self.orphan_row_gap {
            config.orphan_row_gap = v;
        }
        if let Some(v) = self.cross_lineage_spacing_multiplier {
            config.cross_lineage_spacing_multiplier = v;
        }
        if let Some(v) = self.cross_lineage_pull_multiplier {
            config.cross_lineage_pull_multiplier = v;
        }
        if let Some(v) = self.compaction_fraction {
            config.compaction_fraction = v;
        }
        if let Some(v) = self.order_passes {
            config.order_passes = v;
        }
        if let Some(collision) = self.collision {
            if let Some(v) = collision.base_passes {
                config.collision.base_passes = v;
            }
            if let Some(v) = collision.people_per_extra_pass {
                config.collision.people_per_extra_pass = v;
            }
            if let Some(v) = collision.max_passes {
                config.collision.max_passes = v;
            }
            if let Some(v) = collision.final_passes {
                config.collision.final_passes = v;
            }
            if let Some(v) = collision.row_tolerance {
                config.collision.row_tolerance = v;
            }
        }
        if let Some(aesthetics) = self.aesthetics {
            if let Some(v) = aesthetics.parent_centering_iterations {
                config.aesthetics.parent_centering_iterations = v;
            }
            if let Some(v) = aesthetics.child_pull_threshold {
                config.aesthetics.child_pull_threshold = v;
            }
            if let Some(v) = aesthetics.child_pull_factor {
                config.aesthetics.child_pull_factor = v;
            }
            if let Some(v) = aesthetics.title_damping {
                config.aesthetics.title_damping = v;
            }
            if let Some(v) = aesthetics.title_prefixes {
                config.aesthetics.title_prefixes = v;
            }
        }
        if let Some(incremental) = self.incremental
            && let Some(v) = incremental.jitter
        {
            config.incremental.jitter = v;
        }
    }
}

impl LayoutRulesFile {
    fn apply(self, rules: &mut LayoutRules) {
        if let Some(v) = self.spouse_ordering {
            rules.spouse_ordering = v;
        }
        if let Some(v) = self.birth_date_sort {
            rules.birth_date_sort = v;
        }
        if let Some(v) = self.parent_centering {
            rules.parent_centering = v;
        }
        if let Some(v) = self.resolve_overlaps {
            rules.resolve_overlaps = v;
        }
        if let Some(v) = self.cross_lineage_grouping {
            rules.cross_lineage_grouping = v;
        }
        if let Some(v) = self.show_orphans {
            rules.show_orphans = v;
        }
        if let Some(v) = self.normalize_positions {
            rules.normalize_positions = v;
        }
        if let Some(v) = self.compaction {
            rules.compaction = v;
        }
        if let Some(v) = self.title_grouping {
            rules.title_grouping = v;
        }
        if let Some(v) = self.center_husband_between_two_wives {
            rules.center_husband_between_two_wives = v;
        }
        if let Some(v) = self.cycle_breaking {
            rules.cycle_breaking = v;
        }
        if let Some(v) = self.multi_spouse_ordering {
            rules.multi_spouse_ordering = v;
        }
        if let Some(v) = self.generation_alignment {
            rules.generation_alignment = v;
        }
        if let Some(v) = self.layered_placer {
            rules.layered_placer = v;
        }
    }
}

impl RenderConfigFile {
    fn apply(self, render: &mut RenderConfig) {
        if let Some(v) = self.width {
            render.width = v;
        }
        if let Some(v) = self.height {
            render.height = v;
        }
        if let Some(v) = self.background {
            render.background = v;
        }
        if let Some(v) = self.show_generation_labels {
            render.show_generation_labels = v;
        }
        if let Some(v) = self.generation_label_prefix {
            render.generation_label_prefix = v;
        }
    }
}

fn parse_config_file(contents: &str) -> anyhow::Result<ConfigFile> {
    match serde_json::from_str::<ConfigFile>(contents) {
        Ok(parsed) => Ok(parsed),
        Err(json_err) => json5::from_str::<ConfigFile>(contents)
            .map_err(|_| anyhow::anyhow!("invalid layout config: {json_err}")),
    }
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let mut config = Config::default();
    let Some(path) = path else {
        return Ok(config);
    };

    let contents = std::fs::read_to_string(path)?;
    parse_config_file(&contents)?.apply(&mut config);
    config.layout.validate()?;
    Ok(config)
}

/// Overlays a partial config object (same shape as a config file) onto
/// `config` and validates the result.
pub fn apply_overrides(config: &mut Config, overrides: &serde_json::Value) -> anyhow::Result<()> {
    let parsed: ConfigFile = serde_json::from_value(overrides.clone())?;
    parsed.apply(config);
    config.layout.validate()?;
    Ok(())
}

/// Parses a config document from text and overlays it onto the defaults.
pub fn config_from_str(contents: &str) -> anyhow::Result<Config> {
    let mut config = Config::default();
    parse_config_file(contents)?.apply(&mut config);
    config.layout.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        assert_eq!(LayoutConfig::default().validate(), Ok(()));
    }

    #[test]
    fn partial_overrides_keep_other_defaults() {
        let config = config_from_str(
            r#"{
                "layout": { "siblingSpacing": 90, "collision": { "maxPasses": 12 } },
                "rules": { "birthDateSort": false, "cycleBreaking": "clone-node", "layeredPlacer": "median" }
            }"#,
        )
        .unwrap();
        assert_eq!(config.layout.sibling_spacing, 90.0);
        assert_eq!(config.layout.collision.max_passes, 12);
        assert_eq!(config.layout.collision.base_passes, 10);
        assert_eq!(config.layout.generation_spacing, 200.0);
        assert!(!config.layout.rules.birth_date_sort);
        assert!(config.layout.rules.parent_centering);
        assert_eq!(config.layout.rules.cycle_breaking, CycleBreaking::CloneNode);
        assert_eq!(config.layout.rules.layered_placer, LayeredPlacer::Median);
        assert_eq!(LayoutRules::default().layered_placer, LayeredPlacer::Dagre);
    }

    #[test]
    fn json5_config_is_accepted() {
        let config = config_from_str(
            "{ theme: 'classic', layout: { margin: 10, }, // trailing comment\n }",
        )
        .unwrap();
        assert_eq!(config.layout.margin, 10.0);
        assert_eq!(config.theme.background, Theme::classic().background);
    }

    #[test]
    fn rejects_invalid_values() {
        let err = config_from_str(r#"{ "layout": { "compactionFraction": 1.5 } }"#).unwrap_err();
        assert!(err.to_string().contains("compactionFraction"));

        let mut config = LayoutConfig::default();
        config.orphan_columns = 0;
        assert_eq!(
            config.validate(),
            Err(ConfigError::Zero {
                field: "orphanColumns"
            })
        );

        config = LayoutConfig::default();
        config.node_width = f32::NAN;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::NotFinite { field: "nodeWidth", .. })
        ));
    }

    #[test]
    fn pass_budget_grows_with_tree_size() {
        let collision = CollisionConfig::default();
        assert_eq!(collision.pass_budget(0), 10);
        assert_eq!(collision.pass_budget(200), 20);
        assert_eq!(collision.pass_budget(100_000), 60);
    }

    #[test]
    fn apply_overrides_merges_inline_object() {
        let mut config = Config::default();
        let overrides = serde_json::json!({ "rules": { "showOrphans": false } });
        apply_overrides(&mut config, &overrides).unwrap();
        assert!(!config.layout.rules.show_orphans);
        assert!(config.layout.rules.compaction);
    }

    #[test]
    fn generation_label_uses_prefix() {
        let mut render = RenderConfig::default();
        assert_eq!(render.generation_label(3), "Generation 3");
        render.generation_label_prefix = "Generasi ".into();
        assert_eq!(render.generation_label(1), "Generasi 1");
        render.generation_label_prefix.clear();
        assert_eq!(render.generation_label(4), "4");
    }
}
