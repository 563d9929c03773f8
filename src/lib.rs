#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod ir;
pub mod layout;
pub mod layout_dump;
pub mod parser;
pub mod render;
pub mod theme;

#[cfg(feature = "cli")]
pub use cli::run;
pub use config::{Config, LayoutConfig, LayoutRules, apply_overrides, load_config};
pub use ir::{FamilySnapshot, Gender, Person, Position, PositionMap, Relationship};
pub use layout::{
    ArrangeMode, Layout, LayoutCache, LayoutInput, Placement, PlacementStrategy, Viewport,
    compute_layout, place_new_person,
};
pub use parser::{ParseOutput, parse_snapshot};

/// A parsed document together with the config it was laid out with and
/// the resulting layout.
#[derive(Debug)]
pub struct DocumentLayout {
    pub document: ParseOutput,
    pub config: Config,
    pub layout: Layout,
}

/// Parses `input` and overlays its inline config on `base`.
fn prepare_document(input: &str, base: &Config) -> anyhow::Result<(ParseOutput, Config)> {
    let document = parse_snapshot(input)?;
    let mut config = base.clone();
    if let Some(overrides) = &document.config_overrides {
        apply_overrides(&mut config, overrides)?;
    }
    config.layout.validate()?;
    Ok((document, config))
}

/// Parses `input`, overlays its inline config on `base` and lays it out.
/// Positions carried in the document act as the previous layout.
pub fn layout_document(input: &str, base: &Config, mode: ArrangeMode) -> anyhow::Result<DocumentLayout> {
    let (document, config) = prepare_document(input, base)?;
    let layout = layout_prepared(&document, &config, mode);
    Ok(DocumentLayout {
        document,
        config,
        layout,
    })
}

fn layout_prepared(document: &ParseOutput, config: &Config, mode: ArrangeMode) -> Layout {
    let previous = document
        .positions
        .clone()
        .map(|positions| LayoutCache::from_positions(positions, Some(&document.snapshot)));
    let mut input = LayoutInput::new(&document.snapshot)
        .with_collapsed(document.collapsed.iter().cloned())
        .with_mode(mode);
    if let Some(roots) = &document.roots {
        input = input.with_roots(roots.clone());
    }
    if let Some(previous) = &previous {
        input = input.with_previous(previous);
    }
    compute_layout(&input, &config.layout)
}

/// Cache for incremental placement into the document's existing layout.
/// Stored positions are taken as they are; only a document without
/// positions is laid out first.
pub fn document_cache(
    input: &str,
    base: &Config,
    mode: ArrangeMode,
) -> anyhow::Result<(ParseOutput, Config, LayoutCache)> {
    let (document, config) = prepare_document(input, base)?;
    let cache = match &document.positions {
        Some(positions) => LayoutCache::from_positions(positions.clone(), Some(&document.snapshot)),
        None => {
            let layout = layout_prepared(&document, &config, mode);
            LayoutCache::from_layout(&layout, &document.snapshot)
        }
    };
    Ok((document, config, cache))
}
