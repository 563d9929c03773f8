use serde::Deserialize;
use silsilah_layout::config::{Config, apply_overrides};
use silsilah_layout::layout_dump::LayoutDump;
use silsilah_layout::render::render_svg;
use silsilah_layout::theme::Theme;
use silsilah_layout::{
    ArrangeMode, LayoutCache, Person, PositionMap, Viewport, layout_document, parse_snapshot,
};
use wasm_bindgen::prelude::*;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LayoutOptions {
    theme: Option<String>,
    auto_arrange: Option<bool>,
    /// "dump" (default), "positions" or "svg".
    output: Option<String>,
    config: Option<serde_json::Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaceOptions {
    viewport: Option<Viewport>,
    config: Option<serde_json::Value>,
    /// The family document the positions belong to. Supplies child counts
    /// for the below-parent jitter.
    document: Option<serde_json::Value>,
}

fn parse_options<T: for<'de> Deserialize<'de> + Default>(raw: Option<&str>) -> Result<T, String> {
    match raw {
        Some(raw) if !raw.trim().is_empty() => {
            serde_json::from_str::<T>(raw).map_err(|error| error.to_string())
        }
        _ => Ok(T::default()),
    }
}

fn build_config(theme: Option<&str>, overrides: Option<&serde_json::Value>) -> Result<Config, String> {
    let mut config = Config::default();
    if theme == Some("classic") {
        config.theme = Theme::classic();
        config.render.background = config.theme.background.clone();
    }
    if let Some(overrides) = overrides {
        apply_overrides(&mut config, overrides).map_err(|error| error.to_string())?;
    }
    Ok(config)
}

fn layout_json(document: &str, options_json: Option<&str>) -> Result<String, String> {
    let options: LayoutOptions = parse_options(options_json)?;
    let config = build_config(options.theme.as_deref(), options.config.as_ref())?;
    let mode = if options.auto_arrange.unwrap_or(false) {
        ArrangeMode::AutoArrange
    } else {
        ArrangeMode::Relayout
    };
    let result = layout_document(document, &config, mode).map_err(|error| error.to_string())?;
    let snapshot = &result.document.snapshot;
    let config = &result.config;
    match options.output.as_deref().unwrap_or("dump") {
        "dump" => {
            let dump = LayoutDump::from_layout(&result.layout, snapshot, &config.layout, &config.render);
            serde_json::to_string(&dump).map_err(|error| error.to_string())
        }
        "positions" => {
            serde_json::to_string(&result.layout.positions).map_err(|error| error.to_string())
        }
        "svg" => Ok(render_svg(
            &result.layout,
            snapshot,
            &config.theme,
            &config.layout,
            &config.render,
        )),
        other => Err(format!("unknown output kind: {other}")),
    }
}

fn place_json(positions: &str, person: &str, options_json: Option<&str>) -> Result<String, String> {
    let options: PlaceOptions = parse_options(options_json)?;
    let config = build_config(None, options.config.as_ref())?;
    let positions: PositionMap = serde_json::from_str(positions).map_err(|error| error.to_string())?;
    let person: Person = serde_json::from_str(person).map_err(|error| error.to_string())?;
    let snapshot = match &options.document {
        Some(document) => Some(
            parse_snapshot(&document.to_string())
                .map_err(|error| error.to_string())?
                .snapshot,
        ),
        None => None,
    };
    let cache = LayoutCache::from_positions(positions, snapshot.as_ref());
    let placement = silsilah_layout::place_new_person(&person, &cache, options.viewport, &config.layout);
    serde_json::to_string(&placement).map_err(|error| error.to_string())
}

/// Full layout of a family document. Returns JSON, or SVG when
/// `options.output` is `"svg"`.
#[wasm_bindgen]
pub fn compute_family_layout(document: &str, options_json: Option<String>) -> Result<String, JsValue> {
    layout_json(document, options_json.as_deref()).map_err(|error| JsValue::from_str(&error))
}

/// Position for one new person given the current position map, without a
/// full relayout. `options.document` lets siblings spread out.
#[wasm_bindgen]
pub fn place_new_person(
    positions_json: &str,
    person_json: &str,
    options_json: Option<String>,
) -> Result<String, JsValue> {
    place_json(positions_json, person_json, options_json.as_deref())
        .map_err(|error| JsValue::from_str(&error))
}
