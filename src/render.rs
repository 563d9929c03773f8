use crate::config::{LayoutConfig, RenderConfig};
use crate::ir::{FamilySnapshot, Gender, Position};
use crate::layout::Layout;
use crate::layout::family::FamilyIndex;
use crate::theme::Theme;
use anyhow::Result;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

const LABEL_GUTTER: f32 = 8.0;

/// Draws a layout as a standalone SVG preview: generation captions, spouse
/// and parent-child connectors, cross-links, clones and one box per person.
pub fn render_svg(
    layout: &Layout,
    snapshot: &FamilySnapshot,
    theme: &Theme,
    config: &LayoutConfig,
    render: &RenderConfig,
) -> String {
    let mut svg = String::new();
    let width = layout.width.max(200.0);
    let height = layout.height.max(200.0);
    svg.push_str(&format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{width}\" height=\"{height}\" viewBox=\"0 0 {width} {height}\">",
    ));
    svg.push_str(&format!(
        "<rect width=\"100%\" height=\"100%\" fill=\"{}\"/>",
        render.background
    ));

    if render.show_generation_labels {
        for (y, generation) in generation_rows(layout) {
            let label_y = y + config.node_height / 2.0;
            svg.push_str(&format!(
                "<text x=\"{LABEL_GUTTER:.2}\" y=\"{label_y:.2}\" font-family=\"{}\" font-size=\"{}\" fill=\"{}\" dominant-baseline=\"middle\">{}</text>",
                theme.font_family,
                theme.font_size * 0.85,
                theme.generation_label_color,
                escape_xml(&render.generation_label(generation))
            ));
        }
    }

    let positions = &layout.positions;
    let mid_height = config.node_height / 2.0;
    for cluster in &layout.clusters {
        for pair in cluster.members.windows(2) {
            let (Some(left), Some(right)) = (positions.get(&pair[0]), positions.get(&pair[1]))
            else {
                continue;
            };
            svg.push_str(&format!(
                "<line x1=\"{:.2}\" y1=\"{:.2}\" x2=\"{:.2}\" y2=\"{:.2}\" stroke=\"{}\" stroke-width=\"2\"/>",
                left.x + config.node_width,
                left.y + mid_height,
                right.x,
                right.y + mid_height,
                theme.spouse_line
            ));
        }
    }

    let index = FamilyIndex::build(snapshot);
    let cut: BTreeSet<(&str, &str)> = layout
        .cross_links
        .iter()
        .map(|link| (link.parent.as_str(), link.child.as_str()))
        .chain(
            layout
                .clones
                .iter()
                .map(|clone| (clone.parent.as_str(), clone.person_id.as_str())),
        )
        .collect();
    for child in &index.order {
        let Some(child_pos) = positions.get(*child) else {
            continue;
        };
        let parents: Vec<Position> = index
            .parents(child)
            .iter()
            .filter(|parent| !cut.contains(&(**parent, *child)))
            .filter_map(|parent| positions.get(*parent).copied())
            .collect();
        let Some(anchor) = parent_anchor(&parents, config) else {
            continue;
        };
        if anchor.1 >= child_pos.y {
            continue;
        }
        let target_x = child_pos.x + config.node_width / 2.0;
        let mid_y = (anchor.1 + child_pos.y) / 2.0;
        svg.push_str(&format!(
            "<path d=\"M {:.2} {:.2} V {mid_y:.2} H {target_x:.2} V {:.2}\" fill=\"none\" stroke=\"{}\" stroke-width=\"1.4\"/>",
            anchor.0, anchor.1, child_pos.y, theme.child_line
        ));
    }

    for link in &layout.cross_links {
        let (Some(parent), Some(child)) = (positions.get(&link.parent), positions.get(&link.child))
        else {
            continue;
        };
        svg.push_str(&format!(
            "<line x1=\"{:.2}\" y1=\"{:.2}\" x2=\"{:.2}\" y2=\"{:.2}\" stroke=\"{}\" stroke-width=\"1.4\" stroke-dasharray=\"6 4\"/>",
            parent.x + config.node_width / 2.0,
            parent.y + config.node_height,
            child.x + config.node_width / 2.0,
            child.y,
            theme.cross_link_line
        ));
    }

    for clone in &layout.clones {
        if let Some(parent) = positions.get(&clone.parent) {
            svg.push_str(&format!(
                "<line x1=\"{:.2}\" y1=\"{:.2}\" x2=\"{:.2}\" y2=\"{:.2}\" stroke=\"{}\" stroke-width=\"1.2\" stroke-dasharray=\"3 3\"/>",
                parent.x + config.node_width / 2.0,
                parent.y + config.node_height,
                clone.x + config.node_width / 2.0,
                clone.y,
                theme.cross_link_line
            ));
        }
        svg.push_str(&format!(
            "<rect x=\"{:.2}\" y=\"{:.2}\" width=\"{:.2}\" height=\"{:.2}\" rx=\"10\" ry=\"10\" fill=\"{}\" stroke=\"{}\" stroke-dasharray=\"5 3\" stroke-width=\"1.2\"/>",
            clone.x,
            clone.y,
            config.node_width,
            config.node_height,
            theme.clone_fill,
            theme.cross_link_line
        ));
        let label = snapshot
            .person(&clone.person_id)
            .map_or(clone.person_id.as_str(), |person| person.label());
        svg.push_str(&label_svg(
            clone.x + config.node_width / 2.0,
            clone.y + mid_height,
            label,
            theme,
        ));
    }

    for (id, position) in positions {
        let person = snapshot.person(id);
        let gender = person.map(|p| p.gender).unwrap_or(Gender::Unknown);
        let (border, border_width) = if position.fixed {
            (theme.fixed_border.as_str(), 2.2)
        } else {
            (theme.node_border.as_str(), 1.4)
        };
        svg.push_str(&format!(
            "<rect x=\"{:.2}\" y=\"{:.2}\" width=\"{:.2}\" height=\"{:.2}\" rx=\"10\" ry=\"10\" fill=\"{}\" stroke=\"{}\" stroke-width=\"{}\"/>",
            position.x,
            position.y,
            config.node_width,
            config.node_height,
            theme.fill_for(gender),
            border,
            border_width
        ));
        let label = person.map_or(id.as_str(), |p| p.label());
        svg.push_str(&label_svg(
            position.x + config.node_width / 2.0,
            position.y + mid_height,
            label,
            theme,
        ));
    }

    svg.push_str("</svg>");
    svg
}

/// One caption per row: the smallest generation seen at each distinct y.
fn generation_rows(layout: &Layout) -> Vec<(f32, usize)> {
    let mut rows: BTreeMap<i64, (f32, usize)> = BTreeMap::new();
    for cluster in layout.clusters.iter().filter(|cluster| !cluster.orphan) {
        let Some(generation) = cluster.generation else {
            continue;
        };
        let key = cluster.y.round() as i64;
        rows.entry(key)
            .and_modify(|entry| entry.1 = entry.1.min(generation))
            .or_insert((cluster.y, generation));
    }
    rows.into_values().collect()
}

/// Where a child connector starts: below a single parent, or from the
/// middle of the spouse line between two.
fn parent_anchor(parents: &[Position], config: &LayoutConfig) -> Option<(f32, f32)> {
    match parents {
        [] => None,
        [single] => Some((
            single.x + config.node_width / 2.0,
            single.y + config.node_height,
        )),
        [first, second, ..] if (first.y - second.y).abs() < 1.0 => {
            let (left, right) = if first.x <= second.x {
                (first, second)
            } else {
                (second, first)
            };
            Some((
                (left.x + config.node_width + right.x) / 2.0,
                left.y + config.node_height / 2.0,
            ))
        }
        [first, ..] => Some((first.x + config.node_width / 2.0, first.y + config.node_height)),
    }
}

fn label_svg(x: f32, y: f32, label: &str, theme: &Theme) -> String {
    format!(
        "<text x=\"{x:.2}\" y=\"{y:.2}\" text-anchor=\"middle\" dominant-baseline=\"middle\" font-family=\"{}\" font-size=\"{}\" fill=\"{}\">{}</text>",
        theme.font_family,
        theme.font_size,
        theme.text_color,
        escape_xml(label)
    )
}

pub fn write_output_svg(svg: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, svg)?;
        }
        None => {
            print!("{}", svg);
        }
    }
    Ok(())
}

#[cfg(feature = "png")]
pub fn write_output_png(svg: &str, output: &Path, render_cfg: &RenderConfig) -> Result<()> {
    let opt = usvg::Options {
        default_size: usvg::Size::from_wh(render_cfg.width, render_cfg.height)
            .ok_or_else(|| anyhow::anyhow!("invalid preview size"))?,
        ..Default::default()
    };

    let tree = usvg::Tree::from_str(svg, &opt)?;
    let size = tree.size().to_int_size();
    let mut pixmap = resvg::tiny_skia::Pixmap::new(size.width(), size.height())
        .ok_or_else(|| anyhow::anyhow!("Failed to allocate pixmap"))?;

    let mut pixmap_mut = pixmap.as_mut();
    resvg::render(&tree, resvg::tiny_skia::Transform::default(), &mut pixmap_mut);
    pixmap.save_png(output)?;
    Ok(())
}

fn escape_xml(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CycleBreaking;
    use crate::ir::Person;
    use crate::layout::{LayoutInput, compute_layout};

    fn family() -> FamilySnapshot {
        let mut snapshot = FamilySnapshot::new();
        let mut father = Person::new("f", Gender::Male);
        father.name = Some("Budi & Sons".into());
        snapshot.upsert_person(father);
        snapshot.upsert_person(Person::new("m", Gender::Female));
        snapshot.upsert_person(Person::new("c", Gender::Female));
        snapshot.marry("f", "m", Some(1));
        snapshot.add_child("f", "c");
        snapshot.add_child("m", "c");
        snapshot
    }

    #[test]
    fn render_svg_draws_people_and_connectors() {
        let snapshot = family();
        let config = LayoutConfig::default();
        let layout = compute_layout(&LayoutInput::new(&snapshot), &config);
        let theme = Theme::modern();
        let svg = render_svg(&layout, &snapshot, &theme, &config, &RenderConfig::default());
        assert!(svg.starts_with("<svg"));
        assert!(svg.contains("Budi &amp; Sons"));
        assert!(svg.contains(&theme.female_fill));
        assert!(svg.contains(&theme.spouse_line));
        assert!(svg.contains(&theme.child_line));
        assert!(svg.contains("Generation 1"));
        assert!(svg.contains("Generation 2"));
    }

    #[test]
    fn clones_are_drawn_dashed() {
        let mut snapshot = FamilySnapshot::new();
        snapshot.upsert_person(Person::new("a", Gender::Male));
        snapshot.upsert_person(Person::new("b", Gender::Male));
        snapshot.add_child("a", "b");
        snapshot.add_child("b", "a");
        let mut config = LayoutConfig::default();
        config.rules.cycle_breaking = CycleBreaking::CloneNode;
        let layout = compute_layout(
            &LayoutInput::new(&snapshot).with_roots(vec!["a".into()]),
            &config,
        );
        let theme = Theme::classic();
        let svg = render_svg(&layout, &snapshot, &theme, &config, &RenderConfig::default());
        assert!(svg.contains("stroke-dasharray=\"5 3\""));
        assert!(svg.contains(&theme.clone_fill));
    }

    #[test]
    fn parent_anchor_sits_between_spouses() {
        let config = LayoutConfig::default();
        let anchor = parent_anchor(
            &[Position::new(260.0, 0.0), Position::new(40.0, 0.0)],
            &config,
        );
        assert_eq!(anchor, Some((240.0, 40.0)));
        assert_eq!(parent_anchor(&[], &config), None);
    }
}
