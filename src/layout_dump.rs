use crate::config::{LayoutConfig, RenderConfig};
use crate::ir::{FamilySnapshot, Gender, PositionMap};
use crate::layout::{CloneLayout, CrossLink, Layout, LayoutStats};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

/// Serializable view of a layout. `positions` is the map handed to the
/// persistence API; `nodes` adds what a viewer needs to draw each box.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutDump {
    pub width: f32,
    pub height: f32,
    pub node_width: f32,
    pub node_height: f32,
    pub positions: PositionMap,
    pub nodes: Vec<NodeDump>,
    pub cross_links: Vec<CrossLink>,
    pub clones: Vec<CloneLayout>,
    pub orphans: Vec<String>,
    pub hidden: Vec<String>,
    pub disconnected: Vec<String>,
    pub stats: LayoutStats,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeDump {
    pub id: String,
    pub label: String,
    pub gender: Gender,
    pub x: f32,
    pub y: f32,
    pub generation: Option<usize>,
    pub generation_label: Option<String>,
    pub cluster: Option<usize>,
    pub fixed: bool,
    pub orphan: bool,
}

impl LayoutDump {
    pub fn from_layout(
        layout: &Layout,
        snapshot: &FamilySnapshot,
        config: &LayoutConfig,
        render: &RenderConfig,
    ) -> Self {
        let mut cluster_of: BTreeMap<&str, (usize, bool)> = BTreeMap::new();
        for cluster in &layout.clusters {
            for member in &cluster.members {
                cluster_of.insert(member.as_str(), (cluster.id, cluster.orphan));
            }
        }

        let nodes = layout
            .positions
            .iter()
            .map(|(id, position)| {
                let person = snapshot.person(id);
                let generation = layout.generations.get(id).copied();
                let cluster = cluster_of.get(id.as_str()).copied();
                NodeDump {
                    id: id.clone(),
                    label: person.map_or_else(|| id.clone(), |p| p.label().to_string()),
                    gender: person.map(|p| p.gender).unwrap_or_default(),
                    x: position.x,
                    y: position.y,
                    generation,
                    generation_label: generation.map(|g| render.generation_label(g)),
                    cluster: cluster.map(|(cluster, _)| cluster),
                    fixed: position.fixed,
                    orphan: cluster.is_some_and(|(_, orphan)| orphan),
                }
            })
            .collect();

        LayoutDump {
            width: layout.width,
            height: layout.height,
            node_width: config.node_width,
            node_height: config.node_height,
            positions: layout.positions.clone(),
            nodes,
            cross_links: layout.cross_links.clone(),
            clones: layout.clones.clone(),
            orphans: layout.orphans.clone(),
            hidden: layout.hidden.clone(),
            disconnected: layout.disconnected.clone(),
            stats: layout.stats.clone(),
        }
    }
}

pub fn layout_dump_string(
    layout: &Layout,
    snapshot: &FamilySnapshot,
    config: &LayoutConfig,
    render: &RenderConfig,
) -> anyhow::Result<String> {
    let dump = LayoutDump::from_layout(layout, snapshot, config, render);
    Ok(serde_json::to_string_pretty(&dump)?)
}

pub fn write_layout_dump(
    path: &Path,
    layout: &Layout,
    snapshot: &FamilySnapshot,
    config: &LayoutConfig,
    render: &RenderConfig,
) -> anyhow::Result<()> {
    let file = File::create(path)?;
    let writer = BufWriter::new(file);
    let dump = LayoutDump::from_layout(layout, snapshot, config, render);
    serde_json::to_writer_pretty(writer, &dump)?;
    Ok(())
}
