use crate::ir::Gender;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Theme {
    pub font_family: String,
    pub font_size: f32,
    pub text_color: String,
    pub male_fill: String,
    pub female_fill: String,
    pub unknown_fill: String,
    pub node_border: String,
    pub fixed_border: String,
    pub spouse_line: String,
    pub child_line: String,
    pub cross_link_line: String,
    pub clone_fill: String,
    pub generation_label_color: String,
    pub background: String,
}

impl Theme {
    pub fn modern() -> Self {
        Self {
            font_family: "Inter, Segoe UI, system-ui, -apple-system, sans-serif".to_string(),
            font_size: 13.0,
            text_color: "#1C2430".to_string(),
            male_fill: "#DCE9FB".to_string(),
            female_fill: "#FBE1EA".to_string(),
            unknown_fill: "#EEF2F8".to_string(),
            node_border: "#C7D2E5".to_string(),
            fixed_border: "#E0A030".to_string(),
            spouse_line: "#C0506E".to_string(),
            child_line: "#7A8AA6".to_string(),
            cross_link_line: "#B07AD0".to_string(),
            clone_fill: "#FFFFFF".to_string(),
            generation_label_color: "#8A96AA".to_string(),
            background: "#FFFFFF".to_string(),
        }
    }

    pub fn classic() -> Self {
        Self {
            font_family: "Georgia, \"Times New Roman\", serif".to_string(),
            font_size: 14.0,
            text_color: "#3B2F22".to_string(),
            male_fill: "#E8DFC8".to_string(),
            female_fill: "#F1E2D6".to_string(),
            unknown_fill: "#EDE8DD".to_string(),
            node_border: "#8C7A5B".to_string(),
            fixed_border: "#6B3A1E".to_string(),
            spouse_line: "#8C3B2E".to_string(),
            child_line: "#5C5042".to_string(),
            cross_link_line: "#7A5C99".to_string(),
            clone_fill: "#FAF6EE".to_string(),
            generation_label_color: "#9C8C70".to_string(),
            background: "#FBF8F1".to_string(),
        }
    }

    pub fn fill_for(&self, gender: Gender) -> &str {
        match gender {
            Gender::Male => &self.male_fill,
            Gender::Female => &self.female_fill,
            Gender::Unknown => &self.unknown_fill,
        }
    }
}
