use anyhow::{anyhow, Context, Result};
use roxmltree::{Document, Node};
use serde::{Deserialize, Serialize};

use crate::lattice::LatticeConfig;

/// Name of the optional manifest looked up in the asset root.
pub const MANIFEST: &str = "page.xml";

/// Relative paths of every asset the page loads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetPaths {
    pub face_material: String,
    pub face_model: String,
    pub dna_model: String,
    pub car_model: String,
    pub gear_model: String,
    pub ground_texture: String,
    pub cross_texture: String,
}

impl Default for AssetPaths {
    fn default() -> Self {
        Self {
            face_material: "objects/face/face.mtl".to_string(),
            face_model: "objects/face/face.obj".to_string(),
            dna_model: "objects/dna/dna.glb".to_string(),
            car_model: "objects/mercedes/mercedes.glb".to_string(),
            gear_model: "objects/gear/gear.gltf".to_string(),
            ground_texture: "textures/landscape/ground.png".to_string(),
            cross_texture: "textures/cross.png".to_string(),
        }
    }
}

impl AssetPaths {
    pub fn all(&self) -> [&str; 7] {
        [
            &self.face_material,
            &self.face_model,
            &self.dna_model,
            &self.car_model,
            &self.gear_model,
            &self.ground_texture,
            &self.cross_texture,
        ]
    }
}

/// Number of `.section` elements in each scene container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionCounts {
    pub face: u32,
    pub squares: u32,
    pub landscape: u32,
}

impl Default for SectionCounts {
    fn default() -> Self {
        Self {
            face: 5,
            squares: 10,
            landscape: 10,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StarfieldConfig {
    pub count: usize,
    pub seed: u64,
}

impl Default for StarfieldConfig {
    fn default() -> Self {
        Self {
            count: 50_000,
            seed: 0x5eed,
        }
    }
}

/// Page manifest; every field falls back to the built-in page.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PageConfig {
    pub assets: AssetPaths,
    pub lattice: LatticeConfig,
    pub starfield: StarfieldConfig,
    pub sections: SectionCounts,
}

impl PageConfig {
    /// Parses a `<page>` manifest. Missing elements keep their defaults.
    pub fn from_xml(xml: &str) -> Result<Self> {
        let document = Document::parse(xml).context("invalid page XML")?;
        let root = document.root_element();
        if !root.has_tag_name("page") {
            return Err(anyhow!(
                "expected <page> root element, found <{}>",
                root.tag_name().name()
            ));
        }
        let mut config = Self::default();

        if let Some(assets) = child(&root, "assets") {
            let paths = &mut config.assets;
            for (tag, slot) in [
                ("face-material", &mut paths.face_material),
                ("face-model", &mut paths.face_model),
                ("dna-model", &mut paths.dna_model),
                ("car-model", &mut paths.car_model),
                ("gear-model", &mut paths.gear_model),
                ("ground-texture", &mut paths.ground_texture),
                ("cross-texture", &mut paths.cross_texture),
            ] {
                if let Some(path) = optional_text(&assets, tag) {
                    *slot = path;
                }
            }
        }

        if let Some(lattice) = child(&root, "lattice") {
            let l = &mut config.lattice;
            l.square_size = parse_num(optional_text(&lattice, "square-size"), l.square_size)?;
            l.rectangle_height =
                parse_num(optional_text(&lattice, "rectangle-height"), l.rectangle_height)?;
            l.long_row_length =
                parse_num(optional_text(&lattice, "long-row-length"), l.long_row_length)?;
            l.row_count = parse_num(optional_text(&lattice, "rows"), l.row_count)?;
            l.spacing = parse_num(optional_text(&lattice, "spacing"), l.spacing)?;
            l.beam_thickness =
                parse_num(optional_text(&lattice, "beam-thickness"), l.beam_thickness)?;
        }

        if let Some(stars) = child(&root, "starfield") {
            let s = &mut config.starfield;
            s.count = parse_num(optional_text(&stars, "count"), s.count)?;
            s.seed = parse_num(optional_text(&stars, "seed"), s.seed)?;
        }

        if let Some(sections) = child(&root, "sections") {
            let s = &mut config.sections;
            s.face = parse_num(optional_text(&sections, "face"), s.face)?;
            s.squares = parse_num(optional_text(&sections, "squares"), s.squares)?;
            s.landscape = parse_num(optional_text(&sections, "landscape"), s.landscape)?;
        }

        Ok(config)
    }
}

fn child<'a, 'input>(node: &Node<'a, 'input>, tag: &str) -> Option<Node<'a, 'input>> {
    node.children().find(|c| c.has_tag_name(tag))
}

fn optional_text(node: &Node<'_, '_>, tag: &str) -> Option<String> {
    child(node, tag)
        .and_then(|child| child.text())
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(|text| text.to_string())
}

fn parse_num<T>(value: Option<String>, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match value {
        Some(value) => value
            .parse::<T>()
            .map_err(|err| anyhow!("failed to parse `{value}`: {err}")),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
    <page>
        <assets>
            <car-model>objects/car/car.glb</car-model>
        </assets>
        <lattice>
            <rows>4</rows>
            <long-row-length>3</long-row-length>
        </lattice>
        <starfield>
            <count>10</count>
        </starfield>
        <sections>
            <squares>12</squares>
        </sections>
    </page>
    "#;

    #[test]
    fn overrides_only_given_fields() {
        let config = PageConfig::from_xml(SAMPLE).unwrap();
        assert_eq!(config.assets.car_model, "objects/car/car.glb");
        assert_eq!(config.assets.gear_model, "objects/gear/gear.gltf");
        assert_eq!(config.lattice.row_count, 4);
        assert_eq!(config.lattice.long_row_length, 3);
        assert_eq!(config.lattice.spacing, 3.0);
        assert_eq!(config.starfield.count, 10);
        assert_eq!(config.sections.squares, 12);
        assert_eq!(config.sections.face, 5);
    }

    #[test]
    fn empty_page_is_default() {
        assert_eq!(PageConfig::from_xml("<page/>").unwrap(), PageConfig::default());
    }

    #[test]
    fn rejects_bad_numbers_and_roots() {
        assert!(PageConfig::from_xml("<page><lattice><rows>many</rows></lattice></page>").is_err());
        assert!(PageConfig::from_xml("<scene/>").is_err());
    }
}
