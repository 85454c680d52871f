//! Material & asset records (component N).

use serde::Deserialize;

/// Identifies any asset (material, mesh, texture, environment) by a flat `u64`.
///
/// `0` is reserved ([`AssetId::INVALID`]); `1..=256` is the built-in range (engine-shipped
/// defaults: white texture, default material, and so on); everything above `256` is
/// user content. Collisions within the user range are not detected or resolved here — the
/// host is responsible for handing out unique ids, the same way the original engine left
/// id assignment to its asset database.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AssetId(pub u64);

impl AssetId {
    pub const INVALID: AssetId = AssetId(0);
    pub const BUILTIN_RANGE_END: u64 = 256;

    pub fn from_raw(raw: u64) -> Self {
        AssetId(raw)
    }

    pub fn is_valid(self) -> bool {
        self.0 != 0
    }

    pub fn is_builtin(self) -> bool {
        self.0 != 0 && self.0 <= Self::BUILTIN_RANGE_END
    }

    /// True for any id above the built-in range, whether or not it actually resolves to a
    /// loaded asset.
    pub fn is_user(self) -> bool {
        self.0 > Self::BUILTIN_RANGE_END
    }
}

impl Default for AssetId {
    fn default() -> Self {
        Self::INVALID
    }
}

/// A material loaded from YAML. Field names mirror the on-disk document, not Rust
/// convention, since `serde` renames rather than the author reformatting the asset files.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaterialRecord {
    pub shading_model: ShadingModel,
    #[serde(default = "default_albedo")]
    pub albedo: [f32; 3],
    #[serde(default)]
    pub emission: [f32; 3],
    #[serde(default)]
    pub metallic: f32,
    #[serde(default = "default_roughness")]
    pub roughness: f32,
    #[serde(default = "default_tiling")]
    pub texture_tiling: f32,
    #[serde(default)]
    pub albedo_map: Option<u64>,
}

fn default_albedo() -> [f32; 3] {
    [1.0, 1.0, 1.0]
}

fn default_roughness() -> f32 {
    0.5
}

fn default_tiling() -> f32 {
    1.0
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ShadingModel {
    Lit,
    Unlit,
}

impl MaterialRecord {
    pub fn from_yaml(source: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(source)
    }

    /// The asset id of the material's albedo texture, or [`AssetId::INVALID`]'s built-in white
    /// fallback texture (id 1) when the material declares none.
    pub fn albedo_map_id(&self) -> AssetId {
        match self.albedo_map {
            Some(raw) => AssetId::from_raw(raw),
            None => AssetId(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_document() {
        let yaml = "shadingModel: Lit\n";
        let record = MaterialRecord::from_yaml(yaml).expect("parse");
        assert_eq!(record.shading_model, ShadingModel::Lit);
        assert_eq!(record.albedo, [1.0, 1.0, 1.0]);
        assert_eq!(record.roughness, 0.5);
        assert_eq!(record.albedo_map_id(), AssetId(1));
    }

    #[test]
    fn parses_full_document() {
        let yaml = r#"
shadingModel: Lit
albedo: [0.8, 0.1, 0.1]
emission: [0.0, 0.0, 0.0]
metallic: 1.0
roughness: 0.2
textureTiling: 2.0
albedoMap: 300
"#;
        let record = MaterialRecord::from_yaml(yaml).expect("parse");
        assert_eq!(record.metallic, 1.0);
        assert_eq!(record.albedo_map_id(), AssetId(300));
        assert!(record.albedo_map_id().is_user());
    }

    #[test]
    fn asset_id_ranges() {
        assert!(!AssetId::INVALID.is_valid());
        assert!(AssetId(1).is_builtin());
        assert!(AssetId(256).is_builtin());
        assert!(AssetId(257).is_user());
        assert!(!AssetId(257).is_builtin());
    }
}
