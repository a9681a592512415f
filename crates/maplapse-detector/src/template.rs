use std::fmt;
use std::path::Path;
use std::str::FromStr;

use image::GrayImage;
use tracing::info;

use crate::config::MatcherParams;
use crate::error::DetectorError;
use crate::features::{Descriptor, GrayPlane, detect_and_describe};

/// File name of the warmup marker template inside the assets directory.
pub const WARMUP_ASSET: &str = "warmup.png";

/// The closed set of supported map identifiers. Each maps to a reference
/// overlay image at `assets/{ID}.png`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MapId {
    Carentan,
    Driel,
    ElAlamein,
    Elsenborn,
    Foy,
    Hill400,
    Hurtgen,
    Kharkov,
    Kursk,
    Mortain,
    Omaha,
    Phl,
    Remagen,
    Smdm,
    Sme,
    Smolensk,
    Stalingrad,
    Tobruk,
    Utah,
}

impl MapId {
    pub const ALL: [MapId; 19] = [
        MapId::Carentan,
        MapId::Driel,
        MapId::ElAlamein,
        MapId::Elsenborn,
        MapId::Foy,
        MapId::Hill400,
        MapId::Hurtgen,
        MapId::Kharkov,
        MapId::Kursk,
        MapId::Mortain,
        MapId::Omaha,
        MapId::Phl,
        MapId::Remagen,
        MapId::Smdm,
        MapId::Sme,
        MapId::Smolensk,
        MapId::Stalingrad,
        MapId::Tobruk,
        MapId::Utah,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MapId::Carentan => "CARENTAN",
            MapId::Driel => "DRIEL",
            MapId::ElAlamein => "EL_ALAMEIN",
            MapId::Elsenborn => "ELSENBORN",
            MapId::Foy => "FOY",
            MapId::Hill400 => "HILL_400",
            MapId::Hurtgen => "HURTGEN",
            MapId::Kharkov => "KHARKOV",
            MapId::Kursk => "KURSK",
            MapId::Mortain => "MORTAIN",
            MapId::Omaha => "OMAHA",
            MapId::Phl => "PHL",
            MapId::Remagen => "REMAGEN",
            MapId::Smdm => "SMDM",
            MapId::Sme => "SME",
            MapId::Smolensk => "SMOLENSK",
            MapId::Stalingrad => "STALINGRAD",
            MapId::Tobruk => "TOBRUK",
            MapId::Utah => "UTAH",
        }
    }

    pub fn asset_file_name(&self) -> String {
        format!("{}.png", self.as_str())
    }

    fn roster() -> String {
        Self::ALL
            .iter()
            .map(MapId::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for MapId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MapId {
    type Err = DetectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_uppercase();
        Self::ALL
            .iter()
            .copied()
            .find(|map| map.as_str() == wanted)
            .ok_or_else(|| DetectorError::UnknownMap {
                value: s.to_owned(),
                expected: Self::roster(),
            })
    }
}

/// An immutable reference image with its precomputed descriptors. Loaded
/// once per run; detection only ever touches the descriptor set.
pub struct Template {
    name: String,
    width: u32,
    height: u32,
    descriptors: Vec<Descriptor>,
}

impl Template {
    pub fn from_gray(
        name: impl Into<String>,
        image: &GrayImage,
        params: &MatcherParams,
    ) -> Result<Self, DetectorError> {
        let name = name.into();
        let (width, height) = image.dimensions();
        let plane = GrayPlane::new(width, height, width as usize, image.as_raw());
        let (keypoints, descriptors) = detect_and_describe(plane, params);
        if descriptors.is_empty() {
            return Err(DetectorError::EmptyTemplate { name });
        }
        info!(
            template = %name,
            keypoints = keypoints.len(),
            "template descriptors prepared"
        );
        Ok(Self {
            name,
            width,
            height,
            descriptors,
        })
    }

    pub fn from_path(
        name: impl Into<String>,
        path: &Path,
        params: &MatcherParams,
    ) -> Result<Self, DetectorError> {
        let image = image::open(path)
            .map_err(|err| DetectorError::template_load(path, err.to_string()))?
            .to_luma8();
        Self::from_gray(name, &image, params)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn descriptors(&self) -> &[Descriptor] {
        &self.descriptors
    }
}

/// The pair of reference images one run needs: the selected map overlay and
/// the warmup marker used to bootstrap clock acquisition.
pub struct TemplateSet {
    pub map: Template,
    pub warmup: Template,
}

impl TemplateSet {
    pub fn load(
        assets_dir: &Path,
        map: MapId,
        params: &MatcherParams,
    ) -> Result<Self, DetectorError> {
        let map_path = assets_dir.join(map.asset_file_name());
        let warmup_path = assets_dir.join(WARMUP_ASSET);
        Ok(Self {
            map: Template::from_path(map.as_str(), &map_path, params)?,
            warmup: Template::from_path("warmup", &warmup_path, params)?,
        })
    }
}
