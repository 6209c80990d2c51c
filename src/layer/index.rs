use std::{collections::{BTreeMap, BTreeSet}, fs, io::ErrorKind, path::Path};

use anyhow::{Context, Result};
use geo::{BoundingRect, Geometry, Rect};
use rstar::RTree;
use serde_json::Value;
use tracing::{debug, warn};

use crate::common::read_features_from_geojson_bytes;
use crate::geom::{clip_to_rect, envelope_of, union_rect, BoundingBox};

/// Attribute name -> value, flattened to strings.
pub type Attributes = BTreeMap<String, String>;

/// A geometry plus its attributes, as loaded from the source layer.
#[derive(Debug, Clone)]
pub struct Feature {
    pub geometry: Geometry<f64>,
    pub attributes: Attributes,
}

/// One feature's contribution to a tile: its id, clipped geometry and attributes.
#[derive(Debug, Clone)]
pub struct QueryHit<'a> {
    pub id: usize,
    pub geometry: Geometry<f64>,
    pub attributes: &'a Attributes,
}

/// A named vector layer held in memory with an R-tree over feature bounds.
///
/// Feature ids are positions in the layer's feature list; the R-tree maps each
/// id to its bounding box so lookups never depend on geometry identity.
#[derive(Debug, Clone)]
pub struct LayerIndex {
    name: String,
    features: Vec<Feature>,
    fields: BTreeSet<String>,
    bounds: Option<Rect<f64>>,
    rtree: RTree<BoundingBox>,
}

impl LayerIndex {
    /// Load a GeoJSON FeatureCollection file as a layer.
    ///
    /// A missing file yields an empty layer; unreadable or malformed data is an error.
    pub fn load(name: &str, path: &Path) -> Result<Self> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                warn!(layer = name, path = %path.display(), "layer source not found, treating as empty");
                return Ok(Self::new(name, Vec::new()));
            }
            Err(err) => {
                return Err(err).with_context(|| format!("Failed to read layer {name} from {}", path.display()));
            }
        };
        Self::from_geojson_bytes(name, &bytes)
            .with_context(|| format!("Failed to load layer {name} from {}", path.display()))
    }

    /// Build a layer from GeoJSON FeatureCollection bytes.
    pub fn from_geojson_bytes(name: &str, bytes: &[u8]) -> Result<Self> {
        let mut fields = BTreeSet::new();
        let mut features = Vec::new();

        for raw in read_features_from_geojson_bytes(bytes)? {
            let Some(geometry) = raw.geometry else { continue };
            if geometry.bounding_rect().is_none() {
                continue; // empty geometry
            }
            fields.extend(raw.properties.keys().cloned());
            let attributes = raw.properties.iter()
                .filter_map(|(key, value)| attribute_value(value).map(|value| (key.clone(), value)))
                .collect();
            features.push(Feature { geometry, attributes });
        }

        Ok(Self::with_fields(name, features, fields))
    }

    /// Build a layer from in-memory features. Empty geometries are discarded.
    pub fn new(name: &str, features: Vec<Feature>) -> Self {
        let features = features.into_iter()
            .filter(|feature| feature.geometry.bounding_rect().is_some())
            .collect::<Vec<_>>();
        let fields = features.iter()
            .flat_map(|feature| feature.attributes.keys().cloned())
            .collect();
        Self::with_fields(name, features, fields)
    }

    fn with_fields(name: &str, features: Vec<Feature>, fields: BTreeSet<String>) -> Self {
        let boxes = features.iter().enumerate()
            .filter_map(|(idx, feature)| feature.geometry.bounding_rect().map(|bbox| BoundingBox::new(idx, bbox)))
            .collect::<Vec<_>>();
        let bounds = boxes.iter().map(|b| *b.bbox()).reduce(union_rect);

        debug!(layer = name, features = features.len(), fields = fields.len(), "built layer index");

        Self {
            name: name.to_string(),
            features,
            fields,
            bounds,
            rtree: RTree::bulk_load(boxes),
        }
    }

    /// Layer name, unique within a build.
    #[inline] pub fn name(&self) -> &str { &self.name }

    /// Get the number of features.
    #[inline] pub fn len(&self) -> usize { self.features.len() }

    /// Check if there are no features.
    #[inline] pub fn is_empty(&self) -> bool { self.features.is_empty() }

    /// Get a reference to the list of features, indexed by feature id.
    #[inline] pub fn features(&self) -> &[Feature] { &self.features }

    /// Combined bounds of every feature, `None` for an empty layer.
    #[inline] pub fn bounding_box(&self) -> Option<Rect<f64>> { self.bounds }

    /// Every attribute seen on the layer, each exposed as a string field.
    pub fn attribute_schema(&self) -> BTreeMap<String, String> {
        self.fields.iter()
            .map(|field| (field.clone(), "String".to_string()))
            .collect()
    }

    /// Bounding boxes of the individual features.
    pub fn feature_bounds(&self) -> impl Iterator<Item = &Rect<f64>> {
        self.rtree.iter().map(BoundingBox::bbox)
    }

    /// Features whose bounds intersect `bounds`, clipped to it, in feature id order.
    /// Features that vanish after clipping are dropped.
    pub fn query(&self, bounds: &Rect<f64>) -> Vec<QueryHit<'_>> {
        let mut ids = self.rtree.locate_in_envelope_intersecting(&envelope_of(bounds))
            .map(BoundingBox::idx)
            .collect::<Vec<_>>();
        ids.sort_unstable();

        ids.into_iter()
            .filter_map(|id| {
                let feature = &self.features[id];
                clip_to_rect(&feature.geometry, bounds)
                    .map(|geometry| QueryHit { id, geometry, attributes: &feature.attributes })
            })
            .collect()
    }
}

/// Flatten a JSON property value to its string form; `null` has none.
fn attribute_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}
