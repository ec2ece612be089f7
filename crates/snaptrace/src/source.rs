//! Feature sources the tracer draws its linework from.
//!
//! The tracer never owns the data it traces. It asks each configured
//! [`FeatureSource`] for the features overlapping the current extent,
//! already expressed in the destination coordinate system, and reduces
//! their geometries to plain polylines with [`extract_linework`].

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::types::{Point, Polyline, Rect};

/// Geometry carried by a feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "coordinates")]
pub enum Geometry {
    Point(Point),
    MultiPoint(Vec<Point>),
    LineString(Polyline),
    MultiLineString(Vec<Polyline>),
    /// Exterior ring first, then any interior rings.
    Polygon(Vec<Polyline>),
    MultiPolygon(Vec<Vec<Polyline>>),
}

/// A single record of a layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    pub id: u64,
    /// Features without geometry are skipped by the tracer.
    #[serde(default)]
    pub geometry: Option<Geometry>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
}

impl Feature {
    #[must_use]
    pub const fn new(id: u64, geometry: Geometry) -> Self {
        Self {
            id,
            geometry: Some(geometry),
            attributes: BTreeMap::new(),
        }
    }

    /// Builder-style attribute setter.
    #[must_use]
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
}

/// What the tracer asks a source for.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FeatureRequest<'a> {
    /// Only features whose bounds intersect this rectangle are needed.
    /// `None` means everything.
    pub extent: Option<Rect>,
    /// Coordinate reference system the returned geometries must be
    /// expressed in. `None` means the source's native system.
    pub destination_crs: Option<&'a str>,
}

/// A layer of features.
///
/// Implementations are responsible for honoring the request: filtering
/// by extent and transforming geometries into the destination system.
/// Sources that cannot reproject should return features unchanged.
pub trait FeatureSource {
    /// Stable name identifying the layer in change notifications.
    fn name(&self) -> &str;

    /// Iterate the features matching `request`.
    fn features<'a>(
        &'a self,
        request: &FeatureRequest<'_>,
    ) -> Box<dyn Iterator<Item = Feature> + 'a>;
}

/// Change notification from a layer the tracer draws from.
///
/// Every variant invalidates the tracer's graph; [`LayerEvent::LayerRemoved`]
/// additionally drops the layer from the configured set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "layer", rename_all = "snake_case")]
pub enum LayerEvent {
    FeatureAdded(String),
    FeatureDeleted(String),
    GeometryChanged(String),
    AttributeValueChanged(String),
    DataChanged(String),
    StyleChanged(String),
    LayerRemoved(String),
}

impl LayerEvent {
    /// Name of the layer the event concerns.
    #[must_use]
    pub fn layer(&self) -> &str {
        match self {
            Self::FeatureAdded(name)
            | Self::FeatureDeleted(name)
            | Self::GeometryChanged(name)
            | Self::AttributeValueChanged(name)
            | Self::DataChanged(name)
            | Self::StyleChanged(name)
            | Self::LayerRemoved(name) => name,
        }
    }
}

/// In-memory layer, used by the bench tool and by tests.
///
/// Honors the extent filter; geometries are assumed to already be in
/// whatever system the caller wants, so the destination CRS is ignored.
///
/// Features can be added and removed through a shared reference, so a
/// layer handed to a [`Tracer`](crate::Tracer) can still be edited by
/// its owner, who then reports the edit with a [`LayerEvent`].
///
/// The feature list is copy-on-write: [`features`](FeatureSource::features)
/// iterates a shared snapshot lazily, cloning only the features that
/// match, and edits made during iteration do not affect it.
#[derive(Debug, Clone, Default)]
pub struct MemoryLayer {
    name: String,
    features: RefCell<Rc<Vec<Feature>>>,
}

impl MemoryLayer {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            features: RefCell::new(Rc::new(Vec::new())),
        }
    }

    /// A layer holding one line-string feature per polyline, with ids
    /// counting up from zero.
    #[must_use]
    pub fn from_polylines(name: impl Into<String>, lines: Vec<Polyline>) -> Self {
        let layer = Self::new(name);
        for (id, line) in (0_u64..).zip(lines) {
            layer.push(Feature::new(id, Geometry::LineString(line)));
        }
        layer
    }

    pub fn push(&self, feature: Feature) {
        Rc::make_mut(&mut self.features.borrow_mut()).push(feature);
    }

    /// Remove the feature with `id`, returning it if present.
    pub fn remove(&self, id: u64) -> Option<Feature> {
        let mut features = self.features.borrow_mut();
        let pos = features.iter().position(|f| f.id == id)?;
        Some(Rc::make_mut(&mut features).remove(pos))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.features.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.features.borrow().is_empty()
    }
}

impl FeatureSource for MemoryLayer {
    fn name(&self) -> &str {
        &self.name
    }

    fn features<'a>(
        &'a self,
        request: &FeatureRequest<'_>,
    ) -> Box<dyn Iterator<Item = Feature> + 'a> {
        let extent = request.extent;
        let snapshot = Rc::clone(&self.features.borrow());
        Box::new((0..snapshot.len()).filter_map(move |i| {
            let feature = &snapshot[i];
            let wanted = match (extent, &feature.geometry) {
                (None, _) => true,
                (Some(_), None) => false,
                (Some(ext), Some(geom)) => {
                    geometry_bounds(geom).is_some_and(|b| b.intersects(&ext))
                }
            };
            wanted.then(|| feature.clone())
        }))
    }
}

/// Bounding rectangle of every coordinate in `geometry`.
#[must_use]
pub fn geometry_bounds(geometry: &Geometry) -> Option<Rect> {
    let mut lines = Vec::new();
    let points: Vec<Point> = match geometry {
        Geometry::Point(p) => vec![*p],
        Geometry::MultiPoint(ps) => ps.clone(),
        other => {
            extract_linework(other, &mut lines);
            lines.iter().flat_map(|l| l.points().iter().copied()).collect()
        }
    };
    let (first, rest) = points.split_first()?;
    let mut rect = Rect::new(first.x, first.y, first.x, first.y);
    for p in rest {
        rect.include(*p);
    }
    Some(rect)
}

/// Append the polylines making up `geometry` to `out`.
///
/// Line strings contribute themselves, polygons contribute each of their
/// rings, and multi-part geometries contribute every part. Point
/// geometries have no linework and contribute nothing. Empty parts are
/// dropped.
pub fn extract_linework(geometry: &Geometry, out: &mut Vec<Polyline>) {
    let mut push = |line: &Polyline| {
        if !line.is_empty() {
            out.push(line.clone());
        }
    };
    match geometry {
        Geometry::Point(_) | Geometry::MultiPoint(_) => {}
        Geometry::LineString(line) => push(line),
        Geometry::MultiLineString(lines) | Geometry::Polygon(lines) => {
            lines.iter().for_each(push);
        }
        Geometry::MultiPolygon(polygons) => {
            polygons.iter().flatten().for_each(push);
        }
    }
}
