//! SVG export serializer.
//!
//! Renders source linework and an optional traced path into an SVG
//! string using the [`svg`] crate for document construction, XML
//! escaping, and path data formatting.
//!
//! Map coordinates grow northwards while SVG coordinates grow
//! downwards, so every y value is flipped about the drawing's bounds.
//! The `viewBox` covers the bounds of everything drawn plus a small
//! margin; strokes use `vector-effect="non-scaling-stroke"` so line
//! widths stay readable whatever the coordinate units are.
//!
//! This is a pure function with no I/O -- it returns a `String`.

use svg::Document;
use svg::node::element::path::Data;
use svg::node::element::{Description, Element, Group, Path, Title};
use svg::node::{Node, Text, Value};

use snaptrace::{Point, Polyline, Rect};

/// Margin around the drawing, as a fraction of its larger side.
const MARGIN_RATIO: f64 = 0.05;

/// Metadata to embed in the SVG document.
///
/// All fields are optional. Text values are XML-escaped automatically
/// by the `svg` crate.
#[derive(Debug, Clone, Default)]
pub struct SvgMetadata<'a> {
    /// Document title, emitted as `<title>`.
    pub title: Option<&'a str>,

    /// Document description, emitted as `<desc>`.
    pub description: Option<&'a str>,

    /// Serialized tracer configuration, emitted inside `<metadata>` so
    /// exported files carry the settings that produced them.
    pub config_json: Option<&'a str>,
}

/// Build an SVG path `d` attribute string from a polyline, with
/// coordinates emitted as-is.
///
/// Uses `M` for the first point and `L` for subsequent points.
/// Returns an empty string for polylines with fewer than 2 points.
///
/// # Examples
///
/// ```
/// use snaptrace::{Point, Polyline};
/// use snaptrace_export::build_path_data;
///
/// let polyline = Polyline::new(vec![
///     Point::new(10.0, 20.0),
///     Point::new(30.0, 40.0),
/// ]);
/// let d = build_path_data(&polyline);
/// assert_eq!(d, "M10,20 L30,40");
/// ```
#[must_use]
pub fn build_path_data(polyline: &Polyline) -> String {
    build_path_data_with(polyline, |p| (p.x, p.y))
}

fn build_path_data_with(polyline: &Polyline, tx: impl Fn(&Point) -> (f64, f64)) -> String {
    let points = polyline.points();
    if points.len() < 2 {
        return String::new();
    }

    let mut data = Data::new().move_to(tx(&points[0]));
    for p in &points[1..] {
        data = data.line_to(tx(p));
    }
    String::from(Value::from(data))
}

/// Bounds of every point in `polylines`, or `None` if there are none.
fn bounds<'a>(polylines: impl IntoIterator<Item = &'a Polyline>) -> Option<Rect> {
    polylines
        .into_iter()
        .filter_map(Polyline::bounding_rect)
        .reduce(|a, b| a.union(&b))
}

/// Serialize linework and an optional trace into an SVG document string.
///
/// Each linework polyline becomes a black `<path>` inside
/// `<g id="linework">`; the trace, if given, is drawn on top in red as
/// `<path id="trace">`. Polylines with fewer than two points are
/// skipped.
#[must_use]
pub fn to_svg(linework: &[Polyline], trace: Option<&Polyline>, metadata: &SvgMetadata<'_>) -> String {
    let rect = bounds(linework.iter().chain(trace)).unwrap_or(Rect::new(0.0, 0.0, 0.0, 0.0));
    let side = rect.width().max(rect.height());
    let margin = if side > 0.0 { side * MARGIN_RATIO } else { 1.0 };
    let width = 2.0f64.mul_add(margin, rect.width());
    let height = 2.0f64.mul_add(margin, rect.height());

    // Shift into the viewBox and flip y so north is up.
    let tx = |p: &Point| (p.x - rect.min_x + margin, rect.max_y - p.y + margin);

    let mut doc = Document::new()
        .set("width", width)
        .set("height", height)
        .set("viewBox", (0.0, 0.0, width, height));

    if let Some(title) = metadata.title {
        doc = doc.add(Title::new(title));
    }

    if let Some(description) = metadata.description {
        doc = doc.add(Description::new().add(Text::new(description)));
    }

    if let Some(config_json) = metadata.config_json {
        let mut config_el = Element::new("snaptrace:config");
        config_el.assign("xmlns:snaptrace", "https://github.com/snaptrace/snaptrace/ns/1");
        config_el.append(Text::new(config_json));
        let mut metadata_el = Element::new("metadata");
        metadata_el.append(config_el);
        doc = doc.add(metadata_el);
    }

    let mut group = Group::new()
        .set("id", "linework")
        .set("fill", "none")
        .set("stroke", "black")
        .set("stroke-width", 1);
    for polyline in linework {
        let d = build_path_data_with(polyline, tx);
        if d.is_empty() {
            continue;
        }
        group = group.add(
            Path::new()
                .set("d", d)
                .set("vector-effect", "non-scaling-stroke"),
        );
    }
    doc = doc.add(group);

    if let Some(trace) = trace {
        let d = build_path_data_with(trace, tx);
        if !d.is_empty() {
            doc = doc.add(
                Path::new()
                    .set("id", "trace")
                    .set("d", d)
                    .set("fill", "none")
                    .set("stroke", "red")
                    .set("stroke-width", 3)
                    .set("stroke-linejoin", "round")
                    .set("vector-effect", "non-scaling-stroke"),
            );
        }
    }

    // The svg crate omits the XML declaration, so we prepend it.
    format!("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n{doc}\n")
}
