//! Standalone Leaflet preview documents
//!
//! A preview is one HTML page: a GeoJSON overlay with a fixed style, three
//! selectable base layers and an expanded layer control. It is rendered per
//! request and never stored.

use geoshift_core::error::{GeoshiftError, Result};
use geoshift_core::formats::to_geojson_collection;
use geoshift_core::models::FeatureCollection;
use serde::Serialize;

use crate::spatial::map_center;

/// Initial zoom level of every preview
pub const PREVIEW_ZOOM: u8 = 16;

/// Name of the overlay in the layer control
pub const OVERLAY_NAME: &str = "Geographic Layer";

const LEAFLET_VERSION: &str = "1.9.4";

/// Tile layer selectable in the layer control
#[derive(Debug, Clone, Serialize)]
pub struct BaseLayer {
    pub name: &'static str,
    pub url: &'static str,
    pub attribution: &'static str,
}

/// The first layer is shown initially
pub const BASE_LAYERS: [BaseLayer; 3] = [
    BaseLayer {
        name: "CartoDB positron",
        url: "https://{s}.basemaps.cartocdn.com/light_all/{z}/{x}/{y}{r}.png",
        attribution: "&copy; OpenStreetMap contributors &copy; CARTO",
    },
    BaseLayer {
        name: "CartoDB dark_matter",
        url: "https://{s}.basemaps.cartocdn.com/dark_all/{z}/{x}/{y}{r}.png",
        attribution: "&copy; OpenStreetMap contributors &copy; CARTO",
    },
    BaseLayer {
        name: "OpenStreetMap",
        url: "https://tile.openstreetmap.org/{z}/{x}/{y}.png",
        attribution: "&copy; OpenStreetMap contributors",
    },
];

/// Leaflet path options of the overlay
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverlayStyle {
    pub fill_color: &'static str,
    pub color: &'static str,
    pub weight: u32,
    pub fill_opacity: f64,
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            fill_color: "red",
            color: "red",
            weight: 2,
            fill_opacity: 0.5,
        }
    }
}

/// Everything a preview page shows
#[derive(Debug, Clone)]
pub struct MapDocument {
    /// `(lat, lon)` of the initial view
    pub center: (f64, f64),
    pub zoom: u8,
    pub overlay_name: String,
    pub style: OverlayStyle,
    pub features: geojson::FeatureCollection,
}

impl MapDocument {
    /// Build a document from a collection already in the display CRS
    pub fn from_collection(collection: &FeatureCollection) -> Result<Self> {
        let center = map_center(collection).ok_or_else(|| {
            GeoshiftError::Serialization("Cannot center a map on a collection without geometries".to_string())
        })?;

        Ok(Self {
            center: (center.y(), center.x()),
            zoom: PREVIEW_ZOOM,
            overlay_name: OVERLAY_NAME.to_string(),
            style: OverlayStyle::default(),
            features: to_geojson_collection(collection),
        })
    }

    /// Render the standalone HTML page
    pub fn to_html(&self) -> Result<String> {
        let center = script_json(&[self.center.0, self.center.1])?;
        let base_layers = script_json(&BASE_LAYERS)?;
        let style = script_json(&self.style)?;
        let features = script_json(&self.features)?;
        let overlay_name = script_json(&self.overlay_name)?;

        Ok(PAGE_TEMPLATE
            .replace("__LEAFLET_VERSION__", LEAFLET_VERSION)
            .replace("__CENTER__", &center)
            .replace("__ZOOM__", &self.zoom.to_string())
            .replace("__BASE_LAYERS__", &base_layers)
            .replace("__STYLE__", &style)
            .replace("__OVERLAY_NAME__", &overlay_name)
            .replace("__FEATURES__", &features))
    }
}

/// Render a preview page for a collection in the display CRS
pub fn render_preview(collection: &FeatureCollection) -> Result<String> {
    MapDocument::from_collection(collection)?.to_html()
}

/// JSON that is safe to embed inside a `<script>` element
fn script_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    serde_json::to_string(value)
        .map(|json| json.replace("</", "<\\/"))
        .map_err(|e| GeoshiftError::Serialization(format!("Failed to encode preview data: {}", e)))
}

const PAGE_TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1.0">
<title>Preview</title>
<link rel="stylesheet" href="https://unpkg.com/leaflet@__LEAFLET_VERSION__/dist/leaflet.css">
<script src="https://unpkg.com/leaflet@__LEAFLET_VERSION__/dist/leaflet.js"></script>
<style>
html, body { height: 100%; margin: 0; }
#map { position: absolute; top: 0; bottom: 0; left: 0; right: 0; }
</style>
</head>
<body>
<div id="map"></div>
<script>
(function () {
  var map = L.map("map").setView(__CENTER__, __ZOOM__);
  var baseLayers = {};
  __BASE_LAYERS__.forEach(function (layer, index) {
    var tiles = L.tileLayer(layer.url, { attribution: layer.attribution, maxZoom: 19 });
    if (index === 0) { tiles.addTo(map); }
    baseLayers[layer.name] = tiles;
  });
  var style = __STYLE__;
  var overlay = L.geoJSON(__FEATURES__, {
    style: function () { return style; },
    pointToLayer: function (feature, latlng) { return L.circleMarker(latlng, style); }
  }).addTo(map);
  var overlays = {};
  overlays[__OVERLAY_NAME__] = overlay;
  L.control.layers(baseLayers, overlays, { collapsed: false }).addTo(map);
})();
</script>
</body>
</html>
"#;
