use geo::algorithm::centroid::Centroid;
use geo::Point;
use geoshift_core::models::FeatureCollection;

/// Centroid of every feature that has one
pub fn feature_centroids(collection: &FeatureCollection) -> Vec<Point<f64>> {
    collection
        .features
        .iter()
        .filter_map(|f| f.geometry.as_ref())
        .filter_map(|g| g.centroid())
        .collect()
}

/// Initial map centre: the mean of the per-feature centroids.
///
/// `None` when no feature has a centroid.
pub fn map_center(collection: &FeatureCollection) -> Option<Point<f64>> {
    let centroids = feature_centroids(collection);
    if centroids.is_empty() {
        return None;
    }

    let n = centroids.len() as f64;
    let (sum_x, sum_y) = centroids
        .iter()
        .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x(), sy + p.y()));

    Some(Point::new(sum_x / n, sum_y / n))
}
