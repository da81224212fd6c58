//! Region of interest geometry, parsed and validated once up front.

use crate::utils::error::{RechargeError, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coord {
    pub lon: f64,
    pub lat: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Roi {
    Point(Coord),
    /// Closed ring: first vertex repeated last.
    Polygon(Vec<Coord>),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

/// Wraps a longitude into [-180, 180).
fn normalize_lon(lon: f64) -> f64 {
    if (-180.0..180.0).contains(&lon) {
        return lon;
    }
    (lon + 180.0).rem_euclid(360.0) - 180.0
}

fn coord_from_pair(pair: &[f64], index: usize) -> Result<Coord> {
    if pair.len() != 2 {
        return Err(RechargeError::geometry(format!(
            "vertex {} has {} values, expected [lon, lat]",
            index,
            pair.len()
        )));
    }
    let (lon, lat) = (pair[0], pair[1]);
    if !lon.is_finite() || !lat.is_finite() {
        return Err(RechargeError::geometry(format!(
            "vertex {} is not finite",
            index
        )));
    }
    if !(-90.0..=90.0).contains(&lat) {
        return Err(RechargeError::geometry(format!(
            "vertex {} latitude {} is outside [-90, 90]",
            index, lat
        )));
    }
    Ok(Coord {
        lon: normalize_lon(lon),
        lat,
    })
}

impl Roi {
    /// Parses `[[lon, lat]]` (point) or `[[lon, lat], ...]` (polygon ring).
    pub fn parse(input: &str) -> Result<Self> {
        let pairs: Vec<Vec<f64>> = serde_json::from_str(input.trim()).map_err(|e| {
            RechargeError::geometry(format!("expected a list of [lon, lat] pairs: {}", e))
        })?;
        Self::from_pairs(&pairs)
    }

    pub fn from_pairs(pairs: &[Vec<f64>]) -> Result<Self> {
        let coords = pairs
            .iter()
            .enumerate()
            .map(|(i, pair)| coord_from_pair(pair, i))
            .collect::<Result<Vec<_>>>()?;

        match coords.len() {
            0 => Err(RechargeError::geometry("coordinate list is empty")),
            1 => Ok(Roi::Point(coords[0])),
            _ => Self::polygon(coords),
        }
    }

    fn polygon(mut ring: Vec<Coord>) -> Result<Self> {
        if ring.first() != ring.last() {
            ring.push(ring[0]);
        }
        let mut distinct: Vec<Coord> = Vec::new();
        for c in &ring[..ring.len() - 1] {
            if !distinct.contains(c) {
                distinct.push(*c);
            }
        }
        if distinct.len() < 3 {
            return Err(RechargeError::geometry(format!(
                "polygon needs at least 3 distinct vertices, got {}",
                distinct.len()
            )));
        }
        let roi = Roi::Polygon(ring);
        if roi.area_deg2() <= 1e-12 {
            return Err(RechargeError::geometry("polygon has zero area"));
        }
        Ok(roi)
    }

    /// Unsigned shoelace area in square degrees; zero for a point.
    pub fn area_deg2(&self) -> f64 {
        match self {
            Roi::Point(_) => 0.0,
            Roi::Polygon(ring) => {
                let twice: f64 = ring
                    .windows(2)
                    .map(|w| w[0].lon * w[1].lat - w[1].lon * w[0].lat)
                    .sum();
                twice.abs() / 2.0
            }
        }
    }

    pub fn bounding_box(&self) -> BoundingBox {
        match self {
            Roi::Point(c) => BoundingBox {
                west: c.lon,
                south: c.lat,
                east: c.lon,
                north: c.lat,
            },
            Roi::Polygon(ring) => ring.iter().fold(
                BoundingBox {
                    west: f64::INFINITY,
                    south: f64::INFINITY,
                    east: f64::NEG_INFINITY,
                    north: f64::NEG_INFINITY,
                },
                |b, c| BoundingBox {
                    west: b.west.min(c.lon),
                    south: b.south.min(c.lat),
                    east: b.east.max(c.lon),
                    north: b.north.max(c.lat),
                },
            ),
        }
    }

    /// Vertex average of the open ring.
    pub fn centroid(&self) -> Coord {
        match self {
            Roi::Point(c) => *c,
            Roi::Polygon(ring) => {
                let open = &ring[..ring.len() - 1];
                let n = open.len() as f64;
                Coord {
                    lon: open.iter().map(|c| c.lon).sum::<f64>() / n,
                    lat: open.iter().map(|c| c.lat).sum::<f64>() / n,
                }
            }
        }
    }

    /// Even-odd ray casting. A point ROI contains only itself.
    pub fn contains(&self, lon: f64, lat: f64) -> bool {
        match self {
            Roi::Point(c) => c.lon == lon && c.lat == lat,
            Roi::Polygon(ring) => {
                let mut inside = false;
                for w in ring.windows(2) {
                    let (a, b) = (w[0], w[1]);
                    if (a.lat > lat) != (b.lat > lat) {
                        let x = a.lon + (lat - a.lat) * (b.lon - a.lon) / (b.lat - a.lat);
                        if lon < x {
                            inside = !inside;
                        }
                    }
                }
                inside
            }
        }
    }

    /// `[[lon, lat], ...]`, the same form [`Roi::parse`] accepts.
    pub fn to_json(&self) -> String {
        let pairs: Vec<[f64; 2]> = match self {
            Roi::Point(c) => vec![[c.lon, c.lat]],
            Roi::Polygon(ring) => ring.iter().map(|c| [c.lon, c.lat]).collect(),
        };
        serde_json::to_string(&pairs).unwrap_or_default()
    }
}

impl std::str::FromStr for Roi {
    type Err = RechargeError;

    fn from_str(s: &str) -> Result<Self> {
        Roi::parse(s)
    }
}
