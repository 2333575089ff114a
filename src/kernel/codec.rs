//! PointCodec: textual records, routing keys, and the aggregate wire format.
//!
//! Input records are comma-separated coordinates (`1.5,-2,0.25`).
//!
//! At a serialization boundary, aggregates travel as text:
//!
//! | Mode           | Wire value                         |
//! |----------------|------------------------------------|
//! | Training       | `s1,s2,...,sD;count:elapsed_nanos` |
//! | Classification | `count:elapsed_nanos`              |
//!
//! Coordinates are written with Rust's shortest round-trip float formatting,
//! so `decode_aggregate(&encode_aggregate(a)) == a` holds exactly.

use crate::error::{IncKMeansError, Result};

use super::aggregate::PartialAggregate;
use super::point::Point;

/// Separator between coordinates in records, keys, and sums.
pub const FIELD_DELIMITER: char = ',';
/// Separator between the coordinate sums and the count.
pub const SUM_DELIMITER: char = ';';
/// Separator between the payload and the elapsed time.
pub const TIME_DELIMITER: char = ':';

/// Largest coordinate magnitude accepted in an input record. Squared
/// distances and sums over many such points stay finite.
pub const MAX_COORDINATE: f64 = 1e100;

/// Routing key for points that fit their nearest cluster.
pub const BENIGN_KEY: &str = "<benign>";
/// Routing key for points that fit no cluster.
pub const OUTLIER_KEY: &str = "<outlier>";

/// Stateless encoder/decoder for the textual forms used at the edges.
pub struct PointCodec;

impl PointCodec {
    /// Parse a raw record into a point of any dimensionality.
    ///
    /// Every field must be a finite number no larger in magnitude than
    /// [`MAX_COORDINATE`]; surrounding whitespace is ignored.
    pub fn parse_point(record: &str) -> Result<Point> {
        let record = record.trim();
        if record.is_empty() {
            return Err(IncKMeansError::parse(record, "empty record"));
        }

        let coords = record
            .split(FIELD_DELIMITER)
            .enumerate()
            .map(|(i, field)| parse_record_coordinate(field).map_err(|reason| {
                IncKMeansError::parse(record, format!("field {}: {}", i, reason))
            }))
            .collect::<Result<Vec<f64>>>()?;

        Ok(Point::from_data(coords))
    }

    /// Parse a raw record and check it against the model dimensionality.
    pub fn parse_point_with_dims(record: &str, dimensions: usize) -> Result<Point> {
        let point = Self::parse_point(record)?;
        if point.dimensions() != dimensions {
            return Err(IncKMeansError::DimensionMismatch {
                expected: dimensions,
                got: point.dimensions(),
            });
        }
        Ok(point)
    }

    /// Deterministic signature of a centroid, e.g. `[0.5,9.5]`.
    ///
    /// Equal coordinate values always produce the same string.
    pub fn encode_routing_key(centroid: &Point) -> String {
        format!("[{}]", join_coords(centroid.data()))
    }

    /// Recover the coordinates from a centroid signature.
    pub fn decode_routing_key(key: &str) -> Result<Point> {
        let inner = key
            .trim()
            .strip_prefix('[')
            .and_then(|k| k.strip_suffix(']'))
            .ok_or_else(|| IncKMeansError::decode(format!("not a centroid key: {:?}", key)))?;

        split_coords(inner)
            .map(Point::from_data)
            .map_err(|reason| IncKMeansError::decode(format!("bad centroid key {:?}: {}", key, reason)))
    }

    /// Serialize an aggregate to its wire value.
    pub fn encode_aggregate(aggregate: &PartialAggregate) -> String {
        match aggregate {
            PartialAggregate::Centroid {
                sums,
                count,
                elapsed_nanos,
            } => format!(
                "{}{}{}{}{}",
                join_coords(sums),
                SUM_DELIMITER,
                count,
                TIME_DELIMITER,
                elapsed_nanos
            ),
            PartialAggregate::Tally {
                count,
                elapsed_nanos,
            } => format!("{}{}{}", count, TIME_DELIMITER, elapsed_nanos),
        }
    }

    /// Parse a wire value. The presence of the sum delimiter selects the
    /// training shape.
    pub fn decode_aggregate(value: &str) -> Result<PartialAggregate> {
        let (payload, elapsed) = value
            .trim()
            .rsplit_once(TIME_DELIMITER)
            .ok_or_else(|| IncKMeansError::decode(format!("missing elapsed time in {:?}", value)))?;

        let elapsed_nanos = parse_u64(elapsed, "elapsed time", value)?;

        match payload.split_once(SUM_DELIMITER) {
            Some((sums, count)) => {
                let sums = split_coords(sums).map_err(|reason| {
                    IncKMeansError::decode(format!("bad sums in {:?}: {}", value, reason))
                })?;
                Ok(PartialAggregate::Centroid {
                    sums,
                    count: parse_u64(count, "count", value)?,
                    elapsed_nanos,
                })
            }
            None => Ok(PartialAggregate::Tally {
                count: parse_u64(payload, "count", value)?,
                elapsed_nanos,
            }),
        }
    }
}

fn parse_coordinate(field: &str) -> std::result::Result<f64, String> {
    let field = field.trim();
    let value: f64 = field
        .parse()
        .map_err(|_| format!("not a number: {:?}", field))?;
    if !value.is_finite() {
        return Err(format!("not finite: {:?}", field));
    }
    Ok(value)
}

fn parse_record_coordinate(field: &str) -> std::result::Result<f64, String> {
    let value = parse_coordinate(field)?;
    if value.abs() > MAX_COORDINATE {
        return Err(format!("magnitude exceeds {:e}: {:?}", MAX_COORDINATE, field.trim()));
    }
    Ok(value)
}

fn split_coords(text: &str) -> std::result::Result<Vec<f64>, String> {
    if text.trim().is_empty() {
        return Err("no coordinates".to_string());
    }
    text.split(FIELD_DELIMITER).map(parse_coordinate).collect()
}

fn parse_u64(text: &str, what: &str, value: &str) -> Result<u64> {
    text.trim()
        .parse()
        .map_err(|_| IncKMeansError::decode(format!("bad {} in {:?}", what, value)))
}

fn join_coords(coords: &[f64]) -> String {
    coords
        .iter()
        .map(|c| format!("{:?}", c))
        .collect::<Vec<_>>()
        .join(",")
}
