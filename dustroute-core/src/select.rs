//! Ingestion of raw readings and selection of overloaded bins.

use tracing::warn;

use crate::model::{Bin, FillLevel, GeoPoint, SourceEntry, ValidationError};

#[derive(Debug, Clone, PartialEq)]
/// A source entry that failed validation and was left out of the cycle.
pub struct RejectedReading {
    /// The entry as received.
    pub entry: SourceEntry,
    /// Why it was rejected.
    pub reason: ValidationError,
}

#[derive(Debug, Clone, Default, PartialEq)]
/// Result of validating a batch of readings.
pub struct Ingested {
    /// Valid bins in discovery order.
    pub bins: Vec<Bin>,
    /// Entries that failed validation.
    pub rejected: Vec<RejectedReading>,
}

/// Validate source entries, keeping discovery order for the accepted bins.
#[must_use]
pub fn ingest<I>(entries: I) -> Ingested
where
    I: IntoIterator,
    I::Item: Into<SourceEntry>,
{
    let mut ingested = Ingested::default();
    for entry in entries {
        let entry = entry.into();
        match Bin::try_from(entry.clone()) {
            Ok(bin) => ingested.bins.push(bin),
            Err(reason) => {
                let name = entry.reading().map_or("<unreadable>", |reading| reading.name.as_str());
                warn!(%name, %reason, "rejecting bin reading");
                ingested.rejected.push(RejectedReading { entry, reason });
            }
        }
    }
    ingested
}

/// Bins whose fill level is at or above `threshold`, in input order.
pub fn overloaded(bins: &[Bin], threshold: FillLevel) -> impl Iterator<Item = &Bin> {
    bins.iter().filter(move |bin| bin.is_overloaded(threshold))
}

/// Locations of the overloaded bins, in input order.
///
/// An empty result means nothing needs collecting.
#[must_use]
pub fn select(bins: &[Bin], threshold: FillLevel) -> Vec<GeoPoint> {
    overloaded(bins, threshold).map(|bin| bin.location).collect()
}

/// Visiting order for one cycle: the base station followed by the overloaded bins.
#[must_use]
pub fn waypoints(base: GeoPoint, bins: &[Bin], threshold: FillLevel) -> Vec<GeoPoint> {
    let mut waypoints = vec![base];
    waypoints.extend(select(bins, threshold));
    waypoints
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::BinReading;

    fn bin(name: &str, lat: f64, lon: f64, fill: i64) -> Bin {
        Bin::try_from(BinReading {
            name: name.to_owned(),
            lat,
            lon,
            fill,
        })
        .expect("valid test bin")
    }

    fn level(percent: i64) -> FillLevel {
        FillLevel::new(percent).expect("valid level")
    }

    #[test]
    fn selects_at_or_above_threshold_in_order() {
        let bins = vec![
            bin("a", 16.70, 74.24, 80),
            bin("b", 16.71, 74.25, 79),
            bin("c", 16.72, 74.26, 95),
            bin("d", 16.73, 74.27, 81),
        ];
        let selected = select(&bins, level(80));
        let expected: Vec<GeoPoint> = [0_usize, 2, 3]
            .iter()
            .filter_map(|idx| bins.get(*idx).map(|bin| bin.location))
            .collect();
        assert_eq!(selected, expected);
        assert_eq!(select(&bins, level(80)), selected, "selection is not repeatable");
    }

    #[test]
    fn no_overload_yields_empty_selection() {
        assert!(select(&[], level(80)).is_empty(), "empty input selected bins");
        let calm = vec![bin("a", 16.70, 74.24, 10), bin("b", 16.71, 74.25, 79)];
        assert!(select(&calm, level(80)).is_empty(), "calm bins selected");
    }

    #[test]
    fn waypoints_start_at_base() {
        let base = GeoPoint::new(16.705, 74.243).expect("valid base");
        let bins = vec![bin("hot", 16.70, 74.24, 90), bin("cold", 16.71, 74.25, 50)];
        let route = waypoints(base, &bins, level(80));
        assert_eq!(
            route,
            vec![base, GeoPoint::new(16.70, 74.24).expect("valid point")]
        );
        assert_eq!(waypoints(base, &[], level(80)), vec![base]);
    }

    #[test]
    fn ingest_splits_valid_and_rejected() {
        let readings = vec![
            BinReading {
                name: "ok".to_owned(),
                lat: 16.7,
                lon: 74.2,
                fill: 50,
            },
            BinReading {
                name: "overfull".to_owned(),
                lat: 16.7,
                lon: 74.2,
                fill: 140,
            },
            BinReading {
                name: "offmap".to_owned(),
                lat: 16.7,
                lon: 274.2,
                fill: 20,
            },
        ];
        let ingested = ingest(readings);
        assert_eq!(ingested.bins.len(), 1);
        let reasons: Vec<_> = ingested
            .rejected
            .iter()
            .map(|rejected| rejected.reason.clone())
            .collect();
        assert_eq!(
            reasons,
            vec![
                ValidationError::FillLevel(140),
                ValidationError::Longitude(274.2)
            ]
        );
    }

    #[test]
    fn unreadable_entry_is_rejected_beside_valid_one() {
        let entries = vec![
            SourceEntry::Reading(BinReading {
                name: "ok".to_owned(),
                lat: 16.7,
                lon: 74.2,
                fill: 91,
            }),
            SourceEntry::Unreadable {
                raw: r#"{"name":"bad","fill":87.5}"#.to_owned(),
                detail: "invalid type".to_owned(),
            },
        ];

        let ingested = ingest(entries);

        assert_eq!(ingested.bins.len(), 1);
        assert_eq!(
            ingested
                .rejected
                .iter()
                .map(|rejected| rejected.reason.clone())
                .collect::<Vec<_>>(),
            vec![ValidationError::Unreadable("invalid type".to_owned())]
        );
    }
}
