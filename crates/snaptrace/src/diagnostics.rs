//! Tracer diagnostics: timings and counts for graph builds and queries.
//!
//! A [`Tracer`](crate::Tracer) records one [`BuildDiagnostics`] per
//! graph build and one [`QueryDiagnostics`] per shortest-path query.
//! They are cheap to collect and are what the bench tool prints.
//!
//! Durations are serialized as fractional seconds (`f64`) for JSON
//! compatibility, since `std::time::Duration` does not implement serde
//! traits.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// Time source used to measure stages.
///
/// Abstracted so callers on platforms without a monotonic clock (or
/// tests that want deterministic timings) can provide their own.
pub trait Clock {
    /// Opaque point in time.
    type Instant;

    /// Current time.
    fn now(&self) -> Self::Instant;

    /// Time elapsed since `since`.
    fn elapsed(&self, since: &Self::Instant) -> Duration;
}

/// [`Clock`] implementation backed by [`std::time::Instant`].
#[derive(Debug, Clone, Copy, Default)]
pub struct StdClock;

impl Clock for StdClock {
    type Instant = Instant;

    fn now(&self) -> Instant {
        Instant::now()
    }

    fn elapsed(&self, since: &Instant) -> Duration {
        since.elapsed()
    }
}

/// Serde support for `std::time::Duration` as fractional seconds.
mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a `Duration` as fractional seconds (`f64`).
    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    /// Deserialize a `Duration` from fractional seconds (`f64`).
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            serde::de::Error::custom(
                "duration seconds must be finite, non-negative, and representable as a Duration",
            )
        })
    }
}

/// Serde support for `Option<Duration>` as optional fractional seconds.
mod option_duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[allow(clippy::ref_option)]
    pub fn serialize<S: Serializer>(
        duration: &Option<Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        duration.map(|d| d.as_secs_f64()).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        Option::<f64>::deserialize(deserializer)?
            .map(|secs| {
                Duration::try_from_secs_f64(secs).map_err(|_| {
                    serde::de::Error::custom(
                        "duration seconds must be finite, non-negative, and representable as a Duration",
                    )
                })
            })
            .transpose()
    }
}

/// Diagnostics for one graph build.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildDiagnostics {
    /// Pulling features from the layers and extracting their linework.
    #[serde(with = "duration_serde")]
    pub extract: Duration,
    /// Noding, when a noder is configured.
    #[serde(with = "option_duration_serde", default)]
    pub noding: Option<Duration>,
    /// Building the graph and its spatial indexes.
    #[serde(with = "duration_serde")]
    pub make_graph: Duration,
    /// Whole build.
    #[serde(with = "duration_serde")]
    pub total: Duration,
    /// Features that contributed linework.
    pub feature_count: usize,
    /// Lines handed to the graph builder.
    pub line_count: usize,
    pub vertex_count: usize,
    pub edge_count: usize,
    /// Connected components of the built graph.
    pub component_count: usize,
    /// Noding failed and the raw linework was used, or non-finite lines
    /// were dropped.
    pub topology_problem: bool,
}

impl BuildDiagnostics {
    /// Format diagnostics as a human-readable report.
    #[must_use]
    pub fn report(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Graph Build Report\n{}", "=".repeat(60)));
        lines.push(format!(
            "Total duration: {:.3}ms",
            duration_ms(self.total)
        ));
        lines.push(String::new());

        lines.push(format!("{:<24} {:>10} {:>10}", "Stage", "Duration", "% Total"));
        lines.push("-".repeat(48));

        let total_ms = duration_ms(self.total);
        let mut stages = vec![("Extract", self.extract)];
        if let Some(noding) = self.noding {
            stages.push(("Noding", noding));
        }
        stages.push(("Make Graph", self.make_graph));
        for (name, d) in stages {
            let ms = duration_ms(d);
            let pct = if total_ms > 0.0 {
                ms / total_ms * 100.0
            } else {
                0.0
            };
            lines.push(format!("{name:<24} {ms:>8.3}ms {pct:>9.1}%"));
        }

        lines.push(String::new());
        lines.push(format!(
            "Features: {}  |  Lines: {}  |  Vertices: {}  |  Edges: {}  |  Components: {}",
            self.feature_count,
            self.line_count,
            self.vertex_count,
            self.edge_count,
            self.component_count,
        ));
        if self.topology_problem {
            lines.push("Topology problem: linework is not fully noded".to_owned());
        }

        lines.join("\n")
    }
}

/// Diagnostics for one shortest-path query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryDiagnostics {
    /// Resolving both points to vertices, splicing as needed.
    #[serde(with = "duration_serde")]
    pub prepare: Duration,
    /// The Dijkstra search and path assembly.
    #[serde(with = "duration_serde")]
    pub search: Duration,
    /// Offsetting the result, when an offset is configured.
    #[serde(with = "option_duration_serde", default)]
    pub offset: Option<Duration>,
    /// Vertices spliced into edges for this query (0 to 2).
    pub spliced_vertices: usize,
    /// Points in the returned path.
    pub path_points: usize,
    /// Planar length of the returned path.
    pub path_length: f64,
}

impl QueryDiagnostics {
    /// Format diagnostics as a human-readable report.
    #[must_use]
    pub fn report(&self) -> String {
        let offset = self
            .offset
            .map_or_else(|| "-".to_owned(), |d| format!("{:.3}ms", duration_ms(d)));
        format!(
            "Query: prepare={:.3}ms search={:.3}ms offset={offset}  |  spliced={}  points={}  length={:.3}",
            duration_ms(self.prepare),
            duration_ms(self.search),
            self.spliced_vertices,
            self.path_points,
            self.path_length,
        )
    }
}

/// Convert a `Duration` to milliseconds as `f64`.
fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn build() -> BuildDiagnostics {
        BuildDiagnostics {
            extract: Duration::from_millis(4),
            noding: None,
            make_graph: Duration::from_millis(6),
            total: Duration::from_millis(10),
            feature_count: 3,
            line_count: 5,
            vertex_count: 6,
            edge_count: 5,
            component_count: 2,
            topology_problem: false,
        }
    }

    #[test]
    fn duration_ms_converts_correctly() {
        let d = Duration::from_millis(1234);
        let ms = duration_ms(d);
        assert!((ms - 1234.0).abs() < 0.01);
    }

    #[test]
    fn build_report_lists_stages_and_counts() {
        let report = build().report();
        assert!(report.contains("Graph Build Report"));
        assert!(report.contains("Make Graph"));
        assert!(!report.contains("Noding"));
        assert!(report.contains("Components: 2"));
        assert!(!report.contains("Topology problem"));
    }

    #[test]
    fn build_report_mentions_noding_and_topology_problem() {
        let diag = BuildDiagnostics {
            noding: Some(Duration::from_millis(2)),
            topology_problem: true,
            ..build()
        };
        let report = diag.report();
        assert!(report.contains("Noding"));
        assert!(report.contains("Topology problem"));
    }

    #[test]
    fn query_report() {
        let diag = QueryDiagnostics {
            prepare: Duration::from_micros(50),
            search: Duration::from_micros(200),
            offset: None,
            spliced_vertices: 2,
            path_points: 7,
            path_length: 12.5,
        };
        let report = diag.report();
        assert!(report.contains("offset=-"));
        assert!(report.contains("spliced=2"));
        assert!(report.contains("length=12.500"));
    }

    #[test]
    fn durations_serialize_as_seconds() {
        let json = serde_json::to_value(build()).unwrap();
        assert!((json["total"].as_f64().unwrap() - 0.010).abs() < 1e-12);
        assert!(json["noding"].is_null());

        let back: BuildDiagnostics = serde_json::from_value(json).unwrap();
        assert!((back.total.as_secs_f64() - 0.010).abs() < 1e-9);
        assert_eq!(back.noding, None);
        assert_eq!(back.component_count, 2);
    }

    #[test]
    fn negative_duration_is_rejected() {
        let mut json = serde_json::to_value(build()).unwrap();
        json["total"] = serde_json::json!(-1.0);
        assert!(serde_json::from_value::<BuildDiagnostics>(json).is_err());
    }

    #[test]
    fn std_clock_measures_forward() {
        let clock = StdClock;
        let start = clock.now();
        assert!(clock.elapsed(&start) >= Duration::ZERO);
    }
}
