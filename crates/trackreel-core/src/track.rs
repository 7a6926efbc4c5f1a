//! GPX track file written alongside the renderer config.
//!
//! Point construction from raw telemetry is the caller's concern; this module
//! only guarantees the on-disk exchange format the renderer reads.

use chrono::{DateTime, SecondsFormat, Utc};

/// One sample of a recorded activity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackPoint {
    pub latitude: f64,
    pub longitude: f64,
    pub elevation: f64,
    pub time: DateTime<Utc>,
}

impl TrackPoint {
    pub fn new(latitude: f64, longitude: f64, elevation: f64, time: DateTime<Utc>) -> Self {
        Self {
            latitude,
            longitude,
            elevation,
            time,
        }
    }
}

/// Serialize points as a GPX 1.1 document with one track segment.
pub fn write_gpx(points: &[TrackPoint]) -> String {
    let mut out = String::from(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
         <gpx version=\"1.1\" creator=\"trackreel\" xmlns=\"http://www.topografix.com/GPX/1/1\">\n\
         \t<trk>\n\
         \t\t<trkseg>\n",
    );
    for point in points {
        out.push_str(&format!(
            "\t\t\t<trkpt lat=\"{}\" lon=\"{}\">\n\
             \t\t\t\t<ele>{}</ele>\n\
             \t\t\t\t<time>{}</time>\n\
             \t\t\t</trkpt>\n",
            point.latitude,
            point.longitude,
            point.elevation,
            point.time.to_rfc3339_opts(SecondsFormat::Secs, true),
        ));
    }
    out.push_str("\t\t</trkseg>\n\t</trk>\n</gpx>\n");
    out
}
