//! Validated render options and the renderer's config file.
//!
//! The generated file is the existing renderer's input contract: two
//! sections, `[required]` then `[optional]`, one `key=value` per line. Key
//! names and section order must not change.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::Config;
use crate::store::UserDir;

/// Free-tier static map images cap out at 640 pixels per side.
pub const MAX_VIDEO_DIMENSION: i64 = 640;

/// Shortest video the renderer will produce.
pub const MIN_VIDEO_LIMIT_SECS: i64 = 3;

#[derive(Error, Debug)]
pub enum OptionsError {
    #[error("{field} must be between {min} and {max}, got {value}")]
    OutOfRange {
        field: &'static str,
        min: i64,
        max: i64,
        value: i64,
    },

    #[error("{field} must be at least {min}, got {value}")]
    TooSmall {
        field: &'static str,
        min: i64,
        value: i64,
    },

    #[error("video border {border} leaves no room inside a {width}x{height} frame")]
    BorderTooLarge {
        border: i64,
        width: i64,
        height: i64,
    },

    #[error("photos timezone must be a whole or half hour offset in -12..=13, got {0}")]
    BadTimezone(f64),
}

/// Where photos inserted into the video come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PhotoSource {
    /// No photos in the video.
    #[default]
    None,
    /// Photos the user uploaded to their own directory.
    Local,
    /// Photos fetched from the fitness service into the job directory.
    Remote,
}

/// One submission's rendering parameters, persisted with the user record so
/// an interrupted job can be resumed with the same configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderOptions {
    pub track_id: i64,
    pub video_width: i64,
    pub video_height: i64,
    pub video_border: i64,
    #[serde(default)]
    pub video_limit_secs: Option<i64>,
    #[serde(default)]
    pub photos: PhotoSource,
    /// Offset between the camera clock and UTC, whole or half hours. When
    /// unset the renderer derives it from the track itself.
    #[serde(default)]
    pub photos_timezone: Option<f64>,
    #[serde(default)]
    pub photos_show_secs: Option<i64>,
}

impl RenderOptions {
    pub fn validate(&self) -> Result<(), OptionsError> {
        check_dimension("video_width", self.video_width)?;
        check_dimension("video_height", self.video_height)?;
        check_dimension("video_border", self.video_border)?;
        if self.video_border * 2 >= self.video_width || self.video_border * 2 >= self.video_height {
            return Err(OptionsError::BorderTooLarge {
                border: self.video_border,
                width: self.video_width,
                height: self.video_height,
            });
        }
        if let Some(secs) = self.video_limit_secs {
            if secs < MIN_VIDEO_LIMIT_SECS {
                return Err(OptionsError::TooSmall {
                    field: "video_limit_secs",
                    min: MIN_VIDEO_LIMIT_SECS,
                    value: secs,
                });
            }
        }
        if let Some(secs) = self.photos_show_secs {
            if secs < 1 {
                return Err(OptionsError::TooSmall {
                    field: "photos_show_secs",
                    min: 1,
                    value: secs,
                });
            }
        }
        if let Some(tz) = self.photos_timezone {
            timezone_value(tz)?;
        }
        Ok(())
    }

    /// Render the renderer's config file for this submission.
    pub fn config_file(&self, config: &Config, dir: &UserDir) -> String {
        let mut out = String::new();
        out.push_str("[required]\n");
        out.push_str(&format!("ffmpeg={}\n", config.ffmpeg));
        out.push_str(&format!("google_map_key={}\n", config.google_map_key));
        out.push_str(&format!("gps_file={}\n", dir.track_path().display()));
        out.push_str(&format!("google_map_type={}\n", config.google_map_type));
        out.push_str(&format!("trackid={}\n", self.track_id));
        out.push_str(&format!("video_width={}\n", self.video_width));
        out.push_str(&format!("video_height={}\n", self.video_height));
        out.push_str(&format!("video_border={}\n", self.video_border));

        out.push_str("[optional]\n");
        if let Some(secs) = self.video_limit_secs {
            out.push_str(&format!("video_limit_secs={secs}\n"));
        }
        match self.photos {
            PhotoSource::None => {}
            PhotoSource::Local => {
                out.push_str(&format!("photos_dir={}\n", dir.photos_dir().display()));
            }
            PhotoSource::Remote => {
                out.push_str(&format!("photos_dir={}\n", dir.output_photos_dir().display()));
            }
        }
        if let Some(tz) = self.photos_timezone {
            out.push_str(&format!("photos_timezone={}\n", format_timezone(tz)));
        }
        if let Some(secs) = self.photos_show_secs {
            out.push_str(&format!("photos_show_secs={secs}\n"));
        }
        out.push_str(&format!("output_dir={}\n", dir.output_dir().display()));
        out
    }
}

fn check_dimension(field: &'static str, value: i64) -> Result<(), OptionsError> {
    if !(1..=MAX_VIDEO_DIMENSION).contains(&value) {
        return Err(OptionsError::OutOfRange {
            field,
            min: 1,
            max: MAX_VIDEO_DIMENSION,
            value,
        });
    }
    Ok(())
}

fn timezone_value(tz: f64) -> Result<(), OptionsError> {
    let whole = tz.trunc() as i64;
    let fraction = tz.fract();
    if !(-12..=13).contains(&whole) || (fraction != 0.0 && fraction != 0.5) {
        return Err(OptionsError::BadTimezone(tz));
    }
    Ok(())
}

/// Whole-hour offsets print without a fraction, matching what the renderer
/// has always been fed.
fn format_timezone(tz: f64) -> String {
    if tz.fract() == 0.0 {
        format!("{}", tz as i64)
    } else {
        format!("{tz}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn options() -> RenderOptions {
        RenderOptions {
            track_id: 12345,
            video_width: 640,
            video_height: 480,
            video_border: 10,
            video_limit_secs: None,
            photos: PhotoSource::None,
            photos_timezone: None,
            photos_show_secs: None,
        }
    }

    fn test_config() -> Config {
        Config {
            work_dir: "/srv/trackreel/work".into(),
            renderer_command: "python".to_string(),
            renderer_script: "/opt/gps2video/gps2video.py".into(),
            ffmpeg: "ffmpeg".to_string(),
            google_map_key: "KEY".to_string(),
            google_map_type: "satellite".to_string(),
        }
    }

    #[test]
    fn test_valid_options_pass() {
        assert!(options().validate().is_ok());
    }

    #[test]
    fn test_dimension_bounds() {
        let mut opts = options();
        opts.video_width = 0;
        assert!(matches!(
            opts.validate(),
            Err(OptionsError::OutOfRange { field: "video_width", .. })
        ));
        opts.video_width = 641;
        assert!(matches!(
            opts.validate(),
            Err(OptionsError::OutOfRange { field: "video_width", .. })
        ));
    }

    #[test]
    fn test_border_must_fit_inside_frame() {
        let mut opts = options();
        opts.video_border = 240;
        assert!(matches!(
            opts.validate(),
            Err(OptionsError::BorderTooLarge { .. })
        ));
    }

    #[test]
    fn test_limit_secs_minimum() {
        let mut opts = options();
        opts.video_limit_secs = Some(2);
        assert!(matches!(opts.validate(), Err(OptionsError::TooSmall { .. })));
        opts.video_limit_secs = Some(3);
        assert!(opts.validate().is_ok());
    }

    #[test]
    fn test_timezone_accepts_whole_and_half_hours() {
        let mut opts = options();
        for tz in [8.0, -11.0, 3.5, 0.0, 13.0] {
            opts.photos_timezone = Some(tz);
            assert!(opts.validate().is_ok(), "timezone {tz} should be valid");
        }
        for tz in [14.0, -12.5, 3.25] {
            opts.photos_timezone = Some(tz);
            assert!(
                matches!(opts.validate(), Err(OptionsError::BadTimezone(_))),
                "timezone {tz} should be rejected"
            );
        }
    }

    #[test]
    fn test_config_file_sections_and_keys() {
        let dir = UserDir::new(Path::new("/srv/trackreel/work"), 3);
        let mut opts = options();
        opts.video_limit_secs = Some(10);
        opts.photos = PhotoSource::Local;
        opts.photos_timezone = Some(8.0);
        opts.photos_show_secs = Some(2);

        let text = opts.config_file(&test_config(), &dir);
        let required = text.find("[required]").unwrap();
        let optional = text.find("[optional]").unwrap();
        assert!(required < optional);

        assert!(text.contains("ffmpeg=ffmpeg\n"));
        assert!(text.contains("google_map_key=KEY\n"));
        assert!(text.contains("gps_file=/srv/trackreel/work/3/output/g2v.gpx\n"));
        assert!(text.contains("google_map_type=satellite\n"));
        assert!(text.contains("trackid=12345\n"));
        assert!(text.contains("video_width=640\n"));
        assert!(text.contains("video_limit_secs=10\n"));
        assert!(text.contains("photos_dir=/srv/trackreel/work/3/photos\n"));
        assert!(text.contains("photos_timezone=8\n"));
        assert!(text.ends_with("output_dir=/srv/trackreel/work/3/output\n"));
    }

    #[test]
    fn test_config_file_omits_unset_optionals() {
        let dir = UserDir::new(Path::new("/w"), 1);
        let text = options().config_file(&test_config(), &dir);
        assert!(!text.contains("video_limit_secs"));
        assert!(!text.contains("photos_dir"));
        assert!(!text.contains("photos_timezone"));
    }

    #[test]
    fn test_half_hour_timezone_keeps_fraction() {
        assert_eq!(format_timezone(3.5), "3.5");
        assert_eq!(format_timezone(-11.0), "-11");
    }

    #[test]
    fn test_options_round_trip_through_json() {
        let mut opts = options();
        opts.photos = PhotoSource::Remote;
        let json = serde_json::to_string(&opts).unwrap();
        let back: RenderOptions = serde_json::from_str(&json).unwrap();
        assert_eq!(back, opts);
    }
}
