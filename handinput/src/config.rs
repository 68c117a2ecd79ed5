//! Calibration and wiring configuration.
//!
//! Every threshold the pipeline uses lives here so it can be tuned per
//! device without touching classification logic.  Files are flat
//! s-expression plists:
//!
//! ```text
//! (:index-curl-m 0.11 :thumb-out-m 0.05 :debounce :sustained :debounce-frames 5)
//! ```
//!
//! Keys not listed in `GestureConfig::KEYS` are rejected.  Setting
//! `:debounce-frames` or `:debounce-drag-multiplier` without a `:debounce`
//! key selects the sustained policy.

use std::path::Path;

use lexpr::Value;
use tracing::info;

use crate::error::{Error, Result};
use crate::hand::classifier::{ClassifierThresholds, PinchSource};
use crate::hand::gesture::DebouncePolicy;
use crate::hand::sampler::SamplerConfig;
use crate::sexp::{as_number, bool_sexp, key_name, list_items, plist_pairs, scalar_string};
use crate::tools::mode_dial::DialZones;

#[derive(Debug, Clone, PartialEq)]
pub struct GestureConfig {
    pub classifier: ClassifierThresholds,
    pub sampler: SamplerConfig,
    pub debounce: DebouncePolicy,
    /// Dot-product cutoff (inclusive) for shift-layer tilt rules.
    pub shift_layer_dot: f32,
    pub dial: DialZones,
    /// Distance from the drag anchor that engages a tool's gear.
    pub gear_radius_m: f32,
    /// Touch press duration (ms) before a hold fires.
    pub hold_threshold_ms: f64,
    pub skeletal_enabled: bool,
    pub touch_enabled: bool,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            classifier: ClassifierThresholds::default(),
            sampler: SamplerConfig::default(),
            debounce: DebouncePolicy::Immediate,
            shift_layer_dot: 0.75,
            dial: DialZones::default(),
            gear_radius_m: 0.03,
            hold_threshold_ms: 500.0,
            skeletal_enabled: true,
            touch_enabled: true,
        }
    }
}

fn real(key: &str, v: &Value, kind: &str) -> Result<f64> {
    as_number(v).ok_or_else(|| Error::invalid(key, format!("expected {}, got {}", kind, v)))
}

fn number(key: &str, v: &Value) -> Result<f64> {
    real(key, v, "a number")
}

/// Distance in meters.
fn length(key: &str, v: &Value) -> Result<f32> {
    Ok(real(key, v, "a length in meters")? as f32)
}

/// Unitless value: dot-product cutoffs, dial bounds, fractions.
fn ratio(key: &str, v: &Value) -> Result<f32> {
    Ok(real(key, v, "a unitless ratio")? as f32)
}

fn count(key: &str, v: &Value) -> Result<u32> {
    let n = number(key, v)?;
    if n.fract() != 0.0 || n < 0.0 || n > f64::from(u32::MAX) {
        return Err(Error::invalid(key, "expected a non-negative integer"));
    }
    Ok(n as u32)
}

fn flag(key: &str, v: &Value) -> Result<bool> {
    match scalar_string(v).as_str() {
        "t" => Ok(true),
        "nil" => Ok(false),
        other => Err(Error::invalid(key, format!("expected t or nil, got {}", other))),
    }
}

fn require(key: &str, ok: bool, reason: &str) -> Result<()> {
    if ok {
        Ok(())
    } else {
        Err(Error::invalid(key, reason))
    }
}

impl GestureConfig {
    /// Every key `from_sexp` accepts.
    pub const KEYS: [&'static str; 26] = [
        "index-curl-m",
        "middle-curl-m",
        "ring-curl-m",
        "pinky-curl-m",
        "thumb-out-m",
        "finger-split-dot",
        "pointing-up-dot",
        "palm-flat-dot",
        "palm-level-distance",
        "whole-hand-up-dot",
        "pinch-distance-m",
        "pinch-source",
        "shift-layer-dot",
        "dial-create",
        "dial-rotate",
        "dial-translate",
        "dial-scale",
        "gear-radius-m",
        "hold-threshold-ms",
        "debounce",
        "debounce-frames",
        "debounce-drag-multiplier",
        "min-confidence",
        "smoothing",
        "skeletal",
        "touch",
    ];

    /// Parse a plist on top of the defaults, then validate.
    pub fn from_sexp(text: &str) -> Result<Self> {
        let value = lexpr::from_str(text).map_err(|e| Error::ConfigParse(e.to_string()))?;
        if list_items(&value).len() % 2 != 0 {
            return Err(Error::ConfigParse("plist has a key without a value".into()));
        }

        let mut cfg = Self::default();
        let mut policy: Option<bool> = None;
        let mut tuned = false;
        let mut frames = DebouncePolicy::DEFAULT_FRAMES;
        let mut drag_multiplier = DebouncePolicy::DEFAULT_DRAG_MULTIPLIER;

        for (k, v) in plist_pairs(&value) {
            let key = key_name(k)
                .ok_or_else(|| Error::ConfigParse(format!("expected a :keyword, got {}", k)))?;
            let c = &mut cfg.classifier;
            match key {
                "index-curl-m" => c.index_curl_m = length(key, v)?,
                "middle-curl-m" => c.middle_curl_m = length(key, v)?,
                "ring-curl-m" => c.ring_curl_m = length(key, v)?,
                "pinky-curl-m" => c.pinky_curl_m = length(key, v)?,
                "thumb-out-m" => c.thumb_out_m = length(key, v)?,
                "finger-split-dot" => c.finger_split_dot = ratio(key, v)?,
                "pointing-up-dot" => c.pointing_up_dot = ratio(key, v)?,
                "palm-flat-dot" => c.palm_flat_dot = ratio(key, v)?,
                "palm-level-distance" => c.palm_level_distance = ratio(key, v)?,
                "whole-hand-up-dot" => c.whole_hand_up_dot = ratio(key, v)?,
                "pinch-distance-m" => c.pinch_distance_m = length(key, v)?,
                "pinch-source" => {
                    let s = scalar_string(v);
                    c.pinch_source = PinchSource::from_str(&s).ok_or_else(|| {
                        Error::invalid(key, format!("expected :runtime or :geometric, got {}", s))
                    })?;
                }
                "shift-layer-dot" => cfg.shift_layer_dot = ratio(key, v)?,
                "dial-create" => cfg.dial.create = ratio(key, v)?,
                "dial-rotate" => cfg.dial.rotate = ratio(key, v)?,
                "dial-translate" => cfg.dial.translate = ratio(key, v)?,
                "dial-scale" => cfg.dial.scale = ratio(key, v)?,
                "gear-radius-m" => cfg.gear_radius_m = length(key, v)?,
                "hold-threshold-ms" => cfg.hold_threshold_ms = number(key, v)?,
                "debounce" => {
                    policy = Some(match scalar_string(v).as_str() {
                        "immediate" => false,
                        "sustained" => true,
                        other => {
                            return Err(Error::invalid(
                                key,
                                format!("expected :immediate or :sustained, got {}", other),
                            ))
                        }
                    })
                }
                "debounce-frames" => {
                    frames = count(key, v)?;
                    tuned = true;
                }
                "debounce-drag-multiplier" => {
                    drag_multiplier = count(key, v)?;
                    tuned = true;
                }
                "min-confidence" => cfg.sampler.min_confidence = ratio(key, v)?,
                "smoothing" => cfg.sampler.smoothing = ratio(key, v)?,
                "skeletal" => cfg.skeletal_enabled = flag(key, v)?,
                "touch" => cfg.touch_enabled = flag(key, v)?,
                other => return Err(Error::UnknownKey(other.to_string())),
            }
        }

        if policy.unwrap_or(tuned) {
            cfg.debounce = DebouncePolicy::Sustained {
                frames,
                drag_multiplier,
            };
        }
        cfg.validate()?;
        Ok(cfg)
    }

    /// Read and parse a configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let cfg = Self::from_sexp(&text)?;
        info!("loaded gesture config from {}", path.display());
        Ok(cfg)
    }

    /// Check ranges and cross-field consistency.
    pub fn validate(&self) -> Result<()> {
        let c = &self.classifier;
        for (key, v) in [
            ("index-curl-m", c.index_curl_m),
            ("middle-curl-m", c.middle_curl_m),
            ("ring-curl-m", c.ring_curl_m),
            ("pinky-curl-m", c.pinky_curl_m),
            ("thumb-out-m", c.thumb_out_m),
            ("pinch-distance-m", c.pinch_distance_m),
            ("gear-radius-m", self.gear_radius_m),
        ] {
            require(key, v.is_finite() && v > 0.0, "must be a positive length")?;
        }
        for (key, v) in [
            ("finger-split-dot", c.finger_split_dot),
            ("pointing-up-dot", c.pointing_up_dot),
            ("palm-flat-dot", c.palm_flat_dot),
            ("whole-hand-up-dot", c.whole_hand_up_dot),
            ("shift-layer-dot", self.shift_layer_dot),
        ] {
            require(key, (-1.0..=1.0).contains(&v), "must be within -1.0-1.0")?;
        }
        require(
            "palm-level-distance",
            (0.0..=2.0).contains(&c.palm_level_distance),
            "must be within 0.0-2.0",
        )?;
        require(
            "dial-create",
            self.dial.is_ordered(),
            "dial zones must descend: create > rotate > translate > scale",
        )?;
        require(
            "hold-threshold-ms",
            self.hold_threshold_ms.is_finite() && self.hold_threshold_ms > 0.0,
            "must be positive",
        )?;
        if let DebouncePolicy::Sustained {
            frames,
            drag_multiplier,
        } = self.debounce
        {
            require("debounce-frames", frames >= 1, "must be at least 1")?;
            require("debounce-drag-multiplier", drag_multiplier >= 1, "must be at least 1")?;
        }
        self.sampler.validate()?;
        if !self.skeletal_enabled && !self.touch_enabled {
            return Err(Error::Wiring("no input source enabled".into()));
        }
        Ok(())
    }

    /// Generate s-expression of the active configuration.
    pub fn config_sexp(&self) -> String {
        let c = &self.classifier;
        let (frames, multiplier) = match self.debounce {
            DebouncePolicy::Sustained {
                frames,
                drag_multiplier,
            } => (frames, drag_multiplier),
            DebouncePolicy::Immediate => (
                DebouncePolicy::DEFAULT_FRAMES,
                DebouncePolicy::DEFAULT_DRAG_MULTIPLIER,
            ),
        };
        format!(
            "(:index-curl-m {} :middle-curl-m {} :ring-curl-m {} :pinky-curl-m {} :thumb-out-m {} \
             :finger-split-dot {} :pointing-up-dot {} :palm-flat-dot {} :palm-level-distance {} \
             :whole-hand-up-dot {} :pinch-distance-m {} :pinch-source :{} :shift-layer-dot {} \
             :dial-create {} :dial-rotate {} :dial-translate {} :dial-scale {} :gear-radius-m {} \
             :hold-threshold-ms {} :debounce :{} :debounce-frames {} :debounce-drag-multiplier {} \
             :min-confidence {} :smoothing {} :skeletal {} :touch {})",
            c.index_curl_m,
            c.middle_curl_m,
            c.ring_curl_m,
            c.pinky_curl_m,
            c.thumb_out_m,
            c.finger_split_dot,
            c.pointing_up_dot,
            c.palm_flat_dot,
            c.palm_level_distance,
            c.whole_hand_up_dot,
            c.pinch_distance_m,
            c.pinch_source.as_str(),
            self.shift_layer_dot,
            self.dial.create,
            self.dial.rotate,
            self.dial.translate,
            self.dial.scale,
            self.gear_radius_m,
            self.hold_threshold_ms,
            self.debounce.as_str(),
            frames,
            multiplier,
            self.sampler.min_confidence,
            self.sampler.smoothing,
            bool_sexp(self.skeletal_enabled),
            bool_sexp(self.touch_enabled),
        )
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = GestureConfig::default();
        assert_eq!(cfg.classifier.index_curl_m, 0.11);
        assert_eq!(cfg.classifier.ring_curl_m, 0.08);
        assert_eq!(cfg.classifier.thumb_out_m, 0.05);
        assert_eq!(cfg.shift_layer_dot, 0.75);
        assert_eq!(cfg.gear_radius_m, 0.03);
        assert_eq!(cfg.hold_threshold_ms, 500.0);
        assert_eq!(cfg.debounce, DebouncePolicy::Immediate);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_empty_plist_is_default() {
        assert_eq!(GestureConfig::from_sexp("()").unwrap(), GestureConfig::default());
    }

    #[test]
    fn test_parse_overrides() {
        let cfg = GestureConfig::from_sexp(
            "(:index-curl-m 0.12 :pinch-source :geometric :debounce :sustained \
             :debounce-frames 3 :touch nil :dial-scale -0.8)",
        )
        .unwrap();
        assert_eq!(cfg.classifier.index_curl_m, 0.12);
        assert_eq!(cfg.classifier.pinch_source, PinchSource::Geometric);
        assert_eq!(
            cfg.debounce,
            DebouncePolicy::Sustained {
                frames: 3,
                drag_multiplier: 2
            }
        );
        assert!(!cfg.touch_enabled);
        assert_eq!(cfg.dial.scale, -0.8);
    }

    #[test]
    fn test_unknown_key_rejected() {
        match GestureConfig::from_sexp("(:pinch-threshold 0.02)") {
            Err(Error::UnknownKey(k)) => assert_eq!(k, "pinch-threshold"),
            other => panic!("expected unknown key, got {:?}", other),
        }
    }

    #[test]
    fn test_dangling_key_rejected() {
        assert!(matches!(
            GestureConfig::from_sexp("(:gear-radius-m 0.03 :smoothing)"),
            Err(Error::ConfigParse(_))
        ));
    }

    #[test]
    fn test_wrong_type_rejected() {
        assert!(matches!(
            GestureConfig::from_sexp("(:gear-radius-m \"far\")"),
            Err(Error::InvalidValue { .. })
        ));
        assert!(matches!(
            GestureConfig::from_sexp("(:debounce-frames 2.5 :debounce :sustained)"),
            Err(Error::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_errors_name_the_kind_of_value() {
        match GestureConfig::from_sexp("(:shift-layer-dot near)") {
            Err(Error::InvalidValue { key, reason }) => {
                assert_eq!(key, "shift-layer-dot");
                assert!(reason.contains("unitless ratio"));
            }
            other => panic!("expected invalid value, got {:?}", other),
        }
        match GestureConfig::from_sexp("(:thumb-out-m near)") {
            Err(Error::InvalidValue { reason, .. }) => assert!(reason.contains("meters")),
            other => panic!("expected invalid value, got {:?}", other),
        }
    }

    #[test]
    fn test_debounce_frames_imply_sustained() {
        let cfg = GestureConfig::from_sexp("(:debounce-frames 3)").unwrap();
        assert_eq!(
            cfg.debounce,
            DebouncePolicy::Sustained {
                frames: 3,
                drag_multiplier: DebouncePolicy::DEFAULT_DRAG_MULTIPLIER
            }
        );
        let cfg = GestureConfig::from_sexp("(:debounce :immediate :debounce-frames 3)").unwrap();
        assert_eq!(cfg.debounce, DebouncePolicy::Immediate);
        // Key order does not matter.
        let cfg = GestureConfig::from_sexp("(:debounce-frames 3 :debounce :immediate)").unwrap();
        assert_eq!(cfg.debounce, DebouncePolicy::Immediate);
    }

    #[test]
    fn test_immediate_config_reparses() {
        let cfg = GestureConfig::default();
        assert_eq!(GestureConfig::from_sexp(&cfg.config_sexp()).unwrap(), cfg);
    }

    #[test]
    fn test_validate_ranges() {
        let mut cfg = GestureConfig::default();
        cfg.gear_radius_m = 0.0;
        assert!(cfg.validate().is_err());

        let mut cfg = GestureConfig::default();
        cfg.dial.rotate = 0.9;
        assert!(cfg.validate().is_err());

        let mut cfg = GestureConfig::default();
        cfg.debounce = DebouncePolicy::Sustained {
            frames: 0,
            drag_multiplier: 2,
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_no_sources_is_wiring_fault() {
        assert!(matches!(
            GestureConfig::from_sexp("(:skeletal nil :touch nil)"),
            Err(Error::Wiring(_))
        ));
    }

    #[test]
    fn test_config_sexp_reparses() {
        let mut cfg = GestureConfig::default();
        cfg.debounce = DebouncePolicy::sustained();
        cfg.classifier.pinch_source = PinchSource::Geometric;
        let text = cfg.config_sexp();
        assert!(text.contains(":thumb-out-m 0.05"));
        assert!(text.contains(":debounce :sustained"));
        assert_eq!(GestureConfig::from_sexp(&text).unwrap(), cfg);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "(:hold-threshold-ms 750 :smoothing 0.2)").unwrap();
        let cfg = GestureConfig::load(file.path()).unwrap();
        assert_eq!(cfg.hold_threshold_ms, 750.0);
        assert_eq!(cfg.sampler.smoothing, 0.2);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.sexp");
        assert!(matches!(
            GestureConfig::load(&missing),
            Err(Error::Io { .. })
        ));
    }
}
