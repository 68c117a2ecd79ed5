//! Frame-script replay.
//!
//! A script is a sequence of recorded frames, one s-expression each:
//!
//! ```text
//! (:frame :time 0 :right (:tracked t :joints ((wrist-root 0 0 0) ...)))
//! (:frame :time 11 :left (:touch (:pointer nil :thumb nil :middle t)
//!                         :controller (:position (0 1 0) :up (0 1 0)
//!                                      :right (1 0 0) :forward (0 0 1))))
//! ```
//!
//! A hand that is omitted from a frame is untracked with no controller.

use std::collections::HashMap;
use std::path::Path;

use lexpr::Value;

use crate::error::{Error, Result};
use crate::hand::sampler::{RawFrame, RawHand};
use crate::hand::skeleton::{ControllerPose, HandJoint, TouchBits, Vec3};
use crate::sexp::{as_number, get_value, key_name, list_items, parse_vec3, scalar_string};

fn script_error(index: usize, details: impl Into<String>) -> Error {
    Error::Script {
        index,
        details: details.into(),
    }
}

/// Parse every frame in `text`, in order.
pub fn parse_script(text: &str) -> Result<Vec<RawFrame>> {
    let wrapped = format!("(\n{}\n)", text);
    let value = lexpr::from_str(&wrapped).map_err(|e| script_error(0, e.to_string()))?;
    list_items(&value)
        .into_iter()
        .enumerate()
        .map(|(index, frame)| parse_frame(index, frame))
        .collect()
}

pub fn load_script(path: &Path) -> Result<Vec<RawFrame>> {
    let text = std::fs::read_to_string(path).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_script(&text)
}

fn parse_frame(index: usize, value: &Value) -> Result<RawFrame> {
    let items = list_items(value);
    match items.first().and_then(|v| key_name(v)) {
        Some("frame") => {}
        _ => return Err(script_error(index, "expected (:frame ...)")),
    }
    let body = match value {
        Value::Cons(pair) => pair.cdr(),
        _ => return Err(script_error(index, "expected (:frame ...)")),
    };

    let time_ms = match get_value(body, "time") {
        Some(v) => as_number(v).ok_or_else(|| script_error(index, ":time must be a number"))?,
        None => return Err(script_error(index, "missing :time")),
    };
    let mut frame = RawFrame {
        time_ms,
        ..RawFrame::default()
    };
    if let Some(v) = get_value(body, "left") {
        frame.left = parse_hand(index, v)?;
    }
    if let Some(v) = get_value(body, "right") {
        frame.right = parse_hand(index, v)?;
    }
    Ok(frame)
}

fn flag(index: usize, key: &str, v: &Value) -> Result<bool> {
    match scalar_string(v).as_str() {
        "t" => Ok(true),
        "nil" => Ok(false),
        other => Err(script_error(index, format!(":{} expects t or nil, got {}", key, other))),
    }
}

fn vec3(index: usize, key: &str, v: &Value) -> Result<Vec3> {
    parse_vec3(v).ok_or_else(|| script_error(index, format!(":{} expects (x y z)", key)))
}

fn parse_hand(index: usize, value: &Value) -> Result<RawHand> {
    let mut hand = RawHand::default();
    if let Some(v) = get_value(value, "tracked") {
        hand.tracked = flag(index, "tracked", v)?;
    }
    if let Some(v) = get_value(value, "confidence") {
        hand.confidence = as_number(v)
            .ok_or_else(|| script_error(index, ":confidence must be a number"))?
            as f32;
    }
    if let Some(v) = get_value(value, "joints") {
        hand.joints = parse_joints(index, v)?;
    }
    if let Some(v) = get_value(value, "pinch-index") {
        hand.index_pinching = Some(flag(index, "pinch-index", v)?);
    }
    if let Some(v) = get_value(value, "pinch-middle") {
        hand.middle_pinching = Some(flag(index, "pinch-middle", v)?);
    }
    if let Some(v) = get_value(value, "pointer-forward") {
        hand.pointer_forward = Some(vec3(index, "pointer-forward", v)?);
    }
    if let Some(v) = get_value(value, "touch") {
        let mut bits = TouchBits::NONE;
        for (key, slot) in [
            ("pointer", &mut bits.pointer),
            ("thumb", &mut bits.thumb),
            ("middle", &mut bits.middle),
        ] {
            if let Some(b) = get_value(v, key) {
                *slot = flag(index, key, b)?;
            }
        }
        hand.touch = Some(bits);
    }
    if let Some(v) = get_value(value, "controller") {
        let mut pose = ControllerPose::default();
        for (key, slot) in [
            ("position", &mut pose.position),
            ("up", &mut pose.up),
            ("right", &mut pose.right),
            ("forward", &mut pose.forward),
        ] {
            if let Some(axis) = get_value(v, key) {
                *slot = vec3(index, key, axis)?;
            }
        }
        hand.controller = Some(pose);
    }
    Ok(hand)
}

fn parse_joints(index: usize, value: &Value) -> Result<HashMap<HandJoint, Vec3>> {
    let mut joints = HashMap::new();
    for entry in list_items(value) {
        let items = list_items(entry);
        let name = items
            .first()
            .map(|v| scalar_string(v))
            .ok_or_else(|| script_error(index, "empty joint entry"))?;
        let joint = HandJoint::from_str(&name)
            .ok_or_else(|| script_error(index, format!("unknown joint {}", name)))?;
        let coords: Vec<f64> = items[1..].iter().filter_map(|v| as_number(v)).collect();
        match coords.as_slice() {
            [x, y, z] if items.len() == 4 => {
                joints.insert(joint, [*x as f32, *y as f32, *z as f32]);
            }
            _ => {
                return Err(script_error(
                    index,
                    format!("joint {} expects three coordinates", name),
                ))
            }
        }
    }
    Ok(joints)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_parse_touch_frame() {
        let frames = parse_script(
            "(:frame :time 16.5 :left (:touch (:pointer nil :thumb t :middle t) \
             :controller (:position (0 1.2 0.3) :forward (0 0 -1))))",
        )
        .unwrap();
        assert_eq!(frames.len(), 1);
        let f = &frames[0];
        assert_eq!(f.time_ms, 16.5);
        assert_eq!(f.left.touch, Some(TouchBits::new(false, true, true)));
        let pose = f.left.controller.unwrap();
        assert_eq!(pose.position, [0.0, 1.2, 0.3]);
        assert_eq!(pose.forward, [0.0, 0.0, -1.0]);
        assert_eq!(pose.up, [0.0, 1.0, 0.0]);
        assert!(!f.right.tracked);
        assert!(f.right.touch.is_none());
    }

    #[test]
    fn test_parse_skeletal_frame() {
        let frames = parse_script(
            "(:frame :time 0 :right (:tracked t :confidence 0.9 :pinch-middle t \
             :joints ((wrist-root 0 0 0) (thumb-tip -0.07 0 0.06))))\n\
             (:frame :time 11)",
        )
        .unwrap();
        assert_eq!(frames.len(), 2);
        let right = &frames[0].right;
        assert!(right.tracked);
        assert_eq!(right.confidence, 0.9);
        assert_eq!(right.middle_pinching, Some(true));
        assert_eq!(right.index_pinching, None);
        assert_eq!(right.joints.get(&HandJoint::ThumbTip), Some(&[-0.07, 0.0, 0.06]));
        assert_eq!(frames[1].time_ms, 11.0);
    }

    #[test]
    fn test_empty_script() {
        assert!(parse_script("").unwrap().is_empty());
    }

    #[test]
    fn test_unknown_joint_reports_frame() {
        let err = parse_script(
            "(:frame :time 0)\n(:frame :time 5 :left (:joints ((elbow 0 0 0))))",
        )
        .unwrap_err();
        match err {
            Error::Script { index, details } => {
                assert_eq!(index, 1);
                assert!(details.contains("elbow"));
            }
            other => panic!("expected script error, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_time_rejected() {
        assert!(matches!(
            parse_script("(:frame :left (:tracked nil))"),
            Err(Error::Script { index: 0, .. })
        ));
    }

    #[test]
    fn test_not_a_frame_rejected() {
        assert!(parse_script("(:config :time 0)").is_err());
    }

    #[test]
    fn test_short_joint_rejected() {
        assert!(parse_script("(:frame :time 0 :right (:joints ((wrist-root 0 0))))").is_err());
    }

    #[test]
    fn test_load_script_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "(:frame :time 0)").unwrap();
        writeln!(file, "(:frame :time 11)").unwrap();
        let frames = load_script(file.path()).unwrap();
        assert_eq!(frames.len(), 2);
    }
}
