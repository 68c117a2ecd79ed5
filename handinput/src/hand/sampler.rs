//! Pose sampler: turns raw runtime hand data into normalized samples.
//!
//! The runtime hands over a joint map per hand plus optional pinch
//! flags, touch bits and controller pose.  The sampler checks at
//! construction that the device reports every joint the classifiers
//! read, then each frame gates on confidence, fills a fixed joint array
//! and optionally smooths positions against the previous frame.

use std::collections::HashMap;

use tracing::{debug, info};

use super::skeleton::{
    lerp3, ControllerPose, FrameInput, Hand, HandFrame, HandJoint, HandSample, TouchBits, Vec3,
};
use crate::error::{Error, Result};

// ── Config ─────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct SamplerConfig {
    /// Minimum confidence (0.0-1.0) for a hand to count as tracked.
    pub min_confidence: f32,
    /// Smoothing factor (0.0 = no smoothing, below 1.0).
    pub smoothing: f32,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            min_confidence: 0.5,
            smoothing: 0.0,
        }
    }
}

impl SamplerConfig {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.min_confidence) {
            return Err(Error::invalid("min-confidence", "must be within 0.0-1.0"));
        }
        if !(0.0..1.0).contains(&self.smoothing) {
            return Err(Error::invalid("smoothing", "must be within 0.0 and below 1.0"));
        }
        Ok(())
    }
}

// ── Raw input ──────────────────────────────────────────────

/// One hand as reported by the tracking runtime.
#[derive(Debug, Clone, PartialEq)]
pub struct RawHand {
    pub tracked: bool,
    pub confidence: f32,
    pub joints: HashMap<HandJoint, Vec3>,
    pub index_pinching: Option<bool>,
    pub middle_pinching: Option<bool>,
    pub pointer_forward: Option<Vec3>,
    pub touch: Option<TouchBits>,
    pub controller: Option<ControllerPose>,
}

impl Default for RawHand {
    fn default() -> Self {
        Self {
            tracked: false,
            confidence: 1.0,
            joints: HashMap::new(),
            index_pinching: None,
            middle_pinching: None,
            pointer_forward: None,
            touch: None,
            controller: None,
        }
    }
}

/// One frame of raw runtime data.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawFrame {
    pub time_ms: f64,
    pub left: RawHand,
    pub right: RawHand,
}

impl RawFrame {
    pub fn hand(&self, hand: Hand) -> &RawHand {
        match hand {
            Hand::Left => &self.left,
            Hand::Right => &self.right,
        }
    }

    pub fn hand_mut(&mut self, hand: Hand) -> &mut RawHand {
        match hand {
            Hand::Left => &mut self.left,
            Hand::Right => &mut self.right,
        }
    }
}

// ── Sampler ────────────────────────────────────────────────

#[derive(Debug)]
pub struct PoseSampler {
    pub config: SamplerConfig,
    /// Last tracked sample per hand, for smoothing.
    previous: [Option<HandSample>; 2],
}

impl PoseSampler {
    /// Build a sampler for a device reporting `device_joints`.
    ///
    /// Fails if the device cannot supply a joint the classifiers need.
    pub fn new(config: SamplerConfig, device_joints: &[HandJoint]) -> Result<Self> {
        config.validate()?;
        if let Some(missing) = HandJoint::ALL
            .iter()
            .find(|j| !device_joints.contains(j))
        {
            return Err(Error::MissingJoint(missing.as_str()));
        }
        info!(
            "pose sampler ready: min-confidence {:.2}, smoothing {:.2}",
            config.min_confidence, config.smoothing
        );
        Ok(Self {
            config,
            previous: [None, None],
        })
    }

    /// Normalize both hands of a raw frame.
    pub fn sample(&mut self, raw: &RawFrame) -> FrameInput {
        FrameInput {
            time_ms: raw.time_ms,
            left: self.sample_frame(Hand::Left, &raw.left),
            right: self.sample_frame(Hand::Right, &raw.right),
        }
    }

    fn sample_frame(&mut self, hand: Hand, raw: &RawHand) -> HandFrame {
        HandFrame {
            skeleton: Some(self.sample_hand(hand, raw)),
            touch: raw.touch,
            controller: raw.controller,
        }
    }

    /// Normalize one hand.  Missing or low-confidence data is untracked.
    pub fn sample_hand(&mut self, hand: Hand, raw: &RawHand) -> HandSample {
        let slot = hand.index();
        if !raw.tracked || raw.confidence < self.config.min_confidence {
            self.previous[slot] = None;
            return HandSample::untracked(hand);
        }

        let mut sample = HandSample::untracked(hand);
        for joint in HandJoint::ALL {
            match raw.joints.get(&joint) {
                Some(pos) => sample.set_joint(joint, *pos),
                None => {
                    debug!("{} hand frame missing joint {}", hand.as_str(), joint.as_str());
                    self.previous[slot] = None;
                    return HandSample::untracked(hand);
                }
            }
        }
        sample.tracked = true;
        sample.index_pinching = raw.index_pinching;
        sample.middle_pinching = raw.middle_pinching;
        sample.pointer_forward = raw.pointer_forward;

        let alpha = self.config.smoothing;
        if alpha > 0.0 {
            if let Some(prev) = &self.previous[slot] {
                for joint in HandJoint::ALL {
                    let smoothed = lerp3(prev.joint(joint), sample.joint(joint), 1.0 - alpha);
                    sample.set_joint(joint, smoothed);
                }
            }
        }

        self.previous[slot] = Some(sample.clone());
        sample
    }

    /// Forget smoothing history for both hands.
    pub fn reset(&mut self) {
        self.previous = [None, None];
    }
}

#[cfg(test)]
fn make_raw_hand() -> RawHand {
    let mut raw = RawHand {
        tracked: true,
        ..RawHand::default()
    };
    for (i, joint) in HandJoint::ALL.iter().enumerate() {
        raw.joints.insert(*joint, [i as f32, 0.0, 0.0]);
    }
    raw
}
