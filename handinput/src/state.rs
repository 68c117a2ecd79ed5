//! Hand-input system state: the single struct owning every per-hand
//! pipeline.
//!
//! One `HandInputSystem` owns the sampler, classifier, both hands'
//! state machines, the timed-task scheduler and the event bus.  `step`
//! runs the fixed per-frame order: each hand (right, then left) is
//! classified, committed, broadcast and fanned out to its consumers
//! before the next hand starts; due tasks fire at the end of the frame.

use std::collections::VecDeque;

use tracing::{debug, info};

use crate::config::GestureConfig;
use crate::error::Result;
use crate::events::{EventBus, HandEvent, Subscriber, SubscriptionId};
use crate::hand::classifier::PoseClassifier;
use crate::hand::gesture::{GestureState, HandGestureMachine, TransitionContext};
use crate::hand::sampler::{PoseSampler, RawFrame};
use crate::hand::shift_layer::{RotationState, ShiftLayer};
use crate::hand::skeleton::{
    dot, lerp3, Finger, FrameInput, Hand, HandFrame, HandJoint, TouchBits, Vec3, WORLD_UP,
};
use crate::hand::timers::{FrameClock, TaskKind, TaskScheduler, TimerTask, Wake};
use crate::hand::touch::{classify_touch, classify_touch_edges, HeldLongFlags, TouchTracker};
use crate::sexp::bool_sexp;
use crate::tools::gear::ToolSet;
use crate::tools::mode_dial::{ModeDial, TransformMode};
use crate::tools::selection::SelectionSet;

/// Upper bound on task-firing passes per frame.  Fired tasks can
/// schedule same-frame follow-ups (a mode change queues its reset).
const MAX_TASK_PASSES: usize = 4;

/// Blend factor for the skeletal anchor point.  Each frame moves the
/// anchor halfway toward the new thumb tip.
const POSITION_DAMPING: f32 = 0.5;

// ── Input source ───────────────────────────────────────────

/// Which source drove a hand on the last frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputSource {
    Skeletal,
    Touch,
    /// Neither source had data.  The hand degrades to Neutral.
    #[default]
    Absent,
}

impl InputSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Skeletal => "skeletal",
            Self::Touch => "touch",
            Self::Absent => "absent",
        }
    }
}

// ── Per-hand pipeline ──────────────────────────────────────

#[derive(Debug)]
struct HandPipeline {
    machine: HandGestureMachine,
    touch: TouchTracker,
    shift: ShiftLayer,
    dial: ModeDial,
    tools: ToolSet,
    source: InputSource,
    /// Text entry has focus.
    text_entry_active: bool,
    /// Hand is inside the focused text field's bounds.
    text_in_bounds: bool,
    /// Damped thumb tip, or controller position, on the current frame.
    position: Option<Vec3>,
}

impl HandPipeline {
    fn new(hand: Hand, config: &GestureConfig) -> Self {
        Self {
            machine: HandGestureMachine::new(hand),
            touch: TouchTracker::new(hand),
            shift: ShiftLayer::new(hand),
            dial: ModeDial::new(hand, config.dial.clone()),
            tools: ToolSet::new(hand, config.gear_radius_m),
            source: InputSource::Absent,
            text_entry_active: false,
            text_in_bounds: false,
            position: None,
        }
    }

    fn transition_context(&self) -> TransitionContext {
        let mode = self.dial.current();
        TransitionContext {
            tool_mode: mode,
            text_drag_lock: mode == TransformMode::Text
                && self.text_entry_active
                && self.text_in_bounds,
        }
    }

    /// Shift layer, dial tilt and gear checks for the current frame.
    fn track(
        &mut self,
        frame: &HandFrame,
        classifier: &PoseClassifier,
        config: &GestureConfig,
    ) -> Vec<HandEvent> {
        let mut events = Vec::new();
        let dragging = self.machine.current() == GestureState::DragSelection;
        match self.source {
            InputSource::Skeletal => {
                if let Some(sample) = frame.skeleton.as_ref() {
                    if dragging {
                        events.extend(self.shift.update_skeletal(
                            sample,
                            classifier,
                            config.shift_layer_dot,
                        ));
                    }
                    events.extend(self.dial.update(dot(WORLD_UP, sample.palm_normal())));
                }
            }
            InputSource::Touch => {
                if let Some(pose) = frame.controller.as_ref() {
                    if dragging {
                        events.extend(self.shift.update_controller(
                            pose,
                            self.touch.bits().middle,
                            config.shift_layer_dot,
                        ));
                    }
                    events.extend(self.dial.update(dot(WORLD_UP, pose.up)));
                }
            }
            InputSource::Absent => {}
        }
        events.extend(self.tools.update(self.position));
        events
    }

    fn status_sexp(&self) -> String {
        format!(
            "(:source :{} :gesture {} :rotation :{} :mode :{} :dial-open {} :held-long {})",
            self.source.as_str(),
            self.machine.status_sexp(),
            self.shift.state().as_str(),
            self.dial.current().as_str(),
            bool_sexp(self.dial.is_open()),
            self.touch.held_long().to_sexp(),
        )
    }
}

// ── Builder ────────────────────────────────────────────────

/// Validates configuration and wiring before any frame is processed.
pub struct HandInputSystemBuilder {
    config: GestureConfig,
    device_joints: Vec<HandJoint>,
    subscribers: Vec<Subscriber>,
}

impl Default for HandInputSystemBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl HandInputSystemBuilder {
    pub fn new() -> Self {
        Self {
            config: GestureConfig::default(),
            device_joints: HandJoint::ALL.to_vec(),
            subscribers: Vec::new(),
        }
    }

    pub fn with_config(mut self, config: GestureConfig) -> Self {
        self.config = config;
        self
    }

    /// Joints the tracking device reports.  Defaults to the full set.
    pub fn device_joints(mut self, joints: &[HandJoint]) -> Self {
        self.device_joints = joints.to_vec();
        self
    }

    /// Subscriber registered before the first frame.
    pub fn subscribe(mut self, subscriber: impl FnMut(&HandEvent) + 'static) -> Self {
        self.subscribers.push(Box::new(subscriber));
        self
    }

    pub fn build(self) -> Result<HandInputSystem> {
        self.config.validate()?;
        let sampler = PoseSampler::new(self.config.sampler.clone(), &self.device_joints)?;
        let mut bus = EventBus::new();
        for subscriber in self.subscribers {
            bus.subscribe(subscriber);
        }
        info!(
            "hand input ready: skeletal {}, touch {}, debounce {}",
            bool_sexp(self.config.skeletal_enabled),
            bool_sexp(self.config.touch_enabled),
            self.config.debounce.as_str()
        );
        Ok(HandInputSystem {
            classifier: PoseClassifier::new(self.config.classifier.clone()),
            left: HandPipeline::new(Hand::Left, &self.config),
            right: HandPipeline::new(Hand::Right, &self.config),
            config: self.config,
            sampler,
            scheduler: TaskScheduler::new(),
            clock: FrameClock::default(),
            selection: SelectionSet::new(),
            bus,
            enabled: true,
        })
    }
}

// ── System ─────────────────────────────────────────────────

#[derive(Debug)]
pub struct HandInputSystem {
    config: GestureConfig,
    sampler: PoseSampler,
    classifier: PoseClassifier,
    left: HandPipeline,
    right: HandPipeline,
    scheduler: TaskScheduler,
    clock: FrameClock,
    selection: SelectionSet,
    bus: EventBus,
    enabled: bool,
}

impl HandInputSystem {
    pub fn builder() -> HandInputSystemBuilder {
        HandInputSystemBuilder::new()
    }

    fn pipeline(&self, hand: Hand) -> &HandPipeline {
        match hand {
            Hand::Left => &self.left,
            Hand::Right => &self.right,
        }
    }

    fn pipeline_mut(&mut self, hand: Hand) -> &mut HandPipeline {
        match hand {
            Hand::Left => &mut self.left,
            Hand::Right => &mut self.right,
        }
    }

    // ── Frame loop ─────────────────────────────────────────

    /// Sample a raw runtime frame, then step it.
    pub fn step_raw(&mut self, raw: &RawFrame) -> Vec<HandEvent> {
        if !self.enabled {
            return Vec::new();
        }
        let input = self.sampler.sample(raw);
        self.step(&input)
    }

    /// Process one frame.  Returns every event emitted, in broadcast order.
    pub fn step(&mut self, input: &FrameInput) -> Vec<HandEvent> {
        let mut out = Vec::new();
        if !self.enabled {
            return out;
        }
        self.clock.advance(input.time_ms);
        for hand in Hand::ALL {
            self.process_hand(hand, input.hand(hand), &mut out);
        }
        self.poll_tasks(&mut out);
        out
    }

    fn select_source(&self, frame: &HandFrame) -> InputSource {
        let tracked = frame.skeleton.as_ref().is_some_and(|s| s.tracked);
        if self.config.skeletal_enabled && tracked {
            InputSource::Skeletal
        } else if self.config.touch_enabled && frame.touch.is_some() {
            InputSource::Touch
        } else {
            InputSource::Absent
        }
    }

    fn process_hand(&mut self, hand: Hand, frame: &HandFrame, out: &mut Vec<HandEvent>) {
        let source = self.select_source(frame);
        let p = self.pipeline_mut(hand);
        let entered = p.source != source;
        if entered {
            info!(
                "{} hand input source {} -> {}",
                hand.as_str(),
                p.source.as_str(),
                source.as_str()
            );
            p.source = source;
        }
        p.position = match source {
            InputSource::Skeletal => frame.skeleton.as_ref().map(|s| {
                let tip = s.joint(HandJoint::ThumbTip);
                match p.position {
                    Some(last) if !entered => lerp3(last, tip, POSITION_DAMPING),
                    _ => tip,
                }
            }),
            InputSource::Touch => frame.controller.map(|c| c.position),
            InputSource::Absent => None,
        };

        let held = p.touch.bits();
        let bits = match source {
            InputSource::Touch => frame.touch.unwrap_or(TouchBits::NONE),
            _ => TouchBits::NONE,
        };
        self.update_touch(hand, bits);

        let transitions = match source {
            InputSource::Skeletal => match frame.skeleton.as_ref() {
                Some(sample) => {
                    let raw = self.classifier.classify(sample);
                    let p = self.pipeline_mut(hand);
                    let ctx = p.transition_context();
                    p.machine.apply(raw, ctx)
                }
                None => Vec::new(),
            },
            InputSource::Touch => {
                let p = self.pipeline_mut(hand);
                let current = p.machine.current();
                let mut outcomes = classify_touch_edges(held, bits, current);
                if entered && outcomes.is_empty() {
                    // The state came from another source; resync once.
                    outcomes.push(classify_touch(bits, current));
                }
                let mut events = Vec::new();
                for outcome in outcomes {
                    if outcome.selection_started {
                        if let Some(pose) = frame.controller.as_ref() {
                            p.shift.mark_selection_start(pose.forward);
                        }
                    }
                    if let Some(state) = outcome.state {
                        events.extend(p.machine.commit_external(state));
                    }
                }
                events
            }
            InputSource::Absent => {
                let p = self.pipeline_mut(hand);
                let ctx = p.transition_context();
                p.machine.apply(GestureState::Neutral, ctx)
            }
        };
        self.emit_gestures(hand, transitions, out);

        let p = match hand {
            Hand::Left => &mut self.left,
            Hand::Right => &mut self.right,
        };
        let continuous = p.track(frame, &self.classifier, &self.config);
        for event in continuous {
            self.dispatch(event, out);
        }
    }

    /// Press edges start hold watches; release edges cancel them.
    fn update_touch(&mut self, hand: Hand, bits: TouchBits) {
        let now = self.clock.time_ms;
        let threshold_ms = self.config.hold_threshold_ms;
        let p = match hand {
            Hand::Left => &mut self.left,
            Hand::Right => &mut self.right,
        };
        let edges = p.touch.update(bits);
        for finger in edges.released {
            if let Some(task) = p.touch.release(finger) {
                self.scheduler.cancel(task);
            }
        }
        for finger in edges.pressed {
            let task = self.scheduler.schedule(
                TaskKind::HoldThreshold { hand, finger },
                Wake::AfterMs {
                    start_ms: now,
                    threshold_ms,
                },
            );
            p.touch.watch(finger, task);
        }
    }

    /// Route machine output through the debounce policy.
    fn emit_gestures(&mut self, hand: Hand, events: Vec<HandEvent>, out: &mut Vec<HandEvent>) {
        for event in events {
            if let HandEvent::GestureStateChanged {
                current, previous, ..
            } = event
            {
                if let Some(frames) = self.config.debounce.hold_frames(current) {
                    self.scheduler.schedule(
                        TaskKind::Debounce {
                            hand,
                            state: current,
                            previous,
                        },
                        Wake::AtFrame(self.clock.frame + frames),
                    );
                    continue;
                }
            }
            self.dispatch(event, out);
        }
    }

    /// Broadcast an event and everything its consumers emit in turn.
    fn dispatch(&mut self, event: HandEvent, out: &mut Vec<HandEvent>) {
        let mut queue = VecDeque::from([event]);
        while let Some(event) = queue.pop_front() {
            self.bus.publish(&event);
            let follow_ups = self.route(&event);
            out.push(event);
            queue.extend(follow_ups);
        }
    }

    /// Internal consumers of a broadcast event.
    fn route(&mut self, event: &HandEvent) -> Vec<HandEvent> {
        match *event {
            HandEvent::GestureStateChanged {
                hand,
                current,
                previous,
            } => {
                let p = self.pipeline_mut(hand);
                let mut follow_ups = p.dial.on_gesture(current);
                let mode = p.dial.current();
                let position = p.position;
                follow_ups.extend(p.tools.on_gesture(mode, current, previous, position));
                if current == GestureState::DeselectAll {
                    let count = self.selection.clear_all();
                    follow_ups.push(HandEvent::SelectionCleared { hand, count });
                }
                follow_ups
            }
            HandEvent::TransformModeChanged { hand, current, .. } => {
                let reset = TaskKind::ModeChangeReset { hand };
                self.scheduler.cancel_where(|t| t.kind == reset);
                self.scheduler.schedule(reset, Wake::AtFrame(self.clock.frame));
                self.pipeline_mut(hand).tools.on_mode_change(current)
            }
            HandEvent::ToolDragChanged { active, .. } => {
                if active {
                    self.selection.begin_transformation();
                } else {
                    self.selection.complete_transformation();
                }
                Vec::new()
            }
            _ => Vec::new(),
        }
    }

    // ── Timed tasks ────────────────────────────────────────

    fn poll_tasks(&mut self, out: &mut Vec<HandEvent>) {
        let mut current = [GestureState::Neutral; 2];
        let mut pressed = [TouchBits::NONE; 2];
        for hand in Hand::ALL {
            let p = self.pipeline(hand);
            current[hand.index()] = p.machine.current();
            pressed[hand.index()] = p.touch.bits();
        }
        let stale = self.scheduler.cancel_where(|t| match t.kind {
            TaskKind::Debounce { hand, state, .. } => current[hand.index()] != state,
            TaskKind::HoldThreshold { hand, finger } => !pressed[hand.index()].get(finger),
            TaskKind::ModeChangeReset { .. } => false,
        });
        if stale > 0 {
            debug!("cancelled {} stale tasks", stale);
        }

        for _ in 0..MAX_TASK_PASSES {
            let due = self.scheduler.take_due(self.clock);
            if due.is_empty() {
                break;
            }
            for task in due {
                self.fire(task, out);
            }
        }
    }

    fn fire(&mut self, task: TimerTask, out: &mut Vec<HandEvent>) {
        debug!("{} task {:?} fired", task.kind.as_str(), task.id);
        match task.kind {
            TaskKind::HoldThreshold { hand, finger } => {
                if self.pipeline_mut(hand).touch.mark_held(finger) {
                    self.dispatch(HandEvent::HoldThresholdExceeded { hand, finger }, out);
                }
            }
            TaskKind::Debounce {
                hand,
                state,
                previous,
            } => self.dispatch(
                HandEvent::GestureStateChanged {
                    hand,
                    current: state,
                    previous,
                },
                out,
            ),
            TaskKind::ModeChangeReset { hand } => {
                let events = self.pipeline_mut(hand).machine.reset_for_mode_change();
                self.emit_gestures(hand, events, out);
            }
        }
    }

    // ── Host controls ──────────────────────────────────────

    /// Report text-entry focus for `hand`.  With the Text mode active,
    /// focus inside the field's bounds blocks the drag-lock toggle-off.
    pub fn set_text_entry(&mut self, hand: Hand, active: bool, in_bounds: bool) {
        let p = self.pipeline_mut(hand);
        p.text_entry_active = active;
        p.text_in_bounds = in_bounds;
    }

    /// Set a hand's tool mode directly, bypassing the dial.  The
    /// mode-change reset runs at the end of the next frame.
    pub fn set_transform_mode(&mut self, hand: Hand, mode: TransformMode) -> Vec<HandEvent> {
        let mut out = Vec::new();
        if let Some(event) = self.pipeline_mut(hand).dial.commit(mode) {
            self.dispatch(event, &mut out);
        }
        out
    }

    /// Stop processing and cancel every in-flight timed task.
    pub fn disable(&mut self) {
        if !self.enabled {
            return;
        }
        self.enabled = false;
        let cancelled = self.scheduler.cancel_all();
        for hand in Hand::ALL {
            self.pipeline_mut(hand).touch.reset();
        }
        info!("hand input disabled ({} tasks cancelled)", cancelled);
    }

    pub fn enable(&mut self) {
        if self.enabled {
            return;
        }
        self.enabled = true;
        self.sampler.reset();
        info!("hand input enabled");
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn subscribe(&mut self, subscriber: impl FnMut(&HandEvent) + 'static) -> SubscriptionId {
        self.bus.subscribe(subscriber)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.bus.unsubscribe(id)
    }

    // ── Accessors ──────────────────────────────────────────

    pub fn config(&self) -> &GestureConfig {
        &self.config
    }

    pub fn frame(&self) -> u64 {
        self.clock.frame
    }

    pub fn gesture_state(&self, hand: Hand) -> GestureState {
        self.pipeline(hand).machine.current()
    }

    pub fn previous_state(&self, hand: Hand) -> GestureState {
        self.pipeline(hand).machine.previous()
    }

    pub fn drag_lock(&self, hand: Hand) -> bool {
        self.pipeline(hand).machine.drag_lock()
    }

    pub fn mode_active(&self, hand: Hand) -> bool {
        self.pipeline(hand).machine.mode_active()
    }

    pub fn rotation_state(&self, hand: Hand) -> RotationState {
        self.pipeline(hand).shift.state()
    }

    pub fn transform_mode(&self, hand: Hand) -> TransformMode {
        self.pipeline(hand).dial.current()
    }

    pub fn dial_open(&self, hand: Hand) -> bool {
        self.pipeline(hand).dial.is_open()
    }

    pub fn held_long(&self, hand: Hand) -> HeldLongFlags {
        self.pipeline(hand).touch.held_long()
    }

    pub fn is_held_long(&self, hand: Hand, finger: Finger) -> bool {
        self.held_long(hand).get(finger)
    }

    pub fn source(&self, hand: Hand) -> InputSource {
        self.pipeline(hand).source
    }

    pub fn selection(&self) -> &SelectionSet {
        &self.selection
    }

    pub fn selection_mut(&mut self) -> &mut SelectionSet {
        &mut self.selection
    }

    pub fn pending_tasks(&self) -> usize {
        self.scheduler.pending()
    }

    /// Generate s-expression for IPC-style status.
    pub fn status_sexp(&self) -> String {
        format!(
            "(:enabled {} :frame {} :pending-tasks {} :selection {} :transforming {} :right {} :left {})",
            bool_sexp(self.enabled),
            self.clock.frame,
            self.scheduler.pending(),
            self.selection.len(),
            bool_sexp(self.selection.is_transforming()),
            self.right.status_sexp(),
            self.left.status_sexp(),
        )
    }
}

// ── Test helpers ───────────────────────────────────────────

#[cfg(test)]
fn skeletal_frame(time_ms: f64, hand: Hand, sample: crate::hand::skeleton::HandSample) -> FrameInput {
    let mut frame = FrameInput {
        time_ms,
        ..FrameInput::default()
    };
    frame.hand_mut(hand).skeleton = Some(sample);
    frame
}

#[cfg(test)]
fn touch_frame(time_ms: f64, hand: Hand, bits: TouchBits) -> FrameInput {
    let mut frame = FrameInput {
        time_ms,
        ..FrameInput::default()
    };
    frame.hand_mut(hand).touch = Some(bits);
    frame
}

#[cfg(test)]
fn gesture_changes(events: &[HandEvent]) -> Vec<(GestureState, GestureState)> {
    events
        .iter()
        .filter_map(|e| match e {
            HandEvent::GestureStateChanged {
                current, previous, ..
            } => Some((*current, *previous)),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::GestureState::*;
    use super::*;
    use crate::error::Error;
    use crate::hand::classifier::{make_fist, make_open_hand, make_pointing};
    use crate::hand::gesture::DebouncePolicy;
    use crate::hand::skeleton::{ControllerPose, HandSample};
    use crate::tools::selection::ObjectId;

    fn system() -> HandInputSystem {
        HandInputSystem::builder().build().unwrap()
    }

    fn dragging(hand: Hand) -> HandSample {
        let mut s = make_open_hand(hand);
        s.middle_pinching = Some(true);
        s
    }

    fn untracked(time_ms: f64) -> FrameInput {
        FrameInput {
            time_ms,
            ..FrameInput::default()
        }
    }

    #[test]
    fn test_selection_then_drag_locks() {
        let mut sys = system();
        let mut events = sys.step(&untracked(0.0));
        events.extend(sys.step(&skeletal_frame(11.0, Hand::Right, make_open_hand(Hand::Right))));
        events.extend(sys.step(&skeletal_frame(22.0, Hand::Right, dragging(Hand::Right))));

        assert_eq!(
            gesture_changes(&events),
            vec![(Selection, Neutral), (DragSelection, Selection)]
        );
        assert!(sys.drag_lock(Hand::Right));
        assert!(sys.mode_active(Hand::Right));
        assert!(events.contains(&HandEvent::ModeActiveChanged {
            hand: Hand::Right,
            active: true
        }));
        assert_eq!(sys.gesture_state(Hand::Left), Neutral);
    }

    #[test]
    fn test_held_drag_broadcasts_nothing_new() {
        let mut sys = system();
        sys.step(&skeletal_frame(0.0, Hand::Right, make_open_hand(Hand::Right)));
        sys.step(&skeletal_frame(11.0, Hand::Right, dragging(Hand::Right)));
        let mut events = sys.step(&skeletal_frame(22.0, Hand::Right, dragging(Hand::Right)));
        events.extend(sys.step(&skeletal_frame(33.0, Hand::Right, dragging(Hand::Right))));
        assert!(gesture_changes(&events).is_empty());
        assert!(sys.drag_lock(Hand::Right));
    }

    #[test]
    fn test_touch_selection_then_insert() {
        let mut sys = system();
        let first = sys.step(&touch_frame(0.0, Hand::Right, TouchBits::new(false, false, true)));
        assert_eq!(gesture_changes(&first), vec![(Selection, Neutral)]);
        assert_eq!(sys.source(Hand::Right), InputSource::Touch);

        // Both presses land in one frame: thumb first, then pointer.
        let second = sys.step(&touch_frame(11.0, Hand::Right, TouchBits::new(true, true, true)));
        assert_eq!(
            gesture_changes(&second),
            vec![(DragSelection, Selection), (Insert, DragSelection)]
        );
        assert_eq!(sys.gesture_state(Hand::Right), Insert);
    }

    #[test]
    fn test_touch_squeeze_held_keeps_dial_open() {
        let mut sys = system();
        let all = TouchBits::new(true, true, true);
        let first = sys.step(&touch_frame(0.0, Hand::Right, all));
        assert_eq!(gesture_changes(&first), vec![(SqueezeAll, Neutral)]);
        for i in 1..4 {
            let events = sys.step(&touch_frame(f64::from(i) * 11.0, Hand::Right, all));
            assert!(gesture_changes(&events).is_empty());
            assert!(!events
                .iter()
                .any(|e| matches!(e, HandEvent::TransformModeChanged { .. })));
        }
        assert_eq!(sys.gesture_state(Hand::Right), SqueezeAll);
        assert!(sys.dial_open(Hand::Right));
    }

    #[test]
    fn test_touch_drag_held_across_frames() {
        let mut sys = system();
        let drag = TouchBits::new(false, true, true);
        sys.step(&touch_frame(0.0, Hand::Left, TouchBits::new(false, false, true)));
        let entered = sys.step(&touch_frame(11.0, Hand::Left, drag));
        assert_eq!(gesture_changes(&entered), vec![(DragSelection, Selection)]);
        for i in 2..6 {
            let events = sys.step(&touch_frame(f64::from(i) * 11.0, Hand::Left, drag));
            assert!(gesture_changes(&events).is_empty());
        }
        assert_eq!(sys.gesture_state(Hand::Left), DragSelection);
    }

    #[test]
    fn test_touch_dial_commits_tilted_mode() {
        let mut sys = system();
        let all = TouchBits::new(true, true, true);
        // Controller held upright: the dial reads the Create zone.
        let mut events = Vec::new();
        for i in 0..3 {
            let mut frame = touch_frame(f64::from(i) * 11.0, Hand::Right, all);
            frame.right.controller = Some(ControllerPose::default());
            events.extend(sys.step(&frame));
        }
        assert_eq!(gesture_changes(&events), vec![(SqueezeAll, Neutral)]);
        assert!(sys.dial_open(Hand::Right));

        let mut frame = touch_frame(33.0, Hand::Right, TouchBits::new(false, true, true));
        frame.right.controller = Some(ControllerPose::default());
        let events = sys.step(&frame);
        assert!(events.contains(&HandEvent::TransformModeChanged {
            hand: Hand::Right,
            current: TransformMode::Create,
            previous: TransformMode::Translate,
        }));
        assert_eq!(
            gesture_changes(&events),
            vec![(DragSelection, SqueezeAll), (Stop, DragSelection)]
        );
        assert!(!sys.dial_open(Hand::Right));
        assert_eq!(sys.transform_mode(Hand::Right), TransformMode::Create);
    }

    #[test]
    fn test_touch_selection_hold_crosses_threshold() {
        let mut sys = system();
        let middle = TouchBits::new(false, false, true);
        sys.step(&touch_frame(0.0, Hand::Right, middle));
        for t in [200.0, 400.0] {
            assert!(sys.step(&touch_frame(t, Hand::Right, middle)).is_empty());
        }
        let late = sys.step(&touch_frame(600.0, Hand::Right, middle));
        assert_eq!(
            late,
            vec![HandEvent::HoldThresholdExceeded {
                hand: Hand::Right,
                finger: Finger::Middle
            }]
        );
        assert_eq!(sys.gesture_state(Hand::Right), Selection);
        assert!(sys.is_held_long(Hand::Right, Finger::Middle));
    }

    #[test]
    fn test_same_mode_dial_close_clears_drag_lock() {
        let mut sys = system();
        sys.step(&skeletal_frame(0.0, Hand::Right, make_open_hand(Hand::Right)));
        sys.step(&skeletal_frame(11.0, Hand::Right, dragging(Hand::Right)));
        assert!(sys.drag_lock(Hand::Right));

        // Controller picked up with nothing touched, then squeezed.
        sys.step(&touch_frame(22.0, Hand::Right, TouchBits::NONE));
        assert_eq!(sys.gesture_state(Hand::Right), Neutral);
        assert!(sys.drag_lock(Hand::Right));
        sys.step(&touch_frame(33.0, Hand::Right, TouchBits::new(true, true, true)));
        assert!(sys.dial_open(Hand::Right));

        let events = sys.step(&touch_frame(44.0, Hand::Right, TouchBits::NONE));
        assert!(events.contains(&HandEvent::TransformModeChanged {
            hand: Hand::Right,
            current: TransformMode::Translate,
            previous: TransformMode::Translate,
        }));
        assert!(events.contains(&HandEvent::ModeActiveChanged {
            hand: Hand::Right,
            active: false
        }));
        assert!(!sys.drag_lock(Hand::Right));
        assert_eq!(sys.gesture_state(Hand::Right), Stop);
        assert_eq!(sys.transform_mode(Hand::Right), TransformMode::Translate);
    }

    #[test]
    fn test_skeletal_anchor_is_damped() {
        let mut sys = system();
        let still = make_open_hand(Hand::Right);
        let tip = still.joint(HandJoint::ThumbTip);
        sys.step(&skeletal_frame(0.0, Hand::Right, still.clone()));
        assert_eq!(sys.right.position, Some(tip));

        let mut moved = still;
        for joint in HandJoint::ALL {
            let p = moved.joint(joint);
            moved.set_joint(joint, [p[0] + 0.04, p[1], p[2]]);
        }
        sys.step(&skeletal_frame(11.0, Hand::Right, moved));
        let anchor = sys.right.position.unwrap();
        assert!((anchor[0] - (tip[0] + 0.02)).abs() < 1e-5);
        assert!((anchor[1] - tip[1]).abs() < 1e-6);
    }

    #[test]
    fn test_palm_down_drag_shifts_to_upper_case() {
        let mut sys = system();
        sys.step(&skeletal_frame(0.0, Hand::Right, make_open_hand(Hand::Right)));
        let events = sys.step(&skeletal_frame(11.0, Hand::Right, dragging(Hand::Right)));
        let shifts: Vec<_> = events
            .iter()
            .filter(|e| matches!(e, HandEvent::RotationStateChanged { .. }))
            .collect();
        assert_eq!(
            shifts,
            vec![&HandEvent::RotationStateChanged {
                hand: Hand::Right,
                current: RotationState::UpperCase,
                previous: RotationState::LowerCase,
            }]
        );

        let again = sys.step(&skeletal_frame(22.0, Hand::Right, dragging(Hand::Right)));
        assert!(!again
            .iter()
            .any(|e| matches!(e, HandEvent::RotationStateChanged { .. })));
        assert_eq!(sys.rotation_state(Hand::Right), RotationState::UpperCase);
    }

    #[test]
    fn test_source_falls_back_to_touch() {
        let mut sys = system();
        sys.step(&skeletal_frame(0.0, Hand::Left, make_open_hand(Hand::Left)));
        assert_eq!(sys.source(Hand::Left), InputSource::Skeletal);
        assert_eq!(sys.gesture_state(Hand::Left), Selection);

        let mut frame = touch_frame(11.0, Hand::Left, TouchBits::NONE);
        let mut lost = make_open_hand(Hand::Left);
        lost.tracked = false;
        frame.left.skeleton = Some(lost);
        let events = sys.step(&frame);
        assert_eq!(sys.source(Hand::Left), InputSource::Touch);
        assert_eq!(gesture_changes(&events), vec![(Neutral, Selection)]);

        sys.step(&untracked(22.0));
        assert_eq!(sys.source(Hand::Left), InputSource::Absent);
    }

    #[test]
    fn test_touch_disabled_ignores_bits() {
        let mut cfg = GestureConfig::default();
        cfg.touch_enabled = false;
        let mut sys = HandInputSystem::builder().with_config(cfg).build().unwrap();
        let events = sys.step(&touch_frame(0.0, Hand::Right, TouchBits::new(false, false, true)));
        assert!(events.is_empty());
        assert_eq!(sys.source(Hand::Right), InputSource::Absent);
    }

    #[test]
    fn test_hold_threshold_fires_once_pressed_long_enough() {
        let mut sys = system();
        let pointer = TouchBits::new(true, false, false);
        sys.step(&touch_frame(0.0, Hand::Right, pointer));
        assert_eq!(sys.pending_tasks(), 1);

        let early = sys.step(&touch_frame(400.0, Hand::Right, pointer));
        assert!(early.is_empty());
        assert!(!sys.is_held_long(Hand::Right, Finger::Pointer));

        let late = sys.step(&touch_frame(600.0, Hand::Right, pointer));
        assert_eq!(
            late,
            vec![HandEvent::HoldThresholdExceeded {
                hand: Hand::Right,
                finger: Finger::Pointer
            }]
        );
        assert!(sys.is_held_long(Hand::Right, Finger::Pointer));
        assert_eq!(sys.pending_tasks(), 0);

        sys.step(&touch_frame(700.0, Hand::Right, TouchBits::NONE));
        assert!(!sys.is_held_long(Hand::Right, Finger::Pointer));
    }

    #[test]
    fn test_release_cancels_hold() {
        let mut sys = system();
        sys.step(&touch_frame(0.0, Hand::Left, TouchBits::new(false, true, false)));
        sys.step(&touch_frame(300.0, Hand::Left, TouchBits::NONE));
        assert_eq!(sys.pending_tasks(), 0);
        let events = sys.step(&touch_frame(900.0, Hand::Left, TouchBits::NONE));
        assert!(!events
            .iter()
            .any(|e| matches!(e, HandEvent::HoldThresholdExceeded { .. })));
        assert!(!sys.held_long(Hand::Left).any());
    }

    #[test]
    fn test_mode_change_resets_drag_lock() {
        let mut sys = system();
        sys.step(&skeletal_frame(0.0, Hand::Right, make_open_hand(Hand::Right)));
        sys.step(&skeletal_frame(11.0, Hand::Right, dragging(Hand::Right)));
        assert!(sys.drag_lock(Hand::Right));

        let changed = sys.set_transform_mode(Hand::Right, TransformMode::Scale);
        assert!(changed.contains(&HandEvent::TransformModeChanged {
            hand: Hand::Right,
            current: TransformMode::Scale,
            previous: TransformMode::Translate,
        }));
        assert_eq!(sys.pending_tasks(), 1);

        let events = sys.step(&skeletal_frame(22.0, Hand::Right, dragging(Hand::Right)));
        assert!(events.contains(&HandEvent::ModeActiveChanged {
            hand: Hand::Right,
            active: false
        }));
        assert_eq!(gesture_changes(&events), vec![(Stop, DragSelection)]);
        assert!(!sys.drag_lock(Hand::Right));
        assert_eq!(sys.gesture_state(Hand::Right), Stop);
        assert_eq!(sys.transform_mode(Hand::Right), TransformMode::Scale);
    }

    #[test]
    fn test_same_mode_is_not_a_change() {
        let mut sys = system();
        assert!(sys
            .set_transform_mode(Hand::Left, TransformMode::Translate)
            .is_empty());
        assert_eq!(sys.pending_tasks(), 0);
    }

    #[test]
    fn test_deselect_all_clears_selection() {
        let mut sys = system();
        sys.selection_mut().select(ObjectId(1));
        sys.selection_mut().select(ObjectId(2));
        let pointing = make_pointing(Hand::Right, [-0.02, 0.08, 0.08]);
        let events = sys.step(&skeletal_frame(0.0, Hand::Right, pointing));
        assert_eq!(gesture_changes(&events), vec![(DeselectAll, Neutral)]);
        assert!(events.contains(&HandEvent::SelectionCleared {
            hand: Hand::Right,
            count: 2
        }));
        assert!(sys.selection().is_empty());
    }

    #[test]
    fn test_translate_drag_brackets_transformation() {
        let mut sys = system();
        sys.step(&skeletal_frame(0.0, Hand::Right, make_open_hand(Hand::Right)));
        let events = sys.step(&skeletal_frame(11.0, Hand::Right, dragging(Hand::Right)));
        assert!(events.iter().any(|e| matches!(
            e,
            HandEvent::ToolDragChanged {
                tool: TransformMode::Translate,
                active: true,
                ..
            }
        )));
        assert!(sys.selection().is_transforming());

        // Fist with thumb out leaves DragSelection through Stop.
        let events = sys.step(&skeletal_frame(22.0, Hand::Right, make_fist(Hand::Right, true)));
        assert_eq!(gesture_changes(&events), vec![(Stop, DragSelection)]);
        assert!(!sys.selection().is_transforming());
    }

    #[test]
    fn test_squeeze_opens_dial() {
        let mut sys = system();
        let events = sys.step(&skeletal_frame(0.0, Hand::Left, make_fist(Hand::Left, false)));
        assert_eq!(gesture_changes(&events), vec![(SqueezeAll, Neutral)]);
        assert!(events.iter().any(|e| matches!(
            e,
            HandEvent::ModeDialPreview {
                hand: Hand::Left,
                open: true,
                ..
            }
        )));

        let events = sys.step(&untracked(11.0));
        let closed = events
            .iter()
            .find_map(|e| match e {
                HandEvent::ModeDialPreview {
                    open: false,
                    potential,
                    ..
                } => Some(*potential),
                _ => None,
            })
            .unwrap();
        assert_eq!(sys.transform_mode(Hand::Left), closed);
    }

    #[test]
    fn test_sustained_debounce_delays_broadcast() {
        let mut cfg = GestureConfig::default();
        cfg.debounce = DebouncePolicy::Sustained {
            frames: 2,
            drag_multiplier: 2,
        };
        let mut sys = HandInputSystem::builder().with_config(cfg).build().unwrap();
        let open = || skeletal_frame(0.0, Hand::Right, make_open_hand(Hand::Right));

        assert!(gesture_changes(&sys.step(&open())).is_empty());
        assert!(gesture_changes(&sys.step(&open())).is_empty());
        assert_eq!(gesture_changes(&sys.step(&open())), vec![(Selection, Neutral)]);
        assert!(gesture_changes(&sys.step(&open())).is_empty());
    }

    #[test]
    fn test_debounce_drops_short_lived_state() {
        let mut cfg = GestureConfig::default();
        cfg.debounce = DebouncePolicy::Sustained {
            frames: 3,
            drag_multiplier: 2,
        };
        let mut sys = HandInputSystem::builder().with_config(cfg).build().unwrap();
        let mut events = sys.step(&skeletal_frame(0.0, Hand::Right, make_open_hand(Hand::Right)));
        for i in 1..6 {
            events.extend(sys.step(&untracked(f64::from(i) * 11.0)));
        }
        assert!(!gesture_changes(&events)
            .iter()
            .any(|(current, _)| *current == Selection));
    }

    #[test]
    fn test_disable_cancels_tasks() {
        let mut sys = system();
        sys.step(&touch_frame(0.0, Hand::Right, TouchBits::new(true, true, false)));
        assert_eq!(sys.pending_tasks(), 2);

        sys.disable();
        assert!(!sys.is_enabled());
        assert_eq!(sys.pending_tasks(), 0);
        assert!(sys
            .step(&touch_frame(900.0, Hand::Right, TouchBits::new(true, true, false)))
            .is_empty());
        assert!(!sys.held_long(Hand::Right).any());

        sys.enable();
        assert!(sys.is_enabled());
    }

    #[test]
    fn test_subscribers_see_every_event() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let mut sys = HandInputSystem::builder()
            .subscribe(move |e| sink.borrow_mut().push(e.clone()))
            .build()
            .unwrap();
        let mut events = sys.step(&skeletal_frame(0.0, Hand::Right, make_open_hand(Hand::Right)));
        events.extend(sys.step(&skeletal_frame(11.0, Hand::Right, dragging(Hand::Right))));
        assert!(!events.is_empty());
        assert_eq!(*seen.borrow(), events);
    }

    #[test]
    fn test_unsubscribe_on_system() {
        let count = Rc::new(RefCell::new(0));
        let c = Rc::clone(&count);
        let mut sys = system();
        let id = sys.subscribe(move |_| *c.borrow_mut() += 1);
        sys.step(&skeletal_frame(0.0, Hand::Right, make_open_hand(Hand::Right)));
        let after_first = *count.borrow();
        assert!(after_first > 0);
        assert!(sys.unsubscribe(id));
        sys.step(&untracked(11.0));
        assert_eq!(*count.borrow(), after_first);
    }

    #[test]
    fn test_build_rejects_missing_joint() {
        let joints: Vec<HandJoint> = HandJoint::ALL
            .into_iter()
            .filter(|j| *j != HandJoint::Index2)
            .collect();
        match HandInputSystem::builder().device_joints(&joints).build() {
            Err(Error::MissingJoint(name)) => assert_eq!(name, "index-2"),
            other => panic!("expected missing joint, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_build_rejects_no_sources() {
        let mut cfg = GestureConfig::default();
        cfg.skeletal_enabled = false;
        cfg.touch_enabled = false;
        assert!(matches!(
            HandInputSystem::builder().with_config(cfg).build(),
            Err(Error::Wiring(_))
        ));
    }

    #[test]
    fn test_status_sexp() {
        let mut sys = system();
        sys.step(&skeletal_frame(0.0, Hand::Right, make_open_hand(Hand::Right)));
        let status = sys.status_sexp();
        assert!(status.starts_with("(:enabled t :frame 1 "));
        assert!(status.contains(":right (:source :skeletal :gesture (:state :selection"));
        assert!(status.contains(":left (:source :absent"));
        assert!(status.contains(":held-long (nil nil nil)"));
    }
}
