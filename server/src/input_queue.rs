//! Per-session buffer of player input samples.
//!
//! Clients sample their controls at the physics rate but may send a
//! sample only every few steps. Each sample is stamped with a wrapping
//! sequence number; the gap between two consecutive numbers tells the
//! server how many steps the older sample was held for. The queue
//! replays samples at that pace, one `advance_one_tick` per server step,
//! and reports when an authoritative correction should be sent back.

use log::debug;
use shared::{seq_difference, PlayerInput, SequenceNumber};
use std::collections::VecDeque;

/// Delay estimate used before the first measurement, in seconds.
const INITIAL_DELAY_ESTIMATE: f32 = 0.2;

/// Tuning shared by every session's queue.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QueuePolicy {
    /// Length above which the queue collapses to its newest sample.
    pub max_size: usize,
    /// Consecutive backed-up ticks before target steps are shortened.
    pub overfull_threshold: u32,
    /// Largest forward jump accepted between two samples.
    pub max_seq_jump: i32,
    /// Smoothing factor of the delay estimate, in `0.0..=1.0`.
    pub delay_tracking_speed: f32,
    /// Length of one physics step in seconds.
    pub step_dt: f32,
    /// When set, corrections go out on every second advancing tick only.
    pub network_optimizations: bool,
}

impl Default for QueuePolicy {
    fn default() -> Self {
        Self {
            max_size: 10,
            overfull_threshold: 10,
            max_seq_jump: 50,
            delay_tracking_speed: 0.01,
            step_dt: 1.0 / 60.0,
            network_optimizations: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct InputSample {
    pub sequence: SequenceNumber,
    pub input: PlayerInput,
}

/// Result of a single server step for one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickOutcome {
    /// The front sample was replaced during this step.
    pub consumed: bool,
    /// An authoritative state correction should be sent this step.
    pub correction_due: bool,
    /// Sequence number of the sample now at the front.
    pub front_sequence: Option<SequenceNumber>,
}

impl TickOutcome {
    fn idle(front_sequence: Option<SequenceNumber>) -> Self {
        Self {
            consumed: false,
            correction_due: false,
            front_sequence,
        }
    }
}

#[derive(Debug, Clone)]
pub struct InputQueue {
    policy: QueuePolicy,
    samples: VecDeque<InputSample>,
    steps_taken_with_current: u32,
    overfull_step_count: u32,
    smoothed_delay: f32,
    correction_toggle: bool,
    overflow: bool,
    underflow: bool,
}

impl InputQueue {
    pub fn new(policy: QueuePolicy) -> Self {
        Self {
            policy,
            samples: VecDeque::with_capacity(policy.max_size + 1),
            steps_taken_with_current: 0,
            overfull_step_count: 0,
            smoothed_delay: INITIAL_DELAY_ESTIMATE,
            correction_toggle: false,
            overflow: false,
            underflow: false,
        }
    }

    /// Appends a sample if it is newer than the current tail.
    ///
    /// Duplicates, stale samples and implausibly large jumps are dropped
    /// and reported as `false`. The queue stays strictly increasing in
    /// wrapping sequence order.
    pub fn enqueue(&mut self, sequence: SequenceNumber, input: PlayerInput) -> bool {
        if let Some(tail) = self.samples.back() {
            let distance = seq_difference(sequence, tail.sequence);
            if distance <= 0 {
                debug!(
                    "Dropping out of order input {} (tail is {})",
                    sequence, tail.sequence
                );
                return false;
            }
            if distance > self.policy.max_seq_jump {
                debug!(
                    "Dropping input {} jumping {} steps past {}",
                    sequence, distance, tail.sequence
                );
                return false;
            }
        }

        self.samples.push_back(InputSample { sequence, input });
        true
    }

    /// Advances the queue by one server step.
    ///
    /// Must only be called once at least one sample has been enqueued
    /// since the last [`clear`](Self::clear). `network_delay` is the
    /// latest one way delay measurement of the owning session in seconds.
    pub fn advance_one_tick(&mut self, network_delay: f32) -> TickOutcome {
        debug_assert!(!self.samples.is_empty(), "advancing an empty input queue");
        if self.samples.is_empty() {
            return TickOutcome::idle(None);
        }

        self.steps_taken_with_current += 1;

        if self.samples.len() > self.policy.max_size {
            return self.collapse();
        }
        self.overflow = false;

        if self.samples.len() == 1 {
            self.overfull_step_count = 0;
            return TickOutcome::idle(self.front_sequence());
        }

        self.overfull_step_count += 1;

        let mut target_steps =
            seq_difference(self.samples[1].sequence, self.samples[0].sequence).max(1) as u32;

        let send_interval = target_steps as f32 * self.policy.step_dt;
        let queued_delay = (self.samples.len() - 1) as f32 * send_interval;
        let alpha = self.policy.delay_tracking_speed;
        self.smoothed_delay = self.smoothed_delay * (1.0 - alpha) + alpha * (network_delay + queued_delay);

        if self.overfull_step_count > self.policy.overfull_threshold && target_steps > 1 {
            target_steps -= 1;
        }

        if self.steps_taken_with_current < target_steps {
            return TickOutcome::idle(self.front_sequence());
        }

        self.underflow = self.steps_taken_with_current > target_steps;
        self.samples.pop_front();
        self.steps_taken_with_current = 0;
        self.correction_toggle = !self.correction_toggle;

        TickOutcome {
            consumed: true,
            correction_due: !self.policy.network_optimizations || self.correction_toggle,
            front_sequence: self.front_sequence(),
        }
    }

    // Too many samples backed up: jump straight to the newest one.
    fn collapse(&mut self) -> TickOutcome {
        debug!(
            "Input queue overflow with {} samples, skipping to newest",
            self.samples.len()
        );
        let newest = self.samples.pop_back();
        self.samples.clear();
        self.samples.extend(newest);

        self.steps_taken_with_current = 0;
        self.overfull_step_count = 0;
        self.overflow = true;

        TickOutcome {
            consumed: true,
            correction_due: true,
            front_sequence: self.front_sequence(),
        }
    }

    /// Drops all samples, e.g. when the session's controllable changes.
    pub fn clear(&mut self) {
        self.samples.clear();
        self.steps_taken_with_current = 0;
        self.overfull_step_count = 0;
        self.overflow = false;
        self.underflow = false;
    }

    pub fn front(&self) -> Option<&InputSample> {
        self.samples.front()
    }

    pub fn front_sequence(&self) -> Option<SequenceNumber> {
        self.samples.front().map(|sample| sample.sequence)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Smoothed estimate of how far behind the client the server replays input.
    pub fn smoothed_delay(&self) -> f32 {
        self.smoothed_delay
    }

    pub fn steps_taken_with_current(&self) -> u32 {
        self.steps_taken_with_current
    }

    pub fn overfull_step_count(&self) -> u32 {
        self.overfull_step_count
    }

    pub fn is_overflowing(&self) -> bool {
        self.overflow
    }

    pub fn is_underflowing(&self) -> bool {
        self.underflow
    }

    pub fn sequences(&self) -> impl Iterator<Item = SequenceNumber> + '_ {
        self.samples.iter().map(|sample| sample.sequence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn queue() -> InputQueue {
        InputQueue::new(QueuePolicy::default())
    }

    fn input() -> PlayerInput {
        PlayerInput::default()
    }

    #[test]
    fn test_enqueue_keeps_increasing_order() {
        let mut queue = queue();
        assert!(queue.enqueue(10, input()));
        assert!(queue.enqueue(12, input()));
        assert!(!queue.enqueue(11, input()));
        assert!(!queue.enqueue(12, input()));
        assert!(queue.enqueue(13, input()));

        assert_eq!(queue.sequences().collect::<Vec<_>>(), vec![10, 12, 13]);
    }

    #[test]
    fn test_enqueue_across_wraparound() {
        let mut queue = queue();
        assert!(queue.enqueue(254, input()));
        assert!(queue.enqueue(255, input()));
        assert!(queue.enqueue(1, input()));
        assert!(!queue.enqueue(250, input()));

        assert_eq!(queue.sequences().collect::<Vec<_>>(), vec![254, 255, 1]);
    }

    #[test]
    fn test_enqueue_rejects_implausible_jump() {
        let mut queue = queue();
        assert!(queue.enqueue(0, input()));
        assert!(!queue.enqueue(51, input()));
        assert!(queue.enqueue(50, input()));
    }

    #[test]
    fn test_single_sample_is_held() {
        let mut queue = queue();
        queue.enqueue(3, input());

        for _ in 0..5 {
            let outcome = queue.advance_one_tick(0.0);
            assert!(!outcome.consumed);
            assert!(!outcome.correction_due);
            assert_eq!(outcome.front_sequence, Some(3));
        }
        assert_eq!(queue.steps_taken_with_current(), 5);
    }

    #[test]
    fn test_sample_held_for_sequence_gap() {
        let mut queue = queue();
        queue.enqueue(5, input());
        queue.enqueue(7, input());

        let first = queue.advance_one_tick(0.0);
        assert!(!first.consumed);
        assert_eq!(first.front_sequence, Some(5));

        let second = queue.advance_one_tick(0.0);
        assert!(second.consumed);
        assert_eq!(second.front_sequence, Some(7));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_advances_on_kth_tick() {
        for gap in 1..=6u8 {
            let mut queue = queue();
            queue.enqueue(100, input());
            queue.enqueue(100 + gap, input());

            for _ in 1..gap {
                assert!(!queue.advance_one_tick(0.0).consumed);
            }
            assert!(queue.advance_one_tick(0.0).consumed, "gap {}", gap);
        }
    }

    #[test]
    fn test_corrections_alternate() {
        let mut queue = queue();
        for sequence in 0..9 {
            queue.enqueue(sequence, input());
        }

        let due: Vec<bool> = (0..8)
            .map(|_| queue.advance_one_tick(0.0))
            .filter(|outcome| outcome.consumed)
            .map(|outcome| outcome.correction_due)
            .collect();

        assert_eq!(
            due,
            vec![true, false, true, false, true, false, true, false]
        );
    }

    #[test]
    fn test_corrections_every_tick_without_optimizations() {
        let mut queue = InputQueue::new(QueuePolicy {
            network_optimizations: false,
            ..Default::default()
        });
        for sequence in 0..5 {
            queue.enqueue(sequence, input());
        }
        for _ in 0..4 {
            let outcome = queue.advance_one_tick(0.0);
            assert!(outcome.consumed);
            assert!(outcome.correction_due);
        }
    }

    #[test]
    fn test_overflow_collapses_to_newest() {
        let mut queue = queue();
        for sequence in 0..11 {
            queue.enqueue(sequence, input());
        }

        let outcome = queue.advance_one_tick(0.0);
        assert!(outcome.consumed);
        assert!(outcome.correction_due);
        assert_eq!(outcome.front_sequence, Some(10));
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.steps_taken_with_current(), 0);
        assert!(queue.is_overflowing());

        queue.enqueue(11, input());
        queue.advance_one_tick(0.0);
        assert!(!queue.is_overflowing());
    }

    #[test]
    fn test_backed_up_queue_is_sped_up() {
        let mut queue = InputQueue::new(QueuePolicy {
            overfull_threshold: 2,
            max_size: 100,
            ..Default::default()
        });
        for sequence in (0..60).step_by(3) {
            queue.enqueue(sequence, input());
        }

        // Held for the full gap of three until the threshold is crossed.
        assert!(!queue.advance_one_tick(0.0).consumed);
        assert!(!queue.advance_one_tick(0.0).consumed);
        assert!(queue.advance_one_tick(0.0).consumed);

        // From here on each sample is held one step shorter.
        assert!(!queue.advance_one_tick(0.0).consumed);
        assert!(queue.advance_one_tick(0.0).consumed);
        assert!(queue.overfull_step_count() > 2);
    }

    #[test]
    fn test_underflow_is_flagged_when_input_arrives_late() {
        let mut queue = queue();
        queue.enqueue(1, input());
        queue.advance_one_tick(0.0);
        queue.advance_one_tick(0.0);
        queue.advance_one_tick(0.0);

        queue.enqueue(2, input());
        assert!(queue.advance_one_tick(0.0).consumed);
        assert!(queue.is_underflowing());
    }

    #[test]
    fn test_delay_estimate_tracks_measurements() {
        let mut queue = InputQueue::new(QueuePolicy {
            delay_tracking_speed: 0.5,
            step_dt: 0.1,
            ..Default::default()
        });
        queue.enqueue(0, input());
        queue.enqueue(2, input());
        queue.enqueue(4, input());

        queue.advance_one_tick(0.1);

        // 0.5 * 0.2 + 0.5 * (0.1 + 2 * 2 * 0.1)
        assert_approx_eq!(queue.smoothed_delay(), 0.35);
    }

    #[test]
    fn test_clear_resets_counters() {
        let mut queue = queue();
        queue.enqueue(0, input());
        queue.enqueue(4, input());
        queue.advance_one_tick(0.0);

        queue.clear();
        assert!(queue.is_empty());
        assert_eq!(queue.steps_taken_with_current(), 0);
        assert!(queue.front().is_none());

        // Any sequence is accepted after a clear.
        assert!(queue.enqueue(200, input()));
    }
}
