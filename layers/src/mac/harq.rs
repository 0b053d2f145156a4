//! Downlink HARQ Processes
//!
//! One stop-and-wait process per HARQ id. Short PUCCH formats carry feedback
//! without a process id, so the entity keeps the processes awaiting feedback in
//! scheduling order and matches arriving bits against the head of that FIFO.

use crate::LayerError;
use common::types::{Rnti, SlotTime, MAX_FRAME_NUMBER};
use std::collections::VecDeque;
use tracing::{debug, warn};

/// Maximum number of DL HARQ processes per UE
pub const MAX_HARQ_PROCESSES: usize = 16;

/// Range-checked HARQ process id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HarqPid(u8);

impl HarqPid {
    pub fn value(&self) -> u8 {
        self.0
    }
}

/// Process state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HarqState {
    #[default]
    Idle,
    /// A transmission went out and its feedback is expected
    WaitingFeedback,
    /// NACKed, queued for retransmission
    PendingRetransmission,
}

/// Result of applying feedback to a process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HarqOutcome {
    /// Transport block delivered, process freed
    Acked,
    /// Queued for retransmission round `round`
    Retransmit { round: u8 },
    /// Round limit reached, process freed
    Aborted,
}

/// One DL HARQ process
#[derive(Debug, Clone, Default)]
pub struct HarqProcess {
    pub state: HarqState,
    pub round: u8,
    /// Slot the feedback is expected in
    pub feedback_time: Option<SlotTime>,
    /// Last feedback for this process was not detected
    pub dtx: bool,
    pub last_outcome: Option<HarqOutcome>,
}

/// Outcome of looking up the process a feedback bit belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedbackMatch {
    /// Head of the FIFO expects feedback now
    Matched(HarqPid),
    /// Head of the FIFO expects feedback later
    NotDue(HarqPid),
    /// Nothing is awaiting feedback
    Empty,
}

/// True if feedback expected at `expected` should already have arrived at `now`
///
/// Uses the half-window of the 1024 frame SFN range, with the slot deciding ties
/// inside the same frame.
pub fn feedback_in_past(expected: SlotTime, now: SlotTime) -> bool {
    let behind = (expected.frame + MAX_FRAME_NUMBER - now.frame) % MAX_FRAME_NUMBER;
    behind > MAX_FRAME_NUMBER / 2 || (expected.frame == now.frame && expected.slot < now.slot)
}

/// True if feedback expected at `expected` is not due yet at `now`
pub fn feedback_in_future(expected: SlotTime, now: SlotTime) -> bool {
    let ahead = (now.frame + MAX_FRAME_NUMBER - expected.frame) % MAX_FRAME_NUMBER;
    ahead > MAX_FRAME_NUMBER / 2 || (expected.frame == now.frame && expected.slot > now.slot)
}

/// DL HARQ entity of one UE
#[derive(Debug, Clone)]
pub struct HarqEntity {
    processes: Vec<HarqProcess>,
    /// Processes awaiting feedback, oldest first
    feedback_fifo: VecDeque<HarqPid>,
    /// NACKed processes, oldest first
    retrans_fifo: VecDeque<HarqPid>,
    round_max: u8,
    /// Transport blocks dropped at the round limit
    pub errors: u64,
}

impl HarqEntity {
    pub fn new(num_processes: usize, round_max: u8) -> Self {
        let num_processes = num_processes.clamp(1, MAX_HARQ_PROCESSES);
        Self {
            processes: vec![HarqProcess::default(); num_processes],
            feedback_fifo: VecDeque::with_capacity(num_processes),
            retrans_fifo: VecDeque::with_capacity(num_processes),
            round_max: round_max.max(1),
            errors: 0,
        }
    }

    pub fn num_processes(&self) -> usize {
        self.processes.len()
    }

    /// Handle for process `id`, if it exists
    pub fn pid(&self, id: u8) -> Option<HarqPid> {
        ((id as usize) < self.processes.len()).then_some(HarqPid(id))
    }

    pub fn process(&self, pid: HarqPid) -> &HarqProcess {
        &self.processes[pid.0 as usize]
    }

    /// First idle process
    pub fn next_free(&self) -> Option<HarqPid> {
        self.processes
            .iter()
            .position(|p| p.state == HarqState::Idle)
            .map(|i| HarqPid(i as u8))
    }

    /// Oldest process waiting for a retransmission
    pub fn next_retransmission(&mut self) -> Option<HarqPid> {
        self.retrans_fifo.pop_front()
    }

    /// Put back a retransmission that could not be scheduled
    pub fn requeue_retransmission(&mut self, pid: HarqPid) {
        self.retrans_fifo.push_front(pid);
    }

    /// Processes awaiting feedback
    pub fn feedback_pending(&self) -> usize {
        self.feedback_fifo.len()
    }

    /// A (re)transmission of `pid` went out; expect its feedback at `feedback_time`
    pub fn expect_feedback(&mut self, pid: HarqPid, feedback_time: SlotTime) -> Result<(), LayerError> {
        let process = &mut self.processes[pid.0 as usize];
        if process.state == HarqState::WaitingFeedback {
            return Err(LayerError::InvalidState(format!(
                "HARQ process {} already awaits feedback at {:?}",
                pid.0, process.feedback_time
            )));
        }
        process.state = HarqState::WaitingFeedback;
        process.feedback_time = Some(feedback_time);
        process.dtx = false;
        self.retrans_fifo.retain(|p| *p != pid);
        self.feedback_fifo.push_back(pid);
        Ok(())
    }

    /// Process the next feedback bit received at `now` belongs to
    ///
    /// Processes whose feedback is overdue are resolved as failures on the way.
    pub fn find_harq(&mut self, rnti: Rnti, now: SlotTime) -> FeedbackMatch {
        while let Some(&pid) = self.feedback_fifo.front() {
            let Some(expected) = self.processes[pid.0 as usize].feedback_time else {
                self.feedback_fifo.pop_front();
                continue;
            };
            if feedback_in_past(expected, now) {
                warn!(
                    "UE {} expected HARQ feedback for process {} at {}, now {}: treating as NACK",
                    rnti, pid.0, expected, now
                );
                self.feedback_fifo.pop_front();
                self.handle_feedback(rnti, pid, false);
                continue;
            }
            if feedback_in_future(expected, now) {
                warn!(
                    "UE {} HARQ feedback for process {} expected at {}, received at {}",
                    rnti, pid.0, expected, now
                );
                return FeedbackMatch::NotDue(pid);
            }
            return FeedbackMatch::Matched(pid);
        }
        FeedbackMatch::Empty
    }

    /// Remove the head of the feedback FIFO once its bit has been consumed
    pub fn take_head(&mut self, pid: HarqPid) -> bool {
        if self.feedback_fifo.front() == Some(&pid) {
            self.feedback_fifo.pop_front();
            true
        } else {
            false
        }
    }

    /// Mark the head's feedback as not detected; it stays queued
    pub fn mark_dtx(&mut self, pid: HarqPid) {
        self.processes[pid.0 as usize].dtx = true;
    }

    /// Apply an ACK (`success`) or NACK to `pid`
    pub fn handle_feedback(&mut self, rnti: Rnti, pid: HarqPid, success: bool) -> HarqOutcome {
        let round_max = self.round_max;
        let process = &mut self.processes[pid.0 as usize];
        process.feedback_time = None;

        let outcome = if success {
            process.state = HarqState::Idle;
            process.round = 0;
            HarqOutcome::Acked
        } else if process.round >= round_max - 1 {
            process.state = HarqState::Idle;
            process.round = 0;
            self.errors += 1;
            debug!("UE {} HARQ process {} reached {} rounds, dropping TB", rnti, pid.0, round_max);
            HarqOutcome::Aborted
        } else {
            process.state = HarqState::PendingRetransmission;
            process.round += 1;
            self.retrans_fifo.push_back(pid);
            HarqOutcome::Retransmit { round: process.round }
        };

        process.last_outcome = Some(outcome);
        debug!("UE {} HARQ process {}: {:?}", rnti, pid.0, outcome);
        outcome
    }
}
