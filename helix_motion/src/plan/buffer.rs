//! Planner block ring.
//!
//! A fixed ring of blocks shared between the producer (main, queueing and
//! back-planning) and the consumer (exec). The per-block state flag is the
//! handshake: the back-planner may touch blocks in `Queued` or `Pending`
//! only, never a `Running` block, and no two blocks are ever `Running` at
//! once.

use helix_common::consts::{AXES, MOTORS, PLANNER_BUFFER_POOL_SIZE};
use helix_common::gcode::SpindleMode;
use helix_common::state::MachineState;

/// Block lifecycle within the ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlockState {
    /// Free for reuse.
    #[default]
    Empty,
    /// Checked out and being written by the producer.
    Prepped,
    /// In the queue, eligible for back-planning.
    Queued,
    /// Next block to run; still eligible for back-planning.
    Pending,
    /// Owned by the runtime. Off limits to the back-planner.
    Running,
}

/// Synchronous command carried by a command block.
///
/// These replace the function-pointer-plus-scalars callbacks of a bare-metal
/// build: each variant carries its own payload and is dispatched when the
/// block reaches execution, so side effects land in runtime order relative
/// to the motion that brackets them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    /// Recompute the runtime work offsets for the given coordinate system
    /// selection (also used for the G92 family, which changes the offsets
    /// without changing the selection).
    SetWorkOffsets,
    /// M6.
    ChangeTool { tool: u8 },
    /// T word.
    SelectTool { tool: u8 },
    /// M7 (and the off half of M9).
    MistCoolant { on: bool },
    /// M8/M9.
    FloodCoolant { on: bool },
    /// M3/M4/M5.
    SpindleControl { mode: SpindleMode },
    /// S word.
    SpindleSpeed { rpm: f64 },
    /// Program stop or end reached execution.
    ProgramFinalize { state: MachineState },
}

/// What a block asks the runtime to do.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Payload {
    /// Nothing; cleared blocks rest here.
    #[default]
    Null,
    /// Acceleration-planned line; the motion fields of [`Block`] apply.
    Line,
    /// Delay with no movement.
    Dwell { seconds: f64 },
    /// Synchronous command.
    Command(Command),
}

/// One planner ring entry.
///
/// Motion fields are meaningful for `Payload::Line` only; command and dwell
/// blocks leave them zeroed, which also makes them natural planning
/// barriers (zero exit velocity).
#[derive(Debug, Clone, Default)]
pub struct Block {
    pub state: BlockState,
    pub payload: Payload,
    /// May the back-planner still adjust this block's velocities?
    pub replannable: bool,

    /// Endpoint in the canonical frame [mm].
    pub target: [f64; AXES],
    /// Unit vector along the path.
    pub unit: [f64; AXES],
    /// Signed step displacement per motor for the whole block.
    pub motor_steps: [f64; MOTORS],
    /// Work offset snapshot for reporting.
    pub work_offset: [f64; AXES],

    /// Path length [mm].
    pub length: f64,
    /// Requested move time [min].
    pub time: f64,
    /// Fastest possible time for the move [min].
    pub min_time: f64,

    pub head_length: f64,
    pub body_length: f64,
    pub tail_length: f64,

    pub entry_velocity: f64,
    pub cruise_velocity: f64,
    pub exit_velocity: f64,

    pub entry_vmax: f64,
    pub cruise_vmax: f64,
    pub exit_vmax: f64,
    /// Largest velocity change the jerk allows over this length.
    pub delta_vmax: f64,
    /// Velocity sheddable by the chain downstream of this block.
    pub braking_velocity: f64,

    /// Jerk term for this move [mm/min³], with compute-once reciprocal and
    /// cube root for the closed-form solves.
    pub jerk: f64,
    pub recip_jerk: f64,
    pub cbrt_jerk: f64,
}

impl Block {
    /// Reset to an empty block.
    pub fn clear(&mut self) {
        *self = Block::default();
    }

    /// True for acceleration-planned line blocks.
    #[inline]
    pub fn is_line(&self) -> bool {
        matches!(self.payload, Payload::Line)
    }
}

/// The bounded planner ring.
///
/// Single producer (queueing/back-planning from main), single consumer
/// (exec). Write checkout walks `w`; the run pointer walks `r`.
#[derive(Debug)]
pub struct BlockRing {
    blocks: Vec<Block>,
    /// Next write-checkout slot.
    w: usize,
    /// Current run slot.
    r: usize,
    available: usize,
}

impl Default for BlockRing {
    fn default() -> Self {
        Self::new()
    }
}

impl BlockRing {
    pub fn new() -> Self {
        Self {
            blocks: vec![Block::default(); PLANNER_BUFFER_POOL_SIZE],
            w: 0,
            r: 0,
            available: PLANNER_BUFFER_POOL_SIZE,
        }
    }

    /// Number of free blocks.
    #[inline]
    pub fn available(&self) -> usize {
        self.available
    }

    /// True when no block is queued, pending or running.
    pub fn is_empty(&self) -> bool {
        self.available == PLANNER_BUFFER_POOL_SIZE
    }

    /// Ring successor of `index`.
    #[inline]
    pub fn next(&self, index: usize) -> usize {
        (index + 1) % PLANNER_BUFFER_POOL_SIZE
    }

    /// Ring predecessor of `index`.
    #[inline]
    pub fn prev(&self, index: usize) -> usize {
        (index + PLANNER_BUFFER_POOL_SIZE - 1) % PLANNER_BUFFER_POOL_SIZE
    }

    #[inline]
    pub fn block(&self, index: usize) -> &Block {
        &self.blocks[index]
    }

    #[inline]
    pub fn block_mut(&mut self, index: usize) -> &mut Block {
        &mut self.blocks[index]
    }

    /// Check out the next write slot, or `None` if the ring is full.
    ///
    /// The returned block is cleared and marked `Prepped`.
    pub fn get_write(&mut self) -> Option<usize> {
        if self.available == 0 {
            return None;
        }
        let index = self.w;
        debug_assert_eq!(self.blocks[index].state, BlockState::Empty);
        self.available -= 1;
        let block = &mut self.blocks[index];
        block.clear();
        block.state = BlockState::Prepped;
        self.w = self.next(self.w);
        Some(index)
    }

    /// Commit a checked-out block into the queue.
    pub fn commit_write(&mut self, index: usize) {
        debug_assert_eq!(self.blocks[index].state, BlockState::Prepped);
        self.blocks[index].state = if index == self.r {
            BlockState::Pending
        } else {
            BlockState::Queued
        };
    }

    /// Claim the run block: promotes a `Queued`/`Pending` block at the run
    /// pointer to `Running`, or returns the already-running block.
    pub fn run_block(&mut self) -> Option<usize> {
        let block = &mut self.blocks[self.r];
        match block.state {
            BlockState::Running => Some(self.r),
            BlockState::Queued | BlockState::Pending => {
                block.state = BlockState::Running;
                block.replannable = false;
                Some(self.r)
            }
            _ => None,
        }
    }

    /// Release the run block and advance the run pointer.
    ///
    /// The successor, if queued, becomes `Pending`.
    pub fn free_run(&mut self) {
        debug_assert_eq!(self.blocks[self.r].state, BlockState::Running);
        self.blocks[self.r].clear();
        self.available += 1;
        self.r = self.next(self.r);
        if self.blocks[self.r].state == BlockState::Queued {
            self.blocks[self.r].state = BlockState::Pending;
        }
    }

    /// Index of the most recently committed block, if any.
    pub fn newest(&self) -> Option<usize> {
        if self.is_empty() {
            return None;
        }
        Some(self.prev(self.w))
    }

    /// Index of the run-pointer block if it holds queued or running work.
    pub fn first(&self) -> Option<usize> {
        match self.blocks[self.r].state {
            BlockState::Empty | BlockState::Prepped => None,
            _ => Some(self.r),
        }
    }

    /// Iterate occupied blocks in ring order, oldest first.
    pub fn occupied(&self) -> impl Iterator<Item = (usize, &Block)> {
        let count = PLANNER_BUFFER_POOL_SIZE - self.available;
        let start = self.r;
        (0..count).map(move |i| {
            let index = (start + i) % PLANNER_BUFFER_POOL_SIZE;
            (index, &self.blocks[index])
        })
    }

    /// Drop every block and reset the pointers.
    pub fn flush(&mut self) {
        for block in &mut self.blocks {
            block.clear();
        }
        self.w = 0;
        self.r = 0;
        self.available = PLANNER_BUFFER_POOL_SIZE;
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
