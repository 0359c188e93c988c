//! Instruction stream merging.
//!
//! The two queues run concurrently on hardware; a replay needs them in one
//! sequence. Commands of the secondary queue are keyed by the primary-queue
//! id they wait on and slotted in after that command. System instructions
//! split both streams into segments: segment `i` of each queue is merged,
//! then both closing sync instructions are emitted as a barrier.

use tdb_target::{CmdQueue, TpuCmd};

/// Chip-specific merge parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeRule {
    /// Queue whose commands are placed by their own id.
    pub primary: CmdQueue,
    /// Drop the end-of-stream system instruction of each queue.
    pub strip_trailing_sys: bool,
}

#[derive(Debug, Default)]
struct Segment {
    body: Vec<TpuCmd>,
    sync: Option<TpuCmd>,
}

/// Merge `tiu` and `dma` according to `rule`, using `is_sys` to find sync
/// points.
pub fn merge_streams(
    rule: MergeRule,
    tiu: Vec<TpuCmd>,
    dma: Vec<TpuCmd>,
    is_sys: impl Fn(&TpuCmd) -> bool,
) -> Vec<TpuCmd> {
    let (mut primary, mut secondary) = match rule.primary {
        CmdQueue::Tiu => (tiu, dma),
        CmdQueue::Dma => (dma, tiu),
    };
    if rule.strip_trailing_sys {
        strip_trailing(&mut primary, &is_sys);
        strip_trailing(&mut secondary, &is_sys);
    }

    let mut out = Vec::with_capacity(primary.len() + secondary.len());
    let primary = split(primary, &is_sys);
    let secondary = split(secondary, &is_sys);
    let rounds = primary.len().max(secondary.len());

    let mut primary = primary.into_iter();
    let mut secondary = secondary.into_iter();
    for _ in 0..rounds {
        let p = primary.next().unwrap_or_default();
        let s = secondary.next().unwrap_or_default();
        merge_by_dependency(p.body, s.body, &mut out);
        out.extend(p.sync);
        out.extend(s.sync);
    }
    out
}

fn strip_trailing(cmds: &mut Vec<TpuCmd>, is_sys: &impl Fn(&TpuCmd) -> bool) {
    if cmds.last().is_some_and(is_sys) {
        cmds.pop();
    }
}

fn split(cmds: Vec<TpuCmd>, is_sys: &impl Fn(&TpuCmd) -> bool) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut current = Segment::default();
    for cmd in cmds {
        if is_sys(&cmd) {
            current.sync = Some(cmd);
            segments.push(std::mem::take(&mut current));
        } else {
            current.body.push(cmd);
        }
    }
    if !current.body.is_empty() {
        segments.push(current);
    }
    segments
}

/// Emit each secondary command after every pending primary command whose id
/// is at or below its dependency. Ties go to the primary queue.
fn merge_by_dependency(primary: Vec<TpuCmd>, secondary: Vec<TpuCmd>, out: &mut Vec<TpuCmd>) {
    let mut primary = primary.into_iter().peekable();
    for cmd in secondary {
        while let Some(head) = primary.next_if(|p| p.cmd_id <= cmd.cmd_id_dep) {
            out.push(head);
        }
        out.push(cmd);
    }
    out.extend(primary);
}
