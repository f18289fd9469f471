//! 8N1 decoder over a wire transition trace.
//!
//! Replays a [`Wire`](crate::Wire) trace the way a logic analyzer would:
//! each frame opens on a falling edge, and every bit is sampled at the
//! center of its slot relative to that edge. The decoder shares no code
//! with the receiver under test.

/// Line level at absolute time `t`, given the transition trace and the
/// idle-high level before the first transition.
fn level_at(trace: &[(u64, bool)], t: u64) -> bool {
    let mut level = true;
    for &(at, new_level) in trace {
        if at > t {
            break;
        }
        level = new_level;
    }
    level
}

/// Decode every complete frame in `trace`.
///
/// Bit `k` of a frame whose start edge falls at `t` is sampled at
/// `t + (k + 1.5) * bit_period`, the stop bit at `t + 9.5` periods. Frames
/// whose stop bit samples low are dropped, the same policy the receiver
/// applies.
pub fn decode_line(trace: &[(u64, bool)], bit_period_ns: u64) -> Vec<u8> {
    let mut bytes = Vec::new();
    let mut busy_until = 0u64;
    for &(at, new_level) in trace {
        if new_level || at < busy_until {
            continue;
        }
        let mut byte = 0u8;
        for bit in 0..8u64 {
            let sample_at = at + bit_period_ns + bit_period_ns / 2 + bit * bit_period_ns;
            if level_at(trace, sample_at) {
                byte |= 1 << bit;
            }
        }
        let stop_at = at + 9 * bit_period_ns + bit_period_ns / 2;
        if level_at(trace, stop_at) {
            bytes.push(byte);
        }
        busy_until = stop_at;
    }
    bytes
}
