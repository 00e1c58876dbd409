//! Line-oriented SDP parsing and rewrite utilities.
//!
//! The parser is deliberately tolerant and line-oriented rather than a
//! full SDP grammar, per spec.md §9's design note: "the current parser is
//! line-oriented and tolerant. Implementations must preserve media-line
//! order and avoid rewriting attributes outside the target audio block."

const DIRECTION_ATTRS: [&str; 4] = ["a=sendrecv", "a=sendonly", "a=recvonly", "a=inactive"];

/// Media direction as carried by an `a=` attribute on an audio `m=` line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    SendRecv,
    SendOnly,
    RecvOnly,
    Inactive,
}

impl Direction {
    pub fn attr_line(self) -> &'static str {
        match self {
            Direction::SendRecv => "a=sendrecv",
            Direction::SendOnly => "a=sendonly",
            Direction::RecvOnly => "a=recvonly",
            Direction::Inactive => "a=inactive",
        }
    }
}

/// Splits an SDP body into lines, tolerating both `\n` and `\r\n`.
fn lines(sdp: &str) -> Vec<&str> {
    sdp.lines().collect()
}

/// Classifies an offer per spec.md §4.5 step 3: the first matching
/// attribute in document order determines the hold classification.
/// `None` means no hold indication was present.
pub fn classify_hold(sdp: &str) -> Option<Direction> {
    for line in lines(sdp) {
        let trimmed = line.trim();
        if trimmed == "a=sendonly" {
            return Some(Direction::SendOnly);
        }
        if trimmed == "a=recvonly" {
            return Some(Direction::RecvOnly);
        }
        if trimmed == "a=inactive" {
            return Some(Direction::Inactive);
        }
        if trimmed.starts_with("c=IN IP4 0.0.0.0") {
            return Some(Direction::Inactive);
        }
    }
    None
}

/// Finds the index of the first `m=audio ...` line, if any.
fn first_audio_mline(all_lines: &[&str]) -> Option<usize> {
    all_lines.iter().position(|l| l.trim_start().starts_with("m=audio"))
}

/// Finds the end (exclusive) of the media section starting at `start`
/// (the index right after the `m=` line): the index of the next `m=`
/// line, or the end of the document.
fn media_section_end(all_lines: &[&str], start: usize) -> usize {
    all_lines[start..]
        .iter()
        .position(|l| l.trim_start().starts_with("m="))
        .map(|offset| start + offset)
        .unwrap_or(all_lines.len())
}

/// Rewrites the direction attribute on the first audio media section.
///
/// Removes any existing `a=(sendrecv|sendonly|recvonly|inactive)` line
/// within that section, inserts the requested direction immediately after
/// the `m=audio` line, leaves every other section untouched, and
/// normalises line endings to CRLF. If no audio media line exists the
/// attribute is appended at the end of the document instead.
///
/// Idempotent: calling this twice with the same `direction` yields the
/// same result as calling it once.
pub fn modify_direction(sdp: &str, direction: Direction) -> String {
    let all_lines = lines(sdp);

    let Some(mline_idx) = first_audio_mline(&all_lines) else {
        let mut out = all_lines.join("\r\n");
        if !out.is_empty() {
            out.push_str("\r\n");
        }
        out.push_str(direction.attr_line());
        out.push_str("\r\n");
        return out;
    };

    let section_end = media_section_end(&all_lines, mline_idx + 1);

    let mut out: Vec<&str> = Vec::with_capacity(all_lines.len() + 1);
    out.extend_from_slice(&all_lines[..=mline_idx]);
    out.push(direction.attr_line());
    for line in &all_lines[mline_idx + 1..section_end] {
        if DIRECTION_ATTRS.contains(&line.trim()) {
            continue;
        }
        out.push(line);
    }
    out.extend_from_slice(&all_lines[section_end..]);

    let mut result = out.join("\r\n");
    result.push_str("\r\n");
    result
}

/// Inserts an arbitrary attribute line immediately after the first
/// `m=<media_type> ...` line (used by the SRTP subsystem to attach
/// `a=crypto:` lines). Appends at the end when no such media line exists.
pub fn insert_after_first_mline(sdp: &str, media_type: &str, new_line: &str) -> String {
    let all_lines = lines(sdp);
    let prefix = format!("m={media_type}");
    let Some(idx) = all_lines.iter().position(|l| l.trim_start().starts_with(&prefix)) else {
        let mut out = all_lines.join("\r\n");
        if !out.is_empty() {
            out.push_str("\r\n");
        }
        out.push_str(new_line);
        out.push_str("\r\n");
        return out;
    };

    let mut out: Vec<&str> = Vec::with_capacity(all_lines.len() + 1);
    out.extend_from_slice(&all_lines[..=idx]);
    out.push(new_line);
    out.extend_from_slice(&all_lines[idx + 1..]);

    let mut result = out.join("\r\n");
    result.push_str("\r\n");
    result
}

/// Replaces the first occurrence of ` RTP/AVP ` with ` RTP/SAVP ` on any
/// `m=` line, per spec.md §4.10's "secured" transport token requirement.
pub fn upgrade_to_savp(sdp: &str) -> String {
    sdp.replacen(" RTP/AVP ", " RTP/SAVP ", 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn crlf(s: &str) -> String {
        s.replace('\n', "\r\n")
    }

    #[test]
    fn classifies_sendonly() {
        let sdp = "v=0\r\nm=audio 5000 RTP/AVP 0\r\na=sendonly\r\n";
        assert_eq!(classify_hold(sdp), Some(Direction::SendOnly));
    }

    #[test]
    fn sendrecv_is_no_hold() {
        let sdp = "v=0\r\nm=audio 5000 RTP/AVP 0\r\na=sendrecv\r\n";
        assert_eq!(classify_hold(sdp), None);
    }

    #[test]
    fn legacy_hold_via_zero_connection() {
        let sdp = "v=0\r\nc=IN IP4 0.0.0.0\r\nm=audio 5000 RTP/AVP 0\r\n";
        assert_eq!(classify_hold(sdp), Some(Direction::Inactive));
    }

    #[test]
    fn rewrite_replaces_existing_direction() {
        let sdp = crlf("v=0\nm=audio 5000 RTP/AVP 0\na=sendonly\n");
        let out = modify_direction(&sdp, Direction::RecvOnly);
        assert!(out.contains("a=recvonly"));
        assert!(!out.contains("a=sendonly"));
        // direction line comes right after the m=audio line
        let idx_m = out.find("m=audio").unwrap();
        let idx_a = out.find("a=recvonly").unwrap();
        assert!(idx_a > idx_m);
    }

    #[test]
    fn rewrite_is_idempotent() {
        let sdp = crlf("v=0\nm=audio 5000 RTP/AVP 0\na=sendonly\n");
        let once = modify_direction(&sdp, Direction::RecvOnly);
        let twice = modify_direction(&once, Direction::RecvOnly);
        assert_eq!(once, twice);
    }

    #[test]
    fn only_first_audio_section_is_touched() {
        let sdp = crlf(
            "v=0\nm=audio 5000 RTP/AVP 0\na=sendonly\nm=audio 6000 RTP/AVP 0\na=sendonly\n",
        );
        let out = modify_direction(&sdp, Direction::RecvOnly);
        assert_eq!(out.matches("a=recvonly").count(), 1);
        assert_eq!(out.matches("a=sendonly").count(), 1);
    }
}
