//! Line-oriented keyframe streams.

use crate::world::Keyframe;
use std::io::{BufRead, Write};

/// Append one keyframe as a JSON line.
pub fn write_keyframe<W: Write>(out: &mut W, keyframe: &Keyframe) -> Result<(), serde_json::Error> {
    serde_json::to_writer(&mut *out, keyframe)?;
    out.write_all(b"\n").map_err(serde_json::Error::io)
}

/// Read every keyframe from a stream, skipping blank lines.
pub fn read_keyframes<R: BufRead>(input: R) -> Result<Vec<Keyframe>, serde_json::Error> {
    let mut keyframes = Vec::new();
    for line in input.lines() {
        let line = line.map_err(serde_json::Error::io)?;
        if line.trim().is_empty() {
            continue;
        }
        keyframes.push(Keyframe::from_json_line(&line)?);
    }
    Ok(keyframes)
}
