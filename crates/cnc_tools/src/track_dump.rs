//! Drive track dumper.
//!
//! Prints track control entries with their raw tracks transformed into
//! the direction of travel, as leptons relative to the destination cell
//! centre. Useful for eyeballing a turn after editing the track tables.

use std::io::Write;

use cnc_core::math::FacingType;
use cnc_core::tracks::{transform_step, turn_track, TurnTrack, TRACK_CONTROL};

use crate::error::{Result, ToolError};

/// Write control entry `number`, or every entry when `None`.
///
/// # Errors
///
/// Returns [`ToolError::NoSuchTrack`] for an unknown entry or an IO error
/// from `out`.
pub fn dump_tracks<W: Write>(out: &mut W, number: Option<usize>, short: bool) -> Result<()> {
    match number {
        Some(n) => {
            let entry = turn_track(n).ok_or(ToolError::NoSuchTrack(n))?;
            dump_entry(out, n, entry, short)
        }
        None => {
            for (n, entry) in TRACK_CONTROL.iter().enumerate() {
                dump_entry(out, n, entry, short)?;
            }
            Ok(())
        }
    }
}

fn entry_label(n: usize) -> String {
    if n < 64 {
        let facing = FacingType::from_index((n / 8) as u8);
        let next = FacingType::from_index((n % 8) as u8);
        format!("{facing:?} -> {next:?}")
    } else {
        format!("special {n}")
    }
}

fn dump_entry<W: Write>(out: &mut W, n: usize, entry: &TurnTrack, short: bool) -> Result<()> {
    if !entry.exists() {
        writeln!(out, "#{n:02} {}: none", entry_label(n))?;
        return Ok(());
    }
    let Some(raw) = entry.raw(short) else {
        writeln!(out, "#{n:02} {}: no short track", entry_label(n))?;
        return Ok(());
    };
    writeln!(
        out,
        "#{n:02} {}: raw {} flags {:?} ends facing {}{}",
        entry_label(n),
        if short { entry.start_track } else { entry.track },
        entry.flags,
        entry.facing.0,
        if entry.is_double() { " (two cells)" } else { "" }
    )?;
    for (i, step) in raw.steps.iter().enumerate() {
        let (x, y, facing) = transform_step(step.x, step.y, step.facing, entry.flags);
        let mut marks = String::new();
        if raw.jump == Some(i) {
            marks.push_str(" jump");
        }
        if raw.entry == Some(i) {
            marks.push_str(" entry");
        }
        if raw.cell == Some(i) {
            marks.push_str(" cell");
        }
        writeln!(out, "    {i:3}: ({x:5}, {y:5}) facing {:3}{marks}", facing.0)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cnc_core::tracks::track_number;

    fn dump(number: Option<usize>, short: bool) -> String {
        let mut out = Vec::new();
        dump_tracks(&mut out, number, short).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_straight_north_ends_at_origin() {
        let n = track_number(FacingType::N, FacingType::N);
        let text = dump(Some(n), false);
        assert!(text.starts_with(&format!("#{n:02} N -> N")));
        assert!(text.lines().last().unwrap().contains("(    0,     0)"));
    }

    #[test]
    fn test_dump_all_lists_every_entry() {
        let text = dump(None, false);
        let headers = text.lines().filter(|l| l.starts_with('#')).count();
        assert_eq!(headers, TRACK_CONTROL.len());
    }

    #[test]
    fn test_unknown_entry() {
        let mut out = Vec::new();
        assert!(matches!(
            dump_tracks(&mut out, Some(500), false),
            Err(ToolError::NoSuchTrack(500))
        ));
    }
}
