use console::{Color, Term, style};
use std::io::{self, Write};

fn stdout_is_tty() -> bool {
    Term::stdout().is_term()
}

fn stderr_is_tty() -> bool {
    Term::stderr().is_term()
}

fn format_label(label: &str, color: Color, is_tty: bool) -> String {
    if is_tty {
        style(label).bold().fg(color).to_string()
    } else {
        label.to_string()
    }
}

fn write_labeled(
    indent: &str,
    label: &str,
    color: Color,
    msg: &str,
    w: &mut dyn Write,
    is_tty: bool,
) -> io::Result<()> {
    let label = format_label(label, color, is_tty);
    if msg.is_empty() {
        writeln!(w, "{indent}{label}")
    } else {
        writeln!(w, "{indent}{label} {msg}")
    }
}

/// Blank line, then a section heading such as `Alert Log for DB_UNIQUE_NAME: db1`.
pub fn heading_to_with_tty(w: &mut dyn Write, msg: &str, is_tty: bool) {
    let line = if is_tty {
        style(msg).bold().to_string()
    } else {
        msg.to_string()
    };
    let _ = writeln!(w);
    let _ = writeln!(w, "{line}");
}

/// `  - Host: db1; ORACLE_SID: sid1`
pub fn instance_to_with_tty(w: &mut dyn Write, host: &str, sid: &str, is_tty: bool) {
    let _ = write_labeled(
        "  ",
        "-",
        Color::Cyan,
        &format!("Host: {host}; ORACLE_SID: {sid}"),
        w,
        is_tty,
    );
}

/// `    => File: /path`
pub fn found_to_with_tty(w: &mut dyn Write, msg: &str, is_tty: bool) {
    let _ = write_labeled("    ", "=>", Color::Green, msg, w, is_tty);
}

/// `       Timestamp: ...` continuation under a found line.
pub fn detail_to_with_tty(w: &mut dyn Write, msg: &str, is_tty: bool) {
    let line = if is_tty {
        style(format!("       {msg}")).dim().to_string()
    } else {
        format!("       {msg}")
    };
    let _ = writeln!(w, "{line}");
}

/// `    => File not found`
pub fn missing_to_with_tty(w: &mut dyn Write, msg: &str, is_tty: bool) {
    let _ = write_labeled("    ", "=>", Color::Yellow, msg, w, is_tty);
}

/// `    error: ...`
pub fn fail_to_with_tty(w: &mut dyn Write, msg: &str, is_tty: bool) {
    let _ = write_labeled("    ", "error:", Color::Red, msg, w, is_tty);
}

/// Whether report lines written to stdout should be styled.
pub fn is_stdout_tty() -> bool {
    stdout_is_tty()
}

/// Top-level diagnostic on stderr, e.g. `error: config file ... not found`.
pub fn fatal(msg: &str) {
    let _ = write_labeled("", "error:", Color::Red, msg, &mut io::stderr(), stderr_is_tty());
}

pub fn note(msg: &str) {
    let _ = write_labeled("", "Note", Color::Yellow, msg, &mut io::stderr(), stderr_is_tty());
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn capture(f: impl FnOnce(&mut dyn Write)) -> String {
        let mut buf = Vec::new();
        f(&mut buf);
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_plain_lines_without_tty() {
        let out = capture(|w| {
            heading_to_with_tty(w, "Alert Log for DB_UNIQUE_NAME: db1", false);
            instance_to_with_tty(w, "h1", "sid1", false);
            found_to_with_tty(w, "Alert Log: /x/alert_sid1.log", false);
            detail_to_with_tty(w, "Timestamp: N/A", false);
            fail_to_with_tty(w, "boom", false);
            missing_to_with_tty(w, "Alert Log not found", false);
        });
        assert_eq!(
            out,
            "\nAlert Log for DB_UNIQUE_NAME: db1\n  - Host: h1; ORACLE_SID: sid1\n    => Alert Log: /x/alert_sid1.log\n       Timestamp: N/A\n    error: boom\n    => Alert Log not found\n"
        );
    }

    #[test]
    fn test_empty_message_writes_label_only() {
        let out = capture(|w| found_to_with_tty(w, "", false));
        assert_eq!(out, "    =>\n");
    }

    #[test]
    fn test_tty_output_keeps_message_text() {
        let out = capture(|w| fail_to_with_tty(w, "boom", true));
        assert!(out.contains("boom"));
        assert!(out.contains("error:"));
    }
}
