use std::io::{self, BufRead, Write};

use audio_focus_core::{status_of, PolicyTransport};

/// Interactive zone administration over any `PolicyTransport`.
///
/// Each round reads a command (0 create, 1 add pid, 2 remove pid,
/// 3 release), a zone id and, except for release, one pid. It prints the
/// resulting status code and asks whether to exit. EOF ends the session.
pub fn run_zone_repl<R: BufRead, W: Write>(
    mut input: R,
    mut output: W,
    transport: &dyn PolicyTransport,
) -> io::Result<()> {
    loop {
        writeln!(
            output,
            "Select command: 0 create zone, 1 add pid, 2 remove pid, 3 release zone"
        )?;
        let Some(command) = read_number(&mut input, &mut output, "command")? else {
            return Ok(());
        };
        if !(0..=3).contains(&command) {
            writeln!(output, "unknown command {}", command)?;
            continue;
        }

        let Some(zone_id) = read_number(&mut input, &mut output, "zone id")? else {
            return Ok(());
        };

        let status = if command == 3 {
            status_of(&transport.release_zone(zone_id))
        } else {
            let Some(pid) = read_number(&mut input, &mut output, "pid")? else {
                return Ok(());
            };
            let pids = [pid];
            let result = match command {
                0 => transport.create_zone(zone_id, &pids),
                1 => transport.add_zone_pids(zone_id, &pids),
                _ => transport.remove_zone_pids(zone_id, &pids),
            };
            if let Err(e) = &result {
                log::warn!("zone command {} failed: {}", command, e);
            }
            status_of(&result)
        };
        writeln!(output, "result: {}", status)?;

        writeln!(output, "Do you want to exit: y/n?")?;
        let mut answer = String::new();
        if input.read_line(&mut answer)? == 0 || answer.trim().eq_ignore_ascii_case("y") {
            return Ok(());
        }
    }
}

/// Prompt until a decimal number is entered. `None` on EOF.
fn read_number<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    what: &str,
) -> io::Result<Option<i32>> {
    loop {
        write!(output, "{}: ", what)?;
        output.flush()?;
        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        match line.trim().parse::<i32>() {
            Ok(n) => return Ok(Some(n)),
            Err(_) => writeln!(output, "not a number: {:?}", line.trim())?,
        }
    }
}
