//! Line-oriented operator console: turns typed lines into session intents.

use crate::live_session::UserIntent;
use crate::live_session::command_dispatcher::{
    ActuatorForm, Authority, HeaterManualForm, HeaterRandomForm,
};
use labstand_shared::ControlMode;
use std::path::PathBuf;

pub const HELP: &str = "\
commands:
  heater <power>                         manual heater power
  random [min max on_min on_max off_min off_max]
                                         randomized heater (missing fields use defaults)
  stop                                   stop the heater
  drain open|close                       drain valve
  actuators <pump> <fan1> <fan2> <fan3>  teacher actuator levels
  student-actuators <pump> <fan1> <fan2> <fan3>
  mode baseline|student                  switch control mode
  refresh                                re-read the control mode
  upload [path] [--board FQBN] [--sketch MAIN]
  help
  quit";

#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleCommand {
    Intent(UserIntent),
    /// File reading happens outside the parser; `path: None` still submits
    /// so the session can answer "choose a file".
    Upload {
        path: Option<PathBuf>,
        board_fqbn: String,
        sketch_main: String,
    },
    Help,
    Quit,
}

fn field(args: &[&str], i: usize) -> String {
    args.get(i).map(|s| s.to_string()).unwrap_or_default()
}

fn actuator_form(args: &[&str]) -> ActuatorForm {
    ActuatorForm {
        pump: field(args, 0),
        fan: [field(args, 1), field(args, 2), field(args, 3)],
    }
}

fn parse_upload(args: &[&str]) -> Result<ConsoleCommand, String> {
    let mut path = None;
    let mut board_fqbn = String::new();
    let mut sketch_main = String::new();

    let mut it = args.iter();
    while let Some(arg) = it.next() {
        match *arg {
            "--board" => {
                board_fqbn = it
                    .next()
                    .ok_or("--board needs a value")?
                    .to_string();
            }
            "--sketch" => {
                sketch_main = it
                    .next()
                    .ok_or("--sketch needs a value")?
                    .to_string();
            }
            other if path.is_none() => path = Some(PathBuf::from(other)),
            other => return Err(format!("unexpected argument '{other}'")),
        }
    }

    Ok(ConsoleCommand::Upload {
        path,
        board_fqbn,
        sketch_main,
    })
}

/// Parses one line. Blank lines give `Ok(None)`.
pub fn parse_line(line: &str) -> Result<Option<ConsoleCommand>, String> {
    let words: Vec<&str> = line.split_whitespace().collect();
    let Some((&cmd, args)) = words.split_first() else {
        return Ok(None);
    };

    let command = match cmd.to_ascii_lowercase().as_str() {
        "heater" | "power" => ConsoleCommand::Intent(UserIntent::HeaterManual(HeaterManualForm {
            power: field(args, 0),
        })),
        "random" => ConsoleCommand::Intent(UserIntent::HeaterRandom(HeaterRandomForm {
            min: field(args, 0),
            max: field(args, 1),
            on_min_s: field(args, 2),
            on_max_s: field(args, 3),
            off_min_s: field(args, 4),
            off_max_s: field(args, 5),
        })),
        "stop" => ConsoleCommand::Intent(UserIntent::HeaterStop),
        "drain" => {
            let open = match args.first().map(|s| s.to_ascii_lowercase()).as_deref() {
                Some("open") => true,
                Some("close") | Some("closed") => false,
                _ => return Err("usage: drain open|close".to_string()),
            };
            ConsoleCommand::Intent(UserIntent::DrainValve { open })
        }
        "actuators" => ConsoleCommand::Intent(UserIntent::Actuators {
            authority: Authority::Teacher,
            form: actuator_form(args),
        }),
        "student-actuators" => ConsoleCommand::Intent(UserIntent::Actuators {
            authority: Authority::Student,
            form: actuator_form(args),
        }),
        "mode" => {
            let raw = args.first().ok_or("usage: mode baseline|student")?;
            let mode = raw.parse::<ControlMode>().map_err(|e| e.to_string())?;
            ConsoleCommand::Intent(UserIntent::SetMode(mode))
        }
        "refresh" => ConsoleCommand::Intent(UserIntent::RefreshMode),
        "upload" => parse_upload(args)?,
        "help" | "?" => ConsoleCommand::Help,
        "quit" | "exit" => ConsoleCommand::Quit,
        other => return Err(format!("unknown command '{other}' (try 'help')")),
    };

    Ok(Some(command))
}
