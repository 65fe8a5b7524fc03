//! Line-oriented operator commands.
//!
//! One command per line, whitespace separated, double quotes group words:
//!
//! ```text
//! semester add "Fall 2024" 2024-08-26 2024-12-20
//! room add 101 1 capacity=4 position=0
//! area add "Front garden" position=0
//! generate 2024-09-04 rest=2
//! ```

use std::collections::HashMap;

use chrono::NaiveDate;
use ulid::Ulid;

use crate::calendar::{parse_date, today_utc};
use crate::engine::{AreaPatch, RoomPatch};

#[derive(Debug, PartialEq)]
pub enum Command {
    SemesterAdd {
        name: String,
        starts_on: NaiveDate,
        ends_on: NaiveDate,
    },
    SemesterActivate {
        id: Ulid,
    },
    SemesterActive,
    SemesterList,
    RoomAdd {
        label: String,
        level: i32,
        capacity: u32,
        position: i32,
    },
    RoomUpdate {
        id: Ulid,
        patch: RoomPatch,
    },
    RoomList,
    AreaAdd {
        name: String,
        position: i32,
    },
    AreaUpdate {
        id: Ulid,
        patch: AreaPatch,
    },
    AreaSetActive {
        id: Ulid,
        active: bool,
    },
    AreaDelete {
        id: Ulid,
    },
    AreaList {
        include_inactive: bool,
    },
    WeekEnsure {
        date: NaiveDate,
        rest_level: Option<i32>,
    },
    WeekRest {
        week_id: Ulid,
        rest_level: i32,
    },
    WeekShow {
        date: NaiveDate,
    },
    Generate {
        date: NaiveDate,
        rest_level: Option<i32>,
    },
    Assign {
        week_id: Ulid,
        room_id: Ulid,
        area_id: Ulid,
    },
    Clear {
        week_id: Ulid,
        room_id: Ulid,
    },
    ExceptionSet {
        date: NaiveDate,
        reason: Option<String>,
    },
    ExceptionRemove {
        date: NaiveDate,
    },
    ExceptionList {
        from: NaiveDate,
        to: NaiveDate,
    },
    History,
    Compact,
}

/// Parse one line. Blank lines and `#` comments yield `CommandError::Empty`.
pub fn parse_command(line: &str) -> Result<Command, CommandError> {
    let tokens = tokenize(line)?;
    let Some((head, rest)) = tokens.split_first() else {
        return Err(CommandError::Empty);
    };
    let (args, opts) = split_options(rest);

    match head.to_lowercase().as_str() {
        "semester" => parse_semester(&args, &opts),
        "room" => parse_room(&args, &opts),
        "area" => parse_area(&args, &opts),
        "week" => parse_week(&args, &opts),
        "generate" => {
            arity("generate", &args, 1)?;
            Ok(Command::Generate {
                date: date_arg(&args[0])?,
                rest_level: opt_i32(&opts, "rest")?,
            })
        }
        "assign" => {
            arity("assign", &args, 3)?;
            Ok(Command::Assign {
                week_id: ulid_arg(&args[0])?,
                room_id: ulid_arg(&args[1])?,
                area_id: ulid_arg(&args[2])?,
            })
        }
        "clear" => {
            arity("clear", &args, 2)?;
            Ok(Command::Clear {
                week_id: ulid_arg(&args[0])?,
                room_id: ulid_arg(&args[1])?,
            })
        }
        "exception" => parse_exception(&args),
        "history" => Ok(Command::History),
        "compact" => Ok(Command::Compact),
        other => Err(CommandError::Unknown(other.to_string())),
    }
}

fn parse_semester(args: &[String], _opts: &Options) -> Result<Command, CommandError> {
    match sub(args)? {
        "add" => {
            arity("semester add", &args[1..], 3)?;
            Ok(Command::SemesterAdd {
                name: args[1].clone(),
                starts_on: date_arg(&args[2])?,
                ends_on: date_arg(&args[3])?,
            })
        }
        "activate" => {
            arity("semester activate", &args[1..], 1)?;
            Ok(Command::SemesterActivate { id: ulid_arg(&args[1])? })
        }
        "active" => Ok(Command::SemesterActive),
        "list" => Ok(Command::SemesterList),
        other => Err(CommandError::Unknown(format!("semester {other}"))),
    }
}

fn parse_room(args: &[String], opts: &Options) -> Result<Command, CommandError> {
    match sub(args)? {
        "add" => {
            arity("room add", &args[1..], 2)?;
            Ok(Command::RoomAdd {
                label: args[1].clone(),
                level: parse_i32(&args[2])?,
                capacity: opt_u32(opts, "capacity")?.unwrap_or(1),
                position: opt_i32(opts, "position")?.unwrap_or(0),
            })
        }
        "update" => {
            arity("room update", &args[1..], 1)?;
            let patch = RoomPatch {
                label: opts.get("label").cloned(),
                capacity: opt_u32(opts, "capacity")?,
                level: opt_i32(opts, "level")?,
                position: opt_i32(opts, "position")?,
            };
            if patch == RoomPatch::default() {
                return Err(CommandError::Parse(
                    "room update needs label=, capacity=, level= or position=".into(),
                ));
            }
            Ok(Command::RoomUpdate { id: ulid_arg(&args[1])?, patch })
        }
        "list" => Ok(Command::RoomList),
        other => Err(CommandError::Unknown(format!("room {other}"))),
    }
}

fn parse_area(args: &[String], opts: &Options) -> Result<Command, CommandError> {
    match sub(args)? {
        "add" => {
            arity("area add", &args[1..], 1)?;
            Ok(Command::AreaAdd {
                name: args[1].clone(),
                position: opt_i32(opts, "position")?.unwrap_or(0),
            })
        }
        "rename" => {
            arity("area rename", &args[1..], 2)?;
            Ok(Command::AreaUpdate {
                id: ulid_arg(&args[1])?,
                patch: AreaPatch {
                    name: Some(args[2].clone()),
                    position: None,
                },
            })
        }
        "move" => {
            arity("area move", &args[1..], 2)?;
            Ok(Command::AreaUpdate {
                id: ulid_arg(&args[1])?,
                patch: AreaPatch {
                    name: None,
                    position: Some(parse_i32(&args[2])?),
                },
            })
        }
        verb @ ("enable" | "disable") => {
            arity("area enable/disable", &args[1..], 1)?;
            Ok(Command::AreaSetActive {
                id: ulid_arg(&args[1])?,
                active: verb == "enable",
            })
        }
        "delete" => {
            arity("area delete", &args[1..], 1)?;
            Ok(Command::AreaDelete { id: ulid_arg(&args[1])? })
        }
        "list" => Ok(Command::AreaList {
            include_inactive: args.get(1).is_some_and(|a| a == "all"),
        }),
        other => Err(CommandError::Unknown(format!("area {other}"))),
    }
}

fn parse_week(args: &[String], opts: &Options) -> Result<Command, CommandError> {
    match sub(args)? {
        "ensure" => {
            arity("week ensure", &args[1..], 1)?;
            Ok(Command::WeekEnsure {
                date: date_arg(&args[1])?,
                rest_level: opt_i32(opts, "rest")?,
            })
        }
        "rest" => {
            arity("week rest", &args[1..], 2)?;
            Ok(Command::WeekRest {
                week_id: ulid_arg(&args[1])?,
                rest_level: parse_i32(&args[2])?,
            })
        }
        "show" => {
            arity("week show", &args[1..], 1)?;
            Ok(Command::WeekShow { date: date_arg(&args[1])? })
        }
        other => Err(CommandError::Unknown(format!("week {other}"))),
    }
}

fn parse_exception(args: &[String]) -> Result<Command, CommandError> {
    match sub(args)? {
        "set" => {
            arity("exception set", &args[1..], 1)?;
            let reason = args[2..].join(" ");
            Ok(Command::ExceptionSet {
                date: date_arg(&args[1])?,
                reason: if reason.is_empty() { None } else { Some(reason) },
            })
        }
        "remove" => {
            arity("exception remove", &args[1..], 1)?;
            Ok(Command::ExceptionRemove { date: date_arg(&args[1])? })
        }
        "list" => {
            arity("exception list", &args[1..], 2)?;
            Ok(Command::ExceptionList {
                from: date_arg(&args[1])?,
                to: date_arg(&args[2])?,
            })
        }
        other => Err(CommandError::Unknown(format!("exception {other}"))),
    }
}

// ── Tokens ────────────────────────────────────────────────────

type Options = HashMap<String, String>;

/// Split on whitespace, keeping double-quoted runs together. `#` starts a comment.
fn tokenize(line: &str) -> Result<Vec<String>, CommandError> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut quoted = false;

    for c in line.chars() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                quoted = true;
            }
            '#' if !in_quotes => break,
            c if c.is_whitespace() && !in_quotes => {
                if !current.is_empty() || quoted {
                    tokens.push(std::mem::take(&mut current));
                }
                quoted = false;
            }
            c => current.push(c),
        }
    }
    if in_quotes {
        return Err(CommandError::Parse("unterminated quote".into()));
    }
    if !current.is_empty() || quoted {
        tokens.push(current);
    }
    Ok(tokens)
}

/// Separate `key=value` options from positional arguments.
fn split_options(tokens: &[String]) -> (Vec<String>, Options) {
    let mut args = Vec::new();
    let mut opts = HashMap::new();
    for t in tokens {
        match t.split_once('=') {
            Some((k, v)) if !k.is_empty() && !k.contains(' ') => {
                opts.insert(k.to_lowercase(), v.to_string());
            }
            _ => args.push(t.clone()),
        }
    }
    (args, opts)
}

fn sub(args: &[String]) -> Result<&str, CommandError> {
    args.first()
        .map(|s| s.as_str())
        .ok_or(CommandError::Parse("missing subcommand".into()))
}

fn arity(what: &'static str, args: &[String], expected: usize) -> Result<(), CommandError> {
    if args.len() < expected {
        return Err(CommandError::WrongArity(what, expected, args.len()));
    }
    Ok(())
}

/// `YYYY-MM-DD`, or `today` in UTC.
fn date_arg(s: &str) -> Result<NaiveDate, CommandError> {
    if s.eq_ignore_ascii_case("today") {
        return Ok(today_utc());
    }
    parse_date(s).ok_or_else(|| CommandError::Parse(format!("expected YYYY-MM-DD, got {s}")))
}

fn ulid_arg(s: &str) -> Result<Ulid, CommandError> {
    Ulid::from_string(s).map_err(|e| CommandError::Parse(format!("bad id {s}: {e}")))
}

fn parse_i32(s: &str) -> Result<i32, CommandError> {
    s.parse()
        .map_err(|_| CommandError::Parse(format!("expected integer, got {s}")))
}

fn opt_i32(opts: &Options, key: &str) -> Result<Option<i32>, CommandError> {
    opts.get(key).map(|v| parse_i32(v)).transpose()
}

fn opt_u32(opts: &Options, key: &str) -> Result<Option<u32>, CommandError> {
    opts.get(key)
        .map(|v| {
            v.parse()
                .map_err(|_| CommandError::Parse(format!("{key}: expected non-negative integer, got {v}")))
        })
        .transpose()
}

// ── Errors ────────────────────────────────────────────────────

#[derive(Debug)]
pub enum CommandError {
    Parse(String),
    Empty,
    Unknown(String),
    WrongArity(&'static str, usize, usize),
}

impl std::fmt::Display for CommandError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommandError::Parse(s) => write!(f, "parse error: {s}"),
            CommandError::Empty => write!(f, "empty command"),
            CommandError::Unknown(s) => write!(f, "unknown command: {s}"),
            CommandError::WrongArity(what, expected, got) => {
                write!(f, "{what}: expected {expected} arguments, got {got}")
            }
        }
    }
}

impl std::error::Error for CommandError {}
