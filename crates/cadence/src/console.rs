//! Line-oriented control console over stdin.

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};

use crate::app::App;
use crate::error::{Error, Result};
use crate::registry::{ActionTag, LoopAction};
use crate::render::format_log;

pub const HELP: &str = "\
commands:
  like | view | follow | test      run one action
  start | stop                     start or stop the loop
  select <like|view|follow>        action the loop runs
  interval <1-3600>                loop interval in seconds
  set video <id> | set user <id>   targets
  set <credential> <value>         session_id, session_key, csrf_token, auth_token, device_id
  logs | clear | status | help | quit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Run(ActionTag),
    Start,
    Stop,
    Select(LoopAction),
    Interval(u64),
    SetVideo(String),
    SetUser(String),
    SetCredential { field: String, value: String },
    Logs,
    Clear,
    Status,
    Help,
    Quit,
}

pub fn parse_command(line: &str) -> Result<Option<Command>> {
    let mut words = line.split_whitespace();
    let Some(head) = words.next() else {
        return Ok(None);
    };
    let rest: Vec<&str> = words.collect();
    let cmd = match (head.to_ascii_lowercase().as_str(), rest.as_slice()) {
        ("like" | "view" | "follow" | "test", []) => Command::Run(head.parse()?),
        ("start", []) => Command::Start,
        ("stop", []) => Command::Stop,
        ("select", [action]) => Command::Select(action.parse()?),
        ("interval", [secs]) => Command::Interval(
            secs.parse()
                .map_err(|_| Error::msg(format!("invalid interval '{secs}'")))?,
        ),
        ("set", ["video", id]) => Command::SetVideo(id.to_string()),
        ("set", ["user", id]) => Command::SetUser(id.to_string()),
        ("set", [field, value]) => Command::SetCredential {
            field: field.to_string(),
            value: value.to_string(),
        },
        // Clearing a field.
        ("set", [field]) => Command::SetCredential {
            field: field.to_string(),
            value: String::new(),
        },
        ("logs", []) => Command::Logs,
        ("clear", []) => Command::Clear,
        ("status", []) => Command::Status,
        ("help" | "?", []) => Command::Help,
        ("quit" | "exit", []) => Command::Quit,
        _ => return Err(Error::msg(format!("unrecognized command: {}", line.trim()))),
    };
    Ok(Some(cmd))
}

fn status_line(app: &App) -> String {
    let form = app.form();
    format!(
        "loop: {} | action: {} | interval: {}s | video: {} | user: {}",
        if app.is_looping() { "running" } else { "idle" },
        app.selected_action(),
        app.loop_interval_seconds(),
        if form.video_id.is_empty() { "-" } else { form.video_id.as_str() },
        if form.user_id.is_empty() { "-" } else { form.user_id.as_str() },
    )
}

/// Applies one command. Returns `false` when the console should exit.
pub fn apply(app: &Arc<App>, cmd: Command) -> Result<bool> {
    match cmd {
        Command::Run(tag) => {
            // Single shots never wait on each other or on the loop.
            let app = Arc::clone(app);
            tokio::spawn(async move {
                app.on_action(tag).await;
            });
        }
        Command::Start => {
            if !app.on_start_loop() {
                println!("loop already running");
            }
        }
        Command::Stop => {
            if !app.on_stop_loop() {
                println!("loop is not running");
            }
        }
        Command::Select(action) => app.select_action(action),
        Command::Interval(secs) => app.set_loop_interval(secs)?,
        Command::SetVideo(id) => app.set_video_id(id),
        Command::SetUser(id) => app.set_user_id(id),
        Command::SetCredential { field, value } => app.set_credential(&field, value)?,
        Command::Logs => print!("{}", format_log(&app.logs(), false)),
        Command::Clear => app.on_clear_logs(),
        Command::Status => println!("{}", status_line(app)),
        Command::Help => println!("{HELP}"),
        Command::Quit => return Ok(false),
    }
    Ok(true)
}

pub async fn run(app: Arc<App>) -> Result<()> {
    println!("{HELP}");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let cmd = match parse_command(&line) {
            Ok(Some(cmd)) => cmd,
            Ok(None) => continue,
            Err(e) => {
                println!("{e}");
                continue;
            }
        };
        match apply(&app, cmd) {
            Ok(true) => {}
            Ok(false) => break,
            Err(e) => println!("{e}"),
        }
    }
    app.on_stop_loop();
    Ok(())
}
