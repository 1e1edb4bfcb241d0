use anstyle::{AnsiColor, Style};
use is_terminal::IsTerminal;
use std::fmt::Display;
use std::io::{self, Write};
use std::time::{Duration, Instant};

const LABEL_WIDTH: usize = 10;

/// Deployment stage a status line reports on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Fetching,
    Fetched,
    Failed,
    Deployed,
    Idle,
}

impl Status {
    fn label(self) -> &'static str {
        match self {
            Status::Fetching => "Fetching",
            Status::Fetched => "Fetched",
            Status::Failed => "Failed",
            Status::Deployed => "Deployed",
            Status::Idle => "Idle",
        }
    }

    fn color(self) -> AnsiColor {
        match self {
            Status::Fetching => AnsiColor::Cyan,
            Status::Fetched | Status::Deployed => AnsiColor::Green,
            Status::Failed => AnsiColor::Red,
            Status::Idle => AnsiColor::Blue,
        }
    }

    fn on_stderr(self) -> bool {
        self == Status::Failed
    }
}

/// Print one status line; failures go to stderr, everything else to stdout.
pub fn report(status: Status, message: impl Display) {
    let message = message.to_string();
    let result = if status.on_stderr() {
        let colored = use_color(io::stderr().is_terminal());
        io::stderr()
            .lock()
            .write_all(render(status, &message, colored).as_bytes())
    } else {
        let colored = use_color(io::stdout().is_terminal());
        io::stdout()
            .lock()
            .write_all(render(status, &message, colored).as_bytes())
    };
    // best effort
    let _ = result;
}

fn use_color(is_terminal: bool) -> bool {
    is_terminal && std::env::var_os("NO_COLOR").is_none()
}

/// Right-aligned label, message, continuation lines indented under it.
fn render(status: Status, message: &str, colored: bool) -> String {
    let label = format!("{:>LABEL_WIDTH$}", status.label());
    let label = if colored {
        let style = Style::new().bold().fg_color(Some(status.color().into()));
        format!("{}{label}{}", style.render(), style.render_reset())
    } else {
        label
    };

    let mut lines = message.lines();
    let mut out = format!("{label} {}\n", lines.next().unwrap_or_default());
    for line in lines {
        out.push_str(&format!("{:LABEL_WIDTH$} {line}\n", ""));
    }
    out
}

fn elapsed(duration: Duration) -> String {
    if duration >= Duration::from_secs(1) {
        format!("{:.1}s", duration.as_secs_f64())
    } else {
        format!("{}ms", duration.as_millis())
    }
}

/// Status line pair for a single fetch: `Fetching` now, then `Fetched` or
/// `Failed` with the elapsed time.
pub struct FetchLine {
    subject: String,
    started: Instant,
}

impl FetchLine {
    pub fn start(subject: impl Into<String>) -> Self {
        let subject = subject.into();
        report(Status::Fetching, &subject);
        Self {
            subject,
            started: Instant::now(),
        }
    }

    pub fn finish<T, E: Display>(self, result: &Result<T, E>) {
        let took = elapsed(self.started.elapsed());
        match result {
            Ok(_) => report(Status::Fetched, format!("{} in {took}", self.subject)),
            Err(err) => report(Status::Failed, format!("{} after {took}: {err}", self.subject)),
        }
    }
}
