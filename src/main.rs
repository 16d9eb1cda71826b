use std::fs::{self, File};
use std::io::BufReader;
use std::path::PathBuf;
use std::process::ExitCode;
use tracedbg::debugger::StderrOutput;
use tracedbg::executor::{read_trace, replay_records, CommandLoop, ScriptedLoop, StdinLoop};
use tracedbg::parser::is_comment;
use tracedbg::signals::{ProcessHost, SignalRelay};
use tracedbg::{DebugSession, ExecutionController, Result, Settings};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const USAGE: &str =
    "usage: tracedbg [--settings FILE] [--command FILE] [--main FILE] [--batch] TRACE.jsonl";

#[derive(Debug, Default)]
struct Options {
    settings: Option<PathBuf>,
    command: Option<PathBuf>,
    main: Option<String>,
    batch: bool,
    trace: Option<PathBuf>,
}

fn parse_args(args: &[String]) -> std::result::Result<Options, String> {
    let mut options = Options::default();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        let mut value = |flag: &str| {
            iter.next()
                .cloned()
                .ok_or_else(|| format!("{flag} needs a file argument"))
        };
        match arg.as_str() {
            "--settings" => options.settings = Some(PathBuf::from(value(arg)?)),
            "--command" | "-x" => options.command = Some(PathBuf::from(value(arg)?)),
            "--main" => options.main = Some(value(arg)?),
            "--batch" => options.batch = true,
            flag if flag.starts_with('-') => return Err(format!("unknown option {flag}")),
            path => {
                if options.trace.is_some() {
                    return Err(format!("unexpected argument {path}"));
                }
                options.trace = Some(PathBuf::from(path));
            }
        }
    }
    Ok(options)
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("TRACEDBG_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let options = match parse_args(&args) {
        Ok(options) if options.trace.is_some() => options,
        Ok(_) => {
            eprintln!("{USAGE}");
            return ExitCode::from(2);
        }
        Err(message) => {
            eprintln!("tracedbg: {message}");
            eprintln!("{USAGE}");
            return ExitCode::from(2);
        }
    };

    match run(options) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("replay failed: {err}");
            eprintln!("tracedbg: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(options: Options) -> Result<()> {
    let settings = match &options.settings {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };

    let mut session = DebugSession::new(settings, Box::new(StderrOutput));
    if let Some(main) = &options.main {
        session = session.with_main(main);
    }
    if let Some(path) = &options.command {
        let script = fs::read_to_string(path)?;
        session.queue_commands(script.lines().filter(|line| !is_comment(line)));
    }

    // Recorded signals go straight to the dispatcher; signals sent to this
    // process are caught by the host and delivered at the next event.
    let mut relay = SignalRelay::new(Box::new(ProcessHost::new()));
    relay.attach(&mut session)?;

    let commands: Box<dyn CommandLoop> = if options.batch {
        Box::new(ScriptedLoop::default())
    } else {
        Box::new(StdinLoop::new())
    };
    let mut controller = ExecutionController::new(session, commands);

    let Some(trace) = &options.trace else {
        return Ok(());
    };
    let reader = BufReader::new(File::open(trace)?);
    let summary = replay_records(&mut controller, Some(&mut relay), read_trace(reader))?;
    info!(?summary, "replay finished");

    relay.unregister(&mut controller.session_mut().signals);
    if !summary.detached {
        controller.session_mut().msg("The program finished.");
    }
    Ok(())
}
