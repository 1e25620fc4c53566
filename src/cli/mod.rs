pub mod run;
pub mod view;

use std::{
    io::{self, BufRead, Write},
    path::PathBuf,
    sync::Arc,
};

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{info, level_filters::LevelFilter};

use crate::{
    chart::Transition,
    network::DEFAULT_ECHO_ADDRESS,
    notify::TerminalNotifier,
    session::{runner::SessionView, SessionController},
    storage::file_store::FileStore,
    utils::{
        clock::DefaultClock,
        dir::{create_application_default_path, ensure_dir},
        logging::{enable_logging, CLI_PREFIX},
    },
};

use view::TerminalView;

#[derive(Parser, Debug)]
#[command(name = "focusdeck", version, long_about = None)]
#[command(about = "Pomodoro timer with focus history and a task list", long_about = None)]
pub struct Args {
    #[command(subcommand)]
    commands: Commands,
    #[arg(
        long,
        global = true,
        help = "Application directory. By default tries to save into $XDG_STATE_HOME or $HOME/.local/state"
    )]
    dir: Option<PathBuf>,
    #[arg(long, global = true, help = "Log level. Falls back to RUST_LOG, then info")]
    log: Option<LevelFilter>,
    #[arg(long, global = true, help = "Mirror logs to the console")]
    log_console: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(about = "Run the timer in this terminal and read commands from stdin")]
    Run {
        #[arg(long, default_value = DEFAULT_ECHO_ADDRESS, help = "Line echo server used to show latency")]
        echo_addr: String,
        #[arg(long, help = "Don't show the connection indicator")]
        no_network: bool,
    },
    #[command(about = "Start the countdown")]
    Start,
    #[command(about = "Pause the countdown")]
    Pause,
    #[command(about = "Start the countdown if paused, pause it otherwise")]
    Toggle,
    #[command(about = "End the current phase early. Partial focus time is recorded")]
    Skip,
    #[command(about = "Show the timer, today's focus time and open tasks")]
    Status,
    #[command(about = "Show focus time of the last 7 days and today's sessions")]
    History {
        #[arg(long, help = "Draw below the current output instead of clearing the screen")]
        animate: bool,
    },
    #[command(about = "Manage the task list")]
    Task {
        #[command(subcommand)]
        command: TaskCommand,
    },
    #[command(about = "Erase history, tasks and the timer")]
    Clear {
        #[arg(long, short, help = "Don't ask for confirmation")]
        yes: bool,
    },
    #[command(about = "Measure latency to a line echo server")]
    Ping {
        #[arg(long, default_value = DEFAULT_ECHO_ADDRESS)]
        echo_addr: String,
    },
}

#[derive(Subcommand, Debug)]
enum TaskCommand {
    #[command(about = "Add a task")]
    Add {
        #[arg(required = true, num_args = 1.., help = "Task text")]
        text: Vec<String>,
    },
    #[command(about = "Mark a task done or not done")]
    Toggle { id: i64 },
    #[command(about = "Remove a task")]
    Remove { id: i64 },
    #[command(about = "List tasks")]
    List,
}

pub async fn run_cli() -> Result<()> {
    let args = Args::parse();

    let app_dir = args
        .dir
        .map_or_else(create_application_default_path, ensure_dir)?;
    enable_logging(CLI_PREFIX, &app_dir, args.log, args.log_console)?;
    info!("Using application directory {app_dir:?}");

    if let Commands::Ping { echo_addr } = args.commands {
        let status = run::ping(echo_addr).await?;
        println!("{status}");
        return Ok(());
    }

    let store = FileStore::open(&app_dir)?;
    let mut controller = SessionController::load(
        store,
        Arc::new(DefaultClock),
        Box::new(TerminalNotifier),
    )?;
    let result = process_command(&mut controller, args.commands).await;
    controller.teardown()?;
    result
}

async fn process_command(
    controller: &mut SessionController<FileStore>,
    command: Commands,
) -> Result<()> {
    let mut view = TerminalView::new(io::stdout(), true, false);
    let event = match command {
        Commands::Run {
            echo_addr,
            no_network,
        } => {
            let echo_address = (!no_network).then_some(echo_addr);
            return run::run_foreground(controller, echo_address).await;
        }
        Commands::Start => controller.start()?,
        Commands::Pause => controller.pause()?,
        Commands::Toggle => controller.toggle()?,
        Commands::Skip => Some(controller.skip()?),
        Commands::Status => None,
        Commands::History { animate } => {
            let transition = if animate {
                Transition::Animated
            } else {
                Transition::Immediate
            };
            view.history(
                &controller.weekly_series(),
                &controller.daily_series(),
                transition,
            )?;
            return Ok(());
        }
        Commands::Task { command } => return process_task_command(controller, &mut view, command),
        Commands::Clear { yes } => {
            if controller.clear_all(|| yes || confirm("Erase all focus history and tasks?"))? {
                view.message("cleared")?;
            }
            return Ok(());
        }
        Commands::Ping { .. } => return Ok(()),
    };

    if let Some(event) = event {
        view.event(&event)?;
    }
    view.status(&controller.status(), None)
}

fn process_task_command(
    controller: &mut SessionController<FileStore>,
    view: &mut TerminalView<io::Stdout>,
    command: TaskCommand,
) -> Result<()> {
    match command {
        TaskCommand::Add { text } => match controller.add_task(&text.join(" "))? {
            Some(id) => view.message(&format!("added task {id}")),
            None => view.message("task text is empty"),
        },
        TaskCommand::Toggle { id } => {
            if controller.toggle_task(id)? {
                view.tasks(controller.tasks())
            } else {
                view.message(&format!("no task {id}"))
            }
        }
        TaskCommand::Remove { id } => {
            if controller.remove_task(id)? {
                view.message(&format!("removed task {id}"))
            } else {
                view.message(&format!("no task {id}"))
            }
        }
        TaskCommand::List => view.tasks(controller.tasks()),
    }
}

/// Asks a yes/no question on the terminal. Anything but `y` or `yes` is a no.
fn confirm(question: &str) -> bool {
    print!("{question} [y/N] ");
    if io::stdout().flush().is_err() {
        return false;
    }
    let mut answer = String::new();
    match io::stdin().lock().read_line(&mut answer) {
        Ok(_) => is_yes(&answer),
        Err(_) => false,
    }
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}
