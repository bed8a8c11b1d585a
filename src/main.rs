use anyhow::Result;
use clap::{Parser, Subcommand};
use pass_tui::app::App;
use pass_tui::config::Config;
use pass_tui::pass_cli::PassCli;
use pass_tui::process::ProcessRunner;
use pass_tui::screen::{Flow, Screen};
use pass_tui::terminal::TerminalUi;
use std::env;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "pass_tui", version)]
#[command(about = "Interactive terminal UI for Proton Pass CLI", long_about = None)]
struct Cli {
    /// Path to the pass-cli executable
    #[arg(long, global = true)]
    executable: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Clone, Copy)]
enum Commands {
    /// Interactive Terminal UI for Proton Pass (default)
    Launch,
    /// Generate a password using Proton Pass CLI
    Generate,
    /// Log out of Proton Pass CLI
    Logout,
    /// Search items across Proton Pass vaults
    Search,
    /// Show Proton Pass user info
    User,
}

fn main() -> ExitCode {
    // stderr shares the terminal with the menus, so logging is opt-in.
    if let Ok(filter) = env::var("PASS_TUI_LOG") {
        env_logger::Builder::new().parse_filters(&filter).init();
    }

    let cli = Cli::parse();

    match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {:#}", err);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    let config = Config::load(cli.executable);
    let runner = ProcessRunner::new(&config.executable);
    log::debug!("using {}", runner.program());
    let pass = PassCli::new(runner, config.timeouts());

    let command = cli.command.unwrap_or(Commands::Launch);
    let flow = match command {
        Commands::Launch => Flow::Interactive,
        _ => Flow::Standalone,
    };
    let mut app = App::new(pass, TerminalUi::new(), flow).notice_pause(config.notice_pause());

    let screen = match command {
        Commands::Launch => {
            app.launch()?;
            return Ok(ExitCode::SUCCESS);
        }
        Commands::Generate => Screen::GeneratePassword,
        Commands::Logout => Screen::Logout,
        Commands::Search => Screen::Search,
        Commands::User => Screen::UserInfo,
    };

    if app.open(screen)? {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}
