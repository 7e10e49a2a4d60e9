use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use std::io::{self, IsTerminal, Read};
use termi::commands::{
    cmd_chat, cmd_doctor, cmd_explain, cmd_init_config, cmd_models, cmd_oneshot, cmd_plan,
    cmd_query, is_interrupt, Session,
};
use termi::config::{load_config, Overrides};
use termi::error::INTERRUPTED_EXIT;
use termi::repl;
use termi::signal::INTERRUPTS;
use termi::ui::Console;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "termi", version, about = "Your local terminal copilot")]
struct Cli {
    /// Explain a command instead of generating one
    #[arg(long, conflicts_with_all = ["chat", "plan"])]
    explain: bool,

    /// General chat
    #[arg(long, conflicts_with = "plan")]
    chat: bool,

    /// Multi-step plan with per-step confirmation
    #[arg(long)]
    plan: bool,

    /// With --plan: run safe steps without asking
    #[arg(long)]
    auto: bool,

    /// Show the command only, don't execute
    #[arg(long)]
    dry_run: bool,

    /// Override the configured model
    #[arg(long, value_name = "NAME")]
    model: Option<String>,

    /// Skip safety checks and confirmation of risky commands
    #[arg(long)]
    no_safety: bool,

    /// Force streaming output
    #[arg(long, conflicts_with = "no_stream")]
    stream: bool,

    /// Force non-streaming output
    #[arg(long)]
    no_stream: bool,

    /// List installed Ollama models
    #[arg(long)]
    list_models: bool,

    /// Write the default config file
    #[arg(long)]
    init_config: bool,

    /// Check backends, model, config and history store
    #[arg(long)]
    doctor: bool,

    /// Request, command or task; omit for interactive mode
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    query: Vec<String>,
}

impl Cli {
    fn overrides(&self) -> Overrides {
        let stream = if self.stream {
            Some(true)
        } else if self.no_stream {
            Some(false)
        } else {
            None
        };
        Overrides {
            model: self.model.clone(),
            safety_confirm: self.no_safety.then_some(false),
            stream,
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn print_usage() -> Result<i32> {
    Cli::command().print_help()?;
    Ok(0)
}

fn run(cli: Cli) -> Result<i32> {
    let config = load_config(&cli.overrides());

    if cli.init_config {
        let mut console = Console::new(&config.output.theme);
        cmd_init_config(&mut console)?;
        return Ok(0);
    }

    let mut session = Session::open(config, cli.dry_run)?;

    if cli.list_models {
        cmd_models(&mut session)?;
        return Ok(0);
    }
    if cli.doctor {
        cmd_doctor(&mut session)?;
        return Ok(0);
    }

    let text = cli.query.join(" ").trim().to_string();

    if text.is_empty() && !io::stdin().is_terminal() {
        let mut piped = String::new();
        io::stdin()
            .read_to_string(&mut piped)
            .context("reading request from stdin")?;
        let piped = piped.trim();
        if piped.is_empty() {
            return Ok(0);
        }
        return cmd_oneshot(&mut session, piped);
    }

    if cli.explain {
        if text.is_empty() {
            return print_usage();
        }
        cmd_explain(&mut session, &text)?;
        return Ok(0);
    }
    if cli.chat {
        if text.is_empty() {
            return print_usage();
        }
        cmd_chat(&mut session, &text)?;
        return Ok(0);
    }
    if cli.plan {
        if text.is_empty() {
            return print_usage();
        }
        return cmd_plan(&mut session, &text, cli.auto);
    }

    if text.is_empty() {
        repl::run(&mut session)?;
        return Ok(0);
    }
    cmd_query(&mut session, &text)
}

fn main() {
    init_tracing();
    let cli = Cli::parse();

    // A child shell owns SIGINT while it runs. Otherwise the flows pick the
    // interrupt up at their next check; a second Ctrl-C exits.
    if let Err(e) = ctrlc::set_handler(|| {
        if INTERRUPTS.record() {
            std::process::exit(INTERRUPTED_EXIT);
        }
    }) {
        tracing::debug!("could not install interrupt handler: {}", e);
    }

    let code = match run(cli) {
        Ok(code) => code,
        Err(e) if is_interrupt(&e) => INTERRUPTED_EXIT,
        Err(e) => {
            eprintln!("termi: {:#}", e);
            1
        }
    };
    std::process::exit(code);
}
