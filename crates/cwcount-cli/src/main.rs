use std::io::{self, Write};
use std::path::PathBuf;
use std::process;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use cwcount_exec::{ChainClient, Network, Session, SessionConfig, DEFAULT_SET_COUNT};

// ---------------------------------------------------------------------------
// CLI definition
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(name = "cwcount", about = "Query and update a CosmWasm counter contract")]
#[command(version)]
struct Cli {
    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// Log requests and signer invocations (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug)]
struct ConnectionArgs {
    /// Session config file (contract, sender, endpoints, fee)
    #[arg(long, default_value = "cwcount.json")]
    config: PathBuf,
    /// Network name (local, testnet, mainnet); overrides the config file
    #[arg(long)]
    network: Option<Network>,
    /// LCD endpoint URL (overrides CWCOUNT_LCD_URL env, config and network default)
    #[arg(long)]
    lcd_url: Option<String>,
    /// Node RPC URL for broadcasting (overrides CWCOUNT_NODE_URL env, config and network default)
    #[arg(long)]
    node_url: Option<String>,
    /// Receipt event whose attributes are printed
    #[arg(long)]
    event_type: Option<String>,
    /// Skip mainnet confirmation prompt
    #[arg(long)]
    yes: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Query, increment, query, set, query
    Run {
        #[command(flatten)]
        conn: ConnectionArgs,
        /// Value written by the set step
        #[arg(long, default_value_t = DEFAULT_SET_COUNT)]
        set_count: u8,
    },
    /// Print the current count
    Query {
        #[command(flatten)]
        conn: ConnectionArgs,
    },
    /// Increment the count by one
    Increment {
        #[command(flatten)]
        conn: ConnectionArgs,
    },
    /// Set the count to a fixed value
    Set {
        /// New count (0-255)
        count: u8,
        #[command(flatten)]
        conn: ConnectionArgs,
    },
    /// Print version
    Version,
}

/// What a network command does once connected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Run(u8),
    Query,
    Increment,
    Set(u8),
}

impl Action {
    /// Number of transactions the action submits.
    fn transaction_count(&self) -> usize {
        match self {
            Action::Run(_) => 2,
            Action::Query => 0,
            Action::Increment | Action::Set(_) => 1,
        }
    }
}

// ---------------------------------------------------------------------------
// ANSI helpers
// ---------------------------------------------------------------------------

struct Colors {
    red: &'static str,
    yellow: &'static str,
    bold: &'static str,
    reset: &'static str,
}

const COLORS_ON: Colors = Colors {
    red: "\x1b[31m",
    yellow: "\x1b[33m",
    bold: "\x1b[1m",
    reset: "\x1b[0m",
};

const COLORS_OFF: Colors = Colors {
    red: "",
    yellow: "",
    bold: "",
    reset: "",
};

fn choose_colors(no_color: bool) -> &'static Colors {
    if no_color {
        &COLORS_OFF
    } else {
        &COLORS_ON
    }
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let c = choose_colors(cli.no_color);
    init_logging(cli.verbose);

    let (conn, action) = match cli.command {
        Commands::Run { conn, set_count } => (conn, Action::Run(set_count)),
        Commands::Query { conn } => (conn, Action::Query),
        Commands::Increment { conn } => (conn, Action::Increment),
        Commands::Set { count, conn } => (conn, Action::Set(count)),
        Commands::Version => {
            println!("cwcount v{}", env!("CARGO_PKG_VERSION"));
            return;
        }
    };

    if let Err(e) = run_action(&conn, action, c).await {
        eprintln!("{}{}error{}: {:#}", c.red, c.bold, c.reset, e);
        process::exit(1);
    }
}

async fn run_action(conn: &ConnectionArgs, action: Action, c: &Colors) -> anyhow::Result<()> {
    let mut config = SessionConfig::load(&conn.config)?;
    if let Some(network) = conn.network {
        config.network = network;
    }
    if let Some(event_type) = &conn.event_type {
        config.event_type = event_type.clone();
    }

    let lcd_url = config.resolve_lcd_url(conn.lcd_url.as_deref());
    let node_url = config.resolve_node_url(conn.node_url.as_deref());
    log::debug!(
        "network {} ({}), lcd {}, node {}",
        config.network,
        config.chain_id(),
        lcd_url,
        node_url
    );

    if config.network == Network::Mainnet
        && action.transaction_count() > 0
        && !conn.yes
        && !confirm_mainnet_execution(&config, action, c)
    {
        eprintln!("Cancelled.");
        return Ok(());
    }

    let client = ChainClient::new(
        &lcd_url,
        config.node_cli(node_url),
        config.client_config(),
    );
    let target = config.target();
    let fee = config.fee_spec();
    let session = Session::new(&client, &target, &fee).with_event_type(&config.event_type);

    let stdout = io::stdout();
    let mut out = stdout.lock();

    match action {
        Action::Run(set_count) => session
            .run(set_count, &mut out)
            .await
            .context("session aborted")?,
        Action::Query => {
            session.query_count(&mut out).await?;
        }
        Action::Increment => session.increment(&mut out).await?,
        Action::Set(count) => session.set(count, &mut out).await?,
    }

    out.flush()?;
    Ok(())
}

/// Interactive mainnet confirmation prompt.
fn confirm_mainnet_execution(config: &SessionConfig, action: Action, c: &Colors) -> bool {
    let fee = config.fee_spec();

    eprintln!(
        "\n{}WARNING{}: This will submit {} transaction(s) to {}MAINNET{} ({}) as {}",
        c.yellow,
        c.reset,
        action.transaction_count(),
        c.bold,
        c.reset,
        config.chain_id(),
        config.sender
    );
    eprintln!(
        "Fee per transaction: {} (gas limit {})",
        fee.fees_arg(),
        fee.gas
    );
    eprint!("Continue? [y/N] ");

    let mut input = String::new();
    io::stdin().read_line(&mut input).unwrap_or(0);
    input.trim().eq_ignore_ascii_case("y")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
