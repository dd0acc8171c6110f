// Plan Choque CLI - dashboards, detail tables and Excel reports from the terminal

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use plan_choque_cli::dashboard::{self, DetailView, PageArgs};
use plan_choque_cli::exit_codes::EXIT_SUCCESS;
use plan_choque_cli::render::OutputFormat;
use plan_choque_cli::{auth, implementation, logging, settings, CliError};
use plan_choque_kpi::{KpiKind, Product};

#[derive(Parser)]
#[command(name = "pchoque")]
#[command(about = "Plan Choque KPI dashboards and Excel reports (headless)")]
#[command(version)]
struct Cli {
    /// Settings file (default: ~/.config/plan-choque/settings.json)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// More logging on stderr (-v info, -vv debug)
    #[arg(long, short = 'v', global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors
    #[arg(long, short = 'q', global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Verify a token against the backend and save it
    Login {
        /// API token (falls back to PCHOQUE_TOKEN)
        #[arg(long, env = "PCHOQUE_TOKEN", hide_env_values = true)]
        token: Option<String>,
    },

    /// Delete the saved token
    Logout,

    /// Show the logged-in user, dashboard scope and report access
    Whoami {
        #[arg(long, short = 'f', value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Print the KPI cards of a dashboard page
    #[command(after_help = "\
Examples:
  pchoque summary
  pchoque summary --scope mercadeo --agente 12 --desde 2025-03-01 --hasta 2025-03-31
  pchoque summary --input snapshot.json --compania Terpel -f json")]
    Summary {
        #[command(flatten)]
        page: PageArgs,

        #[arg(long, short = 'f', value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Print the detail table of one KPI category
    #[command(after_help = "\
Examples:
  pchoque detail volumen --by segmento
  pchoque detail precios --by precios -f csv > precios.csv
  pchoque detail cobertura --rango 0-49")]
    Detail {
        /// cobertura, volumen, visitas or precios
        #[arg(value_parser = dashboard::parse_kind)]
        kpi: KpiKind,

        #[arg(long, value_enum, default_value = "registros")]
        by: DetailView,

        #[command(flatten)]
        page: PageArgs,

        #[arg(long, short = 'f', value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Write the Excel report for the current filters
    Report {
        #[command(flatten)]
        page: PageArgs,

        /// Output directory
        #[arg(long, short = 'o', default_value = ".")]
        out: PathBuf,
    },

    /// Submit an implementation form for a PDV
    #[command(after_help = "\
Examples:
  pchoque implementacion --pdv 17 --producto referencia=20W50,cajas=4,galones=50
  pchoque implementacion --pdv 17 --producto ref=15W40,cajas=2,galones=30,pvp=61000 --dry-run")]
    Implementacion {
        /// PDV id
        #[arg(long)]
        pdv: String,

        /// Product row as key=value pairs (repeatable)
        #[arg(long = "producto", value_name = "FIELDS", required = true, value_parser = implementation::parse_product)]
        productos: Vec<Product>,

        /// Use this token instead of the saved one
        #[arg(long, env = "PCHOQUE_TOKEN", hide_env_values = true)]
        token: Option<String>,

        /// Print the payload instead of sending it
        #[arg(long)]
        dry_run: bool,
    },

    /// Settings file helpers
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Write a commented default settings file (never overwrites)
    Init,
    /// Print the settings file location
    Path,
    /// Print the effective settings as JSON
    Show,
}

fn run(cli: Cli) -> Result<(), CliError> {
    // config helpers must work even when the file is broken
    let settings = match &cli.command {
        Commands::Config(ConfigCommands::Init) => return settings::cmd_config_init(cli.config),
        Commands::Config(ConfigCommands::Path) => return settings::cmd_config_path(cli.config),
        _ => settings::load(cli.config.as_deref())?,
    };

    match cli.command {
        Commands::Login { token } => auth::cmd_login(&settings, token),
        Commands::Logout => auth::cmd_logout(),
        Commands::Whoami { format } => auth::cmd_whoami(&settings, format),
        Commands::Summary { page, format } => dashboard::cmd_summary(&settings, &page, format),
        Commands::Detail { kpi, by, page, format } => dashboard::cmd_detail(&settings, &page, kpi, by, format),
        Commands::Report { page, out } => dashboard::cmd_report(&settings, &page, &out),
        Commands::Implementacion { pdv, productos, token, dry_run } => {
            implementation::cmd_implementacion(&settings, &pdv, productos, token, dry_run)
        }
        Commands::Config(ConfigCommands::Show) => settings::cmd_config_show(&settings),
        Commands::Config(ConfigCommands::Init | ConfigCommands::Path) => Ok(()),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.verbose, cli.quiet);

    match run(cli) {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}
