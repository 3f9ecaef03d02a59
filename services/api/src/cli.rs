use crate::demo::{run_demo, run_export, run_rangos, DemoArgs, ExportArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use vinosost::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "Vinosost Gateway",
    about = "Run the wine tourism sustainability self-assessment gateway",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Walk a complete self-assessment against an in-memory backend
    Demo(DemoArgs),
    /// Print the reference score ranges for every winery segment
    Rangos,
    /// Export the stored results as CSV
    Exportar(ExportArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
    /// Override the configured upstream backend URL
    #[arg(long)]
    pub(crate) backend_url: Option<String>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Demo(args) => run_demo(args).await,
        Command::Rangos => {
            run_rangos();
            Ok(())
        }
        Command::Exportar(args) => run_export(args),
    }
}
