mod config;
mod graphql;
mod http;

use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use platform_obs::{ObsConfig, init_tracing};
use products_hr::{AddressBook, ContactsService, DirectoryModel, Employee, Grouping, NoContacts};
use tracing::{info, warn};

use crate::{
    config::AppConfig,
    graphql::{AddressBookSource, GraphqlData},
    http::{AppState, ServeConfig},
};

#[derive(Parser, Debug)]
#[command(name = "directory-server", version, about = "Employee directory")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP + GraphQL server.
    Serve(ServeCommand),
    /// Fetch every source once, update the cache and exit.
    Refresh,
    /// Print the roster, from the cache when one exists.
    List(ListCommand),
    /// Print the GraphQL schema snapshot.
    #[command(name = "schema:print")]
    SchemaPrint {
        #[arg(long, value_name = "FILE", help = "Destination file path")]
        output: Option<PathBuf>,
    },
}

#[derive(Args, Debug)]
struct ServeCommand {
    #[arg(long, default_value = "0.0.0.0")]
    host: std::net::IpAddr,
    #[arg(long, default_value_t = 8080)]
    port: u16,
}

impl From<ServeCommand> for ServeConfig {
    fn from(value: ServeCommand) -> Self {
        ServeConfig::new(value.host, value.port)
    }
}

#[derive(Args, Debug)]
struct ListCommand {
    #[arg(long, value_enum, default_value_t = GroupByArg::Initial)]
    group_by: GroupByArg,
    #[arg(long)]
    search: Option<String>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum GroupByArg {
    Initial,
    Position,
}

impl From<GroupByArg> for Grouping {
    fn from(value: GroupByArg) -> Self {
        match value {
            GroupByArg::Initial => Grouping::LastNameInitial,
            GroupByArg::Position => Grouping::Position,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing(ObsConfig::default())?;
    let cli = Cli::parse();
    let app_config = Arc::new(AppConfig::load()?);
    match cli.command {
        Command::Serve(cmd) => run_server(cmd, app_config).await,
        Command::Refresh => run_refresh(&app_config).await,
        Command::List(cmd) => run_list(cmd, &app_config).await,
        Command::SchemaPrint { output } => schema_print(output, &app_config),
    }
}

fn load_address_book(config: &AppConfig) -> Result<Option<AddressBookSource>> {
    let Some(path) = config.contacts_file.clone() else {
        return Ok(None);
    };
    let book = AddressBook::load(&path)
        .with_context(|| format!("failed to load address book {}", path.display()))?;
    Ok(Some(AddressBookSource {
        book: Arc::new(book),
        path,
    }))
}

fn build_model(config: &AppConfig, book: Option<&AddressBookSource>) -> Arc<DirectoryModel> {
    let contacts: Arc<dyn ContactsService> = match book {
        Some(source) => Arc::clone(&source.book) as Arc<dyn ContactsService>,
        None => Arc::new(NoContacts),
    };
    Arc::new(DirectoryModel::new(config.directory.clone(), contacts))
}

async fn run_server(cmd: ServeCommand, config: Arc<AppConfig>) -> Result<()> {
    let address_book = load_address_book(&config)?;
    let model = build_model(&config, address_book.as_ref());

    let startup = Arc::clone(&model);
    tokio::spawn(async move {
        if let Err(err) = startup.start().await {
            warn!(error = %err, "initial refresh failed; serving cached roster");
        }
    });

    let schema = graphql::build_schema(GraphqlData {
        model: Arc::clone(&model),
        address_book,
    });
    let state = AppState {
        model,
        schema,
        config,
    };
    http::serve(cmd.into(), state).await
}

async fn run_refresh(config: &AppConfig) -> Result<()> {
    let address_book = load_address_book(config)?;
    let model = build_model(config, address_book.as_ref());
    model.request_contacts_access().await?;
    let summary = model.refresh().await?;
    info!(
        employees = summary.employees,
        failed_sources = summary.failed_sources,
        cached = summary.cached,
        "refresh complete"
    );
    println!("{} employees from {} payloads", summary.employees, summary.payloads);
    Ok(())
}

async fn run_list(cmd: ListCommand, config: &AppConfig) -> Result<()> {
    let address_book = load_address_book(config)?;
    let model = build_model(config, address_book.as_ref());
    model.request_contacts_access().await?;
    if model.is_data_cached() {
        if let Err(err) = model.reload_from_cache().await {
            warn!(error = %err, "cached roster unreadable; fetching");
            model.refresh().await?;
        }
    } else {
        model.refresh().await?;
    }

    let store = model.store();
    match cmd.search {
        Some(query) => {
            for employee in store.search(&query).await {
                println!("{}", describe(&employee));
            }
        }
        None => {
            for (key, employees) in store.grouped(cmd.group_by.into()).await {
                println!("{key}");
                for employee in &employees {
                    println!("  {}", describe(employee));
                }
            }
        }
    }
    Ok(())
}

fn describe(employee: &Employee) -> String {
    let mut line = employee.full_name();
    if let Some(position) = employee.position {
        line.push_str(&format!(" ({position})"));
    }
    if let Some(email) = employee.email() {
        line.push_str(&format!(" <{email}>"));
    }
    line
}

fn schema_print(path: Option<PathBuf>, config: &AppConfig) -> Result<()> {
    let directory = config.directory.clone().with_cache(None);
    let model = Arc::new(DirectoryModel::new(directory, Arc::new(NoContacts)));
    let schema = graphql::build_schema(GraphqlData {
        model,
        address_book: None,
    });
    let sdl = schema.sdl();
    match path {
        Some(target) => {
            std::fs::write(&target, sdl)
                .with_context(|| format!("failed to write {}", target.display()))?;
            info!(path = %target.display(), "schema written");
        }
        None => print!("{sdl}"),
    }
    Ok(())
}
