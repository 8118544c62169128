/*!
 * snowprobe CLI - Command Line Interface
 *
 * Without a subcommand all four steps run in order: list records, flag
 * customized business rules, extract the schema, create a sample record.
 */

use clap::{Parser, Subcommand, ValueEnum};
use secrecy::SecretString;
use snowprobe::{
    cli_style,
    config::{LogLevel, LoggingConfig, ProbeConfig},
    error::{Result, EXIT_SUCCESS},
    logging,
    output::OutputWriter,
    records, rules, schema,
    xml::{parse_assignment, RecordDraft},
    TableClient,
};
use std::path::PathBuf;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "snowprobe")]
#[command(version, about = "Interrogate a ServiceNow application and identify components that have been customized", long_about = None)]
struct Cli {
    /// ServiceNow instance URL
    #[arg(short = 'i', long, value_name = "URL", global = true)]
    instance: Option<String>,

    /// ServiceNow API username
    #[arg(short = 'u', long, global = true)]
    username: Option<String>,

    /// ServiceNow API password
    #[arg(
        short = 'p',
        long,
        env = "SNOWPROBE_PASSWORD",
        hide_env_values = true,
        global = true
    )]
    password: Option<String>,

    /// Application table name, e.g. 'incident'
    #[arg(short = 'a', long, value_name = "TABLE", global = true)]
    application: Option<String>,

    /// TOML configuration file
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Log file path (default: snowprobe.log)
    #[arg(long = "log", value_name = "FILE", global = true)]
    log: Option<PathBuf>,

    /// Log to stderr instead of a file
    #[arg(long, global = true, conflicts_with = "log")]
    no_log_file: bool,

    /// Log level
    #[arg(long, value_enum, global = true)]
    log_level: Option<LogLevelArg>,

    /// Verbose logging (same as --log-level debug)
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    /// Request timeout in seconds, 0 to wait forever (default: 30)
    #[arg(long, value_name = "SECS", global = true)]
    timeout: Option<u64>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List the records of the application table
    Records {
        /// Raw query string, e.g. 'sysparm_query=active=true'
        #[arg(short = 'q', long, default_value = "")]
        query: String,
    },

    /// List business rules edited by someone other than their creator
    Rules,

    /// Show the application table schema
    Schema,

    /// Create a record in the application table
    Create {
        #[arg(long)]
        short_description: Option<String>,

        #[arg(long)]
        urgency: Option<String>,

        #[arg(long)]
        impact: Option<String>,

        /// Additional column, may be repeated
        #[arg(long = "field", value_name = "FIELD=VALUE", value_parser = parse_field)]
        fields: Vec<(String, String)>,
    },
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
enum LogLevelArg {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevelArg> for LogLevel {
    fn from(arg: LogLevelArg) -> Self {
        match arg {
            LogLevelArg::Error => LogLevel::Error,
            LogLevelArg::Warn => LogLevel::Warn,
            LogLevelArg::Info => LogLevel::Info,
            LogLevelArg::Debug => LogLevel::Debug,
            LogLevelArg::Trace => LogLevel::Trace,
        }
    }
}

fn parse_field(raw: &str) -> std::result::Result<(String, String), String> {
    parse_assignment(raw).map_err(|e| e.to_string())
}

impl Cli {
    /// Command line values win over the config file
    fn apply_to(&self, config: &mut ProbeConfig) {
        if let Some(ref instance) = self.instance {
            config.instance = Some(instance.clone());
        }
        if let Some(ref username) = self.username {
            config.username = Some(username.clone());
        }
        if let Some(ref password) = self.password {
            config.password = Some(SecretString::from(password.clone()));
        }
        if let Some(ref application) = self.application {
            config.application = Some(application.clone());
        }
        if let Some(timeout) = self.timeout {
            config.timeout_secs = timeout;
        }
        if let Some(ref log) = self.log {
            config.logging.file = Some(log.clone());
        }
        if self.no_log_file {
            config.logging.file = None;
        }
        if let Some(level) = self.log_level {
            config.logging.level = level.into();
        }
        config.logging.verbose |= self.verbose;
    }
}

fn main() {
    let cli = Cli::parse();
    let output = OutputWriter::new(cli.json);

    let code = match run(cli, &output) {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            error!(category = %e.category(), "Execution aborted: {}", e);
            output.failure(&e);
            e.exit_code()
        }
    };
    std::process::exit(code);
}

fn run(cli: Cli, output: &OutputWriter) -> Result<()> {
    let mut config = match cli.config {
        Some(ref path) => match ProbeConfig::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                // No log settings to honor yet; log the failure to stderr
                let fallback = LoggingConfig {
                    file: None,
                    ..Default::default()
                };
                if let Err(log_err) = logging::init_logging(&fallback) {
                    cli_style::print_warning(&format!("Failed to initialize logging: {}", log_err));
                }
                return Err(e);
            }
        },
        None => ProbeConfig::default(),
    };
    cli.apply_to(&mut config);

    if let Err(e) = logging::init_logging(&config.logging) {
        cli_style::print_warning(&format!("Failed to initialize logging: {}", e));
    }
    info!("Beginning execution");

    let params = config.connection_params()?;
    let application = params.application.clone();
    let client = TableClient::new(params, config.timeout())?;

    match cli.command {
        None => run_all(&client, &application, output)?,
        Some(Commands::Records { query }) => show_records(&client, &application, &query, output)?,
        Some(Commands::Rules) => show_customized_rules(&client, &application, output)?,
        Some(Commands::Schema) => show_schema(&client, &application, output)?,
        Some(Commands::Create {
            short_description,
            urgency,
            impact,
            fields,
        }) => {
            let mut draft = RecordDraft::sample();
            if let Some(text) = short_description {
                draft.set("short_description", text);
            }
            if let Some(urgency) = urgency {
                draft.set("urgency", urgency);
            }
            if let Some(impact) = impact {
                draft.set("impact", impact);
            }
            for (name, value) in fields {
                draft.set(name, value);
            }
            submit_record(&client, &application, &draft, output)?;
        }
    }

    info!("Completed execution");
    Ok(())
}

fn run_all(client: &TableClient, application: &str, output: &OutputWriter) -> Result<()> {
    show_records(client, application, "", output)?;
    show_customized_rules(client, application, output)?;
    show_schema(client, application, output)?;
    submit_record(client, application, &RecordDraft::sample(), output)
}

fn show_records(
    client: &TableClient,
    application: &str,
    query: &str,
    output: &OutputWriter,
) -> Result<()> {
    let payload = records::list_records(client, application, query)?;
    output.records(application, &payload);
    Ok(())
}

fn show_customized_rules(
    client: &TableClient,
    application: &str,
    output: &OutputWriter,
) -> Result<()> {
    let payload = rules::fetch_business_rules(client, application)?;
    let customized = rules::identify_customized(&payload);
    output.customized_rules(application, &customized);
    Ok(())
}

fn show_schema(client: &TableClient, application: &str, output: &OutputWriter) -> Result<()> {
    info!("Generating schema from ServiceNow {} dictionary...", application);
    let table_schema = schema::pull_schema(client, application)?;
    info!("Successfully built schema: {}", table_schema);
    output.schema(&table_schema);
    Ok(())
}

fn submit_record(
    client: &TableClient,
    application: &str,
    draft: &RecordDraft,
    output: &OutputWriter,
) -> Result<()> {
    let created = records::create_record(client, application, draft)?;
    output.created(application, &created);
    Ok(())
}
