use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};

use printauth::{
    build_gatekeeper, build_transport, handshake_exit_code, listener, sink::TerminalSink,
    RootConfig, RootError,
};
use printauth_core::{MaterialChoice, PluginMessage};
use printauth_handshake::{
    classify, notice, ChannelGate, HandshakeInput, HandshakeStateKind, LogGate, ScriptedSink,
};

/// printauth: gate print starts behind a credential and material handshake
#[derive(Parser, Debug)]
#[command(name = "printauth", version, about, long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write a configuration file with defaults and the given overrides
    Init {
        /// Authorization endpoint URL
        #[arg(long)]
        endpoint: Option<String>,

        /// Host API key sent with every request
        #[arg(long)]
        api_key: Option<String>,

        /// Plugin identifier carried by host messages
        #[arg(long)]
        plugin_id: Option<String>,
    },

    /// Listen for plugin messages and run handshakes on this terminal
    Listen {
        /// Bind address for the listener
        #[arg(long)]
        bind: Option<String>,

        /// Port for the listener
        #[arg(long)]
        port: Option<u16>,
    },

    /// Run one handshake non-interactively; exits 0 only when the print may start
    Handshake {
        /// Credential to authenticate with; omit to take the no-credential path
        #[arg(long)]
        email: Option<String>,

        /// Material choice: own or paid
        #[arg(long)]
        choice: MaterialChoice,
    },

    /// Show how an authentication failure message would be classified
    Classify {
        /// Failure message returned by the endpoint
        message: String,
    },
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new(
            "printauth=debug,printauth_core=debug,printauth_handshake=debug,printauth_transport=debug",
        )
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("printauth=info,printauth_handshake=info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&PathBuf>) -> Result<RootConfig, RootError> {
    match path {
        Some(p) => RootConfig::load(p),
        None => {
            let default_path = RootConfig::default_config_path();
            RootConfig::load(&default_path)
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode, RootError> {
    match cli.command {
        Commands::Init {
            endpoint,
            api_key,
            plugin_id,
        } => cmd_init(cli.config.as_ref(), endpoint, api_key, plugin_id).await,
        Commands::Listen { bind, port } => cmd_listen(cli.config.as_ref(), bind, port).await,
        Commands::Handshake { email, choice } => {
            cmd_handshake(cli.config.as_ref(), email, choice).await
        }
        Commands::Classify { message } => Ok(cmd_classify(&message)),
    }
}

async fn cmd_init(
    config_path: Option<&PathBuf>,
    endpoint: Option<String>,
    api_key: Option<String>,
    plugin_id: Option<String>,
) -> Result<ExitCode, RootError> {
    let mut config = load_config(config_path)?;

    if let Some(url) = endpoint {
        config.endpoint.url = url;
    }
    if let Some(key) = api_key {
        config.endpoint.api_key = Some(key);
    }
    if let Some(id) = plugin_id {
        config.plugin_id = id;
    }
    config.validate()?;

    let save_path = config_path
        .cloned()
        .unwrap_or_else(RootConfig::default_config_path);
    config.save(&save_path)?;

    println!("printauth initialized successfully.");
    println!("  Plugin id: {}", config.plugin_id);
    println!("  Endpoint:  {}", config.endpoint.url);
    println!("  Config:    {}", save_path.display());

    Ok(ExitCode::SUCCESS)
}

async fn cmd_listen(
    config_path: Option<&PathBuf>,
    bind: Option<String>,
    port: Option<u16>,
) -> Result<ExitCode, RootError> {
    let mut config = load_config(config_path)?;
    if let Some(bind) = bind {
        config.listen.bind = bind;
    }
    if let Some(port) = port {
        config.listen.port = port;
    }

    let (tx, rx) = tokio::sync::mpsc::channel(32);
    let transport = Arc::new(build_transport(&config.endpoint)?);
    let sink = Arc::new(TerminalSink::new(tx.clone()));
    let gatekeeper = build_gatekeeper(&config, transport, sink, Arc::new(LogGate))?;

    let state = Arc::new(listener::AppState {
        plugin_id: config.plugin_id.clone(),
        inputs: tx,
        state: gatekeeper.subscribe(),
    });
    let gatekeeper_task = tokio::spawn(gatekeeper.run(rx));

    let addr = format!("{}:{}", config.listen.bind, config.listen.port);
    let tcp = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(RootError::Io)?;
    println!("printauth listening on http://{}", addr);

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to install ctrl-c handler");
        }
        info!("shutting down");
    };
    let served = listener::serve(tcp, state, shutdown).await;

    // The sink holds an input sender, so the run loop never sees a closed
    // channel on its own.
    gatekeeper_task.abort();
    served?;
    Ok(ExitCode::SUCCESS)
}

async fn cmd_handshake(
    config_path: Option<&PathBuf>,
    email: Option<String>,
    choice: MaterialChoice,
) -> Result<ExitCode, RootError> {
    let config = load_config(config_path)?;
    let transport = Arc::new(build_transport(&config.endpoint)?);
    let sink = Arc::new(ScriptedSink::new(email));
    let (gate, mut decisions) = ChannelGate::new();
    let mut gatekeeper = build_gatekeeper(&config, transport, sink.clone(), Arc::new(gate))?;

    let message = PluginMessage::prompt(config.plugin_id.clone());
    let state = gatekeeper.drive(HandshakeInput::PluginMessage(message)).await;
    if state == HandshakeStateKind::AwaitingMaterialChoice {
        gatekeeper.drive(HandshakeInput::MaterialChosen(choice)).await;
    }

    for notification in sink.notifications() {
        println!(
            "[{}] {}: {}",
            notification.kind, notification.title, notification.message
        );
    }

    let decision = decisions.try_recv().ok();
    match &decision {
        Some(decision) => println!(
            "Decision: {:?} ({})",
            decision.disposition(),
            decision.handshake_id()
        ),
        None => println!("Decision: none (material confirmation did not complete)"),
    }
    Ok(ExitCode::from(handshake_exit_code(decision.as_ref())))
}

fn cmd_classify(message: &str) -> ExitCode {
    let category = classify(message);
    let remediation = notice::authentication_failed(category, message);
    println!("Category:    {}", category);
    println!("Title:       {}", remediation.title);
    println!("Message:     {}", remediation.message);
    println!("Cancels job: {}", category.cancels_action());
    ExitCode::SUCCESS
}
