//! CLI for minibroker
//!
//! `server` runs the broker; every other subcommand is a one-shot client
//! call against a running broker.

use std::error::Error;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use minibroker::admin::{ConsoleEnd, run_console, stdin_lines};
use minibroker::broker::Broker;
use minibroker::client::{BrokerClient, TopicListener};
use minibroker::config::{DEFAULT_CONFIG_PATH, Settings, load_config_from};
use minibroker::transport::{start_pubsub_server, start_rpc_server};
use minibroker::utils::logging;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "minibroker", about = "A minimal queue and pub/sub broker")]
struct Cli {
    /// Configuration file (extension optional)
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: String,

    /// Overrides the configured log level
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the broker
    Server,
    /// Put a message on the send queue
    Put {
        message: String,
        /// Wait until a consumer takes the message
        #[arg(long)]
        sync: bool,
    },
    /// Take the oldest message from the send queue
    Get,
    /// Put a result on the recv queue
    PutBack { message: String },
    /// Take the oldest result from the recv queue
    GetBack,
    /// Create a topic
    CreateTopic { name: String },
    /// Publish a message to every subscriber of a topic
    Publish { topic: String, message: String },
    /// Subscribe to topics and print messages until the broker disconnects
    Subscribe {
        #[arg(required = true)]
        topics: Vec<String>,
    },
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let settings = match load_config_from(&cli.config) {
        Ok(settings) => settings,
        Err(e) => {
            logging::init("info");
            error!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };
    logging::init(cli.log_level.as_deref().unwrap_or(&settings.log.level));

    if let Err(e) = run(cli.command, settings).await {
        error!("{e}");
        std::process::exit(1);
    }
}

async fn run(command: Command, settings: Settings) -> Result<(), Box<dyn Error>> {
    let rpc_addr = settings.rpc.addr();
    match command {
        Command::Server => run_server(settings).await?,
        Command::Put { message, sync } => {
            let mut client = BrokerClient::connect(&rpc_addr).await?;
            if client.put_message(message, !sync).await? {
                println!("Buffer overflow");
            } else {
                println!("Message sent successfully");
            }
            client.close().await?;
        }
        Command::Get => {
            let mut client = BrokerClient::connect(&rpc_addr).await?;
            match client.get_message().await? {
                Some(message) => println!("Message: {message}"),
                None => println!("No message available"),
            }
            client.close().await?;
        }
        Command::PutBack { message } => {
            let mut client = BrokerClient::connect(&rpc_addr).await?;
            if client.put_back_message(message).await? {
                println!("Buffer overflow");
            } else {
                println!("Message sent successfully");
            }
            client.close().await?;
        }
        Command::GetBack => {
            let mut client = BrokerClient::connect(&rpc_addr).await?;
            match client.get_back_message().await? {
                Some(message) => println!("Message: {message}"),
                None => println!("No message to get back"),
            }
            client.close().await?;
        }
        Command::CreateTopic { name } => {
            let mut client = BrokerClient::connect(&rpc_addr).await?;
            client.create_topic(&name).await?;
            println!("Topic created successfully");
            client.close().await?;
        }
        Command::Publish { topic, message } => {
            let mut client = BrokerClient::connect(&rpc_addr).await?;
            let delivered = client.publish(&topic, message).await?;
            println!("Message published to {delivered} subscribers");
            client.close().await?;
        }
        Command::Subscribe { topics } => {
            let mut listener = TopicListener::connect(&settings.pubsub.addr()).await?;
            for topic in &topics {
                listener.subscribe(topic).await?;
                println!("Subscribed to topic: {topic}");
            }
            tokio::select! {
                result = print_messages(&mut listener) => result?,
                _ = tokio::signal::ctrl_c() => {}
            }
        }
    }
    Ok(())
}

async fn print_messages(listener: &mut TopicListener) -> Result<(), Box<dyn Error>> {
    while let Some(message) = listener.next_message().await? {
        println!("Message received from subscribed topic: {message}");
    }
    info!("Broker closed the connection");
    Ok(())
}

async fn run_server(settings: Settings) -> Result<(), Box<dyn Error>> {
    let broker = Arc::new(Broker::from_settings(&settings.broker));
    let rpc_addr = settings.rpc.addr();
    let pubsub_addr = settings.pubsub.addr();

    let mut console = {
        let broker = broker.clone();
        tokio::spawn(async move { run_console(stdin_lines(), &broker).await })
    };

    // a console whose input closed leaves the servers running
    let result = tokio::select! {
        result = start_rpc_server(&rpc_addr, broker.clone()) => result,
        result = start_pubsub_server(&pubsub_addr, broker.clone()) => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received. Exiting gracefully.");
            Ok(())
        }
        Ok(ConsoleEnd::Exit) = &mut console => {
            info!("Operator requested exit.");
            Ok(())
        }
    };

    console.abort();
    Ok(result?)
}
