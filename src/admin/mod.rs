//! Operator commands
//!
//! Read-only views and resets of broker state, typed on the server's stdin,
//! plus `exit` to stop the server. None of them touch subscriber connections.

use std::io::BufRead;

use tokio::sync::mpsc;
use tracing::debug;

use crate::broker::{Broker, Message};

pub const HELP: &str =
    "print_send_queue|print_recv_queue|clear_send_queue|clear_recv_queue|print_topics|help|exit";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminCommand {
    PrintSendQueue,
    PrintRecvQueue,
    ClearSendQueue,
    ClearRecvQueue,
    PrintTopics,
    Help,
    Exit,
}

/// Why the console stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleEnd {
    /// The operator typed `exit`.
    Exit,
    /// Input closed; the broker keeps running without a console.
    InputClosed,
}

impl AdminCommand {
    pub fn parse(line: &str) -> Option<Self> {
        match line.trim() {
            "print_send_queue" => Some(AdminCommand::PrintSendQueue),
            "print_recv_queue" => Some(AdminCommand::PrintRecvQueue),
            "clear_send_queue" => Some(AdminCommand::ClearSendQueue),
            "clear_recv_queue" => Some(AdminCommand::ClearRecvQueue),
            "print_topics" => Some(AdminCommand::PrintTopics),
            "help" => Some(AdminCommand::Help),
            "exit" => Some(AdminCommand::Exit),
            _ => None,
        }
    }

    /// Apply the command and render what the operator sees.
    pub fn execute(self, broker: &Broker) -> String {
        match self {
            AdminCommand::PrintSendQueue => render_queue(&broker.send_queue_snapshot()),
            AdminCommand::PrintRecvQueue => render_queue(&broker.recv_queue_snapshot()),
            AdminCommand::ClearSendQueue => {
                let n = broker.clear_send_queue();
                format!("send queue cleared ({n} removed)")
            }
            AdminCommand::ClearRecvQueue => {
                let n = broker.clear_recv_queue();
                format!("recv queue cleared ({n} removed)")
            }
            AdminCommand::PrintTopics => {
                let summaries = broker.topic_summaries();
                if summaries.is_empty() {
                    return "no topics".to_string();
                }
                summaries
                    .iter()
                    .map(|t| format!("{}: {} subscribers", t.name, t.subscribers))
                    .collect::<Vec<_>>()
                    .join("\n")
            }
            AdminCommand::Help => HELP.to_string(),
            AdminCommand::Exit => "shutting down".to_string(),
        }
    }
}

/// Newest message first, space separated, in brackets.
fn render_queue(messages: &[Message]) -> String {
    let items: Vec<&str> = messages.iter().rev().map(Message::as_str).collect();
    format!("[{}]", items.join(" "))
}

/// Forward stdin lines from a dedicated thread. The thread is never joined,
/// so a pending read cannot hold up shutdown.
pub fn stdin_lines() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

/// Apply commands from `input`, printing each result, until the operator
/// types `exit` or the input closes.
pub async fn run_console(
    mut input: mpsc::UnboundedReceiver<String>,
    broker: &Broker,
) -> ConsoleEnd {
    println!("Enter command: {HELP}");
    while let Some(line) = input.recv().await {
        if line.trim().is_empty() {
            continue;
        }
        match AdminCommand::parse(&line) {
            Some(command) => {
                println!("{}", command.execute(broker));
                if command == AdminCommand::Exit {
                    return ConsoleEnd::Exit;
                }
            }
            None => println!("Unknown command"),
        }
    }
    debug!("Operator console input closed");
    ConsoleEnd::InputClosed
}
