use std::io::{BufRead, Write};

use ano_agent::{builtin_profile, AgentChannel, Channel};
use ano_core::config::AppConfig;
use ano_core::types::{AgentContext, OrgProfile};
use serde::Serialize;

use crate::commands::{builtin_registries, offline_llm, CommandResult, EXIT_IO, EXIT_NOT_FOUND};

pub const SENDER_ID: &str = "cli_user";
const PROMPT: &str = "you> ";
const HELP: &str = "Commands: help, quit, exit. Anything else is sent to the agent.";

#[derive(Debug, Serialize)]
struct ChatReport<'a> {
    command: &'static str,
    status: &'static str,
    agent: &'a str,
    turns: usize,
    errors: usize,
}

/// Line REPL against one built-in agent. Reads until EOF or `quit`/`exit`.
pub async fn run<R: BufRead, W: Write>(
    config: &AppConfig,
    agent_name: &str,
    reader: R,
    mut writer: W,
) -> CommandResult {
    let (agents, _capabilities) = builtin_registries(offline_llm(config));
    let agent = match agents.get(agent_name) {
        Ok(agent) => agent,
        Err(error) => return CommandResult::failure("chat", "registry", error.to_string(), EXIT_NOT_FOUND),
    };

    let mut channel = AgentChannel::new("cli", agent, AgentContext::new(OrgProfile::default()));
    if let Some(profile) = builtin_profile(agent_name) {
        if let (Some(input), Some(output)) = (profile.required_fields.first(), profile.result_fields.first()) {
            channel = channel.with_fields(*input, output.key);
        }
    }

    let mut turns = 0;
    let mut errors = 0;
    if let Err(error) = writeln!(writer, "ANO agent REPL ({agent_name}). {HELP}") {
        return io_failure(error);
    }

    for line in reader.lines() {
        let line = match line {
            Ok(line) => line,
            Err(error) => return io_failure(error),
        };
        let text = line.trim();

        let reply = match text {
            "" => continue,
            "quit" | "exit" => break,
            "help" => HELP.to_string(),
            _ => {
                turns += 1;
                match channel.handle_message(SENDER_ID, text, None).await {
                    Ok(reply) => reply,
                    Err(error) => {
                        errors += 1;
                        format!("Error: {error}")
                    }
                }
            }
        };

        if let Err(error) = writeln!(writer, "{PROMPT}{text}\n{agent_name}> {reply}") {
            return io_failure(error);
        }
    }

    let report = ChatReport { command: "chat", status: "ok", agent: agent_name, turns, errors };
    CommandResult::report(0, &report)
}

fn io_failure(error: std::io::Error) -> CommandResult {
    CommandResult::failure("chat", "io", error.to_string(), EXIT_IO)
}
