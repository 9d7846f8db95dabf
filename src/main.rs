//! Interactive demo — a terminal chat against the offline Slack/Gmail
//! topology with human approval prompts.

use std::io::{BufRead, Write};
use std::sync::Arc;

use liaison::engine::history::user;
use liaison::engine::{Decision, DecisionMap, EngineError, Item, PendingInterruption};
use liaison::model::KeywordModel;
use liaison::tools::{InstantConsent, StaticCatalog};
use liaison::{ServiceConfig, TurnRequest, TurnService};

const USER_ID: &str = "mateo@example.dev";

fn main() -> anyhow::Result<()> {
    liaison::init_tracing();

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(run())
}

async fn run() -> anyhow::Result<()> {
    let service = TurnService::new(
        Arc::new(KeywordModel),
        Arc::new(StaticCatalog::slack_gmail_demo()),
        Arc::new(InstantConsent),
        ServiceConfig::default(),
    );

    println!("Welcome to the chat! Ask about your Gmail inbox or Slack workspace.");
    println!("Type 'exit' to leave.");

    let stdin = std::io::stdin();
    let conversation_id = uuid::Uuid::new_v4().to_string();
    let mut printed = 0usize;

    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line.eq_ignore_ascii_case("exit") {
            break;
        }

        let mut request = TurnRequest {
            history: vec![user(line)],
            conversation_id: Some(conversation_id.clone()),
            ..Default::default()
        };
        printed += 1; // the user line itself

        // Run, then keep resuming until no approvals remain.
        loop {
            let response = match service.submit(USER_ID, request).await {
                Ok(response) => response,
                Err(EngineError::TurnBudgetExceeded { budget, .. }) => {
                    println!("(the agents ran out of their budget of {budget} steps, try rephrasing)");
                    // The abandoned turn is not stored, so the user line
                    // will not reappear in the next history.
                    printed = printed.saturating_sub(1);
                    break;
                }
                Err(e) => return Err(e.into()),
            };

            print_new_items(&response.history, &mut printed);

            let Some(approvals) = response.approvals else {
                break;
            };
            let decisions = prompt_for_decisions(&approvals)?;
            request = TurnRequest {
                conversation_id: Some(response.conversation_id),
                decisions,
                ..Default::default()
            };
        }
    }

    Ok(())
}

fn print_new_items(history: &[Item], printed: &mut usize) {
    for item in &history[(*printed).min(history.len())..] {
        match item {
            Item::Assistant { content } => println!("{content}"),
            Item::FunctionCall { name, .. } => println!("  [calling {name}]"),
            Item::FunctionResult { name, output, .. } => {
                println!("  [{name} returned {output}]")
            }
            Item::User { .. } => {}
        }
    }
    *printed = history.len();
}

fn prompt_for_decisions(approvals: &[PendingInterruption]) -> anyhow::Result<DecisionMap> {
    let stdin = std::io::stdin();
    let mut decisions = DecisionMap::new();

    for interruption in approvals {
        println!(
            "Agent {} would like to use the tool {} with the arguments {}.",
            interruption.agent, interruption.tool_name, interruption.arguments
        );
        loop {
            print!("Do you approve? (y/n) ");
            std::io::stdout().flush()?;

            let mut answer = String::new();
            stdin.lock().read_line(&mut answer)?;
            match answer.trim().to_lowercase().as_str() {
                "y" | "yes" => {
                    decisions.insert(interruption.call_id.clone(), Decision::Approved);
                    break;
                }
                "n" | "no" => {
                    decisions.insert(interruption.call_id.clone(), Decision::Rejected);
                    break;
                }
                _ => println!("Please answer y or n."),
            }
        }
    }

    Ok(decisions)
}
