//! `chat` command
//!
//! Every line read from stdin is one utterance. The conversation driver
//! owns the turn job; the session only runs the pipeline inside it.

use crate::app::build_orchestrator;
use crate::config::load_config;
use anyhow::{Context, Result};
use bantz_core::{
    ConversationDriver, ConversationHandle, OrchestratorOutput, SessionHandle, Transition,
    TransitionOutcome,
};
use std::collections::VecDeque;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, warn};

/// Exchanges kept for the dialog summary
const SUMMARY_TURNS: usize = 3;

/// Rolling plain-text summary of the last few exchanges
#[derive(Default)]
struct DialogSummary {
    turns: VecDeque<(String, String)>,
}

impl DialogSummary {
    fn push(&mut self, user: &str, reply: &str) {
        if self.turns.len() == SUMMARY_TURNS {
            self.turns.pop_front();
        }
        self.turns.push_back((user.to_string(), reply.to_string()));
    }

    fn render(&self) -> String {
        self.turns
            .iter()
            .map(|(user, reply)| format!("Kullanıcı: {user}\nBantz: {reply}"))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

pub async fn run(once: Option<String>, json: bool) -> Result<()> {
    let config = load_config()?;
    let orchestrator = build_orchestrator(&config).await?;
    let session = orchestrator.session();
    let driver = ConversationDriver::spawn(
        std::sync::Arc::clone(orchestrator.jobs()),
        config.orchestrator.conversation.clone(),
    );
    let mut summary = DialogSummary::default();

    if let Some(text) = once {
        let output = turn(&driver, &session, &text, &summary).await?;
        print_output(&output, json)?;
        return Ok(());
    }

    println!("Bantz hazır. Çıkmak için 'çıkış' yaz, oturumu sıfırlamak için '/reset'.");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
        let text = line.trim();
        match text {
            "" => continue,
            "çıkış" | "/quit" | "/exit" => break,
            "/reset" => {
                session.reset().await;
                driver.send(Transition::Reset).await?;
                summary = DialogSummary::default();
                println!("Oturum sıfırlandı.");
                continue;
            }
            _ => {}
        }

        let output = turn(&driver, &session, text, &summary).await?;
        summary.push(text, &output.assistant_reply);
        print_output(&output, json)?;
    }

    let stats = orchestrator.pre_router().stats();
    debug!(
        total = stats.total,
        bypassed = stats.bypassed,
        bypass_rate = stats.bypass_rate(),
        "Session finished"
    );
    Ok(())
}

/// Drive one utterance through the voice-loop states
async fn turn(
    driver: &ConversationHandle,
    session: &SessionHandle,
    text: &str,
    summary: &DialogSummary,
) -> Result<OrchestratorOutput> {
    driver.send(Transition::Wake).await?;
    let job = match driver.send(Transition::Heard).await? {
        TransitionOutcome::Moved { job: Some(job), .. } => job,
        other => anyhow::bail!("Conversation driver did not start a turn: {other:?}"),
    };

    let output = session
        .process_turn_in_job(job, text, &summary.render(), &[])
        .await;

    for transition in [Transition::Replied, Transition::Finished] {
        if let TransitionOutcome::Rejected { state, .. } = driver.send(transition).await? {
            warn!(%state, ?transition, "Conversation transition rejected");
        }
    }
    Ok(output)
}

fn print_output(output: &OrchestratorOutput, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(output)?);
        return Ok(());
    }
    println!("bantz> {}", output.assistant_reply);
    if let Some(prompt) = output.confirmation_prompt.as_deref() {
        if output.requires_confirmation && prompt != output.assistant_reply {
            println!("bantz> {prompt}");
        }
    }
    Ok(())
}
