//! Main turn loop
//!
//! A turn enters through one of three doors: the answer to a pending
//! confirmation, the answer to a disambiguation question, or a fresh
//! utterance (pre-router, then context injection and the intent router).
//! All three end in plan execution and finalization, and every turn leaves
//! exactly one trace record behind.

use super::core::Orchestrator;
use super::session::Session;
use crate::disambiguation::{
    DisambiguationDialog, DisambiguationItem, LookupOutcome, Selection, NO_MATCH_QUESTION,
};
use crate::error::Error;
use crate::executor::{ConfirmationAnswer, NextStep};
use crate::finalize::FinalizeOutcome;
use crate::router::FALLBACK_QUESTION;
use crate::trace::TurnTrace;
use crate::types::{OrchestratorOutput, Route, RouteDecision, ToolCallResult, TurnInput};
use bantz_tools::registry::tool_domain;
use serde_json::Value;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Reply after the user turns down a pending call
pub const CONFIRMATION_DENIED_REPLY: &str = "Tamam, işlemi iptal ettim.";

/// Reply when the turn's job was cancelled
pub const CANCELLED_REPLY: &str = "Tamam, bıraktım.";

type TurnParts = (RouteDecision, Vec<ToolCallResult>, FinalizeOutcome);

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

/// Decision for a single call outside normal routing
fn decision_for_call(tool: &str, params: &Value) -> RouteDecision {
    let route = Route::from_domain(tool_domain(tool)).unwrap_or(Route::Unknown);
    let intent = tool.split_once('.').map_or(tool, |(_, intent)| intent);
    let slots = params
        .as_object()
        .map(|map| map.clone().into_iter().collect())
        .unwrap_or_default();
    RouteDecision::new(route, intent)
        .with_confidence(1.0)
        .with_slots(slots)
        .with_tool_plan(vec![tool.to_string()])
}

fn cancelled(
    decision: RouteDecision,
    results: Vec<ToolCallResult>,
    trace: &mut TurnTrace,
    error: Error,
) -> TurnParts {
    info!(error = %error, "Turn cancelled");
    trace.errors.push(error.to_string());
    (
        decision.without_plan("cancelled"),
        results,
        FinalizeOutcome::none("cancelled", CANCELLED_REPLY),
    )
}

impl Orchestrator {
    /// Run one turn to completion
    #[instrument(skip_all, fields(turn_id = %input.turn_id, turn = input.turn_number))]
    pub(crate) async fn run_turn(
        &self,
        session: &mut Session,
        input: TurnInput,
        job: Uuid,
    ) -> OrchestratorOutput {
        let started = Instant::now();
        let mut trace = TurnTrace::new(&input.turn_id, input.turn_number);

        let (mut decision, results, outcome) = self.run_phases(session, &input, job, &mut trace).await;

        // the firewall, not the router's flag, decides what is pending
        if let Some(pending) = session.execution.firewall.pending() {
            decision = decision.with_confirmation(pending.prompt.clone());
        } else {
            decision.requires_confirmation = false;
            decision.confirmation_prompt = None;
        }

        trace.route = decision.route;
        trace.intent = decision.intent.clone();
        trace.confidence = decision.confidence;
        trace.finalizer = outcome.finalizer.clone();
        trace.tier = outcome.tier;
        trace.tier_reason = outcome.tier_reason.clone();
        trace.guard_failed = outcome.verdict.as_ref().is_some_and(|v| !v.passed);
        trace.record_tools(&results);
        trace.timings.total_ms = elapsed_ms(started);

        info!(
            route = %decision.route,
            intent = %decision.intent,
            tools = results.len(),
            finalizer = %outcome.finalizer,
            elapsed_ms = trace.timings.total_ms,
            "Turn finished"
        );

        if let Some(log) = &self.trace_log {
            if let Err(e) = log.append(&trace).await {
                warn!(error = %e, "Trace append failed");
            }
        }

        session.last_results = results.clone();
        OrchestratorOutput::from_decision(&input.turn_id, decision, outcome.reply, outcome.finalizer)
            .with_tool_results(results)
            .with_tier(outcome.tier, outcome.tier_reason)
    }

    async fn run_phases(
        &self,
        session: &mut Session,
        input: &TurnInput,
        job: Uuid,
        trace: &mut TurnTrace,
    ) -> TurnParts {
        let turn_id = input.turn_id.as_str();
        let text = input.user_input.trim();

        if let Some(pending) = session.execution.firewall.pending().cloned() {
            let decision = decision_for_call(&pending.tool, &pending.params);
            match ConfirmationAnswer::parse(text) {
                ConfirmationAnswer::Confirm => {
                    if let Err(e) = self.jobs.checkpoint(job).await {
                        session.execution.firewall.deny();
                        return cancelled(decision, Vec::new(), trace, e);
                    }
                    session.execution.firewall.confirm();
                    let decision = decision.with_note("confirmed");
                    let result = self
                        .executor
                        .execute_call(
                            turn_id,
                            &pending.tool,
                            &pending.params,
                            Some(&pending.prompt),
                            &mut session.execution,
                        )
                        .await;
                    // a call stopped before the firewall leaves its key unused
                    session.execution.firewall.consume(&pending.action_key);
                    return self
                        .finish(turn_id, text, job, decision, vec![result], trace)
                        .await;
                }
                ConfirmationAnswer::Deny => {
                    session.execution.firewall.deny();
                    info!(tool = %pending.tool, "Pending call denied");
                    return (
                        decision.without_plan("confirmation_denied"),
                        Vec::new(),
                        FinalizeOutcome::none("confirmation_denied", CONFIRMATION_DENIED_REPLY),
                    );
                }
                ConfirmationAnswer::Unclear => {
                    debug!(tool = %pending.tool, "Answer unclear, confirmation still pending");
                    let results = self
                        .executor
                        .execute_plan(turn_id, &decision, &mut session.execution, |_| NextStep::Continue)
                        .await;
                    return self.finish(turn_id, text, job, decision, results, trace).await;
                }
            }
        }

        if let Some(request) = session.pending_disambiguation.take() {
            match self.disambiguation.resolve(&request, text) {
                Selection::Chosen(item) => {
                    info!(index = item.index, label = %item.label, "Candidate selected");
                    let decision = request
                        .decision
                        .clone()
                        .with_slot("id", item.id.clone())
                        .with_tool_plan(request.remaining_plan.clone())
                        .with_note(format!("selected: {}", item.index));
                    if decision.tool_plan.is_empty() {
                        // nothing left to run; the listing grounds the reply
                        let grounding = input.prior_results.clone();
                        let (decision, _, outcome) =
                            self.finish(turn_id, text, job, decision, grounding, trace).await;
                        return (decision, Vec::new(), outcome);
                    }
                    return self.execute_and_finish(session, input, job, decision, trace).await;
                }
                Selection::Reask(question) => {
                    let decision = request
                        .decision
                        .clone()
                        .without_plan("disambiguation")
                        .with_question(question.clone());
                    session.pending_disambiguation = Some(request);
                    return (decision, Vec::new(), FinalizeOutcome::none("ask_user", question));
                }
            }
        }

        if text.is_empty() {
            let decision = RouteDecision::fallback(FALLBACK_QUESTION);
            return (
                decision,
                Vec::new(),
                FinalizeOutcome::none("ask_user", FALLBACK_QUESTION),
            );
        }

        let decision = match self.pre_router.route(text) {
            Some(admitted) if admitted.bypasses_router() => {
                trace.pre_routed = true;
                let decision = admitted.into_decision();
                if decision.tool_plan.is_empty() {
                    if let Some(reply) = decision.assistant_reply.clone() {
                        return (decision, Vec::new(), FinalizeOutcome::none("pre_router", reply));
                    }
                }
                decision
            }
            admitted => {
                if let Some(m) = admitted {
                    debug!(rule = %m.rule, "Destructive phrasing, routing through the model");
                }
                let (context, memory_error) = self.injector.inject_or_truncate(
                    turn_id,
                    &input.dialog_summary,
                    &input.retrieved_memory,
                );
                trace.memory_tokens = context.injected_tokens;
                if let Some(e) = memory_error {
                    trace.errors.push(e.to_string());
                }

                if let Err(e) = self.jobs.checkpoint(job).await {
                    return cancelled(RouteDecision::new(Route::Unknown, ""), Vec::new(), trace, e);
                }
                let started = Instant::now();
                let (reply, error) = self
                    .router
                    .route_or_fallback(
                        turn_id,
                        text,
                        &context.dialog_summary,
                        &context.retrieved_memory,
                    )
                    .await;
                trace.timings.router_ms = elapsed_ms(started);
                trace.router_prompt_tokens = reply.prompt_tokens;
                if let Some(e) = error {
                    warn!(error = %e, "Router failed, using fallback decision");
                    trace.errors.push(e.to_string());
                }
                reply.decision
            }
        };

        let catalog = self.executor.catalog();
        let (decision, verification) = self.verifier.apply(decision, text, &catalog);
        trace.verification = verification.codes().into_iter().map(str::to_string).collect();

        self.execute_and_finish(session, input, job, decision, trace).await
    }

    async fn execute_and_finish(
        &self,
        session: &mut Session,
        input: &TurnInput,
        job: Uuid,
        decision: RouteDecision,
        trace: &mut TurnTrace,
    ) -> TurnParts {
        let turn_id = input.turn_id.as_str();
        let text = input.user_input.trim();

        if decision.ask_user || decision.tool_plan.is_empty() {
            return self.finish(turn_id, text, job, decision, Vec::new(), trace).await;
        }

        if let Err(e) = self.jobs.checkpoint(job).await {
            return cancelled(decision, Vec::new(), trace, e);
        }
        let dialog = &self.disambiguation;
        let intent = decision.intent.clone();
        let mut needs_target = !decision.has_slot("id");
        let mut target: Option<DisambiguationItem> = None;
        let mut no_match = false;
        let results = self
            .executor
            .execute_plan(turn_id, &decision, &mut session.execution, |result| {
                match dialog.lookup_outcome(&intent, result) {
                    Some(LookupOutcome::Ambiguous) => NextStep::Stop,
                    Some(LookupOutcome::Empty) if needs_target => {
                        no_match = true;
                        NextStep::Stop
                    }
                    Some(LookupOutcome::Single(item)) if needs_target => {
                        needs_target = false;
                        let value = item.id.clone();
                        target = Some(item);
                        NextStep::Fill {
                            slot: "id".to_string(),
                            value,
                        }
                    }
                    _ => NextStep::Continue,
                }
            })
            .await;

        let mut decision = decision;
        if no_match {
            info!(intent = %decision.intent, "Lookup found no target");
            decision = decision
                .without_plan("no_match")
                .with_question(NO_MATCH_QUESTION);
        } else if let Some(item) = target {
            debug!(id = %item.id, label = %item.label, "Single lookup candidate used as target");
            decision = decision
                .with_slot("id", item.id)
                .with_note(format!("target: {}", item.label));
        } else if !results.iter().any(|r| r.pending_confirmation) {
            if let Some(request) = self.disambiguation.check(&decision, &results) {
                decision = DisambiguationDialog::apply(decision, &request);
                session.pending_disambiguation = Some(request);
            }
        }

        self.finish(turn_id, text, job, decision, results, trace).await
    }

    async fn finish(
        &self,
        turn_id: &str,
        user_input: &str,
        job: Uuid,
        decision: RouteDecision,
        results: Vec<ToolCallResult>,
        trace: &mut TurnTrace,
    ) -> TurnParts {
        if let Err(e) = self.jobs.checkpoint(job).await {
            return cancelled(decision, results, trace, e);
        }
        let started = Instant::now();
        let outcome = self
            .finalizer
            .finalize(turn_id, user_input, &decision, &results)
            .await;
        trace.timings.finalize_ms = elapsed_ms(started);
        (decision, results, outcome)
    }
}
