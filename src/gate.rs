//! Turns model output into a command and decides whether, and how, it runs.
//!
//! Every path goes through the same screen: classify, show the verdict,
//! refuse Critical commands unless safety is off, honour dry-run, confirm,
//! then execute and record.

use crate::db::HistoryLog;
use crate::error::{Result, TermiError};
use crate::executor::ShellRunner;
use crate::fallback::fallback;
use crate::llm::{ChatRequest, ModelBackend};
use crate::parser::parse;
use crate::safety::classify;
use crate::signal::INTERRUPTS;
use crate::types::{HistoryEntry, ParsedResponse, ResponseKind, RiskLevel, RunMode};
use crate::ui::{Console, Prompter, Tone};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateSettings {
    /// Classify and confirm; off means `--no-safety`.
    pub safety: bool,
    pub dry_run: bool,
    /// Plan steps that classify as safe run without asking.
    pub auto: bool,
}

impl Default for GateSettings {
    fn default() -> Self {
        Self {
            safety: true,
            dry_run: false,
            auto: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Executed(i32),
    DryRun,
    /// The user declined.
    Skipped,
    /// Critical command refused.
    Blocked,
    NoCommand,
    EmptyPlan,
    /// Plan ran; carries the aggregated exit status.
    PlanFinished(i32),
}

impl Outcome {
    pub fn exit_code(&self) -> i32 {
        match self {
            Outcome::Executed(rc) | Outcome::PlanFinished(rc) => *rc,
            Outcome::DryRun | Outcome::Skipped => 0,
            Outcome::Blocked | Outcome::NoCommand | Outcome::EmptyPlan => 1,
        }
    }
}

/// Exit status aggregation across plan steps.
///
/// A failing step sets the final code; later successes never clear it and a
/// later failure replaces it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlanRun {
    rc_final: i32,
}

impl PlanRun {
    pub fn record_exit(&mut self, rc: i32) {
        if rc != 0 {
            self.rc_final = rc;
        }
    }

    pub fn rc_final(&self) -> i32 {
        self.rc_final
    }
}

pub struct Gate<'a> {
    console: &'a mut Console,
    prompter: &'a mut dyn Prompter,
    shell: &'a mut dyn ShellRunner,
    history: &'a mut dyn HistoryLog,
    model: String,
    settings: GateSettings,
}

impl<'a> Gate<'a> {
    pub fn new(
        console: &'a mut Console,
        prompter: &'a mut dyn Prompter,
        shell: &'a mut dyn ShellRunner,
        history: &'a mut dyn HistoryLog,
        model: &str,
        settings: GateSettings,
    ) -> Self {
        Self {
            console,
            prompter,
            shell,
            history,
            model: model.to_string(),
            settings,
        }
    }

    fn record(&mut self, query: &str, command: &str, mode: RunMode, exit_code: Option<i32>) {
        let entry = HistoryEntry::new(query, command, mode, &self.model, exit_code);
        if let Err(e) = self.history.append(&entry) {
            tracing::warn!("failed to record history: {}", e);
        }
    }

    /// Classify and display; `None` when the command must not run.
    fn screen(&mut self, command: &str) -> Option<RiskLevel> {
        let verdict = classify(command);
        tracing::debug!(level = %verdict.level, "classified command");

        if !self.settings.safety {
            return Some(verdict.level);
        }

        self.console.show_verdict(&verdict);
        if verdict.level == RiskLevel::Critical {
            self.console
                .say(Tone::Error, "This command is blocked. Override with --no-safety.");
            tracing::info!("blocked critical command");
            return None;
        }
        Some(verdict.level)
    }

    fn run_and_record(&mut self, query: &str, command: &str, mode: RunMode) -> i32 {
        let rc = self.shell.run(command);
        tracing::info!(rc, mode = %mode, "command finished");
        self.record(query, command, mode, Some(rc));
        rc
    }

    fn report_exit(&mut self, rc: i32) {
        if rc == 0 {
            self.console.say(Tone::Success, "Done (exit 0)");
        } else {
            self.console.say(Tone::Error, &format!("Exit code: {}", rc));
        }
    }

    /// Screen, dry-run, confirm, run. Shared by the single-command flows.
    fn gate_single(
        &mut self,
        query: &str,
        command: &str,
        mode: RunMode,
        always_confirm: bool,
    ) -> Result<Outcome> {
        let Some(level) = self.screen(command) else {
            return Ok(Outcome::Blocked);
        };

        if self.settings.dry_run {
            self.console.say(Tone::Muted, "(dry-run, not executing)");
            self.record(query, command, RunMode::DryRun, None);
            return Ok(Outcome::DryRun);
        }

        let ask = always_confirm || (self.settings.safety && level >= RiskLevel::Caution);
        if ask && !self.prompter.confirm("Run this?", true)? {
            self.console.say(Tone::Muted, "Skipped");
            tracing::info!("user declined");
            self.record(query, command, RunMode::Skipped, None);
            return Ok(Outcome::Skipped);
        }

        let rc = self.run_and_record(query, command, mode);
        self.report_exit(rc);
        Ok(Outcome::Executed(rc))
    }

    /// `None` when the model could not be reached; Ctrl-C during the call
    /// aborts the flow once it returns.
    fn ask_model(&mut self, backend: &dyn ModelBackend, request: &ChatRequest) -> Result<Option<String>> {
        INTERRUPTS.take();
        self.console.status("thinking...");
        let reply = backend.generate(request);
        self.console.clear_status();
        if INTERRUPTS.take() {
            return Err(TermiError::Interrupted);
        }
        match reply {
            Ok(text) => Ok(Some(text)),
            Err(e) => {
                tracing::warn!("model request failed: {}", e);
                Ok(None)
            }
        }
    }

    /// Natural language to one gated command, falling back to the
    /// heuristics when the model is unreachable or says nothing usable.
    pub fn execute_oneshot(
        &mut self,
        backend: &dyn ModelBackend,
        request: &ChatRequest,
        query: &str,
    ) -> Result<Outcome> {
        let reply = self.ask_model(backend, request)?;
        let reachable = reply.is_some();

        let parsed = reply
            .map(|raw| parse(&raw, ResponseKind::Command))
            .unwrap_or(ParsedResponse::Empty);

        let command = match parsed {
            ParsedResponse::Command(cmd) => cmd,
            _ => {
                let notice = if reachable {
                    "Model gave no usable command, using heuristic fallback"
                } else {
                    "LLM unavailable, using heuristic fallback"
                };
                self.console.say(Tone::Warning, notice);
                tracing::info!("falling back to heuristics");
                fallback(query)
            }
        };

        if command.trim().is_empty() {
            self.console.say(Tone::Error, "No command produced.");
            return Ok(Outcome::NoCommand);
        }

        self.console.show_command(&command);
        self.gate_single(query, &command, RunMode::Oneshot, true)
    }

    /// Text the user typed that already is a command. Asks only when the
    /// classifier finds something to warn about.
    pub fn run_direct(&mut self, command: &str) -> Result<Outcome> {
        let command = command.trim();
        if command.is_empty() {
            return Ok(Outcome::NoCommand);
        }
        self.gate_single(command, command, RunMode::Direct, false)
    }

    pub fn run_bookmark(&mut self, name: &str, command: &str) -> Result<Outcome> {
        if command.trim().is_empty() {
            self.console.say(Tone::Error, &format!("Bookmark '{}' is empty.", name));
            return Ok(Outcome::NoCommand);
        }
        self.console.show_command(command);
        self.gate_single(name, command, RunMode::Bookmark, true)
    }

    /// Multi-step plan: show everything first, then gate each step.
    pub fn execute_plan(
        &mut self,
        backend: &dyn ModelBackend,
        request: &ChatRequest,
        task: &str,
    ) -> Result<Outcome> {
        let parsed = match self.ask_model(backend, request)? {
            Some(raw) => parse(&raw, ResponseKind::Plan),
            None => {
                self.console.say(Tone::Warning, "LLM unavailable, cannot plan.");
                ParsedResponse::Empty
            }
        };

        let (steps, notes) = match parsed {
            ParsedResponse::Plan { steps, notes } if !steps.is_empty() => (steps, notes),
            _ => {
                self.console.say(
                    Tone::Error,
                    "Planner returned no steps. Try rephrasing or a bigger model.",
                );
                return Ok(Outcome::EmptyPlan);
            }
        };

        self.console.show_plan(&steps, notes.as_deref());

        let mut run = PlanRun::default();
        for (i, step) in steps.iter().enumerate() {
            let n = i + 1;
            let cmd = step.cmd.trim();
            if cmd.is_empty() {
                continue;
            }

            if self.settings.dry_run {
                self.console
                    .say(Tone::Muted, &format!("[dry-run] step {}: {}", n, cmd));
                continue;
            }

            let Some(level) = self.screen(cmd) else {
                continue;
            };

            let ask = !self.settings.auto || (self.settings.safety && level >= RiskLevel::Caution);
            if ask && !self.prompter.confirm(&format!("Run step {}? {}", n, cmd), true)? {
                self.console.say(Tone::Muted, "Skipped");
                self.record(task, cmd, RunMode::Skipped, None);
                continue;
            }

            self.console.blank();
            self.console.say(Tone::Step, &format!("Step {}: {}", n, cmd));
            let rc = self.run_and_record(task, cmd, RunMode::Plan);
            run.record_exit(rc);

            if rc != 0 {
                self.console
                    .say(Tone::Error, &format!("Step {} failed (exit {})", n, rc));
                if !self.settings.auto && !self.prompter.confirm("Continue?", false)? {
                    break;
                }
            }
        }

        Ok(Outcome::PlanFinished(run.rc_final()))
    }
}
