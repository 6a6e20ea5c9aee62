use std::collections::HashSet;
use std::io::{self, Write};

use litagent_stream::reducer;
use litagent_stream::{SessionEvent, SessionPhase, SessionState, StageId, TypedUpdate};

/// Stage ids the backend runs, in pipeline order, with their display labels.
pub const EXPECTED_STAGES: [(&str, &str); 4] = [
    ("researcher", "Research"),
    ("strategist", "Strategy"),
    ("writer", "Draft"),
    ("editor", "Edit"),
];

/// Display label for a stage id. Unknown ids are shown as-is.
pub fn stage_label(id: &str) -> &str {
    EXPECTED_STAGES
        .iter()
        .find(|(known, _)| *known == id)
        .map_or(id, |(_, label)| *label)
}

/// Zero-based position of `current` in `expected`, if it is a known stage.
pub fn current_stage_index(current: Option<&StageId>, expected: &[&str]) -> Option<usize> {
    let current = current?;
    expected.iter().position(|id| current == id)
}

/// Writes session events to a terminal.
///
/// Keeps its own copy of the session state, folded with the library reducer,
/// so progress reflects exactly what the session saw.
pub struct Renderer<W> {
    out: W,
    quiet: bool,
    state: SessionState,
    headed: HashSet<StageId>,
}

impl<W: Write> Renderer<W> {
    pub fn new(out: W, quiet: bool) -> Self {
        Self {
            out,
            quiet,
            state: SessionState::running(),
            headed: HashSet::new(),
        }
    }

    #[cfg(test)]
    fn state(&self) -> &SessionState {
        &self.state
    }

    #[cfg(test)]
    fn into_inner(self) -> W {
        self.out
    }

    pub fn on_event(&mut self, event: &SessionEvent) -> io::Result<()> {
        match event {
            SessionEvent::Started { topic, .. } => {
                if !self.quiet {
                    writeln!(self.out, "Generating: {topic}")?;
                }
            }
            SessionEvent::Update { update, .. } => {
                self.state = reducer::apply(std::mem::take(&mut self.state), update.clone());
                if !self.quiet {
                    self.render_update(update)?;
                }
            }
            // Logged by the session driver.
            SessionEvent::Diagnostic { .. } => {}
            SessionEvent::Finished { state, .. } => {
                self.state = state.clone();
                self.render_outcome()?;
            }
        }
        self.out.flush()
    }

    fn render_update(&mut self, update: &TypedUpdate) -> io::Result<()> {
        match update {
            TypedUpdate::StageStarted { stage, message } => {
                self.header(stage)?;
                if !message.is_empty() {
                    write!(self.out, "{message}")?;
                }
            }
            TypedUpdate::StageDelta { stage, delta } => {
                self.header(stage)?;
                write!(self.out, "{delta}")?;
            }
            TypedUpdate::StageCompleted { stage, .. } => {
                self.header(stage)?;
                writeln!(self.out)?;
                writeln!(self.out, "✓ {} complete", stage_label(stage.as_str()))?;
            }
            TypedUpdate::SessionDone { .. }
            | TypedUpdate::StreamEnded
            | TypedUpdate::ParseFailed { .. } => {}
        }
        Ok(())
    }

    fn header(&mut self, stage: &StageId) -> io::Result<()> {
        if !self.headed.insert(stage.clone()) {
            return Ok(());
        }
        if self.headed.len() > 1 {
            writeln!(self.out)?;
        }
        let expected: Vec<&str> = EXPECTED_STAGES.iter().map(|(id, _)| *id).collect();
        let label = stage_label(stage.as_str());
        match current_stage_index(Some(stage), &expected) {
            Some(index) => writeln!(self.out, "== {label} [{}/{}]", index + 1, expected.len()),
            None => writeln!(self.out, "== {label}"),
        }
    }

    fn render_outcome(&mut self) -> io::Result<()> {
        match self.state.phase {
            SessionPhase::Done => {
                if let Some(article) = &self.state.final_artifact {
                    if !self.quiet {
                        writeln!(self.out, "\n\n== Final article\n")?;
                    }
                    writeln!(self.out, "{article}")?;
                }
            }
            SessionPhase::Stopped if !self.quiet => writeln!(self.out, "\n\nGeneration stopped.")?,
            SessionPhase::Errored if !self.quiet => {
                let reason = self
                    .state
                    .failure
                    .as_ref()
                    .map_or_else(|| "unknown failure".to_string(), ToString::to_string);
                writeln!(self.out, "\n\nGeneration failed: {reason}")?;
            }
            _ => {}
        }
        Ok(())
    }
}
