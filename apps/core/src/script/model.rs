use crate::error::AppError;
use crate::pacing::Bounds;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt::Write as _;
use tracing::warn;
use validator::Validate;

/// What kind of reply ends a step's waiting state, and where it routes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Expect {
    /// A yes/no question. `yes` is followed on an affirmative reply; `no`, when
    /// present, on a negative one. Anything else stops the run.
    YesNo {
        yes: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        no: Option<String>,
    },
    /// Any non-empty reply is captured as a lead contact, then `next` is emitted.
    FreeText { next: String },
}

impl Expect {
    fn targets(&self) -> Vec<&str> {
        match self {
            Expect::YesNo { yes, no } => {
                let mut targets = vec![yes.as_str()];
                targets.extend(no.as_deref());
                targets
            }
            Expect::FreeText { next } => vec![next.as_str()],
        }
    }
}

/// A node in the script graph: a burst of messages plus an optional branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct Step {
    #[validate(length(min = 1))]
    pub id: String,
    #[serde(default)]
    pub messages: Vec<String>,
    /// `"start"` marks the designated entry step.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expect: Option<Expect>,
}

impl Step {
    pub fn is_start(&self) -> bool {
        self.on.as_deref() == Some("start")
    }
}

fn default_jitter() -> Bounds {
    Bounds::new(300, 1_200)
}

fn default_delay() -> Bounds {
    Bounds::new(800, 2_000)
}

/// Script-level pacing defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Defaults {
    #[serde(default = "default_jitter")]
    pub jitter_ms: Bounds,
    #[serde(default = "default_delay")]
    pub delay_ms: Bounds,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            jitter_ms: default_jitter(),
            delay_ms: default_delay(),
        }
    }
}

/// On-disk shape of a script definition.
#[derive(Debug, Deserialize)]
struct ScriptDefinition {
    steps: Vec<Step>,
    #[serde(default)]
    defaults: Defaults,
}

/// A loaded, validated and id-indexed script. Immutable once built.
#[derive(Debug, Clone)]
pub struct Script {
    steps: Vec<Step>,
    index: HashMap<String, usize>,
    defaults: Defaults,
}

impl Script {
    /// Parses and validates a JSON script definition.
    pub fn from_json(source: &str) -> Result<Self, AppError> {
        let definition: ScriptDefinition = serde_json::from_str(source)?;
        Self::new(definition.steps, definition.defaults)
    }

    /// Builds a script from steps, rejecting empty or duplicate ids and inverted bounds.
    pub fn new(steps: Vec<Step>, defaults: Defaults) -> Result<Self, AppError> {
        for (name, bounds) in [("jitterMs", defaults.jitter_ms), ("delayMs", defaults.delay_ms)] {
            if bounds.min > bounds.max {
                return Err(AppError::ScriptLoad(format!(
                    "defaults.{} has min {} greater than max {}",
                    name, bounds.min, bounds.max
                )));
            }
        }

        let mut index = HashMap::with_capacity(steps.len());
        for (position, step) in steps.iter().enumerate() {
            step.validate()
                .map_err(|e| AppError::ScriptLoad(format!("step #{}: {}", position, e)))?;
            if index.insert(step.id.clone(), position).is_some() {
                return Err(AppError::ScriptLoad(format!("duplicate step id '{}'", step.id)));
            }
        }

        let script = Self {
            steps,
            index,
            defaults,
        };
        script.warn_dangling_targets();
        Ok(script)
    }

    fn warn_dangling_targets(&self) {
        let known: HashSet<&str> = self.index.keys().map(String::as_str).collect();
        for step in &self.steps {
            let Some(expect) = &step.expect else { continue };
            for target in expect.targets() {
                if !known.contains(target) {
                    warn!(step = %step.id, branch = target, "Script branch points to an unknown step");
                }
            }
        }
    }

    pub fn find_step(&self, id: &str) -> Option<&Step> {
        self.index.get(id).map(|&i| &self.steps[i])
    }

    /// First step flagged `on: "start"`, else the first step in definition order.
    pub fn start_step(&self) -> Option<&Step> {
        self.steps
            .iter()
            .find(|step| step.is_start())
            .or_else(|| self.steps.first())
    }

    pub fn defaults(&self) -> Defaults {
        self.defaults
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Human-readable listing used by the "show script" operator command.
    pub fn summary(&self) -> String {
        let mut out = format!(
            "Steps: {} | jitter {}-{} ms | delay {}-{} ms",
            self.steps.len(),
            self.defaults.jitter_ms.min,
            self.defaults.jitter_ms.max,
            self.defaults.delay_ms.min,
            self.defaults.delay_ms.max
        );
        for step in &self.steps {
            let marker = if step.is_start() { " (start)" } else { "" };
            let _ = write!(out, "\n- {}{}: {} msg", step.id, marker, step.messages.len());
            match &step.expect {
                Some(Expect::YesNo { yes, no }) => {
                    let _ = write!(out, ", yes -> {}", yes);
                    if let Some(no) = no {
                        let _ = write!(out, ", no -> {}", no);
                    }
                }
                Some(Expect::FreeText { next }) => {
                    let _ = write!(out, ", free text -> {}", next);
                }
                None => {}
            }
        }
        out
    }
}
