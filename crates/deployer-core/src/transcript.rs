//! Human-readable deploy transcript returned as the response body.

pub const FAILURE_BANNER: &str = "AUTOMATIC DEPLOY FAILED!\n========================\n";
pub const SUCCESS_LINE: &str = "\n\nOverall success!";
const ATTENTION_RULE: &str = "\n\n\n===========================\n";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entry {
    /// Output of an external command or script
    Step {
        label: String,
        output: String,
        failed: bool,
    },
    /// Single `[!]`/`[+]` line written by the deployer itself
    Note(String),
    /// Block placed at the top of the transcript
    Attention(String),
}

impl Entry {
    fn render_into(&self, out: &mut String) {
        match self {
            Entry::Step {
                label,
                output,
                failed,
            } => out.push_str(&format_step(label, output, *failed)),
            Entry::Note(text) => {
                out.push_str(text);
                out.push_str("\n\n");
            }
            Entry::Attention(text) => {
                out.push_str("ATTENTION!\n");
                out.push_str(text);
                out.push_str(ATTENTION_RULE);
            }
        }
    }
}

/// Format one step as a labeled, indented block.
///
/// A step without output that did not fail renders as an empty string.
pub fn format_step(label: &str, output: &str, failed: bool) -> String {
    let message = output.trim();
    if message.is_empty() && !failed {
        return String::new();
    }

    let mut block = if failed {
        format!("[-] {} (CRASHED):\n", label)
    } else {
        format!("[+] {}:\n", label)
    };
    block.push_str(message);
    let mut block = block.replace('\n', "\n    ");
    block.push_str(if message.is_empty() { "\n" } else { "\n\n" });
    block
}

/// Ordered record of one deploy run.
///
/// Attention blocks are prepended, so the most recent one ends up on top.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transcript {
    entries: Vec<Entry>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn step(&mut self, label: impl Into<String>, output: impl Into<String>, failed: bool) {
        let entry = Entry::Step {
            label: label.into(),
            output: output.into(),
            failed,
        };
        tracing::debug!("{}", render_entry(&entry).trim_end());
        self.entries.push(entry);
    }

    pub fn note(&mut self, text: impl Into<String>) {
        self.entries.push(Entry::Note(text.into()));
    }

    pub fn attention(&mut self, text: impl Into<String>) {
        self.entries.insert(0, Entry::Attention(text.into()));
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// Rendered transcript with surrounding whitespace removed.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for entry in &self.entries {
            entry.render_into(&mut out);
        }
        out.trim().to_string()
    }

    pub fn into_failure_body(self) -> String {
        format!("{}{}", FAILURE_BANNER, self.render())
    }

    pub fn into_success_body(self) -> String {
        format!("{}{}", self.render(), SUCCESS_LINE)
    }
}

fn render_entry(entry: &Entry) -> String {
    let mut out = String::new();
    entry.render_into(&mut out);
    out
}
