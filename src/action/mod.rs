//! Action: The transformation catalog and prompt construction.
//!
//! Every user-facing rewrite command maps to one [`ActionKind`]. The
//! kind selects a prompt template and a set of thinking phrases; it
//! never branches the streaming engine itself.

/// The fixed set of text transformations the plugin offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    /// General quality pass over the selection.
    Improve,
    /// Expand the selection with more detail.
    Lengthen,
    /// Condense the selection.
    Shorten,
    /// Rewrite the selection in a chosen tone.
    Retone,
    /// Apply a free-form user instruction to the selection.
    CustomInstruction,
    /// Challenge the selection's argument.
    Critique,
    /// Fix grammar and spelling only.
    GrammarFix,
    /// Full rewrite of the selection.
    Rewrite,
    /// Insert generated text at the cursor.
    GenericAdd,
    /// Edit an arbitrary region from an agent-produced change.
    GenericEdit,
    /// Remove a region.
    Delete,
}

impl ActionKind {
    /// Menu label for this action.
    pub const fn label(self) -> &'static str {
        match self {
            Self::Improve => "Improve writing",
            Self::Lengthen => "Make longer",
            Self::Shorten => "Make shorter",
            Self::Retone => "Change tone",
            Self::CustomInstruction => "Custom instruction",
            Self::Critique => "Challenge this",
            Self::GrammarFix => "Fix grammar",
            Self::Rewrite => "Rewrite",
            Self::GenericAdd => "Add text",
            Self::GenericEdit => "Edit text",
            Self::Delete => "Delete text",
        }
    }
}

/// Tones offered by the [`ActionKind::Retone`] action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tone {
    /// Formal register.
    Formal,
    /// Relaxed, conversational register.
    Casual,
    /// Assertive and direct.
    Confident,
    /// Warm and approachable.
    Friendly,
    /// Scholarly register.
    Academic,
    /// Built to convince.
    Persuasive,
}

impl Tone {
    /// Menu label for this tone.
    pub const fn label(self) -> &'static str {
        match self {
            Self::Formal => "Formal",
            Self::Casual => "Casual",
            Self::Confident => "Confident",
            Self::Friendly => "Friendly",
            Self::Academic => "Academic",
            Self::Persuasive => "Persuasive",
        }
    }
}

/// Inputs for prompt construction.
#[derive(Debug, Clone, Copy, Default)]
pub struct PromptInputs<'a> {
    /// The selected text (or surrounding context for insertions).
    pub selection: &'a str,
    /// Target tone, for tone-changing actions.
    pub tone: Option<Tone>,
    /// Free-form user instruction, for custom actions.
    pub instruction: Option<&'a str>,
}

/// Build the provider prompt for an action.
///
/// Templates ask for the transformed text alone, with no commentary,
/// so the response can be streamed straight into the buffer.
pub fn build_prompt(kind: ActionKind, inputs: &PromptInputs<'_>) -> String {
    let selection = inputs.selection;
    match kind {
        ActionKind::Improve => format!(
            "Improve the writing of the following text. Keep the meaning and \
             formatting. Reply with the improved text only.\n\n{selection}"
        ),
        ActionKind::Lengthen => format!(
            "Expand the following text with more detail and depth. Keep the \
             original style. Reply with the expanded text only.\n\n{selection}"
        ),
        ActionKind::Shorten => format!(
            "Condense the following text while keeping every key point. Reply \
             with the shortened text only.\n\n{selection}"
        ),
        ActionKind::Retone => {
            let tone = inputs.tone.map_or("Neutral", Tone::label);
            format!(
                "Rewrite the following text in a {tone} tone. Keep the meaning \
                 and formatting. Reply with the rewritten text only.\n\n{selection}"
            )
        }
        ActionKind::CustomInstruction => {
            let instruction = inputs.instruction.unwrap_or("Improve this text.");
            format!(
                "Apply this instruction to the text below: {instruction}\n\
                 Reply with the resulting text only.\n\n{selection}"
            )
        }
        ActionKind::Critique => format!(
            "Challenge the argument in the following text. Point out weak \
             assumptions and counter-arguments, briefly.\n\n{selection}"
        ),
        ActionKind::GrammarFix => format!(
            "Fix the grammar and spelling of the following text. Change \
             nothing else. Reply with the corrected text only.\n\n{selection}"
        ),
        ActionKind::Rewrite => format!(
            "Rewrite the following text from scratch, keeping its intent. \
             Reply with the rewritten text only.\n\n{selection}"
        ),
        ActionKind::GenericAdd => {
            let instruction = inputs.instruction.unwrap_or("Continue the text.");
            format!(
                "Write text to insert at the marked point. {instruction}\n\
                 Reply with the text to insert only.\n\n{selection}"
            )
        }
        ActionKind::GenericEdit => {
            let instruction = inputs.instruction.unwrap_or("Edit this text.");
            format!(
                "Edit the text below as follows: {instruction}\n\
                 Reply with the edited text only.\n\n{selection}"
            )
        }
        ActionKind::Delete => format!(
            "Rewrite the following text with the indicated portion removed, \
             smoothing the surrounding prose. Reply with the resulting text \
             only.\n\n{selection}"
        ),
    }
}
