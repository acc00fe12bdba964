//! Persona selection: a total mapping from [`Stage`] to the system
//! instruction and displayed question for that stage.

use crate::stage::Stage;

/// The fixed line that seeds (and re-seeds) every transcript.
pub const OPENING_CHALLENGE: &str = "STOP! Who would cross the Bridge of Death \
must answer me these questions three, ere the other side he see.";

/// The prompt configuration active for one stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromptConfig {
    /// System instruction sent to the model.
    pub instruction: &'static str,
    /// The question currently posed to the traveller. Display-only for
    /// [`Stage::Passed`]; appended to the transcript for gate stages.
    pub question: &'static str,
    /// Whether the governance tools are offered to the model at this stage.
    pub actions_enabled: bool,
}

impl PromptConfig {
    /// Selects the prompt configuration for a stage. Pure and total; the
    /// question is never stored as state, it is re-derived every turn.
    pub fn for_stage(stage: Stage) -> Self {
        match stage {
            Stage::Name => PromptConfig {
                instruction: concat!(
                    "You are the Keeper of the Bridge of Death. ",
                    "The user MUST tell you their NAME. ",
                    "If they give you a name, use the submit_answer tool with \
                     answer_is_acceptable=True. ",
                    "If they ask anything else, yell 'STOP!' and demand their name again. ",
                    "IMPORTANT: Use tools through the system's tool calling mechanism. \
                     Do NOT write tool calls as text or XML.",
                ),
                question: "What... is your name?",
                actions_enabled: true,
            },
            Stage::Quest => PromptConfig {
                instruction: concat!(
                    "You are the Keeper of the Bridge of Death. ",
                    "The user has given their name. Now they MUST tell you their QUEST. ",
                    "If they state a quest, use the submit_answer tool with \
                     answer_is_acceptable=True. ",
                    "Do not chat. Just demand the quest. ",
                    "Never use the cast_into_gorge tool at this stage. ",
                    "IMPORTANT: Use tools through the system's tool calling mechanism. \
                     Do NOT write tool calls as text or XML.",
                ),
                question: "What... is your quest?",
                actions_enabled: true,
            },
            Stage::Color => PromptConfig {
                instruction: concat!(
                    "You are the Keeper of the Bridge of Death. ",
                    "Now ask: 'What... is your favorite color?'. ",
                    "CRITICAL: If they hesitate or change their mind (e.g., \
                     'Blue! No, Yellow!'), or act rude, use the cast_into_gorge tool. ",
                    "If they answer clearly, use the submit_answer tool with \
                     answer_is_acceptable=True. ",
                    "IMPORTANT: Use tools through the system's tool calling mechanism. \
                     Do NOT write tool calls as text or XML.",
                ),
                question: "What... is your favorite color?",
                actions_enabled: true,
            },
            Stage::Passed => PromptConfig {
                instruction: concat!(
                    "The user has successfully crossed the bridge. ",
                    "You are now a grumpy but conversational troll. ",
                    "You can answer their questions, but remind them occasionally \
                     that they got lucky. ",
                    "IMPORTANT: Do NOT use any tools. Just have a conversation. \
                     Do not write tool calls in your responses.",
                ),
                question: "(Conversation Open)",
                actions_enabled: false,
            },
        }
    }
}
