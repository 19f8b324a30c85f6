//! Prompt assembly: persona instructions plus the context-window slice.

use parley_core::agent::Persona;
use parley_core::chat::ChatMessage;
use parley_core::message::{Message, Role};
use parley_core::provider::ToolDefinition;

#[derive(Debug, Clone)]
pub struct PromptBuilder {
    persona: Persona,
}

impl PromptBuilder {
    pub fn new(persona: Persona) -> Self {
        Self { persona }
    }

    pub fn persona(&self) -> &Persona {
        &self.persona
    }

    /// System instructions for the persona and the tools it may call.
    pub fn system_prompt(&self, tools: &[ToolDefinition]) -> String {
        let p = &self.persona;
        let mut prompt = format!(
            "You are {name}, a {age}-year-old {gender} {profession}. Your personality: {personality}.",
            name = p.name,
            age = p.age,
            gender = p.gender,
            profession = p.profession,
            personality = p.personality,
        );
        if !p.hobbies.is_empty() {
            prompt.push_str(&format!(" You like {}.", p.hobbies.join(", ")));
        }
        if !p.hates.is_empty() {
            prompt.push_str(&format!(" You dislike {}.", p.hates.join(", ")));
        }

        prompt.push_str(
            "\n\nYou take part in several group chats at once. Every chat message is given to you \
             as a JSON object with the sender `name`, the `content`, its `messageId`, the \
             `channelId` it was posted in, the `quote`d message ID if any, and `needReply`. \
             Messages with `needReply: true` have not been answered yet; the rest are context. \
             Your own earlier messages appear as assistant turns.\n",
        );

        if !tools.is_empty() {
            prompt.push_str("\nTools you can call before answering:\n");
            for tool in tools {
                prompt.push_str(&format!("- {}: {}\n", tool.name, tool.description));
            }
        }

        prompt.push_str(
            "\nGuidelines:\n\
             - Keep replies short and natural, like a real person chatting.\n\
             - Split a long thought into several short messages, one per entry in `contents`.\n\
             - Keep code or formatted text in a single message so the formatting survives.\n\
             - Quote a message with `quote_message_id` when replying to something specific.\n\
             - Add `reaction_emojis` to react to your own last message of a segment.\n\
             - If nothing needs a reply, return an empty `groups` list.\n\
             \nAlways answer with exactly this JSON structure and nothing else:\n\
             {\"groups\": [{\"channel_id\": \"<channel>\", \"segments\": [{\"quote_message_id\": \"<id or null>\", \
             \"contents\": [\"<message>\", \"...\"], \"reaction_emojis\": [\"<emoji>\"] or null}]}]}\n\
             \nExample:\n\
             {\"groups\": [{\"channel_id\": \"12345\", \"segments\": [{\"quote_message_id\": \"114514\", \
             \"contents\": [\"Morning!\", \"Nice weather today\"], \"reaction_emojis\": [\"🌞\"]}]}]}",
        );
        prompt
    }

    /// Full prompt: system turn followed by one turn per history message.
    pub fn build(&self, history: &[ChatMessage], tools: &[ToolDefinition]) -> Vec<Message> {
        let mut messages = Vec::with_capacity(history.len() + 1);
        messages.push(Message::system(self.system_prompt(tools)));
        messages.extend(history.iter().map(turn));
        messages
    }
}

fn turn(message: &ChatMessage) -> Message {
    let envelope = serde_json::to_string(&message.envelope()).unwrap_or_else(|_| message.content.clone());
    match message.role {
        Role::Assistant => Message::assistant(envelope),
        _ => Message::user(envelope),
    }
}
