use super::models::{now_millis, Conversation, Message, Role, NEW_CONVERSATION_TITLE};

/// Derived conversation titles keep this many characters of the first user
/// message.
const TITLE_PREVIEW_CHARS: usize = 30;

/// Initialization lifecycle of the in-memory store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorePhase {
    Uninitialized,
    Loading,
    /// Collections populated; a default conversation was synthesized if both
    /// backends were empty.
    Ready,
    /// Loading failed; a single default conversation was synthesized and
    /// normal mutation continues from there.
    Degraded,
}

/// The conversation collection and its UI-facing flags. All mutations are
/// synchronous; persistence mirroring happens afterwards at the application
/// layer and never gates these updates.
pub struct ChatStore {
    conversations: Vec<Conversation>,
    active_id: Option<String>,
    is_loading: bool,
    error: Option<String>,
    phase: StorePhase,
}

impl ChatStore {
    pub fn new() -> Self {
        Self {
            conversations: Vec::new(),
            active_id: None,
            is_loading: false,
            error: None,
            phase: StorePhase::Uninitialized,
        }
    }

    pub fn phase(&self) -> StorePhase {
        self.phase
    }

    pub fn set_phase(&mut self, phase: StorePhase) {
        self.phase = phase;
    }

    /// Populate from loaded state. Synthesizes a default conversation when
    /// the loaded collection is empty and repairs a dangling active id.
    pub fn initialize(&mut self, conversations: Vec<Conversation>, active_id: Option<String>) {
        self.conversations = if conversations.is_empty() {
            vec![Conversation::new()]
        } else {
            conversations
        };
        self.active_id = active_id
            .filter(|id| self.conversations.iter().any(|c| &c.id == id))
            .or_else(|| self.conversations.first().map(|c| c.id.clone()));
        self.phase = StorePhase::Ready;
    }

    /// Entered when loading threw: start over with one default conversation.
    pub fn initialize_degraded(&mut self) {
        let conversation = Conversation::new();
        self.active_id = Some(conversation.id.clone());
        self.conversations = vec![conversation];
        self.phase = StorePhase::Degraded;
    }

    pub fn conversations(&self) -> &[Conversation] {
        &self.conversations
    }

    pub fn active_id(&self) -> Option<&str> {
        self.active_id.as_deref()
    }

    pub fn active_conversation(&self) -> Option<&Conversation> {
        let id = self.active_id.as_deref()?;
        self.conversations.iter().find(|c| c.id == id)
    }

    fn active_conversation_mut(&mut self) -> Option<&mut Conversation> {
        let id = self.active_id.clone()?;
        self.conversations.iter_mut().find(|c| c.id == id)
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    pub fn set_loading(&mut self, loading: bool) {
        self.is_loading = loading;
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn set_error(&mut self, error: Option<String>) {
        self.error = error;
    }

    pub fn create_conversation(&mut self) -> &Conversation {
        let conversation = Conversation::new();
        self.active_id = Some(conversation.id.clone());
        self.conversations.insert(0, conversation);
        &self.conversations[0]
    }

    pub fn set_active_conversation(&mut self, id: &str) {
        self.active_id = Some(id.to_string());
    }

    /// Append to the active conversation. The first user message also names
    /// a still-untitled conversation.
    pub fn add_message(&mut self, message: Message) {
        let Some(conversation) = self.active_conversation_mut() else {
            return;
        };
        if conversation.title == NEW_CONVERSATION_TITLE && message.role == Role::User {
            conversation.title = derive_title(&message.content);
        }
        conversation.messages.push(message);
        conversation.updated_at = now_millis();
    }

    /// Mutate the in-progress assistant message in place as streamed content
    /// arrives.
    pub fn update_last_message(&mut self, content: &str) {
        let Some(conversation) = self.active_conversation_mut() else {
            return;
        };
        if let Some(last) = conversation.messages.last_mut() {
            last.content = content.to_string();
            conversation.updated_at = now_millis();
        }
    }

    /// Remove a conversation. The collection never ends up empty: deleting
    /// the last one synthesizes a fresh replacement and makes it active.
    pub fn delete_conversation(&mut self, id: &str) {
        let Some(index) = self.conversations.iter().position(|c| c.id == id) else {
            return;
        };
        self.conversations.remove(index);

        if self.conversations.is_empty() {
            let conversation = Conversation::new();
            self.active_id = Some(conversation.id.clone());
            self.conversations.push(conversation);
        } else if self.active_id.as_deref() == Some(id) {
            self.active_id = Some(self.conversations[0].id.clone());
        }
    }

    pub fn clear_active_conversation(&mut self) {
        if let Some(conversation) = self.active_conversation_mut() {
            conversation.messages.clear();
            conversation.title = NEW_CONVERSATION_TITLE.to_string();
            conversation.updated_at = now_millis();
        }
    }

    pub fn rename_conversation(&mut self, id: &str, title: &str) {
        if let Some(conversation) = self.conversations.iter_mut().find(|c| c.id == id) {
            conversation.title = title.to_string();
            conversation.updated_at = now_millis();
        }
    }
}

impl Default for ChatStore {
    fn default() -> Self {
        Self::new()
    }
}

fn derive_title(content: &str) -> String {
    let preview: String = content.chars().take(TITLE_PREVIEW_CHARS).collect();
    if content.chars().count() > TITLE_PREVIEW_CHARS {
        format!("{}...", preview)
    } else {
        preview
    }
}
