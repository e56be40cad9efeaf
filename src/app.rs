use std::path::Path;

use tracing::error;

use crate::llm::openrouter::{ChatClient, ChatConfig};
use crate::persist::Storage;
use crate::store::models::{Comment, CommentReply, CommentStatus, Message, Role};
use crate::store::{ChatStore, DocumentStore, StorePhase};

/// The application context: the in-memory stores, the chat client, and the
/// persistence backends, constructed once and owned by the application root.
///
/// Every mutation entry point applies its change synchronously and then
/// mirrors state to storage as a side effect. Mirroring failures set the
/// user-visible error field but never roll the in-memory change back.
pub struct App {
    pub chat: ChatStore,
    pub documents: DocumentStore,
    client: ChatClient,
    storage: Option<Storage>,
}

impl App {
    /// Opening storage can fail (unwritable data directory); the app still
    /// comes up, it just runs without durability and enters the degraded
    /// phase on `initialize`.
    pub fn new(data_dir: &Path, namespace: &str, config: ChatConfig) -> Self {
        let storage = match Storage::new(data_dir, namespace) {
            Ok(storage) => Some(storage),
            Err(err) => {
                error!(error = %err, "failed to open storage, continuing without persistence");
                None
            }
        };
        Self {
            chat: ChatStore::new(),
            documents: DocumentStore::new(),
            client: ChatClient::new(config),
            storage,
        }
    }

    /// Load both collections and the active-conversation id, synthesizing a
    /// default conversation when nothing was stored.
    pub fn initialize(&mut self) {
        self.chat.set_phase(StorePhase::Loading);
        match &self.storage {
            Some(storage) => {
                let conversations = storage.load_conversations();
                let active_id = storage.load_active_conversation();
                self.chat.initialize(conversations, active_id);
                self.documents.initialize(storage.load_documents());
            }
            None => self.chat.initialize_degraded(),
        }
    }

    fn persist_chat(&mut self) {
        let Self { chat, storage, .. } = self;
        let Some(storage) = storage else { return };

        if let Err(err) = storage.save_conversations(chat.conversations()) {
            error!(error = %err, "failed to save conversations");
            chat.set_error(Some("Failed to save conversations".to_string()));
        }
        if let Err(err) = storage.save_active_conversation(chat.active_id()) {
            error!(error = %err, "failed to save active conversation");
            chat.set_error(Some("Failed to save active conversation".to_string()));
        }
    }

    fn persist_documents(&mut self) {
        let Self {
            chat,
            documents,
            storage,
            ..
        } = self;
        let Some(storage) = storage else { return };

        if let Err(err) = storage.save_documents(documents.documents()) {
            error!(error = %err, "failed to save documents");
            chat.set_error(Some("Failed to save documents".to_string()));
        }
    }

    // ── Chat pipeline ──

    /// Submit a user message to the active conversation and stream the
    /// assistant's reply into it.
    ///
    /// Flow: loading gate → remote quota check → append user message and an
    /// empty assistant placeholder → send with retry, mutating the
    /// placeholder in place per increment → map any failure to its
    /// user-facing message → mirror to storage. `on_update` receives the
    /// accumulated reply text after every increment, for the UI.
    pub async fn send_message(
        &mut self,
        content: &str,
        system_prompt: &str,
        mut on_update: impl FnMut(&str),
    ) {
        let content = content.trim();
        if content.is_empty() || self.chat.is_loading() {
            return;
        }

        if !self.client.check_rate_limit().await {
            self.chat
                .set_error(Some("API key has reached its credit limit".to_string()));
            return;
        }

        self.chat.set_error(None);
        self.chat.add_message(Message::new(Role::User, content));
        self.chat.set_loading(true);

        // History for the request, before the assistant placeholder exists.
        let mut request_messages = vec![Message::new(Role::System, system_prompt)];
        if let Some(conversation) = self.chat.active_conversation() {
            request_messages.extend(conversation.messages.iter().cloned());
        }

        self.chat.add_message(Message::new(Role::Assistant, ""));
        self.persist_chat();

        let result = {
            let Self { chat, client, .. } = self;
            client
                .send_with_retry(&request_messages, |acc| {
                    chat.update_last_message(acc);
                    on_update(acc);
                })
                .await
        };

        match result {
            Ok(full_content) => {
                self.chat.update_last_message(&full_content);
            }
            Err(err) => {
                error!(error = %err, "chat request failed");
                self.chat.set_error(Some(err.user_message()));
            }
        }

        self.chat.set_loading(false);
        self.persist_chat();
    }

    pub fn create_conversation(&mut self) -> String {
        let id = self.chat.create_conversation().id.clone();
        self.persist_chat();
        id
    }

    pub fn delete_conversation(&mut self, id: &str) {
        self.chat.delete_conversation(id);
        self.persist_chat();
    }

    pub fn rename_conversation(&mut self, id: &str, title: &str) {
        self.chat.rename_conversation(id, title);
        self.persist_chat();
    }

    pub fn set_active_conversation(&mut self, id: &str) {
        self.chat.set_active_conversation(id);
        self.persist_chat();
    }

    pub fn clear_active_conversation(&mut self) {
        self.chat.clear_active_conversation();
        self.persist_chat();
    }

    // ── Documents ──

    pub fn create_document(&mut self, title: &str) -> String {
        let id = self.documents.create_document(title).id.clone();
        self.persist_documents();
        id
    }

    pub fn delete_document(&mut self, id: &str) {
        self.documents.delete_document(id);
        self.persist_documents();
    }

    pub fn update_document_content(&mut self, id: &str, content: &str) {
        self.documents.update_content(id, content);
        self.persist_documents();
    }

    pub fn update_document_title(&mut self, id: &str, title: &str) {
        self.documents.update_title(id, title);
        self.persist_documents();
    }

    pub fn reset_document(&mut self, id: &str) {
        self.documents.reset_document(id);
        self.persist_documents();
    }

    pub fn add_comment(&mut self, document_id: &str, comment: Comment) {
        self.documents.add_comment(document_id, comment);
        self.persist_documents();
    }

    pub fn delete_comment(&mut self, document_id: &str, comment_id: &str) {
        self.documents.delete_comment(document_id, comment_id);
        self.persist_documents();
    }

    pub fn add_comment_reply(&mut self, document_id: &str, comment_id: &str, reply: CommentReply) {
        self.documents.add_reply(document_id, comment_id, reply);
        self.persist_documents();
    }

    pub fn set_comment_status(
        &mut self,
        document_id: &str,
        comment_id: &str,
        status: CommentStatus,
    ) {
        self.documents.set_comment_status(document_id, comment_id, status);
        self.persist_documents();
    }

    /// Send the document body through the chat pipeline under a rewrite
    /// instruction prompt. Success replaces the content and clears the
    /// comments; failure unlocks the editor and surfaces the error.
    pub async fn rewrite_document(
        &mut self,
        document_id: &str,
        instruction_prompt: &str,
        mut on_update: impl FnMut(&str),
    ) {
        if self.documents.editor_disabled() {
            return;
        }
        let Some(content) = self
            .documents
            .documents()
            .iter()
            .find(|d| d.id == document_id)
            .map(|d| d.content.clone())
        else {
            return;
        };

        self.documents.start_rewrite();
        let request_messages = vec![
            Message::new(Role::System, instruction_prompt),
            Message::new(Role::User, content),
        ];

        let result = self
            .client
            .send_with_retry(&request_messages, &mut on_update)
            .await;

        match result {
            Ok(rewritten) => {
                self.documents.finish_rewrite(document_id, &rewritten);
                self.persist_documents();
            }
            Err(err) => {
                error!(error = %err, "document rewrite failed");
                self.documents.abort_rewrite();
                self.chat.set_error(Some(err.user_message()));
            }
        }
    }
}
