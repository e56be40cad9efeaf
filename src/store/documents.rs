use super::models::{now_millis, Comment, CommentReply, CommentStatus, Document};

/// The document collection with inline comments. Comment offsets are left
/// untouched when content changes; an AI rewrite clears all comments, so
/// stale ranges only survive manual edits.
pub struct DocumentStore {
    documents: Vec<Document>,
    current_id: Option<String>,
    editor_disabled: bool,
}

impl DocumentStore {
    pub fn new() -> Self {
        Self {
            documents: Vec::new(),
            current_id: None,
            editor_disabled: false,
        }
    }

    pub fn initialize(&mut self, documents: Vec<Document>) {
        self.current_id = documents.first().map(|d| d.id.clone());
        self.documents = documents;
    }

    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    pub fn current_document(&self) -> Option<&Document> {
        let id = self.current_id.as_deref()?;
        self.documents.iter().find(|d| d.id == id)
    }

    fn document_mut(&mut self, id: &str) -> Option<&mut Document> {
        self.documents.iter_mut().find(|d| d.id == id)
    }

    pub fn editor_disabled(&self) -> bool {
        self.editor_disabled
    }

    pub fn create_document(&mut self, title: &str) -> &Document {
        let document = Document::new(title);
        self.current_id = Some(document.id.clone());
        self.documents.push(document);
        self.documents.last().unwrap()
    }

    pub fn set_current_document(&mut self, id: &str) {
        self.current_id = Some(id.to_string());
    }

    pub fn delete_document(&mut self, id: &str) {
        self.documents.retain(|d| d.id != id);
        if self.current_id.as_deref() == Some(id) {
            self.current_id = self.documents.first().map(|d| d.id.clone());
        }
    }

    pub fn update_content(&mut self, id: &str, content: &str) {
        if let Some(document) = self.document_mut(id) {
            document.content = content.to_string();
            document.last_modified = now_millis();
        }
    }

    pub fn update_title(&mut self, id: &str, title: &str) {
        if let Some(document) = self.document_mut(id) {
            document.title = title.to_string();
            document.last_modified = now_millis();
        }
    }

    pub fn reset_document(&mut self, id: &str) {
        if let Some(document) = self.document_mut(id) {
            document.content.clear();
            document.comments.clear();
            document.last_modified = now_millis();
        }
    }

    // ── Comments ──

    pub fn add_comment(&mut self, document_id: &str, comment: Comment) {
        if let Some(document) = self.document_mut(document_id) {
            document.comments.push(comment);
            document.last_modified = now_millis();
        }
    }

    pub fn delete_comment(&mut self, document_id: &str, comment_id: &str) {
        if let Some(document) = self.document_mut(document_id) {
            document.comments.retain(|c| c.id != comment_id);
            document.last_modified = now_millis();
        }
    }

    pub fn add_reply(&mut self, document_id: &str, comment_id: &str, reply: CommentReply) {
        let Some(document) = self.document_mut(document_id) else {
            return;
        };
        if let Some(comment) = document.comments.iter_mut().find(|c| c.id == comment_id) {
            comment.replies.push(reply);
            document.last_modified = now_millis();
        }
    }

    pub fn set_comment_status(
        &mut self,
        document_id: &str,
        comment_id: &str,
        status: CommentStatus,
    ) {
        let Some(document) = self.document_mut(document_id) else {
            return;
        };
        if let Some(comment) = document.comments.iter_mut().find(|c| c.id == comment_id) {
            comment.status = status;
            document.last_modified = now_millis();
        }
    }

    // ── AI rewrite ──

    /// The editor is locked while a rewrite request is in flight.
    pub fn start_rewrite(&mut self) {
        self.editor_disabled = true;
    }

    /// Unlock the editor without touching the document, for a rewrite that
    /// failed.
    pub fn abort_rewrite(&mut self) {
        self.editor_disabled = false;
    }

    /// Apply the rewritten content, drop every comment (their ranges no
    /// longer apply), and unlock the editor.
    pub fn finish_rewrite(&mut self, id: &str, content: &str) {
        if let Some(document) = self.document_mut(id) {
            document.content = content.to_string();
            document.comments.clear();
            document.last_modified = now_millis();
        }
        self.editor_disabled = false;
    }
}

impl Default for DocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::models::CommentPosition;

    fn store_with_document() -> (DocumentStore, String) {
        let mut store = DocumentStore::new();
        let id = store.create_document("draft").id.clone();
        store.update_content(&id, "The quick brown fox jumps over the lazy dog");
        (store, id)
    }

    #[test]
    fn create_sets_current_document() {
        let (store, id) = store_with_document();
        assert_eq!(store.current_document().unwrap().id, id);
    }

    #[test]
    fn delete_moves_current_to_first_remaining() {
        let (mut store, first) = store_with_document();
        let second = store.create_document("notes").id.clone();

        store.delete_document(&second);
        assert_eq!(store.current_document().unwrap().id, first);

        store.delete_document(&first);
        assert!(store.current_document().is_none());
    }

    #[test]
    fn comment_lifecycle() {
        let (mut store, id) = store_with_document();
        let comment = Comment::new("weak verb", CommentPosition { start: 4, end: 9 });
        let comment_id = comment.id.clone();
        store.add_comment(&id, comment);

        store.add_reply(
            &id,
            &comment_id,
            CommentReply {
                id: "r1".to_string(),
                content: "agreed".to_string(),
                timestamp: 0,
                author: None,
            },
        );
        store.set_comment_status(&id, &comment_id, CommentStatus::Resolved);

        let doc = store.current_document().unwrap();
        assert_eq!(doc.comments.len(), 1);
        assert_eq!(doc.comments[0].replies.len(), 1);
        assert_eq!(doc.comments[0].status, CommentStatus::Resolved);

        store.delete_comment(&id, &comment_id);
        assert!(store.current_document().unwrap().comments.is_empty());
    }

    #[test]
    fn comment_offsets_survive_content_edits_unchanged() {
        let (mut store, id) = store_with_document();
        store.add_comment(
            &id,
            Comment::new("anchor", CommentPosition { start: 10, end: 15 }),
        );

        store.update_content(&id, "Short now");

        // Offsets are intentionally not adjusted; the range is stale.
        let comment = &store.current_document().unwrap().comments[0];
        assert_eq!(comment.position, CommentPosition { start: 10, end: 15 });
    }

    #[test]
    fn rewrite_clears_comments_and_unlocks_editor() {
        let (mut store, id) = store_with_document();
        store.add_comment(
            &id,
            Comment::new("cut this", CommentPosition { start: 0, end: 3 }),
        );

        store.start_rewrite();
        assert!(store.editor_disabled());

        store.finish_rewrite(&id, "A fast auburn fox leaps over a sleepy hound");
        let doc = store.current_document().unwrap();
        assert!(doc.comments.is_empty());
        assert_eq!(doc.content, "A fast auburn fox leaps over a sleepy hound");
        assert!(!store.editor_disabled());
    }

    #[test]
    fn reset_empties_content_and_comments() {
        let (mut store, id) = store_with_document();
        store.add_comment(&id, Comment::new("x", CommentPosition { start: 0, end: 1 }));
        store.reset_document(&id);

        let doc = store.current_document().unwrap();
        assert!(doc.content.is_empty());
        assert!(doc.comments.is_empty());
    }
}
