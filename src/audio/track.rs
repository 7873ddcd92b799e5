use serenity::model::id::UserId;
use std::time::Duration;

/// Pista inmutable tal como la entrega el nodo de audio
///
/// `encoded` es el blob opaco del nodo; el resto son metadatos para la
/// cola y los embeds. Una vez construida no se modifica, salvo para
/// anotar quién la pidió.
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    pub encoded: String,
    pub identifier: String,
    pub title: String,
    pub author: String,
    pub length: Duration,
    pub is_stream: bool,
    pub uri: Option<String>,
    pub artwork_url: Option<String>,
    pub requested_by: Option<UserId>,
}

impl Track {
    /// Anota el usuario que solicitó la pista
    pub fn with_requester(mut self, user_id: UserId) -> Self {
        self.requested_by = Some(user_id);
        self
    }
}
