use std::collections::HashMap;

use sqlx::{Pool, Sqlite};

use crate::db::models::{now_millis, ChatMessage, File, MessageBody, Millis, ResourceType};
use crate::db::{CommunityRepository, FileRepository, MessageQuery, MessageRepository};
use crate::error::AppError;
use crate::policy::{authorize, Action, Principal};
use crate::service::files::{FileService, Upload};
use crate::service::views::MessageView;

pub const MAX_MESSAGE_CHARS: usize = 4096;

/// Time window for [`ChatService::get_messages`], as received from the client.
#[derive(Debug, Clone, Default)]
pub struct MessageWindow {
    pub before: Option<String>,
    pub after: Option<String>,
    pub limit: Option<i64>,
    pub sender: Option<i64>,
}

fn parse_cursor(field: &str, value: Option<&str>) -> Result<Option<Millis>, AppError> {
    value
        .map(|v| {
            chrono::DateTime::parse_from_rfc3339(v.trim())
                .map(|dt| dt.timestamp_millis())
                .map_err(|_| AppError::validation(field, "Expected an RFC3339 timestamp"))
        })
        .transpose()
}

impl MessageWindow {
    pub fn to_query(&self) -> Result<MessageQuery, AppError> {
        Ok(MessageQuery {
            before: parse_cursor("before", self.before.as_deref())?,
            after: parse_cursor("after", self.after.as_deref())?,
            limit: self.limit,
            sender: self.sender,
        })
    }
}

fn check_text(field: &str, text: &str, required: bool) -> Result<String, AppError> {
    let text = text.trim();
    if required && text.is_empty() {
        return Err(AppError::validation(field, "Message content is required"));
    }
    if text.chars().count() > MAX_MESSAGE_CHARS {
        return Err(AppError::validation(
            field,
            format!("Message must be at most {} characters", MAX_MESSAGE_CHARS),
        ));
    }
    Ok(text.to_string())
}

#[derive(Clone)]
pub struct ChatService {
    db: Pool<Sqlite>,
    files: FileService,
}

impl ChatService {
    pub fn new(db: Pool<Sqlite>, files: FileService) -> Self {
        ChatService { db, files }
    }

    /// Loads the community and whether `user_id` is in its committed participant set.
    async fn membership(&self, community_id: i64, user_id: i64) -> Result<bool, AppError> {
        CommunityRepository::get_by_id(&self.db, community_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Community".to_string()))?;
        CommunityRepository::is_participant(&self.db, community_id, user_id).await
    }

    pub async fn send_text(
        &self,
        principal: &Principal,
        community_id: i64,
        content: &str,
    ) -> Result<MessageView, AppError> {
        let is_participant = self.membership(community_id, principal.user_id).await?;
        authorize(principal, &Action::SendChat { is_participant })?;
        let content = check_text("content", content, true)?;

        let mut conn = self.db.acquire().await?;
        let message = MessageRepository::create(
            &mut conn,
            community_id,
            principal.user_id,
            &MessageBody::Text { content },
            now_millis(),
        )
        .await?;

        tracing::debug!(message_id = message.id, community_id, "text message sent");
        Ok(MessageView::new(&message, None))
    }

    /// The file is stored first; message insert and attach share one transaction, and
    /// the file is discarded if that transaction fails.
    pub async fn send_file(
        &self,
        principal: &Principal,
        community_id: i64,
        caption: Option<&str>,
        upload: Upload,
    ) -> Result<MessageView, AppError> {
        let is_participant = self.membership(community_id, principal.user_id).await?;
        authorize(principal, &Action::SendChat { is_participant })?;
        let caption = check_text("content", caption.unwrap_or_default(), false)?;

        let file = self
            .files
            .store(upload, ResourceType::Chat, principal.user_id)
            .await?;

        let committed: Result<ChatMessage, AppError> = async {
            let mut tx = self.db.begin().await?;
            let message = MessageRepository::create(
                &mut tx,
                community_id,
                principal.user_id,
                &MessageBody::File {
                    file_id: file.id,
                    caption,
                },
                now_millis(),
            )
            .await?;
            FileRepository::attach(&mut tx, &[file.id], ResourceType::Chat, message.id).await?;
            tx.commit().await?;
            Ok(message)
        }
        .await;

        match committed {
            Ok(message) => {
                tracing::debug!(message_id = message.id, community_id, file_id = file.id, "file message sent");
                Ok(MessageView::new(&message, Some(&file)))
            }
            Err(e) => {
                self.files.discard(std::slice::from_ref(&file)).await;
                Err(e)
            }
        }
    }

    pub async fn get_messages(
        &self,
        principal: &Principal,
        community_id: i64,
        window: &MessageWindow,
    ) -> Result<Vec<MessageView>, AppError> {
        let is_participant = self.membership(community_id, principal.user_id).await?;
        authorize(principal, &Action::ReadChat { is_participant })?;
        let query = window.to_query()?;

        let messages = MessageRepository::query(&self.db, community_id, &query).await?;

        let file_ids: Vec<i64> = messages
            .iter()
            .filter_map(|m| match m.body {
                MessageBody::File { file_id, .. } => Some(file_id),
                MessageBody::Text { .. } => None,
            })
            .collect();
        let files: HashMap<i64, File> = FileRepository::get_many(&self.db, &file_ids)
            .await?
            .into_iter()
            .map(|f| (f.id, f))
            .collect();

        Ok(messages
            .iter()
            .map(|m| {
                let file = match m.body {
                    MessageBody::File { file_id, .. } => files.get(&file_id),
                    MessageBody::Text { .. } => None,
                };
                MessageView::new(m, file)
            })
            .collect())
    }

    /// Soft delete by the sender or the community lead. Deleting twice reports `NotFound`.
    pub async fn delete_message(
        &self,
        principal: &Principal,
        community_id: i64,
        message_id: i64,
    ) -> Result<(), AppError> {
        let community = CommunityRepository::get_by_id(&self.db, community_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Community".to_string()))?;
        let message = MessageRepository::get_live(&self.db, message_id)
            .await?
            .filter(|m| m.community_id == community_id)
            .ok_or_else(|| AppError::NotFound("Message".to_string()))?;
        authorize(
            principal,
            &Action::DeleteMessage {
                message: &message,
                community: &community,
            },
        )?;

        if !MessageRepository::soft_delete(&self.db, message_id, now_millis()).await? {
            return Err(AppError::NotFound("Message".to_string()));
        }

        tracing::info!(message_id, community_id, by = principal.user_id, "message deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_parses_rfc3339() {
        let window = MessageWindow {
            after: Some("2024-01-01T10:00:00Z".into()),
            limit: Some(500),
            ..Default::default()
        };
        let query = window.to_query().unwrap();
        assert_eq!(query.after, Some(1_704_103_200_000));
        assert!(query.ascending());
        assert_eq!(query.effective_limit(), 100);
    }

    #[test]
    fn test_window_rejects_garbage() {
        let window = MessageWindow {
            before: Some("yesterday".into()),
            ..Default::default()
        };
        match window.to_query() {
            Err(AppError::Validation { field, .. }) => assert_eq!(field.as_deref(), Some("before")),
            other => panic!("unexpected {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_message_text_rules() {
        assert!(check_text("content", "   ", true).is_err());
        assert_eq!(check_text("content", "  hi ", true).unwrap(), "hi");
        assert_eq!(check_text("content", "", false).unwrap(), "");
        assert!(check_text("content", &"x".repeat(MAX_MESSAGE_CHARS + 1), true).is_err());
    }
}
