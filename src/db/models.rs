use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Unix epoch milliseconds; every persisted timestamp uses this unit.
pub type Millis = i64;

pub fn now_millis() -> Millis {
    chrono::Utc::now().timestamp_millis()
}

pub fn to_rfc3339(ts: Millis) -> String {
    chrono::DateTime::from_timestamp_millis(ts)
        .unwrap_or_default()
        .to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Student,
    Instructor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Term {
    Fall,
    Spring,
}

impl std::str::FromStr for Term {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "FALL" => Ok(Term::Fall),
            "SPRING" => Ok(Term::Spring),
            other => Err(format!("unknown term {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResourceType {
    PastExam,
    ClassNote,
    ProfilePhoto,
    Community,
    Chat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageType {
    Text,
    File,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EmailTokenPurpose {
    VerifyEmail,
    ResetPassword,
}

#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub pwd_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub department_id: Option<i64>,
    pub email_verified: bool,
    pub is_active: bool,
    pub created_at: Millis,
}

#[derive(Debug, Clone, FromRow)]
pub struct Student {
    pub user_id: i64,
    pub student_identifier: String,
    pub graduation_year: Option<i32>,
}

#[derive(Debug, Clone, FromRow)]
pub struct Instructor {
    pub user_id: i64,
    pub title: String,
}

#[derive(Debug, Clone, FromRow)]
pub struct Department {
    pub id: i64,
    pub name: String,
    pub code: String,
    pub faculty_id: i64,
}

#[derive(Debug, Clone, FromRow)]
pub struct RefreshToken {
    pub token_string: String,
    pub user_id: i64,
    pub expires_at: Millis,
    pub revoked: bool,
    pub created_at: Millis,
}

#[derive(Debug, Clone, FromRow)]
pub struct EmailToken {
    pub token: String,
    pub user_id: i64,
    pub purpose: EmailTokenPurpose,
    pub expires_at: Millis,
    pub used: bool,
    pub created_at: Millis,
}

#[derive(Debug, Clone, FromRow)]
pub struct File {
    pub id: i64,
    pub name: String,
    pub path: String,
    pub url: String,
    pub size: i64,
    pub mime: String,
    pub resource_type: ResourceType,
    pub resource_id: Option<i64>,
    pub uploaded_by: i64,
    pub created_at: Millis,
}

#[derive(Debug, Clone, FromRow)]
pub struct PastExam {
    pub id: i64,
    pub year: i32,
    pub term: Term,
    pub department_id: i64,
    pub course_code: String,
    pub title: String,
    pub content: String,
    pub file_id: Option<i64>,
    pub uploader_user_id: i64,
    pub created_at: Millis,
    pub updated_at: Millis,
}

#[derive(Debug, Clone, FromRow)]
pub struct ClassNote {
    pub id: i64,
    pub course_code: String,
    pub title: String,
    pub description: String,
    pub content: String,
    pub department_id: i64,
    pub uploader_user_id: i64,
    pub created_at: Millis,
    pub updated_at: Millis,
}

#[derive(Debug, Clone, FromRow)]
pub struct Community {
    pub id: i64,
    pub name: String,
    pub abbreviation: String,
    pub lead_user_id: i64,
    pub profile_photo_file_id: Option<i64>,
    pub created_at: Millis,
    pub updated_at: Millis,
}

#[derive(Debug, Clone, FromRow)]
pub struct Participant {
    pub community_id: i64,
    pub user_id: i64,
    pub first_name: String, // Joined from users table
    pub last_name: String,  // Joined from users table
    pub joined_at: Millis,
}

/// Raw chat row as stored; converted into [`ChatMessage`] at the repository boundary.
#[derive(Debug, Clone, FromRow)]
pub struct ChatMessageRow {
    pub id: i64,
    pub community_id: i64,
    pub sender_user_id: i64,
    #[sqlx(rename = "type")]
    pub message_type: MessageType,
    pub content: Option<String>,
    pub file_id: Option<i64>,
    pub created_at: Millis,
    pub updated_at: Millis,
    pub deleted_at: Option<Millis>,
}

/// Per-variant payload of a chat message; a text message never carries a file and a
/// file message always does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageBody {
    Text { content: String },
    File { file_id: i64, caption: String },
}

impl MessageBody {
    pub fn message_type(&self) -> MessageType {
        match self {
            MessageBody::Text { .. } => MessageType::Text,
            MessageBody::File { .. } => MessageType::File,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub id: i64,
    pub community_id: i64,
    pub sender_user_id: i64,
    pub body: MessageBody,
    pub created_at: Millis,
    pub updated_at: Millis,
    pub deleted_at: Option<Millis>,
}

impl TryFrom<ChatMessageRow> for ChatMessage {
    type Error = String;

    fn try_from(row: ChatMessageRow) -> Result<Self, Self::Error> {
        let body = match (row.message_type, row.content, row.file_id) {
            (MessageType::Text, Some(content), None) if !content.trim().is_empty() => {
                MessageBody::Text { content }
            }
            (MessageType::File, content, Some(file_id)) => MessageBody::File {
                file_id,
                caption: content.unwrap_or_default(),
            },
            _ => return Err(format!("chat message {} has inconsistent columns", row.id)),
        };

        Ok(ChatMessage {
            id: row.id,
            community_id: row.community_id,
            sender_user_id: row.sender_user_id,
            body,
            created_at: row.created_at,
            updated_at: row.updated_at,
            deleted_at: row.deleted_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(message_type: MessageType, content: Option<&str>, file_id: Option<i64>) -> ChatMessageRow {
        ChatMessageRow {
            id: 1,
            community_id: 1,
            sender_user_id: 1,
            message_type,
            content: content.map(str::to_string),
            file_id,
            created_at: 0,
            updated_at: 0,
            deleted_at: None,
        }
    }

    #[test]
    fn test_text_row_with_file_is_rejected() {
        assert!(ChatMessage::try_from(row(MessageType::Text, Some("hi"), Some(3))).is_err());
        assert!(ChatMessage::try_from(row(MessageType::Text, Some("  "), None)).is_err());
    }

    #[test]
    fn test_file_row_without_caption() {
        let msg = ChatMessage::try_from(row(MessageType::File, None, Some(9))).unwrap();
        assert_eq!(
            msg.body,
            MessageBody::File {
                file_id: 9,
                caption: String::new()
            }
        );
    }

    #[test]
    fn test_rfc3339_rendering() {
        assert_eq!(to_rfc3339(1_704_103_200_000), "2024-01-01T10:00:00.000Z");
    }

    #[test]
    fn test_term_parsing() {
        assert_eq!("fall".parse::<Term>(), Ok(Term::Fall));
        assert_eq!(" SPRING ".parse::<Term>(), Ok(Term::Spring));
        assert!("summer".parse::<Term>().is_err());
    }
}
