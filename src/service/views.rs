//! JSON shapes returned by the core entrypoints.

use serde::Serialize;

use crate::db::models::{
    to_rfc3339, ChatMessage, ClassNote, Community, File, Instructor, MessageBody, MessageType,
    PastExam, Participant, Role, Student, Term, User,
};
use crate::db::Paged;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub id: i64,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub department_id: Option<i64>,
    pub email_verified: bool,
    pub is_active: bool,
    pub created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub student_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub graduation_year: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl UserView {
    pub fn new(user: &User, student: Option<&Student>, instructor: Option<&Instructor>) -> Self {
        UserView {
            id: user.id,
            email: user.email.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            role: user.role,
            department_id: user.department_id,
            email_verified: user.email_verified,
            is_active: user.is_active,
            created_at: to_rfc3339(user.created_at),
            student_id: student.map(|s| s.student_identifier.clone()),
            graduation_year: student.and_then(|s| s.graduation_year),
            title: instructor.map(|i| i.title.clone()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileView {
    pub id: i64,
    pub name: String,
    pub url: String,
    pub size: i64,
    pub mime: String,
    pub created_at: String,
}

impl From<&File> for FileView {
    fn from(file: &File) -> Self {
        FileView {
            id: file.id,
            name: file.name.clone(),
            url: file.url.clone(),
            size: file.size,
            mime: file.mime.clone(),
            created_at: to_rfc3339(file.created_at),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PastExamView {
    pub id: i64,
    pub year: i32,
    pub term: Term,
    pub department_id: i64,
    pub course_code: String,
    pub title: String,
    pub content: String,
    pub file: Option<FileView>,
    pub uploader_user_id: i64,
    pub created_at: String,
    pub updated_at: String,
}

impl PastExamView {
    pub fn new(exam: &PastExam, file: Option<&File>) -> Self {
        PastExamView {
            id: exam.id,
            year: exam.year,
            term: exam.term,
            department_id: exam.department_id,
            course_code: exam.course_code.clone(),
            title: exam.title.clone(),
            content: exam.content.clone(),
            file: file.map(FileView::from),
            uploader_user_id: exam.uploader_user_id,
            created_at: to_rfc3339(exam.created_at),
            updated_at: to_rfc3339(exam.updated_at),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassNoteView {
    pub id: i64,
    pub course_code: String,
    pub title: String,
    pub description: String,
    pub content: String,
    pub department_id: i64,
    pub uploader_user_id: i64,
    pub files: Vec<FileView>,
    pub created_at: String,
    pub updated_at: String,
}

impl ClassNoteView {
    pub fn new(note: &ClassNote, files: &[File]) -> Self {
        ClassNoteView {
            id: note.id,
            course_code: note.course_code.clone(),
            title: note.title.clone(),
            description: note.description.clone(),
            content: note.content.clone(),
            department_id: note.department_id,
            uploader_user_id: note.uploader_user_id,
            files: files.iter().map(FileView::from).collect(),
            created_at: to_rfc3339(note.created_at),
            updated_at: to_rfc3339(note.updated_at),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommunityView {
    pub id: i64,
    pub name: String,
    pub abbreviation: String,
    pub lead_user_id: i64,
    pub profile_photo: Option<FileView>,
    pub created_at: String,
    pub updated_at: String,
}

impl CommunityView {
    pub fn new(community: &Community, photo: Option<&File>) -> Self {
        CommunityView {
            id: community.id,
            name: community.name.clone(),
            abbreviation: community.abbreviation.clone(),
            lead_user_id: community.lead_user_id,
            profile_photo: photo.map(FileView::from),
            created_at: to_rfc3339(community.created_at),
            updated_at: to_rfc3339(community.updated_at),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantView {
    pub user_id: i64,
    pub first_name: String,
    pub last_name: String,
    pub is_lead: bool,
    pub joined_at: String,
}

impl ParticipantView {
    pub fn new(participant: &Participant, lead_user_id: i64) -> Self {
        ParticipantView {
            user_id: participant.user_id,
            first_name: participant.first_name.clone(),
            last_name: participant.last_name.clone(),
            is_lead: participant.user_id == lead_user_id,
            joined_at: to_rfc3339(participant.joined_at),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageView {
    pub id: i64,
    pub community_id: i64,
    pub sender_user_id: i64,
    #[serde(rename = "type")]
    pub message_type: MessageType,
    pub content: Option<String>,
    pub file: Option<FileView>,
    pub created_at: String,
    pub updated_at: String,
}

impl MessageView {
    pub fn new(message: &ChatMessage, file: Option<&File>) -> Self {
        let content = match &message.body {
            MessageBody::Text { content } => Some(content.clone()),
            MessageBody::File { caption, .. } if !caption.is_empty() => Some(caption.clone()),
            MessageBody::File { .. } => None,
        };
        MessageView {
            id: message.id,
            community_id: message.community_id,
            sender_user_id: message.sender_user_id,
            message_type: message.body.message_type(),
            content,
            file: file.map(FileView::from),
            created_at: to_rfc3339(message.created_at),
            updated_at: to_rfc3339(message.updated_at),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageView<T> {
    pub items: Vec<T>,
    pub page: i64,
    pub page_size: i64,
    pub total_items: i64,
    pub total_pages: i64,
}

impl<T> From<Paged<T>> for PageView<T> {
    fn from(paged: Paged<T>) -> Self {
        PageView {
            total_pages: paged.total_pages(),
            items: paged.items,
            page: paged.page,
            page_size: paged.page_size,
            total_items: paged.total_items,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipationView {
    pub community_id: i64,
    pub is_participant: bool,
    pub is_lead: bool,
}
