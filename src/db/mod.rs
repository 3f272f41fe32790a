pub mod models;
pub mod users;
pub mod tokens;
pub mod departments;
pub mod files;
pub mod past_exams;
pub mod class_notes;
pub mod communities;
pub mod messages;

pub use models::{
    ChatMessage, ClassNote, Community, File, MessageBody, PastExam, Participant, User,
};
pub use users::UserRepository;
pub use tokens::{EmailTokenRepository, RefreshTokenRepository};
pub use departments::DepartmentRepository;
pub use files::FileRepository;
pub use past_exams::PastExamRepository;
pub use class_notes::ClassNoteRepository;
pub use communities::CommunityRepository;
pub use messages::{MessageQuery, MessageRepository};

use crate::error::AppError;

/// Maps a unique-constraint violation to `AlreadyExists(what)`, anything else to a
/// database error.
pub(crate) fn unique_or(err: sqlx::Error, what: &str) -> AppError {
    match &err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            AppError::AlreadyExists(what.to_string())
        }
        _ => AppError::Database(err),
    }
}

/// Parameters for a 1-based page request; `page_size` is clamped to [1, 100].
#[derive(Debug, Clone, Copy)]
pub struct Page {
    pub page: i64,
    pub page_size: i64,
}

impl Page {
    pub const DEFAULT_SIZE: i64 = 10;
    pub const MAX_SIZE: i64 = 100;

    pub fn new(page: Option<i64>, page_size: Option<i64>) -> Self {
        Page {
            page: page.unwrap_or(1).max(1),
            page_size: page_size
                .unwrap_or(Self::DEFAULT_SIZE)
                .clamp(1, Self::MAX_SIZE),
        }
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.page_size
    }
}

#[derive(Debug, Clone)]
pub struct Paged<T> {
    pub items: Vec<T>,
    pub page: i64,
    pub page_size: i64,
    pub total_items: i64,
}

impl<T> Paged<T> {
    pub fn total_pages(&self) -> i64 {
        (self.total_items + self.page_size - 1) / self.page_size
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Paged<U> {
        Paged {
            items: self.items.into_iter().map(f).collect(),
            page: self.page,
            page_size: self.page_size,
            total_items: self.total_items,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_defaults_and_clamp() {
        let page = Page::new(None, None);
        assert_eq!((page.page, page.page_size), (1, 10));

        let page = Page::new(Some(0), Some(500));
        assert_eq!((page.page, page.page_size), (1, 100));

        let page = Page::new(Some(3), Some(20));
        assert_eq!(page.offset(), 40);
    }

    #[test]
    fn test_total_pages() {
        let paged: Paged<()> = Paged {
            items: vec![],
            page: 1,
            page_size: 10,
            total_items: 21,
        };
        assert_eq!(paged.total_pages(), 3);
    }
}
