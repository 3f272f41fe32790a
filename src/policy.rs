//! Authorization decisions.
//!
//! [`authorize`] is a pure function of who is asking, what they want to do and the
//! target row(s) already loaded by the caller. It never touches storage: membership is
//! passed in as a fact the caller looked up. Existence checks happen before this runs,
//! so a denial never reveals whether a hidden row exists.

use thiserror::Error;

use crate::db::models::{ChatMessage, ClassNote, Community, PastExam, Role};
use crate::error::AppError;

/// The authenticated caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Principal {
    pub user_id: i64,
    pub role: Role,
    pub email_verified: bool,
}

#[derive(Debug, Clone, Copy)]
pub enum Action<'a> {
    ViewOwnProfile,
    UpdateOwnProfile,
    /// Any read of shared content: exams, notes, community listings.
    ReadContent,

    CreatePastExam,
    UpdatePastExam(&'a PastExam),
    DeletePastExam(&'a PastExam),

    CreateClassNote,
    UpdateClassNote(&'a ClassNote),
    DeleteClassNote(&'a ClassNote),
    /// Attach or detach files on a note.
    ChangeClassNoteFiles(&'a ClassNote),

    CreateCommunity,
    UpdateCommunity(&'a Community),
    DeleteCommunity(&'a Community),
    JoinCommunity {
        is_participant: bool,
    },
    LeaveCommunity {
        community: &'a Community,
        is_participant: bool,
    },

    ReadChat {
        is_participant: bool,
    },
    SendChat {
        is_participant: bool,
    },
    DeleteMessage {
        message: &'a ChatMessage,
        community: &'a Community,
    },
}

impl Action<'_> {
    fn requires_verified_email(&self) -> bool {
        !matches!(self, Action::ViewOwnProfile | Action::UpdateOwnProfile)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Denial {
    #[error("Email address must be verified first")]
    EmailNotVerified,
    #[error("Only instructors may manage past exams")]
    InstructorOnly,
    #[error("Only the author may modify this resource")]
    NotAuthor,
    #[error("Only the community lead may do this")]
    NotLead,
    #[error("Only community participants may do this")]
    NotParticipant,
    #[error("User is already a participant")]
    AlreadyParticipant,
    #[error("Lead cannot leave")]
    LeadCannotLeave,
    #[error("Only the sender or the community lead may delete this message")]
    NotSenderOrLead,
}

impl From<Denial> for AppError {
    fn from(denial: Denial) -> Self {
        match denial {
            Denial::AlreadyParticipant | Denial::LeadCannotLeave => {
                AppError::Conflict(denial.to_string())
            }
            _ => AppError::Forbidden(denial.to_string()),
        }
    }
}

fn require(condition: bool, denial: Denial) -> Result<(), Denial> {
    if condition {
        Ok(())
    } else {
        Err(denial)
    }
}

pub fn authorize(principal: &Principal, action: &Action<'_>) -> Result<(), Denial> {
    if action.requires_verified_email() && !principal.email_verified {
        return Err(Denial::EmailNotVerified);
    }

    let me = principal.user_id;
    let instructor = principal.role == Role::Instructor;

    match *action {
        Action::ViewOwnProfile
        | Action::UpdateOwnProfile
        | Action::ReadContent
        | Action::CreateClassNote
        | Action::CreateCommunity => Ok(()),

        Action::CreatePastExam => require(instructor, Denial::InstructorOnly),
        Action::UpdatePastExam(exam) | Action::DeletePastExam(exam) => {
            require(instructor, Denial::InstructorOnly)?;
            require(exam.uploader_user_id == me, Denial::NotAuthor)
        }

        Action::UpdateClassNote(note)
        | Action::DeleteClassNote(note)
        | Action::ChangeClassNoteFiles(note) => {
            require(note.uploader_user_id == me, Denial::NotAuthor)
        }

        Action::UpdateCommunity(community) | Action::DeleteCommunity(community) => {
            require(community.lead_user_id == me, Denial::NotLead)
        }
        Action::JoinCommunity { is_participant } => {
            require(!is_participant, Denial::AlreadyParticipant)
        }
        Action::LeaveCommunity {
            community,
            is_participant,
        } => {
            require(is_participant, Denial::NotParticipant)?;
            require(community.lead_user_id != me, Denial::LeadCannotLeave)
        }

        Action::ReadChat { is_participant } | Action::SendChat { is_participant } => {
            require(is_participant, Denial::NotParticipant)
        }
        Action::DeleteMessage { message, community } => require(
            message.sender_user_id == me || community.lead_user_id == me,
            Denial::NotSenderOrLead,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{MessageBody, Term};

    fn principal(user_id: i64, role: Role) -> Principal {
        Principal {
            user_id,
            role,
            email_verified: true,
        }
    }

    fn exam(uploader: i64) -> PastExam {
        PastExam {
            id: 1,
            year: 2023,
            term: Term::Fall,
            department_id: 1,
            course_code: "CENG101".into(),
            title: "Midterm".into(),
            content: "".into(),
            file_id: None,
            uploader_user_id: uploader,
            created_at: 0,
            updated_at: 0,
        }
    }

    fn note(uploader: i64) -> ClassNote {
        ClassNote {
            id: 1,
            course_code: "CENG101".into(),
            title: "Week 1".into(),
            description: "".into(),
            content: "".into(),
            department_id: 1,
            uploader_user_id: uploader,
            created_at: 0,
            updated_at: 0,
        }
    }

    fn community(lead: i64) -> Community {
        Community {
            id: 1,
            name: "C1".into(),
            abbreviation: "C1".into(),
            lead_user_id: lead,
            profile_photo_file_id: None,
            created_at: 0,
            updated_at: 0,
        }
    }

    fn message(sender: i64) -> ChatMessage {
        ChatMessage {
            id: 1,
            community_id: 1,
            sender_user_id: sender,
            body: MessageBody::Text {
                content: "hi".into(),
            },
            created_at: 0,
            updated_at: 0,
            deleted_at: None,
        }
    }

    #[test]
    fn test_unverified_only_reaches_own_profile() {
        let p = Principal {
            user_id: 1,
            role: Role::Instructor,
            email_verified: false,
        };
        assert!(authorize(&p, &Action::ViewOwnProfile).is_ok());
        assert!(authorize(&p, &Action::UpdateOwnProfile).is_ok());
        assert_eq!(
            authorize(&p, &Action::ReadContent),
            Err(Denial::EmailNotVerified)
        );
        assert_eq!(
            authorize(&p, &Action::CreatePastExam),
            Err(Denial::EmailNotVerified)
        );
    }

    #[test]
    fn test_past_exam_rules() {
        let student = principal(1, Role::Student);
        let author = principal(2, Role::Instructor);
        let other = principal(3, Role::Instructor);
        let e = exam(2);

        assert_eq!(
            authorize(&student, &Action::CreatePastExam),
            Err(Denial::InstructorOnly)
        );
        assert!(authorize(&author, &Action::CreatePastExam).is_ok());
        assert!(authorize(&author, &Action::UpdatePastExam(&e)).is_ok());
        assert!(authorize(&author, &Action::DeletePastExam(&e)).is_ok());
        assert_eq!(
            authorize(&other, &Action::DeletePastExam(&e)),
            Err(Denial::NotAuthor)
        );
    }

    #[test]
    fn test_demoted_author_still_needs_instructor_role() {
        // A student who somehow owns an exam row still may not touch it.
        let e = exam(1);
        assert_eq!(
            authorize(&principal(1, Role::Student), &Action::UpdatePastExam(&e)),
            Err(Denial::InstructorOnly)
        );
    }

    #[test]
    fn test_class_note_ownership_ignores_role() {
        let n = note(1);
        assert!(authorize(&principal(1, Role::Student), &Action::DeleteClassNote(&n)).is_ok());
        assert!(authorize(&principal(1, Role::Student), &Action::ChangeClassNoteFiles(&n)).is_ok());
        assert_eq!(
            authorize(&principal(2, Role::Instructor), &Action::UpdateClassNote(&n)),
            Err(Denial::NotAuthor)
        );
        assert!(authorize(&principal(9, Role::Student), &Action::CreateClassNote).is_ok());
    }

    #[test]
    fn test_community_membership_rules() {
        let c = community(1);
        let lead = principal(1, Role::Student);
        let bob = principal(2, Role::Student);

        assert!(authorize(&lead, &Action::UpdateCommunity(&c)).is_ok());
        assert_eq!(
            authorize(&bob, &Action::DeleteCommunity(&c)),
            Err(Denial::NotLead)
        );
        assert_eq!(
            authorize(&bob, &Action::JoinCommunity { is_participant: true }),
            Err(Denial::AlreadyParticipant)
        );
        assert!(authorize(&bob, &Action::JoinCommunity { is_participant: false }).is_ok());
        assert_eq!(
            authorize(
                &lead,
                &Action::LeaveCommunity {
                    community: &c,
                    is_participant: true
                }
            ),
            Err(Denial::LeadCannotLeave)
        );
        assert!(authorize(
            &bob,
            &Action::LeaveCommunity {
                community: &c,
                is_participant: true
            }
        )
        .is_ok());
        assert_eq!(
            authorize(
                &bob,
                &Action::LeaveCommunity {
                    community: &c,
                    is_participant: false
                }
            ),
            Err(Denial::NotParticipant)
        );
    }

    #[test]
    fn test_chat_rules() {
        let c = community(3);
        let m = message(2);
        let outsider = principal(5, Role::Student);

        assert_eq!(
            authorize(&outsider, &Action::SendChat { is_participant: false }),
            Err(Denial::NotParticipant)
        );
        assert!(authorize(&outsider, &Action::ReadChat { is_participant: true }).is_ok());

        let delete = Action::DeleteMessage {
            message: &m,
            community: &c,
        };
        assert!(authorize(&principal(2, Role::Student), &delete).is_ok());
        assert!(authorize(&principal(3, Role::Student), &delete).is_ok());
        assert_eq!(
            authorize(&principal(4, Role::Student), &delete),
            Err(Denial::NotSenderOrLead)
        );
    }

    #[test]
    fn test_denial_mapping() {
        let err: AppError = Denial::LeadCannotLeave.into();
        assert_eq!(err.code(), "RES_004");
        assert_eq!(err.public_message(), "Lead cannot leave");
        let err: AppError = Denial::NotLead.into();
        assert_eq!(err.code(), "AUTH_008");
    }
}
