use sqlx::{Pool, Sqlite};

use crate::db::class_notes::{ClassNoteChanges, ClassNoteFilter, NewClassNote};
use crate::db::models::{now_millis, ClassNote, File, ResourceType};
use crate::db::{ClassNoteRepository, DepartmentRepository, FileRepository, Page};
use crate::error::AppError;
use crate::policy::{authorize, Action, Principal};
use crate::service::files::{FileService, Upload};
use crate::service::views::{ClassNoteView, PageView};
use crate::validation;

pub const MAX_FILES_PER_REQUEST: usize = 10;

#[derive(Debug, Clone)]
pub struct ClassNoteInput {
    pub course_code: String,
    pub title: String,
    pub description: String,
    pub content: String,
    pub department_id: i64,
}

#[derive(Clone)]
pub struct ClassNoteService {
    db: Pool<Sqlite>,
    files: FileService,
}

fn check_upload_count(uploads: &[Upload]) -> Result<(), AppError> {
    if uploads.len() > MAX_FILES_PER_REQUEST {
        return Err(AppError::validation(
            "files",
            format!("At most {} files per request", MAX_FILES_PER_REQUEST),
        ));
    }
    Ok(())
}

fn ids(files: &[File]) -> Vec<i64> {
    files.iter().map(|f| f.id).collect()
}

impl ClassNoteService {
    pub fn new(db: Pool<Sqlite>, files: FileService) -> Self {
        ClassNoteService { db, files }
    }

    async fn load(&self, id: i64) -> Result<ClassNote, AppError> {
        ClassNoteRepository::get_by_id(&self.db, id)
            .await?
            .ok_or_else(|| AppError::NotFound("Class note".to_string()))
    }

    async fn require_department(&self, department_id: i64) -> Result<(), AppError> {
        if DepartmentRepository::exists(&self.db, department_id).await? {
            Ok(())
        } else {
            Err(AppError::validation("departmentId", "Department does not exist"))
        }
    }

    async fn view(&self, note: &ClassNote) -> Result<ClassNoteView, AppError> {
        let files = self
            .files
            .attached_to(ResourceType::ClassNote, note.id)
            .await?;
        Ok(ClassNoteView::new(note, &files))
    }

    /// Note row and every attachment commit together or not at all.
    pub async fn create(
        &self,
        principal: &Principal,
        input: ClassNoteInput,
        uploads: Vec<Upload>,
    ) -> Result<ClassNoteView, AppError> {
        authorize(principal, &Action::CreateClassNote)?;

        let course_code = validation::course_code(&input.course_code)?;
        let title = validation::required_name("title", &input.title)?;
        let description = validation::bounded_text("description", &input.description)?;
        let content = validation::bounded_text("content", &input.content)?;
        self.require_department(input.department_id).await?;
        check_upload_count(&uploads)?;

        let stored = self
            .files
            .store_all(uploads, ResourceType::ClassNote, principal.user_id)
            .await?;

        let committed: Result<ClassNote, AppError> = async {
            let mut tx = self.db.begin().await?;
            let note = ClassNoteRepository::create(
                &mut tx,
                NewClassNote {
                    course_code: &course_code,
                    title: &title,
                    description: &description,
                    content: &content,
                    department_id: input.department_id,
                    uploader_user_id: principal.user_id,
                },
                now_millis(),
            )
            .await?;
            FileRepository::attach(&mut tx, &ids(&stored), ResourceType::ClassNote, note.id)
                .await?;
            tx.commit().await?;
            Ok(note)
        }
        .await;

        match committed {
            Ok(note) => {
                tracing::info!(
                    note_id = note.id,
                    user_id = principal.user_id,
                    files = stored.len(),
                    "class note created"
                );
                Ok(ClassNoteView::new(&note, &stored))
            }
            Err(e) => {
                self.files.discard(&stored).await;
                Err(e)
            }
        }
    }

    pub async fn update(
        &self,
        principal: &Principal,
        id: i64,
        mut changes: ClassNoteChanges,
    ) -> Result<ClassNoteView, AppError> {
        let note = self.load(id).await?;
        authorize(principal, &Action::UpdateClassNote(&note))?;

        changes.course_code = changes
            .course_code
            .as_deref()
            .map(validation::course_code)
            .transpose()?;
        changes.title = validation::optional_name("title", changes.title.as_deref())?;
        changes.description = changes
            .description
            .as_deref()
            .map(|d| validation::bounded_text("description", d))
            .transpose()?;
        changes.content = changes
            .content
            .as_deref()
            .map(|c| validation::bounded_text("content", c))
            .transpose()?;
        if let Some(department_id) = changes.department_id {
            self.require_department(department_id).await?;
        }

        let mut conn = self.db.acquire().await?;
        let updated = ClassNoteRepository::update(&mut conn, id, &changes, now_millis()).await?;
        drop(conn);

        tracing::info!(note_id = id, user_id = principal.user_id, "class note updated");
        self.view(&updated).await
    }

    pub async fn delete(&self, principal: &Principal, id: i64) -> Result<(), AppError> {
        let note = self.load(id).await?;
        authorize(principal, &Action::DeleteClassNote(&note))?;

        let mut tx = self.db.begin().await?;
        let detached =
            FileRepository::detach_all_for_resource(&mut *tx, ResourceType::ClassNote, id).await?;
        ClassNoteRepository::delete(&mut *tx, id).await?;
        tx.commit().await?;

        tracing::info!(note_id = id, user_id = principal.user_id, detached, "class note deleted");
        Ok(())
    }

    pub async fn add_files(
        &self,
        principal: &Principal,
        id: i64,
        uploads: Vec<Upload>,
    ) -> Result<ClassNoteView, AppError> {
        let note = self.load(id).await?;
        authorize(principal, &Action::ChangeClassNoteFiles(&note))?;
        if uploads.is_empty() {
            return Err(AppError::validation("files", "At least one file is required"));
        }
        check_upload_count(&uploads)?;

        let stored = self
            .files
            .store_all(uploads, ResourceType::ClassNote, principal.user_id)
            .await?;

        let committed: Result<(), AppError> = async {
            let mut tx = self.db.begin().await?;
            FileRepository::attach(&mut tx, &ids(&stored), ResourceType::ClassNote, id).await?;
            ClassNoteRepository::touch(&mut *tx, id, now_millis()).await?;
            tx.commit().await?;
            Ok(())
        }
        .await;

        if let Err(e) = committed {
            self.files.discard(&stored).await;
            return Err(e);
        }

        tracing::info!(note_id = id, files = stored.len(), "files added to class note");
        let note = self.load(id).await?;
        self.view(&note).await
    }

    /// Detaches the given files; the sweeper removes them later. Every id must belong to
    /// this note, otherwise nothing changes.
    pub async fn remove_files(
        &self,
        principal: &Principal,
        id: i64,
        file_ids: &[i64],
    ) -> Result<ClassNoteView, AppError> {
        let note = self.load(id).await?;
        authorize(principal, &Action::ChangeClassNoteFiles(&note))?;
        if file_ids.is_empty() {
            return Err(AppError::validation("fileIds", "At least one file id is required"));
        }

        let mut unique = file_ids.to_vec();
        unique.sort_unstable();
        unique.dedup();

        let mut tx = self.db.begin().await?;
        let detached =
            FileRepository::detach(&mut tx, &unique, ResourceType::ClassNote, id).await?;
        if detached != unique.len() as u64 {
            return Err(AppError::NotFound("File".to_string()));
        }
        ClassNoteRepository::touch(&mut *tx, id, now_millis()).await?;
        tx.commit().await?;

        tracing::info!(note_id = id, detached, "files removed from class note");
        let note = self.load(id).await?;
        self.view(&note).await
    }

    pub async fn get(&self, principal: &Principal, id: i64) -> Result<ClassNoteView, AppError> {
        let note = self.load(id).await?;
        authorize(principal, &Action::ReadContent)?;
        self.view(&note).await
    }

    pub async fn list(
        &self,
        principal: &Principal,
        mut filter: ClassNoteFilter,
        page: Page,
    ) -> Result<PageView<ClassNoteView>, AppError> {
        authorize(principal, &Action::ReadContent)?;
        filter.course_code = filter
            .course_code
            .as_deref()
            .map(validation::course_code)
            .transpose()?;

        let mut conn = self.db.acquire().await?;
        let paged = ClassNoteRepository::list(&mut conn, &filter, page).await?;
        drop(conn);

        let mut items = Vec::with_capacity(paged.items.len());
        for note in &paged.items {
            items.push(self.view(note).await?);
        }
        Ok(PageView {
            total_pages: paged.total_pages(),
            items,
            page: paged.page,
            page_size: paged.page_size,
            total_items: paged.total_items,
        })
    }
}
