use sqlx::{Pool, Sqlite};

use crate::db::models::{now_millis, PastExam, ResourceType, Term};
use crate::db::past_exams::{NewPastExam, PastExamChanges, PastExamFilter};
use crate::db::{DepartmentRepository, FileRepository, Page, PastExamRepository};
use crate::error::AppError;
use crate::policy::{authorize, Action, Principal};
use crate::service::files::{FileService, Upload};
use crate::service::views::{PageView, PastExamView};
use crate::validation;

#[derive(Debug, Clone)]
pub struct PastExamInput {
    pub year: i32,
    pub term: Term,
    pub department_id: i64,
    pub course_code: String,
    pub title: String,
    pub content: String,
}

#[derive(Clone)]
pub struct PastExamService {
    db: Pool<Sqlite>,
    files: FileService,
}

fn check_exam_file(upload: &Upload) -> Result<(), AppError> {
    if upload.is_pdf_or_image() {
        Ok(())
    } else {
        Err(AppError::validation("file", "Past exam file must be a PDF or an image"))
    }
}

impl PastExamService {
    pub fn new(db: Pool<Sqlite>, files: FileService) -> Self {
        PastExamService { db, files }
    }

    async fn load(&self, id: i64) -> Result<PastExam, AppError> {
        PastExamRepository::get_by_id(&self.db, id)
            .await?
            .ok_or_else(|| AppError::NotFound("Past exam".to_string()))
    }

    async fn require_department(&self, department_id: i64) -> Result<(), AppError> {
        if DepartmentRepository::exists(&self.db, department_id).await? {
            Ok(())
        } else {
            Err(AppError::validation("departmentId", "Department does not exist"))
        }
    }

    async fn view(&self, exam: &PastExam) -> Result<PastExamView, AppError> {
        let file = self.files.get(exam.file_id).await?;
        Ok(PastExamView::new(exam, file.as_ref()))
    }

    pub async fn create(
        &self,
        principal: &Principal,
        input: PastExamInput,
        upload: Option<Upload>,
    ) -> Result<PastExamView, AppError> {
        authorize(principal, &Action::CreatePastExam)?;

        let year = validation::exam_year(input.year)?;
        let course_code = validation::course_code(&input.course_code)?;
        let title = validation::required_name("title", &input.title)?;
        let content = validation::bounded_text("content", &input.content)?;
        self.require_department(input.department_id).await?;
        if let Some(upload) = &upload {
            check_exam_file(upload)?;
        }

        let file = match upload {
            Some(upload) => Some(
                self.files
                    .store(upload, ResourceType::PastExam, principal.user_id)
                    .await?,
            ),
            None => None,
        };

        let committed: Result<PastExam, AppError> = async {
            let now = now_millis();
            let mut tx = self.db.begin().await?;
            let mut exam = PastExamRepository::create(
                &mut tx,
                NewPastExam {
                    year,
                    term: input.term,
                    department_id: input.department_id,
                    course_code: &course_code,
                    title: &title,
                    content: &content,
                    uploader_user_id: principal.user_id,
                },
                now,
            )
            .await?;

            if let Some(file) = &file {
                FileRepository::attach(&mut tx, &[file.id], ResourceType::PastExam, exam.id)
                    .await?;
                exam = PastExamRepository::set_file(&mut tx, exam.id, Some(file.id), now).await?;
            }
            tx.commit().await?;
            Ok(exam)
        }
        .await;

        let exam = match committed {
            Ok(exam) => exam,
            Err(e) => {
                self.files.discard(file.as_slice()).await;
                return Err(e);
            }
        };

        tracing::info!(exam_id = exam.id, user_id = principal.user_id, "past exam created");
        Ok(PastExamView::new(&exam, file.as_ref()))
    }

    /// A new file replaces the old one; the old one is detached for the sweeper.
    pub async fn update(
        &self,
        principal: &Principal,
        id: i64,
        mut changes: PastExamChanges,
        upload: Option<Upload>,
    ) -> Result<PastExamView, AppError> {
        let exam = self.load(id).await?;
        authorize(principal, &Action::UpdatePastExam(&exam))?;

        if let Some(year) = changes.year {
            validation::exam_year(year)?;
        }
        changes.course_code = changes
            .course_code
            .as_deref()
            .map(validation::course_code)
            .transpose()?;
        changes.title = validation::optional_name("title", changes.title.as_deref())?;
        changes.content = changes
            .content
            .as_deref()
            .map(|c| validation::bounded_text("content", c))
            .transpose()?;
        if let Some(department_id) = changes.department_id {
            self.require_department(department_id).await?;
        }
        if let Some(upload) = &upload {
            check_exam_file(upload)?;
        }

        let file = match upload {
            Some(upload) => Some(
                self.files
                    .store(upload, ResourceType::PastExam, principal.user_id)
                    .await?,
            ),
            None => None,
        };

        let committed: Result<PastExam, AppError> = async {
            let now = now_millis();
            let mut tx = self.db.begin().await?;
            let mut updated = PastExamRepository::update(&mut tx, id, &changes, now).await?;

            if let Some(file) = &file {
                if let Some(old) = updated.file_id {
                    FileRepository::detach(&mut tx, &[old], ResourceType::PastExam, id).await?;
                }
                FileRepository::attach(&mut tx, &[file.id], ResourceType::PastExam, id).await?;
                updated = PastExamRepository::set_file(&mut tx, id, Some(file.id), now).await?;
            }
            tx.commit().await?;
            Ok(updated)
        }
        .await;

        match committed {
            Ok(updated) => {
                tracing::info!(exam_id = id, user_id = principal.user_id, "past exam updated");
                self.view(&updated).await
            }
            Err(e) => {
                self.files.discard(file.as_slice()).await;
                Err(e)
            }
        }
    }

    pub async fn delete(&self, principal: &Principal, id: i64) -> Result<(), AppError> {
        let exam = self.load(id).await?;
        authorize(principal, &Action::DeletePastExam(&exam))?;

        let mut tx = self.db.begin().await?;
        FileRepository::detach_all_for_resource(&mut *tx, ResourceType::PastExam, id).await?;
        PastExamRepository::delete(&mut *tx, id).await?;
        tx.commit().await?;

        tracing::info!(exam_id = id, user_id = principal.user_id, "past exam deleted");
        Ok(())
    }

    pub async fn get(&self, principal: &Principal, id: i64) -> Result<PastExamView, AppError> {
        let exam = self.load(id).await?;
        authorize(principal, &Action::ReadContent)?;
        self.view(&exam).await
    }

    pub async fn list(
        &self,
        principal: &Principal,
        mut filter: PastExamFilter,
        page: Page,
    ) -> Result<PageView<PastExamView>, AppError> {
        authorize(principal, &Action::ReadContent)?;
        filter.course_code = filter
            .course_code
            .as_deref()
            .map(validation::course_code)
            .transpose()?;

        let mut conn = self.db.acquire().await?;
        let paged = PastExamRepository::list(&mut conn, &filter, page).await?;
        drop(conn);

        let mut items = Vec::with_capacity(paged.items.len());
        for exam in &paged.items {
            items.push(self.view(exam).await?);
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
