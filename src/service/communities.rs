use sqlx::{Pool, Sqlite};

use crate::db::communities::CommunityChanges;
use crate::db::models::{now_millis, Community, ResourceType};
use crate::db::{CommunityRepository, FileRepository, Page};
use crate::error::AppError;
use crate::policy::{authorize, Action, Denial, Principal};
use crate::service::files::{FileService, Upload};
use crate::service::views::{CommunityView, PageView, ParticipantView, ParticipationView};
use crate::validation;

/// Communities, their membership set and profile photo.
///
/// The lead is inserted as the first participant when the community is created, may only
/// hand the role to an existing participant, and can never leave.
#[derive(Clone)]
pub struct CommunityService {
    db: Pool<Sqlite>,
    files: FileService,
}

impl CommunityService {
    pub fn new(db: Pool<Sqlite>, files: FileService) -> Self {
        CommunityService { db, files }
    }

    pub(crate) async fn load(&self, id: i64) -> Result<Community, AppError> {
        CommunityRepository::get_by_id(&self.db, id)
            .await?
            .ok_or_else(|| AppError::NotFound("Community".to_string()))
    }

    async fn is_participant(&self, community_id: i64, user_id: i64) -> Result<bool, AppError> {
        CommunityRepository::is_participant(&self.db, community_id, user_id).await
    }

    async fn view(&self, community: &Community) -> Result<CommunityView, AppError> {
        let photo = self.files.get(community.profile_photo_file_id).await?;
        Ok(CommunityView::new(community, photo.as_ref()))
    }

    pub async fn create(
        &self,
        principal: &Principal,
        name: &str,
        abbreviation: &str,
    ) -> Result<CommunityView, AppError> {
        authorize(principal, &Action::CreateCommunity)?;
        let name = validation::required_name("name", name)?;
        let abbreviation = validation::required_name("abbreviation", abbreviation)?;

        let now = now_millis();
        let mut tx = self.db.begin().await?;
        let community =
            CommunityRepository::create(&mut tx, &name, &abbreviation, principal.user_id, now)
                .await?;
        CommunityRepository::add_participant(&mut *tx, community.id, principal.user_id, now)
            .await?;
        tx.commit().await?;

        tracing::info!(community_id = community.id, lead = principal.user_id, "community created");
        Ok(CommunityView::new(&community, None))
    }

    pub async fn get(&self, principal: &Principal, id: i64) -> Result<CommunityView, AppError> {
        let community = self.load(id).await?;
        authorize(principal, &Action::ReadContent)?;
        self.view(&community).await
    }

    pub async fn list(
        &self,
        principal: &Principal,
        page: Page,
    ) -> Result<PageView<CommunityView>, AppError> {
        authorize(principal, &Action::ReadContent)?;

        let mut conn = self.db.acquire().await?;
        let paged = CommunityRepository::list(&mut conn, page).await?;
        drop(conn);

        let mut items = Vec::with_capacity(paged.items.len());
        for community in &paged.items {
            items.push(self.view(community).await?);
        }
        Ok(PageView {
            total_pages: paged.total_pages(),
            items,
            page: paged.page,
            page_size: paged.page_size,
            total_items: paged.total_items,
        })
    }

    /// A new lead must already be a participant at the moment the update is written.
    pub async fn update(
        &self,
        principal: &Principal,
        id: i64,
        mut changes: CommunityChanges,
    ) -> Result<CommunityView, AppError> {
        let community = self.load(id).await?;
        authorize(principal, &Action::UpdateCommunity(&community))?;

        changes.name = validation::optional_name("name", changes.name.as_deref())?;
        changes.abbreviation =
            validation::optional_name("abbreviation", changes.abbreviation.as_deref())?;

        let Some(updated) =
            CommunityRepository::update(&self.db, id, &changes, now_millis()).await?
        else {
            self.load(id).await?;
            return Err(AppError::validation(
                "leadUserId",
                "New lead must be a participant of the community",
            ));
        };

        if updated.lead_user_id != community.lead_user_id {
            tracing::info!(
                community_id = id,
                from = community.lead_user_id,
                to = updated.lead_user_id,
                "community lead transferred"
            );
        }
        self.view(&updated).await
    }

    /// Participants and messages cascade with the row; every attached file (chat, photo,
    /// community) is detached in the same transaction and left to the sweeper.
    pub async fn delete(&self, principal: &Principal, id: i64) -> Result<(), AppError> {
        let community = self.load(id).await?;
        authorize(principal, &Action::DeleteCommunity(&community))?;

        let mut tx = self.db.begin().await?;
        let mut detached = FileRepository::detach_chat_files_of_community(&mut *tx, id).await?;
        detached +=
            FileRepository::detach_all_for_resource(&mut *tx, ResourceType::ProfilePhoto, id)
                .await?;
        detached +=
            FileRepository::detach_all_for_resource(&mut *tx, ResourceType::Community, id).await?;
        CommunityRepository::delete(&mut *tx, id).await?;
        tx.commit().await?;

        tracing::info!(community_id = id, detached, "community deleted");
        Ok(())
    }

    pub async fn join(&self, principal: &Principal, id: i64) -> Result<ParticipationView, AppError> {
        let community = self.load(id).await?;
        let is_participant = self.is_participant(id, principal.user_id).await?;
        authorize(principal, &Action::JoinCommunity { is_participant })?;

        CommunityRepository::add_participant(&self.db, id, principal.user_id, now_millis())
            .await?;

        tracing::info!(community_id = id, user_id = principal.user_id, "joined community");
        Ok(ParticipationView {
            community_id: id,
            is_participant: true,
            is_lead: community.lead_user_id == principal.user_id,
        })
    }

    pub async fn leave(&self, principal: &Principal, id: i64) -> Result<(), AppError> {
        let community = self.load(id).await?;
        let is_participant = self.is_participant(id, principal.user_id).await?;
        authorize(
            principal,
            &Action::LeaveCommunity {
                community: &community,
                is_participant,
            },
        )?;

        if !CommunityRepository::remove_participant(&self.db, id, principal.user_id).await? {
            // Membership or lead changed since the check above; report the current reason.
            let current = self.load(id).await?;
            let is_participant = self.is_participant(id, principal.user_id).await?;
            authorize(
                principal,
                &Action::LeaveCommunity {
                    community: &current,
                    is_participant,
                },
            )?;
            return Err(Denial::NotParticipant.into());
        }

        tracing::info!(community_id = id, user_id = principal.user_id, "left community");
        Ok(())
    }

    pub async fn participants(
        &self,
        principal: &Principal,
        id: i64,
        page: Page,
    ) -> Result<PageView<ParticipantView>, AppError> {
        let community = self.load(id).await?;
        authorize(principal, &Action::ReadContent)?;

        let mut conn = self.db.acquire().await?;
        let paged = CommunityRepository::list_participants(&mut conn, id, page).await?;
        Ok(paged
            .map(|p| ParticipantView::new(&p, community.lead_user_id))
            .into())
    }

    pub async fn check_participation(
        &self,
        principal: &Principal,
        id: i64,
    ) -> Result<ParticipationView, AppError> {
        let community = self.load(id).await?;
        authorize(principal, &Action::ReadContent)?;

        Ok(ParticipationView {
            community_id: id,
            is_participant: self.is_participant(id, principal.user_id).await?,
            is_lead: community.lead_user_id == principal.user_id,
        })
    }

    /// Stores the new photo and swaps it in; the previous one is detached for the sweeper.
    pub async fn update_profile_photo(
        &self,
        principal: &Principal,
        id: i64,
        upload: Upload,
    ) -> Result<CommunityView, AppError> {
        let community = self.load(id).await?;
        authorize(principal, &Action::UpdateCommunity(&community))?;
        if !upload.is_image() {
            return Err(AppError::validation("file", "Profile photo must be an image"));
        }

        let photo = self
            .files
            .store(upload, ResourceType::ProfilePhoto, principal.user_id)
            .await?;

        let committed: Result<Community, AppError> = async {
            let mut tx = self.db.begin().await?;
            let current = CommunityRepository::get_by_id(&mut *tx, id)
                .await?
                .ok_or_else(|| AppError::NotFound("Community".to_string()))?;
            if let Some(old) = current.profile_photo_file_id {
                FileRepository::detach(&mut tx, &[old], ResourceType::ProfilePhoto, id).await?;
            }
            FileRepository::attach(&mut tx, &[photo.id], ResourceType::ProfilePhoto, id).await?;
            let updated =
                CommunityRepository::set_profile_photo(&mut tx, id, Some(photo.id), now_millis())
                    .await?;
            tx.commit().await?;
            Ok(updated)
        }
        .await;

        match committed {
            Ok(updated) => {
                tracing::info!(community_id = id, file_id = photo.id, "profile photo updated");
                Ok(CommunityView::new(&updated, Some(&photo)))
            }
            Err(e) => {
                self.files.discard(std::slice::from_ref(&photo)).await;
                Err(e)
            }
        }
    }

    /// Succeeds without changes when no photo is set.
    pub async fn delete_profile_photo(
        &self,
        principal: &Principal,
        id: i64,
    ) -> Result<CommunityView, AppError> {
        let community = self.load(id).await?;
        authorize(principal, &Action::UpdateCommunity(&community))?;

        let Some(old) = community.profile_photo_file_id else {
            return Ok(CommunityView::new(&community, None));
        };

        let mut tx = self.db.begin().await?;
        FileRepository::detach(&mut tx, &[old], ResourceType::ProfilePhoto, id).await?;
        let updated = CommunityRepository::set_profile_photo(&mut tx, id, None, now_millis()).await?;
        tx.commit().await?;

        tracing::info!(community_id = id, file_id = old, "profile photo removed");
        Ok(CommunityView::new(&updated, None))
    }
}
