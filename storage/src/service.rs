use std::sync::Arc;

use crate::engine::FileStore;
use crate::object::{NewStoredFile, UploadRequest, User};
use crate::repository::FileRepository;
use crate::response::{ContentResponse, MetaDataResponse, ResponseBuilder};
use crate::tags::TagRegistry;
use crate::{FailureKind, ServiceResult};

/// Orchestrates uploads and lookups for a single request.
///
/// Built per request: the collaborators are shared, the [`ResponseBuilder`] carries the
/// request's scheme and host.
pub struct FileService {
    store: Arc<dyn FileStore>,
    tags: Arc<dyn TagRegistry>,
    files: Arc<dyn FileRepository>,
    responses: ResponseBuilder,
}

impl FileService {
    pub fn new(
        store: Arc<dyn FileStore>,
        tags: Arc<dyn TagRegistry>,
        files: Arc<dyn FileRepository>,
        responses: ResponseBuilder,
    ) -> Self {
        Self {
            store,
            tags,
            files,
            responses,
        }
    }

    /// Writes the file to disk, then records it.
    ///
    /// The record is only inserted after the bytes are on disk. If the insert itself fails the
    /// written file stays behind.
    pub async fn upload(&self, request: UploadRequest, user: &User) -> ServiceResult<()> {
        let file = match request.file {
            Some(file) if self.store.is_valid_file(&file) => file,
            _ => return Err(FailureKind::NoFileUploaded.into()),
        };

        let tags = match &request.tags {
            Some(names) => Some(self.tags.get_or_create_tags_by_name(names).await?),
            None => None,
        };

        let path = self.store.create_file_path(&file);
        let stored_file = NewStoredFile::new(
            request.name,
            path,
            file.content_type.clone(),
            user.clone(),
            tags,
        );

        if let Err(e) = self.store.save_file_to_path(&file, &stored_file.path).await {
            tracing::error!(
                "File {} could not be saved at {}: {}",
                file.file_name,
                stored_file.path.display(),
                e
            );
            return Err(FailureKind::FileStorageError.into());
        }
        tracing::info!("File {} saved at {}", file.file_name, stored_file.path.display());

        self.files.add(stored_file).await?;
        Ok(())
    }

    pub async fn get_content_by_id(&self, id: i64) -> ServiceResult<Option<ContentResponse>> {
        if id <= 0 {
            return Ok(None);
        }

        let Some(stored_file) = self.files.get_by_id(id).await? else {
            return Ok(None);
        };

        let data = self
            .store
            .read_file(&stored_file.path)
            .await
            .map_err(crate::StorageError::from)?;

        Ok(Some(ContentResponse {
            data,
            content_type: stored_file.content_type,
        }))
    }

    pub async fn get_metadata_by_id(&self, id: i64) -> ServiceResult<Option<MetaDataResponse>> {
        if id <= 0 {
            return Ok(None);
        }

        Ok(self
            .files
            .get_by_id(id)
            .await?
            .map(|stored_file| self.responses.build_metadata(&stored_file)))
    }

    /// `Ok(None)` means the tag exists but nothing carries it.
    pub async fn get_all_by_tag(&self, tag_name: &str) -> ServiceResult<Option<Vec<MetaDataResponse>>> {
        if tag_name.trim().is_empty() {
            return Err(FailureKind::InvalidTagName.into());
        }

        if !self.tags.tag_exists_by_name(tag_name).await? {
            return Err(FailureKind::TagNotFound.into());
        }

        let stored_files = self.files.get_all_by_tag(tag_name).await?;
        if stored_files.is_empty() {
            return Ok(None);
        }

        Ok(Some(self.responses.build_metadata_list(&stored_files)))
    }

    pub async fn get_paginated(&self, page: i64, page_size: i64) -> ServiceResult<Vec<MetaDataResponse>> {
        if page < 0 || page_size <= 0 {
            return Err(FailureKind::InvalidPage.into());
        }

        let stored_files = self.files.get_paginated(page, page_size).await?;
        Ok(self.responses.build_metadata_list(&stored_files))
    }
}
