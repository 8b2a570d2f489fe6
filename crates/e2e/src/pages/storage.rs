//! Storage browser and its settings dialog

use async_trait::async_trait;
use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use tracing::info;

use crate::error::E2eResult;
use crate::files::TempUpload;
use crate::locator::{Condition, Locator};
use crate::within::{perform_within, Nested};

use super::{LibraryPage, Page, PageCtx, DIALOG, DIALOG_OK};

pub const STORAGE_BROWSER: Locator = Locator::id("storage-browser");
pub const TITLE: Locator = Locator::id("storage-title");
pub const UPLOAD_INPUT: Locator = Locator::id("storage-upload-input");
pub const RENAME_INPUT: Locator = Locator::id("rename-input");
pub const REFRESH: Locator = Locator::id("storage-refresh");
pub const SETTINGS: Locator = Locator::id("storage-settings");
pub const DESCRIPTION: Locator = Locator::id("storage-description");
pub const DELETE: Locator = Locator::id("storage-delete");
pub const DELETE_CONFIRM: Locator = Locator::id("storage-delete-confirm");
pub const DIALOG_CLOSE: Locator = Locator::id("dialog-close");

pub fn file(name: &str) -> Locator {
    Locator::keyed("storage-file", name)
}

pub fn file_rename(name: &str) -> Locator {
    Locator::keyed("file-rename", name)
}

pub fn file_delete(name: &str) -> Locator {
    Locator::keyed("file-delete", name)
}

pub struct StoragePage<'s> {
    ctx: PageCtx<'s>,
}

super::page!(StoragePage, "storage", STORAGE_BROWSER);

impl<'s> StoragePage<'s> {
    pub async fn title(&self) -> E2eResult<String> {
        Ok(self.session()?.text_of(&TITLE).await?.trim().to_string())
    }

    pub async fn ensure_title(&self, name: &str) -> E2eResult<()> {
        self.expect()?
            .ensure(&TITLE, &[Condition::HasText(name.to_string())])
            .await?;
        Ok(())
    }

    /// Upload a local file and wait for it to be listed
    pub async fn upload(self, path: &Path) -> E2eResult<Self> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        info!("Uploading {}", name);
        self.session()?.upload(&UPLOAD_INPUT, path).await?;
        self.ensure_file_listed(&name).await?;
        Ok(self)
    }

    /// Upload `contents` under `file_name` through a temporary file
    pub async fn upload_contents(self, file_name: &str, contents: &[u8]) -> E2eResult<Self> {
        let upload = TempUpload::new(file_name, contents)?;
        self.upload(upload.path()).await
    }

    pub async fn rename_file(self, from: &str, to: &str) -> E2eResult<Self> {
        info!("Renaming {} to {}", from, to);
        let session = self.session()?;
        session.click(&file_rename(from)).await?;
        session.type_into(&RENAME_INPUT, to).await?;
        super::confirm_dialog(session).await?;
        self.ensure_file_listed(to).await?;
        Ok(self)
    }

    pub async fn delete_file(self, name: &str) -> E2eResult<Self> {
        info!("Deleting file {}", name);
        let session = self.session()?;
        session.click(&file_delete(name)).await?;
        super::confirm_dialog(session).await?;
        self.ensure_file_absent(name).await?;
        Ok(self)
    }

    pub async fn refresh(self) -> E2eResult<Self> {
        self.session()?.click(&REFRESH).await?;
        self.ctx.arrive().await
    }

    /// Immediate check, no waiting
    pub async fn has_file(&self, name: &str) -> E2eResult<bool> {
        self.session()?.is_displayed(&file(name)).await
    }

    pub async fn ensure_file_listed(&self, name: &str) -> E2eResult<()> {
        self.expect()?.ensure(&file(name), &[Condition::Visible]).await?;
        Ok(())
    }

    pub async fn ensure_file_absent(&self, name: &str) -> E2eResult<()> {
        self.expect()?.ensure(&file(name), &[Condition::Absent]).await?;
        Ok(())
    }

    pub async fn set_description(self, description: &str) -> E2eResult<Self> {
        let description = description.to_string();
        perform_within(&self, |settings: StorageSettings<'s>| async move {
            settings.set_description(&description).await?.save().await
        })
        .await?;
        Ok(self)
    }

    /// Delete the whole storage through its settings dialog
    pub async fn delete(self) -> E2eResult<LibraryPage<'s>> {
        let name = self.title().await?;
        info!("Deleting storage {}", name);
        let within: Pin<Box<dyn Future<Output = E2eResult<_>> + Send + '_>> =
            Box::pin(perform_within(&self, |settings: StorageSettings<'s>| async move {
                settings.delete_storage().await
            }));
        within.await?;
        let library: LibraryPage<'s> = self.ctx.arrive().await?;
        library.ensure_absent(&name).await?;
        Ok(library)
    }
}

/// Settings dialog opened on top of a [`StoragePage`]
pub struct StorageSettings<'s> {
    ctx: PageCtx<'s>,
}

super::page!(StorageSettings, "storage settings", DIALOG);

impl<'s> StorageSettings<'s> {
    pub async fn set_description(self, description: &str) -> E2eResult<Self> {
        self.session()?.type_into(&DESCRIPTION, description).await?;
        Ok(self)
    }

    pub async fn save(self) -> E2eResult<()> {
        super::confirm_dialog(self.session()?).await
    }

    pub async fn delete_storage(self) -> E2eResult<()> {
        let session = self.session()?;
        session.click(&DELETE).await?;
        session.click(&DELETE_CONFIRM).await?;
        session.expect().ensure(&DIALOG, &[Condition::Hidden]).await?;
        Ok(())
    }
}

#[async_trait]
impl<'s> Nested<StoragePage<'s>> for StorageSettings<'s> {
    type Origin = ();

    async fn enter(parent: &StoragePage<'s>) -> E2eResult<(Self, ())> {
        parent.session()?.click(&SETTINGS).await?;
        Ok((parent.ctx.arrive().await?, ()))
    }

    async fn leave(parent: &StoragePage<'s>, _origin: ()) -> E2eResult<()> {
        let session = parent.session()?;
        if session.is_displayed(&DIALOG).await? {
            let close = if session.is_displayed(&DIALOG_CLOSE).await? {
                DIALOG_CLOSE
            } else {
                DIALOG_OK
            };
            session.click(&close).await?;
            session.expect().ensure(&DIALOG, &[Condition::Hidden]).await?;
        }
        Ok(())
    }
}
