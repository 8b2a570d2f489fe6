//! Data library: storages and folders

use tracing::info;

use crate::error::E2eResult;
use crate::locator::{Condition, Locator};

use super::{confirm_dialog, Page, PageCtx, StoragePage};

pub const LIBRARY_TREE: Locator = Locator::id("library-tree");
pub const CREATE: Locator = Locator::id("library-create");
pub const CREATE_STORAGE: Locator = Locator::id("create-storage");
pub const CREATE_FOLDER: Locator = Locator::id("create-folder");
pub const NAME_INPUT: Locator = Locator::id("create-name-input");

pub fn item(name: &str) -> Locator {
    Locator::keyed("library-item", name)
}

pub fn item_delete(name: &str) -> Locator {
    Locator::keyed("library-item-delete", name)
}

#[derive(Debug)]
pub struct LibraryPage<'s> {
    ctx: PageCtx<'s>,
}

super::page!(LibraryPage, "library", LIBRARY_TREE);

impl<'s> LibraryPage<'s> {
    async fn create(self, kind: &Locator, name: &str) -> E2eResult<Self> {
        let session = self.session()?;
        session.click(&CREATE).await?;
        session.click(kind).await?;
        session.type_into(&NAME_INPUT, name).await?;
        confirm_dialog(session).await?;
        self.ensure_listed(name).await?;
        Ok(self)
    }

    /// Create a storage and open it
    pub async fn create_storage(self, name: &str) -> E2eResult<StoragePage<'s>> {
        info!("Creating storage {}", name);
        self.create(&CREATE_STORAGE, name).await?.open_storage(name).await
    }

    pub async fn create_folder(self, name: &str) -> E2eResult<Self> {
        info!("Creating folder {}", name);
        self.create(&CREATE_FOLDER, name).await
    }

    pub async fn open_storage(self, name: &str) -> E2eResult<StoragePage<'s>> {
        self.session()?.click(&item(name)).await?;
        let storage: StoragePage<'s> = self.ctx.arrive().await?;
        storage.ensure_title(name).await?;
        Ok(storage)
    }

    /// Delete a folder (or any item with an inline delete control)
    pub async fn delete_item(self, name: &str) -> E2eResult<Self> {
        info!("Deleting library item {}", name);
        let session = self.session()?;
        session.click(&item_delete(name)).await?;
        confirm_dialog(session).await?;
        self.ensure_absent(name).await?;
        Ok(self)
    }

    /// Immediate check, no waiting
    pub async fn has_item(&self, name: &str) -> E2eResult<bool> {
        self.session()?.is_displayed(&item(name)).await
    }

    pub async fn ensure_listed(&self, name: &str) -> E2eResult<()> {
        self.expect()?.ensure(&item(name), &[Condition::Visible]).await?;
        Ok(())
    }

    pub async fn ensure_absent(&self, name: &str) -> E2eResult<()> {
        self.expect()?.ensure(&item(name), &[Condition::Absent]).await?;
        Ok(())
    }
}
