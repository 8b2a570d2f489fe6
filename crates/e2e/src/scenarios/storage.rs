use async_trait::async_trait;
use tracing::info;

use pagewalk_common::ResourceKind;

use crate::error::E2eResult;
use crate::pages::StoragePage;
use crate::runner::{CaseInfo, ScenarioClass, ScenarioContext};

use super::{identity, remembered, start_as, unknown_case};

const CONTENTS: &[u8] = b"pagewalk storage lifecycle\n";

/// Create a storage, upload, rename and delete a file, then delete the storage
#[derive(Debug, Default)]
pub struct StorageLifecycle {
    storage: Option<String>,
    file: Option<String>,
    renamed: Option<String>,
}

impl StorageLifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    async fn open<'s>(&self, ctx: &ScenarioContext<'s>) -> E2eResult<StoragePage<'s>> {
        let name = remembered(&self.storage, "open storage")?;
        ctx.session().home()?.library().await?.open_storage(name).await
    }
}

#[async_trait]
impl ScenarioClass for StorageLifecycle {
    fn name(&self) -> &str {
        "StorageLifecycle"
    }

    fn cases(&self) -> Vec<CaseInfo> {
        vec![
            CaseInfo::new("create_storage"),
            CaseInfo::new("upload_file").priority(1).after("create_storage"),
            CaseInfo::new("rename_file").priority(2).after("upload_file"),
            CaseInfo::new("delete_file").priority(3).after("rename_file"),
            CaseInfo::new("delete_storage").priority(4).after("create_storage"),
        ]
    }

    async fn setup(&mut self, ctx: &ScenarioContext<'_>) -> E2eResult<()> {
        let admin = identity(ctx.session(), "admin")?;
        start_as(ctx.session(), &admin).await?;

        let fixture = ctx.fixture();
        self.storage = Some(fixture.claim(ResourceKind::Storage)?.name);
        self.file = Some(format!("{}.txt", fixture.unique_name("file")?));
        self.renamed = Some(format!("{}.txt", fixture.unique_name("renamed")?));
        Ok(())
    }

    async fn run_case(&mut self, case: &str, ctx: &ScenarioContext<'_>) -> E2eResult<()> {
        match case {
            "create_storage" => {
                let name = remembered(&self.storage, case)?;
                let storage = ctx.session().home()?.library().await?.create_storage(name).await?;
                info!("Storage {} is open", storage.title().await?);
            }
            "upload_file" => {
                let file = remembered(&self.file, case)?;
                self.open(ctx).await?.upload_contents(file, CONTENTS).await?;
            }
            "rename_file" => {
                let from = remembered(&self.file, case)?;
                let to = remembered(&self.renamed, case)?;
                let storage = self.open(ctx).await?.rename_file(from, to).await?;
                storage.ensure_file_absent(from).await?;
            }
            "delete_file" => {
                let file = remembered(&self.renamed, case)?;
                let storage = self.open(ctx).await?.delete_file(file).await?.refresh().await?;
                storage.ensure_file_absent(file).await?;
            }
            "delete_storage" => {
                self.open(ctx).await?.delete().await?;
            }
            other => return Err(unknown_case(self.name(), other)),
        }
        Ok(())
    }
}
