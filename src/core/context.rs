//! Mutable state threaded through the build and deploy pipelines.
//!
//! Every field is write-once: exactly one step produces it and later steps
//! only read it. Writing twice, or reading before the producer ran, is an
//! internal error rather than a silent overwrite.

use crate::aws::SessionCredentials;
use crate::error::{Error, Result};
use crate::version::DerivedVersion;

#[derive(Debug, Default)]
pub struct StepContext {
    credentials: Option<SessionCredentials>,
    account_id: Option<String>,
    image_tag: Option<String>,
    version: Option<DerivedVersion>,
}

fn set_once<T>(slot: &mut Option<T>, value: T, field: &str) -> Result<()> {
    if slot.is_some() {
        return Err(Error::internal_unexpected(format!(
            "Step context field '{}' was already set",
            field
        )));
    }
    *slot = Some(value);
    Ok(())
}

fn require<'a, T>(slot: &'a Option<T>, field: &str) -> Result<&'a T> {
    slot.as_ref().ok_or_else(|| {
        Error::internal_unexpected(format!(
            "Step context field '{}' read before it was produced",
            field
        ))
    })
}

impl StepContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Context for a run whose tag was given on the command line.
    pub fn with_image_tag(tag: impl Into<String>) -> Self {
        Self {
            image_tag: Some(tag.into()),
            ..Self::default()
        }
    }

    pub fn set_credentials(&mut self, credentials: SessionCredentials) -> Result<()> {
        set_once(&mut self.credentials, credentials, "credentials")
    }

    pub fn credentials(&self) -> Result<&SessionCredentials> {
        require(&self.credentials, "credentials")
    }

    pub fn set_account_id(&mut self, account_id: impl Into<String>) -> Result<()> {
        set_once(&mut self.account_id, account_id.into(), "account_id")
    }

    pub fn account_id(&self) -> Result<&str> {
        require(&self.account_id, "account_id").map(String::as_str)
    }

    pub fn set_image_tag(&mut self, tag: impl Into<String>) -> Result<()> {
        set_once(&mut self.image_tag, tag.into(), "image_tag")
    }

    pub fn image_tag(&self) -> Result<&str> {
        require(&self.image_tag, "image_tag").map(String::as_str)
    }

    /// Store a derived version; its tag becomes the image tag.
    pub fn set_version(&mut self, version: DerivedVersion) -> Result<()> {
        self.set_image_tag(version.tag())?;
        set_once(&mut self.version, version, "version")
    }

    pub fn version(&self) -> Option<&DerivedVersion> {
        self.version.as_ref()
    }
}
