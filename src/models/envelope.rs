use serde::{Deserialize, Serialize};
use crate::error::{ApiError, Result};

/// Wrapper every REST response from the backend is expected to follow.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiEnvelope<T> {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: String,
    pub data: Option<T>,
    #[serde(default)]
    pub meta: Option<PageMeta>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct PageMeta {
    #[serde(default)]
    pub current_page: u32,
    #[serde(default)]
    pub limit: u32,
    #[serde(default)]
    pub total_count: u64,
    #[serde(default)]
    pub total_pages: u32,
}

impl PageMeta {
    pub fn has_more(&self) -> bool {
        self.current_page < self.total_pages
    }
}

impl<T> ApiEnvelope<T> {
    /// Fails with the server message when `success` is false; missing `data`
    /// is an application error too.
    pub fn into_data(self) -> Result<T> {
        if !self.success {
            return Err(ApiError::Application(self.failure_message()));
        }
        self.data
            .ok_or_else(|| ApiError::Application("Response contained no data".to_string()))
    }

    /// Only checks `success`; whatever `data` holds is discarded.
    pub fn ensure_success(self) -> Result<()> {
        if !self.success {
            return Err(ApiError::Application(self.failure_message()));
        }
        Ok(())
    }

    fn failure_message(&self) -> String {
        if self.message.is_empty() {
            "Request was not successful".to_string()
        } else {
            self.message.clone()
        }
    }
}

impl<T: Default> ApiEnvelope<T> {
    /// Like [`into_data`](Self::into_data) but tolerates a missing `data`
    /// field by falling back to `T::default()`.
    pub fn into_data_or_default(self) -> Result<T> {
        if !self.success {
            return Err(ApiError::Application(self.failure_message()));
        }
        Ok(self.data.unwrap_or_default())
    }

    /// Same as [`into_data_or_default`](Self::into_data_or_default), keeping
    /// pagination metadata alongside.
    pub fn into_page(self) -> Result<(T, Option<PageMeta>)> {
        let meta = self.meta;
        Ok((self.into_data_or_default()?, meta))
    }
}
