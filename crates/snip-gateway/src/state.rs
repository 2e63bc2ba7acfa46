use std::sync::Arc;

use snip_core::{ShortCode, Shortener};
use snip_deleter::Deleter;

use crate::subnet::TrustedSubnet;

/// Everything the handlers need, built once in `main`.
#[derive(Clone)]
pub struct AppState {
    shortener: Arc<dyn Shortener>,
    deleter: Arc<dyn Deleter>,
    base_url: String,
    trusted_subnet: Option<TrustedSubnet>,
}

impl AppState {
    pub fn new(
        shortener: Arc<dyn Shortener>,
        deleter: Arc<dyn Deleter>,
        public_base_url: impl Into<String>,
    ) -> Self {
        let base_url = public_base_url.into().trim_end_matches('/').to_string();
        Self {
            shortener,
            deleter,
            base_url,
            trusted_subnet: None,
        }
    }

    /// Restricts the internal endpoints to clients inside `subnet`.
    pub fn with_trusted_subnet(mut self, subnet: Option<TrustedSubnet>) -> Self {
        self.trusted_subnet = subnet;
        self
    }

    pub fn shortener(&self) -> &dyn Shortener {
        self.shortener.as_ref()
    }

    pub fn deleter(&self) -> Arc<dyn Deleter> {
        Arc::clone(&self.deleter)
    }

    pub fn trusted_subnet(&self) -> Option<&TrustedSubnet> {
        self.trusted_subnet.as_ref()
    }

    pub fn short_url(&self, code: &ShortCode) -> String {
        code.to_url(&self.base_url)
    }
}
