use async_trait::async_trait;
use snip_core::{
    BatchRequest, BatchResponse, NewUrl, Repository, Resolution, ShortCode, Shortened, Shortener,
    ShortenerError, Stats, StorageError, UserId, UserUrl,
};
use snip_generator::Generator;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

type Result<T> = std::result::Result<T, ShortenerError>;

/// How many generated codes are tried before giving up on a request.
pub const MAX_GENERATION_ATTEMPTS: usize = 8;

/// A concrete implementation of the `Shortener` trait.
///
/// Generated codes are checked against the repository and regenerated on
/// collision. Shortening a URL that is already stored returns the existing
/// code with `created == false`.
#[derive(Debug)]
pub struct ShortenerService<R, G> {
    repository: Arc<R>,
    generator: Arc<G>,
}

impl<R, G> Clone for ShortenerService<R, G> {
    fn clone(&self) -> Self {
        Self {
            repository: Arc::clone(&self.repository),
            generator: Arc::clone(&self.generator),
        }
    }
}

impl<R: Repository, G: Generator> ShortenerService<R, G> {
    pub fn new(repository: R, generator: G) -> Self {
        Self {
            repository: Arc::new(repository),
            generator: Arc::new(generator),
        }
    }

    /// Validates that the URL is an http(s) URL with a host.
    fn validate_url(url: &str) -> Result<()> {
        if url.is_empty() {
            return Err(ShortenerError::InvalidUrl(
                "URL cannot be empty".to_string(),
            ));
        }

        let Some((scheme, rest)) = url.split_once("://") else {
            return Err(ShortenerError::InvalidUrl(format!(
                "URL must have a scheme and host: {url}"
            )));
        };

        if !scheme.eq_ignore_ascii_case("http") && !scheme.eq_ignore_ascii_case("https") {
            return Err(ShortenerError::InvalidUrl(format!(
                "URL scheme must be http or https: {scheme}"
            )));
        }

        let host = rest.split(['/', '?', '#']).next().unwrap_or_default();
        if host.is_empty() || host.chars().any(char::is_whitespace) {
            return Err(ShortenerError::InvalidUrl(format!(
                "URL must have a valid host: {url}"
            )));
        }

        Ok(())
    }

    /// Draws codes until one is unknown to the repository and not in `taken`.
    async fn free_code(&self, taken: &HashSet<ShortCode>) -> Result<ShortCode> {
        for _ in 0..MAX_GENERATION_ATTEMPTS {
            let code = self.generator.generate();
            if taken.contains(&code) || self.repository.exists(&code).await? {
                debug!(code = %code, "generated code already taken");
                continue;
            }
            return Ok(code);
        }

        warn!(
            attempts = MAX_GENERATION_ATTEMPTS,
            "no free short code found"
        );
        Err(ShortenerError::GenerationExhausted(MAX_GENERATION_ATTEMPTS))
    }
}

#[async_trait]
impl<R: Repository, G: Generator> Shortener for ShortenerService<R, G> {
    async fn shorten(&self, user: &UserId, original_url: &str) -> Result<Shortened> {
        Self::validate_url(original_url)?;

        let code = self.free_code(&HashSet::new()).await?;

        match self
            .repository
            .insert(&code, original_url, Some(user))
            .await
        {
            Ok(()) => {
                debug!(code = %code, user = %user, "shortened url");
                Ok(Shortened {
                    code,
                    created: true,
                })
            }
            Err(StorageError::UrlConflict(existing)) => {
                debug!(code = %existing, "url already shortened");
                Ok(Shortened {
                    code: ShortCode::new_unchecked(existing),
                    created: false,
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn shorten_batch(
        &self,
        user: &UserId,
        requests: Vec<BatchRequest>,
    ) -> Result<Vec<BatchResponse>> {
        if requests.is_empty() {
            return Ok(Vec::new());
        }

        for request in &requests {
            Self::validate_url(&request.original_url)?;
        }

        let mut taken = HashSet::with_capacity(requests.len());
        let mut urls = Vec::with_capacity(requests.len());
        for request in &requests {
            let code = self.free_code(&taken).await?;
            taken.insert(code.clone());
            urls.push(NewUrl {
                code,
                original_url: request.original_url.clone(),
            });
        }

        self.repository.insert_batch(Some(user), &urls).await?;
        debug!(user = %user, count = urls.len(), "shortened url batch");

        Ok(requests
            .into_iter()
            .zip(urls)
            .map(|(request, url)| BatchResponse {
                correlation_id: request.correlation_id,
                code: url.code,
            })
            .collect())
    }

    async fn resolve(&self, code: &ShortCode) -> Result<Resolution> {
        let resolution = match self.repository.get(code).await? {
            None => Resolution::Missing,
            Some(record) if record.deleted => Resolution::Deleted,
            Some(record) => Resolution::Found(record.original_url),
        };
        Ok(resolution)
    }

    async fn user_urls(&self, user: &UserId) -> Result<Vec<UserUrl>> {
        Ok(self.repository.urls_owned_by(user).await?)
    }

    async fn stats(&self) -> Result<Stats> {
        Ok(self.repository.stats().await?)
    }
}
