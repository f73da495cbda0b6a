//! Source classification and remote URL validation.
//!
//! Classification is synchronous and performs no I/O, so a rejected URL
//! never reaches the downloader.

use crate::models::SourceImage;
use crate::{Error, Result};
use reqwest::Url;
use std::path::PathBuf;

/// Extensions accepted on a remote URL path and when scanning raw inputs.
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "gif", "avif"];

const DEFAULT_ALLOWED_DOMAINS: &[&str] = &[
    "images.unsplash.com",
    "images.pexels.com",
    "cdn.pixabay.com",
    "res.cloudinary.com",
    "i.imgur.com",
    "upload.wikimedia.org",
    "raw.githubusercontent.com",
    "user-images.githubusercontent.com",
];

/// Hosts that serve images from extension-less paths (query-driven CDNs).
const DEFAULT_IMAGE_SERVICES: &[&str] = &[
    "images.unsplash.com",
    "images.pexels.com",
    "res.cloudinary.com",
];

pub fn has_image_extension(path: &str) -> bool {
    image_extension(path).is_some()
}

/// Lowercased known image extension of a path or URL path, if any.
pub fn image_extension(path: &str) -> Option<String> {
    let file_name = path.rsplit('/').next()?;
    let (_, ext) = file_name.rsplit_once('.')?;
    let ext = ext.to_ascii_lowercase();
    IMAGE_EXTENSIONS.contains(&ext.as_str()).then_some(ext)
}

#[derive(Debug, Clone)]
pub struct AllowList {
    domains: Vec<String>,
    image_services: Vec<String>,
}

impl AllowList {
    pub fn new<S: AsRef<str>>(domains: &[S], image_services: &[S]) -> Self {
        let normalize = |items: &[S]| {
            items
                .iter()
                .map(|d| d.as_ref().trim().to_ascii_lowercase())
                .filter(|d| !d.is_empty())
                .collect::<Vec<_>>()
        };

        Self {
            domains: normalize(domains),
            image_services: normalize(image_services),
        }
    }

    /// Default list plus extra domains (which must still carry an image extension).
    pub fn with_extra_domains<S: AsRef<str>>(mut self, extra: &[S]) -> Self {
        for domain in extra {
            let domain = domain.as_ref().trim().to_ascii_lowercase();
            if !domain.is_empty() && !self.domains.contains(&domain) {
                self.domains.push(domain);
            }
        }
        self
    }

    pub fn allows_host(&self, host: &str) -> bool {
        Self::matches(&self.domains, host)
    }

    pub fn is_image_service(&self, host: &str) -> bool {
        Self::matches(&self.image_services, host)
    }

    // Exact host or any subdomain of a listed domain.
    fn matches(list: &[String], host: &str) -> bool {
        let host = host.trim_end_matches('.').to_ascii_lowercase();
        list.iter().any(|domain| {
            host == *domain
                || host
                    .strip_suffix(domain.as_str())
                    .is_some_and(|prefix| prefix.ends_with('.'))
        })
    }
}

impl Default for AllowList {
    fn default() -> Self {
        Self::new(DEFAULT_ALLOWED_DOMAINS, DEFAULT_IMAGE_SERVICES)
    }
}

#[derive(Debug, Clone, Default)]
pub struct SourceResolver {
    allow_list: AllowList,
}

impl SourceResolver {
    pub fn new(allow_list: AllowList) -> Self {
        Self { allow_list }
    }

    /// Classify a source reference as a local path or a validated remote URL.
    pub fn classify(&self, source_ref: &str) -> Result<SourceImage> {
        let trimmed = source_ref.trim();
        if trimmed.is_empty() {
            return Err(Error::InvalidSource("empty source reference".to_string()));
        }

        match Url::parse(trimmed) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {
                self.validate_remote(&url)?;
                Ok(SourceImage::Remote { url })
            }
            // Single-letter schemes are Windows drive letters, not URLs.
            Ok(url) if url.scheme().len() > 1 && trimmed.contains("://") => Err(
                Error::InvalidSource(format!("unsupported URL scheme '{}'", url.scheme())),
            ),
            _ => Ok(SourceImage::Local {
                path: PathBuf::from(trimmed),
            }),
        }
    }

    fn validate_remote(&self, url: &Url) -> Result<()> {
        let host = url
            .host_str()
            .ok_or_else(|| Error::InvalidSource(format!("URL has no host: {}", url)))?;

        if !self.allow_list.allows_host(host) {
            return Err(Error::InvalidSource(format!(
                "domain '{}' is not in the image allow-list",
                host
            )));
        }

        if has_image_extension(url.path()) || self.allow_list.is_image_service(host) {
            Ok(())
        } else {
            Err(Error::InvalidSource(format!(
                "URL does not point to a known image type: {}",
                url
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_path_classification() {
        let resolver = SourceResolver::default();
        let source = resolver.classify("images/raw/p1/portada.jpg").unwrap();
        assert_eq!(
            source,
            SourceImage::Local {
                path: PathBuf::from("images/raw/p1/portada.jpg")
            }
        );
    }

    #[test]
    fn test_image_service_without_extension_is_accepted() {
        let resolver = SourceResolver::default();
        let source = resolver
            .classify("https://images.unsplash.com/photo-x?w=800")
            .unwrap();
        assert!(source.is_remote());
    }

    #[test]
    fn test_allowed_domain_requires_image_extension() {
        let resolver = SourceResolver::default();
        assert!(resolver
            .classify("https://i.imgur.com/abc123.PNG")
            .is_ok());

        let err = resolver.classify("https://i.imgur.com/gallery/abc123").unwrap_err();
        assert!(matches!(err, Error::InvalidSource(_)));
    }

    #[test]
    fn test_unlisted_domain_is_rejected() {
        let resolver = SourceResolver::default();
        let err = resolver
            .classify("https://evil.example.com/cat.jpg")
            .unwrap_err();
        assert!(matches!(err, Error::InvalidSource(_)));
        assert!(err.to_string().contains("evil.example.com"));
    }

    #[test]
    fn test_lookalike_domain_is_rejected() {
        let resolver = SourceResolver::default();
        assert!(resolver
            .classify("https://notimages.unsplash.com.evil.io/photo.jpg")
            .is_err());
        assert!(resolver
            .classify("https://fakeimages.unsplash.com/photo.jpg")
            .is_err());
    }

    #[test]
    fn test_subdomain_of_allowed_domain() {
        let resolver = SourceResolver::new(AllowList::new(&["example.com"], &[]));
        assert!(resolver.classify("https://cdn.example.com/a/b.webp").is_ok());
    }

    #[test]
    fn test_extra_domains_extend_the_list() {
        let resolver = SourceResolver::new(AllowList::default().with_extra_domains(&["cdn.test"]));
        assert!(resolver.classify("http://cdn.test/cover.avif").is_ok());
        assert!(resolver.classify("http://cdn.test/cover").is_err());
    }

    #[test]
    fn test_non_http_schemes_are_rejected() {
        let resolver = SourceResolver::default();
        assert!(resolver.classify("ftp://images.unsplash.com/a.jpg").is_err());
        assert!(resolver.classify("").is_err());
    }

    #[test]
    fn test_image_extension_helper() {
        assert_eq!(image_extension("/a/b/photo.JPEG"), Some("jpeg".to_string()));
        assert_eq!(image_extension("/a/b.d/photo"), None);
        assert_eq!(image_extension("/a/b/photo.svg"), None);
    }
}
