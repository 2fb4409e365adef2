// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! `file://` URLs, used by mechanisms to designate namespaces and socket files

use std::fmt::Display;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UrlError {
    #[error("'{0}' is not a URL")]
    NotAUrl(String),
    #[error("URL scheme must be 'file': '{0}'")]
    Scheme(String),
    #[error("URL '{0}' has no path")]
    NoPath(String),
}

/// A `file://[host]/path` URL. Only the path is kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileUrl {
    path: String,
}

impl FileUrl {
    pub fn parse(url: &str) -> Result<Self, UrlError> {
        let (scheme, rest) = url
            .split_once("://")
            .ok_or_else(|| UrlError::NotAUrl(url.to_owned()))?;
        if !scheme.eq_ignore_ascii_case("file") {
            return Err(UrlError::Scheme(url.to_owned()));
        }
        // skip the authority, if any
        let path = rest
            .find('/')
            .map(|start| &rest[start..])
            .ok_or_else(|| UrlError::NoPath(url.to_owned()))?;
        // query and fragment are meaningless here
        let path = path.split(['?', '#']).next().unwrap_or_default();
        Ok(Self {
            path: path.to_owned(),
        })
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }
}

impl Display for FileUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "file://{}", self.path)
    }
}
