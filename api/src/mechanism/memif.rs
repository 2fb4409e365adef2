// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

use super::{Mechanism, MechanismError};
use crate::url::FileUrl;

/// Shared memory interface over a unix socket
#[derive(Clone, Copy, Debug)]
pub struct MemifMechanism<'a>(pub(super) &'a Mechanism);

impl<'a> MemifMechanism<'a> {
    pub const SOCKET_FILENAME: &'static str = "socketfile";
    pub const SOCKET_FILE_URL: &'static str = "socketfileURL";

    /// Name of the socket file, relative to the directory the endpoint serves sockets from
    pub fn socket_filename(&self) -> Result<&'a str, MechanismError> {
        let name = self.0.required(Self::SOCKET_FILENAME)?;
        if name.split('/').any(|c| c == "..") {
            return Err(self
                .0
                .invalid(Self::SOCKET_FILENAME, name, "must not leave the socket directory"));
        }
        Ok(name)
    }

    /// Where the peer serves the socket, as a `file://` URL
    pub fn socket_file_url(&self) -> Result<FileUrl, MechanismError> {
        self.0.file_url(Self::SOCKET_FILE_URL)
    }
}
