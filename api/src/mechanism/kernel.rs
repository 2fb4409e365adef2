// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

use super::{Mechanism, MechanismError};
use crate::connection::Connection;
use crate::url::FileUrl;
use crate::{LINUX_IF_MAX_LENGTH, linux_ifname, truncate};

/// Kernel interface in a network namespace
#[derive(Clone, Copy, Debug)]
pub struct KernelMechanism<'a>(pub(super) &'a Mechanism);

impl KernelMechanism<'_> {
    pub const NETNS_URL: &'static str = "netnsURL";
    pub const INTERFACE_NAME: &'static str = "name";

    /// The namespace the interface goes in, as a `file://` URL
    pub fn netns_url(&self) -> Result<FileUrl, MechanismError> {
        self.0.file_url(Self::NETNS_URL)
    }

    /// Name of the interface in the client namespace: the requested one if any, else one
    /// derived from the network service and the connection id.
    #[must_use]
    pub fn interface_name(&self, conn: &Connection) -> String {
        if let Some(name) = self.0.parameter(Self::INTERFACE_NAME)
            && !name.is_empty()
        {
            return linux_ifname(name);
        }
        // leave room for "-" and a few chars of the id
        let ns = truncate(&conn.network_service, LINUX_IF_MAX_LENGTH - 5);
        linux_ifname(&format!("{ns}-{}", conn.id))
    }
}
