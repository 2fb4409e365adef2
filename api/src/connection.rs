// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The connection descriptor and the request carrying it

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::context::ConnectionContext;
use crate::mechanism::Mechanism;

/// One hop of the path a connection takes
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathSegment {
    pub name: String,
    pub id: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub metrics: BTreeMap<String, String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Path {
    /// Index of the segment of the element handling the connection
    pub index: usize,
    pub path_segments: Vec<PathSegment>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Connection {
    pub id: String,
    pub network_service: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mechanism: Option<Mechanism>,
    pub context: ConnectionContext,
    pub path: Path,
}

impl Connection {
    #[must_use]
    pub fn new(id: impl Into<String>, network_service: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            network_service: network_service.into(),
            ..Default::default()
        }
    }

    /// The path segment of the current hop, if the path has one at its index
    #[must_use]
    pub fn current_segment(&self) -> Option<&PathSegment> {
        self.path.path_segments.get(self.path.index)
    }

    pub fn current_segment_mut(&mut self) -> Option<&mut PathSegment> {
        self.path.path_segments.get_mut(self.path.index)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkServiceRequest {
    pub connection: Connection,
    /// Mechanisms acceptable to the requester, most preferred first
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub mechanism_preferences: Vec<Mechanism>,
}

impl NetworkServiceRequest {
    #[must_use]
    pub fn new(connection: Connection) -> Self {
        Self {
            connection,
            mechanism_preferences: vec![],
        }
    }
}

#[cfg(test)]
mod test {
    use super::{Connection, NetworkServiceRequest, PathSegment};
    use crate::mechanism::{Mechanism, MechanismClass, MechanismType};
    use pretty_assertions::assert_eq;

    #[test]
    fn current_segment() {
        let mut conn = Connection::new("c1", "ns");
        assert!(conn.current_segment().is_none());
        conn.path.path_segments.push(PathSegment::default());
        conn.path.path_segments.push(PathSegment {
            name: "forwarder".to_owned(),
            ..Default::default()
        });
        conn.path.index = 1;
        conn.current_segment_mut()
            .unwrap()
            .metrics
            .insert("tx_bytes".to_owned(), "6".to_owned());
        assert_eq!(conn.current_segment().unwrap().name, "forwarder");
        assert!(conn.path.path_segments[0].metrics.is_empty());
    }

    #[test]
    fn request_from_yaml() {
        let yaml = r"
connection:
  id: conn-1
  network_service: icmp-responder
  context:
    ip:
      src_ip_addr: 10.0.0.1/30
      dst_ip_addr: 10.0.0.2/30
mechanism_preferences:
  - cls: local
    kind: kernel
    parameters:
      netnsURL: file:///proc/1/ns/net
";
        let req: NetworkServiceRequest = serde_yaml_ng::from_str(yaml).unwrap();
        assert_eq!(req.connection.id, "conn-1");
        assert_eq!(req.connection.context.ip.dst_ip_addr, "10.0.0.2/30");
        assert_eq!(
            req.mechanism_preferences,
            vec![
                Mechanism::new(MechanismClass::Local, MechanismType::Kernel)
                    .with_parameter("netnsURL", "file:///proc/1/ns/net")
            ]
        );
    }
}
