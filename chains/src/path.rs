// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

use api::{Connection, NetworkServiceRequest, Path, PathSegment};
use async_trait::async_trait;
use pipeline::{CallScope, ChainElement, ChainError, Next};
use tracing::trace;

/// Makes the segment at the path index the one of this forwarder, so elements down the chain
/// have a segment to report on. The index of the requester is given back in the reply.
pub struct UpdatePath {
    name: String,
}

impl UpdatePath {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    fn segment(&self, conn_id: &str) -> PathSegment {
        PathSegment {
            name: self.name.clone(),
            id: conn_id.to_owned(),
            ..PathSegment::default()
        }
    }

    // Move to our segment, adding it after the one of the requester if it is not there yet.
    // Returns the index to restore.
    fn update(&self, conn_id: &str, path: &mut Path) -> usize {
        let previous = path.index;
        if path.path_segments.is_empty() {
            path.path_segments.push(self.segment(conn_id));
            path.index = 0;
            return previous;
        }
        if path
            .path_segments
            .get(path.index)
            .is_some_and(|s| s.name == self.name)
        {
            return previous;
        }
        let index = (path.index + 1).min(path.path_segments.len());
        if path
            .path_segments
            .get(index)
            .is_none_or(|s| s.name != self.name)
        {
            path.path_segments.truncate(index);
            path.path_segments.push(self.segment(conn_id));
        }
        path.index = index;
        trace!("{conn_id}: {} at path index {index}", self.name);
        previous
    }
}

#[async_trait]
impl ChainElement for UpdatePath {
    async fn request(
        &self,
        scope: &mut CallScope,
        mut request: NetworkServiceRequest,
        next: Next<'_>,
    ) -> Result<Connection, ChainError> {
        let conn_id = request.connection.id.clone();
        let previous = self.update(&conn_id, &mut request.connection.path);
        let mut conn = next.request(scope, request).await?;
        conn.path.index = previous;
        Ok(conn)
    }

    async fn close(
        &self,
        scope: &mut CallScope,
        conn: &Connection,
        next: Next<'_>,
    ) -> Result<(), ChainError> {
        let mut conn = conn.clone();
        self.update(&conn.id, &mut conn.path);
        next.close(scope, &conn).await
    }
}

#[cfg(test)]
mod test {
    use api::{Connection, NetworkServiceRequest, Path, PathSegment};
    use pipeline::{CallScope, Chain};
    use pretty_assertions::assert_eq;

    use super::UpdatePath;

    fn segment(name: &str) -> PathSegment {
        PathSegment {
            name: name.to_owned(),
            id: "c1".to_owned(),
            ..PathSegment::default()
        }
    }

    fn names(path: &Path) -> Vec<&str> {
        path.path_segments.iter().map(|s| s.name.as_str()).collect()
    }

    #[test]
    fn segment_placement() {
        let update = UpdatePath::new("fwd");

        let mut path = Path::default();
        assert_eq!(update.update("c1", &mut path), 0);
        assert_eq!((path.index, names(&path)), (0, vec!["fwd"]));

        // the requester is at the index
        let mut path = Path {
            index: 0,
            path_segments: vec![segment("nsc")],
        };
        assert_eq!(update.update("c1", &mut path), 0);
        assert_eq!((path.index, names(&path)), (1, vec!["nsc", "fwd"]));

        // already there from a previous request
        let mut path = Path {
            index: 0,
            path_segments: vec![segment("nsc"), segment("fwd"), segment("nse")],
        };
        update.update("c1", &mut path);
        assert_eq!((path.index, names(&path)), (1, vec!["nsc", "fwd", "nse"]));

        // stale hops after the requester are dropped
        let mut path = Path {
            index: 0,
            path_segments: vec![segment("nsc"), segment("other")],
        };
        update.update("c1", &mut path);
        assert_eq!((path.index, names(&path)), (1, vec!["nsc", "fwd"]));

        // we are the current hop
        let mut path = Path {
            index: 1,
            path_segments: vec![segment("nsc"), segment("fwd")],
        };
        assert_eq!(update.update("c1", &mut path), 1);
        assert_eq!(path.index, 1);
    }

    #[tokio::test]
    async fn requester_index_comes_back() {
        let mut conn = Connection::new("c1", "ns");
        conn.path.path_segments.push(segment("nsc"));
        let chain = Chain::new().add_stage(UpdatePath::new("fwd"));
        let conn = chain
            .run_request(&mut CallScope::new(), NetworkServiceRequest::new(conn))
            .await
            .unwrap();
        assert_eq!(conn.path.index, 0);
        assert_eq!(names(&conn.path), vec!["nsc", "fwd"]);
        assert_eq!(conn.path.path_segments[1].id, "c1");
    }
}
