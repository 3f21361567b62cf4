use geocascade_services::{BoundingBox, BoundingBoxField};
use tracing::warn;

use crate::context::RequestContext;

/// Decode JSON encoded bounding boxes. Undecodable ones are dropped from that record only.
pub fn parse_bounding_boxes(ctx: &mut RequestContext) {
    for record in &mut ctx.data {
        let Some(BoundingBoxField::Encoded(encoded)) = &record.bounding_box else {
            continue;
        };
        match serde_json::from_str::<BoundingBox>(encoded) {
            Ok(bbox) => record.bounding_box = Some(BoundingBoxField::Parsed(bbox)),
            Err(e) => {
                warn!(gid = %record.gid, error = %e, "Could not decode bounding box");
                record.bounding_box = None;
            }
        }
    }
}
