use crate::context::RequestContext;

/// `point` for layers describing a single location, `centroid` for areas.
pub fn set_accuracy(ctx: &mut RequestContext) {
    for record in &mut ctx.data {
        if record.accuracy.is_none() {
            let accuracy = match record.layer.as_str() {
                "venue" | "address" | "street" => "point",
                _ => "centroid",
            };
            record.accuracy = Some(accuracy.to_string());
        }
    }
}
