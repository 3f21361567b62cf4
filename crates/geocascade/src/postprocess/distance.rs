use tracing::debug;

use crate::context::RequestContext;

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

/// Great-circle distance in kilometres from `focus.point`, or `point` for reverse queries.
pub fn compute_distances(ctx: &mut RequestContext) {
    let Some(origin) = ctx.clean.focus_point.or(ctx.clean.point) else {
        return;
    };
    for record in &mut ctx.data {
        if let Some(centroid) = record.center_point {
            record.distance = Some(round3(origin.haversine_km(&centroid)));
        }
    }
    debug!(results = ctx.data.len(), "Computed distances");
}

#[cfg(test)]
mod tests {
    use geocascade_services::MatchRecord;

    use super::*;
    use crate::context::Clean;

    #[test]
    fn test_distances_from_point() {
        let mut ctx = RequestContext::new(Clean::new(10).with_point(51.5, -0.12));
        ctx.data = vec![
            MatchRecord::new("osm", "venue", "1").with_centroid(51.5, -0.12),
            MatchRecord::new("osm", "venue", "2").with_centroid(51.6, -0.12),
            MatchRecord::new("osm", "venue", "3"),
        ];

        compute_distances(&mut ctx);

        assert_eq!(ctx.data[0].distance, Some(0.0));
        let d = ctx.data[1].distance.unwrap();
        assert!((d - 11.119).abs() < 0.01, "got {d}");
        assert_eq!(ctx.data[2].distance, None);
    }

    #[test]
    fn test_no_origin_no_distance() {
        let mut ctx = RequestContext::new(Clean::new(10));
        ctx.data = vec![MatchRecord::new("osm", "venue", "1").with_centroid(1.0, 1.0)];
        compute_distances(&mut ctx);
        assert_eq!(ctx.data[0].distance, None);
    }
}
