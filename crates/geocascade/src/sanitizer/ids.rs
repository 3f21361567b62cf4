use geocascade_services::Gid;
use itertools::Itertools;

/// Parse the place route's comma separated `ids` parameter.
///
/// Malformed entries become errors; duplicates are dropped keeping the first occurrence.
pub fn parse_ids(raw: &str, errors: &mut Vec<String>) -> Vec<Gid> {
    let entries = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>();
    if entries.is_empty() {
        errors.push("invalid param 'ids': must be one or more gids".to_string());
        return Vec::new();
    }

    entries
        .into_iter()
        .filter_map(|entry| match entry.parse::<Gid>() {
            Ok(gid) => Some(gid),
            Err(_) => {
                errors.push(format!(
                    "invalid param 'ids': '{entry}' is not of the form source:layer:id"
                ));
                None
            }
        })
        .unique()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ids() {
        let mut errors = Vec::new();
        let ids = parse_ids(
            "openstreetmap:venue:way/1, whosonfirst:locality:101750367,openstreetmap:venue:way/1",
            &mut errors,
        );
        assert!(errors.is_empty());
        assert_eq!(ids.len(), 2, "duplicates are dropped");
        assert_eq!(ids[0].id, "way/1");
        assert_eq!(ids[1].layer, "locality");
    }

    #[test]
    fn test_malformed_ids_are_errors() {
        let mut errors = Vec::new();
        let ids = parse_ids("whosonfirst:locality,osm:venue:1", &mut errors);
        assert_eq!(ids.len(), 1);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("whosonfirst:locality"));
    }

    #[test]
    fn test_empty_ids() {
        let mut errors = Vec::new();
        assert!(parse_ids(" , ", &mut errors).is_empty());
        assert_eq!(errors.len(), 1);
    }
}
